//! Scripted in-process host.
//!
//! Plays the runtime's role without a runtime: methods, stacks and collection
//! are all set up by hand, and every lookup handle it gives out is tracked so
//! tests can assert that nothing leaks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::debug;

use super::{HostEventSource, RuntimeHost};
use crate::domain::{ClassRef, HostError, MethodId, ObjectId, ObjectRef, ThreadRef, TypeRef};
use crate::symbolization::{LineEntry, Lookup, LookupHandle, MethodSymbol, SymbolService};
use crate::trace::Frame;

/// Symbol data for one scripted method. Each method gets its own class.
#[derive(Debug, Clone, Default)]
pub struct MethodDef {
    class_signature: Option<String>,
    name: Option<String>,
    descriptor: Option<String>,
    source_file: Option<String>,
    native: bool,
    line_table: Option<Vec<LineEntry>>,
}

impl MethodDef {
    /// A fully resolvable method whose every offset maps to `line`.
    #[must_use]
    pub fn new(class_signature: &str, name: &str, source_file: &str, line: u32) -> Self {
        Self {
            class_signature: Some(class_signature.to_string()),
            name: Some(name.to_string()),
            descriptor: Some("()V".to_string()),
            source_file: Some(source_file.to_string()),
            native: false,
            line_table: Some(vec![LineEntry { start_offset: 0, line }]),
        }
    }

    /// No symbol data at all.
    #[must_use]
    pub fn unresolved() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn native(mut self) -> Self {
        self.native = true;
        self.line_table = None;
        self
    }

    #[must_use]
    pub fn with_line_table(mut self, table: Vec<LineEntry>) -> Self {
        self.line_table = Some(table);
        self
    }

    #[must_use]
    pub fn without_source_file(mut self) -> Self {
        self.source_file = None;
        self
    }
}

/// One notification in a replay script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostStep {
    Start,
    Init,
    Shutdown,
    Create { thread: Option<ThreadRef>, object: ObjectRef },
    RuntimeAllocate { thread: Option<ThreadRef>, object: ObjectRef, type_ref: TypeRef, size_bytes: u64 },
    /// Drop the last reference to an object; reported at the next collection
    Unreachable(ObjectRef),
    /// Run a collection and deliver pending destruction notifications
    Collect,
}

#[derive(Debug, Clone)]
enum ThreadStack {
    Frames(Vec<Frame>),
    NotReady,
}

/// Fake [`RuntimeHost`] driven entirely by the test or demo using it.
#[derive(Default)]
pub struct ScriptedHost {
    methods: Mutex<HashMap<MethodId, MethodDef>>,
    threads: Mutex<HashMap<ThreadRef, ThreadStack>>,
    tags: Mutex<HashMap<ObjectRef, ObjectId>>,
    pending_frees: Mutex<Vec<ObjectId>>,
    listener: Mutex<Option<Weak<dyn HostEventSource>>>,

    failing_symbols: Mutex<HashSet<MethodId>>,
    fail_tagging: AtomicBool,

    next_handle: AtomicU64,
    outstanding: Mutex<HashSet<LookupHandle>>,
    double_releases: AtomicU64,
    collections: AtomicU64,
}

impl ScriptedHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // === Setup ===

    pub fn define_method(&self, method: MethodId, def: MethodDef) {
        lock(&self.methods).insert(method, def);
    }

    /// Stack reported for `thread`, nearest frame first.
    pub fn set_stack(&self, thread: ThreadRef, frames: Vec<Frame>) {
        lock(&self.threads).insert(thread, ThreadStack::Frames(frames));
    }

    /// Stack walks on `thread` report `WrongPhase`.
    pub fn set_not_ready(&self, thread: ThreadRef) {
        lock(&self.threads).insert(thread, ThreadStack::NotReady);
    }

    /// Method name lookups for `method` fail with a generic host error.
    pub fn fail_method_symbol(&self, method: MethodId) {
        lock(&self.failing_symbols).insert(method);
    }

    /// Every later `set_tag` fails.
    pub fn fail_tagging(&self) {
        self.fail_tagging.store(true, Ordering::Relaxed);
    }

    /// Route destruction notifications from `force_collection` to `listener`.
    pub fn attach(&self, listener: &Arc<dyn HostEventSource>) {
        *lock(&self.listener) = Some(Arc::downgrade(listener));
    }

    // === Object lifetime ===

    /// Drop `object`. Tagged objects are reported at the next collection;
    /// untagged objects vanish silently.
    pub fn make_unreachable(&self, object: ObjectRef) {
        if let Some(tag) = lock(&self.tags).remove(&object) {
            lock(&self.pending_frees).push(tag);
        }
    }

    /// Deliver pending destruction notifications to `target`.
    pub fn collect_into(&self, target: &dyn HostEventSource) {
        self.collections.fetch_add(1, Ordering::Relaxed);
        let freed = std::mem::take(&mut *lock(&self.pending_frees));
        debug!("Scripted collection freeing {} objects", freed.len());
        for tag in freed {
            target.on_object_destroyed(tag);
        }
    }

    /// Run `steps` against `target` in order.
    pub fn replay(&self, steps: &[HostStep], target: &dyn HostEventSource) {
        for step in steps {
            match step {
                HostStep::Start => target.on_lifecycle_start(),
                HostStep::Init => target.on_lifecycle_init(),
                HostStep::Shutdown => target.on_lifecycle_shutdown(),
                HostStep::Create { thread, object } => target.on_object_created(*thread, *object),
                HostStep::RuntimeAllocate { thread, object, type_ref, size_bytes } => {
                    target.on_runtime_allocation(*thread, *object, *type_ref, *size_bytes);
                }
                HostStep::Unreachable(object) => self.make_unreachable(*object),
                HostStep::Collect => self.collect_into(target),
            }
        }
    }

    // === Inspection ===

    #[must_use]
    pub fn tag_of(&self, object: ObjectRef) -> Option<ObjectId> {
        lock(&self.tags).get(&object).copied()
    }

    #[must_use]
    pub fn tagged_objects(&self) -> usize {
        lock(&self.tags).len()
    }

    /// Lookup handles given out and not yet released.
    #[must_use]
    pub fn outstanding_leases(&self) -> usize {
        lock(&self.outstanding).len()
    }

    /// Releases of handles that were not outstanding.
    #[must_use]
    pub fn double_releases(&self) -> u64 {
        self.double_releases.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn collections(&self) -> u64 {
        self.collections.load(Ordering::Relaxed)
    }

    fn method(&self, method: MethodId) -> Result<MethodDef, HostError> {
        lock(&self.methods)
            .get(&method)
            .cloned()
            .ok_or_else(|| HostError::InvalidHandle(method.to_string()))
    }

    fn class(&self, class: ClassRef) -> Result<MethodDef, HostError> {
        lock(&self.methods)
            .get(&MethodId(class.0))
            .cloned()
            .ok_or_else(|| HostError::InvalidHandle(class.to_string()))
    }

    fn backed<T>(&self, value: T) -> Lookup<T> {
        let handle = LookupHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        lock(&self.outstanding).insert(handle);
        Lookup::new(handle, value)
    }
}

impl SymbolService for ScriptedHost {
    fn declaring_class(&self, method: MethodId) -> Result<ClassRef, HostError> {
        self.method(method).map(|_| ClassRef(method.0))
    }

    fn class_signature(&self, class: ClassRef) -> Result<Lookup<Option<String>>, HostError> {
        Ok(match self.class(class)?.class_signature {
            Some(signature) => self.backed(Some(signature)),
            None => Lookup::unbacked(None),
        })
    }

    fn method_symbol(&self, method: MethodId) -> Result<Lookup<MethodSymbol>, HostError> {
        if lock(&self.failing_symbols).contains(&method) {
            return Err(HostError::CallFailed {
                operation: "GetMethodName",
                reason: "scripted failure".to_string(),
            });
        }
        let def = self.method(method)?;
        let symbol = MethodSymbol { name: def.name, signature: def.descriptor };
        Ok(if symbol.name.is_some() { self.backed(symbol) } else { Lookup::unbacked(symbol) })
    }

    fn is_method_native(&self, method: MethodId) -> Result<bool, HostError> {
        Ok(self.method(method)?.native)
    }

    fn source_file_name(&self, class: ClassRef) -> Result<Lookup<Option<String>>, HostError> {
        match self.class(class)?.source_file {
            Some(file) => Ok(self.backed(Some(file))),
            None => Err(HostError::AbsentInformation),
        }
    }

    fn line_number_table(&self, method: MethodId) -> Result<Lookup<Vec<LineEntry>>, HostError> {
        match self.method(method)?.line_table {
            Some(table) => Ok(self.backed(table)),
            None => Err(HostError::AbsentInformation),
        }
    }

    fn release(&self, handle: LookupHandle) {
        if !lock(&self.outstanding).remove(&handle) {
            self.double_releases.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl RuntimeHost for ScriptedHost {
    fn capture_stack(&self, thread: ThreadRef, max_depth: usize) -> Result<Vec<Frame>, HostError> {
        match lock(&self.threads).get(&thread) {
            Some(ThreadStack::Frames(frames)) => {
                Ok(frames.iter().take(max_depth).copied().collect())
            }
            Some(ThreadStack::NotReady) => Err(HostError::WrongPhase),
            None => Err(HostError::InvalidHandle(thread.to_string())),
        }
    }

    fn set_tag(&self, object: ObjectRef, id: ObjectId) -> Result<(), HostError> {
        if self.fail_tagging.load(Ordering::Relaxed) {
            return Err(HostError::CallFailed { operation: "SetTag", reason: "scripted failure".to_string() });
        }
        lock(&self.tags).insert(object, id);
        Ok(())
    }

    fn force_collection(&self) -> Result<(), HostError> {
        let listener = lock(&self.listener).as_ref().and_then(Weak::upgrade);
        match listener {
            Some(listener) => self.collect_into(listener.as_ref()),
            None => {
                self.collections.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
