use std::sync::Arc;

use log::{debug, info};

use super::{abort_on_fatal, DispatchStats, Phase};
use crate::classification::{is_transmitted, placeholder_flavor, AllocationHook, CaptureGap};
use crate::domain::{EpochMillis, HostError, ObjectId, ObjectRef, ThreadRef, TracerError, TypeRef};
use crate::export::EventEncoder;
use crate::host::{HostEventSource, RuntimeHost};
use crate::state::TracerState;
use crate::symbolization::FrameFormatter;
use crate::trace::capture_depth;

/// Host notification handler: capture, classify, register, encode, send.
///
/// All work runs synchronously on the notifying thread.
pub struct Dispatcher<H: RuntimeHost> {
    state: Arc<TracerState>,
    host: Arc<H>,
    stats: DispatchStats,
}

impl<H: RuntimeHost> Dispatcher<H> {
    #[must_use]
    pub fn new(state: Arc<TracerState>, host: Arc<H>) -> Self {
        Self { state, host, stats: DispatchStats::default() }
    }

    #[must_use]
    pub fn state(&self) -> &TracerState {
        &self.state
    }

    #[must_use]
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.lifecycle.current()
    }

    /// Handle one creation notification.
    ///
    /// # Errors
    /// Returns a `TracerError` when the host breaks its contract (stack walk,
    /// tagging or symbol lookup fails) or record storage cannot be obtained.
    /// Callers treat every error as fatal.
    pub fn record_creation(
        &self,
        hook: AllocationHook,
        thread: Option<ThreadRef>,
        object: ObjectRef,
    ) -> Result<(), TracerError> {
        if self.state.lifecycle.is_dead() {
            debug!("Ignoring creation of {object} after shutdown");
            return Ok(());
        }

        let Some(thread) = thread else {
            self.placeholder(hook, CaptureGap::NoThread, object);
            return Ok(());
        };

        let depth = capture_depth(self.state.options.max_frames);
        let mut frames = match self.host.capture_stack(thread, depth) {
            Ok(frames) => frames,
            Err(HostError::WrongPhase) => {
                self.placeholder(hook, CaptureGap::WrongPhase, object);
                return Ok(());
            }
            Err(e) => return Err(TracerError::host("walk the allocating thread's stack", e)),
        };
        frames.truncate(depth);

        let record = self.state.registry.allocate(&frames, hook.flavor())?;
        self.host
            .set_tag(object, record.id)
            .map_err(|e| TracerError::host("tag a newly allocated object", e))?;
        DispatchStats::bump(&self.stats.creations_tagged);

        if !is_transmitted(record.flavor()) {
            return Ok(());
        }

        let formatter = FrameFormatter::new(self.host.as_ref(), &self.state.options.tracker_class);
        let line = EventEncoder::new(formatter).encode_creation(&record)?;
        drop(record);

        self.state.transport.send(&line);
        DispatchStats::bump(&self.stats.creations_sent);
        Ok(())
    }

    /// Handle one destruction notification.
    pub fn record_destruction(&self, tag: ObjectId) {
        if self.state.lifecycle.is_dead() {
            DispatchStats::bump(&self.stats.deletions_suppressed);
            return;
        }

        let formatter = FrameFormatter::new(self.host.as_ref(), &self.state.options.tracker_class);
        let line = EventEncoder::new(formatter).encode_deletion(tag, EpochMillis::now());
        self.state.transport.send(&line);
        DispatchStats::bump(&self.stats.deletions_sent);
    }

    /// Flush pending frees, then stop all further output.
    ///
    /// # Errors
    /// Returns `TracerError::HostContract` when the final collection fails.
    pub fn shutdown(&self) -> Result<(), TracerError> {
        if self.state.lifecycle.is_dead() {
            return Ok(());
        }

        info!("Runtime shutting down, collecting unreachable objects");
        self.host
            .force_collection()
            .map_err(|e| TracerError::host("force the final collection", e))?;

        self.state.lifecycle.advance(Phase::Dead);
        self.state.transport.close();
        self.stats.log_summary();
        info!(
            "Transport: {} lines sent, {} lost",
            self.state.transport.sent(),
            self.state.transport.failures()
        );
        Ok(())
    }

    fn placeholder(&self, hook: AllocationHook, gap: CaptureGap, object: ObjectRef) {
        let trace = self.state.empty_traces.get(placeholder_flavor(hook, gap));
        DispatchStats::bump(&self.stats.placeholders);
        debug!("No stack for {object} ({gap:?}), using {} placeholder", trace.flavor());
    }

    fn transition(&self, next: Phase) {
        let previous = self.state.lifecycle.advance(next);
        if previous < next {
            info!("Runtime lifecycle: {previous} -> {next}");
        }
    }
}

impl<H: RuntimeHost> HostEventSource for Dispatcher<H> {
    fn on_lifecycle_start(&self) {
        self.transition(Phase::Started);
    }

    fn on_lifecycle_init(&self) {
        self.transition(Phase::Initialized);
    }

    fn on_lifecycle_shutdown(&self) {
        if let Err(e) = self.shutdown() {
            abort_on_fatal(e);
        }
    }

    fn on_object_created(&self, thread: Option<ThreadRef>, object: ObjectRef) {
        if let Err(e) = self.record_creation(AllocationHook::Instrumented, thread, object) {
            abort_on_fatal(e);
        }
    }

    fn on_runtime_allocation(
        &self,
        thread: Option<ThreadRef>,
        object: ObjectRef,
        type_ref: TypeRef,
        size_bytes: u64,
    ) {
        debug!("Runtime allocation of {size_bytes} bytes (type {:#x})", type_ref.0);
        if let Err(e) = self.record_creation(AllocationHook::RuntimeAllocation, thread, object) {
            abort_on_fatal(e);
        }
    }

    fn on_object_destroyed(&self, tag: ObjectId) {
        self.record_destruction(tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentOptions;
    use crate::domain::MethodId;
    use crate::host::{HostStep, MethodDef, ScriptedHost};
    use crate::trace::Frame;
    use crate::transport::Transport;
    use std::io::{self, Write};
    use std::sync::{Mutex, PoisonError};

    /// In-memory sink shared between the transport and the test.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    const MAIN: ThreadRef = ThreadRef(1);

    fn setup() -> (Arc<Dispatcher<ScriptedHost>>, Arc<ScriptedHost>, Captured) {
        let host = Arc::new(ScriptedHost::new());
        host.define_method(MethodId(1), MethodDef::new("Foo", "bar", "Foo.java", 20));
        host.define_method(MethodId(2), MethodDef::new("Main", "main", "Main.java", 3));
        host.set_stack(MAIN, vec![Frame::new(MethodId(1), 10), Frame::new(MethodId(2), 5)]);

        let captured = Captured::default();
        let state = TracerState::with_transport(
            AgentOptions::default(),
            Transport::from_writer(captured.clone()),
        );
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(state), Arc::clone(&host)));
        let listener: Arc<dyn HostEventSource> = dispatcher.clone();
        host.attach(&listener);
        (dispatcher, host, captured)
    }

    fn split(line: &str) -> Vec<&str> {
        line.splitn(5, '_').collect()
    }

    #[test]
    fn test_creation_then_destruction_scenario() {
        let (dispatcher, host, captured) = setup();
        host.replay(
            &[
                HostStep::Start,
                HostStep::Init,
                HostStep::Create { thread: Some(MAIN), object: ObjectRef(0x100) },
            ],
            dispatcher.as_ref(),
        );

        let lines = captured.lines();
        assert_eq!(lines.len(), 1);
        let created = split(&lines[0]);
        assert_eq!(&created[..3], &["c", "1", "U"]);
        assert_eq!(created[4], "Foo.bar@10[Foo.java:20],Main.main@5[Main.java:3]");
        assert_eq!(host.tag_of(ObjectRef(0x100)), Some(ObjectId(1)));

        dispatcher.on_object_destroyed(ObjectId(1));
        let lines = captured.lines();
        assert_eq!(lines.len(), 2);
        let deleted = split(&lines[1]);
        assert_eq!(&deleted[..2], &["d", "1"]);
        let ts: u64 = created[3].parse().unwrap();
        let ts2: u64 = deleted[2].parse().unwrap();
        assert!(ts2 >= ts);
    }

    #[test]
    fn test_destruction_line_needs_no_symbols() {
        let (dispatcher, host, captured) = setup();
        host.fail_method_symbol(MethodId(1));
        dispatcher.on_lifecycle_start();

        let before = EpochMillis::now();
        dispatcher.record_destruction(ObjectId(42));

        let lines = captured.lines();
        assert_eq!(lines.len(), 1);
        let deleted = split(&lines[0]);
        assert_eq!(&deleted[..2], &["d", "42"]);
        assert!(deleted[2].parse::<u64>().unwrap() >= before.0);
        assert_eq!(host.outstanding_leases(), 0);
        assert_eq!(dispatcher.stats().snapshot().deletions_sent, 1);
    }

    #[test]
    fn test_creation_without_thread_before_start() {
        let (dispatcher, host, captured) = setup();
        dispatcher.on_object_created(None, ObjectRef(0x200));

        assert!(captured.lines().is_empty());
        assert_eq!(dispatcher.state().registry.issued(), 0);
        assert_eq!(host.tag_of(ObjectRef(0x200)), None);
        assert_eq!(dispatcher.stats().snapshot().placeholders, 1);

        // the next real allocation still gets identity 1
        dispatcher.on_lifecycle_start();
        dispatcher.on_lifecycle_init();
        dispatcher.on_object_created(Some(MAIN), ObjectRef(0x201));
        assert!(captured.lines()[0].starts_with("c_1_U_"));
    }

    #[test]
    fn test_wrong_phase_stack_walk_uses_placeholder() {
        let (dispatcher, host, captured) = setup();
        host.set_not_ready(ThreadRef(2));
        dispatcher.on_lifecycle_start();
        dispatcher.on_object_created(Some(ThreadRef(2)), ObjectRef(0x300));

        assert!(captured.lines().is_empty());
        assert_eq!(dispatcher.state().registry.issued(), 0);
    }

    #[test]
    fn test_runtime_allocations_are_tagged_not_sent() {
        let (dispatcher, host, captured) = setup();
        dispatcher.on_lifecycle_start();
        dispatcher.on_lifecycle_init();
        dispatcher.on_runtime_allocation(Some(MAIN), ObjectRef(0x400), TypeRef(0x10), 24);
        dispatcher.on_object_created(Some(MAIN), ObjectRef(0x401));

        assert_eq!(host.tag_of(ObjectRef(0x400)), Some(ObjectId(1)));
        let lines = captured.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("c_2_U_"));

        let stats = dispatcher.stats().snapshot();
        assert_eq!(stats.creations_tagged, 2);
        assert_eq!(stats.creations_sent, 1);
    }

    #[test]
    fn test_shutdown_flushes_frees_then_goes_silent() {
        let (dispatcher, host, captured) = setup();
        host.replay(
            &[
                HostStep::Start,
                HostStep::Init,
                HostStep::Create { thread: Some(MAIN), object: ObjectRef(1) },
                HostStep::Create { thread: Some(MAIN), object: ObjectRef(2) },
                HostStep::Unreachable(ObjectRef(2)),
                HostStep::Shutdown,
            ],
            dispatcher.as_ref(),
        );

        assert_eq!(dispatcher.phase(), Phase::Dead);
        assert_eq!(host.collections(), 1);
        let lines = captured.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("d_2_"));

        dispatcher.on_object_destroyed(ObjectId(1));
        dispatcher.on_object_created(Some(MAIN), ObjectRef(3));
        assert_eq!(captured.lines().len(), 3);
        assert_eq!(dispatcher.stats().snapshot().deletions_suppressed, 1);
        assert_eq!(dispatcher.state().registry.issued(), 2);
    }

    #[test]
    fn test_tracker_frames_are_captured_but_not_rendered() {
        let (dispatcher, host, captured) = setup();
        host.define_method(MethodId(9), MethodDef::new("LHeapTracker;", "newobj", "HeapTracker.java", 1));
        host.set_stack(
            ThreadRef(7),
            vec![Frame::new(MethodId(9), 0), Frame::new(MethodId(1), 10)],
        );
        dispatcher.on_lifecycle_init();
        dispatcher.on_object_created(Some(ThreadRef(7)), ObjectRef(0x500));

        let lines = captured.lines();
        assert!(lines[0].ends_with("_Foo.bar@10[Foo.java:20]"));
        assert_eq!(host.outstanding_leases(), 0);
    }

    #[test]
    fn test_symbol_failure_is_reported_as_contract_violation() {
        let (dispatcher, host, captured) = setup();
        host.fail_method_symbol(MethodId(2));
        dispatcher.on_lifecycle_init();

        let err = dispatcher
            .record_creation(AllocationHook::Instrumented, Some(MAIN), ObjectRef(0x600))
            .unwrap_err();
        assert!(matches!(err, TracerError::HostContract { .. }));
        assert!(captured.lines().is_empty());
    }

    #[test]
    fn test_tagging_failure_is_reported_as_contract_violation() {
        let (dispatcher, host, _captured) = setup();
        host.fail_tagging();

        let err = dispatcher
            .record_creation(AllocationHook::RuntimeAllocation, Some(MAIN), ObjectRef(0x700))
            .unwrap_err();
        assert!(matches!(err, TracerError::HostContract { context: "tag a newly allocated object", .. }));
    }
}
