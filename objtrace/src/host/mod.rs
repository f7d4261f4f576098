//! # Host Boundary
//!
//! Two traits separate the tracer core from the managed runtime hosting it.
//!
//! ```text
//!            HostEventSource (inbound)
//!  runtime ─────────────────────────────► Dispatcher
//!     ▲                                       │
//!     └───────────────────────────────────────┘
//!            RuntimeHost (outbound services)
//!            stack walk · symbols · tagging · forced collection
//! ```
//!
//! The runtime calls [`HostEventSource`] methods from any of its threads. The
//! dispatcher calls back into [`RuntimeHost`] for everything it cannot do on
//! its own. [`ScriptedHost`] implements the outbound side for tests and demos
//! and can replay a notification script against any event source.

pub mod scripted;

use crate::domain::{HostError, ObjectId, ObjectRef, ThreadRef, TypeRef};
use crate::symbolization::SymbolService;
use crate::trace::Frame;

pub use scripted::{HostStep, MethodDef, ScriptedHost};

/// Notifications delivered by the host runtime.
///
/// Implementations must tolerate concurrent calls from arbitrarily many
/// threads.
pub trait HostEventSource: Send + Sync {
    /// The runtime has started; threads exist from here on.
    fn on_lifecycle_start(&self);

    /// The runtime finished initialization; stack walks work from here on.
    fn on_lifecycle_init(&self);

    /// The runtime is shutting down.
    fn on_lifecycle_shutdown(&self);

    /// An instrumented allocation site ran. `thread` is `None` only before
    /// the runtime has started.
    fn on_object_created(&self, thread: Option<ThreadRef>, object: ObjectRef);

    /// The runtime allocated an object outside instrumented code.
    fn on_runtime_allocation(
        &self,
        thread: Option<ThreadRef>,
        object: ObjectRef,
        type_ref: TypeRef,
        size_bytes: u64,
    );

    /// A tagged object became unreachable. `tag` is the identity assigned at
    /// creation.
    fn on_object_destroyed(&self, tag: ObjectId);
}

/// Services the host runtime provides to the tracer.
pub trait RuntimeHost: SymbolService + Send + Sync {
    /// Walk `thread`'s stack, nearest frame first, at most `max_depth` frames.
    ///
    /// # Errors
    /// `HostError::WrongPhase` before the runtime is initialized; anything
    /// else is a host contract violation.
    fn capture_stack(&self, thread: ThreadRef, max_depth: usize) -> Result<Vec<Frame>, HostError>;

    /// Attach `id` to `object` so its destruction reports it back.
    ///
    /// # Errors
    /// Any error is a host contract violation.
    fn set_tag(&self, object: ObjectRef, id: ObjectId) -> Result<(), HostError>;

    /// Run a full collection so pending destruction notifications are delivered.
    ///
    /// # Errors
    /// Any error is a host contract violation.
    fn force_collection(&self) -> Result<(), HostError>;
}
