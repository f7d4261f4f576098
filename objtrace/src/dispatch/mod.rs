//! # Dispatch
//!
//! Entry points invoked by the host runtime, and the lifecycle state machine
//! gating them.
//!
//! ```text
//! NotStarted ──start──► Started ──init──► Initialized ──shutdown──► Dead
//!     │                    │                   │
//!     │ no thread:         │ stack walk        │ full capture
//!     │ placeholder        │ may say WrongPhase│
//! ```
//!
//! ## Creation
//!
//! ```text
//! on_object_created ──► capture_stack ──► IdentityRegistry::allocate
//!                                              │
//!                                              ▼
//!                                         set_tag(object, id)
//!                                              │ User flavor only
//!                                              ▼
//!                       FrameFormatter ──► EventEncoder ──► Transport::send
//! ```
//!
//! The [`TraceRecord`](crate::trace::TraceRecord) is dropped as soon as its
//! line is encoded; only the identity lives on, as the object's tag.
//!
//! ## Destruction
//!
//! `on_object_destroyed(tag)` encodes `d_<tag>_<millis>` and sends it, unless
//! the tracer is already `Dead`.
//!
//! ## Fatal Errors
//!
//! A broken host contract or a failed record allocation means identities can
//! no longer be trusted. [`abort_on_fatal`] logs the full cause chain and
//! aborts the process.

pub mod dispatcher;
pub mod lifecycle;
pub mod stats;

use log::error;

use crate::domain::TracerError;

pub use dispatcher::Dispatcher;
pub use lifecycle::{Lifecycle, Phase};
pub use stats::{DispatchSnapshot, DispatchStats};

/// Log `err` with its full cause chain and abort the process.
pub fn abort_on_fatal(err: TracerError) -> ! {
    let err = anyhow::Error::new(err);
    error!("Fatal tracer error, aborting: {err:#}");
    eprintln!("objtrace: fatal: {err:?}");
    std::process::abort()
}
