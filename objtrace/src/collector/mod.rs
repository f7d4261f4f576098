//! # Event Collector
//!
//! Receiving side of the line protocol.
//!
//! ```text
//! tracer ──TCP──► connection task ──┐
//! tracer ──TCP──► connection task ──┼─try_send─► bounded queue ──► processor thread
//! tracer ──TCP──► connection task ──┘   (full: drop + count)          │
//!                                                                      ▼
//!                                                       stdout · json · summary · null
//! ```
//!
//! Connection tasks run on tokio; the processor runs on a plain thread so a
//! slow output never stalls the accept loop. A full queue drops lines rather
//! than pushing back on tracers. Each queued line carries the number of the
//! connection it came from, since every tracer counts identities from 1.

pub mod processor;
pub mod server;

pub use processor::{
    build_processor, run_processor, spawn_processor, Processor, ProcessorKind, ProcessorStats,
};
pub use server::{CollectorServer, QueuedLine, ServerStats};
