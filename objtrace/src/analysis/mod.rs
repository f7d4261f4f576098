//! Analysis of collected event streams
//!
//! Pure aggregation over parsed wire events, kept apart from the collector's
//! I/O so it can be tested on plain event lists.

pub mod live_objects;

pub use live_objects::{AllocationSite, LiveObjectSummary, LiveObjectTracker};
