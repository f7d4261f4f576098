use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

/// Dispatcher counters, updated lock-free from every notifying thread.
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Creations that received an identity and a tag
    pub creations_tagged: AtomicU64,
    /// Creation lines handed to the transport
    pub creations_sent: AtomicU64,
    /// Creations that fell back to an empty placeholder trace
    pub placeholders: AtomicU64,
    /// Deletion lines handed to the transport
    pub deletions_sent: AtomicU64,
    /// Destruction notifications ignored after shutdown
    pub deletions_suppressed: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub creations_tagged: u64,
    pub creations_sent: u64,
    pub placeholders: u64,
    pub deletions_sent: u64,
    pub deletions_suppressed: u64,
}

impl DispatchStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            creations_tagged: self.creations_tagged.load(Ordering::Relaxed),
            creations_sent: self.creations_sent.load(Ordering::Relaxed),
            placeholders: self.placeholders.load(Ordering::Relaxed),
            deletions_sent: self.deletions_sent.load(Ordering::Relaxed),
            deletions_suppressed: self.deletions_suppressed.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            "Tracer summary: {} tagged, {} creations sent, {} placeholders, {} deletions sent, {} deletions suppressed",
            s.creations_tagged, s.creations_sent, s.placeholders, s.deletions_sent, s.deletions_suppressed
        );
    }
}
