//! # Identity Registry
//!
//! Owns the process-wide allocation counter. Every tracked allocation passes
//! through [`IdentityRegistry::allocate`], which hands back a fresh
//! [`TraceRecord`] carrying the next identity.
//!
//! ## Critical Section
//!
//! ```text
//! lock ──► reserve frame storage ──► counter += 1 ──► build record ──► unlock
//! ```
//!
//! Frame storage is reserved *before* the counter moves, so a failed
//! reservation never burns an identity. No I/O happens under the lock.
//!
//! Identities are strictly increasing and gap-free, starting at 1.

use std::sync::{Mutex, MutexGuard};

use objtrace_common::Flavor;

use crate::domain::{EpochMillis, ObjectId, TracerError};
use crate::trace::{Frame, Trace, TraceRecord};

/// Monotonic identity source guarded by a single lock.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    /// Last issued identity (0 before the first allocation)
    counter: Mutex<u64>,
}

impl IdentityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next identity and build the record for `frames`.
    ///
    /// `frames` must already be bounded by the capture depth; they are copied
    /// into the record as-is.
    ///
    /// # Errors
    /// Returns `TracerError::OutOfMemory` when frame storage cannot be
    /// reserved. The counter is left untouched in that case.
    pub fn allocate(&self, frames: &[Frame], flavor: Flavor) -> Result<TraceRecord, TracerError> {
        let mut counter = self.lock();

        let mut owned = Vec::new();
        owned.try_reserve_exact(frames.len())?;
        owned.extend_from_slice(frames);

        *counter += 1;
        let cap = owned.len();
        Ok(TraceRecord {
            id: ObjectId(*counter),
            trace: Trace::new(owned, flavor, cap),
            allocated_at: EpochMillis::now(),
            deallocated_at: None,
        })
    }

    /// Number of identities issued so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        *self.lock()
    }

    // The counter is written only after every fallible step, so a poisoned
    // lock still guards a consistent value.
    fn lock(&self) -> MutexGuard<'_, u64> {
        self.counter.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
