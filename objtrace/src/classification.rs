//! Allocation classification.
//!
//! Decides which [`Flavor`] an allocation belongs to from two facts: which
//! host hook observed it, and whether a stack could be captured at all.
//! Also recognises frames that belong to the tracer's own instrumentation so
//! rendering can drop them.
//!
//! # Classification Rules
//!
//! | Hook                 | Stack captured | No thread context    | Runtime not ready    |
//! |----------------------|----------------|----------------------|----------------------|
//! | Instrumented code    | `User`         | `BeforeRuntimeStart` | `BeforeRuntimeInit`  |
//! | Runtime allocation   | `V`            | `Unclassified`       | `V`                  |
//!
//! Only `User` creations are transmitted. Runtime-internal churn is tagged so
//! identities stay gap-free, but never put on the wire.

use objtrace_common::Flavor;

/// Host hook that reported an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationHook {
    /// Call injected into application allocation sites
    Instrumented,
    /// Generic allocation notification from the runtime itself
    RuntimeAllocation,
}

impl AllocationHook {
    /// Flavor of an allocation whose stack was captured normally.
    #[must_use]
    pub fn flavor(self) -> Flavor {
        match self {
            AllocationHook::Instrumented => Flavor::User,
            AllocationHook::RuntimeAllocation => Flavor::RuntimeInternalObject,
        }
    }
}

/// Why a stack could not be captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureGap {
    /// Notification arrived without a current thread (before runtime start)
    NoThread,
    /// The host refused the stack walk because the runtime is not ready yet
    WrongPhase,
}

/// Flavor of the shared empty trace used when capture is impossible.
#[must_use]
pub fn placeholder_flavor(hook: AllocationHook, gap: CaptureGap) -> Flavor {
    match (hook, gap) {
        (AllocationHook::Instrumented, CaptureGap::NoThread) => Flavor::BeforeRuntimeStart,
        (AllocationHook::Instrumented, CaptureGap::WrongPhase) => Flavor::BeforeRuntimeInit,
        (AllocationHook::RuntimeAllocation, CaptureGap::NoThread) => Flavor::Unclassified,
        (AllocationHook::RuntimeAllocation, CaptureGap::WrongPhase) => {
            Flavor::RuntimeInternalObject
        }
    }
}

/// Whether creations of this flavor produce a wire event.
#[must_use]
pub fn is_transmitted(flavor: Flavor) -> bool {
    flavor == Flavor::User
}

/// True for frames declared by the tracer's own instrumentation class.
#[must_use]
pub fn is_tracer_frame(type_signature: &str, tracker_class: &str) -> bool {
    type_signature == tracker_class
}
