//! Trace data model
//!
//! A [`Trace`] is what the host stack walk produced for one allocation: raw
//! frames (method + instruction offset), nearest call site first, bounded by
//! the configured cap. Symbol data is resolved later, when the trace is
//! rendered for the wire.

use objtrace_common::{Flavor, TRACER_FRAME_HEADROOM};

use crate::domain::{EpochMillis, MethodId, ObjectId};

/// One captured stack location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    pub method: MethodId,
    /// Instruction offset within the method (`-1` for native frames on some hosts)
    pub offset: i64,
}

impl Frame {
    #[must_use]
    pub fn new(method: MethodId, offset: i64) -> Self {
        Self { method, offset }
    }
}

/// Bounded, ordered sequence of frames plus the flavor it was captured under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    frames: Vec<Frame>,
    flavor: Flavor,
}

impl Trace {
    /// Build a trace, keeping at most `cap` frames.
    #[must_use]
    pub fn new(mut frames: Vec<Frame>, flavor: Flavor, cap: usize) -> Self {
        frames.truncate(cap);
        Self { frames, flavor }
    }

    /// A trace with zero frames.
    #[must_use]
    pub fn empty(flavor: Flavor) -> Self {
        Self { frames: Vec::new(), flavor }
    }

    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    #[must_use]
    pub fn number_of_frames(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Frame cap for a given number of application frames: room for the
/// tracer's own instrumentation frames that rendering drops.
#[must_use]
pub fn capture_depth(max_frames: usize) -> usize {
    max_frames.saturating_add(TRACER_FRAME_HEADROOM)
}

/// Transient record pairing an identity with the trace it was allocated under.
///
/// Produced by the identity registry and consumed by the dispatcher as soon
/// as the creation event is emitted. Only `id` outlives it, as the tag on the
/// tracked object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub id: ObjectId,
    pub trace: Trace,
    pub allocated_at: EpochMillis,
    /// Unset until destruction is observed
    pub deallocated_at: Option<EpochMillis>,
}

impl TraceRecord {
    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.trace.flavor()
    }
}

/// One shared empty trace per flavor, built once at startup.
///
/// Handed out whenever a stack cannot be captured (no thread context, runtime
/// not ready). Placeholders never receive an identity.
#[derive(Debug)]
pub struct EmptyTraces {
    table: [Trace; Flavor::COUNT],
}

impl EmptyTraces {
    #[must_use]
    pub fn new() -> Self {
        Self { table: Flavor::ALL.map(Trace::empty) }
    }

    #[must_use]
    pub fn get(&self, flavor: Flavor) -> &Trace {
        &self.table[flavor.index()]
    }
}

impl Default for EmptyTraces {
    fn default() -> Self {
        Self::new()
    }
}
