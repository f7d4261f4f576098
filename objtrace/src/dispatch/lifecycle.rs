use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Runtime lifecycle as seen by the tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Phase {
    NotStarted = 0,
    Started = 1,
    Initialized = 2,
    Dead = 3,
}

impl Phase {
    fn from_u8(raw: u8) -> Phase {
        match raw {
            0 => Phase::NotStarted,
            1 => Phase::Started,
            2 => Phase::Initialized,
            _ => Phase::Dead,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::NotStarted => "not-started",
            Phase::Started => "started",
            Phase::Initialized => "initialized",
            Phase::Dead => "dead",
        };
        f.write_str(name)
    }
}

/// Forward-only phase cell.
///
/// Reads are relaxed: a thread may observe a stale phase for a notification
/// or two, which the dispatcher tolerates.
#[derive(Debug, Default)]
pub struct Lifecycle {
    phase: AtomicU8,
}

impl Lifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    /// Move to `next` unless already at or past it. Returns the phase held
    /// before the call.
    pub fn advance(&self, next: Phase) -> Phase {
        Phase::from_u8(self.phase.fetch_max(next as u8, Ordering::Relaxed))
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.current() == Phase::Dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_starts_not_started() {
        assert_eq!(Lifecycle::new().current(), Phase::NotStarted);
    }

    #[test]
    fn test_lifecycle_never_moves_backward() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.advance(Phase::Initialized), Phase::NotStarted);
        assert_eq!(lifecycle.advance(Phase::Started), Phase::Initialized);
        assert_eq!(lifecycle.current(), Phase::Initialized);

        lifecycle.advance(Phase::Dead);
        lifecycle.advance(Phase::NotStarted);
        assert!(lifecycle.is_dead());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::NotStarted.to_string(), "not-started");
        assert_eq!(Phase::Dead.to_string(), "dead");
    }
}
