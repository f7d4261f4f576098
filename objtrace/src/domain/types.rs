//! Domain types providing compile-time safety and self-documentation
//!
//! Host handles (`ThreadRef`, `ObjectRef`, ...) are opaque values owned by the
//! runtime; the tracer only passes them back to host services. `ObjectId` is
//! the tracer's own identity and the only value that outlives a notification.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Tracer-assigned object identity
///
/// Strictly increasing, gap-free, first issued value is 1. Stored on the
/// tracked object as its tag and echoed back on destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock time in milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpochMillis(pub u64);

impl EpochMillis {
    /// Current wall-clock time. A clock set before 1970 reads as 0.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        Self(millis)
    }
}

impl fmt::Display for EpochMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host thread handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadRef(pub usize);

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread:0x{:x}", self.0)
    }
}

/// Host handle of a newly allocated object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(pub usize);

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object:0x{:x}", self.0)
    }
}

/// Host handle of an object's type (runtime allocation hook only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef(pub usize);

/// Host method identifier, as reported by the stack walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub usize);

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method:0x{:x}", self.0)
    }
}

/// Host handle of a method's declaring class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassRef(pub usize);

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class:0x{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_millis_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(EpochMillis::now().0 > 1_577_836_800_000);
    }

    #[test]
    fn test_object_id_orders_numerically() {
        assert!(ObjectId(2) > ObjectId(1));
        assert_eq!(ObjectId(7).to_string(), "7");
    }
}
