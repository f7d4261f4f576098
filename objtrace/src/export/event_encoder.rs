use objtrace_common::{CreationLine, DeletionLine, FrameText};

use crate::domain::{EpochMillis, ObjectId, TracerError};
use crate::symbolization::{FrameFormatter, SymbolService};
use crate::trace::TraceRecord;

/// Builds newline-terminated wire lines.
///
/// ```text
/// c_<id>_<flavor>_<millis>_<frame>,<frame>,...\n
/// d_<id>_<millis>\n
/// ```
pub struct EventEncoder<'h, S: SymbolService + ?Sized> {
    formatter: FrameFormatter<'h, S>,
}

impl<'h, S: SymbolService + ?Sized> EventEncoder<'h, S> {
    pub fn new(formatter: FrameFormatter<'h, S>) -> Self {
        Self { formatter }
    }

    /// Render the record's frames and encode its creation line.
    ///
    /// Frames of the tracker class are dropped; a trace with nothing left to
    /// render carries the `<empty>` marker.
    ///
    /// # Errors
    /// Only symbol resolution can fail (`TracerError::HostContract`); the
    /// encoding step itself is infallible.
    pub fn encode_creation(&self, record: &TraceRecord) -> Result<String, TracerError> {
        let frames = self.formatter.render_trace(&record.trace)?;
        Ok(creation_line(record, frames))
    }

    /// Encode a destruction line.
    #[must_use]
    pub fn encode_deletion(&self, id: ObjectId, at: EpochMillis) -> String {
        deletion_line(id, at)
    }
}

/// Creation line for a record whose frames are already rendered.
#[must_use]
pub fn creation_line(record: &TraceRecord, frames: Vec<FrameText>) -> String {
    let line = CreationLine {
        id: record.id.0,
        flavor: record.flavor(),
        timestamp_ms: record.allocated_at.0,
        frames,
    };
    format!("{line}\n")
}

#[must_use]
pub fn deletion_line(id: ObjectId, at: EpochMillis) -> String {
    format!("{}\n", DeletionLine { id: id.0, timestamp_ms: at.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TRACKER_CLASS;
    use crate::domain::MethodId;
    use crate::host::{MethodDef, ScriptedHost};
    use crate::trace::{Frame, Trace};
    use objtrace_common::{Flavor, WireEvent};

    fn record(frames: Vec<Frame>) -> TraceRecord {
        TraceRecord {
            id: ObjectId(42),
            trace: Trace::new(frames, Flavor::User, 7),
            allocated_at: EpochMillis(1_700_000_000_123),
            deallocated_at: None,
        }
    }

    fn host() -> ScriptedHost {
        let host = ScriptedHost::new();
        host.define_method(MethodId(1), MethodDef::new("Foo", "bar", "Foo.java", 20));
        host.define_method(MethodId(2), MethodDef::new("Main", "main", "Main.java", 3));
        host.define_method(MethodId(9), MethodDef::new("LHeapTracker;", "newobj", "HeapTracker.java", 1));
        host
    }

    #[test]
    fn test_encode_creation_line() {
        let host = host();
        let encoder = EventEncoder::new(FrameFormatter::new(&host, DEFAULT_TRACKER_CLASS));
        let line = encoder
            .encode_creation(&record(vec![Frame::new(MethodId(1), 10), Frame::new(MethodId(2), 5)]))
            .unwrap();
        assert_eq!(
            line,
            "c_42_U_1700000000123_Foo.bar@10[Foo.java:20],Main.main@5[Main.java:3]\n"
        );
    }

    #[test]
    fn test_zero_frames_encode_empty_marker() {
        let host = host();
        let encoder = EventEncoder::new(FrameFormatter::new(&host, DEFAULT_TRACKER_CLASS));
        let line = encoder.encode_creation(&record(Vec::new())).unwrap();
        assert_eq!(line, "c_42_U_1700000000123_<empty>\n");
    }

    #[test]
    fn test_only_tracker_frames_encode_empty_marker() {
        let host = host();
        let encoder = EventEncoder::new(FrameFormatter::new(&host, DEFAULT_TRACKER_CLASS));
        let line = encoder.encode_creation(&record(vec![Frame::new(MethodId(9), 0)])).unwrap();
        assert_eq!(line, "c_42_U_1700000000123_<empty>\n");
    }

    #[test]
    fn test_creation_line_parses_back() {
        let host = host();
        let encoder = EventEncoder::new(FrameFormatter::new(&host, DEFAULT_TRACKER_CLASS));
        let line = encoder
            .encode_creation(&record(vec![
                Frame::new(MethodId(9), 0),
                Frame::new(MethodId(1), 10),
                Frame::new(MethodId(2), 5),
            ]))
            .unwrap();

        let WireEvent::Creation(parsed) = line.parse::<WireEvent>().unwrap() else {
            panic!("expected a creation event");
        };
        assert_eq!(parsed.id, 42);
        assert_eq!(parsed.flavor, Flavor::User);
        assert_eq!(parsed.frames.len(), 2);
    }

    #[test]
    fn test_encode_deletion_line() {
        let host = host();
        let encoder = EventEncoder::new(FrameFormatter::new(&host, DEFAULT_TRACKER_CLASS));
        assert_eq!(encoder.encode_deletion(ObjectId(7), EpochMillis(1_000)), "d_7_1000\n");
    }
}
