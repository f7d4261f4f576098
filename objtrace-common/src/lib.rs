//! # Shared Wire Grammar (Tracer ↔ Collector)
//!
//! Defines the line-oriented event format spoken between the tracer core
//! (which encodes events on the allocating thread) and the collector (which
//! parses them on the receiving side). Both ends depend on this crate so the
//! grammar has exactly one definition.
//!
//! ## Line Format
//!
//! ```text
//! c_<id>_<flavorCode>_<epochMillis>_<frame>,<frame>,...\n     creation
//! d_<id>_<epochMillis>\n                                      deletion
//! ```
//!
//! A frame renders as `<typeSignature>.<methodName>@<offset>[<sourceFile>:<line>]`.
//! A creation whose trace has no renderable frames carries the literal
//! [`EMPTY_FRAMES_MARKER`] in place of the frame list.
//!
//! ## Key Types
//!
//! - [`Flavor`] - When/how an allocation was observed, with its wire code
//! - [`FrameText`] - One rendered stack location
//! - [`CreationLine`] / [`DeletionLine`] - The two event shapes
//! - [`WireEvent`] - Either event, parsed from a received line

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// ============================================================================
// Grammar Constants
// ============================================================================

/// Default number of application frames captured per allocation.
pub const DEFAULT_MAX_FRAMES: usize = 5;

/// Extra frames requested from the host stack walk so that frames belonging
/// to the tracer's own instrumentation class can be dropped without losing
/// application frames.
pub const TRACER_FRAME_HEADROOM: usize = 2;

/// Frame list token for a creation event without renderable frames.
pub const EMPTY_FRAMES_MARKER: &str = "<empty>";

/// Substituted when the declaring type signature is unavailable.
pub const UNKNOWN_CLASS: &str = "UnknownClass";

/// Substituted when the method name is unavailable.
pub const UNKNOWN_METHOD: &str = "UnknownMethod";

/// Substituted when the class carries no source file attribute.
pub const UNKNOWN_FILE: &str = "UnknownFile";

const CREATION_TAG: &str = "c";
const DELETION_TAG: &str = "d";
const FIELD_SEPARATOR: char = '_';
const FRAME_SEPARATOR: char = ',';

// ============================================================================
// Errors
// ============================================================================

/// Reasons a received line does not match the grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("empty line")]
    Empty,

    #[error("unknown event tag {0:?}")]
    UnknownTag(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unknown flavor code {0:?}")]
    UnknownFlavor(String),

    #[error("malformed frame {0:?}")]
    MalformedFrame(String),
}

// ============================================================================
// Flavor
// ============================================================================

/// Classification of an allocation by the runtime-lifecycle moment and the
/// hook path that observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum Flavor {
    /// Normal post-init allocation driven by instrumented code
    User = 0,
    /// Observed before the runtime reported start
    BeforeRuntimeStart = 1,
    /// Observed after start but before the runtime finished initializing
    BeforeRuntimeInit = 2,
    /// Allocated by the runtime itself (generic allocation hook)
    RuntimeInternalObject = 3,
    /// Could not be attributed to any of the above
    Unclassified = 4,
}

impl Flavor {
    /// Number of flavors.
    pub const COUNT: usize = 5;

    /// Every flavor, in wire-code table order.
    pub const ALL: [Flavor; Flavor::COUNT] = [
        Flavor::User,
        Flavor::BeforeRuntimeStart,
        Flavor::BeforeRuntimeInit,
        Flavor::RuntimeInternalObject,
        Flavor::Unclassified,
    ];

    /// Wire code written into creation events.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Flavor::User => "U",
            Flavor::BeforeRuntimeStart => "BVS",
            Flavor::BeforeRuntimeInit => "BVI",
            Flavor::RuntimeInternalObject => "V",
            Flavor::Unclassified => "X",
        }
    }

    /// Look up a flavor by its wire code.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Flavor> {
        Flavor::ALL.into_iter().find(|flavor| flavor.code() == code)
    }

    /// Position of this flavor in [`Flavor::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Flavor {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Flavor::from_code(s).ok_or_else(|| WireError::UnknownFlavor(s.to_string()))
    }
}

// ============================================================================
// Frames
// ============================================================================

/// One rendered stack location.
///
/// Placeholders ([`UNKNOWN_CLASS`], [`UNKNOWN_METHOD`], [`UNKNOWN_FILE`],
/// line `0`) are already substituted, so every field is displayable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FrameText {
    pub type_signature: String,
    pub method_name: String,
    /// Instruction offset within the method
    pub offset: i64,
    pub source_file: String,
    pub line: u32,
}

impl FrameText {
    /// A frame with every symbol lookup unresolved.
    #[must_use]
    pub fn unresolved(offset: i64) -> Self {
        Self {
            type_signature: UNKNOWN_CLASS.to_string(),
            method_name: UNKNOWN_METHOD.to_string(),
            offset,
            source_file: UNKNOWN_FILE.to_string(),
            line: 0,
        }
    }
}

impl fmt::Display for FrameText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}@{}[{}:{}]",
            self.type_signature, self.method_name, self.offset, self.source_file, self.line
        )
    }
}

impl FromStr for FrameText {
    type Err = WireError;

    /// Parse from the right: the location block is bracketed, the offset
    /// follows the last `@`, and the method name follows the last `.`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || WireError::MalformedFrame(s.to_string());

        let body = s.strip_suffix(']').ok_or_else(malformed)?;
        let (head, location) = body.rsplit_once('[').ok_or_else(malformed)?;
        let (source_file, line) = location.rsplit_once(':').ok_or_else(malformed)?;
        let (symbol, offset) = head.rsplit_once('@').ok_or_else(malformed)?;
        let (type_signature, method_name) = symbol.rsplit_once('.').ok_or_else(malformed)?;

        Ok(Self {
            type_signature: type_signature.to_string(),
            method_name: method_name.to_string(),
            offset: offset.parse().map_err(|_| malformed())?,
            source_file: source_file.to_string(),
            line: line.parse().map_err(|_| malformed())?,
        })
    }
}

// ============================================================================
// Events
// ============================================================================

/// Creation event: identity, flavor, allocation time, rendered frames.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CreationLine {
    pub id: u64,
    pub flavor: Flavor,
    pub timestamp_ms: u64,
    pub frames: Vec<FrameText>,
}

impl fmt::Display for CreationLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{CREATION_TAG}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}",
            self.id, self.flavor, self.timestamp_ms
        )?;

        if self.frames.is_empty() {
            return f.write_str(EMPTY_FRAMES_MARKER);
        }

        for (idx, frame) in self.frames.iter().enumerate() {
            if idx > 0 {
                write!(f, "{FRAME_SEPARATOR}")?;
            }
            write!(f, "{frame}")?;
        }
        Ok(())
    }
}

/// Deletion event: identity and the time its destruction was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeletionLine {
    pub id: u64,
    pub timestamp_ms: u64,
}

impl fmt::Display for DeletionLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{DELETION_TAG}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
            self.id, self.timestamp_ms
        )
    }
}

/// A parsed wire line.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum WireEvent {
    Creation(CreationLine),
    Deletion(DeletionLine),
}

impl WireEvent {
    /// Identity carried by either event shape.
    #[must_use]
    pub fn id(&self) -> u64 {
        match self {
            WireEvent::Creation(line) => line.id,
            WireEvent::Deletion(line) => line.id,
        }
    }

    /// Event timestamp in milliseconds since the epoch.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            WireEvent::Creation(line) => line.timestamp_ms,
            WireEvent::Deletion(line) => line.timestamp_ms,
        }
    }
}

impl fmt::Display for WireEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireEvent::Creation(line) => line.fmt(f),
            WireEvent::Deletion(line) => line.fmt(f),
        }
    }
}

impl FromStr for WireEvent {
    type Err = WireError;

    /// Parse one line. A trailing `\n` / `\r\n` is ignored, as are empty
    /// entries in the frame list.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return Err(WireError::Empty);
        }

        let (tag, rest) = line.split_once(FIELD_SEPARATOR).unwrap_or((line, ""));
        match tag {
            CREATION_TAG => parse_creation(rest).map(WireEvent::Creation),
            DELETION_TAG => parse_deletion(rest).map(WireEvent::Deletion),
            other => Err(WireError::UnknownTag(other.to_string())),
        }
    }
}

fn parse_creation(rest: &str) -> Result<CreationLine, WireError> {
    let mut fields = rest.splitn(4, FIELD_SEPARATOR);

    let id = parse_number(fields.next(), "id")?;
    let flavor = fields.next().ok_or(WireError::MissingField("flavor"))?.parse()?;
    let timestamp_ms = parse_number(fields.next(), "timestamp")?;
    let frame_list = fields.next().ok_or(WireError::MissingField("frames"))?;

    let frames = if frame_list == EMPTY_FRAMES_MARKER {
        Vec::new()
    } else {
        frame_list
            .split(FRAME_SEPARATOR)
            .filter(|piece| !piece.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<FrameText>, _>>()?
    };

    Ok(CreationLine { id, flavor, timestamp_ms, frames })
}

fn parse_deletion(rest: &str) -> Result<DeletionLine, WireError> {
    let mut fields = rest.splitn(2, FIELD_SEPARATOR);
    let id = parse_number(fields.next(), "id")?;
    let timestamp_ms = parse_number(fields.next(), "timestamp")?;
    Ok(DeletionLine { id, timestamp_ms })
}

fn parse_number(field: Option<&str>, name: &'static str) -> Result<u64, WireError> {
    let value = field.filter(|v| !v.is_empty()).ok_or(WireError::MissingField(name))?;
    value.parse().map_err(|_| WireError::InvalidNumber { field: name, value: value.to_string() })
}
