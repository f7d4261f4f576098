//! # Symbol Resolution
//!
//! Turns a captured [`Frame`](crate::trace::Frame) (method id + instruction
//! offset) into the declaring type, method name, source file and line that
//! end up on the wire.
//!
//! ## The Host Seam
//!
//! The tracer never reads class files or debug info itself. Every lookup goes
//! through the host's [`SymbolService`]:
//!
//! ```text
//! method id ──► declaring class ──► type signature
//!     │                       └──► source file name
//!     ├──► method name / signature
//!     ├──► native flag
//!     └──► line number table ──► line for offset
//! ```
//!
//! ## Lookup Handles
//!
//! Strings and tables returned by the host live in host-owned memory and
//! must be handed back once read. Each such result arrives as a [`Lookup`]
//! carrying a [`LookupHandle`]. The formatter wraps every lookup in a
//! [`Lease`] that releases the handle on drop, so handles are returned on
//! every exit path: success, tracer-frame skip, or a fatal lookup error.
//!
//! ## Missing Information
//!
//! Native methods have no line table, and classes compiled without debug
//! info have no source file. The host reports these as
//! [`HostError::AbsentInformation`](crate::domain::HostError::AbsentInformation);
//! the formatter substitutes placeholders. Any other host failure is a
//! contract violation.

pub mod frame_formatter;

use std::ops::Deref;

use crate::domain::{ClassRef, HostError, MethodId};

pub use frame_formatter::FrameFormatter;

/// Host token identifying memory that must be released after use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupHandle(pub u64);

/// A host lookup result plus the handle backing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup<T> {
    /// `None` when the host allocated nothing for this result
    pub handle: Option<LookupHandle>,
    pub value: T,
}

impl<T> Lookup<T> {
    #[must_use]
    pub fn new(handle: LookupHandle, value: T) -> Self {
        Self { handle: Some(handle), value }
    }

    /// A result that needs no release.
    #[must_use]
    pub fn unbacked(value: T) -> Self {
        Self { handle: None, value }
    }
}

/// Method name and descriptor, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodSymbol {
    pub name: Option<String>,
    pub signature: Option<String>,
}

/// One row of a method's line number table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEntry {
    /// First instruction offset covered by this line
    pub start_offset: i64,
    pub line: u32,
}

/// Symbol resolution services supplied by the host runtime.
pub trait SymbolService {
    /// Class that declares `method`.
    ///
    /// # Errors
    /// Any error is a host contract violation.
    fn declaring_class(&self, method: MethodId) -> Result<ClassRef, HostError>;

    /// Type signature of `class` (e.g. `Ljava/lang/String;`).
    ///
    /// # Errors
    /// Any error is a host contract violation.
    fn class_signature(&self, class: ClassRef) -> Result<Lookup<Option<String>>, HostError>;

    /// Name and descriptor of `method`.
    ///
    /// # Errors
    /// Any error is a host contract violation.
    fn method_symbol(&self, method: MethodId) -> Result<Lookup<MethodSymbol>, HostError>;

    /// Whether `method` is implemented natively (and so has no line table).
    ///
    /// # Errors
    /// Any error is a host contract violation.
    fn is_method_native(&self, method: MethodId) -> Result<bool, HostError>;

    /// Source file attribute of `class`.
    ///
    /// # Errors
    /// `AbsentInformation` when the class carries no source file; anything
    /// else is a host contract violation.
    fn source_file_name(&self, class: ClassRef) -> Result<Lookup<Option<String>>, HostError>;

    /// Line number table of `method`.
    ///
    /// # Errors
    /// `AbsentInformation` when the method has no line table; anything else
    /// is a host contract violation.
    fn line_number_table(&self, method: MethodId) -> Result<Lookup<Vec<LineEntry>>, HostError>;

    /// Return host memory obtained through a lookup.
    fn release(&self, handle: LookupHandle);
}

/// Scoped ownership of a [`Lookup`]: the handle is released when the lease drops.
pub struct Lease<'h, S: SymbolService + ?Sized, T> {
    service: &'h S,
    handle: Option<LookupHandle>,
    value: T,
}

impl<'h, S: SymbolService + ?Sized, T> Lease<'h, S, T> {
    pub fn new(service: &'h S, lookup: Lookup<T>) -> Self {
        Self { service, handle: lookup.handle, value: lookup.value }
    }
}

impl<S: SymbolService + ?Sized, T> Deref for Lease<'_, S, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<S: SymbolService + ?Sized, T> Drop for Lease<'_, S, T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.service.release(handle);
        }
    }
}

/// Line number covering `offset`: the last entry whose start is not past
/// `offset`, or the first entry when `offset` precedes them all. An empty
/// table yields 0.
#[must_use]
pub fn line_for_offset(table: &[LineEntry], offset: i64) -> u32 {
    let Some(first) = table.first() else {
        return 0;
    };

    let mut line = first.line;
    for entry in &table[1..] {
        if offset < entry.start_offset {
            break;
        }
        line = entry.line;
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<LineEntry> {
        vec![
            LineEntry { start_offset: 0, line: 10 },
            LineEntry { start_offset: 4, line: 11 },
            LineEntry { start_offset: 9, line: 14 },
        ]
    }

    #[test]
    fn test_line_for_offset_picks_covering_entry() {
        let table = table();
        assert_eq!(line_for_offset(&table, 0), 10);
        assert_eq!(line_for_offset(&table, 3), 10);
        assert_eq!(line_for_offset(&table, 4), 11);
        assert_eq!(line_for_offset(&table, 8), 11);
        assert_eq!(line_for_offset(&table, 200), 14);
    }

    #[test]
    fn test_line_for_offset_before_first_entry() {
        let table = vec![LineEntry { start_offset: 5, line: 30 }, LineEntry { start_offset: 8, line: 31 }];
        assert_eq!(line_for_offset(&table, 1), 30);
    }

    #[test]
    fn test_line_for_offset_empty_table() {
        assert_eq!(line_for_offset(&[], 12), 0);
    }
}
