use objtrace_common::{FrameText, UNKNOWN_CLASS, UNKNOWN_FILE, UNKNOWN_METHOD};

use super::{line_for_offset, Lease, SymbolService};
use crate::classification::is_tracer_frame;
use crate::domain::{HostError, TracerError};
use crate::trace::{Frame, Trace};

/// Renders captured frames into wire text using host symbol services.
///
/// Stateless apart from the borrowed host and the tracker class signature;
/// one formatter can be shared by any number of threads when the host is
/// `Sync`.
pub struct FrameFormatter<'h, S: SymbolService + ?Sized> {
    symbols: &'h S,
    tracker_class: &'h str,
}

impl<'h, S: SymbolService + ?Sized> FrameFormatter<'h, S> {
    pub fn new(symbols: &'h S, tracker_class: &'h str) -> Self {
        Self { symbols, tracker_class }
    }

    /// Resolve one frame. Returns `None` for frames declared by the tracker
    /// class.
    ///
    /// # Errors
    /// Returns `TracerError::HostContract` when a required lookup fails.
    pub fn resolve(&self, frame: &Frame) -> Result<Option<FrameText>, TracerError> {
        let symbols = self.symbols;

        let class = symbols
            .declaring_class(frame.method)
            .map_err(|e| TracerError::host("get the declaring class of a frame", e))?;

        let signature = Lease::new(
            symbols,
            symbols
                .class_signature(class)
                .map_err(|e| TracerError::host("get a class signature", e))?,
        );

        if signature.as_deref().is_some_and(|sig| is_tracer_frame(sig, self.tracker_class)) {
            return Ok(None);
        }

        let method = Lease::new(
            symbols,
            symbols
                .method_symbol(frame.method)
                .map_err(|e| TracerError::host("get a method name", e))?,
        );

        let native = symbols
            .is_method_native(frame.method)
            .map_err(|e| TracerError::host("get a method's native status", e))?;

        let source_file = match symbols.source_file_name(class) {
            Ok(lookup) => Some(Lease::new(symbols, lookup)),
            Err(HostError::AbsentInformation) => None,
            Err(e) => return Err(TracerError::host("get a source file name", e)),
        };

        let line = if native {
            0
        } else {
            match symbols.line_number_table(frame.method) {
                Ok(lookup) => line_for_offset(&Lease::new(symbols, lookup), frame.offset),
                Err(HostError::AbsentInformation) => 0,
                Err(e) => return Err(TracerError::host("get a method line table", e)),
            }
        };

        Ok(Some(FrameText {
            type_signature: signature.as_deref().unwrap_or(UNKNOWN_CLASS).to_string(),
            method_name: method.name.as_deref().unwrap_or(UNKNOWN_METHOD).to_string(),
            offset: frame.offset,
            source_file: source_file
                .as_ref()
                .and_then(|file| file.as_deref())
                .unwrap_or(UNKNOWN_FILE)
                .to_string(),
            line,
        }))
    }

    /// Render one frame; tracker frames render as an empty string.
    ///
    /// # Errors
    /// Returns `TracerError::HostContract` when a required lookup fails.
    pub fn render(&self, frame: &Frame) -> Result<String, TracerError> {
        Ok(self.resolve(frame)?.map(|text| text.to_string()).unwrap_or_default())
    }

    /// Resolve every renderable frame of a trace, nearest call site first.
    ///
    /// # Errors
    /// Returns `TracerError::HostContract` when a required lookup fails.
    pub fn render_trace(&self, trace: &Trace) -> Result<Vec<FrameText>, TracerError> {
        let mut rendered = Vec::with_capacity(trace.number_of_frames());
        for frame in trace.frames() {
            if let Some(text) = self.resolve(frame)? {
                rendered.push(text);
            }
        }
        Ok(rendered)
    }
}
