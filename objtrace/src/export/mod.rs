//! Event export
//!
//! Encodes creation and destruction notifications into the line protocol
//! read by the collector. The grammar itself lives in `objtrace-common` so the
//! collector parses exactly what the tracer writes.

pub mod event_encoder;

pub use event_encoder::EventEncoder;
