//! Structured error types for objtrace
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::collections::TryReserveError;

use objtrace_common::WireError;
use thiserror::Error;

/// Failures reported by host runtime services.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The runtime is not in a phase where the service is available
    #[error("host service unavailable in the current runtime phase")]
    WrongPhase,

    /// The requested debug information does not exist (no source file, no line table)
    #[error("requested information is absent")]
    AbsentInformation,

    #[error("invalid host handle: {0}")]
    InvalidHandle(String),

    #[error("host call {operation} failed: {reason}")]
    CallFailed { operation: &'static str, reason: String },
}

/// Errors raised inside the tracer core.
///
/// Every variant reaching the dispatcher is fatal: accounting integrity can
/// not be preserved once one of them occurs.
#[derive(Error, Debug)]
pub enum TracerError {
    #[error("host contract violated while trying to {context}")]
    HostContract {
        context: &'static str,
        #[source]
        source: HostError,
    },

    #[error("ran out of memory while building a trace record")]
    OutOfMemory(#[from] TryReserveError),
}

impl TracerError {
    /// Wrap a host failure with what the tracer was doing at the time.
    #[must_use]
    pub fn host(context: &'static str, source: HostError) -> Self {
        TracerError::HostContract { context, source }
    }
}

/// Invalid agent option strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("option `{0}` requires a value")]
    MissingValue(String),

    #[error("invalid value for `{key}`: {value:?} ({reason})")]
    InvalidValue { key: String, value: String, reason: String },
}

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Failed to bind collector on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse event line: {0}")]
    Parse(#[from] WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_host_contract_error_keeps_source() {
        let err = TracerError::host("tag object", HostError::InvalidHandle("object:0x10".into()));
        assert_eq!(err.to_string(), "host contract violated while trying to tag object");
        let source = err.source().expect("source should be attached");
        assert!(source.to_string().contains("object:0x10"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "port".to_string(),
            value: "http".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        assert!(err.to_string().contains("port"));
        assert!(err.to_string().contains("http"));
    }
}
