//! Domain model for objtrace
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time separation of host handles from tracer identities
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{ClassRef, EpochMillis, MethodId, ObjectId, ObjectRef, ThreadRef, TypeRef};

pub use errors::{CollectorError, ConfigError, HostError, TracerError};
