//! Command-line interface for the collector binary

pub mod args;

pub use args::Args;
