//! Structured logging with run context.
//!
//! Every log line carries the run id and, where known, the project and entity
//! being processed so lines from parallel workers can be correlated.

pub mod structured;

pub use structured::*;
