//! Bulk execution plumbing.
//!
//! - `context` - per-invocation run id, worker pool and log context
//! - `runner` - bounded-concurrency fan-out with failure counting
//! - `collector` - drains paginated listings

pub mod collector;
pub mod context;
pub mod runner;

pub use collector::*;
pub use context::*;
pub use runner::*;
