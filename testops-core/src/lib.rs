//! TestOps Core - Scenario migration for Allure TestOps
//!
//! This crate migrates test-case scenarios inside a test-management service:
//! it promotes legacy shared-step test cases into real shared steps, rewrites
//! legacy expected-result markup into the native tree shape, and backs up,
//! restores and rolls back test cases. The implementation prioritizes:
//!
//! 1. **Idempotence** - every phase can be re-run safely after a failure
//! 2. **Logging** - every decision point logged with run and entity context
//! 3. **Throughput** - bounded parallel workers over a blocking client
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `pipeline` - Bulk Task Runner, Paginated Collector and run context
//! - `client` - the remote service seam and its HTTP implementation
//! - `scenario` - step tree model, navigation and recreation
//! - `normalizer` - legacy expected-result markup rewriting
//! - `promotion` - Shared-Step Promotion Engine and registry
//! - `transfer` - attachment copy and id remapping
//! - `backup` - backup and restore of entities on disk
//! - `audit` - audit-log driven rollback
//! - `logging` - Structured logging with run context

pub mod audit;
pub mod backup;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod meta;
pub mod normalizer;
pub mod pipeline;
pub mod promotion;
pub mod scenario;
pub mod transfer;

pub use cli::{Cli, Commands};
pub use config::ClientConfig;
pub use error::{MigrationError, Result};
