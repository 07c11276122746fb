//! Audit-log driven rollback of test cases.

pub mod rollback;

pub use rollback::*;
