//! Legacy-format step normalizer.
//!
//! - `legacy` - decoding of marked `{action, expected}` bodies
//! - `text` - splitting free text into text and attachment entries
//! - `migrate` - rewriting one entity's legacy steps in place
//! - `expected` - converting single sub-steps into expected results

pub mod expected;
pub mod legacy;
pub mod migrate;
pub mod text;

pub use expected::*;
pub use legacy::*;
pub use migrate::*;
pub use text::*;
