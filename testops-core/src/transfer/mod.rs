//! Attachment transfer and id remapping.

pub mod copy;
pub mod remap;

pub use copy::*;
pub use remap::*;
