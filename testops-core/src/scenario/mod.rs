//! Scenario tree model.
//!
//! - `model` - wire representation of steps, attachments and step requests
//! - `tree` - navigation and invariant checks
//! - `builder` - recreating a tree on a remote entity

pub mod builder;
pub mod model;
pub mod tree;

pub use builder::*;
pub use model::*;
pub use tree::*;
