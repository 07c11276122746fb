//! Backup and restore of test cases and shared steps.
//!
//! - `layout` - directory layout and the per-entity JSON document
//! - `backup` - writing entities to disk
//! - `restore` - full replacement of an entity from disk

#[allow(clippy::module_inception)]
pub mod backup;
pub mod layout;
pub mod restore;

pub use backup::{backup_entities, backup_entity};
pub use layout::{BackedUpAttachment, BackupDocument, EntityPatch};
pub use restore::{restore_entities, restore_entity, RestoreReport};
