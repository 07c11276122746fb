//! On-disk layout of a backup.
//!
//! ```text
//! <root>/tc-<id>/testcase.json
//! <root>/tc-<id>/attachment-<attachment id>
//! <root>/ss-<id>/sharedstep.json
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::client::{CustomFieldValue, EntityKind, EntityRef, SharedStepPatch, TestCasePatch};
use crate::error::{MigrationError, Result};
use crate::scenario::model::{Attachment, ScenarioNormalized};

const ATTACHMENT_PREFIX: &str = "attachment-";

fn document_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::TestCase => "testcase.json",
        EntityKind::SharedStep => "sharedstep.json",
    }
}

pub fn entity_dir(root: &Path, entity: EntityRef) -> PathBuf {
    root.join(entity.to_string())
}

pub fn document_path(root: &Path, entity: EntityRef) -> PathBuf {
    entity_dir(root, entity).join(document_name(entity.kind))
}

pub fn attachment_path(root: &Path, entity: EntityRef, attachment_id: i64) -> PathBuf {
    entity_dir(root, entity).join(format!("{}{}", ATTACHMENT_PREFIX, attachment_id))
}

/// Hex SHA-256 of attachment content.
pub fn digest(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Writer that digests everything passing through it.
pub struct DigestWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Flush the inner writer and return the hex digest.
    pub fn finish(mut self) -> io::Result<String> {
        self.inner.flush()?;
        Ok(hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Ids of every entity of `kind` with a backup document under `root`.
pub fn backed_up_ids(root: &Path, kind: EntityKind) -> Result<Vec<i64>> {
    let prefix = format!("{}-", kind.prefix());
    let entries = fs::read_dir(root).map_err(|e| MigrationError::io(root, e))?;
    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MigrationError::io(root, e))?;
        let name = entry.file_name();
        let Some(id) = name
            .to_str()
            .and_then(|n| n.strip_prefix(&prefix))
            .and_then(|n| n.parse::<i64>().ok())
        else {
            continue;
        };
        let entity = match kind {
            EntityKind::TestCase => EntityRef::test_case(id),
            EntityKind::SharedStep => EntityRef::shared_step(id),
        };
        if document_path(root, entity).is_file() {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Patchable metadata of the backed-up entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntityPatch {
    TestCase(TestCasePatch),
    SharedStep(SharedStepPatch),
}

impl EntityPatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityPatch::TestCase(_) => EntityKind::TestCase,
            EntityPatch::SharedStep(_) => EntityKind::SharedStep,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackedUpAttachment {
    pub meta: Attachment,
    pub sha256: String,
}

/// JSON document written for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub patch: EntityPatch,
    pub scenario: ScenarioNormalized,
    #[serde(default)]
    pub attachments: Vec<BackedUpAttachment>,
    /// Test cases only. Absent in older backups, which leave fields as they are.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Vec<CustomFieldValue>>,
}

impl BackupDocument {
    pub fn entity(&self) -> EntityRef {
        match self.patch.kind() {
            EntityKind::TestCase => EntityRef::test_case(self.id),
            EntityKind::SharedStep => EntityRef::shared_step(self.id),
        }
    }

    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        let path = document_path(root, self.entity());
        let content = serde_json::to_vec_pretty(self)?;
        fs::write(&path, content).map_err(|e| MigrationError::io(&path, e))?;
        Ok(path)
    }

    pub fn load(root: &Path, entity: EntityRef) -> Result<Self> {
        let path = document_path(root, entity);
        let content = fs::read(&path).map_err(|e| MigrationError::io(&path, e))?;
        let document: Self = serde_json::from_slice(&content)?;
        if document.entity() != entity {
            return Err(MigrationError::unexpected(format!(
                "{} holds a backup of {}",
                path.display(),
                document.entity()
            )));
        }
        Ok(document)
    }
}
