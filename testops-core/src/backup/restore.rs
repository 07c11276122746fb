//! Restore entities from a local backup directory.
//!
//! A restore fully replaces the destination: its attachments and scenario
//! are deleted and recreated from the backup, then the metadata is patched.

use std::fs;
use std::path::Path;

use crate::client::{EntityKind, EntityRef, TestOpsApi};
use crate::error::{MigrationError, Result};
use crate::logging::LogContext;
use crate::pipeline::{collect_attachments, RunContext, TaskReport};
use crate::scenario::recreate_tree;
use crate::transfer::{upload_attachment, AttachmentRemap};

use super::layout::{attachment_path, backed_up_ids, digest, BackedUpAttachment, BackupDocument, EntityPatch};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub steps: usize,
    pub attachments: usize,
    pub missing_attachments: usize,
}

fn read_verified(root: &Path, entity: EntityRef, attachment: &BackedUpAttachment) -> Result<Vec<u8>> {
    let path = attachment_path(root, entity, attachment.meta.id);
    let content = fs::read(&path).map_err(|e| MigrationError::io(&path, e))?;
    let actual = digest(&content);
    if actual != attachment.sha256 {
        return Err(MigrationError::unexpected(format!(
            "{} has digest {}, backup recorded {}",
            path.display(),
            actual,
            attachment.sha256
        )));
    }
    Ok(content)
}

fn upload_backed_up(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    root: &Path,
    entity: EntityRef,
    document: &BackupDocument,
) -> AttachmentRemap {
    let mut remap = AttachmentRemap::new();
    for attachment in &document.attachments {
        let uploaded = read_verified(root, entity, attachment)
            .and_then(|content| upload_attachment(api, entity, &attachment.meta, content));
        match uploaded {
            Ok(new_id) => remap.record(attachment.meta.id, new_id),
            Err(e) => log::warn!(
                "{} ATTACHMENT_RESTORE_FAILED attachment={} error={}",
                ctx,
                attachment.meta.id,
                e
            ),
        }
    }
    remap
}

/// Restore one entity from its backup under `root`.
pub fn restore_entity(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    root: &Path,
    entity: EntityRef,
    page_size: i32,
) -> Result<RestoreReport> {
    let document = BackupDocument::load(root, entity)?;

    // [1] ATTACHMENTS: full replace
    for attachment in collect_attachments(api, entity, page_size)? {
        api.delete_attachment(entity.kind, attachment.id)?;
    }
    let remap = upload_backed_up(api, ctx, root, entity, &document);

    // [2] SCENARIO
    let mut scenario = document.scenario.clone();
    let missing = remap.rewrite(&mut scenario);
    if !missing.is_empty() {
        log::warn!("{} ATTACHMENTS_MISSING attachments={:?}", ctx, missing);
    }
    api.delete_scenario(entity)?;
    let created = recreate_tree(api, ctx, entity, &scenario)?;

    // [3] METADATA
    match &document.patch {
        EntityPatch::TestCase(patch) => api.update_test_case(entity.id, patch)?,
        EntityPatch::SharedStep(patch) => api.update_shared_step(entity.id, patch)?,
    }
    if let Some(fields) = &document.custom_fields {
        log::info!("{} CUSTOM_FIELDS_RESTORED fields={}", ctx, fields.len());
        api.set_custom_fields(entity.id, fields)?;
    }

    let report = RestoreReport {
        steps: created.len(),
        attachments: remap.len(),
        missing_attachments: missing.len(),
    };
    log::info!(
        "{} RESTORE_COMPLETE steps={} attachments={} missing_attachments={}",
        ctx,
        report.steps,
        report.attachments,
        report.missing_attachments
    );
    Ok(report)
}

/// Restore the given ids, or every backed-up entity of `kind` when none
/// are given.
pub fn restore_entities(
    api: &dyn TestOpsApi,
    run: &RunContext,
    root: &Path,
    kind: EntityKind,
    ids: &[i64],
) -> Result<TaskReport> {
    let ids = if ids.is_empty() {
        backed_up_ids(root, kind)?
    } else {
        ids.to_vec()
    };
    let ctx = run.log();
    Ok(run.runner.run(&ctx, "restore", ids, |id| {
        let entity = match kind {
            EntityKind::TestCase => EntityRef::test_case(id),
            EntityKind::SharedStep => EntityRef::shared_step(id),
        };
        restore_entity(api, &ctx.with_entity(entity), root, entity, run.page_size).map(|_| ())
    }))
}
