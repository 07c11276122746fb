//! Write entities to a local backup directory.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use chrono::Utc;

use crate::client::{CustomFieldValue, EntityKind, EntityRef, TestOpsApi};
use crate::error::{MigrationError, Result};
use crate::logging::LogContext;
use crate::pipeline::{collect_attachments, RunContext, TaskReport};
use crate::scenario::model::Attachment;

use super::layout::{attachment_path, entity_dir, BackedUpAttachment, BackupDocument, DigestWriter, EntityPatch};

fn fetch_patch(api: &dyn TestOpsApi, entity: EntityRef) -> Result<EntityPatch> {
    Ok(match entity.kind {
        EntityKind::TestCase => EntityPatch::TestCase((&api.get_test_case(entity.id)?).into()),
        EntityKind::SharedStep => {
            EntityPatch::SharedStep((&api.get_shared_step(entity.id)?).into())
        }
    })
}

fn fetch_custom_fields(
    api: &dyn TestOpsApi,
    entity: EntityRef,
) -> Result<Option<Vec<CustomFieldValue>>> {
    match entity.kind {
        EntityKind::TestCase => api.get_custom_fields(entity.id).map(Some),
        EntityKind::SharedStep => Ok(None),
    }
}

/// Stream one attachment to its file, digesting it on the way.
fn store_attachment(
    api: &dyn TestOpsApi,
    root: &Path,
    entity: EntityRef,
    meta: Attachment,
) -> Result<BackedUpAttachment> {
    let path = attachment_path(root, entity, meta.id);
    let mut content = api.get_attachment_content(entity.kind, meta.id)?;
    let file = File::create(&path).map_err(|e| MigrationError::io(&path, e))?;
    let mut writer = DigestWriter::new(io::BufWriter::new(file));
    io::copy(&mut content, &mut writer).map_err(|e| MigrationError::io(&path, e))?;
    let sha256 = writer.finish().map_err(|e| MigrationError::io(&path, e))?;
    Ok(BackedUpAttachment { meta, sha256 })
}

/// Back up one entity: metadata, scenario and every attachment.
pub fn backup_entity(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    root: &Path,
    entity: EntityRef,
    page_size: i32,
) -> Result<BackupDocument> {
    let patch = fetch_patch(api, entity)?;
    let custom_fields = fetch_custom_fields(api, entity)?;
    let scenario = api.get_scenario(entity)?;
    let listed = collect_attachments(api, entity, page_size)?;

    let dir = entity_dir(root, entity);
    fs::create_dir_all(&dir).map_err(|e| MigrationError::io(&dir, e))?;

    let mut attachments = Vec::with_capacity(listed.len());
    for meta in listed {
        attachments.push(store_attachment(api, root, entity, meta)?);
    }

    let document = BackupDocument {
        id: entity.id,
        created_at: Utc::now(),
        patch,
        scenario,
        attachments,
        custom_fields,
    };
    let path = document.save(root)?;
    log::info!(
        "{} BACKUP_WRITTEN path={} steps={} attachments={}",
        ctx,
        path.display(),
        document.scenario.scenario_steps.len(),
        document.attachments.len()
    );
    Ok(document)
}

/// Back up every id on the worker pool.
pub fn backup_entities(
    api: &dyn TestOpsApi,
    run: &RunContext,
    root: &Path,
    kind: EntityKind,
    ids: &[i64],
) -> Result<TaskReport> {
    fs::create_dir_all(root).map_err(|e| MigrationError::io(root, e))?;
    let ctx = run.log();
    Ok(run.runner.run(&ctx, "backup", ids.iter().copied(), |id| {
        let entity = match kind {
            EntityKind::TestCase => EntityRef::test_case(id),
            EntityKind::SharedStep => EntityRef::shared_step(id),
        };
        backup_entity(api, &ctx.with_entity(entity), root, entity, run.page_size).map(|_| ())
    }))
}
