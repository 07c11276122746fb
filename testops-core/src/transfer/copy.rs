//! Attachment transfer between entities.
//!
//! Download the content from one entity and upload it to another. A failed
//! copy degrades to "no mapping" and is only logged.

use std::io::Read;

use crate::client::{EntityKind, EntityRef, TestOpsApi};
use crate::error::{MigrationError, Result};
use crate::logging::LogContext;
use crate::pipeline::collect_attachments;
use crate::scenario::model::Attachment;

use super::remap::AttachmentRemap;

/// Read the whole content of an attachment.
pub fn download_attachment(
    api: &dyn TestOpsApi,
    kind: EntityKind,
    attachment_id: i64,
) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    api.get_attachment_content(kind, attachment_id)?
        .read_to_end(&mut content)
        .map_err(|e| MigrationError::io(format!("attachment-{}", attachment_id), e))?;
    Ok(content)
}

/// Upload content under `destination` with the metadata of `attachment`.
/// Returns the id of the created attachment.
pub fn upload_attachment(
    api: &dyn TestOpsApi,
    destination: EntityRef,
    attachment: &Attachment,
    content: Vec<u8>,
) -> Result<i64> {
    let created = api.create_attachment(
        destination,
        &attachment.name,
        &attachment.content_type,
        content,
    )?;
    created.first().map(|a| a.id).ok_or_else(|| {
        MigrationError::unexpected(format!(
            "upload of attachment {} to {} returned nothing",
            attachment.id, destination
        ))
    })
}

/// Copy one attachment from `source` to `destination`.
pub fn copy_attachment(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    source: EntityRef,
    attachment: &Attachment,
    destination: EntityRef,
) -> Option<i64> {
    let copied = download_attachment(api, source.kind, attachment.id)
        .and_then(|content| upload_attachment(api, destination, attachment, content));
    match copied {
        Ok(new_id) => {
            log::debug!(
                "{} ATTACHMENT_COPIED attachment={} new_attachment={} destination={}",
                ctx,
                attachment.id,
                new_id,
                destination
            );
            Some(new_id)
        }
        Err(e) => {
            log::warn!(
                "{} ATTACHMENT_COPY_FAILED attachment={} destination={} error={}",
                ctx,
                attachment.id,
                destination,
                e
            );
            None
        }
    }
}

/// Copy every attachment of `source` to `destination`.
///
/// Failing to list the source attachments is an error; a failed single
/// copy only leaves that id out of the table.
pub fn copy_attachments(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    source: EntityRef,
    destination: EntityRef,
    page_size: i32,
) -> Result<AttachmentRemap> {
    let mut remap = AttachmentRemap::new();
    let attachments = collect_attachments(api, source, page_size)?;
    for attachment in &attachments {
        if let Some(new_id) = copy_attachment(api, ctx, source, attachment, destination) {
            remap.record(attachment.id, new_id);
        }
    }
    log::info!(
        "{} ATTACHMENTS_COPIED source={} destination={} copied={} failed={}",
        ctx,
        source,
        destination,
        remap.len(),
        attachments.len() - remap.len()
    );
    Ok(remap)
}
