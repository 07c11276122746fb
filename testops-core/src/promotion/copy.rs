//! Copy a scenario, with its attachments, into another entity.
//!
//! The destination is cleared first so a copy can be repeated and always
//! produces the same content.

use crate::client::{EntityRef, TestOpsApi};
use crate::error::Result;
use crate::logging::LogContext;
use crate::scenario::{clear_content, recreate_tree};
use crate::transfer::copy_attachments;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub steps: usize,
    pub attachments: usize,
    pub missing_attachments: usize,
}

pub fn copy_scenario(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    source: EntityRef,
    destination: EntityRef,
    page_size: i32,
) -> Result<CopyReport> {
    let mut scenario = api.get_scenario(source)?;
    clear_content(api, ctx, destination, page_size)?;
    let remap = copy_attachments(api, ctx, source, destination, page_size)?;
    let missing = remap.rewrite(&mut scenario);
    if !missing.is_empty() {
        log::warn!(
            "{} ATTACHMENTS_MISSING source={} attachments={:?}",
            ctx,
            source,
            missing
        );
    }
    let created = recreate_tree(api, ctx, destination, &scenario)?;

    Ok(CopyReport {
        steps: created.len(),
        attachments: remap.len(),
        missing_attachments: missing.len(),
    })
}
