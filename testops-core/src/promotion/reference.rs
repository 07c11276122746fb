//! Detection of shared-step references in ordinary test cases.
//!
//! Legacy test cases point at a shared-step test case through an attachment
//! of content type `shared/json` whose content names the source id. A step
//! that could not be linked on an earlier run carries a placeholder body
//! naming the source id instead.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::client::{EntityKind, TestOpsApi};
use crate::error::Result;
use crate::logging::LogContext;
use crate::scenario::model::Attachment;
use crate::transfer::download_attachment;

pub const SHARED_STEP_CONTENT_TYPE: &str = "shared/json";
pub const POINTER_NAME_PREFIX: &str = "shared-step-";

lazy_static! {
    static ref MISSING_SHARED_STEP: Regex =
        Regex::new(r"^Missing shared step <(?P<id>\d+)> information$").unwrap();
}

/// Content of a pointer attachment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedStepPointer {
    pub test_case_id: i64,
    #[serde(default)]
    pub expand_scenario: Option<bool>,
}

pub fn missing_shared_step_body(source_id: i64) -> String {
    format!("Missing shared step <{}> information", source_id)
}

/// Source id named by a placeholder body; the whole body must match.
pub fn parse_missing_shared_step(body: &str) -> Option<i64> {
    MISSING_SHARED_STEP
        .captures(body)
        .and_then(|caps| caps["id"].parse().ok())
}

pub fn is_pointer(attachment: &Attachment) -> bool {
    attachment.content_type == SHARED_STEP_CONTENT_TYPE
}

/// Pointers named `shared-step-<id>` carry the source id in the name.
pub fn pointer_from_name(name: &str) -> Option<i64> {
    name.strip_prefix(POINTER_NAME_PREFIX)?.parse().ok()
}

/// Source test case id of a pointer attachment.
///
/// `Ok(None)` when the content cannot be downloaded; malformed content is
/// an error.
pub fn resolve_pointer(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    kind: EntityKind,
    attachment: &Attachment,
) -> Result<Option<i64>> {
    if let Some(source_id) = pointer_from_name(&attachment.name) {
        return Ok(Some(source_id));
    }
    let content = match download_attachment(api, kind, attachment.id) {
        Ok(content) => content,
        Err(e) => {
            log::warn!(
                "{} POINTER_UNREADABLE attachment={} error={}",
                ctx,
                attachment.id,
                e
            );
            return Ok(None);
        }
    };
    let pointer: SharedStepPointer = serde_json::from_slice(&content)?;
    Ok(Some(pointer.test_case_id))
}
