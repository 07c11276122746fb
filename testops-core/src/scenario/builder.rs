//! Recreate a scenario tree on an entity.
//!
//! Step ids are assigned by the service on creation, so the parent id of a
//! level is only known once its owner has been created. Pending levels sit
//! on an explicit stack; each level remembers the last sibling it created so
//! the next one is placed after it.

use std::collections::{BTreeMap, VecDeque};

use crate::client::{EntityRef, TestOpsApi};
use crate::error::{MigrationError, Result};
use crate::logging::LogContext;
use crate::pipeline::collect_attachments;

use super::model::{ScenarioNormalized, ScenarioStepCreate};

struct PendingLevel {
    parent: Option<i64>,
    queue: VecDeque<i64>,
    after: Option<i64>,
}

impl PendingLevel {
    fn new(parent: Option<i64>, children: &[i64]) -> Self {
        Self {
            parent,
            queue: children.iter().copied().collect(),
            after: None,
        }
    }
}

/// Create every step of `source` under `entity` in pre-order.
///
/// A step's expected-result branch is created right after the step and
/// before its ordinary children. Returns source id -> created id, including
/// expected-result nodes.
pub fn recreate_tree(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    entity: EntityRef,
    source: &ScenarioNormalized,
) -> Result<BTreeMap<i64, i64>> {
    let mut created_ids = BTreeMap::new();
    let mut stack = vec![PendingLevel::new(None, source.top_level())];

    while let Some(level) = stack.last_mut() {
        let Some(source_id) = level.queue.pop_front() else {
            stack.pop();
            continue;
        };
        let Some(step) = source.step(source_id) else {
            log::warn!("{} STEP_MISSING source_step={}", ctx, source_id);
            continue;
        };

        let request = ScenarioStepCreate::from_step(step).under(level.parent);
        let with_expected = step.expected_result_id.is_some();
        let response = api.create_step(entity, &request, level.after, with_expected)?;
        let created = response.created_step_id;
        level.after = Some(created);
        created_ids.insert(source_id, created);
        log::debug!(
            "{} STEP_CREATED source_step={} step={}",
            ctx,
            source_id,
            created
        );

        // LIFO: push ordinary children first so the expected branch runs first.
        if !step.children.is_empty() {
            stack.push(PendingLevel::new(Some(created), &step.children));
        }
        if let Some(source_expected) = step.expected_result_id {
            let expected = response
                .scenario
                .step(created)
                .and_then(|s| s.expected_result_id)
                .ok_or_else(|| {
                    MigrationError::unexpected(format!(
                        "step {} was created without an expected result node",
                        created
                    ))
                })?;
            created_ids.insert(source_expected, expected);
            let branch = source
                .step(source_expected)
                .map(|s| s.children.as_slice())
                .unwrap_or(&[]);
            if !branch.is_empty() {
                stack.push(PendingLevel::new(Some(expected), branch));
            }
        }
    }
    Ok(created_ids)
}

/// Delete all top-level steps and all attachments of `entity`.
pub fn clear_content(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    entity: EntityRef,
    page_size: i32,
) -> Result<()> {
    let scenario = api.get_scenario(entity)?;
    for step_id in scenario.top_level() {
        api.delete_step(entity, *step_id)?;
    }
    let attachments = collect_attachments(api, entity, page_size)?;
    for attachment in &attachments {
        api.delete_attachment(entity.kind, attachment.id)?;
    }
    log::debug!(
        "{} CONTENT_CLEARED steps={} attachments={}",
        ctx,
        scenario.top_level().len(),
        attachments.len()
    );
    Ok(())
}
