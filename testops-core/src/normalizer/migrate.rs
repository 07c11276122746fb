//! Rewrite legacy marked steps of one entity into explicit
//! action / expected-result structure.

use std::collections::HashSet;

use crate::client::{EntityRef, TestOpsApi};
use crate::error::{MigrationError, Result};
use crate::logging::LogContext;
use crate::scenario::model::{ScenarioNormalized, ScenarioStep};

use super::legacy::{is_legacy_body, parse_legacy_body, LegacyStep};
use super::text::{normalize_text, StepEntry};

/// What happened to one legacy step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Body rewritten; `created` new steps were added.
    Rewritten { created: usize },
    /// Blank action: the step was removed.
    Deleted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub rewritten: usize,
    pub deleted: usize,
    pub created: usize,
    /// Marked but neither parse recognised the body.
    pub unparsed: usize,
    /// Shape is not "at most one childless child".
    pub skipped: usize,
}

/// Normalize every legacy step of `entity`, visiting steps in pre-order.
pub fn normalize_entity(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    entity: EntityRef,
) -> Result<NormalizeReport> {
    let scenario = api.get_scenario(entity)?;
    let mut report = NormalizeReport::default();
    let mut removed: HashSet<i64> = HashSet::new();

    for id in scenario.pre_order() {
        if removed.contains(&id) {
            continue;
        }
        let Some(step) = scenario.step(id) else {
            continue;
        };
        let Some(body) = step.body.as_deref().filter(|b| is_legacy_body(b)) else {
            continue;
        };
        let Some(legacy) = parse_legacy_body(body) else {
            log::debug!("{} LEGACY_UNPARSED step={}", ctx, id);
            report.unparsed += 1;
            continue;
        };
        if !scenario.has_legacy_expected_shape(step) {
            log::warn!(
                "{} LEGACY_SKIPPED step={} reason=unexpected_shape children={}",
                ctx,
                id,
                step.children.len()
            );
            report.skipped += 1;
            continue;
        }

        match apply_legacy_step(api, ctx, entity, &scenario, step, &legacy)? {
            StepOutcome::Rewritten { created } => {
                report.rewritten += 1;
                report.created += created;
            }
            StepOutcome::Deleted => {
                removed.extend(subtree(&scenario, step));
                report.deleted += 1;
            }
        }
    }

    log::info!(
        "{} NORMALIZE_COMPLETE rewritten={} deleted={} created={} unparsed={} skipped={}",
        ctx,
        report.rewritten,
        report.deleted,
        report.created,
        report.unparsed,
        report.skipped
    );
    Ok(report)
}

fn subtree(scenario: &ScenarioNormalized, step: &ScenarioStep) -> Vec<i64> {
    let mut ids = Vec::new();
    let mut pending: Vec<i64> = step.children.clone();
    pending.extend(step.expected_result_id);
    while let Some(id) = pending.pop() {
        ids.push(id);
        if let Some(child) = scenario.step(id) {
            pending.extend(child.children.iter().copied());
            pending.extend(child.expected_result_id);
        }
    }
    ids
}

/// Apply one decoded legacy step.
///
/// The step body becomes the first action entry, further action entries are
/// appended as its children and expected entries go under its expected-result
/// node, which is allocated if missing.
pub fn apply_legacy_step(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    entity: EntityRef,
    scenario: &ScenarioNormalized,
    step: &ScenarioStep,
    legacy: &LegacyStep,
) -> Result<StepOutcome> {
    let action = normalize_text(&legacy.action);
    let Some((first, rest)) = action.split_first() else {
        api.delete_step(entity, step.id)?;
        log::info!("{} LEGACY_DELETED step={} reason=blank_action", ctx, step.id);
        return Ok(StepOutcome::Deleted);
    };
    let expected = legacy
        .expected
        .as_deref()
        .map(normalize_text)
        .unwrap_or_default();
    let with_expected = !expected.is_empty();

    let updated = api.update_step(
        entity,
        step.id,
        &first.to_update(),
        with_expected.then_some(true),
    )?;
    let mut created = 0;

    let mut after = step.children.last().copied();
    for entry in rest {
        after = Some(create_entry(api, entity, entry, step.id, after)?);
        created += 1;
    }

    if with_expected {
        let updated_step = updated.step(step.id).ok_or_else(|| {
            MigrationError::unexpected(format!("step {} missing after update", step.id))
        })?;
        let expected_id = updated_step.expected_result_id.ok_or_else(|| {
            MigrationError::unexpected(format!(
                "step {} has no expected result node after update",
                step.id
            ))
        })?;
        let mut after = scenario
            .expected_children(step)
            .last()
            .copied()
            .or_else(|| updated.expected_children(updated_step).last().copied());
        for entry in &expected {
            after = Some(create_entry(api, entity, entry, expected_id, after)?);
            created += 1;
        }
    }

    log::debug!(
        "{} LEGACY_REWRITTEN step={} actions={} expected={}",
        ctx,
        step.id,
        action.len(),
        expected.len()
    );
    Ok(StepOutcome::Rewritten { created })
}

fn create_entry(
    api: &dyn TestOpsApi,
    entity: EntityRef,
    entry: &StepEntry,
    parent_id: i64,
    after: Option<i64>,
) -> Result<i64> {
    api.create_step(entity, &entry.to_create(parent_id), after, false)
        .map(|response| response.created_step_id)
}
