//! Expected-result conversion.
//!
//! Older scenarios modelled an expected result as the single sub-step of a
//! step. A test case whose every top-level step has no expected-result node
//! and at most one childless child is converted: the child moves into the
//! step's expected-result branch. The original scenario is saved first as
//! `<backup-dir>/<id>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::client::{EntityRef, TestOpsApi};
use crate::error::{MigrationError, Result};
use crate::logging::LogContext;
use crate::pipeline::{collect_test_cases, RunContext, TaskReport};
use crate::scenario::model::{ScenarioNormalized, ScenarioStepCreate, ScenarioStepUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Converted { moved: usize },
    SkippedEmpty,
    SkippedShape,
}

pub fn is_convertible(scenario: &ScenarioNormalized) -> bool {
    scenario.top_level().iter().all(|id| {
        scenario
            .step(*id)
            .map(|step| {
                step.expected_result_id.is_none() && scenario.has_legacy_expected_shape(step)
            })
            .unwrap_or(false)
    })
}

pub fn scenario_backup_path(backup_dir: &Path, test_case_id: i64) -> PathBuf {
    backup_dir.join(format!("{}.json", test_case_id))
}

pub fn convert_test_case(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    test_case_id: i64,
    backup_dir: &Path,
) -> Result<Conversion> {
    let entity = EntityRef::test_case(test_case_id);
    let scenario = api.get_scenario(entity)?;
    if scenario.top_level().is_empty() {
        log::info!("{} CONVERT_SKIPPED reason=empty_scenario", ctx);
        return Ok(Conversion::SkippedEmpty);
    }
    if !is_convertible(&scenario) {
        log::info!("{} CONVERT_SKIPPED reason=not_single_sub_steps", ctx);
        return Ok(Conversion::SkippedShape);
    }

    let path = scenario_backup_path(backup_dir, test_case_id);
    let content = serde_json::to_vec_pretty(&scenario)?;
    fs::write(&path, content).map_err(|e| MigrationError::io(&path, e))?;
    log::debug!("{} SCENARIO_SAVED path={}", ctx, path.display());

    let mut moved = 0;
    for step_id in scenario.top_level() {
        let Some(step) = scenario.step(*step_id) else {
            continue;
        };
        let [child_id] = step.children.as_slice() else {
            continue;
        };
        let Some(child) = scenario.step(*child_id) else {
            continue;
        };

        let updated =
            api.update_step(entity, step.id, &ScenarioStepUpdate::default(), Some(true))?;
        let expected_id = updated
            .step(step.id)
            .and_then(|s| s.expected_result_id)
            .ok_or_else(|| {
                MigrationError::unexpected(format!(
                    "step {} has no expected result node after update",
                    step.id
                ))
            })?;
        let request = ScenarioStepCreate::from_step(child).under(Some(expected_id));
        api.create_step(entity, &request, None, false)?;
        api.delete_step(entity, child.id)?;
        moved += 1;
    }

    log::info!("{} CONVERT_COMPLETE moved={}", ctx, moved);
    Ok(Conversion::Converted { moved })
}

/// Convert every test case of a project matching `filter`.
pub fn convert_project(
    api: &dyn TestOpsApi,
    run: &RunContext,
    project_id: i64,
    filter: &str,
    backup_dir: &Path,
) -> Result<TaskReport> {
    fs::create_dir_all(backup_dir).map_err(|e| MigrationError::io(backup_dir, e))?;
    let ctx = run.project_log(project_id);
    let ids = collect_test_cases(api, project_id, filter, false, run.page_size)?;
    log::info!("{} CONVERT_START test_cases={}", ctx, ids.len());

    Ok(run
        .runner
        .run(&ctx, "convert expected results", ids.into_keys(), |id| {
            let ctx = ctx.with_entity(EntityRef::test_case(id));
            convert_test_case(api, &ctx, id, backup_dir).map(|_| ())
        }))
}
