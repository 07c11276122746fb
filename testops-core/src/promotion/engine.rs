//! Shared-Step Promotion Engine.
//!
//! Legacy projects modelled shared steps as test cases in a dedicated layer,
//! referenced from ordinary test cases through pointer attachments. A
//! project is migrated in four phases, each one Bulk Task Runner call with a
//! barrier in between:
//!
//! 1. normalize legacy expected-result steps of every test case
//! 2. promote each shared-layer test case into a real shared step
//! 3. rewire ordinary test cases to reference the promoted shared steps
//! 4. delete the promoted legacy test cases
//!
//! Rewiring only starts once every promotion has finished, because a test
//! case may reference a shared step whose promotion runs later in phase 2.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;

use crate::client::{EntityRef, SharedStepCreate, TestOpsApi};
use crate::config::DEFAULT_SHARED_LAYERS;
use crate::error::Result;
use crate::logging::LogContext;
use crate::meta::MetaStore;
use crate::normalizer::normalize_entity;
use crate::pipeline::{collect_projects, collect_test_cases, RunContext, TaskReport};
use crate::scenario::model::ScenarioStepUpdate;

use super::copy::copy_scenario;
use super::reference::{
    is_pointer, missing_shared_step_body, parse_missing_shared_step, resolve_pointer,
};
use super::registry::SharedStepRegistry;

pub const PHASE_NORMALIZE: &str = "normalize expected results";
pub const PHASE_PROMOTE: &str = "promote shared steps";
pub const PHASE_REWIRE: &str = "rewire test cases";
pub const PHASE_CLEANUP: &str = "delete legacy shared steps";

fn layer_list(layers: &[String]) -> String {
    layers
        .iter()
        .map(|layer| format!("\"{}\"", layer.replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Filter selecting legacy shared-step test cases.
pub fn shared_filter(layers: &[String]) -> String {
    format!("layer in [{}]", layer_list(layers))
}

/// Filter selecting ordinary test cases.
pub fn ordinary_filter(layers: &[String]) -> String {
    format!("not {}", shared_filter(layers))
}

pub fn default_layers() -> Vec<String> {
    DEFAULT_SHARED_LAYERS.iter().map(|l| l.to_string()).collect()
}

/// Changes made to one ordinary test case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewireReport {
    /// Pointer steps turned into references.
    pub linked: usize,
    /// Pointer steps whose source has no promoted shared step yet.
    pub placeholders: usize,
    /// Placeholders from an earlier run now resolved.
    pub resolved: usize,
    /// Placeholders still without a mapping.
    pub unresolved: usize,
}

#[derive(Debug, Clone)]
pub struct ProjectReport {
    pub project_id: i64,
    pub test_cases: usize,
    pub shared_sources: usize,
    pub phases: Vec<TaskReport>,
}

impl ProjectReport {
    pub fn errors(&self) -> usize {
        self.phases.iter().map(|p| p.errors).sum()
    }
}

pub struct PromotionEngine<'a> {
    api: &'a dyn TestOpsApi,
    run: &'a RunContext,
    registry: &'a SharedStepRegistry,
    layers: Vec<String>,
}

impl<'a> PromotionEngine<'a> {
    pub fn new(
        api: &'a dyn TestOpsApi,
        run: &'a RunContext,
        registry: &'a SharedStepRegistry,
        layers: Vec<String>,
    ) -> Self {
        Self {
            api,
            run,
            registry,
            layers,
        }
    }

    /// Promote one legacy shared-step test case and return the id of its
    /// shared step. Safe to repeat: an existing mapping is reused and its
    /// content recopied.
    pub fn promote(&self, ctx: &LogContext, project_id: i64, source_id: i64) -> Result<i64> {
        let shared_step_id = match self.registry.get(source_id) {
            Some(existing) => {
                log::info!(
                    "{} PROMOTE_REUSE source={} shared_step={}",
                    ctx,
                    source_id,
                    existing
                );
                existing
            }
            None => {
                let source = self.api.get_test_case(source_id)?;
                let created = self.api.create_shared_step(&SharedStepCreate {
                    name: source.name,
                    project_id,
                })?;
                let winner = self.registry.claim(source_id, created.id);
                if winner != created.id {
                    log::warn!(
                        "{} PROMOTE_RACE_LOST source={} created={} registered={}",
                        ctx,
                        source_id,
                        created.id,
                        winner
                    );
                }
                winner
            }
        };

        let report = copy_scenario(
            self.api,
            ctx,
            EntityRef::test_case(source_id),
            EntityRef::shared_step(shared_step_id),
            self.run.page_size,
        )?;
        log::info!(
            "{} PROMOTE_COMPLETE source={} shared_step={} steps={} attachments={} missing_attachments={}",
            ctx,
            source_id,
            shared_step_id,
            report.steps,
            report.attachments,
            report.missing_attachments
        );
        Ok(shared_step_id)
    }

    /// Replace pointer steps and earlier placeholders of one ordinary test
    /// case with references to promoted shared steps.
    pub fn rewire(&self, ctx: &LogContext, test_case_id: i64) -> Result<RewireReport> {
        let entity = EntityRef::test_case(test_case_id);
        let scenario = self.api.get_scenario(entity)?;
        let mut report = RewireReport::default();

        // [1] POINTER ATTACHMENTS
        for attachment in scenario.attachments.values().filter(|a| is_pointer(a)) {
            let Some(step) = scenario.step_with_attachment(attachment.id) else {
                log::debug!("{} POINTER_UNUSED attachment={}", ctx, attachment.id);
                continue;
            };
            let Some(source_id) = resolve_pointer(self.api, ctx, entity.kind, attachment)? else {
                continue;
            };
            match self.registry.get(source_id) {
                Some(shared_step_id) => {
                    self.api.update_step(
                        entity,
                        step.id,
                        &ScenarioStepUpdate::reference(shared_step_id),
                        None,
                    )?;
                    report.linked += 1;
                }
                None => {
                    log::warn!(
                        "{} SHARED_STEP_MISSING step={} source={}",
                        ctx,
                        step.id,
                        source_id
                    );
                    // The pointer is dropped; later runs resolve the placeholder.
                    let placeholder = ScenarioStepUpdate {
                        attachment_id: Some(None),
                        ..ScenarioStepUpdate::body(missing_shared_step_body(source_id))
                    };
                    self.api.update_step(entity, step.id, &placeholder, None)?;
                    report.placeholders += 1;
                }
            }
        }

        // [2] PLACEHOLDERS LEFT BY EARLIER RUNS
        for step in scenario.scenario_steps.values() {
            let Some(source_id) = step.body.as_deref().and_then(parse_missing_shared_step) else {
                continue;
            };
            match self.registry.get(source_id) {
                Some(shared_step_id) => {
                    self.api.update_step(
                        entity,
                        step.id,
                        &ScenarioStepUpdate::reference(shared_step_id),
                        None,
                    )?;
                    report.resolved += 1;
                }
                None => report.unresolved += 1,
            }
        }

        log::debug!(
            "{} REWIRE_COMPLETE linked={} placeholders={} resolved={} unresolved={}",
            ctx,
            report.linked,
            report.placeholders,
            report.resolved,
            report.unresolved
        );
        Ok(report)
    }

    pub fn migrate_project(&self, project_id: i64) -> Result<ProjectReport> {
        let ctx = self.run.project_log(project_id);
        let page_size = self.run.page_size;
        let runner = &self.run.runner;

        let ordinary = collect_test_cases(
            self.api,
            project_id,
            &ordinary_filter(&self.layers),
            false,
            page_size,
        )?;
        let shared = collect_test_cases(
            self.api,
            project_id,
            &shared_filter(&self.layers),
            true,
            page_size,
        )?;
        log::info!(
            "{} PROJECT_START test_cases={} shared_sources={}",
            ctx,
            ordinary.len(),
            shared.len()
        );

        let all: BTreeSet<i64> = ordinary.keys().chain(shared.keys()).copied().collect();
        let mut phases = Vec::with_capacity(4);

        // [1] NORMALIZE
        phases.push(runner.run(&ctx, PHASE_NORMALIZE, all, |id| {
            let entity = EntityRef::test_case(id);
            normalize_entity(self.api, &ctx.with_entity(entity), entity).map(|_| ())
        }));

        // [2] PROMOTE
        // A source is claimed in the registry before its copy runs, so only
        // completed promotions are eligible for cleanup.
        let promoted: Mutex<BTreeSet<i64>> = Mutex::new(BTreeSet::new());
        phases.push(runner.run(&ctx, PHASE_PROMOTE, shared.keys().copied(), |id| {
            let entity_ctx = ctx.with_entity(EntityRef::test_case(id));
            self.promote(&entity_ctx, project_id, id)?;
            promoted.lock().insert(id);
            Ok(())
        }));

        // [3] REWIRE
        phases.push(runner.run(&ctx, PHASE_REWIRE, ordinary.keys().copied(), |id| {
            let entity_ctx = ctx.with_entity(EntityRef::test_case(id));
            self.rewire(&entity_ctx, id).map(|_| ())
        }));

        // [4] CLEANUP
        let promoted = promoted.into_inner();
        if promoted.len() < shared.len() {
            log::warn!(
                "{} CLEANUP_PARTIAL promoted={} kept={}",
                ctx,
                promoted.len(),
                shared.len() - promoted.len()
            );
        }
        phases.push(runner.run(&ctx, PHASE_CLEANUP, promoted, |id| {
            self.api.delete_test_case(id)
        }));

        let report = ProjectReport {
            project_id,
            test_cases: ordinary.len(),
            shared_sources: shared.len(),
            phases,
        };
        log::info!(
            "{} PROJECT_COMPLETE registry={} errors={}",
            ctx,
            self.registry.len(),
            report.errors()
        );
        Ok(report)
    }

    /// Migrate the given projects, or every project when none are given.
    /// With a metadata store, completed projects are skipped and progress is
    /// saved after each project.
    pub fn migrate_projects(
        &self,
        project_ids: &[i64],
        meta: Option<&MetaStore>,
    ) -> Result<Vec<ProjectReport>> {
        let ctx = self.run.log();
        let project_ids: Vec<i64> = if project_ids.is_empty() {
            collect_projects(self.api, self.run.page_size)?
                .into_keys()
                .collect()
        } else {
            project_ids.to_vec()
        };
        let mut completed: BTreeMap<i64, bool> = match meta {
            Some(store) => store.load_projects()?,
            None => BTreeMap::new(),
        };

        let mut reports = Vec::new();
        for project_id in project_ids {
            if completed.get(&project_id).copied().unwrap_or(false) {
                log::info!("{} PROJECT_SKIPPED project={} reason=already_migrated", ctx, project_id);
                continue;
            }
            reports.push(self.migrate_project(project_id)?);
            completed.insert(project_id, true);
            if let Some(store) = meta {
                store.save_registry(self.registry)?;
                store.save_projects(&completed)?;
            }
        }
        Ok(reports)
    }
}
