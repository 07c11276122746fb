//! In-memory `TestOpsApi` for unit tests.
//!
//! Mirrors the service behavior the algorithms rely on: server-assigned ids,
//! `after`-sibling placement, expected-result node allocation, subtree
//! deletion, soft-deleted test cases and layer filters. Every call is
//! recorded, and any `(operation, id)` pair can be made to fail.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Read};

use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;

use crate::error::{MigrationError, Result};
use crate::scenario::model::{
    Attachment, ScenarioNormalized, ScenarioRoot, ScenarioStep, ScenarioStepCreate,
    ScenarioStepResponse, ScenarioStepUpdate,
};

use super::api::{EntityKind, EntityRef, TestOpsApi};
use super::dto::{
    AuditEntry, CustomFieldValue, Page, Project, SharedStep, SharedStepCreate, SharedStepPatch,
    TestCase, TestCasePatch,
};

lazy_static! {
    static ref LAYER_FILTER: Regex =
        Regex::new(r#"^\s*(?P<not>not\s+)?layer\s+in\s+\[(?P<list>.*)\]\s*$"#).unwrap();
    static ref QUOTED: Regex = Regex::new(r#""([^"]*)""#).unwrap();
}

fn matches_filter(filter: &str, layer: Option<&str>) -> bool {
    let Some(caps) = LAYER_FILTER.captures(filter) else {
        return true;
    };
    let layers: Vec<&str> = QUOTED
        .captures_iter(&caps["list"])
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();
    let inside = layer.map(|l| layers.contains(&l)).unwrap_or(false);
    inside != caps.name("not").is_some()
}

fn page_of<T: Clone>(items: &[T], page: i32, size: i32) -> Page<T> {
    let size = size.max(1) as usize;
    let total_pages = items.len().div_ceil(size) as i32;
    let content = items
        .iter()
        .skip(page.max(0) as usize * size)
        .take(size)
        .cloned()
        .collect();
    Page {
        content,
        number: page,
        total_pages,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StoredTestCase {
    pub case: TestCase,
    pub layer: Option<String>,
    pub deleted: bool,
}

#[derive(Debug, Clone)]
struct StoredAttachment {
    owner: EntityRef,
    meta: Attachment,
    content: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
struct StoredScenario {
    root: Vec<i64>,
    steps: BTreeMap<i64, ScenarioStep>,
}

impl StoredScenario {
    fn siblings_mut(&mut self, parent: Option<i64>) -> Option<&mut Vec<i64>> {
        match parent {
            None => Some(&mut self.root),
            Some(id) => self.steps.get_mut(&id).map(|step| &mut step.children),
        }
    }

    fn detach(&mut self, id: i64) {
        self.root.retain(|child| *child != id);
        for step in self.steps.values_mut() {
            step.children.retain(|child| *child != id);
            if step.expected_result_id == Some(id) {
                step.expected_result_id = None;
            }
        }
    }

    fn remove_subtree(&mut self, id: i64) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(step) = self.steps.remove(&current) {
                pending.extend(step.children);
                pending.extend(step.expected_result_id);
            }
        }
    }
}

#[derive(Debug)]
struct State {
    next_id: i64,
    projects: Vec<Project>,
    test_cases: BTreeMap<i64, StoredTestCase>,
    shared_steps: BTreeMap<i64, SharedStep>,
    scenarios: HashMap<EntityRef, StoredScenario>,
    attachments: BTreeMap<i64, StoredAttachment>,
    custom_fields: HashMap<i64, Vec<CustomFieldValue>>,
    audit: HashMap<i64, Vec<AuditEntry>>,
    failures: HashSet<(&'static str, i64)>,
    calls: Vec<(&'static str, i64)>,
}

impl State {
    fn alloc(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, op: &'static str, id: i64) -> Result<()> {
        self.calls.push((op, id));
        if self.failures.contains(&(op, id)) {
            return Err(MigrationError::Status {
                method: "MEMORY".to_string(),
                url: format!("{}/{}", op, id),
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn ensure(&self, entity: EntityRef) -> Result<()> {
        let exists = match entity.kind {
            EntityKind::TestCase => self.test_cases.contains_key(&entity.id),
            EntityKind::SharedStep => self.shared_steps.contains_key(&entity.id),
        };
        if exists {
            Ok(())
        } else {
            Err(MigrationError::not_found(entity.to_string()))
        }
    }

    fn snapshot(&self, entity: EntityRef) -> ScenarioNormalized {
        let stored = self.scenarios.get(&entity).cloned().unwrap_or_default();
        ScenarioNormalized {
            root: ScenarioRoot {
                children: stored.root,
            },
            scenario_steps: stored.steps,
            attachments: self
                .attachments
                .values()
                .filter(|a| a.owner == entity)
                .map(|a| (a.meta.id, a.meta.clone()))
                .collect(),
        }
    }
}

pub(crate) struct MemoryTestOps {
    state: Mutex<State>,
}

impl MemoryTestOps {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1000,
                projects: Vec::new(),
                test_cases: BTreeMap::new(),
                shared_steps: BTreeMap::new(),
                scenarios: HashMap::new(),
                attachments: BTreeMap::new(),
                custom_fields: HashMap::new(),
                audit: HashMap::new(),
                failures: HashSet::new(),
                calls: Vec::new(),
            }),
        }
    }

    pub fn add_project(&self, id: i64, name: &str) {
        self.state.lock().projects.push(Project {
            id,
            name: name.to_string(),
        });
    }

    pub fn add_test_case(&self, id: i64, project_id: i64, name: &str, layer: Option<&str>) {
        self.state.lock().test_cases.insert(
            id,
            StoredTestCase {
                case: TestCase {
                    id,
                    name: name.to_string(),
                    project_id: Some(project_id),
                    ..TestCase::default()
                },
                layer: layer.map(str::to_string),
                deleted: false,
            },
        );
    }

    pub fn test_case(&self, id: i64) -> Option<StoredTestCase> {
        self.state.lock().test_cases.get(&id).cloned()
    }

    pub fn shared_steps(&self) -> Vec<SharedStep> {
        self.state.lock().shared_steps.values().cloned().collect()
    }

    /// Append a text step and return its id.
    pub fn add_text(&self, entity: EntityRef, parent: Option<i64>, body: &str) -> i64 {
        let request = ScenarioStepCreate::text(body).under(parent);
        self.create_step(entity, &request, None, false)
            .map(|r| r.created_step_id)
            .unwrap()
    }

    /// Append a text step that owns an expected-result node. Returns
    /// `(step id, expected-result id)`.
    pub fn add_text_with_expected(
        &self,
        entity: EntityRef,
        parent: Option<i64>,
        body: &str,
    ) -> (i64, i64) {
        let request = ScenarioStepCreate::text(body).under(parent);
        let response = self.create_step(entity, &request, None, true).unwrap();
        let id = response.created_step_id;
        let expected = response.scenario.scenario_steps[&id]
            .expected_result_id
            .unwrap();
        (id, expected)
    }

    pub fn add_attachment_step(
        &self,
        entity: EntityRef,
        parent: Option<i64>,
        attachment_id: i64,
    ) -> i64 {
        let request = ScenarioStepCreate::attachment(attachment_id).under(parent);
        self.create_step(entity, &request, None, false)
            .map(|r| r.created_step_id)
            .unwrap()
    }

    pub fn add_file(&self, entity: EntityRef, name: &str, content_type: &str, content: &[u8]) -> i64 {
        self.create_attachment(entity, name, content_type, content.to_vec())
            .unwrap()[0]
            .id
    }

    pub fn content(&self, attachment_id: i64) -> Option<Vec<u8>> {
        self.state
            .lock()
            .attachments
            .get(&attachment_id)
            .map(|a| a.content.clone())
    }

    pub fn scenario(&self, entity: EntityRef) -> ScenarioNormalized {
        self.state.lock().snapshot(entity)
    }

    pub fn set_custom_field_ids(&self, test_case_id: i64, ids: &[i64]) {
        self.state.lock().custom_fields.insert(
            test_case_id,
            ids.iter().map(|id| CustomFieldValue::with_id(*id)).collect(),
        );
    }

    pub fn custom_field_ids(&self, test_case_id: i64) -> Vec<i64> {
        self.state
            .lock()
            .custom_fields
            .get(&test_case_id)
            .map(|fields| fields.iter().map(|f| f.id).collect())
            .unwrap_or_default()
    }

    pub fn add_audit(&self, test_case_id: i64, entry: AuditEntry) {
        self.state
            .lock()
            .audit
            .entry(test_case_id)
            .or_default()
            .push(entry);
    }

    /// Make every future `op` call addressed to `id` fail with a 500.
    pub fn fail(&self, op: &'static str, id: i64) {
        self.state.lock().failures.insert((op, id));
    }

    pub fn calls_of(&self, op: &str) -> Vec<i64> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(name, _)| *name == op)
            .map(|(_, id)| *id)
            .collect()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.state.lock().calls.iter().map(|(name, _)| *name).collect()
    }

    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }
}

impl TestOpsApi for MemoryTestOps {
    fn find_projects(&self, _query: &str, page: i32, size: i32) -> Result<Page<Project>> {
        let mut state = self.state.lock();
        state.record("find_projects", page as i64)?;
        Ok(page_of(&state.projects, page, size))
    }

    fn find_test_cases(
        &self,
        project_id: i64,
        filter: &str,
        deleted: bool,
        page: i32,
        size: i32,
    ) -> Result<Page<TestCase>> {
        let mut state = self.state.lock();
        state.record("find_test_cases", project_id)?;
        let matching: Vec<TestCase> = state
            .test_cases
            .values()
            .filter(|stored| stored.case.project_id == Some(project_id))
            .filter(|stored| stored.deleted == deleted)
            .filter(|stored| matches_filter(filter, stored.layer.as_deref()))
            .map(|stored| stored.case.clone())
            .collect();
        Ok(page_of(&matching, page, size))
    }

    fn get_test_case(&self, id: i64) -> Result<TestCase> {
        let mut state = self.state.lock();
        state.record("get_test_case", id)?;
        state
            .test_cases
            .get(&id)
            .map(|stored| stored.case.clone())
            .ok_or_else(|| MigrationError::not_found(format!("test case {}", id)))
    }

    fn update_test_case(&self, id: i64, patch: &TestCasePatch) -> Result<()> {
        let mut state = self.state.lock();
        state.record("update_test_case", id)?;
        let stored = state
            .test_cases
            .get_mut(&id)
            .ok_or_else(|| MigrationError::not_found(format!("test case {}", id)))?;
        if let Some(name) = &patch.name {
            stored.case.name = name.clone();
        }
        if patch.description.is_some() {
            stored.case.description = patch.description.clone();
        }
        if patch.precondition.is_some() {
            stored.case.precondition = patch.precondition.clone();
        }
        if patch.expected_result.is_some() {
            stored.case.expected_result = patch.expected_result.clone();
        }
        Ok(())
    }

    fn delete_test_case(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock();
        state.record("delete_test_case", id)?;
        let stored = state
            .test_cases
            .get_mut(&id)
            .ok_or_else(|| MigrationError::not_found(format!("test case {}", id)))?;
        stored.deleted = true;
        Ok(())
    }

    fn find_shared_steps(
        &self,
        project_id: i64,
        page: i32,
        size: i32,
    ) -> Result<Page<SharedStep>> {
        let mut state = self.state.lock();
        state.record("find_shared_steps", project_id)?;
        let matching: Vec<SharedStep> = state
            .shared_steps
            .values()
            .filter(|s| s.project_id == Some(project_id))
            .cloned()
            .collect();
        Ok(page_of(&matching, page, size))
    }

    fn get_shared_step(&self, id: i64) -> Result<SharedStep> {
        let mut state = self.state.lock();
        state.record("get_shared_step", id)?;
        state
            .shared_steps
            .get(&id)
            .cloned()
            .ok_or_else(|| MigrationError::not_found(format!("shared step {}", id)))
    }

    fn create_shared_step(&self, request: &SharedStepCreate) -> Result<SharedStep> {
        let mut state = self.state.lock();
        state.record("create_shared_step", request.project_id)?;
        let id = state.alloc();
        let shared_step = SharedStep {
            id,
            name: request.name.clone(),
            project_id: Some(request.project_id),
        };
        state.shared_steps.insert(id, shared_step.clone());
        Ok(shared_step)
    }

    fn update_shared_step(&self, id: i64, patch: &SharedStepPatch) -> Result<()> {
        let mut state = self.state.lock();
        state.record("update_shared_step", id)?;
        let stored = state
            .shared_steps
            .get_mut(&id)
            .ok_or_else(|| MigrationError::not_found(format!("shared step {}", id)))?;
        if let Some(name) = &patch.name {
            stored.name = name.clone();
        }
        Ok(())
    }

    fn get_scenario(&self, entity: EntityRef) -> Result<ScenarioNormalized> {
        let mut state = self.state.lock();
        state.record("get_scenario", entity.id)?;
        state.ensure(entity)?;
        Ok(state.snapshot(entity))
    }

    fn create_step(
        &self,
        entity: EntityRef,
        request: &ScenarioStepCreate,
        after: Option<i64>,
        with_expected_result: bool,
    ) -> Result<ScenarioStepResponse> {
        let mut state = self.state.lock();
        state.record("create_step", entity.id)?;
        state.ensure(entity)?;
        if entity.kind == EntityKind::SharedStep && request.shared_step_id.is_some() {
            return Err(MigrationError::Unsupported {
                message: "reference inside shared step".to_string(),
            });
        }
        let id = state.alloc();
        let expected_id = with_expected_result.then(|| state.alloc());

        let scenario = state.scenarios.entry(entity).or_default();
        let siblings = scenario
            .siblings_mut(request.parent_id)
            .ok_or_else(|| MigrationError::not_found(format!("parent step {:?}", request.parent_id)))?;
        let position = after
            .and_then(|a| siblings.iter().position(|s| *s == a))
            .map(|p| p + 1)
            .unwrap_or(siblings.len());
        siblings.insert(position, id);
        scenario.steps.insert(
            id,
            ScenarioStep {
                id,
                body: request.body.clone(),
                attachment_id: request.attachment_id,
                expected_result_id: expected_id,
                shared_step_id: request.shared_step_id,
                children: Vec::new(),
            },
        );
        if let Some(expected_id) = expected_id {
            scenario.steps.insert(
                expected_id,
                ScenarioStep {
                    id: expected_id,
                    ..ScenarioStep::default()
                },
            );
        }
        Ok(ScenarioStepResponse {
            created_step_id: id,
            scenario: state.snapshot(entity),
        })
    }

    fn update_step(
        &self,
        entity: EntityRef,
        step_id: i64,
        update: &ScenarioStepUpdate,
        with_expected_result: Option<bool>,
    ) -> Result<ScenarioNormalized> {
        let mut state = self.state.lock();
        state.record("update_step", step_id)?;
        state.ensure(entity)?;
        let needs_expected = with_expected_result == Some(true)
            && state
                .scenarios
                .get(&entity)
                .and_then(|s| s.steps.get(&step_id))
                .map(|s| s.expected_result_id.is_none())
                .unwrap_or(false);
        let new_expected = needs_expected.then(|| state.alloc());

        let scenario = state.scenarios.entry(entity).or_default();
        let step = scenario
            .steps
            .get_mut(&step_id)
            .ok_or_else(|| MigrationError::not_found(format!("step {}", step_id)))?;
        if let Some(body) = &update.body {
            step.body = body.clone();
        }
        if let Some(attachment_id) = update.attachment_id {
            step.attachment_id = attachment_id;
        }
        if let Some(shared_step_id) = update.shared_step_id {
            step.shared_step_id = shared_step_id;
        }
        let dropped_expected = match update.expected_result {
            Some(None) => step.expected_result_id.take(),
            _ => None,
        };
        if let Some(expected_id) = new_expected {
            step.expected_result_id = Some(expected_id);
            scenario.steps.insert(
                expected_id,
                ScenarioStep {
                    id: expected_id,
                    ..ScenarioStep::default()
                },
            );
        }
        if let Some(dropped) = dropped_expected {
            scenario.remove_subtree(dropped);
        }
        Ok(state.snapshot(entity))
    }

    fn delete_step(&self, entity: EntityRef, step_id: i64) -> Result<()> {
        let mut state = self.state.lock();
        state.record("delete_step", step_id)?;
        state.ensure(entity)?;
        let scenario = state.scenarios.entry(entity).or_default();
        if !scenario.steps.contains_key(&step_id) {
            return Err(MigrationError::not_found(format!("step {}", step_id)));
        }
        scenario.detach(step_id);
        scenario.remove_subtree(step_id);
        Ok(())
    }

    fn delete_scenario(&self, entity: EntityRef) -> Result<()> {
        let mut state = self.state.lock();
        state.record("delete_scenario", entity.id)?;
        state.ensure(entity)?;
        state.scenarios.remove(&entity);
        Ok(())
    }

    fn get_attachments(
        &self,
        entity: EntityRef,
        page: i32,
        size: i32,
    ) -> Result<Page<Attachment>> {
        let mut state = self.state.lock();
        state.record("get_attachments", entity.id)?;
        let owned: Vec<Attachment> = state
            .attachments
            .values()
            .filter(|a| a.owner == entity)
            .map(|a| a.meta.clone())
            .collect();
        Ok(page_of(&owned, page, size))
    }

    fn get_attachment_content(
        &self,
        kind: EntityKind,
        attachment_id: i64,
    ) -> Result<Box<dyn Read + Send>> {
        let mut state = self.state.lock();
        state.record("get_attachment_content", attachment_id)?;
        state
            .attachments
            .get(&attachment_id)
            .filter(|a| a.owner.kind == kind)
            .map(|a| Box::new(Cursor::new(a.content.clone())) as Box<dyn Read + Send>)
            .ok_or_else(|| MigrationError::not_found(format!("attachment {}", attachment_id)))
    }

    fn create_attachment(
        &self,
        entity: EntityRef,
        name: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> Result<Vec<Attachment>> {
        let mut state = self.state.lock();
        state.record("create_attachment", entity.id)?;
        state.ensure(entity)?;
        let id = state.alloc();
        let meta = Attachment {
            id,
            name: name.to_string(),
            content_type: content_type.to_string(),
            content_length: Some(content.len() as i64),
        };
        state.attachments.insert(
            id,
            StoredAttachment {
                owner: entity,
                meta: meta.clone(),
                content,
            },
        );
        Ok(vec![meta])
    }

    fn delete_attachment(&self, kind: EntityKind, attachment_id: i64) -> Result<()> {
        let mut state = self.state.lock();
        state.record("delete_attachment", attachment_id)?;
        match state.attachments.get(&attachment_id) {
            Some(a) if a.owner.kind == kind => {
                state.attachments.remove(&attachment_id);
                Ok(())
            }
            _ => Err(MigrationError::not_found(format!("attachment {}", attachment_id))),
        }
    }

    fn get_custom_fields(&self, test_case_id: i64) -> Result<Vec<CustomFieldValue>> {
        let mut state = self.state.lock();
        state.record("get_custom_fields", test_case_id)?;
        Ok(state
            .custom_fields
            .get(&test_case_id)
            .cloned()
            .unwrap_or_default())
    }

    fn set_custom_fields(&self, test_case_id: i64, fields: &[CustomFieldValue]) -> Result<()> {
        let mut state = self.state.lock();
        state.record("set_custom_fields", test_case_id)?;
        state.custom_fields.insert(test_case_id, fields.to_vec());
        Ok(())
    }

    fn get_audit(&self, test_case_id: i64, page: i32, size: i32) -> Result<Page<AuditEntry>> {
        let mut state = self.state.lock();
        state.record("get_audit", test_case_id)?;
        let entries = state.audit.get(&test_case_id).cloned().unwrap_or_default();
        Ok(page_of(&entries, page, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_filter() {
        let shared = r#"layer in ["Shared Steps", "Шаг"]"#;
        let ordinary = r#"not layer in ["Shared Steps", "Шаг"]"#;
        assert!(matches_filter(shared, Some("Шаг")));
        assert!(!matches_filter(shared, None));
        assert!(matches_filter(ordinary, None));
        assert!(!matches_filter(ordinary, Some("Shared Steps")));
        assert!(matches_filter("true", Some("anything")));
    }

    #[test]
    fn test_after_placement_and_subtree_delete() {
        let api = MemoryTestOps::new();
        api.add_test_case(1, 1, "login", None);
        let tc = EntityRef::test_case(1);
        let a = api.add_text(tc, None, "a");
        let c = api.add_text(tc, None, "c");
        let b = api
            .create_step(tc, &ScenarioStepCreate::text("b"), Some(a), false)
            .unwrap()
            .created_step_id;
        assert_eq!(api.scenario(tc).root.children, vec![a, b, c]);

        let child = api.add_text(tc, Some(b), "b.1");
        api.delete_step(tc, b).unwrap();
        let scenario = api.scenario(tc);
        assert_eq!(scenario.root.children, vec![a, c]);
        assert!(scenario.step(child).is_none());
    }

    #[test]
    fn test_injected_failure() {
        let api = MemoryTestOps::new();
        api.add_test_case(1, 1, "login", None);
        api.fail("get_scenario", 1);
        assert!(api.get_scenario(EntityRef::test_case(1)).is_err());
        assert_eq!(api.calls_of("get_scenario"), vec![1]);
    }
}
