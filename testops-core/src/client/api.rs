//! The remote operations the migration algorithms rely on.

use std::fmt;
use std::io::Read;

use crate::error::Result;
use crate::scenario::model::{
    Attachment, ScenarioNormalized, ScenarioStepCreate, ScenarioStepResponse, ScenarioStepUpdate,
};

use super::dto::{
    AuditEntry, CustomFieldValue, Page, Project, SharedStep, SharedStepCreate, SharedStepPatch,
    TestCase, TestCasePatch,
};

/// Kind of entity that owns a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    TestCase,
    SharedStep,
}

impl EntityKind {
    /// Short prefix used in logs and backup directory names.
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::TestCase => "tc",
            EntityKind::SharedStep => "ss",
        }
    }
}

/// A scenario-owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    pub fn test_case(id: i64) -> Self {
        Self {
            kind: EntityKind::TestCase,
            id,
        }
    }

    pub fn shared_step(id: i64) -> Self {
        Self {
            kind: EntityKind::SharedStep,
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.prefix(), self.id)
    }
}

/// Blocking client of the test-management service.
///
/// Every call is synchronous; a worker holds its thread for the whole call.
/// Implementations must be shareable across the worker pool.
pub trait TestOpsApi: Send + Sync {
    fn find_projects(&self, query: &str, page: i32, size: i32) -> Result<Page<Project>>;

    /// Search test cases of a project with a filter expression. `deleted`
    /// selects the soft-deleted/archived variant of the listing.
    fn find_test_cases(
        &self,
        project_id: i64,
        filter: &str,
        deleted: bool,
        page: i32,
        size: i32,
    ) -> Result<Page<TestCase>>;

    fn get_test_case(&self, id: i64) -> Result<TestCase>;

    fn update_test_case(&self, id: i64, patch: &TestCasePatch) -> Result<()>;

    fn delete_test_case(&self, id: i64) -> Result<()>;

    fn find_shared_steps(&self, project_id: i64, page: i32, size: i32)
        -> Result<Page<SharedStep>>;

    fn get_shared_step(&self, id: i64) -> Result<SharedStep>;

    fn create_shared_step(&self, request: &SharedStepCreate) -> Result<SharedStep>;

    fn update_shared_step(&self, id: i64, patch: &SharedStepPatch) -> Result<()>;

    fn get_scenario(&self, entity: EntityRef) -> Result<ScenarioNormalized>;

    /// Create a step placed after sibling `after` (or first when `None`).
    /// With `with_expected_result` the service also allocates the step's
    /// expected-result node; its id is only known from the response.
    fn create_step(
        &self,
        entity: EntityRef,
        request: &ScenarioStepCreate,
        after: Option<i64>,
        with_expected_result: bool,
    ) -> Result<ScenarioStepResponse>;

    /// Partially update a step. `with_expected_result = Some(true)` asks the
    /// service to allocate the expected-result node if it is missing.
    fn update_step(
        &self,
        entity: EntityRef,
        step_id: i64,
        update: &ScenarioStepUpdate,
        with_expected_result: Option<bool>,
    ) -> Result<ScenarioNormalized>;

    fn delete_step(&self, entity: EntityRef, step_id: i64) -> Result<()>;

    fn delete_scenario(&self, entity: EntityRef) -> Result<()>;

    fn get_attachments(&self, entity: EntityRef, page: i32, size: i32) -> Result<Page<Attachment>>;

    /// Stream the binary content of an attachment.
    fn get_attachment_content(
        &self,
        kind: EntityKind,
        attachment_id: i64,
    ) -> Result<Box<dyn Read + Send>>;

    fn create_attachment(
        &self,
        entity: EntityRef,
        name: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> Result<Vec<Attachment>>;

    fn delete_attachment(&self, kind: EntityKind, attachment_id: i64) -> Result<()>;

    fn get_custom_fields(&self, test_case_id: i64) -> Result<Vec<CustomFieldValue>>;

    fn set_custom_fields(&self, test_case_id: i64, fields: &[CustomFieldValue]) -> Result<()>;

    fn get_audit(&self, test_case_id: i64, page: i32, size: i32) -> Result<Page<AuditEntry>>;
}
