//! Remote service payloads other than the scenario tree.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scenario::model::null_as_default;

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<T>,
    /// Zero-based number of this page.
    pub number: i32,
    pub total_pages: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub precondition: Option<String>,
    #[serde(default)]
    pub expected_result: Option<String>,
}

/// Partial update of a test case; unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCasePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precondition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<String>,
}

impl From<&TestCase> for TestCasePatch {
    fn from(test_case: &TestCase) -> Self {
        Self {
            name: Some(test_case.name.clone()),
            description: test_case.description.clone(),
            precondition: test_case.precondition.clone(),
            expected_result: test_case.expected_result.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedStep {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedStepCreate {
    pub name: String,
    pub project_id: i64,
}

/// Partial update of a shared step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedStepPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&SharedStep> for SharedStepPatch {
    fn from(shared_step: &SharedStep) -> Self {
        Self {
            name: Some(shared_step.name.clone()),
        }
    }
}

/// Custom field value attached to a test case. Unknown fields are kept so a
/// fetched list can be written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub id: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl CustomFieldValue {
    pub fn with_id(id: i64) -> Self {
        Self {
            id,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditActionType {
    Insert,
    Update,
    Delete,
    #[serde(other)]
    Unknown,
}

/// One audit record of a test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: i64,
    pub action_type: AuditActionType,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<AuditEntryData>,
}

/// A typed change inside an audit entry. `diff` is decoded on demand
/// according to `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntryData {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub diff: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange<T> {
    #[serde(default)]
    pub old_value: Option<T>,
    #[serde(default)]
    pub new_value: Option<T>,
}

/// Field-level diff of a `test_case` audit record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseDiff {
    #[serde(default)]
    pub name: Option<ValueChange<String>>,
    #[serde(default)]
    pub description: Option<ValueChange<String>>,
    #[serde(default)]
    pub expected_result: Option<ValueChange<String>>,
    #[serde(default)]
    pub precondition: Option<ValueChange<String>>,
}

/// Diff of an association table record, e.g. `test_case_custom_field`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationDiff {
    pub ids: ValueChange<BTreeSet<i64>>,
}
