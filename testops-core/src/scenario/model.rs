//! Normalized scenario representation.
//!
//! The remote service returns a scenario as a flat id -> step map plus a
//! synthetic root whose `children` are the top-level steps. Tree order is
//! carried by `children` lists only; map order is irrelevant.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

/// One node of a step tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStep {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_step_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<i64>,
}

impl ScenarioStep {
    /// A reference step points at a shared step and has no content of its own.
    pub fn is_reference(&self) -> bool {
        self.shared_step_id.is_some()
    }
}

/// Synthetic root of a scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRoot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<i64>,
}

/// Attachment metadata, as listed for an entity or embedded in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_content_type", deserialize_with = "content_type_or_default")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<i64>,
}

fn content_type_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_content_type))
}

/// Attachments embedded in a scenario share the listing shape.
pub type ScenarioAttachment = Attachment;

/// Full normalized scenario of one test case or shared step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioNormalized {
    #[serde(default, deserialize_with = "null_as_default")]
    pub root: ScenarioRoot,
    #[serde(
        default,
        alias = "testCaseScenarioSteps",
        alias = "sharedStepScenarioSteps",
        deserialize_with = "null_as_default"
    )]
    pub scenario_steps: BTreeMap<i64, ScenarioStep>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: BTreeMap<i64, ScenarioAttachment>,
}

/// Request to create one step.
///
/// The owning entity is not part of the payload; the client adds it from the
/// `EntityRef` the step is created under.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStepCreate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_step_id: Option<i64>,
}

impl ScenarioStepCreate {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn attachment(attachment_id: i64) -> Self {
        Self {
            attachment_id: Some(attachment_id),
            ..Self::default()
        }
    }

    pub fn reference(shared_step_id: i64) -> Self {
        Self {
            shared_step_id: Some(shared_step_id),
            ..Self::default()
        }
    }

    pub fn under(mut self, parent_id: Option<i64>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Content of an existing step, without its position.
    pub fn from_step(step: &ScenarioStep) -> Self {
        Self {
            body: step.body.clone(),
            parent_id: None,
            attachment_id: step.attachment_id,
            shared_step_id: step.shared_step_id,
        }
    }
}

/// Partial step update.
///
/// `None` leaves the field untouched server-side, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStepUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_step_id: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<Option<String>>,
}

impl ScenarioStepUpdate {
    pub fn body(body: impl Into<String>) -> Self {
        Self {
            body: Some(Some(body.into())),
            ..Self::default()
        }
    }

    /// Turn the step into a pure reference: content fields are cleared.
    pub fn reference(shared_step_id: i64) -> Self {
        Self {
            body: Some(None),
            attachment_id: Some(None),
            shared_step_id: Some(Some(shared_step_id)),
            expected_result: Some(None),
        }
    }
}

/// Response of a step creation: the new id and the resulting scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStepResponse {
    pub created_step_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scenario: ScenarioNormalized,
}
