//! Roll test cases back through their audit log.
//!
//! Every audit entry recorded after a point in time is replayed in listing
//! order. For each data record of an entry, every action whose predicate
//! matches is applied; actions are not exclusive.

use std::collections::BTreeSet;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

use crate::client::{
    AssociationDiff, AuditActionType, AuditEntry, AuditEntryData, CustomFieldValue, EntityRef,
    TestCaseDiff, TestCasePatch, TestOpsApi, ValueChange,
};
use crate::error::{MigrationError, Result};
use crate::logging::LogContext;
use crate::pipeline::{collect_audit, collect_test_cases, RunContext, TaskReport};

pub const AUDIT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TEST_CASE_DATA: &str = "test_case";
const TEST_CASE_CUSTOM_FIELD: &str = "test_case_custom_field";

/// Parse a `yyyy-MM-dd HH:mm:ss` local time into epoch milliseconds.
pub fn parse_audit_after(value: &str) -> Result<i64> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), AUDIT_TIME_FORMAT).map_err(|e| {
        MigrationError::config(format!(
            "audit time '{}' does not match {}: {}",
            value, AUDIT_TIME_FORMAT, e
        ))
    })?;
    let local: DateTime<Local> = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| MigrationError::config(format!("audit time '{}' does not exist", value)))?;
    Ok(local.timestamp_millis())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackAction {
    /// Restore name, description, expected result and precondition.
    TestCaseData,
    /// Re-add custom field values removed by a DELETE.
    CustomFieldDelete,
    /// Remove custom field values added by an INSERT.
    CustomFieldInsert,
}

impl RollbackAction {
    pub const ALL: [RollbackAction; 3] = [
        RollbackAction::TestCaseData,
        RollbackAction::CustomFieldDelete,
        RollbackAction::CustomFieldInsert,
    ];

    pub fn applies(&self, action_type: AuditActionType, data: &AuditEntryData) -> bool {
        match self {
            RollbackAction::TestCaseData => {
                action_type == AuditActionType::Update && data.kind == TEST_CASE_DATA
            }
            RollbackAction::CustomFieldDelete => {
                action_type == AuditActionType::Delete && data.kind == TEST_CASE_CUSTOM_FIELD
            }
            RollbackAction::CustomFieldInsert => {
                action_type == AuditActionType::Insert && data.kind == TEST_CASE_CUSTOM_FIELD
            }
        }
    }

    pub fn apply(
        &self,
        api: &dyn TestOpsApi,
        ctx: &LogContext,
        test_case_id: i64,
        data: &AuditEntryData,
    ) -> Result<()> {
        match self {
            RollbackAction::TestCaseData => {
                let diff: TestCaseDiff = serde_json::from_value(data.diff.clone())?;
                let patch = data_patch(&diff);
                log::info!("{} ROLLBACK_DATA patch={:?}", ctx, patch);
                api.update_test_case(test_case_id, &patch)
            }
            RollbackAction::CustomFieldDelete => {
                let diff: AssociationDiff = serde_json::from_value(data.diff.clone())?;
                let restored = diff.ids.old_value.unwrap_or_default();
                log::info!("{} ROLLBACK_ADD_FIELDS ids={:?}", ctx, restored);
                let mut fields = api.get_custom_fields(test_case_id)?;
                for id in restored {
                    if !fields.iter().any(|f| f.id == id) {
                        fields.push(CustomFieldValue::with_id(id));
                    }
                }
                api.set_custom_fields(test_case_id, &fields)
            }
            RollbackAction::CustomFieldInsert => {
                let diff: AssociationDiff = serde_json::from_value(data.diff.clone())?;
                let removed: BTreeSet<i64> = diff.ids.new_value.unwrap_or_default();
                log::info!("{} ROLLBACK_REMOVE_FIELDS ids={:?}", ctx, removed);
                let mut fields = api.get_custom_fields(test_case_id)?;
                fields.retain(|f| !removed.contains(&f.id));
                api.set_custom_fields(test_case_id, &fields)
            }
        }
    }
}

/// An old value of `None` restores an empty field.
fn restore(change: &Option<ValueChange<String>>) -> Option<String> {
    change
        .as_ref()
        .map(|c| c.old_value.clone().unwrap_or_default())
}

fn data_patch(diff: &TestCaseDiff) -> TestCasePatch {
    TestCasePatch {
        name: restore(&diff.name),
        description: restore(&diff.description),
        precondition: restore(&diff.precondition),
        expected_result: restore(&diff.expected_result),
    }
}

/// Apply every matching action of one entry. Returns how many were applied.
pub fn rollback_entry(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    test_case_id: i64,
    entry: &AuditEntry,
) -> Result<usize> {
    let mut applied = 0;
    for data in &entry.data {
        for action in RollbackAction::ALL.iter().filter(|a| a.applies(entry.action_type, data)) {
            action.apply(api, ctx, test_case_id, data)?;
            applied += 1;
        }
    }
    Ok(applied)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub entries: usize,
    pub applied: usize,
}

/// Roll back every audit entry of a test case recorded after `after_millis`.
pub fn rollback_test_case(
    api: &dyn TestOpsApi,
    ctx: &LogContext,
    test_case_id: i64,
    after_millis: i64,
    page_size: i32,
) -> Result<RollbackReport> {
    let entries: Vec<AuditEntry> = collect_audit(api, test_case_id, page_size)?
        .into_iter()
        .filter(|entry| entry.timestamp > after_millis)
        .collect();

    let mut report = RollbackReport::default();
    for entry in &entries {
        log::info!(
            "{} AUDIT_ENTRY id={} action={:?} timestamp={} user={}",
            ctx,
            entry.id,
            entry.action_type,
            entry.timestamp,
            entry.username.as_deref().unwrap_or("-")
        );
        report.applied += rollback_entry(api, ctx, test_case_id, entry)?;
        report.entries += 1;
    }
    Ok(report)
}

/// Roll back every test case of a project matching `filter`.
pub fn rollback_project(
    api: &dyn TestOpsApi,
    run: &RunContext,
    project_id: i64,
    filter: &str,
    after_millis: i64,
) -> Result<TaskReport> {
    let ctx = run.project_log(project_id);
    let ids = collect_test_cases(api, project_id, filter, false, run.page_size)?;
    log::info!("{} ROLLBACK_START test_cases={}", ctx, ids.len());

    Ok(run.runner.run(&ctx, "rollback", ids.into_keys(), |id| {
        let entity_ctx = ctx.with_entity(EntityRef::test_case(id));
        rollback_test_case(api, &entity_ctx, id, after_millis, run.page_size).map(|_| ())
    }))
}
