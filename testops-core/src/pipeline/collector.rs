//! Paginated Collector.
//!
//! Drains a zero-based paginated listing. Starting from the sentinel page
//! number -1, it requests `number + 1` while the latest response reports
//! more pages. Any failing page aborts the whole collection.

use std::collections::BTreeMap;

use crate::client::{AuditEntry, EntityRef, Page, TestOpsApi};
use crate::error::Result;
use crate::scenario::model::Attachment;

/// Request pages until the latest response is the last one.
pub fn collect_pages<T, F>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(i32) -> Result<Page<T>>,
{
    let mut items = Vec::new();
    let mut number = -1;
    loop {
        let requested = number + 1;
        let page = fetch(requested)?;
        if page.number != requested {
            log::warn!(
                "PAGE_MISMATCH requested={} returned={} total_pages={}",
                requested,
                page.number,
                page.total_pages
            );
        }
        // an older page number still advances from the requested one
        number = page.number.max(requested);
        let last = number + 1 >= page.total_pages;
        items.extend(page.content);
        if last {
            return Ok(items);
        }
    }
}

pub fn collect_projects(api: &dyn TestOpsApi, page_size: i32) -> Result<BTreeMap<i64, String>> {
    let projects = collect_pages(|page| api.find_projects("", page, page_size))?;
    Ok(projects.into_iter().map(|p| (p.id, p.name)).collect())
}

/// Test cases of a project matching `filter`. With `include_deleted` the
/// soft-deleted listing is drained as a second pass over the same filter.
pub fn collect_test_cases(
    api: &dyn TestOpsApi,
    project_id: i64,
    filter: &str,
    include_deleted: bool,
    page_size: i32,
) -> Result<BTreeMap<i64, String>> {
    let mut result = BTreeMap::new();
    let passes: &[bool] = if include_deleted { &[false, true] } else { &[false] };
    for deleted in passes {
        let cases = collect_pages(|page| {
            api.find_test_cases(project_id, filter, *deleted, page, page_size)
        })?;
        result.extend(cases.into_iter().map(|tc| (tc.id, tc.name)));
    }
    Ok(result)
}

pub fn collect_shared_steps(
    api: &dyn TestOpsApi,
    project_id: i64,
    page_size: i32,
) -> Result<BTreeMap<i64, String>> {
    let steps = collect_pages(|page| api.find_shared_steps(project_id, page, page_size))?;
    Ok(steps.into_iter().map(|s| (s.id, s.name)).collect())
}

pub fn collect_attachments(
    api: &dyn TestOpsApi,
    entity: EntityRef,
    page_size: i32,
) -> Result<Vec<Attachment>> {
    collect_pages(|page| api.get_attachments(entity, page, page_size))
}

pub fn collect_audit(
    api: &dyn TestOpsApi,
    test_case_id: i64,
    page_size: i32,
) -> Result<Vec<AuditEntry>> {
    collect_pages(|page| api.get_audit(test_case_id, page, page_size))
}
