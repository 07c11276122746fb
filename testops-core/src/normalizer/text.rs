//! Split legacy free text into step entries.

use lazy_static::lazy_static;
use regex::Regex;

use crate::scenario::model::{ScenarioStepCreate, ScenarioStepUpdate};

lazy_static! {
    /// Inline image markup pointing at an attachment of the owning entity,
    /// e.g. `![screen](/api/rs/testcase/attachment/7/content)`.
    static ref ATTACHMENT_LINE: Regex =
        Regex::new(r"^!\[[^\]]*\]\((?:/[^)\s]*)?/attachment/(?P<id>\d+)/content\)$").unwrap();
}

/// One step produced from legacy text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEntry {
    Text(String),
    Attachment(i64),
}

impl StepEntry {
    pub fn to_create(&self, parent_id: i64) -> ScenarioStepCreate {
        let request = match self {
            StepEntry::Text(body) => ScenarioStepCreate::text(body.clone()),
            StepEntry::Attachment(id) => ScenarioStepCreate::attachment(*id),
        };
        request.under(Some(parent_id))
    }

    /// Update that turns an existing step into this entry.
    pub fn to_update(&self) -> ScenarioStepUpdate {
        match self {
            StepEntry::Text(body) => ScenarioStepUpdate::body(body.clone()),
            StepEntry::Attachment(id) => ScenarioStepUpdate {
                body: Some(None),
                attachment_id: Some(Some(*id)),
                ..ScenarioStepUpdate::default()
            },
        }
    }
}

/// One entry per non-blank line; attachment markup lines become
/// attachment entries.
pub fn split_lines(text: &str) -> Vec<StepEntry> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            ATTACHMENT_LINE
                .captures(line.trim())
                .and_then(|caps| caps["id"].parse().ok())
                .map(StepEntry::Attachment)
                .unwrap_or_else(|| StepEntry::Text(line.to_string()))
        })
        .collect()
}

/// Merge runs of consecutive text entries, joined by newlines. Attachment
/// entries are never merged and break a run.
pub fn merge_entries(entries: Vec<StepEntry>) -> Vec<StepEntry> {
    let mut merged: Vec<StepEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if let (Some(StepEntry::Text(last)), StepEntry::Text(next)) = (merged.last_mut(), &entry) {
            last.push('\n');
            last.push_str(next);
            continue;
        }
        merged.push(entry);
    }
    merged
}

pub fn normalize_text(text: &str) -> Vec<StepEntry> {
    merge_entries(split_lines(text))
}
