//! Legacy step body parser.
//!
//! Legacy steps carry an action and an expected result packed into one
//! body: the marker `expected` followed by a JSON object
//! `{"action": "...", "expected": "..."}`. Older exports wrote that object
//! without escaping, so a strict parse is tried first and a loose pattern
//! match second.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

pub const EXPECTED_MARKER: &str = "expected";

lazy_static! {
    static ref LOOSE_LEGACY_STEP: Regex = Regex::new(
        r#"(?s)^\{"action":"(?P<action>.*)","expected":"(?P<expected>.*?)"?\}?\s*$"#
    )
    .unwrap();
}

/// Action / expected-result pair decoded from a legacy body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyStep {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub expected: Option<String>,
}

impl LegacyStep {
    pub fn has_action(&self) -> bool {
        !self.action.trim().is_empty()
    }

    pub fn has_expected(&self) -> bool {
        self.expected
            .as_deref()
            .map(|e| !e.trim().is_empty())
            .unwrap_or(false)
    }
}

pub fn is_legacy_body(body: &str) -> bool {
    body.starts_with(EXPECTED_MARKER)
}

/// Decode a marked legacy body. `None` when the body is not marked or
/// neither parse recognises it.
pub fn parse_legacy_body(body: &str) -> Option<LegacyStep> {
    let payload = body.strip_prefix(EXPECTED_MARKER)?.trim();
    serde_json::from_str::<LegacyStep>(payload)
        .ok()
        .or_else(|| parse_loose(payload))
}

fn parse_loose(payload: &str) -> Option<LegacyStep> {
    let caps = LOOSE_LEGACY_STEP.captures(payload)?;
    Some(LegacyStep {
        action: unescape(&caps["action"]),
        expected: Some(unescape(&caps["expected"])),
    })
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => {}
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
