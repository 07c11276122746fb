//! Attachment id-remap table.
//!
//! Scoped to one copy or restore of one entity. Steps whose attachment has
//! no mapping get a visible placeholder body instead of a dangling id.

use std::collections::BTreeMap;

use crate::scenario::model::ScenarioNormalized;

pub fn missing_attachment_body(attachment_id: i64) -> String {
    format!("Missing attachment with id '{}'", attachment_id)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentRemap {
    ids: BTreeMap<i64, i64>,
}

impl AttachmentRemap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, old_id: i64, new_id: i64) {
        self.ids.insert(old_id, new_id);
    }

    pub fn resolve(&self, old_id: i64) -> Option<i64> {
        self.ids.get(&old_id).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Rewrite every step's attachment id in place. Unmapped attachments
    /// become placeholder text. Returns the old ids that had no mapping.
    pub fn rewrite(&self, scenario: &mut ScenarioNormalized) -> Vec<i64> {
        let mut missing = Vec::new();
        for step in scenario.scenario_steps.values_mut() {
            let Some(old_id) = step.attachment_id else {
                continue;
            };
            match self.resolve(old_id) {
                Some(new_id) => step.attachment_id = Some(new_id),
                None => {
                    step.attachment_id = None;
                    step.body = Some(missing_attachment_body(old_id));
                    missing.push(old_id);
                }
            }
        }
        scenario.attachments = std::mem::take(&mut scenario.attachments)
            .into_values()
            .filter_map(|mut attachment| {
                let new_id = self.resolve(attachment.id)?;
                attachment.id = new_id;
                Some((new_id, attachment))
            })
            .collect();
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::model::{Attachment, ScenarioRoot, ScenarioStep};

    #[test]
    fn test_rewrite_with_missing_mapping() {
        let mut scenario = ScenarioNormalized {
            root: ScenarioRoot {
                children: vec![1, 2, 3],
            },
            scenario_steps: [
                (1, ScenarioStep { id: 1, attachment_id: Some(10), ..Default::default() }),
                (2, ScenarioStep { id: 2, attachment_id: Some(11), ..Default::default() }),
                (3, ScenarioStep { id: 3, body: Some("text".into()), ..Default::default() }),
            ]
            .into_iter()
            .collect(),
            attachments: [10, 11]
                .into_iter()
                .map(|id| {
                    (
                        id,
                        Attachment {
                            id,
                            name: format!("file-{}", id),
                            content_type: "image/png".into(),
                            content_length: None,
                        },
                    )
                })
                .collect(),
        };

        let mut remap = AttachmentRemap::new();
        remap.record(10, 100);
        let missing = remap.rewrite(&mut scenario);

        assert_eq!(missing, vec![11]);
        assert_eq!(scenario.scenario_steps[&1].attachment_id, Some(100));
        assert_eq!(scenario.scenario_steps[&2].attachment_id, None);
        assert_eq!(
            scenario.scenario_steps[&2].body.as_deref(),
            Some("Missing attachment with id '11'")
        );
        assert_eq!(scenario.scenario_steps[&3].body.as_deref(), Some("text"));
        assert_eq!(scenario.attachments.keys().copied().collect::<Vec<_>>(), vec![100]);
        assert_eq!(scenario.attachments[&100].name, "file-10");
    }
}
