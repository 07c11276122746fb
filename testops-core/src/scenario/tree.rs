//! Tree navigation and invariant checks over a normalized scenario.

use std::collections::HashSet;

use super::model::{ScenarioNormalized, ScenarioStep};

/// A broken structural invariant found in a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeViolation {
    /// A child or expected-result id that is not in `scenario_steps`.
    DanglingStep { parent: Option<i64>, step_id: i64 },
    /// A reference step that also carries a body or attachment.
    ReferenceWithContent { step_id: i64 },
    /// An expected-result node that itself has an expected-result branch.
    NestedExpectedResult { step_id: i64 },
    /// A step reachable twice from the root.
    SharedNode { step_id: i64 },
}

impl ScenarioNormalized {
    pub fn step(&self, id: i64) -> Option<&ScenarioStep> {
        self.scenario_steps.get(&id)
    }

    pub fn top_level(&self) -> &[i64] {
        &self.root.children
    }

    /// Children of the expected-result branch of `step`, if it has one.
    pub fn expected_children(&self, step: &ScenarioStep) -> &[i64] {
        step.expected_result_id
            .and_then(|id| self.step(id))
            .map(|expected| expected.children.as_slice())
            .unwrap_or(&[])
    }

    /// The step that displays the given attachment.
    pub fn step_with_attachment(&self, attachment_id: i64) -> Option<&ScenarioStep> {
        self.scenario_steps
            .values()
            .find(|step| step.attachment_id == Some(attachment_id))
    }

    /// All reachable step ids in creation order: a step, then its
    /// expected-result node and that branch, then its ordinary children.
    pub fn pre_order(&self) -> Vec<i64> {
        let mut order = Vec::with_capacity(self.scenario_steps.len());
        let mut seen = HashSet::new();
        let mut stack: Vec<i64> = self.root.children.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(step) = self.step(id) else {
                continue;
            };
            order.push(id);
            stack.extend(step.children.iter().rev().copied());
            if let Some(expected_id) = step.expected_result_id {
                stack.push(expected_id);
            }
        }
        order
    }

    /// Shape of a legacy "step with one expected result sub-step": at most
    /// one direct child, and that child has no children.
    pub fn has_legacy_expected_shape(&self, step: &ScenarioStep) -> bool {
        match step.children.as_slice() {
            [] => true,
            [only] => self
                .step(*only)
                .map(|child| child.children.is_empty())
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Indented one-line-per-step rendering, independent of step ids.
    /// Attachment ids are shown by name so trees copied across entities
    /// compare equal.
    pub fn outline(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut stack: Vec<(usize, i64)> =
            self.root.children.iter().rev().map(|id| (0, *id)).collect();

        while let Some((depth, id)) = stack.pop() {
            let indent = "  ".repeat(depth);
            let Some(step) = self.step(id) else {
                lines.push(format!("{}<missing {}>", indent, id));
                continue;
            };
            let label = if let Some(shared_step_id) = step.shared_step_id {
                format!("shared step {}", shared_step_id)
            } else if let Some(attachment_id) = step.attachment_id {
                match self.attachments.get(&attachment_id) {
                    Some(attachment) => format!("attachment {}", attachment.name),
                    None => format!("attachment #{}", attachment_id),
                }
            } else {
                step.body.clone().unwrap_or_default()
            };
            lines.push(format!("{}{}", indent, label));

            stack.extend(step.children.iter().rev().map(|child| (depth + 1, *child)));
            if let Some(expected) = step.expected_result_id.and_then(|e| self.step(e)) {
                stack.extend(expected.children.iter().rev().map(|child| (depth + 2, *child)));
                lines.push(format!("{}  expected:", indent));
            }
        }
        lines
    }

    /// Check the structural invariants of the tree.
    pub fn violations(&self) -> Vec<TreeViolation> {
        let mut violations = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<(Option<i64>, i64)> =
            self.root.children.iter().map(|id| (None, *id)).collect();

        while let Some((parent, id)) = stack.pop() {
            let Some(step) = self.step(id) else {
                violations.push(TreeViolation::DanglingStep { parent, step_id: id });
                continue;
            };
            if !seen.insert(id) {
                violations.push(TreeViolation::SharedNode { step_id: id });
                continue;
            }
            if step.is_reference() && (step.body.is_some() || step.attachment_id.is_some()) {
                violations.push(TreeViolation::ReferenceWithContent { step_id: id });
            }
            if let Some(expected_id) = step.expected_result_id {
                match self.step(expected_id) {
                    Some(expected) if expected.expected_result_id.is_some() => {
                        violations.push(TreeViolation::NestedExpectedResult {
                            step_id: expected_id,
                        });
                    }
                    _ => {}
                }
                stack.push((Some(id), expected_id));
            }
            stack.extend(step.children.iter().map(|child| (Some(id), *child)));
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::model::ScenarioRoot;

    fn step(id: i64, children: Vec<i64>) -> ScenarioStep {
        ScenarioStep {
            id,
            body: Some(format!("step {}", id)),
            children,
            ..ScenarioStep::default()
        }
    }

    fn scenario(top: Vec<i64>, steps: Vec<ScenarioStep>) -> ScenarioNormalized {
        ScenarioNormalized {
            root: ScenarioRoot { children: top },
            scenario_steps: steps.into_iter().map(|s| (s.id, s)).collect(),
            attachments: Default::default(),
        }
    }

    #[test]
    fn test_pre_order_visits_expected_branch_before_children() {
        let mut first = step(1, vec![4]);
        first.expected_result_id = Some(2);
        let s = scenario(
            vec![1, 5],
            vec![first, step(2, vec![3]), step(3, vec![]), step(4, vec![]), step(5, vec![])],
        );
        assert_eq!(s.pre_order(), vec![1, 2, 3, 4, 5]);
        assert_eq!(s.expected_children(s.step(1).unwrap()), &[3]);
    }

    #[test]
    fn test_outline() {
        let mut first = step(1, vec![4]);
        first.expected_result_id = Some(2);
        let mut s = scenario(
            vec![1, 5],
            vec![first, step(2, vec![3]), step(3, vec![]), step(4, vec![]), step(5, vec![])],
        );
        s.scenario_steps.get_mut(&5).unwrap().attachment_id = Some(9);
        assert_eq!(
            s.outline(),
            vec![
                "step 1",
                "  expected:",
                "    step 3",
                "  step 4",
                "attachment #9",
            ]
        );
    }

    #[test]
    fn test_legacy_expected_shape() {
        let s = scenario(
            vec![1, 3, 5],
            vec![
                step(1, vec![2]),
                step(2, vec![]),
                step(3, vec![4, 6]),
                step(4, vec![]),
                step(6, vec![]),
                step(5, vec![7]),
                step(7, vec![8]),
                step(8, vec![]),
            ],
        );
        assert!(s.has_legacy_expected_shape(s.step(1).unwrap()));
        assert!(s.has_legacy_expected_shape(s.step(2).unwrap()));
        assert!(!s.has_legacy_expected_shape(s.step(3).unwrap()));
        assert!(!s.has_legacy_expected_shape(s.step(5).unwrap()));
    }

    #[test]
    fn test_violations() {
        let mut reference = step(1, vec![]);
        reference.shared_step_id = Some(77);
        let mut owner = step(2, vec![9]);
        owner.expected_result_id = Some(3);
        let mut nested = step(3, vec![]);
        nested.expected_result_id = Some(4);
        let s = scenario(vec![1, 2], vec![reference, owner, nested, step(4, vec![])]);

        let violations = s.violations();
        assert!(violations.contains(&TreeViolation::ReferenceWithContent { step_id: 1 }));
        assert!(violations.contains(&TreeViolation::NestedExpectedResult { step_id: 3 }));
        assert!(violations.contains(&TreeViolation::DanglingStep {
            parent: Some(2),
            step_id: 9
        }));
    }

    #[test]
    fn test_step_with_attachment() {
        let mut with_file = step(1, vec![]);
        with_file.body = None;
        with_file.attachment_id = Some(30);
        let s = scenario(vec![1], vec![with_file]);
        assert_eq!(s.step_with_attachment(30).map(|st| st.id), Some(1));
        assert!(s.step_with_attachment(31).is_none());
    }
}
