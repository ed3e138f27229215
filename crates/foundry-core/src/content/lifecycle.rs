//! Lifecycle section: the production phases of a session.
//!
//! A lifecycle with no steps is "undefined" and is presented differently from
//! a defined lifecycle sitting on its first step.

use crate::error::{FoundryError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const UNDEFINED_PHASE_LABEL: &str = "Pending Initiation";
pub const COMPLETED_PHASE_LABEL: &str = "Completed";
pub const NEW_STEP_LABEL: &str = "New Phase";

/// Ordered production phases and a cursor into them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    #[serde(default)]
    pub steps: Vec<String>,
    /// Zero-based index into `steps`. Equal to `steps.len()` once every
    /// phase is done.
    #[serde(rename = "currentStep", default)]
    pub current_step: usize,
    /// Fields written by other clients; carried through unchanged.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Presentation state of one step relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Completed,
    Active,
    Pending,
}

impl Lifecycle {
    pub fn new(steps: Vec<String>) -> Self {
        Self {
            steps,
            current_step: 0,
            extra: Map::new(),
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Label of the active step, if the cursor is on one.
    pub fn current_label(&self) -> Option<&str> {
        self.steps.get(self.current_step).map(String::as_str)
    }

    /// Label shown in overviews.
    pub fn phase_label(&self) -> &str {
        if !self.is_defined() {
            return UNDEFINED_PHASE_LABEL;
        }
        self.current_label().unwrap_or(COMPLETED_PHASE_LABEL)
    }

    pub fn step_state(&self, index: usize) -> StepState {
        match index.cmp(&self.current_step) {
            std::cmp::Ordering::Less => StepState::Completed,
            std::cmp::Ordering::Equal => StepState::Active,
            std::cmp::Ordering::Greater => StepState::Pending,
        }
    }

    /// Fraction of the progress rail that is filled, in `0.0..=1.0`.
    pub fn progress_fraction(&self) -> f64 {
        let span = self.steps.len().saturating_sub(1).max(1);
        (self.current_step as f64 / span as f64).min(1.0)
    }

    /// Moves the cursor. `index == steps.len()` marks every phase complete.
    pub fn set_current(&mut self, index: usize) -> Result<()> {
        if index > self.steps.len() {
            return Err(FoundryError::validation(format!(
                "step {} is out of range for a lifecycle with {} steps",
                index,
                self.steps.len()
            )));
        }
        self.current_step = index;
        Ok(())
    }

    pub fn add_step(&mut self, label: Option<&str>) {
        let label = label
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .unwrap_or(NEW_STEP_LABEL);
        self.steps.push(label.to_string());
    }

    pub fn rename_step(&mut self, index: usize, label: &str) -> Result<()> {
        let step = self.steps.get_mut(index).ok_or_else(|| {
            FoundryError::validation(format!("no step at index {index}"))
        })?;
        *step = label.trim().to_string();
        Ok(())
    }

    /// Removes a step, clamping the cursor so it stays in range.
    pub fn remove_step(&mut self, index: usize) -> Result<String> {
        if index >= self.steps.len() {
            return Err(FoundryError::validation(format!("no step at index {index}")));
        }
        let removed = self.steps.remove(index);
        self.current_step = self.current_step.min(self.steps.len());
        Ok(removed)
    }
}

/// Lifecycle position of a session, as shown on an overview card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleSummary {
    pub phase: String,
    pub current_index: usize,
    pub step_count: usize,
}

impl LifecycleSummary {
    pub fn from_lifecycle(lifecycle: Option<&Lifecycle>) -> Self {
        match lifecycle.filter(|lifecycle| lifecycle.is_defined()) {
            Some(lifecycle) => Self {
                phase: lifecycle.phase_label().to_string(),
                current_index: lifecycle.current_step,
                step_count: lifecycle.steps.len(),
            },
            None => Self {
                phase: UNDEFINED_PHASE_LABEL.to_string(),
                current_index: 0,
                step_count: 0,
            },
        }
    }
}

/// Finds the first JSON array of strings embedded in free text.
///
/// Assistant replies usually wrap the array in prose ("Here are the phases:
/// [...] Let me know..."), so candidates are located by bracket matching that
/// ignores brackets inside string literals. Blank entries are dropped; an
/// array with no usable entries is skipped.
pub fn extract_string_array(text: &str) -> Option<Vec<String>> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('[') {
        let start = search_from + offset;
        if let Some(end) = matching_bracket(text, start)
            && let Ok(items) = serde_json::from_str::<Vec<String>>(&text[start..=end])
        {
            let items: Vec<String> = items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect();
            if !items.is_empty() {
                return Some(items);
            }
        }
        search_from = start + 1;
    }
    None
}

fn matching_bracket(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle(steps: &[&str], current: usize) -> Lifecycle {
        let mut lifecycle = Lifecycle::new(steps.iter().map(|s| s.to_string()).collect());
        lifecycle.current_step = current;
        lifecycle
    }

    #[test]
    fn test_wire_format_uses_camel_case_cursor() {
        let lifecycle = lifecycle(&["Design", "Build"], 1);
        assert_eq!(
            serde_json::to_string(&lifecycle).unwrap(),
            r#"{"steps":["Design","Build"],"currentStep":1}"#
        );
    }

    #[test]
    fn test_missing_cursor_defaults_to_zero_and_extra_fields_survive() {
        let parsed: Lifecycle =
            serde_json::from_str(r#"{"steps":["A"],"owner":"ops"}"#).unwrap();
        assert_eq!(parsed.current_step, 0);
        let json: Value = serde_json::to_value(&parsed).unwrap();
        assert_eq!(json["owner"], "ops");
    }

    #[test]
    fn test_negative_cursor_is_rejected() {
        assert!(serde_json::from_str::<Lifecycle>(r#"{"steps":["A"],"currentStep":-1}"#).is_err());
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Lifecycle::default().phase_label(), UNDEFINED_PHASE_LABEL);
        assert_eq!(lifecycle(&["Design", "Build"], 0).phase_label(), "Design");
        assert_eq!(lifecycle(&["Design", "Build"], 2).phase_label(), COMPLETED_PHASE_LABEL);
    }

    #[test]
    fn test_undefined_differs_from_first_step() {
        let undefined = LifecycleSummary::from_lifecycle(Some(&Lifecycle::default()));
        let first = LifecycleSummary::from_lifecycle(Some(&lifecycle(&["Design"], 0)));
        assert_eq!(undefined.step_count, 0);
        assert_eq!(first.step_count, 1);
        assert_ne!(undefined, first);
        assert_eq!(LifecycleSummary::from_lifecycle(None), undefined);
    }

    #[test]
    fn test_step_states_and_progress() {
        let lifecycle = lifecycle(&["A", "B", "C"], 1);
        assert_eq!(lifecycle.step_state(0), StepState::Completed);
        assert_eq!(lifecycle.step_state(1), StepState::Active);
        assert_eq!(lifecycle.step_state(2), StepState::Pending);
        assert!((lifecycle.progress_fraction() - 0.5).abs() < f64::EPSILON);
        assert_eq!(Lifecycle::default().progress_fraction(), 0.0);
    }

    #[test]
    fn test_editing_steps() {
        let mut lifecycle = lifecycle(&["A", "B", "C"], 3);
        lifecycle.add_step(None);
        assert_eq!(lifecycle.steps.last().map(String::as_str), Some(NEW_STEP_LABEL));

        lifecycle.rename_step(3, " Ship ").unwrap();
        assert_eq!(lifecycle.steps[3], "Ship");

        lifecycle.remove_step(0).unwrap();
        lifecycle.remove_step(0).unwrap();
        assert_eq!(lifecycle.steps, vec!["C", "Ship"]);
        assert_eq!(lifecycle.current_step, 2);

        assert!(lifecycle.set_current(3).is_err());
        lifecycle.set_current(1).unwrap();
        assert_eq!(lifecycle.current_label(), Some("Ship"));
        assert!(lifecycle.remove_step(5).is_err());
    }

    #[test]
    fn test_extract_array_from_prose() {
        let reply = "Sure! Based on the BOM [rev B], here are the phases:\n\
                     [\"Design Review\", \"Prototype [v1]\", \"Tooling\", \"Mass Production\"]\n\
                     Let me know if you want changes.";
        assert_eq!(
            extract_string_array(reply),
            Some(vec![
                "Design Review".to_string(),
                "Prototype [v1]".to_string(),
                "Tooling".to_string(),
                "Mass Production".to_string(),
            ])
        );
    }

    #[test]
    fn test_extract_array_handles_code_fences_and_escapes() {
        let reply = "```json\n[\"Say \\\"hi\\\"\", \"QA\"]\n```";
        assert_eq!(
            extract_string_array(reply),
            Some(vec!["Say \"hi\"".to_string(), "QA".to_string()])
        );
    }

    #[test]
    fn test_extract_array_none_when_absent() {
        assert_eq!(extract_string_array("No list here."), None);
        assert_eq!(extract_string_array("Numbers only: [1, 2, 3]"), None);
        assert_eq!(extract_string_array("Unclosed [\"a\", \"b\""), None);
        assert_eq!(extract_string_array("[\"  \"]"), None);
    }
}
