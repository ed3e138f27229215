//! Wizard state machine: Context → Deliverables → Execute → Done.
//!
//! The state is transient. It is rebuilt from the backend status whenever a
//! session is selected and never written back except as task prompts.

use super::batch::TaskBatch;
use super::catalog::DeliverableKind;
use crate::error::{FoundryError, Result};
use crate::session::{Blob, SessionStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use strum::{Display, EnumString};

/// Trimmed length a free-text description needs before it can be submitted.
pub const MIN_DESCRIPTION_LEN: usize = 20;

/// What the user starts the batch from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StartType {
    /// An uploaded bill of materials (spreadsheet or CSV)
    Bom,
    /// A free-text product description
    Description,
    /// An uploaded sketch image
    Sketch,
}

impl StartType {
    /// Whether `blob` can serve as the source artifact for this start type.
    pub fn accepts(self, blob: &Blob) -> bool {
        match self {
            Self::Bom => blob.is_tabular(),
            Self::Sketch => blob.is_image(),
            Self::Description => false,
        }
    }
}

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed,
}

impl Outcome {
    pub fn from_status(status: SessionStatus) -> Option<Self> {
        match status {
            SessionStatus::Completed => Some(Self::Completed),
            SessionStatus::Cancelled => Some(Self::Cancelled),
            SessionStatus::Error => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Completed => "Completed.",
            Self::Cancelled => "Cancelled.",
            Self::Failed => "Failed.",
        }
    }

    /// Cancelled and failed batches can be resumed.
    pub fn can_retry(self) -> bool {
        !matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "outcome", rename_all = "lowercase")]
pub enum WizardStep {
    Context,
    Deliverables,
    Execute,
    Done(Outcome),
}

impl WizardStep {
    /// One-based position in the flow.
    pub fn number(self) -> u8 {
        match self {
            Self::Context => 1,
            Self::Deliverables => 2,
            Self::Execute => 3,
            Self::Done(_) => 4,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Deliverables => "deliverables",
            Self::Execute => "execute",
            Self::Done(Outcome::Completed) => "done (completed)",
            Self::Done(Outcome::Cancelled) => "done (cancelled)",
            Self::Done(Outcome::Failed) => "done (failed)",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    step: WizardStep,
    pub start_type: Option<StartType>,
    pub product_description: String,
    pub target_columns: String,
    selected: BTreeSet<DeliverableKind>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Context,
            start_type: None,
            product_description: String::new(),
            target_columns: String::new(),
            selected: BTreeSet::new(),
        }
    }

    /// Reconstructs the wizard for a session from its backend status.
    pub fn from_status(status: SessionStatus) -> Self {
        let mut state = Self::new();
        state.step = match status {
            SessionStatus::Processing => WizardStep::Execute,
            other => match Outcome::from_status(other) {
                Some(outcome) => WizardStep::Done(outcome),
                None => WizardStep::Context,
            },
        };
        state
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    /// Selected deliverables in catalog order.
    pub fn selected_deliverables(&self) -> impl Iterator<Item = DeliverableKind> + '_ {
        self.selected.iter().copied()
    }

    pub fn is_selected(&self, kind: DeliverableKind) -> bool {
        self.selected.contains(&kind)
    }

    fn require(&self, expected: WizardStep, action: &str) -> Result<()> {
        if self.step != expected {
            return Err(FoundryError::invalid_transition(self.step.to_string(), action));
        }
        Ok(())
    }

    pub fn set_start_type(&mut self, start_type: StartType) -> Result<()> {
        self.require(WizardStep::Context, "choose a start type")?;
        self.start_type = Some(start_type);
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> Result<()> {
        self.require(WizardStep::Context, "edit the description")?;
        self.product_description = description.into();
        Ok(())
    }

    pub fn set_target_columns(&mut self, columns: impl Into<String>) -> Result<()> {
        self.require(WizardStep::Context, "edit the target columns")?;
        self.target_columns = columns.into();
        Ok(())
    }

    /// Flips a deliverable's selection. Returns whether it is now selected.
    pub fn toggle_deliverable(&mut self, kind: DeliverableKind) -> Result<bool> {
        self.require(WizardStep::Deliverables, "change deliverables")?;
        if self.selected.remove(&kind) {
            Ok(false)
        } else {
            self.selected.insert(kind);
            Ok(true)
        }
    }

    pub fn select_deliverables(&mut self, kinds: impl IntoIterator<Item = DeliverableKind>) -> Result<()> {
        self.require(WizardStep::Deliverables, "change deliverables")?;
        self.selected.extend(kinds);
        Ok(())
    }

    /// Checks the Context gate against the session's current artifacts.
    pub fn validate_context(&self, blobs: &[Blob]) -> Result<()> {
        match self.start_type {
            None => Err(FoundryError::validation("choose how to start: bom, description or sketch")),
            Some(StartType::Description) => {
                let len = self.product_description.trim().chars().count();
                if len < MIN_DESCRIPTION_LEN {
                    Err(FoundryError::validation(format!(
                        "description must be at least {MIN_DESCRIPTION_LEN} characters (got {len})"
                    )))
                } else {
                    Ok(())
                }
            }
            Some(start_type) => {
                if blobs.iter().any(|blob| start_type.accepts(blob)) {
                    Ok(())
                } else {
                    let expected = match start_type {
                        StartType::Sketch => "an image (png, jpg, jpeg, webp)",
                        _ => "a spreadsheet (xlsx, xls, csv)",
                    };
                    Err(FoundryError::validation(format!(
                        "upload {expected} before continuing"
                    )))
                }
            }
        }
    }

    /// Context → Deliverables, gated on [`Self::validate_context`].
    pub fn advance(&mut self, blobs: &[Blob]) -> Result<()> {
        self.require(WizardStep::Context, "continue")?;
        self.validate_context(blobs)?;
        self.step = WizardStep::Deliverables;
        Ok(())
    }

    /// Deliverables → Context.
    pub fn back(&mut self) -> Result<()> {
        self.require(WizardStep::Deliverables, "go back")?;
        self.step = WizardStep::Context;
        Ok(())
    }

    /// Builds the ordered task batch from the current configuration.
    pub fn build_batch(&self) -> Result<TaskBatch> {
        self.require(WizardStep::Deliverables, "submit")?;
        let start_type = self
            .start_type
            .ok_or_else(|| FoundryError::validation("choose how to start: bom, description or sketch"))?;
        TaskBatch::build(
            start_type,
            &self.product_description,
            &self.target_columns,
            self.selected_deliverables(),
        )
    }

    /// Deliverables → Execute. Called only once the batch was accepted.
    pub fn mark_submitted(&mut self) -> Result<()> {
        self.require(WizardStep::Deliverables, "submit")?;
        self.step = WizardStep::Execute;
        Ok(())
    }

    /// Feeds a backend status observed while executing.
    ///
    /// Returns the outcome when this status finished the batch.
    pub fn observe_status(&mut self, status: SessionStatus) -> Option<Outcome> {
        if self.step != WizardStep::Execute {
            return None;
        }
        let outcome = Outcome::from_status(status)?;
        self.step = WizardStep::Done(outcome);
        Some(outcome)
    }

    /// Done (cancelled or failed) → Execute.
    pub fn retry(&mut self) -> Result<()> {
        match self.step {
            WizardStep::Done(outcome) if outcome.can_retry() => {
                self.step = WizardStep::Execute;
                Ok(())
            }
            step => Err(FoundryError::invalid_transition(step.to_string(), "retry")),
        }
    }

    /// Done → Context with an empty deliverable selection. Artifacts and the
    /// rest of the configuration are kept.
    pub fn start_new_batch(&mut self) -> Result<()> {
        match self.step {
            WizardStep::Done(_) => {
                self.step = WizardStep::Context;
                self.selected.clear();
                Ok(())
            }
            step => Err(FoundryError::invalid_transition(step.to_string(), "start a new batch")),
        }
    }
}
