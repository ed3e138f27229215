//! Session wizard: configuration, gating and the task batch it produces.

pub mod batch;
pub mod catalog;
pub mod state;

pub use batch::{TaskBatch, FINAL_SUMMARY_TASK};
pub use catalog::DeliverableKind;
pub use state::{Outcome, StartType, WizardState, WizardStep, MIN_DESCRIPTION_LEN};
