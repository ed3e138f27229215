//! Human-readable progress for a running batch.

use crate::wizard::Outcome;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Progress {
    /// Submitted total is known: "done/total".
    Counted { completed: usize, total: usize },
    /// Total unknown (e.g. rejoined a session started elsewhere).
    Pending { pending: usize },
    Finished { outcome: Outcome },
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counted { completed, total } => write!(f, "{completed}/{total}"),
            Self::Pending { pending } => write!(f, "{pending} pending"),
            Self::Finished { outcome } => f.write_str(outcome.label()),
        }
    }
}

/// Derives [`Progress`] from successive `pending_tasks` lengths.
///
/// The displayed completed count never goes backwards within one submission,
/// even if the backend briefly reports a longer queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressTracker {
    submitted_total: Option<usize>,
    completed: usize,
}

impl ProgressTracker {
    pub fn new(submitted_total: Option<usize>) -> Self {
        Self {
            submitted_total,
            completed: 0,
        }
    }

    pub fn submitted_total(&self) -> Option<usize> {
        self.submitted_total
    }

    pub fn observe(&mut self, pending: usize) -> Progress {
        match self.submitted_total {
            Some(total) => {
                self.completed = self.completed.max(total.saturating_sub(pending));
                Progress::Counted {
                    completed: self.completed,
                    total,
                }
            }
            None => Progress::Pending { pending },
        }
    }

    pub fn finish(&self, outcome: Outcome) -> Progress {
        Progress::Finished { outcome }
    }
}
