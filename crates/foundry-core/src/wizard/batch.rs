//! Ordered task batch submitted to the backend queue.
//!
//! Order matters: the backend runs tasks in submission order and later tasks
//! read artifacts produced by earlier ones. The batch is always
//! analysis → deliverables (catalog order) → final summary.

use super::catalog::DeliverableKind;
use super::state::StartType;
use crate::error::Result;
use serde::Serialize;

pub const FINAL_SUMMARY_TASK: &str = "Write a final summary of this session: list every document produced, \
     the key findings from the analysis and any open questions that need a decision from the team. \
     Save it as summary.md.";

fn analysis_task(start_type: StartType, description: &str, target_columns: &str) -> String {
    let columns = target_columns.trim();
    let columns_clause = if columns.is_empty() {
        String::new()
    } else {
        format!(" Normalise the data into these columns: {columns}.")
    };

    match start_type {
        StartType::Bom => format!(
            "Analyze the uploaded bill of materials. Identify every part, its quantity, manufacturer and \
             unit price, and flag missing or inconsistent entries.{columns_clause}"
        ),
        StartType::Description => format!(
            "Analyze the following product description and derive a preliminary bill of materials with \
             part names, quantities and likely manufacturers: \"{}\".{columns_clause}",
            description.trim()
        ),
        StartType::Sketch => format!(
            "Analyze the uploaded sketch. Identify the visible components, estimate dimensions and \
             materials, and derive a preliminary bill of materials.{columns_clause}"
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskBatch {
    tasks: Vec<String>,
}

impl TaskBatch {
    pub fn build(
        start_type: StartType,
        description: &str,
        target_columns: &str,
        deliverables: impl IntoIterator<Item = DeliverableKind>,
    ) -> Result<Self> {
        let mut tasks = vec![analysis_task(start_type, description, target_columns)];
        for kind in deliverables {
            tasks.push(kind.render(start_type, description, target_columns)?);
        }
        tasks.push(FINAL_SUMMARY_TASK.to_string());
        Ok(Self { tasks })
    }

    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn into_tasks(self) -> Vec<String> {
        self.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_order() {
        let batch = TaskBatch::build(
            StartType::Bom,
            "",
            "Part Number, Qty",
            [DeliverableKind::CostEstimate, DeliverableKind::RiskAssessment],
        )
        .unwrap();

        assert_eq!(batch.len(), 4);
        assert!(batch.tasks()[0].starts_with("Analyze the uploaded bill of materials"));
        assert!(batch.tasks()[0].contains("Part Number, Qty"));
        assert!(batch.tasks()[1].contains("cost_estimate.xlsx"));
        assert!(batch.tasks()[2].contains("risk_assessment.md"));
        assert_eq!(batch.tasks()[3], FINAL_SUMMARY_TASK);
    }

    #[test]
    fn test_no_deliverables_still_brackets_the_batch() {
        let batch = TaskBatch::build(StartType::Sketch, "", "", []).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.tasks()[0].contains("uploaded sketch"));
        assert!(!batch.tasks()[0].contains("Normalise"));
    }

    #[test]
    fn test_description_analysis_quotes_the_description() {
        let batch = TaskBatch::build(StartType::Description, " solar lantern with USB-C ", "", []).unwrap();
        assert!(batch.tasks()[0].contains("\"solar lantern with USB-C\""));
    }
}
