//! Deliverable catalog and the instruction templates behind each entry.

use crate::error::Result;
use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use super::state::StartType;

/// A document the backend can generate at the end of a session.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeliverableKind {
    CostEstimate,
    SupplierShortlist,
    ManufacturingPlan,
    RiskAssessment,
    ComplianceChecklist,
    AssemblyInstructions,
}

impl DeliverableKind {
    pub fn all() -> Vec<Self> {
        Self::iter().collect()
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::CostEstimate => "Cost Estimate",
            Self::SupplierShortlist => "Supplier Shortlist",
            Self::ManufacturingPlan => "Manufacturing Plan",
            Self::RiskAssessment => "Risk Assessment",
            Self::ComplianceChecklist => "Compliance Checklist",
            Self::AssemblyInstructions => "Assembly Instructions",
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            Self::CostEstimate => "Per-part and total cost breakdown at prototype and volume quantities",
            Self::SupplierShortlist => "Candidate suppliers per part with lead times and alternates",
            Self::ManufacturingPlan => "Process selection, tooling and production sequencing",
            Self::RiskAssessment => "Single-source, obsolescence and pricing risks",
            Self::ComplianceChecklist => "Applicable standards and certifications to plan for",
            Self::AssemblyInstructions => "Step-by-step assembly procedure",
        }
    }

    fn template(self) -> &'static str {
        match self {
            Self::CostEstimate => {
                "Produce a cost estimate for {{ product }}. List each part with unit cost at 100 and 10,000 units, \
                 then the total. Save it as a spreadsheet named cost_estimate.xlsx.{% if columns %} \
                 Include the columns: {{ columns }}.{% endif %}"
            }
            Self::SupplierShortlist => {
                "Build a supplier shortlist for {{ product }}. For every part give up to three suppliers \
                 with lead time and minimum order quantity. Save it as supplier_shortlist.xlsx.{% if columns %} \
                 Include the columns: {{ columns }}.{% endif %}"
            }
            Self::ManufacturingPlan => {
                "Write a manufacturing plan for {{ product }} covering process selection, tooling and a phased \
                 production schedule. Save it as manufacturing_plan.md."
            }
            Self::RiskAssessment => {
                "Assess supply chain risk for {{ product }}: single-source parts, end-of-life components and \
                 price outliers. Save it as risk_assessment.md."
            }
            Self::ComplianceChecklist => {
                "List the regulatory standards and certifications that apply to {{ product }} and what each \
                 requires. Save it as compliance_checklist.md."
            }
            Self::AssemblyInstructions => {
                "Write step-by-step assembly instructions for {{ product }} referencing parts by their BOM line. \
                 Save it as assembly_instructions.md."
            }
        }
    }

    /// Renders the instruction for this deliverable.
    pub fn render(self, start_type: StartType, description: &str, target_columns: &str) -> Result<String> {
        let product = match start_type {
            StartType::Description if !description.trim().is_empty() => {
                format!("the product described as \"{}\"", description.trim())
            }
            StartType::Bom => "the product in the uploaded bill of materials".to_string(),
            StartType::Sketch => "the product in the uploaded sketch".to_string(),
            StartType::Description => "the product".to_string(),
        };

        let env = Environment::new();
        let rendered = env.render_str(
            self.template(),
            context! {
                product => product,
                columns => target_columns.trim(),
            },
        )?;
        Ok(rendered)
    }
}
