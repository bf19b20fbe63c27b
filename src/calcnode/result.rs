//! Results returned by worker nodes.

use serde::{Deserialize, Serialize};

use crate::value::{ComputationTargetSpecification, ComputedValue};

use super::CalculationJobSpecification;

/// Outcome of one job item: success with the produced values, or a failure
/// attributable to the specific function/target that failed.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum JobItemOutcome {
    Success { values: Vec<ComputedValue> },
    Failed { message: String },
}

/// Per-item result within a job.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculationJobResultItem {
    pub function_unique_id: String,
    pub target: ComputationTargetSpecification,
    pub outcome: JobItemOutcome,
}

impl CalculationJobResultItem {
    pub fn success(
        function_unique_id: impl Into<String>,
        target: ComputationTargetSpecification,
        values: Vec<ComputedValue>,
    ) -> Self {
        Self {
            function_unique_id: function_unique_id.into(),
            target,
            outcome: JobItemOutcome::Success { values },
        }
    }

    pub fn failure(
        function_unique_id: impl Into<String>,
        target: ComputationTargetSpecification,
        message: impl Into<String>,
    ) -> Self {
        Self {
            function_unique_id: function_unique_id.into(),
            target,
            outcome: JobItemOutcome::Failed {
                message: message.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, JobItemOutcome::Failed { .. })
    }
}

/// Result of one dispatched job.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculationJobResult {
    pub specification: CalculationJobSpecification,
    /// Wall time the worker spent on the job, in milliseconds
    pub duration_ms: u64,
    /// Identity of the worker node that ran the job
    pub compute_node_id: String,
    pub items: Vec<CalculationJobResultItem>,
}

impl CalculationJobResult {
    pub fn new(
        specification: CalculationJobSpecification,
        duration_ms: u64,
        compute_node_id: impl Into<String>,
        items: Vec<CalculationJobResultItem>,
    ) -> Self {
        Self {
            specification,
            duration_ms,
            compute_node_id: compute_node_id.into(),
            items,
        }
    }

    pub fn failed_items(&self) -> impl Iterator<Item = &CalculationJobResultItem> {
        self.items.iter().filter(|item| item.is_failed())
    }

    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|item| item.is_failed())
    }
}
