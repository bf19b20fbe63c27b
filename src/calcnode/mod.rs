//! Calculation job wire model and the remote execution boundary.

mod job_item;
mod result;

pub use job_item::{CalculationJobItem, JobItemInputs};
pub use result::{CalculationJobResult, CalculationJobResultItem, JobItemOutcome};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheSelectHint, IdentifierMap};
use crate::errors::{CacheError, ExecutionError};

/// Addresses which dispatch this is, independent of its content.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct CalculationJobSpecification {
    /// Owning view process
    pub view_process_id: String,
    pub calc_config_name: String,
    /// Evaluation iteration the job belongs to, epoch ms
    pub iteration_timestamp_ms: u64,
    /// Job id, unique within the view process
    pub job_id: u64,
}

impl CalculationJobSpecification {
    pub fn new(
        view_process_id: impl Into<String>,
        calc_config_name: impl Into<String>,
        iteration_timestamp_ms: u64,
        job_id: u64,
    ) -> Self {
        Self {
            view_process_id: view_process_id.into(),
            calc_config_name: calc_config_name.into(),
            iteration_timestamp_ms,
            job_id,
        }
    }
}

/// A dispatchable unit of remote work: specification, cache routing hint and
/// the job items to run.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CalculationJob {
    pub specification: CalculationJobSpecification,
    pub cache_select_hint: CacheSelectHint,
    pub items: Vec<CalculationJobItem>,
}

impl CalculationJob {
    pub fn new(
        specification: CalculationJobSpecification,
        cache_select_hint: CacheSelectHint,
        items: Vec<CalculationJobItem>,
    ) -> Self {
        Self {
            specification,
            cache_select_hint,
            items,
        }
    }

    /// Converts every item's inputs and the cache hint to compact
    /// identifiers before the job goes on the wire.
    pub fn convert(&mut self, identifier_map: &dyn IdentifierMap) {
        for item in &mut self.items {
            item.convert_inputs(identifier_map);
        }
        self.cache_select_hint.convert_specifications(identifier_map);
    }

    /// Resolves every item's inputs and the cache hint back to full
    /// specifications after receipt.
    pub fn resolve(&mut self, identifier_map: &dyn IdentifierMap) -> Result<(), CacheError> {
        for item in &mut self.items {
            item.resolve_inputs(identifier_map)?;
        }
        self.cache_select_hint.resolve_specifications(identifier_map)
    }
}

/// The function execution collaborator: runs a job on a worker node and
/// returns per-item outcomes. Invoked once per fragment dispatch.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: CalculationJob) -> Result<CalculationJobResult, ExecutionError>;
}
