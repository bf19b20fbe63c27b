//! The unit of work shipped to a worker node.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cache::IdentifierMap;
use crate::errors::CacheError;
use crate::resolver::FunctionParameters;
use crate::value::{ComputationTargetSpecification, ValueRequirement, ValueSpecification};

/// Inputs of a job item: full specifications before conversion, compact
/// numeric identifiers on the wire. Never a mix.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum JobItemInputs {
    Specifications(Vec<ValueSpecification>),
    Identifiers(SmallVec<[u64; 8]>),
}

/// One function invocation to run remotely: function identity, parameters,
/// target and resolved inputs. The conversion between specification and
/// identifier input forms happens once per direction and is transparent to
/// the function invocation logic.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculationJobItem {
    pub function_unique_id: String,
    pub function_parameters: FunctionParameters,
    pub target: ComputationTargetSpecification,
    inputs: JobItemInputs,
    pub desired_values: Vec<ValueRequirement>,
}

impl CalculationJobItem {
    pub fn new(
        function_unique_id: impl Into<String>,
        function_parameters: FunctionParameters,
        target: ComputationTargetSpecification,
        inputs: Vec<ValueSpecification>,
        desired_values: Vec<ValueRequirement>,
    ) -> Self {
        Self {
            function_unique_id: function_unique_id.into(),
            function_parameters,
            target,
            inputs: JobItemInputs::Specifications(inputs),
            desired_values,
        }
    }

    /// The resolved input specifications. Empty until
    /// [`resolve_inputs`](Self::resolve_inputs) has run on a received item.
    pub fn inputs(&self) -> &[ValueSpecification] {
        match &self.inputs {
            JobItemInputs::Specifications(specs) => specs,
            JobItemInputs::Identifiers(_) => &[],
        }
    }

    /// The compact input identifiers, if converted.
    pub fn input_identifiers(&self) -> Option<&[u64]> {
        match &self.inputs {
            JobItemInputs::Identifiers(ids) => Some(ids),
            JobItemInputs::Specifications(_) => None,
        }
    }

    /// Converts full input specifications to numeric identifiers before the
    /// item goes on the wire. Idempotent.
    pub fn convert_inputs(&mut self, identifier_map: &dyn IdentifierMap) {
        if let JobItemInputs::Specifications(specs) = &self.inputs {
            let identifiers = identifier_map.identifiers(specs);
            self.inputs = JobItemInputs::Identifiers(identifiers.into());
        }
    }

    /// Resolves numeric identifiers back to full specifications after the
    /// item is received. Idempotent.
    pub fn resolve_inputs(&mut self, identifier_map: &dyn IdentifierMap) -> Result<(), CacheError> {
        if let JobItemInputs::Identifiers(identifiers) = &self.inputs {
            let specs = identifier_map.specifications(identifiers)?;
            self.inputs = JobItemInputs::Specifications(specs);
        }
        Ok(())
    }

    /// The specifications this item will produce: one per desired value,
    /// stamped with the item's function.
    pub fn outputs(&self) -> Vec<ValueSpecification> {
        self.desired_values
            .iter()
            .map(|requirement| ValueSpecification::new(requirement, &self.function_unique_id))
            .collect()
    }
}
