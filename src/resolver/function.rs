//! Function definitions and their parameterized form.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::{ComputationTarget, ValueRequirement, ValueSpecification};

/// Default parameters attached to a function when it is registered.
/// Opaque to the engine; shipped with every job item.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct FunctionParameters(pub BTreeMap<String, serde_json::Value>);

impl FunctionParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An analytic function as registered with the engine. Implementations are
/// external collaborators; the engine only consults the declared shape.
pub trait FunctionDefinition: Send + Sync {
    /// Stable unique id, used in specifications and job items.
    fn unique_id(&self) -> &str;

    /// True if the function can operate on the target at all.
    fn can_apply(&self, target: &ComputationTarget) -> bool;

    /// The specification this function would produce for the requirement, or
    /// `None` if it cannot satisfy it.
    fn result_specification(
        &self,
        requirement: &ValueRequirement,
        target: &ComputationTarget,
    ) -> Option<ValueSpecification>;

    /// Input requirements needed before this function can run on the target.
    fn input_requirements(
        &self,
        target: &ComputationTarget,
        requirement: &ValueRequirement,
    ) -> Vec<ValueRequirement>;

    /// Live-data inputs the function subscribes to directly. These drive the
    /// delta calculator, not graph edges.
    fn required_live_data(&self, _target: &ComputationTarget) -> Vec<ValueRequirement> {
        Vec::new()
    }

    /// Parameters applied when no explicit parameterization is registered.
    fn default_parameters(&self) -> FunctionParameters {
        FunctionParameters::new()
    }
}

/// A function definition bound to a concrete parameter set.
#[derive(Clone)]
pub struct ParameterizedFunction {
    function: Arc<dyn FunctionDefinition>,
    parameters: FunctionParameters,
}

impl ParameterizedFunction {
    pub fn new(function: Arc<dyn FunctionDefinition>, parameters: FunctionParameters) -> Self {
        Self {
            function,
            parameters,
        }
    }

    /// Binds the function to its own default parameters.
    pub fn with_defaults(function: Arc<dyn FunctionDefinition>) -> Self {
        let parameters = function.default_parameters();
        Self::new(function, parameters)
    }

    pub fn function(&self) -> &Arc<dyn FunctionDefinition> {
        &self.function
    }

    pub fn unique_id(&self) -> &str {
        self.function.unique_id()
    }

    pub fn parameters(&self) -> &FunctionParameters {
        &self.parameters
    }
}

impl fmt::Debug for ParameterizedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterizedFunction")
            .field("unique_id", &self.unique_id())
            .field("parameters", &self.parameters)
            .finish()
    }
}
