//! Resolution rules: (parameterized function, applicability filter, priority).

use std::fmt;
use std::sync::Arc;

use crate::value::{ComputationTarget, ComputationTargetType, ValueRequirement, ValueSpecification};

use super::function::ParameterizedFunction;

/// Applicability predicate over computation targets.
pub trait ComputationTargetFilter: Send + Sync {
    fn accept(&self, target: &ComputationTarget) -> bool;
}

/// Accepts every target.
pub struct ApplyToAllTargets;

impl ComputationTargetFilter for ApplyToAllTargets {
    fn accept(&self, _target: &ComputationTarget) -> bool {
        true
    }
}

/// Accepts only targets of one type.
pub struct TargetTypeFilter(pub ComputationTargetType);

impl ComputationTargetFilter for TargetTypeFilter {
    fn accept(&self, target: &ComputationTarget) -> bool {
        target.target_type() == self.0
    }
}

/// "This function, with these parameters, can satisfy requirements of this
/// shape." Immutable once registered.
#[derive(Clone)]
pub struct ResolutionRule {
    function: ParameterizedFunction,
    filter: Arc<dyn ComputationTargetFilter>,
    priority: i32,
}

impl ResolutionRule {
    pub fn new(
        function: ParameterizedFunction,
        filter: Arc<dyn ComputationTargetFilter>,
        priority: i32,
    ) -> Self {
        Self {
            function,
            filter,
            priority,
        }
    }

    /// Priority-0 rule applying the function to every target it accepts.
    pub fn apply_to_all(function: ParameterizedFunction) -> Self {
        Self::new(function, Arc::new(ApplyToAllTargets), 0)
    }

    pub fn function(&self) -> &ParameterizedFunction {
        &self.function
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// The specification this rule can produce for the requirement, or `None`
    /// if the rule is not applicable.
    pub fn result_for(
        &self,
        requirement: &ValueRequirement,
        target: &ComputationTarget,
    ) -> Option<ValueSpecification> {
        if !self.filter.accept(target) {
            return None;
        }
        if !self.function.function().can_apply(target) {
            return None;
        }
        self.function
            .function()
            .result_specification(requirement, target)
            .filter(|spec| spec.satisfies(requirement))
    }
}

impl fmt::Debug for ResolutionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionRule")
            .field("function", &self.function.unique_id())
            .field("priority", &self.priority)
            .finish()
    }
}
