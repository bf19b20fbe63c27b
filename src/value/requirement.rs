//! Value requirements and specifications - the vocabulary of the engine.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::target::ComputationTargetSpecification;

/// Function identity stamped onto specifications produced directly from live
/// data subscriptions rather than by a registered function.
pub const LIVE_DATA_SOURCING_FUNCTION: &str = "LiveDataSourcingFunction";

/// Free-form constraints on a requirement. A `BTreeMap` so that equality,
/// ordering and hashing are structural and deterministic.
pub type ValueConstraints = BTreeMap<String, String>;

/// "I want value X computed for target Y under constraints Z."
///
/// Used as a dependency-graph edge before resolution and as a cache lookup
/// key. Equality is structural.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ValueRequirement {
    /// Name of the desired value, e.g. "FairValue"
    pub value_name: String,
    /// Target the value is computed for
    pub target: ComputationTargetSpecification,
    /// Constraint set, empty when unconstrained
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: ValueConstraints,
}

impl ValueRequirement {
    pub fn new(value_name: impl Into<String>, target: ComputationTargetSpecification) -> Self {
        Self {
            value_name: value_name.into(),
            target,
            constraints: ValueConstraints::new(),
        }
    }

    pub fn with_constraint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ValueRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueReq[{}, {}]", self.value_name, self.target)
    }
}

/// The resolved counterpart of a [`ValueRequirement`]: identifies not just
/// what is wanted but which function produced it. Two functions may produce
/// the same named value for the same target; the specification disambiguates.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ValueSpecification {
    pub value_name: String,
    pub target: ComputationTargetSpecification,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: ValueConstraints,
    /// Unique id of the producing function
    pub function_unique_id: String,
}

impl ValueSpecification {
    pub fn new(requirement: &ValueRequirement, function_unique_id: impl Into<String>) -> Self {
        Self {
            value_name: requirement.value_name.clone(),
            target: requirement.target.clone(),
            constraints: requirement.constraints.clone(),
            function_unique_id: function_unique_id.into(),
        }
    }

    /// Specification of a live-data input, keyed by the sentinel sourcing
    /// function so both cache generations address it identically.
    pub fn live_data(requirement: &ValueRequirement) -> Self {
        Self::new(requirement, LIVE_DATA_SOURCING_FUNCTION)
    }

    /// The requirement this specification satisfies.
    pub fn to_requirement(&self) -> ValueRequirement {
        ValueRequirement {
            value_name: self.value_name.clone(),
            target: self.target.clone(),
            constraints: self.constraints.clone(),
        }
    }

    /// True if this specification satisfies the given requirement.
    pub fn satisfies(&self, requirement: &ValueRequirement) -> bool {
        self.value_name == requirement.value_name
            && self.target == requirement.target
            && requirement
                .constraints
                .iter()
                .all(|(k, v)| self.constraints.get(k) == Some(v))
    }
}

impl fmt::Display for ValueSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ValueSpec[{}, {}, {}]",
            self.value_name, self.target, self.function_unique_id
        )
    }
}

/// A value produced by a computation, addressed by its specification.
/// Payloads are opaque to the engine; equality is structural.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComputedValue {
    pub specification: ValueSpecification,
    pub value: serde_json::Value,
}

impl ComputedValue {
    pub fn new(specification: ValueSpecification, value: serde_json::Value) -> Self {
        Self {
            specification,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ComputationTargetType, UniqueIdentifier};

    fn target() -> ComputationTargetSpecification {
        ComputationTargetSpecification::new(
            ComputationTargetType::Security,
            UniqueIdentifier::new("SecMaster", "AAPL"),
        )
    }

    #[test]
    fn test_requirement_structural_equality() {
        let a = ValueRequirement::new("FairValue", target()).with_constraint("Currency", "USD");
        let b = ValueRequirement::new("FairValue", target()).with_constraint("Currency", "USD");
        assert_eq!(a, b);
        let c = ValueRequirement::new("FairValue", target()).with_constraint("Currency", "GBP");
        assert_ne!(a, c);
    }

    #[test]
    fn test_specification_satisfies_requirement() {
        let req = ValueRequirement::new("FairValue", target());
        let spec = ValueSpecification::new(&req, "PricingFn");
        assert!(spec.satisfies(&req));

        let constrained = req.clone().with_constraint("Currency", "USD");
        assert!(!spec.satisfies(&constrained));

        let spec = ValueSpecification::new(&constrained, "PricingFn");
        // A constrained specification still satisfies the unconstrained form.
        assert!(spec.satisfies(&req));
    }

    #[test]
    fn test_live_data_specification_is_stable() {
        let req = ValueRequirement::new("MarketValue", target());
        assert_eq!(
            ValueSpecification::live_data(&req),
            ValueSpecification::live_data(&req.clone())
        );
    }

    #[test]
    fn test_specification_round_trips_requirement() {
        let req = ValueRequirement::new("Delta", target()).with_constraint("Model", "BSM");
        let spec = ValueSpecification::new(&req, "GreeksFn");
        assert_eq!(spec.to_requirement(), req);
    }
}
