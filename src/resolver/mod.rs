//! Function resolution - selects exactly one applicable function for a
//! requirement using a priority-ordered rule set.
//!
//! Rules are grouped by priority, highest tier first. A single applicable
//! rule in the highest applicable tier wins immediately; two or more in the
//! same tier is a hard ambiguity failure so that otherwise-identical runs can
//! never produce different graphs.

mod function;
mod rule;

pub use function::{FunctionDefinition, FunctionParameters, ParameterizedFunction};
pub use rule::{ApplyToAllTargets, ComputationTargetFilter, ResolutionRule, TargetTypeFilter};

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::errors::ResolutionError;
use crate::value::{ComputationTarget, ValueRequirement, ValueSpecification};

/// Outcome of a successful resolution.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub function: ParameterizedFunction,
    pub specification: ValueSpecification,
}

/// Resolves a requirement against a registered rule set. The rule set is
/// read-only once construction is complete, so resolution needs no locking.
pub trait FunctionResolver: Send + Sync {
    fn resolve(
        &self,
        requirement: &ValueRequirement,
        target: &ComputationTarget,
    ) -> Result<Resolution, ResolutionError>;
}

/// Rule-set resolver. The map iterates from highest to lowest priority.
#[derive(Default)]
pub struct DefaultFunctionResolver {
    rules_by_priority: BTreeMap<Reverse<i32>, Vec<ResolutionRule>>,
}

impl DefaultFunctionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a resolver with a priority-0 apply-to-all rule per function.
    pub fn from_functions(
        functions: impl IntoIterator<Item = Arc<dyn FunctionDefinition>>,
    ) -> Self {
        let mut resolver = Self::new();
        for function in functions {
            resolver.add_rule(ResolutionRule::apply_to_all(
                ParameterizedFunction::with_defaults(function),
            ));
        }
        resolver
    }

    pub fn add_rule(&mut self, rule: ResolutionRule) {
        self.rules_by_priority
            .entry(Reverse(rule.priority()))
            .or_default()
            .push(rule);
    }

    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = ResolutionRule>) {
        for rule in rules {
            self.add_rule(rule);
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules_by_priority.values().map(Vec::len).sum()
    }
}

impl FunctionResolver for DefaultFunctionResolver {
    fn resolve(
        &self,
        requirement: &ValueRequirement,
        target: &ComputationTarget,
    ) -> Result<Resolution, ResolutionError> {
        // Highest priority tier first; the first tier with any applicable
        // rule decides the outcome, lower tiers are never consulted.
        for (Reverse(priority), rules) in &self.rules_by_priority {
            let mut applicable: Vec<(&ResolutionRule, ValueSpecification)> = Vec::new();
            for rule in rules {
                if let Some(specification) = rule.result_for(requirement, target) {
                    applicable.push((rule, specification));
                }
            }

            match applicable.len() {
                0 => continue,
                1 => {
                    let (rule, specification) = applicable.pop().expect("len checked");
                    debug!(
                        requirement = %requirement,
                        function = rule.function().unique_id(),
                        priority,
                        "resolved requirement"
                    );
                    return Ok(Resolution {
                        function: rule.function().clone(),
                        specification,
                    });
                }
                _ => {
                    let mut candidates: Vec<String> = applicable
                        .iter()
                        .map(|(rule, _)| rule.function().unique_id().to_string())
                        .collect();
                    candidates.sort();
                    return Err(ResolutionError::Ambiguous {
                        requirement: requirement.clone(),
                        target: target.specification().clone(),
                        priority: *priority,
                        candidates,
                    });
                }
            }
        }

        Err(ResolutionError::Unsatisfiable {
            requirement: requirement.clone(),
            target: target.specification().clone(),
        })
    }
}
