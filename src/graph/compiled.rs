//! Compiled view definitions - one dependency graph per calculation
//! configuration, plus the combined accessors a view process needs.

use std::collections::{BTreeSet, HashMap};

use crate::value::{ValueRequirement, ValueSpecification};

use super::DependencyGraph;

/// The output of compiling a view definition: the dependency graphs for each
/// of its calculation configurations, valid for a bounded evaluation window.
#[derive(Clone, Debug)]
pub struct CompiledViewDefinition {
    view_name: String,
    graphs: HashMap<String, DependencyGraph>,
    /// Evaluation timestamps (epoch ms) the compilation is valid for; `None`
    /// bounds are open.
    earliest_valid_ms: Option<u64>,
    latest_valid_ms: Option<u64>,
}

impl CompiledViewDefinition {
    pub fn new(
        view_name: impl Into<String>,
        graphs: impl IntoIterator<Item = DependencyGraph>,
    ) -> Self {
        Self {
            view_name: view_name.into(),
            graphs: graphs
                .into_iter()
                .map(|g| (g.calc_config_name().to_string(), g))
                .collect(),
            earliest_valid_ms: None,
            latest_valid_ms: None,
        }
    }

    pub fn with_validity(mut self, earliest_ms: Option<u64>, latest_ms: Option<u64>) -> Self {
        self.earliest_valid_ms = earliest_ms;
        self.latest_valid_ms = latest_ms;
        self
    }

    pub fn view_name(&self) -> &str {
        &self.view_name
    }

    pub fn graph(&self, calc_config_name: &str) -> Option<&DependencyGraph> {
        self.graphs.get(calc_config_name)
    }

    pub fn graphs(&self) -> impl Iterator<Item = &DependencyGraph> {
        self.graphs.values()
    }

    pub fn calc_config_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.graphs.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// Live-data requirements across every configuration, deduplicated.
    pub fn all_required_live_data(&self) -> BTreeSet<ValueRequirement> {
        self.graphs
            .values()
            .flat_map(|g| g.all_required_live_data())
            .collect()
    }

    /// Output specifications across every configuration, deduplicated.
    pub fn all_output_specifications(&self) -> BTreeSet<ValueSpecification> {
        self.graphs
            .values()
            .flat_map(|g| g.output_specifications())
            .collect()
    }

    /// True if the compilation may be used for an evaluation at `now_ms`.
    pub fn is_valid_for(&self, now_ms: u64) -> bool {
        self.earliest_valid_ms.map_or(true, |t| now_ms >= t)
            && self.latest_valid_ms.map_or(true, |t| now_ms <= t)
    }
}
