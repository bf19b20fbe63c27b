//! Bottom-up graph construction by recursive requirement resolution.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::errors::{Error, GraphError};
use crate::prelude::Result;
use crate::resolver::FunctionResolver;
use crate::value::{
    ComputationTargetResolver, ComputationTargetSpecification, ValueRequirement,
    ValueSpecification,
};

use super::{DependencyGraph, NodeId};

/// The collaborators a graph build resolves against. Both are read-only for
/// the duration of the build.
#[derive(Clone, Copy)]
pub struct GraphBuildContext<'a> {
    pub resolver: &'a dyn FunctionResolver,
    pub target_resolver: &'a dyn ComputationTargetResolver,
}

/// Builds one [`DependencyGraph`] by recursively resolving requirements.
///
/// A given requirement resolves to at most one node per build, and nodes are
/// shared per (target, function) pair, so diamonds in the requirement DAG
/// collapse rather than duplicate work. Any resolution failure aborts the
/// whole build, carrying the requirement path for diagnostics.
pub struct DependencyGraphBuilder<'a> {
    context: GraphBuildContext<'a>,
    graph: DependencyGraph,
    /// Memo: requirement -> node satisfying it and the specification produced
    resolved: HashMap<ValueRequirement, (NodeId, ValueSpecification)>,
    /// Node shared per (target, function) pair
    function_nodes: HashMap<(ComputationTargetSpecification, String), NodeId>,
    /// Requirements currently being resolved, outermost first
    path: Vec<ValueRequirement>,
}

impl<'a> DependencyGraphBuilder<'a> {
    pub fn new(calc_config_name: impl Into<String>, context: GraphBuildContext<'a>) -> Self {
        Self {
            context,
            graph: DependencyGraph::new(calc_config_name),
            resolved: HashMap::new(),
            function_nodes: HashMap::new(),
            path: Vec::new(),
        }
    }

    /// Adds a desired terminal output to the graph, resolving it and its
    /// transitive inputs.
    pub fn add_target_requirement(
        &mut self,
        requirement: ValueRequirement,
    ) -> Result<ValueSpecification> {
        let (_, specification) = self.resolve_requirement(&requirement)?;
        Ok(specification)
    }

    /// Completes the build. The returned graph is immutable.
    pub fn build(self) -> DependencyGraph {
        debug!(
            calc_config = self.graph.calc_config_name(),
            nodes = self.graph.size(),
            "dependency graph built"
        );
        self.graph
    }

    fn resolve_requirement(
        &mut self,
        requirement: &ValueRequirement,
    ) -> Result<(NodeId, ValueSpecification)> {
        if let Some(hit) = self.resolved.get(requirement) {
            trace!(requirement = %requirement, node = %hit.0, "memoized resolution");
            return Ok(hit.clone());
        }
        if self.path.contains(requirement) {
            return Err(Error::Graph(GraphError::CycleDetected {
                requirement: requirement.clone(),
            }));
        }

        let target = self.context.target_resolver.resolve(&requirement.target)?;

        self.path.push(requirement.clone());
        let resolution = self
            .context
            .resolver
            .resolve(requirement, &target)
            .map_err(|source| {
                Error::Graph(GraphError::Build {
                    path: self.path.clone(),
                    source,
                })
            })?;

        let function_key = (
            target.specification().clone(),
            resolution.function.unique_id().to_string(),
        );
        let node = match self.function_nodes.get(&function_key) {
            Some(&node) => node,
            None => {
                let node = self
                    .graph
                    .add_node(target.clone(), resolution.function.clone());
                self.function_nodes.insert(function_key, node);
                for live in resolution.function.function().required_live_data(&target) {
                    self.graph.add_required_live_data(node, live);
                }
                node
            }
        };
        self.graph
            .add_output(node, resolution.specification.clone());
        self.graph.add_desired_value(node, requirement.clone());

        let inputs = resolution
            .function
            .function()
            .input_requirements(&target, requirement);
        for input_requirement in inputs {
            let (input_node, input_spec) = self.resolve_requirement(&input_requirement)?;
            if input_node != node {
                self.graph.add_edge(input_node, node, input_spec)?;
            }
        }

        self.path.pop();
        self.resolved.insert(
            requirement.clone(),
            (node, resolution.specification.clone()),
        );
        Ok((node, resolution.specification))
    }
}
