//! Dependency graph - a DAG of resolved computation nodes.
//!
//! Nodes live in an arena owned by the graph and reference each other by
//! [`NodeId`], so diamonds collapse naturally and no reference cycles are
//! possible at the ownership level. Acyclicity of the edge relation itself is
//! enforced on every edge insertion.

mod builder;
mod compiled;
mod delta;

pub use builder::{DependencyGraphBuilder, GraphBuildContext};
pub use compiled::CompiledViewDefinition;
pub use delta::LiveDataDeltaCalculator;

use std::collections::BTreeSet;
use std::fmt;

use crate::errors::GraphError;
use crate::resolver::ParameterizedFunction;
use crate::value::{ComputationTarget, ValueRequirement, ValueSpecification};

/// Stable handle to a node within one graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// One resolved computation: target + chosen function + wiring.
#[derive(Clone, Debug)]
pub struct DependencyNode {
    target: ComputationTarget,
    function: ParameterizedFunction,
    /// Nodes whose outputs this node consumes
    inputs: BTreeSet<NodeId>,
    /// The specifications consumed from those input nodes
    input_values: BTreeSet<ValueSpecification>,
    /// Specifications this node produces
    outputs: BTreeSet<ValueSpecification>,
    /// Live-data inputs subscribed to directly by the function
    required_live_data: BTreeSet<ValueRequirement>,
    /// Requirements this node was created or reused to satisfy
    desired_values: BTreeSet<ValueRequirement>,
}

impl DependencyNode {
    fn new(target: ComputationTarget, function: ParameterizedFunction) -> Self {
        Self {
            target,
            function,
            inputs: BTreeSet::new(),
            input_values: BTreeSet::new(),
            outputs: BTreeSet::new(),
            required_live_data: BTreeSet::new(),
            desired_values: BTreeSet::new(),
        }
    }

    pub fn target(&self) -> &ComputationTarget {
        &self.target
    }

    pub fn function(&self) -> &ParameterizedFunction {
        &self.function
    }

    pub fn inputs(&self) -> &BTreeSet<NodeId> {
        &self.inputs
    }

    pub fn input_values(&self) -> &BTreeSet<ValueSpecification> {
        &self.input_values
    }

    pub fn outputs(&self) -> &BTreeSet<ValueSpecification> {
        &self.outputs
    }

    pub fn required_live_data(&self) -> &BTreeSet<ValueRequirement> {
        &self.required_live_data
    }

    pub fn desired_values(&self) -> &BTreeSet<ValueRequirement> {
        &self.desired_values
    }
}

/// Named collection of dependency nodes with derived roots. Built once per
/// compilation by [`DependencyGraphBuilder`] and immutable thereafter.
#[derive(Clone, Debug)]
pub struct DependencyGraph {
    calc_config_name: String,
    nodes: Vec<DependencyNode>,
    /// Reverse edges: for each node, the nodes consuming its outputs
    dependents: Vec<BTreeSet<NodeId>>,
}

impl DependencyGraph {
    pub fn new(calc_config_name: impl Into<String>) -> Self {
        Self {
            calc_config_name: calc_config_name.into(),
            nodes: Vec::new(),
            dependents: Vec::new(),
        }
    }

    pub fn calc_config_name(&self) -> &str {
        &self.calc_config_name
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id.0]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn dependents(&self, id: NodeId) -> &BTreeSet<NodeId> {
        &self.dependents[id.0]
    }

    /// Nodes with no downstream consumer within the graph.
    pub fn root_nodes(&self) -> Vec<NodeId> {
        self.node_ids()
            .filter(|id| self.dependents[id.0].is_empty())
            .collect()
    }

    /// Every specification produced by any node.
    pub fn output_specifications(&self) -> BTreeSet<ValueSpecification> {
        self.nodes
            .iter()
            .flat_map(|n| n.outputs.iter().cloned())
            .collect()
    }

    /// Every live-data requirement declared by any node.
    pub fn all_required_live_data(&self) -> BTreeSet<ValueRequirement> {
        self.nodes
            .iter()
            .flat_map(|n| n.required_live_data.iter().cloned())
            .collect()
    }

    pub(crate) fn add_node(
        &mut self,
        target: ComputationTarget,
        function: ParameterizedFunction,
    ) -> NodeId {
        self.nodes.push(DependencyNode::new(target, function));
        self.dependents.push(BTreeSet::new());
        NodeId(self.nodes.len() - 1)
    }

    pub(crate) fn add_output(&mut self, id: NodeId, specification: ValueSpecification) {
        self.nodes[id.0].outputs.insert(specification);
    }

    pub(crate) fn add_desired_value(&mut self, id: NodeId, requirement: ValueRequirement) {
        self.nodes[id.0].desired_values.insert(requirement);
    }

    pub(crate) fn add_required_live_data(&mut self, id: NodeId, requirement: ValueRequirement) {
        self.nodes[id.0].required_live_data.insert(requirement);
    }

    /// Wires `consumer` to read `value` from `input`. Refuses an edge that
    /// would make a node its own transitive input.
    pub(crate) fn add_edge(
        &mut self,
        input: NodeId,
        consumer: NodeId,
        value: ValueSpecification,
    ) -> Result<(), GraphError> {
        if input == consumer || self.reaches(input, consumer) {
            return Err(GraphError::CyclicEdge {
                from: input.0,
                to: consumer.0,
            });
        }
        self.nodes[consumer.0].inputs.insert(input);
        self.nodes[consumer.0].input_values.insert(value);
        self.dependents[input.0].insert(consumer);
        Ok(())
    }

    /// True if `to` is reachable from `from` following input edges.
    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if seen.insert(id) {
                stack.extend(self.nodes[id.0].inputs.iter().copied());
            }
        }
        false
    }

    /// A valid execution order: every node appears after all of its inputs.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut remaining: Vec<usize> = self.nodes.iter().map(|n| n.inputs.len()).collect();
        let mut ready: Vec<NodeId> = self
            .node_ids()
            .filter(|id| remaining[id.0] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop() {
            order.push(id);
            for &dep in &self.dependents[id.0] {
                remaining[dep.0] -= 1;
                if remaining[dep.0] == 0 {
                    ready.push(dep);
                }
            }
        }
        debug_assert_eq!(order.len(), self.nodes.len(), "graph must be acyclic");
        order
    }
}
