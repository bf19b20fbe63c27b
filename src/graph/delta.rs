//! Live-data delta calculation between two cache generations.

use std::collections::BTreeSet;

use crate::cache::ViewComputationCache;
use crate::errors::GraphError;
use crate::value::ValueSpecification;

use super::{DependencyGraph, NodeId};

/// Determines which nodes in a graph have changed. A node has changed if and
/// only if its subtree contains a node for which the previous live-data input
/// differs from the current one. Changes due to passage of the system clock
/// are excluded.
///
/// Strict two-phase protocol: build, [`compute_delta`](Self::compute_delta)
/// exactly once, then query. For the delta to be meaningful both caches must
/// be populated with the live-data inputs required by the graph.
pub struct LiveDataDeltaCalculator<'a> {
    graph: &'a DependencyGraph,
    cache: &'a dyn ViewComputationCache,
    previous_cache: &'a dyn ViewComputationCache,
    changed_nodes: BTreeSet<NodeId>,
    unchanged_nodes: BTreeSet<NodeId>,
    done: bool,
}

impl<'a> LiveDataDeltaCalculator<'a> {
    /// `cache` holds the current live-data inputs, `previous_cache` the prior
    /// generation's.
    pub fn new(
        graph: &'a DependencyGraph,
        cache: &'a dyn ViewComputationCache,
        previous_cache: &'a dyn ViewComputationCache,
    ) -> Self {
        Self {
            graph,
            cache,
            previous_cache,
            changed_nodes: BTreeSet::new(),
            unchanged_nodes: BTreeSet::new(),
            done: false,
        }
    }

    pub fn changed_nodes(&self) -> Result<&BTreeSet<NodeId>, GraphError> {
        if !self.done {
            return Err(GraphError::DeltaNotComputed);
        }
        Ok(&self.changed_nodes)
    }

    pub fn unchanged_nodes(&self) -> Result<&BTreeSet<NodeId>, GraphError> {
        if !self.done {
            return Err(GraphError::DeltaNotComputed);
        }
        Ok(&self.unchanged_nodes)
    }

    pub fn compute_delta(&mut self) -> Result<(), GraphError> {
        if self.done {
            return Err(GraphError::DeltaAlreadyComputed);
        }
        for root in self.graph.root_nodes() {
            self.classify(root);
        }
        self.done = true;
        Ok(())
    }

    fn classify(&mut self, id: NodeId) -> bool {
        if self.changed_nodes.contains(&id) {
            return true;
        }
        if self.unchanged_nodes.contains(&id) {
            return false;
        }

        let node = self.graph.node(id);
        let mut changed = false;
        for &input in node.inputs() {
            // If any input changed, this node requires recomputation.
            changed |= self.classify(input);
        }

        if !changed {
            // No input changed; the node may still need recomputation if one
            // of its own live-data inputs differs between the caches.
            for requirement in node.required_live_data() {
                let specification = ValueSpecification::live_data(requirement);
                let old_value = self.previous_cache.get(&specification);
                let new_value = self.cache.get(&specification);
                if old_value != new_value {
                    changed = true;
                    break;
                }
            }
        }

        if changed {
            self.changed_nodes.insert(id);
        } else {
            self.unchanged_nodes.insert(id);
        }
        changed
    }
}
