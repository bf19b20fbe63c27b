//! Partitioning a dependency graph into dispatchable fragments.

use std::collections::BTreeSet;
use std::fmt;

use crate::graph::{DependencyGraph, NodeId};

/// Handle to a fragment within one partitioning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FragmentId(pub usize);

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// A subset of a graph's nodes dispatched as one unit of remote work, plus
/// its input/output fragment wiring.
#[derive(Clone, Debug)]
pub struct GraphFragment {
    id: FragmentId,
    /// Nodes in execution order within the fragment
    nodes: Vec<NodeId>,
    /// Fragments this fragment consumes results from
    inputs: BTreeSet<FragmentId>,
    /// Fragments consuming this fragment's results
    dependents: BTreeSet<FragmentId>,
}

impl GraphFragment {
    pub fn id(&self) -> FragmentId {
        self.id
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn inputs(&self) -> &BTreeSet<FragmentId> {
        &self.inputs
    }

    pub fn dependents(&self) -> &BTreeSet<FragmentId> {
        &self.dependents
    }
}

/// The fragments of one graph, sized to amortize dispatch overhead against
/// parallelism. The union of all fragment node sets equals the graph's node
/// set; fragment edges are derived from node edges, so a fragment becomes
/// executable exactly when every fragment it depends on has delivered.
#[derive(Clone, Debug)]
pub struct FragmentGraph {
    fragments: Vec<GraphFragment>,
}

impl FragmentGraph {
    /// Chunks a topological order of the graph into fragments of at most
    /// `max_fragment_size` nodes. Chunking the order rather than the depth
    /// levels keeps producer/consumer chains together, so values consumed
    /// only within their own fragment stay in the job-private cache. A graph
    /// no larger than the limit collapses into a single fragment; fragment
    /// edges inherit the order's direction, so the fragment graph is acyclic
    /// by construction.
    pub fn partition(graph: &DependencyGraph, max_fragment_size: usize) -> Self {
        let max_fragment_size = max_fragment_size.max(1);
        let order = graph.topological_order();

        let mut fragments: Vec<GraphFragment> = Vec::new();
        let mut fragment_of = vec![FragmentId(0); graph.size()];
        for chunk in order.chunks(max_fragment_size) {
            let id = FragmentId(fragments.len());
            for node in chunk {
                fragment_of[node.0] = id;
            }
            fragments.push(GraphFragment {
                id,
                nodes: chunk.to_vec(),
                inputs: BTreeSet::new(),
                dependents: BTreeSet::new(),
            });
        }

        for id in graph.node_ids() {
            let consumer = fragment_of[id.0];
            for input in graph.node(id).inputs() {
                let producer = fragment_of[input.0];
                if producer != consumer {
                    fragments[consumer.0].inputs.insert(producer);
                    fragments[producer.0].dependents.insert(consumer);
                }
            }
        }

        Self { fragments }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragment(&self, id: FragmentId) -> &GraphFragment {
        &self.fragments[id.0]
    }

    pub fn fragments(&self) -> &[GraphFragment] {
        &self.fragments
    }

    /// Fragments with no unresolved input fragments: executable immediately.
    pub fn leaf_fragments(&self) -> Vec<FragmentId> {
        self.fragments
            .iter()
            .filter(|f| f.inputs.is_empty())
            .map(|f| f.id)
            .collect()
    }
}
