//! Graph fragment scheduler and executor.
//!
//! Decomposes a compiled dependency graph into fragments sized for network
//! dispatch, drives them to completion through the [`JobDispatcher`]
//! collaborator with a bounded number in flight, and resolves a single
//! [`RootFragmentHandle`] when the whole graph is done, aborted or
//! cancelled.

mod fragment;
mod root;
mod stats;

#[cfg(test)]
mod tests;

pub use fragment::{FragmentGraph, FragmentId, GraphFragment};
pub use root::{FragmentFailure, GraphExecutionReport, RootFragmentHandle};
pub use stats::{
    GraphExecutedRecord, GraphExecutorStatistics, RecordingStatisticsGatherer,
    TracingStatisticsGatherer,
};

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::{CacheSelectHint, IdentifierMap};
use crate::calcnode::{
    CalculationJob, CalculationJobItem, CalculationJobResult, CalculationJobSpecification,
    JobDispatcher,
};
use crate::errors::ExecutionError;
use crate::graph::DependencyGraph;
use crate::value::ValueSpecification;

use root::RootState;

/// What to do when a fragment's remote execution fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop scheduling further fragments and resolve the root as aborted.
    /// In-flight fragments are cancelled cooperatively.
    AbortRemaining,
    /// Record the failure, keep the failed fragment's dependents runnable,
    /// and resolve the root done with a partial-result report.
    TolerateAndContinue,
}

#[derive(Clone, Copy, Debug)]
pub struct GraphExecutorConfig {
    /// Largest number of nodes dispatched as one fragment
    pub max_fragment_size: usize,
    /// Largest number of fragments in flight simultaneously
    pub max_tail_concurrency: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for GraphExecutorConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: 8,
            max_tail_concurrency: 4,
            failure_policy: FailurePolicy::AbortRemaining,
        }
    }
}

/// Coordinator-side executor for one view process. Holds its collaborators
/// by explicit reference; no process-wide state.
pub struct GraphExecutor {
    dispatcher: Arc<dyn JobDispatcher>,
    identifier_map: Arc<dyn IdentifierMap>,
    statistics: Arc<dyn GraphExecutorStatistics>,
    config: GraphExecutorConfig,
}

impl GraphExecutor {
    pub fn new(
        dispatcher: Arc<dyn JobDispatcher>,
        identifier_map: Arc<dyn IdentifierMap>,
        statistics: Arc<dyn GraphExecutorStatistics>,
        config: GraphExecutorConfig,
    ) -> Self {
        Self {
            dispatcher,
            identifier_map,
            statistics,
            config,
        }
    }

    /// Starts executing the graph and returns the root completion handle.
    /// Must be called from within a tokio runtime.
    pub fn execute(
        &self,
        graph: Arc<DependencyGraph>,
        view_process_id: &str,
        iteration_timestamp_ms: u64,
    ) -> RootFragmentHandle {
        let (state_tx, state_rx) = watch::channel(RootState::Running);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cancel_tx = Arc::new(cancel_tx);
        let handle = RootFragmentHandle::new(state_rx, Arc::clone(&cancel_tx));

        let coordinator = Coordinator {
            graph,
            dispatcher: Arc::clone(&self.dispatcher),
            identifier_map: Arc::clone(&self.identifier_map),
            statistics: Arc::clone(&self.statistics),
            config: self.config,
            view_process_id: view_process_id.to_string(),
            iteration_timestamp_ms,
        };
        tokio::spawn(coordinator.run(state_tx, cancel_rx));

        handle
    }
}

struct Coordinator {
    graph: Arc<DependencyGraph>,
    dispatcher: Arc<dyn JobDispatcher>,
    identifier_map: Arc<dyn IdentifierMap>,
    statistics: Arc<dyn GraphExecutorStatistics>,
    config: GraphExecutorConfig,
    view_process_id: String,
    iteration_timestamp_ms: u64,
}

impl Coordinator {
    async fn run(self, state_tx: watch::Sender<RootState>, mut cancel_rx: watch::Receiver<bool>) {
        let started = Instant::now();
        let partition = FragmentGraph::partition(&self.graph, self.config.max_fragment_size);
        debug!(
            calc_config = self.graph.calc_config_name(),
            nodes = self.graph.size(),
            fragments = partition.len(),
            "starting graph execution"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_tail_concurrency.max(1)));
        let mut pending: Vec<usize> = partition
            .fragments()
            .iter()
            .map(|f| f.inputs().len())
            .collect();
        let mut ready: VecDeque<FragmentId> = partition.leaf_fragments().into();
        let mut in_flight: JoinSet<(FragmentId, Result<CalculationJobResult, ExecutionError>)> =
            JoinSet::new();
        // Fragment behind each spawned task, so a panicked task can still be
        // attributed and its dependents unblocked.
        let mut task_fragments: HashMap<tokio::task::Id, FragmentId> = HashMap::new();

        let mut executed_fragments = 0usize;
        let mut failures: Vec<FragmentFailure> = Vec::new();
        let mut execution_time = Duration::ZERO;
        let mut next_job_id = 0u64;
        let mut aborted = false;

        loop {
            if !aborted && !*cancel_rx.borrow() {
                while let Some(id) = ready.pop_front() {
                    let job = self.build_job(partition.fragment(id), next_job_id);
                    next_job_id += 1;
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let semaphore = Arc::clone(&semaphore);
                    let mut task_cancel = cancel_rx.clone();
                    let task = in_flight.spawn(async move {
                        let _permit = match semaphore.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => return (id, Err(ExecutionError::Cancelled)),
                        };
                        tokio::select! {
                            result = dispatcher.dispatch(job) => (id, result),
                            _ = task_cancel.wait_for(|c| *c) => (id, Err(ExecutionError::Cancelled)),
                        }
                    });
                    task_fragments.insert(task.id(), id);
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            // A fragment already delivered is never rolled back; cancellation
            // only affects in-flight and not-yet-started work.
            if *cancel_rx.borrow() {
                in_flight.abort_all();
                let _ = state_tx.send(RootState::Cancelled);
                return;
            }

            // A panicked task is a fragment failure like any other: it must
            // surface in the report, respect the failure policy, and unblock
            // the fragment's dependents.
            let (id, result) = match joined {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    let Some(&id) = task_fragments.get(&join_error.id()) else {
                        warn!(error = %join_error, "untracked fragment task failed");
                        continue;
                    };
                    warn!(fragment = %id, error = %join_error, "fragment task panicked");
                    (
                        id,
                        Err(ExecutionError::Dispatch(format!(
                            "fragment task panicked: {join_error}"
                        ))),
                    )
                }
            };

            match result {
                Ok(job_result) => {
                    executed_fragments += 1;
                    execution_time += Duration::from_millis(job_result.duration_ms);
                    for failed in job_result.failed_items() {
                        let crate::calcnode::JobItemOutcome::Failed { message } = &failed.outcome
                        else {
                            continue;
                        };
                        warn!(
                            fragment = %id,
                            function = failed.function_unique_id,
                            target = %failed.target,
                            message,
                            "fragment item failed"
                        );
                        failures.push(FragmentFailure {
                            fragment: id,
                            function_unique_id: failed.function_unique_id.clone(),
                            target: failed.target.to_string(),
                            message: message.clone(),
                        });
                    }
                    if !failures.is_empty()
                        && self.config.failure_policy == FailurePolicy::AbortRemaining
                    {
                        aborted = true;
                    }
                }
                Err(ExecutionError::Cancelled) => {
                    in_flight.abort_all();
                    let _ = state_tx.send(RootState::Cancelled);
                    return;
                }
                Err(error) => {
                    warn!(fragment = %id, error = %error, "fragment dispatch failed");
                    failures.push(FragmentFailure {
                        fragment: id,
                        function_unique_id: String::new(),
                        target: String::new(),
                        message: error.to_string(),
                    });
                    if self.config.failure_policy == FailurePolicy::AbortRemaining {
                        aborted = true;
                    }
                }
            }

            // Delivered, whether tolerated-failed or successful: dependents
            // become executable once all of their inputs have delivered.
            for &dependent in partition.fragment(id).dependents() {
                pending[dependent.0] -= 1;
                if pending[dependent.0] == 0 {
                    ready.push_back(dependent);
                }
            }
        }

        if *cancel_rx.borrow() {
            let _ = state_tx.send(RootState::Cancelled);
            return;
        }

        if aborted {
            let message = failures
                .first()
                .map(|f| f.message.clone())
                .unwrap_or_else(|| "fragment failure".to_string());
            let _ = state_tx.send(RootState::Aborted(message));
            return;
        }

        // The root sentinel executes: mark done, wake waiters, then report
        // statistics for the fully-executed graph.
        let report = GraphExecutionReport {
            calc_config_name: self.graph.calc_config_name().to_string(),
            graph_size: self.graph.size(),
            fragment_count: partition.len(),
            executed_fragments,
            failures,
            execution_time,
            wall_time: started.elapsed(),
        };
        let _ = state_tx.send(RootState::Done(report));
        self.statistics.graph_executed(
            self.graph.calc_config_name(),
            self.graph.size(),
            execution_time,
            started.elapsed(),
        );
    }

    /// Assembles the calculation job for one fragment: one item per node,
    /// inputs converted to compact identifiers, and a cache hint listing the
    /// minority partition of the job's values.
    fn build_job(&self, fragment: &GraphFragment, job_id: u64) -> CalculationJob {
        let in_fragment: BTreeSet<_> = fragment.nodes().iter().copied().collect();
        let mut items = Vec::with_capacity(fragment.nodes().len());
        let mut private_values: BTreeSet<ValueSpecification> = BTreeSet::new();
        let mut shared_values: BTreeSet<ValueSpecification> = BTreeSet::new();

        for &node_id in fragment.nodes() {
            let node = self.graph.node(node_id);
            items.push(CalculationJobItem::new(
                node.function().unique_id(),
                node.function().parameters().clone(),
                node.target().specification().clone(),
                node.input_values().iter().cloned().collect(),
                node.desired_values().iter().cloned().collect(),
            ));

            // An output stays in the job-private cache only when every
            // consumer runs in this same fragment; terminal outputs are
            // always shared so the coordinator can read them.
            let dependents = self.graph.dependents(node_id);
            let private = !dependents.is_empty()
                && dependents.iter().all(|consumer| in_fragment.contains(consumer));
            for output in node.outputs() {
                if private {
                    private_values.insert(output.clone());
                } else {
                    shared_values.insert(output.clone());
                }
            }
            // Inputs produced by other fragments arrive through the shared
            // cache.
            for input in node.input_values() {
                if !private_values.contains(input) {
                    shared_values.insert(input.clone());
                }
            }
        }

        let hint = if private_values.len() <= shared_values.len() {
            CacheSelectHint::private_values(private_values)
        } else {
            CacheSelectHint::shared_values(shared_values)
        };

        let mut job = CalculationJob::new(
            CalculationJobSpecification::new(
                &self.view_process_id,
                self.graph.calc_config_name(),
                self.iteration_timestamp_ms,
                job_id,
            ),
            hint,
            items,
        );
        job.convert(&*self.identifier_map);
        job
    }
}
