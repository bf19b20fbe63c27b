//! Integration tests for the fragment scheduler.
//!
//! Tests cover:
//! - Single-fragment fast path for small graphs
//! - Input-before-output fragment ordering
//! - Tail concurrency bounding
//! - Job-private cache hints for intra-fragment values
//! - Failure policy (abort vs tolerate), including panicked dispatches
//! - Cancellation and bounded waits
//! - Statistics emission

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::cache::InMemoryIdentifierMap;
use crate::calcnode::{
    CalculationJob, CalculationJobResult, CalculationJobResultItem, JobDispatcher,
};
use crate::errors::{Error, ExecutionError};
use crate::graph::{DependencyGraph, DependencyGraphBuilder, GraphBuildContext};
use crate::resolver::test_support::StaticFunction;
use crate::resolver::{DefaultFunctionResolver, ParameterizedFunction, ResolutionRule};
use crate::value::{
    ComputationTargetSpecification, ComputationTargetType, ComputedValue,
    InMemoryComputationTargetResolver, TargetObject, UniqueIdentifier, ValueRequirement,
};

use super::{
    FailurePolicy, GraphExecutor, GraphExecutorConfig, RecordingStatisticsGatherer,
    TracingStatisticsGatherer,
};

// =========================================================================
// Test Dispatcher
// =========================================================================

/// Runs jobs locally: resolves compact inputs, produces a constant value per
/// desired output and records dispatch order and concurrency.
struct LocalJobDispatcher {
    identifier_map: Arc<InMemoryIdentifierMap>,
    jobs: Mutex<Vec<CalculationJob>>,
    completed_functions: Mutex<Vec<String>>,
    fail_function: Option<String>,
    panic_function: Option<String>,
    delay: Option<Duration>,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl LocalJobDispatcher {
    fn new(identifier_map: Arc<InMemoryIdentifierMap>) -> Self {
        Self {
            identifier_map,
            jobs: Mutex::new(Vec::new()),
            completed_functions: Mutex::new(Vec::new()),
            fail_function: None,
            panic_function: None,
            delay: None,
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }

    fn failing(mut self, function: &str) -> Self {
        self.fail_function = Some(function.to_string());
        self
    }

    fn panicking(mut self, function: &str) -> Self {
        self.panic_function = Some(function.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn completed_functions(&self) -> Vec<String> {
        self.completed_functions.lock().unwrap().clone()
    }

    fn recorded_jobs(&self) -> Vec<CalculationJob> {
        self.jobs.lock().unwrap().clone()
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobDispatcher for LocalJobDispatcher {
    async fn dispatch(&self, job: CalculationJob) -> Result<CalculationJobResult, ExecutionError> {
        self.jobs.lock().unwrap().push(job.clone());
        let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(current, Ordering::SeqCst);

        if let Some(panic_function) = &self.panic_function {
            if job
                .items
                .iter()
                .any(|item| item.function_unique_id == *panic_function)
            {
                panic!("dispatcher blew up on {panic_function}");
            }
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut job = job;
        job.resolve(&*self.identifier_map)
            .map_err(|e| ExecutionError::Dispatch(e.to_string()))?;

        let mut items = Vec::new();
        for item in &job.items {
            if self.fail_function.as_deref() == Some(item.function_unique_id.as_str()) {
                items.push(CalculationJobResultItem::failure(
                    &item.function_unique_id,
                    item.target.clone(),
                    "synthetic failure",
                ));
            } else {
                let values = item
                    .outputs()
                    .into_iter()
                    .map(|spec| ComputedValue::new(spec, json!(1.0)))
                    .collect();
                items.push(CalculationJobResultItem::success(
                    &item.function_unique_id,
                    item.target.clone(),
                    values,
                ));
            }
            self.completed_functions
                .lock()
                .unwrap()
                .push(item.function_unique_id.clone());
        }

        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        Ok(CalculationJobResult::new(
            job.specification.clone(),
            1,
            "local-node",
            items,
        ))
    }
}

// =========================================================================
// Graph Fixtures
// =========================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn security_spec(name: &str) -> ComputationTargetSpecification {
    ComputationTargetSpecification::new(
        ComputationTargetType::Security,
        UniqueIdentifier::new("SecMaster", name),
    )
}

/// One root aggregation node consuming a leaf node per security.
fn fan_in_graph(leaves: usize) -> DependencyGraph {
    let mut functions = DefaultFunctionResolver::new();
    let target_resolver = InMemoryComputationTargetResolver::new();
    let mut leaf_requirements = Vec::new();
    for i in 0..leaves {
        let name = format!("S{i}");
        target_resolver.register(TargetObject::Security {
            id: UniqueIdentifier::new("SecMaster", &name),
            security_type: "EQUITY".into(),
        });
        leaf_requirements.push(ValueRequirement::new("LeafValue", security_spec(&name)));
    }
    target_resolver.register(TargetObject::Portfolio {
        id: UniqueIdentifier::new("PortMaster", "P"),
        name: "Main".into(),
    });
    functions.add_rule(ResolutionRule::apply_to_all(
        ParameterizedFunction::with_defaults(Arc::new(StaticFunction::new(
            "LeafFn",
            "LeafValue",
        ))),
    ));
    functions.add_rule(ResolutionRule::apply_to_all(
        ParameterizedFunction::with_defaults(Arc::new(
            StaticFunction::new("SumFn", "PortfolioValue").with_inputs(leaf_requirements),
        )),
    ));

    let mut builder = DependencyGraphBuilder::new(
        "Default",
        GraphBuildContext {
            resolver: &functions,
            target_resolver: &target_resolver,
        },
    );
    builder
        .add_target_requirement(ValueRequirement::new(
            "PortfolioValue",
            ComputationTargetSpecification::new(
                ComputationTargetType::PortfolioNode,
                UniqueIdentifier::new("PortMaster", "P"),
            ),
        ))
        .unwrap();
    builder.build()
}

/// Straight chain on one security: V{n-1} consumes V{n-2} ... consumes V0.
fn chain_graph(length: usize) -> DependencyGraph {
    let mut functions = DefaultFunctionResolver::new();
    let target_resolver = InMemoryComputationTargetResolver::new();
    target_resolver.register(TargetObject::Security {
        id: UniqueIdentifier::new("SecMaster", "AAPL"),
        security_type: "EQUITY".into(),
    });
    for i in 0..length {
        let mut function = StaticFunction::new(&format!("Fn{i}"), &format!("V{i}"));
        if i > 0 {
            function = function.with_inputs(vec![ValueRequirement::new(
                format!("V{}", i - 1),
                security_spec("AAPL"),
            )]);
        }
        functions.add_rule(ResolutionRule::apply_to_all(
            ParameterizedFunction::with_defaults(Arc::new(function)),
        ));
    }

    let mut builder = DependencyGraphBuilder::new(
        "Default",
        GraphBuildContext {
            resolver: &functions,
            target_resolver: &target_resolver,
        },
    );
    builder
        .add_target_requirement(ValueRequirement::new(
            format!("V{}", length - 1),
            security_spec("AAPL"),
        ))
        .unwrap();
    builder.build()
}

fn executor(
    dispatcher: Arc<LocalJobDispatcher>,
    identifier_map: Arc<InMemoryIdentifierMap>,
    config: GraphExecutorConfig,
) -> GraphExecutor {
    GraphExecutor::new(
        dispatcher,
        identifier_map,
        Arc::new(TracingStatisticsGatherer),
        config,
    )
}

// =========================================================================
// Scheduler Tests
// =========================================================================

#[tokio::test]
async fn test_small_graph_runs_as_single_fragment() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(LocalJobDispatcher::new(Arc::clone(&map)));
    let graph = Arc::new(fan_in_graph(3));

    let handle = executor(
        Arc::clone(&dispatcher),
        map,
        GraphExecutorConfig::default(),
    )
    .execute(graph, "view-1", 1_000);

    let report = handle.wait().await.unwrap();
    assert_eq!(report.fragment_count, 1);
    assert_eq!(report.executed_fragments, 1);
    assert!(report.failures.is_empty());
    assert_eq!(dispatcher.recorded_jobs().len(), 1);
    assert!(handle.is_done());
}

#[tokio::test]
async fn test_fragment_order_respects_inputs() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(LocalJobDispatcher::new(Arc::clone(&map)));
    let graph = Arc::new(fan_in_graph(9));

    let config = GraphExecutorConfig {
        max_fragment_size: 3,
        ..GraphExecutorConfig::default()
    };
    let handle = executor(Arc::clone(&dispatcher), map, config).execute(graph, "view-1", 1_000);
    let report = handle.wait().await.unwrap();

    assert_eq!(report.fragment_count, 4);
    assert_eq!(report.executed_fragments, 4);
    let completed = dispatcher.completed_functions();
    let sum_at = completed.iter().position(|f| f == "SumFn").unwrap();
    // Every leaf completed before the aggregation fragment ran.
    assert_eq!(sum_at, completed.len() - 1);
    assert_eq!(completed.iter().filter(|f| *f == "LeafFn").count(), 9);
}

#[tokio::test]
async fn test_tail_concurrency_bound() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(
        LocalJobDispatcher::new(Arc::clone(&map)).with_delay(Duration::from_millis(20)),
    );
    let graph = Arc::new(fan_in_graph(9));

    let config = GraphExecutorConfig {
        max_fragment_size: 3,
        max_tail_concurrency: 1,
        ..GraphExecutorConfig::default()
    };
    let handle = executor(Arc::clone(&dispatcher), map, config).execute(graph, "view-1", 1_000);
    handle.wait().await.unwrap();

    assert_eq!(dispatcher.max_concurrency(), 1);
}

#[tokio::test]
async fn test_jobs_go_out_with_compact_identifiers() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(LocalJobDispatcher::new(Arc::clone(&map)));
    let graph = Arc::new(fan_in_graph(9));

    let config = GraphExecutorConfig {
        max_fragment_size: 3,
        ..GraphExecutorConfig::default()
    };
    let handle = executor(Arc::clone(&dispatcher), map, config).execute(graph, "view-1", 1_000);
    handle.wait().await.unwrap();

    for job in dispatcher.recorded_jobs() {
        for item in &job.items {
            // Converted before send: identifiers only, never full specs.
            assert!(item.input_identifiers().is_some());
            assert!(item.inputs().is_empty());
        }
        assert!(job.cache_select_hint.identifiers().is_some());
    }
}

#[tokio::test]
async fn test_intra_fragment_values_marked_private() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(LocalJobDispatcher::new(Arc::clone(&map)));
    let graph = Arc::new(chain_graph(4));

    let config = GraphExecutorConfig {
        max_fragment_size: 2,
        ..GraphExecutorConfig::default()
    };
    let handle = executor(Arc::clone(&dispatcher), map, config).execute(graph, "view-1", 1_000);
    handle.wait().await.unwrap();

    let jobs = dispatcher.recorded_jobs();
    assert_eq!(jobs.len(), 2);
    for job in &jobs {
        // Each fragment holds a producer/consumer pair, so the value handed
        // between them never leaves the job-private cache and the hint lists
        // it as the minority set.
        assert!(job.cache_select_hint.is_private());
        assert_eq!(job.cache_select_hint.identifiers().unwrap().len(), 1);
    }
}

// =========================================================================
// Failure Policy Tests
// =========================================================================

#[tokio::test]
async fn test_abort_remaining_on_failure() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(LocalJobDispatcher::new(Arc::clone(&map)).failing("LeafFn"));
    let graph = Arc::new(fan_in_graph(9));

    let config = GraphExecutorConfig {
        max_fragment_size: 3,
        failure_policy: FailurePolicy::AbortRemaining,
        ..GraphExecutorConfig::default()
    };
    let handle = executor(Arc::clone(&dispatcher), map, config).execute(graph, "view-1", 1_000);

    let err = handle.wait().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Execution(ExecutionError::Aborted { .. })
    ));
    // The aggregation fragment never ran.
    assert!(!dispatcher.completed_functions().contains(&"SumFn".to_string()));
}

#[tokio::test]
async fn test_tolerate_and_continue_reports_partial_results() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(LocalJobDispatcher::new(Arc::clone(&map)).failing("LeafFn"));
    let graph = Arc::new(fan_in_graph(9));

    let config = GraphExecutorConfig {
        max_fragment_size: 3,
        failure_policy: FailurePolicy::TolerateAndContinue,
        ..GraphExecutorConfig::default()
    };
    let handle = executor(Arc::clone(&dispatcher), map, config).execute(graph, "view-1", 1_000);

    let report = handle.wait().await.unwrap();
    assert_eq!(report.executed_fragments, report.fragment_count);
    assert_eq!(report.failures.len(), 9);
    // Failures are attributable to the specific function that failed.
    assert!(report
        .failures
        .iter()
        .all(|f| f.function_unique_id == "LeafFn"));
    // Siblings were not corrupted: the aggregation fragment still ran.
    assert!(dispatcher.completed_functions().contains(&"SumFn".to_string()));
}

#[tokio::test]
async fn test_panicking_dispatch_aborts_root() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(LocalJobDispatcher::new(Arc::clone(&map)).panicking("LeafFn"));
    let graph = Arc::new(fan_in_graph(9));

    let config = GraphExecutorConfig {
        max_fragment_size: 3,
        failure_policy: FailurePolicy::AbortRemaining,
        ..GraphExecutorConfig::default()
    };
    let handle = executor(Arc::clone(&dispatcher), map, config).execute(graph, "view-1", 1_000);

    // A panic inside a dispatch must not wedge the root: it resolves as
    // aborted, like any other fragment failure.
    let err = handle.wait().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Execution(ExecutionError::Aborted { .. })
    ));
    assert!(!dispatcher.completed_functions().contains(&"SumFn".to_string()));
}

#[tokio::test]
async fn test_panicking_dispatch_recorded_under_tolerate_policy() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(LocalJobDispatcher::new(Arc::clone(&map)).panicking("LeafFn"));
    let graph = Arc::new(fan_in_graph(9));

    let config = GraphExecutorConfig {
        max_fragment_size: 3,
        failure_policy: FailurePolicy::TolerateAndContinue,
        ..GraphExecutorConfig::default()
    };
    let handle = executor(Arc::clone(&dispatcher), map, config).execute(graph, "view-1", 1_000);

    let report = handle.wait().await.unwrap();
    // All three leaf fragments panicked; each surfaces as a recorded failure
    // and still unblocks the aggregation fragment.
    assert_eq!(report.failures.len(), 3);
    assert_eq!(report.executed_fragments, 1);
    assert!(dispatcher.completed_functions().contains(&"SumFn".to_string()));
}

// =========================================================================
// Cancellation and Timeout Tests
// =========================================================================

#[tokio::test]
async fn test_cancel_propagates_to_in_flight_fragments() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(
        LocalJobDispatcher::new(Arc::clone(&map)).with_delay(Duration::from_secs(30)),
    );
    let graph = Arc::new(fan_in_graph(9));

    let config = GraphExecutorConfig {
        max_fragment_size: 3,
        ..GraphExecutorConfig::default()
    };
    let handle = executor(Arc::clone(&dispatcher), map, config).execute(graph, "view-1", 1_000);

    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();

    let err = handle.wait().await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(handle.is_cancelled());
    assert!(!handle.is_done());
}

#[tokio::test]
async fn test_bounded_wait_times_out_without_cancelling() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(
        LocalJobDispatcher::new(Arc::clone(&map)).with_delay(Duration::from_millis(100)),
    );
    let graph = Arc::new(fan_in_graph(3));

    let handle = executor(Arc::clone(&dispatcher), map, GraphExecutorConfig::default())
        .execute(graph, "view-1", 1_000);

    let err = handle.wait_timeout(Duration::from_millis(5)).await.unwrap_err();
    assert!(matches!(err, Error::Execution(ExecutionError::Timeout)));

    // The job kept running and a later unbounded wait succeeds.
    let report = handle.wait().await.unwrap();
    assert_eq!(report.executed_fragments, 1);
}

// =========================================================================
// Statistics Tests
// =========================================================================

#[tokio::test]
async fn test_statistics_emitted_once_after_root_done() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(LocalJobDispatcher::new(Arc::clone(&map)));
    let statistics = Arc::new(RecordingStatisticsGatherer::new());
    let graph = Arc::new(fan_in_graph(9));

    let config = GraphExecutorConfig {
        max_fragment_size: 3,
        ..GraphExecutorConfig::default()
    };
    let graph_executor = GraphExecutor::new(
        dispatcher,
        map,
        Arc::clone(&statistics) as Arc<dyn super::GraphExecutorStatistics>,
        config,
    );
    let handle = graph_executor.execute(Arc::clone(&graph), "view-1", 1_000);
    handle.wait().await.unwrap();

    let records = statistics.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].calc_config_name, "Default");
    assert_eq!(records[0].graph_size, graph.size());
}

#[tokio::test]
async fn test_no_statistics_when_aborted() {
    init_tracing();
    let map = Arc::new(InMemoryIdentifierMap::new());
    let dispatcher = Arc::new(LocalJobDispatcher::new(Arc::clone(&map)).failing("LeafFn"));
    let statistics = Arc::new(RecordingStatisticsGatherer::new());
    let graph = Arc::new(fan_in_graph(3));

    let graph_executor = GraphExecutor::new(
        dispatcher,
        map,
        Arc::clone(&statistics) as Arc<dyn super::GraphExecutorStatistics>,
        GraphExecutorConfig::default(),
    );
    let handle = graph_executor.execute(graph, "view-1", 1_000);
    let _ = handle.wait().await;

    assert!(statistics.records().is_empty());
}
