//! Execution statistics collaborator.

use std::sync::Mutex;
use std::time::Duration;

use tracing::info;

/// Append-only sink for per-graph execution statistics. Reported exactly once
/// per executed graph, after the root is marked done, so the numbers always
/// reflect a fully-executed graph. Never queried by the engine and must not
/// affect scheduling decisions.
pub trait GraphExecutorStatistics: Send + Sync {
    fn graph_executed(
        &self,
        calc_config_name: &str,
        graph_size: usize,
        execution_time: Duration,
        wall_time: Duration,
    );
}

/// Default gatherer: structured log line per executed graph.
#[derive(Default)]
pub struct TracingStatisticsGatherer;

impl GraphExecutorStatistics for TracingStatisticsGatherer {
    fn graph_executed(
        &self,
        calc_config_name: &str,
        graph_size: usize,
        execution_time: Duration,
        wall_time: Duration,
    ) {
        info!(
            calc_config = calc_config_name,
            graph_size,
            execution_ms = execution_time.as_millis() as u64,
            wall_ms = wall_time.as_millis() as u64,
            "graph executed"
        );
    }
}

/// Record of one executed graph.
#[derive(Clone, Debug)]
pub struct GraphExecutedRecord {
    pub calc_config_name: String,
    pub graph_size: usize,
    pub execution_time: Duration,
    pub wall_time: Duration,
}

/// Gatherer retaining every record, for inspection in tests and tooling.
#[derive(Default)]
pub struct RecordingStatisticsGatherer {
    records: Mutex<Vec<GraphExecutedRecord>>,
}

impl RecordingStatisticsGatherer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<GraphExecutedRecord> {
        self.records.lock().expect("statistics lock poisoned").clone()
    }
}

impl GraphExecutorStatistics for RecordingStatisticsGatherer {
    fn graph_executed(
        &self,
        calc_config_name: &str,
        graph_size: usize,
        execution_time: Duration,
        wall_time: Duration,
    ) {
        self.records
            .lock()
            .expect("statistics lock poisoned")
            .push(GraphExecutedRecord {
                calc_config_name: calc_config_name.to_string(),
                graph_size,
                execution_time,
                wall_time,
            });
    }
}
