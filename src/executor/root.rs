//! Root fragment completion handle - a single-resolution future with
//! cooperative cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::errors::{Error, ExecutionError};
use crate::prelude::Result;

use super::FragmentId;

/// A fragment failure recorded against the root, attributable to the
/// function/target that failed.
#[derive(Clone, Debug)]
pub struct FragmentFailure {
    pub fragment: FragmentId,
    pub function_unique_id: String,
    pub target: String,
    pub message: String,
}

/// What a completed execution delivered.
#[derive(Clone, Debug)]
pub struct GraphExecutionReport {
    pub calc_config_name: String,
    pub graph_size: usize,
    pub fragment_count: usize,
    pub executed_fragments: usize,
    /// Failures tolerated under `FailurePolicy::TolerateAndContinue`, or the
    /// triggering failure under `AbortRemaining`
    pub failures: Vec<FragmentFailure>,
    /// Sum of per-fragment worker time
    pub execution_time: Duration,
    /// End-to-end time from submission to root completion
    pub wall_time: Duration,
}

/// Terminal and non-terminal states of the root.
#[derive(Clone, Debug, Default)]
pub(super) enum RootState {
    #[default]
    Running,
    Done(GraphExecutionReport),
    /// Aborted by failure policy after a fragment failed.
    Aborted(String),
    Cancelled,
}

/// Completion handle for the whole graph: the distinguished fragment with no
/// consumers. Resolves exactly once; observable any number of times.
///
/// Waiters distinguish three terminal outcomes: done (possibly with tolerated
/// partial failures), aborted by failure policy, and cancelled. A bounded
/// wait that elapses returns [`ExecutionError::Timeout`] without cancelling
/// the job, leaving it eligible for a later wait.
#[derive(Clone)]
pub struct RootFragmentHandle {
    state: watch::Receiver<RootState>,
    cancel: Arc<watch::Sender<bool>>,
}

impl RootFragmentHandle {
    pub(super) fn new(
        state: watch::Receiver<RootState>,
        cancel: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self { state, cancel }
    }

    /// Requests cooperative cancellation of all in-flight and not-yet-started
    /// fragments. Fragments that already delivered are not rolled back.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_done(&self) -> bool {
        matches!(*self.state.borrow(), RootState::Done(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(*self.state.borrow(), RootState::Cancelled)
    }

    /// Blocks until the root reaches a terminal state.
    pub async fn wait(&self) -> Result<GraphExecutionReport> {
        let mut state = self.state.clone();
        let terminal = state
            .wait_for(|s| !matches!(s, RootState::Running))
            .await
            .map_err(|_| Error::Execution(ExecutionError::Cancelled))?;
        match &*terminal {
            RootState::Done(report) => Ok(report.clone()),
            RootState::Aborted(message) => Err(Error::Execution(ExecutionError::Aborted {
                message: message.clone(),
            })),
            RootState::Cancelled => Err(Error::Execution(ExecutionError::Cancelled)),
            RootState::Running => unreachable!("wait_for excludes Running"),
        }
    }

    /// Bounded wait: elapsing yields `Timeout` and leaves the job running.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<GraphExecutionReport> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Execution(ExecutionError::Timeout)),
        }
    }
}
