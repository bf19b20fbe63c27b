use thiserror::Error;

use crate::value::{ComputationTargetSpecification, ValueRequirement};

/// Resolution errors raised while choosing a function for a requirement.
#[derive(Error, Debug, Clone)]
pub enum ResolutionError {
    #[error("No resolution rule can satisfy requirement {requirement} for target {target}")]
    Unsatisfiable {
        requirement: ValueRequirement,
        target: ComputationTargetSpecification,
    },
    #[error("More than 1 rule with priority {priority} can satisfy requirement {requirement} for target {target}. The rules are: {candidates:?}")]
    Ambiguous {
        requirement: ValueRequirement,
        target: ComputationTargetSpecification,
        priority: i32,
        /// Function unique ids of every applicable rule in the tier, sorted.
        candidates: Vec<String>,
    },
}

/// Dependency graph construction and delta calculation errors.
#[derive(Error, Debug, Clone)]
pub enum GraphError {
    /// A recursive resolution failed; carries the requirement path from the
    /// originally requested output down to the failing requirement.
    #[error("Graph build failed resolving {path:?}: {source}")]
    Build {
        path: Vec<ValueRequirement>,
        source: ResolutionError,
    },
    /// The requirement is already being resolved on the current path.
    #[error("Cycle detected: requirement {requirement} is a transitive input of itself")]
    CycleDetected { requirement: ValueRequirement },
    #[error("Edge {from} -> {to} would close a cycle")]
    CyclicEdge { from: usize, to: usize },
    #[error("Cannot compute delta twice")]
    DeltaAlreadyComputed,
    #[error("Call compute_delta() first")]
    DeltaNotComputed,
}

/// Fragment scheduling and remote execution errors.
#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    /// The root was cancelled; a terminal state, distinguished from failure.
    #[error("Graph execution cancelled")]
    Cancelled,
    /// A bounded wait elapsed. The job is still running and a later wait may
    /// succeed.
    #[error("Timed out waiting for graph execution")]
    Timeout,
    #[error("Remote execution of fragment {fragment} failed for function {function} on target {target}: {message}")]
    RemoteFailure {
        fragment: usize,
        function: String,
        target: String,
        message: String,
    },
    #[error("Graph execution aborted after fragment failure: {message}")]
    Aborted { message: String },
    #[error("Dispatch error: {0}")]
    Dispatch(String),
}

/// Identifier map and value cache errors.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("Unknown value identifier {0}")]
    UnknownIdentifier(u64),
}

/// Target model errors.
#[derive(Error, Debug, Clone)]
pub enum TargetError {
    #[error("Target type {declared:?} is not compatible with the wrapped object (structural type {actual:?})")]
    Incompatible {
        declared: crate::value::ComputationTargetType,
        actual: crate::value::ComputationTargetType,
    },
    #[error("Unknown computation target {0}")]
    Unresolved(ComputationTargetSpecification),
}

/// Main engine error type.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Target(#[from] TargetError),
}

// Convenience constructors for common error patterns
impl Error {
    /// Create a remote execution failure attributable to a function/target.
    pub fn remote_failure(
        fragment: usize,
        function: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Execution(ExecutionError::RemoteFailure {
            fragment,
            function: function.into(),
            target: target.into(),
            message: message.into(),
        })
    }

    /// Create a dispatch error.
    pub fn dispatch(msg: impl Into<String>) -> Self {
        Error::Execution(ExecutionError::Dispatch(msg.into()))
    }

    /// True if this is the cancellation terminal state rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Execution(ExecutionError::Cancelled))
    }
}
