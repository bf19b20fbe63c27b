#![deny(unreachable_pub)]

// Core modules
mod errors;
mod prelude;

// Engine modules
pub mod cache;
pub mod calcnode;
pub mod executor;
pub mod graph;
pub mod livedata;
pub mod resolver;
pub mod value;

// Re-exports
pub use errors::{
    CacheError, Error, ExecutionError, GraphError, ResolutionError, TargetError,
};
pub use prelude::Result;

pub use cache::{
    CacheSelectHint, IdentifierMap, InMemoryIdentifierMap, InMemoryViewComputationCache,
    ViewComputationCache,
};
pub use calcnode::{
    CalculationJob, CalculationJobItem, CalculationJobResult, CalculationJobResultItem,
    CalculationJobSpecification, JobDispatcher, JobItemOutcome,
};
pub use executor::{
    FailurePolicy, FragmentGraph, FragmentId, GraphExecutionReport, GraphExecutor,
    GraphExecutorConfig, GraphExecutorStatistics, RootFragmentHandle,
};
pub use graph::{
    CompiledViewDefinition, DependencyGraph, DependencyGraphBuilder, DependencyNode,
    GraphBuildContext, LiveDataDeltaCalculator, NodeId,
};
pub use livedata::{InMemoryLiveDataSnapshotProvider, LiveDataSnapshotProvider};
pub use resolver::{
    DefaultFunctionResolver, FunctionDefinition, FunctionParameters, FunctionResolver,
    ParameterizedFunction, Resolution, ResolutionRule,
};
pub use value::{
    ComputationTarget, ComputationTargetResolver, ComputationTargetSpecification,
    ComputationTargetType, ComputedValue, InMemoryComputationTargetResolver, TargetObject,
    UniqueIdentifier, ValueRequirement, ValueSpecification, LIVE_DATA_SOURCING_FUNCTION,
};
