//! Configuration and result trees shared by the executor and the aggregator.

mod node;
mod result;

pub use node::{
    AggregationSettings, ArtifactSettings, BuildKind, BuildNodeConfig, ExecutionOrder,
    FailureHandling,
};
pub use result::{
    BuildArtifacts, BuildFailure, BuildNodeResult, BuildPhase, BuildStatus, CoverageData,
    CoverageMetric, TestError, TestResults,
};
