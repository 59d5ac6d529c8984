//! Bottom-up roll-up of a finished result tree, plus summary reports and
//! plain serializations of the aggregate.

mod aggregator;
mod export;
mod report;
mod types;

pub use aggregator::ResultAggregator;
pub use export::{export, ExportError, ExportFormat};
pub use report::{
    pass_rate, BuildBreakdown, CollectedTestError, CoverageSummary, FailedBuild, Overview,
    PerformanceMetrics, SummaryReport,
};
pub use types::{
    AggregatedResult, AggregationMethod, AggregationOptions, BuildSummary, OwnResults,
    ResultFilter, TestCounts,
};
