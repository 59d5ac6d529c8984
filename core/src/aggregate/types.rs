use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    BuildArtifacts, BuildFailure, BuildKind, BuildStatus, CoverageData, TestError, TestResults,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    #[default]
    Hierarchical,
    Flat,
    Grouped,
}

/// Narrows the flattened views only; roll-up counters always cover every node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BuildStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BuildKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_duration_ms: Option<u64>,
}

impl ResultFilter {
    pub fn matches(&self, build: &BuildSummary) -> bool {
        self.status.map_or(true, |s| build.status == s)
            && self.kind.map_or(true, |k| build.kind == k)
            && self
                .min_duration_ms
                .map_or(true, |min| build.duration_ms.unwrap_or(0) >= min)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationOptions {
    #[serde(default)]
    pub method: AggregationMethod,
    /// Roll descendant coverage into each ancestor. When false every node
    /// reports only its own coverage.
    #[serde(default = "default_aggregate_coverage")]
    pub aggregate_coverage: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<ResultFilter>,
}

fn default_aggregate_coverage() -> bool {
    true
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            method: AggregationMethod::default(),
            aggregate_coverage: default_aggregate_coverage(),
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl From<&TestResults> for TestCounts {
    fn from(t: &TestResults) -> Self {
        Self {
            total: t.total,
            passed: t.passed,
            failed: t.failed,
            skipped: t.skipped,
        }
    }
}

/// A node's own, non-recursive results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnResults {
    pub tests: TestCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageData>,
    #[serde(default)]
    pub errors: Vec<TestError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<BuildArtifacts>,
}

/// One row of the flattened views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    pub build_id: String,
    pub kind: BuildKind,
    pub status: BuildStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<TestCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BuildFailure>,
    /// Ids from the root down to this build, inclusive.
    pub path: Vec<String>,
}

/// Mirrors a result node and adds roll-ups over its whole subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub build_id: String,
    pub kind: BuildKind,
    /// Depth below the aggregated root, which is level 0.
    pub level: usize,
    pub status: BuildStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_results: Option<OwnResults>,

    pub total_builds: u64,
    pub total_tests: u64,
    pub passed_tests: u64,
    pub failed_tests: u64,
    pub skipped_tests: u64,

    /// Percentages are recomputed from summed totals, never averaged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregated_coverage: Option<CoverageData>,

    pub children: Vec<AggregatedResult>,
    pub all_builds: Vec<BuildSummary>,
    pub failed_builds: Vec<BuildSummary>,
    pub aggregation_method: AggregationMethod,
}

impl AggregatedResult {
    /// Pre-order walk over this node and all descendants.
    pub fn walk(&self) -> Vec<&AggregatedResult> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}
