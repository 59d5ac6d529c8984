use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::node::{BuildKind, BuildNodeConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

impl BuildStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Running => "running",
            BuildStatus::Passed => "passed",
            BuildStatus::Failed => "failed",
            BuildStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BuildStatus::Passed | BuildStatus::Failed | BuildStatus::Skipped
        )
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    Build,
    Test,
}

impl BuildPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildPhase::Build => "build",
            BuildPhase::Test => "test",
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestError {
    pub test: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Counters for a single node's own test command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResults {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    #[serde(default)]
    pub errors: Vec<TestError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageMetric {
    pub total: u64,
    pub covered: u64,
    pub percentage: f64,
}

impl CoverageMetric {
    pub fn new(total: u64, covered: u64) -> Self {
        let mut metric = Self {
            total,
            covered,
            percentage: 0.0,
        };
        metric.recompute();
        metric
    }

    pub fn recompute(&mut self) {
        self.percentage = if self.total > 0 {
            self.covered as f64 / self.total as f64 * 100.0
        } else {
            0.0
        };
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageData {
    pub lines: CoverageMetric,
    pub branches: CoverageMetric,
    pub functions: CoverageMetric,
    pub statements: CoverageMetric,
}

impl CoverageData {
    fn metrics_mut(&mut self) -> [&mut CoverageMetric; 4] {
        [
            &mut self.lines,
            &mut self.branches,
            &mut self.functions,
            &mut self.statements,
        ]
    }

    pub fn metrics(&self) -> [&CoverageMetric; 4] {
        [&self.lines, &self.branches, &self.functions, &self.statements]
    }

    /// Adds `other`'s totals into `self`. Percentages are left stale until
    /// [`CoverageData::recompute_percentages`] runs.
    pub fn absorb(&mut self, other: &CoverageData) {
        for (mine, theirs) in self.metrics_mut().into_iter().zip(other.metrics()) {
            mine.total += theirs.total;
            mine.covered += theirs.covered;
        }
    }

    pub fn recompute_percentages(&mut self) {
        for metric in self.metrics_mut() {
            metric.recompute();
        }
    }

    /// Unweighted mean of the four metric percentages.
    pub fn overall_percentage(&self) -> f64 {
        self.metrics().iter().map(|m| m.percentage).sum::<f64>() / 4.0
    }
}

/// Failure of one of a node's own commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFailure {
    pub message: String,
    pub phase: BuildPhase,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifacts {
    pub reports: Vec<PathBuf>,
    pub coverage: Vec<PathBuf>,
    pub logs: Vec<PathBuf>,
    pub other: Vec<PathBuf>,
}

impl BuildArtifacts {
    pub fn len(&self) -> usize {
        self.reports.len() + self.coverage.len() + self.logs.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result node produced 1:1 for every [`BuildNodeConfig`]; mirrors its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildNodeResult {
    pub build_id: String,
    pub kind: BuildKind,
    pub status: BuildStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_results: Option<TestResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<BuildArtifacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BuildFailure>,
    #[serde(default)]
    pub children: Vec<BuildNodeResult>,
}

impl BuildNodeResult {
    pub fn new(build_id: impl Into<String>, kind: BuildKind, status: BuildStatus) -> Self {
        Self {
            build_id: build_id.into(),
            kind,
            status,
            start_time: None,
            end_time: None,
            duration_ms: None,
            test_results: None,
            coverage: None,
            artifacts: None,
            error: None,
            children: Vec::new(),
        }
    }

    /// A `skipped` result for `config` and every descendant, none of which ran.
    pub fn skipped_subtree(config: &BuildNodeConfig) -> Self {
        let mut result = Self::new(config.id.clone(), config.kind, BuildStatus::Skipped);
        result.children = config.children.iter().map(Self::skipped_subtree).collect();
        result
    }

    pub fn find(&self, build_id: &str) -> Option<&BuildNodeResult> {
        if self.build_id == build_id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(build_id))
    }

    /// Pre-order walk over this node and all descendants.
    pub fn walk(&self) -> Vec<&BuildNodeResult> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }

    /// True when this result tree has exactly the shape of `config`.
    pub fn mirrors(&self, config: &BuildNodeConfig) -> bool {
        self.build_id == config.id
            && self.kind == config.kind
            && self.children.len() == config.children.len()
            && self
                .children
                .iter()
                .zip(&config.children)
                .all(|(r, c)| r.mirrors(c))
    }
}
