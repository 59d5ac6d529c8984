use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{BuildKind, BuildStatus, CoverageData};

use super::types::{AggregatedResult, BuildSummary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub title: String,
    pub kind: BuildKind,
    pub overview: Overview,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageSummary>,
    pub build_breakdown: Vec<BuildBreakdown>,
    pub failed_builds: Vec<FailedBuild>,
    pub test_errors: Vec<CollectedTestError>,
    pub performance: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_builds: u64,
    pub total_tests: u64,
    pub passed_tests: u64,
    pub failed_tests: u64,
    pub skipped_tests: u64,
    /// `"87.50%"`, or `"N/A"` when no tests ran.
    pub pass_rate: String,
    pub status: BuildStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub lines: String,
    pub branches: String,
    pub functions: String,
    pub statements: String,
    /// Mean of the four percentages above.
    pub overall: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildBreakdown {
    pub kind: BuildKind,
    pub count: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub total_tests: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedBuild {
    pub build_id: String,
    pub kind: BuildKind,
    pub error: String,
    pub failed_tests: u64,
}

/// A test failure tagged with the build that reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedTestError {
    pub build_id: String,
    pub kind: BuildKind,
    pub test: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_duration_ms: u64,
    pub average_build_duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slowest: Option<BuildSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastest: Option<BuildSummary>,
}

pub(crate) fn summarize(agg: &AggregatedResult) -> SummaryReport {
    SummaryReport {
        title: format!("Test Results Summary - {}", agg.build_id),
        kind: agg.kind,
        overview: Overview {
            total_builds: agg.total_builds,
            total_tests: agg.total_tests,
            passed_tests: agg.passed_tests,
            failed_tests: agg.failed_tests,
            skipped_tests: agg.skipped_tests,
            pass_rate: pass_rate(agg.passed_tests, agg.total_tests),
            status: agg.status,
        },
        coverage: agg.aggregated_coverage.as_ref().map(coverage_summary),
        build_breakdown: breakdown(&agg.all_builds),
        failed_builds: agg
            .failed_builds
            .iter()
            .map(|b| FailedBuild {
                build_id: b.build_id.clone(),
                kind: b.kind,
                error: b
                    .error
                    .as_ref()
                    .map_or_else(|| "Unknown error".to_string(), |e| e.message.clone()),
                failed_tests: b.tests.map_or(0, |t| t.failed),
            })
            .collect(),
        test_errors: collect_test_errors(agg),
        performance: PerformanceMetrics {
            total_duration_ms: agg.duration_ms.unwrap_or(0),
            average_build_duration_ms: average_duration(&agg.all_builds),
            slowest: slowest(&agg.all_builds).cloned(),
            fastest: fastest(&agg.all_builds).cloned(),
        },
    }
}

pub fn pass_rate(passed: u64, total: u64) -> String {
    if total == 0 {
        "N/A".to_string()
    } else {
        format!("{:.2}%", passed as f64 / total as f64 * 100.0)
    }
}

fn coverage_summary(cov: &CoverageData) -> CoverageSummary {
    let pct = |p: f64| format!("{p:.2}%");
    CoverageSummary {
        lines: pct(cov.lines.percentage),
        branches: pct(cov.branches.percentage),
        functions: pct(cov.functions.percentage),
        statements: pct(cov.statements.percentage),
        overall: pct(cov.overall_percentage()),
    }
}

/// Grouped by kind, in epic, theme, story order.
fn breakdown(builds: &[BuildSummary]) -> Vec<BuildBreakdown> {
    let mut groups: BTreeMap<BuildKind, BuildBreakdown> = BTreeMap::new();
    for build in builds {
        let entry = groups.entry(build.kind).or_insert_with(|| BuildBreakdown {
            kind: build.kind,
            count: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            total_tests: 0,
        });
        entry.count += 1;
        match build.status {
            BuildStatus::Passed => entry.passed += 1,
            BuildStatus::Failed => entry.failed += 1,
            BuildStatus::Skipped => entry.skipped += 1,
            BuildStatus::Pending | BuildStatus::Running => {}
        }
        entry.total_tests += build.tests.map_or(0, |t| t.total);
    }
    groups.into_values().collect()
}

fn collect_test_errors(agg: &AggregatedResult) -> Vec<CollectedTestError> {
    agg.walk()
        .into_iter()
        .filter_map(|node| node.own_results.as_ref().map(|own| (node, own)))
        .flat_map(|(node, own)| {
            own.errors.iter().map(move |e| CollectedTestError {
                build_id: node.build_id.clone(),
                kind: node.kind,
                test: e.test.clone(),
                error: e.error.clone(),
                stack: e.stack.clone(),
            })
        })
        .collect()
}

fn average_duration(builds: &[BuildSummary]) -> f64 {
    let durations: Vec<u64> = builds.iter().filter_map(|b| b.duration_ms).collect();
    if durations.is_empty() {
        return 0.0;
    }
    durations.iter().sum::<u64>() as f64 / durations.len() as f64
}

// Ties keep the earliest build in pre-order.
fn slowest(builds: &[BuildSummary]) -> Option<&BuildSummary> {
    let mut best: Option<&BuildSummary> = None;
    for build in builds.iter().filter(|b| b.duration_ms.is_some()) {
        if best.map_or(true, |cur| build.duration_ms > cur.duration_ms) {
            best = Some(build);
        }
    }
    best
}

fn fastest(builds: &[BuildSummary]) -> Option<&BuildSummary> {
    let mut best: Option<&BuildSummary> = None;
    for build in builds.iter().filter(|b| b.duration_ms.is_some()) {
        if best.map_or(true, |cur| build.duration_ms < cur.duration_ms) {
            best = Some(build);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregationOptions, ResultAggregator};
    use crate::model::{
        BuildFailure, BuildNodeResult, BuildPhase, CoverageMetric, TestError, TestResults,
    };
    use pretty_assertions::assert_eq;

    fn story(id: &str, status: BuildStatus, duration: Option<u64>) -> BuildNodeResult {
        let mut r = BuildNodeResult::new(id, BuildKind::Story, status);
        r.duration_ms = duration;
        r
    }

    fn sample() -> AggregatedResult {
        let mut s1 = story("s1", BuildStatus::Passed, Some(30));
        s1.test_results = Some(TestResults {
            total: 4,
            passed: 4,
            ..Default::default()
        });
        s1.coverage = Some(CoverageData {
            lines: CoverageMetric::new(10, 5),
            branches: CoverageMetric::new(4, 4),
            functions: CoverageMetric::new(2, 1),
            statements: CoverageMetric::new(10, 5),
        });
        let mut s2 = story("s2", BuildStatus::Failed, Some(30));
        s2.test_results = Some(TestResults {
            total: 4,
            passed: 3,
            failed: 1,
            skipped: 0,
            errors: vec![TestError {
                test: "parses input".into(),
                error: "expected 1".into(),
                stack: None,
            }],
        });
        let mut s3 = story("s3", BuildStatus::Failed, Some(5));
        s3.error = Some(BuildFailure {
            message: "Command failed with exit code 2: boom".into(),
            phase: BuildPhase::Build,
        });
        let s4 = story("s4", BuildStatus::Skipped, None);

        let mut theme = BuildNodeResult::new("t1", BuildKind::Theme, BuildStatus::Failed);
        theme.duration_ms = Some(80);
        theme.children = vec![s1, s2, s3, s4];
        ResultAggregator::new().aggregate_results(&theme, &AggregationOptions::default())
    }

    #[test]
    fn overview_and_coverage_strings() {
        let report = summarize(&sample());
        assert_eq!(report.title, "Test Results Summary - t1");
        assert_eq!(report.overview.total_builds, 5);
        assert_eq!(report.overview.pass_rate, "87.50%");
        let cov = report.coverage.unwrap();
        assert_eq!(cov.lines, "50.00%");
        assert_eq!(cov.branches, "100.00%");
        assert_eq!(cov.overall, "62.50%");
    }

    #[test]
    fn pass_rate_without_tests_is_not_applicable() {
        assert_eq!(pass_rate(0, 0), "N/A");
        assert_eq!(pass_rate(1, 3), "33.33%");
    }

    #[test]
    fn breakdown_groups_by_kind_in_tier_order() {
        let report = summarize(&sample());
        assert_eq!(
            report.build_breakdown,
            vec![
                BuildBreakdown {
                    kind: BuildKind::Theme,
                    count: 1,
                    passed: 0,
                    failed: 1,
                    skipped: 0,
                    total_tests: 0,
                },
                BuildBreakdown {
                    kind: BuildKind::Story,
                    count: 4,
                    passed: 1,
                    failed: 2,
                    skipped: 1,
                    total_tests: 8,
                },
            ]
        );
    }

    #[test]
    fn failed_builds_and_test_errors() {
        let report = summarize(&sample());
        let failed: Vec<(&str, &str, u64)> = report
            .failed_builds
            .iter()
            .map(|f| (f.build_id.as_str(), f.error.as_str(), f.failed_tests))
            .collect();
        assert_eq!(
            failed,
            vec![
                ("t1", "Unknown error", 0),
                ("s2", "Unknown error", 1),
                ("s3", "Command failed with exit code 2: boom", 0),
            ]
        );
        assert_eq!(report.test_errors.len(), 1);
        assert_eq!(report.test_errors[0].build_id, "s2");
        assert_eq!(report.test_errors[0].test, "parses input");
    }

    #[test]
    fn performance_ignores_missing_durations_and_keeps_first_tie() {
        let perf = summarize(&sample()).performance;
        assert_eq!(perf.total_duration_ms, 80);
        // t1 80, s1 30, s2 30, s3 5; s4 has none
        assert!((perf.average_build_duration_ms - 36.25).abs() < 1e-9);
        assert_eq!(perf.slowest.unwrap().build_id, "t1");
        assert_eq!(perf.fastest.unwrap().build_id, "s3");

        let tie = [
            story("x", BuildStatus::Passed, Some(7)),
            story("y", BuildStatus::Passed, Some(7)),
        ];
        let summaries: Vec<BuildSummary> = tie
            .iter()
            .map(|r| ResultAggregator::new().aggregate_results(r, &AggregationOptions::default()))
            .map(|a| a.all_builds[0].clone())
            .collect();
        assert_eq!(slowest(&summaries).unwrap().build_id, "x");
        assert_eq!(fastest(&summaries).unwrap().build_id, "x");
    }
}
