#![cfg(unix)]

mod common;

use pretty_assertions::assert_eq;
use tierbuild_core::aggregate::{AggregationOptions, ExportFormat, ResultAggregator, ResultFilter};
use tierbuild_core::model::{BuildKind, BuildNodeConfig, BuildNodeResult, BuildStatus, FailureHandling};

use common::{jest_summary, recording_executor, story, write_coverage_summary};

async fn run_sample(dir: &std::path::Path) -> BuildNodeResult {
    let a = dir.join("a");
    let b = dir.join("b");
    write_coverage_summary(&a, 100, 80);
    write_coverage_summary(&b, 200, 180);

    let tree = BuildNodeConfig::new("epic", BuildKind::Epic).with_child(
        BuildNodeConfig::new("theme", BuildKind::Theme)
            .with_failure_handling(FailureHandling::Continue)
            .with_child(
                story("a")
                    .with_working_directory(&a)
                    .with_test_command(jest_summary(5, 0)),
            )
            .with_child(
                story("b")
                    .with_working_directory(&b)
                    .with_test_command(jest_summary(3, 2)),
            ),
    );
    let (executor, _) = recording_executor();
    executor.execute_build(&tree).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn executed_tree_rolls_up_tests_and_weighted_coverage() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_sample(dir.path()).await;
    assert_eq!(result.status, BuildStatus::Failed);
    assert!(result.children[0].children[0].coverage.is_some());
    // Failed assertions with a zero exit code still produce coverage.
    assert_eq!(result.children[0].children[1].status, BuildStatus::Failed);
    assert!(result.children[0].children[1].coverage.is_some());

    let agg = ResultAggregator::new().aggregate_results(&result, &AggregationOptions::default());

    assert_eq!(agg.total_builds, 4);
    let own_total: u64 = result
        .walk()
        .iter()
        .filter_map(|n| n.test_results.as_ref())
        .map(|t| t.total)
        .sum();
    assert_eq!(agg.total_tests, own_total);
    assert_eq!((agg.passed_tests, agg.failed_tests), (8, 2));

    let cov = agg.aggregated_coverage.unwrap();
    assert_eq!((cov.lines.total, cov.lines.covered), (300, 260));
    assert!((cov.lines.percentage - 86.67).abs() < 0.01);

    let failed: Vec<&str> = agg.failed_builds.iter().map(|b| b.build_id.as_str()).collect();
    assert_eq!(failed, vec!["epic", "theme", "b"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn summary_and_exports_follow_the_aggregate() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_sample(dir.path()).await;
    let aggregator = ResultAggregator::new();
    let agg = aggregator.aggregate_results(&result, &AggregationOptions::default());

    let report = aggregator.generate_summary_report(&agg);
    assert_eq!(report.title, "Test Results Summary - epic");
    assert_eq!(report.overview.pass_rate, "80.00%");
    assert_eq!(report.overview.status, BuildStatus::Failed);
    assert_eq!(report.coverage.unwrap().lines, "86.67%");
    assert_eq!(report.build_breakdown.len(), 3);
    assert_eq!(report.failed_builds.len(), 3);

    let csv = aggregator.export(&agg, ExportFormat::Csv).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[3].starts_with("a,story,passed,5,5,0,0,"));
    assert!(lines[4].starts_with("b,story,failed,5,3,2,0,"));

    let json = aggregator.export(&agg, ExportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["totalTests"], 10);
    assert_eq!(value["children"][0]["children"][1]["buildId"], "b");
}

#[tokio::test(flavor = "multi_thread")]
async fn aggregation_is_idempotent_and_filters_lists_only() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_sample(dir.path()).await;
    let aggregator = ResultAggregator::new();

    let first = aggregator.aggregate_results(&result, &AggregationOptions::default());
    let second = aggregator.aggregate_results(&result, &AggregationOptions::default());
    assert_eq!(first, second);

    let filtered = aggregator.aggregate_results(
        &result,
        &AggregationOptions {
            filter: Some(ResultFilter {
                status: Some(BuildStatus::Failed),
                kind: Some(BuildKind::Story),
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    let ids: Vec<&str> = filtered.all_builds.iter().map(|b| b.build_id.as_str()).collect();
    assert_eq!(ids, vec!["b"]);
    assert_eq!(filtered.total_tests, first.total_tests);
}
