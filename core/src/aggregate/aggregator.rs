use std::time::Instant;

use crate::model::{BuildNodeResult, BuildStatus, CoverageData};

use super::export::{export, ExportError, ExportFormat};
use super::report::{summarize, SummaryReport};
use super::types::{AggregatedResult, AggregationOptions, BuildSummary, OwnResults, TestCounts};

/// Rolls a finished result tree up into totals, coverage and flattened views.
///
/// Every operation is a pure function of its input; aggregating the same tree
/// twice yields identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate_results(
        &self,
        root: &BuildNodeResult,
        options: &AggregationOptions,
    ) -> AggregatedResult {
        let started = Instant::now();
        tracing::debug!(target: "tierbuild.aggregate", build_id = %root.build_id, "aggregation.start");
        let aggregated = aggregate_node(root, options, 0, &[]);
        tracing::debug!(
            target: "tierbuild.aggregate",
            build_id = %root.build_id,
            total_builds = aggregated.total_builds,
            elapsed_us = started.elapsed().as_micros() as u64,
            "aggregation.complete"
        );
        aggregated
    }

    pub fn generate_summary_report(&self, aggregated: &AggregatedResult) -> SummaryReport {
        summarize(aggregated)
    }

    pub fn export(
        &self,
        aggregated: &AggregatedResult,
        format: ExportFormat,
    ) -> Result<String, ExportError> {
        export(aggregated, format)
    }
}

/// Post-order: children are aggregated before their totals are folded in.
fn aggregate_node(
    node: &BuildNodeResult,
    options: &AggregationOptions,
    level: usize,
    ancestors: &[String],
) -> AggregatedResult {
    let mut path = ancestors.to_vec();
    path.push(node.build_id.clone());

    let own = node.test_results.as_ref();
    let summary = build_summary(node, &path);
    let failed_builds = if node.status == BuildStatus::Failed {
        vec![summary.clone()]
    } else {
        Vec::new()
    };

    let mut agg = AggregatedResult {
        build_id: node.build_id.clone(),
        kind: node.kind,
        level,
        status: node.status,
        start_time: node.start_time,
        end_time: node.end_time,
        duration_ms: node.duration_ms,
        own_results: own.map(|t| OwnResults {
            tests: t.into(),
            coverage: node.coverage,
            errors: t.errors.clone(),
            artifacts: node.artifacts.clone(),
        }),
        total_builds: 1,
        total_tests: own.map_or(0, |t| t.total),
        passed_tests: own.map_or(0, |t| t.passed),
        failed_tests: own.map_or(0, |t| t.failed),
        skipped_tests: own.map_or(0, |t| t.skipped),
        aggregated_coverage: node.coverage,
        children: Vec::with_capacity(node.children.len()),
        all_builds: vec![summary],
        failed_builds,
        aggregation_method: options.method,
    };

    for child in &node.children {
        let c = aggregate_node(child, options, level + 1, &path);

        agg.total_builds += c.total_builds;
        agg.total_tests += c.total_tests;
        agg.passed_tests += c.passed_tests;
        agg.failed_tests += c.failed_tests;
        agg.skipped_tests += c.skipped_tests;

        if options.aggregate_coverage {
            if let Some(cov) = &c.aggregated_coverage {
                agg.aggregated_coverage
                    .get_or_insert_with(CoverageData::default)
                    .absorb(cov);
            }
        }

        agg.all_builds.extend(c.all_builds.iter().cloned());
        agg.failed_builds.extend(c.failed_builds.iter().cloned());
        agg.children.push(c);
    }

    if let Some(cov) = agg.aggregated_coverage.as_mut() {
        cov.recompute_percentages();
    }

    if let Some(filter) = &options.filter {
        agg.all_builds.retain(|b| filter.matches(b));
        agg.failed_builds.retain(|b| filter.matches(b));
    }

    agg
}

fn build_summary(node: &BuildNodeResult, path: &[String]) -> BuildSummary {
    BuildSummary {
        build_id: node.build_id.clone(),
        kind: node.kind,
        status: node.status,
        duration_ms: node.duration_ms,
        tests: node.test_results.as_ref().map(TestCounts::from),
        coverage: node.coverage,
        error: node.error.clone(),
        path: path.to_vec(),
    }
}
