use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::types::AggregatedResult;

const CSV_HEADER: &str = "Build ID,Build Type,Status,Total Tests,Passed,Failed,Skipped,Duration (ms)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn export(agg: &AggregatedResult, format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(agg)?),
        ExportFormat::Csv => Ok(to_csv(agg)),
    }
}

/// One row per entry of `all_builds`, so a filter applied during aggregation
/// carries through.
fn to_csv(agg: &AggregatedResult) -> String {
    let mut rows = Vec::with_capacity(agg.all_builds.len() + 1);
    rows.push(CSV_HEADER.to_string());
    for build in &agg.all_builds {
        let tests = build.tests.unwrap_or_default();
        rows.push(
            [
                csv_field(&build.build_id),
                build.kind.to_string(),
                build.status.to_string(),
                tests.total.to_string(),
                tests.passed.to_string(),
                tests.failed.to_string(),
                tests.skipped.to_string(),
                build.duration_ms.unwrap_or(0).to_string(),
            ]
            .join(","),
        );
    }
    rows.join("\n")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
