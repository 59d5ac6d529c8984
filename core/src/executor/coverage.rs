use std::path::Path;

use serde::Deserialize;

use crate::model::{CoverageData, CoverageMetric};

#[derive(Debug, Deserialize)]
struct IstanbulSummary {
    total: IstanbulTotals,
}

#[derive(Debug, Default, Deserialize)]
struct IstanbulTotals {
    #[serde(default)]
    lines: IstanbulMetric,
    #[serde(default)]
    branches: IstanbulMetric,
    #[serde(default)]
    functions: IstanbulMetric,
    #[serde(default)]
    statements: IstanbulMetric,
}

#[derive(Debug, Default, Deserialize)]
struct IstanbulMetric {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    covered: u64,
}

impl From<&IstanbulMetric> for CoverageMetric {
    fn from(m: &IstanbulMetric) -> Self {
        CoverageMetric::new(m.total, m.covered.min(m.total))
    }
}

/// Parses an istanbul `json-summary` document. Only the `total` block is used;
/// percentages are recomputed from the counters.
pub fn parse_istanbul_summary(json: &str) -> Result<CoverageData, serde_json::Error> {
    let summary: IstanbulSummary = serde_json::from_str(json)?;
    let t = &summary.total;
    Ok(CoverageData {
        lines: (&t.lines).into(),
        branches: (&t.branches).into(),
        functions: (&t.functions).into(),
        statements: (&t.statements).into(),
    })
}

/// Coverage for a node whose tests ran in `cwd`. A missing file means no
/// coverage; an unreadable or malformed one is logged and ignored.
pub async fn read_coverage(cwd: &Path, summary_path: &str) -> Option<CoverageData> {
    let path = cwd.join(summary_path);
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "coverage summary unreadable");
            return None;
        }
    };
    match parse_istanbul_summary(&text) {
        Ok(cov) => Some(cov),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "coverage summary malformed");
            None
        }
    }
}
