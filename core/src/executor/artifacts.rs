use std::path::{Path, PathBuf};

use crate::model::{ArtifactSettings, BuildArtifacts};

/// Resolves each pattern against `cwd` and sorts matches into buckets.
///
/// Returns the collected artifacts plus one message per pattern that could
/// not be evaluated. A pattern that matches nothing is not a problem.
pub fn collect_artifacts(cwd: &Path, settings: &ArtifactSettings) -> (BuildArtifacts, Vec<String>) {
    let mut artifacts = BuildArtifacts::default();
    let mut problems = Vec::new();

    for pattern in &settings.paths {
        let full = cwd.join(pattern);
        let full = full.to_string_lossy();
        let paths = match glob::glob(&full) {
            Ok(paths) => paths,
            Err(e) => {
                problems.push(format!("Failed to collect artifacts matching {pattern}: {e}"));
                continue;
            }
        };
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => classify(path, settings, &mut artifacts),
                Ok(_) => {}
                Err(e) => problems.push(format!("Failed to collect artifacts matching {pattern}: {e}")),
            }
        }
    }

    (artifacts, problems)
}

fn classify(path: PathBuf, settings: &ArtifactSettings, out: &mut BuildArtifacts) {
    let text = path.to_string_lossy();
    if settings.include_coverage && text.contains("coverage") {
        out.coverage.push(path);
    } else if settings.include_reports && text.contains("report") {
        out.reports.push(path);
    } else if settings.include_logs && text.ends_with(".log") {
        out.logs.push(path);
    } else {
        out.other.push(path);
    }
}
