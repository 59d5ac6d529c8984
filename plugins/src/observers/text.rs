use std::io::Write;
use std::sync::Mutex;

use tierbuild_core::events::{BuildEvent, BuildObserver, LogLevel};
use tierbuild_core::model::BuildStatus;

/// One human-readable line per lifecycle event. Command output lines are
/// only printed when `verbose` is set.
pub struct TextEventObserver<W: Write + Send> {
    writer: Mutex<W>,
    verbose: bool,
    ascii_only: bool,
}

impl TextEventObserver<std::io::Stderr> {
    pub fn stderr(verbose: bool, ascii_only: bool) -> Self {
        Self::new(std::io::stderr(), verbose, ascii_only)
    }
}

impl<W: Write + Send> TextEventObserver<W> {
    pub fn new(writer: W, verbose: bool, ascii_only: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            verbose,
            ascii_only,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn status_label(&self, status: BuildStatus) -> &'static str {
        match (status, self.ascii_only) {
            (BuildStatus::Passed, true) => "OK",
            (BuildStatus::Passed, false) => "PASSED",
            (BuildStatus::Failed, true) => "FAIL",
            (BuildStatus::Failed, false) => "FAILED",
            (BuildStatus::Skipped, _) => "SKIPPED",
            (BuildStatus::Running, _) => "RUNNING",
            (BuildStatus::Pending, _) => "PENDING",
        }
    }

    fn format_event(&self, event: &BuildEvent) -> Option<String> {
        let line = match event {
            BuildEvent::BuildStart {
                build_id,
                kind,
                parent_id,
                ..
            } => match parent_id {
                Some(parent) => format!("BUILD START {build_id} ({kind}, parent {parent})"),
                None => format!("BUILD START {build_id} ({kind})"),
            },
            BuildEvent::BuildComplete {
                build_id,
                status,
                duration_ms,
                ..
            } => format!(
                "BUILD END {build_id} (status {}, duration {duration_ms}ms)",
                self.status_label(*status)
            ),
            BuildEvent::BuildError {
                build_id, error, ..
            } => format!("BUILD ERROR {build_id} ({} phase): {}", error.phase, error.message),
            BuildEvent::BuildLog {
                build_id,
                level,
                message,
                source,
                ..
            } => {
                if !self.verbose && *level != LogLevel::Warn {
                    return None;
                }
                let tag = match level {
                    LogLevel::Info => "out",
                    LogLevel::Warn => "warn",
                    LogLevel::Error => "err",
                };
                format!("  [{build_id} {source} {tag}] {message}")
            }
            BuildEvent::CommandStart {
                build_id,
                command,
                phase,
                ..
            } => format!("COMMAND START {build_id} ({phase}): {command}"),
            BuildEvent::CommandComplete {
                build_id,
                phase,
                results,
                ..
            } => match results {
                Some(r) => format!(
                    "COMMAND END {build_id} ({phase}, tests {} total, {} passed, {} failed, {} skipped)",
                    r.total, r.passed, r.failed, r.skipped
                ),
                None => format!("COMMAND END {build_id} ({phase})"),
            },
            BuildEvent::BuildCancelled { build_id, .. } => format!("BUILD CANCELLED {build_id}"),
            BuildEvent::ArtifactsCollected {
                build_id,
                artifacts,
                ..
            } => format!("ARTIFACTS {build_id} ({} files)", artifacts.len()),
        };
        Some(line)
    }
}

impl<W: Write + Send> BuildObserver for TextEventObserver<W> {
    fn name(&self) -> &str {
        "text"
    }

    fn on_event(&self, event: &BuildEvent) {
        let Some(line) = self.format_event(event) else {
            return;
        };
        let mut w = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(w, "{line}") {
            tracing::debug!(error = %e, "text observer write failed");
        }
    }
}
