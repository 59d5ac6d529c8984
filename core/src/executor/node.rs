use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::CommandError;
use crate::events::{BuildEvent, LogLevel};
use crate::model::{
    BuildFailure, BuildNodeConfig, BuildNodeResult, BuildPhase, BuildStatus, FailureHandling,
    TestResults,
};
use crate::runner::{CommandOutput, CommandSpec};

use super::artifacts::collect_artifacts;
use super::context::ExecContext;
use super::coverage::read_coverage;
use super::engine::Inner;
use super::scheduler::{BoundedPool, Slot};
use super::status::{determine_status, interrupted_status};

/// How a node's own command ended, from the node's point of view.
enum Outcome {
    Succeeded(CommandOutput),
    Failed(CommandError),
    Interrupted,
}

/// Executes one node and, recursively, its subtree.
///
/// Boxed so children can be spawned as independent `'static` tasks.
pub(crate) fn execute_node(
    inner: Arc<Inner>,
    config: BuildNodeConfig,
    parent_ctx: ExecContext,
    token: CancellationToken,
) -> BoxFuture<'static, BuildNodeResult> {
    let span = tracing::debug_span!("build_node", build_id = %config.id, kind = %config.kind);
    async move {
        let started = Instant::now();
        let mut result = BuildNodeResult::new(config.id.clone(), config.kind, BuildStatus::Running);
        result.start_time = Some(Utc::now());
        inner.record(&result);
        inner.bus.emit(BuildEvent::BuildStart {
            build_id: config.id.clone(),
            kind: config.kind,
            parent_id: config.parent_id.clone(),
            timestamp: Utc::now(),
        });

        if token.is_cancelled() {
            result.children = config.children.iter().map(BuildNodeResult::skipped_subtree).collect();
            result.status = BuildStatus::Skipped;
            return finalize(&inner, result, started);
        }

        let ctx = parent_ctx.for_node(&config);
        let policy = config.failure_handling();
        let mut command_failed = false;
        let mut interrupted = false;

        if let Some(cmd) = config.build_command.as_deref() {
            match run_phase(&inner, &config, &ctx, cmd, BuildPhase::Build, &token).await {
                Outcome::Succeeded(_) => {}
                Outcome::Failed(e) => {
                    command_failed = true;
                    fail(&inner, &mut result, e.to_string(), BuildPhase::Build);
                }
                Outcome::Interrupted => interrupted = true,
            }
        }

        result.children = if config.children.is_empty() {
            Vec::new()
        } else if interrupted || token.is_cancelled() {
            config.children.iter().map(BuildNodeResult::skipped_subtree).collect()
        } else if command_failed && policy == FailureHandling::FailFast {
            tracing::info!("build failed under fail-fast, children not started");
            config.children.iter().map(BuildNodeResult::skipped_subtree).collect()
        } else {
            run_children(&inner, &config, &ctx, &token).await
        };

        if let Some(cmd) = config.test_command.as_deref() {
            if !command_failed && !interrupted {
                match run_phase(&inner, &config, &ctx, cmd, BuildPhase::Test, &token).await {
                    Outcome::Succeeded(out) => {
                        let tests = inner.parsers.parse(&combined(&out.stdout, &out.stderr));
                        emit_test_complete(&inner, &config, cmd, &tests);
                        result.test_results = Some(tests);
                        result.coverage =
                            read_coverage(&ctx.cwd, &inner.config.coverage_summary_path).await;
                    }
                    Outcome::Failed(e) => {
                        // A failing test runner still usually prints its summary.
                        if let CommandError::Failed { stdout, stderr, .. } = &e {
                            let tests = inner.parsers.parse(&combined(stdout, stderr));
                            if tests.total > 0 {
                                result.test_results = Some(tests);
                            }
                        }
                        command_failed = true;
                        fail(&inner, &mut result, e.to_string(), BuildPhase::Test);
                    }
                    Outcome::Interrupted => interrupted = true,
                }
            }
        }

        if let Some(settings) = config.artifacts.as_ref().filter(|_| !interrupted) {
            let (artifacts, problems) = collect_artifacts(&ctx.cwd, settings);
            for message in problems {
                inner.bus.emit(BuildEvent::BuildLog {
                    build_id: config.id.clone(),
                    level: LogLevel::Warn,
                    message,
                    source: BuildPhase::Build,
                    timestamp: Utc::now(),
                });
            }
            inner.bus.emit(BuildEvent::ArtifactsCollected {
                build_id: config.id.clone(),
                artifacts: artifacts.clone(),
                timestamp: Utc::now(),
            });
            result.artifacts = Some(artifacts);
        }

        result.status = if interrupted {
            interrupted_status(&result.children, policy)
        } else {
            determine_status(
                result.test_results.as_ref(),
                command_failed,
                &result.children,
                policy,
            )
        };
        finalize(&inner, result, started)
    }
    .instrument(span)
    .boxed()
}

async fn run_children(
    inner: &Arc<Inner>,
    config: &BuildNodeConfig,
    ctx: &ExecContext,
    token: &CancellationToken,
) -> Vec<BuildNodeResult> {
    let order = config
        .execution_order
        .unwrap_or_else(|| inner.config.parallelism.for_kind(config.kind));
    let pool = BoundedPool::new(order.width());
    let fail_fast = config.failure_handling() == FailureHandling::FailFast;
    tracing::debug!(children = config.children.len(), width = pool.width(), fail_fast, "running children");

    let slots = pool
        .run(
            config.children.clone(),
            token,
            move |child: &BuildNodeResult| fail_fast && child.status == BuildStatus::Failed,
            |child| execute_node(inner.clone(), child, ctx.clone(), token.clone()),
        )
        .await;

    slots
        .into_iter()
        .zip(&config.children)
        .map(|(slot, child_cfg)| match slot {
            Slot::Completed(result) => result,
            Slot::NotStarted => BuildNodeResult::skipped_subtree(child_cfg),
            Slot::Panicked(msg) => {
                tracing::error!(build_id = %child_cfg.id, panic = %msg, "build task panicked");
                let mut result = BuildNodeResult::skipped_subtree(child_cfg);
                result.status = BuildStatus::Failed;
                fail(inner, &mut result, format!("build task panicked: {msg}"), BuildPhase::Build);
                inner.record(&result);
                result
            }
        })
        .collect()
}

async fn run_phase(
    inner: &Inner,
    config: &BuildNodeConfig,
    ctx: &ExecContext,
    command: &str,
    phase: BuildPhase,
    token: &CancellationToken,
) -> Outcome {
    if token.is_cancelled() {
        return Outcome::Interrupted;
    }
    inner.bus.emit(BuildEvent::CommandStart {
        build_id: config.id.clone(),
        command: command.to_string(),
        phase,
        timestamp: Utc::now(),
    });

    let spec = CommandSpec {
        build_id: config.id.clone(),
        command: command.to_string(),
        phase,
        cwd: ctx.cwd.clone(),
        env: ctx.env.clone(),
    };
    match inner.runner.run(&spec, &inner.bus, token).await {
        Ok(out) => {
            tracing::debug!(%phase, duration_ms = out.duration_ms, "command succeeded");
            if phase == BuildPhase::Build {
                inner.bus.emit(BuildEvent::CommandComplete {
                    build_id: config.id.clone(),
                    command: command.to_string(),
                    phase,
                    results: None,
                    timestamp: Utc::now(),
                });
            }
            Outcome::Succeeded(out)
        }
        Err(e) if e.is_cancelled() => {
            tracing::info!(%phase, "command interrupted by cancellation");
            Outcome::Interrupted
        }
        Err(e) => {
            tracing::warn!(%phase, error = %e, "command failed");
            Outcome::Failed(e)
        }
    }
}

fn emit_test_complete(inner: &Inner, config: &BuildNodeConfig, command: &str, tests: &TestResults) {
    inner.bus.emit(BuildEvent::CommandComplete {
        build_id: config.id.clone(),
        command: command.to_string(),
        phase: BuildPhase::Test,
        results: Some(tests.clone()),
        timestamp: Utc::now(),
    });
}

fn fail(inner: &Inner, result: &mut BuildNodeResult, message: String, phase: BuildPhase) {
    let error = BuildFailure { message, phase };
    inner.bus.emit(BuildEvent::BuildError {
        build_id: result.build_id.clone(),
        error: error.clone(),
        timestamp: Utc::now(),
    });
    result.error = Some(error);
}

fn combined(stdout: &str, stderr: &str) -> String {
    if stderr.is_empty() {
        stdout.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    }
}

fn finalize(inner: &Inner, mut result: BuildNodeResult, started: Instant) -> BuildNodeResult {
    let duration_ms = started.elapsed().as_millis() as u64;
    result.end_time = Some(Utc::now());
    result.duration_ms = Some(duration_ms);
    inner.record(&result);
    inner.bus.emit(BuildEvent::BuildComplete {
        build_id: result.build_id.clone(),
        status: result.status,
        duration_ms,
        timestamp: Utc::now(),
    });
    tracing::debug!(status = %result.status, duration_ms, "node finished");
    result
}
