use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ExecutorConfig;
use crate::error::CommandError;
use crate::events::{BuildEvent, EventBus, LogLevel};
use crate::util::RingBytes;

use super::io_pump::{self, LineStream, LineTap};
use super::registry::ActiveProcesses;
use super::types::{CommandOutput, CommandSpec};

enum Exit {
    Exited(std::io::Result<ExitStatus>),
    Aborted(String),
}

/// Spawns shell commands, streams their output as `buildLog` events and
/// tracks each live process so it can be aborted.
#[derive(Clone)]
pub struct CommandRunner {
    shell: Vec<String>,
    capture_bytes: usize,
    line_channel_capacity: usize,
    io_drain_timeout: Duration,
    active: ActiveProcesses,
}

impl CommandRunner {
    pub fn new(cfg: &ExecutorConfig) -> Self {
        Self {
            shell: cfg.shell.clone(),
            capture_bytes: cfg.capture_bytes.max(1),
            line_channel_capacity: cfg.line_channel_capacity.max(1),
            io_drain_timeout: Duration::from_millis(cfg.io_drain_timeout_ms),
            active: ActiveProcesses::default(),
        }
    }

    pub fn active(&self) -> &ActiveProcesses {
        &self.active
    }

    /// Runs `spec.command` to completion. Exit code 0 resolves with the
    /// captured output; anything else, including cancellation, is an error.
    #[tracing::instrument(
        level = "debug",
        skip(self, bus, token),
        fields(build_id = %spec.build_id, phase = %spec.phase)
    )]
    pub async fn run(
        &self,
        spec: &CommandSpec,
        bus: &EventBus,
        token: &CancellationToken,
    ) -> Result<CommandOutput, CommandError> {
        if token.is_cancelled() {
            return Err(CommandError::Cancelled);
        }

        let (program, shell_args) = self
            .shell
            .split_first()
            .ok_or_else(|| CommandError::Spawn("no shell configured".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(shell_args)
            .arg(&spec.command)
            .current_dir(&spec.cwd)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| CommandError::Spawn(format!("{}: {e}", spec.command)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CommandError::Spawn("no stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CommandError::Spawn("no stderr".into()))?;

        let started_at = Instant::now();
        tracing::debug!(pid = child.id(), command = %spec.command, "process spawned");

        let (abort_tx, mut abort_rx) = mpsc::channel::<String>(1);
        let _registration = self.active.register(&spec.build_id, abort_tx);

        let ring_out = RingBytes::new(self.capture_bytes);
        let ring_err = RingBytes::new(self.capture_bytes);
        let (line_tx, mut line_rx) = mpsc::channel::<LineTap>(self.line_channel_capacity);
        let out_task = io_pump::pump_stdout(stdout, ring_out.clone(), line_tx.clone());
        let err_task = io_pump::pump_stderr(stderr, ring_err.clone(), line_tx);

        let exit = loop {
            tokio::select! {
                // An exit that raced a cancel still counts as an exit.
                biased;

                res = child.wait() => break Exit::Exited(res),

                Some(reason) = abort_rx.recv() => break Exit::Aborted(reason),

                _ = token.cancelled() => break Exit::Aborted("build cancelled".to_string()),

                Some(tap) = line_rx.recv() => emit_line(bus, spec, tap),
            }
        };

        if let Exit::Aborted(reason) = &exit {
            tracing::warn!(reason = %reason, "terminating process");
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "kill after abort failed");
            }
        }

        // Pumps end on EOF; a grandchild holding the pipe open is cut off by the timeout.
        let drain = async {
            while let Some(tap) = line_rx.recv().await {
                emit_line(bus, spec, tap);
            }
        };
        if tokio::time::timeout(self.io_drain_timeout, drain).await.is_err() {
            tracing::debug!("output drain timed out");
        }
        for task in [out_task, err_task] {
            if task.is_finished() {
                if let Ok(Err(e)) = task.await {
                    tracing::warn!(error = %e, "output pump failed");
                }
            } else {
                task.abort();
            }
        }

        let duration_ms = started_at.elapsed().as_millis() as u64;
        let status = match exit {
            Exit::Exited(res) => res.map_err(|e| CommandError::Spawn(e.to_string()))?,
            Exit::Aborted(_) => {
                bus.emit(BuildEvent::BuildCancelled {
                    build_id: spec.build_id.clone(),
                    timestamp: Utc::now(),
                });
                return Err(CommandError::Cancelled);
            }
        };

        // Terminated by a signal: no exit code.
        let exit_code = status.code().unwrap_or(-1);
        tracing::debug!(exit_code, duration_ms, "process exited");

        if status.success() {
            Ok(CommandOutput {
                stdout: ring_out.to_string_lossy(),
                stderr: ring_err.to_string_lossy(),
                exit_code,
                duration_ms,
            })
        } else {
            Err(CommandError::Failed {
                code: exit_code,
                stdout: ring_out.to_string_lossy(),
                stderr: ring_err.to_string_lossy(),
            })
        }
    }
}

fn emit_line(bus: &EventBus, spec: &CommandSpec, tap: LineTap) {
    let level = match tap.stream {
        LineStream::Stdout => LogLevel::Info,
        LineStream::Stderr => LogLevel::Error,
    };
    bus.emit(BuildEvent::BuildLog {
        build_id: spec.build_id.clone(),
        level,
        message: tap.line,
        source: spec.phase,
        timestamp: Utc::now(),
    });
}
