use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::error::BuildError;
use crate::events::{BuildObserver, EventBus};
use crate::model::{BuildNodeConfig, BuildNodeResult};
use crate::runner::CommandRunner;
use crate::validate::validate_build_tree;

use super::context::ExecContext;
use super::node::execute_node;
use super::parse::{ParserRegistry, TestOutputParser};

pub(crate) struct Inner {
    pub(crate) config: ExecutorConfig,
    pub(crate) runner: CommandRunner,
    pub(crate) parsers: ParserRegistry,
    pub(crate) bus: EventBus,
    token: Mutex<CancellationToken>,
    results: Mutex<HashMap<String, BuildNodeResult>>,
}

impl Inner {
    fn results(&self) -> MutexGuard<'_, HashMap<String, BuildNodeResult>> {
        self.results.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores the latest snapshot of a node, keyed by its id.
    pub(crate) fn record(&self, result: &BuildNodeResult) {
        self.results().insert(result.build_id.clone(), result.clone());
    }
}

/// Executes epic -> theme -> story build trees.
///
/// Cloning is cheap and clones share cancellation state and the result cache,
/// so one clone can `cancel()` a run driven by another.
#[derive(Clone)]
pub struct BuildExecutor {
    inner: Arc<Inner>,
}

impl fmt::Debug for BuildExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildExecutor")
            .field("config", &self.inner.config)
            .field("observers", &self.inner.bus.len())
            .field("active_builds", &self.active_builds())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub struct BuildExecutorBuilder {
    config: ExecutorConfig,
    parsers: ParserRegistry,
    bus: EventBus,
}

impl BuildExecutorBuilder {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            parsers: ParserRegistry::default(),
            bus: EventBus::default(),
        }
    }

    pub fn observer(mut self, observer: Arc<dyn BuildObserver>) -> Self {
        self.bus.push(observer);
        self
    }

    /// Tried before the built-in jest/mocha parsers.
    pub fn parser(mut self, parser: Arc<dyn TestOutputParser>) -> Self {
        self.parsers.prepend(parser);
        self
    }

    pub fn parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn build(self) -> BuildExecutor {
        BuildExecutor {
            inner: Arc::new(Inner {
                runner: CommandRunner::new(&self.config),
                config: self.config,
                parsers: self.parsers,
                bus: self.bus,
                token: Mutex::new(CancellationToken::new()),
                results: Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl BuildExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: ExecutorConfig) -> BuildExecutorBuilder {
        BuildExecutorBuilder::new(config)
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.config
    }

    /// Validates `root`, then runs the whole tree.
    ///
    /// Command failures never surface here; they are recorded on the result
    /// nodes. Only a malformed tree is an error, and then nothing is spawned.
    pub async fn execute_build(&self, root: &BuildNodeConfig) -> Result<BuildNodeResult, BuildError> {
        validate_build_tree(root)?;

        let token = {
            let mut guard = self.inner.token.lock().unwrap_or_else(|e| e.into_inner());
            *guard = CancellationToken::new();
            guard.clone()
        };

        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("build_run", run_id = %run_id, root = %root.id);
        let started = Instant::now();

        let result = async {
            tracing::info!(nodes = root.node_count(), "build run started");
            let result =
                execute_node(self.inner.clone(), root.clone(), ExecContext::process(), token).await;
            tracing::info!(
                status = %result.status,
                duration_ms = started.elapsed().as_millis() as u64,
                "build run finished"
            );
            result
        }
        .instrument(span)
        .await;

        Ok(result)
    }

    /// Stops starting new nodes and terminates every running command of the
    /// current run. Calling it again, or with nothing running, is harmless.
    pub fn cancel(&self) {
        let token = self
            .inner
            .token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if !token.is_cancelled() {
            tracing::warn!(active = self.inner.runner.active().len(), "cancelling build run");
        }
        token.cancel();
        self.inner.runner.active().abort_all("build cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner
            .token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_cancelled()
    }

    /// Latest snapshot for `build_id`: `running` while in progress, final once done.
    pub fn get_build_result(&self, build_id: &str) -> Option<BuildNodeResult> {
        self.inner.results().get(build_id).cloned()
    }

    pub fn clear_results(&self) {
        self.inner.results().clear();
    }

    /// Ids of nodes whose command process is currently alive.
    pub fn active_builds(&self) -> Vec<String> {
        self.inner.runner.active().ids()
    }
}
