use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use tierbuild_core::config::{load_build_tree, load_default, load_from_path, ExecutorConfig};
use tierbuild_core::events::BuildObserver;
use tierbuild_core::executor::BuildExecutor;
use tierbuild_core::model::BuildNodeConfig;

use crate::observers::{JsonlEventObserver, ProgressObserver, TextEventObserver};

/// How executor events are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Jsonl,
    Progress,
    Quiet,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ObserverKinds {
    pub format: OutputFormat,
    pub verbose: bool,
    pub ascii_only: bool,
    /// Node count of the tree, used to size the progress bar.
    pub total_builds: usize,
}

pub fn parse_output_format(format: &str) -> OutputFormat {
    match format {
        "jsonl" => OutputFormat::Jsonl,
        "progress" => OutputFormat::Progress,
        "quiet" | "none" => OutputFormat::Quiet,
        // Anything unrecognised renders as text.
        _ => OutputFormat::Text,
    }
}

pub fn build_observers(kinds: &ObserverKinds) -> Vec<Arc<dyn BuildObserver>> {
    match kinds.format {
        OutputFormat::Text => vec![Arc::new(TextEventObserver::stderr(
            kinds.verbose,
            kinds.ascii_only,
        ))],
        OutputFormat::Jsonl => vec![Arc::new(JsonlEventObserver::stdout(false))],
        OutputFormat::Progress => vec![Arc::new(ProgressObserver::new(kinds.total_builds, true))],
        OutputFormat::Quiet => Vec::new(),
    }
}

pub fn build_executor(cfg: &ExecutorConfig, kinds: &ObserverKinds) -> BuildExecutor {
    build_observers(kinds)
        .into_iter()
        .fold(BuildExecutor::builder(cfg.clone()), |b, o| b.observer(o))
        .build()
}

/// Loads the executor config (explicit path, or `./tierbuild.toml` and env)
/// and the build tree, and wires an executor sized for that tree.
pub fn executor_for_tree(
    config_path: Option<&Path>,
    tree_path: &Path,
    format: OutputFormat,
    verbose: bool,
) -> Result<(BuildExecutor, BuildNodeConfig)> {
    let cfg = match config_path {
        Some(p) => load_from_path(p)?,
        None => load_default()?,
    };
    let tree = load_build_tree(tree_path)
        .with_context(|| format!("loading build tree {}", tree_path.display()))?;
    let kinds = ObserverKinds {
        format,
        verbose,
        ascii_only: false,
        total_builds: tree.node_count(),
    };
    tracing::debug!(nodes = kinds.total_builds, ?format, "executor wired");
    Ok((build_executor(&cfg, &kinds), tree))
}
