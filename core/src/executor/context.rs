use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::model::BuildNodeConfig;

/// Working directory and environment inherited down the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecContext {
    pub cwd: PathBuf,
    /// Overrides only; the process environment is inherited by every command.
    pub env: BTreeMap<String, String>,
}

impl ExecContext {
    /// Context for the root: the current process directory and no overrides.
    pub fn process() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "current directory unavailable, using '.'");
            PathBuf::from(".")
        });
        Self {
            cwd,
            env: BTreeMap::new(),
        }
    }

    /// Resolves `node`'s overrides on top of this context. A relative
    /// directory is joined onto the parent's; the node's env entries win.
    pub fn for_node(&self, node: &BuildNodeConfig) -> Self {
        let cwd = match &node.working_directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.cwd.join(dir),
            None => self.cwd.clone(),
        };
        let mut env = self.env.clone();
        env.extend(node.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { cwd, env }
    }
}
