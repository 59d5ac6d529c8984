use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Nesting level of a build node. Only default parallelism depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BuildKind {
    Epic,
    Theme,
    Story,
}

impl BuildKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildKind::Epic => "epic",
            BuildKind::Theme => "theme",
            BuildKind::Story => "story",
        }
    }
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epic" => Ok(BuildKind::Epic),
            "theme" => Ok(BuildKind::Theme),
            "story" => Ok(BuildKind::Story),
            _ => Err(ConfigurationError::UnknownKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for BuildKind {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BuildKind> for String {
    fn from(kind: BuildKind) -> Self {
        kind.as_str().to_string()
    }
}

/// How a failed child affects its parent's status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FailureHandling {
    /// Like `Continue`, but stop starting further children after the first failure.
    FailFast,
    #[default]
    Continue,
    IgnoreChildren,
}

impl FailureHandling {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureHandling::FailFast => "fail-fast",
            FailureHandling::Continue => "continue",
            FailureHandling::IgnoreChildren => "ignore-children",
        }
    }
}

impl FromStr for FailureHandling {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fail-fast" => Ok(FailureHandling::FailFast),
            "continue" => Ok(FailureHandling::Continue),
            "ignore-children" => Ok(FailureHandling::IgnoreChildren),
            _ => Err(ConfigurationError::UnknownPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for FailureHandling {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FailureHandling> for String {
    fn from(policy: FailureHandling) -> Self {
        policy.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationSettings {
    #[serde(default)]
    pub failure_handling: FailureHandling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOrder {
    #[serde(default = "default_parallelizable")]
    pub parallelizable: bool,

    /// Upper bound on concurrently running children of this node only.
    #[serde(default = "default_max_parallel_children")]
    pub max_parallel_children: usize,
}

fn default_parallelizable() -> bool {
    true
}

fn default_max_parallel_children() -> usize {
    4
}

impl ExecutionOrder {
    pub fn parallel(max_parallel_children: usize) -> Self {
        Self {
            parallelizable: true,
            max_parallel_children,
        }
    }

    pub fn sequential() -> Self {
        Self {
            parallelizable: false,
            max_parallel_children: 1,
        }
    }

    /// Effective number of children allowed to run at once.
    pub fn width(&self) -> usize {
        if self.parallelizable {
            self.max_parallel_children.max(1)
        } else {
            1
        }
    }
}

impl Default for ExecutionOrder {
    fn default() -> Self {
        Self {
            parallelizable: default_parallelizable(),
            max_parallel_children: default_max_parallel_children(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSettings {
    /// Glob patterns relative to the node's working directory.
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub include_reports: bool,
    #[serde(default)]
    pub include_coverage: bool,
    #[serde(default)]
    pub include_logs: bool,
}

/// One node of the epic -> theme -> story configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildNodeConfig {
    #[serde(alias = "testSuiteId")]
    pub id: String,

    #[serde(alias = "buildType")]
    pub kind: BuildKind,

    /// Back-reference to the parent's id; `None` for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub children: Vec<BuildNodeConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub aggregation: AggregationSettings,

    /// Falls back to the per-kind default from `ExecutorConfig::parallelism`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_order: Option<ExecutionOrder>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactSettings>,
}

impl BuildNodeConfig {
    pub fn new(id: impl Into<String>, kind: BuildKind) -> Self {
        Self {
            id: id.into(),
            kind,
            parent_id: None,
            children: Vec::new(),
            build_command: None,
            test_command: None,
            working_directory: None,
            env: BTreeMap::new(),
            aggregation: AggregationSettings::default(),
            execution_order: None,
            artifacts: None,
        }
    }

    pub fn with_build_command(mut self, cmd: impl Into<String>) -> Self {
        self.build_command = Some(cmd.into());
        self
    }

    pub fn with_test_command(mut self, cmd: impl Into<String>) -> Self {
        self.test_command = Some(cmd.into());
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_failure_handling(mut self, policy: FailureHandling) -> Self {
        self.aggregation.failure_handling = policy;
        self
    }

    pub fn with_execution_order(mut self, order: ExecutionOrder) -> Self {
        self.execution_order = Some(order);
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactSettings) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Appends a child, filling in its `parent_id` back-reference when unset.
    pub fn with_child(mut self, mut child: BuildNodeConfig) -> Self {
        if child.parent_id.is_none() {
            child.parent_id = Some(self.id.clone());
        }
        self.children.push(child);
        self
    }

    pub fn failure_handling(&self) -> FailureHandling {
        self.aggregation.failure_handling
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }
}
