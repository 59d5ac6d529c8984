//! Structural checks run before a build tree is executed.

use std::collections::HashSet;

use crate::error::ConfigurationError;
use crate::model::BuildNodeConfig;

/// Rejects trees with empty ids, repeated ids, inconsistent `parent_id`
/// back-references, or a zero `maxParallelChildren`.
pub fn validate_build_tree(root: &BuildNodeConfig) -> Result<(), ConfigurationError> {
    if let Some(parent) = root.parent_id.as_deref().filter(|p| !p.is_empty()) {
        return Err(ConfigurationError::RootHasParent {
            id: root.id.clone(),
            found: parent.to_string(),
        });
    }
    let mut seen = HashSet::new();
    validate_node(root, None, "root", &mut seen)
}

fn validate_node<'a>(
    node: &'a BuildNodeConfig,
    parent: Option<&str>,
    path: &str,
    seen: &mut HashSet<&'a str>,
) -> Result<(), ConfigurationError> {
    if node.id.trim().is_empty() {
        return Err(ConfigurationError::MissingId {
            path: path.to_string(),
        });
    }
    // A repeated id is the only way a cyclic reference can show up in an owned tree.
    if !seen.insert(node.id.as_str()) {
        return Err(ConfigurationError::DuplicateId(node.id.clone()));
    }

    if let (Some(expected), Some(found)) = (parent, node.parent_id.as_deref()) {
        if expected != found {
            return Err(ConfigurationError::ParentMismatch {
                id: node.id.clone(),
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
    }

    if let Some(order) = node.execution_order {
        if order.max_parallel_children == 0 {
            return Err(ConfigurationError::InvalidParallelism {
                id: node.id.clone(),
                value: 0,
            });
        }
    }

    for (idx, child) in node.children.iter().enumerate() {
        let child_path = format!("{path}.children[{idx}]");
        validate_node(child, Some(node.id.as_str()), &child_path, seen)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuildKind, ExecutionOrder};

    fn tree() -> BuildNodeConfig {
        BuildNodeConfig::new("epic", BuildKind::Epic).with_child(
            BuildNodeConfig::new("theme", BuildKind::Theme)
                .with_child(BuildNodeConfig::new("story", BuildKind::Story)),
        )
    }

    #[test]
    fn accepts_well_formed_tree() {
        assert_eq!(validate_build_tree(&tree()), Ok(()));
    }

    #[test]
    fn rejects_empty_id_with_path() {
        let cfg = BuildNodeConfig::new("epic", BuildKind::Epic)
            .with_child(BuildNodeConfig::new("", BuildKind::Theme));
        assert_eq!(
            validate_build_tree(&cfg),
            Err(ConfigurationError::MissingId {
                path: "root.children[0]".into()
            })
        );
    }

    #[test]
    fn rejects_duplicate_ids_across_levels() {
        let cfg = BuildNodeConfig::new("epic", BuildKind::Epic).with_child(
            BuildNodeConfig::new("theme", BuildKind::Theme)
                .with_child(BuildNodeConfig::new("epic", BuildKind::Story)),
        );
        assert_eq!(
            validate_build_tree(&cfg),
            Err(ConfigurationError::DuplicateId("epic".into()))
        );
    }

    #[test]
    fn rejects_mismatched_parent_reference() {
        let mut child = BuildNodeConfig::new("story", BuildKind::Story);
        child.parent_id = Some("elsewhere".into());
        let cfg = BuildNodeConfig::new("theme", BuildKind::Theme).with_child(child);
        assert!(matches!(
            validate_build_tree(&cfg),
            Err(ConfigurationError::ParentMismatch { ref found, .. }) if found == "elsewhere"
        ));
    }

    #[test]
    fn rejects_root_with_parent() {
        let mut cfg = tree();
        cfg.parent_id = Some("ghost".into());
        assert!(matches!(
            validate_build_tree(&cfg),
            Err(ConfigurationError::RootHasParent { .. })
        ));
    }

    #[test]
    fn rejects_zero_parallel_width() {
        let cfg = tree().with_execution_order(ExecutionOrder::parallel(0));
        assert_eq!(
            validate_build_tree(&cfg),
            Err(ConfigurationError::InvalidParallelism {
                id: "epic".into(),
                value: 0
            })
        );
    }
}
