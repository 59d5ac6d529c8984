use crate::model::{BuildNodeResult, BuildStatus, FailureHandling, TestResults};

/// Final status of a node from its own outcome and its children's statuses.
///
/// `command_failed` is true when one of the node's own commands exited
/// non-zero or could not be spawned.
pub fn determine_status(
    own: Option<&TestResults>,
    command_failed: bool,
    children: &[BuildNodeResult],
    policy: FailureHandling,
) -> BuildStatus {
    let own_failed = own.map_or(0, |t| t.failed);
    let own_total = own.map_or(0, |t| t.total);

    if command_failed || own_failed > 0 {
        return BuildStatus::Failed;
    }
    if child_failure_propagates(children, policy) {
        return BuildStatus::Failed;
    }
    if own_total > 0 {
        return BuildStatus::Passed;
    }
    if !children.is_empty() && children.iter().all(|c| c.status == BuildStatus::Passed) {
        return BuildStatus::Passed;
    }
    BuildStatus::Skipped
}

/// Status of a node whose own command was killed by cancellation. Children
/// that already finished still decide the outcome through `policy`.
pub fn interrupted_status(children: &[BuildNodeResult], policy: FailureHandling) -> BuildStatus {
    if child_failure_propagates(children, policy) {
        BuildStatus::Failed
    } else {
        BuildStatus::Skipped
    }
}

fn child_failure_propagates(children: &[BuildNodeResult], policy: FailureHandling) -> bool {
    policy != FailureHandling::IgnoreChildren
        && children.iter().any(|c| c.status == BuildStatus::Failed)
}
