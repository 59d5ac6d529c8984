#![cfg(unix)]

mod common;

use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use tierbuild_core::error::{BuildError, ConfigurationError};
use tierbuild_core::events::BuildEvent;
use tierbuild_core::model::{
    BuildKind, BuildNodeConfig, BuildPhase, BuildStatus, ExecutionOrder, FailureHandling,
};

use common::{jest_summary, recording_executor, story, wait_for_active};

#[tokio::test(flavor = "multi_thread")]
async fn story_with_failing_tests_reports_counts() {
    let (executor, observer) = recording_executor();
    let tree = story("s1").with_test_command(jest_summary(8, 2));

    let result = executor.execute_build(&tree).await.unwrap();

    assert_eq!(result.status, BuildStatus::Failed);
    let tests = result.test_results.unwrap();
    assert_eq!((tests.total, tests.passed, tests.failed, tests.skipped), (10, 8, 2, 0));
    assert!(result.error.is_none());
    assert!(result.duration_ms.is_some());
    assert_eq!(
        observer.names_for("s1"),
        vec!["buildStart", "commandStart", "buildLog", "commandComplete", "buildComplete"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_build_command_records_error_on_node() {
    let (executor, observer) = recording_executor();
    let tree = story("s1")
        .with_build_command("echo broken >&2; exit 3")
        .with_test_command("echo never");

    let result = executor.execute_build(&tree).await.unwrap();

    assert_eq!(result.status, BuildStatus::Failed);
    let error = result.error.unwrap();
    assert_eq!(error.phase, BuildPhase::Build);
    assert_eq!(error.message, "Command failed with exit code 3: broken\n");
    assert!(result.test_results.is_none());
    let errors: Vec<_> = observer
        .events()
        .into_iter()
        .filter(|e| matches!(e, BuildEvent::BuildError { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn continue_runs_every_child_and_fails_parent() {
    let (executor, _) = recording_executor();
    let tree = BuildNodeConfig::new("theme", BuildKind::Theme)
        .with_failure_handling(FailureHandling::Continue)
        .with_execution_order(ExecutionOrder::sequential())
        .with_child(story("bad").with_build_command("exit 1"))
        .with_child(story("good").with_test_command(jest_summary(2, 0)));

    let result = executor.execute_build(&tree).await.unwrap();

    assert_eq!(result.status, BuildStatus::Failed);
    assert_eq!(result.children[0].status, BuildStatus::Failed);
    assert_eq!(result.children[1].status, BuildStatus::Passed);
    assert!(result.error.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn ignore_children_uses_only_own_tests() {
    let (executor, _) = recording_executor();
    let tree = BuildNodeConfig::new("theme", BuildKind::Theme)
        .with_failure_handling(FailureHandling::IgnoreChildren)
        .with_test_command(jest_summary(1, 0))
        .with_child(story("bad").with_test_command(jest_summary(0, 4)));

    let result = executor.execute_build(&tree).await.unwrap();

    assert_eq!(result.children[0].status, BuildStatus::Failed);
    assert_eq!(result.status, BuildStatus::Passed);
}

#[tokio::test(flavor = "multi_thread")]
async fn fail_fast_stops_starting_siblings() {
    let (executor, observer) = recording_executor();
    let tree = BuildNodeConfig::new("theme", BuildKind::Theme)
        .with_failure_handling(FailureHandling::FailFast)
        .with_execution_order(ExecutionOrder::sequential())
        .with_child(story("first").with_build_command("exit 1"))
        .with_child(story("second").with_test_command(jest_summary(1, 0)))
        .with_child(story("third").with_test_command(jest_summary(1, 0)));

    let result = executor.execute_build(&tree).await.unwrap();

    assert!(result.mirrors(&tree));
    assert_eq!(result.status, BuildStatus::Failed);
    let statuses: Vec<BuildStatus> = result.children.iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![BuildStatus::Failed, BuildStatus::Skipped, BuildStatus::Skipped]
    );
    assert!(!observer.started("second"));
    assert!(!observer.started("third"));
}

#[tokio::test(flavor = "multi_thread")]
async fn fail_fast_build_failure_skips_own_children() {
    let (executor, observer) = recording_executor();
    let tree = BuildNodeConfig::new("theme", BuildKind::Theme)
        .with_failure_handling(FailureHandling::FailFast)
        .with_build_command("exit 2")
        .with_child(story("s1").with_build_command("echo hi"));

    let result = executor.execute_build(&tree).await.unwrap();

    assert_eq!(result.status, BuildStatus::Failed);
    assert_eq!(result.children[0].status, BuildStatus::Skipped);
    assert!(!observer.started("s1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn parallel_children_respect_the_bound() {
    let (executor, observer) = recording_executor();
    let mut tree = BuildNodeConfig::new("theme", BuildKind::Theme)
        .with_execution_order(ExecutionOrder::parallel(2));
    for i in 0..5 {
        tree = tree.with_child(story(&format!("s{i}")).with_build_command("sleep 0.2"));
    }

    let started = Instant::now();
    let result = executor.execute_build(&tree).await.unwrap();

    assert_eq!(result.status, BuildStatus::Skipped);
    assert!(result.children.iter().all(|c| c.error.is_none()));
    assert_eq!(observer.peak_concurrency(BuildKind::Story), 2);
    // Three waves of two-at-a-time.
    assert!(started.elapsed() >= Duration::from_millis(550));
}

#[tokio::test(flavor = "multi_thread")]
async fn sequential_children_run_in_order() {
    let (executor, observer) = recording_executor();
    let tree = BuildNodeConfig::new("theme", BuildKind::Theme)
        .with_execution_order(ExecutionOrder::sequential())
        .with_child(story("a").with_build_command("sleep 0.05"))
        .with_child(story("b").with_build_command("true"))
        .with_child(story("c").with_build_command("true"));

    executor.execute_build(&tree).await.unwrap();

    let starts: Vec<String> = observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            BuildEvent::BuildStart {
                build_id,
                kind: BuildKind::Story,
                ..
            } => Some(build_id),
            _ => None,
        })
        .collect();
    assert_eq!(starts, vec!["a", "b", "c"]);
    assert_eq!(observer.peak_concurrency(BuildKind::Story), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_kills_running_command_and_skips_the_rest() {
    let (executor, observer) = recording_executor();
    let tree = BuildNodeConfig::new("theme", BuildKind::Theme)
        .with_execution_order(ExecutionOrder::sequential())
        .with_child(story("slow").with_test_command("sleep 30"))
        .with_child(story("next").with_test_command(jest_summary(1, 0)))
        .with_child(story("last").with_test_command(jest_summary(1, 0)));

    let runner = executor.clone();
    let run_tree = tree.clone();
    let handle = tokio::spawn(async move { runner.execute_build(&run_tree).await });

    let deadline = Instant::now() + Duration::from_secs(5);
    while executor.active_builds().is_empty() {
        assert!(Instant::now() < deadline, "command never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(executor.active_builds(), vec!["slow".to_string()]);

    let cancelled_at = Instant::now();
    executor.cancel();
    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("build did not stop after cancel")
        .unwrap()
        .unwrap();

    assert!(cancelled_at.elapsed() < Duration::from_secs(5));
    assert!(executor.is_cancelled());
    assert!(result.mirrors(&tree));
    assert!(result.children.iter().all(|c| c.status == BuildStatus::Skipped));
    assert!(result.children.iter().all(|c| c.error.is_none()));
    assert!(observer.names_for("slow").contains(&"buildCancelled"));
    assert!(!observer.started("next"));
    assert!(executor.active_builds().is_empty());

    // Cancelling again with nothing running is harmless.
    executor.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_stops_every_running_child_of_a_parallel_group() {
    let (executor, observer) = recording_executor();
    let mut tree = BuildNodeConfig::new("theme", BuildKind::Theme)
        .with_execution_order(ExecutionOrder::parallel(2));
    for i in 0..5 {
        tree = tree.with_child(story(&format!("s{i}")).with_test_command("sleep 30"));
    }

    let runner = executor.clone();
    let run_tree = tree.clone();
    let handle = tokio::spawn(async move { runner.execute_build(&run_tree).await });

    wait_for_active(&executor, &["s0", "s1"]).await;
    executor.cancel();
    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("build did not stop after cancel")
        .unwrap()
        .unwrap();

    assert!(result.mirrors(&tree));
    assert_eq!(result.status, BuildStatus::Skipped);
    assert!(result.children.iter().all(|c| c.status == BuildStatus::Skipped));
    let cancelled: Vec<String> = observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            BuildEvent::BuildCancelled { build_id, .. } => Some(build_id),
            _ => None,
        })
        .collect();
    assert_eq!(cancelled.len(), 2);
    assert!(cancelled.contains(&"s0".to_string()));
    assert!(cancelled.contains(&"s1".to_string()));
    for id in ["s2", "s3", "s4"] {
        assert!(!observer.started(id), "{id} should never start");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelling_own_tests_keeps_a_failed_child_visible() {
    let (executor, observer) = recording_executor();
    let tree = BuildNodeConfig::new("theme", BuildKind::Theme)
        .with_failure_handling(FailureHandling::Continue)
        .with_test_command("sleep 30")
        .with_child(story("bad").with_build_command("exit 1"));

    let runner = executor.clone();
    let run_tree = tree.clone();
    let handle = tokio::spawn(async move { runner.execute_build(&run_tree).await });

    wait_for_active(&executor, &["theme"]).await;
    executor.cancel();
    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("build did not stop after cancel")
        .unwrap()
        .unwrap();

    assert_eq!(result.children[0].status, BuildStatus::Failed);
    assert_eq!(result.status, BuildStatus::Failed);
    assert!(result.error.is_none());
    assert!(observer.names_for("theme").contains(&"buildCancelled"));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelling_own_tests_under_ignore_children_skips_the_node() {
    let (executor, _) = recording_executor();
    let tree = BuildNodeConfig::new("theme", BuildKind::Theme)
        .with_failure_handling(FailureHandling::IgnoreChildren)
        .with_test_command("sleep 30")
        .with_child(story("bad").with_build_command("exit 1"));

    let runner = executor.clone();
    let run_tree = tree.clone();
    let handle = tokio::spawn(async move { runner.execute_build(&run_tree).await });

    wait_for_active(&executor, &["theme"]).await;
    executor.cancel();
    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("build did not stop after cancel")
        .unwrap()
        .unwrap();

    assert_eq!(result.children[0].status, BuildStatus::Failed);
    assert_eq!(result.status, BuildStatus::Skipped);
}

#[tokio::test(flavor = "multi_thread")]
async fn environment_and_working_directory_are_inherited() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("pkg")).unwrap();

    let (executor, _) = recording_executor();
    let tree = BuildNodeConfig::new("epic", BuildKind::Epic)
        .with_working_directory(dir.path())
        .with_env("SHARED", "epic")
        .with_env("KEPT", "keep")
        .with_child(
            story("s1")
                .with_working_directory("pkg")
                .with_env("SHARED", "story")
                .with_build_command(r#"printf '%s:%s' "$SHARED" "$KEPT" > marker.txt"#),
        );

    let result = executor.execute_build(&tree).await.unwrap();

    assert!(result.children[0].error.is_none(), "{:?}", result.children[0].error);
    let marker = std::fs::read_to_string(dir.path().join("pkg/marker.txt")).unwrap();
    assert_eq!(marker, "story:keep");
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_tree_is_rejected_before_anything_runs() {
    let dir = tempfile::tempdir().unwrap();
    let touched = dir.path().join("spawned");
    let (executor, observer) = recording_executor();
    let tree = BuildNodeConfig::new("epic", BuildKind::Epic)
        .with_build_command(format!("touch {}", touched.display()))
        .with_child(story("dup"))
        .with_child(story("dup"));

    let err = executor.execute_build(&tree).await.unwrap_err();

    assert!(matches!(
        err,
        BuildError::Configuration(ConfigurationError::DuplicateId(ref id)) if id == "dup"
    ));
    assert!(!touched.exists());
    assert!(observer.events().is_empty());
    assert!(executor.get_build_result("epic").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn results_are_cached_until_cleared() {
    let (executor, _) = recording_executor();
    let tree = BuildNodeConfig::new("theme", BuildKind::Theme)
        .with_child(story("s1").with_test_command(jest_summary(3, 0)));

    executor.execute_build(&tree).await.unwrap();

    let cached = executor.get_build_result("s1").unwrap();
    assert_eq!(cached.status, BuildStatus::Passed);
    assert_eq!(executor.get_build_result("theme").unwrap().status, BuildStatus::Passed);

    executor.clear_results();
    assert!(executor.get_build_result("s1").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn artifacts_are_collected_from_the_node_directory() {
    let dir = tempfile::tempdir().unwrap();
    let (executor, observer) = recording_executor();
    let tree = story("s1")
        .with_working_directory(dir.path())
        .with_build_command("mkdir -p reports && echo '<xml/>' > reports/junit-report.xml && echo log > build.log")
        .with_artifacts(tierbuild_core::model::ArtifactSettings {
            paths: vec!["reports/*.xml".into(), "*.log".into()],
            include_reports: true,
            include_coverage: false,
            include_logs: true,
        });

    let result = executor.execute_build(&tree).await.unwrap();

    let artifacts = result.artifacts.unwrap();
    assert_eq!(artifacts.reports, vec![dir.path().join("reports/junit-report.xml")]);
    assert_eq!(artifacts.logs, vec![dir.path().join("build.log")]);
    assert!(observer.names_for("s1").contains(&"artifactsCollected"));
}
