//! Operator change maintainer tests

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as TimeDelta;

use node_maintainer::clock::{Clock, ManualClock};
use node_maintainer::maintenance::application::{ApplicationMaintainer, Detector};
use node_maintainer::maintenance::job::{run_once, PassOutcome};
use node_maintainer::maintenance::job_control::JobControl;
use node_maintainer::maintenance::locks::ApplicationLocks;
use node_maintainer::maintenance::operator_change::{OperatorChangeDetector, JOB_NAME};
use node_maintainer::nodes::model::{Agent, Node};
use node_maintainer::nodes::repository::{InMemoryNodeRepository, NodeRepository};

use crate::support::{allocated, app, clock_at, context, time, FakeDeployer, FlakyRepository};

struct Fixture {
    clock: Arc<ManualClock>,
    repository: Arc<InMemoryNodeRepository>,
    deployer: Arc<FakeDeployer>,
}

impl Fixture {
    fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            repository: Arc::new(InMemoryNodeRepository::new(clock.clone())),
            clock,
            deployer: FakeDeployer::new(),
        }
    }

    fn maintainer_over(
        &self,
        nodes: Arc<dyn NodeRepository>,
    ) -> ApplicationMaintainer<OperatorChangeDetector> {
        ApplicationMaintainer::new(
            OperatorChangeDetector::new(self.clock.clone()),
            context(nodes, self.deployer.clone(), Arc::new(ApplicationLocks::new())),
            Duration::from_secs(60),
        )
    }

    fn maintainer(&self) -> ApplicationMaintainer<OperatorChangeDetector> {
        self.maintainer_over(self.repository.clone())
    }

    async fn flagged_hosts(
        &self,
        maintainer: &ApplicationMaintainer<OperatorChangeDetector>,
    ) -> Vec<String> {
        maintainer
            .detector()
            .nodes_needing_maintenance(self.repository.as_ref())
            .await
            .unwrap()
            .into_iter()
            .map(|node| node.hostname)
            .collect()
    }
}

#[tokio::test]
async fn test_operator_edit_triggers_one_redeploy() {
    let fixture = Fixture::new(clock_at(8, 0));
    allocated(&fixture.repository, "n1", &app("a")).await;

    fixture.clock.set(time(9, 0));
    let maintainer = fixture.maintainer();
    assert_eq!(maintainer.detector().previous_run(), time(9, 0));

    fixture.clock.set(time(10, 0));
    fixture
        .repository
        .record_event("n1", Agent::Operator, "parked and reactivated")
        .await
        .unwrap();

    fixture.clock.set(time(10, 5));
    let report = maintainer.run_pass().await.unwrap();
    assert_eq!(report.deployed, 1);
    assert_eq!(fixture.deployer.activated(), vec![app("a")]);
    assert_eq!(maintainer.detector().previous_run(), time(10, 5));

    fixture.clock.set(time(10, 10));
    assert!(maintainer
        .applications_needing_maintenance()
        .await
        .unwrap()
        .is_empty());
    assert_eq!(fixture.deployer.activations_of(&app("a")), 1);
}

#[tokio::test]
async fn test_operator_event_is_found_among_other_agents() {
    let fixture = Fixture::new(clock_at(9, 0));
    allocated(&fixture.repository, "n1", &app("a")).await;
    let maintainer = fixture.maintainer();

    fixture.clock.set(time(9, 10));
    fixture
        .repository
        .record_event("n1", Agent::Operator, "edited")
        .await
        .unwrap();
    fixture.clock.set(time(9, 20));
    fixture
        .repository
        .record_event("n1", Agent::Application, "restarted")
        .await
        .unwrap();

    assert_eq!(fixture.flagged_hosts(&maintainer).await, vec!["n1"]);
}

#[tokio::test]
async fn test_only_operator_changes_on_allocated_nodes_count() {
    let fixture = Fixture::new(clock_at(9, 0));
    allocated(&fixture.repository, "system-only", &app("a")).await;
    allocated(&fixture.repository, "edited", &app("b")).await;
    fixture.repository.add(Node::new("spare")).await.unwrap();
    let maintainer = fixture.maintainer();

    fixture.clock.set(time(9, 30));
    fixture
        .repository
        .record_event("system-only", Agent::System, "rebooted")
        .await
        .unwrap();
    fixture
        .repository
        .record_event("system-only", Agent::Application, "restarted")
        .await
        .unwrap();
    fixture
        .repository
        .record_event("edited", Agent::Operator, "edited")
        .await
        .unwrap();
    fixture
        .repository
        .record_event("spare", Agent::Operator, "edited")
        .await
        .unwrap();

    fixture.clock.set(time(9, 45));
    assert_eq!(fixture.flagged_hosts(&maintainer).await, vec!["edited"]);
}

#[tokio::test]
async fn test_changes_before_startup_are_left_to_the_periodic_maintainer() {
    let fixture = Fixture::new(clock_at(9, 0));
    allocated(&fixture.repository, "n1", &app("a")).await;
    fixture
        .repository
        .record_event("n1", Agent::Operator, "edited before start")
        .await
        .unwrap();

    let maintainer = fixture.maintainer();
    fixture.clock.set(time(9, 5));
    assert!(fixture.flagged_hosts(&maintainer).await.is_empty());
}

#[tokio::test]
async fn test_every_operator_event_is_detected_by_exactly_one_pass() {
    let fixture = Fixture::new(clock_at(9, 0));
    for host in ["n1", "n2", "n3", "n4"] {
        allocated(&fixture.repository, host, &app(host)).await;
    }
    let maintainer = fixture.maintainer();

    // (minute of edit, host), passes run at every multiple of 10 minutes.
    // Edits at 9:10 and 9:20 land exactly on a pass boundary.
    let edits = [(5, "n1"), (10, "n2"), (20, "n3"), (27, "n4"), (27, "n1")];
    let mut detections: HashMap<String, usize> = HashMap::new();
    let mut pending = edits.iter().peekable();

    for pass_minute in [10, 20, 30, 40] {
        while let Some((minute, host)) = pending.peek() {
            if *minute > pass_minute {
                break;
            }
            fixture.clock.set(time(9, *minute));
            fixture
                .repository
                .record_event(host, Agent::Operator, "edit")
                .await
                .unwrap();
            pending.next();
        }

        fixture.clock.set(time(9, pass_minute));
        for host in fixture.flagged_hosts(&maintainer).await {
            *detections.entry(host).or_default() += 1;
        }
    }

    // n1 was edited in two different windows
    assert_eq!(detections.get("n1"), Some(&2));
    assert_eq!(detections.get("n2"), Some(&1));
    assert_eq!(detections.get("n3"), Some(&1));
    assert_eq!(detections.get("n4"), Some(&1));
}

#[tokio::test]
async fn test_inactive_job_does_not_advance_its_window() {
    let fixture = Fixture::new(clock_at(9, 0));
    allocated(&fixture.repository, "n1", &app("a")).await;
    let maintainer = fixture.maintainer();
    let job_control = JobControl::in_memory();

    job_control.set_active(JOB_NAME, false).await.unwrap();

    fixture.clock.set(time(9, 10));
    fixture
        .repository
        .record_event("n1", Agent::Operator, "edited while disabled")
        .await
        .unwrap();

    fixture.clock.set(time(9, 15));
    assert_eq!(run_once(&maintainer, &job_control).await, PassOutcome::Skipped);
    assert_eq!(maintainer.detector().previous_run(), time(9, 0));
    assert!(fixture.deployer.activated().is_empty());

    job_control.set_active(JOB_NAME, true).await.unwrap();
    fixture.clock.set(time(9, 20));
    assert_eq!(run_once(&maintainer, &job_control).await, PassOutcome::Succeeded);
    assert_eq!(maintainer.detector().previous_run(), time(9, 20));
    assert_eq!(fixture.deployer.activated(), vec![app("a")]);
}

#[tokio::test]
async fn test_paused_job_control_skips_the_pass() {
    let fixture = Fixture::new(clock_at(9, 0));
    let maintainer = fixture.maintainer();
    let job_control = JobControl::in_memory();

    job_control.pause().await.unwrap();
    fixture.clock.set(time(9, 5));
    assert_eq!(run_once(&maintainer, &job_control).await, PassOutcome::Skipped);
    assert_eq!(maintainer.detector().previous_run(), time(9, 0));
}

#[tokio::test]
async fn test_failed_detection_keeps_the_window_for_the_next_pass() {
    let fixture = Fixture::new(clock_at(9, 0));
    allocated(&fixture.repository, "n1", &app("a")).await;
    let flaky = Arc::new(FlakyRepository::new(fixture.repository.clone()));
    let maintainer = fixture.maintainer_over(flaky.clone());
    let job_control = JobControl::in_memory();

    fixture.clock.set(time(9, 10));
    fixture
        .repository
        .record_event("n1", Agent::Operator, "edited")
        .await
        .unwrap();

    flaky.failing.store(true, Ordering::SeqCst);
    fixture.clock.set(time(9, 15));
    assert!(matches!(
        run_once(&maintainer, &job_control).await,
        PassOutcome::Failed(_)
    ));
    assert_eq!(maintainer.detector().previous_run(), time(9, 0));

    flaky.failing.store(false, Ordering::SeqCst);
    fixture.clock.set(time(9, 20));
    let report = maintainer.run_pass().await.unwrap();
    assert_eq!(report.deployed, 1);
    assert_eq!(fixture.clock.now(), maintainer.detector().previous_run());
}

#[tokio::test]
async fn test_window_end_is_inclusive_and_next_start_exclusive() {
    let fixture = Fixture::new(clock_at(9, 0));
    allocated(&fixture.repository, "n1", &app("a")).await;
    let maintainer = fixture.maintainer();

    fixture.clock.advance(TimeDelta::minutes(1));
    fixture
        .repository
        .record_event("n1", Agent::Operator, "edited at the boundary")
        .await
        .unwrap();

    // Same instant as the event
    assert_eq!(fixture.flagged_hosts(&maintainer).await, vec!["n1"]);
    fixture.clock.advance(TimeDelta::minutes(1));
    assert!(fixture.flagged_hosts(&maintainer).await.is_empty());
}
