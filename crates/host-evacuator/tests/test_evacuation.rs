use std::rc::Rc;

use host_evacuator::clock::{Clock, ManualClock};
use host_evacuator::config::EvacuationConfig;
use host_evacuator::error::SnapshotError;
use host_evacuator::extensions::in_memory_cluster::{EvacuationBehavior, InMemoryCluster};
use host_evacuator::host::HostState;
use host_evacuator::server_group::GroupPolicy;
use host_evacuator::vm::VmStatus;
use host_evacuator::{Evacuator, EvacuationReport, OutcomeStatus};

fn cluster() -> InMemoryCluster {
    let mut cluster = InMemoryCluster::new();
    cluster
        .add_host_with_state("compute5", HostState::Down, 16, 32768)
        .add_flavor("m1.medium", 2, 4096);
    cluster
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn run(cluster: &InMemoryCluster, clock: Rc<ManualClock>) -> Result<EvacuationReport, SnapshotError> {
    init_logger();
    let evacuator = Evacuator::new(cluster, cluster, &EvacuationConfig::default(), clock).unwrap();
    evacuator.evacuate("compute5")
}

fn target_of(report: &EvacuationReport, vm_name: &str) -> Option<String> {
    report.outcome(vm_name).and_then(|o| o.target.clone())
}

#[test]
fn test_single_vm() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 4, 8192)
        .add_host("compute2", 1, 2048)
        .add_vm("vmA", "compute5", "m1.medium");

    let report = run(&cluster, Rc::new(ManualClock::new())).unwrap();

    assert!(report.is_success());
    assert_eq!(report.success_count(), 1);
    assert_eq!(target_of(&report, "vmA"), Some("compute1".to_string()));
    assert_eq!(cluster.vm("vmA").unwrap().host, "compute1");
    let calls = cluster.evacuate_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target_host, "compute1");
    assert!(calls[0].on_shared_storage);
}

#[test]
fn test_only_vms_of_failed_host() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 8, 16384)
        .add_vm("vmA", "compute5", "m1.medium")
        .add_vm("vmB", "compute1", "m1.medium")
        .add_vm("vmC", "compute5", "m1.medium");

    let report = run(&cluster, Rc::new(ManualClock::new())).unwrap();

    let names: Vec<&str> = report.outcomes().iter().map(|o| o.vm_name.as_str()).collect();
    assert_eq!(names, vec!["vmA", "vmC"]);
    assert!(report.is_success());
}

#[test]
fn test_affinity_group_moves_together() {
    let mut cluster = cluster();
    cluster
        .add_host("compute0", 2, 4096)
        .add_host("compute1", 4, 8192)
        .add_vm("vmA", "compute5", "m1.medium")
        .add_vm("vmB", "compute5", "m1.medium")
        .add_server_group("g", GroupPolicy::Affinity, &["vmA", "vmB"]);

    let report = run(&cluster, Rc::new(ManualClock::new())).unwrap();

    assert!(report.is_success());
    assert_eq!(target_of(&report, "vmA"), Some("compute1".to_string()));
    assert_eq!(target_of(&report, "vmB"), Some("compute1".to_string()));
}

#[test]
fn test_anti_affinity_group_spreads() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 4, 8192)
        .add_host("compute2", 4, 8192)
        .add_vm("vmA", "compute5", "m1.medium")
        .add_vm("vmB", "compute5", "m1.medium")
        .add_server_group("g", GroupPolicy::AntiAffinity, &["vmA", "vmB"]);

    let report = run(&cluster, Rc::new(ManualClock::new())).unwrap();

    assert!(report.is_success());
    assert_eq!(target_of(&report, "vmA"), Some("compute1".to_string()));
    assert_eq!(target_of(&report, "vmB"), Some("compute2".to_string()));
}

#[test]
// VM stays in ERROR during the whole wait timeout (10 seconds, polled every 3 seconds).
fn test_timeout() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 4, 8192)
        .add_vm("vmA", "compute5", "m1.medium")
        .set_behavior(EvacuationBehavior {
            stuck_vms: vec!["vmA".to_string()],
            ..Default::default()
        });
    let clock = Rc::new(ManualClock::new());

    let report = run(&cluster, clock.clone()).unwrap();

    let outcome = report.outcome("vmA").unwrap();
    assert_eq!(
        outcome.status,
        OutcomeStatus::Timeout {
            last_status: Some("ERROR".to_string())
        }
    );
    assert_eq!(outcome.target, Some("compute1".to_string()));
    assert_eq!(outcome.duration, 10.);
    assert_eq!(clock.now(), 10.);
    assert_eq!(cluster.evacuate_calls().len(), 1);
    assert_eq!(report.failure_count(), 1);
}

#[test]
// The first member never becomes active, but the host it was sent to stays taken for the second one.
fn test_anti_affinity_stuck_member_keeps_target() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 4, 8192)
        .add_host("compute2", 4, 8192)
        .add_vm("vmA", "compute5", "m1.medium")
        .add_vm("vmB", "compute5", "m1.medium")
        .add_server_group("g", GroupPolicy::AntiAffinity, &["vmA", "vmB"])
        .set_behavior(EvacuationBehavior {
            stuck_vms: vec!["vmA".to_string()],
            ..Default::default()
        });

    let report = run(&cluster, Rc::new(ManualClock::new())).unwrap();

    assert!(matches!(
        report.outcome("vmA").unwrap().status,
        OutcomeStatus::Timeout { .. }
    ));
    assert!(report.outcome("vmB").unwrap().is_success());
    let targets: Vec<String> = cluster.evacuate_calls().into_iter().map(|c| c.target_host).collect();
    assert_eq!(targets, vec!["compute1", "compute2"]);
}

#[test]
// The second member follows the first one to its target even though the first one is still in ERROR.
fn test_affinity_stuck_member_is_followed() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 4, 8192)
        .add_host("compute2", 4, 8192)
        .add_vm("vmA", "compute5", "m1.medium")
        .add_vm("vmB", "compute5", "m1.medium")
        .add_server_group("g", GroupPolicy::Affinity, &["vmA", "vmB"])
        .set_behavior(EvacuationBehavior {
            stuck_vms: vec!["vmA".to_string()],
            ..Default::default()
        });

    let report = run(&cluster, Rc::new(ManualClock::new())).unwrap();

    assert_eq!(target_of(&report, "vmA"), Some("compute1".to_string()));
    assert_eq!(target_of(&report, "vmB"), Some("compute1".to_string()));
    assert!(report.outcome("vmB").unwrap().is_success());
}

#[test]
// Status can't be read at all, polling goes on until the deadline.
fn test_status_queries_fail() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 4, 8192)
        .add_vm("vmA", "compute5", "m1.medium");
    cluster.fail_status_queries("gateway timeout");
    let clock = Rc::new(ManualClock::new());

    let report = run(&cluster, clock.clone()).unwrap();

    let outcome = report.outcome("vmA").unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Timeout { last_status: None });
    assert_eq!(outcome.target, Some("compute1".to_string()));
    assert_eq!(outcome.duration, 10.);
    assert_eq!(clock.now(), 10.);
    assert_eq!(cluster.evacuate_calls().len(), 1);
    assert!(outcome.detail().contains("last status unknown"));
}

#[test]
// Evacuation completes only on the third status query, i.e. after 6 seconds.
fn test_slow_evacuation() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 4, 8192)
        .add_vm("vmA", "compute5", "m1.medium")
        .set_behavior(EvacuationBehavior {
            polls_to_complete: 3,
            ..Default::default()
        });
    let clock = Rc::new(ManualClock::new());

    let report = run(&cluster, clock.clone()).unwrap();

    assert!(report.is_success());
    assert_eq!(report.outcome("vmA").unwrap().duration, 6.);
    assert_eq!(clock.now(), 6.);
}

#[test]
// VM arrives at the target host but fails to start there.
fn test_moved_but_not_active() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 4, 8192)
        .add_vm("vmA", "compute5", "m1.medium")
        .set_behavior(EvacuationBehavior {
            final_status: VmStatus::Error,
            ..Default::default()
        });

    let report = run(&cluster, Rc::new(ManualClock::new())).unwrap();

    assert!(matches!(
        report.outcome("vmA").unwrap().status,
        OutcomeStatus::Timeout { .. }
    ));
    assert_eq!(cluster.vm("vmA").unwrap().host, "compute1");
}

#[test]
fn test_no_target_skips_command() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 1, 2048)
        .add_vm("vmA", "compute5", "m1.medium");
    let clock = Rc::new(ManualClock::new());

    let report = run(&cluster, clock.clone()).unwrap();

    let outcome = report.outcome("vmA").unwrap();
    assert!(matches!(outcome.status, OutcomeStatus::NoTarget { .. }));
    assert_eq!(outcome.target, None);
    assert!(cluster.evacuate_calls().is_empty());
    assert_eq!(clock.now(), 0.);
}

#[test]
// Rejected command does not stop the evacuation of the next VM.
fn test_command_error_isolated() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 8, 16384)
        .add_vm("vmA", "compute5", "m1.medium")
        .add_vm("vmB", "compute5", "m1.medium")
        .set_behavior(EvacuationBehavior {
            rejected_vms: vec!["vmA".to_string()],
            ..Default::default()
        });

    let report = run(&cluster, Rc::new(ManualClock::new())).unwrap();

    assert_eq!(
        report.outcome("vmA").unwrap().status,
        OutcomeStatus::Error {
            message: "evacuation of vmA is rejected".to_string()
        }
    );
    assert!(report.outcome("vmB").unwrap().is_success());
    assert_eq!(report.success_count(), 1);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(cluster.evacuate_calls().len(), 2);
}

#[test]
fn test_inventory_unavailable() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 8, 16384)
        .add_vm("vmA", "compute5", "m1.medium");
    cluster.fail_inventory("connection refused");

    let result = run(&cluster, Rc::new(ManualClock::new()));

    assert!(matches!(result, Err(SnapshotError::Hosts(_))));
    assert!(cluster.evacuate_calls().is_empty());
}

#[test]
// Inventory becomes unavailable after the initial read and the refresh for the first VM.
fn test_refresh_failure_affects_single_vm() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 8, 16384)
        .add_vm("vmA", "compute5", "m1.medium")
        .add_vm("vmB", "compute5", "m1.medium");
    cluster.fail_inventory_after(2);

    let report = run(&cluster, Rc::new(ManualClock::new())).unwrap();

    assert!(report.outcome("vmA").unwrap().is_success());
    assert!(matches!(
        report.outcome("vmB").unwrap().status,
        OutcomeStatus::NoTarget { .. }
    ));
    assert_eq!(cluster.evacuate_calls().len(), 1);
}

#[test]
fn test_report() {
    let mut cluster = cluster();
    cluster
        .add_host("compute1", 4, 8192)
        .add_vm("vmA", "compute5", "m1.medium")
        .add_vm("vmB", "compute5", "m1.medium")
        .add_vm("vmC", "compute5", "m1.medium")
        .add_server_group("g", GroupPolicy::AntiAffinity, &["vmA", "vmB"])
        .set_behavior(EvacuationBehavior {
            stuck_vms: vec!["vmC".to_string()],
            ..Default::default()
        });

    let report = run(&cluster, Rc::new(ManualClock::new())).unwrap();

    let categories = report.by_category();
    assert_eq!(categories["success"], vec![("vmA".to_string(), "evacuated to compute1".to_string())]);
    assert_eq!(categories["no-target"].len(), 1);
    assert_eq!(categories["no-target"][0].0, "vmB");
    assert_eq!(categories["timeout"].len(), 1);
    assert!(!categories.contains_key("error"));
    assert_eq!(report.summary(), "host compute5: 1 of 3 vms evacuated, 2 failed");

    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["failed_host"], "compute5");
    assert_eq!(json["succeeded"], 1);
    assert_eq!(json["failed"], 2);
    assert_eq!(json["successes"][0]["status"], "success");
    assert_eq!(json["successes"][0]["target"], "compute1");
    assert_eq!(json["failures"][0]["status"], "no-target");
    assert_eq!(json["failures"][1]["last_status"], "ERROR");

    let path = std::env::temp_dir().join("host-evacuator-test-report.csv");
    report.save_csv(path.to_str().unwrap()).unwrap();
    let csv = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("vm_id,vm_name,target,status,duration,detail"));
    assert!(lines[1].starts_with("vmA,vmA,compute1,success,"));
    std::fs::remove_file(path).unwrap();
}
