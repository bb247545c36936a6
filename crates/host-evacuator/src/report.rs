//! Outcomes of VM evacuations and the final report of the run.

use std::collections::BTreeMap;
use std::fs::File;

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use crate::error::{CommandError, NoTarget};
use crate::vm::{Vm, VmStatus};

/// Final status of a single VM evacuation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum OutcomeStatus {
    /// VM became active on the target host.
    Success,
    /// No host can accept the VM, the evacuate command was not issued.
    NoTarget { reason: String },
    /// The command was accepted, but the VM did not become active in time.
    Timeout { last_status: Option<String> },
    /// The evacuate command was rejected.
    Error { message: String },
}

impl OutcomeStatus {
    pub fn category(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::NoTarget { .. } => "no-target",
            OutcomeStatus::Timeout { .. } => "timeout",
            OutcomeStatus::Error { .. } => "error",
        }
    }
}

/// Outcome of the evacuation of a single VM. Created once and never changed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvacuationOutcome {
    pub vm_id: String,
    pub vm_name: String,
    pub target: Option<String>,
    #[serde(flatten)]
    pub status: OutcomeStatus,
    /// Time in seconds spent on the VM, including waiting for it to become active.
    pub duration: f64,
}

impl EvacuationOutcome {
    pub fn success(vm: &Vm, target: &str, duration: f64) -> Self {
        Self::new(vm, Some(target), OutcomeStatus::Success, duration)
    }

    pub fn no_target(vm: &Vm, reason: &NoTarget, duration: f64) -> Self {
        let status = OutcomeStatus::NoTarget {
            reason: reason.to_string(),
        };
        Self::new(vm, None, status, duration)
    }

    pub fn timeout(vm: &Vm, target: &str, last_status: Option<&VmStatus>, duration: f64) -> Self {
        let status = OutcomeStatus::Timeout {
            last_status: last_status.map(|s| s.to_string()),
        };
        Self::new(vm, Some(target), status, duration)
    }

    pub fn error(vm: &Vm, target: &str, err: &CommandError, duration: f64) -> Self {
        let status = OutcomeStatus::Error {
            message: err.to_string(),
        };
        Self::new(vm, Some(target), status, duration)
    }

    fn new(vm: &Vm, target: Option<&str>, status: OutcomeStatus, duration: f64) -> Self {
        Self {
            vm_id: vm.id.clone(),
            vm_name: vm.name.clone(),
            target: target.map(str::to_string),
            status,
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// Returns human-readable details of the outcome.
    pub fn detail(&self) -> String {
        let target = self.target.as_deref().unwrap_or("-");
        match &self.status {
            OutcomeStatus::Success => format!("evacuated to {}", target),
            OutcomeStatus::NoTarget { reason } => reason.clone(),
            OutcomeStatus::Timeout { last_status } => format!(
                "not active on {} after {:.1}s (last status {}), manual migration required",
                target,
                self.duration,
                last_status.as_deref().unwrap_or("unknown")
            ),
            OutcomeStatus::Error { message } => format!("failed to evacuate to {}: {}", target, message),
        }
    }
}

#[derive(Serialize)]
struct OutcomeRecord<'a> {
    vm_id: &'a str,
    vm_name: &'a str,
    target: &'a str,
    status: &'static str,
    duration: f64,
    detail: String,
}

/// Outcomes of all VMs processed during the evacuation of a host.
#[derive(Clone, Debug, PartialEq)]
pub struct EvacuationReport {
    failed_host: String,
    outcomes: Vec<EvacuationOutcome>,
}

impl EvacuationReport {
    pub fn new(failed_host: &str) -> Self {
        Self {
            failed_host: failed_host.to_string(),
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: EvacuationOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn failed_host(&self) -> &str {
        &self.failed_host
    }

    /// Returns all outcomes in the order the VMs were processed.
    pub fn outcomes(&self) -> &[EvacuationOutcome] {
        &self.outcomes
    }

    pub fn outcome(&self, vm_name: &str) -> Option<&EvacuationOutcome> {
        self.outcomes.iter().find(|o| o.vm_name == vm_name)
    }

    pub fn successes(&self) -> impl Iterator<Item = &EvacuationOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    /// Returns the outcomes of all VMs which were not evacuated.
    pub fn failures(&self) -> impl Iterator<Item = &EvacuationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// Groups `(vm name, detail)` pairs by outcome category.
    pub fn by_category(&self) -> BTreeMap<&'static str, Vec<(String, String)>> {
        let mut categories: BTreeMap<&'static str, Vec<(String, String)>> = BTreeMap::new();
        for outcome in &self.outcomes {
            categories
                .entry(outcome.status.category())
                .or_default()
                .push((outcome.vm_name.clone(), outcome.detail()));
        }
        categories
    }

    pub fn summary(&self) -> String {
        format!(
            "host {}: {} of {} vms evacuated, {} failed",
            self.failed_host,
            self.success_count(),
            self.outcomes.len(),
            self.failure_count()
        )
    }

    /// Writes outcomes to CSV file, one row per VM.
    pub fn save_csv(&self, path: &str) -> Result<(), csv::Error> {
        let file = File::create(path)?;
        let mut wtr = csv::Writer::from_writer(file);
        for outcome in &self.outcomes {
            wtr.serialize(OutcomeRecord {
                vm_id: &outcome.vm_id,
                vm_name: &outcome.vm_name,
                target: outcome.target.as_deref().unwrap_or(""),
                status: outcome.status.category(),
                duration: outcome.duration,
                detail: outcome.detail(),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl Serialize for EvacuationReport {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("EvacuationReport", 5)?;
        state.serialize_field("failed_host", &self.failed_host)?;
        state.serialize_field("succeeded", &self.success_count())?;
        state.serialize_field("failed", &self.failure_count())?;
        state.serialize_field("successes", &self.successes().collect::<Vec<_>>())?;
        state.serialize_field("failures", &self.failures().collect::<Vec<_>>())?;
        state.end()
    }
}
