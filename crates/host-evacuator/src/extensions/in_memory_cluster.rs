//! Cluster kept in memory, implementing both the inventory and the command service.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::command::EvacuationCommandService;
use crate::error::{CommandError, ConfigError, InventoryError};
use crate::flavor::Flavor;
use crate::host::{Host, HostState};
use crate::inventory::{InventoryService, ServiceRecord, ServiceState, VmFilter};
use crate::server_group::{GroupPolicy, ServerGroup};
use crate::vm::{Vm, VmStatus};

fn default_polls() -> u32 {
    1
}

fn default_final_status() -> VmStatus {
    VmStatus::Active
}

/// How the cluster reacts to evacuate commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvacuationBehavior {
    /// Number of status queries after which an accepted evacuation completes.
    #[serde(default = "default_polls")]
    pub polls_to_complete: u32,
    /// Status of VM after the evacuation completes.
    #[serde(default = "default_final_status")]
    pub final_status: VmStatus,
    /// VMs for which the evacuate command is rejected.
    #[serde(default)]
    pub rejected_vms: Vec<String>,
    /// VMs which go to `ERROR` and never leave the failed host.
    #[serde(default)]
    pub stuck_vms: Vec<String>,
}

impl Default for EvacuationBehavior {
    fn default() -> Self {
        Self {
            polls_to_complete: default_polls(),
            final_status: default_final_status(),
            rejected_vms: Vec::new(),
            stuck_vms: Vec::new(),
        }
    }
}

/// Description of the cluster, can be loaded from YAML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterDescription {
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub flavors: Vec<Flavor>,
    #[serde(default)]
    pub vms: Vec<Vm>,
    #[serde(default)]
    pub server_groups: Vec<ServerGroup>,
    #[serde(default)]
    pub services: Vec<ServiceRecord>,
    #[serde(default)]
    pub behavior: EvacuationBehavior,
}

/// Evacuate command received by the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct EvacuateCall {
    pub vm_id: String,
    pub target_host: String,
    pub on_shared_storage: bool,
}

struct PendingEvacuation {
    target_host: String,
    polls_left: u32,
}

#[derive(Default)]
struct ClusterState {
    cluster: ClusterDescription,
    pending: HashMap<String, PendingEvacuation>,
    calls: Vec<EvacuateCall>,
    inventory_failure: Option<String>,
    inventory_reads_left: Option<usize>,
    status_query_failure: Option<String>,
}

impl ClusterState {
    fn check_inventory(&self) -> Result<(), InventoryError> {
        match &self.inventory_failure {
            Some(message) => Err(InventoryError(message.clone())),
            None => Ok(()),
        }
    }

    fn vm_mut(&mut self, vm_id: &str) -> Option<&mut Vm> {
        self.cluster.vms.iter_mut().find(|vm| vm.id == vm_id)
    }

    /// Counts a status query of the VM and completes its evacuation when due.
    fn observe(&mut self, vm_id: &str) {
        let due = match self.pending.get_mut(vm_id) {
            Some(pending) => {
                pending.polls_left = pending.polls_left.saturating_sub(1);
                pending.polls_left == 0
            }
            None => false,
        };
        if !due {
            return;
        }
        if let Some(pending) = self.pending.remove(vm_id) {
            let final_status = self.cluster.behavior.final_status.clone();
            if let Some(vm) = self.vm_mut(vm_id) {
                vm.host = pending.target_host;
                vm.status = final_status;
            }
        }
    }
}

/// Cluster simulated in memory.
///
/// An accepted evacuation puts the VM into `REBUILD` status. The VM moves to the target host after the configured
/// number of status queries (listing by VM name), which allows to test the waiting without a real control plane.
#[derive(Default)]
pub struct InMemoryCluster {
    state: RefCell<ClusterState>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_description(cluster: ClusterDescription) -> Self {
        Self {
            state: RefCell::new(ClusterState {
                cluster,
                ..Default::default()
            }),
        }
    }

    /// Loads the cluster from YAML file with [`ClusterDescription`].
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Read {
            path: file_name.to_string(),
            source,
        })?;
        let cluster: ClusterDescription = serde_yaml::from_str(&content)?;
        Ok(Self::from_description(cluster))
    }

    pub fn add_host(&mut self, name: &str, vcpus: u32, memory_mb: u64) -> &mut Self {
        self.add_host_with_state(name, HostState::Up, vcpus, memory_mb)
    }

    pub fn add_host_with_state(&mut self, name: &str, state: HostState, vcpus: u32, memory_mb: u64) -> &mut Self {
        let cluster = &mut self.state.get_mut().cluster;
        cluster.hosts.push(Host::new(name, state, vcpus, memory_mb));
        let service_state = match state {
            HostState::Up => ServiceState::Up,
            _ => ServiceState::Down,
        };
        cluster.services.push(ServiceRecord {
            host: name.to_string(),
            binary: "nova-compute".to_string(),
            state: service_state,
        });
        self
    }

    pub fn add_flavor(&mut self, id: &str, vcpus: u32, ram_mb: u64) -> &mut Self {
        self.state.get_mut().cluster.flavors.push(Flavor::new(id, vcpus, ram_mb));
        self
    }

    /// Adds active VM, its name is the same as its id.
    pub fn add_vm(&mut self, id: &str, host: &str, flavor: &str) -> &mut Self {
        self.state
            .get_mut()
            .cluster
            .vms
            .push(Vm::new(id, id, host, flavor, VmStatus::Active));
        self
    }

    pub fn add_server_group(&mut self, id: &str, policy: GroupPolicy, members: &[&str]) -> &mut Self {
        self.state
            .get_mut()
            .cluster
            .server_groups
            .push(ServerGroup::new(id, policy, members.iter().copied()));
        self
    }

    pub fn set_behavior(&mut self, behavior: EvacuationBehavior) -> &mut Self {
        self.state.get_mut().cluster.behavior = behavior;
        self
    }

    /// Makes every inventory query fail with the message.
    pub fn fail_inventory(&self, message: &str) {
        self.state.borrow_mut().inventory_failure = Some(message.to_string());
    }

    /// Makes host listing fail after the specified number of successful ones.
    pub fn fail_inventory_after(&self, reads: usize) {
        self.state.borrow_mut().inventory_reads_left = Some(reads);
    }

    /// Makes every status query (listing VMs by name) fail with the message, other listings keep working.
    pub fn fail_status_queries(&self, message: &str) {
        self.state.borrow_mut().status_query_failure = Some(message.to_string());
    }

    pub fn vm(&self, id: &str) -> Option<Vm> {
        self.state.borrow().cluster.vms.iter().find(|vm| vm.id == id).cloned()
    }

    /// Returns all evacuate commands received so far.
    pub fn evacuate_calls(&self) -> Vec<EvacuateCall> {
        self.state.borrow().calls.clone()
    }
}

impl InventoryService for InMemoryCluster {
    fn list_hosts(&self) -> Result<Vec<Host>, InventoryError> {
        let mut state = self.state.borrow_mut();
        state.check_inventory()?;
        if let Some(left) = state.inventory_reads_left.as_mut() {
            if *left == 0 {
                return Err(InventoryError("inventory is not available".to_string()));
            }
            *left -= 1;
        }
        Ok(state.cluster.hosts.clone())
    }

    fn list_flavors(&self) -> Result<Vec<Flavor>, InventoryError> {
        let state = self.state.borrow();
        state.check_inventory()?;
        Ok(state.cluster.flavors.clone())
    }

    fn list_vms(&self, filter: &VmFilter) -> Result<Vec<Vm>, InventoryError> {
        let mut state = self.state.borrow_mut();
        state.check_inventory()?;
        if let VmFilter::Name(name) = filter {
            if let Some(message) = &state.status_query_failure {
                return Err(InventoryError(message.clone()));
            }
            let ids: Vec<String> = state
                .cluster
                .vms
                .iter()
                .filter(|vm| vm.name == *name)
                .map(|vm| vm.id.clone())
                .collect();
            for id in ids {
                state.observe(&id);
            }
        }
        Ok(state.cluster.vms.iter().filter(|vm| filter.matches(vm)).cloned().collect())
    }

    fn list_server_groups(&self) -> Result<Vec<ServerGroup>, InventoryError> {
        let state = self.state.borrow();
        state.check_inventory()?;
        Ok(state.cluster.server_groups.clone())
    }

    fn get_service_health(&self, host: &str, service: &str) -> Result<Vec<ServiceRecord>, InventoryError> {
        let state = self.state.borrow();
        state.check_inventory()?;
        Ok(state
            .cluster
            .services
            .iter()
            .filter(|s| s.host == host && s.binary == service)
            .cloned()
            .collect())
    }
}

impl EvacuationCommandService for InMemoryCluster {
    fn evacuate(&self, vm_id: &str, target_host: &str, on_shared_storage: bool) -> Result<(), CommandError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(EvacuateCall {
            vm_id: vm_id.to_string(),
            target_host: target_host.to_string(),
            on_shared_storage,
        });
        if state.cluster.behavior.rejected_vms.iter().any(|id| id == vm_id) {
            return Err(CommandError(format!("evacuation of {} is rejected", vm_id)));
        }
        if !state.cluster.hosts.iter().any(|h| h.name == target_host) {
            return Err(CommandError(format!("compute host {} not found", target_host)));
        }
        let stuck = state.cluster.behavior.stuck_vms.iter().any(|id| id == vm_id);
        let polls_to_complete = state.cluster.behavior.polls_to_complete.max(1);
        let vm = state
            .vm_mut(vm_id)
            .ok_or_else(|| CommandError(format!("instance {} could not be found", vm_id)))?;
        if stuck {
            vm.status = VmStatus::Error;
            return Ok(());
        }
        vm.status = VmStatus::Other("REBUILD".to_string());
        state.pending.insert(
            vm_id.to_string(),
            PendingEvacuation {
                target_host: target_host.to_string(),
                polls_left: polls_to_complete,
            },
        );
        Ok(())
    }
}
