//! Cluster inventory service and the snapshot of its state.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::common::ResourceDemand;
use crate::error::{InventoryError, NoTarget, SnapshotError};
use crate::flavor::Flavor;
use crate::host::Host;
use crate::server_group::ServerGroup;
use crate::vm::Vm;

/// Selects VMs returned by [`InventoryService::list_vms`].
#[derive(Debug, Clone, PartialEq)]
pub enum VmFilter {
    All,
    Host(String),
    Name(String),
}

impl VmFilter {
    pub fn matches(&self, vm: &Vm) -> bool {
        match self {
            VmFilter::All => true,
            VmFilter::Host(host) => vm.host == *host,
            VmFilter::Name(name) => vm.name == *name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Up,
    Down,
}

impl Display for ServiceState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ServiceState::Up => write!(f, "up"),
            ServiceState::Down => write!(f, "down"),
        }
    }
}

/// Health of a control plane service (e.g. `nova-compute`) running on a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub host: String,
    pub binary: String,
    pub state: ServiceState,
}

/// Read access to the cluster control plane.
pub trait InventoryService {
    fn list_hosts(&self) -> Result<Vec<Host>, InventoryError>;

    fn list_flavors(&self) -> Result<Vec<Flavor>, InventoryError>;

    fn list_vms(&self, filter: &VmFilter) -> Result<Vec<Vm>, InventoryError>;

    fn list_server_groups(&self) -> Result<Vec<ServerGroup>, InventoryError>;

    /// Returns all records of the service with the given binary name on the host.
    fn get_service_health(&self, host: &str, service: &str) -> Result<Vec<ServiceRecord>, InventoryError>;
}

/// Source of fresh inventory snapshots.
///
/// Every inventory service is a snapshot provider.
pub trait SnapshotProvider {
    fn snapshot(&self) -> Result<InventorySnapshot, SnapshotError>;
}

impl<T: InventoryService + ?Sized> SnapshotProvider for T {
    fn snapshot(&self) -> Result<InventorySnapshot, SnapshotError> {
        InventorySnapshot::fetch(self)
    }
}

/// Read-only view of hosts, flavors, VMs and server groups taken at one moment.
///
/// Hosts are ordered by name, which makes every iteration over them deterministic. VMs keep the order in which they
/// were returned by the inventory.
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    hosts: BTreeMap<String, Host>,
    flavors: HashMap<String, Flavor>,
    vms: Vec<Vm>,
    vm_index: HashMap<String, usize>,
    groups: Vec<ServerGroup>,
}

impl InventorySnapshot {
    pub fn new(hosts: Vec<Host>, flavors: Vec<Flavor>, vms: Vec<Vm>, groups: Vec<ServerGroup>) -> Self {
        let vm_index = vms.iter().enumerate().map(|(i, vm)| (vm.id.clone(), i)).collect();
        Self {
            hosts: hosts.into_iter().map(|h| (h.name.clone(), h)).collect(),
            flavors: flavors.into_iter().map(|f| (f.id.clone(), f)).collect(),
            vms,
            vm_index,
            groups,
        }
    }

    /// Reads the complete inventory. Fails if any of the listings fails.
    pub fn fetch<I: InventoryService + ?Sized>(inventory: &I) -> Result<Self, SnapshotError> {
        let hosts = inventory.list_hosts().map_err(SnapshotError::Hosts)?;
        let flavors = inventory.list_flavors().map_err(SnapshotError::Flavors)?;
        let vms = inventory.list_vms(&VmFilter::All).map_err(SnapshotError::Vms)?;
        let groups = inventory.list_server_groups().map_err(SnapshotError::ServerGroups)?;
        Ok(Self::new(hosts, flavors, vms, groups))
    }

    /// Places VMs with an accepted evacuate command on their target hosts, whatever the inventory reports.
    ///
    /// A VM whose evacuation is still in progress (or was never completed) keeps its target claimed, so the members
    /// of its server group see it there.
    pub fn with_claims<'a>(mut self, claims: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (vm_id, target) in claims {
            if let Some(&i) = self.vm_index.get(vm_id) {
                self.vms[i].host = target.clone();
            }
        }
        self
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn flavor(&self, id: &str) -> Option<&Flavor> {
        self.flavors.get(id)
    }

    pub fn vms(&self) -> &[Vm] {
        &self.vms
    }

    pub fn vm(&self, id: &str) -> Option<&Vm> {
        self.vm_index.get(id).map(|&i| &self.vms[i])
    }

    pub fn vms_on_host<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a Vm> + 'a {
        self.vms.iter().filter(move |vm| vm.host == host)
    }

    pub fn server_groups(&self) -> &[ServerGroup] {
        &self.groups
    }

    /// Returns all server groups listing the VM as a member.
    pub fn server_groups_of(&self, vm_id: &str) -> Vec<&ServerGroup> {
        self.groups.iter().filter(|g| g.contains(vm_id)).collect()
    }

    /// Returns resources required by the flavor of the VM.
    pub fn demand_of(&self, vm: &Vm) -> Result<ResourceDemand, NoTarget> {
        self.flavor(&vm.flavor)
            .map(Flavor::demand)
            .ok_or_else(|| NoTarget::UnknownFlavor(vm.flavor.clone()))
    }
}
