//! Selection of the target host for an evacuated VM.

use std::collections::HashSet;

use indexmap::IndexSet;
use regex::Regex;

use crate::common::{AllocationVerdict, ResourceDemand};
use crate::config::{parse_config_value, EvacuationConfig};
use crate::error::{ConfigError, NoTarget};
use crate::host::Host;
use crate::inventory::InventorySnapshot;
use crate::placement_algorithms::first_fit::FirstFit;
use crate::placement_algorithms::random_fit::RandomFit;
use crate::server_group::{GroupPolicy, ServerGroup};
use crate::vm::Vm;

/// Trait for implementation of target host selection.
///
/// The VM passed to the selector is running on the failed host (`vm.host`), which is never a valid target.
/// The snapshot must be fresh, since the placement of group members changes while the group is evacuated.
pub trait TargetSelector {
    fn select_target(&self, vm: &Vm, snapshot: &InventorySnapshot) -> Result<Host, NoTarget>;
}

/// Trait for implementation of the choice among several suitable hosts.
///
/// Candidates are ordered by host name. The choice must be deterministic for the same VM and candidates.
pub trait HostPicker {
    fn pick<'a>(&self, vm: &Vm, candidates: &[&'a Host]) -> Option<&'a Host>;
}

pub fn placement_algorithm_resolver(config_str: &str) -> Result<Box<dyn HostPicker>, ConfigError> {
    let (algorithm_name, options) = parse_config_value(config_str);
    match algorithm_name.as_str() {
        "FirstFit" => Ok(Box::new(FirstFit::new())),
        "RandomFit" => Ok(Box::new(RandomFit::from_str(&options.unwrap_or_default())?)),
        _ => Err(ConfigError::UnknownAlgorithm(config_str.to_string())),
    }
}

/// Restricts the hosts which can be used as evacuation targets by name.
#[derive(Debug, Clone, Default)]
pub struct HostFilter {
    pattern: Option<Regex>,
}

impl HostFilter {
    pub fn any() -> Self {
        Self::default()
    }

    /// Creates filter accepting the host names which match the pattern from their start.
    pub fn with_pattern(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = Regex::new(&format!("^(?:{})", pattern))?;
        Ok(Self { pattern: Some(pattern) })
    }

    pub fn accepts(&self, host_name: &str) -> bool {
        self.pattern.as_ref().map_or(true, |re| re.is_match(host_name))
    }
}

/// Places VMs with respect to host capacity and to the policy of the VM's server group.
///
/// - A VM without a group goes to any live host with enough capacity for its flavor.
/// - The first member of an affinity group leaving the failed host goes to a host with enough capacity for the whole
///   group. The rest of the members follow it to the same host.
/// - A member of an anti-affinity group goes to a host which does not run any other member of the group.
pub struct GroupAwarePlacement {
    picker: Box<dyn HostPicker>,
    filter: HostFilter,
}

impl GroupAwarePlacement {
    pub fn new(picker: Box<dyn HostPicker>, filter: HostFilter) -> Self {
        Self { picker, filter }
    }

    pub fn from_config(config: &EvacuationConfig) -> Result<Self, ConfigError> {
        let picker = placement_algorithm_resolver(&config.placement)?;
        let filter = match &config.target_host_pattern {
            Some(pattern) => HostFilter::with_pattern(pattern)?,
            None => HostFilter::any(),
        };
        Ok(Self::new(picker, filter))
    }

    /// Returns live hosts other than the source host which have enough capacity for the demand, ordered by name.
    pub fn eligible_hosts<'a>(
        &self,
        snapshot: &'a InventorySnapshot,
        source_host: &str,
        demand: &ResourceDemand,
    ) -> Vec<&'a Host> {
        snapshot
            .hosts()
            .filter(|host| host.is_up() && host.name != source_host && self.filter.accepts(&host.name))
            .filter(|host| host.can_allocate(demand) == AllocationVerdict::Success)
            .collect()
    }

    fn select_affine(
        &self,
        vm: &Vm,
        group: &ServerGroup,
        snapshot: &InventorySnapshot,
        eligible: &[&Host],
    ) -> Result<Host, NoTarget> {
        let source_host = vm.host.as_str();
        let members: Vec<&Vm> = group.members.iter().filter_map(|id| snapshot.vm(id)).collect();
        let current_hosts: IndexSet<&str> = members.iter().map(|m| m.host.as_str()).collect();

        match current_hosts.len() {
            // some member has already left the failed host, the rest follow it
            2 if current_hosts.contains(source_host) => {
                let moved_to = current_hosts.iter().find(|&&h| h != source_host);
                match moved_to.and_then(|&h| snapshot.host(h)) {
                    Some(host) => Ok(host.clone()),
                    None => Err(NoTarget::UnknownHost(moved_to.map_or_else(String::new, |h| h.to_string()))),
                }
            }
            // first mover, the target must fit the whole group
            1 => {
                let mut total = ResourceDemand::default();
                for member in &members {
                    total = total + snapshot.demand_of(member)?;
                }
                let candidates: Vec<&Host> = eligible
                    .iter()
                    .copied()
                    .filter(|host| host.can_allocate(&total) == AllocationVerdict::Success)
                    .collect();
                self.picker
                    .pick(vm, &candidates)
                    .cloned()
                    .ok_or(NoTarget::InsufficientGroupCapacity {
                        vcpus: total.vcpus,
                        ram_mb: total.ram_mb,
                    })
            }
            _ => Err(NoTarget::DegenerateAffinity {
                hosts: current_hosts.iter().map(|h| h.to_string()).collect(),
            }),
        }
    }

    fn select_anti_affine(
        &self,
        vm: &Vm,
        group: &ServerGroup,
        snapshot: &InventorySnapshot,
        eligible: &[&Host],
    ) -> Result<Host, NoTarget> {
        let occupied: HashSet<&str> = group
            .members
            .iter()
            .filter(|&id| *id != vm.id)
            .filter_map(|id| snapshot.vm(id))
            .map(|m| m.host.as_str())
            .filter(|&h| h != vm.host)
            .collect();
        let candidates: Vec<&Host> = eligible
            .iter()
            .copied()
            .filter(|host| !occupied.contains(host.name.as_str()))
            .collect();
        match self.picker.pick(vm, &candidates) {
            Some(host) => Ok(host.clone()),
            None if eligible.is_empty() => Err(NoTarget::NoEligibleHost),
            None => Err(NoTarget::AllHostsOccupied),
        }
    }
}

impl TargetSelector for GroupAwarePlacement {
    fn select_target(&self, vm: &Vm, snapshot: &InventorySnapshot) -> Result<Host, NoTarget> {
        let demand = snapshot.demand_of(vm)?;
        let eligible = self.eligible_hosts(snapshot, &vm.host, &demand);

        match snapshot.server_groups_of(&vm.id).first() {
            None => self
                .picker
                .pick(vm, &eligible)
                .cloned()
                .ok_or(NoTarget::NoEligibleHost),
            Some(group) => match group.policy {
                GroupPolicy::Affinity => self.select_affine(vm, group, snapshot, &eligible),
                GroupPolicy::AntiAffinity => self.select_anti_affine(vm, group, snapshot, &eligible),
            },
        }
    }
}
