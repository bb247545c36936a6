//! Hypervisor host and its liveness state.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::common::{AllocationVerdict, ResourceDemand};

/// Liveness state of a hypervisor as reported by the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    Up,
    Down,
    #[serde(other)]
    Unknown,
}

impl Display for HostState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            HostState::Up => write!(f, "up"),
            HostState::Down => write!(f, "down"),
            HostState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Hypervisor host with its declared capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub state: HostState,
    pub vcpus: u32,
    pub memory_mb: u64,
}

impl Host {
    pub fn new(name: &str, state: HostState, vcpus: u32, memory_mb: u64) -> Self {
        Self {
            name: name.to_string(),
            state,
            vcpus,
            memory_mb,
        }
    }

    pub fn is_up(&self) -> bool {
        self.state == HostState::Up
    }

    /// Checks the demand against the declared capacity of the host.
    ///
    /// Resources used by VMs already running on the host are not taken into account.
    pub fn can_allocate(&self, demand: &ResourceDemand) -> AllocationVerdict {
        if self.vcpus < demand.vcpus {
            return AllocationVerdict::NotEnoughCPU;
        }
        if self.memory_mb < demand.ram_mb {
            return AllocationVerdict::NotEnoughMemory;
        }
        AllocationVerdict::Success
    }
}
