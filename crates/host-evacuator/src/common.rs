use std::ops::Add;

use serde::Serialize;

/// Amount of resources requested by a VM or a group of VMs.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceDemand {
    pub vcpus: u32,
    pub ram_mb: u64,
}

impl ResourceDemand {
    pub fn new(vcpus: u32, ram_mb: u64) -> Self {
        Self { vcpus, ram_mb }
    }
}

/// Sums the demands, saturating at the numeric bounds instead of wrapping around.
impl Add for ResourceDemand {
    type Output = ResourceDemand;

    fn add(self, other: ResourceDemand) -> ResourceDemand {
        ResourceDemand {
            vcpus: self.vcpus.saturating_add(other.vcpus),
            ram_mb: self.ram_mb.saturating_add(other.ram_mb),
        }
    }
}

#[derive(PartialEq, Debug)]
pub enum AllocationVerdict {
    NotEnoughCPU,
    NotEnoughMemory,
    Success,
}
