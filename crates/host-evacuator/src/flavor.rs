use serde::{Deserialize, Serialize};

use crate::common::ResourceDemand;

/// Resource shape assigned to a VM at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: String,
    pub vcpus: u32,
    pub ram_mb: u64,
}

impl Flavor {
    pub fn new(id: &str, vcpus: u32, ram_mb: u64) -> Self {
        Self {
            id: id.to_string(),
            vcpus,
            ram_mb,
        }
    }

    pub fn demand(&self) -> ResourceDemand {
        ResourceDemand::new(self.vcpus, self.ram_mb)
    }
}
