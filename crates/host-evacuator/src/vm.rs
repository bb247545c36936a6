//! Virtual machine and its lifecycle status.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Lifecycle status of a VM as reported by the cluster.
///
/// Transitional statuses (e.g. `REBUILD`) are kept as is in `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VmStatus {
    Active,
    Error,
    Unknown,
    Other(String),
}

impl From<String> for VmStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => VmStatus::Active,
            "ERROR" => VmStatus::Error,
            "UNKNOWN" => VmStatus::Unknown,
            _ => VmStatus::Other(s),
        }
    }
}

impl From<&str> for VmStatus {
    fn from(s: &str) -> Self {
        VmStatus::from(s.to_string())
    }
}

impl From<VmStatus> for String {
    fn from(status: VmStatus) -> Self {
        status.to_string()
    }
}

impl Display for VmStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmStatus::Active => write!(f, "ACTIVE"),
            VmStatus::Error => write!(f, "ERROR"),
            VmStatus::Unknown => write!(f, "UNKNOWN"),
            VmStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Virtual machine (instance) as seen in the inventory.
///
/// `host` is the hypervisor currently running the VM. It changes only when the cluster completes an evacuation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vm {
    pub id: String,
    pub name: String,
    pub host: String,
    pub flavor: String,
    pub status: VmStatus,
}

impl Vm {
    pub fn new(id: &str, name: &str, host: &str, flavor: &str, status: VmStatus) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            host: host.to_string(),
            flavor: flavor.to_string(),
            status,
        }
    }
}
