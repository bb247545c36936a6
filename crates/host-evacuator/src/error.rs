//! Error types of the evacuation run.

use thiserror::Error;

/// Failure of a single query to the cluster inventory.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct InventoryError(pub String);

/// Failure to fetch the inventory snapshot.
///
/// Raised by the initial fetch it aborts the whole run, raised by a refresh it only affects the current VM.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("failed to list hosts: {0}")]
    Hosts(InventoryError),

    #[error("failed to list flavors: {0}")]
    Flavors(InventoryError),

    #[error("failed to list vms: {0}")]
    Vms(InventoryError),

    #[error("failed to list server groups: {0}")]
    ServerGroups(InventoryError),
}

/// Rejection of an evacuate command by the cluster.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct CommandError(pub String);

/// Reason why no target host could be selected for a VM.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NoTarget {
    #[error("no live host has enough capacity for the vm")]
    NoEligibleHost,

    #[error("no live host has enough capacity for the whole affinity group ({vcpus} vcpus, {ram_mb} MB)")]
    InsufficientGroupCapacity { vcpus: u32, ram_mb: u64 },

    #[error("every eligible host is already occupied by a member of the anti-affinity group")]
    AllHostsOccupied,

    #[error("affinity group members are spread over {} hosts: {}", .hosts.len(), .hosts.join(", "))]
    DegenerateAffinity { hosts: Vec<String> },

    #[error("vm {0} is not present in the inventory")]
    UnknownVm(String),

    #[error("host {0} is not present in the inventory")]
    UnknownHost(String),

    #[error("flavor {0} is not present in the inventory")]
    UnknownFlavor(String),

    #[error("inventory is unavailable: {0}")]
    SnapshotUnavailable(SnapshotError),
}

impl From<SnapshotError> for NoTarget {
    fn from(err: SnapshotError) -> Self {
        NoTarget::SnapshotUnavailable(err)
    }
}

/// Error while loading or validating the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("can't read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value of {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("unknown placement algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid target host pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Reason to refuse evacuation of the host before touching any VM.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrecheckError {
    #[error("expected exactly one {service} service on host {host}, found {found}")]
    ServiceCount { service: String, host: String, found: usize },

    #[error("monitoring reports host {host} down, but {service} is still {state}")]
    ServiceNotDown { service: String, host: String, state: String },

    #[error("failed to query {service} on host {host}: {source}")]
    Query {
        service: String,
        host: String,
        #[source]
        source: InventoryError,
    },
}
