use std::fmt::{Display, Formatter};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Colocation policy of a server group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupPolicy {
    /// All members must run on the same host.
    Affinity,
    /// No two members may run on the same host.
    AntiAffinity,
}

impl Display for GroupPolicy {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            GroupPolicy::Affinity => write!(f, "affinity"),
            GroupPolicy::AntiAffinity => write!(f, "anti-affinity"),
        }
    }
}

/// Named set of VMs sharing a colocation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerGroup {
    pub id: String,
    pub policy: GroupPolicy,
    pub members: IndexSet<String>,
}

impl ServerGroup {
    pub fn new<I, S>(id: &str, policy: GroupPolicy, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.to_string(),
            policy,
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, vm_id: &str) -> bool {
        self.members.contains(vm_id)
    }
}
