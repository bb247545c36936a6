//! Checks performed before evacuation of a host is started.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PrecheckError;
use crate::inventory::{InventoryService, ServiceState};

/// Host state reported by the monitoring probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeState {
    Up,
    Down,
    Unreachable,
}

impl FromStr for ProbeState {
    type Err = String;

    /// Accepts both state names and numeric state ids (0, 1, 2).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" | "0" => Ok(ProbeState::Up),
            "DOWN" | "1" => Ok(ProbeState::Down),
            "UNREACHABLE" | "2" => Ok(ProbeState::Unreachable),
            _ => Err(format!("unknown host state: {}", s)),
        }
    }
}

impl Display for ProbeState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ProbeState::Up => write!(f, "UP"),
            ProbeState::Down => write!(f, "DOWN"),
            ProbeState::Unreachable => write!(f, "UNREACHABLE"),
        }
    }
}

/// Whether the probe state is confirmed (hard) or may still change on the next check (soft).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateType {
    Soft,
    Hard,
}

impl FromStr for StateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SOFT" => Ok(StateType::Soft),
            "HARD" => Ok(StateType::Hard),
            _ => Err(format!("unknown state type: {}", s)),
        }
    }
}

/// Notification about a change of the host state.
#[derive(Debug, Clone, PartialEq)]
pub struct HostAlert {
    pub host: String,
    pub state: ProbeState,
    pub state_type: StateType,
}

impl HostAlert {
    pub fn new(host: &str, state: ProbeState, state_type: StateType) -> Self {
        Self {
            host: host.to_string(),
            state,
            state_type,
        }
    }

    /// Returns true if the host is confirmed to be down.
    pub fn requires_evacuation(&self, unreachable_is_down: bool) -> bool {
        if self.state_type != StateType::Hard {
            return false;
        }
        match self.state {
            ProbeState::Down => true,
            ProbeState::Unreachable => unreachable_is_down,
            ProbeState::Up => false,
        }
    }
}

/// Checks that the control plane agrees with monitoring, i.e. that each listed service on the host is down.
pub fn ensure_services_down<I: InventoryService + ?Sized>(
    inventory: &I,
    host: &str,
    services: &[String],
) -> Result<(), PrecheckError> {
    for service in services {
        let records = inventory
            .get_service_health(host, service)
            .map_err(|source| PrecheckError::Query {
                service: service.clone(),
                host: host.to_string(),
                source,
            })?;
        if records.len() != 1 {
            return Err(PrecheckError::ServiceCount {
                service: service.clone(),
                host: host.to_string(),
                found: records.len(),
            });
        }
        if records[0].state != ServiceState::Down {
            return Err(PrecheckError::ServiceNotDown {
                service: service.clone(),
                host: host.to_string(),
                state: records[0].state.to_string(),
            });
        }
    }
    Ok(())
}
