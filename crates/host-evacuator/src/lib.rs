#![doc = include_str!("../readme.md")]

pub mod clock;
pub mod command;
pub mod common;
pub mod config;
pub mod error;
pub mod extensions;
pub mod flavor;
pub mod host;
pub mod inventory;
pub mod log;
pub mod orchestrator;
pub mod placement;
pub mod placement_algorithms;
pub mod precheck;
pub mod report;
pub mod retry;
pub mod server_group;
pub mod vm;

pub use colored;
pub use orchestrator::Evacuator;
pub use report::{EvacuationOutcome, EvacuationReport, OutcomeStatus};
