//! Implementations of the choice among suitable hosts.

pub mod first_fit;
pub mod random_fit;
