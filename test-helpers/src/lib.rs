//! Common helpers used in unit and integration tests across the project crates

pub mod accounts;
pub mod fixtures;
pub mod sim;
