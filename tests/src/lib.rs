//! Scenario helpers for the integration tests

pub mod utils;
