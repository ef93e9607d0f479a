//! Scripts for deploying upgradeable contracts behind proxies, upgrading
//! them, and controlling the state of development chains.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod chain;
pub mod cli;
mod commands;
pub mod constants;
pub mod conversion;
pub mod deploy;
pub mod errors;
pub mod report;
pub mod snapshot;
pub mod utils;
