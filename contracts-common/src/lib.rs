//! Common modules used throughout the project, shared between the deploy
//! scripts and the test harness

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod constants;
pub mod solidity;
pub mod types;
