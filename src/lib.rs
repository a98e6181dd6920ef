//! yenesis: stock screening and trade automation.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], batch jobs in [`jobs`] and the
//! command line in [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod jobs;
pub mod ports;
