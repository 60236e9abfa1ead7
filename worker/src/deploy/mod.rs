//! Deployment module

pub mod entrypoint;
pub mod invocable;
pub mod materialize;
pub mod orchestrator;
pub mod process;
pub mod runner;
