//! Deployment Worker Library
//!
//! Materializes a deployment payload into a throwaway directory and runs its
//! entrypoint, always answering with a structured outcome.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod server;
pub mod utils;
