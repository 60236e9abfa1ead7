//! Filesystem helpers

pub mod paths;
pub mod workdir;
