//! Application entry points and configuration

pub mod options;
pub mod run;
pub mod settings;
