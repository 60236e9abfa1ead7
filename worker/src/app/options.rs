//! Command line options

use std::collections::HashMap;
use std::path::PathBuf;

/// What the binary should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Print version info and exit
    Version,
    /// Serve deployments over HTTP
    Serve,
    /// Handle a single event and print its outcome
    Once(EventSource),
}

/// Where a one-shot event is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    File(PathBuf),
    Stdin,
}

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub mode: Mode,
    pub config: Option<PathBuf>,
    pub allow_shell: bool,
    pub json_logs: bool,
}

impl CliOptions {
    /// Parse `--key=value` and `--flag` style arguments, skipping the program name
    pub fn parse<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut cli_args: HashMap<String, String> = HashMap::new();

        for arg in args.into_iter().skip(1) {
            if let Some((key, value)) = arg.split_once('=') {
                let clean_key = key.trim_start_matches('-');
                cli_args.insert(clean_key.to_string(), value.to_string());
            } else if arg.starts_with("--") {
                let clean_key = arg.trim_start_matches('-');
                cli_args.insert(clean_key.to_string(), "true".to_string());
            }
        }

        let is_set = |key: &str| cli_args.get(key).map(|v| v != "false").unwrap_or(false);

        let mode = if is_set("version") {
            Mode::Version
        } else if is_set("serve") {
            Mode::Serve
        } else {
            match cli_args.get("event") {
                Some(path) if path != "-" => Mode::Once(EventSource::File(PathBuf::from(path))),
                _ => Mode::Once(EventSource::Stdin),
            }
        };

        Self {
            mode,
            config: cli_args.get("config").map(PathBuf::from),
            allow_shell: is_set("allow-shell"),
            json_logs: is_set("json-logs"),
        }
    }
}
