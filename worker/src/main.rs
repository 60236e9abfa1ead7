//! Deployment Worker - Entry Point
//!
//! Receives a deployment event, unpacks its payload into a temporary
//! directory and runs the requested entrypoint.

use std::env;
use std::process::ExitCode;

use deployworker::app::options::{CliOptions, Mode};
use deployworker::app::run::{run_once, run_server};
use deployworker::app::settings::Settings;
use deployworker::deploy::orchestrator::Orchestrator;
use deployworker::logs::{init_logging, LogOptions};
use deployworker::utils::version_info;

use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let options = CliOptions::parse(env::args());

    // Print version and exit
    if options.mode == Mode::Version {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render version info: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let mut settings = match &options.config {
        Some(path) => match Settings::load(path).await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to load settings: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Settings::default(),
    };
    if options.allow_shell {
        settings.allow_shell_commands = true;
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.json_logs || options.json_logs,
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if settings.allow_shell_commands {
        warn!("Shell command entrypoints are enabled; deployments can run arbitrary commands");
    }

    let orchestrator = Orchestrator::from_settings(&settings);

    match &options.mode {
        Mode::Serve => {
            info!("Running deployment worker with settings: {:?}", settings);
            if let Err(e) = run_server(&settings, orchestrator, await_shutdown_signal()).await {
                error!("Failed to run the server: {e}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Mode::Once(source) => {
            let outcome = run_once(&orchestrator, source).await;
            match serde_json::to_string_pretty(&outcome) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    error!("Failed to render outcome: {e}");
                    return ExitCode::FAILURE;
                }
            }
            if outcome.is_completed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Mode::Version => ExitCode::SUCCESS,
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
