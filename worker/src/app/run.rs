//! Worker run modes

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use crate::app::options::EventSource;
use crate::app::settings::Settings;
use crate::deploy::orchestrator::Orchestrator;
use crate::errors::WorkerError;
use crate::models::outcome::DeploymentOutcome;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Handle a single event read from `source`.
///
/// Unreadable or malformed input is reported as a FAILED outcome like any
/// other deployment error.
pub async fn run_once(orchestrator: &Orchestrator, source: &EventSource) -> DeploymentOutcome {
    match read_event(source).await {
        Ok(event) => orchestrator.handle(event).await,
        Err(e) => {
            error!("Unable to read deployment event: {}", e);
            DeploymentOutcome::failed(e.to_string())
        }
    }
}

async fn read_event(source: &EventSource) -> Result<Value, WorkerError> {
    let contents = match source {
        EventSource::File(path) => {
            info!("Reading deployment event from {}", path.display());
            tokio::fs::read_to_string(path).await?
        }
        EventSource::Stdin => {
            let mut contents = String::new();
            tokio::io::stdin().read_to_string(&mut contents).await?;
            contents
        }
    };
    Ok(serde_json::from_str(&contents)?)
}

/// Serve deployments over HTTP until `shutdown_signal` resolves
pub async fn run_server(
    settings: &Settings,
    orchestrator: Orchestrator,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), WorkerError> {
    let state = Arc::new(ServerState::new(orchestrator));
    let handle = serve(&settings.server, state.clone(), shutdown_signal).await?;

    handle
        .await
        .map_err(|e| WorkerError::ServerError(e.to_string()))??;

    info!(
        "Server stopped after {} invocations",
        state.invocations()
    );
    Ok(())
}
