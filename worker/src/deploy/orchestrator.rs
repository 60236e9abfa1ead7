//! Deployment orchestration: intake, materialization, dispatch

use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::app::settings::Settings;
use crate::deploy::entrypoint::Entrypoint;
use crate::deploy::materialize::materialize;
use crate::deploy::process::ExecutionContext;
use crate::deploy::runner::{RunnerFactory, RunnerOptions};
use crate::errors::WorkerError;
use crate::filesys::workdir::WorkDir;
use crate::models::outcome::DeploymentOutcome;
use crate::models::request::{DeploymentRequest, Payload};
use crate::utils::truncate_chars;

const WORKDIR_PREFIX: &str = "deploy";

/// Turns deployment events into outcomes
#[derive(Debug, Clone)]
pub struct Orchestrator {
    options: RunnerOptions,
    preview_chars: usize,
    workdir_parent: PathBuf,
}

impl Orchestrator {
    /// Create an orchestrator with the given runner options
    pub fn new(options: RunnerOptions) -> Self {
        Self {
            options,
            preview_chars: 200,
            workdir_parent: std::env::temp_dir(),
        }
    }

    /// Create an orchestrator from worker settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.runner_options()).with_preview_chars(settings.preview_chars)
    }

    /// Place working directories under `parent` instead of the temp dir
    pub fn with_workdir_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.workdir_parent = parent.into();
        self
    }

    /// Number of characters echoed back for inline file deployments
    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Handle one deployment event.
    ///
    /// Never fails: every error is logged and reported as a FAILED outcome.
    pub async fn handle(&self, event: Value) -> DeploymentOutcome {
        match self.try_handle(event).await {
            Ok(outcome) => {
                info!("Deployment completed: {}", outcome.message);
                outcome
            }
            Err(e) => {
                error!("Deployment error: {}", e);
                DeploymentOutcome::from_error(&e)
            }
        }
    }

    async fn try_handle(&self, event: Value) -> Result<DeploymentOutcome, WorkerError> {
        let request = DeploymentRequest::from_value(event)?;
        info!(
            "Received deployment request: {:?} (entrypoint: {:?})",
            request.payload, request.entrypoint
        );
        for (key, value) in &request.environment {
            debug!("Env var for entrypoint: {}={}...", key, truncate_chars(value, 10));
        }

        let entrypoint = request
            .entrypoint
            .as_deref()
            .map(Entrypoint::parse)
            .transpose()?;

        let workdir = WorkDir::create_in(&self.workdir_parent, WORKDIR_PREFIX).await?;
        let outcome = self.deploy_in(&workdir, &request, entrypoint).await;
        workdir.remove().await;
        outcome
    }

    async fn deploy_in(
        &self,
        workdir: &WorkDir,
        request: &DeploymentRequest,
        entrypoint: Option<Entrypoint>,
    ) -> Result<DeploymentOutcome, WorkerError> {
        let files = materialize(&request.payload, workdir).await?;
        info!("Materialized files: {:?}", files);

        let Some(entrypoint) = entrypoint else {
            return Ok(self.deployed_outcome(&request.payload, files));
        };

        info!("Executing entrypoint: {} ({})", entrypoint, entrypoint.kind);
        let runner = RunnerFactory::create(&entrypoint, &self.options)?;
        let ctx = ExecutionContext {
            cwd: workdir.files_root().to_path_buf(),
            scratch_dir: workdir.root().to_path_buf(),
            env: request.environment.clone(),
            timeout: self.options.timeout,
        };
        let result = runner.execute(&ctx).await?;
        if let Some(code) = result.returncode().filter(|code| *code != 0) {
            info!("Entrypoint {} exited with code {}", entrypoint, code);
        }

        let mut outcome = DeploymentOutcome::completed(
            format!("Entrypoint {} executed successfully", entrypoint),
            files,
        );
        outcome.entrypoint = Some(entrypoint.raw);
        outcome.result = Some(result);
        Ok(outcome)
    }

    fn deployed_outcome(&self, payload: &Payload, files: Vec<String>) -> DeploymentOutcome {
        match payload {
            Payload::Archive(_) => DeploymentOutcome::completed("Artifact deployed successfully", files),
            Payload::InlineFile { content, filename } => {
                let mut outcome = DeploymentOutcome::completed(
                    format!("File {} deployed successfully", filename),
                    files,
                );
                outcome.filename = Some(filename.clone());
                outcome.content_preview =
                    Some(truncate_chars(content, self.preview_chars).to_string());
                outcome
            }
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(RunnerOptions::default())
    }
}
