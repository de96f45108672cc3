use std::sync::Arc;

use super::detector::{self, Detection};
use super::models::{
    ContainerHandle, PreviewId, PreviewRequest, PreviewStatus, SessionUpdate, ValidatedRequest,
};
use super::recipe::{self, RecipeOutcome};
use super::registry::{PreviewRegistry, SessionTicket};
use super::runtime::{ContainerRuntime, DockerCli};
use super::source::{self, GitSource, SourceFetcher};
use super::workspace::WorkspaceManager;
use crate::errors::PreviewError;
use crate::preview_config::PreviewConfig;

/// How a pipeline run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunOutcome {
    Ready(String),
    /// A newer request (or a teardown) replaced this run's session.
    Superseded,
}

/// What a teardown removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub container_removed: bool,
    pub image_removed: bool,
    pub workspace_removed: bool,
    pub session_removed: bool,
}

/// Sequences clone → detect → synthesize → build → run → resolve URL for
/// each preview request, one background task per request.
///
/// Every task writes only its own session, through the `SessionTicket` it
/// received from `PreviewRegistry::create`. There is no concurrency cap and no
/// per-stage timeout: a hung external command stalls only its own session.
#[derive(Clone)]
pub struct PreviewPipeline {
    registry: Arc<PreviewRegistry>,
    workspaces: Arc<WorkspaceManager>,
    source: Arc<dyn SourceFetcher>,
    runtime: Arc<dyn ContainerRuntime>,
    config: Arc<PreviewConfig>,
}

impl PreviewPipeline {
    /// Pipeline backed by the `git` and `docker` CLIs named in `config`.
    pub fn new(config: PreviewConfig, registry: Arc<PreviewRegistry>) -> Self {
        let source = Arc::new(GitSource::new(config.git_cmd.clone()));
        let runtime = Arc::new(DockerCli::new(config.docker_cmd.clone()));
        Self::with_parts(config, registry, source, runtime)
    }

    pub fn with_parts(
        config: PreviewConfig,
        registry: Arc<PreviewRegistry>,
        source: Arc<dyn SourceFetcher>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        let workspaces = Arc::new(WorkspaceManager::new(config.workspace_root.clone()));
        Self {
            registry,
            workspaces,
            source,
            runtime,
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &Arc<PreviewRegistry> {
        &self.registry
    }

    pub fn workspaces(&self) -> &Arc<WorkspaceManager> {
        &self.workspaces
    }

    /// Validate `request`, register a fresh session and start building it in
    /// the background. Returns as soon as the session exists.
    pub async fn submit(&self, request: PreviewRequest) -> Result<PreviewId, PreviewError> {
        let request = request.validate()?;
        let id = request.id();
        let ticket = self.registry.create(id.clone()).await;
        tracing::info!(
            id = %id,
            owner = %request.owner,
            repo = %request.repo,
            commit = %request.commit,
            generation = ticket.generation,
            "preview requested"
        );

        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.run(ticket, request).await;
        });
        Ok(id)
    }

    async fn run(&self, ticket: SessionTicket, request: ValidatedRequest) {
        let workspace_guard = self.workspaces.lock(&ticket.id).await;
        self.run_locked(&ticket, &request).await;
        drop(workspace_guard);
        self.workspaces.release(&ticket.id).await;
    }

    async fn run_locked(&self, ticket: &SessionTicket, request: &ValidatedRequest) {
        let id = &ticket.id;
        if !self.registry.is_current(ticket).await {
            tracing::debug!(id = %id, generation = ticket.generation, "superseded before start");
            return;
        }

        match self.execute(ticket, request).await {
            Ok(RunOutcome::Ready(url)) => {
                tracing::info!(id = %id, url = %url, "preview ready");
            }
            Ok(RunOutcome::Superseded) => {
                tracing::info!(id = %id, generation = ticket.generation, "preview run superseded");
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(id = %id, error = %message, "preview failed");
                let update = SessionUpdate::failed(message.clone()).with_log(message);
                if let Err(e) = self.registry.update_if_current(ticket, update).await {
                    tracing::error!(id = %id, error = %e, "could not record failure");
                }
            }
        }
    }

    /// Write `update` to this run's session. `Ok(false)` means the run has
    /// been superseded and must stop.
    async fn advance(
        &self,
        ticket: &SessionTicket,
        update: SessionUpdate,
    ) -> Result<bool, PreviewError> {
        if let Some(status) = update.status {
            tracing::info!(id = %ticket.id, stage = %status, "stage");
        }
        self.registry.update_if_current(ticket, update).await
    }

    async fn execute(
        &self,
        ticket: &SessionTicket,
        request: &ValidatedRequest,
    ) -> Result<RunOutcome, PreviewError> {
        let id = &ticket.id;
        let handle = ContainerHandle::from(id);

        // cloning
        let started = self
            .advance(
                ticket,
                SessionUpdate::status(PreviewStatus::Cloning).with_log(format!(
                    "fetching {}/{} at {}",
                    request.owner, request.repo, request.commit
                )),
            )
            .await?;
        if !started {
            return Ok(RunOutcome::Superseded);
        }

        let url = source::repo_url(&self.config.git_base_url, &request.owner, &request.repo);
        let acquired = source::acquire(
            self.source.as_ref(),
            &self.workspaces,
            id,
            &url,
            &request.commit,
        )
        .await?;

        // building
        let mut update = SessionUpdate::status(PreviewStatus::Building);
        update.logs = acquired.logs.clone();
        update.commit_sha = acquired.head_sha.clone();
        if !self.advance(ticket, update).await? {
            return Ok(RunOutcome::Superseded);
        }

        let (detection, recipe) = self.prepare_recipe(&acquired.path).await?;
        let mut update = SessionUpdate::log(format!(
            "detected {} project in {}",
            detection.project_type,
            detection.app_dir.as_deref().unwrap_or(".")
        ));
        update.project_type = Some(detection.project_type);
        update.logs.push(match &recipe {
            RecipeOutcome::Existing(_) => "using Dockerfile from repository".to_string(),
            RecipeOutcome::Generated(_) => {
                format!("generated Dockerfile for {}", detection.project_type)
            }
        });
        if !self.advance(ticket, update).await? {
            return Ok(RunOutcome::Superseded);
        }

        self.runtime
            .build_image(&handle.image_tag, &acquired.path)
            .await?;

        // running
        let update = SessionUpdate::status(PreviewStatus::Running)
            .with_log(format!("built image {}", handle.image_tag));
        if !self.advance(ticket, update).await? {
            return Ok(RunOutcome::Superseded);
        }

        if self
            .runtime
            .remove_container(&handle.container_name)
            .await?
        {
            tracing::info!(id = %id, container = %handle.container_name, "replaced stale container");
        }
        let container_id = self
            .runtime
            .run_detached(
                &handle.container_name,
                &handle.image_tag,
                self.config.app_port,
            )
            .await?;
        tracing::debug!(id = %id, container_id = %container_id, "container started");

        // ready
        let host_port = self
            .runtime
            .published_port(&handle.container_name, self.config.app_port)
            .await?;
        let preview_url = self.config.preview_url(host_port);
        let update = SessionUpdate::ready(preview_url.clone()).with_log(format!(
            "container {} listening on {}",
            handle.container_name, preview_url
        ));
        if !self.advance(ticket, update).await? {
            // Torn down or resubmitted while the container was starting.
            if let Err(e) = self.runtime.remove_container(&handle.container_name).await {
                tracing::warn!(id = %id, error = %e, "could not remove superseded container");
            }
            return Ok(RunOutcome::Superseded);
        }
        Ok(RunOutcome::Ready(preview_url))
    }

    /// Detection and recipe synthesis touch the filesystem synchronously.
    async fn prepare_recipe(
        &self,
        workspace: &std::path::Path,
    ) -> Result<(Detection, RecipeOutcome), PreviewError> {
        let workspace = workspace.to_path_buf();
        let options = self.config.recipe_options();
        tokio::task::spawn_blocking(move || -> Result<_, PreviewError> {
            let detection = detector::detect(&workspace)?;
            let recipe = recipe::synthesize(&workspace, &detection, &options)?;
            Ok((detection, recipe))
        })
        .await
        .map_err(|e| PreviewError::Other(anyhow::anyhow!("detection task failed: {}", e)))?
    }

    /// Force-remove the container for `id`. Absence of the container is success.
    pub async fn stop(&self, id: &PreviewId) -> Result<bool, PreviewError> {
        let removed = self.runtime.remove_container(&id.container_name()).await?;
        tracing::info!(id = %id, removed, "preview stopped");
        Ok(removed)
    }

    /// Delete the image `preview:<id>` and the workspace directory, once any
    /// run holding the workspace for `id` has finished.
    /// Returns `(image_removed, workspace_removed)`.
    pub async fn purge(&self, id: &PreviewId) -> Result<(bool, bool), PreviewError> {
        let workspace_guard = self.workspaces.lock(id).await;
        let removed = async {
            let image_removed = self.runtime.remove_image(&id.image_tag()).await?;
            let workspace_removed = self.workspaces.purge(id).await?;
            Ok::<_, PreviewError>((image_removed, workspace_removed))
        }
        .await;
        drop(workspace_guard);
        self.workspaces.release(id).await;
        removed
    }

    /// Drop the registry entry and stop the container. With `purge`, the
    /// image and workspace directory are deleted as well.
    ///
    /// The entry goes first so an in-flight run stops at its next stage
    /// boundary and cleans up any container it started.
    pub async fn teardown(&self, id: &PreviewId, purge: bool) -> Result<TeardownReport, PreviewError> {
        let mut report = TeardownReport {
            session_removed: match self.registry.remove(id).await {
                Ok(_) => true,
                Err(PreviewError::NotFound { .. }) => false,
                Err(e) => return Err(e),
            },
            ..Default::default()
        };

        report.container_removed = self.stop(id).await?;
        if purge {
            (report.image_removed, report.workspace_removed) = self.purge(id).await?;
        }

        tracing::info!(id = %id, ?report, "preview torn down");
        Ok(report)
    }
}
