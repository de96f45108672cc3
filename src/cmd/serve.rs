//! Preview HTTP server command: `commit-preview serve`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use commit_preview::preview::server::{self, ServerConfig};
use commit_preview::preview_config::PreviewConfig;

/// CLI flags for `serve`; each one overrides file and environment settings.
pub struct ServeArgs {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub workspace_root: Option<PathBuf>,
    pub cors: bool,
}

pub async fn cmd_serve(project_dir: &Path, args: ServeArgs) -> Result<()> {
    let mut preview = PreviewConfig::load(project_dir)?;
    if let Some(root) = args.workspace_root {
        preview.workspace_root = root;
    }
    if preview.workspace_root.is_relative() {
        preview.workspace_root = project_dir.join(&preview.workspace_root);
    }

    let mut config = ServerConfig {
        cors: args.cors,
        ..Default::default()
    };
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }

    server::start_server(config, preview).await
}
