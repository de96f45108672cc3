//! Configuration for the preview orchestrator.
//!
//! Values are layered: built-in defaults, then the `[preview]` section of
//! `preview.toml`, then environment variables, then CLI flags (applied by the
//! caller on the returned struct).
//!
//! ```toml
//! [preview]
//! workspace_root = ".preview/workspaces"
//! git_base_url = "https://github.com"
//! git_cmd = "git"
//! docker_cmd = "docker"
//! base_image = "node:18-alpine"
//! app_port = 3000
//! public_host = "localhost"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::preview::recipe::RecipeOptions;

pub const CONFIG_FILE: &str = "preview.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewConfig {
    pub workspace_root: PathBuf,
    pub git_base_url: String,
    pub git_cmd: String,
    pub docker_cmd: String,
    pub base_image: String,
    pub app_port: u16,
    pub public_host: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from(".preview/workspaces"),
            git_base_url: "https://github.com".to_string(),
            git_cmd: "git".to_string(),
            docker_cmd: "docker".to_string(),
            base_image: "node:18-alpine".to_string(),
            app_port: 3000,
            public_host: "localhost".to_string(),
        }
    }
}

/// Raw TOML structure for `preview.toml`
#[derive(Debug, Deserialize)]
struct PreviewToml {
    preview: Option<PreviewSection>,
}

#[derive(Debug, Deserialize)]
struct PreviewSection {
    workspace_root: Option<PathBuf>,
    git_base_url: Option<String>,
    git_cmd: Option<String>,
    docker_cmd: Option<String>,
    base_image: Option<String>,
    app_port: Option<u16>,
    public_host: Option<String>,
}

impl PreviewConfig {
    /// Load `preview.toml` from `dir`, then apply environment overrides.
    /// Returns defaults (plus overrides) if the file doesn't exist.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(dir)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let toml: PreviewToml = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let mut config = Self::default();
        if let Some(section) = toml.preview {
            if let Some(workspace_root) = section.workspace_root {
                config.workspace_root = workspace_root;
            }
            if let Some(git_base_url) = section.git_base_url {
                config.git_base_url = git_base_url;
            }
            if let Some(git_cmd) = section.git_cmd {
                config.git_cmd = git_cmd;
            }
            if let Some(docker_cmd) = section.docker_cmd {
                config.docker_cmd = docker_cmd;
            }
            if let Some(base_image) = section.base_image {
                config.base_image = base_image;
            }
            if let Some(app_port) = section.app_port {
                config.app_port = app_port;
            }
            if let Some(public_host) = section.public_host {
                config.public_host = public_host;
            }
        }
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("PREVIEW_WORKSPACE_ROOT") {
            self.workspace_root = PathBuf::from(root);
        }
        if let Some(url) = lookup("PREVIEW_GIT_BASE_URL") {
            self.git_base_url = url;
        }
        if let Some(cmd) = lookup("GIT_CMD") {
            self.git_cmd = cmd;
        }
        if let Some(cmd) = lookup("DOCKER_CMD") {
            self.docker_cmd = cmd;
        }
        if let Some(host) = lookup("PREVIEW_PUBLIC_HOST") {
            self.public_host = host;
        }
    }

    pub fn recipe_options(&self) -> RecipeOptions {
        RecipeOptions {
            base_image: self.base_image.clone(),
            app_port: self.app_port,
        }
    }

    pub fn preview_url(&self, host_port: u16) -> String {
        format!("http://{}:{}", self.public_host, host_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = PreviewConfig::default();
        assert_eq!(config.workspace_root, PathBuf::from(".preview/workspaces"));
        assert_eq!(config.git_base_url, "https://github.com");
        assert_eq!(config.docker_cmd, "docker");
        assert_eq!(config.app_port, 3000);
        assert_eq!(config.preview_url(49153), "http://localhost:49153");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = PreviewConfig::load_file(dir.path()).unwrap();
        assert_eq!(config, PreviewConfig::default());
    }

    #[test]
    fn test_load_partial() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[preview]
docker_cmd = "podman"
app_port = 8080
"#,
        )
        .unwrap();

        let config = PreviewConfig::load_file(dir.path()).unwrap();
        assert_eq!(config.docker_cmd, "podman");
        assert_eq!(config.app_port, 8080);
        assert_eq!(config.git_cmd, "git"); // default
        assert_eq!(config.base_image, "node:18-alpine"); // default
        assert_eq!(config.recipe_options().app_port, 8080);
    }

    #[test]
    fn test_load_empty_section() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[preview]\n").unwrap();
        let config = PreviewConfig::load_file(dir.path()).unwrap();
        assert_eq!(config, PreviewConfig::default());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "not valid toml {{{{").unwrap();
        assert!(PreviewConfig::load_file(dir.path()).is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("PREVIEW_WORKSPACE_ROOT", "/var/previews"),
            ("DOCKER_CMD", "/usr/local/bin/docker"),
            ("PREVIEW_PUBLIC_HOST", "preview.internal"),
        ]
        .into_iter()
        .collect();

        let mut config = PreviewConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.workspace_root, PathBuf::from("/var/previews"));
        assert_eq!(config.docker_cmd, "/usr/local/bin/docker");
        assert_eq!(config.git_cmd, "git");
        assert_eq!(config.preview_url(1), "http://preview.internal:1");
    }
}
