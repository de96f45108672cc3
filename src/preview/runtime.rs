use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;

use crate::errors::PreviewError;

/// How many trailing lines of a failed command's output are kept in errors.
const OUTPUT_TAIL_LINES: usize = 20;

/// Container runtime operations used by the preview pipeline.
/// Real implementation: `DockerCli`. Test double: `FakeRuntime`.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Build an image tagged `tag` from the recipe in `context`.
    async fn build_image(&self, tag: &str, context: &Path) -> Result<(), PreviewError>;

    /// Start a detached container named `name`, publishing `container_port`
    /// on a host port picked by the runtime. Returns the container id.
    async fn run_detached(
        &self,
        name: &str,
        image: &str,
        container_port: u16,
    ) -> Result<String, PreviewError>;

    /// Host port bound to `container_port` of container `name`.
    async fn published_port(&self, name: &str, container_port: u16) -> Result<u16, PreviewError>;

    /// Force-remove container `name`. Returns `Ok(false)` if it did not exist.
    async fn remove_container(&self, name: &str) -> Result<bool, PreviewError>;

    /// Force-remove image `tag`. Returns `Ok(false)` if it did not exist.
    async fn remove_image(&self, tag: &str) -> Result<bool, PreviewError>;
}

/// Keep the last `n` lines of `text`.
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Parse `docker port` output such as `0.0.0.0:49153\n[::]:49153`.
pub fn parse_port(output: &str) -> Option<u16> {
    output
        .lines()
        .filter_map(|line| line.trim().rsplit(':').next())
        .find_map(|port| port.trim().parse::<u16>().ok())
}

struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// Drives the `docker` CLI (or any CLI-compatible runtime such as `podman`).
pub struct DockerCli {
    docker_cmd: String,
}

impl DockerCli {
    pub fn new(docker_cmd: impl Into<String>) -> Self {
        Self {
            docker_cmd: docker_cmd.into(),
        }
    }

    async fn docker(&self, args: &[&str]) -> Result<CommandOutput, PreviewError> {
        tracing::debug!(cmd = %self.docker_cmd, ?args, "running container runtime");
        let output = tokio::process::Command::new(&self.docker_cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                PreviewError::Runtime(format!("Failed to run {}: {}", self.docker_cmd, e))
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn build_image(&self, tag: &str, context: &Path) -> Result<(), PreviewError> {
        let context = context.to_string_lossy();
        let output = self.docker(&["build", "-t", tag, &context]).await?;
        if !output.success {
            return Err(PreviewError::Build(format!(
                "image build for {} failed:\n{}",
                tag,
                tail_lines(&output.stderr, OUTPUT_TAIL_LINES)
            )));
        }
        Ok(())
    }

    async fn run_detached(
        &self,
        name: &str,
        image: &str,
        container_port: u16,
    ) -> Result<String, PreviewError> {
        let publish = container_port.to_string();
        let output = self
            .docker(&["run", "-d", "--name", name, "-p", &publish, image])
            .await?;
        if !output.success {
            return Err(PreviewError::Runtime(format!(
                "failed to start container {}: {}",
                name,
                tail_lines(&output.stderr, OUTPUT_TAIL_LINES)
            )));
        }
        Ok(output.stdout.trim().to_string())
    }

    async fn published_port(&self, name: &str, container_port: u16) -> Result<u16, PreviewError> {
        let spec = format!("{}/tcp", container_port);
        let output = self.docker(&["port", name, &spec]).await?;
        if !output.success {
            return Err(PreviewError::Runtime(format!(
                "failed to query port {} of {}: {}",
                spec,
                name,
                output.stderr.trim()
            )));
        }
        parse_port(&output.stdout).ok_or_else(|| {
            PreviewError::Runtime(format!(
                "no host port published for {} of {}: {:?}",
                spec,
                name,
                output.stdout.trim()
            ))
        })
    }

    async fn remove_container(&self, name: &str) -> Result<bool, PreviewError> {
        let output = self.docker(&["rm", "-f", name]).await?;
        if output.success {
            return Ok(!output.stdout.trim().is_empty());
        }
        if output.stderr.to_lowercase().contains("no such container") {
            return Ok(false);
        }
        Err(PreviewError::Teardown {
            container: name.to_string(),
            message: output.stderr.trim().to_string(),
        })
    }

    async fn remove_image(&self, tag: &str) -> Result<bool, PreviewError> {
        let output = self.docker(&["rmi", "-f", tag]).await?;
        if output.success {
            return Ok(true);
        }
        if output.stderr.to_lowercase().contains("no such image") {
            return Ok(false);
        }
        Err(PreviewError::Runtime(format!(
            "failed to remove image {}: {}",
            tag,
            output.stderr.trim()
        )))
    }
}
