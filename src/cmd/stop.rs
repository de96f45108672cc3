//! Container teardown command: `commit-preview stop`.

use std::path::Path;

use anyhow::{Context, Result};

use commit_preview::preview::PreviewId;
use commit_preview::preview::runtime::{ContainerRuntime, DockerCli};
use commit_preview::preview_config::PreviewConfig;

pub async fn cmd_stop(project_dir: &Path, raw_id: &str, purge: bool) -> Result<()> {
    let config = PreviewConfig::load(project_dir)?;
    let id = PreviewId::parse(raw_id)
        .ok()
        .with_context(|| format!("'{}' is not a valid preview id", raw_id))?;
    let runtime = DockerCli::new(config.docker_cmd);

    let name = id.container_name();
    if runtime.remove_container(&name).await? {
        println!("Removed container {}", name);
    } else {
        println!("No container named {}", name);
    }

    if purge {
        let tag = id.image_tag();
        if runtime.remove_image(&tag).await? {
            println!("Removed image {}", tag);
        } else {
            println!("No image tagged {}", tag);
        }
    }
    Ok(())
}
