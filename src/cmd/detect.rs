//! Project detection command: `commit-preview detect`.

use std::path::Path;

use anyhow::{Context, Result};

use commit_preview::preview::detector;
use commit_preview::preview::recipe::{self, RECIPE_FILE};
use commit_preview::preview_config::PreviewConfig;

pub fn cmd_detect(project_dir: &Path, dir: &Path) -> Result<()> {
    let config = PreviewConfig::load(project_dir)?;
    let detection = detector::detect(dir)
        .with_context(|| format!("Failed to detect project in {}", dir.display()))?;

    println!("Project type: {}", detection.project_type);
    println!(
        "App directory: {}",
        detection.app_dir.as_deref().unwrap_or(".")
    );
    match &detection.manifest {
        Some(manifest) => println!("Manifest: {}", manifest.display()),
        None => println!("Manifest: (none)"),
    }

    let existing = dir.join(RECIPE_FILE);
    println!();
    if existing.is_file() {
        println!("Using existing {}:", existing.display());
        let content = std::fs::read_to_string(&existing)
            .with_context(|| format!("Failed to read {}", existing.display()))?;
        print!("{}", content);
    } else {
        println!("Would generate {}:", RECIPE_FILE);
        print!("{}", recipe::render(&detection, &config.recipe_options()));
    }
    Ok(())
}
