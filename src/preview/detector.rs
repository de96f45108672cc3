//! Project type detection.
//!
//! Looks for a `package.json` at the workspace root, then in each immediate
//! subdirectory (sorted by name, dot-directories and `node_modules` skipped),
//! and classifies the first one found by its `build` script.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::models::ProjectType;
use crate::errors::PreviewError;

pub const MANIFEST_FILE: &str = "package.json";

static BUILD_SIGNATURES: LazyLock<Vec<(Regex, ProjectType)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"\bnext\s+build\b").unwrap(), ProjectType::NextJs),
        (
            Regex::new(r"\bvite(?:\s+build)?(?:\s|$)").unwrap(),
            ProjectType::Vite,
        ),
        (Regex::new(r"\bnest\s+build\b").unwrap(), ProjectType::NestJs),
        (
            Regex::new(r"\breact-scripts\s+build\b").unwrap(),
            ProjectType::ReactCra,
        ),
    ]
});

#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    scripts: BTreeMap<String, serde_json::Value>,
}

/// Outcome of inspecting a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub project_type: ProjectType,
    /// Subdirectory holding the app, relative to the workspace root.
    /// `None` when the app lives at the root.
    pub app_dir: Option<String>,
    pub manifest: Option<PathBuf>,
}

/// Classify the web application in `workspace`.
pub fn detect(workspace: &Path) -> Result<Detection, PreviewError> {
    let Some((app_dir, manifest)) = find_manifest(workspace)? else {
        return Ok(Detection {
            project_type: ProjectType::GenericNode,
            app_dir: None,
            manifest: None,
        });
    };

    let content = std::fs::read_to_string(&manifest).map_err(|e| {
        PreviewError::Detection(format!("Failed to read {}: {}", manifest.display(), e))
    })?;
    let project_type = classify(&content).map_err(|e| match e {
        PreviewError::Detection(msg) => {
            PreviewError::Detection(format!("{}: {}", manifest.display(), msg))
        }
        other => other,
    })?;

    Ok(Detection {
        project_type,
        app_dir,
        manifest: Some(manifest),
    })
}

/// Locate the manifest: root first, then the first immediate subdirectory
/// that has one.
pub fn find_manifest(workspace: &Path) -> Result<Option<(Option<String>, PathBuf)>, PreviewError> {
    let root_manifest = workspace.join(MANIFEST_FILE);
    if root_manifest.is_file() {
        return Ok(Some((None, root_manifest)));
    }

    let entries = std::fs::read_dir(workspace).map_err(|e| {
        PreviewError::Detection(format!("Failed to list {}: {}", workspace.display(), e))
    })?;

    let mut subdirs: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| !name.starts_with('.') && name != "node_modules")
        .collect();
    subdirs.sort();

    for name in subdirs {
        let candidate = workspace.join(&name).join(MANIFEST_FILE);
        if candidate.is_file() {
            return Ok(Some((Some(name), candidate)));
        }
    }
    Ok(None)
}

/// Classify manifest contents by the `build` script. Unrecognized or absent
/// build scripts fall back to `generic-node`.
pub fn classify(manifest: &str) -> Result<ProjectType, PreviewError> {
    let parsed: PackageManifest = serde_json::from_str(manifest)
        .map_err(|e| PreviewError::Detection(format!("invalid manifest: {}", e)))?;

    let Some(build) = parsed.scripts.get("build").and_then(|v| v.as_str()) else {
        return Ok(ProjectType::GenericNode);
    };

    Ok(BUILD_SIGNATURES
        .iter()
        .find(|(pattern, _)| pattern.is_match(build))
        .map(|(_, project_type)| *project_type)
        .unwrap_or(ProjectType::GenericNode))
}
