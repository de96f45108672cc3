use std::path::{Path, PathBuf};

use super::detector::Detection;
use super::models::ProjectType;
use crate::errors::PreviewError;

pub const RECIPE_FILE: &str = "Dockerfile";

/// Parameters shared by every synthesized recipe.
#[derive(Debug, Clone)]
pub struct RecipeOptions {
    pub base_image: String,
    pub app_port: u16,
}

impl Default for RecipeOptions {
    fn default() -> Self {
        Self {
            base_image: "node:18-alpine".to_string(),
            app_port: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeOutcome {
    /// The source tree already ships a recipe at its root.
    Existing(PathBuf),
    Generated(PathBuf),
}

impl RecipeOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Existing(p) | Self::Generated(p) => p,
        }
    }
}

/// Render the build recipe for `detection`.
///
/// Only the detected app directory is copied into the image: its manifest
/// first so the dependency layer is cached, then the rest of it.
pub fn render(detection: &Detection, options: &RecipeOptions) -> String {
    let (manifests, sources) = match detection.app_dir.as_deref() {
        Some(dir) => (format!("{}/package*.json", dir), format!("{}/", dir)),
        None => ("package*.json".to_string(), ".".to_string()),
    };
    let port = options.app_port;

    let mut recipe = format!(
        "FROM {}\n\
         WORKDIR /app\n\
         COPY {} ./\n\
         RUN npm install --legacy-peer-deps\n\
         COPY {} ./\n",
        options.base_image, manifests, sources
    );

    let serve = match detection.project_type {
        ProjectType::NextJs => format!(
            "RUN npm run build\nENV PORT={port}\nEXPOSE {port}\nCMD [\"npm\", \"start\"]\n"
        ),
        ProjectType::ReactCra | ProjectType::Vite => {
            let out_dir = detection
                .project_type
                .static_output_dir()
                .unwrap_or("dist");
            format!(
                "RUN npm run build\n\
                 RUN npm install -g serve\n\
                 EXPOSE {port}\n\
                 CMD [\"serve\", \"-s\", \"{out_dir}\", \"-l\", \"{port}\"]\n"
            )
        }
        ProjectType::NestJs => format!(
            "RUN npm run build\nENV PORT={port}\nEXPOSE {port}\nCMD [\"node\", \"dist/main.js\"]\n"
        ),
        ProjectType::GenericNode => {
            format!("ENV PORT={port}\nEXPOSE {port}\nCMD [\"npm\", \"start\"]\n")
        }
    };
    recipe.push_str(&serve);
    recipe
}

/// Write a recipe into `workspace` unless one already exists at its root.
pub fn synthesize(
    workspace: &Path,
    detection: &Detection,
    options: &RecipeOptions,
) -> Result<RecipeOutcome, PreviewError> {
    let path = workspace.join(RECIPE_FILE);
    if path.is_file() {
        return Ok(RecipeOutcome::Existing(path));
    }

    std::fs::write(&path, render(detection, options))
        .map_err(|e| PreviewError::Build(format!("Failed to write {}: {}", path.display(), e)))?;
    Ok(RecipeOutcome::Generated(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn detection(project_type: ProjectType, app_dir: Option<&str>) -> Detection {
        Detection {
            project_type,
            app_dir: app_dir.map(str::to_string),
            manifest: None,
        }
    }

    #[test]
    fn test_render_nextjs_runs_own_server() {
        let recipe = render(
            &detection(ProjectType::NextJs, None),
            &RecipeOptions::default(),
        );
        assert!(recipe.starts_with("FROM node:18-alpine\n"));
        assert!(recipe.contains("COPY package*.json ./\n"));
        assert!(recipe.contains("RUN npm install --legacy-peer-deps\n"));
        assert!(recipe.contains("COPY . ./\n"));
        assert!(recipe.contains("RUN npm run build\n"));
        assert!(recipe.contains("EXPOSE 3000\n"));
        assert!(recipe.contains(r#"CMD ["npm", "start"]"#));
        assert!(!recipe.contains("serve"));
    }

    #[test]
    fn test_render_static_types_use_file_server() {
        let cra = render(
            &detection(ProjectType::ReactCra, None),
            &RecipeOptions::default(),
        );
        assert!(cra.contains(r#"CMD ["serve", "-s", "build", "-l", "3000"]"#));

        let vite = render(
            &detection(ProjectType::Vite, None),
            &RecipeOptions::default(),
        );
        assert!(vite.contains("RUN npm install -g serve\n"));
        assert!(vite.contains(r#"CMD ["serve", "-s", "dist", "-l", "3000"]"#));
    }

    #[test]
    fn test_render_nested_app_copies_only_subdirectory() {
        let recipe = render(
            &detection(ProjectType::NestJs, Some("server")),
            &RecipeOptions::default(),
        );
        let manifest_copy = recipe.find("COPY server/package*.json ./").unwrap();
        let install = recipe.find("RUN npm install --legacy-peer-deps").unwrap();
        let source_copy = recipe.find("COPY server/ ./").unwrap();
        assert!(manifest_copy < install && install < source_copy);
        assert!(recipe.contains(r#"CMD ["node", "dist/main.js"]"#));
    }

    #[test]
    fn test_render_exact_layout() {
        let recipe = render(
            &detection(ProjectType::Vite, Some("web")),
            &RecipeOptions::default(),
        );
        assert_eq!(
            recipe,
            "FROM node:18-alpine\n\
             WORKDIR /app\n\
             COPY web/package*.json ./\n\
             RUN npm install --legacy-peer-deps\n\
             COPY web/ ./\n\
             RUN npm run build\n\
             RUN npm install -g serve\n\
             EXPOSE 3000\n\
             CMD [\"serve\", \"-s\", \"dist\", \"-l\", \"3000\"]\n"
        );
    }

    #[test]
    fn test_render_generic_skips_build() {
        let options = RecipeOptions {
            base_image: "node:20-slim".into(),
            app_port: 8080,
        };
        let recipe = render(&detection(ProjectType::GenericNode, None), &options);
        assert!(recipe.starts_with("FROM node:20-slim\n"));
        assert!(!recipe.contains("npm run build"));
        assert!(recipe.contains("ENV PORT=8080\n"));
        assert!(recipe.contains("EXPOSE 8080\n"));
    }

    #[test]
    fn test_synthesize_writes_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = synthesize(
            dir.path(),
            &detection(ProjectType::Vite, None),
            &RecipeOptions::default(),
        )
        .unwrap();
        assert_eq!(outcome, RecipeOutcome::Generated(dir.path().join("Dockerfile")));
        let written = fs::read_to_string(outcome.path()).unwrap();
        assert!(written.contains("serve"));
    }

    #[test]
    fn test_synthesize_keeps_existing_recipe() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        let outcome = synthesize(
            dir.path(),
            &detection(ProjectType::NextJs, None),
            &RecipeOptions::default(),
        )
        .unwrap();
        assert!(matches!(outcome, RecipeOutcome::Existing(_)));
        assert_eq!(
            fs::read_to_string(dir.path().join("Dockerfile")).unwrap(),
            "FROM scratch\n"
        );
    }
}
