//! Typed error hierarchy for the preview orchestrator.
//!
//! `PreviewError` covers every failure a preview request can hit, from
//! request validation through container teardown. Pipeline stages convert
//! their failures into the session's terminal `error` status; validation and
//! not-found errors are surfaced synchronously to the HTTP caller.

use thiserror::Error;

use crate::preview::models::PreviewStatus;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Preview {id} not found")]
    NotFound { id: String },

    #[error("Failed to fetch reference '{reference}': {message}")]
    Acquisition { reference: String, message: String },

    #[error("Project detection failed: {0}")]
    Detection(String),

    #[error("Build failed: {0}")]
    Build(String),

    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error("Failed to remove container {container}: {message}")]
    Teardown { container: String, message: String },

    #[error("Workspace error at {path}: {source}")]
    Workspace {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: PreviewStatus,
        to: PreviewStatus,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PreviewError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// True for errors the HTTP boundary reports synchronously rather than
    /// through the session status.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_id() {
        let err = PreviewError::not_found("octocat_hello-world_main");
        match &err {
            PreviewError::NotFound { id } => assert_eq!(id, "octocat_hello-world_main"),
            _ => panic!("Expected NotFound"),
        }
        assert!(err.to_string().contains("octocat_hello-world_main"));
    }

    #[test]
    fn acquisition_error_mentions_reference() {
        let err = PreviewError::Acquisition {
            reference: "v9.9.9".into(),
            message: "pathspec did not match".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("v9.9.9"));
        assert!(msg.contains("pathspec"));
    }

    #[test]
    fn workspace_error_carries_path_and_source() {
        let path = std::path::PathBuf::from("/tmp/ws");
        let err = PreviewError::Workspace {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        match &err {
            PreviewError::Workspace { path: p, source } => {
                assert_eq!(p, &path);
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected Workspace"),
        }
    }

    #[test]
    fn client_errors_are_classified() {
        assert!(PreviewError::Validation("owner required".into()).is_client_error());
        assert!(PreviewError::not_found("x").is_client_error());
        assert!(!PreviewError::Runtime("daemon down".into()).is_client_error());
        assert!(
            !PreviewError::Teardown {
                container: "preview-x".into(),
                message: "boom".into()
            }
            .is_client_error()
        );
    }

    #[test]
    fn converts_from_anyhow() {
        let err: PreviewError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, PreviewError::Other(_)));
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn implements_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&PreviewError::Build("exit 1".into()));
    }
}
