use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::api::{self, AppState};
use super::pipeline::PreviewPipeline;
use super::registry::PreviewRegistry;
use crate::preview_config::PreviewConfig;

/// Configuration for the preview HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allow cross-origin requests from the browser UI.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            cors: true,
        }
    }
}

impl ServerConfig {
    /// Apply the `PORT` override read through `lookup`. Unparseable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!(value = %port, "ignoring invalid PORT"),
            }
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>, cors: bool) -> Router {
    let app = api::api_router().with_state(state);
    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Start the preview server and run until Ctrl-C.
pub async fn start_server(config: ServerConfig, preview: PreviewConfig) -> Result<()> {
    tokio::fs::create_dir_all(&preview.workspace_root)
        .await
        .with_context(|| {
            format!(
                "Failed to create workspace root {}",
                preview.workspace_root.display()
            )
        })?;

    let registry = Arc::new(PreviewRegistry::new());
    let pipeline = PreviewPipeline::new(preview.clone(), registry);
    let app = build_router(Arc::new(AppState::new(pipeline)), config.cors);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (is the port already in use?)", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        workspace_root = %preview.workspace_root.display(),
        docker = %preview.docker_cmd,
        "preview server listening"
    );
    println!("Preview server running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::runtime::tests::FakeRuntime;
    use crate::preview::source::tests::FakeFetcher;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_router(cors: bool) -> Router {
        let pipeline = PreviewPipeline::with_parts(
            PreviewConfig::default(),
            Arc::new(PreviewRegistry::new()),
            Arc::new(FakeFetcher::succeeding(&[])),
            Arc::new(FakeRuntime::new(1)),
        );
        build_router(Arc::new(AppState::new(pipeline)), cors)
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let app = test_router(false);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_routes_mounted() {
        let app = test_router(false);
        let req = Request::builder()
            .uri("/api/previews")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = test_router(false);
        let req = Request::builder()
            .uri("/api/nothing")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_headers_when_enabled() {
        let app = test_router(true);
        let req = Request::builder()
            .uri("/health")
            .header("origin", "http://localhost:5173")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.headers().contains_key("access-control-allow-origin"));
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 4000);
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.cors);
        assert_eq!(config.addr(), "127.0.0.1:4000");
    }

    #[test]
    fn test_port_env_override() {
        let mut config = ServerConfig::default();
        config.apply_env(|key| (key == "PORT").then(|| "8081".to_string()));
        assert_eq!(config.port, 8081);

        config.apply_env(|_| Some("not-a-port".to_string()));
        assert_eq!(config.port, 8081);
    }
}
