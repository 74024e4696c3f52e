use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::api::handlers::{event_handler, health_handler, root_handler};
use crate::config::Config;
use crate::hub::HubSettings;
use crate::matchmaker;
use crate::state::AppState;
use crate::websocket::handler::ws_handler;

pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Server {
            state: Arc::new(AppState::new(config)),
        }
    }

    /// Same as `new` with non-default hub timings. Used by tests to
    /// shrink eviction thresholds.
    pub fn with_settings(config: Config, settings: HubSettings) -> Self {
        Server {
            state: Arc::new(AppState::with_settings(config, settings)),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/event", post(event_handler))
            .route("/static-event", post(event_handler))
            .fallback(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(serde_json::json!({ "error": "NOT_FOUND" })),
                )
            })
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.state.config.bind_addr();
        if self.state.config.https {
            warn!(
                cert = ?self.state.config.cert_file,
                key = ?self.state.config.key_file,
                "SERVICE_HTTPS is set but TLS termination is delegated to the deployment, serving plain HTTP"
            );
        }
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(
            service = %self.state.config.service_name,
            version = %self.state.config.version,
            %addr,
            "listening"
        );
        self.run_with_listener(listener).await
    }

    /// Serve on an already-bound listener. Spawns the cleaner and one
    /// matchmaker per pool before accepting connections.
    pub async fn run_with_listener(
        self,
        listener: tokio::net::TcpListener,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.state.hub.spawn_cleaner();
        matchmaker::spawn_matchmakers(&self.state.hub);

        let app = self.router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received, draining connections"),
        Err(err) => {
            warn!(error = %err, "failed to install shutdown handler");
            std::future::pending::<()>().await;
        }
    }
}
