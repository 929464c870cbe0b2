//! ServerBuilder for fluent API to build HTTP servers

use super::handlers::AppState;
use super::router::build_routes;
use crate::services::ServiceHub;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builder for the REST server over a [`ServiceHub`]
///
/// # Example
///
/// ```ignore
/// let hub = ServiceHub::new(Arc::new(InMemoryStore::new()), &config);
/// ServerBuilder::new(hub)
///     .with_permissive_cors()
///     .serve("127.0.0.1:3000")
///     .await?;
/// ```
pub struct ServerBuilder {
    hub: Arc<ServiceHub>,
    custom_routes: Vec<Router>,
    cors: bool,
}

impl ServerBuilder {
    pub fn new(hub: ServiceHub) -> Self {
        Self {
            hub: Arc::new(hub),
            custom_routes: Vec::new(),
            cors: false,
        }
    }

    /// Add routes that sit outside the generated table
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Allow cross-origin requests from any origin (dashboard dev setups)
    pub fn with_permissive_cors(mut self) -> Self {
        self.cors = true;
        self
    }

    /// Shared hub behind the router
    pub fn hub(&self) -> &Arc<ServiceHub> {
        &self.hub
    }

    /// Build the final router with request tracing
    pub fn build(self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
        };
        let mut app = build_routes(state);
        for custom in self.custom_routes {
            app = app.merge(custom);
        }
        if self.cors {
            app = app.layer(CorsLayer::permissive());
        }
        app.layer(TraceLayer::new_for_http())
    }

    /// Serve the application with graceful shutdown
    ///
    /// Handles SIGTERM and SIGINT (Ctrl+C).
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(%addr, "server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("server shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, shutting down");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        },
    }
}
