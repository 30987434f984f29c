// ============================================================================
// SERVER
// ============================================================================
// Composition root: owns the store, binds the listener, serves the router and
// drains in-flight requests on SIGINT/SIGTERM within the configured timeout.
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::api::{create_router, AppState};
use crate::config::SensoriumConfig;
use crate::constants::ENGINE_VERSION;
use crate::error::{ConfigError, SensoriumError, SensoriumResult};

pub struct Server {
    config: SensoriumConfig,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
}

impl Server {
    pub fn new(config: SensoriumConfig) -> SensoriumResult<Self> {
        config.validate()?;
        let state = Arc::new(AppState::from_config(&config)?);

        Ok(Self {
            config,
            state,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    pub fn router(&self) -> Router {
        create_router(self.state(), self.config.server.cors_enabled)
    }

    /// Ask a running server to stop accepting connections.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Serve until a shutdown signal arrives.
    pub async fn run(&self) -> SensoriumResult<()> {
        let addr: SocketAddr = self.config.server.address.parse().map_err(|e| {
            ConfigError::invalid_value("server.address", format!("'{}': {}", self.config.server.address, e))
        })?;

        let listener = TcpListener::bind(addr).await?;
        info!(
            target: "sensorium::server",
            version = ENGINE_VERSION,
            address = %addr,
            metrics = self.state.store.metric_count(),
            raw_capacity = self.state.store.settings().raw_capacity.get(),
            "Listening"
        );

        let notify = Arc::clone(&self.shutdown);
        let serve = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { notify.notified().await });
        let mut serve_task = tokio::spawn(async move { serve.await });

        tokio::select! {
            joined = &mut serve_task => return flatten(joined),
            _ = shutdown_signal() => {}
            _ = self.shutdown.notified() => {}
        }

        info!(target: "sensorium::server", "Starting graceful shutdown");
        // Wakes the graceful-shutdown future, or leaves a permit for it
        self.shutdown.notify_one();

        let started = Instant::now();
        let grace = Duration::from_secs(self.config.server.shutdown_timeout_secs);

        match tokio::time::timeout(grace, &mut serve_task).await {
            Ok(joined) => {
                flatten(joined)?;
                info!(
                    target: "sensorium::server",
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Server shutdown complete"
                );
            }
            Err(_) => {
                warn!(
                    target: "sensorium::server",
                    timeout_secs = grace.as_secs(),
                    "In-flight requests did not drain in time, aborting"
                );
                serve_task.abort();
            }
        }

        Ok(())
    }
}

fn flatten(joined: Result<std::io::Result<()>, tokio::task::JoinError>) -> SensoriumResult<()> {
    match joined {
        Ok(result) => result.map_err(SensoriumError::from),
        Err(e) => Err(SensoriumError::Internal(format!("Server task failed: {}", e))),
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(target: "sensorium::server", error = %e, "Failed to install Ctrl-C handler");
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
                warn!(target: "sensorium::server", error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(target: "sensorium::server", "Received SIGINT"),
        _ = terminate => info!(target: "sensorium::server", "Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_stops_on_request() {
        let mut config = SensoriumConfig::default();
        config.server.address = "127.0.0.1:0".into();
        config.server.shutdown_timeout_secs = 1;

        let server = Arc::new(Server::new(config).unwrap());
        let running = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        server.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(5), running).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = SensoriumConfig::default();
        config.storage.metrics.clear();
        assert!(matches!(Server::new(config), Err(SensoriumError::Config(_))));
    }
}
