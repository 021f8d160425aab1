//! Service assembly and the server loop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{ConfigError, ServiceConfig};
use crate::engine::{KernelConverter, MeshConverter};
use crate::reaper;
use crate::routes::{self, AppState};
use crate::store::ArtifactStore;

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The conversion service: validated config, scratch store and converter.
pub struct ConversionService {
    config: ServiceConfig,
    state: AppState,
}

impl ConversionService {
    /// Create the service with the bundled kernel.
    pub fn new(config: ServiceConfig) -> Result<Self, StartupError> {
        Self::with_converter(config, Arc::new(KernelConverter))
    }

    /// Create the service around any converter.
    pub fn with_converter(
        config: ServiceConfig,
        converter: Arc<dyn MeshConverter>,
    ) -> Result<Self, StartupError> {
        config.validate()?;
        let params = config.tessellation_params()?;
        let store = ArtifactStore::from_config(&config.storage)?;

        let state = AppState {
            store: Arc::new(store),
            converter,
            params,
            conversion_timeout: config.conversion.timeout(),
            max_upload_bytes: config.storage.max_upload_bytes,
        };
        Ok(Self { config, state })
    }

    /// The active configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The scratch store.
    pub fn store(&self) -> &ArtifactStore {
        &self.state.store
    }

    /// The HTTP router.
    pub fn router(&self) -> Router {
        routes::router(self.state.clone(), &self.config)
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn start(self) -> Result<(), StartupError> {
        let listener = TcpListener::bind(self.config.http_addr()).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until Ctrl-C.
    pub async fn serve(self, listener: TcpListener) -> Result<(), StartupError> {
        let addr: SocketAddr = listener.local_addr()?;
        let reaper = reaper::spawn(self.store().clone(), &self.config.reaper);

        info!(
            addr = %addr,
            scratch_dir = %self.store().root().display(),
            linear_tolerance = self.state.params.linear_tolerance,
            angular_tolerance = self.state.params.angular_tolerance,
            "Starting HTTP server"
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(handle) = reaper {
            handle.abort();
        }
        info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.storage.scratch_dir = dir.path().join("scratch");
        config.conversion.timeout_secs = 0;
        assert!(matches!(
            ConversionService::new(config),
            Err(StartupError::Config(_))
        ));
    }

    #[test]
    fn test_creates_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.storage.scratch_dir = dir.path().join("a").join("b");
        let service = ConversionService::new(config).unwrap();
        assert!(service.store().root().is_dir());
        assert_eq!(service.config().http.port, 5000);
    }
}
