//! Main server integration for busrelay

use crate::batch::MessageBatcher;
use crate::bus::create_bus_factory;
use crate::models::Configuration;
use crate::service::RelayService;
use crate::store::create_config_store;
use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// HTTP front for a `RelayService`
pub struct RelayServer {
    host: String,
    port: u16,
    max_request_size: u64,
    service: Arc<RelayService>,
}

impl RelayServer {
    /// Create a server around an existing service
    pub fn new(host: String, port: u16, max_request_size: u64, service: Arc<RelayService>) -> Self {
        Self {
            host,
            port,
            max_request_size,
            service,
        }
    }

    /// Build the store, bus factory and service described by the configuration
    pub fn from_config(config: &Configuration) -> Result<Self> {
        if let Err(errors) = config.validate() {
            anyhow::bail!("Invalid configuration: {}", errors.join("; "));
        }

        let store =
            create_config_store(&config.store).context("Failed to open connector config store")?;
        let bus = create_bus_factory(&config.transport)
            .context("Failed to create message bus client factory")?;
        let batcher = MessageBatcher::new(config.transport.max_batch_size_bytes);
        let service = Arc::new(RelayService::new(store, bus, batcher));

        Ok(Self::new(
            config.server_host.clone(),
            config.server_port,
            config.max_request_size,
            service,
        ))
    }

    pub fn service(&self) -> Arc<RelayService> {
        Arc::clone(&self.service)
    }

    /// Bind the listener; the returned future serves until `shutdown` resolves
    pub fn bind(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(SocketAddr, impl Future<Output = ()> + 'static)> {
        let address: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .context("Invalid server address")?;

        let routes = crate::server::api::create_api_routes(self.service, self.max_request_size);
        warp::serve(routes)
            .try_bind_with_graceful_shutdown(address, shutdown)
            .context(format!("Failed to bind to {}", address))
    }

    /// Start the server and run until Ctrl+C
    pub async fn start(self) -> Result<()> {
        let (address, server) = self.bind(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })?;

        tracing::info!(%address, "busrelay server listening");
        server.await;
        tracing::info!("busrelay server stopped");

        Ok(())
    }
}
