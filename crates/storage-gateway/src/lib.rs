//! HTTP gateway for Azure Storage writes.
//!
//! Each endpoint reads a few query parameters, makes sure the target queue,
//! table, container or share exists, performs one write against it and
//! answers with a plain-text acknowledgement. The crate can be used as a
//! standalone binary or its router embedded in another application.

pub mod backend;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod request;
pub mod routes;

use std::sync::Arc;

pub use backend::{AzureAccount, MemoryAccount, StorageAccount};
pub use config::GatewayConfig;
pub use endpoint::StorageGatewayEndpoint;
pub use error::GatewayError;
pub use request::{BackendKind, WriteRequest, WriteResult};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState<A> {
    /// Write pipeline bound to the storage account
    pub endpoint: StorageGatewayEndpoint<A>,
    /// Configuration
    pub config: Arc<GatewayConfig>,
}

impl<A: StorageAccount> AppState<A> {
    /// Create a new AppState with the given account and default config.
    pub fn new(account: A) -> Self {
        Self::with_config(account, GatewayConfig::default())
    }

    /// Create a new AppState with the given account and config.
    pub fn with_config(account: A, config: GatewayConfig) -> Self {
        Self {
            endpoint: StorageGatewayEndpoint::new(account),
            config: Arc::new(config),
        }
    }
}
