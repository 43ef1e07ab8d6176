//! Backend construction and per-run client cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bup_models::{BackendKind, Route, RouteConfig};
use tracing::{debug, info, warn};

use crate::client::BackendClient;
use crate::cos::CosClient;
use crate::error::{StorageError, StorageResult};
use crate::ftp::FtpClient;
use crate::qiniu::QiniuClient;
use crate::s3::S3Client;

/// Factory trait for creating backend clients.
/// Allows dependency injection and testing.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn create(
        &self,
        kind: BackendKind,
        route: &RouteConfig,
    ) -> StorageResult<Arc<dyn BackendClient>>;
}

/// Factory building the real network clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBackendFactory;

#[async_trait]
impl BackendFactory for DefaultBackendFactory {
    async fn create(
        &self,
        kind: BackendKind,
        route: &RouteConfig,
    ) -> StorageResult<Arc<dyn BackendClient>> {
        let client: Arc<dyn BackendClient> = match kind {
            BackendKind::Qiniu => Arc::new(QiniuClient::new(route)?),
            BackendKind::Txcos => Arc::new(CosClient::new(route)?),
            BackendKind::Ftp => Arc::new(FtpClient::connect(route).await?),
            BackendKind::S3 => Arc::new(S3Client::new(route)?),
        };
        Ok(client)
    }
}

/// One client per backend type for the lifetime of a run.
///
/// Clients are built from the first route of each type. Closing consumes the
/// registry, so every client is closed exactly once.
pub struct BackendRegistry {
    clients: BTreeMap<BackendKind, Arc<dyn BackendClient>>,
}

impl BackendRegistry {
    /// Build the clients needed by `routes`.
    ///
    /// When any client fails to build, the clients created so far are closed
    /// before the error is returned.
    pub async fn resolve(factory: &dyn BackendFactory, routes: &[Route]) -> StorageResult<Self> {
        let mut clients: BTreeMap<BackendKind, Arc<dyn BackendClient>> = BTreeMap::new();

        for route in routes {
            if clients.contains_key(&route.kind()) {
                continue;
            }

            debug!(backend = %route.kind(), "Creating backend client");
            match factory.create(route.kind(), route.config()).await {
                Ok(client) => {
                    clients.insert(route.kind(), client);
                }
                Err(e) => {
                    Self { clients }.close().await;
                    return Err(e);
                }
            }
        }

        info!("Resolved {} backend client(s)", clients.len());
        Ok(Self { clients })
    }

    /// Client for a backend type.
    pub fn get(&self, kind: BackendKind) -> StorageResult<Arc<dyn BackendClient>> {
        self.clients.get(&kind).cloned().ok_or_else(|| {
            StorageError::config_error(format!("No client resolved for {}", kind))
        })
    }

    /// Backend types held by the registry.
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.clients.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Close every client once. Close failures are logged, not returned.
    pub async fn close(self) {
        for (kind, client) in self.clients {
            if let Err(e) = client.close().await {
                warn!(backend = %kind, error = %e, "Failed to close backend client");
            }
        }
    }
}
