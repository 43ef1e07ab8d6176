//! Uniform backend client contract.

use async_trait::async_trait;
use bup_models::{BackendKind, RouteConfig};

use crate::error::StorageResult;

/// Acknowledgement of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAck {
    /// Key or remote path the content was stored under
    pub key: String,
    /// Content hash or ETag reported by the backend, when any
    pub etag: Option<String>,
}

impl UploadAck {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            etag: None,
        }
    }
}

/// Operations every storage backend supports.
///
/// One client serves every route of its backend type during a run, so the
/// route is passed along to pick the bucket or destination directory.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Backend type of this client.
    fn kind(&self) -> BackendKind;

    /// Upload `content` under the logical `name`.
    async fn put(&self, route: &RouteConfig, name: &str, content: Vec<u8>)
        -> StorageResult<UploadAck>;

    /// Delete a batch of logical names, returning how many were deleted.
    async fn delete_many(&self, route: &RouteConfig, names: &[String]) -> StorageResult<u64>;

    /// Release any live session. Idempotent.
    ///
    /// Must only be called once no operation is in flight.
    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Pick a content type from the route override or the file extension.
pub fn content_type_for(name: &str, configured: Option<&str>) -> String {
    if let Some(content_type) = configured.filter(|c| !c.is_empty()) {
        return content_type.to_string();
    }

    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let content_type = match extension.as_str() {
        "js" | "mjs" => "application/javascript",
        "css" => "text/css",
        "html" | "htm" => "text/html",
        "json" | "map" => "application/json",
        "txt" => "text/plain",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    };
    content_type.to_string()
}
