//! Token-signed object storage client (Qiniu Kodo REST API).
//!
//! Uploads go through the base64 upload endpoint with an `UpToken` derived
//! from an HMAC-SHA1 signed put policy. Deletes use the batch endpoint with a
//! `QBox` management signature.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, engine::general_purpose::URL_SAFE, Engine};
use bup_models::{BackendKind, RouteConfig};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use sha1::Sha1;
use tracing::{debug, info};

use crate::client::{BackendClient, UploadAck};
use crate::error::{StorageError, StorageResult};

type HmacSha1 = Hmac<Sha1>;

/// Management API host used for batch operations.
const RS_BASE_URL: &str = "https://rs.qiniu.com";

/// Lifetime of an upload token in seconds.
const UPLOAD_TOKEN_TTL_SECS: i64 = 3600;

/// Maximum number of operations per batch request.
const MAX_BATCH_OPS: usize = 1000;

/// Upload host for a storage zone.
pub fn upload_base_url(zone: Option<&str>) -> String {
    match zone {
        None | Some("") | Some("z0") => "https://upload.qiniup.com".to_string(),
        Some(zone) => format!("https://upload-{}.qiniup.com", zone),
    }
}

/// URL-safe base64, the encoding Qiniu uses for keys, policies and signatures.
pub fn safe_encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE.encode(data)
}

/// Qiniu storage client.
#[derive(Clone)]
pub struct QiniuClient {
    http: Client,
    access_key: String,
    secret_key: String,
    upload_url: String,
    rs_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    key: Option<String>,
    hash: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchItem {
    code: u16,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl QiniuClient {
    /// Create a client from a route; the zone is taken from `host`.
    pub fn new(route: &RouteConfig) -> StorageResult<Self> {
        Self::with_base_urls(
            route,
            upload_base_url(route.host.as_deref()),
            RS_BASE_URL.to_string(),
        )
    }

    /// Create a client talking to explicit upload and management hosts.
    pub fn with_base_urls(
        route: &RouteConfig,
        upload_url: impl Into<String>,
        rs_url: impl Into<String>,
    ) -> StorageResult<Self> {
        if !route.has_key_pair() {
            return Err(StorageError::MissingCredentials(BackendKind::Qiniu));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("bup-storage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StorageError::Network)?;

        Ok(Self {
            http,
            access_key: route.access_key.clone().unwrap_or_default(),
            secret_key: route.secret_key.clone().unwrap_or_default(),
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
            rs_url: rs_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn sign(&self, data: &[u8]) -> StorageResult<String> {
        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| StorageError::config_error(format!("Invalid secret key: {}", e)))?;
        mac.update(data);
        Ok(safe_encode(mac.finalize().into_bytes()))
    }

    /// Build an upload token scoped to `bucket:key`, valid until `deadline`.
    pub fn upload_token(&self, bucket: &str, key: &str, deadline: i64) -> StorageResult<String> {
        let policy = serde_json::json!({
            "scope": format!("{}:{}", bucket, key),
            "deadline": deadline,
        });
        let encoded_policy = safe_encode(serde_json::to_vec(&policy)?);
        let signature = self.sign(encoded_policy.as_bytes())?;
        Ok(format!("{}:{}:{}", self.access_key, signature, encoded_policy))
    }

    /// Build a `QBox` management token for a request path and query.
    pub fn management_token(&self, path_and_query: &str) -> StorageResult<String> {
        let signature = self.sign(format!("{}\n", path_and_query).as_bytes())?;
        Ok(format!("{}:{}", self.access_key, signature))
    }

    fn bucket<'a>(&self, route: &'a RouteConfig) -> StorageResult<&'a str> {
        let bucket = route.bucket_name();
        if bucket.is_empty() {
            return Err(StorageError::config_error("Qiniu route has no bucket"));
        }
        Ok(bucket)
    }

    async fn delete_batch(&self, bucket: &str, names: &[String]) -> StorageResult<u64> {
        let ops = names
            .iter()
            .map(|name| format!("op=/delete/{}", safe_encode(format!("{}:{}", bucket, name))))
            .collect::<Vec<_>>()
            .join("&");
        let path_and_query = format!("/batch?{}", ops);
        let token = self.management_token(&path_and_query)?;

        let response = self
            .http
            .post(format!("{}{}", self.rs_url, path_and_query))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(AUTHORIZATION, format!("QBox {}", token))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // 298 signals partial success; per-item codes carry the details.
        if !status.is_success() {
            return Err(StorageError::delete_failed(format!(
                "batch delete returned {}: {}",
                status, body
            )));
        }

        let items: Vec<BatchItem> = serde_json::from_str(&body)
            .map_err(|e| StorageError::InvalidResponse(format!("batch delete: {}", e)))?;

        for (name, item) in names.iter().zip(&items) {
            if item.code != 200 {
                debug!(file = %name, code = item.code, data = ?item.data, "Qiniu did not delete object");
            }
        }

        Ok(items.iter().filter(|item| item.code == 200).count() as u64)
    }
}

#[async_trait]
impl BackendClient for QiniuClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Qiniu
    }

    async fn put(
        &self,
        route: &RouteConfig,
        name: &str,
        content: Vec<u8>,
    ) -> StorageResult<UploadAck> {
        if content.is_empty() {
            return Err(StorageError::upload_failed(format!("{}: content is empty", name)));
        }

        let bucket = self.bucket(route)?;
        let deadline = chrono::Utc::now().timestamp() + UPLOAD_TOKEN_TTL_SECS;
        let token = self.upload_token(bucket, name, deadline)?;
        let url = format!(
            "{}/putb64/{}/key/{}",
            self.upload_url,
            content.len(),
            safe_encode(name)
        );

        debug!("Uploading {} bytes to qiniu {}:{}", content.len(), bucket, name);

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(AUTHORIZATION, format!("UpToken {}", token))
            .body(STANDARD.encode(&content))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| StorageError::InvalidResponse(format!("upload {}: {}", name, e)))?;

        if let Some(error) = parsed.error {
            return Err(StorageError::upload_failed(format!("{}: {}", name, error)));
        }
        if !status.is_success() {
            return Err(StorageError::upload_failed(format!("{}: HTTP {}", name, status)));
        }

        Ok(UploadAck {
            key: parsed.key.unwrap_or_else(|| name.to_string()),
            etag: parsed.hash,
        })
    }

    async fn delete_many(&self, route: &RouteConfig, names: &[String]) -> StorageResult<u64> {
        if names.is_empty() {
            return Ok(0);
        }

        let bucket = self.bucket(route)?;
        let mut deleted = 0;
        for chunk in names.chunks(MAX_BATCH_OPS) {
            deleted += self.delete_batch(bucket, chunk).await?;
        }

        info!("Deleted {} objects from qiniu bucket {}", deleted, bucket);
        Ok(deleted)
    }
}
