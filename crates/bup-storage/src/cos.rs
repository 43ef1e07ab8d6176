//! SDK-based object storage client (Tencent COS).
//!
//! COS exposes an S3-compatible API at `cos.{region}.myqcloud.com`, so the
//! client is driven through the AWS SDK with virtual-hosted addressing.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bup_models::{BackendKind, RouteConfig};
use tracing::{debug, info, warn};

use crate::client::{content_type_for, BackendClient, UploadAck};
use crate::error::{StorageError, StorageResult};
use crate::s3::{build_sdk_client, delete_request, object_key, SdkSettings, MAX_DELETE_KEYS};

/// Region used when the route does not name one.
pub const DEFAULT_REGION: &str = "ap-guangzhou";

/// Service endpoint for a COS region.
pub fn endpoint_for(region: &str) -> String {
    format!("https://cos.{}.myqcloud.com", region)
}

/// Tencent COS client.
#[derive(Clone)]
pub struct CosClient {
    client: Client,
}

impl CosClient {
    /// Create a client from a route; the region comes from `region` or `host`.
    pub fn new(route: &RouteConfig) -> StorageResult<Self> {
        if !route.has_key_pair() {
            return Err(StorageError::MissingCredentials(BackendKind::Txcos));
        }

        let region = route.region_name().unwrap_or(DEFAULT_REGION).to_string();
        let client = build_sdk_client(SdkSettings {
            access_key_id: route.access_key.clone().unwrap_or_default(),
            secret_access_key: route.secret_key.clone().unwrap_or_default(),
            endpoint_url: Some(endpoint_for(&region)),
            region,
            force_path_style: false,
            provider_name: "bup-cos",
        });

        Ok(Self { client })
    }

    fn bucket<'a>(&self, route: &'a RouteConfig) -> StorageResult<&'a str> {
        let bucket = route.bucket_name();
        if bucket.is_empty() {
            return Err(StorageError::config_error("COS route has no bucket"));
        }
        Ok(bucket)
    }

    async fn delete_chunk(&self, bucket: &str, keys: &[String]) -> StorageResult<u64> {
        // COS only reports deleted keys in verbose mode.
        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete_request(keys, false)?)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        let errors = output.errors();
        if !errors.is_empty() {
            let failed: Vec<&str> = errors.iter().filter_map(|e| e.key()).collect();
            warn!(bucket = %bucket, failed = ?failed, "COS reported undeleted objects");
            return Err(StorageError::delete_failed(format!(
                "{} of {} objects not deleted: {}",
                failed.len(),
                keys.len(),
                failed.join(", ")
            )));
        }

        Ok(output.deleted().len() as u64)
    }
}

#[async_trait]
impl BackendClient for CosClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Txcos
    }

    async fn put(
        &self,
        route: &RouteConfig,
        name: &str,
        content: Vec<u8>,
    ) -> StorageResult<UploadAck> {
        let bucket = self.bucket(route)?;
        let key = object_key(name);
        debug!("Uploading {} bytes to cos {}/{}", content.len(), bucket, key);

        let content_length = content.len() as i64;
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(content_length)
            .content_type(content_type_for(name, route.content_type.as_deref()))
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;

        Ok(UploadAck {
            key: key.to_string(),
            etag: output.e_tag().map(str::to_string),
        })
    }

    async fn delete_many(&self, route: &RouteConfig, names: &[String]) -> StorageResult<u64> {
        if names.is_empty() {
            return Ok(0);
        }

        let bucket = self.bucket(route)?;
        let mut deleted = 0;
        for chunk in names.chunks(MAX_DELETE_KEYS) {
            deleted += self.delete_chunk(bucket, chunk).await?;
        }

        info!("Deleted {} objects from cos bucket {}", deleted, bucket);
        Ok(deleted)
    }
}
