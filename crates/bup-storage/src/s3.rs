//! S3-compatible storage client.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectCannedAcl, ObjectIdentifier};
use aws_sdk_s3::Client;
use bup_models::{BackendKind, RouteConfig};
use tracing::{debug, info, warn};

use crate::client::{content_type_for, BackendClient, UploadAck};
use crate::error::{StorageError, StorageResult};

/// Region used when the route does not name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// ACL applied to uploads when the route does not name one.
pub const DEFAULT_ACL: &str = "public-read";

/// Maximum number of keys per multi-object delete request.
pub(crate) const MAX_DELETE_KEYS: usize = 1000;

/// Settings for an SDK client.
#[derive(Debug, Clone)]
pub(crate) struct SdkSettings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub provider_name: &'static str,
}

/// Build an SDK client without touching the network.
pub(crate) fn build_sdk_client(settings: SdkSettings) -> Client {
    let credentials = Credentials::new(
        &settings.access_key_id,
        &settings.secret_access_key,
        None,
        None,
        settings.provider_name,
    );

    let mut builder = Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(settings.region))
        .credentials_provider(credentials)
        .force_path_style(settings.force_path_style);

    if let Some(endpoint) = settings.endpoint_url {
        builder = builder.endpoint_url(endpoint);
    }

    Client::from_conf(builder.build())
}

/// Object key for a logical name: S3 keys carry no leading slash.
pub(crate) fn object_key(name: &str) -> &str {
    name.trim_start_matches('/')
}

/// Build a multi-object delete request. Quiet requests only report failures.
pub(crate) fn delete_request(keys: &[String], quiet: bool) -> StorageResult<Delete> {
    let objects = keys
        .iter()
        .map(|k| {
            ObjectIdentifier::builder()
                .key(object_key(k))
                .build()
                .map_err(|e| StorageError::delete_failed(e.to_string()))
        })
        .collect::<StorageResult<Vec<_>>>()?;

    Delete::builder()
        .set_objects(Some(objects))
        .quiet(quiet)
        .build()
        .map_err(|e| StorageError::delete_failed(e.to_string()))
}

/// S3-compatible storage client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    /// Create a client from a route.
    ///
    /// `region` defaults to `us-east-1`; a custom `endpoint` switches to
    /// path-style addressing for S3-compatible services.
    pub fn new(route: &RouteConfig) -> StorageResult<Self> {
        if !route.has_key_pair() {
            return Err(StorageError::MissingCredentials(BackendKind::S3));
        }

        let endpoint_url = route.endpoint.clone().filter(|e| !e.is_empty());
        let client = build_sdk_client(SdkSettings {
            access_key_id: route.access_key.clone().unwrap_or_default(),
            secret_access_key: route.secret_key.clone().unwrap_or_default(),
            region: route.region_name().unwrap_or(DEFAULT_REGION).to_string(),
            force_path_style: endpoint_url.is_some(),
            endpoint_url,
            provider_name: "bup-s3",
        });

        Ok(Self { client })
    }

    fn bucket<'a>(&self, route: &'a RouteConfig) -> StorageResult<&'a str> {
        let bucket = route.bucket_name();
        if bucket.is_empty() {
            return Err(StorageError::config_error("S3 route has no bucket"));
        }
        Ok(bucket)
    }
}

#[async_trait]
impl BackendClient for S3Client {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    async fn put(
        &self,
        route: &RouteConfig,
        name: &str,
        content: Vec<u8>,
    ) -> StorageResult<UploadAck> {
        let bucket = self.bucket(route)?;
        let key = object_key(name);
        let acl = route.acl.as_deref().unwrap_or(DEFAULT_ACL);
        debug!("Uploading {} bytes to s3://{}/{}", content.len(), bucket, key);

        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(content))
            .content_type(content_type_for(name, route.content_type.as_deref()))
            .acl(ObjectCannedAcl::from(acl))
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
        debug!("Deleting {} objects from s3://{}", names.len(), bucket);

        for chunk in names.chunks(MAX_DELETE_KEYS) {
            let output = self
                .client
                .delete_objects()
                .bucket(bucket)
                .delete(delete_request(chunk, true)?)
                .send()
                .await
                .map_err(|e| StorageError::delete_failed(e.to_string()))?;

            // Quiet mode lists only the keys that were not deleted.
            let errors = output.errors();
            if !errors.is_empty() {
                let failed: Vec<&str> = errors.iter().filter_map(|e| e.key()).collect();
                warn!(bucket = %bucket, failed = ?failed, "S3 reported undeleted objects");
                return Err(StorageError::delete_failed(format!(
                    "{} of {} objects not deleted: {}",
                    errors.len(),
                    chunk.len(),
                    failed.join(", ")
                )));
            }
        }

        info!("Deleted {} objects from s3://{}", names.len(), bucket);
        Ok(names.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn route() -> RouteConfig {
        let mut route = RouteConfig::new(BackendKind::S3);
        route.access_key = Some("AKIA".into());
        route.secret_key = Some("secret".into());
        route.bucket = Some("bundles".into());
        route
    }

    #[test]
    fn test_missing_credentials() {
        let mut route = route();
        route.access_key = None;
        let err = S3Client::new(&route).err().unwrap();
        assert!(matches!(err, StorageError::MissingCredentials(BackendKind::S3)));
    }

    #[test]
    fn test_object_key_strips_leading_slash() {
        assert_eq!(object_key("/js/app.js"), "js/app.js");
        assert_eq!(object_key("app.js"), "app.js");
    }

    #[test]
    fn test_delete_request_keys() {
        let delete = delete_request(&["/a.js".to_string(), "b.js".to_string()], true).unwrap();
        let keys: Vec<&str> = delete.objects().iter().map(|o| o.key()).collect();
        assert_eq!(keys, vec!["a.js", "b.js"]);
    }

    fn endpoint_route(endpoint: String) -> RouteConfig {
        let mut route = route();
        route.endpoint = Some(endpoint);
        route
    }

    #[tokio::test]
    async fn test_delete_many_reports_undeleted_keys() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bundles"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<DeleteResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Error><Key>a.js</Key><Code>AccessDenied</Code><Message>Access Denied</Message></Error>
  <Error><Key>b.js</Key><Code>AccessDenied</Code><Message>Access Denied</Message></Error>
</DeleteResult>"#,
                "application/xml",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let route = endpoint_route(server.uri());
        let client = S3Client::new(&route).unwrap();
        let names = vec!["a.js".to_string(), "b.js".to_string()];
        let err = client.delete_many(&route, &names).await.unwrap_err();
        assert!(
            matches!(err, StorageError::DeleteFailed(ref msg) if msg.contains("2 of 2") && msg.contains("a.js"))
        );
    }

    #[tokio::test]
    async fn test_delete_many_quiet_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bundles"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<DeleteResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"></DeleteResult>"#,
                "application/xml",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let route = endpoint_route(server.uri());
        let client = S3Client::new(&route).unwrap();
        let names = vec!["a.js".to_string(), "/b.js".to_string()];
        assert_eq!(client.delete_many(&route, &names).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_put_requires_bucket() {
        let mut route = route();
        let client = S3Client::new(&route).unwrap();
        route.bucket = None;
        let err = client.put(&route, "a.js", b"x".to_vec()).await.unwrap_err();
        assert!(err.is_configuration());
    }
}
