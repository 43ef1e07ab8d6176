//! Route configuration.
//!
//! A [`RouteConfig`] is the raw route object as written in the options file
//! and recorded in the journal. A [`Route`] is the validated, immutable form
//! used during a run.

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::pattern::MatchPattern;

/// Raw route object as configured by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Backend type (`qiniu`, `txcos`, `ftp`, `s3`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "accesskey")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "secretkey")]
    pub secret_key: Option<String>,
    /// Bucket name for object storage backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// Remote root directory for the FTP backend
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "destpath")]
    pub dest_path: Option<String>,
    /// Upload zone (Qiniu), region (COS) or FTP host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom service endpoint (S3-compatible storage)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "contenttype")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Match pattern, required when several routes are configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    /// Backend specific extras kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RouteConfig {
    /// Create a route config for the given backend type.
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind: Some(kind.as_str().to_string()),
            ..Default::default()
        }
    }

    /// Both halves of the key pair are present and non-empty.
    pub fn has_key_pair(&self) -> bool {
        non_empty(&self.access_key) && non_empty(&self.secret_key)
    }

    /// Bucket name, empty when not configured.
    pub fn bucket_name(&self) -> &str {
        self.bucket.as_deref().unwrap_or_default()
    }

    /// Region for regional backends: `region` wins over `host`.
    pub fn region_name(&self) -> Option<&str> {
        self.region
            .as_deref()
            .or(self.host.as_deref())
            .filter(|r| !r.is_empty())
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// The `cdn` option: one route or an ordered list of routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CdnConfig {
    Multiple(Vec<RouteConfig>),
    Single(RouteConfig),
}

impl CdnConfig {
    /// Whether multi-route mode is enabled.
    pub fn is_multiple(&self) -> bool {
        matches!(self, CdnConfig::Multiple(_))
    }

    /// Route configs in declaration order.
    pub fn routes(&self) -> Vec<&RouteConfig> {
        match self {
            CdnConfig::Multiple(routes) => routes.iter().collect(),
            CdnConfig::Single(route) => vec![route],
        }
    }
}

impl From<RouteConfig> for CdnConfig {
    fn from(route: RouteConfig) -> Self {
        CdnConfig::Single(route)
    }
}

impl From<Vec<RouteConfig>> for CdnConfig {
    fn from(routes: Vec<RouteConfig>) -> Self {
        CdnConfig::Multiple(routes)
    }
}

/// A validated route, immutable for the rest of the run.
#[derive(Debug, Clone)]
pub struct Route {
    kind: BackendKind,
    pattern: Option<MatchPattern>,
    config: RouteConfig,
}

impl Route {
    pub fn new(kind: BackendKind, pattern: Option<MatchPattern>, config: RouteConfig) -> Self {
        Self {
            kind,
            pattern,
            config,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// The configured pattern, if any.
    pub fn pattern(&self) -> Option<&MatchPattern> {
        self.pattern.as_ref()
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_route_deserialize() {
        let json = r#"{"type":"qiniu","accessKey":"ak","secretKey":"sk","bucket":"assets","host":"z0"}"#;
        let cdn: CdnConfig = serde_json::from_str(json).unwrap();
        assert!(!cdn.is_multiple());
        let route = cdn.routes()[0];
        assert_eq!(route.kind.as_deref(), Some("qiniu"));
        assert!(route.has_key_pair());
        assert_eq!(route.region_name(), Some("z0"));
    }

    #[test]
    fn test_multiple_routes_deserialize_in_order() {
        let json = r#"[
            {"type":"s3","test":"/\\.js$/"},
            {"type":"ftp","destPath":"/www","test":"/\\.css$/"}
        ]"#;
        let cdn: CdnConfig = serde_json::from_str(json).unwrap();
        assert!(cdn.is_multiple());
        let routes = cdn.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[1].dest_path.as_deref(), Some("/www"));
        assert_eq!(routes[0].test.as_deref(), Some(r"/\.js$/"));
    }

    #[test]
    fn test_extra_fields_round_trip() {
        let json = r#"{"type":"s3","accessKey":"ak","secretKey":"sk","style":"virtual"}"#;
        let route: RouteConfig = serde_json::from_str(json).unwrap();
        assert_eq!(route.extra.get("style").and_then(|v| v.as_str()), Some("virtual"));

        let written = serde_json::to_value(&route).unwrap();
        assert_eq!(written["style"], "virtual");
        assert_eq!(written["accessKey"], "ak");
        assert!(written.get("bucket").is_none());
    }

    #[test]
    fn test_empty_key_is_missing() {
        let mut route = RouteConfig::new(BackendKind::S3);
        route.access_key = Some("ak".into());
        route.secret_key = Some(String::new());
        assert!(!route.has_key_pair());
    }
}
