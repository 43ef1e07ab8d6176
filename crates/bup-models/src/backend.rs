//! Supported backend kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Remote storage backends a route can publish to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Token-signed object storage (Qiniu Kodo REST API)
    Qiniu,
    /// SDK-based object storage (Tencent COS)
    Txcos,
    /// Directory-oriented file transfer over FTP
    Ftp,
    /// S3-compatible object storage
    S3,
}

impl BackendKind {
    /// Every supported backend kind.
    pub const ALL: &'static [BackendKind] = &[
        BackendKind::Qiniu,
        BackendKind::Txcos,
        BackendKind::Ftp,
        BackendKind::S3,
    ];

    /// Value used for the route `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Qiniu => "qiniu",
            BackendKind::Txcos => "txcos",
            BackendKind::Ftp => "ftp",
            BackendKind::S3 => "s3",
        }
    }

    /// Human readable name used in messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Qiniu => "Qiniu",
            BackendKind::Txcos => "Tencent COS",
            BackendKind::Ftp => "FTP",
            BackendKind::S3 => "S3",
        }
    }

    /// Whether the backend needs an access key / secret key pair.
    pub fn requires_key_pair(&self) -> bool {
        !matches!(self, BackendKind::Ftp)
    }

    /// Whether object names map onto a directory hierarchy on the remote side.
    pub fn is_directory_oriented(&self) -> bool {
        matches!(self, BackendKind::Ftp)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qiniu" => Ok(BackendKind::Qiniu),
            "txcos" => Ok(BackendKind::Txcos),
            "ftp" => Ok(BackendKind::Ftp),
            "s3" => Ok(BackendKind::S3),
            other => Err(ModelError::UnsupportedBackend(other.to_string())),
        }
    }
}
