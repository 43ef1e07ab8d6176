//! Storage backends for the bundle uploader.
//!
//! This crate provides:
//! - The uniform `BackendClient` contract
//! - Token-signed object storage (Qiniu)
//! - SDK-based object storage (Tencent COS)
//! - Directory-oriented transfer (FTP)
//! - S3-compatible storage
//! - Backend construction and the per-run client registry

pub mod client;
pub mod cos;
pub mod error;
pub mod ftp;
pub mod qiniu;
pub mod registry;
pub mod s3;

pub use client::{content_type_for, BackendClient, UploadAck};
pub use cos::CosClient;
pub use error::{StorageError, StorageResult};
pub use ftp::{DeletePlan, FtpClient, FtpSession, FtpSettings, SuppaFtpSession};
pub use qiniu::QiniuClient;
pub use registry::{BackendFactory, BackendRegistry, DefaultBackendFactory};
pub use s3::S3Client;
