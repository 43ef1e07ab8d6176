//! Shared data models for the bundle uploader.
//!
//! This crate provides Serde-serializable types for:
//! - Route configuration and backend kinds
//! - Match patterns used to pick assets per route
//! - Emitted assets handed over by the build pipeline
//! - The publish journal persisted between runs
//! - Per-run counters and publisher options

pub mod asset;
pub mod backend;
pub mod counters;
pub mod error;
pub mod journal;
pub mod options;
pub mod pattern;
pub mod route;

// Re-export common types
pub use asset::{Asset, AssetCollection};
pub use backend::BackendKind;
pub use counters::{RunCounters, RunStatus};
pub use error::{ModelError, ModelResult};
pub use journal::{JournalEntry, PublishJournal, DEFAULT_JOURNAL_NAME};
pub use options::PublishOptions;
pub use pattern::MatchPattern;
pub use route::{CdnConfig, Route, RouteConfig};
