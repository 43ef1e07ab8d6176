//! Bundle publish and cleanup orchestration.
//!
//! This crate provides:
//! - Route validation with duplicate-pattern confirmation
//! - Concurrent publishing of build assets to every matching route
//! - The publish journal and previous-run cleanup
//! - Localized user-facing messages
//! - Options loading for the `bundle-uploader` binary

pub mod cleanup;
pub mod config;
pub mod confirm;
pub mod error;
pub mod journal;
pub mod messages;
pub mod metrics;
pub mod publisher;
pub mod validator;

pub use cleanup::{DeleteGroup, DeleteOrchestrator};
pub use config::{load_options, CliConfig};
pub use confirm::{ConfirmPrompt, FixedAnswer, StdinPrompt};
pub use error::{
    CleanupError, CleanupResult, JournalError, JournalResult, PublishError, PublishResult,
};
pub use journal::{ConsumedJournal, Journal};
pub use messages::{MessageId, Messages};
pub use publisher::{CleanupReport, Publisher, RunOutcome};
pub use validator::RouteValidator;
