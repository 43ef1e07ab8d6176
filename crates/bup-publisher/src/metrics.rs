//! Publish metrics.
//!
//! Counters mirroring the per-run counters, labelled by backend:
//! - Uploads by backend and status
//! - Objects removed by cleanup

use bup_models::BackendKind;
use metrics::counter;

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Uploads by backend and status (`success`, `error`).
    pub const UPLOADS_TOTAL: &str = "bundle_uploads_total";

    /// Objects deleted by previous-run cleanup, by backend.
    pub const DELETED_TOTAL: &str = "bundle_deleted_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record a settled upload.
pub fn record_upload(backend: BackendKind, success: bool) {
    counter!(
        names::UPLOADS_TOTAL,
        "backend" => backend.as_str(),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

/// Record objects removed from a backend.
pub fn record_deleted(backend: BackendKind, count: u64) {
    counter!(
        names::DELETED_TOTAL,
        "backend" => backend.as_str()
    )
    .increment(count);
}
