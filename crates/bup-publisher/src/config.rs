//! Options and CLI configuration.

use std::path::{Path, PathBuf};

use bup_models::PublishOptions;
use ::config::{Config, Environment, File};

use crate::error::PublishResult;

/// Prefix of environment variables overlaying the options file.
pub const ENV_PREFIX: &str = "BUNDLE_UPLOADER";

/// Load publisher options from a JSON, TOML or YAML file.
///
/// `BUNDLE_UPLOADER__<KEY>` variables override file entries, e.g.
/// `BUNDLE_UPLOADER__DELETEPREVIOUS=true` or `BUNDLE_UPLOADER__CDN__BUCKET=assets`.
pub fn load_options(path: &Path) -> PublishResult<PublishOptions> {
    let settings = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Runtime settings of the `bundle-uploader` binary.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Options file
    pub options_path: PathBuf,
    /// Build output directory to publish
    pub output_dir: PathBuf,
    /// Accept duplicate-pattern prompts without asking
    pub assume_yes: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            options_path: PathBuf::from("bundle-uploader.json"),
            output_dir: PathBuf::from("dist"),
            assume_yes: false,
        }
    }
}

impl CliConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            options_path: std::env::var("BUNDLE_UPLOADER_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.options_path),
            output_dir: std::env::var("BUNDLE_UPLOADER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            assume_yes: std::env::var("BUNDLE_UPLOADER_ASSUME_YES")
                .ok()
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "y"))
                .unwrap_or(defaults.assume_yes),
        }
    }
}
