//! Bundle uploader binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bup_models::{Asset, AssetCollection};
use bup_publisher::{load_options, CliConfig, FixedAnswer, Publisher, StdinPrompt};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for CI logs
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(2);
        }
    }
}

/// Publish the output directory once. Returns whether the run succeeded.
async fn run() -> anyhow::Result<bool> {
    let config = CliConfig::from_env();
    info!("Bundle uploader config: {:?}", config);

    let options = load_options(&config.options_path)
        .with_context(|| format!("loading options from {}", config.options_path.display()))?;

    let output_root = tokio::fs::canonicalize(&config.output_dir)
        .await
        .with_context(|| format!("output directory {}", config.output_dir.display()))?;

    let journal_path = options.journal_path(&output_root);
    let assets = collect_assets(&output_root, &journal_path).await?;
    info!("Found {} output files in {}", assets.len(), output_root.display());

    let mut publisher = Publisher::new(options);
    publisher = if config.assume_yes {
        publisher.with_prompt(Arc::new(FixedAnswer(true)))
    } else {
        publisher.with_prompt(Arc::new(StdinPrompt::new()))
    };

    let outcome = publisher
        .handle_emitted(&assets, &output_root, |outcome| {
            info!(status = ?outcome.status, "Run finished");
        })
        .await;

    Ok(!outcome.status.is_failure())
}

/// Every file below `root`, keyed by its path relative to `root`.
///
/// The journal itself is never published.
async fn collect_assets(root: &Path, journal_path: &Path) -> anyhow::Result<AssetCollection> {
    let mut assets = AssetCollection::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("reading {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && path != journal_path {
                let asset = Asset::from_path(&path);
                assets.insert(asset.published_name(root), asset);
            }
        }
    }

    Ok(assets)
}
