//! Publish orchestration.
//!
//! One run: validate routes, optionally clean up the previous run, resolve
//! one client per backend type, upload every (asset, route) match
//! concurrently, then write the journal and close the backends.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bup_models::{
    Asset, AssetCollection, CdnConfig, MatchPattern, PublishJournal, PublishOptions, Route,
    RouteConfig, RunCounters, RunStatus,
};
use bup_storage::{BackendFactory, BackendRegistry, DefaultBackendFactory};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cleanup::DeleteOrchestrator;
use crate::confirm::{ConfirmPrompt, StdinPrompt};
use crate::error::{PublishError, PublishResult};
use crate::journal::Journal;
use crate::messages::{MessageId, Messages};
use crate::metrics;
use crate::validator::RouteValidator;

/// What happened to the previous run's uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum CleanupReport {
    NotRequested,
    Deleted(u64),
    Skipped(String),
}

/// Result of one run, handed to the completion signal.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub counters: RunCounters,
    pub cleanup: CleanupReport,
    /// Journal written by this run
    pub journal: Option<PathBuf>,
    /// Published file names, in settlement order
    pub published: Vec<String>,
    /// Reason the run was rejected or could not start
    pub error: Option<String>,
    /// Previous-run files still on the backends whose journal this run replaced
    pub superseded: Vec<String>,
}

impl RunOutcome {
    fn rejected(error: String) -> Self {
        Self {
            status: RunStatus::Rejected,
            counters: RunCounters::new(),
            cleanup: CleanupReport::NotRequested,
            journal: None,
            published: Vec::new(),
            error: Some(error),
            superseded: Vec::new(),
        }
    }
}

/// One upload: an asset matched by a route.
struct UploadJob<'a> {
    asset: &'a Asset,
    route: &'a Route,
    name: String,
}

/// Publishes build assets to the configured routes.
pub struct Publisher {
    options: PublishOptions,
    messages: Messages,
    factory: Arc<dyn BackendFactory>,
    prompt: Arc<dyn ConfirmPrompt>,
}

impl Publisher {
    /// Publisher with the network backends and an interactive prompt.
    pub fn new(options: PublishOptions) -> Self {
        let messages = Messages::load(options.lang.as_deref());
        Self {
            options,
            messages,
            factory: Arc::new(DefaultBackendFactory),
            prompt: Arc::new(StdinPrompt::new()),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn BackendFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn ConfirmPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    /// Run once and hand the outcome to `done`, exactly once.
    pub async fn handle_emitted<F>(
        &self,
        assets: &AssetCollection,
        output_root: &Path,
        done: F,
    ) -> RunOutcome
    where
        F: FnOnce(&RunOutcome),
    {
        let outcome = self.run(assets, output_root).await;
        done(&outcome);
        outcome
    }

    /// Run once over the emitted assets.
    pub async fn run(&self, assets: &AssetCollection, output_root: &Path) -> RunOutcome {
        let validator = RouteValidator::new(&self.messages, self.prompt.as_ref());
        let routes = match validator.validate_all(self.options.cdn.as_ref()).await {
            Ok(routes) => routes,
            Err(e) => {
                error!("{}", e);
                return RunOutcome::rejected(e.to_string());
            }
        };

        let journal = Journal::new(self.options.journal_path(output_root));
        let cleanup = if self.options.delete_previous {
            self.delete_previous(&journal).await
        } else {
            CleanupReport::NotRequested
        };

        let registry = match BackendRegistry::resolve(self.factory.as_ref(), &routes).await {
            Ok(registry) => registry,
            Err(e) => {
                let message = self
                    .messages
                    .format(MessageId::InvalidCdnOptionsLoaded, &[&e.to_string()]);
                error!("{}", message);
                let mut outcome = RunOutcome::rejected(message);
                outcome.cleanup = cleanup;
                if !e.is_configuration() {
                    outcome.status = RunStatus::Failed;
                }
                return outcome;
            }
        };

        info!("{}", self.messages.get(MessageId::UploadStart));
        let jobs = self.plan_uploads(assets, output_root, &routes);

        if jobs.is_empty() {
            warn!("{}", self.messages.get(MessageId::EmptyUploadingFiles));
            registry.close().await;
            return RunOutcome {
                status: RunStatus::NothingToUpload,
                counters: RunCounters::new(),
                cleanup,
                journal: None,
                published: Vec::new(),
                error: None,
                superseded: Vec::new(),
            };
        }

        let (counters, uploaded) = self.upload_all(&registry, &jobs).await;
        registry.close().await;

        let mut record = PublishJournal::new(journal_routes(&routes, self.options.cdn.as_ref()));
        for job in &uploaded {
            record.push(job.name.clone());
        }

        let mut superseded = Vec::new();
        let journal_written = if record.is_empty() {
            None
        } else {
            if matches!(cleanup, CleanupReport::Skipped(_)) {
                superseded = self.unretired_files(&journal).await;
            }
            match journal.write(&record).await {
                Ok(()) => Some(journal.path().to_path_buf()),
                Err(e) => {
                    error!(
                        "{}",
                        self.messages.format(MessageId::SavingLogError, &[&e.to_string()])
                    );
                    None
                }
            }
        };

        if self.options.delete_output {
            remove_local_outputs(&uploaded).await;
        }

        if counters.failed == 0 {
            info!("{}", self.messages.get(MessageId::AllFileUploaded));
            if self.options.delete_output {
                info!("{}", self.messages.get(MessageId::DeleteOutputEnabled));
            }
        }
        self.log_summary(&counters);

        RunOutcome {
            status: counters.status(),
            counters,
            cleanup,
            journal: journal_written,
            published: record.file_names(),
            error: None,
            superseded,
        }
    }

    /// Names in a journal that a failed cleanup left behind, logged before
    /// the journal is replaced.
    async fn unretired_files(&self, journal: &Journal) -> Vec<String> {
        let Ok(previous) = journal.consume().await else {
            return Vec::new();
        };
        let files = previous.record().file_names();
        if !files.is_empty() {
            warn!(
                path = %journal.path().display(),
                files = ?files,
                "Replacing previous log; {} previously uploaded files will not be deleted",
                files.len()
            );
        }
        files
    }

    async fn delete_previous(&self, journal: &Journal) -> CleanupReport {
        info!("{}", self.messages.get(MessageId::DeletePreviousEnabled));

        let skip = |reason: String| {
            warn!(
                "{}",
                self.messages
                    .format(MessageId::SkipDeletePreviousDueTo, &[&reason])
            );
            CleanupReport::Skipped(reason)
        };

        let consumed = match journal.consume().await {
            Ok(consumed) => consumed,
            Err(e) => return skip(e.to_string()),
        };

        match DeleteOrchestrator::new(self.factory.as_ref())
            .run(consumed.record())
            .await
        {
            Ok(deleted) => {
                info!(
                    "{}",
                    self.messages
                        .format(MessageId::DeletedNumPreviousFiles, &[&deleted.to_string()])
                );
                if let Err(e) = consumed.mark_deleted().await {
                    warn!(error = %e, "Failed to remove previous log");
                }
                CleanupReport::Deleted(deleted)
            }
            Err(e) => skip(e.to_string()),
        }
    }

    /// Pair every asset with the routes whose pattern matches its path.
    fn plan_uploads<'a>(
        &self,
        assets: &'a AssetCollection,
        output_root: &Path,
        routes: &'a [Route],
    ) -> Vec<UploadJob<'a>> {
        let multiple = self
            .options
            .cdn
            .as_ref()
            .is_some_and(CdnConfig::is_multiple);
        let default_pattern = MatchPattern::default_assets().ok();

        let mut jobs = Vec::new();
        for (key, asset) in assets {
            let target = asset.match_target();
            for route in routes {
                let pattern = match (route.pattern(), multiple) {
                    (Some(pattern), _) => pattern,
                    (None, false) => match default_pattern.as_ref() {
                        Some(pattern) => pattern,
                        None => continue,
                    },
                    // Validation guarantees a pattern in multi-route mode.
                    (None, true) => continue,
                };
                if !pattern.is_match(&target) {
                    continue;
                }

                let name = asset.published_name(output_root);
                debug!(asset = %key, file = %name, backend = %route.kind(), "Matched asset");
                jobs.push(UploadJob { asset, route, name });
            }
        }
        jobs
    }

    async fn upload_all<'a>(
        &self,
        registry: &BackendRegistry,
        jobs: &'a [UploadJob<'a>],
    ) -> (RunCounters, Vec<&'a UploadJob<'a>>) {
        let mut counters = RunCounters::new();
        let mut pending = FuturesUnordered::new();

        for job in jobs {
            counters.record_attempt();
            pending.push(async move { (job, upload_one(registry, job).await) });
        }

        let mut uploaded = Vec::new();
        while let Some((job, result)) = pending.next().await {
            let kind = job.route.kind();
            match result {
                Ok(()) => {
                    counters.record_success();
                    metrics::record_upload(kind, true);
                    info!(
                        file = %job.name,
                        backend = %kind,
                        "{}: {}",
                        self.messages.get(MessageId::SingleFileUploaded),
                        job.name
                    );
                    uploaded.push(job);
                }
                Err(e) => {
                    counters.record_failure();
                    metrics::record_upload(kind, false);
                    let id = match e {
                        PublishError::FileRead { .. } => MessageId::LoadingFileError,
                        _ => MessageId::UploadingError,
                    };
                    error!(
                        file = %job.name,
                        backend = %kind,
                        "{}",
                        self.messages.format(id, &[&job.name, &e.to_string()])
                    );
                }
            }
        }

        (counters, uploaded)
    }

    fn log_summary(&self, counters: &RunCounters) {
        info!(
            attempted = counters.attempted,
            succeeded = counters.succeeded,
            failed = counters.failed,
            "{} {} {} {}",
            self.messages.get(MessageId::SummaryTitle),
            self.messages
                .format(MessageId::SummaryTotal, &[&counters.attempted.to_string()]),
            self.messages
                .format(MessageId::SummaryUploaded, &[&counters.succeeded.to_string()]),
            self.messages
                .format(MessageId::SummaryErrors, &[&counters.failed.to_string()])
        );
    }
}

/// Obtain the asset's bytes, then upload them.
async fn upload_one(registry: &BackendRegistry, job: &UploadJob<'_>) -> PublishResult<()> {
    let content = match &job.asset.content {
        Some(content) => content.clone(),
        None => tokio::fs::read(&job.asset.physical_path)
            .await
            .map_err(|e| PublishError::file_read(&job.name, e.to_string()))?,
    };

    let client = registry.get(job.route.kind())?;
    client
        .put(job.route.config(), &job.name, content)
        .await
        .map(|ack| debug!(key = %ack.key, etag = ?ack.etag, "Upload acknowledged"))
        .map_err(|source| PublishError::Upload {
            file: job.name.clone(),
            message: source.to_string(),
            source,
        })
}

/// Routes as recorded in the journal, with patterns in `/source/flags` form.
fn journal_routes(routes: &[Route], configured: Option<&CdnConfig>) -> CdnConfig {
    let recorded: Vec<RouteConfig> = routes
        .iter()
        .map(|route| {
            let mut config = route.config().clone();
            if let Some(pattern) = route.pattern() {
                config.test = Some(pattern.normalized());
            }
            config
        })
        .collect();

    match configured {
        Some(CdnConfig::Multiple(_)) => CdnConfig::Multiple(recorded),
        _ => match recorded.into_iter().next() {
            Some(route) => CdnConfig::Single(route),
            None => CdnConfig::Multiple(Vec::new()),
        },
    }
}

/// Remove local artifacts of uploaded assets, once per physical file.
async fn remove_local_outputs(uploaded: &[&UploadJob<'_>]) {
    let mut removed = HashSet::new();
    for job in uploaded {
        let path = &job.asset.physical_path;
        if !removed.insert(path.clone()) {
            continue;
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Removed local output"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove local output"),
        }
    }
}
