//! Removal of the previous run's uploads.
//!
//! Backends are rebuilt from the routes recorded in the journal, never from
//! the current run's options, so a run always cleans up exactly what the
//! previous run published.

use std::collections::{BTreeMap, HashSet};

use bup_models::{BackendKind, CdnConfig, MatchPattern, PublishJournal, Route, RouteConfig};
use bup_storage::{BackendFactory, BackendRegistry};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{CleanupError, CleanupResult};
use crate::metrics;

/// Files to delete through one backend.
#[derive(Debug, Clone)]
pub struct DeleteGroup {
    /// First recorded route of the backend type; supplies bucket or destPath
    pub route: Route,
    pub files: Vec<String>,
}

fn recorded_kind(config: &RouteConfig) -> CleanupResult<BackendKind> {
    let raw = config.kind.as_deref().unwrap_or_default();
    raw.parse()
        .map_err(|_| CleanupError::invalid_route(format!("unsupported type '{}'", raw)))
}

/// Backend types whose recorded routes name different buckets or `destPath`s.
///
/// Grouping deletes through the first route of each type, so files uploaded
/// through the others are looked up in the wrong place.
pub fn conflicting_targets(routes: &[RouteConfig]) -> Vec<BackendKind> {
    let mut targets: BTreeMap<BackendKind, HashSet<(Option<&str>, Option<&str>)>> =
        BTreeMap::new();
    for config in routes.iter().filter(|c| c.test.is_some()) {
        let Ok(kind) = recorded_kind(config) else {
            continue;
        };
        targets
            .entry(kind)
            .or_default()
            .insert((config.bucket.as_deref(), config.dest_path.as_deref()));
    }

    targets
        .into_iter()
        .filter(|(_, seen)| seen.len() > 1)
        .map(|(kind, _)| kind)
        .collect()
}

/// Group recorded files by backend type for a multi-route journal.
///
/// Each route's pattern selects its files; a route without a usable pattern
/// contributes nothing. Files selected by several routes of the same type
/// are deleted once.
pub fn group_by_backend(routes: &[RouteConfig], files: &[String]) -> CleanupResult<Vec<DeleteGroup>> {
    for kind in conflicting_targets(routes) {
        warn!(
            backend = %kind,
            "Recorded {} routes use different targets; deleting through the first one",
            kind
        );
    }

    let mut groups: BTreeMap<BackendKind, (DeleteGroup, HashSet<String>)> = BTreeMap::new();

    for config in routes {
        let Some(raw) = config.test.as_deref() else {
            debug!("Skipping recorded route without pattern");
            continue;
        };
        let pattern = match MatchPattern::parse(raw) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(pattern = %raw, error = %e, "Skipping recorded route with invalid pattern");
                continue;
            }
        };
        let kind = recorded_kind(config)?;

        for file in files.iter().filter(|f| pattern.is_match(f)) {
            let (group, seen) = groups.entry(kind).or_insert_with(|| {
                (
                    DeleteGroup {
                        route: Route::new(kind, Some(pattern.clone()), config.clone()),
                        files: Vec::new(),
                    },
                    HashSet::new(),
                )
            });
            if seen.insert(file.clone()) {
                group.files.push(file.clone());
            }
        }
    }

    Ok(groups.into_values().map(|(group, _)| group).collect())
}

/// Deletes the files recorded in a publish journal.
pub struct DeleteOrchestrator<'a> {
    factory: &'a dyn BackendFactory,
}

impl<'a> DeleteOrchestrator<'a> {
    pub fn new(factory: &'a dyn BackendFactory) -> Self {
        Self { factory }
    }

    /// Delete every recorded file, returning the total deleted count.
    ///
    /// Any backend failure fails the whole step.
    pub async fn run(&self, journal: &PublishJournal) -> CleanupResult<u64> {
        if journal.is_empty() {
            return Err(CleanupError::EmptyJournal);
        }
        let files = journal.file_names();

        let groups = match &journal.cdn {
            CdnConfig::Single(config) => {
                let kind = recorded_kind(config)?;
                vec![DeleteGroup {
                    route: Route::new(kind, None, config.clone()),
                    files,
                }]
            }
            CdnConfig::Multiple(routes) => group_by_backend(routes, &files)?,
        };

        if groups.is_empty() {
            info!("No recorded route selects any previous file");
            return Ok(0);
        }

        let routes: Vec<Route> = groups.iter().map(|g| g.route.clone()).collect();
        let registry = BackendRegistry::resolve(self.factory, &routes).await?;
        let result = Self::delete_groups(&registry, &groups).await;
        registry.close().await;
        result
    }

    async fn delete_groups(registry: &BackendRegistry, groups: &[DeleteGroup]) -> CleanupResult<u64> {
        let deletions = groups.iter().map(|group| async move {
            let kind = group.route.kind();
            let client = registry.get(kind)?;
            debug!(backend = %kind, files = group.files.len(), "Deleting previous files");
            client
                .delete_many(group.route.config(), &group.files)
                .await
                .map(|count| (kind, count))
                .map_err(|source| CleanupError::Backend {
                    backend: kind.to_string(),
                    source,
                })
        });

        let mut total = 0;
        let mut first_error = None;
        for result in join_all(deletions).await {
            match result {
                Ok((kind, count)) => {
                    metrics::record_deleted(kind, count);
                    total += count;
                }
                Err(e) => {
                    warn!(error = %e, "Previous file deletion failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }
}
