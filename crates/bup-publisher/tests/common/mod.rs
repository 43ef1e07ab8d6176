//! In-memory backends shared by the run tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bup_models::{Asset, AssetCollection, BackendKind, RouteConfig};
use bup_storage::{BackendClient, BackendFactory, StorageError, StorageResult, UploadAck};

/// Everything the fake backends saw, shared across runs.
#[derive(Default)]
pub struct Store {
    /// Stored objects per backend
    pub objects: Mutex<BTreeMap<BackendKind, HashSet<String>>>,
    pub deleted: Mutex<Vec<(BackendKind, Vec<String>)>>,
    pub created: Mutex<Vec<BackendKind>>,
    pub closed: Mutex<Vec<BackendKind>>,
    /// Names whose upload fails
    pub failing_puts: Mutex<HashSet<String>>,
    pub fail_deletes: Mutex<bool>,
}

impl Store {
    pub fn objects(&self, kind: BackendKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .get(&kind)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

pub struct FakeBackend {
    kind: BackendKind,
    store: Arc<Store>,
}

#[async_trait]
impl BackendClient for FakeBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn put(&self, _route: &RouteConfig, name: &str, _content: Vec<u8>) -> StorageResult<UploadAck> {
        tokio::task::yield_now().await;
        if self.store.failing_puts.lock().unwrap().contains(name) {
            return Err(StorageError::upload_failed(format!("{} rejected", name)));
        }
        self.store
            .objects
            .lock()
            .unwrap()
            .entry(self.kind)
            .or_default()
            .insert(name.to_string());
        Ok(UploadAck::new(name))
    }

    async fn delete_many(&self, _route: &RouteConfig, names: &[String]) -> StorageResult<u64> {
        if *self.store.fail_deletes.lock().unwrap() {
            return Err(StorageError::delete_failed("backend unavailable"));
        }
        let mut objects = self.store.objects.lock().unwrap();
        let bucket = objects.entry(self.kind).or_default();
        let removed = names.iter().filter(|n| bucket.remove(n.as_str())).count();
        self.store
            .deleted
            .lock()
            .unwrap()
            .push((self.kind, names.to_vec()));
        Ok(removed as u64)
    }

    async fn close(&self) -> StorageResult<()> {
        self.store.closed.lock().unwrap().push(self.kind);
        Ok(())
    }
}

pub struct FakeFactory {
    pub store: Arc<Store>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(Store::default()),
        })
    }
}

#[async_trait]
impl BackendFactory for FakeFactory {
    async fn create(&self, kind: BackendKind, route: &RouteConfig) -> StorageResult<Arc<dyn BackendClient>> {
        if kind.requires_key_pair() && !route.has_key_pair() {
            return Err(StorageError::MissingCredentials(kind));
        }
        self.store.created.lock().unwrap().push(kind);
        Ok(Arc::new(FakeBackend {
            kind,
            store: self.store.clone(),
        }))
    }
}

pub fn keyed(kind: BackendKind, bucket: &str, test: Option<&str>) -> RouteConfig {
    let mut route = RouteConfig::new(kind);
    route.access_key = Some("ak".into());
    route.secret_key = Some("sk".into());
    route.bucket = Some(bucket.into());
    route.test = test.map(str::to_string);
    route
}

pub fn ftp(dest: &str, test: Option<&str>) -> RouteConfig {
    let mut route = RouteConfig::new(BackendKind::Ftp);
    route.host = Some("ftp.example.com".into());
    route.dest_path = Some(dest.into());
    route.test = test.map(str::to_string);
    route
}

/// Write files below `root` and return them as an asset collection.
pub fn write_assets(root: &Path, files: &[&str]) -> AssetCollection {
    let mut assets = AssetCollection::new();
    for file in files {
        let path = root.join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, format!("// {}", file)).unwrap();
        assets.insert(file.to_string(), Asset::from_path(path));
    }
    assets
}
