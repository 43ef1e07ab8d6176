//! Directory-oriented file transfer client (FTP).
//!
//! The client owns one control session for the whole run. Concurrent
//! operations queue on an async mutex, which also guards the set of remote
//! directories already ensured so each parent directory is checked and
//! created at most once.

use std::collections::{BTreeSet, HashSet};
use std::io::Cursor;
use std::str::FromStr;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use bup_models::{BackendKind, RouteConfig};
use suppaftp::list::File as ListEntry;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::{BackendClient, UploadAck};
use crate::error::{StorageError, StorageResult};

/// Default control port.
pub const DEFAULT_PORT: u16 = 21;

/// Wire-level operations of one FTP control session.
#[async_trait]
pub trait FtpSession: Send {
    /// Names inside a directory. Fails when the directory is absent.
    async fn list(&mut self, path: &str) -> StorageResult<Vec<String>>;

    /// Create a single directory.
    async fn mkdir(&mut self, path: &str) -> StorageResult<()>;

    /// Store a file, returning the number of bytes written.
    async fn put(&mut self, path: &str, content: Vec<u8>) -> StorageResult<u64>;

    /// Delete a single file.
    async fn delete(&mut self, path: &str) -> StorageResult<()>;

    /// Remove a directory and everything below it.
    async fn remove_dir_all(&mut self, path: &str) -> StorageResult<()>;

    /// End the session.
    async fn quit(&mut self) -> StorageResult<()>;
}

/// Connection settings taken from an FTP route.
#[derive(Debug, Clone)]
pub struct FtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl FtpSettings {
    pub fn from_route(route: &RouteConfig) -> StorageResult<Self> {
        let host = route
            .host
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| StorageError::config_error("FTP route has no host"))?;

        Ok(Self {
            host,
            port: route.port.unwrap_or(DEFAULT_PORT),
            user: route.user.clone().unwrap_or_else(|| "anonymous".to_string()),
            password: route
                .password
                .clone()
                .unwrap_or_else(|| "anonymous@".to_string()),
        })
    }
}

// ============================================================================
// suppaftp session
// ============================================================================

/// [`FtpSession`] backed by a blocking `suppaftp` stream.
///
/// Each command runs on the blocking pool; the stream itself is only ever
/// touched by one command at a time.
pub struct SuppaFtpSession {
    stream: Arc<StdMutex<FtpStream>>,
}

fn ftp_err(context: &str, path: &str, e: FtpError) -> String {
    format!("{} {}: {}", context, path, e)
}

impl SuppaFtpSession {
    /// Connect, log in and switch to binary transfers.
    pub async fn connect(settings: FtpSettings) -> StorageResult<Self> {
        let stream = tokio::task::spawn_blocking(move || -> StorageResult<FtpStream> {
            let address = format!("{}:{}", settings.host, settings.port);
            let mut stream = FtpStream::connect(address.as_str())
                .map_err(|e| StorageError::connection_failed(ftp_err("connect", &address, e)))?;
            stream
                .login(settings.user.as_str(), settings.password.as_str())
                .map_err(|e| StorageError::connection_failed(ftp_err("login", &address, e)))?;
            stream
                .transfer_type(FileType::Binary)
                .map_err(|e| StorageError::connection_failed(ftp_err("TYPE I", &address, e)))?;
            Ok(stream)
        })
        .await
        .map_err(|e| StorageError::connection_failed(e.to_string()))??;

        Ok(Self {
            stream: Arc::new(StdMutex::new(stream)),
        })
    }

    async fn run<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> StorageResult<T> + Send + 'static,
    {
        let stream = Arc::clone(&self.stream);
        tokio::task::spawn_blocking(move || {
            let mut guard = stream
                .lock()
                .map_err(|_| StorageError::connection_failed("FTP session lock poisoned"))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| StorageError::connection_failed(e.to_string()))?
    }
}

fn remove_tree(stream: &mut FtpStream, path: &str) -> Result<(), FtpError> {
    for line in stream.list(Some(path))? {
        let Ok(entry) = ListEntry::from_str(&line) else {
            continue;
        };
        let name = entry.name();
        if name == "." || name == ".." {
            continue;
        }

        let child = format!("{}/{}", path.trim_end_matches('/'), name);
        if entry.is_directory() {
            remove_tree(stream, &child)?;
        } else {
            stream.rm(&child)?;
        }
    }
    stream.rmdir(path)
}

#[async_trait]
impl FtpSession for SuppaFtpSession {
    async fn list(&mut self, path: &str) -> StorageResult<Vec<String>> {
        let path = path.to_string();
        self.run(move |s| {
            s.nlst(Some(&path))
                .map_err(|e| StorageError::ListFailed(ftp_err("NLST", &path, e)))
        })
        .await
    }

    async fn mkdir(&mut self, path: &str) -> StorageResult<()> {
        let path = path.to_string();
        self.run(move |s| {
            s.mkdir(&path)
                .map_err(|e| StorageError::MkdirFailed(ftp_err("MKD", &path, e)))
        })
        .await
    }

    async fn put(&mut self, path: &str, content: Vec<u8>) -> StorageResult<u64> {
        let path = path.to_string();
        self.run(move |s| {
            s.put_file(&path, &mut Cursor::new(content))
                .map_err(|e| StorageError::upload_failed(ftp_err("STOR", &path, e)))
        })
        .await
    }

    async fn delete(&mut self, path: &str) -> StorageResult<()> {
        let path = path.to_string();
        self.run(move |s| {
            s.rm(&path)
                .map_err(|e| StorageError::delete_failed(ftp_err("DELE", &path, e)))
        })
        .await
    }

    async fn remove_dir_all(&mut self, path: &str) -> StorageResult<()> {
        let path = path.to_string();
        self.run(move |s| {
            remove_tree(s, &path).map_err(|e| StorageError::delete_failed(ftp_err("RMD", &path, e)))
        })
        .await
    }

    async fn quit(&mut self) -> StorageResult<()> {
        self.run(|s| {
            s.quit()
                .map_err(|e| StorageError::connection_failed(format!("QUIT: {}", e)))
        })
        .await
    }
}

// ============================================================================
// Path helpers
// ============================================================================

/// Remote root of a route: `destPath` without its trailing slash.
fn dest_root(route: &RouteConfig) -> StorageResult<&str> {
    route
        .dest_path
        .as_deref()
        .map(|p| p.trim_end_matches('/'))
        .ok_or_else(|| StorageError::config_error("Invalid ftp destination path"))
}

/// Remote path of a logical name below `root`.
pub fn remote_path(root: &str, name: &str) -> String {
    format!("{}/{}", root.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Directory part of a path, `None` for a bare name.
pub fn parent_dir(path: &str) -> Option<&str> {
    path.rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}

/// Every ancestor of `dir` including itself, outermost first.
fn directory_prefixes(dir: &str) -> Vec<String> {
    let absolute = dir.starts_with('/');
    let mut prefixes = Vec::new();
    let mut current = String::new();
    for part in dir.split('/').filter(|p| !p.is_empty()) {
        if absolute || !current.is_empty() {
            current.push('/');
        }
        current.push_str(part);
        prefixes.push(current.clone());
    }
    prefixes
}

/// How a batch of logical names is removed from a directory backend.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeletePlan {
    /// Parent directories removed recursively, each exactly once
    pub directories: Vec<String>,
    /// Top-level names deleted one by one
    pub files: Vec<String>,
}

impl DeletePlan {
    /// Group names by parent directory.
    ///
    /// Names with a directory part are covered by removing that directory.
    /// Directories nested inside another selected directory are dropped, since
    /// the outer removal already covers them.
    pub fn build(names: &[String]) -> Self {
        let mut directories = BTreeSet::new();
        let mut files = Vec::new();
        let mut seen_files = HashSet::new();

        for name in names {
            let name = name.trim_start_matches('/');
            match parent_dir(name) {
                Some(parent) => {
                    directories.insert(parent.to_string());
                }
                None => {
                    if seen_files.insert(name.to_string()) {
                        files.push(name.to_string());
                    }
                }
            }
        }

        let directories = directories
            .iter()
            .filter(|dir| {
                !directories
                    .iter()
                    .any(|outer| outer != *dir && dir.starts_with(&format!("{}/", outer)))
            })
            .cloned()
            .collect();

        Self { directories, files }
    }
}

// ============================================================================
// Client
// ============================================================================

struct SessionState {
    session: Option<Box<dyn FtpSession>>,
    ensured: HashSet<String>,
}

impl SessionState {
    fn session(&mut self) -> StorageResult<&mut Box<dyn FtpSession>> {
        self.session.as_mut().ok_or(StorageError::SessionClosed)
    }

    /// List `dir`; when it is empty or absent, create it and its ancestors.
    async fn ensure_directory(&mut self, dir: &str) -> StorageResult<()> {
        if dir.is_empty() || self.ensured.contains(dir) {
            return Ok(());
        }

        let session = self.session()?;
        let present = matches!(session.list(dir).await, Ok(entries) if !entries.is_empty());
        if !present {
            debug!(dir = %dir, "Creating remote directory");
            for prefix in directory_prefixes(dir) {
                // Existing ancestors reject MKD; the following STOR reports
                // anything that is really missing.
                if let Err(e) = session.mkdir(&prefix).await {
                    debug!(dir = %prefix, error = %e, "MKD rejected");
                }
            }
        }

        self.ensured.insert(dir.to_string());
        Ok(())
    }

    fn forget_below(&mut self, dir: &str) {
        let nested = format!("{}/", dir);
        self.ensured.retain(|d| d != dir && !d.starts_with(&nested));
    }
}

/// FTP backend client holding one session for the run.
pub struct FtpClient {
    state: Mutex<SessionState>,
}

impl FtpClient {
    /// Connect to the route's server and prepare its destination directory.
    pub async fn connect(route: &RouteConfig) -> StorageResult<Self> {
        let root = dest_root(route)?.to_string();
        let settings = FtpSettings::from_route(route)?;
        info!("Connecting to ftp {}:{}", settings.host, settings.port);

        let session = SuppaFtpSession::connect(settings).await?;
        Self::open(Box::new(session), &root).await
    }

    /// Wrap an established session, making sure `root` exists.
    pub async fn open(session: Box<dyn FtpSession>, root: &str) -> StorageResult<Self> {
        let mut state = SessionState {
            session: Some(session),
            ensured: HashSet::new(),
        };

        if let Err(e) = state.ensure_directory(root.trim_end_matches('/')).await {
            if let Some(mut session) = state.session.take() {
                session.quit().await.ok();
            }
            return Err(e);
        }

        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// List a remote directory.
    pub async fn list(&self, dir: &str) -> StorageResult<Vec<String>> {
        let mut state = self.state.lock().await;
        state.session()?.list(dir).await
    }

    /// Make sure a remote directory exists, creating it recursively.
    pub async fn ensure_directory(&self, dir: &str) -> StorageResult<()> {
        self.state.lock().await.ensure_directory(dir).await
    }
}

#[async_trait]
impl BackendClient for FtpClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Ftp
    }

    async fn put(
        &self,
        route: &RouteConfig,
        name: &str,
        content: Vec<u8>,
    ) -> StorageResult<UploadAck> {
        let path = remote_path(dest_root(route)?, name);
        let mut state = self.state.lock().await;

        if let Some(parent) = parent_dir(&path) {
            state.ensure_directory(parent).await?;
        }

        let written = state.session()?.put(&path, content).await?;
        debug!(path = %path, bytes = written, "Stored file");
        Ok(UploadAck::new(path))
    }

    async fn delete_many(&self, route: &RouteConfig, names: &[String]) -> StorageResult<u64> {
        if names.is_empty() {
            return Ok(0);
        }

        let root = dest_root(route)?;
        let plan = DeletePlan::build(names);
        let mut state = self.state.lock().await;

        for dir in &plan.directories {
            let path = remote_path(root, dir);
            debug!(dir = %path, "Removing remote directory");
            state.session()?.remove_dir_all(&path).await?;
            state.forget_below(&path);
        }

        for file in &plan.files {
            state.session()?.delete(&remote_path(root, file)).await?;
        }

        info!(
            "Deleted {} files from ftp ({} directories removed)",
            names.len(),
            plan.directories.len()
        );
        Ok(names.len() as u64)
    }

    async fn close(&self) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        match state.session.take() {
            Some(mut session) => {
                debug!("Closing ftp session");
                session.quit().await
            }
            None => Ok(()),
        }
    }
}
