//! Executables on the search path
//!
//! Caches the names of executable files found in `PATH` so the resolver can
//! answer "is this a program?" without touching the filesystem each time.

use async_trait::async_trait;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Answers whether a command name is a runnable executable
#[async_trait]
pub trait ExecutableLookup: Send + Sync {
    async fn contains(&self, name: &str) -> bool;
}

/// A fixed set of names, mostly for tests and embedding
#[async_trait]
impl ExecutableLookup for HashSet<String> {
    async fn contains(&self, name: &str) -> bool {
        HashSet::contains(self, name)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    names: HashSet<String>,
    updated: Option<Instant>,
}

/// Lazily refreshed cache of the executables in `PATH`
#[derive(Debug)]
pub struct PathExecutables {
    state: RwLock<CacheState>,
    /// Cache lifetime (5 minutes unless configured)
    refresh_interval: Duration,
    /// Search path override; `None` reads `PATH` on every refresh
    search_path: Option<OsString>,
}

impl Default for PathExecutables {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl PathExecutables {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            refresh_interval,
            search_path: None,
        }
    }

    /// Scan `search_path` instead of the process's `PATH`
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// Rescan the search path now
    pub async fn refresh(&self) {
        let search_path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"));

        let names = match tokio::task::spawn_blocking(move || scan_search_path(search_path)).await
        {
            Ok(names) => names,
            Err(e) => {
                warn!("PATH scan task failed: {}", e);
                return;
            }
        };

        debug!("Executable cache refreshed: {} entries", names.len());
        let mut state = self.state.write().await;
        state.names = names;
        state.updated = Some(Instant::now());
    }

    async fn refresh_if_needed(&self) {
        let stale = {
            let state = self.state.read().await;
            state
                .updated
                .map(|updated| updated.elapsed() > self.refresh_interval)
                .unwrap_or(true)
        };

        if stale {
            self.refresh().await;
        }
    }

    /// Number of cached names
    pub async fn len(&self) -> usize {
        self.refresh_if_needed().await;
        self.state.read().await.names.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ExecutableLookup for PathExecutables {
    async fn contains(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        self.refresh_if_needed().await;
        self.state.read().await.names.contains(name)
    }
}

/// Collect executable file names from every directory in `search_path`
fn scan_search_path(search_path: Option<OsString>) -> HashSet<String> {
    let mut names = HashSet::new();
    let Some(search_path) = search_path else {
        return names;
    };

    for dir in std::env::split_paths(&search_path) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            // Follow symlinks: most of /usr/bin on some systems is links
            let Ok(metadata) = fs::metadata(entry.path()) else {
                continue;
            };
            if metadata.is_file() && is_executable(&entry.path(), &metadata) {
                insert_name(&mut names, filename);
            }
        }
    }
    names
}

#[cfg(unix)]
fn is_executable(_path: &Path, metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(windows)]
fn is_executable(path: &Path, _metadata: &fs::Metadata) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "exe" | "bat" | "cmd" | "com"))
        .unwrap_or(false)
}

#[cfg(unix)]
fn insert_name(names: &mut HashSet<String>, filename: String) {
    names.insert(filename);
}

#[cfg(windows)]
fn insert_name(names: &mut HashSet<String>, filename: String) {
    // `git` should match `git.exe`
    if let Some(stem) = Path::new(&filename).file_stem().and_then(|s| s.to_str()) {
        names.insert(stem.to_string());
    }
    names.insert(filename);
}
