//! Periodic reclamation of abandoned report working directories.
//!
//! A directory under the cache root is alive while it contains its lockfile
//! (or the in-flight rename variant); anything else is left over from a
//! finished or dead request and is removed on the next sweep. The sweep is
//! time-bounded garbage collection, not a transactional guarantee.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

use crate::reports::workdir::{LOCKFILE, LOCKFILE_TMP};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(3);

async fn is_locked(dir: &Path) -> bool {
    for marker in [LOCKFILE, LOCKFILE_TMP] {
        if fs::try_exists(dir.join(marker)).await.unwrap_or(false) {
            return true;
        }
    }
    false
}

/// One pass over the cache root. Returns the directories removed.
pub async fn sweep_once(cache_root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    let mut entries = match fs::read_dir(cache_root).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
        Err(err) => return Err(err),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        if is_locked(&path).await {
            continue;
        }
        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "swept stale report directory");
                removed.push(path);
            }
            Err(err) => warn!(path = %path.display(), error = %err, "sweep failed"),
        }
    }
    Ok(removed)
}

/// Run the sweep at a fixed interval for the life of the process.
pub fn spawn(cache_root: PathBuf) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(err) = sweep_once(&cache_root).await {
                warn!(error = %err, "cache sweep failed");
            }
        }
    });
}
