//! Per-request working directories for PDF assembly.
//!
//! Each generation request gets a uniquely named directory under the cache
//! root with a sentinel lockfile written on creation. The lockfile marks the
//! directory as in use to the periodic sweeper; removing it releases the
//! directory for reclamation even if the owning request died before its own
//! cleanup ran.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

pub const LOCKFILE: &str = "lockfile";
/// In-flight rename variant the sweeper also honours.
pub const LOCKFILE_TMP: &str = "lockfile.tmp";

pub struct ReportWorkdir {
    path: PathBuf,
}

impl ReportWorkdir {
    /// Create the directory and its lockfile before any rendering starts.
    pub async fn create(cache_root: &Path) -> std::io::Result<Self> {
        let path = cache_root.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&path).await?;
        fs::write(path.join(LOCKFILE), b"").await?;
        debug!(path = %path.display(), "report workdir created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of an intermediate file inside the directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Remove every intermediate file, the lockfile, and the directory.
    pub async fn cleanup(self) -> std::io::Result<()> {
        fs::remove_dir_all(&self.path).await?;
        debug!(path = %self.path.display(), "report workdir removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn creation_writes_the_lockfile_first() {
        let root = tempfile::tempdir().unwrap();
        let workdir = ReportWorkdir::create(root.path()).await.unwrap();
        assert!(workdir.file(LOCKFILE).exists());
        workdir.cleanup().await.unwrap();
    }

    #[actix_rt::test]
    async fn concurrent_workdirs_are_distinct() {
        let root = tempfile::tempdir().unwrap();
        let mut paths = std::collections::HashSet::new();
        let mut dirs = Vec::new();
        for _ in 0..20 {
            let workdir = ReportWorkdir::create(root.path()).await.unwrap();
            paths.insert(workdir.path().to_path_buf());
            dirs.push(workdir);
        }
        assert_eq!(paths.len(), 20);
        for dir in dirs {
            dir.cleanup().await.unwrap();
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
