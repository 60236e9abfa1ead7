//! Ephemeral per-request working directory

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::errors::WorkerError;
use crate::filesys::paths::{display_relative, sanitize_relative};
use crate::utils::generate_uuid;

const FILES_DIR: &str = "files";

/// A temporary directory owned by exactly one deployment.
///
/// Materialized files live under [`WorkDir::files_root`]; scratch files the
/// worker needs for itself live next to it in [`WorkDir::root`] so they never
/// show up in the file listing. [`WorkDir::remove`] deletes the tree without
/// blocking the runtime; if the value is dropped instead (early return,
/// cancellation, unwinding) the tree is removed synchronously in `Drop`.
#[derive(Debug)]
pub struct WorkDir {
    root: PathBuf,
    files: PathBuf,
    removed: bool,
}

impl WorkDir {
    /// Create a fresh working directory under the system temp dir
    pub async fn create(prefix: &str) -> Result<Self, WorkerError> {
        Self::create_in(&std::env::temp_dir(), prefix).await
    }

    /// Create a fresh working directory under `parent`
    pub async fn create_in(parent: &Path, prefix: &str) -> Result<Self, WorkerError> {
        let root = parent.join(format!("{}-{}", prefix, generate_uuid()));
        let workdir = Self {
            files: root.join(FILES_DIR),
            root,
            removed: false,
        };
        // The guard exists before anything touches the disk, so a partial
        // create is still cleaned up.
        fs::create_dir_all(&workdir.files).await?;
        debug!("Created working directory: {}", workdir.root.display());
        Ok(workdir)
    }

    /// Directory holding the whole scope
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory materialized files are written to and entrypoints run in
    pub fn files_root(&self) -> &Path {
        &self.files
    }

    /// Path for a worker-private scratch file
    pub fn scratch_file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Resolve a caller-supplied relative path under the files root
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, WorkerError> {
        sanitize_relative(Path::new(relative))
            .map(|clean| self.files.join(clean))
            .ok_or_else(|| {
                WorkerError::PayloadError(format!(
                    "Path {:?} escapes the working directory",
                    relative
                ))
            })
    }

    /// List every regular file under the files root, relative and sorted
    pub async fn list_files(&self) -> Result<Vec<String>, WorkerError> {
        let mut files = Vec::new();
        let mut pending = vec![self.files.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Ok(relative) = path.strip_prefix(&self.files) {
                        files.push(display_relative(relative));
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Delete the tree on the async runtime's blocking pool
    pub async fn remove(mut self) {
        let result = fs::remove_dir_all(&self.root).await;
        self.removed = true;
        log_removal(&self.root, result);
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if !self.removed {
            log_removal(&self.root, std::fs::remove_dir_all(&self.root));
        }
    }
}

fn log_removal(root: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => debug!("Removed working directory: {}", root.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove working directory {}: {}", root.display(), e),
    }
}
