//! Payload materialization into a working directory

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::errors::WorkerError;
use crate::filesys::paths::{display_relative, sanitize_relative};
use crate::filesys::workdir::WorkDir;
use crate::models::request::Payload;
use crate::utils::sha256_hash;

/// Write `payload` into the working directory's files root.
///
/// Returns the materialized files as sorted, `/`-separated relative paths.
pub async fn materialize(payload: &Payload, workdir: &WorkDir) -> Result<Vec<String>, WorkerError> {
    match payload {
        Payload::Archive(bytes) => extract_archive(bytes, workdir).await,
        Payload::InlineFile { content, filename } => {
            write_inline_file(content, filename, workdir).await
        }
    }
}

async fn write_inline_file(
    content: &str,
    filename: &str,
    workdir: &WorkDir,
) -> Result<Vec<String>, WorkerError> {
    let path = workdir.resolve(filename)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, content.as_bytes()).await?;
    info!("Created file: {} ({} bytes)", path.display(), content.len());

    let relative = path
        .strip_prefix(workdir.files_root())
        .map(display_relative)
        .unwrap_or_else(|_| filename.to_string());
    Ok(vec![relative])
}

async fn extract_archive(bytes: &[u8], workdir: &WorkDir) -> Result<Vec<String>, WorkerError> {
    info!(
        "Extracting artifact ({} bytes, sha256 {})",
        bytes.len(),
        sha256_hash(bytes)
    );

    let bytes = bytes.to_vec();
    let root = workdir.files_root().to_path_buf();
    let files = tokio::task::spawn_blocking(move || extract_zip(&bytes, &root))
        .await
        .context("Archive extraction task failed")??;

    info!("Extracted {} files", files.len());
    Ok(files)
}

/// One archive entry, validated before anything is written
struct PlannedEntry {
    index: usize,
    relative: PathBuf,
    is_dir: bool,
    unix_mode: Option<u32>,
}

fn extract_zip(bytes: &[u8], root: &Path) -> Result<Vec<String>, WorkerError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    // Every entry is checked first so a hostile archive leaves nothing behind
    let mut plan = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let relative = entry
            .enclosed_name()
            .and_then(sanitize_relative)
            .ok_or_else(|| {
                WorkerError::PayloadError(format!(
                    "Archive entry {:?} escapes the extraction root",
                    entry.name()
                ))
            })?;
        plan.push(PlannedEntry {
            index,
            relative,
            is_dir: entry.is_dir(),
            unix_mode: entry.unix_mode(),
        });
    }

    let mut files = Vec::new();
    for planned in plan {
        let target = root.join(&planned.relative);
        if planned.is_dir {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut entry = archive.by_index(planned.index)?;
        let mut out = fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut out).map_err(|e| {
            WorkerError::ExtractionError(format!("Failed to extract {}: {}", entry.name(), e))
        })?;
        drop(out);
        restore_permissions(&target, planned.unix_mode)?;

        debug!("Extracted {}", target.display());
        files.push(display_relative(&planned.relative));
    }

    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(unix)]
fn restore_permissions(path: &Path, unix_mode: Option<u32>) -> Result<(), WorkerError> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = unix_mode {
        // Owner keeps read/write so cleanup and rewrites never fail
        let mode = (mode & 0o777) | 0o600;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restore_permissions(_path: &Path, _unix_mode: Option<u32>) -> Result<(), WorkerError> {
    Ok(())
}
