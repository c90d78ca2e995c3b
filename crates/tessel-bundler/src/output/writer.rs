//! All-or-nothing commit of a build into its output directory.
//!
//! Files are first written into a uniquely named staging directory inside
//! the output directory, so the final renames never cross a filesystem
//! boundary. Only after every file is staged are they renamed into place,
//! the manifest last. A failure at any point removes the staging directory
//! and leaves the previous manifest, and therefore the previous build, in
//! effect.
//!
//! Every output name is validated against the directory it is written to,
//! so names like `../../etc/passwd` are rejected before anything is written.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::{Error, Result};

/// Prefix of staging directories inside the output directory.
pub const STAGING_PREFIX: &str = ".staging-";

/// One file ready to be written, by output-relative name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Normalizes a directory path, making it absolute against the working
/// directory when it is relative.
pub fn validate_and_normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();

    let absolute = if cleaned.is_absolute() {
        cleaned
    } else {
        std::env::current_dir()
            .map_err(|e| {
                Error::InvalidOutputPath(format!("Failed to get current directory: {}", e))
            })?
            .join(&cleaned)
            .clean()
    };

    Ok(absolute)
}

/// Joins `filename` onto `base_dir`, rejecting anything that would land
/// outside it.
pub fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.is_empty() {
        return Err(Error::InvalidOutputPath("Filename is empty".to_string()));
    }
    if filename.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "Filename contains null byte".to_string(),
        ));
    }

    #[cfg(target_os = "windows")]
    {
        let upper = filename.to_uppercase();
        let device_names = [
            "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
            "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
        ];
        for device in &device_names {
            if upper == *device || upper.starts_with(&format!("{}.", device)) {
                return Err(Error::InvalidOutputPath(format!(
                    "Filename is a reserved device name: {}",
                    filename
                )));
            }
        }
    }

    let filename_path = Path::new(filename).clean();
    let full_path = base_dir.join(&filename_path).clean();

    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}' (resolved to '{}')",
            filename,
            base_dir.display(),
            full_path.display()
        )));
    }

    Ok(full_path)
}

/// Write `files` and then `manifest` into `out_dir` in one step.
///
/// With `clean`, files in `out_dir` that are not part of this commit are
/// removed afterwards. Returns the number of stale files removed.
pub fn commit(out_dir: &Path, files: &[PendingFile], manifest: &PendingFile, clean: bool) -> Result<usize> {
    let out_dir = validate_and_normalize_dir(out_dir)?;
    fs::create_dir_all(&out_dir).map_err(|e| Error::write(&out_dir, e))?;

    // Validate every name before touching the disk.
    let mut targets = Vec::with_capacity(files.len() + 1);
    for file in files.iter().chain(std::iter::once(manifest)) {
        targets.push((file, validate_output_path(&out_dir, &file.name)?));
    }

    let staging = out_dir.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4()));
    fs::create_dir(&staging).map_err(|e| Error::write(&staging, e))?;
    tracing::debug!(staging = %staging.display(), files = targets.len(), "staging output");

    let result = stage_and_publish(&staging, &targets);
    remove_staging(&staging);
    result?;

    if !clean {
        return Ok(0);
    }

    let keep: BTreeSet<PathBuf> = targets.into_iter().map(|(_, target)| target).collect();
    Ok(remove_stale(&out_dir, &keep))
}

fn stage_and_publish(staging: &Path, targets: &[(&PendingFile, PathBuf)]) -> Result<()> {
    // Phase 1: write everything into the staging directory
    let mut staged = Vec::with_capacity(targets.len());
    for (file, target) in targets {
        let staged_path = validate_output_path(staging, &file.name)?;
        if let Some(parent) = staged_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::write(parent, e))?;
        }
        fs::write(&staged_path, &file.bytes).map_err(|e| Error::write(target, e))?;
        staged.push((staged_path, target));
    }

    // Phase 2: rename into place; the manifest is last in `targets`
    for (staged_path, target) in staged {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::write(parent, e))?;
        }
        fs::rename(&staged_path, target).map_err(|e| Error::write(target, e))?;
    }

    Ok(())
}

/// Best-effort removal; we are either done or already failing.
fn remove_staging(staging: &Path) {
    if staging.exists() {
        if let Err(e) = fs::remove_dir_all(staging) {
            tracing::warn!(
                path = %staging.display(),
                error = %e,
                "failed to remove staging directory"
            );
        }
    }
}

/// Remove files under `out_dir` not in `keep`, then any emptied directories.
fn remove_stale(out_dir: &Path, keep: &BTreeSet<PathBuf>) -> usize {
    let mut removed = 0;

    for entry in WalkDir::new(out_dir)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        let path = entry.path();
        if entry.file_type().is_dir() {
            // Only succeeds when the directory is empty.
            let _ = fs::remove_dir(path);
            continue;
        }
        if keep.contains(path) {
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed stale output");
                removed += 1;
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove stale output"),
        }
    }

    removed
}
