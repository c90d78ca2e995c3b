//! Shared fixtures for tessel-bundler integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tessel_bundler::{BuildReport, Pipeline, Result};
use tessel_config::BuildOptions;
use walkdir::WalkDir;

/// A throwaway project directory with sources under it and output in `dist`.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> &Self {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write source");
        self
    }

    pub fn out(&self) -> PathBuf {
        self.root().join("dist")
    }

    pub fn read_out(&self, name: &str) -> String {
        fs::read_to_string(self.out().join(name))
            .unwrap_or_else(|e| panic!("read {}: {}", name, e))
    }

    /// Output files relative to `dist`, sorted.
    pub fn out_files(&self) -> Vec<String> {
        let out = self.out();
        if !out.exists() {
            return Vec::new();
        }
        let mut files: Vec<String> = WalkDir::new(&out)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                e.path()
                    .strip_prefix(&out)
                    .expect("under dist")
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();
        files
    }

    pub async fn build(&self, options: BuildOptions) -> Result<BuildReport> {
        Pipeline::new(self.root(), options).run().await
    }
}

/// Options with the given `(name, path)` entries and defaults otherwise.
pub fn options(entries: &[(&str, &str)]) -> BuildOptions {
    entries
        .iter()
        .fold(BuildOptions::default(), |options, (name, path)| {
            options.with_entry(*name, *path)
        })
}
