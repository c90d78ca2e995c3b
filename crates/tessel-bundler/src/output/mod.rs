//! Chunk emission: payloads, file names, the HTML document and the manifest.

pub mod html;
pub mod manifest;
mod payload;
pub mod writer;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tessel_config::{BuildOptions, ConfigError, HtmlOptions};

use crate::asset::{Placement, ReferenceKind};
use crate::graph::AssetGraph;
use crate::planner::{Chunk, ChunkKind, required_closure};
use crate::{Error, Result};

pub use manifest::{MANIFEST_FILE, Manifest, ManifestChunk};
pub use writer::PendingFile;

/// A file produced by a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedFile {
    /// Path relative to the output directory
    pub name: String,
    pub size: u64,
    /// Kind of the chunk the file belongs to; `None` for the HTML document
    /// and the manifest
    pub chunk: Option<ChunkKind>,
}

/// Everything a build writes, held in memory until committed.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub files: Vec<PendingFile>,
    pub manifest_file: PendingFile,
    pub manifest: Manifest,
    pub emitted: Vec<EmittedFile>,
}

#[derive(Debug, Clone)]
pub struct Emitter {
    hash_length: usize,
    manifest_name: String,
    clean: bool,
    html: Option<HtmlOptions>,
    template: Option<String>,
    project_root: PathBuf,
}

impl Emitter {
    pub fn new(options: &BuildOptions) -> Self {
        Self {
            hash_length: options.hash_length,
            manifest_name: options.manifest.clone(),
            clean: options.clean,
            html: options.html.clone(),
            template: None,
            project_root: PathBuf::from("."),
        }
    }

    /// Directory the HTML template path is relative to.
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    /// Use `template` instead of reading the configured template file.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Render and commit into `output_root`.
    pub fn emit(&self, graph: &AssetGraph, chunks: &[Chunk], output_root: &Path) -> Result<Manifest> {
        let rendered = self.render(graph, chunks)?;
        self.commit(&rendered, output_root)?;
        Ok(rendered.manifest)
    }

    /// Write a rendered build. Returns the number of stale files removed.
    pub fn commit(&self, rendered: &Rendered, output_root: &Path) -> Result<usize> {
        writer::commit(output_root, &rendered.files, &rendered.manifest_file, self.clean)
    }

    /// Produce every output file and the manifest without touching the disk.
    pub fn render(&self, graph: &AssetGraph, chunks: &[Chunk]) -> Result<Rendered> {
        let mut manifest = Manifest::default();
        let mut files: Vec<PendingFile> = Vec::new();
        let mut emitted: Vec<EmittedFile> = Vec::new();
        let mut chunk_files: Vec<Vec<String>> = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let hash = &chunk.id[..self.hash_length.min(chunk.id.len())];
            let mut names = Vec::new();

            let mut push = |name: String, bytes: Vec<u8>| -> Result<()> {
                tracing::debug!(file = %name, chunk = %chunk.name, bytes = bytes.len(), "chunk file rendered");
                if let Some(existing) = files.iter().find(|f| f.name == name) {
                    if existing.bytes != bytes {
                        return Err(Error::InvalidOutputPath(format!(
                            "two chunks render different content to '{}'",
                            name
                        )));
                    }
                } else {
                    emitted.push(EmittedFile {
                        name: name.clone(),
                        size: bytes.len() as u64,
                        chunk: Some(chunk.kind),
                    });
                    files.push(PendingFile::new(name.clone(), bytes));
                }
                names.push(name);
                Ok(())
            };

            for asset in chunk.members.iter().filter_map(|m| graph.get(m)) {
                if asset.placement != Placement::File {
                    continue;
                }
                let name = match asset.extension() {
                    Some(ext) => format!("{}.{}.{}", chunk.name, hash, ext),
                    None => format!("{}.{}", chunk.name, hash),
                };
                manifest.assets.insert(asset.id.clone(), name.clone());
                push(name, asset.bytes.clone())?;
            }

            let suffix = match chunk.kind {
                ChunkKind::Entry => "",
                _ => ".chunk",
            };
            if payload::has_script(graph, chunk) {
                push(
                    format!("{}.{}{}.js", chunk.name, hash, suffix),
                    payload::script(graph, chunk),
                )?;
            }
            if payload::has_style(graph, chunk) {
                push(
                    format!("{}.{}{}.css", chunk.name, hash, suffix),
                    payload::stylesheet(graph, chunk),
                )?;
            }

            chunk_files.push(names);
        }

        let eager_files = |index: usize| -> Vec<String> {
            let mut list = chunk_files[index].clone();
            for required in required_closure(chunks, &chunks[index]) {
                if let Some(at) = chunks.iter().position(|c| std::ptr::eq(c, required)) {
                    for name in &chunk_files[at] {
                        if !list.contains(name) {
                            list.push(name.clone());
                        }
                    }
                }
            }
            list
        };

        for (name, path) in graph.entries() {
            let index = chunks
                .iter()
                .position(|c| c.kind == ChunkKind::Entry && c.root.as_deref() == Some(path.as_path()));
            if let Some(index) = index {
                manifest.entries.insert(name.clone(), eager_files(index));
                let lazily_imported = graph
                    .edges()
                    .any(|edge| edge.kind == ReferenceKind::Lazy && edge.to == *path);
                if let Some(entry) = graph.get(path).filter(|_| lazily_imported) {
                    manifest.lazy.insert(entry.id.clone(), eager_files(index));
                }
            }
        }

        for (index, chunk) in chunks.iter().enumerate() {
            if chunk.kind != ChunkKind::Lazy {
                continue;
            }
            if let Some(root) = chunk.root.as_deref().and_then(|p| graph.get(p)) {
                manifest.lazy.insert(root.id.clone(), eager_files(index));
            }
        }

        for (chunk, names) in chunks.iter().zip(&chunk_files) {
            let size = names
                .iter()
                .filter_map(|n| files.iter().find(|f| &f.name == n))
                .map(|f| f.bytes.len() as u64)
                .sum();
            manifest.chunks.push(ManifestChunk {
                id: chunk.id.clone(),
                kind: chunk.kind,
                name: chunk.name.clone(),
                files: names.clone(),
                members: chunk
                    .members
                    .iter()
                    .filter_map(|m| graph.get(m))
                    .map(|a| a.id.clone())
                    .collect(),
                requires: chunk.requires.clone(),
                size,
            });
        }

        if let Some(html) = &self.html {
            let document = self.render_html(html, &manifest)?;
            emitted.push(EmittedFile {
                name: html.filename.clone(),
                size: document.len() as u64,
                chunk: None,
            });
            files.push(PendingFile::new(html.filename.clone(), document));
            manifest.html = Some(html.filename.clone());
        }

        let manifest_json = manifest.to_json()?;
        emitted.push(EmittedFile {
            name: self.manifest_name.clone(),
            size: manifest_json.len() as u64,
            chunk: None,
        });

        Ok(Rendered {
            files,
            manifest_file: PendingFile::new(self.manifest_name.clone(), manifest_json),
            manifest,
            emitted,
        })
    }

    fn render_html(&self, html: &HtmlOptions, manifest: &Manifest) -> Result<String> {
        let template = match &self.template {
            Some(template) => template.clone(),
            None => {
                let path = self.project_root.join(&html.template);
                std::fs::read_to_string(&path)
                    .map_err(|_| Error::Config(ConfigError::TemplateNotFound(path)))?
            }
        };

        let entry = html
            .entry
            .as_deref()
            .or_else(|| manifest.entries.keys().next().map(String::as_str));
        let eager: &[String] = entry
            .and_then(|name| manifest.entry_files(name))
            .unwrap_or(&[]);

        let styles: Vec<String> = eager.iter().filter(|f| f.ends_with(".css")).cloned().collect();
        let scripts: Vec<String> = eager.iter().filter(|f| f.ends_with(".js")).cloned().collect();

        Ok(html::inject(&template, &styles, &scripts, &manifest.runtime_json()?))
    }
}
