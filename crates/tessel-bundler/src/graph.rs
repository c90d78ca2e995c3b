//! The asset graph produced by [`GraphBuilder`](crate::GraphBuilder).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::asset::{Asset, DependencyEdge, ReferenceKind};

/// Assets keyed by identity plus the named entries they were discovered from.
///
/// Iteration is ordered by path, so nothing downstream depends on the order
/// in which concurrent transforms finished.
#[derive(Debug, Clone, Default)]
pub struct AssetGraph {
    root: PathBuf,
    entries: IndexMap<String, PathBuf>,
    assets: BTreeMap<PathBuf, Asset>,
}

impl AssetGraph {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: IndexMap::new(),
            assets: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Logical entry name -> resolved entry path, in configuration order.
    pub fn entries(&self) -> &IndexMap<String, PathBuf> {
        &self.entries
    }

    pub(crate) fn add_entry(&mut self, name: impl Into<String>, path: PathBuf) {
        self.entries.insert(name.into(), path);
    }

    pub(crate) fn insert(&mut self, asset: Asset) {
        self.assets.insert(asset.path.clone(), asset);
    }

    pub fn get(&self, path: &Path) -> Option<&Asset> {
        self.assets.get(path)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Asset> {
        self.assets.values().find(|asset| asset.id == id)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.assets.contains_key(path)
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn is_entry(&self, path: &Path) -> bool {
        self.entries.values().any(|entry| entry == path)
    }

    /// Every edge, grouped by source asset in path order.
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.assets.values().flat_map(|asset| asset.dependencies.iter())
    }

    /// Targets of lazy edges that are not entries, sorted by id.
    pub fn lazy_roots(&self) -> Vec<&Asset> {
        let mut roots: Vec<&Asset> = self
            .edges()
            .filter(|edge| edge.kind == ReferenceKind::Lazy && !self.is_entry(&edge.to))
            .filter_map(|edge| self.get(&edge.to))
            .collect();
        roots.sort_by(|a, b| a.id.cmp(&b.id));
        roots.dedup_by(|a, b| a.path == b.path);
        roots
    }

    /// Total size of the source bytes read for this graph.
    pub fn source_size(&self) -> u64 {
        self.assets.values().map(|asset| asset.source_size).sum()
    }
}
