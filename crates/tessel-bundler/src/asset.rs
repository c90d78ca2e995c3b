//! Assets and the references between them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tessel_config::AssetKind;

/// How a reference is loaded at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// Loaded together with the referrer.
    Static,
    /// Loaded on demand; its target roots a lazy chunk.
    Lazy,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Static => f.write_str("static"),
            ReferenceKind::Lazy => f.write_str("lazy"),
        }
    }
}

/// A reference reported by a stage, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub specifier: String,
    pub kind: ReferenceKind,
}

impl Reference {
    pub fn new(specifier: impl Into<String>, kind: ReferenceKind) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
        }
    }

    pub fn static_ref(specifier: impl Into<String>) -> Self {
        Self::new(specifier, ReferenceKind::Static)
    }

    pub fn lazy(specifier: impl Into<String>) -> Self {
        Self::new(specifier, ReferenceKind::Lazy)
    }
}

/// Where an asset's bytes end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Concatenated into its chunk's script or stylesheet.
    #[default]
    Bundled,
    /// Rewritten into a module carrying a data URI; bundled like a script.
    Inlined,
    /// Emitted as a file of its own.
    File,
}

/// A resolved edge of the asset graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub from: PathBuf,
    pub to: PathBuf,
    pub kind: ReferenceKind,
    pub specifier: String,
}

/// One resolvable unit of source content, after its stage chain ran.
///
/// Identity is the normalized absolute path.
#[derive(Debug, Clone)]
pub struct Asset {
    pub path: PathBuf,
    /// Path relative to the project root with `/` separators
    pub id: String,
    pub kind: AssetKind,
    /// Label of the rule that matched
    pub rule: String,
    /// Size of the bytes read from disk
    pub source_size: u64,
    /// Final transformed bytes
    pub bytes: Vec<u8>,
    pub placement: Placement,
    /// BLAKE3 hex digest of `bytes`
    pub fingerprint: String,
    /// Outgoing edges, in the order the stages reported them
    pub dependencies: Vec<DependencyEdge>,
    /// Referenced host modules: specifier -> global
    pub externals: BTreeMap<String, String>,
}

impl Asset {
    /// Whether the asset is concatenated into a chunk's script payload.
    pub fn is_script_like(&self) -> bool {
        match self.placement {
            Placement::Inlined => true,
            Placement::File => false,
            Placement::Bundled => self.kind != AssetKind::Style,
        }
    }

    /// Whether the asset is concatenated into a chunk's stylesheet.
    pub fn is_style(&self) -> bool {
        self.placement == Placement::Bundled && self.kind == AssetKind::Style
    }

    pub fn static_dependencies(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.dependencies
            .iter()
            .filter(|edge| edge.kind == ReferenceKind::Static)
    }

    pub fn lazy_dependencies(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.dependencies
            .iter()
            .filter(|edge| edge.kind == ReferenceKind::Lazy)
    }

    /// File stem used when naming chunks and files after this asset.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("asset")
    }

    /// Original extension, used for file chunks.
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }
}

/// BLAKE3 hex digest used for asset fingerprints.
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Fingerprint of `bytes` plus the globals its externals resolve to.
pub fn fingerprint_with_externals(bytes: &[u8], externals: &BTreeMap<String, String>) -> String {
    if externals.is_empty() {
        return fingerprint(bytes);
    }
    let mut hasher = blake3::Hasher::new();
    hasher.update(bytes);
    for (specifier, global) in externals {
        hasher.update(b"\n");
        hasher.update(specifier.as_bytes());
        hasher.update(b"=");
        hasher.update(global.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Display id of `path`: relative to `root` with `/` separators, or the full
/// path when it lies outside the root.
pub fn asset_id(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_root_relative_with_forward_slashes() {
        let root = Path::new("/work/view");
        assert_eq!(
            asset_id(root, Path::new("/work/view/src/index.tsx")),
            "src/index.tsx"
        );
        assert_eq!(
            asset_id(root, Path::new("/elsewhere/lib.js")),
            "/elsewhere/lib.js"
        );
    }

    #[test]
    fn fingerprint_is_blake3_hex() {
        let fp = fingerprint(b"body{}");
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, fingerprint(b"body{}"));
        assert_ne!(fp, fingerprint(b"body{ }"));
    }

    #[test]
    fn externals_change_the_fingerprint() {
        let source = b"require('alt-client');";
        let mut externals = BTreeMap::new();
        assert_eq!(fingerprint_with_externals(source, &externals), fingerprint(source));

        externals.insert("alt-client".to_string(), "alt".to_string());
        let alt = fingerprint_with_externals(source, &externals);
        assert_ne!(alt, fingerprint(source));

        externals.insert("alt-client".to_string(), "host.alt".to_string());
        assert_ne!(fingerprint_with_externals(source, &externals), alt);
    }
}
