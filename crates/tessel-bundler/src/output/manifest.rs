//! The build manifest written next to the emitted files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::planner::ChunkKind;
use crate::{Error, Result};

/// Default manifest file name.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One planned chunk as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestChunk {
    pub id: String,
    pub kind: ChunkKind,
    pub name: String,
    pub files: Vec<String>,
    /// Member asset ids in payload order
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    pub size: u64,
}

/// Maps logical names to emitted files.
///
/// Maps are sorted and nothing time-dependent is recorded, so two runs over
/// the same input serialize to the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Entry name -> files to load eagerly, the entry chunk's own first
    pub entries: BTreeMap<String, Vec<String>>,
    /// Lazily loaded root asset id -> files to load on demand
    #[serde(default)]
    pub lazy: BTreeMap<String, Vec<String>>,
    /// Every chunk, in plan order
    #[serde(default)]
    pub chunks: Vec<ManifestChunk>,
    /// Asset id -> file, for assets emitted as files of their own
    #[serde(default)]
    pub assets: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl Manifest {
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("failed to serialize manifest: {}", e)))?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(format!("failed to parse manifest: {}", e)))
    }

    /// Eager files for the entry called `name`.
    pub fn entry_files(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn chunk(&self, id: &str) -> Option<&ManifestChunk> {
        self.chunks.iter().find(|chunk| chunk.id == id)
    }

    /// Every file the manifest refers to, the HTML document included.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.chunks
            .iter()
            .flat_map(|chunk| chunk.files.iter())
            .chain(self.html.iter())
            .map(String::as_str)
    }

    /// The slice of the manifest the browser registry reads at runtime.
    pub(crate) fn runtime_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct RuntimeManifest<'a> {
            assets: &'a BTreeMap<String, String>,
            lazy: &'a BTreeMap<String, Vec<String>>,
        }

        serde_json::to_string(&RuntimeManifest {
            assets: &self.assets,
            lazy: &self.lazy,
        })
        .map_err(|e| Error::InvalidConfig(format!("failed to serialize manifest: {}", e)))
    }
}
