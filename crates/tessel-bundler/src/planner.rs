//! Chunk planning.
//!
//! Roots are the entries plus every lazily loaded asset. Each root gets a
//! chunk; every other asset joins the chunk of the single root that reaches
//! it over static edges, or a shared chunk when two or more roots reach it.
//! Assets emitted as files get a file chunk of their own. Chunk ids are
//! derived from member fingerprints once membership is final.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::asset::Placement;
use crate::graph::AssetGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Rooted at a configured entry
    Entry,
    /// Rooted at the target of a lazy reference
    Lazy,
    /// Assets reached from two or more roots
    Shared,
    /// One asset emitted verbatim as its own file
    File,
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChunkKind::Entry => "entry",
            ChunkKind::Lazy => "lazy",
            ChunkKind::Shared => "shared",
            ChunkKind::File => "file",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub name: String,
    /// BLAKE3 hex over the sorted member fingerprints, also over the member
    /// ids when an earlier chunk in the plan has identical member bytes
    pub id: String,
    /// Root asset for entry, lazy and file chunks
    pub root: Option<PathBuf>,
    /// Members, dependencies before dependents
    pub members: Vec<PathBuf>,
    /// Ids of chunks that must be loaded before this one runs
    pub requires: Vec<String>,
    /// Sum of member byte sizes
    pub size: u64,
}

impl Chunk {
    pub fn contains(&self, path: &Path) -> bool {
        self.members.iter().any(|member| member == path)
    }
}

/// Chunk under construction; requirements are indices until ids exist.
struct Draft {
    kind: ChunkKind,
    name: String,
    root: Option<PathBuf>,
    members: Vec<PathBuf>,
    requires: BTreeSet<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkPlanner;

impl ChunkPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Partition `graph` into chunks: entries, lazy, shared, then file chunks.
    pub fn plan(&self, graph: &AssetGraph) -> Vec<Chunk> {
        let mut drafts: Vec<Draft> = Vec::new();
        let mut root_index: FxHashMap<&Path, usize> = FxHashMap::default();

        for (name, path) in graph.entries() {
            if root_index.contains_key(path.as_path()) {
                continue;
            }
            root_index.insert(path.as_path(), drafts.len());
            drafts.push(Draft {
                kind: ChunkKind::Entry,
                name: name.clone(),
                root: Some(path.clone()),
                members: Vec::new(),
                requires: BTreeSet::new(),
            });
        }

        let mut files: BTreeSet<(&str, &Path)> = BTreeSet::new();

        for asset in graph.lazy_roots() {
            if root_index.contains_key(asset.path.as_path()) {
                continue;
            }
            if asset.placement == Placement::File {
                files.insert((asset.id.as_str(), asset.path.as_path()));
                continue;
            }
            root_index.insert(asset.path.as_path(), drafts.len());
            drafts.push(Draft {
                kind: ChunkKind::Lazy,
                name: asset.stem().to_string(),
                root: Some(asset.path.clone()),
                members: Vec::new(),
                requires: BTreeSet::new(),
            });
        }

        let root_count = drafts.len();

        // Static walk from every root, stopping at other roots.
        let mut owners: FxHashMap<&Path, BTreeSet<usize>> = FxHashMap::default();
        let mut post_orders: Vec<Vec<&Path>> = Vec::with_capacity(root_count);

        for index in 0..root_count {
            let Some(root) = drafts[index].root.clone() else {
                post_orders.push(Vec::new());
                continue;
            };
            let Some(root_asset) = graph.get(&root) else {
                post_orders.push(Vec::new());
                continue;
            };

            let mut order: Vec<&Path> = Vec::new();
            let mut seen: FxHashSet<&Path> = FxHashSet::default();
            // (asset, next edge to visit)
            let mut stack: Vec<(&Path, usize)> = vec![(root_asset.path.as_path(), 0)];
            seen.insert(root_asset.path.as_path());

            while let Some((current, next)) = stack.pop() {
                let Some(asset) = graph.get(current) else { continue };
                let edges: Vec<_> = asset.static_dependencies().collect();

                if let Some(&edge) = edges.get(next) {
                    stack.push((current, next + 1));
                    let target = edge.to.as_path();

                    if let Some(&other) = root_index.get(target) {
                        if other != index {
                            drafts[index].requires.insert(other);
                        }
                        continue;
                    }
                    if seen.insert(target) {
                        stack.push((target, 0));
                    }
                    continue;
                }

                order.push(current);
                if current != root_asset.path.as_path() {
                    if asset.placement == Placement::File {
                        files.insert((asset.id.as_str(), current));
                    } else {
                        owners.entry(current).or_default().insert(index);
                    }
                }
            }

            post_orders.push(order);
        }

        // Single owner: join the root chunk, in that root's post-order.
        for index in 0..root_count {
            let members: Vec<PathBuf> = post_orders[index]
                .iter()
                .filter(|path| {
                    root_index.get(*path) == Some(&index)
                        || owners.get(*path).is_some_and(|set| set.len() == 1 && set.contains(&index))
                })
                .map(|path| path.to_path_buf())
                .collect();
            drafts[index].members = members;
        }

        // Several owners: one shared chunk per distinct owner set.
        let mut groups: BTreeMap<Vec<usize>, Vec<&Path>> = BTreeMap::new();
        for (path, set) in &owners {
            if set.len() > 1 {
                groups
                    .entry(set.iter().copied().collect())
                    .or_default()
                    .push(*path);
            }
        }

        for (owner_set, mut members) in groups {
            members.sort_by_key(|path| graph.get(path).map(|a| a.id.clone()));
            let shared_index = drafts.len();

            let mut requires = BTreeSet::new();
            for member in &members {
                if let Some(asset) = graph.get(member) {
                    for edge in asset.static_dependencies() {
                        if let Some(&root) = root_index.get(edge.to.as_path()) {
                            requires.insert(root);
                        }
                    }
                }
            }

            for owner in &owner_set {
                drafts[*owner].requires.insert(shared_index);
            }

            let name = owner_set
                .iter()
                .map(|owner| drafts[*owner].name.as_str())
                .collect::<Vec<_>>()
                .join("~");

            drafts.push(Draft {
                kind: ChunkKind::Shared,
                name,
                root: None,
                members: members.into_iter().map(Path::to_path_buf).collect(),
                requires,
            });
        }

        for (_, path) in files {
            let name = graph.get(path).map_or("asset", |a| a.stem()).to_string();
            drafts.push(Draft {
                kind: ChunkKind::File,
                name,
                root: Some(path.to_path_buf()),
                members: vec![path.to_path_buf()],
                requires: BTreeSet::new(),
            });
        }

        let mut taken: FxHashSet<String> = FxHashSet::default();
        let ids: Vec<String> = drafts
            .iter()
            .map(|draft| {
                let id = chunk_id(graph, &draft.members);
                if taken.insert(id.clone()) {
                    return id;
                }
                // Same bytes as an earlier chunk under different paths.
                let id = qualified_chunk_id(graph, &draft.members, &id);
                taken.insert(id.clone());
                id
            })
            .collect();

        let chunks: Vec<Chunk> = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| Chunk {
                kind: draft.kind,
                size: draft
                    .members
                    .iter()
                    .filter_map(|m| graph.get(m))
                    .map(|a| a.bytes.len() as u64)
                    .sum(),
                name: draft.name,
                id: ids[index].clone(),
                root: draft.root,
                members: draft.members,
                requires: draft.requires.iter().map(|r| ids[*r].clone()).collect(),
            })
            .collect();

        tracing::debug!(
            chunks = chunks.len(),
            shared = chunks.iter().filter(|c| c.kind == ChunkKind::Shared).count(),
            "chunks planned"
        );
        chunks
    }
}

/// BLAKE3 over the sorted member fingerprints.
pub fn chunk_id(graph: &AssetGraph, members: &[PathBuf]) -> String {
    let mut fingerprints: Vec<&str> = members
        .iter()
        .filter_map(|m| graph.get(m))
        .map(|a| a.fingerprint.as_str())
        .collect();
    fingerprints.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    for fp in fingerprints {
        hasher.update(fp.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

/// Id for a chunk whose member bytes match an earlier chunk's: `base`
/// rehashed with the sorted member ids.
fn qualified_chunk_id(graph: &AssetGraph, members: &[PathBuf], base: &str) -> String {
    let mut member_ids: Vec<&str> = members
        .iter()
        .filter_map(|m| graph.get(m))
        .map(|a| a.id.as_str())
        .collect();
    member_ids.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    hasher.update(base.as_bytes());
    for id in member_ids {
        hasher.update(b"\n");
        hasher.update(id.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Chunks required by `chunk`, transitively, in plan order.
pub fn required_closure<'a>(chunks: &'a [Chunk], chunk: &Chunk) -> Vec<&'a Chunk> {
    let mut wanted: FxHashSet<&str> = FxHashSet::default();
    let mut queue: Vec<&str> = chunk.requires.iter().map(String::as_str).collect();
    while let Some(id) = queue.pop() {
        if id == chunk.id || !wanted.insert(id) {
            continue;
        }
        if let Some(required) = chunks.iter().find(|c| c.id == id) {
            queue.extend(required.requires.iter().map(String::as_str));
        }
    }
    chunks
        .iter()
        .filter(|c| wanted.contains(c.id.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Asset, DependencyEdge, ReferenceKind, fingerprint};
    use proptest::prelude::*;
    use tessel_config::AssetKind;

    struct GraphSpec {
        graph: AssetGraph,
    }

    impl GraphSpec {
        fn new() -> Self {
            Self {
                graph: AssetGraph::new("/p"),
            }
        }

        fn asset(mut self, id: &str, body: &str, placement: Placement, deps: &[(&str, ReferenceKind)]) -> Self {
            let path = PathBuf::from(format!("/p/{}", id));
            let dependencies = deps
                .iter()
                .map(|(to, kind)| DependencyEdge {
                    from: path.clone(),
                    to: PathBuf::from(format!("/p/{}", to)),
                    kind: *kind,
                    specifier: format!("./{}", to),
                })
                .collect();
            self.graph.insert(Asset {
                path: path.clone(),
                id: id.to_string(),
                kind: AssetKind::from_path(&path),
                rule: "test".to_string(),
                source_size: body.len() as u64,
                bytes: body.as_bytes().to_vec(),
                placement,
                fingerprint: fingerprint(body.as_bytes()),
                dependencies,
                externals: BTreeMap::new(),
            });
            self
        }

        fn script(self, id: &str, deps: &[(&str, ReferenceKind)]) -> Self {
            let body = format!("// {}", id);
            self.asset(id, &body, Placement::Bundled, deps)
        }

        fn entry(mut self, name: &str, id: &str) -> Self {
            self.graph.add_entry(name, PathBuf::from(format!("/p/{}", id)));
            self
        }
    }

    use ReferenceKind::{Lazy, Static};

    fn ids(graph: &AssetGraph, chunk: &Chunk) -> Vec<String> {
        chunk
            .members
            .iter()
            .map(|m| graph.get(m).unwrap().id.clone())
            .collect()
    }

    #[test]
    fn entry_with_style_and_lazy_page() {
        let graph = GraphSpec::new()
            .script("index.js", &[("a.css", Static), ("b.html", Lazy)])
            .asset("a.css", "body{}", Placement::Bundled, &[])
            .script("b.html", &[])
            .entry("index", "index.js")
            .graph;

        let chunks = ChunkPlanner.plan(&graph);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, ChunkKind::Entry);
        assert_eq!(ids(&graph, &chunks[0]), vec!["a.css", "index.js"]);
        assert_eq!(chunks[1].kind, ChunkKind::Lazy);
        assert_eq!(chunks[1].name, "b");
        assert!(chunks[0].requires.is_empty());
    }

    #[test]
    fn asset_reached_from_two_entries_is_shared() {
        let graph = GraphSpec::new()
            .script("app1.js", &[("util.js", Static)])
            .script("app2.js", &[("util.js", Static)])
            .script("util.js", &[])
            .entry("app1", "app1.js")
            .entry("app2", "app2.js")
            .graph;

        let chunks = ChunkPlanner.plan(&graph);
        assert_eq!(chunks.len(), 3);
        let shared = &chunks[2];
        assert_eq!(shared.kind, ChunkKind::Shared);
        assert_eq!(shared.name, "app1~app2");
        assert_eq!(ids(&graph, shared), vec!["util.js"]);
        assert_eq!(chunks[0].requires, vec![shared.id.clone()]);
        assert_eq!(chunks[1].requires, vec![shared.id.clone()]);
        assert_eq!(ids(&graph, &chunks[0]), vec!["app1.js"]);
    }

    #[test]
    fn file_assets_get_their_own_chunk() {
        let graph = GraphSpec::new()
            .script("index.js", &[("big.png", Static), ("small.png", Static)])
            .asset("big.png", "large binary", Placement::File, &[])
            .asset("small.png", "module.exports = \"data:\";", Placement::Inlined, &[])
            .entry("index", "index.js")
            .graph;

        let chunks = ChunkPlanner.plan(&graph);
        assert_eq!(chunks.len(), 2);
        assert_eq!(ids(&graph, &chunks[0]), vec!["small.png", "index.js"]);
        assert_eq!(chunks[1].kind, ChunkKind::File);
        assert_eq!(chunks[1].name, "big");
        assert_eq!(ids(&graph, &chunks[1]), vec!["big.png"]);
    }

    #[test]
    fn inlined_member_changes_chunk_id() {
        let base = |small: &str| {
            GraphSpec::new()
                .script("index.js", &[("small.png", Static)])
                .asset("small.png", small, Placement::Inlined, &[])
                .entry("index", "index.js")
                .graph
        };
        let before = ChunkPlanner.plan(&base("a"));
        let after = ChunkPlanner.plan(&base("b"));
        assert_ne!(before[0].id, after[0].id);
    }

    #[test]
    fn cycles_terminate() {
        let graph = GraphSpec::new()
            .script("a.js", &[("b.js", Static)])
            .script("b.js", &[("a.js", Static)])
            .entry("a", "a.js")
            .graph;

        let chunks = ChunkPlanner.plan(&graph);
        assert_eq!(chunks.len(), 1);
        assert_eq!(ids(&graph, &chunks[0]), vec!["b.js", "a.js"]);
    }

    #[test]
    fn static_edge_into_another_root_is_a_requirement() {
        let graph = GraphSpec::new()
            .script("admin.js", &[("index.js", Static)])
            .script("index.js", &[])
            .entry("index", "index.js")
            .entry("admin", "admin.js")
            .graph;

        let chunks = ChunkPlanner.plan(&graph);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].requires, vec![chunks[0].id.clone()]);
        assert_eq!(required_closure(&chunks, &chunks[1]).len(), 1);
    }

    #[test]
    fn entry_imported_lazily_stays_an_entry() {
        let graph = GraphSpec::new()
            .script("index.js", &[("settings.js", Lazy)])
            .script("settings.js", &[])
            .entry("index", "index.js")
            .entry("settings", "settings.js")
            .graph;

        let chunks = ChunkPlanner.plan(&graph);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::Entry));
    }

    #[test]
    fn identical_lazy_pages_get_distinct_ids() {
        let graph = GraphSpec::new()
            .script("index.js", &[("a/index.js", Lazy), ("b/index.js", Lazy)])
            .asset("a/index.js", "exports.page = 1;", Placement::Bundled, &[])
            .asset("b/index.js", "exports.page = 1;", Placement::Bundled, &[])
            .entry("index", "index.js")
            .graph;

        let chunks = ChunkPlanner.plan(&graph);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].name, chunks[2].name);
        assert_eq!(chunks[1].id, chunk_id(&graph, &chunks[1].members));
        assert_ne!(chunks[1].id, chunks[2].id);
        assert_eq!(chunks, ChunkPlanner.plan(&graph));
    }

    /// Random graph over `n` scripts: entries are a prefix, edges are random.
    fn arb_graph() -> impl Strategy<Value = AssetGraph> {
        (2usize..9)
            .prop_flat_map(|n| {
                (
                    Just(n),
                    1usize..=n.min(3),
                    prop::collection::vec((0..n, 0..n, prop::bool::weighted(0.2)), 0..n * 2),
                )
            })
            .prop_map(|(n, entry_count, edges)| {
                let mut deps: Vec<Vec<(String, ReferenceKind)>> = vec![Vec::new(); n];
                for (from, to, lazy) in edges {
                    let kind = if lazy { Lazy } else { Static };
                    let target = format!("m{}.js", to);
                    if !deps[from].iter().any(|(t, k)| *t == target && *k == kind) {
                        deps[from].push((target, kind));
                    }
                }

                let mut spec = GraphSpec::new();
                for (i, list) in deps.iter().enumerate() {
                    let refs: Vec<(&str, ReferenceKind)> =
                        list.iter().map(|(t, k)| (t.as_str(), *k)).collect();
                    spec = spec.script(&format!("m{}.js", i), &refs);
                }
                for i in 0..entry_count {
                    spec = spec.entry(&format!("e{}", i), &format!("m{}.js", i));
                }
                spec.graph
            })
    }

    fn reachable(graph: &AssetGraph) -> BTreeSet<PathBuf> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<PathBuf> = graph.entries().values().cloned().collect();
        while let Some(path) = stack.pop() {
            if !seen.insert(path.clone()) {
                continue;
            }
            if let Some(asset) = graph.get(&path) {
                stack.extend(asset.dependencies.iter().map(|e| e.to.clone()));
            }
        }
        seen
    }

    proptest! {
        #[test]
        fn every_reachable_asset_is_in_exactly_one_chunk(graph in arb_graph()) {
            let chunks = ChunkPlanner.plan(&graph);
            for path in reachable(&graph) {
                let holders = chunks.iter().filter(|c| c.contains(&path)).count();
                prop_assert_eq!(holders, 1, "{} held by {} chunks", path.display(), holders);
            }
        }

        #[test]
        fn planning_is_deterministic(graph in arb_graph()) {
            prop_assert_eq!(ChunkPlanner.plan(&graph), ChunkPlanner.plan(&graph));
        }

        #[test]
        fn chunk_ids_are_unique(graph in arb_graph()) {
            let chunks = ChunkPlanner.plan(&graph);
            let unique: BTreeSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
            prop_assert_eq!(unique.len(), chunks.len());
        }

        #[test]
        fn requirements_point_at_planned_chunks(graph in arb_graph()) {
            let chunks = ChunkPlanner.plan(&graph);
            for chunk in &chunks {
                for required in &chunk.requires {
                    prop_assert!(chunks.iter().any(|c| &c.id == required));
                }
            }
        }
    }
}
