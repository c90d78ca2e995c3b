//! Script and stylesheet payloads for a chunk.
//!
//! Every script-like member is registered with a small module registry under
//! its asset id. The registry is installed by whichever chunk loads first.
//! Assets emitted as files and lazily loaded chunks are looked up at runtime
//! in `__tessel_manifest`, which the host page provides.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::asset::Asset;
use crate::graph::AssetGraph;
use crate::planner::{Chunk, ChunkKind};

/// Module registry shared by every chunk on a page.
pub(crate) const PRELUDE: &str = r#"(function (g) {
  if (g.__tessel) return;
  var defs = {}, cache = {}, loaded = {}, pending = [];
  function manifest() {
    return g.__tessel_manifest || { assets: {}, lazy: {} };
  }
  function require(id) {
    if (cache[id]) return cache[id].exports;
    var def = defs[id];
    if (!def) {
      var file = manifest().assets[id];
      if (file !== undefined) return (manifest().base || "") + file;
      throw new Error("tessel: unknown module " + id);
    }
    var module = (cache[id] = { exports: {} });
    function target(spec) {
      return def.map[spec] !== undefined ? def.map[spec] : spec;
    }
    function local(spec) {
      return require(target(spec));
    }
    local.lazy = function (spec) {
      return load(target(spec));
    };
    def.fn.call(module.exports, module, module.exports, local);
    return module.exports;
  }
  function load(id) {
    var files = manifest().lazy[id] || [];
    return Promise.all(files.map(fetchFile)).then(function () {
      return require(id);
    });
  }
  function flush() {
    pending = pending.filter(function (job) {
      for (var i = 0; i < job.chunks.length; i++) {
        if (!loaded[job.chunks[i]]) return true;
      }
      require(job.entry);
      return false;
    });
  }
  function fetchFile(file) {
    return new Promise(function (resolve, reject) {
      var url = (manifest().base || "") + file;
      var el;
      if (/\.css$/.test(file)) {
        el = document.createElement("link");
        el.rel = "stylesheet";
        el.href = url;
      } else {
        el = document.createElement("script");
        el.src = url;
      }
      el.onload = resolve;
      el.onerror = function () { reject(new Error("tessel: failed to load " + url)); };
      document.head.appendChild(el);
    });
  }
  g.__tessel = {
    define: function (id, fn, map) {
      if (!defs[id]) defs[id] = { fn: fn, map: map || {} };
    },
    require: require,
    loaded: function (chunk) {
      loaded[chunk] = true;
      flush();
    },
    start: function (entry, chunks) {
      pending.push({ entry: entry, chunks: chunks });
      flush();
    },
    load: load
  };
})(typeof globalThis !== "undefined" ? globalThis : window);
"#;

/// Whether `chunk` produces a script file.
pub(crate) fn has_script(graph: &AssetGraph, chunk: &Chunk) -> bool {
    members(graph, chunk).any(Asset::is_script_like)
}

/// Whether `chunk` produces a stylesheet.
pub(crate) fn has_style(graph: &AssetGraph, chunk: &Chunk) -> bool {
    members(graph, chunk).any(Asset::is_style)
}

fn members<'a>(graph: &'a AssetGraph, chunk: &'a Chunk) -> impl Iterator<Item = &'a Asset> {
    chunk.members.iter().filter_map(|path| graph.get(path))
}

/// The chunk's script: prelude, one `define` per script-like member, then
/// the load notification and, for entries, the start call.
pub(crate) fn script(graph: &AssetGraph, chunk: &Chunk) -> Vec<u8> {
    let mut out = String::with_capacity(PRELUDE.len() + chunk.size as usize + 256);
    out.push_str(PRELUDE);

    let externals: BTreeMap<&str, &str> = members(graph, chunk)
        .flat_map(|asset| asset.externals.iter())
        .map(|(specifier, global)| (specifier.as_str(), global.as_str()))
        .collect();
    for (specifier, global) in externals {
        // The global is read when first required, after the host set it up.
        let _ = writeln!(
            out,
            "__tessel.define({}, function (module) {{ module.exports = {}; }}, {{}});",
            js_string(&external_id(specifier)),
            global
        );
    }

    for asset in members(graph, chunk) {
        if asset.is_script_like() {
            define(&mut out, graph, asset);
        } else if asset.is_style() {
            // Importing a stylesheet yields an empty module.
            let _ = writeln!(
                out,
                "__tessel.define({}, function (module) {{}}, {{}});",
                js_string(&asset.id)
            );
        }
    }

    let _ = writeln!(out, "__tessel.loaded({});", js_string(&chunk.id));

    if chunk.kind == ChunkKind::Entry {
        if let Some(root) = chunk.root.as_deref().and_then(|path| graph.get(path)) {
            let requires = chunk
                .requires
                .iter()
                .map(|id| js_string(id))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "__tessel.start({}, [{}]);", js_string(&root.id), requires);
        }
    }

    out.into_bytes()
}

fn define(out: &mut String, graph: &AssetGraph, asset: &Asset) {
    let mut map: BTreeMap<&str, String> = asset
        .dependencies
        .iter()
        .filter_map(|edge| graph.get(&edge.to).map(|target| (edge.specifier.as_str(), target.id.clone())))
        .collect();
    for specifier in asset.externals.keys() {
        map.insert(specifier.as_str(), external_id(specifier));
    }
    let map = serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string());

    let body = String::from_utf8_lossy(&asset.bytes);
    let _ = writeln!(
        out,
        "__tessel.define({}, function (module, exports, require) {{\n{}\n}}, {});",
        js_string(&asset.id),
        body.trim_end(),
        map
    );
}

/// Concatenated stylesheet of every style member, in member order.
pub(crate) fn stylesheet(graph: &AssetGraph, chunk: &Chunk) -> Vec<u8> {
    let mut out = Vec::with_capacity(chunk.size as usize);
    for asset in members(graph, chunk).filter(|asset| asset.is_style()) {
        out.extend_from_slice(asset.bytes.trim_ascii_end());
        out.push(b'\n');
    }
    out
}

/// Registry id of a host-provided module.
fn external_id(specifier: &str) -> String {
    format!("external:{}", specifier)
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
