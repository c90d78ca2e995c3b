//! Specifier resolution.
//!
//! - `./x` and `../x` resolve against the referrer's directory
//! - `/x` resolves against the project root
//! - bare specifiers are tried against each search path in order
//!
//! Specifiers listed as externals are never resolved; the host page provides
//! them as globals.
//!
//! Every base candidate is checked as an exact file, then with each configured
//! extension appended, then as a directory holding `index.<ext>`. Lookups hit
//! the filesystem, so they run on the blocking pool.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use path_clean::PathClean;
use tessel_config::ResolveOptions;
use tokio::task;

use crate::asset::asset_id;
use crate::runtime::Runtime;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
    extensions: Vec<String>,
    search_paths: Vec<PathBuf>,
    externals: BTreeMap<String, String>,
    runtime: Arc<dyn Runtime>,
}

impl Resolver {
    pub fn new(root: impl AsRef<Path>, options: &ResolveOptions, runtime: Arc<dyn Runtime>) -> Self {
        let root = root.as_ref().clean();
        let search_paths = options
            .search_paths
            .iter()
            .map(|p| root.join(p).clean())
            .collect();
        let extensions = options
            .extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect();

        Self {
            root,
            extensions,
            search_paths,
            externals: options.externals.clone(),
            runtime,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The global providing `specifier`, when the host supplies it.
    pub fn external(&self, specifier: &str) -> Option<&str> {
        self.externals.get(specifier).map(String::as_str)
    }

    /// Resolve an entry path relative to the project root.
    pub async fn resolve_entry(&self, name: &str, path: &Path) -> Result<PathBuf> {
        let base = self.root.join(path).clean();
        self.locate_first(vec![base])
            .await?
            .ok_or_else(|| Error::UnresolvedReference {
                specifier: path.display().to_string(),
                from: format!("entry '{}'", name),
            })
    }

    /// Resolve `specifier` as written in the asset at `from`.
    pub async fn resolve(&self, specifier: &str, from: &Path) -> Result<PathBuf> {
        let cleaned = strip_query(specifier);
        let unresolved = || Error::UnresolvedReference {
            specifier: specifier.to_string(),
            from: asset_id(&self.root, from),
        };

        if cleaned.is_empty() {
            return Err(unresolved());
        }

        let candidates: Vec<PathBuf> = if is_relative(cleaned) {
            let dir = from.parent().unwrap_or(&self.root);
            vec![dir.join(cleaned)]
        } else if let Some(rooted) = cleaned.strip_prefix('/') {
            vec![self.root.join(rooted)]
        } else {
            self.search_paths
                .iter()
                .map(|search| search.join(cleaned))
                .collect()
        };

        self.locate_first(candidates).await?.ok_or_else(unresolved)
    }

    /// The first candidate that locates a file.
    async fn locate_first(&self, candidates: Vec<PathBuf>) -> Result<Option<PathBuf>> {
        let runtime = Arc::clone(&self.runtime);
        let extensions = self.extensions.clone();
        task::spawn_blocking(move || {
            candidates
                .iter()
                .find_map(|candidate| locate(runtime.as_ref(), &extensions, &candidate.clean()))
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("resolver task failed: {}", e))))
    }
}

fn locate(runtime: &dyn Runtime, extensions: &[String], base: &Path) -> Option<PathBuf> {
    if runtime.is_file(base) {
        return Some(base.to_path_buf());
    }

    for ext in extensions {
        let candidate = with_appended_extension(base, ext);
        if runtime.is_file(&candidate) {
            return Some(candidate);
        }
    }

    if runtime.is_dir(base) {
        for ext in extensions {
            let candidate = base.join(format!("index.{}", ext));
            if runtime.is_file(&candidate) {
                return Some(candidate);
            }
        }
    }

    None
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Drop `?query` and `#fragment` suffixes.
fn strip_query(specifier: &str) -> &str {
    specifier
        .find(['?', '#'])
        .map_or(specifier, |idx| &specifier[..idx])
}

fn with_appended_extension(base: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MemoryRuntime, RuntimeResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::thread::{self, ThreadId};

    fn resolver(files: &[&str]) -> Resolver {
        let runtime = MemoryRuntime::new();
        for file in files {
            runtime.insert(*file, "");
        }
        Resolver::new("/p", &ResolveOptions::default(), Arc::new(runtime))
    }

    #[tokio::test]
    async fn relative_specifiers_use_referrer_directory() {
        let r = resolver(&["/p/src/a.scss", "/p/src/lib/util.ts"]);
        let from = Path::new("/p/src/index.tsx");
        assert_eq!(r.resolve("./a.scss", from).await.unwrap(), PathBuf::from("/p/src/a.scss"));
        assert_eq!(
            r.resolve("./lib/util", from).await.unwrap(),
            PathBuf::from("/p/src/lib/util.ts")
        );
        assert_eq!(
            r.resolve("../a.scss", Path::new("/p/src/lib/util.ts")).await.unwrap(),
            PathBuf::from("/p/src/a.scss")
        );
    }

    #[tokio::test]
    async fn bare_specifiers_walk_search_paths() {
        let r = resolver(&[
            "/p/src/components/button.tsx",
            "/p/node_modules/normalize.css/normalize.css",
            "/p/node_modules/lodash/index.js",
        ]);
        let from = Path::new("/p/src/index.tsx");
        assert_eq!(
            r.resolve("components/button", from).await.unwrap(),
            PathBuf::from("/p/src/components/button.tsx")
        );
        assert_eq!(
            r.resolve("normalize.css/normalize.css", from).await.unwrap(),
            PathBuf::from("/p/node_modules/normalize.css/normalize.css")
        );
        assert_eq!(
            r.resolve("lodash", from).await.unwrap(),
            PathBuf::from("/p/node_modules/lodash/index.js")
        );
    }

    #[tokio::test]
    async fn query_and_fragment_are_ignored() {
        let r = resolver(&["/p/src/font.svg"]);
        let from = Path::new("/p/src/a.scss");
        assert_eq!(
            r.resolve("./font.svg#icon", from).await.unwrap(),
            PathBuf::from("/p/src/font.svg")
        );
        assert_eq!(
            r.resolve("./font.svg?v=2", from).await.unwrap(),
            PathBuf::from("/p/src/font.svg")
        );
    }

    #[tokio::test]
    async fn root_relative_specifiers() {
        let r = resolver(&["/p/public/logo.png"]);
        assert_eq!(
            r.resolve("/public/logo.png", Path::new("/p/src/deep/x.css"))
                .await
                .unwrap(),
            PathBuf::from("/p/public/logo.png")
        );
    }

    #[tokio::test]
    async fn missing_reference_names_specifier_and_referrer() {
        let r = resolver(&[]);
        let err = r
            .resolve("./missing", Path::new("/p/src/index.tsx"))
            .await
            .unwrap_err();
        match err {
            Error::UnresolvedReference { specifier, from } => {
                assert_eq!(specifier, "./missing");
                assert_eq!(from, "src/index.tsx");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn entries_resolve_against_root() {
        let r = resolver(&["/p/src/index.tsx"]);
        assert_eq!(
            r.resolve_entry("index", Path::new("src/index")).await.unwrap(),
            PathBuf::from("/p/src/index.tsx")
        );
        assert!(r.resolve_entry("missing", Path::new("src/nope.ts")).await.is_err());
    }

    /// Records the thread every existence check runs on.
    #[derive(Debug, Default)]
    struct ThreadRecorder {
        files: MemoryRuntime,
        threads: Mutex<Vec<ThreadId>>,
    }

    #[async_trait]
    impl Runtime for ThreadRecorder {
        async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
            self.files.read_file(path).await
        }

        fn is_file(&self, path: &Path) -> bool {
            self.threads.lock().push(thread::current().id());
            self.files.is_file(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.threads.lock().push(thread::current().id());
            self.files.is_dir(path)
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn lookups_stay_off_the_async_thread() {
        let recorder = Arc::new(ThreadRecorder::default());
        recorder.files.insert("/p/src/lib/index.ts", "");
        let r = Resolver::new("/p", &ResolveOptions::default(), recorder.clone());

        assert_eq!(
            r.resolve("./lib", Path::new("/p/src/index.tsx")).await.unwrap(),
            PathBuf::from("/p/src/lib/index.ts")
        );

        let coordinator = thread::current().id();
        let threads = recorder.threads.lock();
        assert!(!threads.is_empty());
        assert!(threads.iter().all(|id| *id != coordinator));
    }
}
