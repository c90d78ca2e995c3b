//! End-to-end runs of the pipeline against real project directories.

mod helpers;

use helpers::{Project, options};
use tessel_bundler::{BuildState, ChunkKind, Error, Pipeline};
use tessel_config::{BuildMode, HtmlOptions, RuleOptions};

#[tokio::test]
async fn entry_with_style_and_lazy_page() {
    let project = Project::new();
    project
        .write("src/index.js", "require('./a.scss');\nimport('./b.html');\n")
        .write("src/a.scss", "body { color: red; }\n")
        .write("src/b.html", "<p>later</p>\n");

    let report = project.build(options(&[("index", "src/index.js")])).await.unwrap();
    let manifest = &report.manifest;

    assert_eq!(manifest.chunks.len(), 2);
    assert_eq!(manifest.chunks[0].kind, ChunkKind::Entry);
    assert_eq!(manifest.chunks[0].members, vec!["src/a.scss", "src/index.js"]);
    assert_eq!(manifest.chunks[1].kind, ChunkKind::Lazy);
    assert_eq!(manifest.chunks[1].members, vec!["src/b.html"]);

    let eager = manifest.entry_files("index").unwrap();
    assert_eq!(eager[0], manifest.chunks[0].files[0]);
    assert!(eager[0].starts_with("index.") && eager[0].ends_with(".js"));
    assert!(eager.iter().any(|f| f.ends_with(".css")));
    assert!(manifest.lazy["src/b.html"][0].ends_with(".chunk.js"));

    let css = eager.iter().find(|f| f.ends_with(".css")).unwrap();
    assert_eq!(project.read_out(css), "body { color: red; }\n");
    let script = project.read_out(&eager[0]);
    assert!(script.contains("__tessel.start(\"src/index.js\", [])"));

    let written = project.out_files();
    for file in manifest.files() {
        assert!(written.contains(&file.to_string()), "{file} not written");
    }
    assert!(written.contains(&"manifest.json".to_string()));
}

#[tokio::test]
async fn shared_dependency_gets_its_own_chunk() {
    let project = Project::new();
    project
        .write("src/app1.js", "const util = require('./util.js');\n")
        .write("src/app2.js", "const util = require('./util.js');\n")
        .write("src/util.js", "exports.answer = 42;\n");

    let report = project
        .build(options(&[("app1", "src/app1.js"), ("app2", "src/app2.js")]))
        .await
        .unwrap();
    let manifest = &report.manifest;

    let shared: Vec<_> = manifest.chunks.iter().filter(|c| c.kind == ChunkKind::Shared).collect();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].name, "app1~app2");
    assert_eq!(shared[0].members, vec!["src/util.js"]);
    assert!(shared[0].files[0].ends_with(".chunk.js"));

    for entry in ["app1", "app2"] {
        let files = manifest.entry_files(entry).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1], shared[0].files[0]);
    }
}

#[tokio::test]
async fn small_image_is_inlined_into_its_chunk() {
    let project = Project::new();
    project
        .write("src/index.js", "const logo = require('./logo.png');\n")
        .write("src/logo.png", vec![1u8; 2048]);

    let report = project.build(options(&[("index", "src/index.js")])).await.unwrap();

    assert_eq!(report.manifest.chunks.len(), 1);
    assert!(report.manifest.assets.is_empty());
    assert!(project.out_files().iter().all(|f| !f.ends_with(".png")));
    let script = project.read_out(&report.manifest.entry_files("index").unwrap()[0]);
    assert!(script.contains("data:image/png;base64,"));
    let first_id = report.manifest.chunks[0].id.clone();

    // The inlined bytes take part in the chunk id.
    project.write("src/logo.png", vec![2u8; 2048]);
    let report = project.build(options(&[("index", "src/index.js")])).await.unwrap();
    assert_ne!(report.manifest.chunks[0].id, first_id);
}

#[tokio::test]
async fn large_image_is_emitted_as_a_file() {
    let project = Project::new();
    project
        .write("src/index.js", "const logo = require('./logo.png');\n")
        .write("src/logo.png", vec![1u8; 16 * 1024]);

    let report = project.build(options(&[("index", "src/index.js")])).await.unwrap();

    let file = &report.manifest.assets["src/logo.png"];
    assert!(file.starts_with("logo.") && file.ends_with(".png"));
    assert_eq!(std::fs::read(project.out().join(file)).unwrap().len(), 16 * 1024);
    assert!(report.manifest.chunks.iter().any(|c| c.kind == ChunkKind::File));
}

#[tokio::test]
async fn cyclic_imports_build() {
    let project = Project::new();
    project
        .write("src/a.js", "require('./b.js');\n")
        .write("src/b.js", "require('./a.js');\n");

    let report = project.build(options(&[("a", "src/a.js")])).await.unwrap();
    assert_eq!(report.assets, 2);
    assert_eq!(report.manifest.chunks[0].members, vec!["src/b.js", "src/a.js"]);
}

#[tokio::test]
async fn unsupported_kind_writes_nothing() {
    let project = Project::new();
    project
        .write("src/index.js", "require('./a.scss');\n")
        .write("src/a.scss", "body {}\n");

    let options = options(&[("index", "src/index.js")])
        .with_rules(vec![RuleOptions::new(r"\.js$", &["script"])]);
    let pipeline = Pipeline::new(project.root(), options);
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, Error::UnsupportedKind { ref path } if path == "src/a.scss"));
    assert_eq!(pipeline.state(), BuildState::Failed);
    assert!(project.out_files().is_empty());
}

#[tokio::test]
async fn unknown_stage_fails_before_reading_sources() {
    let project = Project::new();
    project.write("src/index.js", "");

    let options = options(&[("index", "src/index.js")])
        .with_rules(vec![RuleOptions::new(r"\.js$", &["script", "babel"]).named("js")]);
    let err = project.build(options).await.unwrap_err();

    assert!(matches!(err, Error::UnknownStage { ref stage, .. } if stage == "babel"));
    assert!(project.out_files().is_empty());
}

#[tokio::test]
async fn unresolved_import_names_the_specifier() {
    let project = Project::new();
    project.write("src/index.js", "require('./nope');\n");

    let err = project.build(options(&[("index", "src/index.js")])).await.unwrap_err();
    match err {
        Error::UnresolvedReference { specifier, from } => {
            assert_eq!(specifier, "./nope");
            assert!(from.contains("index.js"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn identical_input_gives_identical_output() {
    let project = Project::new();
    project
        .write("src/app1.js", "require('./util.js');\nimport('./page.js');\n")
        .write("src/app2.js", "require('./util.js');\n")
        .write("src/util.js", "exports.u = 1;\n")
        .write("src/page.js", "require('./util.js');\n");
    let entries = [("app1", "src/app1.js"), ("app2", "src/app2.js")];

    project.build(options(&entries)).await.unwrap();
    let first_files = project.out_files();
    let first_manifest = project.read_out("manifest.json");

    project.build(options(&entries).with_workers(1)).await.unwrap();
    assert_eq!(project.out_files(), first_files);
    assert_eq!(project.read_out("manifest.json"), first_manifest);
}

#[tokio::test]
async fn changing_an_entry_renames_only_its_chunk() {
    let project = Project::new();
    project
        .write("src/app1.js", "require('./util.js');\n")
        .write("src/app2.js", "require('./util.js');\n")
        .write("src/util.js", "exports.u = 1;\n");
    let entries = [("app1", "src/app1.js"), ("app2", "src/app2.js")];

    let before = project.build(options(&entries)).await.unwrap().manifest;
    project.write("src/app1.js", "require('./util.js');\nexports.changed = true;\n");
    let after = project.build(options(&entries)).await.unwrap().manifest;

    assert_ne!(before.entries["app1"][0], after.entries["app1"][0]);
    assert_eq!(before.entries["app2"], after.entries["app2"]);
    assert_eq!(before.chunks[2].files, after.chunks[2].files);
}

#[tokio::test]
async fn changing_the_shared_leaf_renames_only_the_shared_chunk() {
    let project = Project::new();
    project
        .write("src/app1.js", "require('./util.js');\n")
        .write("src/app2.js", "require('./util.js');\n")
        .write("src/util.js", "exports.u = 1;\n");
    let entries = [("app1", "src/app1.js"), ("app2", "src/app2.js")];

    let before = project.build(options(&entries)).await.unwrap().manifest;
    project.write("src/util.js", "exports.u = 2;\n");
    let after = project.build(options(&entries)).await.unwrap().manifest;

    assert_eq!(after.chunks[2].kind, ChunkKind::Shared);
    assert_eq!(after.chunks[2].members, vec!["src/util.js"]);
    assert_ne!(before.chunks[2].files, after.chunks[2].files);
    assert_eq!(before.entries["app1"][0], after.entries["app1"][0]);
    assert_eq!(before.entries["app2"][0], after.entries["app2"][0]);
}

#[tokio::test]
async fn module_syntax_is_rewritten_into_valid_scripts() {
    let project = Project::new();
    project
        .write(
            "src/index.js",
            "import { u } from './util.js';\nexport const doubled = u * 2;\nimport('./page.js');\n",
        )
        .write("src/util.js", "export const u = 1;\n")
        .write("src/page.js", "export default function page() {}\n");

    let report = project.build(options(&[("index", "src/index.js")])).await.unwrap();
    let manifest = &report.manifest;
    assert_eq!(manifest.chunks.len(), 2);

    let entry = project.read_out(&manifest.entry_files("index").unwrap()[0]);
    let lazy = project.read_out(&manifest.lazy["src/page.js"][0]);
    for script in [&entry, &lazy] {
        assert!(!script.contains("export "), "module syntax left in:\n{script}");
        let allocator = oxc::allocator::Allocator::default();
        let parsed = oxc::parser::Parser::new(&allocator, script, oxc::span::SourceType::cjs()).parse();
        assert!(parsed.errors.is_empty(), "{:?}\n{script}", parsed.errors);
    }
    assert!(entry.contains("var __tessel_m0 = require(\"./util.js\");"));
    assert!(entry.contains("require.lazy('./page.js')"));
    assert!(lazy.contains("function page() {}"));
    assert!(lazy.contains("get: function () { return page; }"));
}

#[tokio::test]
async fn identical_lazy_pages_get_their_own_files() {
    let project = Project::new();
    project
        .write("src/index.js", "import('./a/index.js');\nimport('./b/index.js');\n")
        .write("src/a/index.js", "exports.page = 1;\n")
        .write("src/b/index.js", "exports.page = 1;\n");

    let report = project.build(options(&[("index", "src/index.js")])).await.unwrap();
    let manifest = &report.manifest;

    assert_eq!(manifest.chunks.len(), 3);
    let a = &manifest.lazy["src/a/index.js"];
    let b = &manifest.lazy["src/b/index.js"];
    assert_ne!(a, b);
    assert!(project.read_out(&a[0]).contains("__tessel.define(\"src/a/index.js\""));
    assert!(project.read_out(&b[0]).contains("__tessel.define(\"src/b/index.js\""));
}

#[tokio::test]
async fn host_modules_resolve_to_globals() {
    let project = Project::new();
    project.write("src/index.js", "import alt from 'alt-client';\nalt.emit('ready');\n");

    let report = project.build(options(&[("index", "src/index.js")])).await.unwrap();
    let manifest = &report.manifest;
    assert_eq!(manifest.chunks.len(), 1);
    assert_eq!(manifest.chunks[0].members, vec!["src/index.js"]);

    let script = project.read_out(&manifest.entry_files("index").unwrap()[0]);
    assert!(script.contains(
        "__tessel.define(\"external:alt-client\", function (module) { module.exports = alt; }, {});"
    ));
    assert!(script.contains(r#"{"alt-client":"external:alt-client"}"#));
}

#[tokio::test]
async fn node_env_follows_the_build_mode() {
    let project = Project::new();
    project.write("src/index.js", "exports.debug = process.env.NODE_ENV !== 'production';\n");

    let dev = options(&[("index", "src/index.js")]).with_mode(BuildMode::Development);
    let manifest = project.build(dev).await.unwrap().manifest;
    let script = project.read_out(&manifest.entry_files("index").unwrap()[0]);
    assert!(script.contains("\"development\" !== 'production'"));
    assert!(!script.contains("process.env"));
}

#[tokio::test]
async fn production_lint_warnings_fail_the_build() {
    let project = Project::new();
    project.write("src/index.ts", "var count = 1;\n");

    let dev = options(&[("index", "src/index.ts")]).with_mode(BuildMode::Development);
    project.build(dev).await.unwrap();

    let prod = options(&[("index", "src/index.ts")]).with_mode(BuildMode::Production);
    let err = project.build(prod).await.unwrap_err();
    assert_eq!(err.stage(), Some("lint"));
    match err {
        Error::Transform { path, cause, .. } => {
            assert_eq!(path, "src/index.ts");
            assert!(cause.contains("no-var"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn debugger_statement_fails_in_every_mode() {
    let project = Project::new();
    project.write("src/index.ts", "debugger;\n");

    let err = project
        .build(options(&[("index", "src/index.ts")]).with_mode(BuildMode::Development))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some("lint"));
}

#[tokio::test]
async fn production_build_minifies_scripts_and_styles() {
    let project = Project::new();
    project
        .write("src/index.js", "require('./a.scss');\nvar   answer   =   40 + 2;\nexports.answer = answer;\n")
        .write("src/a.scss", "body {\n  color: #ff0000;\n}\n");

    let dev = project
        .build(options(&[("index", "src/index.js")]))
        .await
        .unwrap();
    let prod = project
        .build(options(&[("index", "src/index.js")]).with_mode(BuildMode::Production))
        .await
        .unwrap();

    assert_eq!(prod.mode, BuildMode::Production);
    assert!(prod.output_size() < dev.output_size());
    let css = prod
        .manifest
        .entry_files("index")
        .unwrap()
        .iter()
        .find(|f| f.ends_with(".css"))
        .unwrap()
        .clone();
    assert_eq!(project.read_out(&css).lines().count(), 1);
}

#[tokio::test]
async fn html_document_references_entry_files() {
    let project = Project::new();
    project
        .write("src/index.js", "require('./a.scss');\n")
        .write("src/a.scss", "p {}\n")
        .write("src/index.html", "<html><head></head><body><div id=\"app\"></div></body></html>");

    let mut options = options(&[("index", "src/index.js")]);
    options.html = Some(HtmlOptions {
        template: "src/index.html".into(),
        filename: "index.html".to_string(),
        entry: None,
    });
    let report = project.build(options).await.unwrap();

    assert_eq!(report.manifest.html.as_deref(), Some("index.html"));
    let html = project.read_out("index.html");
    for file in report.manifest.entry_files("index").unwrap() {
        assert!(html.contains(file.as_str()), "{file} missing from html");
    }
    assert!(html.contains("<div id=\"app\"></div>"));
}

#[tokio::test]
async fn clean_removes_stale_output() {
    let project = Project::new();
    project
        .write("src/index.js", "")
        .write("dist/old.1234abcd.js", "stale");

    let mut keep = options(&[("index", "src/index.js")]);
    keep.clean = false;
    project.build(keep).await.unwrap();
    assert!(project.out_files().contains(&"old.1234abcd.js".to_string()));

    let report = project.build(options(&[("index", "src/index.js")])).await.unwrap();
    assert_eq!(report.removed, 1);
    assert!(!project.out_files().contains(&"old.1234abcd.js".to_string()));
}

#[tokio::test]
async fn write_failure_is_reported_and_leaves_the_blocker() {
    let project = Project::new();
    project
        .write("src/index.js", "")
        .write("blocker", "not a directory");

    let options = options(&[("index", "src/index.js")]).with_output_dir("blocker");
    let err = project.build(options).await.unwrap_err();

    assert!(matches!(err, Error::Write { .. }));
    assert_eq!(
        std::fs::read_to_string(project.root().join("blocker")).unwrap(),
        "not a directory"
    );
}

#[tokio::test]
async fn report_tracks_phases() {
    let project = Project::new();
    project.write("src/index.js", "");

    let pipeline = Pipeline::new(project.root(), options(&[("index", "src/index.js")]));
    let report = pipeline.run().await.unwrap();

    assert_eq!(
        pipeline.history(),
        vec![
            BuildState::Resolving,
            BuildState::Transforming,
            BuildState::Planning,
            BuildState::Emitting,
            BuildState::Done,
        ]
    );
    let phases: Vec<_> = report.phases.iter().map(|p| p.state).collect();
    assert_eq!(
        phases,
        vec![
            BuildState::Resolving,
            BuildState::Transforming,
            BuildState::Planning,
            BuildState::Emitting,
        ]
    );
    assert_eq!(report.files.last().unwrap().name, "manifest.json");
}
