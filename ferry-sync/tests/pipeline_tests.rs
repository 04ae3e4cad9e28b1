mod common;

use std::fs;
use std::path::Path;

use ferry_core::GenerationOptions;
use ferry_sync::pipeline::{gen, make};
use ferry_sync::{ChangeKind, FailureKind, GenRequest, SyncOptions};
use serde_json::json;
use tempfile::TempDir;

use common::{entry, names, snapshot, write, FakeBridge};

fn project(root: &Path) {
    write(
        root,
        "ferry.yaml",
        "source_directory: src\nname: demo\nversion: 3\n",
    );
    write(root, "src/Main.fy", "module Main");
    write(root, "src/lib/Util.fy", "module Util");
    write(root, "src/lib/notes.md", "ignored");
}

fn request(tmp: &Path, target: &str) -> GenRequest {
    write(tmp, "ir.json", r#"{"modules": []}"#);
    GenRequest {
        ir_path: tmp.join("ir.json"),
        output_root: tmp.join("out"),
        options: GenerationOptions::new(target),
        scaffold_root: Some(tmp.join("scaffold")),
        dry_run: false,
    }
}

#[tokio::test]
async fn make_compiles_every_matching_source() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    let bridge = FakeBridge::default();

    let package = make(&bridge, tmp.path(), &SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(package.0, json!({"name": "demo", "modules": 2}));
    let compiled = bridge.compiled.lock().unwrap();
    let mut contents: Vec<_> = compiled.iter().map(|s| s.content.as_str()).collect();
    contents.sort();
    assert_eq!(contents, vec!["module Main", "module Util"]);
}

#[tokio::test]
async fn make_without_descriptor_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = make(&FakeBridge::default(), tmp.path(), &SyncOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::NotFound);
    assert!(err.to_string().contains("ferry.yaml"), "got {err}");
}

#[tokio::test]
async fn make_with_missing_source_directory_is_not_found() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "ferry.yaml", "source_directory: nowhere\n");
    let err = make(&FakeBridge::default(), tmp.path(), &SyncOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::NotFound);
}

#[tokio::test]
async fn make_surfaces_service_rejection_as_decode() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    let bridge = FakeBridge::rejecting(json!({"message": "syntax error", "line": 1}));
    let err = make(&bridge, tmp.path(), &SyncOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Decode);
}

#[tokio::test]
async fn gen_reconciles_then_overlays_scaffold() {
    let tmp = TempDir::new().unwrap();
    let req = request(tmp.path(), "web");
    write(&req.output_root, "stale.js", "old");
    write(tmp.path(), "scaffold/web/index.html", "scaffold");
    write(tmp.path(), "scaffold/web/static/logo.svg", "<svg/>");
    write(tmp.path(), "scaffold/other/ignored.txt", "nope");

    let bridge = FakeBridge::generating(vec![
        entry(&[], "index.html", "generated"),
        entry(&["js"], "app.js", "app"),
    ]);
    let outcome = gen(&bridge, &req, &SyncOptions::default(), None)
        .await
        .unwrap();

    assert!(!outcome.dry_run);
    assert_eq!(outcome.count(ChangeKind::Insert), 2);
    assert_eq!(outcome.count(ChangeKind::Delete), 1);
    assert_eq!(outcome.overlaid.len(), 2);
    assert_eq!(
        names(&req.output_root),
        vec!["index.html", "js/app.js", "static/logo.svg"]
    );
    assert_eq!(
        fs::read_to_string(req.output_root.join("index.html")).unwrap(),
        "scaffold"
    );
}

#[tokio::test]
async fn repeated_gen_with_scaffold_only_updates() {
    let tmp = TempDir::new().unwrap();
    let req = request(tmp.path(), "web");
    write(tmp.path(), "scaffold/web/static/logo.svg", "<svg/>");
    write(tmp.path(), "scaffold/web/index.html", "scaffold");
    let bridge = FakeBridge::generating(vec![
        entry(&[], "main.js", "m"),
        entry(&[], "index.html", "generated"),
    ]);

    gen(&bridge, &req, &SyncOptions::default(), None)
        .await
        .unwrap();
    let after_first = snapshot(&req.output_root);

    let second = gen(&bridge, &req, &SyncOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(second.count(ChangeKind::Update), 2);
    assert_eq!(second.count(ChangeKind::Insert), 0);
    assert_eq!(second.count(ChangeKind::Delete), 0);
    assert_eq!(second.overlaid.len(), 2);
    assert_eq!(snapshot(&req.output_root), after_first);
}

#[tokio::test]
async fn scaffold_files_of_a_previous_target_are_removed() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "scaffold/web/web-only.css", "css");
    let bridge = FakeBridge::generating(vec![entry(&[], "main.js", "m")]);

    let web = request(tmp.path(), "web");
    gen(&bridge, &web, &SyncOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(names(&web.output_root), vec!["main.js", "web-only.css"]);

    let cli = request(tmp.path(), "cli");
    let outcome = gen(&bridge, &cli, &SyncOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(outcome.count(ChangeKind::Delete), 1);
    assert_eq!(names(&cli.output_root), vec!["main.js"]);
}

#[tokio::test]
async fn gen_without_scaffold_for_target_only_reconciles() {
    let tmp = TempDir::new().unwrap();
    let req = request(tmp.path(), "cli");
    let bridge = FakeBridge::generating(vec![entry(&[], "main.js", "m")]);

    let outcome = gen(&bridge, &req, &SyncOptions::default(), None)
        .await
        .unwrap();
    assert!(outcome.overlaid.is_empty());
    assert_eq!(names(&req.output_root), vec!["main.js"]);
}

#[tokio::test]
async fn dry_run_reports_changes_and_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let mut req = request(tmp.path(), "web");
    req.dry_run = true;
    write(&req.output_root, "stale.js", "old");
    write(tmp.path(), "scaffold/web/index.html", "scaffold");
    let before = snapshot(&req.output_root);

    let bridge = FakeBridge::generating(vec![entry(&[], "fresh.js", "f")]);
    let outcome = gen(&bridge, &req, &SyncOptions::default(), None)
        .await
        .unwrap();

    assert!(outcome.dry_run);
    assert_eq!(outcome.count(ChangeKind::Insert), 1);
    assert_eq!(outcome.count(ChangeKind::Delete), 1);
    assert!(outcome.overlaid.is_empty());
    assert_eq!(snapshot(&req.output_root), before);
}

#[tokio::test]
async fn gen_with_missing_ir_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let mut req = request(tmp.path(), "web");
    req.ir_path = tmp.path().join("absent.json");
    let err = gen(&FakeBridge::default(), &req, &SyncOptions::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::NotFound);
    assert!(!req.output_root.exists());
}

#[tokio::test]
async fn gen_with_malformed_ir_is_decode() {
    let tmp = TempDir::new().unwrap();
    let req = request(tmp.path(), "web");
    fs::write(&req.ir_path, "{not json").unwrap();
    let err = gen(&FakeBridge::default(), &req, &SyncOptions::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Decode);
}

#[tokio::test]
async fn gen_rejects_target_that_escapes_scaffold_root() {
    let tmp = TempDir::new().unwrap();
    let req = request(tmp.path(), "../web");
    let err = gen(&FakeBridge::default(), &req, &SyncOptions::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Invalid);
}

#[tokio::test]
async fn rejected_generation_leaves_output_untouched() {
    let tmp = TempDir::new().unwrap();
    let req = request(tmp.path(), "web");
    write(&req.output_root, "keep.js", "keep");
    let before = snapshot(&req.output_root);

    let bridge = FakeBridge::rejecting(json!("unsupported target"));
    let err = gen(&bridge, &req, &SyncOptions::default(), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::Decode);
    assert_eq!(snapshot(&req.output_root), before);
}
