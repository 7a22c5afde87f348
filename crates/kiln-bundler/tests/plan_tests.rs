//! Chunk layout and execution order of complete builds.

mod helpers;

use std::sync::Arc;

use helpers::{memory_options, project};
use kiln_bundler::{ArtifactType, BuildContext, MemoryRuntime, ModuleKind, build};

#[tokio::test]
async fn entries_dynamic_targets_and_shared_modules_get_chunks() {
    let result = build(memory_options("/p", project("/p")), &BuildContext::default())
        .await
        .unwrap();
    let plan = &result.plan;

    let ids: Vec<&str> = plan.chunks.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["main", "main~page", "page"]);

    let main = plan.chunk("main").unwrap();
    assert!(!main.dynamic);
    assert_eq!(main.dependencies, vec!["main~page".to_string()]);
    assert_eq!(main.styles.len(), 1);

    let page = plan.chunk("page").unwrap();
    assert!(page.dynamic);
    assert_eq!(page.dependencies, vec!["main~page".to_string()]);

    let shared = plan.chunk("main~page").unwrap();
    assert!(shared.entry.is_none());
    assert!(shared.dependencies.is_empty());

    assert_eq!(plan.execution_order, vec!["main~page", "main", "page"]);
    let waves = plan.waves();
    let waves: Vec<Vec<&str>> = waves
        .iter()
        .map(|wave| wave.iter().map(|c| c.id.as_str()).collect())
        .collect();
    assert_eq!(waves, vec![vec!["main~page"], vec!["main", "page"]]);
}

#[tokio::test]
async fn chunk_artifacts_reference_their_dependencies() {
    let result = build(memory_options("/p", project("/p")), &BuildContext::default())
        .await
        .unwrap();

    let shared_js = result
        .chunk_artifacts("main~page")
        .find(|a| a.artifact_type == ArtifactType::Chunk)
        .unwrap()
        .file_name
        .clone();
    let main_js = result
        .chunk_artifacts("main")
        .find(|a| a.artifact_type == ArtifactType::Chunk)
        .unwrap();
    assert_eq!(main_js.dependencies, vec![shared_js]);

    let text = main_js.source_text().unwrap();
    assert!(text.contains("src/main.ts"));
    assert!(!text.contains("src/util.ts"));
}

#[tokio::test]
async fn plan_ignores_file_insertion_order() {
    let files = [
        ("src/main.ts", "import './b';\nimport './a';\n"),
        ("src/a.ts", "export const a = 1;\n"),
        ("src/b.ts", "export const b = 2;\n"),
    ];
    let forward = files
        .iter()
        .fold(MemoryRuntime::new("/p"), |rt, (path, body)| rt.with_file(format!("/p/{path}"), *body));
    let backward = files
        .iter()
        .rev()
        .fold(MemoryRuntime::new("/p"), |rt, (path, body)| rt.with_file(format!("/p/{path}"), *body));

    let one = build(memory_options("/p", Arc::new(forward)), &BuildContext::default())
        .await
        .unwrap();
    let two = build(memory_options("/p", Arc::new(backward)), &BuildContext::default())
        .await
        .unwrap();

    assert_eq!(one.plan, two.plan);
    let id = |path: &str| one.graph.id_for(path, ModuleKind::File);
    // b is imported first, so it executes first
    assert_eq!(
        one.plan.chunk("main").unwrap().modules,
        vec![id("src/b.ts"), id("src/a.ts"), id("src/main.ts")]
    );
}

#[tokio::test]
async fn style_assets_are_copied_unchanged() {
    let runtime = project("/p");
    runtime.insert("/p/src/logo.png", vec![0x89, b'P', b'N', b'G']);
    runtime.insert(
        "/p/src/main.ts",
        "import logo from './logo.png';\nimport './theme.css';\nexport const src = logo;\n",
    );

    let result = build(memory_options("/p", runtime), &BuildContext::default())
        .await
        .unwrap();
    let asset = result
        .artifacts
        .iter()
        .find(|a| a.artifact_type == ArtifactType::Asset)
        .unwrap();
    assert!(asset.file_name.starts_with("logo-"));
    assert!(asset.file_name.ends_with(".png"));
    assert_eq!(&asset.source[..], &[0x89, b'P', b'N', b'G']);
}
