//! Integration tests for the build command.
//!
//! These drive `commands::build::execute` against real project directories.

use kiln_cli::cli::{BuildArgs, ProjectArgs};
use kiln_cli::commands::build;
use kiln_cli::CliError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_project(dir: &Path) {
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(
        dir.join("src/main.ts"),
        "import { greet } from './greet';\nimport './main.css';\ngreet();\n",
    )
    .unwrap();
    fs::write(
        dir.join("src/greet.ts"),
        "export function greet() { console.log('hi'); }\n",
    )
    .unwrap();
    fs::write(dir.join("src/main.css"), "body { margin: 0; }\n").unwrap();
    fs::write(dir.join("kiln.toml"), "[build]\nentries = [\"src/main.ts\"]\n").unwrap();
}

fn args(root: &Path) -> BuildArgs {
    BuildArgs {
        project: ProjectArgs {
            entries: Vec::new(),
            root: Some(root.to_path_buf()),
            profile: None,
            target: None,
            mode: None,
        },
        out_dir: None,
        no_cache: false,
        force: false,
        verify: false,
        json: false,
    }
}

fn written(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_build_writes_artifacts_and_manifest() {
    let temp = TempDir::new().unwrap();
    write_project(temp.path());

    build::execute(args(temp.path())).await.unwrap();

    let dist = temp.path().join("dist");
    let names = written(&dist);
    assert!(names.contains(&"manifest.json".to_string()));
    assert!(names.iter().any(|n| n.starts_with("main-") && n.ends_with(".js")));
    assert!(names.iter().any(|n| n.starts_with("main-") && n.ends_with(".css")));
}

#[tokio::test]
async fn test_rebuild_produces_identical_output() {
    let temp = TempDir::new().unwrap();
    write_project(temp.path());
    let dist = temp.path().join("dist");

    build::execute(args(temp.path())).await.unwrap();
    let first = written(&dist);

    build::execute(args(temp.path())).await.unwrap();
    assert_eq!(written(&dist), first);
    assert!(temp.path().join(".kiln/cache").exists());
}

#[tokio::test]
async fn test_custom_out_dir_without_cache() {
    let temp = TempDir::new().unwrap();
    write_project(temp.path());

    let mut build_args = args(temp.path());
    build_args.out_dir = Some(PathBuf::from("public/assets"));
    build_args.no_cache = true;
    build::execute(build_args).await.unwrap();

    assert!(temp.path().join("public/assets/manifest.json").exists());
    assert!(!temp.path().join("dist").exists());
}

#[tokio::test]
async fn test_verify_accepts_reproducible_build() {
    let temp = TempDir::new().unwrap();
    write_project(temp.path());

    let mut build_args = args(temp.path());
    build_args.verify = true;
    build::execute(build_args).await.unwrap();
}

#[tokio::test]
async fn test_unresolved_import_is_reported() {
    let temp = TempDir::new().unwrap();
    write_project(temp.path());
    fs::write(temp.path().join("src/other.ts"), "import './missing';\n").unwrap();

    let mut build_args = args(temp.path());
    build_args.project.entries = vec!["src/main.ts".to_string(), "src/other.ts".to_string()];

    let err = build::execute(build_args).await.unwrap_err();
    assert!(matches!(err, CliError::PartialBuild { count } if count > 0));
    // the healthy entry still gets its artifacts
    assert!(temp.path().join("dist/manifest.json").exists());
}
