//! Golden-file checks: each `tests/data/<format>/<case>/` holds one input manifest
//! and the `expected.json` rendering of the packages recognized from it.
//!
//! Set `PKGRECON_REGEN_FIXTURES=1` to rewrite the expected files from the current output.

use std::path::{Path, PathBuf};

use pkgrecon::recognize_packages;
use serde_json::Value;

fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

fn regenerate() -> bool {
    std::env::var("PKGRECON_REGEN_FIXTURES").is_ok_and(|v| v == "1")
}

fn check(format: &str, case: &str, input: &str) {
    let dir = data_dir().join(format).join(case);
    let packages = recognize_packages(dir.join(input)).unwrap();
    let actual = Value::Array(
        packages
            .iter()
            .map(|p| {
                let mut p = p.clone();
                p.license_expression = p.compute_normalized_license();
                p.to_dict()
            })
            .collect(),
    );

    let expected_path = dir.join("expected.json");
    if regenerate() {
        let rendered = serde_json::to_string_pretty(&actual).unwrap();
        std::fs::write(&expected_path, rendered + "\n").unwrap();
        return;
    }
    let expected: Value =
        serde_json::from_str(&std::fs::read_to_string(&expected_path).unwrap()).unwrap();
    assert_eq!(actual, expected, "{format}/{case}");
}

#[test]
fn test_bower_basic() {
    check("bower", "basic", "bower.json");
}

#[test]
fn test_bower_list_of_licenses() {
    check("bower", "list-of-licenses", "bower.json");
}

#[test]
fn test_bower_author_objects() {
    check("bower", "author-objects", "bower.json");
}

#[test]
fn test_npm_basic() {
    check("npm", "basic", "package.json");
}

#[test]
fn test_maven_basic() {
    check("maven", "basic", "pom.xml");
}

#[test]
fn test_registry_export_programs() {
    check("win_reg", "programs", "SOFTWARE-registry-entries.json");
}
