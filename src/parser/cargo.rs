use std::path::Path;

use serde::Deserialize;
use toml::Value as TomlValue;

use crate::error::{RecognizeError, Result};
use crate::models::{DeclaredLicense, Dependency, Package, PackageType, Party};

use super::{file_name_is, read_text, PackageParser};

/// `Cargo.toml` manifests.
pub struct CargoToml;

impl PackageParser for CargoToml {
    const PACKAGE_TYPE: PackageType = PackageType::Cargo;
    const DATASOURCE_ID: &'static str = "cargo_toml";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["Cargo.toml"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let manifest: TomlValue =
            toml::from_str(&content).map_err(|e| RecognizeError::parse("cargo", path, e))?;

        let mut package = Self::new_package();
        package.primary_language = Some("Rust".to_string());

        if let Some(pkg) = manifest.get("package") {
            // `{ workspace = true }` values are inherited and not resolvable here
            let get = |key: &str| pkg.get(key).and_then(TomlValue::as_str).map(str::to_string);
            package.name = get("name");
            package.version = get("version");
            package.description = get("description").map(|d| d.trim().to_string());
            package.homepage_url = get("homepage");
            package.vcs_url = get("repository");
            package.keywords = string_array(pkg.get("keywords"));

            for author in string_array(pkg.get("authors")) {
                package
                    .parties
                    .extend(Party::from_person_string(&author, "author"));
            }

            package.declared_license = get("license").map(DeclaredLicense::Text);
            if let Some(license_file) = get("license-file") {
                package
                    .extra_data
                    .insert("license_file".to_string(), license_file.into());
            }
            if let Some(docs) = get("documentation") {
                package
                    .extra_data
                    .insert("documentation_url".to_string(), docs.into());
            }
        }

        if let (Some(name), Some(version)) = (&package.name, &package.version) {
            package.download_url = Some(format!(
                "https://crates.io/api/v1/crates/{name}/{version}/download"
            ));
        }

        for (table, scope) in [
            ("dependencies", "dependencies"),
            ("dev-dependencies", "dev-dependencies"),
            ("build-dependencies", "build-dependencies"),
        ] {
            let Some(deps) = manifest.get(table).and_then(TomlValue::as_table) else {
                continue;
            };
            for (name, spec) in deps {
                let (requirement, optional) = match spec {
                    TomlValue::String(req) => (Some(req.as_str()), false),
                    TomlValue::Table(t) => (
                        t.get("version").and_then(TomlValue::as_str),
                        t.get("optional").and_then(TomlValue::as_bool).unwrap_or(false),
                    ),
                    _ => (None, false),
                };
                let mut dep = Dependency::new(Self::PACKAGE_TYPE, None, name, requirement, scope);
                if scope == "dev-dependencies" {
                    dep = dep.development();
                }
                if optional {
                    dep = dep.optional();
                }
                package.dependencies.push(dep);
            }
        }

        Ok(vec![package])
    }
}

fn string_array(value: Option<&TomlValue>) -> Vec<String> {
    value
        .and_then(TomlValue::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(TomlValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct CargoLockFile {
    #[serde(default)]
    package: Vec<CargoLockPackage>,
}

#[derive(Debug, Deserialize)]
struct CargoLockPackage {
    name: String,
    version: String,
    /// Packages without a `source` field are local workspace members.
    source: Option<String>,
}

/// `Cargo.lock`: external packages become resolved dependencies.
pub struct CargoLock;

impl PackageParser for CargoLock {
    const PACKAGE_TYPE: PackageType = PackageType::Cargo;
    const DATASOURCE_ID: &'static str = "cargo_lock";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["Cargo.lock"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let lock: CargoLockFile =
            toml::from_str(&content).map_err(|e| RecognizeError::parse("cargo", path, e))?;

        let mut package = Self::new_package();
        package.primary_language = Some("Rust".to_string());
        package.dependencies = lock
            .package
            .into_iter()
            // Skip local workspace members (they have no `source`)
            .filter(|p| p.source.is_some())
            .map(|p| {
                Dependency::resolved(Self::PACKAGE_TYPE, None, &p.name, &p.version, "dependencies")
            })
            .collect();
        Ok(vec![package])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::write_fixture;

    #[test]
    fn test_parse_cargo_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "Cargo.toml",
            r#"
[package]
name = "demo"
version = "0.3.1"
authors = ["Jane Doe <jane@example.com>"]
license = "MIT/Apache-2.0"
repository = "https://github.com/jane/demo"
keywords = ["cli"]
edition.workspace = true

[dependencies]
serde = { version = "1.0", features = ["derive"] }
regex = "1"
fancy = { version = "0.2", optional = true }

[dev-dependencies]
tempfile = "3"
"#,
        );
        let p = &CargoToml::recognize(&path).unwrap()[0];
        assert_eq!(p.name.as_deref(), Some("demo"));
        assert_eq!(p.parties[0].email.as_deref(), Some("jane@example.com"));
        assert_eq!(
            p.compute_normalized_license().as_deref(),
            Some("MIT OR Apache-2.0")
        );
        assert_eq!(
            p.download_url.as_deref(),
            Some("https://crates.io/api/v1/crates/demo/0.3.1/download")
        );
        assert_eq!(p.dependencies.len(), 4);
        let serde = p.dependencies.iter().find(|d| d.name == "serde").unwrap();
        assert_eq!(serde.extracted_requirement.as_deref(), Some("1.0"));
        let fancy = p.dependencies.iter().find(|d| d.name == "fancy").unwrap();
        assert!(fancy.is_optional);
        let tempfile = p.dependencies.iter().find(|d| d.name == "tempfile").unwrap();
        assert!(!tempfile.is_runtime);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "Cargo.toml", "[package\nname = ");
        assert!(matches!(
            CargoToml::recognize(&path),
            Err(RecognizeError::Parse { format: "cargo", .. })
        ));
    }

    #[test]
    fn test_parse_cargo_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "Cargo.lock",
            r#"
version = 3

[[package]]
name = "my-app"
version = "0.1.0"

[[package]]
name = "serde"
version = "1.0.150"
source = "registry+https://github.com/rust-lang/crates.io-index"
checksum = "abc123"

[[package]]
name = "tokio"
version = "1.25.0"
source = "registry+https://github.com/rust-lang/crates.io-index"
checksum = "def456"
"#,
        );
        let p = &CargoLock::recognize(&path).unwrap()[0];
        assert_eq!(p.dependencies.len(), 2);
        assert_eq!(p.dependencies[0].name, "serde");
        assert_eq!(p.dependencies[1].purl.as_deref(), Some("pkg:cargo/tokio@1.25.0"));
    }
}
