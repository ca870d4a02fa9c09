use std::path::Path;

use crate::error::{RecognizeError, Result};
use crate::models::{Dependency, Package, PackageType};

use super::{file_name_is, read_text, split_namespace, PackageParser};

fn go_dependency(module: &str, version: &str, scope: &str) -> Dependency {
    let (namespace, name) = split_namespace(module);
    let mut dep = Dependency::resolved(
        PackageType::Golang,
        namespace.as_deref(),
        &name,
        version,
        scope,
    );
    dep.name = module.to_string();
    dep
}

/// `go.mod` module definitions.
pub struct GoMod;

impl PackageParser for GoMod {
    const PACKAGE_TYPE: PackageType = PackageType::Golang;
    const DATASOURCE_ID: &'static str = "go_mod";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["go.mod"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let mut package = Self::new_package();
        package.primary_language = Some("Go".to_string());

        let mut block: Option<String> = None;
        for (lineno, raw) in content.lines().enumerate() {
            let (line, comment) = match raw.split_once("//") {
                Some((code, comment)) => (code.trim(), comment.trim()),
                None => (raw.trim(), ""),
            };
            if line.is_empty() {
                continue;
            }
            if line == ")" {
                block = None;
                continue;
            }

            let (directive, rest) = match &block {
                Some(directive) => (directive.as_str(), line),
                None => {
                    let (directive, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
                    let rest = rest.trim();
                    if rest == "(" {
                        block = Some(directive.to_string());
                        continue;
                    }
                    (directive, rest)
                }
            };

            match directive {
                "module" => {
                    let module = rest.trim_matches('"');
                    let (namespace, name) = split_namespace(module);
                    package.namespace = namespace;
                    package.name = Some(name);
                    package.homepage_url = Some(format!("https://pkg.go.dev/{module}"));
                    package.vcs_url = Some(format!("https://{module}.git"));
                }
                "go" => {
                    package
                        .extra_data
                        .insert("go_version".to_string(), rest.into());
                }
                "require" | "exclude" => {
                    let mut parts = rest.split_whitespace();
                    let (Some(module), Some(version)) = (parts.next(), parts.next()) else {
                        return Err(RecognizeError::parse(
                            "golang",
                            path,
                            format!("line {}: malformed {directive} entry", lineno + 1),
                        ));
                    };
                    let mut dep = go_dependency(module, version, directive);
                    if comment == "indirect" {
                        dep.is_runtime = true;
                        dep.is_optional = false;
                        dep.scope = Some("indirect".to_string());
                    }
                    package.dependencies.push(dep);
                }
                _ => {}
            }
        }
        Ok(vec![package])
    }
}

/// `go.sum` checksum lists: one resolved dependency per module version.
pub struct GoSum;

impl PackageParser for GoSum {
    const PACKAGE_TYPE: PackageType = PackageType::Golang;
    const DATASOURCE_ID: &'static str = "go_sum";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["go.sum"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let mut package = Self::new_package();
        package.primary_language = Some("Go".to_string());

        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let (Some(module), Some(version), Some(hash)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            // Each module also lists the hash of its go.mod alone
            if version.ends_with("/go.mod") || !hash.starts_with("h1:") {
                continue;
            }
            package
                .dependencies
                .push(go_dependency(module, version, "dependency"));
        }
        Ok(vec![package])
    }
}
