use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::models::{DeclaredLicense, Dependency, Package, PackageType, Party};

use super::{
    file_name_is, json_str, json_strings, read_json, split_namespace, PackageParser,
};

/// `composer.json` manifests.
pub struct ComposerJson;

impl PackageParser for ComposerJson {
    const PACKAGE_TYPE: PackageType = PackageType::Composer;
    const DATASOURCE_ID: &'static str = "php_composer_json";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["composer.json"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let json = read_json(path, "composer")?;
        let mut package = Self::new_package();
        fill_package(&mut package, &json);
        package.dependencies = require_dependencies(&json);
        Ok(vec![package])
    }
}

/// `composer.lock` files: every locked package becomes a resolved dependency.
pub struct ComposerLock;

impl PackageParser for ComposerLock {
    const PACKAGE_TYPE: PackageType = PackageType::Composer;
    const DATASOURCE_ID: &'static str = "php_composer_lock";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["composer.lock"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let json = read_json(path, "composer")?;
        let mut package = Self::new_package();
        package.primary_language = Some("PHP".to_string());

        for (key, scope) in [("packages", "require"), ("packages-dev", "require-dev")] {
            let Some(locked) = json.get(key).and_then(Value::as_array) else {
                continue;
            };
            for entry in locked {
                let Some(full_name) = json_str(entry, "name") else {
                    continue;
                };
                let (namespace, name) = split_namespace(&full_name);
                let version = json_str(entry, "version").unwrap_or_default();
                let mut dep = Dependency::resolved(
                    Self::PACKAGE_TYPE,
                    namespace.as_deref(),
                    &name,
                    &version,
                    scope,
                );
                dep.name = full_name;
                if scope == "require-dev" {
                    dep = dep.development();
                }
                package.dependencies.push(dep);
            }
        }
        Ok(vec![package])
    }
}

fn fill_package(package: &mut Package, json: &Value) {
    package.primary_language = Some("PHP".to_string());
    if let Some(full_name) = json_str(json, "name") {
        let (namespace, name) = split_namespace(&full_name);
        package.namespace = namespace;
        package.name = Some(name);
    }
    package.version = json_str(json, "version");
    package.description = json_str(json, "description");
    package.keywords = json_strings(json.get("keywords"));
    package.homepage_url = json_str(json, "homepage");
    package.declared_license = json.get("license").and_then(DeclaredLicense::from_json);

    if let Some(support) = json.get("support") {
        package.bug_tracking_url = json_str(support, "issues");
        package.vcs_url = json_str(support, "source");
    }

    if let Some(authors) = json.get("authors").and_then(Value::as_array) {
        for author in authors {
            // Composer authors carry their own role, e.g. "Developer"
            let role = json_str(author, "role")
                .map(|r| r.to_lowercase())
                .unwrap_or_else(|| "author".to_string());
            if let Some(party) = Party::from_json(author, &role) {
                package.parties.push(party);
            }
        }
    }

    if let Some(Value::String(kind)) = json.get("type") {
        package
            .extra_data
            .insert("composer_type".to_string(), Value::String(kind.clone()));
    }
}

fn require_dependencies(json: &Value) -> Vec<Dependency> {
    let mut deps = Vec::new();
    for (key, dev) in [("require", false), ("require-dev", true)] {
        let Some(map) = json.get(key).and_then(Value::as_object) else {
            continue;
        };
        for (full_name, requirement) in map {
            let (namespace, name) = split_namespace(full_name);
            let mut dep = Dependency::new(
                PackageType::Composer,
                namespace.as_deref(),
                &name,
                requirement.as_str(),
                key,
            );
            dep.name = full_name.clone();
            if dev {
                dep = dep.development();
            }
            deps.push(dep);
        }
    }
    deps
}
