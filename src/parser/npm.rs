use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::Result;
use crate::models::{DeclaredLicense, Dependency, Package, PackageType, Party};

use super::{
    dependencies_from_map, file_name_is, json_str, json_strings, json_url, read_json, read_text,
    split_namespace, PackageParser,
};

const REGISTRY: &str = "https://registry.npmjs.org";

/// `package.json` manifests.
pub struct NpmPackageJson;

impl PackageParser for NpmPackageJson {
    const PACKAGE_TYPE: PackageType = PackageType::Npm;
    const DATASOURCE_ID: &'static str = "npm_package_json";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["package.json"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let json = read_json(path, "npm")?;
        Ok(vec![parse_package_json(&json)])
    }
}

fn parse_package_json(json: &Value) -> Package {
    let mut package = NpmPackageJson::new_package();
    package.primary_language = Some("JavaScript".to_string());

    if let Some(full_name) = json_str(json, "name") {
        let (namespace, name) = if full_name.starts_with('@') {
            split_namespace(&full_name)
        } else {
            (None, full_name)
        };
        package.namespace = namespace;
        package.name = Some(name);
    }
    package.version = json_str(json, "version");
    package.description = json_str(json, "description");
    package.keywords = json_strings(json.get("keywords"));
    package.homepage_url = json_str(json, "homepage");
    package.bug_tracking_url = json_url(json.get("bugs"));
    package.vcs_url = json.get("repository").and_then(repository_url);

    // "license" is the modern field; "licenses" is the deprecated array form
    package.declared_license = json
        .get("license")
        .and_then(DeclaredLicense::from_json)
        .or_else(|| json.get("licenses").and_then(DeclaredLicense::from_json));

    if let Some(author) = json.get("author") {
        package.parties.extend(Party::many_from_json(author, "author"));
    }
    if let Some(contributors) = json.get("contributors") {
        package
            .parties
            .extend(Party::many_from_json(contributors, "contributor"));
    }
    if let Some(maintainers) = json.get("maintainers") {
        package
            .parties
            .extend(Party::many_from_json(maintainers, "maintainer"));
    }

    if let Some(dist) = json.get("dist") {
        package.download_url = json_str(dist, "tarball");
        package.sha1 = json_str(dist, "shasum");
    }
    if package.download_url.is_none() {
        package.download_url = default_download_url(&package);
    }

    let ty = NpmPackageJson::PACKAGE_TYPE;
    package
        .dependencies
        .extend(dependencies_from_map(json.get("dependencies"), ty, "dependencies"));
    package.dependencies.extend(
        dependencies_from_map(json.get("devDependencies"), ty, "devDependencies")
            .into_iter()
            .map(Dependency::development),
    );
    package
        .dependencies
        .extend(dependencies_from_map(json.get("peerDependencies"), ty, "peerDependencies"));
    package.dependencies.extend(
        dependencies_from_map(json.get("optionalDependencies"), ty, "optionalDependencies")
            .into_iter()
            .map(Dependency::optional),
    );
    for dep in &mut package.dependencies {
        let (namespace, name) = split_scoped(&dep.name);
        dep.purl = crate::models::build_purl(
            ty,
            namespace.as_deref(),
            Some(&name),
            None,
            &Default::default(),
        );
    }

    package
}

fn split_scoped(full: &str) -> (Option<String>, String) {
    if full.starts_with('@') {
        split_namespace(full)
    } else {
        (None, full.to_string())
    }
}

/// `https://registry.npmjs.org/@scope/name/-/name-1.0.0.tgz`
fn default_download_url(package: &Package) -> Option<String> {
    let name = package.name.as_deref()?;
    let version = package.version.as_deref()?;
    let full = match package.namespace.as_deref() {
        Some(ns) => format!("{ns}/{name}"),
        None => name.to_string(),
    };
    Some(format!("{REGISTRY}/{full}/-/{name}-{version}.tgz"))
}

/// Normalize `repository`: object with `url`, full URL, or `user/repo` / `github:user/repo`
/// shorthand.
fn repository_url(value: &Value) -> Option<String> {
    let raw = json_url(Some(value))?;
    if raw.contains("://") || raw.starts_with("git@") {
        return Some(raw);
    }
    let (host, rest) = match raw.split_once(':') {
        Some(("github", rest)) => ("https://github.com", rest),
        Some(("gitlab", rest)) => ("https://gitlab.com", rest),
        Some(("bitbucket", rest)) => ("https://bitbucket.org", rest),
        Some(_) => return Some(raw),
        None => ("https://github.com", raw.as_str()),
    };
    Some(format!("{host}/{rest}"))
}

/// `package-lock.json` and `npm-shrinkwrap.json`.
pub struct NpmPackageLock;

impl PackageParser for NpmPackageLock {
    const PACKAGE_TYPE: PackageType = PackageType::Npm;
    const DATASOURCE_ID: &'static str = "npm_package_lock_json";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["package-lock.json", "npm-shrinkwrap.json"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let json = read_json(path, "npm")?;
        let mut package = Self::new_package();
        package.primary_language = Some("JavaScript".to_string());
        if let Some(full_name) = json_str(&json, "name") {
            let (namespace, name) = split_scoped(&full_name);
            package.namespace = namespace;
            package.name = Some(name);
        }
        package.version = json_str(&json, "version");
        package.dependencies = parse_package_lock(&json);
        Ok(vec![package])
    }
}

/// Lockfile v2/v3 keep a flat `packages` map keyed by install path; v1 nests
/// `dependencies` objects.
fn parse_package_lock(json: &Value) -> Vec<Dependency> {
    let mut deps = Vec::new();

    if let Some(packages) = json.get("packages").and_then(|v| v.as_object()) {
        for (pkg_path, info) in packages {
            // Skip the root entry (empty string key)
            if pkg_path.is_empty() {
                continue;
            }
            // "node_modules/a/node_modules/@scope/b" → "@scope/b"
            let name = match pkg_path.rfind("node_modules/") {
                Some(idx) => &pkg_path[idx + "node_modules/".len()..],
                None => pkg_path.as_str(),
            };
            let version = json_str(info, "version").unwrap_or_default();
            deps.push(lock_dependency(name, &version, info));
        }
        return deps;
    }

    if let Some(dependencies) = json.get("dependencies").and_then(|v| v.as_object()) {
        collect_v1_dependencies(dependencies, &mut deps);
    }
    deps
}

fn collect_v1_dependencies(map: &serde_json::Map<String, Value>, deps: &mut Vec<Dependency>) {
    for (name, info) in map {
        let version = json_str(info, "version").unwrap_or_default();
        deps.push(lock_dependency(name, &version, info));
        if let Some(nested) = info.get("dependencies").and_then(|v| v.as_object()) {
            collect_v1_dependencies(nested, deps);
        }
    }
}

fn lock_dependency(full_name: &str, version: &str, info: &Value) -> Dependency {
    let (namespace, name) = split_scoped(full_name);
    let mut dep = Dependency::resolved(
        PackageType::Npm,
        namespace.as_deref(),
        &name,
        version,
        "dependencies",
    );
    dep.name = full_name.to_string();
    if info.get("dev").and_then(Value::as_bool).unwrap_or(false) {
        dep = dep.development();
        dep.scope = Some("devDependencies".to_string());
    }
    if info.get("optional").and_then(Value::as_bool).unwrap_or(false) {
        dep.is_optional = true;
    }
    dep
}

/// `yarn.lock`: custom line-based format.
pub struct YarnLock;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"?(@?[^@"]+)@.+:$"#).expect("static regex"));
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s+version:?\s+"?([^"\s]+)"?"#).expect("static regex"));

impl PackageParser for YarnLock {
    const PACKAGE_TYPE: PackageType = PackageType::Npm;
    const DATASOURCE_ID: &'static str = "yarn_lock";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["yarn.lock"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let mut package = Self::new_package();
        package.primary_language = Some("JavaScript".to_string());
        package.dependencies = parse_yarn_lock(&content);
        Ok(vec![package])
    }
}

fn parse_yarn_lock(content: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.next() {
        // Skip comments and empty lines
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Package header (not indented, ends with ":")
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }
        let trimmed = line.trim_end_matches(':').trim_matches('"');

        // Handle comma-separated specs: take the first name
        let first_spec = trimmed.split(", ").next().unwrap_or(trimmed);
        let header = format!("{}:", first_spec.trim_end_matches(':').trim_matches('"'));
        let Some(caps) = HEADER_RE.captures(&header) else {
            continue;
        };
        let pkg_name = caps[1].to_string();
        let mut version = String::new();

        // Look ahead for `version "x.y.z"` (v1) or `version: x.y.z` (berry)
        while let Some(next) = lines.peek() {
            if next.trim().is_empty() {
                break;
            }
            if let Some(vcaps) = VERSION_RE.captures(next) {
                version = vcaps[1].to_string();
                lines.next();
                break;
            }
            lines.next();
        }

        if !version.is_empty() {
            let (namespace, name) = split_scoped(&pkg_name);
            let mut dep = Dependency::resolved(
                PackageType::Npm,
                namespace.as_deref(),
                &name,
                &version,
                "dependencies",
            );
            dep.name = pkg_name;
            deps.push(dep);
        }
    }

    deps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognizeError;
    use crate::parser::test_support::write_fixture;

    #[test]
    fn test_parse_package_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "package.json",
            r#"{
  "name": "@acme/widgets",
  "version": "2.1.0",
  "description": "Widgets",
  "license": "MIT",
  "author": "Jane Doe <jane@example.com> (https://jane.dev)",
  "contributors": [{"name": "Bob", "email": "bob@example.com"}],
  "repository": "github:acme/widgets",
  "bugs": {"url": "https://github.com/acme/widgets/issues"},
  "keywords": ["ui", "widgets"],
  "dependencies": {
    "express": "^4.18.2",
    "@types/node": "^20.0.0"
  },
  "devDependencies": {
    "jest": "^29.0.0"
  }
}"#,
        );
        let packages = NpmPackageJson::recognize(&path).unwrap();
        assert_eq!(packages.len(), 1);
        let p = &packages[0];
        assert_eq!(p.namespace.as_deref(), Some("@acme"));
        assert_eq!(p.name.as_deref(), Some("widgets"));
        assert_eq!(p.version.as_deref(), Some("2.1.0"));
        assert_eq!(p.vcs_url.as_deref(), Some("https://github.com/acme/widgets"));
        assert_eq!(
            p.download_url.as_deref(),
            Some("https://registry.npmjs.org/@acme/widgets/-/widgets-2.1.0.tgz")
        );
        assert_eq!(p.parties.len(), 2);
        assert_eq!(p.parties[0].url.as_deref(), Some("https://jane.dev"));
        assert_eq!(p.parties[1].role.as_deref(), Some("contributor"));
        assert_eq!(p.dependencies.len(), 3);
        assert_eq!(p.dependencies[0].name, "express");
        assert_eq!(
            p.dependencies[1].purl.as_deref(),
            Some("pkg:npm/%40types/node")
        );
        assert!(!p.dependencies[2].is_runtime);
        assert_eq!(p.compute_normalized_license().as_deref(), Some("MIT"));
        assert_eq!(p.purl().as_deref(), Some("pkg:npm/%40acme/widgets@2.1.0"));
    }

    #[test]
    fn test_legacy_licenses_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "package.json",
            r#"{"name": "old", "licenses": [{"type": "MIT", "url": "http://x"}, {"type": "Apache-2.0"}]}"#,
        );
        let p = &NpmPackageJson::recognize(&path).unwrap()[0];
        assert_eq!(
            p.compute_normalized_license().as_deref(),
            Some("MIT AND Apache-2.0")
        );
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "package.json", "{ not json");
        let err = NpmPackageJson::recognize(&path).unwrap_err();
        assert!(matches!(err, RecognizeError::Parse { format: "npm", .. }));
    }

    #[test]
    fn test_parse_package_lock_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "package-lock.json",
            r#"{
  "name": "my-app",
  "version": "1.0.0",
  "lockfileVersion": 3,
  "packages": {
    "": { "name": "my-app", "version": "1.0.0" },
    "node_modules/express": { "version": "4.18.2", "license": "MIT" },
    "node_modules/@babel/core": { "version": "7.22.0", "dev": true }
  }
}"#,
        );
        let p = &NpmPackageLock::recognize(&path).unwrap()[0];
        assert_eq!(p.name.as_deref(), Some("my-app"));
        assert_eq!(p.dependencies.len(), 2);
        assert_eq!(p.dependencies[0].name, "express");
        assert_eq!(
            p.dependencies[0].purl.as_deref(),
            Some("pkg:npm/express@4.18.2")
        );
        assert!(p.dependencies[0].is_resolved);
        assert_eq!(p.dependencies[1].name, "@babel/core");
        assert!(!p.dependencies[1].is_runtime);
    }

    #[test]
    fn test_parse_package_lock_v1() {
        let json: Value = serde_json::from_str(
            r#"{"dependencies": {"a": {"version": "1.0.0", "dependencies": {"b": {"version": "2.0.0"}}}}}"#,
        )
        .unwrap();
        let deps = parse_package_lock(&json);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[1].name, "b");
    }

    #[test]
    fn test_parse_yarn_lock() {
        let content = r#"# yarn lockfile v1

"@babel/code-frame@^7.0.0", "@babel/code-frame@^7.10.4":
  version "7.12.13"
  resolved "https://registry.yarnpkg.com/@babel/code-frame/-/code-frame-7.12.13.tgz"

lodash@^4.17.21:
  version "4.17.21"
"#;
        let deps = parse_yarn_lock(content);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "@babel/code-frame");
        assert_eq!(deps[0].extracted_requirement.as_deref(), Some("7.12.13"));
        assert_eq!(deps[1].purl.as_deref(), Some("pkg:npm/lodash@4.17.21"));
    }
}
