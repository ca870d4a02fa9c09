use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use serde_json::{Map, Value};

use crate::error::{RecognizeError, Result};
use crate::models::{DeclaredLicense, Dependency, Package, PackageType, Party};

use super::{has_extension, json_str, json_strings, PackageParser};

/// Built `.gem` archives: a plain tar holding `metadata.gz`.
pub struct RubyGem;

impl PackageParser for RubyGem {
    const PACKAGE_TYPE: PackageType = PackageType::Gem;
    const DATASOURCE_ID: &'static str = "gem_archive";

    fn is_package_data_file(path: &Path) -> bool {
        has_extension(path, &["gem"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let Some(metadata) = read_metadata(path)? else {
            tracing::debug!(path = %path.display(), "gem archive has no metadata.gz");
            return Ok(Vec::new());
        };
        let spec: serde_yaml::Value = serde_yaml::from_str(&metadata)
            .map_err(|e| RecognizeError::parse("gem", path, e))?;
        let spec = untag(spec);
        if !spec.is_object() {
            return Err(RecognizeError::parse("gem", path, "gem specification is not a mapping"));
        }
        Ok(vec![parse_spec(&spec)])
    }
}

fn read_metadata(path: &Path) -> Result<Option<String>> {
    let file = File::open(path).map_err(|e| RecognizeError::io(path, e))?;
    let mut archive = tar::Archive::new(file);
    let entries = archive
        .entries()
        .map_err(|e| RecognizeError::parse("gem", path, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RecognizeError::parse("gem", path, e))?;
        let is_metadata = entry
            .path()
            .map(|p| p.as_os_str() == "metadata.gz")
            .unwrap_or(false);
        if !is_metadata {
            continue;
        }
        let mut text = String::new();
        GzDecoder::new(entry)
            .read_to_string(&mut text)
            .map_err(|e| RecognizeError::parse("gem", path, e))?;
        return Ok(Some(text));
    }
    Ok(None)
}

/// Drop Ruby object tags (`!ruby/object:Gem::Version`) and convert to JSON values.
fn untag(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;
    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64().map(Value::from).unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(untag).collect()),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                let key = match untag(key) {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                map.insert(key, untag(value));
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => untag(tagged.value),
    }
}

/// `Gem::Version` objects carry the string under `version`.
fn version_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        obj @ Value::Object(_) => json_str(obj, "version"),
        _ => None,
    }
}

/// Render a `Gem::Requirement` as `">= 1.2, < 2"`.
fn requirement_text(requirement: Option<&Value>) -> Option<String> {
    let constraints = requirement?.get("requirements")?.as_array()?;
    let parts: Vec<String> = constraints
        .iter()
        .filter_map(|pair| {
            let pair = pair.as_array()?;
            let op = pair.first()?.as_str()?;
            let version = version_of(pair.get(1))?;
            Some(format!("{op} {version}"))
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn parse_spec(spec: &Value) -> Package {
    let mut package = RubyGem::new_package();
    package.primary_language = Some("Ruby".to_string());
    package.name = json_str(spec, "name");
    package.version = version_of(spec.get("version"));
    package.homepage_url = json_str(spec, "homepage");
    package.release_date = json_str(spec, "date").map(|d| d.chars().take(10).collect());

    let summary = json_str(spec, "summary");
    let description = json_str(spec, "description");
    package.description = match (summary, description) {
        (Some(s), Some(d)) if !d.starts_with(&s) => Some(format!("{s}\n{d}")),
        (s, d) => d.or(s),
    };

    let authors = json_strings(spec.get("authors"));
    let emails = json_strings(spec.get("email"));
    for (i, author) in authors.iter().enumerate() {
        let mut party = Party::person("author");
        party.name = Some(author.clone());
        party.email = emails.get(i).cloned();
        package.parties.push(party);
    }

    let mut licenses = json_strings(spec.get("licenses"));
    if licenses.is_empty() {
        licenses.extend(json_str(spec, "license"));
    }
    package.declared_license = DeclaredLicense::from_texts(licenses);

    if let Some(metadata) = spec.get("metadata") {
        package.bug_tracking_url = json_str(metadata, "bug_tracker_uri");
        package.vcs_url = json_str(metadata, "source_code_uri");
    }

    if let Some(deps) = spec.get("dependencies").and_then(Value::as_array) {
        for dep in deps {
            let Some(name) = json_str(dep, "name") else {
                tracing::warn!("skipping gem dependency without a name");
                continue;
            };
            let requirement = requirement_text(dep.get("requirement"));
            let kind = json_str(dep, "type").unwrap_or_default();
            let mut dependency = Dependency::new(
                PackageType::Gem,
                None,
                &name,
                requirement.as_deref(),
                "dependency",
            );
            if kind.trim_start_matches(':') == "development" {
                dependency = dependency.development();
                dependency.scope = Some("development".to_string());
            } else {
                dependency.scope = Some("runtime".to_string());
            }
            package.dependencies.push(dependency);
        }
    }

    if let (Some(name), Some(version)) = (&package.name, &package.version) {
        package.download_url = Some(format!("https://rubygems.org/downloads/{name}-{version}.gem"));
    }
    package
}
