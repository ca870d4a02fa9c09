use std::path::Path;

use serde_json::Value;

use crate::error::{RecognizeError, Result};
use crate::models::{DeclaredLicense, Dependency, Package, PackageType, Party};

use super::{file_name_is, json_str, json_strings, read_text, PackageParser};

/// FreeBSD `+COMPACT_MANIFEST` / `+MANIFEST` files found in `.pkg` archives.
pub struct FreeBsdManifest;

impl PackageParser for FreeBsdManifest {
    const PACKAGE_TYPE: PackageType = PackageType::Freebsd;
    const DATASOURCE_ID: &'static str = "freebsd_compact_manifest";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["+COMPACT_MANIFEST", "+MANIFEST"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        // UCL manifests written by pkg(8) are JSON; hand-edited ones are often YAML-ish
        let manifest: Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(_) => serde_yaml::from_str(&content)
                .map_err(|e| RecognizeError::parse("freebsd", path, e))?,
        };
        if !manifest.is_object() {
            return Err(RecognizeError::parse("freebsd", path, "manifest is not a mapping"));
        }
        Ok(vec![parse_manifest(&manifest)])
    }
}

fn parse_manifest(manifest: &Value) -> Package {
    let mut package = FreeBsdManifest::new_package();
    package.name = json_str(manifest, "name");
    package.version = json_str(manifest, "version");
    package.homepage_url = json_str(manifest, "www");
    package.keywords = json_strings(manifest.get("categories"));

    let comment = json_str(manifest, "comment");
    let desc = json_str(manifest, "desc");
    package.description = match (comment, desc) {
        (Some(c), Some(d)) if c != d => Some(format!("{c}\n{d}")),
        (c, d) => d.or(c),
    };

    if let Some(maintainer) = json_str(manifest, "maintainer") {
        let mut party = Party::person("maintainer");
        party.email = Some(maintainer);
        package.parties.push(party);
    }
    if let Some(arch) = json_str(manifest, "arch") {
        package.qualifiers.insert("arch".to_string(), arch);
    }
    if let Some(origin) = json_str(manifest, "origin") {
        package
            .extra_data
            .insert("origin".to_string(), Value::String(origin));
    }

    let licenses = json_strings(manifest.get("licenses"));
    let operator = match json_str(manifest, "licenselogic").as_deref() {
        Some("or") | Some("dual") => " OR ",
        _ => " AND ",
    };
    if !licenses.is_empty() {
        package.declared_license = Some(DeclaredLicense::Text(licenses.join(operator)));
    }

    if let Some(deps) = manifest.get("deps").and_then(Value::as_object) {
        for (name, info) in deps {
            let dep = match json_str(info, "version") {
                Some(version) => Dependency::resolved(
                    PackageType::Freebsd,
                    None,
                    name,
                    &version,
                    "dependency",
                ),
                None => Dependency::new(PackageType::Freebsd, None, name, None, "dependency"),
            };
            package.dependencies.push(dep);
        }
    }
    package
}
