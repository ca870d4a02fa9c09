use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::models::{DeclaredLicense, Dependency, Package, PackageType, Party};

use super::{file_name_is, json_str, json_strings, non_empty, read_json, PackageParser};

const HAXELIB: &str = "https://lib.haxe.org";

/// `haxelib.json` library descriptors.
pub struct HaxelibJson;

impl PackageParser for HaxelibJson {
    const PACKAGE_TYPE: PackageType = PackageType::Haxe;
    const DATASOURCE_ID: &'static str = "haxelib_json";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["haxelib.json"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let json = read_json(path, "haxe")?;
        let mut package = Self::new_package();
        package.primary_language = Some("Haxe".to_string());
        package.name = json_str(&json, "name");
        package.version = json_str(&json, "version");
        package.description = json_str(&json, "description");
        package.homepage_url = json_str(&json, "url");
        package.keywords = json_strings(json.get("tags"));
        package.declared_license = json.get("license").and_then(DeclaredLicense::from_json);

        if let (Some(name), Some(version)) = (&package.name, &package.version) {
            package.download_url = Some(format!("{HAXELIB}/p/{name}/{version}/download/"));
        }

        for contributor in json_strings(json.get("contributors")) {
            let mut party = Party::person("contributor");
            party.url = Some(format!("{HAXELIB}/u/{contributor}"));
            party.name = Some(contributor);
            package.parties.push(party);
        }

        if let Some(deps) = json.get("dependencies").and_then(Value::as_object) {
            for (name, version) in deps {
                // An empty version means "any version"
                let dep = match version.as_str().and_then(non_empty) {
                    Some(v) => Dependency::resolved(Self::PACKAGE_TYPE, None, name, &v, "dependencies"),
                    None => Dependency::new(Self::PACKAGE_TYPE, None, name, None, "dependencies"),
                };
                package.dependencies.push(dep);
            }
        }
        Ok(vec![package])
    }
}
