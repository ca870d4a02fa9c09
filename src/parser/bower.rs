use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::models::{DeclaredLicense, Dependency, Package, PackageType, Party};

use super::{
    dependencies_from_map, file_name_is, json_str, json_strings, json_url, read_json,
    PackageParser,
};

/// `bower.json` and the `.bower.json` written into installed components.
pub struct BowerJson;

impl PackageParser for BowerJson {
    const PACKAGE_TYPE: PackageType = PackageType::Bower;
    const DATASOURCE_ID: &'static str = "bower_json";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["bower.json", ".bower.json"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let json = read_json(path, "bower")?;
        Ok(vec![parse_bower(&json)])
    }
}

fn parse_bower(json: &Value) -> Package {
    let mut package = BowerJson::new_package();
    package.primary_language = Some("JavaScript".to_string());
    package.name = json_str(json, "name");
    package.version = json_str(json, "version");
    package.description = json_str(json, "description");
    package.keywords = json_strings(json.get("keywords"));
    package.homepage_url = json_str(json, "homepage");
    package.vcs_url = json_url(json.get("repository"));
    package.declared_license = json.get("license").and_then(DeclaredLicense::from_json);

    if let Some(authors) = json.get("authors") {
        package.parties = Party::many_from_json(authors, "author");
    }

    let ty = BowerJson::PACKAGE_TYPE;
    package
        .dependencies
        .extend(dependencies_from_map(json.get("dependencies"), ty, "dependencies"));
    package.dependencies.extend(
        dependencies_from_map(json.get("devDependencies"), ty, "devDependencies")
            .into_iter()
            .map(Dependency::development),
    );
    package
}
