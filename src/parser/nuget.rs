use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{RecognizeError, Result};
use crate::models::{DeclaredLicense, Dependency, Package, PackageType, Party};

use super::archive::{find_zip_entry, open_zip, read_zip_entry};
use super::{decode_text, file_name_is, has_extension, non_empty, read_text, PackageParser};

const NUGET: PackageType = PackageType::Nuget;

/// Attributes of an element as `(local name, unescaped value)` pairs.
fn attributes(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let val = attr.unescape_value().unwrap_or_default().into_owned();
            (key, val)
        })
        .collect()
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// `.nuspec` package manifests.
pub struct NugetNuspec;

impl PackageParser for NugetNuspec {
    const PACKAGE_TYPE: PackageType = NUGET;
    const DATASOURCE_ID: &'static str = "nuget_nuspec";

    fn is_package_data_file(path: &Path) -> bool {
        has_extension(path, &["nuspec"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let package = parse_nuspec(&content, Self::new_package())
            .map_err(|e| RecognizeError::parse("nuget", path, e))?;
        Ok(vec![package])
    }
}

fn parse_nuspec(content: &str, mut package: Package) -> std::result::Result<Package, String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut target_framework: Option<String> = None;
    let mut license_type: Option<String> = None;
    let mut authors = None;
    let mut owners = None;
    let mut title = None;
    let mut summary = None;
    let mut description = None;
    let mut license_url = None;

    loop {
        let (element, is_empty) = match reader.read_event() {
            Ok(Event::Start(e)) => (e, false),
            Ok(Event::Empty(e)) => (e, true),
            Ok(Event::End(_)) => {
                if stack.pop().as_deref() == Some("group") {
                    target_framework = None;
                }
                continue;
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                let Some(text) = non_empty(&text) else {
                    continue;
                };
                let path: Vec<&str> = stack.iter().map(String::as_str).collect();
                if let ["package", "metadata", field] = path.as_slice() {
                    match *field {
                        "id" => package.name = Some(text),
                        "version" => package.version = Some(text),
                        "title" => title = Some(text),
                        "authors" => authors = Some(text),
                        "owners" => owners = Some(text),
                        "summary" => summary = Some(text),
                        "description" => description = Some(text),
                        "projectUrl" => package.homepage_url = Some(text),
                        "licenseUrl" => license_url = Some(text),
                        "license" => {
                            if license_type.as_deref() == Some("file") {
                                package
                                    .extra_data
                                    .insert("license_file".to_string(), text.into());
                            } else {
                                package.declared_license = Some(DeclaredLicense::Text(text));
                            }
                        }
                        "copyright" => package.copyright = Some(text),
                        "tags" => {
                            package.keywords = text.split_whitespace().map(str::to_string).collect()
                        }
                        _ => {}
                    }
                }
                continue;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("error at position {}: {e}", reader.buffer_position())),
            _ => continue,
        };

        let name = String::from_utf8_lossy(element.name().local_name().as_ref()).into_owned();
        if stack.is_empty() && name != "package" {
            return Err(format!("unexpected root element <{name}>"));
        }
        let attrs = attributes(&element);
        match name.as_str() {
            "license" => license_type = attr(&attrs, "type").map(str::to_string),
            "repository" => {
                package.vcs_url = attr(&attrs, "url").and_then(non_empty);
            }
            "group" if !is_empty => {
                target_framework = attr(&attrs, "targetFramework").and_then(non_empty)
            }
            "dependency" if stack.iter().any(|s| s == "dependencies") => {
                if let Some(id) = attr(&attrs, "id").and_then(non_empty) {
                    let scope = target_framework.as_deref().unwrap_or("dependency");
                    let dep = Dependency::new(NUGET, None, &id, attr(&attrs, "version"), scope);
                    package.dependencies.push(dep);
                }
            }
            _ => {}
        }
        if !is_empty {
            stack.push(name);
        }
    }

    if !stack.is_empty() {
        return Err(format!("unexpected end of document inside <{}>", stack.join("/")));
    }

    package.primary_language = Some("C#".to_string());
    package.description = match (summary, description) {
        (Some(s), Some(d)) if !d.starts_with(&s) => Some(format!("{s}\n{d}")),
        (s, d) => d.or(s),
    };
    if package.description.is_none() {
        package.description = title;
    }
    if package.declared_license.is_none() {
        package.declared_license = license_url.map(DeclaredLicense::Text);
    }
    for (value, role) in [(authors, "author"), (owners, "owner")] {
        for name in value.iter().flat_map(|v| v.split(',')) {
            if let Some(name) = non_empty(name) {
                let mut party = Party::person(role);
                party.name = Some(name);
                package.parties.push(party);
            }
        }
    }
    if let (Some(name), Some(version)) = (&package.name, &package.version) {
        package.download_url =
            Some(format!("https://www.nuget.org/api/v2/package/{name}/{version}"));
    }
    Ok(package)
}

/// Legacy `packages.config`.
pub struct NugetPackagesConfig;

impl PackageParser for NugetPackagesConfig {
    const PACKAGE_TYPE: PackageType = NUGET;
    const DATASOURCE_ID: &'static str = "nuget_packages_config";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["packages.config"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let mut reader = Reader::from_str(&content);
        reader.config_mut().trim_text(true);

        let mut package = Self::new_package();
        package.primary_language = Some("C#".to_string());
        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    if e.name().local_name().as_ref() != b"package" {
                        continue;
                    }
                    let attrs = attributes(e);
                    let (Some(id), Some(version)) = (attr(&attrs, "id"), attr(&attrs, "version"))
                    else {
                        continue;
                    };
                    let scope = attr(&attrs, "targetFramework").unwrap_or("dependency");
                    let mut dep = Dependency::resolved(NUGET, None, id, version, scope);
                    if attr(&attrs, "developmentDependency") == Some("true") {
                        dep = dep.development();
                    }
                    package.dependencies.push(dep);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(RecognizeError::parse("nuget", path, e)),
                _ => {}
            }
        }
        Ok(vec![package])
    }
}

/// `.nupkg` archives, described by the `.nuspec` at their root.
pub struct NugetNupkg;

impl PackageParser for NugetNupkg {
    const PACKAGE_TYPE: PackageType = NUGET;
    const DATASOURCE_ID: &'static str = "nuget_nupkg";

    fn is_package_data_file(path: &Path) -> bool {
        has_extension(path, &["nupkg"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let mut archive = open_zip(path, "nuget")?;
        let Some(entry) = find_zip_entry(&archive, |n| !n.contains('/') && n.ends_with(".nuspec"))
        else {
            return Ok(Vec::new());
        };
        let bytes = read_zip_entry(&mut archive, &entry, path, "nuget")?;
        let mut package = parse_nuspec(&decode_text(&bytes), Self::new_package())
            .map_err(|e| RecognizeError::parse("nuget", path, e))?;
        package.file_references.push(crate::models::FileReference::new(entry));
        Ok(vec![package])
    }
}
