//! Installed Windows programs and .NET Framework versions, read from the
//! `SOFTWARE` registry hive or from JSON exports of its entries.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{RecognizeError, Result};
use crate::models::{FileReference, Package, PackageType, Party};

use super::{file_name, has_magic, non_empty, read_bytes, read_text, PackageParser};

pub mod hive;

use hive::{Hive, REGF_MAGIC};

const UNINSTALL_KEYS: &[&str] = &[
    "\\Microsoft\\Windows\\CurrentVersion\\Uninstall",
    "\\Wow6432Node\\Microsoft\\Windows\\CurrentVersion\\Uninstall",
];
const DOTNET_KEY: &str = "\\Microsoft\\NET Framework Setup\\NDP";
const DOTNET_PACKAGE_NAME: &str = "microsoft-dot-net-framework";
/// Depth of the `NDP` subtree walk (`NDP\v4\Full\1033`).
const DOTNET_MAX_DEPTH: usize = 3;

/// Hive locations inside an extracted container layer.
const LAYER_HIVES: &[&str] = &[
    "Files/Windows/System32/config/SOFTWARE",
    "Hives/Software_Delta",
    "Windows/System32/config/SOFTWARE",
];

/// A registry key with its values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistryEntry {
    pub path: String,
    #[serde(default)]
    pub values: Vec<RegistryValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistryValue {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl RegistryEntry {
    fn get(&self, name: &str) -> Option<String> {
        self.values
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
            .and_then(|v| match &v.value {
                Value::String(s) => non_empty(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}

/// Key path relative to the `SOFTWARE` root: `\Microsoft\...`.
fn software_relative(path: &str) -> String {
    let trimmed = path.trim_start_matches('\\');
    let lower = trimmed.to_ascii_lowercase();
    let rest = ["hkey_local_machine\\software\\", "hklm\\software\\", "root\\"]
        .iter()
        .find(|prefix| lower.starts_with(*prefix))
        .map(|prefix| &trimmed[prefix.len()..])
        .unwrap_or(trimmed);
    format!("\\{rest}")
}

/// Strip a `C:` style drive and turn backslashes into slashes.
pub fn remove_drive_letter(path: &str) -> String {
    let bytes = path.as_bytes();
    let rest = if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        &path[2..]
    } else {
        path
    };
    rest.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Map a Windows install path onto the extracted filesystem rooted at `root_dir`.
pub fn create_absolute_installed_file_path(root_dir: &str, path: &str) -> String {
    let relative = remove_drive_letter(path);
    format!(
        "{}/{}",
        root_dir.trim_end_matches('/'),
        relative.trim_end_matches('/')
    )
}

fn new_program(datasource_id: &str) -> Package {
    Package::new(PackageType::WindowsRegistry, datasource_id)
}

/// One package per `Uninstall` subkey that has a `DisplayName`.
pub fn report_installed_programs(entries: &[RegistryEntry], datasource_id: &str) -> Vec<Package> {
    let mut packages = Vec::new();
    for entry in entries {
        let path = software_relative(&entry.path);
        let under_uninstall = UNINSTALL_KEYS.iter().any(|key| {
            path.len() > key.len() + 1
                && path.get(..key.len()).is_some_and(|p| p.eq_ignore_ascii_case(key))
                && path.as_bytes()[key.len()] == b'\\'
        });
        if !under_uninstall {
            continue;
        }
        let Some(name) = entry.get("DisplayName") else {
            continue;
        };

        let mut package = new_program(datasource_id);
        package.name = Some(name);
        package.version = entry.get("DisplayVersion");
        package.homepage_url = entry.get("URLInfoAbout");
        package.bug_tracking_url = entry.get("HelpLink");
        package.download_url = entry.get("URLUpdateInfo");
        package.description = entry.get("Comments");
        if let Some(publisher) = entry.get("Publisher") {
            package
                .parties
                .push(Party::organization(&publisher, "publisher"));
        }
        if let Some(location) = entry.get("InstallLocation") {
            package.file_references.push(FileReference::new(location));
        }
        for key in ["InstallDate", "UninstallString"] {
            if let Some(value) = entry.get(key) {
                package
                    .extra_data
                    .insert(key.to_string(), Value::String(value));
            }
        }
        packages.push(package);
    }
    packages
}

/// One package per distinct .NET Framework version found below `NDP`.
pub fn report_installed_dotnet_versions(
    entries: &[RegistryEntry],
    datasource_id: &str,
) -> Vec<Package> {
    let mut seen = BTreeSet::new();
    let mut packages = Vec::new();
    for entry in entries {
        let path = software_relative(&entry.path);
        if !path.to_ascii_lowercase().starts_with(&DOTNET_KEY.to_ascii_lowercase()) {
            continue;
        }
        let Some(version) = entry.get("Version") else {
            continue;
        };
        if !seen.insert(version.clone()) {
            continue;
        }
        let mut package = new_program(datasource_id);
        package.name = Some(DOTNET_PACKAGE_NAME.to_string());
        package.version = Some(version);
        package
            .parties
            .push(Party::organization("Microsoft Corporation", "publisher"));
        if let Some(location) = entry.get("InstallPath") {
            package.file_references.push(FileReference::new(location));
        }
        packages.push(package);
    }
    packages
}

/// Entries the reports look at: every `Uninstall` subkey and the `NDP` subtree.
pub fn software_entries(hive: &Hive) -> Vec<RegistryEntry> {
    let mut entries = Vec::new();
    for root in UNINSTALL_KEYS {
        let Some(key) = hive.open(root) else {
            continue;
        };
        for program in hive.subkeys(&key) {
            entries.push(RegistryEntry {
                path: format!("{root}\\{}", program.name),
                values: hive.values(&program),
            });
        }
    }
    if let Some(ndp) = hive.open(DOTNET_KEY) {
        collect_tree(hive, &ndp, DOTNET_KEY.to_string(), 0, &mut entries);
    }
    entries
}

fn collect_tree(
    hive: &Hive,
    key: &hive::Key,
    path: String,
    depth: usize,
    out: &mut Vec<RegistryEntry>,
) {
    if depth >= DOTNET_MAX_DEPTH {
        return;
    }
    for child in hive.subkeys(key) {
        let child_path = format!("{path}\\{}", child.name);
        out.push(RegistryEntry {
            path: child_path.clone(),
            values: hive.values(&child),
        });
        collect_tree(hive, &child, child_path, depth + 1, out);
    }
}

fn report_all(entries: &[RegistryEntry], datasource_id: &str) -> Vec<Package> {
    let mut packages = report_installed_programs(entries, datasource_id);
    packages.extend(report_installed_dotnet_versions(entries, datasource_id));
    packages
}

fn read_hive(path: &Path) -> Result<Hive> {
    let data = read_bytes(path)?;
    Hive::parse(data).map_err(|e| RecognizeError::parse("registry", path, e))
}

/// `SOFTWARE` registry hives.
pub struct WindowsRegistryHive;

impl PackageParser for WindowsRegistryHive {
    const PACKAGE_TYPE: PackageType = PackageType::WindowsRegistry;
    const DATASOURCE_ID: &'static str = "windows_registry_hive";

    fn is_package_data_file(path: &Path) -> bool {
        file_name(path).is_some_and(|n| {
            n.eq_ignore_ascii_case("SOFTWARE") || n.eq_ignore_ascii_case("Software_Delta")
        }) && has_magic(path, 0, REGF_MAGIC)
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let hive = read_hive(path)?;
        Ok(report_all(&software_entries(&hive), Self::DATASOURCE_ID))
    }
}

/// JSON exports of `SOFTWARE` entries: `[{"path": ..., "values": [{"name", "value"}]}]`.
pub struct WindowsRegistryExport;

impl PackageParser for WindowsRegistryExport {
    const PACKAGE_TYPE: PackageType = PackageType::WindowsRegistry;
    const DATASOURCE_ID: &'static str = "windows_registry_export";

    fn is_package_data_file(path: &Path) -> bool {
        file_name(path).is_some_and(|n| n.to_ascii_lowercase().ends_with("registry-entries.json"))
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let entries: Vec<RegistryEntry> = serde_json::from_str(&content)
            .map_err(|e| RecognizeError::parse("registry", path, e))?;
        Ok(report_all(&entries, Self::DATASOURCE_ID))
    }
}

/// Installed programs of an extracted Windows container layer or filesystem.
///
/// Install locations are rewritten to absolute paths below the layer's `Files`
/// directory (or `root_dir` itself when there is none).
pub fn get_installed_packages(root_dir: &Path) -> Result<Vec<Package>> {
    let files_root = root_dir.join("Files");
    let install_root = if files_root.is_dir() {
        files_root
    } else {
        root_dir.to_path_buf()
    };
    let install_root = install_root.to_string_lossy().into_owned();

    let mut packages = Vec::new();
    for relative in LAYER_HIVES {
        let location = root_dir.join(relative);
        if !location.is_file() {
            continue;
        }
        tracing::debug!(hive = %location.display(), "reading registry hive");
        let hive = read_hive(&location)?;
        for mut package in report_all(&software_entries(&hive), WindowsRegistryHive::DATASOURCE_ID) {
            for reference in &mut package.file_references {
                reference.path = create_absolute_installed_file_path(&install_root, &reference.path);
            }
            packages.push(package);
        }
    }
    Ok(packages)
}
