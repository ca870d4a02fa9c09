//! Per-ecosystem package data parsers.
//!
//! Every parser implements [`PackageParser`]: a cheap recognition predicate and a
//! full parse into [`Package`] records. The closed set of parsers is wired into the
//! dispatcher in [`crate::recognize`].

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use serde_json::Value;

use crate::error::{RecognizeError, Result};
use crate::models::{Dependency, Package, PackageType};

pub mod archive;
pub mod bower;
pub(crate) mod bytes;
pub mod cargo;
pub mod composer;
pub mod cpan;
pub mod debian;
pub mod freebsd;
pub mod golang;
pub mod haxe;
pub mod headers;
pub mod maven;
pub mod npm;
pub mod nuget;
pub mod opam;
pub mod pypi;
pub mod rpm;
pub mod rubygems;
pub mod win_pe;
pub mod win_reg;

/// Contract shared by all ecosystem parsers.
pub trait PackageParser {
    /// Ecosystem of the packages this parser returns.
    const PACKAGE_TYPE: PackageType;

    /// Stable identifier of the data format, stored on every returned package.
    const DATASOURCE_ID: &'static str;

    /// Recognition predicate. Looks at the file name, extension and at most a few
    /// magic bytes; never fails.
    fn is_package_data_file(path: &Path) -> bool;

    /// Parse the file into zero or more packages.
    fn recognize(path: &Path) -> Result<Vec<Package>>;

    /// A fresh package stamped with this parser's type and datasource.
    fn new_package() -> Package {
        Package::new(Self::PACKAGE_TYPE, Self::DATASOURCE_ID)
    }
}

pub(crate) fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

pub(crate) fn file_name_is(path: &Path, names: &[&str]) -> bool {
    file_name(path).is_some_and(|n| names.contains(&n))
}

/// Case-insensitive extension check. Multi-part extensions such as `tar.gz` work.
pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let Some(name) = file_name(path) else {
        return false;
    };
    let lower = name.to_lowercase();
    extensions.iter().any(|ext| {
        lower.len() > ext.len() + 1 && lower.ends_with(&format!(".{}", ext.to_lowercase()))
    })
}

/// True when the file holds `magic` at `offset`. Any I/O failure reads as "no".
pub(crate) fn has_magic(path: &Path, offset: u64, magic: &[u8]) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    if file.seek(SeekFrom::Start(offset)).is_err() {
        return false;
    }
    let mut buf = vec![0u8; magic.len()];
    file.read_exact(&mut buf).is_ok() && buf == magic
}

pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| RecognizeError::io(path, e))
}

/// Read a text file, tolerating a UTF-8 BOM and invalid sequences.
pub(crate) fn read_text(path: &Path) -> Result<String> {
    let bytes = read_bytes(path)?;
    Ok(decode_text(&bytes))
}

pub(crate) fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

pub(crate) fn read_json(path: &Path, format: &'static str) -> Result<Value> {
    let content = read_text(path)?;
    serde_json::from_str(&content).map_err(|e| RecognizeError::parse(format, path, e))
}

pub(crate) fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// A trimmed, non-empty string field of a JSON object.
pub(crate) fn json_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).and_then(non_empty)
}

/// Strings from an array field, or from a comma-separated string field.
pub(crate) fn json_strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(non_empty)
            .collect(),
        Some(Value::String(s)) => s.split(',').filter_map(non_empty).collect(),
        _ => Vec::new(),
    }
}

/// URL from either a plain string or an object with a `url` field.
pub(crate) fn json_url(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_empty(s),
        Value::Object(_) => value.and_then(|v| json_str(v, "url")),
        _ => None,
    }
}

/// Dependencies from a `{ "name": "requirement" }` object.
pub(crate) fn dependencies_from_map(
    value: Option<&Value>,
    package_type: PackageType,
    scope: &str,
) -> Vec<Dependency> {
    let Some(map) = value.and_then(Value::as_object) else {
        return Vec::new();
    };
    map.iter()
        .map(|(name, requirement)| {
            let requirement = match requirement {
                Value::String(s) => Some(s.as_str()),
                Value::Null => None,
                other => {
                    tracing::warn!(dependency = %name, value = %other, "ignoring non-string requirement");
                    None
                }
            };
            Dependency::new(package_type, None, name, requirement, scope)
        })
        .collect()
}

/// Split `vendor/name` or `@scope/name` into namespace and name.
pub(crate) fn split_namespace(full: &str) -> (Option<String>, String) {
    match full.rsplit_once('/') {
        Some((ns, name)) if !ns.is_empty() && !name.is_empty() => {
            (Some(ns.to_string()), name.to_string())
        }
        _ => (None, full.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    /// Write `content` to `dir/name` and return the path.
    pub fn write_fixture(dir: &Path, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }
}
