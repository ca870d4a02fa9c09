use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::license::normalize::LicenseNormalizer;

/// Ecosystem a [`Package`] was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageType {
    Npm,
    Maven,
    Cargo,
    Rpm,
    Deb,
    Pypi,
    Gem,
    Nuget,
    Composer,
    Bower,
    Opam,
    Haxe,
    Freebsd,
    Golang,
    WindowsPe,
    WindowsRegistry,
    Jar,
    Cab,
    Iso,
    Cpan,
    Archive,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Npm => "npm",
            PackageType::Maven => "maven",
            PackageType::Cargo => "cargo",
            PackageType::Rpm => "rpm",
            PackageType::Deb => "deb",
            PackageType::Pypi => "pypi",
            PackageType::Gem => "gem",
            PackageType::Nuget => "nuget",
            PackageType::Composer => "composer",
            PackageType::Bower => "bower",
            PackageType::Opam => "opam",
            PackageType::Haxe => "haxe",
            PackageType::Freebsd => "freebsd",
            PackageType::Golang => "golang",
            PackageType::WindowsPe => "windows-pe",
            PackageType::WindowsRegistry => "windows-registry",
            PackageType::Jar => "jar",
            PackageType::Cab => "cab",
            PackageType::Iso => "iso",
            PackageType::Cpan => "cpan",
            PackageType::Archive => "archive",
        }
    }

    /// The Package URL type, which differs from [`as_str`](Self::as_str) for a few ecosystems.
    pub fn purl_type(&self) -> &'static str {
        match self {
            PackageType::WindowsPe => "winexe",
            PackageType::WindowsRegistry => "windows-program",
            PackageType::Archive => "generic",
            other => other.as_str(),
        }
    }
}

impl std::fmt::Display for PackageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyType {
    Person,
    Organization,
}

/// An author, maintainer, vendor or other party attached to a package.
///
/// Manifests declare parties either as bare strings (`"Jane <jane@x.org> (https://x.org)"`)
/// or as objects; both forms end up in this one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    #[serde(rename = "type")]
    pub party_type: Option<PartyType>,
    pub role: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
}

static PERSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^<(]*?)\s*(?:<([^>]*)>)?\s*(?:\(([^)]*)\))?\s*$").expect("static regex")
});

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

impl Party {
    pub fn person(role: &str) -> Self {
        Party {
            party_type: Some(PartyType::Person),
            role: Some(role.to_string()),
            name: None,
            email: None,
            url: None,
        }
    }

    pub fn organization(name: &str, role: &str) -> Self {
        Party {
            party_type: Some(PartyType::Organization),
            role: Some(role.to_string()),
            name: non_empty(name),
            email: None,
            url: None,
        }
    }

    /// Parse the `Name <email> (url)` shorthand used by npm, bower, cargo and others.
    /// Every part is optional. Returns `None` for blank input.
    pub fn from_person_string(raw: &str, role: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let mut party = Party::person(role);
        match PERSON_RE.captures(raw) {
            Some(caps) => {
                party.name = caps.get(1).and_then(|m| non_empty(m.as_str()));
                party.email = caps.get(2).and_then(|m| non_empty(m.as_str()));
                party.url = caps.get(3).and_then(|m| non_empty(m.as_str()));
            }
            None => party.name = Some(raw.to_string()),
        }
        // A lone email address is still a usable contact
        if party.email.is_none() {
            if let Some(name) = party.name.as_deref() {
                if name.contains('@') && !name.contains(' ') {
                    party.email = party.name.take();
                }
            }
        }
        Some(party)
    }

    /// Normalize a JSON author declaration: either a string or an object with
    /// `name`, `email` and `url` / `homepage`.
    pub fn from_json(value: &Value, role: &str) -> Option<Self> {
        match value {
            Value::String(s) => Party::from_person_string(s, role),
            Value::Object(map) => {
                let get = |key: &str| map.get(key).and_then(Value::as_str).and_then(non_empty);
                let party = Party {
                    name: get("name"),
                    email: get("email"),
                    url: get("url").or_else(|| get("homepage")),
                    ..Party::person(role)
                };
                if party.name.is_none() && party.email.is_none() && party.url.is_none() {
                    None
                } else {
                    Some(party)
                }
            }
            _ => None,
        }
    }

    /// Collect parties from a value that may be a single declaration or an array of them.
    pub fn many_from_json(value: &Value, role: &str) -> Vec<Self> {
        match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| Party::from_json(item, role))
                .collect(),
            other => Party::from_json(other, role).into_iter().collect(),
        }
    }
}

/// A dependency declared by a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub purl: Option<String>,
    pub extracted_requirement: Option<String>,
    pub scope: Option<String>,
    pub is_runtime: bool,
    pub is_optional: bool,
    pub is_resolved: bool,
}

impl Dependency {
    /// A declared, unpinned dependency.
    pub fn new(
        package_type: PackageType,
        namespace: Option<&str>,
        name: &str,
        requirement: Option<&str>,
        scope: &str,
    ) -> Self {
        Dependency {
            name: name.to_string(),
            purl: build_purl(package_type, namespace, Some(name), None, &BTreeMap::new()),
            extracted_requirement: requirement.and_then(non_empty),
            scope: Some(scope.to_string()),
            is_runtime: true,
            is_optional: false,
            is_resolved: false,
        }
    }

    /// A dependency pinned to an exact version, as found in lockfiles and archives.
    pub fn resolved(
        package_type: PackageType,
        namespace: Option<&str>,
        name: &str,
        version: &str,
        scope: &str,
    ) -> Self {
        Dependency {
            name: name.to_string(),
            purl: build_purl(package_type, namespace, Some(name), Some(version), &BTreeMap::new()),
            extracted_requirement: non_empty(version),
            scope: Some(scope.to_string()),
            is_runtime: true,
            is_optional: false,
            is_resolved: true,
        }
    }

    pub fn development(mut self) -> Self {
        self.is_runtime = false;
        self.is_optional = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }
}

/// A path inside a container (or on the scanned host) that belongs to a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub path: String,
    pub size: Option<u64>,
}

impl FileReference {
    pub fn new(path: impl Into<String>) -> Self {
        FileReference {
            path: path.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// License declarations as written in the manifest, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeclaredLicense {
    Text(String),
    Object {
        #[serde(rename = "type")]
        kind: Option<String>,
        name: Option<String>,
        url: Option<String>,
    },
    List(Vec<DeclaredLicense>),
}

impl DeclaredLicense {
    /// Read the common JSON shapes: string, `{type, url}` / `{name, url}` object, or array.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => {
                Some(DeclaredLicense::Text(s.trim().to_string()))
            }
            Value::Object(map) => {
                let get = |key: &str| map.get(key).and_then(Value::as_str).and_then(non_empty);
                let kind = get("type");
                let name = get("name");
                let url = get("url");
                if kind.is_none() && name.is_none() && url.is_none() {
                    None
                } else {
                    Some(DeclaredLicense::Object { kind, name, url })
                }
            }
            Value::Array(items) => {
                let list: Vec<DeclaredLicense> =
                    items.iter().filter_map(DeclaredLicense::from_json).collect();
                DeclaredLicense::from_list(list)
            }
            _ => None,
        }
    }

    /// Collapse a list of declarations: empty → `None`, single → that element.
    pub fn from_list(mut list: Vec<DeclaredLicense>) -> Option<Self> {
        match list.len() {
            0 => None,
            1 => list.pop(),
            _ => Some(DeclaredLicense::List(list)),
        }
    }

    pub fn from_texts<I, S>(texts: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = texts
            .into_iter()
            .filter_map(|t| non_empty(t.as_ref()))
            .map(DeclaredLicense::Text)
            .collect();
        DeclaredLicense::from_list(list)
    }
}

/// The normalized, ecosystem-agnostic package record.
///
/// Parsers fill everything except `license_expression`, which is derived from
/// `declared_license` via [`Package::compute_normalized_license`] and attached by
/// the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub qualifiers: BTreeMap<String, String>,
    pub primary_language: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<String>,
    pub parties: Vec<Party>,
    pub keywords: Vec<String>,
    pub homepage_url: Option<String>,
    pub download_url: Option<String>,
    pub bug_tracking_url: Option<String>,
    pub vcs_url: Option<String>,
    pub size: Option<u64>,
    pub sha1: Option<String>,
    pub md5: Option<String>,
    pub sha256: Option<String>,
    pub sha512: Option<String>,
    pub copyright: Option<String>,
    pub declared_license: Option<DeclaredLicense>,
    pub license_expression: Option<String>,
    pub dependencies: Vec<Dependency>,
    pub file_references: Vec<FileReference>,
    pub extra_data: BTreeMap<String, Value>,
    pub datasource_id: String,
}

impl Package {
    pub fn new(package_type: PackageType, datasource_id: &str) -> Self {
        Package {
            package_type,
            namespace: None,
            name: None,
            version: None,
            qualifiers: BTreeMap::new(),
            primary_language: None,
            description: None,
            release_date: None,
            parties: Vec::new(),
            keywords: Vec::new(),
            homepage_url: None,
            download_url: None,
            bug_tracking_url: None,
            vcs_url: None,
            size: None,
            sha1: None,
            md5: None,
            sha256: None,
            sha512: None,
            copyright: None,
            declared_license: None,
            license_expression: None,
            dependencies: Vec::new(),
            file_references: Vec::new(),
            extra_data: BTreeMap::new(),
            datasource_id: datasource_id.to_string(),
        }
    }

    /// Compute the license expression from the declared license with the default rules.
    ///
    /// Pure: the package is not modified, so calling it twice yields the same value.
    pub fn compute_normalized_license(&self) -> Option<String> {
        self.compute_normalized_license_with(&LicenseNormalizer::default())
    }

    /// Same as [`compute_normalized_license`](Self::compute_normalized_license) with
    /// caller-provided normalization rules.
    pub fn compute_normalized_license_with(&self, normalizer: &LicenseNormalizer) -> Option<String> {
        self.declared_license
            .as_ref()
            .and_then(|declared| normalizer.normalize(declared))
    }

    pub fn purl(&self) -> Option<String> {
        build_purl(
            self.package_type,
            self.namespace.as_deref(),
            self.name.as_deref(),
            self.version.as_deref(),
            &self.qualifiers,
        )
    }

    /// Serialize to an ordered JSON object with a trailing derived `purl` key.
    pub fn to_dict(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert(
                "purl".to_string(),
                self.purl().map(Value::String).unwrap_or(Value::Null),
            );
        }
        value
    }
}

/// Build a Package URL: `pkg:type/namespace/name@version?key=value`.
pub fn build_purl(
    package_type: PackageType,
    namespace: Option<&str>,
    name: Option<&str>,
    version: Option<&str>,
    qualifiers: &BTreeMap<String, String>,
) -> Option<String> {
    let name = name.map(str::trim).filter(|n| !n.is_empty())?;
    let mut purl = format!("pkg:{}/", package_type.purl_type());

    if let Some(namespace) = namespace.map(str::trim).filter(|n| !n.is_empty()) {
        let segments: Vec<String> = namespace
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        purl.push_str(&segments.join("/"));
        purl.push('/');
    }
    purl.push_str(&urlencoding::encode(name));

    if let Some(version) = version.map(str::trim).filter(|v| !v.is_empty()) {
        purl.push('@');
        purl.push_str(&urlencoding::encode(version));
    }

    let qualifiers: Vec<String> = qualifiers
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k.to_lowercase(), urlencoding::encode(v)))
        .collect();
    if !qualifiers.is_empty() {
        purl.push('?');
        purl.push_str(&qualifiers.join("&"));
    }

    Some(purl)
}
