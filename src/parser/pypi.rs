use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use toml::Value as TomlValue;

use crate::error::{RecognizeError, Result};
use crate::models::{DeclaredLicense, Dependency, Package, PackageType, Party};

use super::archive::{find_zip_entry, open_zip, read_zip_entry};
use super::headers::Headers;
use super::{
    decode_text, file_name, file_name_is, has_extension, non_empty, read_json, read_text,
    PackageParser,
};

const PYPI: PackageType = PackageType::Pypi;

static REQUIREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[([^\]]*)\])?\s*\(?([^;)]*)\)?\s*(?:;\s*(.*))?$")
        .expect("static regex")
});
static EXTRA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"extra\s*==\s*['"]([^'"]+)['"]"#).expect("static regex"));

/// A parsed PEP 508 requirement string.
#[derive(Debug, PartialEq)]
struct Requirement {
    name: String,
    specifier: Option<String>,
    extra: Option<String>,
}

impl Requirement {
    fn parse(raw: &str) -> Option<Self> {
        let caps = REQUIREMENT_RE.captures(raw.trim())?;
        let specifier = caps.get(3).and_then(|m| non_empty(m.as_str()));
        let extra = caps
            .get(4)
            .and_then(|m| EXTRA_RE.captures(m.as_str()))
            .map(|c| c[1].to_string());
        Some(Requirement {
            name: caps[1].to_string(),
            specifier,
            extra,
        })
    }

    /// Exact `==` pins become resolved dependencies.
    fn into_dependency(self, scope: &str) -> Dependency {
        let pinned = self.specifier.as_deref().and_then(|s| {
            let version = s.strip_prefix("==")?.trim();
            (!version.contains(',') && !version.contains('*')).then(|| version.to_string())
        });
        let scope = self.extra.as_deref().unwrap_or(scope);
        let mut dep = match pinned {
            Some(version) => Dependency::resolved(PYPI, None, &self.name, &version, scope),
            None => Dependency::new(PYPI, None, &self.name, self.specifier.as_deref(), scope),
        };
        if self.extra.is_some() {
            dep = dep.optional();
        }
        dep
    }
}

/// Core metadata: `METADATA` in wheels and installed `.dist-info`, `PKG-INFO` in sdists.
pub struct PythonMetadata;

impl PackageParser for PythonMetadata {
    const PACKAGE_TYPE: PackageType = PYPI;
    const DATASOURCE_ID: &'static str = "pypi_metadata";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["METADATA", "PKG-INFO"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let headers = Headers::parse(&content);
        if headers.get("Name").is_none() {
            return Err(RecognizeError::parse("pypi", path, "missing Name field"));
        }
        let mut package = Self::new_package();
        fill_from_metadata(&mut package, &headers);
        Ok(vec![package])
    }
}

fn fill_from_metadata(package: &mut Package, headers: &Headers) {
    package.primary_language = Some("Python".to_string());
    package.name = headers.get_string("Name");
    package.version = headers.get_string("Version");

    let summary = headers.get_string("Summary");
    let long = headers
        .get_string("Description")
        .or_else(|| headers.body.clone());
    package.description = match (summary, long) {
        (Some(s), Some(l)) => Some(format!("{s}\n{l}")),
        (s, l) => s.or(l),
    };

    package.homepage_url = headers.get_string("Home-page");
    package.download_url = headers.get_string("Download-URL");
    for project_url in headers.get_all("Project-URL") {
        let Some((label, url)) = project_url.split_once(',') else {
            continue;
        };
        let url = url.trim().to_string();
        let label = label.trim().to_lowercase();
        if label.contains("source") || label.contains("repository") || label.contains("code") {
            package.vcs_url.get_or_insert(url);
        } else if label.contains("issue") || label.contains("tracker") || label.contains("bug") {
            package.bug_tracking_url.get_or_insert(url);
        } else if label.contains("home") {
            package.homepage_url.get_or_insert(url);
        }
    }

    if let Some(keywords) = headers.get("Keywords") {
        let sep = if keywords.contains(',') { ',' } else { ' ' };
        package.keywords = keywords.split(sep).filter_map(non_empty).collect();
    }

    for (name_key, email_key, role) in [
        ("Author", "Author-email", "author"),
        ("Maintainer", "Maintainer-email", "maintainer"),
    ] {
        add_metadata_parties(package, headers.get(name_key), headers.get(email_key), role);
    }

    let mut licenses: Vec<String> = Vec::new();
    if let Some(expr) = headers.get("License-Expression") {
        licenses.push(expr.to_string());
    } else if let Some(license) = headers.get("License") {
        // Some projects paste the whole license text here; keep the first line only
        if let Some(first) = license.lines().next() {
            licenses.push(first.to_string());
        }
    }
    for classifier in headers.get_all("Classifier") {
        if let Some(rest) = classifier.strip_prefix("License ::") {
            let name = rest.rsplit("::").next().unwrap_or(rest).trim();
            if name != "OSI Approved" {
                licenses.push(name.to_string());
            }
        }
    }
    package.declared_license = DeclaredLicense::from_texts(licenses);

    if let Some(requires_python) = headers.get("Requires-Python") {
        package
            .extra_data
            .insert("python_requires".to_string(), requires_python.into());
    }

    package.dependencies = headers
        .get_all("Requires-Dist")
        .filter_map(Requirement::parse)
        .map(|r| r.into_dependency("install"))
        .collect();
}

/// `Author` / `Author-email` pairs. Email fields may hold several `Name <email>` entries.
fn add_metadata_parties(
    package: &mut Package,
    name: Option<&str>,
    email: Option<&str>,
    role: &str,
) {
    match (name, email) {
        (None, None) => {}
        (name, Some(email)) if email.contains('<') || email.contains(',') => {
            for entry in email.split(',') {
                if let Some(mut party) = Party::from_person_string(entry, role) {
                    if party.name.is_none() {
                        party.name = name.and_then(non_empty);
                    }
                    package.parties.push(party);
                }
            }
        }
        (name, email) => {
            let mut party = Party::person(role);
            party.name = name.and_then(non_empty);
            party.email = email.and_then(non_empty);
            package.parties.push(party);
        }
    }
}

/// `setup.py`, read by pattern; nothing is executed.
pub struct PythonSetupPy;

static SETUP_KWARG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*(name|version|description|author|author_email|maintainer|maintainer_email|url|download_url|license)\s*=\s*['"]([^'"]*)['"]"#,
    )
    .expect("static regex")
});
static SETUP_REQUIRES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(install_requires|tests_require)\s*=\s*\[([^\]]*)\]").expect("static regex")
});
static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).expect("static regex"));

impl PackageParser for PythonSetupPy {
    const PACKAGE_TYPE: PackageType = PYPI;
    const DATASOURCE_ID: &'static str = "pypi_setup_py";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["setup.py"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let mut package = Self::new_package();
        package.primary_language = Some("Python".to_string());

        let mut author = (None, None);
        let mut maintainer = (None, None);
        for caps in SETUP_KWARG_RE.captures_iter(&content) {
            let value = non_empty(&caps[2]);
            match &caps[1] {
                "name" => package.name = value,
                "version" => package.version = value,
                "description" => package.description = value,
                "author" => author.0 = value,
                "author_email" => author.1 = value,
                "maintainer" => maintainer.0 = value,
                "maintainer_email" => maintainer.1 = value,
                "url" => package.homepage_url = value,
                "download_url" => package.download_url = value,
                "license" => package.declared_license = value.map(DeclaredLicense::Text),
                _ => {}
            }
        }
        add_metadata_parties(&mut package, author.0.as_deref(), author.1.as_deref(), "author");
        add_metadata_parties(
            &mut package,
            maintainer.0.as_deref(),
            maintainer.1.as_deref(),
            "maintainer",
        );

        for caps in SETUP_REQUIRES_RE.captures_iter(&content) {
            let scope = if &caps[1] == "install_requires" { "install" } else { "tests" };
            for quoted in QUOTED_RE.captures_iter(&caps[2]) {
                if let Some(req) = Requirement::parse(&quoted[1]) {
                    let mut dep = req.into_dependency(scope);
                    if scope == "tests" {
                        dep = dep.development();
                    }
                    package.dependencies.push(dep);
                }
            }
        }
        Ok(vec![package])
    }
}

/// `Pipfile.lock`: JSON with `default` and `develop` sections of pinned packages.
pub struct PipfileLock;

impl PackageParser for PipfileLock {
    const PACKAGE_TYPE: PackageType = PYPI;
    const DATASOURCE_ID: &'static str = "pipfile_lock";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["Pipfile.lock"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let json = read_json(path, "pypi")?;
        let mut package = Self::new_package();
        package.primary_language = Some("Python".to_string());
        if let Some(hash) = json.pointer("/_meta/hash/sha256").and_then(Value::as_str) {
            package.sha256 = Some(hash.to_string());
        }

        for (section, scope) in [("default", "install"), ("develop", "develop")] {
            let Some(pkgs) = json.get(section).and_then(Value::as_object) else {
                continue;
            };
            for (name, info) in pkgs {
                let spec = info.get("version").and_then(Value::as_str).unwrap_or("");
                let mut dep = match spec.strip_prefix("==") {
                    Some(version) => Dependency::resolved(PYPI, None, name, version, scope),
                    None => Dependency::new(PYPI, None, name, Some(spec), scope),
                };
                if section == "develop" {
                    dep = dep.development();
                }
                package.dependencies.push(dep);
            }
        }
        Ok(vec![package])
    }
}

/// pip requirements files: `requirements.txt`, `requirements-dev.txt`, `dev-requirements.txt`.
pub struct PipRequirements;

impl PackageParser for PipRequirements {
    const PACKAGE_TYPE: PackageType = PYPI;
    const DATASOURCE_ID: &'static str = "pip_requirements";

    fn is_package_data_file(path: &Path) -> bool {
        let Some(name) = file_name(path) else {
            return false;
        };
        name.ends_with(".txt") && (name.starts_with("requirements") || name.ends_with("-requirements.txt"))
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let mut package = Self::new_package();
        package.primary_language = Some("Python".to_string());
        package.dependencies = parse_requirements(&content);
        Ok(vec![package])
    }
}

fn parse_requirements(content: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    for line in content.lines() {
        // Strip inline comments
        let line = line.split(" #").next().unwrap_or(line).trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') || line.contains("://") {
            continue;
        }
        if let Some(req) = Requirement::parse(line) {
            deps.push(req.into_dependency("install"));
        }
    }
    deps
}

/// `pyproject.toml` with PEP 621 `[project]` or `[tool.poetry]` tables.
pub struct PyprojectToml;

impl PackageParser for PyprojectToml {
    const PACKAGE_TYPE: PackageType = PYPI;
    const DATASOURCE_ID: &'static str = "pypi_pyproject_toml";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["pyproject.toml"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let doc: TomlValue =
            toml::from_str(&content).map_err(|e| RecognizeError::parse("pypi", path, e))?;

        let mut package = Self::new_package();
        package.primary_language = Some("Python".to_string());
        if let Some(project) = doc.get("project") {
            fill_from_pep621(&mut package, project);
        } else if let Some(poetry) = doc.get("tool").and_then(|t| t.get("poetry")) {
            fill_from_poetry(&mut package, poetry);
        }
        Ok(vec![package])
    }
}

fn toml_str(value: &TomlValue, key: &str) -> Option<String> {
    value.get(key).and_then(TomlValue::as_str).and_then(non_empty)
}

fn toml_strings(value: Option<&TomlValue>) -> Vec<String> {
    value
        .and_then(TomlValue::as_array)
        .map(|items| items.iter().filter_map(TomlValue::as_str).filter_map(non_empty).collect())
        .unwrap_or_default()
}

fn fill_from_pep621(package: &mut Package, project: &TomlValue) {
    package.name = toml_str(project, "name");
    package.version = toml_str(project, "version");
    package.description = toml_str(project, "description");
    package.keywords = toml_strings(project.get("keywords"));
    package.declared_license = match project.get("license") {
        Some(TomlValue::String(s)) => non_empty(s).map(DeclaredLicense::Text),
        Some(table) => toml_str(table, "text").map(DeclaredLicense::Text),
        None => None,
    };

    for (key, role) in [("authors", "author"), ("maintainers", "maintainer")] {
        let Some(people) = project.get(key).and_then(TomlValue::as_array) else {
            continue;
        };
        for person in people {
            let mut party = Party::person(role);
            party.name = toml_str(person, "name");
            party.email = toml_str(person, "email");
            if party.name.is_some() || party.email.is_some() {
                package.parties.push(party);
            }
        }
    }

    if let Some(urls) = project.get("urls").and_then(TomlValue::as_table) {
        for (label, url) in urls {
            let Some(url) = url.as_str().and_then(non_empty) else {
                continue;
            };
            let label = label.to_lowercase();
            if label.contains("home") {
                package.homepage_url.get_or_insert(url);
            } else if label.contains("source") || label.contains("repository") {
                package.vcs_url.get_or_insert(url);
            } else if label.contains("issue") || label.contains("tracker") || label.contains("bug") {
                package.bug_tracking_url.get_or_insert(url);
            }
        }
    }

    for raw in toml_strings(project.get("dependencies")) {
        if let Some(req) = Requirement::parse(&raw) {
            package.dependencies.push(req.into_dependency("install"));
        }
    }
    if let Some(groups) = project.get("optional-dependencies").and_then(TomlValue::as_table) {
        for (group, reqs) in groups {
            for raw in toml_strings(Some(reqs)) {
                if let Some(req) = Requirement::parse(&raw) {
                    package.dependencies.push(req.into_dependency(group).optional());
                }
            }
        }
    }
}

fn fill_from_poetry(package: &mut Package, poetry: &TomlValue) {
    package.name = toml_str(poetry, "name");
    package.version = toml_str(poetry, "version");
    package.description = toml_str(poetry, "description");
    package.homepage_url = toml_str(poetry, "homepage");
    package.vcs_url = toml_str(poetry, "repository");
    package.keywords = toml_strings(poetry.get("keywords"));
    package.declared_license = toml_str(poetry, "license").map(DeclaredLicense::Text);
    for author in toml_strings(poetry.get("authors")) {
        package.parties.extend(Party::from_person_string(&author, "author"));
    }

    let mut tables: Vec<(String, &TomlValue)> = Vec::new();
    if let Some(deps) = poetry.get("dependencies") {
        tables.push(("install".to_string(), deps));
    }
    if let Some(deps) = poetry.get("dev-dependencies") {
        tables.push(("dev".to_string(), deps));
    }
    if let Some(groups) = poetry.get("group").and_then(TomlValue::as_table) {
        for (group, table) in groups {
            if let Some(deps) = table.get("dependencies") {
                tables.push((group.clone(), deps));
            }
        }
    }

    for (scope, table) in tables {
        let Some(table) = table.as_table() else {
            continue;
        };
        for (name, spec) in table {
            if name == "python" {
                continue;
            }
            let requirement = match spec {
                TomlValue::String(s) => Some(s.as_str()),
                other => other.get("version").and_then(TomlValue::as_str),
            };
            let mut dep = Dependency::new(PYPI, None, name, requirement, &scope);
            if scope != "install" {
                dep = dep.development();
            }
            package.dependencies.push(dep);
        }
    }
}

/// Built distributions: wheels (`*.whl`) and eggs (`*.egg`).
pub struct PythonWheel;

impl PackageParser for PythonWheel {
    const PACKAGE_TYPE: PackageType = PYPI;
    const DATASOURCE_ID: &'static str = "pypi_distribution";

    fn is_package_data_file(path: &Path) -> bool {
        has_extension(path, &["whl", "egg"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let mut archive = open_zip(path, "pypi")?;
        let Some(entry) = find_zip_entry(&archive, |name| {
            name.ends_with(".dist-info/METADATA") || name == "EGG-INFO/PKG-INFO"
        }) else {
            tracing::debug!(path = %path.display(), "no core metadata in distribution");
            return Ok(Vec::new());
        };
        let bytes = read_zip_entry(&mut archive, &entry, path, "pypi")?;
        let headers = Headers::parse(&decode_text(&bytes));

        let mut package = Self::new_package();
        fill_from_metadata(&mut package, &headers);
        package.file_references.push(crate::models::FileReference::new(entry));
        Ok(vec![package])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::write_fixture;

    const METADATA: &str = "Metadata-Version: 2.1
Name: requests
Version: 2.31.0
Summary: Python HTTP for Humans.
Home-page: https://requests.readthedocs.io
Author: Kenneth Reitz
Author-email: me@kennethreitz.org
License: Apache 2.0
Project-URL: Source, https://github.com/psf/requests
Classifier: License :: OSI Approved :: Apache Software License
Requires-Python: >=3.7
Requires-Dist: charset-normalizer (<4,>=2)
Requires-Dist: idna<4,>=2.5
Requires-Dist: PySocks!=1.5.7,>=1.5.6 ; extra == 'socks'

Requests is an HTTP library.
";

    #[test]
    fn test_parse_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "METADATA", METADATA);
        let p = &PythonMetadata::recognize(&path).unwrap()[0];
        assert_eq!(p.name.as_deref(), Some("requests"));
        assert_eq!(
            p.description.as_deref(),
            Some("Python HTTP for Humans.\nRequests is an HTTP library.")
        );
        assert_eq!(p.vcs_url.as_deref(), Some("https://github.com/psf/requests"));
        assert_eq!(p.parties[0].name.as_deref(), Some("Kenneth Reitz"));
        assert_eq!(p.parties[0].email.as_deref(), Some("me@kennethreitz.org"));
        assert_eq!(p.compute_normalized_license().as_deref(), Some("Apache-2.0"));
        assert_eq!(p.dependencies.len(), 3);
        assert_eq!(
            p.dependencies[0].extracted_requirement.as_deref(),
            Some("<4,>=2")
        );
        let socks = &p.dependencies[2];
        assert_eq!(socks.name, "PySocks");
        assert_eq!(socks.scope.as_deref(), Some("socks"));
        assert!(socks.is_optional);
    }

    #[test]
    fn test_metadata_without_name_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "PKG-INFO", "just some text\n");
        assert!(PythonMetadata::recognize(&path).is_err());
    }

    #[test]
    fn test_parse_requirements() {
        let deps = parse_requirements(
            "# comment\nrequests==2.28.1\nflask>=2.0.0  # web\n-r other.txt\nnumpy==1.24.0 ; python_version >= '3.8'\nuvicorn[standard]\n",
        );
        assert_eq!(deps.len(), 4);
        assert_eq!(deps[0].purl.as_deref(), Some("pkg:pypi/requests@2.28.1"));
        assert!(deps[0].is_resolved);
        assert_eq!(deps[1].extracted_requirement.as_deref(), Some(">=2.0.0"));
        assert!(!deps[1].is_resolved);
        assert_eq!(deps[2].name, "numpy");
        assert_eq!(deps[3].name, "uvicorn");
    }

    #[test]
    fn test_requirements_predicate() {
        assert!(PipRequirements::is_package_data_file(Path::new("requirements.txt")));
        assert!(PipRequirements::is_package_data_file(Path::new("requirements-dev.txt")));
        assert!(PipRequirements::is_package_data_file(Path::new("dev-requirements.txt")));
        assert!(!PipRequirements::is_package_data_file(Path::new("notes.txt")));
    }

    #[test]
    fn test_parse_setup_py() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "setup.py",
            r#"from setuptools import setup

setup(
    name='demo',
    version='1.0.0',
    author='Jane',
    author_email='jane@example.com',
    license='BSD',
    install_requires=[
        'six>=1.0',
        "attrs",
    ],
)
"#,
        );
        let p = &PythonSetupPy::recognize(&path).unwrap()[0];
        assert_eq!(p.name.as_deref(), Some("demo"));
        assert_eq!(p.parties[0].email.as_deref(), Some("jane@example.com"));
        assert_eq!(p.dependencies.len(), 2);
        assert_eq!(p.dependencies[1].name, "attrs");
    }

    #[test]
    fn test_parse_pipfile_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "Pipfile.lock",
            r#"{"_meta": {"hash": {"sha256": "abc"}},
"default": {"requests": {"version": "==2.28.1"}},
"develop": {"pytest": {"version": "==7.0.0"}}}"#,
        );
        let p = &PipfileLock::recognize(&path).unwrap()[0];
        assert_eq!(p.sha256.as_deref(), Some("abc"));
        assert_eq!(p.dependencies[0].purl.as_deref(), Some("pkg:pypi/requests@2.28.1"));
        assert!(!p.dependencies[1].is_runtime);
    }

    #[test]
    fn test_parse_pyproject_pep621_and_poetry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "pyproject.toml",
            r#"
[project]
name = "spam"
version = "2.0"
license = {text = "MIT"}
authors = [{name = "Ann", email = "ann@example.org"}]
dependencies = ["httpx>=0.24", "rich==13.0.0"]

[project.optional-dependencies]
test = ["pytest"]

[project.urls]
Homepage = "https://spam.dev"
Repository = "https://github.com/spam/spam"
"#,
        );
        let p = &PyprojectToml::recognize(&path).unwrap()[0];
        assert_eq!(p.name.as_deref(), Some("spam"));
        assert_eq!(p.compute_normalized_license().as_deref(), Some("MIT"));
        assert_eq!(p.homepage_url.as_deref(), Some("https://spam.dev"));
        assert_eq!(p.vcs_url.as_deref(), Some("https://github.com/spam/spam"));
        assert_eq!(p.dependencies.len(), 3);
        assert_eq!(p.dependencies[2].scope.as_deref(), Some("test"));

        let path = write_fixture(
            dir.path(),
            "poetry/pyproject.toml",
            r#"
[tool.poetry]
name = "eggs"
version = "0.1.0"
authors = ["Bob <bob@example.org>"]
license = "Apache-2.0"

[tool.poetry.dependencies]
python = "^3.9"
requests = "^2.28"

[tool.poetry.group.dev.dependencies]
pytest = { version = "^7.0" }
"#,
        );
        let p = &PyprojectToml::recognize(&path).unwrap()[0];
        assert_eq!(p.name.as_deref(), Some("eggs"));
        assert_eq!(p.dependencies.len(), 2);
        assert_eq!(p.dependencies[0].name, "requests");
        assert!(!p.dependencies[1].is_runtime);
    }

    #[test]
    fn test_parse_wheel() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests-2.31.0-py3-none-any.whl");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("requests/__init__.py", options).unwrap();
        zip.write_all(b"").unwrap();
        zip.start_file("requests-2.31.0.dist-info/METADATA", options).unwrap();
        zip.write_all(METADATA.as_bytes()).unwrap();
        zip.finish().unwrap();

        let packages = PythonWheel::recognize(&path).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].version.as_deref(), Some("2.31.0"));
        assert_eq!(packages[0].datasource_id, "pypi_distribution");
        assert_eq!(
            packages[0].file_references[0].path,
            "requests-2.31.0.dist-info/METADATA"
        );
    }
}
