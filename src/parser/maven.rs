use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{RecognizeError, Result};
use crate::models::{DeclaredLicense, Dependency, Package, PackageType, Party};

use super::{file_name_is, has_extension, non_empty, read_text, PackageParser};

/// Maven `pom.xml` and published `*.pom` files.
pub struct MavenPom;

impl PackageParser for MavenPom {
    const PACKAGE_TYPE: PackageType = PackageType::Maven;
    const DATASOURCE_ID: &'static str = "maven_pom";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["pom.xml"]) || has_extension(path, &["pom"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let pom = Pom::parse(&content).map_err(|e| RecognizeError::parse("maven", path, e))?;
        Ok(vec![pom.into_package()])
    }
}

#[derive(Debug, Default)]
struct PomDependency {
    group_id: String,
    artifact_id: String,
    version: String,
    scope: String,
    optional: String,
}

#[derive(Debug, Default)]
struct PomParty {
    name: String,
    email: String,
    url: String,
}

/// Flat view of the POM fields we map. Values are raw text before property substitution.
#[derive(Debug, Default)]
struct Pom {
    fields: HashMap<String, String>,
    properties: HashMap<String, String>,
    licenses: Vec<(String, String)>,
    developers: Vec<PomParty>,
    contributors: Vec<PomParty>,
    dependencies: Vec<PomDependency>,
}

impl Pom {
    /// Walk the document keeping the element path, e.g. `project/parent/groupId`.
    fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut pom = Pom::default();
        let mut stack: Vec<String> = Vec::new();
        let mut saw_root = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let name = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                    if stack.is_empty() {
                        if name != "project" {
                            return Err(format!("unexpected root element <{name}>"));
                        }
                        saw_root = true;
                    }
                    stack.push(name);
                    pom.open(&stack);
                }
                Ok(Event::Empty(ref e)) => {
                    let name = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                    stack.push(name);
                    pom.open(&stack);
                    stack.pop();
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(Event::Text(ref e)) => {
                    let text = e.unescape().map_err(|e| e.to_string())?;
                    pom.text(&stack, &text);
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    pom.text(&stack, &text);
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(format!(
                        "error at position {}: {e}",
                        reader.buffer_position()
                    ))
                }
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(format!("unexpected end of document inside <{}>", stack.join("/")));
        }
        if !saw_root {
            return Err("missing <project> element".to_string());
        }
        Ok(pom)
    }

    fn open(&mut self, stack: &[String]) {
        let path: Vec<&str> = stack.iter().map(String::as_str).collect();
        match path.as_slice() {
            ["project", "licenses", "license"] => self.licenses.push(Default::default()),
            ["project", "developers", "developer"] => self.developers.push(Default::default()),
            ["project", "contributors", "contributor"] => {
                self.contributors.push(Default::default())
            }
            ["project", "dependencies", "dependency"] => {
                self.dependencies.push(Default::default())
            }
            _ => {}
        }
    }

    fn text(&mut self, stack: &[String], text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let path: Vec<&str> = stack.iter().map(String::as_str).collect();
        match path.as_slice() {
            ["project", "properties", key] => {
                self.properties.insert(key.to_string(), text.to_string());
            }
            ["project", "licenses", "license", field] => {
                if let Some(license) = self.licenses.last_mut() {
                    match *field {
                        "name" => license.0 = text.to_string(),
                        "url" => license.1 = text.to_string(),
                        _ => {}
                    }
                }
            }
            ["project", "developers", "developer", field] => {
                if let Some(party) = self.developers.last_mut() {
                    party.set(field, text);
                }
            }
            ["project", "contributors", "contributor", field] => {
                if let Some(party) = self.contributors.last_mut() {
                    party.set(field, text);
                }
            }
            ["project", "dependencies", "dependency", field] => {
                if let Some(dep) = self.dependencies.last_mut() {
                    match *field {
                        "groupId" => dep.group_id = text.to_string(),
                        "artifactId" => dep.artifact_id = text.to_string(),
                        "version" => dep.version = text.to_string(),
                        "scope" => dep.scope = text.to_string(),
                        "optional" => dep.optional = text.to_string(),
                        _ => {}
                    }
                }
            }
            ["project", rest @ ..] if rest.len() <= 2 => {
                self.fields.insert(rest.join("/"), text.to_string());
            }
            _ => {}
        }
    }

    fn field(&self, key: &str) -> Option<String> {
        self.fields
            .get(key)
            .map(|v| self.substitute(v))
            .and_then(|v| non_empty(&v))
    }

    fn group_id(&self) -> Option<String> {
        self.fields
            .get("groupId")
            .or_else(|| self.fields.get("parent/groupId"))
            .and_then(|v| non_empty(v))
    }

    fn version(&self) -> Option<String> {
        self.fields
            .get("version")
            .or_else(|| self.fields.get("parent/version"))
            .and_then(|v| non_empty(v))
    }

    /// Resolve `${...}` references against `<properties>` and project coordinates.
    /// Unknown references are left as written.
    fn substitute(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        let mut rest = value;
        while let Some(start) = rest.find("${") {
            let Some(end) = rest[start..].find('}') else {
                break;
            };
            out.push_str(&rest[..start]);
            let key = &rest[start + 2..start + end];
            match self.property(key) {
                Some(resolved) => out.push_str(&resolved),
                None => out.push_str(&rest[start..start + end + 1]),
            }
            rest = &rest[start + end + 1..];
        }
        out.push_str(rest);
        out
    }

    fn property(&self, key: &str) -> Option<String> {
        let key = key.trim();
        if let Some(value) = self.properties.get(key) {
            return Some(value.clone());
        }
        let key = key
            .strip_prefix("project.")
            .or_else(|| key.strip_prefix("pom."))
            .unwrap_or(key);
        match key {
            "groupId" => self.group_id(),
            "version" => self.version(),
            "parent.version" => self.fields.get("parent/version").cloned(),
            "parent.groupId" => self.fields.get("parent/groupId").cloned(),
            "artifactId" | "name" | "url" => self.fields.get(key).cloned(),
            _ => None,
        }
    }

    fn into_package(self) -> Package {
        let mut package = MavenPom::new_package();
        package.primary_language = Some("Java".to_string());
        package.namespace = self.group_id().map(|g| self.substitute(&g));
        package.name = self.field("artifactId");
        package.version = self.version().map(|v| self.substitute(&v));

        let name = self.field("name");
        let description = self.field("description");
        package.description = match (name, description) {
            (Some(name), Some(desc)) if name != desc => Some(format!("{name}\n{desc}")),
            (name, desc) => desc.or(name),
        };
        package.homepage_url = self.field("url");
        package.bug_tracking_url = self.field("issueManagement/url");
        package.vcs_url = self
            .field("scm/connection")
            .or_else(|| self.field("scm/url"));

        if let Some(packaging) = self.field("packaging") {
            if packaging != "jar" {
                package.qualifiers.insert("type".to_string(), packaging);
            }
        }

        let licenses = self
            .licenses
            .iter()
            .map(|(name, url)| DeclaredLicense::Object {
                kind: None,
                name: non_empty(name),
                url: non_empty(url),
            })
            .filter(|l| !matches!(l, DeclaredLicense::Object { name: None, url: None, .. }))
            .collect();
        package.declared_license = DeclaredLicense::from_list(licenses);

        for (parties, role) in [(&self.developers, "developer"), (&self.contributors, "contributor")] {
            for p in parties {
                let party = Party {
                    name: non_empty(&p.name),
                    email: non_empty(&p.email),
                    url: non_empty(&p.url),
                    ..Party::person(role)
                };
                if party.name.is_some() || party.email.is_some() {
                    package.parties.push(party);
                }
            }
        }
        if let Some(org) = self.field("organization/name") {
            let mut party = Party::organization(&org, "owner");
            party.url = self.field("organization/url");
            package.parties.push(party);
        }

        for dep in &self.dependencies {
            let artifact_id = self.substitute(&dep.artifact_id);
            if artifact_id.is_empty() {
                continue;
            }
            let group_id = self.substitute(&dep.group_id);
            let version = self.substitute(&dep.version);
            let scope = non_empty(&dep.scope).unwrap_or_else(|| "compile".to_string());
            // A concrete version (no range, no unresolved reference) is pinned
            let pinned = !version.is_empty()
                && !version.contains("${")
                && !version.starts_with('[')
                && !version.starts_with('(');
            let namespace = non_empty(&group_id);
            let mut d = if pinned {
                Dependency::resolved(
                    PackageType::Maven,
                    namespace.as_deref(),
                    &artifact_id,
                    &version,
                    &scope,
                )
            } else {
                Dependency::new(
                    PackageType::Maven,
                    namespace.as_deref(),
                    &artifact_id,
                    Some(&version),
                    &scope,
                )
            };
            d.name = if group_id.is_empty() {
                artifact_id.clone()
            } else {
                format!("{group_id}:{artifact_id}")
            };
            d.is_runtime = !matches!(scope.as_str(), "test" | "provided" | "system");
            d.is_optional = dep.optional.eq_ignore_ascii_case("true") || scope == "test";
            package.dependencies.push(d);
        }

        package
    }
}

impl PomParty {
    fn set(&mut self, field: &str, text: &str) {
        match field {
            "name" => self.name = text.to_string(),
            "email" => self.email = text.to_string(),
            "url" => self.url = text.to_string(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::write_fixture;

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <parent>
    <groupId>org.example</groupId>
    <artifactId>parent</artifactId>
    <version>1.2.0</version>
  </parent>
  <artifactId>widget</artifactId>
  <packaging>jar</packaging>
  <name>Widget</name>
  <url>https://example.org/widget</url>
  <properties>
    <commons.version>3.12.0</commons.version>
  </properties>
  <licenses>
    <license>
      <name>The Apache Software License, Version 2.0</name>
      <url>http://www.apache.org/licenses/LICENSE-2.0.txt</url>
    </license>
  </licenses>
  <developers>
    <developer><name>Ann</name><email>ann@example.org</email></developer>
  </developers>
  <scm><connection>scm:git:https://example.org/widget.git</connection></scm>
  <dependencies>
    <dependency>
      <groupId>org.apache.commons</groupId>
      <artifactId>commons-lang3</artifactId>
      <version>${commons.version}</version>
    </dependency>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>[4.0,5.0)</version>
      <scope>test</scope>
    </dependency>
    <dependency>
      <groupId>${project.groupId}</groupId>
      <artifactId>widget-core</artifactId>
      <version>${project.version}</version>
      <optional>true</optional>
    </dependency>
  </dependencies>
  <build><plugins><plugin><dependencies><dependency>
    <artifactId>ignored</artifactId>
  </dependency></dependencies></plugin></plugins></build>
</project>"#;

    #[test]
    fn test_parse_pom() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "pom.xml", POM);
        let p = &MavenPom::recognize(&path).unwrap()[0];
        assert_eq!(p.namespace.as_deref(), Some("org.example"));
        assert_eq!(p.name.as_deref(), Some("widget"));
        assert_eq!(p.version.as_deref(), Some("1.2.0"));
        assert_eq!(p.purl().as_deref(), Some("pkg:maven/org.example/widget@1.2.0"));
        assert_eq!(p.vcs_url.as_deref(), Some("scm:git:https://example.org/widget.git"));
        assert_eq!(p.parties[0].email.as_deref(), Some("ann@example.org"));
        assert_eq!(p.compute_normalized_license().as_deref(), Some("Apache-2.0"));

        assert_eq!(p.dependencies.len(), 3);
        let lang = &p.dependencies[0];
        assert_eq!(lang.name, "org.apache.commons:commons-lang3");
        assert_eq!(
            lang.purl.as_deref(),
            Some("pkg:maven/org.apache.commons/commons-lang3@3.12.0")
        );
        assert_eq!(lang.scope.as_deref(), Some("compile"));
        let junit = &p.dependencies[1];
        assert!(!junit.is_resolved);
        assert!(!junit.is_runtime);
        assert_eq!(junit.extracted_requirement.as_deref(), Some("[4.0,5.0)"));
        let core = &p.dependencies[2];
        assert_eq!(core.name, "org.example:widget-core");
        assert_eq!(core.extracted_requirement.as_deref(), Some("1.2.0"));
        assert!(core.is_optional);
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "broken.pom",
            "<project><artifactId>x</groupId></project>",
        );
        let err = MavenPom::recognize(&path).unwrap_err();
        assert!(matches!(err, RecognizeError::Parse { format: "maven", .. }));

        let path = write_fixture(dir.path(), "truncated.pom", "<project><artifactId>x");
        assert!(MavenPom::recognize(&path).is_err());
    }

    #[test]
    fn test_predicate() {
        assert!(MavenPom::is_package_data_file(Path::new("a/pom.xml")));
        assert!(MavenPom::is_package_data_file(Path::new("a/commons-io-2.4.pom")));
        assert!(!MavenPom::is_package_data_file(Path::new("a/build.xml")));
    }
}
