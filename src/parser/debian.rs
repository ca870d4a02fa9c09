//! Debian binary packages: an `ar` archive whose `control.tar*` member holds the
//! `control` paragraph.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::{RecognizeError, Result};
use crate::models::{Dependency, Package, PackageType, Party};

use super::headers::Headers;
use super::{decode_text, has_extension, has_magic, PackageParser};

const AR_MAGIC: &[u8] = b"!<arch>\n";
const AR_HEADER_LEN: usize = 60;

/// One member of an `ar` archive.
#[derive(Debug)]
struct ArMember {
    name: String,
    data: Vec<u8>,
}

/// Read the first `ar` member accepted by `wanted`, skipping over the others.
fn read_ar_member<R, F>(reader: &mut R, wanted: F) -> std::io::Result<Option<ArMember>>
where
    R: Read + Seek,
    F: Fn(&str) -> bool,
{
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if magic != AR_MAGIC {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "missing ar magic",
        ));
    }

    let mut header = [0u8; AR_HEADER_LEN];
    loop {
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        if &header[58..60] != b"`\n" {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "bad ar member header",
            ));
        }
        // GNU ar terminates names with '/'
        let name = String::from_utf8_lossy(&header[..16])
            .trim_end()
            .trim_end_matches('/')
            .to_string();
        let size: u64 = String::from_utf8_lossy(&header[48..58])
            .trim()
            .parse()
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "bad ar member size")
            })?;

        if wanted(&name) {
            let mut data = Vec::new();
            reader.by_ref().take(size).read_to_end(&mut data)?;
            if (data.len() as u64) < size {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            return Ok(Some(ArMember { name, data }));
        }
        // members are aligned to even offsets
        reader.seek(SeekFrom::Current((size + size % 2) as i64))?;
    }
}

/// Decompress a `control.tar*` member by its suffix and pull out `control`.
fn control_from_tar(member: &ArMember) -> std::io::Result<Option<String>> {
    let data = Cursor::new(member.data.as_slice());
    let reader: Box<dyn Read + '_> = match member.name.rsplit_once('.') {
        Some((_, "gz")) => Box::new(GzDecoder::new(data)),
        Some((_, "xz")) => Box::new(xz2::read::XzDecoder::new(data)),
        Some((_, "zst")) => Box::new(zstd::stream::read::Decoder::new(data)?),
        _ => Box::new(data),
    };
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let is_control = {
            let path = entry.path()?;
            path.as_os_str() == "control" || path.as_os_str() == "./control"
        };
        if is_control {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            return Ok(Some(decode_text(&bytes)));
        }
    }
    Ok(None)
}

/// `.deb` binary packages.
pub struct DebianDeb;

impl PackageParser for DebianDeb {
    const PACKAGE_TYPE: PackageType = PackageType::Deb;
    const DATASOURCE_ID: &'static str = "debian_deb";

    fn is_package_data_file(path: &Path) -> bool {
        has_extension(path, &["deb", "udeb"]) && has_magic(path, 0, AR_MAGIC)
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let mut file = File::open(path).map_err(|e| RecognizeError::io(path, e))?;
        let member = read_ar_member(&mut file, |name| name.starts_with("control.tar"))
            .map_err(|e| RecognizeError::parse("deb", path, e))?;
        let Some(member) = member else {
            return Err(RecognizeError::parse("deb", path, "no control.tar member"));
        };
        let control = control_from_tar(&member)
            .map_err(|e| RecognizeError::parse("deb", path, format!("{}: {e}", member.name)))?;
        let Some(control) = control else {
            return Err(RecognizeError::parse("deb", path, "control.tar has no control file"));
        };

        let headers = Headers::parse(&control);
        if headers.get("Package").is_none() {
            return Err(RecognizeError::parse("deb", path, "control file has no Package field"));
        }
        Ok(vec![parse_control(&headers)])
    }
}

fn parse_control(headers: &Headers) -> Package {
    let mut package = DebianDeb::new_package();
    package.name = headers.get_string("Package");
    package.version = headers.get_string("Version");
    package.homepage_url = headers.get_string("Homepage");
    package.description = headers.get_string("Description");
    package.keywords = headers.get_string("Section").into_iter().collect();

    let is_ubuntu = package
        .version
        .as_deref()
        .is_some_and(|v| v.contains("ubuntu"));
    package.namespace = Some(if is_ubuntu { "ubuntu" } else { "debian" }.to_string());

    if let Some(arch) = headers.get_string("Architecture") {
        package.qualifiers.insert("arch".to_string(), arch);
    }

    for (key, role) in [("Maintainer", "maintainer"), ("Original-Maintainer", "original-maintainer")] {
        if let Some(party) = headers.get(key).and_then(|m| Party::from_person_string(m, role)) {
            package.parties.push(party);
        }
    }

    if let Some(size) = headers.get("Installed-Size").and_then(|s| s.parse::<u64>().ok()) {
        package.extra_data.insert("installed_size".to_string(), size.into());
    }
    if let Some(source) = headers.get_string("Source") {
        package.extra_data.insert("source".to_string(), source.into());
    }

    let namespace = package.namespace.clone();
    for (key, scope, optional) in [
        ("Pre-Depends", "pre-depends", false),
        ("Depends", "depends", false),
        ("Recommends", "recommends", true),
        ("Suggests", "suggests", true),
    ] {
        if let Some(value) = headers.get(key) {
            for dep in parse_relations(value, namespace.as_deref(), scope) {
                package
                    .dependencies
                    .push(if optional { dep.optional() } else { dep });
            }
        }
    }
    package
}

/// Relationship fields: `libc6 (>= 2.14), libgcc1 | libgcc-s1`. Alternatives
/// become separate optional dependencies.
fn parse_relations(value: &str, namespace: Option<&str>, scope: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    for group in value.split(',') {
        let alternatives: Vec<&str> = group.split('|').map(str::trim).filter(|s| !s.is_empty()).collect();
        let has_alternatives = alternatives.len() > 1;
        for relation in alternatives {
            let (name, constraint) = match relation.split_once('(') {
                Some((name, rest)) => (name.trim(), Some(rest.trim_end_matches(')').trim())),
                None => (relation, None),
            };
            // drop architecture qualifiers and restriction lists
            let name = name
                .split(['[', '<'])
                .next()
                .unwrap_or(name)
                .trim()
                .split(':')
                .next()
                .unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            let dep = Dependency::new(PackageType::Deb, namespace, name, constraint, scope);
            deps.push(if has_alternatives { dep.optional() } else { dep });
        }
    }
    deps
}
