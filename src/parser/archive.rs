//! Container formats: Java archives, Microsoft cabinets, ISO images and plain
//! archives, plus the zip helpers other container parsers share.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use zip::ZipArchive;

use crate::error::{RecognizeError, Result};
use crate::models::{DeclaredLicense, FileReference, Package, PackageType, Party};

use super::bytes::{c_string, le_u16, le_u32, padded_str, u8_at};
use super::{decode_text, has_extension, has_magic, non_empty, PackageParser};

pub(crate) fn open_zip(path: &Path, format: &'static str) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| RecognizeError::io(path, e))?;
    ZipArchive::new(file)
        .map_err(|e| RecognizeError::parse(format, path, format!("failed to open archive: {e}")))
}

/// Name of the first entry accepted by `pred`.
pub(crate) fn find_zip_entry<F>(archive: &ZipArchive<File>, pred: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    archive.file_names().find(|name| pred(name)).map(str::to_string)
}

pub(crate) fn read_zip_entry(
    archive: &mut ZipArchive<File>,
    name: &str,
    path: &Path,
    format: &'static str,
) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| RecognizeError::parse(format, path, format!("failed to read {name}: {e}")))?;
    let mut content = Vec::new();
    entry
        .read_to_end(&mut content)
        .map_err(|e| RecognizeError::parse(format, path, format!("failed to read {name}: {e}")))?;
    Ok(content)
}

/// Java archives (`.jar`, `.war`, `.ear`) described by `META-INF/MANIFEST.MF` and
/// embedded Maven `pom.properties`.
pub struct JavaJar;

impl PackageParser for JavaJar {
    const PACKAGE_TYPE: PackageType = PackageType::Jar;
    const DATASOURCE_ID: &'static str = "java_jar";

    fn is_package_data_file(path: &Path) -> bool {
        has_extension(path, &["jar", "war", "ear"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let mut archive = open_zip(path, "jar")?;
        let manifest_name =
            find_zip_entry(&archive, |n| n.eq_ignore_ascii_case("META-INF/MANIFEST.MF"));
        let properties_name = find_zip_entry(&archive, |n| {
            n.starts_with("META-INF/maven/") && n.ends_with("/pom.properties")
        });

        if manifest_name.is_none() && properties_name.is_none() {
            tracing::debug!(path = %path.display(), "jar without manifest");
            return Ok(Vec::new());
        }

        let mut package = Self::new_package();
        package.primary_language = Some("Java".to_string());

        if let Some(name) = &manifest_name {
            let bytes = read_zip_entry(&mut archive, name, path, "jar")?;
            let manifest = parse_manifest(&decode_text(&bytes));
            apply_manifest(&mut package, &manifest);
            package.file_references.push(FileReference::new(name.clone()));
        }

        // Maven coordinates are more precise than OSGi headers
        if let Some(name) = &properties_name {
            let bytes = read_zip_entry(&mut archive, name, path, "jar")?;
            let props = parse_properties(&decode_text(&bytes));
            if let Some(group) = props.get("groupId") {
                package.namespace = Some(group.clone());
            }
            if let Some(artifact) = props.get("artifactId") {
                package.name = Some(artifact.clone());
            }
            if let Some(version) = props.get("version") {
                package.version = Some(version.clone());
            }
            package.file_references.push(FileReference::new(name.clone()));
        }

        Ok(vec![package])
    }
}

/// Main section of a JAR manifest. Continuation lines begin with a single space.
fn parse_manifest(text: &str) -> BTreeMap<String, String> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut last: Option<String> = None;
    for line in text.lines() {
        if line.is_empty() {
            // Per-entry sections follow the first blank line
            break;
        }
        if let Some(cont) = line.strip_prefix(' ') {
            if let Some(value) = last.as_ref().and_then(|k| fields.get_mut(k)) {
                value.push_str(cont);
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            fields.insert(key.clone(), value.trim().to_string());
            last = Some(key);
        }
    }
    fields
}

fn apply_manifest(package: &mut Package, manifest: &BTreeMap<String, String>) {
    let first = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| manifest.get(*k))
            .and_then(|v| non_empty(v))
    };

    // "org.example.bundle;singleton:=true"
    package.name = first(&["Bundle-SymbolicName", "Implementation-Title", "Bundle-Name"])
        .map(|n| n.split(';').next().unwrap_or_default().trim().to_string());
    package.version = first(&["Bundle-Version", "Implementation-Version", "Specification-Version"]);
    package.description = first(&["Bundle-Description"]);
    package.homepage_url = first(&["Bundle-DocURL", "Implementation-URL"]);
    package.declared_license = first(&["Bundle-License"]).map(DeclaredLicense::Text);
    if let Some(vendor) = first(&["Bundle-Vendor", "Implementation-Vendor", "Specification-Vendor"]) {
        package.parties.push(Party::organization(&vendor, "vendor"));
    }
    if let Some(main) = first(&["Main-Class"]) {
        package.extra_data.insert("main_class".to_string(), main.into());
    }
}

fn parse_properties(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('!'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

const CAB_MAGIC: &[u8] = b"MSCF";

/// Microsoft cabinet files: the CFFILE table becomes file references.
pub struct CabArchive;

impl PackageParser for CabArchive {
    const PACKAGE_TYPE: PackageType = PackageType::Cab;
    const DATASOURCE_ID: &'static str = "microsoft_cabinet";

    fn is_package_data_file(path: &Path) -> bool {
        has_extension(path, &["cab"]) && has_magic(path, 0, CAB_MAGIC)
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let data = super::read_bytes(path)?;
        let cab = parse_cabinet(&data).ok_or_else(|| {
            RecognizeError::parse("cab", path, "truncated or corrupt cabinet header")
        })?;

        let mut package = Self::new_package();
        package.size = Some(cab.size as u64);
        package.extra_data.insert(
            "cabinet_format".to_string(),
            format!("{}.{}", cab.version.0, cab.version.1).into(),
        );
        package.file_references = cab
            .files
            .into_iter()
            .map(|(name, size)| FileReference::new(name).with_size(size as u64))
            .collect();
        Ok(vec![package])
    }
}

struct Cabinet {
    size: u32,
    version: (u8, u8),
    files: Vec<(String, u32)>,
}

fn parse_cabinet(data: &[u8]) -> Option<Cabinet> {
    if data.get(..4)? != CAB_MAGIC {
        return None;
    }
    let size = le_u32(data, 8)?;
    let files_offset = le_u32(data, 16)? as usize;
    let minor = u8_at(data, 24)?;
    let major = u8_at(data, 25)?;
    let file_count = le_u16(data, 28)?;

    let mut files = Vec::with_capacity(file_count as usize);
    let mut off = files_offset;
    for _ in 0..file_count {
        let file_size = le_u32(data, off)?;
        // cbFile, uoffFolderStart, iFolder, date, time, attribs
        let (name, name_len) = c_string(data, off + 16)?;
        off += 16 + name_len;
        files.push((name.replace('\\', "/"), file_size));
    }
    Some(Cabinet {
        size,
        version: (major, minor),
        files,
    })
}

const ISO_PVD_OFFSET: u64 = 0x8000;
const ISO_SECTOR: usize = 2048;

/// ISO 9660 images: the primary volume descriptor names the package.
pub struct IsoImage;

impl PackageParser for IsoImage {
    const PACKAGE_TYPE: PackageType = PackageType::Iso;
    const DATASOURCE_ID: &'static str = "iso_disk_image";

    fn is_package_data_file(path: &Path) -> bool {
        has_extension(path, &["iso"]) && has_magic(path, ISO_PVD_OFFSET + 1, b"CD001")
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let mut file = File::open(path).map_err(|e| RecognizeError::io(path, e))?;
        file.seek(SeekFrom::Start(ISO_PVD_OFFSET))
            .map_err(|e| RecognizeError::io(path, e))?;
        let mut pvd = vec![0u8; ISO_SECTOR];
        file.read_exact(&mut pvd).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                RecognizeError::parse("iso", path, "truncated primary volume descriptor")
            }
            _ => RecognizeError::io(path, e),
        })?;

        if pvd[0] != 1 || &pvd[1..6] != b"CD001" {
            return Err(RecognizeError::parse(
                "iso",
                path,
                "first volume descriptor is not a primary volume descriptor",
            ));
        }

        let text = |off: usize, len: usize| padded_str(&pvd, off, len).and_then(|s| non_empty(&s));
        let mut package = Self::new_package();
        package.name = text(40, 32);
        let blocks = le_u32(&pvd, 80).unwrap_or(0) as u64;
        let block_size = le_u16(&pvd, 128).unwrap_or(0) as u64;
        if blocks > 0 && block_size > 0 {
            package.size = Some(blocks * block_size);
        }
        if let Some(publisher) = text(318, 128) {
            package.parties.push(Party::organization(&publisher, "publisher"));
        }
        package.release_date = iso_date(&pvd[813..830]);

        for (key, off, len) in [
            ("system_id", 8, 32),
            ("preparer_id", 446, 128),
            ("application_id", 574, 128),
        ] {
            if let Some(value) = text(off, len) {
                package.extra_data.insert(key.to_string(), value.into());
            }
        }
        Ok(vec![package])
    }
}

/// `YYYYMMDDHHMMSScc` + timezone byte; all zeros means unset.
fn iso_date(raw: &[u8]) -> Option<String> {
    let digits = std::str::from_utf8(raw.get(..8)?).ok()?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) || digits == "00000000" {
        return None;
    }
    Some(format!("{}-{}-{}", &digits[..4], &digits[4..6], &digits[6..8]))
}

/// Archives that never carry package metadata by themselves.
pub struct PlainArchive;

impl PackageParser for PlainArchive {
    const PACKAGE_TYPE: PackageType = PackageType::Archive;
    const DATASOURCE_ID: &'static str = "plain_archive";

    fn is_package_data_file(path: &Path) -> bool {
        has_extension(
            path,
            &["zip", "tar", "tar.gz", "tgz", "tar.bz2", "tbz2", "tar.xz", "txz", "7z", "rar"],
        )
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        tracing::debug!(path = %path.display(), "plain archive, no package manifest");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::write_fixture;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_jar_manifest_and_pom_properties() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commons-io-2.4.jar");
        write_zip(
            &path,
            &[
                (
                    "META-INF/MANIFEST.MF",
                    "Manifest-Version: 1.0\r\nBundle-SymbolicName: org.apache.commons.i\r\n o\r\nBundle-Version: 2.4.0\r\nBundle-Vendor: The Apache Software Foundation\r\nBundle-License: http://www.apache.org/licenses/LICENSE-2.0.txt\r\n\r\nName: foo\r\nBundle-Version: 9\r\n",
                ),
                (
                    "META-INF/maven/commons-io/commons-io/pom.properties",
                    "#Generated by Maven\ngroupId=commons-io\nartifactId=commons-io\nversion=2.4\n",
                ),
            ],
        );
        let packages = JavaJar::recognize(&path).unwrap();
        let p = &packages[0];
        assert_eq!(p.namespace.as_deref(), Some("commons-io"));
        assert_eq!(p.name.as_deref(), Some("commons-io"));
        assert_eq!(p.version.as_deref(), Some("2.4"));
        assert_eq!(p.parties[0].role.as_deref(), Some("vendor"));
        assert_eq!(p.compute_normalized_license().as_deref(), Some("Apache-2.0"));
        assert_eq!(p.file_references.len(), 2);
    }

    #[test]
    fn test_manifest_continuation() {
        let manifest = parse_manifest("Bundle-SymbolicName: org.apache.commons.i\n o;singleton:=true\n");
        assert_eq!(
            manifest.get("Bundle-SymbolicName").map(String::as_str),
            Some("org.apache.commons.io;singleton:=true")
        );
    }

    #[test]
    fn test_jar_without_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.jar");
        write_zip(&path, &[("Main.class", "xx")]);
        assert!(JavaJar::recognize(&path).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_jar_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "broken.jar", "not a zip");
        assert!(matches!(
            JavaJar::recognize(&path),
            Err(RecognizeError::Parse { format: "jar", .. })
        ));
    }

    fn build_cabinet<N: AsRef<[u8]>>(files: &[(N, u32)]) -> Vec<u8> {
        let header_len = 36;
        let folder_len = 8;
        let mut table = Vec::new();
        for (name, size) in files {
            table.extend_from_slice(&size.to_le_bytes());
            table.extend_from_slice(&0u32.to_le_bytes());
            table.extend_from_slice(&0u16.to_le_bytes());
            table.extend_from_slice(&[0u8; 6]);
            table.extend_from_slice(name.as_ref());
            table.push(0);
        }
        let total = header_len + folder_len + table.len();
        let mut data = Vec::new();
        data.extend_from_slice(CAB_MAGIC);
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&(total as u32).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&((header_len + folder_len) as u32).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(3); // minor
        data.push(1); // major
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&(files.len() as u16).to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&table);
        data
    }

    #[test]
    fn test_cabinet_file_references() {
        let dir = tempfile::tempdir().unwrap();
        let data = build_cabinet(&[("setup.inf", 120), ("bin\\tool.exe", 4096)]);
        let path = write_fixture(dir.path(), "driver.cab", &data);
        assert!(CabArchive::is_package_data_file(&path));
        let p = &CabArchive::recognize(&path).unwrap()[0];
        assert_eq!(p.extra_data["cabinet_format"], "1.3");
        assert_eq!(p.file_references.len(), 2);
        assert_eq!(p.file_references[1].path, "bin/tool.exe");
        assert_eq!(p.file_references[1].size, Some(4096));
    }

    #[test]
    fn test_cabinet_codepage_name_does_not_shift_later_entries() {
        let dir = tempfile::tempdir().unwrap();
        let data = build_cabinet(&[(&b"caf\xE9.txt"[..], 10), (&b"second.txt"[..], 20)]);
        let path = write_fixture(dir.path(), "latin1.cab", &data);
        let p = &CabArchive::recognize(&path).unwrap()[0];
        assert_eq!(
            p.file_references,
            vec![
                FileReference::new("caf\u{FFFD}.txt").with_size(10),
                FileReference::new("second.txt").with_size(20),
            ]
        );
    }

    #[test]
    fn test_cab_extension_without_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "fake.cab", "hello");
        assert!(!CabArchive::is_package_data_file(&path));
    }

    fn build_iso(volume_id: &str) -> Vec<u8> {
        let mut data = vec![0u8; ISO_PVD_OFFSET as usize + ISO_SECTOR];
        let pvd = &mut data[ISO_PVD_OFFSET as usize..];
        pvd[0] = 1;
        pvd[1..6].copy_from_slice(b"CD001");
        pvd[6] = 1;
        let mut vol = [b' '; 32];
        vol[..volume_id.len()].copy_from_slice(volume_id.as_bytes());
        pvd[40..72].copy_from_slice(&vol);
        pvd[80..84].copy_from_slice(&16u32.to_le_bytes());
        pvd[128..130].copy_from_slice(&2048u16.to_le_bytes());
        pvd[813..829].copy_from_slice(b"2021063012000000");
        data
    }

    #[test]
    fn test_iso_volume_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "ubuntu.iso", build_iso("UBUNTU_22_04"));
        assert!(IsoImage::is_package_data_file(&path));
        let p = &IsoImage::recognize(&path).unwrap()[0];
        assert_eq!(p.name.as_deref(), Some("UBUNTU_22_04"));
        assert_eq!(p.size, Some(32768));
        assert_eq!(p.release_date.as_deref(), Some("2021-06-30"));
    }

    #[test]
    fn test_truncated_volume_descriptor_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = build_iso("SHORT");
        data.truncate(ISO_PVD_OFFSET as usize + 6);
        let path = write_fixture(dir.path(), "small.iso", &data);
        assert!(IsoImage::is_package_data_file(&path));
        assert!(matches!(
            IsoImage::recognize(&path),
            Err(RecognizeError::Parse { format: "iso", .. })
        ));
    }

    #[test]
    fn test_plain_archives_are_empty() {
        for name in ["a.zip", "b.tar.gz", "c.7z", "d.rar", "e.tbz2"] {
            assert!(PlainArchive::is_package_data_file(Path::new(name)), "{name}");
            assert!(PlainArchive::recognize(Path::new(name)).unwrap().is_empty());
        }
    }
}
