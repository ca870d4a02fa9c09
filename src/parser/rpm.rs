//! RPM packages: a 96 byte lead, a signature header and the main header, both in
//! the indexed header structure format.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{RecognizeError, Result};
use crate::models::{DeclaredLicense, Dependency, Package, PackageType, Party};

use super::bytes::{align_up, be_u16, be_u32, c_string};
use super::{has_extension, has_magic, non_empty, PackageParser};

const LEAD_MAGIC: &[u8] = &[0xED, 0xAB, 0xEE, 0xDB];
const HEADER_MAGIC: &[u8] = &[0x8E, 0xAD, 0xE8, 0x01];
const LEAD_LEN: usize = 96;
/// Sanity bound on the index entry count of a single header.
const MAX_INDEX_ENTRIES: usize = 65_536;

const TAG_NAME: u32 = 1000;
const TAG_VERSION: u32 = 1001;
const TAG_RELEASE: u32 = 1002;
const TAG_EPOCH: u32 = 1003;
const TAG_SUMMARY: u32 = 1004;
const TAG_DESCRIPTION: u32 = 1005;
const TAG_SIZE: u32 = 1009;
const TAG_DISTRIBUTION: u32 = 1010;
const TAG_VENDOR: u32 = 1011;
const TAG_LICENSE: u32 = 1014;
const TAG_PACKAGER: u32 = 1015;
const TAG_GROUP: u32 = 1016;
const TAG_URL: u32 = 1020;
const TAG_ARCH: u32 = 1022;
const TAG_SOURCERPM: u32 = 1044;
const TAG_REQUIREFLAGS: u32 = 1048;
const TAG_REQUIRENAME: u32 = 1049;
const TAG_REQUIREVERSION: u32 = 1050;

const TYPE_INT32: u32 = 4;
const TYPE_STRING: u32 = 6;
const TYPE_STRING_ARRAY: u32 = 8;
const TYPE_I18NSTRING: u32 = 9;

const SENSE_LESS: u32 = 0x02;
const SENSE_GREATER: u32 = 0x04;
const SENSE_EQUAL: u32 = 0x08;

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    tag: u32,
    kind: u32,
    offset: usize,
    count: usize,
}

/// One decoded header structure: index entries plus the data store they point into.
#[derive(Debug)]
struct Header {
    entries: Vec<IndexEntry>,
    store: Vec<u8>,
}

impl Header {
    /// Read a header from `reader`, which has at most `available` bytes left; returns the
    /// header and the number of bytes consumed.
    fn read<R: Read>(
        reader: &mut R,
        available: u64,
    ) -> std::result::Result<(Header, usize), String> {
        let mut intro = [0u8; 16];
        reader
            .read_exact(&mut intro)
            .map_err(|e| format!("truncated header: {e}"))?;
        if &intro[..4] != HEADER_MAGIC {
            return Err("bad header magic".to_string());
        }
        let count = be_u32(&intro, 8).unwrap_or_default() as usize;
        let store_len = be_u32(&intro, 12).unwrap_or_default() as usize;
        if count > MAX_INDEX_ENTRIES {
            return Err(format!("implausible index entry count {count}"));
        }
        let claimed = (count * 16 + store_len) as u64;
        let remaining = available.saturating_sub(intro.len() as u64);
        if claimed > remaining {
            return Err(format!(
                "header claims {claimed} bytes but only {remaining} remain"
            ));
        }

        let mut index = vec![0u8; count * 16];
        reader
            .read_exact(&mut index)
            .map_err(|e| format!("truncated header index: {e}"))?;
        let mut store = vec![0u8; store_len];
        reader
            .read_exact(&mut store)
            .map_err(|e| format!("truncated header store: {e}"))?;

        let entries = index
            .chunks_exact(16)
            .map(|raw| IndexEntry {
                tag: be_u32(raw, 0).unwrap_or_default(),
                kind: be_u32(raw, 4).unwrap_or_default(),
                offset: be_u32(raw, 8).unwrap_or_default() as usize,
                count: be_u32(raw, 12).unwrap_or_default() as usize,
            })
            .collect();
        Ok((Header { entries, store }, 16 + index.len() + store_len))
    }

    fn entry(&self, tag: u32) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    fn strings(&self, tag: u32) -> Vec<String> {
        let Some(entry) = self.entry(tag) else {
            return Vec::new();
        };
        match entry.kind {
            TYPE_STRING => c_string(&self.store, entry.offset)
                .map(|(s, _)| s)
                .into_iter()
                .collect(),
            TYPE_STRING_ARRAY | TYPE_I18NSTRING => {
                let mut out = Vec::with_capacity(entry.count);
                let mut offset = entry.offset;
                for _ in 0..entry.count {
                    let Some((s, len)) = c_string(&self.store, offset) else {
                        break;
                    };
                    offset += len;
                    out.push(s);
                }
                out
            }
            _ => Vec::new(),
        }
    }

    /// First string value; the default locale for I18N strings.
    fn string(&self, tag: u32) -> Option<String> {
        self.strings(tag).into_iter().next().and_then(|s| non_empty(&s))
    }

    fn int32s(&self, tag: u32) -> Vec<u32> {
        match self.entry(tag) {
            Some(entry) if entry.kind == TYPE_INT32 => (0..entry.count)
                .map_while(|i| be_u32(&self.store, entry.offset + i * 4))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn int32(&self, tag: u32) -> Option<u32> {
        self.int32s(tag).into_iter().next()
    }
}

/// `.rpm` binary and source packages.
pub struct RpmArchive;

impl PackageParser for RpmArchive {
    const PACKAGE_TYPE: PackageType = PackageType::Rpm;
    const DATASOURCE_ID: &'static str = "rpm_archive";

    fn is_package_data_file(path: &Path) -> bool {
        has_extension(path, &["rpm", "srpm"]) && has_magic(path, 0, LEAD_MAGIC)
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let mut file = File::open(path).map_err(|e| RecognizeError::io(path, e))?;
        let mut lead = [0u8; LEAD_LEN];
        file.read_exact(&mut lead)
            .map_err(|e| RecognizeError::parse("rpm", path, format!("truncated lead: {e}")))?;
        if &lead[..4] != LEAD_MAGIC {
            return Err(RecognizeError::parse("rpm", path, "bad lead magic"));
        }
        let is_source_lead = be_u16(&lead, 6) == Some(1);
        let file_len = file
            .metadata()
            .map_err(|e| RecognizeError::io(path, e))?
            .len();
        let mut available = file_len.saturating_sub(LEAD_LEN as u64);

        let (_, signature_len) = Header::read(&mut file, available)
            .map_err(|e| RecognizeError::parse("rpm", path, e))?;
        // the main header starts on an 8 byte boundary after the signature
        let padding = align_up(signature_len, 8) - signature_len;
        let mut skip = vec![0u8; padding];
        file.read_exact(&mut skip)
            .map_err(|e| RecognizeError::parse("rpm", path, e))?;
        available = available.saturating_sub((signature_len + padding) as u64);
        let (header, _) = Header::read(&mut file, available)
            .map_err(|e| RecognizeError::parse("rpm", path, e))?;

        if header.string(TAG_NAME).is_none() {
            return Err(RecognizeError::parse("rpm", path, "header has no NAME tag"));
        }
        Ok(vec![parse_header(&header, is_source_lead)])
    }
}

fn parse_header(header: &Header, is_source_lead: bool) -> Package {
    let mut package = RpmArchive::new_package();
    package.name = header.string(TAG_NAME);
    package.version = match (header.string(TAG_VERSION), header.string(TAG_RELEASE)) {
        (Some(v), Some(r)) => Some(format!("{v}-{r}")),
        (v, _) => v,
    };
    package.homepage_url = header.string(TAG_URL);
    package.keywords = header.string(TAG_GROUP).into_iter().collect();
    package.declared_license = header.string(TAG_LICENSE).map(DeclaredLicense::Text);

    let summary = header.string(TAG_SUMMARY);
    let description = header.string(TAG_DESCRIPTION);
    package.description = match (summary, description) {
        (Some(s), Some(d)) if !d.starts_with(&s) => Some(format!("{s}\n{d}")),
        (s, d) => d.or(s),
    };

    if let Some(epoch) = header.int32(TAG_EPOCH) {
        package.qualifiers.insert("epoch".to_string(), epoch.to_string());
    }
    let source_rpm = header.string(TAG_SOURCERPM);
    let arch = if is_source_lead || source_rpm.is_none() {
        Some("src".to_string())
    } else {
        header.string(TAG_ARCH)
    };
    if let Some(arch) = arch {
        package.qualifiers.insert("arch".to_string(), arch);
    }

    if let Some(vendor) = header.string(TAG_VENDOR) {
        package.parties.push(Party::organization(&vendor, "vendor"));
    }
    if let Some(packager) = header.string(TAG_PACKAGER) {
        if let Some(party) = Party::from_person_string(&packager, "packager") {
            package.parties.push(party);
        }
    }
    if let Some(size) = header.int32(TAG_SIZE) {
        package
            .extra_data
            .insert("installed_size".to_string(), size.into());
    }
    if let Some(distribution) = header.string(TAG_DISTRIBUTION) {
        package
            .extra_data
            .insert("distribution".to_string(), distribution.into());
    }
    if let Some(source_rpm) = source_rpm {
        package
            .extra_data
            .insert("source_rpm".to_string(), source_rpm.into());
    }

    let names = header.strings(TAG_REQUIRENAME);
    let versions = header.strings(TAG_REQUIREVERSION);
    let flags = header.int32s(TAG_REQUIREFLAGS);
    for (i, name) in names.iter().enumerate() {
        if name.starts_with("rpmlib(") {
            continue;
        }
        let requirement = versions
            .get(i)
            .filter(|v| !v.is_empty())
            .map(|v| format!("{}{v}", sense_operator(flags.get(i).copied().unwrap_or(0))));
        package.dependencies.push(Dependency::new(
            PackageType::Rpm,
            None,
            name,
            requirement.as_deref(),
            "requires",
        ));
    }
    package
}

fn sense_operator(flags: u32) -> &'static str {
    let less = flags & SENSE_LESS != 0;
    let greater = flags & SENSE_GREATER != 0;
    let equal = flags & SENSE_EQUAL != 0;
    match (less, greater, equal) {
        (true, false, true) => "<= ",
        (true, false, false) => "< ",
        (false, true, true) => ">= ",
        (false, true, false) => "> ",
        (false, false, true) => "= ",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::write_fixture;

    enum Tag<'a> {
        Str(&'a str),
        I18n(&'a str),
        Strs(&'a [&'a str]),
        Int(&'a [u32]),
    }

    fn header_bytes(tags: &[(u32, Tag<'_>)]) -> Vec<u8> {
        let mut index = Vec::new();
        let mut store = Vec::new();
        for (tag, value) in tags {
            let (kind, count) = match value {
                Tag::Str(_) => (TYPE_STRING, 1),
                Tag::I18n(_) => (TYPE_I18NSTRING, 1),
                Tag::Strs(items) => (TYPE_STRING_ARRAY, items.len()),
                Tag::Int(items) => {
                    while store.len() % 4 != 0 {
                        store.push(0);
                    }
                    (TYPE_INT32, items.len())
                }
            };
            index.extend_from_slice(&tag.to_be_bytes());
            index.extend_from_slice(&kind.to_be_bytes());
            index.extend_from_slice(&(store.len() as u32).to_be_bytes());
            index.extend_from_slice(&(count as u32).to_be_bytes());
            match value {
                Tag::Str(s) | Tag::I18n(s) => {
                    store.extend_from_slice(s.as_bytes());
                    store.push(0);
                }
                Tag::Strs(items) => {
                    for s in *items {
                        store.extend_from_slice(s.as_bytes());
                        store.push(0);
                    }
                }
                Tag::Int(items) => {
                    for n in *items {
                        store.extend_from_slice(&n.to_be_bytes());
                    }
                }
            }
        }
        let mut out = HEADER_MAGIC.to_vec();
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&((index.len() / 16) as u32).to_be_bytes());
        out.extend_from_slice(&(store.len() as u32).to_be_bytes());
        out.extend(index);
        out.extend(store);
        out
    }

    fn build_rpm(lead_type: u16, main: &[(u32, Tag<'_>)]) -> Vec<u8> {
        let mut out = LEAD_MAGIC.to_vec();
        out.extend_from_slice(&[3, 0]);
        out.extend_from_slice(&lead_type.to_be_bytes());
        out.resize(LEAD_LEN, 0);
        // 5 byte store leaves the signature unaligned
        let signature = header_bytes(&[(1000, Tag::Str("sig0"))]);
        let padded = align_up(signature.len(), 8);
        out.extend(signature);
        out.resize(LEAD_LEN + padded, 0);
        out.extend(header_bytes(main));
        out.extend_from_slice(b"payload");
        out
    }

    #[test]
    fn test_parse_binary_rpm() {
        let rpm = build_rpm(
            0,
            &[
                (TAG_NAME, Tag::Str("setup")),
                (TAG_VERSION, Tag::Str("2.8.71")),
                (TAG_RELEASE, Tag::Str("10.el7")),
                (TAG_EPOCH, Tag::Int(&[1])),
                (TAG_SUMMARY, Tag::I18n("A set of system configuration files")),
                (TAG_DESCRIPTION, Tag::I18n("The setup package contains files.")),
                (TAG_SIZE, Tag::Int(&[696893])),
                (TAG_VENDOR, Tag::Str("CentOS")),
                (TAG_LICENSE, Tag::Str("Public Domain")),
                (TAG_PACKAGER, Tag::Str("CentOS BuildSystem <http://bugs.centos.org>")),
                (TAG_GROUP, Tag::I18n("System Environment/Base")),
                (TAG_ARCH, Tag::Str("noarch")),
                (TAG_SOURCERPM, Tag::Str("setup-2.8.71-10.el7.src.rpm")),
                (TAG_REQUIREFLAGS, Tag::Int(&[0x0c, 0x0100_0008, 0])),
                (
                    TAG_REQUIRENAME,
                    Tag::Strs(&["system-release", "rpmlib(CompressedFileNames)", "/bin/sh"]),
                ),
                (TAG_REQUIREVERSION, Tag::Strs(&["7", "3.0.4-1", ""])),
            ],
        );
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "setup-2.8.71-10.el7.noarch.rpm", rpm);
        assert!(RpmArchive::is_package_data_file(&path));

        let p = &RpmArchive::recognize(&path).unwrap()[0];
        assert_eq!(
            p.purl().as_deref(),
            Some("pkg:rpm/setup@2.8.71-10.el7?arch=noarch&epoch=1")
        );
        assert_eq!(
            p.description.as_deref(),
            Some("A set of system configuration files\nThe setup package contains files.")
        );
        assert_eq!(p.keywords, vec!["System Environment/Base".to_string()]);
        assert_eq!(p.parties[0].name.as_deref(), Some("CentOS"));
        assert_eq!(p.extra_data["installed_size"], 696893);

        assert_eq!(p.dependencies.len(), 2);
        assert_eq!(p.dependencies[0].name, "system-release");
        assert_eq!(p.dependencies[0].extracted_requirement.as_deref(), Some(">= 7"));
        assert_eq!(p.dependencies[1].name, "/bin/sh");
        assert_eq!(p.dependencies[1].extracted_requirement, None);
    }

    #[test]
    fn test_source_rpm_gets_src_arch() {
        let rpm = build_rpm(
            1,
            &[
                (TAG_NAME, Tag::Str("setup")),
                (TAG_VERSION, Tag::Str("2.8.71")),
                (TAG_ARCH, Tag::Str("noarch")),
            ],
        );
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "setup.src.rpm", rpm);
        let p = &RpmArchive::recognize(&path).unwrap()[0];
        assert_eq!(p.qualifiers.get("arch").map(String::as_str), Some("src"));
    }

    #[test]
    fn test_oversized_store_length_is_rejected_before_reading() {
        let mut rpm = build_rpm(0, &[(TAG_NAME, Tag::Str("setup"))]);
        // store length of the signature header
        rpm[LEAD_LEN + 12..LEAD_LEN + 16].copy_from_slice(&0xFFFF_FFF0u32.to_be_bytes());
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "huge.rpm", rpm);
        match RpmArchive::recognize(&path) {
            Err(RecognizeError::Parse { message, .. }) => assert!(message.contains("remain")),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_latin1_string_array_keeps_later_entries() {
        let mut header = header_bytes(&[(TAG_REQUIRENAME, Tag::Strs(&["cafX", "second"]))]);
        let at = header.iter().position(|&b| b == b'X').unwrap();
        header[at] = 0xE9;
        let (parsed, _) = Header::read(&mut header.as_slice(), header.len() as u64).unwrap();
        assert_eq!(
            parsed.strings(TAG_REQUIRENAME),
            vec!["caf\u{FFFD}".to_string(), "second".to_string()]
        );
    }

    #[test]
    fn test_truncated_header_is_parse_error() {
        let mut rpm = build_rpm(0, &[(TAG_NAME, Tag::Str("setup"))]);
        rpm.truncate(LEAD_LEN + 20);
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "broken.rpm", rpm);
        assert!(matches!(
            RpmArchive::recognize(&path),
            Err(RecognizeError::Parse { format: "rpm", .. })
        ));
    }
}
