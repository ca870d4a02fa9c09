//! Windows Portable Executables: version metadata from the `RT_VERSION` resource.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{RecognizeError, Result};
use crate::models::{DeclaredLicense, Package, PackageType, Party};

use super::bytes::{align_up, le_u16, le_u32, utf16le, utf16le_cstr};
use super::{has_extension, has_magic, non_empty, read_bytes, PackageParser};

const PE_EXTENSIONS: &[&str] = &[
    "exe", "dll", "mui", "mun", "com", "winmd", "sys", "tlb", "ocx", "cpl", "scr", "efi",
];

const PE32_MAGIC: u16 = 0x10b;
const PE32_PLUS_MAGIC: u16 = 0x20b;
const RESOURCE_DIRECTORY_INDEX: usize = 2;
const RT_VERSION: u32 = 16;
const SUBDIRECTORY_FLAG: u32 = 0x8000_0000;
const FIXED_FILE_INFO_SIGNATURE: u32 = 0xFEEF_04BD;
/// Nesting guard for the resource directory walk.
const MAX_RESOURCE_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy)]
struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_size: u32,
    raw_pointer: u32,
}

/// The headers needed to locate resources.
#[derive(Debug)]
struct PeImage<'a> {
    data: &'a [u8],
    sections: Vec<Section>,
    resource_rva: u32,
}

impl<'a> PeImage<'a> {
    fn parse(data: &'a [u8]) -> std::result::Result<Self, String> {
        let pe_offset = le_u32(data, 0x3C).ok_or("truncated DOS header")? as usize;
        if data.get(pe_offset..pe_offset + 4) != Some(b"PE\0\0".as_slice()) {
            return Err("missing PE signature".to_string());
        }
        let coff = pe_offset + 4;
        let section_count = le_u16(data, coff + 2).ok_or("truncated COFF header")? as usize;
        let optional_size = le_u16(data, coff + 16).ok_or("truncated COFF header")? as usize;
        let optional = coff + 20;

        let directories = match le_u16(data, optional) {
            Some(PE32_MAGIC) => optional + 96,
            Some(PE32_PLUS_MAGIC) => optional + 112,
            Some(other) => return Err(format!("unknown optional header magic {other:#x}")),
            None => return Err("truncated optional header".to_string()),
        };
        let directory_count = le_u32(data, directories - 4).unwrap_or(0) as usize;
        let resource_rva = if directory_count > RESOURCE_DIRECTORY_INDEX {
            le_u32(data, directories + RESOURCE_DIRECTORY_INDEX * 8).unwrap_or(0)
        } else {
            0
        };

        let table = optional + optional_size;
        let sections = (0..section_count)
            .map(|i| {
                let at = table + i * 40;
                Some(Section {
                    virtual_size: le_u32(data, at + 8)?,
                    virtual_address: le_u32(data, at + 12)?,
                    raw_size: le_u32(data, at + 16)?,
                    raw_pointer: le_u32(data, at + 20)?,
                })
            })
            .collect::<Option<Vec<_>>>()
            .ok_or("truncated section table")?;

        Ok(PeImage {
            data,
            sections,
            resource_rva,
        })
    }

    fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        self.sections.iter().find_map(|s| {
            let span = s.virtual_size.max(s.raw_size);
            let delta = rva.checked_sub(s.virtual_address)?;
            if delta >= span {
                return None;
            }
            let offset = (s.raw_pointer as usize).checked_add(delta as usize)?;
            (offset < self.data.len()).then_some(offset)
        })
    }

    /// Bytes of the first `RT_VERSION` resource, if any.
    fn version_resource(&self) -> Option<&'a [u8]> {
        if self.resource_rva == 0 {
            return None;
        }
        let root = self.rva_to_offset(self.resource_rva)?;
        let mut entry = self.directory_entry(root, 0, Some(RT_VERSION))?;
        for _ in 1..MAX_RESOURCE_DEPTH {
            if entry & SUBDIRECTORY_FLAG == 0 {
                break;
            }
            entry = self.directory_entry(root, (entry & !SUBDIRECTORY_FLAG) as usize, None)?;
        }
        if entry & SUBDIRECTORY_FLAG != 0 {
            return None;
        }
        let leaf = root + entry as usize;
        let data_rva = le_u32(self.data, leaf)?;
        let size = le_u32(self.data, leaf + 4)? as usize;
        let start = self.rva_to_offset(data_rva)?;
        self.data.get(start..start + size)
    }

    /// `OffsetToData` of the entry with `id` (or the first entry) in the directory at
    /// `root + offset`.
    fn directory_entry(&self, root: usize, offset: usize, id: Option<u32>) -> Option<u32> {
        let dir = root + offset;
        let named = le_u16(self.data, dir + 12)? as usize;
        let ids = le_u16(self.data, dir + 14)? as usize;
        (0..named + ids).find_map(|i| {
            let at = dir + 16 + i * 8;
            let name = le_u32(self.data, at)?;
            let target = le_u32(self.data, at + 4)?;
            match id {
                Some(id) if name != id => None,
                _ => Some(target),
            }
        })
    }
}

/// One node of the `VS_VERSIONINFO` tree.
#[derive(Debug)]
struct VersionBlock {
    key: String,
    value_offset: usize,
    value_len: usize,
    is_text: bool,
    children_offset: usize,
    end: usize,
}

impl VersionBlock {
    fn read(data: &[u8], offset: usize) -> Option<Self> {
        let length = le_u16(data, offset)? as usize;
        if length < 6 {
            return None;
        }
        let end = (offset + length).min(data.len());
        let value_len = le_u16(data, offset + 2)? as usize;
        let is_text = le_u16(data, offset + 4)? == 1;
        let (key, key_len) = utf16le_cstr(data, offset + 6)?;
        let value_offset = align_up(offset + 6 + key_len, 4);
        let value_bytes = if is_text { value_len * 2 } else { value_len };
        Some(VersionBlock {
            key,
            value_offset,
            value_len,
            is_text,
            children_offset: align_up(value_offset + value_bytes, 4),
            end,
        })
    }

    fn children(&self, data: &[u8]) -> Vec<VersionBlock> {
        let mut out = Vec::new();
        let mut pos = self.children_offset;
        while pos + 6 <= self.end {
            let Some(child) = VersionBlock::read(data, pos) else {
                break;
            };
            pos = align_up(child.end, 4);
            out.push(child);
        }
        out
    }

    fn text(&self, data: &[u8]) -> Option<String> {
        if !self.is_text {
            return None;
        }
        let units = self.value_len.min(self.end.saturating_sub(self.value_offset) / 2);
        let text = utf16le(data, self.value_offset, units)?;
        non_empty(text.trim_end_matches('\0'))
    }
}

/// `StringFileInfo` strings and the fixed product version of a version resource.
fn read_version_info(data: &[u8]) -> (BTreeMap<String, String>, Option<String>) {
    let mut strings = BTreeMap::new();
    let Some(root) = VersionBlock::read(data, 0) else {
        return (strings, None);
    };

    let fixed_version = (root.value_len >= 52
        && le_u32(data, root.value_offset) == Some(FIXED_FILE_INFO_SIGNATURE))
    .then(|| {
        let ms = le_u32(data, root.value_offset + 16)?;
        let ls = le_u32(data, root.value_offset + 20)?;
        Some(format!("{}.{}.{}.{}", ms >> 16, ms & 0xFFFF, ls >> 16, ls & 0xFFFF))
    })
    .flatten();

    for info in root.children(data) {
        if info.key != "StringFileInfo" {
            continue;
        }
        for table in info.children(data) {
            for entry in table.children(data) {
                if let Some(value) = entry.text(data) {
                    strings.entry(entry.key).or_insert(value);
                }
            }
        }
    }
    (strings, fixed_version)
}

/// Windows executables and libraries.
pub struct WindowsExecutable;

impl PackageParser for WindowsExecutable {
    const PACKAGE_TYPE: PackageType = PackageType::WindowsPe;
    const DATASOURCE_ID: &'static str = "windows_executable";

    fn is_package_data_file(path: &Path) -> bool {
        has_extension(path, PE_EXTENSIONS) && has_magic(path, 0, b"MZ")
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let data = read_bytes(path)?;
        let image = PeImage::parse(&data).map_err(|e| RecognizeError::parse("pe", path, e))?;
        let Some(resource) = image.version_resource() else {
            tracing::debug!(path = %path.display(), "no version resource");
            return Ok(Vec::new());
        };
        let (strings, fixed_version) = read_version_info(resource);
        Ok(vec![package_from_strings(&strings, fixed_version)])
    }
}

fn package_from_strings(strings: &BTreeMap<String, String>, fixed_version: Option<String>) -> Package {
    let get = |key: &str| strings.get(key).cloned();
    let mut package = WindowsExecutable::new_package();
    package.name = get("ProductName").or_else(|| get("OriginalFilename"));
    package.version = get("ProductVersion")
        .or_else(|| get("FileVersion"))
        .or(fixed_version);
    package.copyright = get("LegalCopyright");
    package.homepage_url = get("URL").or_else(|| get("WWW"));
    package.declared_license = get("License").map(DeclaredLicense::Text);
    package.description = match (get("FileDescription"), get("Comments")) {
        (Some(d), Some(c)) if d != c => Some(format!("{d}\n{c}")),
        (d, c) => d.or(c),
    };
    if let Some(company) = get("CompanyName") {
        package.parties.push(Party::organization(&company, "author"));
    }
    if let Some(file_version) = get("FileVersion") {
        package
            .extra_data
            .insert("file_version".to_string(), file_version.into());
    }
    package
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::write_fixture;

    #[test]
    fn test_rva_outside_file_is_unmapped() {
        let data = vec![0u8; 0x400];
        let image = PeImage {
            data: &data,
            sections: vec![Section {
                virtual_address: 0x1000,
                virtual_size: 0x1000,
                raw_size: 0x1000,
                raw_pointer: 0xFFFF_FF00,
            }],
            resource_rva: 0x1800,
        };
        assert_eq!(image.rva_to_offset(0x1800), None);
        assert_eq!(image.version_resource(), None);
    }

    #[test]
    fn test_rva_maps_through_section() {
        let data = vec![0u8; 0x400];
        let image = PeImage {
            data: &data,
            sections: vec![Section {
                virtual_address: 0x1000,
                virtual_size: 0x200,
                raw_size: 0x200,
                raw_pointer: 0x200,
            }],
            resource_rva: 0,
        };
        assert_eq!(image.rva_to_offset(0x1010), Some(0x210));
        assert_eq!(image.rva_to_offset(0x1200), None);
    }

    fn utf16z(s: &str) -> Vec<u8> {
        s.encode_utf16()
            .chain([0])
            .flat_map(u16::to_le_bytes)
            .collect()
    }

    fn pad4(buf: &mut Vec<u8>) {
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
    }

    fn block(key: &str, value: &[u8], value_len: u16, is_text: bool, children: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0, 0];
        out.extend_from_slice(&value_len.to_le_bytes());
        out.extend_from_slice(&u16::from(is_text).to_le_bytes());
        out.extend(utf16z(key));
        pad4(&mut out);
        out.extend_from_slice(value);
        for child in children {
            pad4(&mut out);
            out.extend_from_slice(child);
        }
        let len = out.len() as u16;
        out[..2].copy_from_slice(&len.to_le_bytes());
        out
    }

    fn string(key: &str, value: &str) -> Vec<u8> {
        let value = utf16z(value);
        block(key, &value, (value.len() / 2) as u16, true, &[])
    }

    fn version_info(strings: &[(&str, &str)]) -> Vec<u8> {
        let mut fixed = Vec::new();
        for n in [FIXED_FILE_INFO_SIGNATURE, 0x0001_0000, 0x0002_0001, 0, 0x0002_0001, 0x0003_0004] {
            fixed.extend_from_slice(&n.to_le_bytes());
        }
        fixed.resize(52, 0);
        let entries: Vec<Vec<u8>> = strings.iter().map(|(k, v)| string(k, v)).collect();
        let table = block("040904b0", &[], 0, true, &entries);
        let info = block("StringFileInfo", &[], 0, true, &[table]);
        block("VS_VERSION_INFO", &fixed, 52, false, &[info])
    }

    /// A minimal PE32 image with one `.rsrc` section holding `version`.
    fn build_pe(version: Option<&[u8]>) -> Vec<u8> {
        let mut data = vec![0u8; 0x200];
        data[..2].copy_from_slice(b"MZ");
        data[0x3C..0x40].copy_from_slice(&0x40u32.to_le_bytes());
        data[0x40..0x44].copy_from_slice(b"PE\0\0");
        let coff = 0x44;
        data[coff..coff + 2].copy_from_slice(&0x14Cu16.to_le_bytes());
        data[coff + 2..coff + 4].copy_from_slice(&1u16.to_le_bytes());
        data[coff + 16..coff + 18].copy_from_slice(&224u16.to_le_bytes());
        let opt = coff + 20;
        data[opt..opt + 2].copy_from_slice(&PE32_MAGIC.to_le_bytes());
        data[opt + 92..opt + 96].copy_from_slice(&16u32.to_le_bytes());

        let mut rsrc = Vec::new();
        if let Some(version) = version {
            let dir = |entry_id: u32, target: u32| {
                let mut d = vec![0u8; 12];
                d.extend_from_slice(&0u16.to_le_bytes());
                d.extend_from_slice(&1u16.to_le_bytes());
                d.extend_from_slice(&entry_id.to_le_bytes());
                d.extend_from_slice(&target.to_le_bytes());
                d
            };
            rsrc.extend(dir(RT_VERSION, SUBDIRECTORY_FLAG | 0x18));
            rsrc.extend(dir(1, SUBDIRECTORY_FLAG | 0x30));
            rsrc.extend(dir(0x409, 0x48));
            rsrc.extend_from_slice(&(0x1000u32 + 0x58).to_le_bytes());
            rsrc.extend_from_slice(&(version.len() as u32).to_le_bytes());
            rsrc.resize(0x58, 0);
            rsrc.extend_from_slice(version);
            let dirs = opt + 96;
            data[dirs + 16..dirs + 20].copy_from_slice(&0x1000u32.to_le_bytes());
            data[dirs + 20..dirs + 24].copy_from_slice(&(rsrc.len() as u32).to_le_bytes());
        }

        let section = opt + 224;
        data[section..section + 5].copy_from_slice(b".rsrc");
        data[section + 8..section + 12].copy_from_slice(&(rsrc.len() as u32).to_le_bytes());
        data[section + 12..section + 16].copy_from_slice(&0x1000u32.to_le_bytes());
        data[section + 16..section + 20].copy_from_slice(&(rsrc.len() as u32).to_le_bytes());
        data[section + 20..section + 24].copy_from_slice(&0x200u32.to_le_bytes());
        data.extend(rsrc);
        data
    }

    #[test]
    fn test_parse_version_resource() {
        let version = version_info(&[
            ("CompanyName", "Acme Corp"),
            ("FileDescription", "Acme Widget"),
            ("FileVersion", "2.1.3.4"),
            ("LegalCopyright", "Copyright (c) Acme"),
            ("ProductName", "Widget"),
            ("ProductVersion", "2.1"),
            ("License", "MIT"),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "widget.exe", build_pe(Some(&version)));
        assert!(WindowsExecutable::is_package_data_file(&path));

        let p = &WindowsExecutable::recognize(&path).unwrap()[0];
        assert_eq!(p.name.as_deref(), Some("Widget"));
        assert_eq!(p.version.as_deref(), Some("2.1"));
        assert_eq!(p.description.as_deref(), Some("Acme Widget"));
        assert_eq!(p.copyright.as_deref(), Some("Copyright (c) Acme"));
        assert_eq!(p.parties[0].name.as_deref(), Some("Acme Corp"));
        assert_eq!(p.compute_normalized_license().as_deref(), Some("MIT"));
        assert_eq!(p.purl().as_deref(), Some("pkg:winexe/Widget@2.1"));
    }

    #[test]
    fn test_fixed_version_fallback() {
        let version = version_info(&[("ProductName", "Widget")]);
        let (strings, fixed) = read_version_info(&version);
        assert_eq!(fixed.as_deref(), Some("2.1.3.4"));
        let p = package_from_strings(&strings, fixed);
        assert_eq!(p.version.as_deref(), Some("2.1.3.4"));
    }

    #[test]
    fn test_missing_version_resource_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "plain.dll", build_pe(None));
        assert!(WindowsExecutable::recognize(&path).unwrap().is_empty());
    }

    #[test]
    fn test_bad_pe_signature() {
        let mut data = build_pe(None);
        data[0x40] = b'X';
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "bad.exe", data);
        assert!(matches!(
            WindowsExecutable::recognize(&path),
            Err(RecognizeError::Parse { format: "pe", .. })
        ));
    }
}
