//! Read-only access to Windows registry hive files (`regf`).
//!
//! Only what the installed-program reports need: key lookup by path, subkey
//! enumeration across `lf`/`lh`/`li`/`ri` lists, and value decoding.

use serde_json::Value;

use crate::parser::bytes::{le_u16, le_u32, le_u64};

use super::RegistryValue;

pub(crate) const REGF_MAGIC: &[u8] = b"regf";

const BASE_BLOCK_LEN: usize = 0x1000;
const KEY_COMP_NAME: u16 = 0x0020;
const VALUE_COMP_NAME: u16 = 0x0001;
const DATA_INLINE: u32 = 0x8000_0000;
/// Bound on nested `ri` indirection.
const MAX_LIST_DEPTH: usize = 4;

const REG_SZ: u32 = 1;
const REG_EXPAND_SZ: u32 = 2;
const REG_BINARY: u32 = 3;
const REG_DWORD: u32 = 4;
const REG_DWORD_BIG_ENDIAN: u32 = 5;
const REG_MULTI_SZ: u32 = 7;
const REG_QWORD: u32 = 11;

/// A key node (`nk` record).
#[derive(Debug, Clone)]
pub struct Key {
    pub name: String,
    subkey_count: u32,
    subkey_list: u32,
    value_count: u32,
    value_list: u32,
}

/// A parsed hive held in memory.
#[derive(Debug)]
pub struct Hive {
    data: Vec<u8>,
    root: u32,
}

impl Hive {
    pub fn parse(data: Vec<u8>) -> Result<Self, String> {
        if data.get(..4) != Some(REGF_MAGIC) {
            return Err("missing regf signature".to_string());
        }
        let root = le_u32(&data, 0x24).ok_or("truncated base block")?;
        let hive = Hive { data, root };
        hive.key(root)
            .ok_or_else(|| format!("root cell at {root:#x} is not a key node"))?;
        Ok(hive)
    }

    pub fn root(&self) -> Option<Key> {
        self.key(self.root)
    }

    /// Cell payload at a hive-bins relative offset.
    fn cell(&self, offset: u32) -> Option<&[u8]> {
        let start = BASE_BLOCK_LEN.checked_add(offset as usize)?;
        let size = le_u32(&self.data, start)? as i32;
        let size = size.unsigned_abs() as usize;
        if size < 4 {
            return None;
        }
        self.data.get(start + 4..start + size)
    }

    fn key(&self, offset: u32) -> Option<Key> {
        let cell = self.cell(offset)?;
        if cell.get(..2) != Some(b"nk".as_slice()) {
            return None;
        }
        let flags = le_u16(cell, 2)?;
        let name_len = le_u16(cell, 72)? as usize;
        let raw = cell.get(76..76 + name_len)?;
        Some(Key {
            name: decode_name(raw, flags & KEY_COMP_NAME != 0),
            subkey_count: le_u32(cell, 20)?,
            subkey_list: le_u32(cell, 28)?,
            value_count: le_u32(cell, 36)?,
            value_list: le_u32(cell, 40)?,
        })
    }

    pub fn subkeys(&self, key: &Key) -> Vec<Key> {
        let mut offsets = Vec::new();
        if key.subkey_count > 0 {
            self.collect_list(key.subkey_list, 0, &mut offsets);
        }
        offsets.into_iter().filter_map(|o| self.key(o)).collect()
    }

    fn collect_list(&self, offset: u32, depth: usize, out: &mut Vec<u32>) {
        if depth > MAX_LIST_DEPTH {
            return;
        }
        let Some(cell) = self.cell(offset) else {
            return;
        };
        let count = le_u16(cell, 2).unwrap_or(0) as usize;
        match cell.get(..2) {
            Some(b"lf") | Some(b"lh") => {
                out.extend((0..count).filter_map(|i| le_u32(cell, 4 + i * 8)));
            }
            Some(b"li") => {
                out.extend((0..count).filter_map(|i| le_u32(cell, 4 + i * 4)));
            }
            Some(b"ri") => {
                for i in 0..count {
                    if let Some(list) = le_u32(cell, 4 + i * 4) {
                        self.collect_list(list, depth + 1, out);
                    }
                }
            }
            _ => {}
        }
    }

    /// Child key by name, compared case-insensitively.
    pub fn subkey(&self, key: &Key, name: &str) -> Option<Key> {
        self.subkeys(key)
            .into_iter()
            .find(|k| k.name.eq_ignore_ascii_case(name))
    }

    /// Key at a backslash separated path below the root.
    pub fn open(&self, path: &str) -> Option<Key> {
        path.split('\\')
            .filter(|s| !s.is_empty())
            .try_fold(self.root()?, |key, name| self.subkey(&key, name))
    }

    pub fn values(&self, key: &Key) -> Vec<RegistryValue> {
        if key.value_count == 0 {
            return Vec::new();
        }
        let Some(list) = self.cell(key.value_list) else {
            return Vec::new();
        };
        (0..key.value_count as usize)
            .filter_map(|i| le_u32(list, i * 4))
            .filter_map(|offset| self.value(offset))
            .collect()
    }

    fn value(&self, offset: u32) -> Option<RegistryValue> {
        let cell = self.cell(offset)?;
        if cell.get(..2) != Some(b"vk".as_slice()) {
            return None;
        }
        let name_len = le_u16(cell, 2)? as usize;
        let size = le_u32(cell, 4)?;
        let data_offset = le_u32(cell, 8)?;
        let kind = le_u32(cell, 12)?;
        let flags = le_u16(cell, 16)?;
        let name = if name_len == 0 {
            "(default)".to_string()
        } else {
            decode_name(cell.get(20..20 + name_len)?, flags & VALUE_COMP_NAME != 0)
        };

        let data: Vec<u8> = if size & DATA_INLINE != 0 {
            let len = ((size & !DATA_INLINE) as usize).min(4);
            data_offset.to_le_bytes()[..len].to_vec()
        } else {
            let cell = self.cell(data_offset)?;
            cell.get(..size as usize).unwrap_or(cell).to_vec()
        };
        Some(RegistryValue {
            name,
            value: decode_value(kind, &data),
        })
    }
}

fn decode_name(raw: &[u8], compressed: bool) -> String {
    if compressed {
        raw.iter().map(|&b| char::from(b)).collect()
    } else {
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    }
}

fn utf16_text(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn decode_value(kind: u32, data: &[u8]) -> Value {
    match kind {
        REG_SZ | REG_EXPAND_SZ => Value::String(utf16_text(data).trim_end_matches('\0').to_string()),
        REG_MULTI_SZ => Value::Array(
            utf16_text(data)
                .split('\0')
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
        REG_DWORD => le_u32(data, 0).map(Value::from).unwrap_or(Value::Null),
        REG_DWORD_BIG_ENDIAN => data
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .map(|b| Value::from(u32::from_be_bytes(b)))
            .unwrap_or(Value::Null),
        REG_QWORD => le_u64(data, 0).map(Value::from).unwrap_or(Value::Null),
        REG_BINARY => Value::String(data.iter().map(|b| format!("{b:02x}")).collect()),
        _ => Value::Null,
    }
}

/// In-memory hive writer for tests.
#[cfg(test)]
pub(crate) mod builder {
    use super::*;

    pub enum TestValue {
        Str(&'static str),
        Dword(u32),
    }

    pub struct TestKey {
        pub name: &'static str,
        pub values: Vec<(&'static str, TestValue)>,
        pub children: Vec<TestKey>,
    }

    impl TestKey {
        pub fn new(name: &'static str) -> Self {
            TestKey {
                name,
                values: Vec::new(),
                children: Vec::new(),
            }
        }

        pub fn value(mut self, name: &'static str, value: TestValue) -> Self {
            self.values.push((name, value));
            self
        }

        pub fn child(mut self, child: TestKey) -> Self {
            self.children.push(child);
            self
        }
    }

    struct Bins(Vec<u8>);

    impl Bins {
        fn alloc(&mut self, payload: &[u8]) -> u32 {
            let offset = self.0.len() as u32;
            let size = (payload.len() + 4).div_ceil(8) * 8;
            self.0.extend_from_slice(&(-(size as i32)).to_le_bytes());
            self.0.extend_from_slice(payload);
            self.0.resize(offset as usize + size, 0);
            offset
        }

        fn key(&mut self, key: &TestKey, is_root: bool) -> u32 {
            let children: Vec<u32> = key.children.iter().map(|c| self.key(c, false)).collect();
            let subkey_list = if children.is_empty() {
                u32::MAX
            } else {
                let mut lf = b"lf".to_vec();
                lf.extend_from_slice(&(children.len() as u16).to_le_bytes());
                for child in &children {
                    lf.extend_from_slice(&child.to_le_bytes());
                    lf.extend_from_slice(&[0; 4]);
                }
                self.alloc(&lf)
            };

            let mut value_offsets = Vec::new();
            for (name, value) in &key.values {
                let (size, data_offset, kind) = match value {
                    TestValue::Dword(n) => (DATA_INLINE | 4, *n, REG_DWORD),
                    TestValue::Str(s) => {
                        let data: Vec<u8> = s
                            .encode_utf16()
                            .chain([0])
                            .flat_map(u16::to_le_bytes)
                            .collect();
                        (data.len() as u32, self.alloc(&data), REG_SZ)
                    }
                };
                let mut vk = b"vk".to_vec();
                vk.extend_from_slice(&(name.len() as u16).to_le_bytes());
                vk.extend_from_slice(&size.to_le_bytes());
                vk.extend_from_slice(&data_offset.to_le_bytes());
                vk.extend_from_slice(&kind.to_le_bytes());
                vk.extend_from_slice(&VALUE_COMP_NAME.to_le_bytes());
                vk.extend_from_slice(&[0; 2]);
                vk.extend_from_slice(name.as_bytes());
                value_offsets.push(self.alloc(&vk));
            }
            let value_list = if value_offsets.is_empty() {
                u32::MAX
            } else {
                let list: Vec<u8> = value_offsets.iter().flat_map(|o| o.to_le_bytes()).collect();
                self.alloc(&list)
            };

            let mut nk = vec![0u8; 76];
            nk[..2].copy_from_slice(b"nk");
            let flags = KEY_COMP_NAME | if is_root { 0x0C } else { 0 };
            nk[2..4].copy_from_slice(&flags.to_le_bytes());
            nk[20..24].copy_from_slice(&(children.len() as u32).to_le_bytes());
            nk[28..32].copy_from_slice(&subkey_list.to_le_bytes());
            nk[36..40].copy_from_slice(&(key.values.len() as u32).to_le_bytes());
            nk[40..44].copy_from_slice(&value_list.to_le_bytes());
            nk[72..74].copy_from_slice(&(key.name.len() as u16).to_le_bytes());
            nk.extend_from_slice(key.name.as_bytes());
            self.alloc(&nk)
        }
    }

    /// Serialize `root` into a complete hive file.
    pub fn build_hive(root: &TestKey) -> Vec<u8> {
        let mut bins = Bins(vec![0u8; 32]);
        let root_offset = bins.key(root, true);
        let total = bins.0.len().div_ceil(BASE_BLOCK_LEN) * BASE_BLOCK_LEN;
        bins.0.resize(total, 0);
        bins.0[..4].copy_from_slice(b"hbin");
        bins.0[8..12].copy_from_slice(&(total as u32).to_le_bytes());

        let mut out = vec![0u8; BASE_BLOCK_LEN];
        out[..4].copy_from_slice(REGF_MAGIC);
        out[0x24..0x28].copy_from_slice(&root_offset.to_le_bytes());
        out[0x28..0x2C].copy_from_slice(&(total as u32).to_le_bytes());
        out.extend(bins.0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::builder::{build_hive, TestKey, TestValue};
    use super::*;

    fn sample() -> Hive {
        let root = TestKey::new("ROOT").child(
            TestKey::new("Microsoft").child(
                TestKey::new("Windows")
                    .value("Build", TestValue::Dword(19041))
                    .value("Owner", TestValue::Str("Acme")),
            ),
        );
        Hive::parse(build_hive(&root)).unwrap()
    }

    #[test]
    fn test_open_and_read_values() {
        let hive = sample();
        let key = hive.open("\\microsoft\\WINDOWS").unwrap();
        assert_eq!(key.name, "Windows");
        let values = hive.values(&key);
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].name, "Build");
        assert_eq!(values[0].value, Value::from(19041u32));
        assert_eq!(values[1].value, Value::String("Acme".to_string()));
    }

    #[test]
    fn test_missing_path() {
        let hive = sample();
        assert!(hive.open("Microsoft\\Nope").is_none());
        assert_eq!(hive.subkeys(&hive.root().unwrap()).len(), 1);
    }

    #[test]
    fn test_rejects_non_hive() {
        assert!(Hive::parse(b"not a hive".to_vec()).is_err());
        let mut data = vec![0u8; BASE_BLOCK_LEN + 64];
        data[..4].copy_from_slice(REGF_MAGIC);
        assert!(Hive::parse(data).is_err());
    }

    #[test]
    fn test_decode_value_kinds() {
        let multi: Vec<u8> = "a\0b\0\0".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(
            decode_value(REG_MULTI_SZ, &multi),
            serde_json::json!(["a", "b"])
        );
        assert_eq!(decode_value(REG_QWORD, &7u64.to_le_bytes()), Value::from(7u64));
        assert_eq!(decode_value(REG_BINARY, &[0xde, 0xad]), Value::from("dead"));
    }
}
