//! Bounds-checked integer reads for the binary container formats.
//!
//! Every reader returns `None` when the slice is too short.

pub(crate) fn u8_at(data: &[u8], off: usize) -> Option<u8> {
    data.get(off).copied()
}

pub(crate) fn le_u16(data: &[u8], off: usize) -> Option<u16> {
    Some(u16::from_le_bytes(data.get(off..off + 2)?.try_into().ok()?))
}

pub(crate) fn le_u32(data: &[u8], off: usize) -> Option<u32> {
    Some(u32::from_le_bytes(data.get(off..off + 4)?.try_into().ok()?))
}

pub(crate) fn le_u64(data: &[u8], off: usize) -> Option<u64> {
    Some(u64::from_le_bytes(data.get(off..off + 8)?.try_into().ok()?))
}

pub(crate) fn be_u16(data: &[u8], off: usize) -> Option<u16> {
    Some(u16::from_be_bytes(data.get(off..off + 2)?.try_into().ok()?))
}

pub(crate) fn be_u32(data: &[u8], off: usize) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(off..off + 4)?.try_into().ok()?))
}

/// NUL-terminated string starting at `off`, decoded lossily; returns the text and the
/// raw length in bytes including the terminator.
pub(crate) fn c_string(data: &[u8], off: usize) -> Option<(String, usize)> {
    let rest = data.get(off..)?;
    let end = rest.iter().position(|&b| b == 0)?;
    Some((String::from_utf8_lossy(&rest[..end]).into_owned(), end + 1))
}

/// Fixed-width, space padded text field.
pub(crate) fn padded_str(data: &[u8], off: usize, len: usize) -> Option<String> {
    let raw = data.get(off..off + len)?;
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_matches(|c: char| c == ' ' || c == '\0');
    Some(text.to_string())
}

/// UTF-16LE string of `units` code units at `off`.
pub(crate) fn utf16le(data: &[u8], off: usize, units: usize) -> Option<String> {
    let raw = data.get(off..off + units * 2)?;
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    Some(String::from_utf16_lossy(&units))
}

/// NUL-terminated UTF-16LE string at `off`; returns the text and its length in bytes
/// including the terminator.
pub(crate) fn utf16le_cstr(data: &[u8], off: usize) -> Option<(String, usize)> {
    let mut units = Vec::new();
    let mut pos = off;
    loop {
        let unit = le_u16(data, pos)?;
        pos += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    Some((String::from_utf16_lossy(&units), pos - off))
}

/// Round `n` up to a multiple of `align`.
pub(crate) fn align_up(n: usize, align: usize) -> usize {
    n.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_bounds_checked() {
        let data = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(le_u16(&data, 0), Some(0x0201));
        assert_eq!(be_u32(&data, 0), Some(0x01020304));
        assert_eq!(le_u32(&data, 1), None);
        assert_eq!(le_u64(&data, 0), None);
        assert_eq!(u8_at(&data, 4), None);
    }

    #[test]
    fn test_strings() {
        assert_eq!(c_string(b"abc\0def", 0), Some(("abc".to_string(), 4)));
        assert_eq!(c_string(b"abc", 0), None);
        assert_eq!(padded_str(b"VOL  \0", 0, 6).as_deref(), Some("VOL"));
        let wide: Vec<u8> = "Hi\0".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(utf16le_cstr(&wide, 0), Some(("Hi".to_string(), 6)));
        assert_eq!(utf16le(&wide, 0, 2).as_deref(), Some("Hi"));
        assert_eq!(align_up(5, 4), 8);
        assert_eq!(align_up(8, 4), 8);
    }

    #[test]
    fn test_c_string_length_counts_raw_bytes() {
        let (text, len) = c_string(b"caf\xE9\0next\0", 0).unwrap();
        assert_eq!(text, "caf\u{FFFD}");
        assert_eq!(len, 5);
        assert_eq!(c_string(b"caf\xE9\0next\0", len).unwrap().0, "next");
    }
}
