//! RFC 822 style `Key: value` paragraphs, shared by Python core metadata and
//! Debian control files.

/// Parsed header block. Keys keep their original order and may repeat.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
    /// Text after the first blank line (the long description in `METADATA`).
    pub body: Option<String>,
}

impl Headers {
    /// Parse the first paragraph of `text`. Continuation lines start with a space or
    /// tab; a continuation consisting of a single `.` stands for an empty line.
    pub fn parse(text: &str) -> Self {
        let mut headers = Headers::default();
        let mut lines = text.lines();

        for line in lines.by_ref() {
            if line.trim().is_empty() {
                if headers.fields.is_empty() {
                    continue;
                }
                break;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = headers.fields.last_mut() {
                    let cont = line.trim();
                    // PKG-INFO pads continuation lines with "       |"
                    let cont = cont.strip_prefix('|').map(str::trim_start).unwrap_or(cont);
                    value.push('\n');
                    if cont != "." {
                        value.push_str(cont);
                    }
                }
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                headers
                    .fields
                    .push((key.trim().to_string(), value.trim().to_string()));
            }
        }

        let body: String = lines.collect::<Vec<_>>().join("\n");
        let body = body.trim();
        if !body.is_empty() {
            headers.body = Some(body.to_string());
        }
        headers
    }

    /// First value of `key`, matched case-insensitively; blank and `UNKNOWN` read as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.trim())
            .find(|v| is_present(v))
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.trim())
            .filter(|v| is_present(v))
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Blank and `UNKNOWN` values read as absent.
fn is_present(value: &str) -> bool {
    !value.is_empty() && value != "UNKNOWN"
}
