/// Canonical SPDX identifiers recognized as-is (matched case-insensitively).
const KNOWN_IDS: &[&str] = &[
    // Permissive
    "MIT",
    "MIT-0",
    "Apache-1.1",
    "Apache-2.0",
    "BSD-2-Clause",
    "BSD-3-Clause",
    "BSD-4-Clause",
    "0BSD",
    "ISC",
    "Unlicense",
    "Zlib",
    "CC0-1.0",
    "CC-BY-3.0",
    "CC-BY-4.0",
    "CC-BY-SA-4.0",
    "WTFPL",
    "PSF-2.0",
    "Python-2.0",
    "BlueOak-1.0.0",
    "Artistic-1.0",
    "Artistic-1.0-Perl",
    "Artistic-2.0",
    "BSL-1.0",
    "PostgreSQL",
    "Ruby",
    "OpenSSL",
    "X11",
    "NCSA",
    "Unicode-DFS-2016",
    "MS-PL",
    // Weak copyleft
    "LGPL-2.0",
    "LGPL-2.0-only",
    "LGPL-2.0-or-later",
    "LGPL-2.1",
    "LGPL-2.1-only",
    "LGPL-2.1-or-later",
    "LGPL-3.0",
    "LGPL-3.0-only",
    "LGPL-3.0-or-later",
    "MPL-1.1",
    "MPL-2.0",
    "EUPL-1.1",
    "EUPL-1.2",
    "CDDL-1.0",
    "CDDL-1.1",
    "EPL-1.0",
    "EPL-2.0",
    "APSL-2.0",
    "OSL-3.0",
    "MS-RL",
    // Strong copyleft
    "GPL-1.0",
    "GPL-1.0-only",
    "GPL-1.0-or-later",
    "GPL-2.0",
    "GPL-2.0-only",
    "GPL-2.0-or-later",
    "GPL-3.0",
    "GPL-3.0-only",
    "GPL-3.0-or-later",
    "AGPL-3.0",
    "AGPL-3.0-only",
    "AGPL-3.0-or-later",
    // Exceptions (right-hand side of WITH)
    "Classpath-exception-2.0",
    "GCC-exception-3.1",
    "LLVM-exception",
    "OCaml-LGPL-linking-exception",
];

/// Return the canonical spelling of a known SPDX identifier.
///
/// `GPL-2.0+` style suffixes map to the `-or-later` identifier. `LicenseRef-*`
/// references are accepted verbatim.
pub fn canonical_id(id: &str) -> Option<String> {
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    if let Some(prefix) = id.get(..11) {
        if prefix.eq_ignore_ascii_case("LicenseRef-") && id.len() > 11 {
            return Some(format!("LicenseRef-{}", &id[11..]));
        }
    }
    if let Some(base) = id.strip_suffix('+') {
        let base = KNOWN_IDS.iter().find(|k| k.eq_ignore_ascii_case(base))?;
        let or_later = format!("{base}-or-later");
        return KNOWN_IDS
            .iter()
            .find(|k| k.eq_ignore_ascii_case(&or_later))
            .map(|k| k.to_string());
    }
    KNOWN_IDS
        .iter()
        .find(|k| k.eq_ignore_ascii_case(id))
        .map(|k| k.to_string())
}

/// Map common non-SPDX license names to their SPDX equivalent.
///
/// Matching ignores case and surrounding whitespace.
pub fn alias(raw: &str) -> Option<&'static str> {
    let lower = raw.trim().to_lowercase();
    let id = match lower.as_str() {
        "apache 2" | "apache 2.0" | "apache-2" | "apache v2" | "apache2" | "apache license 2.0"
        | "apache license, version 2.0" | "apache license version 2.0"
        | "the apache software license, version 2.0" | "apache software license"
        | "asl 2.0" => "Apache-2.0",
        "mit license" | "the mit license" | "expat" | "mit/x11" => "MIT",
        "bsd" | "bsd license" | "new bsd" | "new bsd license" | "modified bsd"
        | "bsd 3-clause" | "3-clause bsd" | "bsd-3" | "the bsd license" => "BSD-3-Clause",
        "bsd 2-clause" | "simplified bsd" | "freebsd" | "2-clause bsd" | "bsd-2" => {
            "BSD-2-Clause"
        }
        "gnu gpl v2" | "gnu general public license v2" | "gpl v2" | "gplv2" | "gpl2"
        | "gnu general public license, version 2" => "GPL-2.0",
        "gplv2+" | "gpl v2+" | "gpl-2+" | "gpl2+" => "GPL-2.0-or-later",
        "gnu gpl v3" | "gnu general public license v3" | "gpl v3" | "gplv3" | "gpl3"
        | "gnu general public license, version 3" => "GPL-3.0",
        "gplv3+" | "gpl v3+" | "gpl-3+" | "gpl3+" => "GPL-3.0-or-later",
        "gnu lgpl v2.1" | "lgpl v2.1" | "lgplv2.1" | "lgplv2" | "lgpl-2" => "LGPL-2.1",
        "lgplv2+" | "lgplv2.1+" | "lgpl-2+" => "LGPL-2.1-or-later",
        "gnu lgpl v3" | "lgpl v3" | "lgplv3" | "lgpl-3" => "LGPL-3.0",
        "lgplv3+" | "lgpl-3+" => "LGPL-3.0-or-later",
        "mozilla public license 2.0" | "mpl 2.0" | "mplv2" | "mpl2" => "MPL-2.0",
        "mpl 1.1" | "mplv1.1" => "MPL-1.1",
        "isc license" => "ISC",
        "cc0" | "public domain" | "public-domain" => "CC0-1.0",
        "agpl v3" | "agplv3" | "gnu agpl v3" => "AGPL-3.0",
        "zlib license" | "zlib/libpng" => "Zlib",
        "boost" | "boost software license" | "boost software license 1.0" => "BSL-1.0",
        "eclipse public license 1.0" | "eclipse public license - v 1.0" | "epl" => "EPL-1.0",
        "eclipse public license 2.0" | "eclipse public license - v 2.0" => "EPL-2.0",
        "artistic" | "perl" | "artistic license" => "Artistic-1.0-Perl",
        "artistic 2.0" | "artistic license 2.0" => "Artistic-2.0",
        "python software foundation license" | "psf" | "psfl" => "PSF-2.0",
        "the unlicense" | "unlicensed" => "Unlicense",
        "wtfpl license" | "do what the f*ck you want to public license" => "WTFPL",
        "ruby license" => "Ruby",
        "postgresql license" => "PostgreSQL",
        "cddl" | "cddl 1.0" => "CDDL-1.0",
        _ => return None,
    };
    Some(id)
}

/// Map well-known license URLs to SPDX identifiers.
pub fn from_url(url: &str) -> Option<&'static str> {
    let trimmed = url
        .trim()
        .trim_end_matches('/')
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.")
        .to_lowercase();
    let trimmed = trimmed
        .trim_end_matches(".txt")
        .trim_end_matches(".html")
        .trim_end_matches(".php");
    let id = match trimmed {
        "apache.org/licenses/license-2.0" | "opensource.org/licenses/apache-2.0" => "Apache-2.0",
        "opensource.org/licenses/mit" | "opensource.org/licenses/mit-license"
        | "mit-license.org" => "MIT",
        "opensource.org/licenses/bsd-license" | "opensource.org/licenses/bsd-3-clause" => {
            "BSD-3-Clause"
        }
        "opensource.org/licenses/bsd-2-clause" => "BSD-2-Clause",
        "gnu.org/licenses/gpl-2.0" | "gnu.org/licenses/old-licenses/gpl-2.0" => "GPL-2.0",
        "gnu.org/licenses/gpl-3.0" | "gnu.org/licenses/gpl" => "GPL-3.0",
        "gnu.org/licenses/lgpl-2.1" | "gnu.org/licenses/old-licenses/lgpl-2.1" => "LGPL-2.1",
        "gnu.org/licenses/lgpl-3.0" | "gnu.org/licenses/lgpl" => "LGPL-3.0",
        "gnu.org/licenses/agpl-3.0" => "AGPL-3.0",
        "mozilla.org/mpl/2.0" | "opensource.org/licenses/mpl-2.0" => "MPL-2.0",
        "eclipse.org/legal/epl-v10" | "eclipse.org/legal/epl-1.0" => "EPL-1.0",
        "eclipse.org/legal/epl-2.0" | "eclipse.org/legal/epl-v20" => "EPL-2.0",
        "opensource.org/licenses/isc" | "opensource.org/licenses/isc-license" => "ISC",
        "creativecommons.org/publicdomain/zero/1.0" => "CC0-1.0",
        "unlicense.org" => "Unlicense",
        "boost.org/license_1_0" => "BSL-1.0",
        _ => return None,
    };
    Some(id)
}

pub fn looks_like_url(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.")
}
