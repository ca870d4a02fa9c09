use std::collections::HashMap;

use crate::license::expression::{self, LicenseExpr};
use crate::license::spdx::{alias, canonical_id, from_url, looks_like_url};
use crate::models::DeclaredLicense;

pub const DEFAULT_UNKNOWN_MARKER: &str = "unknown";

/// Turns raw license declarations into a single license expression.
///
/// Lookup order for a piece of license text:
/// 1. caller-provided aliases (exact text, case-insensitive)
/// 2. canonical SPDX identifiers
/// 3. built-in aliases for common non-SPDX names
/// 4. well-known license URLs
///
/// Anything left over becomes the unknown marker.
#[derive(Debug, Clone)]
pub struct LicenseNormalizer {
    aliases: HashMap<String, String>,
    unknown_marker: String,
}

impl Default for LicenseNormalizer {
    fn default() -> Self {
        Self {
            aliases: HashMap::new(),
            unknown_marker: DEFAULT_UNKNOWN_MARKER.to_string(),
        }
    }
}

impl LicenseNormalizer {
    pub fn new(aliases: &HashMap<String, String>, unknown_marker: &str) -> Self {
        let aliases = aliases
            .iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect();
        let unknown_marker = if unknown_marker.trim().is_empty() {
            DEFAULT_UNKNOWN_MARKER.to_string()
        } else {
            unknown_marker.trim().to_string()
        };
        Self {
            aliases,
            unknown_marker,
        }
    }

    pub fn unknown_marker(&self) -> &str {
        &self.unknown_marker
    }

    /// Normalize a declaration into a rendered expression; `None` when nothing was declared.
    pub fn normalize(&self, declared: &DeclaredLicense) -> Option<String> {
        self.normalize_declared(declared).map(|expr| expr.render())
    }

    fn normalize_declared(&self, declared: &DeclaredLicense) -> Option<LicenseExpr> {
        match declared {
            DeclaredLicense::Text(text) => self.normalize_text(text),
            DeclaredLicense::Object { kind, name, url } => {
                let known = [kind, name]
                    .into_iter()
                    .flatten()
                    .find_map(|t| self.lookup(t))
                    .or_else(|| url.as_deref().and_then(from_url).map(str::to_string));
                match known {
                    Some(id) => Some(LicenseExpr::License(id)),
                    None if kind.is_some() || name.is_some() || url.is_some() => {
                        Some(self.unknown())
                    }
                    None => None,
                }
            }
            DeclaredLicense::List(items) => LicenseExpr::and_all(
                items
                    .iter()
                    .filter_map(|item| self.normalize_declared(item))
                    .collect(),
            ),
        }
    }

    fn normalize_text(&self, text: &str) -> Option<LicenseExpr> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(id) = self.lookup(trimmed) {
            return Some(LicenseExpr::License(id));
        }
        if looks_like_url(trimmed) {
            return Some(
                from_url(trimmed)
                    .map(|id| LicenseExpr::License(id.to_string()))
                    .unwrap_or_else(|| self.unknown()),
            );
        }

        // Some ecosystems use "/" as an OR shorthand (e.g. "MIT/Apache-2.0")
        let spaced = trimmed.replace('/', " OR ");
        let resolve = |leaf: &str| {
            self.lookup(leaf)
                .unwrap_or_else(|| self.unknown_marker.clone())
        };
        Some(expression::parse(&spaced, &resolve).unwrap_or_else(|| self.unknown()))
    }

    fn lookup(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(id) = self.aliases.get(&text.to_lowercase()) {
            return Some(id.clone());
        }
        canonical_id(text).or_else(|| alias(text).map(str::to_string))
    }

    fn unknown(&self) -> LicenseExpr {
        LicenseExpr::License(self.unknown_marker.clone())
    }
}
