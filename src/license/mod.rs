//! License normalization into SPDX-style expressions.
//!
//! - [`spdx`]: canonical SPDX identifiers, common non-SPDX aliases and license URLs.
//! - [`expression`]: tokenizer, recursive descent parser and renderer for
//!   `AND` / `OR` / `WITH` expressions.
//! - [`normalize`]: [`LicenseNormalizer`](normalize::LicenseNormalizer), which combines
//!   raw declarations (strings, `{type, url}` objects, lists) into one expression.

pub mod expression;
pub mod normalize;
pub mod spdx;
