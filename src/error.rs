//! Error taxonomy for package recognition.
//!
//! "Not recognized" is not an error: [`recognize_packages`](crate::recognize_packages)
//! returns an empty vector for it. Everything else surfaces as a [`RecognizeError`].

use std::fmt::Display;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while recognizing or parsing a single file.
#[derive(Debug, Error)]
pub enum RecognizeError {
    /// The file belongs to a known format that has no parser yet.
    #[error("{format} package data is recognized but not implemented: {}", path.display())]
    NotImplemented { format: &'static str, path: PathBuf },

    /// The file matched a parser but its content is structurally invalid.
    #[error("failed to parse {format} package data in {}: {message}", path.display())]
    Parse {
        format: &'static str,
        path: PathBuf,
        message: String,
    },

    /// The file could not be opened or read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RecognizeError {
    pub fn not_implemented(format: &'static str, path: &Path) -> Self {
        Self::NotImplemented {
            format,
            path: path.to_path_buf(),
        }
    }

    pub fn parse(format: &'static str, path: &Path, message: impl Display) -> Self {
        Self::Parse {
            format,
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True for the "format recognized, parser missing" tier.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }
}

pub type Result<T> = std::result::Result<T, RecognizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_path() {
        let err = RecognizeError::parse("npm", Path::new("/x/package.json"), "expected value");
        assert_eq!(
            err.to_string(),
            "failed to parse npm package data in /x/package.json: expected value"
        );
        assert!(!err.is_not_implemented());

        let err = RecognizeError::not_implemented("cpan", Path::new("MANIFEST"));
        assert!(err.is_not_implemented());
        assert!(err.to_string().contains("not implemented"));
    }
}
