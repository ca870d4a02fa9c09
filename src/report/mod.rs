//! Report renderers for recognition results.
//!
//! - [`terminal`]: colored summary box and per-file package tables; respects
//!   `--verbose` / `--quiet`.
//! - [`json`]: one JSON document with every file's packages or error.

use std::path::PathBuf;

use pkgrecon::{Package, RecognizeError};

pub mod json;
pub mod terminal;

/// What recognizing one input file produced.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<Vec<Package>, RecognizeError>,
}

impl FileOutcome {
    pub fn packages(&self) -> &[Package] {
        self.result.as_deref().unwrap_or(&[])
    }

    /// Parse and I/O failures; not-implemented formats only warn.
    pub fn is_failure(&self) -> bool {
        matches!(&self.result, Err(e) if !e.is_not_implemented())
    }
}

/// Counters shared by both renderers.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub files: usize,
    pub packages: usize,
    pub unrecognized: usize,
    pub not_implemented: usize,
    pub failed: usize,
}

impl Summary {
    pub fn from_outcomes(outcomes: &[FileOutcome]) -> Self {
        let mut summary = Summary {
            files: outcomes.len(),
            ..Summary::default()
        };
        for outcome in outcomes {
            match &outcome.result {
                Ok(packages) if packages.is_empty() => summary.unrecognized += 1,
                Ok(packages) => summary.packages += packages.len(),
                Err(e) if e.is_not_implemented() => summary.not_implemented += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }
}
