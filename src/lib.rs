//! `pkgrecon` recognizes software package manifests and archives and turns them into
//! one normalized [`Package`] record shape.
//!
//! # Flow
//! 1. [`recognize_packages`] checks each [`Handler`] predicate in priority order.
//! 2. The first match parses the file ([`parser`]) into zero or more packages.
//! 3. Callers derive `license_expression` with [`Package::compute_normalized_license`]
//!    or a [`LicenseNormalizer`] built from [`config`].
//! 4. [`Package::to_dict`] serializes a record for comparison or storage.

pub mod config;
pub mod error;
pub mod license;
pub mod models;
pub mod parser;
pub mod recognize;

pub use error::{RecognizeError, Result};
pub use license::normalize::LicenseNormalizer;
pub use models::{
    build_purl, DeclaredLicense, Dependency, FileReference, Package, PackageType, Party,
    PartyType,
};
pub use parser::win_reg::{
    create_absolute_installed_file_path, get_installed_packages, remove_drive_letter,
};
pub use parser::PackageParser;
pub use recognize::{find_handler, matching_handlers, recognize_packages, Handler};
