//! Dispatch a file to the first parser whose recognition predicate accepts it.
//!
//! The handler set is closed: [`Handler`] has one variant per parser, listed in
//! priority order. Exact file-name predicates come before extension predicates and
//! extension predicates that need magic bytes come before the catch-all archives.

use std::path::Path;

use crate::error::Result;
use crate::models::{Package, PackageType};
use crate::parser::archive::{CabArchive, IsoImage, JavaJar, PlainArchive};
use crate::parser::bower::BowerJson;
use crate::parser::cargo::{CargoLock, CargoToml};
use crate::parser::composer::{ComposerJson, ComposerLock};
use crate::parser::cpan::CpanManifest;
use crate::parser::debian::DebianDeb;
use crate::parser::freebsd::FreeBsdManifest;
use crate::parser::golang::{GoMod, GoSum};
use crate::parser::haxe::HaxelibJson;
use crate::parser::maven::MavenPom;
use crate::parser::npm::{NpmPackageJson, NpmPackageLock, YarnLock};
use crate::parser::nuget::{NugetNupkg, NugetNuspec, NugetPackagesConfig};
use crate::parser::opam::OpamFile;
use crate::parser::pypi::{
    PipRequirements, PipfileLock, PyprojectToml, PythonMetadata, PythonSetupPy, PythonWheel,
};
use crate::parser::rpm::RpmArchive;
use crate::parser::rubygems::RubyGem;
use crate::parser::win_pe::WindowsExecutable;
use crate::parser::win_reg::{WindowsRegistryExport, WindowsRegistryHive};
use crate::parser::PackageParser;

macro_rules! handlers {
    ($($variant:ident => $parser:ty),+ $(,)?) => {
        /// One variant per parser.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Handler {
            $($variant),+
        }

        impl Handler {
            /// Every handler, in dispatch priority order.
            pub const ALL: &'static [Handler] = &[$(Handler::$variant),+];

            pub fn name(&self) -> &'static str {
                match self {
                    $(Handler::$variant => stringify!($variant)),+
                }
            }

            pub fn package_type(&self) -> PackageType {
                match self {
                    $(Handler::$variant => <$parser as PackageParser>::PACKAGE_TYPE),+
                }
            }

            pub fn datasource_id(&self) -> &'static str {
                match self {
                    $(Handler::$variant => <$parser as PackageParser>::DATASOURCE_ID),+
                }
            }

            pub fn is_package_data_file(&self, path: &Path) -> bool {
                match self {
                    $(Handler::$variant => <$parser as PackageParser>::is_package_data_file(path)),+
                }
            }

            pub fn recognize(&self, path: &Path) -> Result<Vec<Package>> {
                match self {
                    $(Handler::$variant => <$parser as PackageParser>::recognize(path)),+
                }
            }
        }
    };
}

handlers! {
    NpmPackageJson => NpmPackageJson,
    NpmPackageLock => NpmPackageLock,
    YarnLock => YarnLock,
    BowerJson => BowerJson,
    ComposerJson => ComposerJson,
    ComposerLock => ComposerLock,
    HaxelibJson => HaxelibJson,
    MavenPom => MavenPom,
    CargoToml => CargoToml,
    CargoLock => CargoLock,
    PythonMetadata => PythonMetadata,
    PythonSetupPy => PythonSetupPy,
    PipfileLock => PipfileLock,
    PipRequirements => PipRequirements,
    PyprojectToml => PyprojectToml,
    PythonWheel => PythonWheel,
    NugetNuspec => NugetNuspec,
    NugetPackagesConfig => NugetPackagesConfig,
    NugetNupkg => NugetNupkg,
    OpamFile => OpamFile,
    FreeBsdManifest => FreeBsdManifest,
    GoMod => GoMod,
    GoSum => GoSum,
    RubyGem => RubyGem,
    DebianDeb => DebianDeb,
    RpmArchive => RpmArchive,
    JavaJar => JavaJar,
    CabArchive => CabArchive,
    IsoImage => IsoImage,
    WindowsExecutable => WindowsExecutable,
    WindowsRegistryHive => WindowsRegistryHive,
    WindowsRegistryExport => WindowsRegistryExport,
    CpanManifest => CpanManifest,
    PlainArchive => PlainArchive,
}

impl std::fmt::Display for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The handler that would parse `path`, if any.
pub fn find_handler(path: &Path) -> Option<Handler> {
    Handler::ALL
        .iter()
        .copied()
        .find(|h| h.is_package_data_file(path))
}

/// Every handler whose predicate accepts `path`. More than one entry means the
/// predicate set is ambiguous for that file.
pub fn matching_handlers(path: &Path) -> Vec<Handler> {
    Handler::ALL
        .iter()
        .copied()
        .filter(|h| h.is_package_data_file(path))
        .collect()
}

/// Recognize and parse the packages described by the file at `path`.
///
/// An unrecognized file yields an empty vector. Returned packages carry no
/// `license_expression`; callers attach one with
/// [`Package::compute_normalized_license`] or a configured normalizer.
pub fn recognize_packages(path: impl AsRef<Path>) -> Result<Vec<Package>> {
    let path = path.as_ref();
    let Some(handler) = find_handler(path) else {
        tracing::debug!(path = %path.display(), "no handler matched");
        return Ok(Vec::new());
    };
    tracing::debug!(path = %path.display(), handler = handler.name(), "handler selected");
    let packages = handler.recognize(path)?;
    tracing::debug!(
        path = %path.display(),
        handler = handler.name(),
        count = packages.len(),
        "recognized packages"
    );
    Ok(packages)
}
