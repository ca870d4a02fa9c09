use std::path::Path;

use crate::error::{RecognizeError, Result};
use crate::models::{Package, PackageType};

use super::{file_name_is, PackageParser};

/// Perl distribution metadata. Recognized so scans can report it, not parsed yet.
pub struct CpanManifest;

impl PackageParser for CpanManifest {
    const PACKAGE_TYPE: PackageType = PackageType::Cpan;
    const DATASOURCE_ID: &'static str = "cpan_manifest";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(
            path,
            &["MANIFEST", "META.yml", "META.json", "Makefile.PL", "dist.ini"],
        )
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        Err(RecognizeError::not_implemented("cpan", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_but_not_implemented() {
        let path = Path::new("dist/META.yml");
        assert!(CpanManifest::is_package_data_file(path));
        assert!(!CpanManifest::is_package_data_file(Path::new("META.yaml")));
        let err = CpanManifest::recognize(path).unwrap_err();
        assert!(err.is_not_implemented());
    }
}
