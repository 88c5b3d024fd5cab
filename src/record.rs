use chrono::{DateTime, Utc};
use itertools::Itertools;

use std::fmt;

/// Inventory mechanism a record was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// WMI `Win32_InstalledWin32Program`.
    LegacyInstaller,
    /// WinRT package manager (MSIX/UWP).
    ApplicationPackage,
    /// Windows Installer product registry.
    MsiProduct,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::LegacyInstaller => "Win32_InstalledWin32Program",
            SourceKind::ApplicationPackage => "PackageManager",
            SourceKind::MsiProduct => "Windows Installer",
        };
        f.write_str(s)
    }
}

/// Four-component version, `major.minor.build.revision`.
///
/// Components are wide signed integers: some providers report negative or
/// overflowed build numbers, and those are carried through as-is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageVersion {
    pub major: i64,
    pub minor: i64,
    pub build: i64,
    pub revision: i64,
}

impl PackageVersion {
    pub fn new(major: i64, minor: i64, build: i64, revision: i64) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parses a free-form provider version string.
    ///
    /// Exactly four dot-separated integers give those four components.
    /// Anything else falls back to `(major, 0, 0, 0)`, where `major` is the
    /// leading integer of the trimmed string, or 0 if it has none.
    pub fn parse_lenient(raw: &str) -> Self {
        let raw = raw.trim();
        let strict = raw
            .split('.')
            .map(|part| part.parse::<i64>().ok())
            .collect_tuple::<(_, _, _, _)>();
        if let Some((Some(major), Some(minor), Some(build), Some(revision))) = strict {
            return Self::new(major, minor, build, revision);
        }
        Self::new(leading_integer(raw), 0, 0, 0)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

fn leading_integer(s: &str) -> i64 {
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    // saturate rather than lose the component on absurdly long digit runs
    let magnitude = digits[..end].chars().fold(0i64, |acc, c| {
        acc.saturating_mul(10)
            .saturating_add(i64::from(c as u8 - b'0'))
    });
    sign * magnitude
}

/// Package signature classification, as reported by the package manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureKind {
    None,
    Developer,
    Enterprise,
    Store,
    System,
}

impl SignatureKind {
    /// Maps the numeric `PackageSignatureKind` value.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(SignatureKind::None),
            1 => Some(SignatureKind::Developer),
            2 => Some(SignatureKind::Enterprise),
            3 => Some(SignatureKind::Store),
            4 => Some(SignatureKind::System),
            _ => None,
        }
    }
}

/// Source-specific fields that only one inventory mechanism reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provenance {
    LegacyInstaller {
        raw_version: Option<String>,
        language: Option<String>,
        msi_package_code: Option<String>,
        msi_product_code: Option<String>,
    },
    ApplicationPackage {
        signature_kind: Option<SignatureKind>,
        is_framework: bool,
    },
    MsiProduct {
        raw_version: Option<String>,
        local_package: Option<String>,
        /// Set when the product was listed through its upgrade code.
        upgrade_code: Option<String>,
    },
}

/// One installed program or package, normalized across sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstalledPackageRecord {
    /// Empty when the provider did not populate it; means "unknown".
    pub display_name: String,
    pub vendor: Option<String>,
    pub identifier: String,
    pub version: PackageVersion,
    pub installed_date: Option<DateTime<Utc>>,
    pub provenance: Provenance,
}

impl InstalledPackageRecord {
    pub fn source_kind(&self) -> SourceKind {
        match self.provenance {
            Provenance::LegacyInstaller { .. } => SourceKind::LegacyInstaller,
            Provenance::ApplicationPackage { .. } => SourceKind::ApplicationPackage,
            Provenance::MsiProduct { .. } => SourceKind::MsiProduct,
        }
    }

    pub fn is_system_package(&self) -> bool {
        matches!(
            self.provenance,
            Provenance::ApplicationPackage {
                signature_kind: Some(SignatureKind::System),
                ..
            }
        )
    }

    pub fn is_framework_package(&self) -> bool {
        matches!(
            self.provenance,
            Provenance::ApplicationPackage {
                is_framework: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn four_part_version_parses_exactly() {
        assert_eq!(
            PackageVersion::parse_lenient("1.2.3.4"),
            PackageVersion::new(1, 2, 3, 4)
        );
        assert_eq!(
            PackageVersion::parse_lenient(" 10.0.19041.1 "),
            PackageVersion::new(10, 0, 19041, 1)
        );
    }

    #[test]
    fn other_shapes_fall_back_to_major_only() {
        assert_eq!(
            PackageVersion::parse_lenient("1.2.3"),
            PackageVersion::new(1, 0, 0, 0)
        );
        assert_eq!(
            PackageVersion::parse_lenient("1.2.3.4.5"),
            PackageVersion::new(1, 0, 0, 0)
        );
        assert_eq!(
            PackageVersion::parse_lenient("12abc"),
            PackageVersion::new(12, 0, 0, 0)
        );
        assert_eq!(
            PackageVersion::parse_lenient("7.x.1.0"),
            PackageVersion::new(7, 0, 0, 0)
        );
        assert_eq!(PackageVersion::parse_lenient(""), PackageVersion::default());
        assert_eq!(
            PackageVersion::parse_lenient("v2.0"),
            PackageVersion::default()
        );
    }

    #[test]
    fn out_of_range_components_pass_through() {
        assert_eq!(
            PackageVersion::parse_lenient("1.0.-1.4294967296"),
            PackageVersion::new(1, 0, -1, 4_294_967_296)
        );
        assert_eq!(
            PackageVersion::parse_lenient("-3 beta"),
            PackageVersion::new(-3, 0, 0, 0)
        );
    }

    #[test]
    fn version_displays_dotted() {
        assert_eq!(PackageVersion::new(1, 22, 333, 0).to_string(), "1.22.333.0");
    }

    #[test]
    fn versions_order_componentwise() {
        assert!(PackageVersion::new(1, 10, 0, 0) > PackageVersion::new(1, 9, 99, 99));
        assert!(PackageVersion::new(2, 0, 0, 0) > PackageVersion::new(1, 99, 0, 0));
    }

    #[test]
    fn signature_codes_map() {
        assert_eq!(SignatureKind::from_code(4), Some(SignatureKind::System));
        assert_eq!(SignatureKind::from_code(3), Some(SignatureKind::Store));
        assert_eq!(SignatureKind::from_code(9), None);
    }
}
