//! MSIX/UWP application packages from the WinRT package manager.

use chrono::{DateTime, Utc};
use log::debug;

use crate::raw::RawEntry;
use crate::record::{
    InstalledPackageRecord, PackageVersion, Provenance, SignatureKind, SourceKind,
};
use crate::source::{InventorySource, MappingError, PackageScope, SourceError};

pub struct PackageManagerSource {
    scope: PackageScope,
}

impl PackageManagerSource {
    pub fn new(scope: PackageScope) -> Self {
        Self { scope }
    }
}

impl InventorySource for PackageManagerSource {
    fn kind(&self) -> SourceKind {
        SourceKind::ApplicationPackage
    }

    fn requires_elevation(&self) -> bool {
        // only the current user's packages can be listed unelevated
        self.scope == PackageScope::AllUsers
    }

    fn query(&mut self) -> Result<Vec<RawEntry>, SourceError> {
        debug!("PackageManager: listing packages for {:?}", self.scope);
        query_packages(self.scope)
    }

    fn map(&self, raw: &RawEntry) -> Result<InstalledPackageRecord, MappingError> {
        map_entry(raw)
    }

    fn entry_name(&self, raw: &RawEntry) -> Option<String> {
        raw.text("DisplayName")
    }
}

pub fn map_entry(raw: &RawEntry) -> Result<InstalledPackageRecord, MappingError> {
    let identifier = raw
        .text("FullName")
        .ok_or(MappingError::MissingIdentifier("FullName"))?;
    let component = |name: &str| raw.int(name).unwrap_or(0);
    Ok(InstalledPackageRecord {
        display_name: raw.text("DisplayName").unwrap_or_default(),
        vendor: None,
        identifier,
        version: PackageVersion::new(
            component("Major"),
            component("Minor"),
            component("Build"),
            component("Revision"),
        ),
        installed_date: raw.timestamp("InstalledDate"),
        provenance: Provenance::ApplicationPackage {
            signature_kind: raw.int("SignatureKind").and_then(SignatureKind::from_code),
            is_framework: raw.flag("IsFramework").unwrap_or(false),
        },
    })
}

/// Converts a WinRT `DateTime` (100ns ticks since 1601-01-01 UTC).
pub fn ticks_to_utc(ticks: i64) -> Option<DateTime<Utc>> {
    const TICKS_PER_SEC: i64 = 10_000_000;
    const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;
    let since_unix = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = since_unix.div_euclid(TICKS_PER_SEC);
    let nanos = since_unix.rem_euclid(TICKS_PER_SEC) * 100;
    DateTime::from_timestamp(secs, nanos as u32)
}

#[cfg(windows)]
fn query_packages(scope: PackageScope) -> Result<Vec<RawEntry>, SourceError> {
    use windows::core::HSTRING;
    use windows::Management::Deployment::PackageManager;

    let mgr = PackageManager::new()
        .map_err(|e| SourceError::caused_by("activating PackageManager", e))?;
    let packages = match scope {
        // empty SID means the current user
        PackageScope::CurrentUser => mgr.FindPackagesByUserSecurityId(&HSTRING::new()),
        PackageScope::AllUsers => mgr.FindPackages(),
    }
    .map_err(|e| SourceError::caused_by("listing packages", e))?;

    packages
        .into_iter()
        .map(|pkg| {
            package_entry(&pkg)
                .map_err(|e| SourceError::caused_by("reading package properties", e))
        })
        .collect()
}

#[cfg(windows)]
fn package_entry(pkg: &windows::ApplicationModel::Package) -> windows::core::Result<RawEntry> {
    use crate::raw::FieldValue;

    let id = pkg.Id()?;
    let version = id.Version()?;
    // DisplayName fails for packages with unresolvable resources
    let display_name = match pkg.DisplayName() {
        Ok(s) => FieldValue::Text(s.to_string()),
        Err(_) => FieldValue::Null,
    };
    let installed = match pkg.InstalledDate().ok().and_then(|t| ticks_to_utc(t.UniversalTime)) {
        Some(t) => FieldValue::Timestamp(t),
        None => FieldValue::Null,
    };
    Ok(RawEntry::new()
        .with("DisplayName", display_name)
        .with("FullName", FieldValue::Text(id.FullName()?.to_string()))
        .with("Major", FieldValue::Int(version.Major.into()))
        .with("Minor", FieldValue::Int(version.Minor.into()))
        .with("Build", FieldValue::Int(version.Build.into()))
        .with("Revision", FieldValue::Int(version.Revision.into()))
        .with("InstalledDate", installed)
        .with("SignatureKind", FieldValue::Int(pkg.SignatureKind()?.0.into()))
        .with("IsFramework", FieldValue::Bool(pkg.IsFramework()?)))
}

#[cfg(not(windows))]
fn query_packages(_scope: PackageScope) -> Result<Vec<RawEntry>, SourceError> {
    Err(SourceError::new("the package manager is only available on Windows"))
}
