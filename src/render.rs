//! Console listing.

use std::io::{self, Write};

use crate::enumerator::SkippedEntry;
use crate::record::{InstalledPackageRecord, Provenance};

/// Writes the `Found <N> packages.` summary followed by one block per record.
pub fn write_listing(out: &mut impl Write, records: &[InstalledPackageRecord]) -> io::Result<()> {
    writeln!(out, "Found {} packages.", records.len())?;
    for record in records {
        write_record(out, record)?;
    }
    Ok(())
}

/// Reports entries left out of the listing. Writes nothing when none were.
pub fn write_skipped(out: &mut impl Write, skipped: &[SkippedEntry]) -> io::Result<()> {
    if skipped.is_empty() {
        return Ok(());
    }
    writeln!(out, "WARNING: skipped {} entries:", skipped.len())?;
    for entry in skipped {
        writeln!(out, "  {entry}")?;
    }
    Ok(())
}

pub fn write_record(out: &mut impl Write, r: &InstalledPackageRecord) -> io::Result<()> {
    let opt = |s: &Option<String>| s.clone().unwrap_or_default();
    match &r.provenance {
        Provenance::LegacyInstaller {
            raw_version,
            language,
            msi_package_code,
            msi_product_code,
        } => {
            writeln!(out, "Program: {}:", r.display_name)?;
            writeln!(out, "  Vendor: {}", opt(&r.vendor))?;
            writeln!(out, "  Version: {}", opt(raw_version))?;
            writeln!(out, "  Language: {}", opt(language))?;
            writeln!(out, "  ProgramId: {}", r.identifier)?;
            writeln!(out, "  MsiPackageCode: {}", opt(msi_package_code))?;
            writeln!(out, "  MsiProductCode: {}", opt(msi_product_code))?;
        }
        Provenance::ApplicationPackage { .. } => {
            let installed = r
                .installed_date
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default();
            writeln!(out, "Package info:")?;
            writeln!(out, "  DisplayName: {}", r.display_name)?;
            writeln!(out, "  Id: {}", r.identifier)?;
            writeln!(out, "  Version: {}", r.version)?;
            writeln!(out, "  InstalledDate: {installed}")?;
        }
        Provenance::MsiProduct {
            raw_version,
            local_package,
            upgrade_code,
        } => {
            let installed = r
                .installed_date
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            writeln!(out, "Product: {}:", r.display_name)?;
            writeln!(out, "  Publisher: {}", opt(&r.vendor))?;
            writeln!(out, "  Version: {}", opt(raw_version))?;
            writeln!(out, "  InstallDate: {installed}")?;
            writeln!(out, "  ProductCode: {}", r.identifier)?;
            writeln!(out, "  LocalPackage: {}", opt(local_package))?;
            if let Some(code) = upgrade_code {
                writeln!(out, "  UpgradeCode: {code}")?;
            }
        }
    }
    Ok(())
}
