//! Programs registered with the `Win32_InstalledWin32Program` WMI class.
//! Querying the class needs an elevated process.

use log::debug;

use crate::raw::RawEntry;
use crate::record::{InstalledPackageRecord, PackageVersion, Provenance, SourceKind};
use crate::source::{InventorySource, MappingError, SourceError};

// Doc: https://learn.microsoft.com/en-us/windows/win32/wmisdk/win32-installedwin32program
const QUERY: &str = "SELECT * FROM Win32_InstalledWin32Program";

pub struct InstalledProgramSource;

impl InventorySource for InstalledProgramSource {
    fn kind(&self) -> SourceKind {
        SourceKind::LegacyInstaller
    }

    fn requires_elevation(&self) -> bool {
        true
    }

    fn query(&mut self) -> Result<Vec<RawEntry>, SourceError> {
        debug!("WMI: {QUERY}");
        query_wmi()
    }

    fn map(&self, raw: &RawEntry) -> Result<InstalledPackageRecord, MappingError> {
        map_entry(raw)
    }

    fn entry_name(&self, raw: &RawEntry) -> Option<String> {
        raw.text("Name")
    }
}

pub fn map_entry(raw: &RawEntry) -> Result<InstalledPackageRecord, MappingError> {
    let identifier = raw
        .text("ProgramId")
        .ok_or(MappingError::MissingIdentifier("ProgramId"))?;
    let raw_version = raw.text("Version");
    let version = raw_version
        .as_deref()
        .map(PackageVersion::parse_lenient)
        .unwrap_or_default();
    Ok(InstalledPackageRecord {
        display_name: raw.text("Name").unwrap_or_default(),
        vendor: raw.text("Vendor"),
        identifier,
        version,
        installed_date: None,
        provenance: Provenance::LegacyInstaller {
            raw_version,
            language: raw.text("Language"),
            msi_package_code: raw.text("MsiPackageCode"),
            msi_product_code: raw.text("MsiProductCode"),
        },
    })
}

#[cfg(windows)]
fn query_wmi() -> Result<Vec<RawEntry>, SourceError> {
    use ::wmi::{COMLibrary, Variant, WMIConnection};
    use std::collections::HashMap;

    let com = COMLibrary::new().map_err(|e| SourceError::caused_by("initializing COM", e))?;
    let conn = WMIConnection::new(com)
        .map_err(|e| SourceError::caused_by("connecting to WMI namespace ROOT\\CIMV2", e))?;
    let rows: Vec<HashMap<String, Variant>> = conn
        .raw_query(QUERY)
        .map_err(|e| SourceError::caused_by(format!("running WMI query {QUERY:?}"), e))?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_iter().map(|(k, v)| (k, field_value(v))).collect())
        .collect())
}

#[cfg(windows)]
fn field_value(v: ::wmi::Variant) -> crate::raw::FieldValue {
    use crate::raw::FieldValue;
    use ::wmi::Variant;

    match v {
        Variant::Empty | Variant::Null => FieldValue::Null,
        Variant::String(s) => FieldValue::Text(s),
        Variant::Bool(b) => FieldValue::Bool(b),
        Variant::I1(n) => FieldValue::Int(n.into()),
        Variant::I2(n) => FieldValue::Int(n.into()),
        Variant::I4(n) => FieldValue::Int(n.into()),
        Variant::I8(n) => FieldValue::Int(n),
        Variant::UI1(n) => FieldValue::Int(n.into()),
        Variant::UI2(n) => FieldValue::Int(n.into()),
        Variant::UI4(n) => FieldValue::Int(n.into()),
        Variant::UI8(n) => match i64::try_from(n) {
            Ok(n) => FieldValue::Int(n),
            Err(_) => FieldValue::Text(n.to_string()),
        },
        other => FieldValue::Text(format!("{other:?}")),
    }
}

#[cfg(not(windows))]
fn query_wmi() -> Result<Vec<RawEntry>, SourceError> {
    Err(SourceError::new("WMI is only available on Windows"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::raw::FieldValue;

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    #[test]
    fn maps_wmi_fields() {
        let raw = RawEntry::new()
            .with("Name", text("7-Zip 23.01 (x64 edition)"))
            .with("Vendor", text("Igor Pavlov"))
            .with("Version", text("23.01.00.0"))
            .with("Language", text("1033"))
            .with("ProgramId", text("0000f5e8-5d1c-4c4e-8a0f-6a3b1f3ad3ef"))
            .with("MsiPackageCode", text("{9B3F4A7E-0000-0000-0000-000000000000}"))
            .with("MsiProductCode", text("{23170F69-40C1-2702-2301-000001000000}"));
        let rec = map_entry(&raw).unwrap();
        assert_eq!(rec.display_name, "7-Zip 23.01 (x64 edition)");
        assert_eq!(rec.vendor.as_deref(), Some("Igor Pavlov"));
        assert_eq!(rec.identifier, "0000f5e8-5d1c-4c4e-8a0f-6a3b1f3ad3ef");
        assert_eq!(rec.version, PackageVersion::new(23, 1, 0, 0));
        assert_eq!(rec.installed_date, None);
        assert_eq!(rec.source_kind(), SourceKind::LegacyInstaller);
        let Provenance::LegacyInstaller {
            raw_version,
            language,
            msi_product_code,
            ..
        } = rec.provenance
        else {
            panic!("wrong provenance");
        };
        assert_eq!(raw_version.as_deref(), Some("23.01.00.0"));
        assert_eq!(language.as_deref(), Some("1033"));
        assert_eq!(
            msi_product_code.as_deref(),
            Some("{23170F69-40C1-2702-2301-000001000000}")
        );
    }

    #[test]
    fn free_form_version_keeps_raw_text() {
        let raw = RawEntry::new()
            .with("ProgramId", text("abc"))
            .with("Version", text("2024 R2"));
        let rec = map_entry(&raw).unwrap();
        assert_eq!(rec.version, PackageVersion::new(2024, 0, 0, 0));
        assert!(matches!(
            rec.provenance,
            Provenance::LegacyInstaller { raw_version: Some(ref v), .. } if v == "2024 R2"
        ));
    }

    #[test]
    fn missing_name_and_version_are_tolerated() {
        let raw = RawEntry::new()
            .with("ProgramId", text("abc"))
            .with("Name", FieldValue::Null);
        let rec = map_entry(&raw).unwrap();
        assert_eq!(rec.display_name, "");
        assert_eq!(rec.version, PackageVersion::default());
        assert_eq!(rec.vendor, None);
    }

    #[test]
    fn missing_program_id_is_rejected() {
        let raw = RawEntry::new()
            .with("Name", text("Orphan"))
            .with("ProgramId", text(""));
        assert_eq!(
            map_entry(&raw),
            Err(MappingError::MissingIdentifier("ProgramId"))
        );
    }
}
