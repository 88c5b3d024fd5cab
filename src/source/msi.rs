//! Products registered with Windows Installer (`MsiEnumProducts`), or only
//! those sharing an upgrade code (`MsiEnumRelatedProducts`).

use chrono::{DateTime, NaiveDate, Utc};
use log::debug;

use crate::raw::RawEntry;
use crate::record::{InstalledPackageRecord, PackageVersion, Provenance, SourceKind};
use crate::source::{InventorySource, MappingError, SourceError};

pub struct InstallerProductSource {
    upgrade_code: Option<String>,
}

impl InstallerProductSource {
    pub fn new(upgrade_code: Option<String>) -> Self {
        Self { upgrade_code }
    }
}

impl InventorySource for InstallerProductSource {
    fn kind(&self) -> SourceKind {
        SourceKind::MsiProduct
    }

    fn requires_elevation(&self) -> bool {
        false
    }

    fn query(&mut self) -> Result<Vec<RawEntry>, SourceError> {
        match &self.upgrade_code {
            Some(code) => debug!("MSI: enumerating products related to {code}"),
            None => debug!("MSI: enumerating installed products"),
        }
        query_msi(self.upgrade_code.as_deref())
    }

    fn map(&self, raw: &RawEntry) -> Result<InstalledPackageRecord, MappingError> {
        map_entry(raw)
    }

    fn entry_name(&self, raw: &RawEntry) -> Option<String> {
        raw.text("InstalledProductName")
    }
}

pub fn map_entry(raw: &RawEntry) -> Result<InstalledPackageRecord, MappingError> {
    let identifier = raw
        .text("ProductCode")
        .ok_or(MappingError::MissingIdentifier("ProductCode"))?;
    let raw_version = raw.text("VersionString");
    let version = raw_version
        .as_deref()
        .map(PackageVersion::parse_lenient)
        .unwrap_or_default();
    Ok(InstalledPackageRecord {
        display_name: raw.text("InstalledProductName").unwrap_or_default(),
        vendor: raw.text("Publisher"),
        identifier,
        version,
        installed_date: raw.text("InstallDate").as_deref().and_then(parse_install_date),
        provenance: Provenance::MsiProduct {
            raw_version,
            local_package: raw.text("LocalPackage"),
            upgrade_code: raw.text("UpgradeCode"),
        },
    })
}

/// Checks for the registry form of a GUID, `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`.
pub fn is_guid(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 38
        && bytes[0] == b'{'
        && bytes[37] == b'}'
        && bytes[1..37].iter().enumerate().all(|(i, &b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

/// `InstallDate` is stored as `YYYYMMDD`.
fn parse_install_date(s: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y%m%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

#[cfg(windows)]
fn query_msi(upgrade_code: Option<&str>) -> Result<Vec<RawEntry>, SourceError> {
    use crate::raw::FieldValue;
    use windows::core::{HSTRING, PWSTR};
    use windows::Win32::Foundation::{ERROR_NO_MORE_ITEMS, ERROR_SUCCESS};
    use windows::Win32::System::ApplicationInstallationAndServicing::{
        MsiEnumProductsW, MsiEnumRelatedProductsW, MsiSetInternalUI, INSTALLPROPERTY_INSTALLDATE,
        INSTALLPROPERTY_INSTALLEDPRODUCTNAME, INSTALLPROPERTY_LOCALPACKAGE,
        INSTALLPROPERTY_PUBLISHER, INSTALLPROPERTY_VERSIONSTRING, INSTALLUILEVEL_NONE,
    };

    let properties = [
        ("InstalledProductName", INSTALLPROPERTY_INSTALLEDPRODUCTNAME),
        ("VersionString", INSTALLPROPERTY_VERSIONSTRING),
        ("Publisher", INSTALLPROPERTY_PUBLISHER),
        ("InstallDate", INSTALLPROPERTY_INSTALLDATE),
        ("LocalPackage", INSTALLPROPERTY_LOCALPACKAGE),
    ];

    // hide installer UI
    unsafe { MsiSetInternalUI(INSTALLUILEVEL_NONE, None) };

    let hupgrade = upgrade_code.map(HSTRING::from);
    let mut entries = Vec::new();
    for index in 0u32.. {
        // "{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}" + NUL
        let mut buf = [0u16; 39];
        let (call, ret) = match &hupgrade {
            Some(upgrade) => ("MsiEnumRelatedProducts", unsafe {
                MsiEnumRelatedProductsW(upgrade, 0, index, PWSTR(buf.as_mut_ptr()))
            }),
            None => ("MsiEnumProducts", unsafe {
                MsiEnumProductsW(index, PWSTR(buf.as_mut_ptr()))
            }),
        };
        if ret == ERROR_NO_MORE_ITEMS.0 {
            break;
        }
        if ret != ERROR_SUCCESS.0 {
            return Err(SourceError::caused_by(
                format!("{call} failed at index {index}"),
                win32_error(ret),
            ));
        }
        let code = String::from_utf16_lossy(&buf[..38]);
        let hcode = HSTRING::from(code.as_str());
        let mut entry = RawEntry::new().with("ProductCode", FieldValue::Text(code.clone()));
        if let Some(upgrade) = upgrade_code {
            entry.insert("UpgradeCode", FieldValue::Text(upgrade.to_string()));
        }
        for (name, attribute) in properties {
            let value = product_info(&hcode, attribute).map_err(|e| {
                SourceError::caused_by(format!("MsiGetProductInfo({code}, {name}) failed"), e)
            })?;
            entry.insert(name, FieldValue::Text(value));
        }
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(windows)]
fn product_info(
    product_code: &windows::core::HSTRING,
    attribute: windows::core::PCWSTR,
) -> windows::core::Result<String> {
    use windows::core::PWSTR;
    use windows::Win32::Foundation::{
        ERROR_MORE_DATA, ERROR_SUCCESS, ERROR_UNKNOWN_PRODUCT, ERROR_UNKNOWN_PROPERTY,
    };
    use windows::Win32::System::ApplicationInstallationAndServicing::MsiGetProductInfoW;

    // size query; the returned length excludes the terminating NUL
    let mut len = 0u32;
    let ret = unsafe {
        MsiGetProductInfoW(product_code, attribute, PWSTR::null(), Some(&mut len as *mut u32))
    };
    if ret == ERROR_UNKNOWN_PRODUCT.0 || ret == ERROR_UNKNOWN_PROPERTY.0 {
        return Ok(String::new());
    }
    if ret != ERROR_SUCCESS.0 && ret != ERROR_MORE_DATA.0 {
        return Err(win32_error(ret));
    }
    if len == 0 {
        return Ok(String::new());
    }

    len += 1;
    let mut buf = vec![0u16; len as usize];
    let ret = unsafe {
        MsiGetProductInfoW(
            product_code,
            attribute,
            PWSTR(buf.as_mut_ptr()),
            Some(&mut len as *mut u32),
        )
    };
    if ret != ERROR_SUCCESS.0 {
        return Err(win32_error(ret));
    }
    Ok(String::from_utf16_lossy(&buf[..len as usize]))
}

#[cfg(windows)]
fn win32_error(code: u32) -> windows::core::Error {
    windows::core::Error::from(windows::Win32::Foundation::WIN32_ERROR(code).to_hresult())
}

#[cfg(not(windows))]
fn query_msi(_upgrade_code: Option<&str>) -> Result<Vec<RawEntry>, SourceError> {
    Err(SourceError::new("Windows Installer is only available on Windows"))
}
