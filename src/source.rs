pub mod appx;
pub mod msi;
pub mod wmi;

use thiserror::Error;

use crate::raw::RawEntry;
use crate::record::{InstalledPackageRecord, SourceKind};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The provider failed or could not be reached.
#[derive(Error, Debug)]
#[error("{context}")]
pub struct SourceError {
    context: String,
    #[source]
    cause: Option<BoxError>,
}

impl SourceError {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            cause: None,
        }
    }

    pub fn caused_by(context: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            context: context.into(),
            cause: Some(cause.into()),
        }
    }
}

/// Why a raw entry could not become a record.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum MappingError {
    #[error("entry has no {0:?} field")]
    MissingIdentifier(&'static str),
}

/// An OS inventory mechanism.
pub trait InventorySource {
    fn kind(&self) -> SourceKind;

    /// Whether the query needs an elevated process.
    fn requires_elevation(&self) -> bool;

    /// Runs the full query. Either every entry comes back or none do.
    fn query(&mut self) -> Result<Vec<RawEntry>, SourceError>;

    /// Maps one raw entry onto the common record shape.
    fn map(&self, raw: &RawEntry) -> Result<InstalledPackageRecord, MappingError>;

    /// Human-readable name of a raw entry, for reporting entries that fail
    /// to map.
    fn entry_name(&self, _raw: &RawEntry) -> Option<String> {
        None
    }
}

/// Whose application packages the package manager lists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PackageScope {
    #[default]
    CurrentUser,
    AllUsers,
}

/// Per-source query knobs. Each adapter reads only the fields that apply
/// to it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Package manager only.
    pub scope: PackageScope,
    /// Windows Installer only: list just the products related to this
    /// `{GUID}` upgrade code.
    pub upgrade_code: Option<String>,
}

/// Opens the OS-backed adapter for `kind`.
pub fn open(kind: SourceKind, options: &QueryOptions) -> Box<dyn InventorySource> {
    match kind {
        SourceKind::LegacyInstaller => Box::new(wmi::InstalledProgramSource),
        SourceKind::ApplicationPackage => Box::new(appx::PackageManagerSource::new(options.scope)),
        SourceKind::MsiProduct => Box::new(msi::InstallerProductSource::new(
            options.upgrade_code.clone(),
        )),
    }
}
