//! Source selection, privilege gating, normalization and filtering.

use log::debug;
use thiserror::Error;
use unicase::UniCase;

use std::collections::HashSet;
use std::fmt;

use crate::privilege::{PrivilegeCheck, ProcessToken};
use crate::record::{InstalledPackageRecord, SourceKind};
use crate::source::{self, InventorySource, MappingError, QueryOptions, SourceError};

/// Which entries to drop. Both options only affect application packages;
/// other sources have no such classification and ignore them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterSet {
    pub exclude_system_packages: bool,
    pub exclude_framework_packages: bool,
}

impl FilterSet {
    pub fn admits(&self, record: &InstalledPackageRecord) -> bool {
        let system = self.exclude_system_packages && record.is_system_package();
        let framework = self.exclude_framework_packages && record.is_framework_package();
        !(system || framework)
    }
}

#[derive(Error, Debug)]
pub enum EnumerateError {
    #[error("{source_kind} requires admin privileges")]
    AccessDenied { source_kind: SourceKind },
    #[error("{source_kind} inventory is unavailable")]
    SourceUnavailable {
        source_kind: SourceKind,
        #[source]
        cause: SourceError,
    },
}

/// An entry the source returned that did not make it into the listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkippedEntry {
    Unmapped {
        name: Option<String>,
        reason: MappingError,
    },
    Duplicate {
        name: String,
        identifier: String,
    },
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkippedEntry::Unmapped {
                name: Some(name),
                reason,
            } => write!(f, "{name:?}: {reason}"),
            SkippedEntry::Unmapped { name: None, reason } => write!(f, "unnamed entry: {reason}"),
            SkippedEntry::Duplicate { name, identifier } => {
                write!(f, "{name:?}: duplicate identifier {identifier}")
            }
        }
    }
}

/// Result of one enumeration.
#[derive(Clone, Debug, Default)]
pub struct Inventory {
    /// Admitted records, in source order.
    pub records: Vec<InstalledPackageRecord>,
    /// Entries dropped because they could not be mapped or repeated an
    /// identifier. Entries removed by a [`FilterSet`] are not listed.
    pub skipped: Vec<SkippedEntry>,
}

/// Enumerates `kind` through the OS-backed adapter.
pub fn enumerate(
    kind: SourceKind,
    options: &QueryOptions,
    filters: &FilterSet,
) -> Result<Inventory, EnumerateError> {
    let mut source = source::open(kind, options);
    enumerate_with(source.as_mut(), filters, &ProcessToken)
}

/// Enumerates `source`, checking privileges before anything is queried.
///
/// Records keep the order the source returned them in. Entries without an
/// identifier, and repeats of an identifier already seen, end up in
/// [`Inventory::skipped`].
pub fn enumerate_with(
    source: &mut dyn InventorySource,
    filters: &FilterSet,
    privileges: &dyn PrivilegeCheck,
) -> Result<Inventory, EnumerateError> {
    let source_kind = source.kind();
    if source.requires_elevation() {
        let elevated = privileges
            .is_elevated()
            .map_err(|cause| EnumerateError::SourceUnavailable { source_kind, cause })?;
        if !elevated {
            return Err(EnumerateError::AccessDenied { source_kind });
        }
    }

    let entries = source
        .query()
        .map_err(|cause| EnumerateError::SourceUnavailable { source_kind, cause })?;
    debug!("{source_kind}: {} raw entries", entries.len());

    let mut seen = HashSet::new();
    let mut inventory = Inventory {
        records: Vec::with_capacity(entries.len()),
        skipped: Vec::new(),
    };
    for raw in &entries {
        let record = match source.map(raw) {
            Ok(r) => r,
            Err(reason) => {
                let name = source.entry_name(raw);
                debug!("{source_kind}: cannot map {name:?}: {reason}");
                inventory.skipped.push(SkippedEntry::Unmapped { name, reason });
                continue;
            }
        };
        if !seen.insert(UniCase::new(record.identifier.clone())) {
            debug!("{source_kind}: repeated identifier {:?}", record.identifier);
            inventory.skipped.push(SkippedEntry::Duplicate {
                name: record.display_name,
                identifier: record.identifier,
            });
            continue;
        }
        if !filters.admits(&record) {
            debug!("{source_kind}: filtered out {:?}", record.identifier);
            continue;
        }
        inventory.records.push(record);
    }
    Ok(inventory)
}
