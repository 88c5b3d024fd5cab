pub mod enumerator;
pub mod privilege;
pub mod raw;
pub mod record;
pub mod render;
pub mod source;

pub use enumerator::{enumerate, enumerate_with, EnumerateError, FilterSet, Inventory, SkippedEntry};
pub use record::{InstalledPackageRecord, PackageVersion, Provenance, SignatureKind, SourceKind};
pub use source::{PackageScope, QueryOptions};
