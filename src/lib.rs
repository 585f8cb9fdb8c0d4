//! Semantic reconstruction of Bethesda game-data records from ESM
//! master files and Xbox 360 memory dumps.
//!
//! Given a pre-computed scan of the source file and, for dump captures,
//! a virtual-address region map, [`reconstruct::reconstruct`] walks
//! both encodings (tagged little-endian ESM subrecords and big-endian
//! class-layout structs) and fuses them into one [`records::Catalog`]
//! keyed by FormID, with cross-references resolved where the data
//! allows and elided where it does not.

/// Byte primitives and the endian-parameterized reader
pub mod bytes;
/// Identity index (FormID ↔ editor ID ↔ display name)
pub mod identity;
/// Cross-reference linker passes
pub mod link;
/// Virtual-address resolution over the dump image
pub mod memory;
/// Per-record-type ESM reconstructors
pub mod parse;
/// Typed records and the catalog aggregate
pub mod records;
/// Orchestrator
pub mod reconstruct;
/// Scan-result input types
pub mod scan;
/// Script variable collection and decompilation
pub mod script;
/// Dump struct readers
pub mod structread;
/// Subrecord iteration
pub mod subrecord;

/// Tag constants, form-type codes and shared field schemas
pub mod schema {
    /// Field layouts for packed `DATA`-style subrecords
    pub mod fields;
    /// Record/subrecord tags and the 8-bit form-type codes
    pub mod tags;
}

pub use self::memory::{DumpView, Region, RegionMap};
pub use self::records::{Catalog, FormId};
pub use self::reconstruct::{ReconstructOptions, reconstruct};
pub use self::scan::ScanResult;
pub use self::subrecord::{Subrecord, SubrecordIter, Tag};
