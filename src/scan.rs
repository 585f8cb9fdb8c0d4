//! Input types produced by the byte-level ESM scanner collaborator.
//!
//! The scanner walks the raw file once and leaves behind a flat index:
//! record headers, string anchors, placed-reference anchors, and (for
//! runtime dumps) entries recovered from the editor-ID hash table. The
//! reconstruction engine never re-scans; everything it touches starts
//! from one of these entries.

use std::collections::HashMap;

use crate::bytes::Endian;
use crate::records::{FormId, MapMarkerInfo};
use crate::subrecord::Tag;

/// On-disk size of a main record header:
/// `{type:4, data_size:u32, flags:u32, form_id:u32, version:u32, internal:u32}`.
pub const RECORD_HEADER_SIZE: u64 = 24;

/// One main-record header found by the scanner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordHeaderInfo {
    pub tag: Tag,
    pub form_id: FormId,
    /// Byte offset of the record header in the source file.
    pub offset: u64,
    pub data_size: u32,
    pub big_endian: bool,
    pub compressed: bool,
}

impl RecordHeaderInfo {
    /// Offset of the first subrecord.
    #[inline]
    #[must_use]
    pub fn data_offset(&self) -> u64 {
        self.offset + RECORD_HEADER_SIZE
    }

    #[inline]
    #[must_use]
    pub fn endian(&self) -> Endian {
        Endian::from_big(self.big_endian)
    }
}

/// An `EDID` string found at a known file offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorIdAnchor {
    pub offset: u64,
    pub value: String,
}

/// A `FULL` display-name string found at a known file offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayNameAnchor {
    pub offset: u64,
    pub value: String,
}

/// A placed reference (`REFR`/`ACHR`/`ACRE`) with its placement data
/// already extracted by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedRefAnchor {
    pub offset: u64,
    pub form_id: FormId,
    pub base_form_id: FormId,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: f32,
    pub owner: Option<FormId>,
    pub marker: Option<MapMarkerInfo>,
}

/// An `XCLC` exterior-grid anchor near a cell header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGridAnchor {
    pub offset: u64,
    pub x: i32,
    pub y: i32,
}

/// A `LAND` heightmap record anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandAnchor {
    pub offset: u64,
    pub form_id: FormId,
}

/// An actor-base (`NPC_`/`CREA`) anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorBaseAnchor {
    pub offset: u64,
    pub form_id: FormId,
    pub tag: Tag,
}

/// One entry recovered from the runtime editor-ID hash table.
///
/// `tes_form_offset` is the file offset of the owning `TESForm` object
/// when the pointer chain could be followed at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEntry {
    pub editor_id: String,
    pub form_id: FormId,
    pub form_type_code: u8,
    pub tes_form_offset: Option<u64>,
}

/// A land object discovered in the dump rather than the ESM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeLandEntry {
    pub virtual_address: u32,
    pub form_id: Option<FormId>,
}

/// The complete flat index handed over by the scanner.
///
/// Iteration order of the vectors follows file order and is stable for
/// a given input; reconstruction relies on that for offset-proximity
/// matching.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub records: Vec<RecordHeaderInfo>,
    pub editor_ids: Vec<EditorIdAnchor>,
    pub display_names: Vec<DisplayNameAnchor>,
    pub placed_refs: Vec<PlacedRefAnchor>,
    pub cell_grids: Vec<CellGridAnchor>,
    pub lands: Vec<LandAnchor>,
    pub actor_bases: Vec<ActorBaseAnchor>,
    pub runtime_entries: Vec<RuntimeEntry>,
    pub runtime_lands: Vec<RuntimeLandEntry>,
    /// Cell → worldspace, when derivable from group structure.
    pub cell_worldspaces: HashMap<FormId, FormId>,
    /// Cell → contained placed references, when derivable from groups.
    pub cell_refs: HashMap<FormId, Vec<FormId>>,
}

impl ScanResult {
    /// Record headers of one type, in file order.
    pub fn records_of(&self, tag: Tag) -> impl Iterator<Item = &RecordHeaderInfo> {
        self.records.iter().filter(move |r| r.tag == tag)
    }

    /// The record header nearest at-or-before `offset`, if any.
    #[must_use]
    pub fn record_at_or_before(&self, offset: u64) -> Option<&RecordHeaderInfo> {
        self.records
            .iter()
            .filter(|r| r.offset <= offset)
            .max_by_key(|r| r.offset)
    }
}
