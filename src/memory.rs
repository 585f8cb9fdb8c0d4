//! Virtual-address resolution over a captured memory image.
//!
//! The dump parser collaborator hands us a read-only byte view of the
//! dump file plus an ordered table mapping 32-bit virtual-address ranges
//! to file offsets. Pointers inside dump structs are followed through
//! that table; anything that does not land inside a captured region is
//! rejected rather than guessed at.

use log::trace;

use crate::bytes::{self, Endian};
use crate::records::{FormId, form_ref};
use crate::schema::tags::FormType;

/// Read-only access to the mapped dump image.
///
/// Reads are synchronous and carry their own offsets, so a single view
/// can be shared by every struct reader without coordination.
pub trait DumpView {
    /// Total length of the underlying file in bytes.
    fn len(&self) -> u64;

    /// Fill `dst` from `offset`. Fails if the window extends past the
    /// end of the file.
    fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<(), bytes::Error>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DumpView for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<(), bytes::Error> {
        let start = usize::try_from(offset).map_err(|_| bytes::Error::OutOfBounds)?;
        let end = start.checked_add(dst.len()).ok_or(bytes::Error::OutOfBounds)?;
        let src = self.get(start..end).ok_or(bytes::Error::OutOfBounds)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl DumpView for Vec<u8> {
    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<(), bytes::Error> {
        self.as_slice().read_at(offset, dst)
    }
}

/// One captured memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub virtual_address: u32,
    pub size: u32,
    pub file_offset: u64,
}

/// Ordered table of captured regions.
///
/// The table is small (tens of entries for a console minidump), so
/// lookup is a linear scan; no caching is kept.
#[derive(Debug, Clone, Default)]
pub struct RegionMap {
    regions: Vec<Region>,
}

impl RegionMap {
    #[must_use]
    pub fn new(mut regions: Vec<Region>) -> Self {
        regions.sort_by_key(|r| r.virtual_address);
        Self { regions }
    }

    /// File offset for a virtual address, if it lies inside a captured
    /// region.
    #[must_use]
    pub fn va_to_file(&self, va: u32) -> Option<u64> {
        self.regions
            .iter()
            .find(|r| va >= r.virtual_address && (va - r.virtual_address) < r.size)
            .map(|r| r.file_offset + u64::from(va - r.virtual_address))
    }

    /// True iff `va` is nonzero and resolves to a captured region.
    ///
    /// Pointers are 32-bit on the console target regardless of the host.
    #[must_use]
    pub fn is_valid_pointer(&self, va: u32) -> bool {
        va != 0 && self.va_to_file(va).is_some()
    }

    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}

/// Offset of the 8-bit form-type code inside a `TESForm` header.
pub const TESFORM_TYPE_OFFSET: u64 = 4;
/// Offset of the big-endian form ID inside a `TESForm` header.
pub const TESFORM_ID_OFFSET: u64 = 12;
const TESFORM_HEADER_SIZE: usize = 16;

/// `TESForm` prefix common to every in-memory game object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormHeader {
    pub form_type: FormType,
    pub form_id: FormId,
}

/// Follow a virtual address to a `TESForm` header.
///
/// Returns `None` for null or unmapped pointers, for targets whose
/// form-type byte is not a known code, and for sentinel form IDs.
pub fn read_form_header<V: DumpView + ?Sized>(
    view: &V,
    map: &RegionMap,
    va: u32,
) -> Option<FormHeader> {
    let offset = if map.is_valid_pointer(va) {
        map.va_to_file(va)?
    } else {
        return None;
    };
    let mut header = [0u8; TESFORM_HEADER_SIZE];
    if view.read_at(offset, &mut header).is_err() {
        trace!("form header at va {va:#010x} extends past the dump");
        return None;
    }
    let code = header[TESFORM_TYPE_OFFSET as usize];
    let form_type = FormType::try_from(code).ok()?;
    let raw_id = bytes::read_u32(&header, TESFORM_ID_OFFSET as usize, Endian::Big).ok()?;
    let form_id = form_ref(raw_id)?;
    Some(FormHeader { form_type, form_id })
}

/// Follow a pointer and return only the referenced form ID.
///
/// Used for embedded cross-reference pointers; an invalid target yields
/// `None` so the caller stores an absent reference, never garbage.
pub fn deref_form_id<V: DumpView + ?Sized>(view: &V, map: &RegionMap, va: u32) -> Option<FormId> {
    read_form_header(view, map, va).map(|h| h.form_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> RegionMap {
        RegionMap::new(vec![
            Region { virtual_address: 0x8200_0000, size: 0x100, file_offset: 0x40 },
            Region { virtual_address: 0x8000_1000, size: 0x1000, file_offset: 0x200 },
        ])
    }

    #[test]
    fn resolves_inside_regions() {
        let m = map();
        assert_eq!(m.va_to_file(0x8000_1000), Some(0x200));
        assert_eq!(m.va_to_file(0x8000_1fff), Some(0x11ff));
        assert_eq!(m.va_to_file(0x8200_0010), Some(0x50));
        assert_eq!(m.va_to_file(0x8000_0fff), None);
        assert_eq!(m.va_to_file(0x8000_2000), None);
    }

    #[test]
    fn null_pointer_is_never_valid() {
        let m = RegionMap::new(vec![Region {
            virtual_address: 0,
            size: 0x100,
            file_offset: 0,
        }]);
        assert!(!m.is_valid_pointer(0));
        assert!(m.is_valid_pointer(0x10));
    }

    #[test]
    fn form_header_roundtrip() {
        // 0x200-byte file, region maps va 0x8000_0000 -> file 0x20.
        let mut file = vec![0u8; 0x200];
        let base = 0x20;
        file[base + TESFORM_TYPE_OFFSET as usize] = FormType::Weapon as u8;
        file[base + TESFORM_ID_OFFSET as usize..base + TESFORM_ID_OFFSET as usize + 4]
            .copy_from_slice(&0x0001_2345u32.to_be_bytes());
        let map = RegionMap::new(vec![Region {
            virtual_address: 0x8000_0000,
            size: 0x100,
            file_offset: base as u64,
        }]);

        let header = read_form_header(file.as_slice(), &map, 0x8000_0000).unwrap();
        assert_eq!(header.form_type, FormType::Weapon);
        assert_eq!(header.form_id, 0x0001_2345);

        assert!(read_form_header(file.as_slice(), &map, 0).is_none());
        assert!(read_form_header(file.as_slice(), &map, 0x9000_0000).is_none());
    }

    #[test]
    fn header_past_end_of_file_is_rejected() {
        let file = vec![0u8; 0x10];
        let map = RegionMap::new(vec![Region {
            virtual_address: 0x8000_0000,
            size: 0x100,
            file_offset: 0x8,
        }]);
        assert!(read_form_header(file.as_slice(), &map, 0x8000_0000).is_none());
    }
}
