use std::collections::HashMap;

use formfuse::memory::Region;
use formfuse::records::{GameSettingValue, PLAYER_FORM_ID, PLAYER_REF_FORM_ID};
use formfuse::scan::{
    DisplayNameAnchor, EditorIdAnchor, PlacedRefAnchor, RecordHeaderInfo, RuntimeEntry,
};
use formfuse::schema::tags::FormType;
use formfuse::structread::offsets;
use formfuse::{RegionMap, ReconstructOptions, ScanResult, Tag, reconstruct};

/// Builds a synthetic source image and the matching scan result, the
/// way the scanner collaborator would hand them over.
struct Image {
    bytes: Vec<u8>,
    scan: ScanResult,
}

impl Image {
    fn new() -> Self {
        Self { bytes: vec![0u8; 0x10], scan: ScanResult::default() }
    }

    fn sub(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(tag);
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn zsub(tag: &[u8; 4], text: &str) -> Vec<u8> {
        let mut payload = text.as_bytes().to_vec();
        payload.push(0);
        Self::sub(tag, &payload)
    }

    /// Append one record and index it in the scan result. Returns the
    /// record's file offset.
    fn record(&mut self, tag: [u8; 4], form_id: u32, subs: &[Vec<u8>]) -> u64 {
        let payload: Vec<u8> = subs.concat();
        let offset = self.bytes.len() as u64;
        self.bytes.extend_from_slice(&tag);
        self.bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(&0u32.to_le_bytes()); // flags
        self.bytes.extend_from_slice(&form_id.to_le_bytes());
        self.bytes.extend_from_slice(&0u32.to_le_bytes()); // version
        self.bytes.extend_from_slice(&0u32.to_le_bytes()); // internal
        self.bytes.extend_from_slice(&payload);
        self.scan.records.push(RecordHeaderInfo {
            tag: Tag(tag),
            form_id,
            offset,
            data_size: payload.len() as u32,
            big_endian: false,
            compressed: false,
        });
        offset
    }

    /// Pad the image up to `offset` so struct data can live there.
    fn pad_to(&mut self, offset: usize) {
        if self.bytes.len() < offset {
            self.bytes.resize(offset, 0);
        }
    }

    fn put_u32_be(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    fn put_u16_be(&mut self, offset: usize, value: u16) {
        self.bytes[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    fn put_form(&mut self, offset: usize, form_type: FormType, form_id: u32) {
        self.bytes[offset + 4] = form_type as u8;
        self.put_u32_be(offset + 12, form_id);
    }
}

fn run(image: &Image) -> formfuse::Catalog {
    let options = ReconstructOptions {
        view: image.bytes.as_slice(),
        scan: &image.scan,
        regions: None,
        correlations: &[],
    };
    reconstruct(&options, None)
}

#[test]
fn esm_only_reconstruction() {
    let mut image = Image::new();

    image.record(
        *b"GLOB",
        0x88,
        &[
            Image::zsub(b"EDID", "fTimeScale"),
            Image::sub(b"FNAM", b"f"),
            Image::sub(b"FLTV", &30.0f32.to_le_bytes()),
        ],
    );

    // Ammo carrying the projectile the weapon itself lacks.
    let mut dat2 = Vec::new();
    dat2.extend_from_slice(&1u32.to_le_bytes());
    dat2.extend_from_slice(&0x600u32.to_le_bytes());
    dat2.extend_from_slice(&0.1f32.to_le_bytes());
    image.record(
        *b"AMMO",
        0x50,
        &[Image::zsub(b"EDID", "Ammo10mm"), Image::sub(b"DAT2", &dat2)],
    );

    let mut weap_data = Vec::new();
    weap_data.extend_from_slice(&150i32.to_le_bytes());
    weap_data.extend_from_slice(&200i32.to_le_bytes());
    weap_data.extend_from_slice(&5.5f32.to_le_bytes());
    weap_data.extend_from_slice(&24i16.to_le_bytes());
    weap_data.push(12);
    image.record(
        *b"WEAP",
        0x51,
        &[
            Image::zsub(b"EDID", "Weap10mmPistol"),
            Image::zsub(b"FULL", "10mm Pistol"),
            Image::sub(b"DATA", &weap_data),
            Image::sub(b"NAM0", &0x50u32.to_le_bytes()),
        ],
    );

    image.record(
        *b"GMST",
        0x90,
        &[Image::zsub(b"EDID", "iMaxPlayerLevel"), Image::sub(b"DATA", &30i32.to_le_bytes())],
    );

    let catalog = run(&image);

    assert_eq!(catalog.globals.len(), 1);
    let global = &catalog.globals[0];
    assert_eq!(global.header.editor_id.as_deref(), Some("fTimeScale"));
    assert_eq!(global.value_type, 'f');
    assert_eq!(global.value, 30.0);

    let weapon = &catalog.weapons[0];
    assert_eq!(weapon.value, 150);
    assert_eq!(weapon.damage, 24);
    assert_eq!(weapon.ammo, Some(0x50));
    // Enrichment borrowed the projectile from the ammo record.
    assert_eq!(weapon.projectile, Some(0x600));

    assert_eq!(
        catalog.game_settings[0].value,
        GameSettingValue::Int(30)
    );

    // Identity invariants.
    assert_eq!(catalog.editor_ids.get(&PLAYER_FORM_ID).map(String::as_str), Some("Player"));
    assert_eq!(
        catalog.editor_ids.get(&PLAYER_REF_FORM_ID).map(String::as_str),
        Some("PlayerRef")
    );
    assert_eq!(catalog.editor_ids.get(&0x51).map(String::as_str), Some("Weap10mmPistol"));
    assert_eq!(catalog.display_names.get(&0x51).map(String::as_str), Some("10mm Pistol"));

    // Coverage counts.
    assert_eq!(catalog.recognized.get(&Tag(*b"WEAP")), Some(&1));
    assert_eq!(catalog.recognized.get(&Tag(*b"GLOB")), Some(&1));
    assert!(catalog.unrecognized.is_empty());
}

#[test]
fn progress_events_follow_phase_order() {
    let image = Image::new();
    let mut events: Vec<(u8, String)> = Vec::new();
    let mut sink = |percent: u8, phase: &str| events.push((percent, phase.to_string()));
    let options = ReconstructOptions {
        view: image.bytes.as_slice(),
        scan: &image.scan,
        regions: None,
        correlations: &[],
    };
    reconstruct(&options, Some(&mut sink));

    assert_eq!(events.first().map(|(_, n)| n.as_str()), Some("display-names"));
    assert_eq!(events.last().map(|(p, n)| (*p, n.as_str())), Some((100, "enrichment")));
    assert!(events.windows(2).all(|w| w[0].0 <= w[1].0), "{events:?}");
}

#[test]
fn dialogue_offset_linking_and_orphan_backfill() {
    let mut image = Image::new();

    // Topic first, its info right after, referencing a quest that has
    // no QUST record anywhere.
    image.record(
        *b"DIAL",
        0x30,
        &[Image::zsub(b"EDID", "GREETING"), Image::sub(b"TNAM", &0xAAu32.to_le_bytes())],
    );
    image.record(
        *b"INFO",
        0x100,
        &[
            Image::sub(b"QSTI", &0xB00u32.to_le_bytes()),
            Image::zsub(b"NAM1", "War never changes."),
        ],
    );
    image.scan.runtime_entries.push(RuntimeEntry {
        editor_id: "VMQ03".to_string(),
        form_id: 0xB00,
        form_type_code: FormType::Quest as u8,
        tes_form_offset: None,
    });

    let catalog = run(&image);

    let info = &catalog.dialog_infos[0];
    assert_eq!(info.topic, Some(0x30));
    assert_eq!(info.quest, Some(0xB00));
    // Topic speaker propagated onto the info.
    assert_eq!(info.speaker, Some(0xAA));
    assert_eq!(info.responses.len(), 1);
    assert_eq!(info.responses[0].text, "War never changes.");
    assert_eq!(info.responses[0].emotion_type, 0);

    // The referenced quest exists only as a synthesized stub.
    let stub = catalog.quest_by_id(0xB00).unwrap();
    assert!(stub.synthesized);
    assert_eq!(stub.header.editor_id.as_deref(), Some("VMQ03"));
}

#[test]
fn boundary_records_are_skipped_cleanly() {
    let mut image = Image::new();

    // Valid record first.
    image.record(*b"MISC", 0x10, &[Image::zsub(b"EDID", "CapBottle")]);
    // Declared size far past the end of the file.
    let truncated_offset = image.bytes.len() as u64;
    image.scan.records.push(RecordHeaderInfo {
        tag: Tag(*b"MISC"),
        form_id: 0x11,
        offset: truncated_offset,
        data_size: 0xFFFF,
        big_endian: false,
        compressed: false,
    });
    // Compressed record: decompression is a collaborator concern.
    image.record(*b"BOOK", 0x12, &[Image::zsub(b"EDID", "BookX")]);
    image.scan.records.last_mut().unwrap().compressed = true;
    // Unrecognized type still lands in the generic holder.
    image.record(*b"HAIR", 0x13, &[Image::zsub(b"EDID", "HairMessy")]);

    let catalog = run(&image);

    assert_eq!(catalog.misc_items.len(), 1);
    assert_eq!(catalog.books.len(), 0);
    assert_eq!(catalog.unrecognized.get(&Tag(*b"MISC")), Some(&1));
    assert_eq!(catalog.unrecognized.get(&Tag(*b"BOOK")), Some(&1));
    assert_eq!(catalog.unrecognized.get(&Tag(*b"HAIR")), Some(&1));
    assert_eq!(catalog.unknown.len(), 1);
    assert_eq!(catalog.unknown[0].header.editor_id.as_deref(), Some("HairMessy"));
}

#[test]
fn duplicate_form_ids_keep_first_record() {
    let mut image = Image::new();
    image.record(*b"MISC", 0x10, &[Image::zsub(b"EDID", "First")]);
    image.record(*b"MISC", 0x10, &[Image::zsub(b"EDID", "Second")]);

    let catalog = run(&image);
    assert_eq!(catalog.misc_items.len(), 1);
    assert_eq!(catalog.misc_items[0].header.editor_id.as_deref(), Some("First"));
}

#[test]
fn display_name_anchors_label_cross_references() {
    let mut image = Image::new();
    let offset = image.record(*b"HAIR", 0x42, &[]);
    image
        .scan
        .editor_ids
        .push(EditorIdAnchor { offset: offset + 24, value: "HairShaggy".to_string() });
    image
        .scan
        .display_names
        .push(DisplayNameAnchor { offset: offset + 24, value: "Shaggy Cut".to_string() });

    let catalog = run(&image);
    assert_eq!(catalog.editor_ids.get(&0x42).map(String::as_str), Some("HairShaggy"));
    assert_eq!(catalog.display_names.get(&0x42).map(String::as_str), Some("Shaggy Cut"));
}

#[test]
fn placed_refs_get_virtual_cell_and_enrichment() {
    let mut image = Image::new();
    let mut obnd = Vec::new();
    for v in [-2i16, -2, 0, 2, 2, 4] {
        obnd.extend_from_slice(&v.to_le_bytes());
    }
    image.record(
        *b"STAT",
        0x10,
        &[
            Image::zsub(b"EDID", "Crate01"),
            Image::sub(b"OBND", &obnd),
            Image::zsub(b"MODL", "clutter\\crate01.nif"),
        ],
    );
    image.scan.placed_refs.push(PlacedRefAnchor {
        offset: 0x500,
        form_id: 0x900,
        base_form_id: 0x10,
        position: [100.0, 200.0, 0.0],
        rotation: [0.0; 3],
        scale: 1.0,
        owner: None,
        marker: None,
    });

    let catalog = run(&image);

    let placed = &catalog.placed_refs[0];
    assert_eq!(placed.base, 0x10);
    assert_eq!(placed.base_tag, Some(Tag(*b"STAT")));
    assert_eq!(placed.model.as_deref(), Some("clutter\\crate01.nif"));
    assert!(placed.bounds.is_some());
    // No cell grouping in the scan, so a virtual cell holds the orphan.
    let cell = placed.cell.expect("orphan ref should be re-homed");
    let virtual_cell = catalog.cells.iter().find(|c| c.header.form_id == cell).unwrap();
    assert!(virtual_cell.synthesized);
    assert_eq!(virtual_cell.references, vec![0x900]);
}

const DUMP_VA: u32 = 0x8200_0000;

/// ESM record plus a runtime struct for the same weapon: the dump
/// fills the fields the scan could not provide.
#[test]
fn dump_merge_fills_gaps() {
    let mut image = Image::new();

    // ESM weapon with stats but no display name and no projectile.
    let mut weap_data = Vec::new();
    weap_data.extend_from_slice(&150i32.to_le_bytes());
    weap_data.extend_from_slice(&200i32.to_le_bytes());
    weap_data.extend_from_slice(&5.5f32.to_le_bytes());
    weap_data.extend_from_slice(&24i16.to_le_bytes());
    weap_data.push(12);
    image.record(
        *b"WEAP",
        0xA11,
        &[Image::zsub(b"EDID", "WeapVarmintRifle"), Image::sub(b"DATA", &weap_data)],
    );

    // Struct region at 0x2000.
    let base = 0x2000;
    image.pad_to(base + 0x1000);
    image.put_form(base, FormType::Weapon, 0xA11);
    // Full name string at +0x400.
    image.put_u32_be(base + offsets::weapon::FULL_NAME, DUMP_VA + 0x400);
    image.put_u16_be(base + offsets::weapon::FULL_NAME + 4, 13);
    image.bytes[base + 0x400..base + 0x40D].copy_from_slice(b"Varmint Rifle");
    // Projectile pointer to a form struct at +0x500.
    image.put_form(base + 0x500, FormType::Projectile, 0x600);
    image.put_u32_be(base + offsets::weapon::PROJECTILE, DUMP_VA + 0x500);

    image.scan.runtime_entries.push(RuntimeEntry {
        editor_id: "WeapVarmintRifle".to_string(),
        form_id: 0xA11,
        form_type_code: FormType::Weapon as u8,
        tes_form_offset: Some(base as u64),
    });
    // A runtime-only ammo record.
    let ammo_base = 0x3800;
    image.pad_to(ammo_base + 0x1000);
    image.put_form(ammo_base, FormType::Ammo, 0x77);
    image.scan.runtime_entries.push(RuntimeEntry {
        editor_id: "Ammo556mm".to_string(),
        form_id: 0x77,
        form_type_code: FormType::Ammo as u8,
        tes_form_offset: Some(ammo_base as u64),
    });

    let regions = RegionMap::new(vec![Region {
        virtual_address: DUMP_VA,
        size: 0x3000,
        file_offset: base as u64,
    }]);
    let options = ReconstructOptions {
        view: image.bytes.as_slice(),
        scan: &image.scan,
        regions: Some(&regions),
        correlations: &[],
    };
    let catalog = reconstruct(&options, None);

    // One weapon: the ESM record, enriched from the dump.
    assert_eq!(catalog.weapons.len(), 1);
    let weapon = &catalog.weapons[0];
    assert_eq!(weapon.value, 150);
    assert_eq!(weapon.header.full_name.as_deref(), Some("Varmint Rifle"));
    assert_eq!(weapon.projectile, Some(0x600));
    assert_eq!(catalog.display_names.get(&0xA11).map(String::as_str), Some("Varmint Rifle"));

    // The runtime-only ammo was materialized.
    assert_eq!(catalog.ammo.len(), 1);
    assert_eq!(catalog.ammo[0].header.form_id, 0x77);
    assert_eq!(
        catalog.editor_ids.get(&0x77).map(String::as_str),
        Some("Ammo556mm")
    );
}

/// A runtime topic with a quest-info chain updates the info the ESM
/// already provided and materializes the one it did not.
#[test]
fn runtime_topic_merges_info_chain() {
    let mut image = Image::new();

    image.record(*b"DIAL", 0x30, &[Image::zsub(b"EDID", "VTopic")]);
    image.record(*b"INFO", 0x100, &[Image::zsub(b"NAM1", "Existing line")]);

    let base = 0x2000;
    image.pad_to(base + 0x2000);
    // Topic struct.
    image.put_form(base, FormType::DialogTopic, 0x30);
    // Quest form struct.
    image.put_form(base + 0x500, FormType::Quest, 0xA);
    // Group node {quest*, info_list*, next*}.
    let group = base + 0x640;
    image.put_u32_be(group, DUMP_VA + 0x500);
    image.put_u32_be(group + 4, DUMP_VA + 0x700);
    image.put_u32_be(group + 8, 0);
    // Info list nodes.
    image.put_u32_be(base + 0x700, DUMP_VA + 0x800);
    image.put_u32_be(base + 0x704, DUMP_VA + 0x740);
    image.put_u32_be(base + 0x740, DUMP_VA + 0x8C0);
    image.put_u32_be(base + 0x744, 0);
    // Info structs: 0x100 exists in the catalog, 0x101 does not.
    image.put_form(base + 0x800, FormType::DialogInfo, 0x100);
    image.put_form(base + 0x8C0, FormType::DialogInfo, 0x101);
    image.put_u32_be(group + 8, 0);
    image.put_u32_be(base + offsets::topic::QUEST_INFO_HEAD, DUMP_VA + 0x640);

    image.scan.runtime_entries.push(RuntimeEntry {
        editor_id: "VTopic".to_string(),
        form_id: 0x30,
        form_type_code: FormType::DialogTopic as u8,
        tes_form_offset: Some(base as u64),
    });

    let regions = RegionMap::new(vec![Region {
        virtual_address: DUMP_VA,
        size: 0x2000,
        file_offset: base as u64,
    }]);
    let options = ReconstructOptions {
        view: image.bytes.as_slice(),
        scan: &image.scan,
        regions: Some(&regions),
        correlations: &[],
    };
    let catalog = reconstruct(&options, None);

    assert_eq!(catalog.dialog_infos.len(), 2);
    let existing = catalog.dialog_infos.iter().find(|i| i.header.form_id == 0x100).unwrap();
    assert_eq!(existing.topic, Some(0x30));
    assert_eq!(existing.quest, Some(0xA));
    assert_eq!(existing.responses[0].text, "Existing line");
    let materialized = catalog.dialog_infos.iter().find(|i| i.header.form_id == 0x101).unwrap();
    assert_eq!(materialized.topic, Some(0x30));
    assert_eq!(materialized.quest, Some(0xA));

    let topic = catalog.topic_by_id(0x30).unwrap();
    assert_eq!(topic.infos, vec![0x100, 0x101]);
    assert_eq!(topic.quests, vec![0xA]);
    // The referenced quest was backfilled as a stub.
    assert!(catalog.quest_by_id(0xA).unwrap().synthesized);
}

#[test]
fn correlations_outrank_scanned_editor_ids() {
    let mut image = Image::new();
    image.record(*b"MISC", 0x10, &[Image::zsub(b"EDID", "ScannedName")]);

    let correlations = vec![(0x10u32, "CorrelatedName".to_string())];
    let options = ReconstructOptions {
        view: image.bytes.as_slice(),
        scan: &image.scan,
        regions: None,
        correlations: &correlations,
    };
    let catalog = reconstruct(&options, None);
    assert_eq!(
        catalog.editor_ids.get(&0x10).map(String::as_str),
        Some("CorrelatedName")
    );
}

#[test]
fn editor_id_reverse_round_trip() {
    let mut image = Image::new();
    image.record(*b"MISC", 0x10, &[Image::zsub(b"EDID", "CapBottle")]);
    image.record(*b"WEAP", 0x11, &[Image::zsub(b"EDID", "Weap9mm")]);

    let catalog = run(&image);
    let reverse: HashMap<&str, u32> = catalog
        .editor_ids
        .iter()
        .map(|(id, name)| (name.as_str(), *id))
        .collect();
    for (form_id, name) in &catalog.editor_ids {
        let back = reverse[name.as_str()];
        assert_eq!(catalog.editor_ids.get(&back).map(String::as_str), Some(name.as_str()));
        let _ = form_id;
    }
}
