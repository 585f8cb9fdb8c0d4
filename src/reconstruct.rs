//! The reconstruction orchestrator.
//!
//! One call walks the scheduled phase sequence over the scan result,
//! consulting the subrecord parsers for ESM-sourced records and the
//! struct readers for dump-resident objects, then runs the late
//! cross-reference passes and assembles the catalog. Phases run
//! strictly in order on the caller's stack; downstream passes depend on
//! upstream output. No record-level failure aborts the run: a record
//! that cannot be read is skipped and counted, never fatal.

use log::debug;

use crate::identity::IdentityIndex;
use crate::link;
use crate::memory::{DumpView, RegionMap};
use crate::parse::{self, ParseContext};
use crate::records::*;
use crate::scan::{RecordHeaderInfo, ScanResult};
use crate::schema::tags::{self, FormType};
use crate::script;
use crate::structread::StructReader;
use crate::subrecord::Tag;

/// Everything a reconstruction run needs. The view is the scanned file
/// itself (ESM or dump); `regions` is present only for dump captures
/// and enables the struct readers.
pub struct ReconstructOptions<'a, V: DumpView + ?Sized> {
    pub view: &'a V,
    pub scan: &'a ScanResult,
    pub regions: Option<&'a RegionMap>,
    /// Pre-built FormID → *editor ID* correlations. These must be
    /// editor IDs, not display names; mixing the two swaps fields in
    /// the output.
    pub correlations: &'a [(FormId, String)],
}

/// Synchronous progress sink: `(percent, phase name)`.
pub type ProgressSink<'a> = &'a mut dyn FnMut(u8, &str);

/// Run the full phase sequence and return the catalog.
///
/// The call never fails; coverage shortfalls surface through the
/// catalog's recognized/unrecognized counts.
pub fn reconstruct<V: DumpView + ?Sized>(
    options: &ReconstructOptions<'_, V>,
    mut progress: Option<ProgressSink<'_>>,
) -> Catalog {
    let mut engine = Reconstructor {
        view: options.view,
        scan: options.scan,
        regions: options.regions,
        identity: IdentityIndex::build(options.correlations, options.scan),
        catalog: Catalog::default(),
    };

    const PHASES: &[(&str, u8)] = &[
        ("display-names", 5),
        ("characters", 14),
        ("items", 26),
        ("dialogue", 38),
        ("tree", 46),
        ("scripts", 58),
        ("abilities", 66),
        ("world", 80),
        ("game-data", 88),
        ("generic", 94),
        ("enrichment", 100),
    ];

    for (name, percent) in PHASES {
        match *name {
            "display-names" => engine.phase_display_names(),
            "characters" => engine.phase_characters(),
            "items" => engine.phase_items(),
            "dialogue" => engine.phase_dialogue(),
            "tree" => engine.phase_tree(),
            "scripts" => engine.phase_scripts(),
            "abilities" => engine.phase_abilities(),
            "world" => engine.phase_world(),
            "game-data" => engine.phase_game_data(),
            "generic" => engine.phase_generic(),
            "enrichment" => engine.phase_enrichment(),
            _ => unreachable!(),
        }
        if let Some(sink) = progress.as_mut() {
            sink(*percent, name);
        }
    }

    engine.finish()
}

struct Reconstructor<'a, V: DumpView + ?Sized> {
    view: &'a V,
    scan: &'a ScanResult,
    regions: Option<&'a RegionMap>,
    identity: IdentityIndex,
    catalog: Catalog,
}

/// Read a record's payload into the phase's scratch buffer. Returns
/// `None` (after counting) for compressed records and records whose
/// declared size runs past the end of the file.
fn payload<'b, V: DumpView + ?Sized>(
    view: &V,
    info: &RecordHeaderInfo,
    scratch: &'b mut Vec<u8>,
) -> Option<&'b [u8]> {
    if info.compressed {
        return None;
    }
    let size = info.data_size as usize;
    if info.data_offset() + size as u64 > view.len() {
        return None;
    }
    scratch.resize(size, 0);
    view.read_at(info.data_offset(), &mut scratch[..size]).ok()?;
    Some(&scratch[..size])
}

impl<'a, V: DumpView + ?Sized> Reconstructor<'a, V> {
    fn reader(&self) -> Option<StructReader<'a, V>> {
        self.regions.map(|regions| StructReader::new(self.view, regions))
    }

    fn ctx(&mut self) -> ParseContext<'_> {
        ParseContext { identity: &mut self.identity }
    }

    fn note_recognized(&mut self, tag: Tag) {
        *self.catalog.recognized.entry(tag).or_insert(0) += 1;
    }

    fn note_unrecognized(&mut self, tag: Tag) {
        *self.catalog.unrecognized.entry(tag).or_insert(0) += 1;
    }

    /// Runtime index entries of one form type, cloned so readers can
    /// borrow the identity index freely.
    fn runtime_entries_of(&self, form_type: FormType) -> Vec<crate::scan::RuntimeEntry> {
        self.identity
            .runtime_entries()
            .iter()
            .filter(|e| e.form_type_code == form_type as u8)
            .cloned()
            .collect()
    }

    // ---- phases -------------------------------------------------------

    fn phase_display_names(&mut self) {
        let scan = self.scan;
        for anchor in &scan.display_names {
            if let Some(record) = scan.record_at_or_before(anchor.offset) {
                self.identity.set_display_name(record.form_id, &anchor.value);
            }
        }
        debug!("display-name capture: {} anchors", scan.display_names.len());
    }

    fn phase_characters(&mut self) {
        let scan = self.scan;
        let mut scratch = Vec::new();

        for (tag, kind) in [(tags::NPC_, ActorKind::Npc), (tags::CREA, ActorKind::Creature)] {
            for info in scan.records_of(tag) {
                let Some(data) = payload(self.view, info, &mut scratch) else {
                    self.note_unrecognized(tag);
                    continue;
                };
                let record = parse::parse_actor(info, data, &mut self.ctx(), kind);
                if self.catalog.push_actor(record) {
                    self.note_recognized(tag);
                }
            }
        }

        // Runtime actors fill what the scan did not carry.
        if let Some(reader) = self.reader() {
            for (form_type, kind) in
                [(FormType::Npc, ActorKind::Npc), (FormType::Creature, ActorKind::Creature)]
            {
                for entry in self.runtime_entries_of(form_type) {
                    let Some(record) = reader.read_actor(&entry, kind) else { continue };
                    if let Some(name) = record.header.full_name.as_deref() {
                        self.identity.set_display_name(record.header.form_id, name);
                    }
                    if !self.catalog.push_actor(record.clone()) {
                        if let Some(existing) = self
                            .catalog
                            .actors
                            .iter_mut()
                            .find(|a| a.header.form_id == record.header.form_id)
                        {
                            merge_actor(existing, record);
                        }
                    }
                }
            }
        }

        // Actor-base anchors cover actors whose record bodies were too
        // damaged to parse: a stub keeps the identity in the catalog.
        for anchor in &scan.actor_bases {
            let kind = if anchor.tag == tags::CREA {
                ActorKind::Creature
            } else {
                ActorKind::Npc
            };
            let mut header = RecordHeader::new(anchor.form_id, anchor.offset, false);
            header.editor_id = self.identity.editor_id(anchor.form_id).map(str::to_string);
            self.catalog.push_actor(ActorRecord {
                header,
                kind,
                bounds: None,
                model: None,
                flags: 0,
                fatigue: 0,
                barter_gold: 0,
                level: 0,
                calc_min: 0,
                calc_max: 0,
                speed_multiplier: 100,
                karma: 0.0,
                disposition_base: 0,
                template_flags: 0,
                race: None,
                class: None,
                script: None,
                template: None,
                voice: None,
                death_item: None,
                inventory: Vec::new(),
                factions: Vec::new(),
                packages: Vec::new(),
                spells: Vec::new(),
            });
        }

        for info in scan.records_of(tags::RACE) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::RACE);
                continue;
            };
            let record = parse::parse_race(info, data, &mut self.ctx());
            if self.catalog.push_race(record) {
                self.note_recognized(tags::RACE);
            }
        }
        for info in scan.records_of(tags::CLAS) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::CLAS);
                continue;
            };
            let record = parse::parse_class(info, data, &mut self.ctx());
            if self.catalog.push_class(record) {
                self.note_recognized(tags::CLAS);
            }
        }
        for info in scan.records_of(tags::FACT) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::FACT);
                continue;
            };
            let record = parse::parse_faction(info, data, &mut self.ctx());
            if self.catalog.push_faction(record) {
                self.note_recognized(tags::FACT);
            }
        }
        if let Some(reader) = self.reader() {
            for entry in self.runtime_entries_of(FormType::Faction) {
                if let Some(record) = reader.read_faction(&entry) {
                    self.catalog.push_faction(record);
                }
            }
        }
    }

    fn phase_items(&mut self) {
        let scan = self.scan;
        let mut scratch = Vec::new();

        for info in scan.records_of(tags::WEAP) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::WEAP);
                continue;
            };
            let record = parse::parse_weapon(info, data, &mut self.ctx());
            if self.catalog.push_weapon(record) {
                self.note_recognized(tags::WEAP);
            }
        }
        for info in scan.records_of(tags::AMMO) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::AMMO);
                continue;
            };
            let record = parse::parse_ammo(info, data, &mut self.ctx());
            if self.catalog.push_ammo(record) {
                self.note_recognized(tags::AMMO);
            }
        }

        for info in scan.records_of(tags::ARMO) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::ARMO);
                continue;
            };
            let record = parse::parse_armor(info, data, &mut self.ctx());
            if self.catalog.push_armor(record) {
                self.note_recognized(tags::ARMO);
            }
        }
        for info in scan.records_of(tags::ALCH) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::ALCH);
                continue;
            };
            let record = parse::parse_consumable(info, data, &mut self.ctx());
            if self.catalog.push_consumable(record) {
                self.note_recognized(tags::ALCH);
            }
        }
        for info in scan.records_of(tags::MISC) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::MISC);
                continue;
            };
            let record = parse::parse_misc_item(info, data, &mut self.ctx());
            if self.catalog.push_misc_item(record) {
                self.note_recognized(tags::MISC);
            }
        }
        for info in scan.records_of(tags::KEYM) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::KEYM);
                continue;
            };
            let record = parse::parse_key(info, data, &mut self.ctx());
            if self.catalog.push_key(record) {
                self.note_recognized(tags::KEYM);
            }
        }
        for info in scan.records_of(tags::CONT) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::CONT);
                continue;
            };
            let record = parse::parse_container(info, data, &mut self.ctx());
            if self.catalog.push_container(record) {
                self.note_recognized(tags::CONT);
            }
        }
        for info in scan.records_of(tags::BOOK) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::BOOK);
                continue;
            };
            let record = parse::parse_book(info, data, &mut self.ctx());
            if self.catalog.push_book(record) {
                self.note_recognized(tags::BOOK);
            }
        }
        for info in scan.records_of(tags::IMOD) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::IMOD);
                continue;
            };
            let record = parse::parse_weapon_mod(info, data, &mut self.ctx());
            if self.catalog.push_weapon_mod(record) {
                self.note_recognized(tags::IMOD);
            }
        }

        // Runtime merges come after every ESM pass so scan-sourced
        // fields keep precedence; the dump only fills gaps.
        if let Some(reader) = self.reader() {
            for entry in self.runtime_entries_of(FormType::Weapon) {
                let Some(record) = reader.read_weapon(&entry) else { continue };
                if let Some(name) = record.header.full_name.as_deref() {
                    self.identity.set_display_name(record.header.form_id, name);
                }
                if !self.catalog.push_weapon(record.clone()) {
                    if let Some(existing) = self
                        .catalog
                        .weapons
                        .iter_mut()
                        .find(|w| w.header.form_id == record.header.form_id)
                    {
                        merge_weapon(existing, record);
                    }
                }
            }
            for entry in self.runtime_entries_of(FormType::Ammo) {
                if let Some(record) = reader.read_ammo(&entry) {
                    if let Some(name) = record.header.full_name.as_deref() {
                        self.identity.set_display_name(record.header.form_id, name);
                    }
                    self.catalog.push_ammo(record);
                }
            }
            for entry in self.runtime_entries_of(FormType::Armor) {
                if let Some(record) = reader.read_armor(&entry) {
                    self.catalog.push_armor(record);
                }
            }
            for entry in self.runtime_entries_of(FormType::Consumable) {
                if let Some(record) = reader.read_consumable(&entry) {
                    self.catalog.push_consumable(record);
                }
            }
            for entry in self.runtime_entries_of(FormType::MiscItem) {
                if let Some(record) = reader.read_misc_item(&entry) {
                    self.catalog.push_misc_item(record);
                }
            }
            for entry in self.runtime_entries_of(FormType::Key) {
                if let Some(record) = reader.read_key(&entry) {
                    self.catalog.push_key(record);
                }
            }
            for entry in self.runtime_entries_of(FormType::Container) {
                if let Some(record) = reader.read_container(&entry) {
                    self.catalog.push_container(record);
                }
            }
        }
    }

    fn phase_dialogue(&mut self) {
        let scan = self.scan;
        let mut scratch = Vec::new();

        for info in scan.records_of(tags::QUST) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::QUST);
                continue;
            };
            let record = parse::parse_quest(info, data, &mut self.ctx());
            if self.catalog.push_quest(record) {
                self.note_recognized(tags::QUST);
            }
        }
        for info in scan.records_of(tags::DIAL) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::DIAL);
                continue;
            };
            let record = parse::parse_dialog_topic(info, data, &mut self.ctx());
            if self.catalog.push_dialog_topic(record) {
                self.note_recognized(tags::DIAL);
            }
        }
        for info in scan.records_of(tags::INFO) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::INFO);
                continue;
            };
            let record = parse::parse_dialog_info(info, data, &mut self.ctx());
            if self.catalog.push_dialog_info(record) {
                self.note_recognized(tags::INFO);
            }
        }

        if let Some(reader) = self.reader() {
            for entry in self.runtime_entries_of(FormType::Quest) {
                if let Some(record) = reader.read_quest(&entry) {
                    if let Some(name) = record.header.full_name.as_deref() {
                        self.identity.set_display_name(record.header.form_id, name);
                    }
                    self.catalog.push_quest(record);
                }
            }
            for entry in self.runtime_entries_of(FormType::DialogTopic) {
                if let Some(record) = reader.read_dialog_topic(&entry) {
                    self.catalog.push_dialog_topic(record);
                }
            }
        }
    }

    fn phase_tree(&mut self) {
        if let Some(reader) = self.reader() {
            link::link_topics_runtime(&mut self.catalog, &reader, &self.identity);
        }
        // Offset ordering covers ESM-sourced infos either way.
        link::link_topics_by_offset(&mut self.catalog);
        link::propagate_speakers(&mut self.catalog);
        link::backfill_orphan_quests(&mut self.catalog, &self.identity);
    }

    fn phase_scripts(&mut self) {
        let scan = self.scan;
        let mut scratch = Vec::new();

        for info in scan.records_of(tags::SCPT) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::SCPT);
                continue;
            };
            let record = parse::parse_script(info, data, &mut self.ctx());
            if self.catalog.push_script(record) {
                self.note_recognized(tags::SCPT);
            }
        }
        if let Some(reader) = self.reader() {
            for entry in self.runtime_entries_of(FormType::Script) {
                if let Some(record) = reader.read_script(&entry) {
                    self.catalog.push_script(record);
                }
            }
        }

        // Object → script mapping pre-pass: a quest that names a script
        // marks that script's owner so quest-variable references resolve.
        let owners: Vec<(FormId, FormId)> = self
            .catalog
            .quests
            .iter()
            .filter_map(|q| q.script.map(|s| (s, q.header.form_id)))
            .collect();
        for (script_id, quest_id) in owners {
            if let Some(script) = self
                .catalog
                .scripts
                .iter_mut()
                .find(|s| s.header.form_id == script_id)
            {
                if script.owner_quest.is_none() {
                    script.owner_quest = Some(quest_id);
                }
            }
        }

        // Remaining text-bearing records.
        for info in scan.records_of(tags::NOTE) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::NOTE);
                continue;
            };
            let record = parse::parse_note(info, data, &mut self.ctx());
            if self.catalog.push_note(record) {
                self.note_recognized(tags::NOTE);
            }
        }
        for info in scan.records_of(tags::TERM) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::TERM);
                continue;
            };
            let record = parse::parse_terminal(info, data, &mut self.ctx());
            if self.catalog.push_terminal(record) {
                self.note_recognized(tags::TERM);
            }
        }
        for info in scan.records_of(tags::MESG) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::MESG);
                continue;
            };
            let record = parse::parse_message(info, data, &mut self.ctx());
            if self.catalog.push_message(record) {
                self.note_recognized(tags::MESG);
            }
        }
        if let Some(reader) = self.reader() {
            for entry in self.runtime_entries_of(FormType::Note) {
                if let Some(record) = reader.read_note(&entry) {
                    self.catalog.push_note(record);
                }
            }
            for entry in self.runtime_entries_of(FormType::Terminal) {
                if let Some(record) = reader.read_terminal(&entry) {
                    self.catalog.push_terminal(record);
                }
            }
        }

        let (names, _) = self.identity.export_maps();
        let stats = script::post_process(&mut self.catalog.scripts, &names);
        debug!(
            "script pass: {} decompiled, {} failed, {} cross-script hits",
            stats.decompiled, stats.failed, stats.cross_script_hits
        );
    }

    fn phase_abilities(&mut self) {
        let scan = self.scan;
        let mut scratch = Vec::new();

        for info in scan.records_of(tags::SPEL) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::SPEL);
                continue;
            };
            let record = parse::parse_spell(info, data, &mut self.ctx());
            if self.catalog.push_spell(record) {
                self.note_recognized(tags::SPEL);
            }
        }
        for info in scan.records_of(tags::ENCH) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::ENCH);
                continue;
            };
            let record = parse::parse_enchantment(info, data, &mut self.ctx());
            if self.catalog.push_enchantment(record) {
                self.note_recognized(tags::ENCH);
            }
        }
        for info in scan.records_of(tags::MGEF) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::MGEF);
                continue;
            };
            let record = parse::parse_base_effect(info, data, &mut self.ctx());
            if self.catalog.push_base_effect(record) {
                self.note_recognized(tags::MGEF);
            }
        }
        for info in scan.records_of(tags::PERK) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::PERK);
                continue;
            };
            let record = parse::parse_perk(info, data, &mut self.ctx());
            if self.catalog.push_perk(record) {
                self.note_recognized(tags::PERK);
            }
        }
    }

    fn phase_world(&mut self) {
        let scan = self.scan;
        let mut scratch = Vec::new();

        for info in scan.records_of(tags::CELL) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::CELL);
                continue;
            };
            let mut record = parse::parse_cell(info, data, &mut self.ctx());
            if record.grid.is_none() {
                record.grid = grid_anchor_near(scan, info.offset);
            }
            record.worldspace = scan.cell_worldspaces.get(&record.header.form_id).copied();
            if self.catalog.push_cell(record) {
                self.note_recognized(tags::CELL);
            }
        }
        for info in scan.records_of(tags::WRLD) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::WRLD);
                continue;
            };
            let record = parse::parse_worldspace(info, data, &mut self.ctx());
            if self.catalog.push_worldspace(record) {
                self.note_recognized(tags::WRLD);
            }
        }
        for info in scan.records_of(tags::PACK) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::PACK);
                continue;
            };
            let record = parse::parse_package(info, data, &mut self.ctx());
            if self.catalog.push_package(record) {
                self.note_recognized(tags::PACK);
            }
        }
        for tag in [tags::LVLI, tags::LVLN, tags::LVLC] {
            for info in scan.records_of(tag) {
                let Some(data) = payload(self.view, info, &mut scratch) else {
                    self.note_unrecognized(tag);
                    continue;
                };
                let record = parse::parse_leveled_list(info, data, &mut self.ctx());
                if self.catalog.push_leveled_list(record) {
                    self.note_recognized(tag);
                }
            }
        }

        // Placed references come straight from the scanner's anchors.
        for anchor in &scan.placed_refs {
            let header = RecordHeader::new(anchor.form_id, anchor.offset, false);
            let record = PlacedRefRecord {
                header,
                base: anchor.base_form_id,
                base_tag: None,
                position: anchor.position,
                rotation: anchor.rotation,
                scale: anchor.scale,
                owner: anchor.owner,
                cell: None,
                bounds: None,
                model: None,
                marker: anchor.marker.clone(),
                leveled_spawn: None,
            };
            if self.catalog.push_placed_ref(record) {
                self.note_recognized(tags::REFR);
            }
        }

        // Heightmap anchors, scan-time and runtime-discovered.
        for anchor in &scan.lands {
            let record = UnknownRecord {
                header: RecordHeader::new(anchor.form_id, anchor.offset, false),
                tag: tags::LAND,
            };
            if self.catalog.push_unknown(record) {
                self.note_recognized(tags::LAND);
            }
        }
        if let Some(regions) = self.regions {
            let runtime_lands: Vec<(FormId, u64)> = scan
                .runtime_lands
                .iter()
                .filter_map(|l| Some((l.form_id?, regions.va_to_file(l.virtual_address)?)))
                .collect();
            for (form_id, offset) in runtime_lands {
                let record = UnknownRecord {
                    header: RecordHeader::new(form_id, offset, true),
                    tag: tags::LAND,
                };
                if self.catalog.push_unknown(record) {
                    self.note_recognized(tags::LAND);
                }
            }
        }
        if let Some(reader) = self.reader() {
            for entry in self.runtime_entries_of(FormType::Land) {
                if let Some(record) = reader.read_land(&entry) {
                    if self.catalog.push_unknown(record) {
                        self.note_recognized(tags::LAND);
                    }
                }
            }
        }

        link::materialize_virtual_cells(&mut self.catalog, scan);
        link::link_cells_worldspaces(&mut self.catalog, scan);
        link::resolve_leveled_spawns(&mut self.catalog);
    }

    fn phase_game_data(&mut self) {
        let scan = self.scan;
        let mut scratch = Vec::new();

        for info in scan.records_of(tags::GLOB) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::GLOB);
                continue;
            };
            let record = parse::parse_global(info, data, &mut self.ctx());
            if self.catalog.push_global(record) {
                self.note_recognized(tags::GLOB);
            }
        }
        for info in scan.records_of(tags::GMST) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::GMST);
                continue;
            };
            let record = parse::parse_game_setting(info, data, &mut self.ctx());
            if self.catalog.push_game_setting(record) {
                self.note_recognized(tags::GMST);
            }
        }
        for info in scan.records_of(tags::RCPE) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::RCPE);
                continue;
            };
            let record = parse::parse_recipe(info, data, &mut self.ctx());
            if self.catalog.push_recipe(record) {
                self.note_recognized(tags::RCPE);
            }
        }
        for info in scan.records_of(tags::CHAL) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::CHAL);
                continue;
            };
            let record = parse::parse_challenge(info, data, &mut self.ctx());
            if self.catalog.push_challenge(record) {
                self.note_recognized(tags::CHAL);
            }
        }
        for info in scan.records_of(tags::REPU) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::REPU);
                continue;
            };
            let record = parse::parse_reputation(info, data, &mut self.ctx());
            if self.catalog.push_reputation(record) {
                self.note_recognized(tags::REPU);
            }
        }
        for info in scan.records_of(tags::FLST) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::FLST);
                continue;
            };
            let record = parse::parse_form_list(info, data, &mut self.ctx());
            if self.catalog.push_form_list(record) {
                self.note_recognized(tags::FLST);
            }
        }
    }

    fn phase_generic(&mut self) {
        let scan = self.scan;
        let mut scratch = Vec::new();

        for info in scan.records_of(tags::ACTI) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::ACTI);
                continue;
            };
            let record = parse::parse_activator(info, data, &mut self.ctx());
            if self.catalog.push_activator(record) {
                self.note_recognized(tags::ACTI);
            }
        }
        for info in scan.records_of(tags::LIGH) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::LIGH);
                continue;
            };
            let record = parse::parse_light(info, data, &mut self.ctx());
            if self.catalog.push_light(record) {
                self.note_recognized(tags::LIGH);
            }
        }
        for info in scan.records_of(tags::DOOR) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::DOOR);
                continue;
            };
            let record = parse::parse_door(info, data, &mut self.ctx());
            if self.catalog.push_door(record) {
                self.note_recognized(tags::DOOR);
            }
        }
        for info in scan.records_of(tags::STAT) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::STAT);
                continue;
            };
            let record = parse::parse_static(info, data, &mut self.ctx());
            if self.catalog.push_static(record) {
                self.note_recognized(tags::STAT);
            }
        }
        for info in scan.records_of(tags::FURN) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::FURN);
                continue;
            };
            let record = parse::parse_furniture(info, data, &mut self.ctx());
            if self.catalog.push_furniture(record) {
                self.note_recognized(tags::FURN);
            }
        }
        for info in scan.records_of(tags::PROJ) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::PROJ);
                continue;
            };
            let record = parse::parse_projectile(info, data, &mut self.ctx());
            if self.catalog.push_projectile(record) {
                self.note_recognized(tags::PROJ);
            }
        }
        for info in scan.records_of(tags::EXPL) {
            let Some(data) = payload(self.view, info, &mut scratch) else {
                self.note_unrecognized(tags::EXPL);
                continue;
            };
            let record = parse::parse_explosion(info, data, &mut self.ctx());
            if self.catalog.push_explosion(record) {
                self.note_recognized(tags::EXPL);
            }
        }
        if let Some(reader) = self.reader() {
            for entry in self.runtime_entries_of(FormType::Projectile) {
                if let Some(record) = reader.read_projectile(&entry) {
                    self.catalog.push_projectile(record);
                }
            }
        }

        // Everything else becomes a generic holder and counts against
        // coverage.
        let handled = handled_tags();
        let leftovers: Vec<RecordHeaderInfo> = scan
            .records
            .iter()
            .filter(|r| !handled.contains(&r.tag))
            .copied()
            .collect();
        for info in leftovers {
            let Some(data) = payload(self.view, &info, &mut scratch) else {
                self.note_unrecognized(info.tag);
                continue;
            };
            let record = parse::parse_unknown(&info, data, &mut self.ctx());
            if self.catalog.push_unknown(record) {
                self.note_unrecognized(info.tag);
            }
        }
    }

    fn phase_enrichment(&mut self) {
        link::enrich_placed_refs(&mut self.catalog);
        link::link_weapon_projectiles(&mut self.catalog);
    }

    fn finish(mut self) -> Catalog {
        self.identity.build_reverse();
        let (editor_ids, display_names) = self.identity.export_maps();
        self.catalog.editor_ids = editor_ids;
        self.catalog.display_names = display_names;
        debug!(
            "reconstruction complete: {} records, {} types unreconstructed",
            self.catalog.total_records(),
            self.catalog.unrecognized.len()
        );
        self.catalog
    }
}

/// `XCLC` anchor within the proximity window after a cell header.
fn grid_anchor_near(scan: &ScanResult, cell_offset: u64) -> Option<(i32, i32)> {
    scan.cell_grids
        .iter()
        .find(|g| {
            g.offset >= cell_offset && g.offset - cell_offset <= link::CELL_GRID_PROXIMITY
        })
        .map(|g| (g.x, g.y))
}

/// Record-type tags with a dedicated reconstructor.
fn handled_tags() -> Vec<Tag> {
    vec![
        tags::NPC_,
        tags::CREA,
        tags::RACE,
        tags::CLAS,
        tags::FACT,
        tags::WEAP,
        tags::AMMO,
        tags::ARMO,
        tags::ALCH,
        tags::MISC,
        tags::KEYM,
        tags::CONT,
        tags::BOOK,
        tags::IMOD,
        tags::QUST,
        tags::DIAL,
        tags::INFO,
        tags::SCPT,
        tags::NOTE,
        tags::TERM,
        tags::MESG,
        tags::SPEL,
        tags::ENCH,
        tags::MGEF,
        tags::PERK,
        tags::CELL,
        tags::WRLD,
        tags::PACK,
        tags::LVLI,
        tags::LVLN,
        tags::LVLC,
        tags::GLOB,
        tags::GMST,
        tags::RCPE,
        tags::CHAL,
        tags::REPU,
        tags::FLST,
        tags::ACTI,
        tags::LIGH,
        tags::DOOR,
        tags::STAT,
        tags::FURN,
        tags::PROJ,
        tags::EXPL,
        tags::REFR,
        tags::ACHR,
        tags::ACRE,
        tags::LAND,
        tags::TES4,
        tags::GRUP,
    ]
}

/// ESM fields win; the dump fills whatever the scan could not provide.
fn merge_weapon(existing: &mut WeaponRecord, other: WeaponRecord) {
    if existing.header.full_name.is_none() {
        existing.header.full_name = other.header.full_name;
    }
    if existing.projectile.is_none() {
        existing.projectile = other.projectile;
    }
    if existing.ammo.is_none() {
        existing.ammo = other.ammo;
    }
    if existing.value == 0 {
        existing.value = other.value;
    }
    if existing.damage == 0 {
        existing.damage = other.damage;
    }
    if existing.weight == 0.0 {
        existing.weight = other.weight;
    }
    if existing.fire_rate == 0.0 {
        existing.fire_rate = other.fire_rate;
    }
}

fn merge_actor(existing: &mut ActorRecord, other: ActorRecord) {
    if existing.header.full_name.is_none() {
        existing.header.full_name = other.header.full_name;
    }
    if existing.race.is_none() {
        existing.race = other.race;
    }
    if existing.class.is_none() {
        existing.class = other.class;
    }
    if existing.script.is_none() {
        existing.script = other.script;
    }
    if existing.inventory.is_empty() {
        existing.inventory = other.inventory;
    }
    if existing.factions.is_empty() {
        existing.factions = other.factions;
    }
    if existing.level == 0 {
        existing.level = other.level;
    }
}
