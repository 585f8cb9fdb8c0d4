//! Typed readers for C++ objects still resident in the dump image.
//!
//! Each reader materializes one record from a `TESForm`-derived struct
//! reachable through the runtime editor-ID hash table. Field locations
//! come from the offset catalog below; most were mapped empirically
//! against captured dumps rather than derived from debug symbols, so
//! every numeric field passes a range predicate before it is kept and
//! every pointer is resolved through the region map before it is
//! followed. A field that fails validation is absent, never garbage;
//! only the identity checks (form type, form ID) reject a whole struct.

use std::collections::HashSet;

use log::trace;

use crate::bytes::{self, Endian};
use crate::memory::{DumpView, RegionMap, TESFORM_ID_OFFSET, TESFORM_TYPE_OFFSET, deref_form_id};
use crate::records::*;
use crate::scan::RuntimeEntry;
use crate::schema::fields::normal_f32;
use crate::schema::tags::FormType;

/// Hard cap on embedded linked-list walks.
pub const LIST_CAP: usize = 50;
/// Longest accepted length-prefixed string.
pub const STRING_CAP: usize = 4096;
const PRINTABLE_THRESHOLD: f32 = 0.8;

const BE: Endian = Endian::Big;

/// Empirically mapped struct layouts for the console build.
///
/// Offsets are relative to the start of the owning object. A comment
/// marks fields whose placement was confirmed from more than one dump.
pub mod offsets {
    /// Shared by `TESNPC` and `TESCreature`; the actor stat block sits
    /// at the same displacement in both.
    pub mod actor {
        pub const SIZE: usize = 0x150;
        pub const FULL_NAME: usize = 0x30; // {char*, u16 len}
        pub const STATS_FLAGS: usize = 0x40;
        pub const FATIGUE: usize = 0x44;
        pub const BARTER_GOLD: usize = 0x46;
        pub const LEVEL: usize = 0x48;
        pub const CALC_MIN: usize = 0x4A;
        pub const CALC_MAX: usize = 0x4C;
        pub const SPEED_MULT: usize = 0x4E;
        pub const KARMA: usize = 0x50;
        pub const DISPOSITION: usize = 0x54;
        pub const TEMPLATE_FLAGS: usize = 0x56;
        pub const SCRIPT: usize = 0x5C;
        pub const RACE: usize = 0x60; // confirmed across dumps
        pub const CLASS: usize = 0x64;
        pub const DEATH_ITEM: usize = 0x68;
        pub const VOICE: usize = 0x6C;
        pub const TEMPLATE: usize = 0x70;
        pub const INVENTORY_HEAD: usize = 0x80; // node {count:i32, item*, next*}
        pub const FACTION_HEAD: usize = 0x88; // node {faction*, rank:i8, next*}
    }

    pub mod weapon {
        pub const SIZE: usize = 0x200;
        pub const FULL_NAME: usize = 0x30;
        pub const SCRIPT: usize = 0x78;
        pub const VALUE: usize = 0x88; // confirmed across dumps
        pub const HEALTH: usize = 0x8C;
        pub const WEIGHT: usize = 0x90;
        pub const DAMAGE: usize = 0x94;
        pub const CLIP_ROUNDS: usize = 0x96;
        pub const ANIM_TYPE: usize = 0xA0;
        pub const ANIM_MULT: usize = 0xA4;
        pub const REACH: usize = 0xA8;
        pub const MIN_SPREAD: usize = 0xB0;
        pub const SPREAD: usize = 0xB4;
        pub const SIGHT_FOV: usize = 0xBC;
        pub const PROJECTILE: usize = 0xC0;
        pub const AMMO: usize = 0xC4;
        pub const MIN_RANGE: usize = 0xC8;
        pub const MAX_RANGE: usize = 0xCC;
        pub const FIRE_RATE: usize = 0xD0;
    }

    pub mod armor {
        pub const SIZE: usize = 0x180;
        pub const FULL_NAME: usize = 0x30;
        pub const SCRIPT: usize = 0x78;
        pub const VALUE: usize = 0x88;
        pub const MAX_CONDITION: usize = 0x8C;
        pub const WEIGHT: usize = 0x90;
        pub const DAMAGE_THRESHOLD: usize = 0x94;
        pub const BIPED_FLAGS: usize = 0x98;
    }

    pub mod ammo {
        pub const SIZE: usize = 0x120;
        pub const FULL_NAME: usize = 0x30;
        pub const SHORT_NAME: usize = 0x38;
        pub const SPEED: usize = 0x88;
        pub const FLAGS: usize = 0x8C;
        pub const VALUE: usize = 0x90;
        pub const CLIP_ROUNDS: usize = 0x94;
        pub const PROJECTILE: usize = 0x98;
        pub const WEIGHT: usize = 0x9C;
    }

    pub mod consumable {
        pub const SIZE: usize = 0x130;
        pub const FULL_NAME: usize = 0x30;
        pub const VALUE: usize = 0x88;
        pub const WEIGHT: usize = 0x8C;
        pub const WITHDRAWAL: usize = 0x90;
        pub const ADDICTION_CHANCE: usize = 0x94;
        pub const USE_SOUND: usize = 0x98;
    }

    pub mod misc {
        pub const SIZE: usize = 0x100;
        pub const FULL_NAME: usize = 0x30;
        pub const VALUE: usize = 0x88;
        pub const WEIGHT: usize = 0x8C;
    }

    pub mod container {
        pub const SIZE: usize = 0x120;
        pub const FULL_NAME: usize = 0x30;
        pub const SCRIPT: usize = 0x78;
        pub const INVENTORY_HEAD: usize = 0x90;
        pub const FLAGS: usize = 0x98;
        pub const WEIGHT: usize = 0x9C;
    }

    pub mod note {
        pub const SIZE: usize = 0xD0;
        pub const FULL_NAME: usize = 0x30;
        pub const NOTE_TYPE: usize = 0x80;
        pub const TEXT: usize = 0x88;
        pub const SOUND: usize = 0x90;
    }

    pub mod faction {
        pub const SIZE: usize = 0xE0;
        pub const FULL_NAME: usize = 0x30;
        pub const FLAGS: usize = 0x80;
        pub const REPUTATION: usize = 0x84;
    }

    pub mod quest {
        pub const SIZE: usize = 0x110;
        pub const FULL_NAME: usize = 0x30;
        pub const SCRIPT: usize = 0x78;
        pub const FLAGS: usize = 0x80;
        pub const PRIORITY: usize = 0x81;
        pub const DELAY: usize = 0x84;
    }

    pub mod terminal {
        pub const SIZE: usize = 0x140;
        pub const FULL_NAME: usize = 0x30;
        pub const SCRIPT: usize = 0x78;
        pub const DIFFICULTY: usize = 0x88;
        pub const FLAGS: usize = 0x89;
        pub const SERVER_TYPE: usize = 0x8A;
    }

    pub mod projectile {
        pub const SIZE: usize = 0x1A0;
        pub const FULL_NAME: usize = 0x30;
        pub const TYPE: usize = 0x8A;
        pub const GRAVITY: usize = 0x8C;
        pub const SPEED: usize = 0x90;
        pub const RANGE: usize = 0x94;
        pub const EXPLOSION: usize = 0x98;
        pub const SOUND: usize = 0x9C;
        pub const FADE_DURATION: usize = 0xA0;
        pub const IMPACT_FORCE: usize = 0xA4;
    }

    pub mod topic {
        pub const SIZE: usize = 0xC0;
        pub const TOPIC_TEXT: usize = 0x30;
        pub const TYPE: usize = 0x80;
        pub const PRIORITY: usize = 0x84;
        /// Node `{quest*, info_list*, next*}`; the info list nodes are
        /// `{info*, next*}`.
        pub const QUEST_INFO_HEAD: usize = 0x88;
    }

    pub mod info {
        pub const SIZE: usize = 0xB0;
        pub const QUEST: usize = 0x30;
        pub const TOPIC: usize = 0x34;
        pub const SPEAKER: usize = 0x38;
        pub const PREVIOUS: usize = 0x3C;
        pub const DIFFICULTY: usize = 0x40;
        pub const RESPONSE_TEXT: usize = 0x48;
    }

    pub mod script {
        pub const SIZE: usize = 0x100;
        pub const TYPE: usize = 0x20;
        pub const VAR_COUNT: usize = 0x24;
        pub const REF_COUNT: usize = 0x28;
        pub const COMPILED_SIZE: usize = 0x2C;
        pub const BYTECODE: usize = 0x30;
        pub const SOURCE_TEXT: usize = 0x38;
        /// Node `{index:u32, name*, name_len:u16, flags:u8, next*@0xC}`.
        pub const VAR_HEAD: usize = 0x40;
        /// Node `{form*, next*}`.
        pub const REF_HEAD: usize = 0x44;
        pub const OWNER_QUEST: usize = 0x48;
    }

    pub mod land {
        pub const SIZE: usize = 0x40;
    }
}

/// A loaded struct window: the object's bytes plus its file offset.
#[derive(Debug)]
struct Window {
    buf: Vec<u8>,
    file_offset: u64,
}

impl Window {
    fn u8(&self, off: usize) -> u8 {
        bytes::read_u8(&self.buf, off).unwrap_or(0)
    }

    fn i8(&self, off: usize) -> i8 {
        bytes::read_i8(&self.buf, off).unwrap_or(0)
    }

    fn u16(&self, off: usize) -> u16 {
        bytes::read_u16(&self.buf, off, BE).unwrap_or(0)
    }

    fn i16(&self, off: usize) -> i16 {
        bytes::read_i16(&self.buf, off, BE).unwrap_or(0)
    }

    fn u32(&self, off: usize) -> u32 {
        bytes::read_u32(&self.buf, off, BE).unwrap_or(0)
    }

    fn i32(&self, off: usize) -> i32 {
        bytes::read_i32(&self.buf, off, BE).unwrap_or(0)
    }

    /// Validated float; failures collapse to the absent value.
    fn f32(&self, off: usize) -> f32 {
        match bytes::read_f32(&self.buf, off, BE) {
            Ok(v) if normal_f32(v) => v,
            _ => 0.0,
        }
    }
}

/// Reads typed records out of the mapped dump.
pub struct StructReader<'a, V: DumpView + ?Sized> {
    view: &'a V,
    regions: &'a RegionMap,
}

impl<'a, V: DumpView + ?Sized> StructReader<'a, V> {
    #[must_use]
    pub fn new(view: &'a V, regions: &'a RegionMap) -> Self {
        Self { view, regions }
    }

    /// Load the struct window for an index entry, enforcing the
    /// identity checks: expected form-type code, window inside the
    /// file, and the embedded form ID matching the entry.
    fn load(&self, entry: &RuntimeEntry, expected: FormType, size: usize) -> Option<Window> {
        if FormType::try_from(entry.form_type_code).ok()? != expected {
            return None;
        }
        let file_offset = entry.tes_form_offset?;
        if file_offset + size as u64 > self.view.len() {
            trace!("struct for {:#010x} extends past the dump", entry.form_id);
            return None;
        }
        let mut buf = vec![0u8; size];
        self.view.read_at(file_offset, &mut buf).ok()?;
        let window = Window { buf, file_offset };
        if window.u8(TESFORM_TYPE_OFFSET as usize) != expected as u8 {
            return None;
        }
        let stored_id = window.u32(TESFORM_ID_OFFSET as usize);
        if stored_id != entry.form_id {
            trace!(
                "form id mismatch at {file_offset:#x}: struct {stored_id:#010x}, index {:#010x}",
                entry.form_id
            );
            return None;
        }
        Some(window)
    }

    fn header_for(&self, entry: &RuntimeEntry, window: &Window) -> RecordHeader {
        let mut header = RecordHeader::new(entry.form_id, window.file_offset, true);
        if !entry.editor_id.is_empty() {
            header.editor_id = Some(entry.editor_id.clone());
        }
        header
    }

    /// Follow an embedded pointer field to the form ID of its target.
    fn form_at(&self, window: &Window, off: usize) -> Option<FormId> {
        let va = window.u32(off);
        if va == 0 {
            return None;
        }
        deref_form_id(self.view, self.regions, va)
    }

    /// Read a `{char*, u16 len}` string stored contiguously at `off`.
    ///
    /// Accepts only mapped pointers, lengths within [`STRING_CAP`] and
    /// text that is at least 80% printable ASCII.
    fn string_at(&self, window: &Window, off: usize) -> Option<String> {
        let ptr = window.u32(off);
        let len = window.u16(off + 4) as usize;
        if !self.regions.is_valid_pointer(ptr) || len == 0 || len > STRING_CAP {
            return None;
        }
        let file_offset = self.regions.va_to_file(ptr)?;
        let mut buf = vec![0u8; len];
        self.view.read_at(file_offset, &mut buf).ok()?;
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let buf = &buf[..end];
        if buf.is_empty() || bytes::printable_ratio(buf) < PRINTABLE_THRESHOLD {
            return None;
        }
        Some(bytes::latin1(buf))
    }

    /// Walk a singly-linked list of fixed-size nodes. Stops at a null
    /// or unmapped next pointer, after [`LIST_CAP`] nodes, or when a
    /// node address repeats (cycle guard).
    fn walk_list(
        &self,
        head_va: u32,
        node_size: usize,
        next_offset: usize,
        mut visit: impl FnMut(&Window),
    ) {
        let mut visited: HashSet<u32> = HashSet::new();
        let mut va = head_va;
        while va != 0 && visited.len() < LIST_CAP {
            if !visited.insert(va) {
                trace!("cycle in linked list at va {va:#010x}");
                return;
            }
            let Some(file_offset) = self.regions.va_to_file(va) else { return };
            let mut buf = vec![0u8; node_size];
            if self.view.read_at(file_offset, &mut buf).is_err() {
                return;
            }
            let node = Window { buf, file_offset };
            visit(&node);
            va = node.u32(next_offset);
        }
    }

    fn inventory_list(&self, head_va: u32) -> Vec<InventoryEntry> {
        let mut items = Vec::new();
        self.walk_list(head_va, 12, 8, |node| {
            let count = node.i32(0);
            if let Some(item) = self.form_at(node, 4) {
                items.push(InventoryEntry { item, count });
            }
        });
        items
    }

    fn faction_list(&self, head_va: u32) -> Vec<FactionMembership> {
        let mut memberships = Vec::new();
        self.walk_list(head_va, 12, 8, |node| {
            if let Some(faction) = self.form_at(node, 0) {
                memberships.push(FactionMembership { faction, rank: node.i8(4) });
            }
        });
        memberships
    }

    /// NPC or creature, depending on `kind`.
    #[must_use]
    pub fn read_actor(&self, entry: &RuntimeEntry, kind: ActorKind) -> Option<ActorRecord> {
        use offsets::actor::*;
        let expected = match kind {
            ActorKind::Npc => FormType::Npc,
            ActorKind::Creature => FormType::Creature,
        };
        let w = self.load(entry, expected, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(ActorRecord {
            header,
            kind,
            bounds: None,
            model: None,
            flags: w.u32(STATS_FLAGS),
            fatigue: w.u16(FATIGUE),
            barter_gold: w.u16(BARTER_GOLD),
            level: w.i16(LEVEL),
            calc_min: w.u16(CALC_MIN),
            calc_max: w.u16(CALC_MAX),
            speed_multiplier: w.u16(SPEED_MULT),
            karma: w.f32(KARMA),
            disposition_base: w.i16(DISPOSITION),
            template_flags: w.u16(TEMPLATE_FLAGS),
            race: self.form_at(&w, RACE),
            class: self.form_at(&w, CLASS),
            script: self.form_at(&w, SCRIPT),
            template: self.form_at(&w, TEMPLATE),
            voice: self.form_at(&w, VOICE),
            death_item: self.form_at(&w, DEATH_ITEM),
            inventory: self.inventory_list(w.u32(INVENTORY_HEAD)),
            factions: self.faction_list(w.u32(FACTION_HEAD)),
            packages: Vec::new(),
            spells: Vec::new(),
        })
    }

    #[must_use]
    pub fn read_weapon(&self, entry: &RuntimeEntry) -> Option<WeaponRecord> {
        use offsets::weapon::*;
        let w = self.load(entry, FormType::Weapon, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(WeaponRecord {
            header,
            bounds: None,
            model: None,
            icon: None,
            script: self.form_at(&w, SCRIPT),
            value: w.i32(VALUE),
            health: w.i32(HEALTH),
            weight: w.f32(WEIGHT),
            damage: w.i16(DAMAGE),
            clip_rounds: w.u8(CLIP_ROUNDS),
            anim_type: w.u32(ANIM_TYPE),
            anim_mult: w.f32(ANIM_MULT),
            reach: w.f32(REACH),
            min_spread: w.f32(MIN_SPREAD),
            spread: w.f32(SPREAD),
            sight_fov: w.f32(SIGHT_FOV),
            projectile: self.form_at(&w, PROJECTILE),
            min_range: w.f32(MIN_RANGE),
            max_range: w.f32(MAX_RANGE),
            fire_rate: w.f32(FIRE_RATE),
            ammo: self.form_at(&w, AMMO),
            enchantment: None,
            sound_gunshot: None,
            weapon_mods: Vec::new(),
        })
    }

    #[must_use]
    pub fn read_armor(&self, entry: &RuntimeEntry) -> Option<ArmorRecord> {
        use offsets::armor::*;
        let w = self.load(entry, FormType::Armor, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(ArmorRecord {
            header,
            bounds: None,
            model: None,
            icon: None,
            script: self.form_at(&w, SCRIPT),
            value: w.i32(VALUE),
            max_condition: w.i32(MAX_CONDITION),
            weight: w.f32(WEIGHT),
            damage_threshold: w.f32(DAMAGE_THRESHOLD),
            biped_flags: w.u32(BIPED_FLAGS),
        })
    }

    #[must_use]
    pub fn read_ammo(&self, entry: &RuntimeEntry) -> Option<AmmoRecord> {
        use offsets::ammo::*;
        let w = self.load(entry, FormType::Ammo, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(AmmoRecord {
            header,
            bounds: None,
            model: None,
            icon: None,
            script: None,
            short_name: self.string_at(&w, SHORT_NAME),
            speed: w.f32(SPEED),
            flags: w.u8(FLAGS),
            value: w.u32(VALUE),
            clip_rounds: w.u8(CLIP_ROUNDS),
            projectile: self.form_at(&w, PROJECTILE),
            projectiles_per_shot: 1,
            weight: w.f32(WEIGHT),
        })
    }

    #[must_use]
    pub fn read_consumable(&self, entry: &RuntimeEntry) -> Option<ConsumableRecord> {
        use offsets::consumable::*;
        let w = self.load(entry, FormType::Consumable, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(ConsumableRecord {
            header,
            bounds: None,
            model: None,
            icon: None,
            script: None,
            value: w.i32(VALUE),
            weight: w.f32(WEIGHT),
            flags: 0,
            withdrawal_effect: self.form_at(&w, WITHDRAWAL),
            addiction_chance: w.f32(ADDICTION_CHANCE),
            use_sound: self.form_at(&w, USE_SOUND),
            effects: Vec::new(),
        })
    }

    #[must_use]
    pub fn read_misc_item(&self, entry: &RuntimeEntry) -> Option<MiscItemRecord> {
        use offsets::misc::*;
        let w = self.load(entry, FormType::MiscItem, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(MiscItemRecord {
            header,
            bounds: None,
            model: None,
            icon: None,
            script: None,
            value: w.i32(VALUE),
            weight: w.f32(WEIGHT),
            pickup_sound: None,
            drop_sound: None,
        })
    }

    #[must_use]
    pub fn read_key(&self, entry: &RuntimeEntry) -> Option<KeyRecord> {
        use offsets::misc::*;
        let w = self.load(entry, FormType::Key, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(KeyRecord {
            header,
            bounds: None,
            model: None,
            icon: None,
            script: None,
            value: w.i32(VALUE),
            weight: w.f32(WEIGHT),
        })
    }

    #[must_use]
    pub fn read_container(&self, entry: &RuntimeEntry) -> Option<ContainerRecord> {
        use offsets::container::*;
        let w = self.load(entry, FormType::Container, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(ContainerRecord {
            header,
            bounds: None,
            model: None,
            script: self.form_at(&w, SCRIPT),
            flags: w.u8(FLAGS),
            weight: w.f32(WEIGHT),
            open_sound: None,
            close_sound: None,
            items: self.inventory_list(w.u32(INVENTORY_HEAD)),
        })
    }

    #[must_use]
    pub fn read_note(&self, entry: &RuntimeEntry) -> Option<NoteRecord> {
        use offsets::note::*;
        let w = self.load(entry, FormType::Note, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(NoteRecord {
            header,
            bounds: None,
            model: None,
            note_type: w.u8(NOTE_TYPE),
            text: self.string_at(&w, TEXT),
            sound: self.form_at(&w, SOUND),
        })
    }

    #[must_use]
    pub fn read_faction(&self, entry: &RuntimeEntry) -> Option<FactionRecord> {
        use offsets::faction::*;
        let w = self.load(entry, FormType::Faction, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(FactionRecord {
            header,
            flags: w.u32(FLAGS),
            reputation: self.form_at(&w, REPUTATION),
            relations: Vec::new(),
            ranks: Vec::new(),
        })
    }

    #[must_use]
    pub fn read_quest(&self, entry: &RuntimeEntry) -> Option<QuestRecord> {
        use offsets::quest::*;
        let w = self.load(entry, FormType::Quest, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(QuestRecord {
            header,
            script: self.form_at(&w, SCRIPT),
            flags: w.u8(FLAGS),
            priority: w.u8(PRIORITY),
            quest_delay: w.f32(DELAY),
            stages: Vec::new(),
            objectives: Vec::new(),
            synthesized: false,
        })
    }

    #[must_use]
    pub fn read_terminal(&self, entry: &RuntimeEntry) -> Option<TerminalRecord> {
        use offsets::terminal::*;
        let w = self.load(entry, FormType::Terminal, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(TerminalRecord {
            header,
            bounds: None,
            model: None,
            script: self.form_at(&w, SCRIPT),
            description: None,
            password: None,
            hacking_difficulty: w.u8(DIFFICULTY),
            flags: w.u8(FLAGS),
            server_type: w.u8(SERVER_TYPE),
            items: Vec::new(),
        })
    }

    #[must_use]
    pub fn read_projectile(&self, entry: &RuntimeEntry) -> Option<ProjectileRecord> {
        use offsets::projectile::*;
        let w = self.load(entry, FormType::Projectile, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, FULL_NAME);
        Some(ProjectileRecord {
            header,
            bounds: None,
            model: None,
            flags: 0,
            projectile_type: w.u16(TYPE),
            gravity: w.f32(GRAVITY),
            speed: w.f32(SPEED),
            range: w.f32(RANGE),
            light: None,
            tracer_chance: 0.0,
            timer: 0.0,
            explosion: self.form_at(&w, EXPLOSION),
            sound: self.form_at(&w, SOUND),
            fade_duration: w.f32(FADE_DURATION),
            impact_force: w.f32(IMPACT_FORCE),
        })
    }

    /// Land carries nothing we type beyond its identity; reading it
    /// serves to confirm the heightmap object survived in the capture.
    #[must_use]
    pub fn read_land(&self, entry: &RuntimeEntry) -> Option<UnknownRecord> {
        use offsets::land::*;
        let w = self.load(entry, FormType::Land, SIZE)?;
        Some(UnknownRecord {
            header: self.header_for(entry, &w),
            tag: crate::schema::tags::LAND,
        })
    }

    #[must_use]
    pub fn read_dialog_topic(&self, entry: &RuntimeEntry) -> Option<DialogTopicRecord> {
        use offsets::topic::*;
        let w = self.load(entry, FormType::DialogTopic, SIZE)?;
        let mut header = self.header_for(entry, &w);
        header.full_name = self.string_at(&w, TOPIC_TEXT);
        Some(DialogTopicRecord {
            header,
            topic_type: w.u8(TYPE),
            priority: w.f32(PRIORITY),
            speaker: None,
            quests: Vec::new(),
            infos: Vec::new(),
        })
    }

    /// Quest → info-pointer groups embedded in a runtime dialog topic.
    ///
    /// Used by the dialogue linker to merge runtime info chains into
    /// records reconstructed from the ESM.
    #[must_use]
    pub fn topic_quest_infos(&self, entry: &RuntimeEntry) -> Vec<(FormId, Vec<u32>)> {
        use offsets::topic::*;
        let Some(w) = self.load(entry, FormType::DialogTopic, SIZE) else {
            return Vec::new();
        };
        let mut groups = Vec::new();
        self.walk_list(w.u32(QUEST_INFO_HEAD), 12, 8, |node| {
            let Some(quest) = self.form_at(node, 0) else { return };
            let mut info_vas = Vec::new();
            self.walk_list(node.u32(4), 8, 4, |info_node| {
                let va = info_node.u32(0);
                if self.regions.is_valid_pointer(va) {
                    info_vas.push(va);
                }
            });
            groups.push((quest, info_vas));
        });
        groups
    }

    /// Materialize a dialog info straight from its virtual address.
    #[must_use]
    pub fn read_info_at(&self, va: u32) -> Option<DialogInfoRecord> {
        use offsets::info::*;
        let file_offset = self.regions.va_to_file(va)?;
        if file_offset + SIZE as u64 > self.view.len() {
            return None;
        }
        let mut buf = vec![0u8; SIZE];
        self.view.read_at(file_offset, &mut buf).ok()?;
        let w = Window { buf, file_offset };
        if FormType::try_from(w.u8(TESFORM_TYPE_OFFSET as usize)).ok()? != FormType::DialogInfo {
            return None;
        }
        let form_id = form_ref(w.u32(TESFORM_ID_OFFSET as usize))?;
        let mut responses = Vec::new();
        if let Some(text) = self.string_at(&w, RESPONSE_TEXT) {
            responses.push(DialogueResponse {
                text,
                emotion_type: 0,
                emotion_value: 0,
                response_number: 1,
            });
        }
        Some(DialogInfoRecord {
            header: RecordHeader::new(form_id, file_offset, true),
            quest: self.form_at(&w, QUEST),
            topic: self.form_at(&w, TOPIC),
            speaker: self.form_at(&w, SPEAKER),
            previous_info: self.form_at(&w, PREVIOUS),
            difficulty: w.u8(DIFFICULTY),
            responses,
            link_to: Vec::new(),
            link_from: Vec::new(),
            add_topics: Vec::new(),
        })
    }

    /// Runtime script object: header, raw big-endian bytecode, source
    /// text and the variable/reference lists.
    #[must_use]
    pub fn read_script(&self, entry: &RuntimeEntry) -> Option<ScriptRecord> {
        use offsets::script::*;
        let w = self.load(entry, FormType::Script, SIZE)?;
        let header = self.header_for(entry, &w);

        let compiled_size = w.u32(COMPILED_SIZE);
        let mut bytecode = Vec::new();
        let code_ptr = w.u32(BYTECODE);
        if compiled_size > 0
            && compiled_size <= 0x10000
            && self.regions.is_valid_pointer(code_ptr)
        {
            if let Some(code_offset) = self.regions.va_to_file(code_ptr) {
                let mut buf = vec![0u8; compiled_size as usize];
                if self.view.read_at(code_offset, &mut buf).is_ok() {
                    bytecode = buf;
                }
            }
        }

        let mut variables = Vec::new();
        self.walk_list(w.u32(VAR_HEAD), 16, 0xC, |node| {
            let index = node.u32(0);
            if let Some(name) = self.string_at(node, 4) {
                let is_ref = node.u8(0xA) & 0x01 != 0;
                variables.push(ScriptVariable { index, name, is_ref });
            }
        });

        let mut references = Vec::new();
        self.walk_list(w.u32(REF_HEAD), 8, 4, |node| {
            references.push(ScriptReference {
                form_id: self.form_at(node, 0),
                variable: None,
            });
        });

        Some(ScriptRecord {
            header,
            script_type: w.u16(TYPE),
            variable_count: w.u32(VAR_COUNT),
            ref_count: w.u32(REF_COUNT),
            compiled_size,
            flags: 0,
            bytecode,
            bytecode_big_endian: true,
            source: self.string_at(&w, SOURCE_TEXT),
            variables,
            references,
            owner_quest: self.form_at(&w, OWNER_QUEST),
            decompiled: None,
            cross_script_hits: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Region;

    const BASE_VA: u32 = 0x8100_0000;

    /// A synthetic dump with one region mapping `BASE_VA` to file
    /// offset 0.
    struct Fixture {
        file: Vec<u8>,
        regions: RegionMap,
    }

    impl Fixture {
        fn new(size: usize) -> Self {
            Self {
                file: vec![0u8; size],
                regions: RegionMap::new(vec![Region {
                    virtual_address: BASE_VA,
                    size: size as u32,
                    file_offset: 0,
                }]),
            }
        }

        fn put_u32(&mut self, off: usize, v: u32) {
            self.file[off..off + 4].copy_from_slice(&v.to_be_bytes());
        }

        fn put_u16(&mut self, off: usize, v: u16) {
            self.file[off..off + 2].copy_from_slice(&v.to_be_bytes());
        }

        fn put_f32(&mut self, off: usize, v: f32) {
            self.file[off..off + 4].copy_from_slice(&v.to_be_bytes());
        }

        fn put_form(&mut self, off: usize, form_type: FormType, form_id: u32) {
            self.file[off + TESFORM_TYPE_OFFSET as usize] = form_type as u8;
            self.put_u32(off + TESFORM_ID_OFFSET as usize, form_id);
        }

        fn put_str(&mut self, off: usize, text: &str) {
            self.file[off..off + text.len()].copy_from_slice(text.as_bytes());
        }

        fn reader(&self) -> StructReader<'_, [u8]> {
            StructReader::new(self.file.as_slice(), &self.regions)
        }
    }

    fn entry(form_id: u32, form_type: FormType, offset: u64) -> RuntimeEntry {
        RuntimeEntry {
            editor_id: format!("Entry{form_id:X}"),
            form_id,
            form_type_code: form_type as u8,
            tes_form_offset: Some(offset),
        }
    }

    #[test]
    fn weapon_struct_roundtrip() {
        use offsets::weapon::*;
        let mut fx = Fixture::new(0x1000);
        fx.put_form(0, FormType::Weapon, 0xA11);
        fx.put_u32(VALUE, 150);
        fx.put_u32(HEALTH, 200);
        fx.put_f32(WEIGHT, 5.5);
        fx.put_u16(DAMAGE, 24);
        fx.file[CLIP_ROUNDS] = 12;
        fx.put_f32(FIRE_RATE, 2.5);
        // FULL name string: ptr at 0x400, length 9.
        fx.put_u32(FULL_NAME, BASE_VA + 0x400);
        fx.put_u16(FULL_NAME + 4, 9);
        fx.put_str(0x400, "10mm SMG\0");
        // Projectile pointer to a form at 0x500.
        fx.put_form(0x500, FormType::Projectile, 0x600);
        fx.put_u32(PROJECTILE, BASE_VA + 0x500);

        let reader = fx.reader();
        let weapon = reader.read_weapon(&entry(0xA11, FormType::Weapon, 0)).unwrap();
        assert_eq!(weapon.value, 150);
        assert_eq!(weapon.health, 200);
        assert_eq!(weapon.weight, 5.5);
        assert_eq!(weapon.damage, 24);
        assert_eq!(weapon.clip_rounds, 12);
        assert_eq!(weapon.fire_rate, 2.5);
        assert_eq!(weapon.header.full_name.as_deref(), Some("10mm SMG"));
        assert_eq!(weapon.projectile, Some(0x600));
        assert!(weapon.header.big_endian);
    }

    #[test]
    fn identity_checks_reject_bad_structs() {
        let mut fx = Fixture::new(0x1000);
        fx.put_form(0, FormType::Weapon, 0xA11);
        let reader = fx.reader();

        // Wrong index type code.
        assert!(reader.read_weapon(&entry(0xA11, FormType::Armor, 0)).is_none());
        // Form ID mismatch between index and struct.
        assert!(reader.read_weapon(&entry(0xBEE, FormType::Weapon, 0)).is_none());
        // Window past end of file.
        assert!(reader.read_weapon(&entry(0xA11, FormType::Weapon, 0x1000 - 8)).is_none());
        // Entry with no struct offset.
        let mut no_offset = entry(0xA11, FormType::Weapon, 0);
        no_offset.tes_form_offset = None;
        assert!(reader.read_weapon(&no_offset).is_none());
    }

    #[test]
    fn invalid_numeric_fields_become_absent() {
        use offsets::weapon::*;
        let mut fx = Fixture::new(0x1000);
        fx.put_form(0, FormType::Weapon, 0xA11);
        fx.put_f32(WEIGHT, f32::NAN);
        fx.put_f32(FIRE_RATE, 1e30);
        fx.put_u32(VALUE, 150);

        let weapon = fx.reader().read_weapon(&entry(0xA11, FormType::Weapon, 0)).unwrap();
        assert_eq!(weapon.weight, 0.0);
        assert_eq!(weapon.fire_rate, 0.0);
        assert_eq!(weapon.value, 150);
    }

    #[test]
    fn string_validation() {
        use offsets::ammo::*;
        let mut fx = Fixture::new(0x1000);
        fx.put_form(0, FormType::Ammo, 0x77);
        // Garbage bytes behind the name pointer.
        fx.put_u32(FULL_NAME, BASE_VA + 0x400);
        fx.put_u16(FULL_NAME + 4, 8);
        fx.file[0x400..0x408].copy_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        // Unmapped pointer for the short name.
        fx.put_u32(SHORT_NAME, 0x7000_0000);
        fx.put_u16(SHORT_NAME + 4, 4);

        let ammo = fx.reader().read_ammo(&entry(0x77, FormType::Ammo, 0)).unwrap();
        assert_eq!(ammo.header.full_name, None);
        assert_eq!(ammo.short_name, None);
    }

    #[test]
    fn inventory_walk_guards_cycles() {
        use offsets::actor::*;
        let mut fx = Fixture::new(0x2000);
        fx.put_form(0, FormType::Npc, 0x55);
        // Two nodes; the second points back at the first.
        let node1 = 0x800;
        let node2 = 0x900;
        fx.put_u32(node1, 3); // count
        fx.put_form(0xA00, FormType::MiscItem, 0xAB1);
        fx.put_u32(node1 + 4, BASE_VA + 0xA00);
        fx.put_u32(node1 + 8, BASE_VA + node2 as u32);
        fx.put_u32(node2, 1);
        fx.put_form(0xB00, FormType::MiscItem, 0xAB2);
        fx.put_u32(node2 + 4, BASE_VA + 0xB00);
        fx.put_u32(node2 + 8, BASE_VA + node1 as u32); // cycle
        fx.put_u32(INVENTORY_HEAD, BASE_VA + node1 as u32);

        let actor = fx
            .reader()
            .read_actor(&entry(0x55, FormType::Npc, 0), ActorKind::Npc)
            .unwrap();
        assert_eq!(actor.inventory.len(), 2);
        assert_eq!(actor.inventory[0], InventoryEntry { item: 0xAB1, count: 3 });
        assert_eq!(actor.inventory[1], InventoryEntry { item: 0xAB2, count: 1 });
    }

    #[test]
    fn topic_quest_info_groups() {
        use offsets::topic::*;
        let mut fx = Fixture::new(0x2000);
        fx.put_form(0, FormType::DialogTopic, 0x30);
        // One group node: quest form at 0x600, info list at 0x700.
        fx.put_form(0x500, FormType::Quest, 0xA);
        let group = 0x640;
        fx.put_u32(group, BASE_VA + 0x500);
        fx.put_u32(group + 4, BASE_VA + 0x700);
        fx.put_u32(group + 8, 0);
        // Info list: two nodes pointing at info structs.
        fx.put_form(0x800, FormType::DialogInfo, 0x100);
        fx.put_form(0x8C0, FormType::DialogInfo, 0x101);
        fx.put_u32(0x700, BASE_VA + 0x800);
        fx.put_u32(0x704, BASE_VA + 0x740);
        fx.put_u32(0x740, BASE_VA + 0x8C0);
        fx.put_u32(0x744, 0);
        fx.put_u32(QUEST_INFO_HEAD, BASE_VA + group as u32);

        let reader = fx.reader();
        let groups = reader.topic_quest_infos(&entry(0x30, FormType::DialogTopic, 0));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, 0xA);
        assert_eq!(groups[0].1, vec![BASE_VA + 0x800, BASE_VA + 0x8C0]);

        let info = reader.read_info_at(BASE_VA + 0x8C0).unwrap();
        assert_eq!(info.header.form_id, 0x101);
    }

    #[test]
    fn script_struct_reads_bytecode_and_vars() {
        use offsets::script::*;
        let mut fx = Fixture::new(0x2000);
        fx.put_form(0, FormType::Script, 0xC0DE);
        fx.put_u16(TYPE, 1);
        fx.put_u32(VAR_COUNT, 1);
        fx.put_u32(COMPILED_SIZE, 4);
        fx.put_u32(BYTECODE, BASE_VA + 0x600);
        fx.file[0x600..0x604].copy_from_slice(&[0x00, 0x1D, 0x00, 0x10]);
        // Source text.
        fx.put_u32(SOURCE_TEXT, BASE_VA + 0x700);
        fx.put_u16(SOURCE_TEXT + 4, 12);
        fx.put_str(0x700, "scn MyScript");
        // One variable node.
        let node = 0x900;
        fx.put_u32(node, 1);
        fx.put_u32(node + 4, BASE_VA + 0xA00);
        fx.put_u16(node + 8, 6);
        fx.put_str(0xA00, "iStage");
        fx.put_u32(node + 0xC, 0);
        fx.put_u32(VAR_HEAD, BASE_VA + node as u32);
        // Owner quest.
        fx.put_form(0xB00, FormType::Quest, 0xB);
        fx.put_u32(OWNER_QUEST, BASE_VA + 0xB00);

        let script = fx.reader().read_script(&entry(0xC0DE, FormType::Script, 0)).unwrap();
        assert_eq!(script.bytecode, vec![0x00, 0x1D, 0x00, 0x10]);
        assert!(script.bytecode_big_endian);
        assert_eq!(script.source.as_deref(), Some("scn MyScript"));
        assert_eq!(script.variables.len(), 1);
        assert_eq!(script.variables[0].name, "iStage");
        assert_eq!(script.owner_quest, Some(0xB));
    }
}
