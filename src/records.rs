//! Typed reconstructed records and the catalog aggregate.
//!
//! Every entity the engine can recover has its own data struct here.
//! Records are built once during reconstruction and are immutable from
//! the consumer's viewpoint; cross-references are plain form IDs that
//! may or may not resolve to another catalog entry.

use std::collections::{HashMap, HashSet};

use bitflags::bitflags;

use crate::subrecord::Tag;

/// 32-bit stable record identity.
pub type FormId = u32;

/// "None" sentinel.
pub const FORM_ID_NONE: FormId = 0;
/// "Invalid" sentinel.
pub const FORM_ID_INVALID: FormId = 0xFFFF_FFFF;

/// Engine form ID for the player actor base.
pub const PLAYER_FORM_ID: FormId = 0x14;
/// Engine form ID for the placed player reference.
pub const PLAYER_REF_FORM_ID: FormId = 0x7;

/// Map a raw form reference to an optional one: zero and the invalid
/// sentinel both mean "no reference".
#[inline]
#[must_use]
pub fn form_ref(raw: u32) -> Option<FormId> {
    match raw {
        FORM_ID_NONE | FORM_ID_INVALID => None,
        id => Some(id),
    }
}

/// Fields shared by every reconstructed record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordHeader {
    pub form_id: FormId,
    pub editor_id: Option<String>,
    pub full_name: Option<String>,
    /// Byte offset of the source data in the scanned file.
    pub offset: u64,
    /// True when the source encoding was big-endian (dump/console).
    pub big_endian: bool,
}

impl RecordHeader {
    #[must_use]
    pub fn new(form_id: FormId, offset: u64, big_endian: bool) -> Self {
        Self { form_id, editor_id: None, full_name: None, offset, big_endian }
    }
}

/// `OBND` object bounds, two opposite corners in object space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectBounds {
    pub x1: i16,
    pub y1: i16,
    pub z1: i16,
    pub x2: i16,
    pub y2: i16,
    pub z2: i16,
}

/// One inventory line: a base object and a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryEntry {
    pub item: FormId,
    pub count: i32,
}

/// Faction membership with rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactionMembership {
    pub faction: FormId,
    pub rank: i8,
}

/// One magic effect application inside a spell, enchantment or
/// consumable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectEntry {
    pub effect: FormId,
    pub magnitude: u32,
    pub area: u32,
    pub duration: u32,
    pub range: u32,
    pub actor_value: i32,
}

/// One spoken line of a dialogue info.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueResponse {
    pub text: String,
    pub emotion_type: u32,
    pub emotion_value: i32,
    pub response_number: u8,
}

/// One quest stage with its log text.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestStage {
    pub index: i32,
    pub log_entry: String,
}

/// One quest objective.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestObjective {
    pub index: i32,
    pub text: String,
}

/// Map-marker metadata carried by a placed reference.
#[derive(Debug, Clone, PartialEq)]
pub struct MapMarkerInfo {
    pub name: String,
    pub marker_type: u8,
    pub reputation: Option<FormId>,
}

bitflags! {
    /// Defined low 16 bits of the package general-flags word. The raw
    /// 32-bit value is preserved separately; the upper half has no known
    /// meaning.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PackageFlags: u16 {
        const OFFERS_SERVICES = 0x0001;
        const MUST_REACH_LOCATION = 0x0002;
        const MUST_COMPLETE = 0x0004;
        const LOCK_DOORS_AT_START = 0x0008;
        const LOCK_DOORS_AT_END = 0x0010;
        const LOCK_DOORS_AT_LOCATION = 0x0020;
        const UNLOCK_DOORS_AT_START = 0x0040;
        const UNLOCK_DOORS_AT_END = 0x0080;
        const UNLOCK_DOORS_AT_LOCATION = 0x0100;
        const CONTINUE_IF_PC_NEAR = 0x0200;
        const ONCE_PER_DAY = 0x0400;
        const SKIP_FALLOUT_BEHAVIOR = 0x1000;
        const ALWAYS_RUN = 0x2000;

        const _ = !0;
    }
}

bitflags! {
    /// `LVLF` leveled-list flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LeveledFlags: u8 {
        const ALL_LEVELS = 0x01;
        const EACH_ITEM = 0x02;
        const USE_ALL = 0x04;

        const _ = !0;
    }
}

/// Package schedule (`PSDT`); `-1` components mean "any".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageSchedule {
    pub month: i8,
    pub day_of_week: i8,
    pub date: u8,
    pub time: u8,
    pub duration_hours: i32,
}

impl Default for PackageSchedule {
    fn default() -> Self {
        Self { month: -1, day_of_week: -1, date: 0, time: 0, duration_hours: 0 }
    }
}

impl PackageSchedule {
    /// Human-readable schedule line, e.g.
    /// `"Every day, 8:00 AM for 8 hours"`.
    #[must_use]
    pub fn summary(&self) -> String {
        const DAYS: [&str; 7] =
            ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"];
        let day = match self.day_of_week {
            -1 => "Every day".to_string(),
            d @ 0..=6 => DAYS[d as usize].to_string(),
            d => format!("Day {d}"),
        };
        let (hour12, meridiem) = match self.time {
            0 => (12, "AM"),
            h @ 1..=11 => (h, "AM"),
            12 => (12, "PM"),
            h => (h - 12, "PM"),
        };
        let mut out = format!("{day}, {hour12}:00 {meridiem}");
        if self.duration_hours > 0 {
            out.push_str(&format!(" for {} hours", self.duration_hours));
        }
        out
    }
}

/// Package general data (`PKDT`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackageData {
    /// Full raw flag word; defined bits are exposed via [`PackageData::flags`].
    pub general_flags: u32,
    pub package_type: u8,
    pub fallout_behavior_flags: u16,
    pub type_specific_flags: u16,
}

impl PackageData {
    #[must_use]
    pub fn flags(&self) -> PackageFlags {
        PackageFlags::from_bits_retain(self.general_flags as u16)
    }

    /// Display name of the package-type code.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self.package_type {
            0 => "Find",
            1 => "Follow",
            2 => "Escort",
            3 => "Eat",
            4 => "Sleep",
            5 => "Wander",
            6 => "Travel",
            7 => "Accompany",
            8 => "UseItemAt",
            9 => "Ambush",
            10 => "FleeNotCombat",
            12 => "Sandbox",
            13 => "Patrol",
            14 => "Guard",
            15 => "Dialogue",
            16 => "UseWeapon",
            _ => "Unknown",
        }
    }
}

/// Package target (`PTDT`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackageTarget {
    /// 0 = specific reference, 1 = object id, 2 = object type.
    pub target_type: u8,
    pub target: u32,
    pub count_or_distance: i32,
    pub acquire_radius: f32,
}

/// One leveled-list entry (`LVLO`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeveledEntry {
    pub level: u16,
    pub form_id: FormId,
    pub count: u16,
}

/// Local variable declared by a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptVariable {
    pub index: u32,
    pub name: String,
    pub is_ref: bool,
}

/// External object referenced by compiled script code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptReference {
    /// Referenced form, or `None` for a variable-slot reference.
    pub form_id: Option<FormId>,
    /// Local-variable slot for `SCRV` references.
    pub variable: Option<u32>,
}

/// Terminal menu line.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalMenuItem {
    pub text: String,
    pub display_note: Option<FormId>,
    pub sub_menu: Option<FormId>,
}

/// Faction rank title pair.
#[derive(Debug, Clone, PartialEq)]
pub struct FactionRank {
    pub number: i32,
    pub male_title: String,
    pub female_title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    Npc,
    Creature,
}

/// NPC or creature base record.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorRecord {
    pub header: RecordHeader,
    pub kind: ActorKind,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub flags: u32,
    pub fatigue: u16,
    pub barter_gold: u16,
    pub level: i16,
    pub calc_min: u16,
    pub calc_max: u16,
    pub speed_multiplier: u16,
    pub karma: f32,
    pub disposition_base: i16,
    pub template_flags: u16,
    pub race: Option<FormId>,
    pub class: Option<FormId>,
    pub script: Option<FormId>,
    pub template: Option<FormId>,
    pub voice: Option<FormId>,
    pub death_item: Option<FormId>,
    pub inventory: Vec<InventoryEntry>,
    pub factions: Vec<FactionMembership>,
    pub packages: Vec<FormId>,
    pub spells: Vec<FormId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeaponRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub icon: Option<String>,
    pub script: Option<FormId>,
    pub value: i32,
    pub health: i32,
    pub weight: f32,
    pub damage: i16,
    pub clip_rounds: u8,
    pub anim_type: u32,
    pub anim_mult: f32,
    pub reach: f32,
    pub min_spread: f32,
    pub spread: f32,
    pub sight_fov: f32,
    pub projectile: Option<FormId>,
    pub min_range: f32,
    pub max_range: f32,
    pub fire_rate: f32,
    pub ammo: Option<FormId>,
    pub enchantment: Option<FormId>,
    pub sound_gunshot: Option<FormId>,
    pub weapon_mods: Vec<FormId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArmorRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub icon: Option<String>,
    pub script: Option<FormId>,
    pub value: i32,
    pub max_condition: i32,
    pub weight: f32,
    pub damage_threshold: f32,
    pub biped_flags: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmmoRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub icon: Option<String>,
    pub script: Option<FormId>,
    pub short_name: Option<String>,
    pub speed: f32,
    pub flags: u8,
    pub value: u32,
    pub clip_rounds: u8,
    pub projectile: Option<FormId>,
    pub projectiles_per_shot: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumableRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub icon: Option<String>,
    pub script: Option<FormId>,
    pub value: i32,
    pub weight: f32,
    pub flags: u8,
    pub withdrawal_effect: Option<FormId>,
    pub addiction_chance: f32,
    pub use_sound: Option<FormId>,
    pub effects: Vec<EffectEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MiscItemRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub icon: Option<String>,
    pub script: Option<FormId>,
    pub value: i32,
    pub weight: f32,
    pub pickup_sound: Option<FormId>,
    pub drop_sound: Option<FormId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub icon: Option<String>,
    pub script: Option<FormId>,
    pub value: i32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub script: Option<FormId>,
    pub flags: u8,
    pub weight: f32,
    pub open_sound: Option<FormId>,
    pub close_sound: Option<FormId>,
    pub items: Vec<InventoryEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactionRecord {
    pub header: RecordHeader,
    pub flags: u32,
    pub reputation: Option<FormId>,
    pub relations: Vec<(FormId, i32)>,
    pub ranks: Vec<FactionRank>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaceRecord {
    pub header: RecordHeader,
    pub description: Option<String>,
    pub flags: u32,
    pub male_height: f32,
    pub female_height: f32,
    pub male_weight: f32,
    pub female_weight: f32,
    pub younger: Option<FormId>,
    pub older: Option<FormId>,
    pub relations: Vec<(FormId, i32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestRecord {
    pub header: RecordHeader,
    pub script: Option<FormId>,
    pub flags: u8,
    pub priority: u8,
    pub quest_delay: f32,
    pub stages: Vec<QuestStage>,
    pub objectives: Vec<QuestObjective>,
    /// True when the record was materialized from dialogue references
    /// rather than a scanned `QUST` record.
    pub synthesized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogTopicRecord {
    pub header: RecordHeader,
    pub topic_type: u8,
    pub priority: f32,
    pub speaker: Option<FormId>,
    pub quests: Vec<FormId>,
    pub infos: Vec<FormId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogInfoRecord {
    pub header: RecordHeader,
    pub quest: Option<FormId>,
    pub topic: Option<FormId>,
    pub speaker: Option<FormId>,
    pub previous_info: Option<FormId>,
    pub difficulty: u8,
    pub responses: Vec<DialogueResponse>,
    pub link_to: Vec<FormId>,
    pub link_from: Vec<FormId>,
    pub add_topics: Vec<FormId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub note_type: u8,
    pub text: Option<String>,
    pub sound: Option<FormId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub icon: Option<String>,
    pub script: Option<FormId>,
    pub text: Option<String>,
    pub flags: u8,
    pub teaches_skill: i8,
    pub value: i32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub script: Option<FormId>,
    pub description: Option<String>,
    pub password: Option<FormId>,
    pub hacking_difficulty: u8,
    pub flags: u8,
    pub server_type: u8,
    pub items: Vec<TerminalMenuItem>,
}

/// Compiled script with everything needed for decompilation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRecord {
    pub header: RecordHeader,
    pub script_type: u16,
    pub variable_count: u32,
    pub ref_count: u32,
    pub compiled_size: u32,
    pub flags: u16,
    pub bytecode: Vec<u8>,
    /// Endianness of `bytecode`, by provenance: dump structs carry
    /// big-endian code, ESM subrecords little-endian.
    pub bytecode_big_endian: bool,
    pub source: Option<String>,
    pub variables: Vec<ScriptVariable>,
    pub references: Vec<ScriptReference>,
    /// Owning quest, when the script is a quest script.
    pub owner_quest: Option<FormId>,
    pub decompiled: Option<String>,
    pub cross_script_hits: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerkRecord {
    pub header: RecordHeader,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub trait_flag: u8,
    pub min_level: u8,
    pub num_ranks: u8,
    pub playable: u8,
    pub hidden: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpellRecord {
    pub header: RecordHeader,
    pub spell_type: u32,
    pub cost: u32,
    pub level: u32,
    pub flags: u8,
    pub effects: Vec<EffectEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnchantmentRecord {
    pub header: RecordHeader,
    pub enchantment_type: u32,
    pub charge: u32,
    pub cost: u32,
    pub flags: u8,
    pub effects: Vec<EffectEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaseEffectRecord {
    pub header: RecordHeader,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub flags: u32,
    pub base_cost: f32,
    pub associated_item: Option<FormId>,
    pub resist_value: i32,
    pub light: Option<FormId>,
    pub projectile_speed: f32,
    pub archetype: u32,
    pub actor_value: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub flags: u16,
    pub projectile_type: u16,
    pub gravity: f32,
    pub speed: f32,
    pub range: f32,
    pub light: Option<FormId>,
    pub tracer_chance: f32,
    pub timer: f32,
    pub explosion: Option<FormId>,
    pub sound: Option<FormId>,
    pub fade_duration: f32,
    pub impact_force: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplosionRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub force: f32,
    pub damage: f32,
    pub radius: f32,
    pub light: Option<FormId>,
    pub sound: Option<FormId>,
    pub flags: u32,
    pub is_radius: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub header: RecordHeader,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub flags: u32,
    pub display_time: u32,
    pub buttons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassRecord {
    pub header: RecordHeader,
    pub description: Option<String>,
    pub tag_skills: [i32; 4],
    pub flags: u32,
    pub services: u32,
}

/// `GLOB` global variable.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalRecord {
    pub header: RecordHeader,
    /// `'s'`, `'l'` or `'f'` from `FNAM`.
    pub value_type: char,
    pub value: f32,
}

/// Typed `GMST` value, discriminated by the editor-ID prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum GameSettingValue {
    Int(i32),
    Float(f32),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameSettingRecord {
    pub header: RecordHeader,
    pub value: GameSettingValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeaponModRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub value: i32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeRecord {
    pub header: RecordHeader,
    pub skill: i32,
    pub level: i32,
    pub category: Option<FormId>,
    pub sub_category: Option<FormId>,
    pub inputs: Vec<InventoryEntry>,
    pub outputs: Vec<InventoryEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeRecord {
    pub header: RecordHeader,
    pub description: Option<String>,
    pub challenge_type: u32,
    pub threshold: u32,
    pub flags: u32,
    pub interval: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReputationRecord {
    pub header: RecordHeader,
    pub icon: Option<String>,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormListRecord {
    pub header: RecordHeader,
    pub entries: Vec<FormId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivatorRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub script: Option<FormId>,
    pub looping_sound: Option<FormId>,
    pub activation_sound: Option<FormId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub icon: Option<String>,
    pub script: Option<FormId>,
    pub time: i32,
    pub radius: u32,
    pub flags: u32,
    pub falloff: f32,
    pub fov: f32,
    pub value: u32,
    pub weight: f32,
    pub fade: f32,
    pub sound: Option<FormId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoorRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub script: Option<FormId>,
    pub open_sound: Option<FormId>,
    pub close_sound: Option<FormId>,
    pub loop_sound: Option<FormId>,
    pub flags: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FurnitureRecord {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub script: Option<FormId>,
    pub marker_flags: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageRecord {
    pub header: RecordHeader,
    pub data: PackageData,
    pub schedule: PackageSchedule,
    pub target: Option<PackageTarget>,
    pub repeatable: bool,
    pub linked_reference: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellRecord {
    pub header: RecordHeader,
    pub flags: u8,
    pub grid: Option<(i32, i32)>,
    pub worldspace: Option<FormId>,
    pub water_height: f32,
    pub references: Vec<FormId>,
    /// True when the cell was materialized to hold orphaned references.
    pub synthesized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldspaceRecord {
    pub header: RecordHeader,
    pub parent: Option<FormId>,
    pub climate: Option<FormId>,
    pub water: Option<FormId>,
    pub cells: Vec<FormId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedRefRecord {
    pub header: RecordHeader,
    pub base: FormId,
    pub base_tag: Option<Tag>,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: f32,
    pub owner: Option<FormId>,
    pub cell: Option<FormId>,
    /// Bounds and model copied from the base record during enrichment.
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub marker: Option<MapMarkerInfo>,
    /// Representative spawn resolved through a leveled base.
    pub leveled_spawn: Option<FormId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeveledListRecord {
    pub header: RecordHeader,
    /// `LVLI`, `LVLN` or `LVLC`.
    pub kind: Tag,
    pub chance_none: u8,
    pub flags: LeveledFlags,
    pub global: Option<FormId>,
    pub entries: Vec<LeveledEntry>,
}

/// Holder for types the engine recognizes structurally but has no
/// dedicated reconstructor for.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownRecord {
    pub header: RecordHeader,
    pub tag: Tag,
}

macro_rules! catalog_lists {
    ($(($field:ident, $push:ident, $ty:ty, $kind:expr)),+ $(,)?) => {
        /// The reconstructed aggregate: one list per record kind plus the
        /// shared lookup maps and coverage counts.
        #[derive(Debug, Clone, Default)]
        pub struct Catalog {
            $(pub $field: Vec<$ty>,)+
            /// FormID → editor ID.
            pub editor_ids: HashMap<FormId, String>,
            /// FormID → display name.
            pub display_names: HashMap<FormId, String>,
            /// Record-type tag → reconstructed count.
            pub recognized: HashMap<Tag, usize>,
            /// Record-type tag → count of records seen but not reconstructed.
            pub unrecognized: HashMap<Tag, usize>,
            seen: HashSet<(u8, FormId)>,
        }

        impl Catalog {
            $(
                /// Insert unless this kind already holds the form ID.
                /// Returns `true` when the record was added.
                pub fn $push(&mut self, record: $ty) -> bool {
                    if !self.seen.insert(($kind, record.header.form_id)) {
                        return false;
                    }
                    self.$field.push(record);
                    true
                }
            )+
        }
    };
}

catalog_lists! {
    (actors, push_actor, ActorRecord, 0),
    (weapons, push_weapon, WeaponRecord, 1),
    (armor, push_armor, ArmorRecord, 2),
    (ammo, push_ammo, AmmoRecord, 3),
    (consumables, push_consumable, ConsumableRecord, 4),
    (misc_items, push_misc_item, MiscItemRecord, 5),
    (keys, push_key, KeyRecord, 6),
    (containers, push_container, ContainerRecord, 7),
    (factions, push_faction, FactionRecord, 8),
    (races, push_race, RaceRecord, 9),
    (quests, push_quest, QuestRecord, 10),
    (dialog_topics, push_dialog_topic, DialogTopicRecord, 11),
    (dialog_infos, push_dialog_info, DialogInfoRecord, 12),
    (notes, push_note, NoteRecord, 13),
    (books, push_book, BookRecord, 14),
    (terminals, push_terminal, TerminalRecord, 15),
    (scripts, push_script, ScriptRecord, 16),
    (perks, push_perk, PerkRecord, 17),
    (spells, push_spell, SpellRecord, 18),
    (enchantments, push_enchantment, EnchantmentRecord, 19),
    (base_effects, push_base_effect, BaseEffectRecord, 20),
    (projectiles, push_projectile, ProjectileRecord, 21),
    (explosions, push_explosion, ExplosionRecord, 22),
    (messages, push_message, MessageRecord, 23),
    (classes, push_class, ClassRecord, 24),
    (globals, push_global, GlobalRecord, 25),
    (game_settings, push_game_setting, GameSettingRecord, 26),
    (weapon_mods, push_weapon_mod, WeaponModRecord, 27),
    (recipes, push_recipe, RecipeRecord, 28),
    (challenges, push_challenge, ChallengeRecord, 29),
    (reputations, push_reputation, ReputationRecord, 30),
    (form_lists, push_form_list, FormListRecord, 31),
    (activators, push_activator, ActivatorRecord, 32),
    (lights, push_light, LightRecord, 33),
    (doors, push_door, DoorRecord, 34),
    (statics, push_static, StaticRecord, 35),
    (furniture, push_furniture, FurnitureRecord, 36),
    (packages, push_package, PackageRecord, 37),
    (cells, push_cell, CellRecord, 38),
    (worldspaces, push_worldspace, WorldspaceRecord, 39),
    (placed_refs, push_placed_ref, PlacedRefRecord, 40),
    (leveled_lists, push_leveled_list, LeveledListRecord, 41),
    (unknown, push_unknown, UnknownRecord, 42),
}

impl Catalog {
    /// Total number of reconstructed records across every kind.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.seen.len()
    }

    /// True when this kind already carries the form ID.
    #[must_use]
    pub fn contains(&self, kind_code: u8, form_id: FormId) -> bool {
        self.seen.contains(&(kind_code, form_id))
    }

    #[must_use]
    pub fn quest_by_id(&self, form_id: FormId) -> Option<&QuestRecord> {
        self.quests.iter().find(|q| q.header.form_id == form_id)
    }

    #[must_use]
    pub fn topic_by_id(&self, form_id: FormId) -> Option<&DialogTopicRecord> {
        self.dialog_topics.iter().find(|t| t.header.form_id == form_id)
    }

    #[must_use]
    pub fn info_by_id_mut(&mut self, form_id: FormId) -> Option<&mut DialogInfoRecord> {
        self.dialog_infos.iter_mut().find(|i| i.header.form_id == form_id)
    }
}
