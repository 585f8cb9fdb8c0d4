//! Per-record-type reconstructors for ESM-sourced records.
//!
//! Each function walks one record's subrecords and collects fields by
//! tag. Malformed or missing subrecords degrade to absent fields; no
//! parser here can fail a record outright. Editor IDs feed the identity
//! index as they are encountered, and non-empty display names feed the
//! FormID → name cache used to label cross-references later.

use crate::bytes::{self, Endian};
use crate::identity::{IdentityIndex, Source};
use crate::records::*;
use crate::scan::RecordHeaderInfo;
use crate::schema::fields::{self, FieldValue, normal_f32};
use crate::schema::tags;
use crate::subrecord::{Subrecord, SubrecordIter};

/// Mutable reconstruction state shared by every parser.
pub struct ParseContext<'a> {
    pub identity: &'a mut IdentityIndex,
}

/// Fields common to most record types, harvested in one pass.
#[derive(Debug, Default)]
pub struct SharedFields {
    pub header: RecordHeader,
    pub bounds: Option<ObjectBounds>,
    pub model: Option<String>,
    pub icon: Option<String>,
    pub script: Option<FormId>,
    pub description: Option<String>,
}

/// Payload string: Latin-1 up to the first NUL (or the whole payload
/// when the terminator is missing, which corrupt records do produce).
#[must_use]
pub fn sub_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    bytes::latin1(&data[..end])
}

/// Optional form reference at `offset`; unreadable or zero means none.
#[must_use]
pub fn sub_form(data: &[u8], offset: usize, endian: Endian) -> Option<FormId> {
    bytes::read_u32(data, offset, endian).ok().and_then(form_ref)
}

fn sub_bounds(data: &[u8], endian: Endian) -> Option<ObjectBounds> {
    Some(ObjectBounds {
        x1: bytes::read_i16(data, 0, endian).ok()?,
        y1: bytes::read_i16(data, 2, endian).ok()?,
        z1: bytes::read_i16(data, 4, endian).ok()?,
        x2: bytes::read_i16(data, 6, endian).ok()?,
        y2: bytes::read_i16(data, 8, endian).ok()?,
        z2: bytes::read_i16(data, 10, endian).ok()?,
    })
}

fn checked_f32(data: &[u8], offset: usize, endian: Endian) -> f32 {
    match bytes::read_f32(data, offset, endian) {
        Ok(v) if normal_f32(v) => v,
        _ => 0.0,
    }
}

/// Walk a record once, filling [`SharedFields`] from the common tags and
/// handing every other subrecord to `other`.
pub fn collect_shared(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
    mut other: impl FnMut(Subrecord, &[u8], Endian),
) -> SharedFields {
    let endian = info.endian();
    let mut shared = SharedFields {
        header: RecordHeader::new(info.form_id, info.offset, info.big_endian),
        ..SharedFields::default()
    };
    for sub in SubrecordIter::new(data, info.data_size as usize, endian) {
        let payload = sub.bytes(data);
        match sub.tag {
            tags::EDID => {
                let editor_id = sub_string(payload);
                ctx.identity.bind(info.form_id, editor_id.clone(), Source::EsmEdid);
                shared.header.editor_id = Some(editor_id);
            }
            tags::FULL => {
                let name = sub_string(payload);
                ctx.identity.set_display_name(info.form_id, &name);
                if !name.is_empty() {
                    shared.header.full_name = Some(name);
                }
            }
            tags::OBND => shared.bounds = sub_bounds(payload, endian),
            tags::MODL => shared.model = Some(sub_string(payload)),
            tags::ICON => shared.icon = Some(sub_string(payload)),
            tags::SCRI => shared.script = sub_form(payload, 0, endian),
            tags::DESC => shared.description = Some(sub_string(payload)),
            _ => other(sub, payload, endian),
        }
    }
    shared
}

/// Pairs `EFID` (effect base) with the `EFIT` parameters that follow it.
#[derive(Debug, Default)]
struct EffectCollector {
    effects: Vec<EffectEntry>,
    pending: Option<FormId>,
}

impl EffectCollector {
    fn on_efid(&mut self, payload: &[u8], endian: Endian) {
        self.flush();
        self.pending = sub_form(payload, 0, endian);
    }

    fn on_efit(&mut self, payload: &[u8], endian: Endian) {
        let Some(effect) = self.pending.take() else { return };
        self.effects.push(EffectEntry {
            effect,
            magnitude: bytes::read_u32(payload, 0, endian).unwrap_or(0),
            area: bytes::read_u32(payload, 4, endian).unwrap_or(0),
            duration: bytes::read_u32(payload, 8, endian).unwrap_or(0),
            range: bytes::read_u32(payload, 12, endian).unwrap_or(0),
            actor_value: bytes::read_i32(payload, 16, endian).unwrap_or(-1),
        });
    }

    fn flush(&mut self) {
        if let Some(effect) = self.pending.take() {
            // EFID with no trailing EFIT still names an effect.
            self.effects.push(EffectEntry {
                effect,
                magnitude: 0,
                area: 0,
                duration: 0,
                range: 0,
                actor_value: -1,
            });
        }
    }

    fn finish(mut self) -> Vec<EffectEntry> {
        self.flush();
        self.effects
    }
}

pub fn parse_actor(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
    kind: ActorKind,
) -> ActorRecord {
    let mut flags = 0;
    let mut fatigue = 0;
    let mut barter_gold = 0;
    let mut level = 0;
    let mut calc_min = 0;
    let mut calc_max = 0;
    let mut speed_multiplier = 100;
    let mut karma = 0.0;
    let mut disposition_base = 0;
    let mut template_flags = 0;
    let mut race = None;
    let mut class = None;
    let mut template = None;
    let mut voice = None;
    let mut death_item = None;
    let mut inventory = Vec::new();
    let mut factions = Vec::new();
    let mut packages = Vec::new();
    let mut spells = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::ACBS => {
            flags = bytes::read_u32(payload, 0, endian).unwrap_or(0);
            fatigue = bytes::read_u16(payload, 4, endian).unwrap_or(0);
            barter_gold = bytes::read_u16(payload, 6, endian).unwrap_or(0);
            level = bytes::read_i16(payload, 8, endian).unwrap_or(0);
            calc_min = bytes::read_u16(payload, 10, endian).unwrap_or(0);
            calc_max = bytes::read_u16(payload, 12, endian).unwrap_or(0);
            speed_multiplier = bytes::read_u16(payload, 14, endian).unwrap_or(100);
            karma = checked_f32(payload, 16, endian);
            disposition_base = bytes::read_i16(payload, 20, endian).unwrap_or(0);
            template_flags = bytes::read_u16(payload, 22, endian).unwrap_or(0);
        }
        tags::SNAM => {
            if let Some(faction) = sub_form(payload, 0, endian) {
                let rank = bytes::read_i8(payload, 4).unwrap_or(0);
                factions.push(FactionMembership { faction, rank });
            }
        }
        tags::CNTO => {
            if let Some(item) = sub_form(payload, 0, endian) {
                let count = bytes::read_i32(payload, 4, endian).unwrap_or(1);
                inventory.push(InventoryEntry { item, count });
            }
        }
        tags::RNAM => race = sub_form(payload, 0, endian),
        tags::CNAM => class = sub_form(payload, 0, endian),
        tags::INAM => death_item = sub_form(payload, 0, endian),
        tags::TPLT => template = sub_form(payload, 0, endian),
        tags::VTCK => voice = sub_form(payload, 0, endian),
        tags::PKID => packages.extend(sub_form(payload, 0, endian)),
        tags::SPLO => spells.extend(sub_form(payload, 0, endian)),
        _ => {}
    });

    ActorRecord {
        header: shared.header,
        kind,
        bounds: shared.bounds,
        model: shared.model,
        flags,
        fatigue,
        barter_gold,
        level,
        calc_min,
        calc_max,
        speed_multiplier,
        karma,
        disposition_base,
        template_flags,
        race,
        class,
        script: shared.script,
        template,
        voice,
        death_item,
        inventory,
        factions,
        packages,
        spells,
    }
}

pub fn parse_weapon(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> WeaponRecord {
    let mut stats = None;
    let mut detail = None;
    let mut ammo = None;
    let mut enchantment = None;
    let mut sound_gunshot = None;
    let mut weapon_mods = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => stats = Some(fields::decode_for(tags::DATA, tags::WEAP, payload, endian)),
        tags::DNAM => detail = Some(fields::decode_for(tags::DNAM, tags::WEAP, payload, endian)),
        tags::NAM0 => ammo = sub_form(payload, 0, endian),
        tags::EITM => enchantment = sub_form(payload, 0, endian),
        tags::SNAM => sound_gunshot = sub_form(payload, 0, endian),
        tags::WMI1 | tags::WMI2 | tags::WMI3 => {
            weapon_mods.extend(sub_form(payload, 0, endian));
        }
        _ => {}
    });

    let stats = stats.unwrap_or_else(fields::Decoded::empty);
    let detail = detail.unwrap_or_else(fields::Decoded::empty);
    WeaponRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        icon: shared.icon,
        script: shared.script,
        value: stats.i32("value"),
        health: stats.i32("health"),
        weight: stats.f32("weight"),
        damage: stats.i32("damage") as i16,
        clip_rounds: stats.u32("clip_rounds") as u8,
        anim_type: detail.u32("anim_type"),
        anim_mult: detail.f32("anim_mult"),
        reach: detail.f32("reach"),
        min_spread: detail.f32("min_spread"),
        spread: detail.f32("spread"),
        sight_fov: detail.f32("sight_fov"),
        projectile: detail.form("projectile"),
        min_range: detail.f32("min_range"),
        max_range: detail.f32("max_range"),
        fire_rate: detail.f32("fire_rate"),
        ammo,
        enchantment,
        sound_gunshot,
        weapon_mods,
    }
}

pub fn parse_armor(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> ArmorRecord {
    let mut stats = None;
    let mut damage_threshold = 0.0;
    let mut biped_flags = 0;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => stats = Some(fields::decode_for(tags::DATA, tags::ARMO, payload, endian)),
        tags::DNAM => damage_threshold = checked_f32(payload, 4, endian),
        tags::BMDT => biped_flags = bytes::read_u32(payload, 0, endian).unwrap_or(0),
        _ => {}
    });

    let stats = stats.unwrap_or_else(fields::Decoded::empty);
    ArmorRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        icon: shared.icon,
        script: shared.script,
        value: stats.i32("value"),
        max_condition: stats.i32("max_condition"),
        weight: stats.f32("weight"),
        damage_threshold,
        biped_flags,
    }
}

pub fn parse_ammo(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> AmmoRecord {
    let mut stats = None;
    let mut extra = None;
    let mut short_name = None;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => stats = Some(fields::decode_for(tags::DATA, tags::AMMO, payload, endian)),
        tags::DAT2 => extra = Some(fields::decode_for(tags::DAT2, tags::AMMO, payload, endian)),
        tags::ONAM => short_name = Some(sub_string(payload)),
        _ => {}
    });

    let stats = stats.unwrap_or_else(fields::Decoded::empty);
    let extra = extra.unwrap_or_else(fields::Decoded::empty);
    AmmoRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        icon: shared.icon,
        script: shared.script,
        short_name,
        speed: stats.f32("speed"),
        flags: stats.u32("flags") as u8,
        value: stats.u32("value"),
        clip_rounds: stats.u32("clip_rounds") as u8,
        projectile: extra.form("projectile"),
        projectiles_per_shot: match extra.get("projectiles_per_shot") {
            FieldValue::U32(v) => v,
            _ => 1,
        },
        weight: extra.f32("weight"),
    }
}

pub fn parse_consumable(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> ConsumableRecord {
    let mut stats = None;
    let mut weight = 0.0;
    let mut effects = EffectCollector::default();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::ENIT => stats = Some(fields::decode_for(tags::ENIT, tags::ALCH, payload, endian)),
        tags::DATA => weight = checked_f32(payload, 0, endian),
        tags::EFID => effects.on_efid(payload, endian),
        tags::EFIT => effects.on_efit(payload, endian),
        _ => {}
    });

    let stats = stats.unwrap_or_else(fields::Decoded::empty);
    ConsumableRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        icon: shared.icon,
        script: shared.script,
        value: stats.i32("value"),
        weight,
        flags: stats.u32("flags") as u8,
        withdrawal_effect: stats.form("withdrawal_effect"),
        addiction_chance: stats.f32("addiction_chance"),
        use_sound: stats.form("use_sound"),
        effects: effects.finish(),
    }
}

pub fn parse_misc_item(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> MiscItemRecord {
    let mut stats = None;
    let mut pickup_sound = None;
    let mut drop_sound = None;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => stats = Some(fields::decode_for(tags::DATA, tags::MISC, payload, endian)),
        tags::YNAM => pickup_sound = sub_form(payload, 0, endian),
        tags::ZNAM => drop_sound = sub_form(payload, 0, endian),
        _ => {}
    });

    let stats = stats.unwrap_or_else(fields::Decoded::empty);
    MiscItemRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        icon: shared.icon,
        script: shared.script,
        value: stats.i32("value"),
        weight: stats.f32("weight"),
        pickup_sound,
        drop_sound,
    }
}

pub fn parse_key(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> KeyRecord {
    let mut stats = None;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| {
        if sub.tag == tags::DATA {
            stats = Some(fields::decode_for(tags::DATA, tags::KEYM, payload, endian));
        }
    });

    let stats = stats.unwrap_or_else(fields::Decoded::empty);
    KeyRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        icon: shared.icon,
        script: shared.script,
        value: stats.i32("value"),
        weight: stats.f32("weight"),
    }
}

pub fn parse_container(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> ContainerRecord {
    let mut flags = 0;
    let mut weight = 0.0;
    let mut open_sound = None;
    let mut close_sound = None;
    let mut items = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => {
            flags = bytes::read_u8(payload, 0).unwrap_or(0);
            weight = checked_f32(payload, 1, endian);
        }
        tags::CNTO => {
            if let Some(item) = sub_form(payload, 0, endian) {
                let count = bytes::read_i32(payload, 4, endian).unwrap_or(1);
                items.push(InventoryEntry { item, count });
            }
        }
        tags::SNAM => open_sound = sub_form(payload, 0, endian),
        tags::QNAM => close_sound = sub_form(payload, 0, endian),
        _ => {}
    });

    ContainerRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        script: shared.script,
        flags,
        weight,
        open_sound,
        close_sound,
        items,
    }
}

pub fn parse_faction(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> FactionRecord {
    let mut flags = 0;
    let mut reputation = None;
    let mut relations = Vec::new();
    let mut ranks: Vec<FactionRank> = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => flags = bytes::read_u32(payload, 0, endian).unwrap_or(0),
        tags::XNAM => {
            if let Some(other) = sub_form(payload, 0, endian) {
                let modifier = bytes::read_i32(payload, 4, endian).unwrap_or(0);
                relations.push((other, modifier));
            }
        }
        tags::RNAM => {
            let number = bytes::read_i32(payload, 0, endian).unwrap_or(0);
            ranks.push(FactionRank { number, male_title: String::new(), female_title: String::new() });
        }
        tags::MNAM => {
            if let Some(rank) = ranks.last_mut() {
                rank.male_title = sub_string(payload);
            }
        }
        tags::FNAM => {
            if let Some(rank) = ranks.last_mut() {
                rank.female_title = sub_string(payload);
            }
        }
        tags::WMI1 => reputation = sub_form(payload, 0, endian),
        _ => {}
    });

    FactionRecord { header: shared.header, flags, reputation, relations, ranks }
}

pub fn parse_race(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> RaceRecord {
    let mut male_height = 0.0;
    let mut female_height = 0.0;
    let mut male_weight = 0.0;
    let mut female_weight = 0.0;
    let mut flags = 0;
    let mut younger = None;
    let mut older = None;
    let mut relations = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => {
            male_height = checked_f32(payload, 16, endian);
            female_height = checked_f32(payload, 20, endian);
            male_weight = checked_f32(payload, 24, endian);
            female_weight = checked_f32(payload, 28, endian);
            flags = bytes::read_u32(payload, 32, endian).unwrap_or(0);
        }
        tags::YNAM => younger = sub_form(payload, 0, endian),
        tags::ONAM => older = sub_form(payload, 0, endian),
        tags::XNAM => {
            if let Some(other) = sub_form(payload, 0, endian) {
                relations.push((other, bytes::read_i32(payload, 4, endian).unwrap_or(0)));
            }
        }
        _ => {}
    });

    RaceRecord {
        header: shared.header,
        description: shared.description,
        flags,
        male_height,
        female_height,
        male_weight,
        female_weight,
        younger,
        older,
        relations,
    }
}

pub fn parse_quest(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> QuestRecord {
    let mut flags = 0;
    let mut priority = 0;
    let mut quest_delay = 0.0;
    let mut stages: Vec<QuestStage> = Vec::new();
    let mut objectives: Vec<QuestObjective> = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => {
            flags = bytes::read_u8(payload, 0).unwrap_or(0);
            priority = bytes::read_u8(payload, 1).unwrap_or(0);
            quest_delay = checked_f32(payload, 4, endian);
        }
        tags::INDX => {
            let index = match payload.len() {
                0..=1 => i32::from(bytes::read_u8(payload, 0).unwrap_or(0)),
                2..=3 => i32::from(bytes::read_i16(payload, 0, endian).unwrap_or(0)),
                _ => bytes::read_i32(payload, 0, endian).unwrap_or(0),
            };
            stages.push(QuestStage { index, log_entry: String::new() });
        }
        tags::CNAM => {
            if let Some(stage) = stages.last_mut() {
                if stage.log_entry.is_empty() {
                    stage.log_entry = sub_string(payload);
                }
            }
        }
        tags::QOBJ => {
            let index = bytes::read_i32(payload, 0, endian).unwrap_or(0);
            objectives.push(QuestObjective { index, text: String::new() });
        }
        tags::NNAM => {
            if let Some(objective) = objectives.last_mut() {
                objective.text = sub_string(payload);
            }
        }
        _ => {}
    });

    QuestRecord {
        header: shared.header,
        script: shared.script,
        flags,
        priority,
        quest_delay,
        stages,
        objectives,
        synthesized: false,
    }
}

pub fn parse_dialog_topic(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> DialogTopicRecord {
    let mut topic_type = 0;
    let mut priority = 0.0;
    let mut speaker = None;
    let mut quests = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => topic_type = bytes::read_u8(payload, 0).unwrap_or(0),
        tags::PNAM => priority = checked_f32(payload, 0, endian),
        tags::TNAM => speaker = sub_form(payload, 0, endian),
        tags::QSTI => quests.extend(sub_form(payload, 0, endian)),
        _ => {}
    });

    DialogTopicRecord {
        header: shared.header,
        topic_type,
        priority,
        speaker,
        quests,
        infos: Vec::new(),
    }
}

/// Response assembly inside one `INFO` record.
///
/// `NAM1` opens a response (emitting any previous one); `TRDT` attaches
/// emotion metadata to the open response; end of record emits the last.
/// Missing or out-of-order `TRDT` leaves the emotion fields zero.
#[derive(Debug, Default)]
struct ResponseAssembler {
    responses: Vec<DialogueResponse>,
    current: Option<DialogueResponse>,
}

impl ResponseAssembler {
    fn on_nam1(&mut self, payload: &[u8]) {
        if let Some(done) = self.current.take() {
            self.responses.push(done);
        }
        self.current = Some(DialogueResponse {
            text: sub_string(payload),
            emotion_type: 0,
            emotion_value: 0,
            response_number: 0,
        });
    }

    fn on_trdt(&mut self, payload: &[u8], endian: Endian) {
        if let Some(current) = &mut self.current {
            current.emotion_type = bytes::read_u32(payload, 0, endian).unwrap_or(0);
            current.emotion_value = bytes::read_i32(payload, 4, endian).unwrap_or(0);
            current.response_number = bytes::read_u8(payload, 12).unwrap_or(0);
        }
    }

    fn finish(mut self) -> Vec<DialogueResponse> {
        if let Some(done) = self.current.take() {
            self.responses.push(done);
        }
        self.responses
    }
}

pub fn parse_dialog_info(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> DialogInfoRecord {
    let mut quest = None;
    let mut topic = None;
    let mut speaker = None;
    let mut previous_info = None;
    let mut difficulty = 0;
    let mut responses = ResponseAssembler::default();
    let mut link_to = Vec::new();
    let mut link_from = Vec::new();
    let mut add_topics = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => difficulty = bytes::read_u8(payload, 3).unwrap_or(0),
        tags::QSTI => quest = quest.or_else(|| sub_form(payload, 0, endian)),
        tags::TPIC => topic = sub_form(payload, 0, endian),
        tags::ANAM => speaker = sub_form(payload, 0, endian),
        tags::PNAM => previous_info = sub_form(payload, 0, endian),
        tags::NAM1 => responses.on_nam1(payload),
        tags::TRDT => responses.on_trdt(payload, endian),
        tags::TCLT => link_to.extend(sub_form(payload, 0, endian)),
        tags::TCLF => link_from.extend(sub_form(payload, 0, endian)),
        tags::NAME => add_topics.extend(sub_form(payload, 0, endian)),
        _ => {}
    });

    DialogInfoRecord {
        header: shared.header,
        quest,
        topic,
        speaker,
        previous_info,
        difficulty,
        responses: responses.finish(),
        link_to,
        link_from,
        add_topics,
    }
}

pub fn parse_note(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> NoteRecord {
    let mut note_type = 0;
    let mut text = None;
    let mut sound = None;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => note_type = bytes::read_u8(payload, 0).unwrap_or(0),
        tags::TNAM => text = Some(sub_string(payload)),
        tags::SNAM => sound = sub_form(payload, 0, endian),
        _ => {}
    });

    NoteRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        note_type,
        text,
        sound,
    }
}

pub fn parse_book(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> BookRecord {
    let mut stats = None;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| {
        if sub.tag == tags::DATA {
            stats = Some(fields::decode_for(tags::DATA, tags::BOOK, payload, endian));
        }
    });

    let stats = stats.unwrap_or_else(fields::Decoded::empty);
    BookRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        icon: shared.icon,
        script: shared.script,
        text: shared.description,
        flags: stats.u32("flags") as u8,
        teaches_skill: stats.i32("teaches_skill") as i8,
        value: stats.i32("value"),
        weight: stats.f32("weight"),
    }
}

pub fn parse_terminal(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> TerminalRecord {
    let mut stats = None;
    let mut password = None;
    let mut items: Vec<TerminalMenuItem> = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DNAM => stats = Some(fields::decode_for(tags::DNAM, tags::TERM, payload, endian)),
        tags::PNAM => password = sub_form(payload, 0, endian),
        tags::ITXT => {
            items.push(TerminalMenuItem {
                text: sub_string(payload),
                display_note: None,
                sub_menu: None,
            });
        }
        tags::INAM => {
            if let Some(item) = items.last_mut() {
                item.display_note = sub_form(payload, 0, endian);
            }
        }
        tags::TNAM => {
            if let Some(item) = items.last_mut() {
                item.sub_menu = sub_form(payload, 0, endian);
            }
        }
        _ => {}
    });

    let stats = stats.unwrap_or_else(fields::Decoded::empty);
    TerminalRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        script: shared.script,
        description: shared.description,
        password,
        hacking_difficulty: stats.u32("hacking_difficulty") as u8,
        flags: stats.u32("flags") as u8,
        server_type: stats.u32("server_type") as u8,
        items,
    }
}

/// `SCHR` header layout:
/// `{unused:u32, variable_count:u32, ref_count:u32, compiled_size:u32, type:u16, flags:u16}`.
pub fn parse_script(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> ScriptRecord {
    let mut script_type = 0;
    let mut variable_count = 0;
    let mut ref_count = 0;
    let mut compiled_size = 0;
    let mut flags = 0;
    let mut bytecode = Vec::new();
    let mut source = None;
    let mut variables: Vec<ScriptVariable> = Vec::new();
    let mut pending_slot: Option<(u32, bool)> = None;
    let mut references = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::SCHR => {
            variable_count = bytes::read_u32(payload, 4, endian).unwrap_or(0);
            ref_count = bytes::read_u32(payload, 8, endian).unwrap_or(0);
            compiled_size = bytes::read_u32(payload, 12, endian).unwrap_or(0);
            script_type = bytes::read_u16(payload, 16, endian).unwrap_or(0);
            flags = bytes::read_u16(payload, 18, endian).unwrap_or(0);
        }
        tags::SCDA => bytecode = payload.to_vec(),
        tags::SCTX => source = Some(sub_string(payload)),
        tags::SLSD => {
            let index = bytes::read_u32(payload, 0, endian).unwrap_or(0);
            let is_ref = bytes::read_u8(payload, 16).unwrap_or(0) & 0x01 != 0;
            pending_slot = Some((index, is_ref));
        }
        tags::SCVR => {
            // A name names the slot descriptor that preceded it.
            if let Some((index, is_ref)) = pending_slot.take() {
                variables.push(ScriptVariable { index, name: sub_string(payload), is_ref });
            }
        }
        tags::SCRO => {
            references.push(ScriptReference {
                form_id: sub_form(payload, 0, endian),
                variable: None,
            });
        }
        tags::SCRV => {
            references.push(ScriptReference {
                form_id: None,
                variable: bytes::read_u32(payload, 0, endian).ok(),
            });
        }
        _ => {}
    });

    ScriptRecord {
        header: shared.header,
        script_type,
        variable_count,
        ref_count,
        compiled_size,
        flags,
        bytecode,
        bytecode_big_endian: info.big_endian,
        source,
        variables,
        references,
        owner_quest: None,
        decompiled: None,
        cross_script_hits: 0,
    }
}

/// `PKDT` general package data; see also the package-type table on
/// [`PackageData`].
#[must_use]
pub fn parse_package_data(payload: &[u8], endian: Endian) -> PackageData {
    PackageData {
        general_flags: bytes::read_u32(payload, 0, endian).unwrap_or(0),
        package_type: bytes::read_u8(payload, 4).unwrap_or(0),
        fallout_behavior_flags: bytes::read_u16(payload, 6, endian).unwrap_or(0),
        type_specific_flags: bytes::read_u16(payload, 8, endian).unwrap_or(0),
    }
}

/// `PSDT` schedule; `-1` in month or weekday means "any".
#[must_use]
pub fn parse_package_schedule(payload: &[u8], endian: Endian) -> PackageSchedule {
    PackageSchedule {
        month: bytes::read_i8(payload, 0).unwrap_or(-1),
        day_of_week: bytes::read_i8(payload, 1).unwrap_or(-1),
        date: bytes::read_u8(payload, 2).unwrap_or(0),
        time: bytes::read_u8(payload, 3).unwrap_or(0),
        duration_hours: bytes::read_i32(payload, 4, endian).unwrap_or(0),
    }
}

/// `PTDT` target: `{type:u8, form-or-type:u32, count-or-distance:i32, radius:f32}`.
#[must_use]
pub fn parse_package_target(payload: &[u8], endian: Endian) -> Option<PackageTarget> {
    Some(PackageTarget {
        target_type: bytes::read_u8(payload, 0).ok()?,
        target: bytes::read_u32(payload, 4, endian).unwrap_or(0),
        count_or_distance: bytes::read_i32(payload, 8, endian).unwrap_or(0),
        acquire_radius: match bytes::read_f32(payload, 12, endian) {
            Ok(v) if normal_f32(v) => v,
            _ => 0.0,
        },
    })
}

pub fn parse_package(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> PackageRecord {
    let mut pkg = PackageData::default();
    let mut schedule = PackageSchedule::default();
    let mut target = None;
    let mut repeatable = false;
    let mut linked_reference = false;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::PKDT => pkg = parse_package_data(payload, endian),
        tags::PSDT => schedule = parse_package_schedule(payload, endian),
        tags::PTDT => target = parse_package_target(payload, endian),
        tags::PKPT => {
            repeatable = bytes::read_u8(payload, 0).unwrap_or(0) != 0;
            linked_reference = bytes::read_u8(payload, 1).unwrap_or(0) != 0;
        }
        _ => {}
    });

    PackageRecord {
        header: shared.header,
        data: pkg,
        schedule,
        target,
        repeatable,
        linked_reference,
    }
}

pub fn parse_cell(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> CellRecord {
    let mut flags = 0;
    let mut grid = None;
    let mut water_height = 0.0;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => flags = bytes::read_u8(payload, 0).unwrap_or(0),
        tags::XCLC => {
            let x = bytes::read_i32(payload, 0, endian).unwrap_or(0);
            let y = bytes::read_i32(payload, 4, endian).unwrap_or(0);
            grid = Some((x, y));
        }
        tags::XCLW => water_height = checked_f32(payload, 0, endian),
        _ => {}
    });

    CellRecord {
        header: shared.header,
        flags,
        grid,
        worldspace: None,
        water_height,
        references: Vec::new(),
        synthesized: false,
    }
}

pub fn parse_worldspace(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> WorldspaceRecord {
    let mut parent = None;
    let mut climate = None;
    let mut water = None;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::WNAM => parent = sub_form(payload, 0, endian),
        tags::CNAM => climate = sub_form(payload, 0, endian),
        tags::NAM2 => water = sub_form(payload, 0, endian),
        _ => {}
    });

    WorldspaceRecord {
        header: shared.header,
        parent,
        climate,
        water,
        cells: Vec::new(),
    }
}

pub fn parse_global(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> GlobalRecord {
    let mut value_type = 'f';
    let mut value = 0.0;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::FNAM => {
            if let Ok(b) = bytes::read_u8(payload, 0) {
                value_type = b as char;
            }
        }
        tags::FLTV => value = checked_f32(payload, 0, endian),
        _ => {}
    });

    GlobalRecord { header: shared.header, value_type, value }
}

/// `GMST` values are typed by the editor-ID prefix: `i` integer,
/// `f` float, `s` string.
pub fn parse_game_setting(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> GameSettingRecord {
    let mut raw: Vec<u8> = Vec::new();

    let mut shared = collect_shared(info, data, ctx, |sub, payload, _| {
        if sub.tag == tags::DATA {
            raw = payload.to_vec();
        }
    });

    let endian = info.endian();
    let value = match shared.header.editor_id.as_deref().and_then(|s| s.chars().next()) {
        Some('s') => GameSettingValue::Str(sub_string(&raw)),
        Some('f') => GameSettingValue::Float(match bytes::read_f32(&raw, 0, endian) {
            Ok(v) if normal_f32(v) => v,
            _ => 0.0,
        }),
        _ => GameSettingValue::Int(bytes::read_i32(&raw, 0, endian).unwrap_or(0)),
    };
    // Settings have no display name; anything captured was a stray.
    shared.header.full_name = None;
    GameSettingRecord { header: shared.header, value }
}

pub fn parse_spell(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> SpellRecord {
    let mut spell_type = 0;
    let mut cost = 0;
    let mut level = 0;
    let mut flags = 0;
    let mut effects = EffectCollector::default();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::SPIT => {
            spell_type = bytes::read_u32(payload, 0, endian).unwrap_or(0);
            cost = bytes::read_u32(payload, 4, endian).unwrap_or(0);
            level = bytes::read_u32(payload, 8, endian).unwrap_or(0);
            flags = bytes::read_u8(payload, 12).unwrap_or(0);
        }
        tags::EFID => effects.on_efid(payload, endian),
        tags::EFIT => effects.on_efit(payload, endian),
        _ => {}
    });

    SpellRecord {
        header: shared.header,
        spell_type,
        cost,
        level,
        flags,
        effects: effects.finish(),
    }
}

pub fn parse_enchantment(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> EnchantmentRecord {
    let mut enchantment_type = 0;
    let mut charge = 0;
    let mut cost = 0;
    let mut flags = 0;
    let mut effects = EffectCollector::default();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::ENIT => {
            enchantment_type = bytes::read_u32(payload, 0, endian).unwrap_or(0);
            charge = bytes::read_u32(payload, 4, endian).unwrap_or(0);
            cost = bytes::read_u32(payload, 8, endian).unwrap_or(0);
            flags = bytes::read_u8(payload, 12).unwrap_or(0);
        }
        tags::EFID => effects.on_efid(payload, endian),
        tags::EFIT => effects.on_efit(payload, endian),
        _ => {}
    });

    EnchantmentRecord {
        header: shared.header,
        enchantment_type,
        charge,
        cost,
        flags,
        effects: effects.finish(),
    }
}

pub fn parse_base_effect(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> BaseEffectRecord {
    let mut flags = 0;
    let mut base_cost = 0.0;
    let mut associated_item = None;
    let mut resist_value = -1;
    let mut light = None;
    let mut projectile_speed = 0.0;
    let mut archetype = 0;
    let mut actor_value = -1;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| {
        if sub.tag == tags::DATA {
            flags = bytes::read_u32(payload, 0, endian).unwrap_or(0);
            base_cost = checked_f32(payload, 4, endian);
            associated_item = sub_form(payload, 8, endian);
            resist_value = bytes::read_i32(payload, 16, endian).unwrap_or(-1);
            light = sub_form(payload, 24, endian);
            projectile_speed = checked_f32(payload, 28, endian);
            archetype = bytes::read_u32(payload, 56, endian).unwrap_or(0);
            actor_value = bytes::read_i32(payload, 60, endian).unwrap_or(-1);
        }
    });

    BaseEffectRecord {
        header: shared.header,
        description: shared.description,
        icon: shared.icon,
        flags,
        base_cost,
        associated_item,
        resist_value,
        light,
        projectile_speed,
        archetype,
        actor_value,
    }
}

pub fn parse_projectile(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> ProjectileRecord {
    let mut stats = None;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| {
        if sub.tag == tags::DATA {
            stats = Some(fields::decode_for(tags::DATA, tags::PROJ, payload, endian));
        }
    });

    let stats = stats.unwrap_or_else(fields::Decoded::empty);
    ProjectileRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        flags: stats.u32("flags") as u16,
        projectile_type: stats.u32("projectile_type") as u16,
        gravity: stats.f32("gravity"),
        speed: stats.f32("speed"),
        range: stats.f32("range"),
        light: stats.form("light"),
        tracer_chance: stats.f32("tracer_chance"),
        timer: stats.f32("timer"),
        explosion: stats.form("explosion"),
        sound: stats.form("sound"),
        fade_duration: stats.f32("fade_duration"),
        impact_force: stats.f32("impact_force"),
    }
}

pub fn parse_explosion(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> ExplosionRecord {
    let mut stats = None;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| {
        if sub.tag == tags::DATA {
            stats = Some(fields::decode_for(tags::DATA, tags::EXPL, payload, endian));
        }
    });

    let stats = stats.unwrap_or_else(fields::Decoded::empty);
    ExplosionRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        force: stats.f32("force"),
        damage: stats.f32("damage"),
        radius: stats.f32("radius"),
        light: stats.form("light"),
        sound: stats.form("sound"),
        flags: stats.u32("flags"),
        is_radius: stats.f32("is_radius"),
    }
}

pub fn parse_message(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> MessageRecord {
    let mut flags = 0;
    let mut display_time = 0;
    let mut buttons = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DNAM => flags = bytes::read_u32(payload, 0, endian).unwrap_or(0),
        tags::TNAM => display_time = bytes::read_u32(payload, 0, endian).unwrap_or(0),
        tags::ITXT => buttons.push(sub_string(payload)),
        _ => {}
    });

    MessageRecord {
        header: shared.header,
        description: shared.description,
        icon: shared.icon,
        flags,
        display_time,
        buttons,
    }
}

pub fn parse_class(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> ClassRecord {
    let mut tag_skills = [-1; 4];
    let mut flags = 0;
    let mut services = 0;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| {
        if sub.tag == tags::DATA {
            for (i, slot) in tag_skills.iter_mut().enumerate() {
                *slot = bytes::read_i32(payload, i * 4, endian).unwrap_or(-1);
            }
            flags = bytes::read_u32(payload, 16, endian).unwrap_or(0);
            services = bytes::read_u32(payload, 20, endian).unwrap_or(0);
        }
    });

    ClassRecord {
        header: shared.header,
        description: shared.description,
        tag_skills,
        flags,
        services,
    }
}

pub fn parse_perk(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> PerkRecord {
    let mut trait_flag = 0;
    let mut min_level = 0;
    let mut num_ranks = 0;
    let mut playable = 0;
    let mut hidden = 0;

    let shared = collect_shared(info, data, ctx, |sub, payload, _| {
        if sub.tag == tags::DATA && payload.len() >= 5 {
            trait_flag = payload[0];
            min_level = payload[1];
            num_ranks = payload[2];
            playable = payload[3];
            hidden = payload[4];
        }
    });

    PerkRecord {
        header: shared.header,
        description: shared.description,
        icon: shared.icon,
        trait_flag,
        min_level,
        num_ranks,
        playable,
        hidden,
    }
}

pub fn parse_weapon_mod(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> WeaponModRecord {
    let mut stats = None;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| {
        if sub.tag == tags::DATA {
            stats = Some(fields::decode_for(tags::DATA, tags::IMOD, payload, endian));
        }
    });

    let stats = stats.unwrap_or_else(fields::Decoded::empty);
    WeaponModRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        icon: shared.icon,
        description: shared.description,
        value: stats.i32("value"),
        weight: stats.f32("weight"),
    }
}

pub fn parse_recipe(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> RecipeRecord {
    let mut skill = -1;
    let mut level = 0;
    let mut category = None;
    let mut sub_category = None;
    let mut inputs: Vec<InventoryEntry> = Vec::new();
    let mut outputs: Vec<InventoryEntry> = Vec::new();
    let mut last_was_output = false;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => {
            skill = bytes::read_i32(payload, 0, endian).unwrap_or(-1);
            level = bytes::read_i32(payload, 4, endian).unwrap_or(0);
            category = sub_form(payload, 8, endian);
            sub_category = sub_form(payload, 12, endian);
        }
        tags::RCIL => {
            if let Some(item) = sub_form(payload, 0, endian) {
                inputs.push(InventoryEntry { item, count: 1 });
                last_was_output = false;
            }
        }
        tags::RCOD => {
            if let Some(item) = sub_form(payload, 0, endian) {
                outputs.push(InventoryEntry { item, count: 1 });
                last_was_output = true;
            }
        }
        tags::RCQY => {
            let count = bytes::read_i32(payload, 0, endian).unwrap_or(1);
            let slot = if last_was_output { outputs.last_mut() } else { inputs.last_mut() };
            if let Some(entry) = slot {
                entry.count = count;
            }
        }
        _ => {}
    });

    RecipeRecord {
        header: shared.header,
        skill,
        level,
        category,
        sub_category,
        inputs,
        outputs,
    }
}

pub fn parse_challenge(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> ChallengeRecord {
    let mut challenge_type = 0;
    let mut threshold = 0;
    let mut flags = 0;
    let mut interval = 0;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| {
        if sub.tag == tags::DATA {
            challenge_type = bytes::read_u32(payload, 0, endian).unwrap_or(0);
            threshold = bytes::read_u32(payload, 4, endian).unwrap_or(0);
            flags = bytes::read_u32(payload, 8, endian).unwrap_or(0);
            interval = bytes::read_u32(payload, 12, endian).unwrap_or(0);
        }
    });

    ChallengeRecord {
        header: shared.header,
        description: shared.description,
        challenge_type,
        threshold,
        flags,
        interval,
    }
}

pub fn parse_reputation(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> ReputationRecord {
    let mut value = 0.0;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| {
        if sub.tag == tags::DATA {
            value = checked_f32(payload, 0, endian);
        }
    });

    ReputationRecord { header: shared.header, icon: shared.icon, value }
}

pub fn parse_form_list(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> FormListRecord {
    let mut entries = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| {
        if sub.tag == tags::LNAM {
            entries.extend(sub_form(payload, 0, endian));
        }
    });

    FormListRecord { header: shared.header, entries }
}

pub fn parse_activator(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> ActivatorRecord {
    let mut looping_sound = None;
    let mut activation_sound = None;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::SNAM => looping_sound = sub_form(payload, 0, endian),
        tags::VNAM => activation_sound = sub_form(payload, 0, endian),
        _ => {}
    });

    ActivatorRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        script: shared.script,
        looping_sound,
        activation_sound,
    }
}

pub fn parse_light(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> LightRecord {
    let mut stats = None;
    let mut fade = 0.0;
    let mut sound = None;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::DATA => stats = Some(fields::decode_for(tags::DATA, tags::LIGH, payload, endian)),
        tags::FNAM => fade = checked_f32(payload, 0, endian),
        tags::SNAM => sound = sub_form(payload, 0, endian),
        _ => {}
    });

    let stats = stats.unwrap_or_else(fields::Decoded::empty);
    LightRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        icon: shared.icon,
        script: shared.script,
        time: stats.i32("time"),
        radius: stats.u32("radius"),
        flags: stats.u32("flags"),
        falloff: stats.f32("falloff"),
        fov: stats.f32("fov"),
        value: stats.u32("value"),
        weight: stats.f32("weight"),
        fade,
        sound,
    }
}

pub fn parse_door(info: &RecordHeaderInfo, data: &[u8], ctx: &mut ParseContext<'_>) -> DoorRecord {
    let mut open_sound = None;
    let mut close_sound = None;
    let mut loop_sound = None;
    let mut flags = 0;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::SNAM => open_sound = sub_form(payload, 0, endian),
        tags::ANAM => close_sound = sub_form(payload, 0, endian),
        tags::BNAM => loop_sound = sub_form(payload, 0, endian),
        tags::FNAM => flags = bytes::read_u8(payload, 0).unwrap_or(0),
        _ => {}
    });

    DoorRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        script: shared.script,
        open_sound,
        close_sound,
        loop_sound,
        flags,
    }
}

pub fn parse_static(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> StaticRecord {
    let shared = collect_shared(info, data, ctx, |_, _, _| {});
    StaticRecord { header: shared.header, bounds: shared.bounds, model: shared.model }
}

pub fn parse_furniture(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> FurnitureRecord {
    let mut marker_flags = 0;

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| {
        if sub.tag == tags::MNAM {
            marker_flags = bytes::read_u32(payload, 0, endian).unwrap_or(0);
        }
    });

    FurnitureRecord {
        header: shared.header,
        bounds: shared.bounds,
        model: shared.model,
        script: shared.script,
        marker_flags,
    }
}

/// `LVLI`/`LVLN`/`LVLC`. An entry list with no `LVLO` subrecords is a
/// valid empty list.
pub fn parse_leveled_list(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> LeveledListRecord {
    let mut chance_none = 0;
    let mut flags = LeveledFlags::default();
    let mut global = None;
    let mut entries = Vec::new();

    let shared = collect_shared(info, data, ctx, |sub, payload, endian| match sub.tag {
        tags::LVLD => chance_none = bytes::read_u8(payload, 0).unwrap_or(0),
        tags::LVLF => flags = LeveledFlags::from_bits_retain(bytes::read_u8(payload, 0).unwrap_or(0)),
        tags::LVLG => global = sub_form(payload, 0, endian),
        tags::LVLO => {
            // {level:u16, pad:u16, form:u32, count:u16, pad:u16}; short
            // 8-byte variants drop the trailing count.
            let level = bytes::read_u16(payload, 0, endian).unwrap_or(0);
            let Some(form_id) = sub_form(payload, 4, endian) else { return };
            let count = bytes::read_u16(payload, 8, endian).unwrap_or(1);
            entries.push(LeveledEntry { level, form_id, count });
        }
        _ => {}
    });

    LeveledListRecord {
        header: shared.header,
        kind: info.tag,
        chance_none,
        flags,
        global,
        entries,
    }
}

/// Catch-all for record types without a dedicated reconstructor; still
/// harvests identity information.
pub fn parse_unknown(
    info: &RecordHeaderInfo,
    data: &[u8],
    ctx: &mut ParseContext<'_>,
) -> UnknownRecord {
    let shared = collect_shared(info, data, ctx, |_, _, _| {});
    UnknownRecord { header: shared.header, tag: info.tag }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ScanResult;
    use crate::subrecord::Tag;

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
        sub(tag, &payload)
    }

    fn header(tag: [u8; 4], form_id: FormId, data_size: u32) -> RecordHeaderInfo {
        RecordHeaderInfo {
            tag: Tag(tag),
            form_id,
            offset: 0,
            data_size,
            big_endian: false,
            compressed: false,
        }
    }

    fn ctx(identity: &mut IdentityIndex) -> ParseContext<'_> {
        ParseContext { identity }
    }

    #[test]
    fn glob_time_scale() {
        let mut data = zsub(b"EDID", "fTimeScale");
        data.extend(sub(b"FNAM", b"f"));
        data.extend(sub(b"FLTV", &30.0f32.to_le_bytes()));

        let mut identity = IdentityIndex::build(&[], &ScanResult::default());
        let info = header(*b"GLOB", 0x88, data.len() as u32);
        let global = parse_global(&info, &data, &mut ctx(&mut identity));
        assert_eq!(global.header.editor_id.as_deref(), Some("fTimeScale"));
        assert_eq!(global.value_type, 'f');
        assert_eq!(global.value, 30.0);
        assert_eq!(identity.editor_id(0x88), Some("fTimeScale"));
    }

    #[test]
    fn pkdt_cross_endian_agreement() {
        let le = [0x07, 0x02, 0x00, 0x00, 0x0C, 0x00, 0x03, 0x00, 0x7E, 0x00, 0x00, 0x00];
        let be = [0x00, 0x00, 0x02, 0x07, 0x0C, 0x00, 0x00, 0x03, 0x00, 0x7E, 0x00, 0x00];
        let from_le = parse_package_data(&le, Endian::Little);
        let from_be = parse_package_data(&be, Endian::Big);
        assert_eq!(from_le, from_be);
        assert_eq!(from_le.package_type, 12);
        assert_eq!(from_le.type_name(), "Sandbox");
        assert_eq!(from_le.general_flags, 0x207);
        assert_eq!(from_le.fallout_behavior_flags, 0x0003);
        assert_eq!(from_le.type_specific_flags, 0x007E);
    }

    #[test]
    fn psdt_schedule_summary() {
        let payload = [0xFF, 0xFF, 0x00, 0x08, 0x08, 0x00, 0x00, 0x00];
        let schedule = parse_package_schedule(&payload, Endian::Little);
        assert_eq!(schedule.month, -1);
        assert_eq!(schedule.day_of_week, -1);
        assert_eq!(schedule.date, 0);
        assert_eq!(schedule.time, 8);
        assert_eq!(schedule.duration_hours, 8);
        assert_eq!(schedule.summary(), "Every day, 8:00 AM for 8 hours");
    }

    #[test]
    fn leveled_list_entries() {
        let mut lvlo = Vec::new();
        lvlo.extend_from_slice(&10u16.to_le_bytes());
        lvlo.extend_from_slice(&0u16.to_le_bytes());
        lvlo.extend_from_slice(&0x0012_3456u32.to_le_bytes());
        lvlo.extend_from_slice(&3u16.to_le_bytes());
        lvlo.extend_from_slice(&0u16.to_le_bytes());

        let mut data = sub(b"LVLD", &[50]);
        data.extend(sub(b"LVLF", &[0x01]));
        data.extend(sub(b"LVLO", &lvlo));

        let mut identity = IdentityIndex::build(&[], &ScanResult::default());
        let info = header(*b"LVLI", 0x42, data.len() as u32);
        let list = parse_leveled_list(&info, &data, &mut ctx(&mut identity));
        assert_eq!(list.chance_none, 50);
        assert_eq!(list.flags.bits(), 0x01);
        assert_eq!(
            list.entries,
            vec![LeveledEntry { level: 10, form_id: 0x0012_3456, count: 3 }]
        );
    }

    #[test]
    fn empty_leveled_list_is_not_an_error() {
        let data = sub(b"LVLD", &[25]);
        let mut identity = IdentityIndex::build(&[], &ScanResult::default());
        let info = header(*b"LVLN", 0x43, data.len() as u32);
        let list = parse_leveled_list(&info, &data, &mut ctx(&mut identity));
        assert_eq!(list.chance_none, 25);
        assert!(list.entries.is_empty());
    }

    #[test]
    fn info_response_without_trdt_defaults_emotion() {
        let data = zsub(b"NAM1", "Patrolling the Mojave...");
        let mut identity = IdentityIndex::build(&[], &ScanResult::default());
        let info = header(*b"INFO", 0x100, data.len() as u32);
        let rec = parse_dialog_info(&info, &data, &mut ctx(&mut identity));
        assert_eq!(rec.responses.len(), 1);
        assert_eq!(rec.responses[0].text, "Patrolling the Mojave...");
        assert_eq!(rec.responses[0].emotion_type, 0);
        assert_eq!(rec.responses[0].emotion_value, 0);
    }

    #[test]
    fn info_two_responses_with_metadata() {
        let mut trdt = Vec::new();
        trdt.extend_from_slice(&4u32.to_le_bytes()); // emotion type
        trdt.extend_from_slice(&35i32.to_le_bytes()); // emotion value
        trdt.extend_from_slice(&0u32.to_le_bytes());
        trdt.push(2); // response number
        trdt.extend_from_slice(&[0; 3]);

        let mut data = zsub(b"NAM1", "First line");
        data.extend(sub(b"TRDT", &trdt));
        data.extend(zsub(b"NAM1", "Second line"));
        data.extend(zsub(b"TCLT", ""));

        let mut identity = IdentityIndex::build(&[], &ScanResult::default());
        let info = header(*b"INFO", 0x101, data.len() as u32);
        let rec = parse_dialog_info(&info, &data, &mut ctx(&mut identity));
        assert_eq!(rec.responses.len(), 2);
        assert_eq!(rec.responses[0].emotion_type, 4);
        assert_eq!(rec.responses[0].emotion_value, 35);
        assert_eq!(rec.responses[0].response_number, 2);
        assert_eq!(rec.responses[1].text, "Second line");
        assert_eq!(rec.responses[1].emotion_type, 0);
    }

    #[test]
    fn weapon_reparse_is_stable() {
        let mut dnam = vec![0u8; 100];
        dnam[0..4].copy_from_slice(&3u32.to_le_bytes());
        dnam[36..40].copy_from_slice(&0x600u32.to_le_bytes());
        dnam[96..100].copy_from_slice(&2.5f32.to_le_bytes());

        let mut payload = Vec::new();
        payload.extend_from_slice(&150i32.to_le_bytes());
        payload.extend_from_slice(&200i32.to_le_bytes());
        payload.extend_from_slice(&5.5f32.to_le_bytes());
        payload.extend_from_slice(&24i16.to_le_bytes());
        payload.push(12);

        let mut data = zsub(b"EDID", "WeapTest");
        data.extend(zsub(b"FULL", "Test Rifle"));
        data.extend(sub(b"DATA", &payload));
        data.extend(sub(b"DNAM", &dnam));
        data.extend(sub(b"NAM0", &0x777u32.to_le_bytes()));

        let info = header(*b"WEAP", 0x500, data.len() as u32);
        let mut identity = IdentityIndex::build(&[], &ScanResult::default());
        let first = parse_weapon(&info, &data, &mut ctx(&mut identity));
        let second = parse_weapon(&info, &data, &mut ctx(&mut identity));
        assert_eq!(first, second);
        assert_eq!(first.value, 150);
        assert_eq!(first.damage, 24);
        assert_eq!(first.clip_rounds, 12);
        assert_eq!(first.projectile, Some(0x600));
        assert_eq!(first.fire_rate, 2.5);
        assert_eq!(first.ammo, Some(0x777));
        assert_eq!(first.header.full_name.as_deref(), Some("Test Rifle"));
        assert_eq!(identity.display_name(0x500), Some("Test Rifle"));
    }

    #[test]
    fn quest_stage_state_machine() {
        let mut data = zsub(b"EDID", "VMQ01");
        data.extend(sub(b"INDX", &10i16.to_le_bytes()));
        data.extend(zsub(b"CNAM", "Stage ten log"));
        data.extend(sub(b"INDX", &20i16.to_le_bytes()));
        data.extend(sub(b"QOBJ", &1i32.to_le_bytes()));
        data.extend(zsub(b"NNAM", "Find the courier"));

        let info = header(*b"QUST", 0xB00, data.len() as u32);
        let mut identity = IdentityIndex::build(&[], &ScanResult::default());
        let quest = parse_quest(&info, &data, &mut ctx(&mut identity));
        assert_eq!(quest.stages.len(), 2);
        assert_eq!(quest.stages[0].index, 10);
        assert_eq!(quest.stages[0].log_entry, "Stage ten log");
        assert_eq!(quest.stages[1].log_entry, "");
        assert_eq!(quest.objectives.len(), 1);
        assert_eq!(quest.objectives[0].text, "Find the courier");
    }

    #[test]
    fn script_variable_pairing() {
        let mut schr = vec![0u8; 20];
        schr[4..8].copy_from_slice(&2u32.to_le_bytes());
        schr[8..12].copy_from_slice(&1u32.to_le_bytes());
        schr[12..16].copy_from_slice(&8u32.to_le_bytes());
        schr[16..18].copy_from_slice(&1u16.to_le_bytes());

        let mut slsd1 = vec![0u8; 24];
        slsd1[0..4].copy_from_slice(&1u32.to_le_bytes());
        let mut slsd2 = vec![0u8; 24];
        slsd2[0..4].copy_from_slice(&2u32.to_le_bytes());
        slsd2[16] = 0x01; // ref flag

        let mut data = zsub(b"EDID", "VMS01Script");
        data.extend(sub(b"SCHR", &schr));
        data.extend(sub(b"SCDA", &[0x1D, 0x00, 0x10, 0x00]));
        data.extend(zsub(b"SCTX", "scn VMS01Script"));
        data.extend(sub(b"SLSD", &slsd1));
        data.extend(zsub(b"SCVR", "iStage"));
        data.extend(sub(b"SLSD", &slsd2));
        data.extend(zsub(b"SCVR", "rTarget"));
        data.extend(sub(b"SCRO", &0x1234u32.to_le_bytes()));

        let info = header(*b"SCPT", 0xC00, data.len() as u32);
        let mut identity = IdentityIndex::build(&[], &ScanResult::default());
        let script = parse_script(&info, &data, &mut ctx(&mut identity));
        assert_eq!(script.variable_count, 2);
        assert_eq!(script.script_type, 1);
        assert_eq!(script.variables.len(), 2);
        assert_eq!(script.variables[0].name, "iStage");
        assert!(!script.variables[0].is_ref);
        assert!(script.variables[1].is_ref);
        assert_eq!(script.references.len(), 1);
        assert_eq!(script.references[0].form_id, Some(0x1234));
        assert!(!script.bytecode_big_endian);
    }

    #[test]
    fn effect_pairing_tolerates_missing_efit() {
        let mut data = zsub(b"EDID", "TestChem");
        data.extend(sub(b"EFID", &0xAAu32.to_le_bytes()));
        let mut efit = Vec::new();
        efit.extend_from_slice(&25u32.to_le_bytes());
        efit.extend_from_slice(&0u32.to_le_bytes());
        efit.extend_from_slice(&10u32.to_le_bytes());
        efit.extend_from_slice(&0u32.to_le_bytes());
        efit.extend_from_slice(&40i32.to_le_bytes());
        data.extend(sub(b"EFIT", &efit));
        data.extend(sub(b"EFID", &0xBBu32.to_le_bytes()));

        let info = header(*b"ALCH", 0xD00, data.len() as u32);
        let mut identity = IdentityIndex::build(&[], &ScanResult::default());
        let chem = parse_consumable(&info, &data, &mut ctx(&mut identity));
        assert_eq!(chem.effects.len(), 2);
        assert_eq!(chem.effects[0].effect, 0xAA);
        assert_eq!(chem.effects[0].magnitude, 25);
        assert_eq!(chem.effects[0].actor_value, 40);
        assert_eq!(chem.effects[1].effect, 0xBB);
        assert_eq!(chem.effects[1].magnitude, 0);
    }

    #[test]
    fn game_setting_typed_by_prefix() {
        let mut identity = IdentityIndex::build(&[], &ScanResult::default());

        let mut data = zsub(b"EDID", "iMaxPlayerLevel");
        data.extend(sub(b"DATA", &30i32.to_le_bytes()));
        let info = header(*b"GMST", 0x1, data.len() as u32);
        let setting = parse_game_setting(&info, &data, &mut ctx(&mut identity));
        assert_eq!(setting.value, GameSettingValue::Int(30));

        let mut data = zsub(b"EDID", "sOk");
        data.extend(zsub(b"DATA", "OK"));
        let info = header(*b"GMST", 0x2, data.len() as u32);
        let setting = parse_game_setting(&info, &data, &mut ctx(&mut identity));
        assert_eq!(setting.value, GameSettingValue::Str("OK".into()));
    }
}
