//! Shared fixed-struct field schemas.
//!
//! Several record types carry a `DATA`-style subrecord holding a packed
//! struct of numeric stats. Decoding those by hand in every reconstructor
//! invites drift, so the layouts are declared once here, keyed on
//! `(subrecord tag, parent record type)`, and decoded by one routine that
//! applies the same bounds and validation rules everywhere.

use crate::bytes::{self, Endian};
use crate::records::{FormId, form_ref};
use crate::schema::tags;
use crate::subrecord::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    /// 32-bit form reference; zero and `0xFFFF_FFFF` decode as absent.
    Form,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub offset: usize,
    pub kind: FieldKind,
}

/// Layout of one packed struct subrecord.
#[derive(Debug, Clone, Copy)]
pub struct StructSchema {
    pub fields: &'static [FieldDef],
}

const fn f(name: &'static str, offset: usize, kind: FieldKind) -> FieldDef {
    FieldDef { name, offset, kind }
}

use FieldKind::*;

const WEAP_DATA: StructSchema = StructSchema {
    fields: &[
        f("value", 0, I32),
        f("health", 4, I32),
        f("weight", 8, F32),
        f("damage", 12, I16),
        f("clip_rounds", 14, U8),
    ],
};

const WEAP_DNAM: StructSchema = StructSchema {
    fields: &[
        f("anim_type", 0, U32),
        f("anim_mult", 4, F32),
        f("reach", 8, F32),
        f("min_spread", 16, F32),
        f("spread", 20, F32),
        f("sight_fov", 28, F32),
        f("projectile", 36, Form),
        f("min_range", 44, F32),
        f("max_range", 48, F32),
        f("fire_rate", 96, F32),
    ],
};

const AMMO_DATA: StructSchema = StructSchema {
    fields: &[
        f("speed", 0, F32),
        f("flags", 4, U8),
        f("value", 8, U32),
        f("clip_rounds", 12, U8),
    ],
};

const AMMO_DAT2: StructSchema = StructSchema {
    fields: &[
        f("projectiles_per_shot", 0, U32),
        f("projectile", 4, Form),
        f("weight", 8, F32),
    ],
};

const ARMO_DATA: StructSchema = StructSchema {
    fields: &[f("value", 0, I32), f("max_condition", 4, I32), f("weight", 8, F32)],
};

const VALUE_WEIGHT_DATA: StructSchema = StructSchema {
    fields: &[f("value", 0, I32), f("weight", 4, F32)],
};

const ALCH_ENIT: StructSchema = StructSchema {
    fields: &[
        f("value", 0, I32),
        f("flags", 4, U8),
        f("withdrawal_effect", 8, Form),
        f("addiction_chance", 12, F32),
        f("use_sound", 16, Form),
    ],
};

const BOOK_DATA: StructSchema = StructSchema {
    fields: &[
        f("flags", 0, U8),
        f("teaches_skill", 1, I8),
        f("value", 2, I32),
        f("weight", 6, F32),
    ],
};

const CONT_DATA: StructSchema = StructSchema {
    fields: &[f("flags", 0, U8), f("weight", 1, F32)],
};

const LIGH_DATA: StructSchema = StructSchema {
    fields: &[
        f("time", 0, I32),
        f("radius", 4, U32),
        f("flags", 12, U32),
        f("falloff", 16, F32),
        f("fov", 20, F32),
        f("value", 24, U32),
        f("weight", 28, F32),
    ],
};

const PROJ_DATA: StructSchema = StructSchema {
    fields: &[
        f("flags", 0, U16),
        f("projectile_type", 2, U16),
        f("gravity", 4, F32),
        f("speed", 8, F32),
        f("range", 12, F32),
        f("light", 16, Form),
        f("tracer_chance", 24, F32),
        f("timer", 32, F32),
        f("explosion", 36, Form),
        f("sound", 40, Form),
        f("fade_duration", 48, F32),
        f("impact_force", 52, F32),
    ],
};

const EXPL_DATA: StructSchema = StructSchema {
    fields: &[
        f("force", 0, F32),
        f("damage", 4, F32),
        f("radius", 8, F32),
        f("light", 12, Form),
        f("sound", 16, Form),
        f("flags", 20, U32),
        f("is_radius", 24, F32),
    ],
};

const TERM_DNAM: StructSchema = StructSchema {
    fields: &[
        f("hacking_difficulty", 0, U8),
        f("flags", 1, U8),
        f("server_type", 2, U8),
    ],
};

/// Schema for a `(subrecord, parent record)` pair, if one is declared.
#[must_use]
pub fn schema_for(sub: Tag, record: Tag) -> Option<&'static StructSchema> {
    let schema = match (sub, record) {
        (tags::DATA, tags::WEAP) => &WEAP_DATA,
        (tags::DNAM, tags::WEAP) => &WEAP_DNAM,
        (tags::DATA, tags::AMMO) => &AMMO_DATA,
        (tags::DAT2, tags::AMMO) => &AMMO_DAT2,
        (tags::DATA, tags::ARMO) => &ARMO_DATA,
        (tags::DATA, tags::MISC | tags::KEYM | tags::IMOD) => &VALUE_WEIGHT_DATA,
        (tags::ENIT, tags::ALCH) => &ALCH_ENIT,
        (tags::DATA, tags::BOOK) => &BOOK_DATA,
        (tags::DATA, tags::CONT) => &CONT_DATA,
        (tags::DATA, tags::LIGH) => &LIGH_DATA,
        (tags::DATA, tags::PROJ) => &PROJ_DATA,
        (tags::DATA, tags::EXPL) => &EXPL_DATA,
        (tags::DNAM, tags::TERM) => &TERM_DNAM,
        _ => return None,
    };
    Some(schema)
}

/// A decoded field value. `Absent` marks fields that were out of bounds
/// or failed validation; they are never reported as garbage numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    Form(Option<FormId>),
    Absent,
}

/// Floats harvested from binary payloads must be finite and inside a
/// plausible magnitude band; subnormals and cosmic values are treated as
/// decode garbage.
#[must_use]
pub fn normal_f32(v: f32) -> bool {
    v.is_finite() && (v == 0.0 || (1e-6..=1e9).contains(&v.abs()))
}

/// Result of decoding one struct subrecord against its schema.
#[derive(Debug, Clone)]
pub struct Decoded {
    values: Vec<(&'static str, FieldValue)>,
}

impl Decoded {
    /// A decode with no fields; every accessor returns its default.
    #[must_use]
    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> FieldValue {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map_or(FieldValue::Absent, |(_, v)| *v)
    }

    #[must_use]
    pub fn f32(&self, name: &str) -> f32 {
        match self.get(name) {
            FieldValue::F32(v) => v,
            _ => 0.0,
        }
    }

    #[must_use]
    pub fn u32(&self, name: &str) -> u32 {
        match self.get(name) {
            FieldValue::U32(v) => v,
            FieldValue::U16(v) => v.into(),
            FieldValue::U8(v) => v.into(),
            _ => 0,
        }
    }

    #[must_use]
    pub fn i32(&self, name: &str) -> i32 {
        match self.get(name) {
            FieldValue::I32(v) => v,
            FieldValue::I16(v) => v.into(),
            FieldValue::I8(v) => v.into(),
            _ => 0,
        }
    }

    #[must_use]
    pub fn form(&self, name: &str) -> Option<FormId> {
        match self.get(name) {
            FieldValue::Form(v) => v,
            _ => None,
        }
    }
}

/// Decode `data` against the schema registered for `(sub, record)`, or
/// to an empty result when no layout is declared for the pair.
#[must_use]
pub fn decode_for(sub: Tag, record: Tag, data: &[u8], endian: Endian) -> Decoded {
    match schema_for(sub, record) {
        Some(schema) => decode(schema, data, endian),
        None => Decoded::empty(),
    }
}

/// Decode `data` against `schema`. Fields whose window falls outside the
/// payload, or whose value fails its validation predicate, come back as
/// [`FieldValue::Absent`]; the struct as a whole never fails.
#[must_use]
pub fn decode(schema: &StructSchema, data: &[u8], endian: Endian) -> Decoded {
    let values = schema
        .fields
        .iter()
        .map(|field| (field.name, decode_field(field, data, endian)))
        .collect();
    Decoded { values }
}

fn decode_field(field: &FieldDef, data: &[u8], endian: Endian) -> FieldValue {
    let off = field.offset;
    let decoded = match field.kind {
        U8 => bytes::read_u8(data, off).map(FieldValue::U8),
        I8 => bytes::read_i8(data, off).map(FieldValue::I8),
        U16 => bytes::read_u16(data, off, endian).map(FieldValue::U16),
        I16 => bytes::read_i16(data, off, endian).map(FieldValue::I16),
        U32 => bytes::read_u32(data, off, endian).map(FieldValue::U32),
        I32 => bytes::read_i32(data, off, endian).map(FieldValue::I32),
        F32 => bytes::read_f32(data, off, endian).map(FieldValue::F32),
        Form => bytes::read_u32(data, off, endian).map(|raw| FieldValue::Form(form_ref(raw))),
    };
    match decoded {
        Ok(FieldValue::F32(v)) if !normal_f32(v) => FieldValue::Absent,
        Ok(value) => value,
        Err(_) => FieldValue::Absent,
    }
}
