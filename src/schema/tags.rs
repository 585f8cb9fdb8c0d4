use num_enum::TryFromPrimitive;

use crate::subrecord::Tag;

// Record type tags.
pub const TES4: Tag = Tag(*b"TES4");
pub const GRUP: Tag = Tag(*b"GRUP");
pub const GMST: Tag = Tag(*b"GMST");
pub const GLOB: Tag = Tag(*b"GLOB");
pub const CLAS: Tag = Tag(*b"CLAS");
pub const FACT: Tag = Tag(*b"FACT");
pub const RACE: Tag = Tag(*b"RACE");
pub const MGEF: Tag = Tag(*b"MGEF");
pub const SCPT: Tag = Tag(*b"SCPT");
pub const ENCH: Tag = Tag(*b"ENCH");
pub const SPEL: Tag = Tag(*b"SPEL");
pub const ACTI: Tag = Tag(*b"ACTI");
pub const TERM: Tag = Tag(*b"TERM");
pub const ARMO: Tag = Tag(*b"ARMO");
pub const BOOK: Tag = Tag(*b"BOOK");
pub const CONT: Tag = Tag(*b"CONT");
pub const DOOR: Tag = Tag(*b"DOOR");
pub const LIGH: Tag = Tag(*b"LIGH");
pub const MISC: Tag = Tag(*b"MISC");
pub const STAT: Tag = Tag(*b"STAT");
pub const FURN: Tag = Tag(*b"FURN");
pub const WEAP: Tag = Tag(*b"WEAP");
pub const AMMO: Tag = Tag(*b"AMMO");
pub const NPC_: Tag = Tag(*b"NPC_");
pub const CREA: Tag = Tag(*b"CREA");
pub const LVLC: Tag = Tag(*b"LVLC");
pub const LVLN: Tag = Tag(*b"LVLN");
pub const LVLI: Tag = Tag(*b"LVLI");
pub const KEYM: Tag = Tag(*b"KEYM");
pub const ALCH: Tag = Tag(*b"ALCH");
pub const NOTE: Tag = Tag(*b"NOTE");
pub const PROJ: Tag = Tag(*b"PROJ");
pub const EXPL: Tag = Tag(*b"EXPL");
pub const CELL: Tag = Tag(*b"CELL");
pub const REFR: Tag = Tag(*b"REFR");
pub const ACHR: Tag = Tag(*b"ACHR");
pub const ACRE: Tag = Tag(*b"ACRE");
pub const WRLD: Tag = Tag(*b"WRLD");
pub const LAND: Tag = Tag(*b"LAND");
pub const DIAL: Tag = Tag(*b"DIAL");
pub const INFO: Tag = Tag(*b"INFO");
pub const QUST: Tag = Tag(*b"QUST");
pub const PACK: Tag = Tag(*b"PACK");
pub const FLST: Tag = Tag(*b"FLST");
pub const PERK: Tag = Tag(*b"PERK");
pub const MESG: Tag = Tag(*b"MESG");
pub const IMOD: Tag = Tag(*b"IMOD");
pub const REPU: Tag = Tag(*b"REPU");
pub const RCPE: Tag = Tag(*b"RCPE");
pub const CHAL: Tag = Tag(*b"CHAL");

// Subrecord tags shared across record types.
pub const EDID: Tag = Tag(*b"EDID");
pub const FULL: Tag = Tag(*b"FULL");
pub const DESC: Tag = Tag(*b"DESC");
pub const MODL: Tag = Tag(*b"MODL");
pub const ICON: Tag = Tag(*b"ICON");
pub const OBND: Tag = Tag(*b"OBND");
pub const SCRI: Tag = Tag(*b"SCRI");
pub const DATA: Tag = Tag(*b"DATA");
pub const SNAM: Tag = Tag(*b"SNAM");
pub const ANAM: Tag = Tag(*b"ANAM");
pub const BNAM: Tag = Tag(*b"BNAM");
pub const CNAM: Tag = Tag(*b"CNAM");
pub const DNAM: Tag = Tag(*b"DNAM");
pub const ENAM: Tag = Tag(*b"ENAM");
pub const FNAM: Tag = Tag(*b"FNAM");
pub const GNAM: Tag = Tag(*b"GNAM");
pub const INAM: Tag = Tag(*b"INAM");
pub const NAME: Tag = Tag(*b"NAME");
pub const ONAM: Tag = Tag(*b"ONAM");
pub const PNAM: Tag = Tag(*b"PNAM");
pub const QNAM: Tag = Tag(*b"QNAM");
pub const RNAM: Tag = Tag(*b"RNAM");
pub const TNAM: Tag = Tag(*b"TNAM");
pub const UNAM: Tag = Tag(*b"UNAM");
pub const VNAM: Tag = Tag(*b"VNAM");
pub const WNAM: Tag = Tag(*b"WNAM");
pub const XNAM: Tag = Tag(*b"XNAM");
pub const YNAM: Tag = Tag(*b"YNAM");
pub const ZNAM: Tag = Tag(*b"ZNAM");

// Actors.
pub const TPLT: Tag = Tag(*b"TPLT");
pub const VTCK: Tag = Tag(*b"VTCK");
pub const PKID: Tag = Tag(*b"PKID");
pub const SPLO: Tag = Tag(*b"SPLO");

// Items.
pub const NAM0: Tag = Tag(*b"NAM0");
pub const NAM2: Tag = Tag(*b"NAM2");
pub const EITM: Tag = Tag(*b"EITM");
pub const WMI1: Tag = Tag(*b"WMI1");
pub const WMI2: Tag = Tag(*b"WMI2");
pub const WMI3: Tag = Tag(*b"WMI3");
pub const BMDT: Tag = Tag(*b"BMDT");
pub const DAT2: Tag = Tag(*b"DAT2");
pub const ITXT: Tag = Tag(*b"ITXT");
pub const RCIL: Tag = Tag(*b"RCIL");
pub const RCOD: Tag = Tag(*b"RCOD");
pub const RCQY: Tag = Tag(*b"RCQY");

// Dialogue.
pub const TPIC: Tag = Tag(*b"TPIC");
pub const NAM1: Tag = Tag(*b"NAM1");
pub const TRDT: Tag = Tag(*b"TRDT");
pub const TCLT: Tag = Tag(*b"TCLT");
pub const TCLF: Tag = Tag(*b"TCLF");
pub const QSTI: Tag = Tag(*b"QSTI");

// Quests.
pub const INDX: Tag = Tag(*b"INDX");
pub const QOBJ: Tag = Tag(*b"QOBJ");
pub const QSDT: Tag = Tag(*b"QSDT");
pub const CTDA: Tag = Tag(*b"CTDA");
pub const NNAM: Tag = Tag(*b"NNAM");

// Scripts.
pub const SCHR: Tag = Tag(*b"SCHR");
pub const SCDA: Tag = Tag(*b"SCDA");
pub const SCTX: Tag = Tag(*b"SCTX");
pub const SLSD: Tag = Tag(*b"SLSD");
pub const SCVR: Tag = Tag(*b"SCVR");
pub const SCRO: Tag = Tag(*b"SCRO");
pub const SCRV: Tag = Tag(*b"SCRV");

// Packages.
pub const PKDT: Tag = Tag(*b"PKDT");
pub const PSDT: Tag = Tag(*b"PSDT");
pub const PTDT: Tag = Tag(*b"PTDT");
pub const PKPT: Tag = Tag(*b"PKPT");

// Leveled lists.
pub const LVLD: Tag = Tag(*b"LVLD");
pub const LVLF: Tag = Tag(*b"LVLF");
pub const LVLO: Tag = Tag(*b"LVLO");
pub const LVLG: Tag = Tag(*b"LVLG");

// Inventory, factions, effects.
pub const CNTO: Tag = Tag(*b"CNTO");
pub const SNDD: Tag = Tag(*b"SNDD");
pub const EFID: Tag = Tag(*b"EFID");
pub const EFIT: Tag = Tag(*b"EFIT");
pub const SPIT: Tag = Tag(*b"SPIT");
pub const ENIT: Tag = Tag(*b"ENIT");
pub const XESP: Tag = Tag(*b"XESP");
pub const ACBS: Tag = Tag(*b"ACBS");
pub const AIDT: Tag = Tag(*b"AIDT");
pub const FLTV: Tag = Tag(*b"FLTV");
pub const XSCL: Tag = Tag(*b"XSCL");
pub const XOWN: Tag = Tag(*b"XOWN");
pub const XCLC: Tag = Tag(*b"XCLC");
pub const XCLW: Tag = Tag(*b"XCLW");
pub const LNAM: Tag = Tag(*b"LNAM");
pub const MNAM: Tag = Tag(*b"MNAM");

/// 8-bit form-type codes as stored at `TESForm + 4` on the console
/// target and in the runtime editor-ID hash table.
///
/// The values were mapped empirically from dump samples; an unknown
/// code simply fails conversion and the entry is handled generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum FormType {
    None = 0,
    FileHeader = 1,
    Group = 2,
    GameSetting = 3,
    TextureSet = 4,
    MenuIcon = 5,
    Global = 6,
    Class = 7,
    Faction = 8,
    HeadPart = 9,
    Hair = 10,
    Eyes = 11,
    Race = 12,
    Sound = 13,
    AcousticSpace = 14,
    Skill = 15,
    BaseEffect = 16,
    Script = 17,
    LandTexture = 18,
    Enchantment = 19,
    Spell = 20,
    Activator = 21,
    TalkingActivator = 22,
    Terminal = 23,
    Armor = 24,
    Book = 25,
    Container = 26,
    Door = 27,
    Ingredient = 28,
    Light = 29,
    MiscItem = 30,
    Static = 31,
    StaticCollection = 32,
    MovableStatic = 33,
    PlaceableWater = 34,
    Grass = 35,
    Tree = 36,
    Flora = 37,
    Furniture = 38,
    Weapon = 39,
    Ammo = 40,
    Npc = 41,
    Creature = 42,
    LeveledCreature = 43,
    LeveledNpc = 44,
    Key = 45,
    Consumable = 46,
    IdleMarker = 47,
    Note = 48,
    ConstructibleObject = 49,
    Projectile = 50,
    LeveledItem = 51,
    Weather = 52,
    Climate = 53,
    Region = 54,
    NavMeshInfo = 55,
    Cell = 56,
    PlacedObject = 57,
    PlacedNpc = 58,
    PlacedCreature = 59,
    PlacedMissile = 60,
    PlacedGrenade = 61,
    PlacedBeam = 62,
    PlacedFlame = 63,
    Worldspace = 64,
    Land = 65,
    NavMesh = 66,
    Tlod = 67,
    DialogTopic = 68,
    DialogInfo = 69,
    Quest = 70,
    Idle = 71,
    Package = 72,
    CombatStyle = 73,
    LoadScreen = 74,
    AnimatedObject = 75,
    Water = 76,
    EffectShader = 77,
    Toft = 78,
    Explosion = 79,
    Debris = 80,
    ImageSpace = 81,
    ImageSpaceAdapter = 82,
    FormList = 83,
    Perk = 84,
    BodyPartData = 85,
    AddonNode = 86,
    ActorValueInfo = 87,
    RadiationStage = 88,
    CameraShot = 89,
    CameraPath = 90,
    VoiceType = 91,
    ImpactData = 92,
    ImpactDataSet = 93,
    ArmorAddon = 94,
    EncounterZone = 95,
    Message = 96,
    Ragdoll = 97,
    DefaultObjectManager = 98,
    LightingTemplate = 99,
    MusicType = 100,
    WeaponMod = 101,
    Reputation = 102,
    Recipe = 103,
    RecipeCategory = 104,
    CasinoChip = 105,
    Casino = 106,
    LoadScreenType = 107,
    MediaSet = 108,
    MediaLocationController = 109,
    Challenge = 110,
    AmmoEffect = 111,
    CaravanCard = 112,
    CaravanMoney = 113,
    CaravanDeck = 114,
    DehydrationStage = 115,
    HungerStage = 116,
    SleepDeprivationStage = 117,
}

impl FormType {
    /// The 4-character record tag matching this runtime code, where one
    /// exists.
    #[must_use]
    pub fn tag(self) -> Option<Tag> {
        Some(match self {
            Self::GameSetting => GMST,
            Self::Global => GLOB,
            Self::Class => CLAS,
            Self::Faction => FACT,
            Self::Race => RACE,
            Self::BaseEffect => MGEF,
            Self::Script => SCPT,
            Self::Enchantment => ENCH,
            Self::Spell => SPEL,
            Self::Activator => ACTI,
            Self::Terminal => TERM,
            Self::Armor => ARMO,
            Self::Book => BOOK,
            Self::Container => CONT,
            Self::Door => DOOR,
            Self::Light => LIGH,
            Self::MiscItem => MISC,
            Self::Static => STAT,
            Self::Furniture => FURN,
            Self::Weapon => WEAP,
            Self::Ammo => AMMO,
            Self::Npc => NPC_,
            Self::Creature => CREA,
            Self::LeveledCreature => LVLC,
            Self::LeveledNpc => LVLN,
            Self::Key => KEYM,
            Self::Consumable => ALCH,
            Self::Note => NOTE,
            Self::Projectile => PROJ,
            Self::LeveledItem => LVLI,
            Self::Cell => CELL,
            Self::PlacedObject => REFR,
            Self::PlacedNpc => ACHR,
            Self::PlacedCreature => ACRE,
            Self::Worldspace => WRLD,
            Self::Land => LAND,
            Self::DialogTopic => DIAL,
            Self::DialogInfo => INFO,
            Self::Quest => QUST,
            Self::Package => PACK,
            Self::Explosion => EXPL,
            Self::FormList => FLST,
            Self::Perk => PERK,
            Self::Message => MESG,
            Self::WeaponMod => IMOD,
            Self::Reputation => REPU,
            Self::Recipe => RCPE,
            Self::Challenge => CHAL,
            _ => return None,
        })
    }

    /// Reverse of [`FormType::tag`].
    #[must_use]
    pub fn from_tag(tag: Tag) -> Option<Self> {
        // The table is small and cold; scanning it beats maintaining a
        // second match arm per type.
        (0u8..=117)
            .filter_map(|code| Self::try_from(code).ok())
            .find(|ft| ft.tag() == Some(tag))
    }
}

#[test]
fn form_type_tag_roundtrip() {
    for code in 0u8..=117 {
        let Ok(ft) = FormType::try_from(code) else { continue };
        if let Some(tag) = ft.tag() {
            assert_eq!(FormType::from_tag(tag), Some(ft), "{tag}");
        }
    }
    assert_eq!(FormType::from_tag(WEAP), Some(FormType::Weapon));
    assert_eq!(FormType::from_tag(Tag(*b"ZZZZ")), None);
    assert!(FormType::try_from(200u8).is_err());
}
