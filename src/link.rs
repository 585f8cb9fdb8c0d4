//! Late-phase cross-reference passes.
//!
//! Every pass here is deterministic and idempotent: running a pass a
//! second time over a completed catalog changes nothing. Order matters
//! between passes (speaker propagation needs topics linked first,
//! virtual cells must exist before cell↔worldspace linking) and is
//! owned by the orchestrator.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::identity::IdentityIndex;
use crate::memory::DumpView;
use crate::records::*;
use crate::scan::ScanResult;
use crate::schema::tags;
use crate::structread::StructReader;
use crate::subrecord::Tag;

/// Cell-grid anchors further than this from their cell header are not
/// considered part of the record. Heuristic bound, deliberately
/// tunable in one place.
pub const CELL_GRID_PROXIMITY: u64 = 200;

/// Synthetic form IDs are carved from a range no master file uses.
const VIRTUAL_CELL_BASE: FormId = 0xFF00_0100;

/// Counters reported by the dialogue-topic runtime merge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DialogueLinkStats {
    pub updated_infos: usize,
    pub new_infos: usize,
}

/// Walk each runtime topic's embedded quest-info list, updating infos
/// the catalog already holds and materializing the ones it does not.
pub fn link_topics_runtime<V: DumpView + ?Sized>(
    catalog: &mut Catalog,
    reader: &StructReader<'_, V>,
    identity: &IdentityIndex,
) -> DialogueLinkStats {
    let mut stats = DialogueLinkStats::default();
    let runtime_topics: Vec<_> = identity
        .runtime_entries()
        .iter()
        .filter(|e| e.form_type_code == crate::schema::tags::FormType::DialogTopic as u8)
        .cloned()
        .collect();

    for entry in runtime_topics {
        let topic_id = entry.form_id;
        for (quest, info_vas) in reader.topic_quest_infos(&entry) {
            for va in info_vas {
                let Some(runtime_info) = reader.read_info_at(va) else { continue };
                let info_id = runtime_info.header.form_id;
                if let Some(existing) = catalog.info_by_id_mut(info_id) {
                    if existing.topic.is_none() {
                        existing.topic = Some(topic_id);
                    }
                    if existing.quest.is_none() {
                        existing.quest = Some(quest);
                    }
                    stats.updated_infos += 1;
                } else {
                    let mut info = runtime_info;
                    info.topic = Some(topic_id);
                    info.quest = Some(quest);
                    if catalog.push_dialog_info(info) {
                        stats.new_infos += 1;
                    }
                }
                attach_info_to_topic(catalog, topic_id, info_id);
                if let Some(topic) = catalog
                    .dialog_topics
                    .iter_mut()
                    .find(|t| t.header.form_id == topic_id)
                {
                    if !topic.quests.contains(&quest) {
                        topic.quests.push(quest);
                    }
                }
            }
        }
    }
    debug!(
        "dialogue runtime link: {} updated, {} new infos",
        stats.updated_infos, stats.new_infos
    );
    stats
}

/// ESM fallback: an info sits immediately after its owning topic in the
/// file's group layout, so link by offset ordering.
pub fn link_topics_by_offset(catalog: &mut Catalog) {
    let mut topics: Vec<(u64, FormId)> = catalog
        .dialog_topics
        .iter()
        .map(|t| (t.header.offset, t.header.form_id))
        .collect();
    topics.sort_unstable();

    let links: Vec<(FormId, FormId)> = catalog
        .dialog_infos
        .iter()
        .filter(|info| info.topic.is_none())
        .filter_map(|info| {
            let owner = topics
                .iter()
                .rev()
                .find(|(off, _)| *off < info.header.offset)?;
            Some((info.header.form_id, owner.1))
        })
        .collect();

    for (info_id, topic_id) in links {
        if let Some(info) = catalog.info_by_id_mut(info_id) {
            info.topic = Some(topic_id);
        }
        attach_info_to_topic(catalog, topic_id, info_id);
    }
}

fn attach_info_to_topic(catalog: &mut Catalog, topic_id: FormId, info_id: FormId) {
    if let Some(topic) = catalog
        .dialog_topics
        .iter_mut()
        .find(|t| t.header.form_id == topic_id)
    {
        if !topic.infos.contains(&info_id) {
            topic.infos.push(info_id);
        }
    }
}

/// Four short-circuiting speaker passes: topic speaker, sibling
/// speaker, quest-consistent speaker, then editor-ID prefix
/// conventions (longest quest prefix first).
pub fn propagate_speakers(catalog: &mut Catalog) {
    // Pass 1: topic-level TNAM onto infos lacking a speaker.
    let topic_speakers: Vec<(Vec<FormId>, FormId)> = catalog
        .dialog_topics
        .iter()
        .filter_map(|t| t.speaker.map(|s| (t.infos.clone(), s)))
        .collect();
    for (infos, speaker) in topic_speakers {
        for info_id in infos {
            if let Some(info) = catalog.info_by_id_mut(info_id) {
                if info.speaker.is_none() {
                    info.speaker = Some(speaker);
                }
            }
        }
    }

    // Pass 2: sibling propagation within a topic.
    let topic_infos: Vec<Vec<FormId>> =
        catalog.dialog_topics.iter().map(|t| t.infos.clone()).collect();
    for siblings in topic_infos {
        let known = siblings.iter().find_map(|id| {
            catalog
                .dialog_infos
                .iter()
                .find(|i| i.header.form_id == *id)
                .and_then(|i| i.speaker)
        });
        let Some(speaker) = known else { continue };
        for id in siblings {
            if let Some(info) = catalog.info_by_id_mut(id) {
                if info.speaker.is_none() {
                    info.speaker = Some(speaker);
                }
            }
        }
    }

    // Pass 3: a quest whose voiced infos all share one speaker lends it
    // to the rest.
    let mut per_quest: HashMap<FormId, HashSet<FormId>> = HashMap::new();
    for info in &catalog.dialog_infos {
        if let (Some(quest), Some(speaker)) = (info.quest, info.speaker) {
            per_quest.entry(quest).or_default().insert(speaker);
        }
    }
    let consistent: HashMap<FormId, FormId> = per_quest
        .iter()
        .filter_map(|(quest, speakers)| {
            let mut speakers = speakers.iter();
            match (speakers.next(), speakers.next()) {
                (Some(speaker), None) => Some((*quest, *speaker)),
                _ => None,
            }
        })
        .collect();
    for info in &mut catalog.dialog_infos {
        if info.speaker.is_none() {
            if let Some(speaker) = info.quest.and_then(|q| consistent.get(&q)) {
                info.speaker = Some(*speaker);
            }
        }
    }

    // Pass 4: info editor IDs that begin with a quest's editor ID
    // inherit that quest (and its consistent speaker), longest prefix
    // first.
    let mut quest_prefixes: Vec<(String, FormId)> = catalog
        .quests
        .iter()
        .filter_map(|q| q.header.editor_id.clone().map(|e| (e, q.header.form_id)))
        .collect();
    quest_prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
    for info in &mut catalog.dialog_infos {
        if info.quest.is_some() && info.speaker.is_some() {
            continue;
        }
        let Some(editor_id) = info.header.editor_id.as_deref() else { continue };
        let Some((_, quest_id)) = quest_prefixes
            .iter()
            .find(|(prefix, _)| editor_id.starts_with(prefix.as_str()))
        else {
            continue;
        };
        if info.quest.is_none() {
            info.quest = Some(*quest_id);
        }
        if info.speaker.is_none() {
            if let Some(speaker) = consistent.get(quest_id) {
                info.speaker = Some(*speaker);
            }
        }
    }
}

/// Quests referenced from dialogue but absent as records get synthetic
/// stubs so the tree has a parent to hang from.
pub fn backfill_orphan_quests(catalog: &mut Catalog, identity: &IdentityIndex) -> usize {
    let mut referenced: Vec<FormId> = Vec::new();
    for info in &catalog.dialog_infos {
        referenced.extend(info.quest);
    }
    for topic in &catalog.dialog_topics {
        referenced.extend(topic.quests.iter().copied());
    }
    referenced.sort_unstable();
    referenced.dedup();

    let existing: HashSet<FormId> =
        catalog.quests.iter().map(|q| q.header.form_id).collect();
    let mut added = 0;
    for quest_id in referenced {
        if existing.contains(&quest_id) {
            continue;
        }
        let mut header = RecordHeader::new(quest_id, 0, false);
        header.editor_id = identity.editor_id(quest_id).map(str::to_string);
        header.full_name = identity.display_name(quest_id).map(str::to_string);
        if catalog.push_quest(QuestRecord {
            header,
            script: None,
            flags: 0,
            priority: 0,
            quest_delay: 0.0,
            stages: Vec::new(),
            objectives: Vec::new(),
            synthesized: true,
        }) {
            added += 1;
        }
    }
    if added > 0 {
        debug!("backfilled {added} orphan quests");
    }
    added
}

/// Attach cells to worldspaces: scan-time mapping when present, grid
/// inference otherwise.
pub fn link_cells_worldspaces(catalog: &mut Catalog, scan: &ScanResult) {
    if !scan.cell_worldspaces.is_empty() {
        for cell in &mut catalog.cells {
            if cell.worldspace.is_none() {
                cell.worldspace = scan.cell_worldspaces.get(&cell.header.form_id).copied();
            }
        }
    } else if catalog.worldspaces.len() == 1 {
        // A single worldspace claims every exterior (gridded) cell.
        let world = catalog.worldspaces[0].header.form_id;
        for cell in &mut catalog.cells {
            if cell.worldspace.is_none() && cell.grid.is_some() {
                cell.worldspace = Some(world);
            }
        }
    }

    let memberships: Vec<(FormId, FormId)> = catalog
        .cells
        .iter()
        .filter_map(|c| c.worldspace.map(|w| (w, c.header.form_id)))
        .collect();
    for (world_id, cell_id) in memberships {
        if let Some(world) = catalog
            .worldspaces
            .iter_mut()
            .find(|w| w.header.form_id == world_id)
        {
            if !world.cells.contains(&cell_id) {
                world.cells.push(cell_id);
            }
        }
    }
}

/// When the scan produced no cell→reference grouping, orphaned placed
/// references get a synthetic container cell.
pub fn materialize_virtual_cells(catalog: &mut Catalog, scan: &ScanResult) -> usize {
    if !scan.cell_refs.is_empty() {
        // Real grouping exists; apply it instead.
        for (cell_id, refs) in &scan.cell_refs {
            for ref_id in refs {
                if let Some(placed) = catalog
                    .placed_refs
                    .iter_mut()
                    .find(|r| r.header.form_id == *ref_id)
                {
                    if placed.cell.is_none() {
                        placed.cell = Some(*cell_id);
                    }
                }
            }
            let members: Vec<FormId> = refs.clone();
            if let Some(cell) = catalog.cells.iter_mut().find(|c| c.header.form_id == *cell_id) {
                for member in members {
                    if !cell.references.contains(&member) {
                        cell.references.push(member);
                    }
                }
            }
        }
        return 0;
    }

    let orphans: Vec<FormId> = catalog
        .placed_refs
        .iter()
        .filter(|r| r.cell.is_none())
        .map(|r| r.header.form_id)
        .collect();
    if orphans.is_empty() {
        return 0;
    }

    let cell_id = VIRTUAL_CELL_BASE;
    if !catalog.cells.iter().any(|c| c.header.form_id == cell_id) {
        let mut header = RecordHeader::new(cell_id, 0, false);
        header.editor_id = Some("VirtualCell01".to_string());
        catalog.push_cell(CellRecord {
            header,
            flags: 0,
            grid: None,
            worldspace: None,
            water_height: 0.0,
            references: Vec::new(),
            synthesized: true,
        });
    }
    for orphan in &orphans {
        if let Some(placed) = catalog
            .placed_refs
            .iter_mut()
            .find(|r| r.header.form_id == *orphan)
        {
            placed.cell = Some(cell_id);
        }
    }
    if let Some(cell) = catalog.cells.iter_mut().find(|c| c.header.form_id == cell_id) {
        for orphan in orphans {
            if !cell.references.contains(&orphan) {
                cell.references.push(orphan);
            }
        }
        cell.references.len()
    } else {
        0
    }
}

/// Everything a base record can lend its placed instances.
#[derive(Debug, Clone, Default)]
struct BaseTraits {
    bounds: Option<ObjectBounds>,
    model: Option<String>,
    tag: Option<Tag>,
}

/// Index bounds and model paths across every kind that exposes them,
/// then enrich each placed reference from its base form.
pub fn enrich_placed_refs(catalog: &mut Catalog) {
    let mut traits: HashMap<FormId, BaseTraits> = HashMap::new();
    let mut index =
        |id: FormId, bounds: Option<ObjectBounds>, model: Option<&String>, tag: Tag| {
            traits.entry(id).or_insert_with(|| BaseTraits {
                bounds,
                model: model.cloned(),
                tag: Some(tag),
            });
        };

    for r in &catalog.actors {
        let tag = match r.kind {
            ActorKind::Npc => tags::NPC_,
            ActorKind::Creature => tags::CREA,
        };
        index(r.header.form_id, r.bounds, r.model.as_ref(), tag);
    }
    for r in &catalog.weapons {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::WEAP);
    }
    for r in &catalog.armor {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::ARMO);
    }
    for r in &catalog.ammo {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::AMMO);
    }
    for r in &catalog.consumables {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::ALCH);
    }
    for r in &catalog.misc_items {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::MISC);
    }
    for r in &catalog.keys {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::KEYM);
    }
    for r in &catalog.containers {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::CONT);
    }
    for r in &catalog.notes {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::NOTE);
    }
    for r in &catalog.books {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::BOOK);
    }
    for r in &catalog.terminals {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::TERM);
    }
    for r in &catalog.activators {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::ACTI);
    }
    for r in &catalog.lights {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::LIGH);
    }
    for r in &catalog.doors {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::DOOR);
    }
    for r in &catalog.statics {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::STAT);
    }
    for r in &catalog.furniture {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::FURN);
    }
    for r in &catalog.projectiles {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::PROJ);
    }
    for r in &catalog.explosions {
        index(r.header.form_id, r.bounds, r.model.as_ref(), tags::EXPL);
    }
    for r in &catalog.leveled_lists {
        index(r.header.form_id, None, None, r.kind);
    }

    for placed in &mut catalog.placed_refs {
        let Some(base) = traits.get(&placed.base) else { continue };
        if placed.bounds.is_none() {
            placed.bounds = base.bounds;
        }
        if placed.model.is_none() {
            placed.model = base.model.clone();
        }
        if placed.base_tag.is_none() {
            placed.base_tag = base.tag;
        }
    }
}

const SPAWN_DEPTH_CAP: usize = 8;

/// Resolve a representative spawn for references whose base is a
/// leveled actor list: first entry, chased through nested lists.
pub fn resolve_leveled_spawns(catalog: &mut Catalog) {
    let lists: HashMap<FormId, FormId> = catalog
        .leveled_lists
        .iter()
        .filter_map(|l| l.entries.first().map(|e| (l.header.form_id, e.form_id)))
        .collect();

    for placed in &mut catalog.placed_refs {
        if placed.leveled_spawn.is_some() {
            continue;
        }
        let mut target = placed.base;
        let mut depth = 0;
        while let Some(next) = lists.get(&target) {
            target = *next;
            depth += 1;
            if depth >= SPAWN_DEPTH_CAP {
                break;
            }
        }
        if depth > 0 {
            placed.leveled_spawn = Some(target);
        }
    }
}

/// Weapons that lack projectile data borrow it from their ammo.
pub fn link_weapon_projectiles(catalog: &mut Catalog) {
    let ammo_projectiles: HashMap<FormId, FormId> = catalog
        .ammo
        .iter()
        .filter_map(|a| a.projectile.map(|p| (a.header.form_id, p)))
        .collect();
    for weapon in &mut catalog.weapons {
        if weapon.projectile.is_none() {
            weapon.projectile = weapon.ammo.and_then(|a| ammo_projectiles.get(&a)).copied();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ScanResult;

    fn header(form_id: FormId, offset: u64) -> RecordHeader {
        RecordHeader::new(form_id, offset, false)
    }

    fn info(form_id: FormId, offset: u64) -> DialogInfoRecord {
        DialogInfoRecord {
            header: header(form_id, offset),
            quest: None,
            topic: None,
            speaker: None,
            previous_info: None,
            difficulty: 0,
            responses: Vec::new(),
            link_to: Vec::new(),
            link_from: Vec::new(),
            add_topics: Vec::new(),
        }
    }

    fn topic(form_id: FormId, offset: u64) -> DialogTopicRecord {
        DialogTopicRecord {
            header: header(form_id, offset),
            topic_type: 0,
            priority: 0.0,
            speaker: None,
            quests: Vec::new(),
            infos: Vec::new(),
        }
    }

    fn quest(form_id: FormId, editor_id: &str) -> QuestRecord {
        let mut h = header(form_id, 0);
        h.editor_id = Some(editor_id.to_string());
        QuestRecord {
            header: h,
            script: None,
            flags: 0,
            priority: 0,
            quest_delay: 0.0,
            stages: Vec::new(),
            objectives: Vec::new(),
            synthesized: false,
        }
    }

    #[test]
    fn offset_linking_assigns_nearest_preceding_topic() {
        let mut catalog = Catalog::default();
        catalog.push_dialog_topic(topic(0x1, 100));
        catalog.push_dialog_topic(topic(0x2, 500));
        catalog.push_dialog_info(info(0x10, 150));
        catalog.push_dialog_info(info(0x11, 600));

        link_topics_by_offset(&mut catalog);
        assert_eq!(catalog.dialog_infos[0].topic, Some(0x1));
        assert_eq!(catalog.dialog_infos[1].topic, Some(0x2));
        assert_eq!(catalog.dialog_topics[0].infos, vec![0x10]);

        // Idempotent.
        let before = catalog.clone();
        link_topics_by_offset(&mut catalog);
        assert_eq!(catalog.dialog_infos, before.dialog_infos);
        assert_eq!(catalog.dialog_topics, before.dialog_topics);
    }

    #[test]
    fn speaker_propagation_passes() {
        let mut catalog = Catalog::default();
        let mut t = topic(0x1, 0);
        t.speaker = Some(0xAA);
        t.infos = vec![0x10, 0x11];
        catalog.push_dialog_topic(t);
        catalog.push_dialog_info(info(0x10, 0));
        catalog.push_dialog_info(info(0x11, 0));

        // Quest-consistent speaker setup.
        let mut voiced = info(0x20, 0);
        voiced.quest = Some(0xB);
        voiced.speaker = Some(0xCC);
        catalog.push_dialog_info(voiced);
        let mut unvoiced = info(0x21, 0);
        unvoiced.quest = Some(0xB);
        catalog.push_dialog_info(unvoiced);

        // Editor-ID convention: VDialogueCraigTopic belongs to quest
        // VDialogueCraig, whose consistent speaker is 0xCC.
        catalog.push_quest(quest(0xB, "VDialogueCraig"));
        catalog.push_quest(quest(0xC, "VDialogue"));
        let mut conventional = info(0x30, 0);
        conventional.header.editor_id = Some("VDialogueCraigGreeting".to_string());
        catalog.push_dialog_info(conventional);

        propagate_speakers(&mut catalog);

        assert_eq!(catalog.dialog_infos[0].speaker, Some(0xAA));
        assert_eq!(catalog.dialog_infos[1].speaker, Some(0xAA));
        assert_eq!(catalog.dialog_infos[3].speaker, Some(0xCC));
        // Longest prefix wins: quest 0xB, not 0xC.
        assert_eq!(catalog.dialog_infos[4].quest, Some(0xB));
        assert_eq!(catalog.dialog_infos[4].speaker, Some(0xCC));

        let before = catalog.clone();
        propagate_speakers(&mut catalog);
        assert_eq!(catalog.dialog_infos, before.dialog_infos);
    }

    #[test]
    fn orphan_quests_are_backfilled_once() {
        let mut catalog = Catalog::default();
        let mut i = info(0x10, 0);
        i.quest = Some(0xB00);
        catalog.push_dialog_info(i);

        let mut scan = ScanResult::default();
        scan.runtime_entries.push(crate::scan::RuntimeEntry {
            editor_id: "VMQ03".to_string(),
            form_id: 0xB00,
            form_type_code: 70,
            tes_form_offset: None,
        });
        let identity = IdentityIndex::build(&[], &scan);

        assert_eq!(backfill_orphan_quests(&mut catalog, &identity), 1);
        assert_eq!(catalog.quests.len(), 1);
        let stub = &catalog.quests[0];
        assert!(stub.synthesized);
        assert_eq!(stub.header.form_id, 0xB00);
        assert_eq!(stub.header.editor_id.as_deref(), Some("VMQ03"));

        assert_eq!(backfill_orphan_quests(&mut catalog, &identity), 0);
    }

    #[test]
    fn single_worldspace_claims_gridded_cells() {
        let mut catalog = Catalog::default();
        catalog.push_worldspace(WorldspaceRecord {
            header: header(0x7, 0),
            parent: None,
            climate: None,
            water: None,
            cells: Vec::new(),
        });
        let exterior = CellRecord {
            header: header(0x100, 0),
            flags: 0,
            grid: Some((4, -2)),
            worldspace: None,
            water_height: 0.0,
            references: Vec::new(),
            synthesized: false,
        };
        let interior = CellRecord { header: header(0x101, 0), grid: None, ..exterior.clone() };
        catalog.push_cell(exterior);
        catalog.push_cell(interior);

        link_cells_worldspaces(&mut catalog, &ScanResult::default());
        assert_eq!(catalog.cells[0].worldspace, Some(0x7));
        assert_eq!(catalog.cells[1].worldspace, None);
        assert_eq!(catalog.worldspaces[0].cells, vec![0x100]);

        let before = catalog.clone();
        link_cells_worldspaces(&mut catalog, &ScanResult::default());
        assert_eq!(catalog.worldspaces, before.worldspaces);
    }

    fn placed(form_id: FormId, base: FormId) -> PlacedRefRecord {
        PlacedRefRecord {
            header: header(form_id, 0),
            base,
            base_tag: None,
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: 1.0,
            owner: None,
            cell: None,
            bounds: None,
            model: None,
            marker: None,
            leveled_spawn: None,
        }
    }

    #[test]
    fn virtual_cell_collects_orphans() {
        let mut catalog = Catalog::default();
        catalog.push_placed_ref(placed(0x900, 0x10));
        catalog.push_placed_ref(placed(0x901, 0x11));

        let collected = materialize_virtual_cells(&mut catalog, &ScanResult::default());
        assert_eq!(collected, 2);
        let cell = catalog.cells.iter().find(|c| c.synthesized).unwrap();
        assert_eq!(cell.references, vec![0x900, 0x901]);
        assert!(catalog.placed_refs.iter().all(|r| r.cell == Some(cell.header.form_id)));

        // Second run changes nothing and creates no second cell.
        materialize_virtual_cells(&mut catalog, &ScanResult::default());
        assert_eq!(catalog.cells.len(), 1);
    }

    #[test]
    fn placed_ref_enrichment_and_spawns() {
        let mut catalog = Catalog::default();
        let bounds = ObjectBounds { x1: -1, y1: -1, z1: 0, x2: 1, y2: 1, z2: 2 };
        catalog.push_static(StaticRecord {
            header: header(0x10, 0),
            bounds: Some(bounds),
            model: Some("clutter\\crate01.nif".to_string()),
        });
        catalog.push_leveled_list(LeveledListRecord {
            header: header(0x20, 0),
            kind: tags::LVLC,
            chance_none: 0,
            flags: LeveledFlags::default(),
            global: None,
            entries: vec![LeveledEntry { level: 1, form_id: 0x21, count: 1 }],
        });
        catalog.push_leveled_list(LeveledListRecord {
            header: header(0x21, 0),
            kind: tags::LVLC,
            chance_none: 0,
            flags: LeveledFlags::default(),
            global: None,
            entries: vec![LeveledEntry { level: 1, form_id: 0x55, count: 1 }],
        });
        catalog.push_placed_ref(placed(0x900, 0x10));
        catalog.push_placed_ref(placed(0x901, 0x20));

        enrich_placed_refs(&mut catalog);
        resolve_leveled_spawns(&mut catalog);

        assert_eq!(catalog.placed_refs[0].bounds, Some(bounds));
        assert_eq!(catalog.placed_refs[0].model.as_deref(), Some("clutter\\crate01.nif"));
        assert_eq!(catalog.placed_refs[0].base_tag, Some(tags::STAT));
        assert_eq!(catalog.placed_refs[0].leveled_spawn, None);
        // Nested list resolves through both levels.
        assert_eq!(catalog.placed_refs[1].leveled_spawn, Some(0x55));

        let before = catalog.clone();
        enrich_placed_refs(&mut catalog);
        resolve_leveled_spawns(&mut catalog);
        assert_eq!(catalog.placed_refs, before.placed_refs);
    }

    #[test]
    fn weapon_borrows_projectile_from_ammo() {
        let mut catalog = Catalog::default();
        catalog.push_ammo(AmmoRecord {
            header: header(0x50, 0),
            bounds: None,
            model: None,
            icon: None,
            script: None,
            short_name: None,
            speed: 1000.0,
            flags: 0,
            value: 2,
            clip_rounds: 0,
            projectile: Some(0x600),
            projectiles_per_shot: 1,
            weight: 0.1,
        });
        catalog.push_weapon(WeaponRecord {
            header: header(0x51, 0),
            bounds: None,
            model: None,
            icon: None,
            script: None,
            value: 0,
            health: 0,
            weight: 0.0,
            damage: 0,
            clip_rounds: 0,
            anim_type: 0,
            anim_mult: 0.0,
            reach: 0.0,
            min_spread: 0.0,
            spread: 0.0,
            sight_fov: 0.0,
            projectile: None,
            min_range: 0.0,
            max_range: 0.0,
            fire_rate: 0.0,
            ammo: Some(0x50),
            enchantment: None,
            sound_gunshot: None,
            weapon_mods: Vec::new(),
        });

        link_weapon_projectiles(&mut catalog);
        assert_eq!(catalog.weapons[0].projectile, Some(0x600));

        let before = catalog.clone();
        link_weapon_projectiles(&mut catalog);
        assert_eq!(catalog.weapons, before.weapons);
    }
}
