//! FormID ↔ editor-ID ↔ display-name index.
//!
//! Names arrive from three feeds of unequal trust: caller-supplied
//! correlations, `EDID` anchors tied to the nearest preceding record
//! header, and entries lifted from the runtime editor-ID hash table.
//! A higher-trust feed never loses to a lower one, and within a feed
//! the first binding for a form ID wins.

use std::collections::HashMap;

use log::debug;

use crate::records::{FormId, PLAYER_FORM_ID, PLAYER_REF_FORM_ID};
use crate::scan::{RuntimeEntry, ScanResult};

/// Where a binding came from, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Source {
    Injected,
    Runtime,
    EsmEdid,
    Correlation,
}

#[derive(Debug, Clone)]
struct Binding {
    editor_id: String,
    source: Source,
}

/// The only structure mutated while reconstruction runs. Handlers may
/// insert an editor-ID binding whenever they encounter one.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    bindings: HashMap<FormId, Binding>,
    display_names: HashMap<FormId, String>,
    /// First-bind order, so the reverse index is deterministic.
    order: Vec<FormId>,
    runtime_entries: Vec<RuntimeEntry>,
    reverse: HashMap<String, FormId>,
}

impl IdentityIndex {
    /// Build the index from the three feeds plus the engine injections.
    ///
    /// `correlations` must map form IDs to *editor IDs*; feeding display
    /// names here swaps fields downstream.
    #[must_use]
    pub fn build(correlations: &[(FormId, String)], scan: &ScanResult) -> Self {
        let mut index = Self::default();
        for (form_id, editor_id) in correlations {
            index.bind(*form_id, editor_id.clone(), Source::Correlation);
        }
        for anchor in &scan.editor_ids {
            if let Some(record) = scan.record_at_or_before(anchor.offset) {
                index.bind(record.form_id, anchor.value.clone(), Source::EsmEdid);
            }
        }
        for entry in &scan.runtime_entries {
            index.bind(entry.form_id, entry.editor_id.clone(), Source::Runtime);
            index.runtime_entries.push(entry.clone());
        }
        index.bind(PLAYER_FORM_ID, "Player".to_string(), Source::Injected);
        index.bind(PLAYER_REF_FORM_ID, "PlayerRef".to_string(), Source::Injected);
        debug!("identity index: {} bindings", index.bindings.len());
        index
    }

    /// Insert or upgrade a binding. Empty names are ignored; a binding
    /// is replaced only by a strictly stronger source.
    pub fn bind(&mut self, form_id: FormId, editor_id: String, source: Source) {
        if editor_id.is_empty() {
            return;
        }
        match self.bindings.get_mut(&form_id) {
            None => {
                self.bindings.insert(form_id, Binding { editor_id, source });
                self.order.push(form_id);
            }
            Some(existing) if source > existing.source => {
                *existing = Binding { editor_id, source };
            }
            Some(_) => {}
        }
    }

    /// Record a display name seen for a form. First non-empty wins.
    pub fn set_display_name(&mut self, form_id: FormId, name: &str) {
        if !name.is_empty() {
            self.display_names.entry(form_id).or_insert_with(|| name.to_string());
        }
    }

    #[must_use]
    pub fn editor_id(&self, form_id: FormId) -> Option<&str> {
        self.bindings.get(&form_id).map(|b| b.editor_id.as_str())
    }

    #[must_use]
    pub fn display_name(&self, form_id: FormId) -> Option<&str> {
        self.display_names.get(&form_id).map(String::as_str)
    }

    /// Entries lifted from the runtime hash table, in scan order.
    #[must_use]
    pub fn runtime_entries(&self) -> &[RuntimeEntry] {
        &self.runtime_entries
    }

    /// Build the editor-ID → FormID reverse index. Called once after
    /// reconstruction; duplicate names resolve to their first binding.
    pub fn build_reverse(&mut self) {
        self.reverse.clear();
        for form_id in &self.order {
            if let Some(binding) = self.bindings.get(form_id) {
                self.reverse.entry(binding.editor_id.clone()).or_insert(*form_id);
            }
        }
    }

    #[must_use]
    pub fn form_id_by_editor_id(&self, editor_id: &str) -> Option<FormId> {
        self.reverse.get(editor_id).copied()
    }

    /// Clone the forward maps for the catalog.
    #[must_use]
    pub fn export_maps(&self) -> (HashMap<FormId, String>, HashMap<FormId, String>) {
        let editor_ids = self
            .bindings
            .iter()
            .map(|(id, b)| (*id, b.editor_id.clone()))
            .collect();
        (editor_ids, self.display_names.clone())
    }
}
