use std::collections::BTreeSet;

use coedit_core::{AssetId, FieldRef};

/// Fields this writer has touched since its last conflict-free sync.
///
/// A field is marked the instant an edit is staged, before the persist
/// round trip begins, and leaves the set only when a load confirms it
/// conflict-free or a conflict on it is resolved. Ordered so conflict
/// presentation is stable.
#[derive(Debug, Clone, Default)]
pub struct DirtySet {
    fields: BTreeSet<FieldRef>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, field: FieldRef) {
        self.fields.insert(field);
    }

    pub fn clear(&mut self, field: &FieldRef) {
        self.fields.remove(field);
    }

    pub fn clear_all(&mut self) {
        self.fields.clear();
    }

    /// Drop every dirty field belonging to one asset.
    pub fn clear_asset(&mut self, asset_id: AssetId) {
        self.fields.retain(|f| f.asset_id() != asset_id);
    }

    pub fn contains(&self, field: &FieldRef) -> bool {
        self.fields.contains(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldRef> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
