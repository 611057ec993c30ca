use serde::{Deserialize, Serialize};

use coedit_core::{AssetEdits, AssetId, EditTree, FieldRef, HistoryId};

use crate::error::StoreError;

/// What a history entry records about the field it touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            _ => Err(StoreError::Serialization(format!(
                "unknown change action: {s}"
            ))),
        }
    }
}

/// One append-only history entry. Never mutated after being written; a
/// rollback appends a fresh record instead of touching this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub field: FieldRef,
    pub action: ChangeAction,
    pub old_value: String,
    pub new_value: String,
    pub admin_name: String,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// Full dump of the store, portable between deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub total_modified: u64,
    pub assets: EditTree,
}

impl ExportBundle {
    pub fn to_msgpack(&self) -> Result<Vec<u8>, StoreError> {
        rmp_serde::to_vec_named(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, StoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub asset_id: AssetId,
    pub modifications: AssetEdits,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: u64,
    pub errors: Vec<String>,
}

/// The shared remote store every admin session talks to. Each operation is
/// a request/response round trip and may fail; individual field writes are
/// applied atomically and concurrent writes to the same field serialize in
/// submission order.
pub trait EditStore {
    fn fetch_all_edits(&self) -> Result<EditTree, StoreError>;

    /// Upsert one field (empty value deletes it) and append exactly one
    /// history record when anything changed.
    fn save_field(
        &mut self,
        field: &FieldRef,
        value: &str,
        admin_name: &str,
    ) -> Result<(), StoreError>;

    /// Remove every override for an asset, one `Deleted` record per field.
    fn delete_asset_edits(&mut self, asset_id: AssetId, admin_name: &str)
        -> Result<(), StoreError>;

    /// History for one asset, most recent first.
    fn fetch_history(&self, asset_id: AssetId) -> Result<Vec<HistoryRecord>, StoreError>;

    fn history_record(&self, id: HistoryId) -> Result<Option<HistoryRecord>, StoreError>;

    /// Re-save the record's old value at its field, producing a fresh
    /// forward history record. `HistoryNotFound` when the id is unknown.
    fn rollback(&mut self, id: HistoryId, admin_name: &str) -> Result<(), StoreError>;

    fn export_all(&self) -> Result<ExportBundle, StoreError>;

    /// Import a batch of per-asset records. Per-record failures land in
    /// `errors`; the batch itself never aborts.
    fn import_batch(
        &mut self,
        records: &[ImportRecord],
        admin_name: &str,
    ) -> Result<ImportOutcome, StoreError>;
}
