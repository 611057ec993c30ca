use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, Transaction};

use coedit_core::{AssetId, EditTree, FieldRef, HistoryId};

use crate::error::StoreError;
use crate::traits::{
    ChangeAction, EditStore, ExportBundle, HistoryRecord, ImportOutcome, ImportRecord,
};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StoreError> {
    v.try_into()
        .map_err(|_| StoreError::Serialization(format!("invalid {label} length")))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub struct SqliteEditStore {
    conn: Connection,
}

impl SqliteEditStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn read_history_row(row: &rusqlite::Row) -> Result<HistoryRecord, StoreError> {
    let id_bytes: Vec<u8> = row.get(0)?;
    let asset_raw: i64 = row.get(1)?;
    let field_kind: String = row.get(2)?;
    let sub_id: String = row.get(3)?;
    let sub_key: String = row.get(4)?;
    let action: String = row.get(5)?;

    let asset_id = u32::try_from(asset_raw)
        .map(AssetId::new)
        .map_err(|_| StoreError::Serialization(format!("asset id out of range: {asset_raw}")))?;

    Ok(HistoryRecord {
        id: HistoryId::from_bytes(to_array::<16>(id_bytes, "history id")?),
        field: FieldRef::from_parts(asset_id, &field_kind, &sub_id, &sub_key)?,
        action: ChangeAction::parse(&action)?,
        old_value: row.get(6)?,
        new_value: row.get(7)?,
        admin_name: row.get(8)?,
        created_at: row.get(9)?,
    })
}

const HISTORY_COLUMNS: &str =
    "id, asset_id, field_kind, sub_id, sub_key, action, old_value, new_value, admin_name, created_at";

fn append_history_tx(
    tx: &Transaction,
    field: &FieldRef,
    action: ChangeAction,
    old_value: &str,
    new_value: &str,
    admin_name: &str,
    created_at: i64,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO edit_history (id, asset_id, field_kind, sub_id, sub_key, action, old_value, new_value, admin_name, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            HistoryId::new().as_bytes().as_slice(),
            field.asset_id().raw(),
            field.kind_str(),
            field.sub_id(),
            field.sub_key(),
            action.as_str(),
            old_value,
            new_value,
            admin_name,
            created_at,
        ],
    )?;
    Ok(())
}

/// Upsert (or delete, for an empty value) a single field and append the
/// matching history record. One history row per observable change.
fn write_field_tx(
    tx: &Transaction,
    field: &FieldRef,
    value: &str,
    admin_name: &str,
) -> Result<(), StoreError> {
    let prior: Option<String> = tx
        .query_row(
            "SELECT value FROM asset_edits WHERE asset_id = ?1 AND field_kind = ?2 AND sub_id = ?3 AND sub_key = ?4",
            rusqlite::params![
                field.asset_id().raw(),
                field.kind_str(),
                field.sub_id(),
                field.sub_key(),
            ],
            |row| row.get(0),
        )
        .optional()?;

    let now = now_millis();
    if value.is_empty() {
        // Clearing a field that was never set changes nothing.
        let Some(old_value) = prior else {
            return Ok(());
        };
        tx.execute(
            "DELETE FROM asset_edits WHERE asset_id = ?1 AND field_kind = ?2 AND sub_id = ?3 AND sub_key = ?4",
            rusqlite::params![
                field.asset_id().raw(),
                field.kind_str(),
                field.sub_id(),
                field.sub_key(),
            ],
        )?;
        append_history_tx(tx, field, ChangeAction::Deleted, &old_value, "", admin_name, now)?;
    } else {
        tx.execute(
            "INSERT INTO asset_edits (asset_id, field_kind, sub_id, sub_key, value, updated_at, updated_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(asset_id, field_kind, sub_id, sub_key)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at, updated_by = excluded.updated_by",
            rusqlite::params![
                field.asset_id().raw(),
                field.kind_str(),
                field.sub_id(),
                field.sub_key(),
                value,
                now,
                admin_name,
            ],
        )?;
        let action = if prior.is_some() {
            ChangeAction::Updated
        } else {
            ChangeAction::Created
        };
        append_history_tx(
            tx,
            field,
            action,
            prior.as_deref().unwrap_or(""),
            value,
            admin_name,
            now,
        )?;
    }
    Ok(())
}

impl EditStore for SqliteEditStore {
    fn fetch_all_edits(&self) -> Result<EditTree, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT asset_id, field_kind, sub_id, sub_key, value FROM asset_edits
             ORDER BY asset_id, field_kind, sub_id, sub_key",
        )?;
        let mut rows = stmt.query([])?;
        let mut tree = EditTree::new();
        while let Some(row) = rows.next()? {
            let asset_raw: i64 = row.get(0)?;
            let field_kind: String = row.get(1)?;
            let sub_id: String = row.get(2)?;
            let sub_key: String = row.get(3)?;
            let value: String = row.get(4)?;
            let asset_id = u32::try_from(asset_raw).map(AssetId::new).map_err(|_| {
                StoreError::Serialization(format!("asset id out of range: {asset_raw}"))
            })?;
            let field = FieldRef::from_parts(asset_id, &field_kind, &sub_id, &sub_key)?;
            tree.apply(&field, &value);
        }
        Ok(tree)
    }

    fn save_field(
        &mut self,
        field: &FieldRef,
        value: &str,
        admin_name: &str,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        write_field_tx(&tx, field, value, admin_name)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_asset_edits(
        &mut self,
        asset_id: AssetId,
        admin_name: &str,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let removed: Vec<(String, String, String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT field_kind, sub_id, sub_key, value FROM asset_edits WHERE asset_id = ?1",
            )?;
            let mut rows = stmt.query(rusqlite::params![asset_id.raw()])?;
            let mut removed = Vec::new();
            while let Some(row) = rows.next()? {
                removed.push((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?));
            }
            removed
        };
        let now = now_millis();
        for (field_kind, sub_id, sub_key, value) in &removed {
            let field = FieldRef::from_parts(asset_id, field_kind, sub_id, sub_key)?;
            append_history_tx(&tx, &field, ChangeAction::Deleted, value, "", admin_name, now)?;
        }
        tx.execute(
            "DELETE FROM asset_edits WHERE asset_id = ?1",
            rusqlite::params![asset_id.raw()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn fetch_history(&self, asset_id: AssetId) -> Result<Vec<HistoryRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM edit_history WHERE asset_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let mut rows = stmt.query(rusqlite::params![asset_id.raw()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(read_history_row(row)?);
        }
        Ok(records)
    }

    fn history_record(&self, id: HistoryId) -> Result<Option<HistoryRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {HISTORY_COLUMNS} FROM edit_history WHERE id = ?1"))?;
        let mut rows = stmt.query(rusqlite::params![id.as_bytes().as_slice()])?;
        match rows.next()? {
            Some(row) => Ok(Some(read_history_row(row)?)),
            None => Ok(None),
        }
    }

    fn rollback(&mut self, id: HistoryId, admin_name: &str) -> Result<(), StoreError> {
        let record = self
            .history_record(id)?
            .ok_or(StoreError::HistoryNotFound(id))?;
        let tx = self.conn.transaction()?;
        write_field_tx(&tx, &record.field, &record.old_value, admin_name)?;
        tx.commit()?;
        Ok(())
    }

    fn export_all(&self) -> Result<ExportBundle, StoreError> {
        let assets = self.fetch_all_edits()?;
        Ok(ExportBundle {
            total_modified: assets.len() as u64,
            assets,
        })
    }

    fn import_batch(
        &mut self,
        records: &[ImportRecord],
        admin_name: &str,
    ) -> Result<ImportOutcome, StoreError> {
        let mut outcome = ImportOutcome::default();
        for record in records {
            let mut modifications = record.modifications.clone();
            modifications.normalize();
            if modifications.is_empty() {
                outcome
                    .errors
                    .push(format!("asset {}: no modifications to import", record.asset_id));
                continue;
            }
            // One transaction per record so a bad record rolls back alone.
            let result = (|| -> Result<(), StoreError> {
                let tx = self.conn.transaction()?;
                for (field, value) in modifications.fields(record.asset_id) {
                    write_field_tx(&tx, &field, value, admin_name)?;
                }
                tx.commit()?;
                Ok(())
            })();
            match result {
                Ok(()) => outcome.imported += 1,
                Err(e) => outcome.errors.push(format!("asset {}: {e}", record.asset_id)),
            }
        }
        Ok(outcome)
    }
}
