use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard};

use coedit_core::{AssetId, EditTree, FieldRef, HistoryId};
use coedit_storage::{
    ChangeNotifier, EditStore, ExportBundle, HistoryRecord, ImportOutcome, ImportRecord,
    SqliteEditStore, StoreError,
};

/// Cloneable handle to one store shared by several admin sessions, the
/// way the real deployment shares one backend. Writes fan out through the
/// change notifier after the store lock is released, so a subscriber may
/// immediately re-enter the store.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<SqliteEditStore>>,
    notifier: ChangeNotifier,
}

impl SharedStore {
    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            inner: Arc::new(Mutex::new(SqliteEditStore::open_in_memory()?)),
            notifier: ChangeNotifier::new(),
        })
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteEditStore>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

impl EditStore for SharedStore {
    fn fetch_all_edits(&self) -> Result<EditTree, StoreError> {
        self.lock()?.fetch_all_edits()
    }

    fn save_field(
        &mut self,
        field: &FieldRef,
        value: &str,
        admin_name: &str,
    ) -> Result<(), StoreError> {
        self.lock()?.save_field(field, value, admin_name)?;
        self.notifier.notify();
        Ok(())
    }

    fn delete_asset_edits(
        &mut self,
        asset_id: AssetId,
        admin_name: &str,
    ) -> Result<(), StoreError> {
        self.lock()?.delete_asset_edits(asset_id, admin_name)?;
        self.notifier.notify();
        Ok(())
    }

    fn fetch_history(&self, asset_id: AssetId) -> Result<Vec<HistoryRecord>, StoreError> {
        self.lock()?.fetch_history(asset_id)
    }

    fn history_record(&self, id: HistoryId) -> Result<Option<HistoryRecord>, StoreError> {
        self.lock()?.history_record(id)
    }

    fn rollback(&mut self, id: HistoryId, admin_name: &str) -> Result<(), StoreError> {
        self.lock()?.rollback(id, admin_name)?;
        self.notifier.notify();
        Ok(())
    }

    fn export_all(&self) -> Result<ExportBundle, StoreError> {
        self.lock()?.export_all()
    }

    fn import_batch(
        &mut self,
        records: &[ImportRecord],
        admin_name: &str,
    ) -> Result<ImportOutcome, StoreError> {
        let outcome = self.lock()?.import_batch(records, admin_name)?;
        self.notifier.notify();
        Ok(outcome)
    }
}

/// Store wrapper with one-shot injectable failures, standing in for a
/// flaky transport.
pub struct FlakyStore<S> {
    inner: S,
    fail_fetches: Cell<u32>,
    fail_saves: Cell<u32>,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_fetches: Cell::new(0),
            fail_saves: Cell::new(0),
        }
    }

    /// Arm one additional fetch failure.
    pub fn fail_next_fetch(&self) {
        self.fail_fetches.set(self.fail_fetches.get() + 1);
    }

    /// Arm one additional save failure.
    pub fn fail_next_save(&self) {
        self.fail_saves.set(self.fail_saves.get() + 1);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn take(cell: &Cell<u32>) -> bool {
        let armed = cell.get();
        if armed > 0 {
            cell.set(armed - 1);
            true
        } else {
            false
        }
    }
}

impl<S: EditStore> EditStore for FlakyStore<S> {
    fn fetch_all_edits(&self) -> Result<EditTree, StoreError> {
        if Self::take(&self.fail_fetches) {
            return Err(StoreError::Unavailable("injected fetch failure".to_string()));
        }
        self.inner.fetch_all_edits()
    }

    fn save_field(
        &mut self,
        field: &FieldRef,
        value: &str,
        admin_name: &str,
    ) -> Result<(), StoreError> {
        if Self::take(&self.fail_saves) {
            return Err(StoreError::Unavailable("injected save failure".to_string()));
        }
        self.inner.save_field(field, value, admin_name)
    }

    fn delete_asset_edits(
        &mut self,
        asset_id: AssetId,
        admin_name: &str,
    ) -> Result<(), StoreError> {
        self.inner.delete_asset_edits(asset_id, admin_name)
    }

    fn fetch_history(&self, asset_id: AssetId) -> Result<Vec<HistoryRecord>, StoreError> {
        self.inner.fetch_history(asset_id)
    }

    fn history_record(&self, id: HistoryId) -> Result<Option<HistoryRecord>, StoreError> {
        self.inner.history_record(id)
    }

    fn rollback(&mut self, id: HistoryId, admin_name: &str) -> Result<(), StoreError> {
        self.inner.rollback(id, admin_name)
    }

    fn export_all(&self) -> Result<ExportBundle, StoreError> {
        self.inner.export_all()
    }

    fn import_batch(
        &mut self,
        records: &[ImportRecord],
        admin_name: &str,
    ) -> Result<ImportOutcome, StoreError> {
        self.inner.import_batch(records, admin_name)
    }
}
