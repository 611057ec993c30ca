pub mod detect;
pub mod dirty;
pub mod error;
pub mod migrate;

pub use detect::{detect_conflicts, Conflict};
pub use dirty::DirtySet;
pub use error::SessionError;
pub use migrate::{convert_legacy_snapshot, import_legacy_snapshot, MigrationReport};

use coedit_core::{AssetEdits, AssetId, EditTree, FieldRef, HistoryId};
use coedit_storage::{EditStore, ExportBundle, HistoryRecord, ImportOutcome, ImportRecord, StoreError};

/// Which side of a conflict the writer keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the local value and write it through to the store.
    Mine,
    /// Take the server value into the local tree.
    Theirs,
}

/// What a `load()` issued while conflicts are still pending should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictLoadPolicy {
    /// Refuse with `SessionError::ConflictsPending`.
    #[default]
    Reject,
    /// Silently drop the request, reporting `LoadOutcome::Deferred`.
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Server state accepted wholesale; no dirty field disagreed.
    Clean,
    /// This many conflicts need a decision before the snapshot lands.
    Conflicted(usize),
    /// Dropped under `ConflictLoadPolicy::Ignore`.
    Deferred,
}

/// One admin client's edit-synchronization session.
///
/// Owns the local edit tree, the dirty set, the pending server snapshot,
/// and the pending conflict list. Not thread-safe by design: all local
/// mutation is synchronous, and the only suspension points a caller
/// observes are the store round trips.
pub struct SyncSession<S: EditStore> {
    store: S,
    admin_name: String,
    tree: EditTree,
    dirty: DirtySet,
    pending: Option<EditTree>,
    conflicts: Vec<Conflict>,
    has_loaded: bool,
    last_error: Option<String>,
    load_policy: ConflictLoadPolicy,
}

impl<S: EditStore> SyncSession<S> {
    pub fn new(store: S, admin_name: impl Into<String>) -> Self {
        Self {
            store,
            admin_name: admin_name.into(),
            tree: EditTree::new(),
            dirty: DirtySet::new(),
            pending: None,
            conflicts: Vec::new(),
            has_loaded: false,
            last_error: None,
            load_policy: ConflictLoadPolicy::default(),
        }
    }

    pub fn with_load_policy(mut self, policy: ConflictLoadPolicy) -> Self {
        self.load_policy = policy;
        self
    }

    pub fn admin_name(&self) -> &str {
        &self.admin_name
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // ========================================================================
    // Read-only projections
    // ========================================================================

    /// The tree the rendering layer reads. Everything else is session
    /// bookkeeping.
    pub fn edits(&self) -> &EditTree {
        &self.tree
    }

    pub fn asset_edits(&self, asset_id: AssetId) -> Option<&AssetEdits> {
        self.tree.get(asset_id)
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn is_conflicted(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn dirty_fields(&self) -> impl Iterator<Item = &FieldRef> {
        self.dirty.iter()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    // ========================================================================
    // Load / conflict lifecycle
    // ========================================================================

    /// Fetch the server tree and either accept it wholesale or enter
    /// conflict resolution.
    ///
    /// A fetch failure leaves the tree, dirty set, and conflict list
    /// untouched; the caller may retry.
    pub fn load(&mut self) -> Result<LoadOutcome, SessionError> {
        if self.is_conflicted() {
            return match self.load_policy {
                ConflictLoadPolicy::Reject => Err(SessionError::ConflictsPending),
                ConflictLoadPolicy::Ignore => Ok(LoadOutcome::Deferred),
            };
        }

        let server = match self.store.fetch_all_edits() {
            Ok(tree) => tree,
            Err(e) => {
                self.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };

        // Nothing of ours in flight: the server view simply wins.
        if !self.has_loaded || self.dirty.is_empty() {
            self.tree = server;
            self.dirty.clear_all();
            self.has_loaded = true;
            return Ok(LoadOutcome::Clean);
        }

        let conflicts = detect_conflicts(&self.tree, &server, &self.dirty);
        if conflicts.is_empty() {
            self.tree = server;
            self.dirty.clear_all();
            Ok(LoadOutcome::Clean)
        } else {
            // Hold the snapshot; the local tree stays untouched until
            // every conflict has a decision.
            let count = conflicts.len();
            self.pending = Some(server);
            self.conflicts = conflicts;
            Ok(LoadOutcome::Conflicted(count))
        }
    }

    /// Resolve one pending conflict. Resolving a conflict that is no
    /// longer pending is a no-op.
    pub fn resolve_conflict(
        &mut self,
        conflict: &Conflict,
        choice: Resolution,
    ) -> Result<(), SessionError> {
        let Some(pos) = self.conflicts.iter().position(|c| c.field == conflict.field) else {
            return Ok(());
        };
        let conflict = self.conflicts.remove(pos);
        let result = self.apply_resolution(&conflict, choice);
        // Either direction settles the field for this session.
        self.dirty.clear(&conflict.field);
        if self.conflicts.is_empty() {
            self.merge_pending_snapshot();
        }
        result.map_err(|e| {
            self.last_error = Some(e.to_string());
            SessionError::Store(e)
        })
    }

    /// Resolve every pending conflict the same way. Per-item store
    /// failures are aggregated; the batch never aborts early.
    pub fn resolve_all_conflicts(&mut self, choice: Resolution) -> Result<(), SessionError> {
        if self.conflicts.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.conflicts);
        let total = batch.len();
        let mut failures = Vec::new();
        for conflict in &batch {
            if let Err(e) = self.apply_resolution(conflict, choice) {
                failures.push(format!("{}: {e}", conflict.field));
            }
            self.dirty.clear(&conflict.field);
        }
        self.merge_pending_snapshot();

        if failures.is_empty() {
            Ok(())
        } else {
            let detail = failures.join("; ");
            self.last_error = Some(detail.clone());
            Err(SessionError::ResolutionIncomplete {
                failed: failures.len(),
                total,
                detail,
            })
        }
    }

    /// `Mine` writes through to the store: the local tree is already
    /// correct, so a failure surfaces as an error without rolling it back.
    /// `Theirs` overwrites the local leaf with the snapshot value, pruning
    /// when the server side is absent.
    fn apply_resolution(&mut self, conflict: &Conflict, choice: Resolution) -> Result<(), StoreError> {
        match choice {
            Resolution::Mine => {
                self.store
                    .save_field(&conflict.field, &conflict.local_value, &self.admin_name)
            }
            Resolution::Theirs => {
                self.tree.apply(&conflict.field, &conflict.server_value);
                Ok(())
            }
        }
    }

    /// Accept every snapshot asset this session holds no record for, then
    /// discard the snapshot. Safe to call repeatedly; only the first call
    /// after a conflicted load does anything.
    fn merge_pending_snapshot(&mut self) {
        let Some(snapshot) = self.pending.take() else {
            return;
        };
        for (asset_id, edits) in snapshot.iter() {
            if !self.tree.contains(asset_id) {
                self.tree.insert(asset_id, edits.clone());
            }
        }
    }

    // ========================================================================
    // Save pipeline
    // ========================================================================

    /// Optimistic single-field save: the local tree reflects the edit
    /// before the store round trip; a persist failure restores the whole
    /// per-asset record captured beforehand and un-marks the field.
    pub fn save_edit(&mut self, field: &FieldRef, value: &str) -> Result<(), SessionError> {
        let asset_id = field.asset_id();
        let previous = self.tree.get(asset_id).cloned();

        // Dirty before persist: a conflicting write landing during the
        // round trip must find the field already protected.
        self.dirty.mark(field.clone());
        self.tree.apply(field, value);

        if let Err(e) = self.store.save_field(field, value, &self.admin_name) {
            match previous {
                Some(previous) => self.tree.insert(asset_id, previous),
                None => {
                    self.tree.remove(asset_id);
                }
            }
            // An edit that never reached the store has nothing for a
            // future conflict check to protect.
            self.dirty.clear(field);
            self.last_error = Some(e.to_string());
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove every override for one asset, optimistically.
    pub fn clear_asset_edits(&mut self, asset_id: AssetId) -> Result<(), SessionError> {
        let previous = self.tree.remove(asset_id);
        if let Err(e) = self.store.delete_asset_edits(asset_id, &self.admin_name) {
            if let Some(previous) = previous {
                self.tree.insert(asset_id, previous);
            }
            self.last_error = Some(e.to_string());
            return Err(e.into());
        }
        self.dirty.clear_asset(asset_id);
        Ok(())
    }

    // ========================================================================
    // History & rollback
    // ========================================================================

    pub fn history(&self, asset_id: AssetId) -> Result<Vec<HistoryRecord>, SessionError> {
        Ok(self.store.fetch_history(asset_id)?)
    }

    /// Re-apply the prior value of a history record as a fresh forward
    /// save, then reload so the restored value (and any conflict it
    /// introduces with other writers) is picked up normally.
    pub fn rollback_edit(&mut self, id: HistoryId) -> Result<LoadOutcome, SessionError> {
        if let Err(e) = self.store.rollback(id, &self.admin_name) {
            let err = match e {
                StoreError::HistoryNotFound(id) => SessionError::RollbackNotFound(id),
                other => SessionError::Store(other),
            };
            self.last_error = Some(err.to_string());
            return Err(err);
        }
        self.load()
    }

    // ========================================================================
    // Export / import
    // ========================================================================

    pub fn export_edits(&self) -> Result<ExportBundle, SessionError> {
        if self.tree.is_empty() {
            return Err(SessionError::NothingToExport);
        }
        Ok(self.store.export_all()?)
    }

    pub fn import_edits(&mut self, records: &[ImportRecord]) -> Result<ImportOutcome, SessionError> {
        let outcome = self.store.import_batch(records, &self.admin_name)?;
        self.load()?;
        Ok(outcome)
    }
}
