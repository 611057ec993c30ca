use coedit_core::{AssetId, FieldRef};
use coedit_engine::{
    ConflictLoadPolicy, LoadOutcome, Resolution, SessionError, SyncSession,
};
use coedit_harness::{FlakyStore, SharedStore, TestAdmin};
use coedit_storage::EditStore;

// ============================================================================
// Load behaviour
// ============================================================================

#[test]
fn first_load_accepts_server_state_wholesale() -> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut seed = TestAdmin::connect(&store, "seed")?;
    seed.set_title(1, "Seeded")?;

    let mut session = SyncSession::new(store.clone(), "alice");
    assert_eq!(session.load()?, LoadOutcome::Clean);
    assert_eq!(session.edits().value(&FieldRef::title(AssetId::new(1))), Some("Seeded"));
    assert!(!session.is_conflicted());
    Ok(())
}

#[test]
fn own_writes_do_not_conflict_on_reload() -> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut admin = TestAdmin::connect(&store, "alice")?;

    admin.set_title(1, "Mine")?;
    // The field is dirty, but the store already holds the same value.
    assert_eq!(admin.session.load()?, LoadOutcome::Clean);
    assert!(admin.session.dirty_fields().next().is_none());
    Ok(())
}

#[test]
fn non_dirty_server_changes_are_accepted_silently() -> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut a = TestAdmin::connect(&store, "a")?;
    let mut b = TestAdmin::connect(&store, "b")?;

    a.set_title(1, "A's Title")?;
    b.set_purpose(2, "B's Purpose")?;

    // A is dirty only on asset 1's title; B's edit touches a different field.
    assert_eq!(a.session.load()?, LoadOutcome::Clean);
    assert_eq!(
        a.session.edits().value(&FieldRef::purpose(AssetId::new(2))),
        Some("B's Purpose")
    );
    Ok(())
}

#[test]
fn failed_fetch_leaves_session_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let shared = SharedStore::in_memory()?;
    let mut session = SyncSession::new(FlakyStore::new(shared), "alice");
    session.load()?;
    session.save_edit(&FieldRef::title(AssetId::new(1)), "Kept")?;

    session.store().fail_next_fetch();
    let err = session.load().unwrap_err();
    assert!(matches!(err, SessionError::Store(_)));

    assert_eq!(session.edits().value(&FieldRef::title(AssetId::new(1))), Some("Kept"));
    assert_eq!(session.dirty_fields().count(), 1);
    assert!(session.last_error().is_some());

    // The failure was one-shot; the retry succeeds.
    assert_eq!(session.load()?, LoadOutcome::Clean);
    Ok(())
}

// ============================================================================
// Detection
// ============================================================================

#[test]
fn overlapping_edit_surfaces_one_conflict() -> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut a = TestAdmin::connect(&store, "a")?;
    let mut b = TestAdmin::connect(&store, "b")?;

    a.set_title(1, "New Title")?;
    b.session.load()?;
    b.set_title(1, "Server Title")?;

    assert_eq!(a.session.load()?, LoadOutcome::Conflicted(1));
    let conflicts = a.session.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].field, FieldRef::title(AssetId::new(1)));
    assert_eq!(conflicts[0].local_value, "New Title");
    assert_eq!(conflicts[0].server_value, "Server Title");

    // Local tree untouched while the conflict is pending.
    assert_eq!(a.title(1), Some("New Title"));
    Ok(())
}

#[test]
fn load_while_conflicted_is_rejected_by_default() -> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut a = TestAdmin::connect(&store, "a")?;
    let mut b = TestAdmin::connect(&store, "b")?;

    a.set_title(1, "A")?;
    b.set_title(1, "B")?;
    assert_eq!(a.session.load()?, LoadOutcome::Conflicted(1));

    let err = a.session.load().unwrap_err();
    assert!(matches!(err, SessionError::ConflictsPending));
    assert!(a.session.is_conflicted());
    Ok(())
}

#[test]
fn ignore_policy_defers_load_while_conflicted() -> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut other = TestAdmin::connect(&store, "other")?;

    let mut session =
        SyncSession::new(store.clone(), "alice").with_load_policy(ConflictLoadPolicy::Ignore);
    session.load()?;
    session.save_edit(&FieldRef::title(AssetId::new(1)), "A")?;
    other.set_title(1, "B")?;

    assert_eq!(session.load()?, LoadOutcome::Conflicted(1));
    assert_eq!(session.load()?, LoadOutcome::Deferred);
    assert!(session.is_conflicted());
    Ok(())
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn theirs_takes_server_value_and_settles_the_field() -> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut a = TestAdmin::connect(&store, "a")?;
    let mut b = TestAdmin::connect(&store, "b")?;

    a.set_title(1, "New Title")?;
    b.set_title(1, "Server Title")?;
    a.session.load()?;

    let conflict = a.session.conflicts()[0].clone();
    a.session.resolve_conflict(&conflict, Resolution::Theirs)?;

    assert_eq!(a.title(1), Some("Server Title"));
    assert!(!a.session.is_conflicted());
    assert!(a.session.dirty_fields().next().is_none());
    Ok(())
}

#[test]
fn mine_writes_local_value_back_to_the_store() -> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut a = TestAdmin::connect(&store, "a")?;
    let mut b = TestAdmin::connect(&store, "b")?;

    a.set_title(1, "New Title")?;
    b.set_title(1, "Server Title")?;
    a.session.load()?;

    let conflict = a.session.conflicts()[0].clone();
    a.session.resolve_conflict(&conflict, Resolution::Mine)?;

    assert_eq!(a.title(1), Some("New Title"));
    let server = store.fetch_all_edits()?;
    assert_eq!(server.value(&FieldRef::title(AssetId::new(1))), Some("New Title"));
    Ok(())
}

#[test]
fn pending_snapshot_merges_only_after_the_last_resolution()
-> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut a = TestAdmin::connect(&store, "a")?;
    let mut b = TestAdmin::connect(&store, "b")?;

    a.set_title(1, "A Title")?;
    a.set_purpose(1, "A Purpose")?;
    b.set_title(1, "B Title")?;
    b.set_purpose(1, "B Purpose")?;
    // B also created an asset A has never seen.
    b.set_title(2, "Brand New")?;

    assert_eq!(a.session.load()?, LoadOutcome::Conflicted(2));
    let pending: Vec<_> = a.session.conflicts().to_vec();

    a.session.resolve_conflict(&pending[0], Resolution::Mine)?;
    // One conflict left: the snapshot is still held back.
    assert!(a.session.asset_edits(AssetId::new(2)).is_none());

    a.session.resolve_conflict(&pending[1], Resolution::Theirs)?;
    assert_eq!(
        a.session.edits().value(&FieldRef::title(AssetId::new(2))),
        Some("Brand New")
    );

    // Re-resolving an already-settled conflict changes nothing.
    a.session.resolve_conflict(&pending[0], Resolution::Theirs)?;
    assert_eq!(a.title(1), Some("A Title"));
    Ok(())
}

#[test]
fn snapshot_merge_never_overwrites_assets_the_session_holds()
-> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut a = TestAdmin::connect(&store, "a")?;
    let mut b = TestAdmin::connect(&store, "b")?;

    a.set_title(1, "A Title")?;
    a.set_title(3, "A Other")?;
    b.set_title(1, "B Title")?;

    assert_eq!(a.session.load()?, LoadOutcome::Conflicted(1));
    let conflict = a.session.conflicts()[0].clone();
    a.session.resolve_conflict(&conflict, Resolution::Mine)?;

    // Asset 3 was present locally, so the held snapshot left it alone.
    assert_eq!(a.title(3), Some("A Other"));
    Ok(())
}

#[test]
fn resolve_all_with_no_conflicts_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut admin = TestAdmin::connect(&store, "alice")?;
    admin.session.resolve_all_conflicts(Resolution::Theirs)?;
    assert!(!admin.session.is_conflicted());
    Ok(())
}

#[test]
fn resolve_all_theirs_drains_every_conflict() -> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut a = TestAdmin::connect(&store, "a")?;
    let mut b = TestAdmin::connect(&store, "b")?;

    a.set_title(1, "A1")?;
    a.set_purpose(1, "A2")?;
    a.set_core_question(1, "A3")?;
    b.set_title(1, "B1")?;
    b.set_purpose(1, "B2")?;
    b.set_core_question(1, "B3")?;

    assert_eq!(a.session.load()?, LoadOutcome::Conflicted(3));
    a.session.resolve_all_conflicts(Resolution::Theirs)?;

    assert!(!a.session.is_conflicted());
    assert!(a.session.dirty_fields().next().is_none());
    assert_eq!(a.title(1), Some("B1"));
    assert_eq!(
        a.session.edits().value(&FieldRef::purpose(AssetId::new(1))),
        Some("B2")
    );
    // A clean load now goes through again.
    assert_eq!(a.session.load()?, LoadOutcome::Clean);
    Ok(())
}

#[test]
fn bulk_resolution_aggregates_store_failures() -> Result<(), Box<dyn std::error::Error>> {
    let shared = SharedStore::in_memory()?;
    let mut other = TestAdmin::connect(&shared, "other")?;

    let mut session = SyncSession::new(FlakyStore::new(shared.clone()), "alice");
    session.load()?;
    session.save_edit(&FieldRef::title(AssetId::new(1)), "A1")?;
    session.save_edit(&FieldRef::purpose(AssetId::new(1)), "A2")?;
    other.set_title(1, "B1")?;
    other.set_purpose(1, "B2")?;

    assert_eq!(session.load()?, LoadOutcome::Conflicted(2));

    // One of the two write-throughs will fail.
    session.store().fail_next_save();
    let err = session
        .resolve_all_conflicts(Resolution::Mine)
        .unwrap_err();
    match err {
        SessionError::ResolutionIncomplete { failed, total, .. } => {
            assert_eq!(failed, 1);
            assert_eq!(total, 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    // The batch still ran to completion: conflicts drained, dirty set
    // empty, snapshot merged, and the session can load again.
    assert!(!session.is_conflicted());
    assert!(session.dirty_fields().next().is_none());
    assert!(session.last_error().is_some());
    session.load()?;
    Ok(())
}

#[test]
fn conflict_against_a_deleted_server_field_resolves_theirs_by_pruning()
-> Result<(), Box<dyn std::error::Error>> {
    let store = SharedStore::in_memory()?;
    let mut a = TestAdmin::connect(&store, "a")?;
    let mut b = TestAdmin::connect(&store, "b")?;

    a.set_title(1, "Seed")?;
    b.session.load()?;
    a.session.load()?;

    a.set_title(1, "A's rewrite")?;
    // B deletes the field; the server side of the conflict is "".
    b.set_title(1, "")?;

    assert_eq!(a.session.load()?, LoadOutcome::Conflicted(1));
    let conflict = a.session.conflicts()[0].clone();
    assert_eq!(conflict.server_value, "");

    a.session.resolve_conflict(&conflict, Resolution::Theirs)?;
    assert!(a.session.asset_edits(AssetId::new(1)).is_none());
    Ok(())
}
