//! End-to-end behavior of the version log and conflict resolution

use chordbook_core::conflict::{
    apply_field_choices, detect, ConflictManager, FieldChoices, MergeRequest, ReceiveOutcome,
    ResolutionExecutor, ResolutionOutcome, ResolutionStrategy,
};
use chordbook_core::db::{
    ConflictRepository, EntityRepository, InMemoryStore, SqliteStore, Store, VersionRepository,
};
use chordbook_core::diff::{apply, diff};
use chordbook_core::models::{
    ConflictData, ConflictPriority, ConflictStatus, ConflictType, ConflictVersion, EntityKind,
    FieldChoice, FieldKey, VersionPayload, VersionSnapshot, VersionType,
};
use chordbook_core::versions::{chain_depth, DeletionMode, RestoreOutcome};
use chordbook_core::{Entity, Error, VersionStore, VersioningConfig};
use pretty_assertions::assert_eq;

fn new_song<S: Store>(store: &mut S, config: &VersioningConfig, content: &str) -> Entity {
    let song = Entity::new(EntityKind::Song, "I'll Fly Away", content)
        .with_artist("Albert E. Brumley")
        .with_key("G");
    VersionStore::new(store, config)
        .create_entity(&song, VersionType::Import, Some("Imported from ChordPro"))
        .unwrap();
    song
}

#[test]
fn content_round_trips_through_versions() {
    let config = VersioningConfig::default();
    let mut store = InMemoryStore::new();
    let mut song = new_song(&mut store, &config, "");

    let samples = [
        "",
        "x",
        "\n",
        "[G]Some glad morning\n",
        "[G]Some glad morning\n\n[C]when this life is over",
        "line with \\n escapes and {\"json\": [1]}\r\n\tand tabs",
        "[G]Some glad morning\n",
    ];
    for sample in samples {
        song.content = sample.to_string();
        let mut versions = VersionStore::new(&mut store, &config);
        if let Some(version) = versions.commit_edit(&song).unwrap() {
            assert_eq!(versions.content_of(&version).unwrap(), sample);
        }
    }

    let versions = VersionStore::new(&mut store, &config);
    assert_eq!(versions.verify_chain(&song.id).unwrap().checked, 7);
}

#[test]
fn diff_and_apply_are_inverse() {
    let pairs = [
        ("", ""),
        ("", "a"),
        ("a", ""),
        ("a\n", "a"),
        ("a", "a\n"),
        ("\n\n", "\n"),
        ("A\nB\nC", "A\nC\nB"),
        ("[G]one\n[C]two\n[D]three\n", "[G]one\n[D]three\n[Em]four\n"),
    ];
    for (a, b) in pairs {
        assert_eq!(apply(a, &diff(a, b)).unwrap(), b, "diff({a:?}, {b:?})");
        assert_eq!(apply(b, &diff(a, b).reverse()).unwrap(), a);
    }
}

#[test]
fn chain_depth_is_bounded_for_long_histories() {
    let config = VersioningConfig::default().with_max_chain_depth(4);
    let mut store = SqliteStore::open_in_memory().unwrap();
    let base: String = (0..60)
        .map(|i| format!("[G]verse {i} [C]goes [D]here\n"))
        .collect();
    let mut song = new_song(&mut store, &config, &base);

    for i in 0..50 {
        song.content = base.replace(&format!("verse {} ", i % 60), &format!("verse {i}! "));
        VersionStore::new(&mut store, &config)
            .commit_edit(&song)
            .unwrap();
    }

    let all = store.list_versions(&song.id).unwrap();
    assert_eq!(all.len(), 51);
    assert!(all.iter().any(|version| version.is_delta()));
    for version in &all {
        assert!(chain_depth(version, &all).unwrap() <= 4);
    }
}

#[test]
fn restore_preserves_prior_live_state() {
    let config = VersioningConfig::default();
    let mut store = InMemoryStore::new();
    let mut song = new_song(&mut store, &config, "[G]Some glad morning");
    song.content = "[G]Some glad evening".to_string();
    VersionStore::new(&mut store, &config)
        .commit_edit(&song)
        .unwrap();

    let mut versions = VersionStore::new(&mut store, &config);
    let RestoreOutcome::Overwritten { backup, .. } =
        versions.restore_version(&song.id, 1, false).unwrap()
    else {
        panic!("expected in-place restore");
    };

    assert_eq!(versions.content_of(&backup).unwrap(), "[G]Some glad evening");
    let history = versions.fetch_versions(&song.id).unwrap();
    assert_eq!(history[0].version_type, VersionType::Restore);
    assert_eq!(
        store.get_entity(&song.id).unwrap().unwrap().content,
        "[G]Some glad morning"
    );
}

#[test]
fn only_import_version_cannot_be_deleted() {
    let config = VersioningConfig::default();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let song = new_song(&mut store, &config, "[G]Some glad morning");
    let before = store.list_versions(&song.id).unwrap();

    let error = VersionStore::new(&mut store, &config)
        .delete_version(&song.id, 1, DeletionMode::Strict)
        .unwrap_err();

    assert!(matches!(error, Error::ProtectedVersion(_)));
    assert_eq!(store.list_versions(&song.id).unwrap(), before);
}

#[test]
fn import_baseline_survives_full_rewrite() {
    let config = VersioningConfig::default();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let mut song = new_song(&mut store, &config, "[G]Some glad morning\n[C]when this life is over");
    song.content = "{comment: rearranged}\n[A]I'll fly away, O glory".to_string();
    let rewrite = VersionStore::new(&mut store, &config)
        .commit_edit(&song)
        .unwrap()
        .unwrap();
    assert!(matches!(rewrite.payload, VersionPayload::Full(_)));
    let before = store.list_versions(&song.id).unwrap();

    let error = VersionStore::new(&mut store, &config)
        .delete_version(&song.id, 1, DeletionMode::Strict)
        .unwrap_err();

    assert!(matches!(error, Error::ProtectedVersion(_)));
    assert_eq!(store.list_versions(&song.id).unwrap(), before);
}

#[test]
fn small_edit_to_long_chart_is_stored_as_delta() {
    let config = VersioningConfig::default();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let chart: String = (0..2100)
        .map(|i| format!("[G]Verse {i} and [D]chorus\n"))
        .collect();
    let mut song = new_song(&mut store, &config, &chart);

    let mut lines: Vec<String> = chart.split('\n').map(ToString::to_string).collect();
    lines[0] = "[A]Verse 0 transposed".to_string();
    lines[2099] = "[A]Verse 2099 transposed".to_string();
    song.content = lines.join("\n");

    let version = VersionStore::new(&mut store, &config)
        .commit_edit(&song)
        .unwrap()
        .unwrap();

    let VersionPayload::Delta { base: 1, diff: ref delta } = version.payload else {
        panic!("expected a delta against version 1");
    };
    assert_eq!(delta.stats().kept, 2099);
    assert!(version.stored_bytes() < song.content.len() / 100);
    assert_eq!(
        VersionStore::new(&mut store, &config)
            .content_of(&version)
            .unwrap(),
        song.content
    );
}

#[test]
fn missing_snapshot_is_reported_as_corruption() {
    let config = VersioningConfig::default();
    let mut store = InMemoryStore::new();
    let base: String = (0..30).map(|i| format!("[Am]line {i}\n")).collect();
    let mut song = new_song(&mut store, &config, &base);
    song.content = base.replace("line 4\n", "line four\n");
    let latest = VersionStore::new(&mut store, &config)
        .commit_edit(&song)
        .unwrap()
        .unwrap();
    assert!(matches!(latest.payload, VersionPayload::Delta { base: 1, .. }));

    // Drop the full snapshot underneath the delta
    let root = store.get_version(&song.id, 1).unwrap().unwrap();
    store.delete_version(&root.id).unwrap();

    let error = VersionStore::new(&mut store, &config)
        .content_of(&latest)
        .unwrap_err();
    assert!(error.is_corruption());
    assert!(!error.is_storage_failure());
}

#[test]
fn field_merge_is_idempotent() {
    let local = ConflictData {
        title: "I'll Fly Away".to_string(),
        key: Some("G".to_string()),
        tempo: Some(100),
        ..ConflictData::default()
    };
    let mut remote = local.clone();
    remote.key = Some("A".to_string());
    remote.tags = vec!["gospel".to_string()];
    let choices = FieldChoices::from([(FieldKey::Tags, FieldChoice::Remote)]);

    let once = apply_field_choices(&local, &remote, &choices).unwrap();
    let twice = apply_field_choices(&local, &remote, &choices).unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.key.as_deref(), Some("G"));
    assert_eq!(once.tags, vec!["gospel".to_string()]);
}

#[test]
fn content_conflict_keep_local() {
    let config = VersioningConfig::default();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let song = new_song(&mut store, &config, "A\nB");
    let local = ConflictVersion::from_entity(&song, "phone");
    let mut theirs = ConflictData::from(&song);
    theirs.content = "A\nC".to_string();

    let conflict = detect(
        song.entity_ref(),
        &local,
        &ConflictVersion::new("tablet", 1, theirs),
        None,
    )
    .unwrap();
    assert_eq!(conflict.conflict_type, ConflictType::ContentModification);
    assert_eq!(conflict.priority, ConflictPriority::High);

    let outcome = ResolutionExecutor::new(&mut store, &config)
        .resolve(&conflict, &ResolutionStrategy::KeepLocal)
        .unwrap();
    let ResolutionOutcome::Resolved(resolution) = outcome else {
        panic!("expected resolution");
    };

    assert_eq!(resolution.entity.content, "A\nB");
    assert_eq!(store.get_entity(&song.id).unwrap().unwrap().content, "A\nB");
    let versions = store.list_versions(&song.id).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[1].version_type, VersionType::Manual);
}

#[test]
fn property_conflict_merge() {
    let config = VersioningConfig::default();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let song = new_song(&mut store, &config, "[G]Some glad morning");
    let local = ConflictVersion::from_entity(&song, "phone");
    let mut theirs = ConflictData::from(&song);
    theirs.key = Some("C".to_string());
    let remote = ConflictVersion::new("tablet", 1, theirs);

    let conflict = detect(song.entity_ref(), &local, &remote, None).unwrap();
    assert_eq!(conflict.conflict_type, ConflictType::PropertyConflict);

    let choices = FieldChoices::from([(FieldKey::Key, FieldChoice::Remote)]);
    let merged = apply_field_choices(&local.data, &remote.data, &choices).unwrap();
    assert_eq!(merged.key.as_deref(), Some("C"));

    let request = MergeRequest {
        choices,
        resolved_content: None,
    };
    ResolutionExecutor::new(&mut store, &config)
        .resolve(&conflict, &ResolutionStrategy::Merge(request))
        .unwrap();

    assert_eq!(
        store.get_entity(&song.id).unwrap().unwrap().key.as_deref(),
        Some("C")
    );
    let latest = store.list_versions(&song.id).unwrap().pop().unwrap();
    assert_eq!(latest.version_type, VersionType::Manual);
    assert_eq!(latest.snapshot.key.as_deref(), Some("C"));
}

#[test]
fn remote_deletion_of_unedited_entity_needs_no_user_input() {
    let mut song = Entity::new(EntityKind::Book, "Campfire Songs", "");
    song.tags = vec!["camp".to_string()];
    let common = ConflictData::from(&song);
    let mut deleted = common.clone();
    deleted.is_deleted = true;

    let conflict = detect(
        song.entity_ref(),
        &ConflictVersion::from_entity(&song, "phone"),
        &ConflictVersion::new("tablet", 1, deleted),
        Some(&common),
    )
    .unwrap();

    assert_eq!(conflict.conflict_type, ConflictType::Deletion);
    assert!(!conflict.requires_user_input);
    assert_eq!(conflict.auto_resolution(), Some(ResolutionStrategy::KeepLocal));
}

#[test]
fn skip_defers_until_explicit_resolution() {
    let config = VersioningConfig::default();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let song = new_song(&mut store, &config, "A\nB");
    let mut theirs = ConflictData::from(&song);
    theirs.content = "A\nC".to_string();

    let mut manager = ConflictManager::new(&mut store, &config);
    let ReceiveOutcome::Conflict(conflict) = manager
        .receive_remote(&song.id, &ConflictVersion::new("tablet", 1, theirs), None)
        .unwrap()
    else {
        panic!("expected conflict");
    };

    for _ in 0..2 {
        manager
            .resolve(&conflict.id, &ResolutionStrategy::SkipForNow)
            .unwrap();
    }
    assert!(manager.is_sync_blocked(&song.id).unwrap());
    assert_eq!(
        manager.get_conflict(&conflict.id).unwrap().status,
        ConflictStatus::Deferred
    );

    let live = store.get_entity(&song.id).unwrap().unwrap();
    assert_eq!(live.content, "A\nB");
    assert_eq!(store.list_versions(&song.id).unwrap().len(), 1);
    assert!(store.get_conflict(&conflict.id).unwrap().is_some());
}

#[test]
fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("library").join("chordbook.db");
    let config = VersioningConfig::default();

    let song = {
        let mut store = SqliteStore::open(&path).unwrap();
        let mut song = new_song(&mut store, &config, "[G]one\n[C]two\n[D]three\n[G]four");
        song.content.push_str("\n[G]five");
        VersionStore::new(&mut store, &config)
            .commit_edit(&song)
            .unwrap();
        song
    };

    let mut store = SqliteStore::open(&path).unwrap();
    let versions = VersionStore::new(&mut store, &config);
    let history = versions.fetch_versions(&song.id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(versions.content_of(&history[0]).unwrap(), song.content);
    assert_eq!(
        history[1].snapshot,
        VersionSnapshot {
            title: "I'll Fly Away".to_string(),
            artist: Some("Albert E. Brumley".to_string()),
            key: Some("G".to_string()),
            tempo: None,
        }
    );
}
