//! Resolution executor: turns a user's decision into committed state

use serde::{Deserialize, Serialize};

use super::merge::{apply_field_choices, apply_field_choices_strict, FieldChoices};
use crate::config::VersioningConfig;
use crate::db::Store;
use crate::error::{Error, Result};
use crate::models::{
    ConflictData, ConflictStatus, ConflictType, Entity, SyncConflict, Version, VersionSnapshot,
    VersionType,
};
use crate::versions::record_version;

/// Caller-supplied input for a merge resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    #[serde(default)]
    pub choices: FieldChoices,
    /// Reconciled content, required when the content itself conflicts
    #[serde(default)]
    pub resolved_content: Option<String>,
}

/// How the user chose to settle a conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum ResolutionStrategy {
    KeepLocal,
    KeepRemote,
    /// Keep local as the live entity and duplicate the remote side
    KeepBoth,
    Merge(MergeRequest),
    SkipForNow,
}

impl ResolutionStrategy {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::KeepLocal => "keep_local",
            Self::KeepRemote => "keep_remote",
            Self::KeepBoth => "keep_both",
            Self::Merge(_) => "merge",
            Self::SkipForNow => "skip_for_now",
        }
    }
}

/// Committed result of a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub entity: Entity,
    /// Audit version recording the resolution
    pub version: Version,
    /// Entity created from the remote side by `KeepBoth`
    pub duplicate: Option<Entity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Resolved(Resolution),
    /// Conflict left open for later; the entity is untouched
    Deferred(SyncConflict),
}

/// Applies resolution strategies against a store
pub struct ResolutionExecutor<'a, S: Store> {
    store: &'a mut S,
    config: &'a VersioningConfig,
}

impl<'a, S: Store> ResolutionExecutor<'a, S> {
    pub fn new(store: &'a mut S, config: &'a VersioningConfig) -> Self {
        Self { store, config }
    }

    /// Settle `conflict` with `strategy`.
    ///
    /// The entity update, its audit version and the removal of the conflict
    /// record commit together.
    pub fn resolve(
        &mut self,
        conflict: &SyncConflict,
        strategy: &ResolutionStrategy,
    ) -> Result<ResolutionOutcome> {
        let config = self.config;
        let outcome = self
            .store
            .atomically(|store| execute(store, config, conflict, strategy))?;

        match &outcome {
            ResolutionOutcome::Resolved(_) => tracing::info!(
                "Resolved {} conflict {} on {} with {}",
                conflict.conflict_type,
                conflict.id,
                conflict.entity,
                strategy.name()
            ),
            ResolutionOutcome::Deferred(_) => {
                tracing::info!("Deferred conflict {} on {}", conflict.id, conflict.entity);
            }
        }
        Ok(outcome)
    }
}

pub(crate) fn execute<S: Store>(
    store: &mut S,
    config: &VersioningConfig,
    conflict: &SyncConflict,
    strategy: &ResolutionStrategy,
) -> Result<ResolutionOutcome> {
    let local = &conflict.local_version.data;
    let remote = &conflict.remote_version.data;

    let (data, description) = match strategy {
        ResolutionStrategy::SkipForNow => {
            let mut deferred = conflict.clone();
            deferred.status = ConflictStatus::Deferred;
            store.save_conflict(&deferred)?;
            return Ok(ResolutionOutcome::Deferred(deferred));
        }
        ResolutionStrategy::KeepLocal => (local.clone(), "kept local"),
        ResolutionStrategy::KeepRemote => (remote.clone(), "kept remote"),
        ResolutionStrategy::KeepBoth => {
            if conflict.conflict_type == ConflictType::Deletion {
                return Err(Error::InvalidResolution(
                    "a deletion conflict cannot keep both sides".to_string(),
                ));
            }
            (local.clone(), "kept both")
        }
        ResolutionStrategy::Merge(request) => (merge_data(config, conflict, request)?, "merged"),
    };

    let mut entity = store
        .get_entity(&conflict.entity.id)?
        .ok_or_else(|| Error::NotFound(format!("entity {}", conflict.entity)))?;
    entity.apply_data(&data);
    store.update_entity(&entity)?;

    let version_description = if matches!(strategy, ResolutionStrategy::Merge(_)) {
        format!("Merged conflict {}", conflict.id)
    } else {
        format!(
            "Resolved conflict {} ({description} from {})",
            conflict.id,
            if matches!(strategy, ResolutionStrategy::KeepRemote) {
                &conflict.remote_version.device
            } else {
                &conflict.local_version.device
            }
        )
    };
    let version = record_version(
        store,
        config,
        entity.entity_ref(),
        &entity.content,
        VersionSnapshot::from(&entity),
        VersionType::Manual,
        Some(&version_description),
    )?;

    let duplicate = if matches!(strategy, ResolutionStrategy::KeepBoth) {
        Some(duplicate_remote(store, config, conflict, &entity)?)
    } else {
        None
    };

    store.delete_conflict(&conflict.id)?;

    Ok(ResolutionOutcome::Resolved(Resolution {
        entity,
        version,
        duplicate,
    }))
}

fn merge_data(
    config: &VersioningConfig,
    conflict: &SyncConflict,
    request: &MergeRequest,
) -> Result<ConflictData> {
    let local = &conflict.local_version.data;
    let remote = &conflict.remote_version.data;

    match conflict.conflict_type {
        ConflictType::Deletion => Err(Error::InvalidResolution(
            "a deletion conflict cannot be merged field by field".to_string(),
        )),
        ConflictType::ContentModification => {
            let content = request.resolved_content.as_ref().ok_or_else(|| {
                Error::InvalidResolution(
                    "merging a content conflict needs reconciled content".to_string(),
                )
            })?;
            let mut merged = local.clone();
            merged.content.clone_from(content);
            Ok(merged)
        }
        ConflictType::PropertyConflict => {
            if config.require_full_merge_coverage {
                apply_field_choices_strict(local, remote, &request.choices)
            } else {
                apply_field_choices(local, remote, &request.choices)
            }
        }
    }
}

/// New entity seeded from the remote side, with a fresh single-version history
fn duplicate_remote<S: Store>(
    store: &mut S,
    config: &VersioningConfig,
    conflict: &SyncConflict,
    original: &Entity,
) -> Result<Entity> {
    let remote = &conflict.remote_version;
    let mut duplicate = Entity::new(original.kind, String::new(), String::new());
    duplicate.apply_data(&remote.data);
    duplicate.title = format!("{} ({})", remote.data.title, remote.device);

    store.insert_entity(&duplicate)?;
    record_version(
        store,
        config,
        duplicate.entity_ref(),
        &duplicate.content,
        VersionSnapshot::from(&duplicate),
        VersionType::Import,
        Some(&format!(
            "Duplicated from {} during conflict {}",
            conflict.entity, conflict.id
        )),
    )?;
    Ok(duplicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::detect;
    use crate::db::{ConflictRepository, EntityRepository, InMemoryStore, VersionRepository};
    use crate::models::{ConflictVersion, EntityKind, FieldChoice, FieldKey};
    use crate::versions::VersionStore;
    use pretty_assertions::assert_eq;

    fn seeded(store: &mut InMemoryStore, config: &VersioningConfig, content: &str) -> Entity {
        let song = Entity::new(EntityKind::Song, "Down to the River", content).with_key("G");
        VersionStore::new(store, config)
            .create_entity(&song, VersionType::Import, None)
            .unwrap();
        song
    }

    fn conflict_with(
        store: &mut InMemoryStore,
        song: &Entity,
        remote: ConflictData,
    ) -> SyncConflict {
        let local = ConflictVersion::from_entity(song, "phone");
        let conflict = detect(
            song.entity_ref(),
            &local,
            &ConflictVersion::new("tablet", 5, remote),
            None,
        )
        .unwrap();
        store.save_conflict(&conflict).unwrap();
        conflict
    }

    #[test]
    fn keep_remote_commits_remote_and_clears_record() {
        let config = VersioningConfig::default();
        let mut store = InMemoryStore::new();
        let song = seeded(&mut store, &config, "A\nB");
        let mut remote = ConflictData::from(&song);
        remote.content = "A\nC".to_string();
        let conflict = conflict_with(&mut store, &song, remote);

        let outcome = ResolutionExecutor::new(&mut store, &config)
            .resolve(&conflict, &ResolutionStrategy::KeepRemote)
            .unwrap();
        let ResolutionOutcome::Resolved(resolution) = outcome else {
            panic!("expected resolution");
        };

        assert_eq!(resolution.entity.content, "A\nC");
        assert_eq!(resolution.version.version_type, VersionType::Manual);
        assert_eq!(
            store.get_entity(&song.id).unwrap().unwrap().content,
            "A\nC"
        );
        assert!(store.get_conflict(&conflict.id).unwrap().is_none());
        assert_eq!(store.list_versions(&song.id).unwrap().len(), 2);
    }

    #[test]
    fn keep_both_duplicates_remote_with_fresh_history() {
        let config = VersioningConfig::default();
        let mut store = InMemoryStore::new();
        let song = seeded(&mut store, &config, "A\nB");
        let mut remote = ConflictData::from(&song);
        remote.content = "A\nC".to_string();
        let conflict = conflict_with(&mut store, &song, remote);

        let outcome = ResolutionExecutor::new(&mut store, &config)
            .resolve(&conflict, &ResolutionStrategy::KeepBoth)
            .unwrap();
        let ResolutionOutcome::Resolved(resolution) = outcome else {
            panic!("expected resolution");
        };
        let duplicate = resolution.duplicate.unwrap();

        assert_eq!(resolution.entity.content, "A\nB");
        assert_eq!(duplicate.content, "A\nC");
        assert_eq!(duplicate.title, "Down to the River (tablet)");
        let history = store.list_versions(&duplicate.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version_type, VersionType::Import);
    }

    #[test]
    fn merge_requires_every_conflicting_field() {
        let config = VersioningConfig::default();
        let mut store = InMemoryStore::new();
        let song = seeded(&mut store, &config, "A");
        let mut remote = ConflictData::from(&song);
        remote.key = Some("C".to_string());
        remote.tempo = Some(120);
        let conflict = conflict_with(&mut store, &song, remote);

        let request = MergeRequest {
            choices: FieldChoices::from([(FieldKey::Key, FieldChoice::Remote)]),
            resolved_content: None,
        };
        let error = ResolutionExecutor::new(&mut store, &config)
            .resolve(&conflict, &ResolutionStrategy::Merge(request))
            .unwrap_err();

        assert!(matches!(error, Error::MergeIncomplete(_)));
        assert_eq!(store.list_versions(&song.id).unwrap().len(), 1);
        assert!(store.get_conflict(&conflict.id).unwrap().is_some());
    }

    #[test]
    fn merge_of_content_conflict_needs_reconciled_content() {
        let config = VersioningConfig::default();
        let mut store = InMemoryStore::new();
        let song = seeded(&mut store, &config, "A\nB");
        let mut remote = ConflictData::from(&song);
        remote.content = "A\nC".to_string();
        let conflict = conflict_with(&mut store, &song, remote);

        let mut executor = ResolutionExecutor::new(&mut store, &config);
        let error = executor
            .resolve(&conflict, &ResolutionStrategy::Merge(MergeRequest::default()))
            .unwrap_err();
        assert!(matches!(error, Error::InvalidResolution(_)));

        let request = MergeRequest {
            resolved_content: Some("A\nB\nC".to_string()),
            ..MergeRequest::default()
        };
        let outcome = executor
            .resolve(&conflict, &ResolutionStrategy::Merge(request))
            .unwrap();
        let ResolutionOutcome::Resolved(resolution) = outcome else {
            panic!("expected resolution");
        };
        assert_eq!(resolution.entity.content, "A\nB\nC");
        assert_eq!(
            resolution.version.change_description.as_deref(),
            Some(format!("Merged conflict {}", conflict.id).as_str())
        );
    }

    #[test]
    fn deletion_conflicts_reject_merge_and_keep_both() {
        let config = VersioningConfig::default();
        let mut store = InMemoryStore::new();
        let song = seeded(&mut store, &config, "A");
        let mut remote = ConflictData::from(&song);
        remote.is_deleted = true;
        remote.content = "B".to_string();
        let conflict = conflict_with(&mut store, &song, remote);

        let mut executor = ResolutionExecutor::new(&mut store, &config);
        for strategy in [
            ResolutionStrategy::Merge(MergeRequest::default()),
            ResolutionStrategy::KeepBoth,
        ] {
            let error = executor.resolve(&conflict, &strategy).unwrap_err();
            assert!(matches!(error, Error::InvalidResolution(_)));
        }
    }

    #[test]
    fn skip_marks_conflict_deferred() {
        let config = VersioningConfig::default();
        let mut store = InMemoryStore::new();
        let song = seeded(&mut store, &config, "A\nB");
        let mut remote = ConflictData::from(&song);
        remote.title = "Down in the River".to_string();
        let conflict = conflict_with(&mut store, &song, remote);

        let outcome = ResolutionExecutor::new(&mut store, &config)
            .resolve(&conflict, &ResolutionStrategy::SkipForNow)
            .unwrap();

        assert!(matches!(outcome, ResolutionOutcome::Deferred(_)));
        let stored = store.get_conflict(&conflict.id).unwrap().unwrap();
        assert_eq!(stored.status, ConflictStatus::Deferred);
        assert_eq!(store.get_entity(&song.id).unwrap().unwrap().title, "Down to the River");
        assert_eq!(store.list_versions(&song.id).unwrap().len(), 1);
    }

    #[test]
    fn strategy_json_shape() {
        let json = r#"{"strategy":"merge","choices":{"key":"remote"}}"#;
        let strategy: ResolutionStrategy = serde_json::from_str(json).unwrap();
        let ResolutionStrategy::Merge(request) = strategy else {
            panic!("expected merge");
        };
        assert_eq!(request.choices.get(&FieldKey::Key), Some(&FieldChoice::Remote));
        assert!(request.resolved_content.is_none());
    }
}
