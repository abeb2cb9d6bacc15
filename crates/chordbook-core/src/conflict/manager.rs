//! Conflict manager: entry point for incoming remote snapshots

use std::cmp::Reverse;

use super::detector::{classify_divergence, detect, Divergence};
use super::merge::{preview_merge, FieldChoices, MergePreview};
use super::resolution::{
    execute, Resolution, ResolutionExecutor, ResolutionOutcome, ResolutionStrategy,
};
use crate::config::VersioningConfig;
use crate::db::Store;
use crate::error::{Error, Result};
use crate::models::{
    ConflictData, ConflictId, ConflictVersion, Entity, EntityId, SyncConflict, Version,
    VersionSnapshot, VersionType,
};
use crate::util::now_millis;
use crate::versions::record_version;

/// What happened to an incoming remote snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Remote matches local
    UpToDate,
    /// Only local changed since the common state; nothing to apply
    LocalAhead,
    /// Remote-only change applied to the live entity
    FastForwarded(Version),
    /// Divergence recorded as an open conflict
    Conflict(SyncConflict),
    /// Divergence settled without user input
    AutoResolved(Resolution),
}

pub struct ConflictManager<'a, S: Store> {
    store: &'a mut S,
    config: &'a VersioningConfig,
}

impl<'a, S: Store> ConflictManager<'a, S> {
    pub fn new(store: &'a mut S, config: &'a VersioningConfig) -> Self {
        Self { store, config }
    }

    /// Reconcile a remote snapshot of `entity` with the live local state.
    ///
    /// A newer remote supersedes the one held by an existing conflict on the
    /// same entity; the conflict keeps its id and status.
    pub fn receive_remote(
        &mut self,
        entity: &EntityId,
        remote: &ConflictVersion,
        last_common: Option<&ConflictData>,
    ) -> Result<ReceiveOutcome> {
        let config = self.config;
        let outcome = self.store.atomically(|store| {
            let live = store
                .get_entity(entity)?
                .ok_or_else(|| Error::NotFound(format!("entity {entity}")))?;
            let local = ConflictVersion::from_entity(&live, config.device_label.as_str());
            let existing = store.list_conflicts(Some(entity))?.into_iter().next();

            let divergence = classify_divergence(&local.data, &remote.data, last_common);
            if divergence == Divergence::Identical {
                if let Some(stale) = &existing {
                    store.delete_conflict(&stale.id)?;
                }
                return Ok(ReceiveOutcome::UpToDate);
            }
            if divergence == Divergence::LocalOnly && existing.is_none() {
                return Ok(ReceiveOutcome::LocalAhead);
            }

            let Some(mut conflict) = detect(live.entity_ref(), &local, remote, last_common) else {
                return Ok(ReceiveOutcome::UpToDate);
            };

            if existing.is_none() {
                if let Some(strategy) = conflict.auto_resolution() {
                    return match execute(store, config, &conflict, &strategy)? {
                        ResolutionOutcome::Resolved(resolution) => {
                            Ok(ReceiveOutcome::AutoResolved(resolution))
                        }
                        ResolutionOutcome::Deferred(deferred) => {
                            Ok(ReceiveOutcome::Conflict(deferred))
                        }
                    };
                }
                if divergence == Divergence::RemoteOnly {
                    return fast_forward(store, config, live, remote)
                        .map(ReceiveOutcome::FastForwarded);
                }
            }

            if let Some(previous) = existing {
                conflict.id = previous.id;
                conflict.status = previous.status;
                conflict.detected_at = previous.detected_at;
            }
            store.save_conflict(&conflict)?;
            Ok(ReceiveOutcome::Conflict(conflict))
        })?;

        match &outcome {
            ReceiveOutcome::Conflict(conflict) => tracing::info!(
                "Recorded {} conflict {} on {entity} from {}",
                conflict.conflict_type,
                conflict.id,
                remote.device
            ),
            ReceiveOutcome::AutoResolved(_) => {
                tracing::info!(
                    "Auto-resolved deletion conflict on {entity} from {}",
                    remote.device
                );
            }
            ReceiveOutcome::FastForwarded(version) => tracing::info!(
                "Applied remote change to {entity} from {} as version {}",
                remote.device,
                version.version_number
            ),
            ReceiveOutcome::UpToDate | ReceiveOutcome::LocalAhead => {}
        }
        Ok(outcome)
    }

    /// Stored conflicts, highest priority first, then oldest first
    pub fn list_conflicts(&self, entity: Option<&EntityId>) -> Result<Vec<SyncConflict>> {
        let mut conflicts = self.store.list_conflicts(entity)?;
        conflicts.sort_by_key(|conflict| (Reverse(conflict.priority), conflict.detected_at));
        Ok(conflicts)
    }

    pub fn get_conflict(&self, id: &ConflictId) -> Result<SyncConflict> {
        self.store
            .get_conflict(id)?
            .ok_or_else(|| Error::NotFound(format!("conflict {id}")))
    }

    /// Whether an open or deferred conflict holds `entity` back from sync
    pub fn is_sync_blocked(&self, entity: &EntityId) -> Result<bool> {
        Ok(!self.store.list_conflicts(Some(entity))?.is_empty())
    }

    pub fn preview(&self, id: &ConflictId, choices: &FieldChoices) -> Result<MergePreview> {
        preview_merge(&self.get_conflict(id)?, choices)
    }

    /// Resolve a stored conflict by id
    pub fn resolve(
        &mut self,
        id: &ConflictId,
        strategy: &ResolutionStrategy,
    ) -> Result<ResolutionOutcome> {
        let conflict = self.get_conflict(id)?;
        ResolutionExecutor::new(&mut *self.store, self.config).resolve(&conflict, strategy)
    }
}

fn fast_forward<S: Store>(
    store: &mut S,
    config: &VersioningConfig,
    mut live: Entity,
    remote: &ConflictVersion,
) -> Result<Version> {
    live.apply_data(&remote.data);
    live.updated_at = remote.timestamp.max(now_millis());
    store.update_entity(&live)?;
    record_version(
        store,
        config,
        live.entity_ref(),
        &live.content,
        VersionSnapshot::from(&live),
        VersionType::AutoSave,
        Some(&format!("Synced from {}", remote.device)),
    )
}
