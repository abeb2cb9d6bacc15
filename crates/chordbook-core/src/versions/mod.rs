//! Version store: append-only, delta-compressed history per entity
//!
//! Every mutating operation runs inside [`Store::atomically`], so a version
//! and the entity change it documents are committed together or not at all.
//! The free functions taking `&mut S` exist so other components (the conflict
//! resolver) can record versions inside their own atomic sections.

mod chain;

pub use chain::{chain_depth, encode_payload, reconstruct_content};

use crate::config::VersioningConfig;
use crate::db::Store;
use crate::diff::{diff, LineDiff};
use crate::error::{Error, Result};
use crate::models::{
    Entity, EntityId, EntityRef, Version, VersionId, VersionPayload, VersionSnapshot,
    VersionStorageStats, VersionType,
};
use crate::util::now_millis;

/// How to treat versions whose deltas depend on a version being deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionMode {
    /// Refuse with `ProtectedVersion`
    Strict,
    /// Re-base dependents onto the deleted version's own base
    #[default]
    Rebase,
}

/// Result of a restore operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Live entity overwritten; `backup` captured its previous state
    Overwritten {
        entity: Entity,
        backup: Version,
        restore: Version,
    },
    /// New entity seeded from the restored content
    Copied { entity: Entity, baseline: Version },
}

/// Result of a chain verification pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub checked: usize,
    pub max_depth: usize,
}

/// Version log operations over a store handle
pub struct VersionStore<'a, S: Store> {
    store: &'a mut S,
    config: &'a VersioningConfig,
}

impl<'a, S: Store> VersionStore<'a, S> {
    pub fn new(store: &'a mut S, config: &'a VersioningConfig) -> Self {
        Self { store, config }
    }

    /// Insert a new entity together with its first version
    pub fn create_entity(
        &mut self,
        entity: &Entity,
        version_type: VersionType,
        description: Option<&str>,
    ) -> Result<Version> {
        let config = self.config;
        self.store.atomically(|store| {
            store.insert_entity(entity)?;
            record_version(
                store,
                config,
                entity.entity_ref(),
                &entity.content,
                VersionSnapshot::from(entity),
                version_type,
                description,
            )
        })
    }

    /// Record a new version of `entity`, delta-encoded against the latest one when worthwhile
    pub fn create_version(
        &mut self,
        entity: EntityRef,
        content: &str,
        metadata: VersionSnapshot,
        version_type: VersionType,
        description: Option<&str>,
    ) -> Result<Version> {
        let config = self.config;
        self.store.atomically(|store| {
            record_version(
                store,
                config,
                entity,
                content,
                metadata,
                version_type,
                description,
            )
        })
    }

    /// Save an edited entity and capture it as an auto-save version.
    ///
    /// Returns `None` when nothing versioned changed.
    pub fn commit_edit(&mut self, edited: &Entity) -> Result<Option<Version>> {
        let config = self.config;
        self.store.atomically(|store| {
            let current = store
                .get_entity(&edited.id)?
                .ok_or_else(|| Error::NotFound(format!("entity {}", edited.id)))?;
            if current.content == edited.content
                && VersionSnapshot::from(&current) == VersionSnapshot::from(edited)
                && current.tags == edited.tags
            {
                return Ok(None);
            }

            let mut updated = edited.clone();
            updated.updated_at = now_millis();
            store.update_entity(&updated)?;
            record_version(
                store,
                config,
                updated.entity_ref(),
                &updated.content,
                VersionSnapshot::from(&updated),
                VersionType::AutoSave,
                None,
            )
            .map(Some)
        })
    }

    /// All versions of an entity, newest first
    pub fn fetch_versions(&self, entity: &EntityId) -> Result<Vec<Version>> {
        let mut versions = self.store.list_versions(entity)?;
        versions.reverse();
        Ok(versions)
    }

    /// Fetch one version by number
    pub fn get_version(&self, entity: &EntityId, version_number: i64) -> Result<Version> {
        self.store
            .get_version(entity, version_number)?
            .ok_or_else(|| Error::NotFound(format!("version {version_number} of {entity}")))
    }

    /// Full content of a stored version
    pub fn content_of(&self, version: &Version) -> Result<String> {
        let all = self.store.list_versions(&version.entity.id)?;
        reconstruct_content(version, &all)
    }

    /// Line diff between two versions of the same entity
    pub fn compare_versions(&self, entity: &EntityId, from: i64, to: i64) -> Result<LineDiff> {
        let all = self.store.list_versions(entity)?;
        let content = |number: i64| {
            all.iter()
                .find(|version| version.version_number == number)
                .ok_or_else(|| Error::NotFound(format!("version {number} of {entity}")))
                .and_then(|version| reconstruct_content(version, &all))
        };
        Ok(diff(&content(from)?, &content(to)?))
    }

    /// Bring back an old version.
    ///
    /// Without `create_copy` the live entity is overwritten, after its current
    /// state has been captured as an auto-save version. With `create_copy` a
    /// new entity is created and the original is left untouched.
    pub fn restore_version(
        &mut self,
        entity: &EntityId,
        version_number: i64,
        create_copy: bool,
    ) -> Result<RestoreOutcome> {
        let config = self.config;
        self.store.atomically(|store| {
            let mut live = store
                .get_entity(entity)?
                .ok_or_else(|| Error::NotFound(format!("entity {entity}")))?;
            let all = store.list_versions(entity)?;
            let target = all
                .iter()
                .find(|version| version.version_number == version_number)
                .ok_or_else(|| Error::NotFound(format!("version {version_number} of {entity}")))?;
            let content = reconstruct_content(target, &all)?;

            if create_copy {
                let mut copy = Entity::new(
                    live.kind,
                    format!("{} (v{version_number})", target.snapshot.title),
                    content,
                );
                copy.artist.clone_from(&target.snapshot.artist);
                copy.key.clone_from(&target.snapshot.key);
                copy.tempo = target.snapshot.tempo;
                copy.tags.clone_from(&live.tags);
                store.insert_entity(&copy)?;
                let baseline = record_version(
                    store,
                    config,
                    copy.entity_ref(),
                    &copy.content,
                    VersionSnapshot::from(&copy),
                    VersionType::Restore,
                    Some(&format!("Copied from version {version_number} of {entity}")),
                )?;
                tracing::info!("Restored version {version_number} of {entity} as new entity {}", copy.id);
                return Ok(RestoreOutcome::Copied {
                    entity: copy,
                    baseline,
                });
            }

            let backup = record_version(
                store,
                config,
                live.entity_ref(),
                &live.content,
                VersionSnapshot::from(&live),
                VersionType::AutoSave,
                Some(&format!("Before restoring version {version_number}")),
            )?;

            live.content = content;
            live.title.clone_from(&target.snapshot.title);
            live.artist.clone_from(&target.snapshot.artist);
            live.key.clone_from(&target.snapshot.key);
            live.tempo = target.snapshot.tempo;
            live.updated_at = now_millis();
            store.update_entity(&live)?;

            let restore = record_version(
                store,
                config,
                live.entity_ref(),
                &live.content,
                VersionSnapshot::from(&live),
                VersionType::Restore,
                Some(&format!("Restored version {version_number}")),
            )?;
            tracing::info!("Restored version {version_number} of {entity}");

            Ok(RestoreOutcome::Overwritten {
                entity: live,
                backup,
                restore,
            })
        })
    }

    /// Delete one version.
    ///
    /// The last remaining import baseline of an entity is never deleted, and
    /// versions other deltas depend on are refused or re-based per `mode`.
    pub fn delete_version(
        &mut self,
        entity: &EntityId,
        version_number: i64,
        mode: DeletionMode,
    ) -> Result<()> {
        let config = self.config;
        self.store
            .atomically(|store| remove_version(store, config, entity, version_number, mode))
    }

    /// Delete the oldest versions beyond the newest `keep_latest`.
    ///
    /// Import versions are skipped; dependents are re-based. Returns the number
    /// of versions removed.
    pub fn prune_versions(&mut self, entity: &EntityId, keep_latest: usize) -> Result<usize> {
        if keep_latest == 0 {
            return Err(Error::InvalidInput(
                "keep_latest must be at least 1".to_string(),
            ));
        }

        let config = self.config;
        self.store.atomically(|store| {
            let all = store.list_versions(entity)?;
            let excess = all.len().saturating_sub(keep_latest);
            let candidates: Vec<i64> = all
                .iter()
                .take(excess)
                .filter(|version| version.version_type != VersionType::Import)
                .map(|version| version.version_number)
                .collect();

            for number in &candidates {
                remove_version(store, config, entity, *number, DeletionMode::Rebase)?;
            }
            if !candidates.is_empty() {
                tracing::info!("Pruned {} versions of {entity}", candidates.len());
            }
            Ok(candidates.len())
        })
    }

    /// Storage statistics for one entity
    pub fn get_storage_stats(&self, entity: &EntityId) -> Result<VersionStorageStats> {
        let versions = self.store.list_versions(entity)?;
        Ok(VersionStorageStats::from_versions(&versions))
    }

    /// Reconstruct every version of an entity, failing on the first corrupt one
    pub fn verify_chain(&self, entity: &EntityId) -> Result<ChainReport> {
        let all = self.store.list_versions(entity)?;
        let mut max_depth = 0;
        for version in &all {
            reconstruct_content(version, &all)?;
            max_depth = max_depth.max(chain_depth(version, &all)?);
        }
        Ok(ChainReport {
            checked: all.len(),
            max_depth,
        })
    }
}

/// Append a version inside the caller's atomic section
pub fn record_version<S: Store>(
    store: &mut S,
    config: &VersioningConfig,
    entity: EntityRef,
    content: &str,
    metadata: VersionSnapshot,
    version_type: VersionType,
    description: Option<&str>,
) -> Result<Version> {
    let live = store
        .get_entity(&entity.id)?
        .ok_or_else(|| Error::Storage(format!("unknown entity {entity}")))?;
    if live.kind != entity.kind {
        return Err(Error::Storage(format!(
            "entity {} is a {}, not a {}",
            entity.id, live.kind, entity.kind
        )));
    }

    let all = store.list_versions(&entity.id)?;
    let base = match all.last() {
        Some(latest) if chain_depth(latest, &all)? < config.max_chain_depth => {
            Some((latest.version_number, reconstruct_content(latest, &all)?))
        }
        _ => None,
    };

    let payload = encode_payload(
        base.as_ref()
            .map(|(number, content)| (*number, content.as_str())),
        content,
        config.delta_ratio,
    );

    let version = Version {
        id: VersionId::new(),
        entity,
        version_number: store.next_version_number(&entity.id)?,
        version_type,
        payload,
        content_length: content.len(),
        snapshot: metadata,
        changed_by: config.device_label.clone(),
        created_at: now_millis(),
        change_description: description.map(ToString::to_string),
    };
    store.insert_version(&version)?;

    tracing::debug!(
        "Recorded {} version {} of {} ({})",
        version.version_type,
        version.version_number,
        entity,
        if version.is_delta() { "delta" } else { "full" }
    );
    Ok(version)
}

fn remove_version<S: Store>(
    store: &mut S,
    config: &VersioningConfig,
    entity: &EntityId,
    version_number: i64,
    mode: DeletionMode,
) -> Result<()> {
    let all = store.list_versions(entity)?;
    let target = all
        .iter()
        .find(|version| version.version_number == version_number)
        .ok_or_else(|| Error::NotFound(format!("version {version_number} of {entity}")))?;

    let imports = all
        .iter()
        .filter(|version| version.version_type == VersionType::Import)
        .count();
    if target.version_type == VersionType::Import && imports == 1 {
        tracing::warn!("Refusing to delete the only import baseline of {entity}");
        return Err(Error::ProtectedVersion(format!(
            "version {version_number} is the only import baseline of {entity}"
        )));
    }

    let dependents: Vec<&Version> = all
        .iter()
        .filter(|version| version.base_version() == Some(version_number))
        .collect();

    if !dependents.is_empty() {
        if mode == DeletionMode::Strict {
            let numbers = dependents
                .iter()
                .map(|version| version.version_number.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!("Refusing to delete version {version_number} of {entity}: delta base of {numbers}");
            return Err(Error::ProtectedVersion(format!(
                "version {version_number} is the delta base of version(s) {numbers}"
            )));
        }

        // Dependents move onto the target's own base, or become full snapshots
        let new_base = match target.base_version() {
            Some(base) => {
                let base_version = all
                    .iter()
                    .find(|version| version.version_number == base)
                    .ok_or_else(|| Error::corrupt(version_number, format!("base version {base} is missing")))?;
                Some((base, reconstruct_content(base_version, &all)?))
            }
            None => None,
        };

        for dependent in dependents {
            let content = reconstruct_content(dependent, &all)?;
            let payload = match &new_base {
                Some((base, base_content)) => {
                    encode_payload(Some((*base, base_content)), &content, config.delta_ratio)
                }
                None => VersionPayload::Full(content),
            };
            let mut rebased = dependent.clone();
            rebased.payload = payload;
            store.replace_version(&rebased)?;
            tracing::debug!(
                "Re-based version {} of {entity} off deleted version {version_number}",
                rebased.version_number
            );
        }
    }

    store.delete_version(&target.id)
}
