//! Field merge engine
//!
//! Pure functions over two snapshots. Nothing here touches the store, so the
//! same calls back both the committed merge and the read-only preview.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diff::{diff, LineDiff};
use crate::error::{Error, Result};
use crate::models::{ConflictData, FieldChoice, FieldKey, SyncConflict};

/// Per-field choices keyed by field
pub type FieldChoices = BTreeMap<FieldKey, FieldChoice>;

/// Fields whose values differ between the two snapshots, in merge order
pub fn conflicting_fields(local: &ConflictData, remote: &ConflictData) -> Vec<FieldKey> {
    FieldKey::ALL
        .into_iter()
        .filter(|key| !local.same_field(remote, *key))
        .collect()
}

/// Merge two snapshots field by field.
///
/// Conflicting fields take the value named in `choices`, `Local` when absent.
/// Fields equal on both sides pass through whatever `choices` says.
pub fn apply_field_choices(
    local: &ConflictData,
    remote: &ConflictData,
    choices: &FieldChoices,
) -> Result<ConflictData> {
    let mut merged = local.clone();
    for key in conflicting_fields(local, remote) {
        let value = match choices.get(&key) {
            None | Some(FieldChoice::Local) => continue,
            Some(FieldChoice::Remote) => remote.field(key),
            Some(FieldChoice::Custom(value)) => value.clone(),
        };
        merged.set_field(key, value)?;
    }
    Ok(merged)
}

/// Like [`apply_field_choices`], but every conflicting field needs a choice
pub fn apply_field_choices_strict(
    local: &ConflictData,
    remote: &ConflictData,
    choices: &FieldChoices,
) -> Result<ConflictData> {
    let missing = missing_choices(local, remote, choices);
    if !missing.is_empty() {
        return Err(Error::MergeIncomplete(missing));
    }
    apply_field_choices(local, remote, choices)
}

fn missing_choices(
    local: &ConflictData,
    remote: &ConflictData,
    choices: &FieldChoices,
) -> Vec<FieldKey> {
    conflicting_fields(local, remote)
        .into_iter()
        .filter(|key| !choices.contains_key(key))
        .collect()
}

/// What a merge would produce, without committing anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePreview {
    pub merged: ConflictData,
    /// Conflicting fields the caller has not chosen for yet
    pub unresolved: Vec<FieldKey>,
    /// Content change relative to the local side
    pub content_diff: LineDiff,
}

pub fn preview_merge(conflict: &SyncConflict, choices: &FieldChoices) -> Result<MergePreview> {
    let local = &conflict.local_version.data;
    let remote = &conflict.remote_version.data;
    let merged = apply_field_choices(local, remote, choices)?;
    let content_diff = diff(&local.content, &merged.content);

    Ok(MergePreview {
        unresolved: missing_choices(local, remote, choices),
        content_diff,
        merged,
    })
}
