//! Conflict detection between a local and a remote snapshot

use serde::{Deserialize, Serialize};

use super::merge::conflicting_fields;
use super::resolution::ResolutionStrategy;
use crate::diff::is_whitespace_only_change;
use crate::models::{
    ConflictData, ConflictId, ConflictPriority, ConflictStatus, ConflictType, ConflictVersion,
    EntityRef, FieldKey, SyncConflict,
};
use crate::util::now_millis;

/// Which side moved away from the last common state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Divergence {
    Identical,
    /// Only this device changed; nothing to pull
    LocalOnly,
    /// Only the remote changed; safe to fast-forward
    RemoteOnly,
    /// Both sides changed, or there is no common state to compare with
    Both,
}

pub fn classify_divergence(
    local: &ConflictData,
    remote: &ConflictData,
    last_common: Option<&ConflictData>,
) -> Divergence {
    if local == remote {
        return Divergence::Identical;
    }
    match last_common {
        Some(base) if local == base => Divergence::RemoteOnly,
        Some(base) if remote == base => Divergence::LocalOnly,
        _ => Divergence::Both,
    }
}

/// Compare two snapshots and describe their conflict, if any.
///
/// Deletion outranks content, content outranks structured properties.
/// Only a deletion whose opposite side is unchanged since `last_common`
/// can be settled without the user.
pub fn detect(
    entity: EntityRef,
    local: &ConflictVersion,
    remote: &ConflictVersion,
    last_common: Option<&ConflictData>,
) -> Option<SyncConflict> {
    if local.data == remote.data {
        return None;
    }

    let (conflict_type, priority, requires_user_input) =
        if local.data.is_deleted != remote.data.is_deleted {
            let surviving = if local.data.is_deleted {
                &remote.data
            } else {
                &local.data
            };
            let untouched = last_common.is_some_and(|base| base == surviving);
            (ConflictType::Deletion, ConflictPriority::High, !untouched)
        } else if local.data.content != remote.data.content {
            let priority = if is_whitespace_only_change(&local.data.content, &remote.data.content) {
                ConflictPriority::Medium
            } else {
                ConflictPriority::High
            };
            (ConflictType::ContentModification, priority, true)
        } else {
            let priority = conflicting_fields(&local.data, &remote.data)
                .into_iter()
                .map(FieldKey::importance)
                .max()
                .unwrap_or(ConflictPriority::Low);
            (ConflictType::PropertyConflict, priority, true)
        };

    tracing::debug!("Detected {conflict_type} conflict on {entity} ({priority} priority)");

    Some(SyncConflict {
        id: ConflictId::new(),
        conflict_type,
        entity,
        local_version: local.clone(),
        remote_version: remote.clone(),
        priority,
        detected_at: now_millis(),
        requires_user_input,
        status: ConflictStatus::Open,
    })
}

impl SyncConflict {
    /// Strategy that settles this conflict without asking, when one exists.
    ///
    /// A deletion against an unchanged opposite side settles to "not deleted":
    /// the surviving side is kept.
    pub fn auto_resolution(&self) -> Option<ResolutionStrategy> {
        if self.requires_user_input || self.conflict_type != ConflictType::Deletion {
            return None;
        }
        if self.local_version.data.is_deleted {
            Some(ResolutionStrategy::KeepRemote)
        } else {
            Some(ResolutionStrategy::KeepLocal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityId, EntityKind};
    use pretty_assertions::assert_eq;

    fn data(content: &str) -> ConflictData {
        ConflictData {
            title: "Amazing Grace".to_string(),
            content: content.to_string(),
            key: Some("G".to_string()),
            ..ConflictData::default()
        }
    }

    fn side(device: &str, data: ConflictData) -> ConflictVersion {
        ConflictVersion::new(device, 1_700_000_000_000, data)
    }

    fn entity() -> EntityRef {
        EntityRef::new(EntityId::new(), EntityKind::Song)
    }

    #[test]
    fn identical_snapshots_do_not_conflict() {
        let local = side("phone", data("A\nB"));
        let remote = side("tablet", data("A\nB"));
        assert!(detect(entity(), &local, &remote, None).is_none());
    }

    #[test]
    fn content_change_is_high_priority() {
        let local = side("phone", data("A\nB"));
        let remote = side("tablet", data("A\nC"));
        let conflict = detect(entity(), &local, &remote, None).unwrap();

        assert_eq!(conflict.conflict_type, ConflictType::ContentModification);
        assert_eq!(conflict.priority, ConflictPriority::High);
        assert!(conflict.requires_user_input);
        assert_eq!(conflict.status, ConflictStatus::Open);
        assert_eq!(conflict.auto_resolution(), None);
    }

    #[test]
    fn whitespace_only_content_change_is_medium() {
        let local = side("phone", data("[G]Amazing grace\n"));
        let remote = side("tablet", data("[G]Amazing  grace \n"));
        let conflict = detect(entity(), &local, &remote, None).unwrap();
        assert_eq!(conflict.priority, ConflictPriority::Medium);
    }

    #[test]
    fn property_priority_follows_field_importance() {
        let local = side("phone", data("A"));
        let mut remote_data = data("A");
        remote_data.key = Some("C".to_string());
        let conflict = detect(entity(), &local, &side("tablet", remote_data), None).unwrap();
        assert_eq!(conflict.conflict_type, ConflictType::PropertyConflict);
        assert_eq!(conflict.priority, ConflictPriority::Medium);

        let mut cosmetic = data("A");
        cosmetic.tags = vec!["hymn".to_string()];
        let conflict = detect(entity(), &local, &side("tablet", cosmetic), None).unwrap();
        assert_eq!(conflict.priority, ConflictPriority::Low);
    }

    #[test]
    fn deletion_outranks_content() {
        let local = side("phone", data("A\nB"));
        let mut deleted = data("A\nC");
        deleted.is_deleted = true;
        let conflict = detect(entity(), &local, &side("tablet", deleted), Some(&data("A"))).unwrap();

        assert_eq!(conflict.conflict_type, ConflictType::Deletion);
        assert_eq!(conflict.priority, ConflictPriority::High);
        assert!(conflict.requires_user_input);
    }

    #[test]
    fn deletion_against_untouched_side_resolves_itself() {
        let common = data("A\nB");
        let local = side("phone", common.clone());
        let mut deleted = common.clone();
        deleted.is_deleted = true;
        let conflict = detect(entity(), &local, &side("tablet", deleted), Some(&common)).unwrap();

        assert!(!conflict.requires_user_input);
        assert_eq!(conflict.auto_resolution(), Some(ResolutionStrategy::KeepLocal));
    }

    #[test]
    fn deletion_without_common_state_needs_user() {
        let mut deleted = data("A");
        deleted.is_deleted = true;
        let conflict = detect(
            entity(),
            &side("phone", deleted),
            &side("tablet", data("A")),
            None,
        )
        .unwrap();
        assert!(conflict.requires_user_input);
    }

    #[test]
    fn classifies_divergence_against_common_state() {
        let base = data("A");
        let changed = data("B");
        let other = data("C");

        assert_eq!(classify_divergence(&base, &base, None), Divergence::Identical);
        assert_eq!(
            classify_divergence(&base, &changed, Some(&base)),
            Divergence::RemoteOnly
        );
        assert_eq!(
            classify_divergence(&changed, &base, Some(&base)),
            Divergence::LocalOnly
        );
        assert_eq!(
            classify_divergence(&changed, &other, Some(&base)),
            Divergence::Both
        );
        assert_eq!(classify_divergence(&changed, &other, None), Divergence::Both);
    }
}
