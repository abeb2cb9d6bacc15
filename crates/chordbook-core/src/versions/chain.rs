//! Delta chain walking and content reconstruction

use std::collections::HashMap;

use crate::diff::{apply, diff, LineDiff};
use crate::error::{Error, Result};
use crate::models::{Version, VersionPayload};

/// Reconstruct the full content of `version` from the entity's version log.
///
/// Walks base links backward until a full snapshot is found, then applies the
/// deltas forward. The walk is iterative and bounded by the size of the log;
/// base numbers must strictly decrease, so cycles are reported as corruption.
pub fn reconstruct_content(version: &Version, all_versions: &[Version]) -> Result<String> {
    let chain = collect_chain(version, all_versions)?;

    let (root, deltas) = chain
        .split_last()
        .ok_or_else(|| Error::corrupt(version.version_number, "empty chain"))?;
    let VersionPayload::Full(content) = &root.payload else {
        return Err(Error::corrupt(
            version.version_number,
            "chain does not end in a full snapshot",
        ));
    };

    let mut content = content.clone();
    for link in deltas.iter().rev() {
        if let VersionPayload::Delta { diff, .. } = &link.payload {
            content = apply(&content, diff).map_err(|error| {
                Error::corrupt(
                    link.version_number,
                    format!("delta does not apply to its base: {error}"),
                )
            })?;
        }
    }

    if content.len() != version.content_length {
        return Err(Error::corrupt(
            version.version_number,
            format!(
                "reconstructed {} bytes, expected {}",
                content.len(),
                version.content_length
            ),
        ));
    }

    Ok(content)
}

/// Number of delta hops between `version` and its full snapshot
pub fn chain_depth(version: &Version, all_versions: &[Version]) -> Result<usize> {
    Ok(collect_chain(version, all_versions)?.len() - 1)
}

/// Versions from `version` back to its full snapshot, newest first
fn collect_chain<'a>(version: &'a Version, all_versions: &'a [Version]) -> Result<Vec<&'a Version>> {
    let by_number: HashMap<i64, &Version> = all_versions
        .iter()
        .map(|candidate| (candidate.version_number, candidate))
        .collect();
    let max_hops = all_versions.len();

    let mut chain = vec![version];
    let mut current = version;
    while let Some(base) = current.base_version() {
        if chain.len() > max_hops {
            return Err(corrupt_chain(version, "chain exceeds the number of stored versions"));
        }
        if base >= current.version_number {
            return Err(corrupt_chain(
                version,
                &format!(
                    "version {} deltas against later version {base}",
                    current.version_number
                ),
            ));
        }
        current = by_number.get(&base).copied().ok_or_else(|| {
            corrupt_chain(
                version,
                &format!(
                    "base version {base} of version {} is missing",
                    current.version_number
                ),
            )
        })?;
        chain.push(current);
    }

    Ok(chain)
}

fn corrupt_chain(version: &Version, reason: &str) -> Error {
    tracing::warn!(
        "Corrupt version chain for {} at version {}: {reason}",
        version.entity,
        version.version_number
    );
    Error::corrupt(version.version_number, reason)
}

/// Encode `content` as a delta on top of `base_number` when that is small enough,
/// otherwise as a full snapshot.
#[allow(clippy::cast_precision_loss)]
pub fn encode_payload(
    base: Option<(i64, &str)>,
    content: &str,
    delta_ratio: f64,
) -> VersionPayload {
    let Some((base_number, base_content)) = base else {
        return VersionPayload::Full(content.to_string());
    };

    let delta: LineDiff = diff(base_content, content);
    let delta_len = delta.encoded_len();
    if (delta_len as f64) < content.len() as f64 * delta_ratio {
        tracing::debug!(
            "Encoding delta against version {base_number} ({delta_len} bytes for {} bytes of content)",
            content.len()
        );
        VersionPayload::Delta {
            base: base_number,
            diff: delta,
        }
    } else {
        tracing::debug!(
            "Encoding full snapshot ({delta_len} byte delta not below ratio {delta_ratio})"
        );
        VersionPayload::Full(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityId, EntityKind, EntityRef, VersionId, VersionSnapshot, VersionType};
    use pretty_assertions::assert_eq;

    fn make(number: i64, payload: VersionPayload, content: &str) -> Version {
        Version {
            id: VersionId::new(),
            entity: EntityRef::new(EntityId::default(), EntityKind::Song),
            version_number: number,
            version_type: VersionType::AutoSave,
            payload,
            content_length: content.len(),
            snapshot: VersionSnapshot::default(),
            changed_by: "test".to_string(),
            created_at: 0,
            change_description: None,
        }
    }

    fn delta(number: i64, base: i64, from: &str, to: &str) -> Version {
        make(
            number,
            VersionPayload::Delta {
                base,
                diff: diff(from, to),
            },
            to,
        )
    }

    #[test]
    fn reconstructs_through_deltas() {
        let versions = vec![
            make(1, VersionPayload::Full("A\nB".into()), "A\nB"),
            delta(2, 1, "A\nB", "A\nC"),
            delta(3, 2, "A\nC", "A\nC\nD"),
        ];

        assert_eq!(reconstruct_content(&versions[2], &versions).unwrap(), "A\nC\nD");
        assert_eq!(reconstruct_content(&versions[1], &versions).unwrap(), "A\nC");
        assert_eq!(chain_depth(&versions[2], &versions).unwrap(), 2);
        assert_eq!(chain_depth(&versions[0], &versions).unwrap(), 0);
    }

    #[test]
    fn reconstruction_is_deterministic() {
        let versions = vec![
            make(1, VersionPayload::Full("x".into()), "x"),
            delta(2, 1, "x", "y\nz"),
        ];
        let first = reconstruct_content(&versions[1], &versions).unwrap();
        let second = reconstruct_content(&versions[1], &versions).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_full_snapshot_is_corrupt() {
        // Version 1 was lost, so version 3 cannot reach a full snapshot
        let versions = vec![delta(2, 1, "A", "B"), delta(3, 2, "B", "C")];
        let error = reconstruct_content(&versions[1], &versions).unwrap_err();
        assert!(matches!(error, Error::CorruptChain { version_number: 3, .. }));
    }

    #[test]
    fn forward_reference_is_corrupt() {
        let versions = vec![
            make(1, VersionPayload::Full("A".into()), "A"),
            delta(2, 3, "A", "B"),
            delta(3, 2, "B", "C"),
        ];
        assert!(reconstruct_content(&versions[2], &versions)
            .unwrap_err()
            .is_corruption());
    }

    #[test]
    fn mismatched_delta_is_corrupt() {
        let versions = vec![
            make(1, VersionPayload::Full("A\nZ".into()), "A\nZ"),
            delta(2, 1, "A\nB", "A\nC"),
        ];
        let error = reconstruct_content(&versions[1], &versions).unwrap_err();
        assert!(matches!(error, Error::CorruptChain { version_number: 2, .. }));
    }

    #[test]
    fn length_mismatch_is_corrupt() {
        let mut tampered = make(1, VersionPayload::Full("abc".into()), "abc");
        tampered.content_length = 2;
        assert!(reconstruct_content(&tampered, std::slice::from_ref(&tampered))
            .unwrap_err()
            .is_corruption());
    }

    #[test]
    fn encode_prefers_delta_for_small_edits() {
        let base: String = (0..50).map(|i| format!("[G]line {i}\n")).collect();
        let edited = base.replace("line 7\n", "line seven\n");
        assert!(matches!(
            encode_payload(Some((1, &base)), &edited, 0.5),
            VersionPayload::Delta { base: 1, .. }
        ));
    }

    #[test]
    fn encode_uses_full_for_rewrites_and_first_versions() {
        assert!(matches!(
            encode_payload(Some((1, "old text")), "completely new", 0.5),
            VersionPayload::Full(_)
        ));
        assert!(matches!(
            encode_payload(None, "first", 0.5),
            VersionPayload::Full(_)
        ));
        assert!(matches!(
            encode_payload(Some((1, "")), "", 0.5),
            VersionPayload::Full(_)
        ));
    }
}
