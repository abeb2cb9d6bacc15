use std::io::{self, IsTerminal, Read};
use std::path::Path;

use chordbook_core::db::{EntityRepository, SqliteStore};
use chordbook_core::models::{Entity, EntityId, SyncConflict, Version};
use chordbook_core::util::now_millis;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

#[derive(Debug, Serialize)]
pub struct VersionListItem {
    pub version_number: i64,
    pub version_type: String,
    pub storage: &'static str,
    pub stored_bytes: usize,
    pub content_length: usize,
    pub title: String,
    pub changed_by: String,
    pub created_at: i64,
    pub relative_time: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConflictListItem {
    pub id: String,
    pub entity: String,
    pub conflict_type: String,
    pub priority: String,
    pub status: String,
    pub requires_user_input: bool,
    pub local_device: String,
    pub remote_device: String,
    pub detected_at: i64,
    pub detected_at_iso: String,
}

pub fn open_store(path: &Path) -> Result<SqliteStore, CliError> {
    Ok(SqliteStore::open(path)?)
}

pub fn normalize_entity_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyEntityId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Find an entity by full ID or unique ID prefix
pub fn resolve_entity(query: &str, store: &SqliteStore) -> Result<Entity, CliError> {
    let query = normalize_entity_identifier(query)?;
    if let Ok(id) = query.parse::<EntityId>() {
        if let Some(entity) = store.get_entity(&id)? {
            return Ok(entity);
        }
    }

    let mut matches = store
        .list_entities(None)?
        .into_iter()
        .filter(|entity| entity.id.to_string().starts_with(&query))
        .collect::<Vec<_>>();

    match matches.len() {
        0 => Err(CliError::EntityNotFound(query)),
        1 => Ok(matches.remove(0)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|entity| short_id(&entity.id.to_string()))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousEntityId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

/// Content from a file, or from stdin when it is piped
pub fn read_content(file: Option<&Path>) -> Result<Option<String>, CliError> {
    if let Some(path) = file {
        return Ok(Some(std::fs::read_to_string(path)?));
    }
    read_piped_stdin()
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(Some(buffer))
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn version_to_list_item(version: &Version) -> VersionListItem {
    let now_ms = now_millis();
    VersionListItem {
        version_number: version.version_number,
        version_type: version.version_type.to_string(),
        storage: if version.is_delta() { "delta" } else { "full" },
        stored_bytes: version.stored_bytes(),
        content_length: version.content_length,
        title: version.snapshot.title.clone(),
        changed_by: version.changed_by.clone(),
        created_at: version.created_at,
        relative_time: format_relative_time(version.created_at, now_ms),
        description: version.change_description.clone(),
    }
}

pub fn format_version_lines(versions: &[Version]) -> Vec<String> {
    let now_ms = now_millis();
    versions
        .iter()
        .map(|version| {
            let number = format!("v{}", version.version_number);
            let storage = if version.is_delta() { "delta" } else { "full" };
            let relative_time = format_relative_time(version.created_at, now_ms);
            let line = format!(
                "{number:<6}  {:<9}  {storage:<5}  {relative_time:<10}  {}",
                version.version_type.as_str(),
                version.changed_by
            );
            match &version.change_description {
                Some(description) => format!("{line}  {description}"),
                None => line,
            }
        })
        .collect()
}

pub fn conflict_to_list_item(conflict: &SyncConflict) -> ConflictListItem {
    ConflictListItem {
        id: conflict.id.to_string(),
        entity: conflict.entity.to_string(),
        conflict_type: conflict.conflict_type.to_string(),
        priority: conflict.priority.to_string(),
        status: conflict.status.to_string(),
        requires_user_input: conflict.requires_user_input,
        local_device: conflict.local_version.device.clone(),
        remote_device: conflict.remote_version.device.clone(),
        detected_at: conflict.detected_at,
        detected_at_iso: format_timestamp(conflict.detected_at),
    }
}

pub fn format_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<6}  {:<20}  {:<8}  {}  {} vs {}",
                short_id(&conflict.id.to_string()),
                conflict.priority.as_str(),
                conflict.conflict_type.as_str(),
                conflict.status.as_str(),
                conflict.entity,
                conflict.local_version.device,
                conflict.remote_version.device
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
