use std::path::Path;

use chordbook_core::models::{Entity, EntityKind, VersionType};
use chordbook_core::{VersionStore, VersioningConfig};

use crate::commands::common::{open_store, read_content};
use crate::error::CliError;

pub struct NewEntity<'a> {
    pub title: &'a str,
    pub kind: EntityKind,
    pub file: Option<&'a Path>,
    pub artist: Option<String>,
    pub key: Option<String>,
    pub tempo: Option<u32>,
    pub tags: Vec<String>,
    pub import: bool,
}

pub fn run_add(
    request: NewEntity<'_>,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let content = read_content(request.file)?.unwrap_or_default();

    let mut entity = Entity::new(request.kind, request.title.trim(), content)
        .with_tags(request.tags);
    entity.artist = request.artist;
    entity.key = request.key;
    entity.tempo = request.tempo;

    let (version_type, description) = if request.import {
        (VersionType::Import, "Imported")
    } else {
        (VersionType::Manual, "Created")
    };

    let mut store = open_store(db_path)?;
    VersionStore::new(&mut store, config).create_entity(
        &entity,
        version_type,
        Some(description),
    )?;
    println!("{}", entity.id);
    Ok(())
}
