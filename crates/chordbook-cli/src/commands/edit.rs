use std::path::Path;

use chordbook_core::{VersionStore, VersioningConfig};

use crate::commands::common::{open_store, read_content, resolve_entity};
use crate::error::CliError;

pub struct EntityEdit<'a> {
    pub file: Option<&'a Path>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub key: Option<String>,
    pub tempo: Option<u32>,
}

impl EntityEdit<'_> {
    const fn has_field_changes(&self) -> bool {
        self.title.is_some() || self.artist.is_some() || self.key.is_some() || self.tempo.is_some()
    }
}

pub fn run_edit(
    id: &str,
    edit: EntityEdit<'_>,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;
    let mut entity = resolve_entity(id, &store)?;

    let content = read_content(edit.file)?;
    if content.is_none() && !edit.has_field_changes() {
        return Err(CliError::NothingToEdit);
    }

    if let Some(content) = content {
        entity.content = content;
    }
    if let Some(title) = edit.title {
        entity.title = title;
    }
    if let Some(artist) = edit.artist {
        entity.artist = Some(artist);
    }
    if let Some(key) = edit.key {
        entity.key = Some(key);
    }
    if let Some(tempo) = edit.tempo {
        entity.tempo = Some(tempo);
    }

    match VersionStore::new(&mut store, config).commit_edit(&entity)? {
        Some(version) => println!("{} v{}", entity.id, version.version_number),
        None => println!("{} unchanged", entity.id),
    }
    Ok(())
}
