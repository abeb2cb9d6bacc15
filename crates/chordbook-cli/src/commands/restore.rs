use std::path::Path;

use chordbook_core::versions::{DeletionMode, RestoreOutcome};
use chordbook_core::{VersionStore, VersioningConfig};

use crate::commands::common::{open_store, resolve_entity};
use crate::error::CliError;

pub fn run_restore(
    id: &str,
    version_number: i64,
    create_copy: bool,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;
    let entity = resolve_entity(id, &store)?;

    match VersionStore::new(&mut store, config).restore_version(
        &entity.id,
        version_number,
        create_copy,
    )? {
        RestoreOutcome::Overwritten {
            backup, restore, ..
        } => println!(
            "{} restored v{version_number} as v{} (previous state saved as v{})",
            entity.id, restore.version_number, backup.version_number
        ),
        RestoreOutcome::Copied { entity: copy, .. } => {
            println!("{} ({})", copy.id, copy.title);
        }
    }
    Ok(())
}

pub fn run_delete_version(
    id: &str,
    version_number: i64,
    rebase: bool,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;
    let entity = resolve_entity(id, &store)?;
    let mode = if rebase {
        DeletionMode::Rebase
    } else {
        DeletionMode::Strict
    };

    VersionStore::new(&mut store, config).delete_version(&entity.id, version_number, mode)?;
    println!("Deleted v{version_number} of {}", entity.id);
    Ok(())
}
