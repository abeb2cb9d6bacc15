use std::path::Path;

use chordbook_core::db::EntityRepository;
use chordbook_core::models::VersionStorageStats;
use chordbook_core::{VersionStore, VersioningConfig};

use crate::commands::common::{open_store, resolve_entity};
use crate::error::CliError;

pub fn run_prune(
    id: &str,
    keep_latest: usize,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;
    let entity = resolve_entity(id, &store)?;
    let removed = VersionStore::new(&mut store, config).prune_versions(&entity.id, keep_latest)?;
    println!("Pruned {removed} version(s) of {}", entity.id);
    Ok(())
}

pub fn run_stats(
    id: &str,
    as_json: bool,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;
    let entity = resolve_entity(id, &store)?;
    let stats = VersionStore::new(&mut store, config).get_storage_stats(&entity.id)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        for line in format_stats_lines(&stats) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_stats_lines(stats: &VersionStorageStats) -> Vec<String> {
    vec![
        format!("versions:     {}", stats.version_count),
        format!("deltas:       {}", stats.delta_count),
        format!("stored bytes: {}", stats.total_stored_bytes),
        format!("compression:  {:.1}%", stats.compression_ratio * 100.0),
    ]
}

/// Verify one entity, or every entity when `id` is `None`
pub fn run_verify(
    id: Option<&str>,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;
    let entities = match id {
        Some(id) => vec![resolve_entity(id, &store)?],
        None => store.list_entities(None)?,
    };

    let versions = VersionStore::new(&mut store, config);
    let mut corrupt = 0;
    for entity in &entities {
        match versions.verify_chain(&entity.id) {
            Ok(report) => println!(
                "ok       {}  {} version(s), max depth {}",
                entity.entity_ref(),
                report.checked,
                report.max_depth
            ),
            Err(error) if error.is_corruption() => {
                corrupt += 1;
                println!("corrupt  {}  {error}", entity.entity_ref());
            }
            Err(error) => return Err(error.into()),
        }
    }

    if corrupt > 0 {
        return Err(CliError::CorruptHistory(corrupt));
    }
    Ok(())
}
