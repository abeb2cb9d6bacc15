use std::path::Path;

use chordbook_core::diff::DiffLineKind;
use chordbook_core::{VersionStore, VersioningConfig};

use crate::commands::common::{
    format_version_lines, open_store, resolve_entity, version_to_list_item, VersionListItem,
};
use crate::error::CliError;

pub fn run_history(
    id: &str,
    as_json: bool,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;
    let entity = resolve_entity(id, &store)?;
    let versions = VersionStore::new(&mut store, config).fetch_versions(&entity.id)?;

    if as_json {
        let items = versions
            .iter()
            .map(version_to_list_item)
            .collect::<Vec<VersionListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_version_lines(&versions) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn run_show(
    id: &str,
    version_number: Option<i64>,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;
    let entity = resolve_entity(id, &store)?;

    let content = match version_number {
        Some(number) => {
            let versions = VersionStore::new(&mut store, config);
            let version = versions.get_version(&entity.id, number)?;
            versions.content_of(&version)?
        }
        None => entity.content,
    };
    print!("{content}");
    if !content.is_empty() && !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

pub fn run_diff(
    id: &str,
    from: i64,
    to: i64,
    as_json: bool,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;
    let entity = resolve_entity(id, &store)?;
    let versions = VersionStore::new(&mut store, config);
    let base = versions.content_of(&versions.get_version(&entity.id, from)?)?;
    let line_diff = versions.compare_versions(&entity.id, from, to)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&line_diff)?);
        return Ok(());
    }

    for line in render_diff_lines(&line_diff.annotate(&base)?) {
        println!("{line}");
    }
    let stats = line_diff.stats();
    println!(
        "-- v{from} -> v{to}: {} inserted, {} deleted, {} unchanged",
        stats.inserted, stats.deleted, stats.kept
    );
    Ok(())
}

pub fn render_diff_lines(lines: &[chordbook_core::diff::DiffLine]) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            let marker = match line.kind {
                DiffLineKind::Keep => ' ',
                DiffLineKind::Insert => '+',
                DiffLineKind::Delete => '-',
            };
            format!("{marker} {}", line.text)
        })
        .collect()
}
