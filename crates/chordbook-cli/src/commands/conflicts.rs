use std::path::Path;

use chordbook_core::conflict::{
    ConflictManager, FieldChoices, MergeRequest, ReceiveOutcome, ResolutionOutcome,
    ResolutionStrategy,
};
use chordbook_core::models::{ConflictData, ConflictId, ConflictVersion};
use chordbook_core::util::now_millis;
use chordbook_core::VersioningConfig;

use crate::cli::StrategyArg;
use crate::commands::common::{
    conflict_to_list_item, format_conflict_lines, open_store, read_json_file, resolve_entity,
    ConflictListItem,
};
use crate::commands::history::render_diff_lines;
use crate::error::CliError;

pub fn run_list(as_json: bool, config: &VersioningConfig, db_path: &Path) -> Result<(), CliError> {
    let mut store = open_store(db_path)?;
    let conflicts = ConflictManager::new(&mut store, config).list_conflicts(None)?;

    if as_json {
        let items = conflicts
            .iter()
            .map(conflict_to_list_item)
            .collect::<Vec<ConflictListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if conflicts.is_empty() {
        println!("No conflicts");
    } else {
        for line in format_conflict_lines(&conflicts) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn run_receive(
    id: &str,
    snapshot: &Path,
    device: &str,
    base: Option<&Path>,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let remote_data: ConflictData = read_json_file(snapshot)?;
    let last_common = base.map(read_json_file::<ConflictData>).transpose()?;

    let mut store = open_store(db_path)?;
    let entity = resolve_entity(id, &store)?;
    let remote = ConflictVersion::new(device, now_millis(), remote_data);

    let outcome = ConflictManager::new(&mut store, config).receive_remote(
        &entity.id,
        &remote,
        last_common.as_ref(),
    )?;
    match outcome {
        ReceiveOutcome::UpToDate => println!("{} up to date", entity.id),
        ReceiveOutcome::LocalAhead => println!("{} local changes only", entity.id),
        ReceiveOutcome::FastForwarded(version) => {
            println!("{} updated as v{}", entity.id, version.version_number);
        }
        ReceiveOutcome::Conflict(conflict) => println!(
            "{} {} conflict ({} priority)",
            conflict.id, conflict.conflict_type, conflict.priority
        ),
        ReceiveOutcome::AutoResolved(resolution) => println!(
            "{} resolved automatically as v{}",
            entity.id, resolution.version.version_number
        ),
    }
    Ok(())
}

pub fn run_preview(
    conflict: &str,
    choices: Option<&Path>,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let id = parse_conflict_id(conflict)?;
    let choices = load_choices(choices)?;

    let mut store = open_store(db_path)?;
    let manager = ConflictManager::new(&mut store, config);
    let local_content = manager.get_conflict(&id)?.local_version.data.content;
    let preview = manager.preview(&id, &choices)?;

    println!("{}", serde_json::to_string_pretty(&preview.merged)?);
    if !preview.unresolved.is_empty() {
        let missing = preview
            .unresolved
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!("-- no choice yet for: {missing}");
    }
    if !preview.content_diff.is_identity() {
        for line in render_diff_lines(&preview.content_diff.annotate(&local_content)?) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn run_resolve(
    conflict: &str,
    strategy: StrategyArg,
    choices: Option<&Path>,
    content: Option<&Path>,
    config: &VersioningConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let id = parse_conflict_id(conflict)?;
    let strategy = build_strategy(strategy, load_choices(choices)?, content)?;

    let mut store = open_store(db_path)?;
    match ConflictManager::new(&mut store, config).resolve(&id, &strategy)? {
        ResolutionOutcome::Resolved(resolution) => {
            println!(
                "{} resolved as v{}",
                resolution.entity.id, resolution.version.version_number
            );
            if let Some(duplicate) = resolution.duplicate {
                println!("{} ({})", duplicate.id, duplicate.title);
            }
        }
        ResolutionOutcome::Deferred(deferred) => {
            println!("{} deferred; {} held back from sync", deferred.id, deferred.entity);
        }
    }
    Ok(())
}

pub fn build_strategy(
    strategy: StrategyArg,
    choices: FieldChoices,
    content: Option<&Path>,
) -> Result<ResolutionStrategy, CliError> {
    Ok(match strategy {
        StrategyArg::KeepLocal => ResolutionStrategy::KeepLocal,
        StrategyArg::KeepRemote => ResolutionStrategy::KeepRemote,
        StrategyArg::KeepBoth => ResolutionStrategy::KeepBoth,
        StrategyArg::Skip => ResolutionStrategy::SkipForNow,
        StrategyArg::Merge => ResolutionStrategy::Merge(MergeRequest {
            choices,
            resolved_content: content.map(std::fs::read_to_string).transpose()?,
        }),
    })
}

pub fn parse_conflict_id(raw: &str) -> Result<ConflictId, CliError> {
    raw.trim()
        .parse::<ConflictId>()
        .map_err(|_| CliError::InvalidConflictId(raw.to_string()))
}

fn load_choices(path: Option<&Path>) -> Result<FieldChoices, CliError> {
    path.map_or_else(|| Ok(FieldChoices::new()), read_json_file)
}
