//! Chordbook CLI - inspect chord chart history and settle sync conflicts
//!
//! A thin layer over chordbook-core against the local `SQLite` library.

mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands, ConflictCommands};
use crate::commands::add::{run_add, NewEntity};
use crate::commands::completions::run_completions;
use crate::commands::conflicts::{run_list, run_preview, run_receive, run_resolve};
use crate::commands::edit::{run_edit, EntityEdit};
use crate::commands::history::{run_diff, run_history, run_show};
use crate::commands::maintenance::{run_prune, run_stats, run_verify};
use crate::commands::restore::{run_delete_version, run_restore};
use crate::config::{load_config, resolve_db_path};
use crate::error::CliError;

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "chordbook=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    let db_path = resolve_db_path(cli.db_path)?;

    match cli.command {
        Commands::Add {
            title,
            kind,
            file,
            artist,
            key,
            tempo,
            tags,
            import,
        } => run_add(
            NewEntity {
                title: &title,
                kind: kind.into(),
                file: file.as_deref(),
                artist,
                key,
                tempo,
                tags,
                import,
            },
            &config,
            &db_path,
        )?,
        Commands::Edit {
            id,
            file,
            title,
            artist,
            key,
            tempo,
        } => run_edit(
            &id,
            EntityEdit {
                file: file.as_deref(),
                title,
                artist,
                key,
                tempo,
            },
            &config,
            &db_path,
        )?,
        Commands::History { id, json } => run_history(&id, json, &config, &db_path)?,
        Commands::Show { id, version } => run_show(&id, version, &config, &db_path)?,
        Commands::Diff { id, from, to, json } => run_diff(&id, from, to, json, &config, &db_path)?,
        Commands::Restore { id, version, copy } => {
            run_restore(&id, version, copy, &config, &db_path)?;
        }
        Commands::DeleteVersion {
            id,
            version,
            rebase,
        } => run_delete_version(&id, version, rebase, &config, &db_path)?,
        Commands::Prune { id, keep } => run_prune(&id, keep, &config, &db_path)?,
        Commands::Stats { id, json } => run_stats(&id, json, &config, &db_path)?,
        Commands::Verify { id } => run_verify(id.as_deref(), &config, &db_path)?,
        Commands::Conflicts { command } => match command {
            ConflictCommands::List { json } => run_list(json, &config, &db_path)?,
            ConflictCommands::Receive {
                id,
                snapshot,
                device,
                base,
            } => run_receive(&id, &snapshot, &device, base.as_deref(), &config, &db_path)?,
            ConflictCommands::Preview { conflict, choices } => {
                run_preview(&conflict, choices.as_deref(), &config, &db_path)?;
            }
            ConflictCommands::Resolve {
                conflict,
                strategy,
                choices,
                content,
            } => run_resolve(
                &conflict,
                strategy,
                choices.as_deref(),
                content.as_deref(),
                &config,
                &db_path,
            )?,
        },
        Commands::Completions { .. } => {}
    }

    Ok(())
}
