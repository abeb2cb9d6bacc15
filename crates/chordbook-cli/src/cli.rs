use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use chordbook_core::models::EntityKind;

#[derive(Parser)]
#[command(name = "chordbook")]
#[command(about = "Inspect chord chart history and resolve sync conflicts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to versioning config (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a song, book, set, annotation or attachment
    #[command(alias = "new")]
    Add {
        /// Title of the new entity
        title: String,
        #[arg(long, value_enum, default_value_t = KindArg::Song)]
        kind: KindArg,
        /// Read content from a file (stdin when piped, empty otherwise)
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
        #[arg(long)]
        artist: Option<String>,
        /// Musical key, e.g. "G" or "Em"
        #[arg(long)]
        key: Option<String>,
        /// Tempo in BPM
        #[arg(long)]
        tempo: Option<u32>,
        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Record the first version as an import baseline
        #[arg(long)]
        import: bool,
    },
    /// Save new content or metadata for an entity
    Edit {
        /// Entity ID or unique ID prefix
        id: String,
        /// Read new content from a file (stdin when piped)
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        tempo: Option<u32>,
    },
    /// List the versions of an entity, newest first
    History {
        /// Entity ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the content of an entity or one of its versions
    Show {
        /// Entity ID or unique ID prefix
        id: String,
        /// Version number (live content when omitted)
        #[arg(short, long)]
        version: Option<i64>,
    },
    /// Show the line diff between two versions
    Diff {
        /// Entity ID or unique ID prefix
        id: String,
        from: i64,
        to: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bring back an old version
    Restore {
        /// Entity ID or unique ID prefix
        id: String,
        version: i64,
        /// Create a new entity instead of overwriting the live one
        #[arg(long)]
        copy: bool,
    },
    /// Delete a single version
    DeleteVersion {
        /// Entity ID or unique ID prefix
        id: String,
        version: i64,
        /// Re-base versions that depend on the deleted one
        #[arg(long)]
        rebase: bool,
    },
    /// Delete old versions beyond the newest N
    Prune {
        /// Entity ID or unique ID prefix
        id: String,
        /// Number of recent versions to keep
        #[arg(short, long, default_value = "20")]
        keep: usize,
    },
    /// Show version storage statistics
    Stats {
        /// Entity ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconstruct every version and report corrupt chains
    Verify {
        /// Entity ID or unique ID prefix (all entities when omitted)
        id: Option<String>,
    },
    /// Inspect and resolve sync conflicts
    Conflicts {
        #[command(subcommand)]
        command: ConflictCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConflictCommands {
    /// List open and deferred conflicts, most urgent first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile a remote snapshot (JSON) with the local entity
    Receive {
        /// Entity ID or unique ID prefix
        id: String,
        /// Remote snapshot file
        #[arg(value_name = "PATH")]
        snapshot: PathBuf,
        /// Device the snapshot came from
        #[arg(long, default_value = "remote")]
        device: String,
        /// Last state both devices agreed on (JSON snapshot)
        #[arg(long, value_name = "PATH")]
        base: Option<PathBuf>,
    },
    /// Preview a field merge without committing it
    Preview {
        /// Conflict ID
        conflict: String,
        /// Field choices file (JSON object of field -> choice)
        #[arg(long, value_name = "PATH")]
        choices: Option<PathBuf>,
    },
    /// Settle a conflict
    Resolve {
        /// Conflict ID
        conflict: String,
        #[arg(value_enum)]
        strategy: StrategyArg,
        /// Field choices file for `merge` (JSON object of field -> choice)
        #[arg(long, value_name = "PATH")]
        choices: Option<PathBuf>,
        /// Reconciled content file for merging a content conflict
        #[arg(long, value_name = "PATH")]
        content: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KindArg {
    Song,
    Book,
    Set,
    Annotation,
    Attachment,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Song => Self::Song,
            KindArg::Book => Self::Book,
            KindArg::Set => Self::Set,
            KindArg::Annotation => Self::Annotation,
            KindArg::Attachment => Self::Attachment,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StrategyArg {
    KeepLocal,
    KeepRemote,
    KeepBoth,
    Merge,
    Skip,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}
