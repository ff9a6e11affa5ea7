//! # DocFX Topics CLI (`dfx-topics`)
//!
//! A diagnostic front end over the topic cache: build, inspect, and watch
//! the UID index of a DocFX project from a terminal, outside an editor.
//!
//! ## Usage
//!
//! ```bash
//! dfx-topics [--project ./docfx.json] [--progress auto|off|human|json] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dfx-topics scan [--rebuild]` | Populate the index (from the snapshot when present) |
//! | `dfx-topics list [--type <t>] [--json]` | List topics ordered by UID |
//! | `dfx-topics lookup <uid> [--json]` | Resolve a UID to its content file |
//! | `dfx-topics flush` | Delete the persisted snapshot |
//! | `dfx-topics watch` | Keep the index and snapshot current until Ctrl-C |
//!
//! Logs go to stderr and are controlled with `RUST_LOG`.

use clap::{Parser, Subcommand, ValueEnum};
use docfx_topics::commands;
use docfx_topics::config::CacheOptions;
use docfx_topics::progress::ProgressMode;
use docfx_topics::{DetailedType, TopicCache};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// DocFX Topics CLI: the UID index of a DocFX project.
#[derive(Parser)]
#[command(
    name = "dfx-topics",
    about = "Live UID topic index for DocFX projects",
    version,
    long_about = "Discovers conceptual and API reference topics in a DocFX project, keeps \
    them in a UID index with a persisted snapshot, and answers UID lookups."
)]
struct Cli {
    /// Path to the project file (`docfx.json`).
    ///
    /// Defaults to discovering one at or below the current directory.
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Progress output on stderr. `auto` shows human progress on a TTY.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    progress: ProgressArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Auto,
    Off,
    Human,
    Json,
}

impl ProgressArg {
    fn mode(self) -> ProgressMode {
        match self {
            ProgressArg::Auto => ProgressMode::default_for_tty(),
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Populate the index and print topic and file counts.
    Scan {
        /// Delete the snapshot first and rescan every content file.
        #[arg(long)]
        rebuild: bool,
    },

    /// List topics ordered by UID.
    List {
        /// Only topics of this type (conceptual, namespace, type, property,
        /// method, powershellcmdlet, other).
        #[arg(long = "type", value_parser = parse_detailed_type)]
        detailed_type: Option<DetailedType>,

        /// Print a JSON array instead of tab-separated lines.
        #[arg(long)]
        json: bool,
    },

    /// Resolve a UID to the file that defines it. Exits with 1 if unknown.
    Lookup {
        uid: String,

        #[arg(long)]
        json: bool,
    },

    /// Delete the persisted snapshot.
    Flush,

    /// Populate, then apply filesystem changes until Ctrl-C.
    Watch,
}

fn parse_detailed_type(s: &str) -> Result<DetailedType, String> {
    s.parse::<DetailedType>().map_err(|e| e.to_string())
}

fn init_tracing(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // `watch` exists to show applied changes
    let default_directive = match cli.command {
        Commands::Watch => "warn,docfx_topics=info",
        _ => "warn",
    };
    init_tracing(default_directive);

    let progress = Arc::from(cli.progress.mode().reporter());
    let cache = TopicCache::new(CacheOptions::default(), progress);
    commands::open(&cache, cli.project.as_deref())?;

    match cli.command {
        Commands::Scan { rebuild } => {
            commands::run_scan(&cache, rebuild).await?;
        }
        Commands::List {
            detailed_type,
            json,
        } => {
            commands::run_list(&cache, detailed_type, json).await?;
        }
        Commands::Lookup { uid, json } => {
            if !commands::run_lookup(&cache, &uid, json).await? {
                return Ok(ExitCode::from(1));
            }
        }
        Commands::Flush => {
            commands::run_flush(&cache).await?;
        }
        Commands::Watch => {
            commands::run_watch(&cache).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
