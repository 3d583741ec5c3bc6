//! Command-line interface for tab-tree.
//!
//! This module handles CLI argument parsing. The subcommand implementations
//! live in the [`commands`] submodule.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tab_tree_config::TabId;

/// tab-tree - Inspect and maintain persisted tab tree state
#[derive(Parser)]
#[command(name = "tab-tree")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Storage directory (overrides config `storage_dir`)
    #[arg(long, value_name = "DIR", global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Set debug log level (overrides config and RUST_LOG)
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,
}

/// Log level argument for CLI
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevelArg {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevelArg {
    /// Convert to `log::LevelFilter`
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevelArg::Off => log::LevelFilter::Off,
            LogLevelArg::Error => log::LevelFilter::Error,
            LogLevelArg::Warn => log::LevelFilter::Warn,
            LogLevelArg::Info => log::LevelFilter::Info,
            LogLevelArg::Debug => log::LevelFilter::Debug,
            LogLevelArg::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the persisted tree
    Show {
        /// Print the GET_STATE JSON instead of an outline
        #[arg(long)]
        json: bool,
    },

    /// Prune the persisted tree against a list of live tab ids and save it
    Reconcile {
        /// Comma-separated ids of the tabs that still exist
        #[arg(long, value_delimiter = ',', num_args = 1.., required = true)]
        live: Vec<TabId>,
    },

    /// Rewrite a legacy tree blob at the current schema version
    Migrate,

    /// Replay a JSON-lines script of host events and control requests
    /// against an in-memory browser
    Simulate {
        /// Script file; each line is a host event or a control request
        script: PathBuf,

        /// Tabs per window in the simulated browser, e.g. `3,1`
        #[arg(long, value_delimiter = ',', default_value = "1")]
        windows: Vec<usize>,
    },
}

/// Options shared by every subcommand
#[derive(Clone, Debug, Default)]
pub struct RuntimeOptions {
    pub config_path: Option<PathBuf>,
    pub storage_dir: Option<PathBuf>,
    /// Log level override from CLI
    pub log_level: Option<log::LevelFilter>,
}

impl Cli {
    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            config_path: self.config.clone(),
            storage_dir: self.storage_dir.clone(),
            log_level: self.log_level.map(LogLevelArg::to_level_filter),
        }
    }
}

/// Run the parsed command. Returns the process exit code.
pub async fn process_cli(cli: Cli) -> i32 {
    let options = cli.runtime_options();
    let result = match cli.command {
        Commands::Show { json } => commands::show_cli(&options, json).await,
        Commands::Reconcile { live } => commands::reconcile_cli(&options, &live).await,
        Commands::Migrate => commands::migrate_cli(&options).await,
        Commands::Simulate { script, windows } => {
            commands::simulate_cli(&options, &script, &windows).await
        }
    };
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("tab-tree: error: {e:#}");
            1
        }
    }
}
