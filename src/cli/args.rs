//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Keeps a full-width chat panorama overlay applied to a re-rendered host document
#[derive(Parser, Debug)]
#[command(name = "panorama")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-d info, -d -d debug, -d -d -d trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Config file (default: $XDG_CONFIG_HOME/panorama/panorama.toml)
    #[arg(short, long, global = true, env = "PANORAMA_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Flip the stored panorama preference
    Toggle,

    /// Show the stored panorama preference
    State,

    /// Report whether the layout resolves in a document snapshot
    Debug {
        /// JSON document snapshot
        #[arg(value_hint = ValueHint::FilePath)]
        snapshot: PathBuf,
    },

    /// Enable panorama on a snapshot and print the resulting document
    Apply {
        /// JSON document snapshot
        #[arg(value_hint = ValueHint::FilePath)]
        snapshot: PathBuf,
    },

    /// Answer a raw control message, e.g. '{"action":"getState"}'
    Request {
        /// JSON control message
        message: String,

        /// Optional JSON document snapshot for `debug` requests
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        snapshot: Option<PathBuf>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Print a template config file
    Template,
    /// Show config and preference file locations
    Path,
}
