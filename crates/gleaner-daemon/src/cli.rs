//! Command-line interface.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Harvest relevant articles from registered news sites.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a config.toml; defaults to the user config directory
    #[arg(short, long, env = "GLEANER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run scrape cycles on the configured interval
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Register a listing page, or reset an existing one
    Add {
        /// Listing page URL
        url: String,

        /// Only keep AI-related articles
        #[arg(long)]
        ai: bool,

        /// Only keep region-related articles
        #[arg(long)]
        region: bool,
    },

    /// List registered sources with their status
    Sources,

    /// Scrape one source now, even if it is unavailable
    Scrape {
        /// Source id as shown by `sources`
        id: i64,
    },

    /// Download the configured statistics dataset unless it is recent
    Stats,

    /// Edit a trigger list; takes effect on the next start
    Triggers {
        #[command(subcommand)]
        action: TriggerAction,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum TriggerAction {
    /// Add an entry unless it is already listed
    Add { list: TriggerList, entry: String },
    /// Remove an entry
    Remove { list: TriggerList, entry: String },
    /// Print every entry
    Show { list: TriggerList },
}

/// One of the four configured trigger files.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerList {
    AiWords,
    AiPhrases,
    RegionWords,
    RegionPhrases,
}
