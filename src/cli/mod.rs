//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// pyissues - incremental archiver for the Python issue tracker
#[derive(Parser, Debug)]
#[command(name = "pyissues", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Metadata file (default: ~/.pyissues/meta.json)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub meta: Option<PathBuf>,

    /// Archive file; compressed when the name ends in `gz`
    /// (default: ~/.pyissues/issues.json.gz)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub data: Option<PathBuf>,

    /// Concurrent fetch workers (0 = all cores, default 16)
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Refetch every issue that was not already closed
    #[arg(long, alias = "fullupdate", global = true)]
    pub full_update: bool,

    /// Store text without the base64 transform (reload with --raw-text)
    #[arg(long, global = true)]
    pub raw_text: bool,

    /// Tracker root url
    #[arg(long, global = true, env = "PYISSUES_BASE_URL")]
    pub base_url: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refetch the issue list and every issue, replacing both files
    Rebuild,

    /// Refetch every issue named in the stored metadata
    Refetch,

    /// Report what an update would fetch, without changing anything
    Check,

    /// Fetch issues named in the metadata but missing from the archive
    Fix,

    /// Fetch the issue list and refresh changed issues
    Update,

    /// Load the archive and report its size
    Load,

    /// Display one archived issue
    Show {
        /// Issue id
        id: u64,
    },

    /// Merge several archive files into one
    Merge {
        /// Archive files to merge, later files win
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output archive (default: the --data archive)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
