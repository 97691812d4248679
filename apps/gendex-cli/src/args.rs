//! Command line arguments for the `gendex` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gendex_core::StructureKind;
use gendex_text::AnalyzerKind;

/// Maintain rotated search indexes
#[derive(Parser, Debug)]
#[command(name = "gendex")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Directory holding gendex.toml (defaults to the working directory)
    #[arg(long, value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the structure and state of an index root
    Inspect {
        root: PathBuf,
    },

    /// Lay out an empty index root
    Create {
        root: PathBuf,

        #[arg(long, default_value = "double")]
        kind: StructureKind,
    },

    /// Build a new generation from the .txt files under a directory
    Ingest {
        root: PathBuf,

        #[arg(value_name = "TXT_DIR")]
        data_dir: PathBuf,

        /// Add to the write slot's current generation instead of rebuilding
        #[arg(long)]
        append: bool,

        #[arg(long, default_value = "standard")]
        analyzer: AnalyzerKind,

        /// Only index the first N files in path order
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Query one or more indexes
    Search {
        query: String,

        #[arg(required = true)]
        roots: Vec<PathBuf>,

        /// Restrict the query to one stored field
        #[arg(long)]
        field: Option<String>,

        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Also print per-field filters built from the whole index
        #[arg(long)]
        filters: bool,
    },

    /// Delete every generation, keeping an empty layout
    Delete {
        root: PathBuf,
    },

    /// Copy the active slot of a cyclical index back into its mirror
    SyncMirror {
        root: PathBuf,
    },
}
