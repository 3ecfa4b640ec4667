use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "assetctl",
    version,
    about = "Index, watch and search 3D asset libraries"
)]
pub struct Cli {
    /// Path to the library config file (defaults to $ASSET_INDEX_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Walk directories once and print what was indexed
    Scan {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Watch directories until interrupted
    Watch {
        /// Roots to watch; the config's watch roots are used when empty
        paths: Vec<PathBuf>,

        /// Seconds between stats log lines
        #[arg(long, default_value_t = 60)]
        stats_interval: u64,
    },

    /// Scan directories, then search the resulting index
    Search {
        query: String,

        #[arg(short, long = "root", required = true)]
        roots: Vec<PathBuf>,

        /// Only assets of this filetype, e.g. `fbx`
        #[arg(short = 't', long)]
        filetype: Option<String>,
    },

    /// Print the tags inferred for paths without touching the filesystem
    Tags {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}
