use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Manifest directory, overrides `service.manifest_dir` from the config
    #[clap(long, value_parser, global = true)]
    pub dir: Option<PathBuf>,

    #[clap(long, value_parser)]
    pub config: Option<PathBuf>,

    #[clap(long, value_parser, default_value_t = false)]
    pub verbose: bool,

    #[clap(long, value_parser)]
    pub log: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the searchable entries
    List {
        /// Only entries included in global search
        #[clap(long, value_parser, default_value_t = false)]
        global: bool,

        /// Only entries that handle web searches
        #[clap(long, value_parser, default_value_t = false)]
        web: bool,
    },
    /// Print the entry owned by <package>/<component>
    Show { key: String },
    /// Print the default web search entry, optionally setting it first
    Default {
        #[clap(long, value_parser)]
        set: Option<String>,
    },
    /// Keep the registry in sync with the manifest directory until interrupted
    Watch {
        #[clap(long, value_parser)]
        debounce_ms: Option<u64>,
    },
}
