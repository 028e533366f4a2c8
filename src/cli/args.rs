//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Rivets asset pipeline CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: rivets.toml)
    #[arg(short = 'C', long, global = true, default_value = "rivets.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the output of an asset
    #[command(visible_alias = "c")]
    Compile {
        /// Logical path (e.g. `application.js`) or absolute file path
        path: String,

        /// Print the single processed file instead of the bundle
        #[arg(long)]
        no_bundle: bool,
    },

    /// Print the file a logical path resolves to
    #[command(visible_alias = "r")]
    Resolve {
        /// Logical path to resolve
        path: String,
    },

    /// List every logical path under the search roots
    #[command(visible_alias = "l")]
    List {
        /// Only list logical paths matching this glob (repeatable)
        #[arg(short, long = "filter", value_name = "GLOB")]
        filters: Vec<String>,
    },

    /// Write bundled assets to an output directory
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        args: BuildArgs,
    },
}

/// Build command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Output directory
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: PathBuf,

    /// Also write a gzipped `.gz` copy of every asset
    #[arg(short, long)]
    pub gzip: bool,

    /// Only build logical paths matching this glob (repeatable)
    #[arg(short, long = "filter", value_name = "GLOB")]
    pub filters: Vec<String>,
}
