use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Site root the configured paths are relative to
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Configuration file [default: <root>/bibsync.toml, if present]
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print more diagnostics (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fetch refereed publications from NASA ADS into the bibliography
    Ads {
        /// ADS API token
        #[arg(long, env = "ADS_API_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Extract publications from the LaTeX CV into the bibliography
    Cv,
    /// Convert a BibTeX file into the YAML publications listing
    Yaml {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
    /// Regenerate the group page from the members file
    Group,
}

impl Cli {
    /// Filter directive used when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "bibsync=warn",
            (false, 0) => "bibsync=info",
            (false, 1) => "bibsync=debug",
            (false, _) => "bibsync=trace",
        }
    }
}
