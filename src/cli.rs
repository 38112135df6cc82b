use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one or more script files in order
    Run {
        /// Paths of the scripts to execute
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Check script files for syntax errors without running them
    Check {
        /// Paths of the scripts to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}
