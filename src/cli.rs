use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "todo-sync")]
#[command(
    about = "Project and todo storage server with local-storage import, export and migration",
    long_about = None
)]
pub struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the API server (default if no command given)
    Serve {
        /// Port to run the server on; overrides the config file
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Write every project and item as a JSON bundle
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import a JSON bundle file into the store
    Import {
        file: PathBuf,

        /// Treat the file as a one-time copy of browser local storage
        #[arg(long)]
        migrate: bool,
    },
    /// Show storage backends, the recommended one and a data integrity report
    Status,
}
