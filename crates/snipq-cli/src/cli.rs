use clap::{Parser, Subcommand};
use snipq_core::VAULT_ENV_VAR;
use std::env;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    version = env!("CARGO_PKG_VERSION"),
    about = "snipq - parameterized text snippet expansion",
    long_about = "snipq expands short triggers such as ':ty?lang=vi' into text rendered from templates stored in a vault directory."
)]
pub struct Snipq {
    /// Vault directory (defaults to ~/.snipq/vault)
    #[arg(long, global = true, env = VAULT_ENV_VAR)]
    pub vault: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Expand a trigger, recording it in history
    Expand {
        /// Trigger with optional query, e.g. ':ty?lang=vi&tone=casual'
        trigger: String,

        #[arg(long, help = "Identifier of the application the expansion is for")]
        app: Option<String>,

        #[arg(long, help = "Print the full result as JSON")]
        json: bool,
    },
    /// Render a trigger without advancing counters or writing history
    Preview { trigger: String },
    /// List groups and their snippets
    List {
        #[arg(long, short, help = "Only list this group")]
        group: Option<String>,
    },
    /// Search snippets by name, trigger or tag
    Search { query: String },
    /// Advance a named counter and print its value
    Counter {
        name: String,

        #[arg(long, short, help = "Zero-pad to this many digits")]
        pad: Option<usize>,

        #[arg(long, short, help = "Increment by this much instead of the stored step")]
        step: Option<i64>,
    },
    /// Write a snapshot of the vault into a directory
    Backup { dir: PathBuf },
    /// Replace the vault with a snapshot
    Restore { path: PathBuf },
    /// Show or clear expansion history
    History {
        #[arg(long, short = 'n', default_value = "20", help = "Number of entries to show")]
        limit: usize,

        #[arg(long, help = "Delete all history entries")]
        clear: bool,
    },
    /// Print the vault settings
    Settings,
    /// Create a vault with a sample snippet
    Init,
}
