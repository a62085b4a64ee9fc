//! Command-line definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pidiagctl")]
#[command(about = "Pi-Apps log diagnosis - explain why an install failed", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Package-manager backend: auto, apt, pacman or generic
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Do not query the live package manager
    #[arg(long, global = true)]
    pub no_enrich: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a failed install log
    Diagnose {
        log: PathBuf,

        /// Never append the developer appendix to the log
        #[arg(long)]
        read_only: bool,

        /// Print the diagnosis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clean a log and prepend the device header, in place
    Format { log: PathBuf },

    /// Format a log and send it as an error report
    Send { log: PathBuf },

    /// Print the device header
    Header,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Set a value (section.key=value)
    Set { assignment: String },
}

impl Commands {
    /// Name and arguments for the journal
    pub fn describe(&self) -> (&'static str, Vec<String>) {
        match self {
            Commands::Diagnose { log, read_only, json } => {
                let mut args = vec![log.display().to_string()];
                if *read_only {
                    args.push("--read-only".to_string());
                }
                if *json {
                    args.push("--json".to_string());
                }
                ("diagnose", args)
            }
            Commands::Format { log } => ("format", vec![log.display().to_string()]),
            Commands::Send { log } => ("send", vec![log.display().to_string()]),
            Commands::Header => ("header", Vec::new()),
            Commands::Config { action: ConfigAction::Show } => ("config", vec!["show".to_string()]),
            Commands::Config { action: ConfigAction::Set { assignment } } => {
                ("config", vec!["set".to_string(), assignment.clone()])
            }
        }
    }
}
