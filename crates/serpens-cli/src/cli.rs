use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line arguments for the serpens CLI
#[derive(Parser, Debug)]
#[command(name = "serpens")]
#[command(about = "Ask questions about snake species", long_about = None)]
pub struct Cli {
    /// Config file (defaults to ~/.serpens/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Answer a question from the catalog")]
    Ask {
        #[arg(help = "Question, in Vietnamese or English")]
        question: String,

        #[arg(long, help = "Print the answer as JSON")]
        json: bool,
    },

    #[command(about = "Show how a question is understood, without searching")]
    Intent {
        #[arg(help = "Question to parse")]
        question: String,
    },

    #[command(about = "Check that the search, embedding and generative backends answer")]
    Ping,

    #[command(about = "Show the effective configuration")]
    Config,
}
