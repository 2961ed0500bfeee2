//! Command-line front end for the snake catalog question answering pipeline.
#![allow(clippy::print_stdout, reason = "Answers and reports are written to stdout")]
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        reason = "Test allows"
    )
)]
use std::io::stderr;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser as _;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod handlers;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "serpens=info".into()))
        .with(fmt::layer().with_writer(stderr))
        .init();

    let cli = Cli::parse();
    let config = handlers::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ask { question, json } => handlers::handle_ask(&config, &question, json).await,
        Commands::Intent { question } => handlers::handle_intent(&config, &question).await,
        Commands::Ping => Ok(handlers::handle_ping(&config).await),
        Commands::Config => handlers::handle_config(&config),
    }
}
