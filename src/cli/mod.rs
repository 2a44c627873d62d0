//! CLI module
//!
//! - `serve`: run the HTTP API
//! - `ask`: answer a single question from the terminal

pub mod ask;
pub mod serve;

use clap::{Parser, Subcommand};

/// Pharmacy medication assistant
#[derive(Parser)]
#[command(name = "pharmacy-rag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Answer one question and exit
    Ask(ask::AskArgs),
}
