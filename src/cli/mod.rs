//! CLI interface for tradegraph
//!
//! Provides subcommands for:
//! - `run`: Execute a backtest for a bot definition file
//! - `compile`: Compile a bot definition and print the execution spec
//! - `config`: Show the effective configuration

mod compile;
mod run;

pub use compile::CompileArgs;
pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tradegraph")]
#[command(about = "Backtest orchestrator for agent-graph trading bots")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a backtest for a bot definition file
    Run(RunArgs),
    /// Compile a bot definition and print the execution spec
    Compile(CompileArgs),
    /// Show the effective configuration
    Config,
}
