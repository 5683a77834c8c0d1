//! Vela CLI
//!
//! Command-line interface for rendering and compiling pipeline templates
//! locally, without a server.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vela_core::Engine;

#[derive(Parser)]
#[command(name = "vela")]
#[command(about = "Vela pipeline template compiler", long_about = None)]
struct Cli {
    /// Engine for templates whose file extension does not decide it
    #[arg(long, env = "VELA_COMPILER_DEFAULT_ENGINE", default_value = "native", global = true)]
    default_engine: Engine,

    /// Maximum number of Lua VM instructions per render
    #[arg(long, env = "VELA_COMPILER_SCRIPT_EXEC_LIMIT", default_value_t = 7500, global = true)]
    script_exec_limit: i64,

    /// Optional cap on Lua memory, in bytes
    #[arg(long, env = "VELA_COMPILER_SCRIPT_MEMORY_LIMIT", global = true)]
    script_memory_limit: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vela_compiler=info,vela_lua=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::new(
        cli.default_engine,
        cli.script_exec_limit,
        cli.script_memory_limit,
    )?;

    handle_command(cli.command, &config)
}
