//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod init;
mod render;

pub use init::InitCommands;
pub use render::TemplateArgs;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Render a template into a pipeline document
    Render {
        #[command(flatten)]
        args: TemplateArgs,

        /// Render as a step template for this step name
        #[arg(long)]
        step: Option<String>,

        /// Prefix for produced step names (default: template file stem)
        #[arg(long, requires = "step")]
        display_name: Option<String>,
    },
    /// Compile a whole-pipeline template into its canonical form
    Compile {
        #[command(flatten)]
        args: TemplateArgs,
    },
    /// Initialize development environment
    Init {
        #[command(subcommand)]
        command: InitCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Render {
            args,
            step,
            display_name,
        } => render::render_template(args, step, display_name, config),
        Commands::Compile { args } => render::compile_template(args, config),
        Commands::Init { command } => init::handle_init_command(command, config),
    }
}
