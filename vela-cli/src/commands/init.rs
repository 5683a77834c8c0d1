//! Init command handlers
//!
//! Generates the files an editor needs to offer completion for Lua
//! templates: a .luarc.json and LuaLS stubs for every template module.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use std::fs;
use std::path::Path;

use crate::config::Config;

const STUBS_DIR: &str = ".vela/stubs";

/// Init subcommands
#[derive(Subcommand)]
pub enum InitCommands {
    /// Generate Lua development files (.luarc.json and stubs)
    Lua {
        /// Output directory for generated files
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Generate only .luarc.json
        #[arg(long, conflicts_with = "stubs_only")]
        config_only: bool,

        /// Generate only stub files
        #[arg(long)]
        stubs_only: bool,
    },
}

/// Handle init commands
pub fn handle_init_command(command: InitCommands, _config: &Config) -> Result<()> {
    match command {
        InitCommands::Lua {
            output,
            config_only,
            stubs_only,
        } => generate_lua_dev_files(&output, config_only, stubs_only),
    }
}

fn generate_lua_dev_files(output_dir: &str, config_only: bool, stubs_only: bool) -> Result<()> {
    let output_path = Path::new(output_dir);

    if !stubs_only {
        generate_luarc_json(output_path)?;
    }

    if !config_only {
        generate_stub_files(output_path)?;
    }

    println!("{}", "✓ Lua development files generated!".green().bold());
    println!();
    println!("{}", "Next steps:".bold());
    println!("  1. Install Lua Language Server in your editor");
    println!("  2. Define `function main(ctx)` in your template to get completion on ctx");
    println!(
        "  3. Use {} to preview the rendered pipeline",
        "vela render <template>.lua".cyan()
    );

    Ok(())
}

fn luarc_json() -> String {
    let registry = vela_lua::stub_registry();
    let globals: Vec<String> = registry
        .modules()
        .iter()
        .map(|module| format!("\"{}\"", module.id()))
        .collect();

    format!(
        r#"{{
  "$schema": "https://raw.githubusercontent.com/sumneko/vscode-lua/master/setting/schema.json",
  "runtime": {{
    "version": "Lua 5.4",
    "builtin": {{
      "io": "disable",
      "os": "disable",
      "debug": "disable",
      "package": "disable",
      "coroutine": "disable"
    }}
  }},
  "diagnostics": {{
    "globals": [{}]
  }},
  "workspace": {{
    "library": ["{}"],
    "checkThirdParty": false
  }},
  "completion": {{
    "callSnippet": "Both"
  }}
}}
"#,
        globals.join(", "),
        STUBS_DIR
    )
}

fn generate_luarc_json(output_path: &Path) -> Result<()> {
    let luarc_path = output_path.join(".luarc.json");

    fs::write(&luarc_path, luarc_json())
        .with_context(|| format!("Failed to write .luarc.json to {:?}", luarc_path))?;

    println!("  {} .luarc.json", "Created".green());

    Ok(())
}

/// Write one stub file per module plus the `main(ctx)` definitions
fn generate_stub_files(output_path: &Path) -> Result<()> {
    let stubs_dir = output_path.join(STUBS_DIR);
    fs::create_dir_all(&stubs_dir)
        .with_context(|| format!("Failed to create stubs directory at {:?}", stubs_dir))?;

    let registry = vela_lua::stub_registry();
    let mut files: Vec<(String, String)> = registry
        .modules()
        .iter()
        .map(|module| (module.id().to_string(), module.stubs()))
        .collect();
    files.push(("context".to_string(), vela_lua::context_stubs()));

    for (name, content) in files {
        let stub_path = stubs_dir.join(format!("{}.lua", name));

        fs::write(&stub_path, content)
            .with_context(|| format!("Failed to write stub file {:?}", stub_path))?;

        println!("  {} {}.lua", "Created".green(), name);
    }

    println!(
        "  {} in {}",
        "Stubs ready".green(),
        stubs_dir.display().to_string().cyan()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luarc_lists_module_globals() {
        let luarc: serde_json::Value = serde_json::from_str(&luarc_json()).unwrap();
        assert_eq!(luarc["diagnostics"]["globals"][0], "log");
        assert_eq!(luarc["workspace"]["library"][0], STUBS_DIR);
        assert_eq!(luarc["runtime"]["builtin"]["os"], "disable");
    }
}
