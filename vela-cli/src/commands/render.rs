//! Render and compile command handlers
//!
//! Both commands read a template from disk together with its variables and
//! platform environment. `render` prints the pipeline document as YAML;
//! `compile` prints the canonical pipeline handed to the execution layer.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use vela_core::{Engine, Variables};

use crate::config::Config;

const PLATFORM_PREFIXES: [&str; 2] = ["VELA_", "DEPLOYMENT_PARAMETER_"];

/// Inputs shared by `render` and `compile`
#[derive(Args)]
pub struct TemplateArgs {
    /// Path to the template file (.yml for native, .lua for sandboxed)
    pub template: String,

    /// Engine override; by default chosen from the file extension
    #[arg(short, long)]
    pub engine: Option<Engine>,

    /// Template variables as key=value pairs
    #[arg(short, long = "var", value_parser = parse_key_val)]
    pub vars: Vec<(String, String)>,

    /// YAML or JSON file with template variables
    #[arg(long)]
    pub vars_file: Option<String>,

    /// Platform variables as KEY=value pairs (e.g., VELA_BUILD_NUMBER=1)
    #[arg(short, long, value_parser = parse_key_val)]
    pub platform: Vec<(String, String)>,

    /// Also pass VELA_* and DEPLOYMENT_PARAMETER_* variables from this shell
    #[arg(long)]
    pub inherit_env: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Parse a single key=value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Render a template and print the pipeline document
///
/// With `step` set, the template is rendered as a step template and the
/// produced steps are prefixed with `display_name` (default: the file stem).
pub fn render_template(
    args: TemplateArgs,
    step: Option<String>,
    display_name: Option<String>,
    config: &Config,
) -> Result<()> {
    let input = Input::load(&args, config)?;
    let compiler = config.compiler()?;

    let rendered = match step {
        Some(step) => {
            let display_name = display_name.unwrap_or_else(|| input.name.clone());
            compiler.render_step(
                Some(input.engine),
                &input.body,
                &step,
                &display_name,
                &input.env,
                &input.vars,
            )
        }
        None => compiler.render_pipeline(
            Some(input.engine),
            &input.name,
            &input.body,
            &input.env,
            &input.vars,
        ),
    }
    .with_context(|| format!("Failed to render template {}", args.template))?;

    print_warnings(&rendered.warnings);
    print_output(&rendered.build, args.output)
}

/// Compile a whole-pipeline template into canonical form
pub fn compile_template(args: TemplateArgs, config: &Config) -> Result<()> {
    let input = Input::load(&args, config)?;
    let compiler = config.compiler()?;

    let compiled = compiler
        .compile(
            Some(input.engine),
            &input.name,
            &input.body,
            &input.env,
            &input.vars,
        )
        .with_context(|| format!("Failed to compile template {}", args.template))?;

    print_warnings(&compiled.warnings);
    print_output(&compiled.pipeline, args.output)
}

/// Everything read from disk and flags for one invocation
struct Input {
    name: String,
    body: String,
    engine: Engine,
    env: HashMap<String, String>,
    vars: Variables,
}

impl Input {
    fn load(args: &TemplateArgs, config: &Config) -> Result<Self> {
        let path = Path::new(&args.template);
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template file: {}", args.template))?;

        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("template")
            .to_string();

        let engine = args
            .engine
            .or_else(|| engine_for_path(path))
            .unwrap_or(config.compiler.default_engine);

        let mut vars = match &args.vars_file {
            Some(file) => load_vars_file(file)?,
            None => Variables::new(),
        };
        for (key, value) in &args.vars {
            vars.insert(key.clone(), serde_json::Value::String(value.clone()));
        }

        let mut env = HashMap::new();
        if args.inherit_env {
            env.extend(std::env::vars().filter(|(key, _)| is_platform_key(key)));
        }
        env.extend(args.platform.iter().cloned());

        debug!(
            template = %args.template,
            engine = %engine,
            vars = vars.len(),
            platform = env.len(),
            "Loaded template"
        );

        Ok(Self {
            name,
            body,
            engine,
            env,
            vars,
        })
    }
}

fn engine_for_path(path: &Path) -> Option<Engine> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("lua") => Some(Engine::Sandboxed),
        Some("yml" | "yaml" | "hbs") => Some(Engine::Native),
        _ => None,
    }
}

fn is_platform_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    PLATFORM_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
}

fn load_vars_file(file: &str) -> Result<Variables> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read variables file: {}", file))?;

    // JSON is valid YAML
    let value: serde_json::Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse variables file: {}", file))?;

    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(Variables::new()),
        _ => anyhow::bail!("Variables file {} must contain a mapping", file),
    }
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
}

fn print_output<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let text = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).context("Failed to encode YAML")?,
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).context("Failed to encode JSON")? + "\n"
        }
    };
    print!("{}", text);
    Ok(())
}
