//! Configuration module
//!
//! Turns the global flags into a compiler configuration.

use anyhow::{Context, Result};
use vela_compiler::{Compiler, CompilerConfig};
use vela_core::Engine;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub compiler: CompilerConfig,
}

impl Config {
    pub fn new(
        default_engine: Engine,
        script_exec_limit: i64,
        script_memory_limit: Option<usize>,
    ) -> Result<Self> {
        let compiler = CompilerConfig::new()
            .with_engine(default_engine)
            .with_script_exec_limit(script_exec_limit)
            .with_script_memory_limit(script_memory_limit);

        compiler
            .validate()
            .context("Invalid compiler configuration")?;

        Ok(Self { compiler })
    }

    pub fn compiler(&self) -> Result<Compiler> {
        Compiler::new(self.compiler.clone()).context("Failed to create compiler")
    }
}
