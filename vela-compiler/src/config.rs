//! Compiler configuration
//!
//! Limits applied to sandboxed templates and the engine used when a
//! template does not name one.

use vela_core::Engine;

/// Instruction budget for Lua templates when none is configured
pub const DEFAULT_SCRIPT_EXEC_LIMIT: i64 = 7500;

pub const ENV_SCRIPT_EXEC_LIMIT: &str = "VELA_COMPILER_SCRIPT_EXEC_LIMIT";
pub const ENV_SCRIPT_MEMORY_LIMIT: &str = "VELA_COMPILER_SCRIPT_MEMORY_LIMIT";
pub const ENV_DEFAULT_ENGINE: &str = "VELA_COMPILER_DEFAULT_ENGINE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Engine for templates without an explicit format
    pub default_engine: Engine,

    /// Maximum VM instructions per sandboxed render
    pub script_exec_limit: i64,

    /// Optional cap on sandbox allocations, in bytes
    pub script_memory_limit: Option<usize>,
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self {
            default_engine: Engine::Native,
            script_exec_limit: DEFAULT_SCRIPT_EXEC_LIMIT,
            script_memory_limit: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - VELA_COMPILER_SCRIPT_EXEC_LIMIT (optional, default: 7500)
    /// - VELA_COMPILER_SCRIPT_MEMORY_LIMIT (optional, bytes)
    /// - VELA_COMPILER_DEFAULT_ENGINE (optional, default: native)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from any key lookup, such as a map of variables
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(value) = lookup(ENV_SCRIPT_EXEC_LIMIT) {
            config.script_exec_limit = value.trim().parse::<i64>().map_err(|_| {
                anyhow::anyhow!("{} must be an integer, got {:?}", ENV_SCRIPT_EXEC_LIMIT, value)
            })?;
        }

        if let Some(value) = lookup(ENV_SCRIPT_MEMORY_LIMIT) {
            let limit = value.trim().parse::<usize>().map_err(|_| {
                anyhow::anyhow!(
                    "{} must be a number of bytes, got {:?}",
                    ENV_SCRIPT_MEMORY_LIMIT,
                    value
                )
            })?;
            config.script_memory_limit = Some(limit);
        }

        if let Some(value) = lookup(ENV_DEFAULT_ENGINE) {
            config.default_engine = value
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{}: {}", ENV_DEFAULT_ENGINE, e))?;
        }

        Ok(config)
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.default_engine = engine;
        self
    }

    pub fn with_script_exec_limit(mut self, limit: i64) -> Self {
        self.script_exec_limit = limit;
        self
    }

    pub fn with_script_memory_limit(mut self, limit: Option<usize>) -> Self {
        self.script_memory_limit = limit;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.script_exec_limit < 0 {
            anyhow::bail!("script_exec_limit must be greater than or equal to 0");
        }

        if self.script_memory_limit == Some(0) {
            anyhow::bail!("script_memory_limit must be greater than 0");
        }

        Ok(())
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::new()
    }
}
