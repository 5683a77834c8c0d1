//! Template engine selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The rendering engine used for a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Restricted text templates (Handlebars)
    Native,
    /// Sandboxed scripts (Lua) with an instruction budget
    Sandboxed,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Native => "native",
            Engine::Sandboxed => "sandboxed",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = String;

    /// Accepts the engine names as well as the template `format` values
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" | "handlebars" | "hbs" => Ok(Engine::Native),
            "sandboxed" | "lua" | "script" => Ok(Engine::Sandboxed),
            other => Err(format!(
                "unknown template engine '{}': expected native or sandboxed",
                other
            )),
        }
    }
}
