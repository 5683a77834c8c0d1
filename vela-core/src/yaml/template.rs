use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::TEMPLATE_FORMAT_DEFAULT;
use crate::engine::Engine;

/// A template declared by a pipeline and referenced from its steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, serde_yaml::Value>,
}

fn default_format() -> String {
    TEMPLATE_FORMAT_DEFAULT.to_string()
}

impl Template {
    /// The engine that renders this template, if the format is recognised
    pub fn engine(&self) -> Option<Engine> {
        self.format.parse().ok()
    }
}
