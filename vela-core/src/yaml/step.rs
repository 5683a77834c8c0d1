//! Step decoding

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Ruleset, Ulimit, Volume};
use crate::constants::{PULL_ALWAYS, PULL_NOT_PRESENT};
use crate::env::MergeEnv;
use crate::raw::{self, Environment};

/// One execution unit of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Ruleset::is_empty")]
    pub ruleset: Ruleset,
    #[serde(
        default,
        deserialize_with = "raw::string_slice",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub commands: Vec<String>,
    #[serde(
        default,
        deserialize_with = "raw::string_slice",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub entrypoint: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<StepSecret>,
    #[serde(default, skip_serializing_if = "StepTemplate::is_empty")]
    pub template: StepTemplate,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub detach: bool,
    #[serde(
        default,
        deserialize_with = "raw::optional_string_slice_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub environment: Option<Environment>,
    #[serde(
        default,
        deserialize_with = "raw::scalar",
        skip_serializing_if = "String::is_empty"
    )]
    pub image: String,
    #[serde(default, deserialize_with = "raw::scalar")]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub privileged: bool,
    #[serde(
        default,
        deserialize_with = "raw::scalar",
        skip_serializing_if = "String::is_empty"
    )]
    pub pull: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ulimits: Vec<Ulimit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub report_as: String,
}

/// A reference to a template that expands into steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepTemplate {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, serde_yaml::Value>,
}

impl StepTemplate {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.vars.is_empty()
    }
}

/// A secret injected into a step
///
/// `"docker_password"` is shorthand for a secret whose source and target are
/// both `docker_password`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSecret {
    pub source: String,
    pub target: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStepSecret {
    Shorthand(String),
    Object { source: String, target: String },
}

impl<'de> Deserialize<'de> for StepSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawStepSecret::deserialize(deserializer)? {
            RawStepSecret::Shorthand(name) => StepSecret {
                source: name.clone(),
                target: name,
            },
            RawStepSecret::Object { source, target } => StepSecret { source, target },
        })
    }
}

/// Default an empty pull policy and translate the deprecated boolean forms
pub(crate) fn normalize_pull(pull: &mut String) {
    if pull.is_empty() || pull.eq_ignore_ascii_case("false") {
        *pull = PULL_NOT_PRESENT.to_string();
    } else if pull.eq_ignore_ascii_case("true") {
        *pull = PULL_ALWAYS.to_string();
    }
}

/// Decode a list of steps, rejecting null entries and normalizing pull policies
pub(crate) fn deserialize_steps<'de, D>(deserializer: D) -> Result<Vec<Step>, D::Error>
where
    D: Deserializer<'de>,
{
    let steps = Option::<Vec<Option<Step>>>::deserialize(deserializer)?.unwrap_or_default();

    steps
        .into_iter()
        .map(|step| {
            let mut step =
                step.ok_or_else(|| de::Error::custom("invalid step with nil content found"))?;
            normalize_pull(&mut step.pull);
            Ok(step)
        })
        .collect()
}

impl MergeEnv for Step {
    const KIND: &'static str = "step";

    fn name(&self) -> &str {
        &self.name
    }

    fn environment_mut(&mut self) -> Option<&mut Environment> {
        self.environment.as_mut()
    }
}
