//! Service decoding

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use super::Ulimit;
use super::step::normalize_pull;
use crate::env::MergeEnv;
use crate::raw::{self, Environment};

/// A sidecar container running alongside the steps of a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(
        default,
        deserialize_with = "raw::scalar",
        skip_serializing_if = "String::is_empty"
    )]
    pub image: String,
    #[serde(default, deserialize_with = "raw::scalar")]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "raw::string_slice",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub entrypoint: Vec<String>,
    #[serde(
        default,
        deserialize_with = "raw::optional_string_slice_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub environment: Option<Environment>,
    #[serde(
        default,
        deserialize_with = "raw::string_slice",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub ports: Vec<String>,
    #[serde(
        default,
        deserialize_with = "raw::scalar",
        skip_serializing_if = "String::is_empty"
    )]
    pub pull: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ulimits: Vec<Ulimit>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
}

/// Decode a list of services, rejecting null entries and normalizing pull policies
pub(crate) fn deserialize_services<'de, D>(deserializer: D) -> Result<Vec<Service>, D::Error>
where
    D: Deserializer<'de>,
{
    let services = Option::<Vec<Option<Service>>>::deserialize(deserializer)?.unwrap_or_default();

    services
        .into_iter()
        .map(|service| {
            let mut service = service
                .ok_or_else(|| de::Error::custom("invalid service with nil content found"))?;
            normalize_pull(&mut service.pull);
            Ok(service)
        })
        .collect()
}

impl MergeEnv for Service {
    const KIND: &'static str = "service";

    fn name(&self) -> &str {
        &self.name
    }

    fn environment_mut(&mut self) -> Option<&mut Environment> {
        self.environment.as_mut()
    }
}
