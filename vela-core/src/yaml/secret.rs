//! Pipeline secret decoding

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::step::normalize_pull;
use super::{Ruleset, StepSecret};
use crate::constants::{SECRET_ENGINE_NATIVE, SECRET_PULL_BUILD, SECRET_TYPE_REPO};
use crate::env::MergeEnv;
use crate::raw::{self, Environment};

/// A secret made available to the build
///
/// Secrets either live in a secret engine (`engine`/`type`/`key`) or are
/// produced by an external `origin` container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub engine: String,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pull: String,
}

/// The container that fetches an external secret
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(
        default,
        deserialize_with = "raw::optional_string_slice_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_yaml::Value>,
    #[serde(
        default,
        deserialize_with = "raw::scalar",
        skip_serializing_if = "String::is_empty"
    )]
    pub pull: String,
    #[serde(default, skip_serializing_if = "Ruleset::is_empty")]
    pub ruleset: Ruleset,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<StepSecret>,
}

/// Decode pipeline secrets and fill in their defaults
pub(crate) fn deserialize_secrets<'de, D>(deserializer: D) -> Result<Vec<Secret>, D::Error>
where
    D: Deserializer<'de>,
{
    let secrets = Option::<Vec<Option<Secret>>>::deserialize(deserializer)?.unwrap_or_default();

    secrets
        .into_iter()
        .map(|secret| {
            let mut secret =
                secret.ok_or_else(|| de::Error::custom("invalid secret with nil content found"))?;

            match secret.origin.as_mut() {
                Some(origin) => normalize_pull(&mut origin.pull),
                None => {
                    if secret.key.is_empty() {
                        secret.key = secret.name.clone();
                    }
                    if secret.engine.is_empty() {
                        secret.engine = SECRET_ENGINE_NATIVE.to_string();
                    }
                    if secret.kind.is_empty() {
                        secret.kind = SECRET_TYPE_REPO.to_string();
                    }
                }
            }

            if secret.pull.is_empty() {
                secret.pull = SECRET_PULL_BUILD.to_string();
            }

            Ok(secret)
        })
        .collect()
}

impl MergeEnv for Origin {
    const KIND: &'static str = "secret origin";

    fn name(&self) -> &str {
        &self.name
    }

    fn environment_mut(&mut self) -> Option<&mut Environment> {
        self.environment.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Secrets {
        #[serde(deserialize_with = "deserialize_secrets")]
        secrets: Vec<Secret>,
    }

    #[test]
    fn test_secret_defaults() {
        let secrets = serde_yaml::from_str::<Secrets>(
            r#"
secrets:
  - name: docker_password
  - name: vault_token
    origin:
      name: vault
      image: target/secret-vault:latest
      pull: "true"
"#,
        )
        .unwrap()
        .secrets;

        let native = &secrets[0];
        assert_eq!(native.key, "docker_password");
        assert_eq!(native.engine, "native");
        assert_eq!(native.kind, "repo");
        assert_eq!(native.pull, "build_start");

        let external = &secrets[1];
        assert!(external.engine.is_empty());
        assert_eq!(external.origin.as_ref().unwrap().pull, "always");
    }
}
