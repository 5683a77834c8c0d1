//! Stage decoding
//!
//! Stages are written as a mapping keyed by stage name:
//!
//! ```yaml
//! stages:
//!   test:
//!     steps: [...]
//!   build:
//!     needs: [test]
//!     steps: [...]
//! ```

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Step;
use super::step::deserialize_steps;
use crate::constants::{STAGE_CLONE, STAGE_INIT};
use crate::env::MergeEnv;
use crate::raw::{self, Environment};

/// A named group of sequential steps
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Stage {
    /// Render-time only, never serialized
    #[serde(default, deserialize_with = "raw::optional_string_slice_map")]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "raw::string_slice")]
    pub needs: Vec<String>,
    #[serde(default)]
    pub independent: bool,
    #[serde(default, deserialize_with = "deserialize_steps")]
    pub steps: Vec<Step>,
}

impl Stage {
    /// Make the stage depend on `clone` unless it is `clone` or `init` itself
    fn inject_clone(&mut self) {
        if self.name == STAGE_CLONE || self.name == STAGE_INIT {
            return;
        }
        if !self.needs.iter().any(|need| need == STAGE_CLONE) {
            self.needs.push(STAGE_CLONE.to_string());
        }
    }
}

/// Decode the stage mapping, preserving document order
pub(crate) fn deserialize_stages<'de, D>(deserializer: D) -> Result<Vec<Stage>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StagesVisitor;

    impl<'de> Visitor<'de> for StagesVisitor {
        type Value = Vec<Stage>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping of stage names to stages")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut stages = Vec::new();

            while let Some((key, stage)) = map.next_entry::<String, Option<Stage>>()? {
                let mut stage = stage.ok_or_else(|| {
                    de::Error::custom(format!("invalid stage {} with nil content found", key))
                })?;

                if stage.name.is_empty() {
                    stage.name = key;
                }
                stage.inject_clone();

                stages.push(stage);
            }

            Ok(stages)
        }
    }

    deserializer.deserialize_any(StagesVisitor)
}

#[derive(Serialize)]
struct StageBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "is_empty")]
    needs: &'a [String],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    independent: bool,
    steps: &'a [Step],
}

fn is_empty(values: &&[String]) -> bool {
    values.is_empty()
}

/// Encode stages back into the mapping shape
pub(crate) fn serialize_stages<S>(stages: &[Stage], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(stages.iter().map(|stage| {
        (
            stage.name.as_str(),
            StageBody {
                name: &stage.name,
                needs: &stage.needs,
                independent: stage.independent,
                steps: &stage.steps,
            },
        )
    }))
}

impl MergeEnv for Stage {
    const KIND: &'static str = "stage";

    fn name(&self) -> &str {
        &self.name
    }

    fn environment_mut(&mut self) -> Option<&mut Environment> {
        self.environment.as_mut()
    }
}
