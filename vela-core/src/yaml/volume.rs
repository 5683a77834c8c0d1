//! Volume decoding

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::constants::ACCESS_MODE_READ_ONLY;

/// A bind mount attached to a step
///
/// Accepts `"/src"`, `"/src:/dst"` and `"/src:/dst:mode"` shorthand as well as
/// the explicit object form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Volume {
    pub source: String,
    pub destination: String,
    pub access_mode: String,
}

impl Volume {
    /// Parse the colon-delimited shorthand
    pub fn parse(shorthand: &str) -> Result<Self, String> {
        let parts: Vec<&str> = shorthand.split(':').collect();

        let (source, destination, access_mode) = match parts.as_slice() {
            [source] => (*source, *source, ACCESS_MODE_READ_ONLY),
            [source, destination] => (*source, *destination, ACCESS_MODE_READ_ONLY),
            [source, destination, mode] => (*source, *destination, *mode),
            _ => {
                return Err(format!(
                    "volume '{}' must be in source[:destination[:mode]] form",
                    shorthand
                ));
            }
        };

        Ok(Volume {
            source: source.to_string(),
            destination: destination.to_string(),
            access_mode: access_mode.to_string(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVolume {
    Shorthand(String),
    Object {
        source: String,
        #[serde(default)]
        destination: String,
        #[serde(default)]
        access_mode: String,
    },
}

impl<'de> Deserialize<'de> for Volume {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawVolume::deserialize(deserializer)? {
            RawVolume::Shorthand(shorthand) => Volume::parse(&shorthand).map_err(de::Error::custom),
            RawVolume::Object {
                source,
                destination,
                access_mode,
            } => Ok(Volume {
                destination: if destination.is_empty() {
                    source.clone()
                } else {
                    destination
                },
                access_mode: if access_mode.is_empty() {
                    ACCESS_MODE_READ_ONLY.to_string()
                } else {
                    access_mode
                },
                source,
            }),
        }
    }
}
