//! Ulimit decoding

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// A resource limit for a container
///
/// Accepts `name=soft:hard`, `name=value` or the explicit object form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ulimit {
    pub name: String,
    pub soft: i64,
    pub hard: i64,
}

impl Ulimit {
    pub fn parse(shorthand: &str) -> Result<Self, String> {
        let (name, limits) = shorthand
            .split_once('=')
            .ok_or_else(|| format!("ulimit '{}' must be in name=soft:hard form", shorthand))?;

        let parse_limit = |value: &str| {
            value
                .parse::<i64>()
                .map_err(|e| format!("ulimit '{}' has invalid limit '{}': {}", shorthand, value, e))
        };

        let limits: Vec<&str> = limits.split(':').collect();
        let (soft, hard) = match limits.as_slice() {
            [value] => {
                let value = parse_limit(*value)?;
                (value, value)
            }
            [soft, hard] => (parse_limit(*soft)?, parse_limit(*hard)?),
            _ => return Err(format!("ulimit '{}' must be in name=soft:hard form", shorthand)),
        };

        Ok(Ulimit {
            name: name.to_string(),
            soft,
            hard,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUlimit {
    Shorthand(String),
    Object {
        name: String,
        #[serde(default)]
        soft: i64,
        #[serde(default)]
        hard: i64,
    },
}

impl<'de> Deserialize<'de> for Ulimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawUlimit::deserialize(deserializer)? {
            RawUlimit::Shorthand(shorthand) => Ulimit::parse(&shorthand).map_err(de::Error::custom),
            RawUlimit::Object { name, soft, hard } => Ok(Ulimit {
                name,
                soft,
                hard: if hard == 0 { soft } else { hard },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand() {
        let ulimits: Vec<Ulimit> = serde_yaml::from_str(r#"["foo=1024", "bar=1024:2048"]"#).unwrap();

        assert_eq!(ulimits[0].name, "foo");
        assert_eq!((ulimits[0].soft, ulimits[0].hard), (1024, 1024));
        assert_eq!(ulimits[1].name, "bar");
        assert_eq!((ulimits[1].soft, ulimits[1].hard), (1024, 2048));
    }

    #[test]
    fn test_object_form() {
        let ulimits: Vec<Ulimit> = serde_yaml::from_str("- { name: nofile, soft: 10 }").unwrap();
        assert_eq!((ulimits[0].soft, ulimits[0].hard), (10, 10));
    }

    #[test]
    fn test_invalid_shorthand() {
        assert!(Ulimit::parse("nofile").is_err());
        assert!(Ulimit::parse("nofile=a").is_err());
        assert!(Ulimit::parse("nofile=1:2:3").is_err());
    }
}
