//! Shorthand-tolerant field decoders
//!
//! Pipeline authors may write `branch: main` instead of `branch: [main]`, or
//! `environment: [FOO=bar]` instead of a mapping. These helpers are wired into
//! the document types with `#[serde(deserialize_with = ...)]`.

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Environment variables attached to a pipeline entity
pub type Environment = BTreeMap<String, String>;

/// A scalar rendered as a string, used for list elements and map values
///
/// `float` marks values decoded from a floating point number, whose written
/// form (`1.10`, `2.0`) is already lost.
struct Scalar {
    text: String,
    float: bool,
}

impl Scalar {
    fn text(text: String) -> Self {
        Self { text, float: false }
    }
}

fn inexact_rule_value<E: de::Error>(value: impl fmt::Display) -> E {
    E::custom(format!(
        "rule value {} is a floating point number; quote it to keep its exact text",
        value
    ))
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScalarVisitor;

        impl<'de> Visitor<'de> for ScalarVisitor {
            type Value = Scalar;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string, number or boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
                Ok(Scalar::text(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Scalar, E> {
                Ok(Scalar::text(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Scalar, E> {
                Ok(Scalar::text(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
                Ok(Scalar::text(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
                Ok(Scalar::text(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Scalar, E> {
                Ok(Scalar {
                    text: v.to_string(),
                    float: true,
                })
            }

            fn visit_unit<E: de::Error>(self) -> Result<Scalar, E> {
                Ok(Scalar::text(String::new()))
            }
        }

        deserializer.deserialize_any(ScalarVisitor)
    }
}

/// Decode any scalar (string, number, boolean or null) as a string
pub fn scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(|scalar| scalar.text)
}

/// Decode a scalar or a sequence of scalars into a list of strings
pub fn string_slice<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(StringSliceVisitor { exact: false })
}

/// Like [`string_slice`], rejecting floating point numbers
///
/// Rule values are matched as text, so `tag: 1.10` must not quietly become
/// `1.1`.
pub fn rule_values<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(StringSliceVisitor { exact: true })
}

struct StringSliceVisitor {
    exact: bool,
}

impl<'de> Visitor<'de> for StringSliceVisitor {
    type Value = Vec<String>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string or a list of strings")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(vec![v.to_string()])
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(vec![v])
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(vec![v.to_string()])
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(vec![v.to_string()])
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(vec![v.to_string()])
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if self.exact {
            return Err(inexact_rule_value(v));
        }
        Ok(vec![v.to_string()])
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Vec::new())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Vec::new())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut values = Vec::new();
        while let Some(scalar) = seq.next_element::<Scalar>()? {
            if self.exact && scalar.float {
                return Err(inexact_rule_value(scalar.text));
            }
            values.push(scalar.text);
        }
        Ok(values)
    }
}

/// Decode a mapping or a list of `KEY=VALUE` strings into an environment
pub fn string_slice_map<'de, D>(deserializer: D) -> Result<Environment, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringSliceMapVisitor;

    impl<'de> Visitor<'de> for StringSliceMapVisitor {
        type Value = Environment;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping or a list of KEY=VALUE strings")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Environment::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut env = Environment::new();
            while let Some((key, value)) = map.next_entry::<String, Scalar>()? {
                env.insert(key, value.text);
            }
            Ok(env)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut env = Environment::new();
            while let Some(entry) = seq.next_element::<String>()? {
                let (key, value) = entry.split_once('=').ok_or_else(|| {
                    de::Error::custom(format!(
                        "environment entry '{}' must be in KEY=VALUE form",
                        entry
                    ))
                })?;
                env.insert(key.to_string(), value.to_string());
            }
            Ok(env)
        }
    }

    deserializer.deserialize_any(StringSliceMapVisitor)
}

/// Like [`string_slice_map`], keeping an absent or null environment as `None`
pub fn optional_string_slice_map<'de, D>(deserializer: D) -> Result<Option<Environment>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(value) => string_slice_map(value)
            .map(Some)
            .map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Fields {
        #[serde(default, deserialize_with = "string_slice")]
        list: Vec<String>,
        #[serde(default, deserialize_with = "optional_string_slice_map")]
        env: Option<Environment>,
    }

    #[test]
    fn test_string_slice_scalar() {
        let fields: Fields = serde_yaml::from_str("list: main").unwrap();
        assert_eq!(fields.list, vec!["main"]);
        assert_eq!(fields.env, None);
    }

    #[test]
    fn test_string_slice_sequence_of_mixed_scalars() {
        let fields: Fields = serde_yaml::from_str("list: [main, 1, true]").unwrap();
        assert_eq!(fields.list, vec!["main", "1", "true"]);
    }

    #[test]
    fn test_rule_values_reject_floats() {
        #[derive(Debug, Deserialize)]
        struct Rule {
            #[serde(default, deserialize_with = "rule_values")]
            values: Vec<String>,
        }

        let rule: Rule = serde_yaml::from_str("values: [main, 7, true]").unwrap();
        assert_eq!(rule.values, vec!["main", "7", "true"]);

        assert!(serde_yaml::from_str::<Rule>("values: 1.10").is_err());
        assert!(serde_yaml::from_str::<Rule>("values: [main, 2.0]").is_err());

        // plain lists keep the lossy form
        let fields: Fields = serde_yaml::from_str("list: [2.0]").unwrap();
        assert_eq!(fields.list, vec!["2"]);
    }

    #[test]
    fn test_string_slice_map_from_mapping() {
        let fields: Fields = serde_yaml::from_str("env: { FOO: bar, NUM: 3 }").unwrap();
        let env = fields.env.unwrap();
        assert_eq!(env.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(env.get("NUM"), Some(&"3".to_string()));
    }

    #[test]
    fn test_string_slice_map_from_list() {
        let fields: Fields = serde_yaml::from_str("env: [FOO=bar, URL=a=b]").unwrap();
        let env = fields.env.unwrap();
        assert_eq!(env.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(env.get("URL"), Some(&"a=b".to_string()));
    }

    #[test]
    fn test_string_slice_map_rejects_bare_entries() {
        let result: Result<Fields, _> = serde_yaml::from_str("env: [FOO]");
        assert!(result.is_err());
    }

    #[test]
    fn test_null_environment_is_absent() {
        let fields: Fields = serde_yaml::from_str("env: ~").unwrap();
        assert_eq!(fields.env, None);
    }
}
