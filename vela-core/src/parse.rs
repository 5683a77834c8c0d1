//! Pipeline document parsing
//!
//! Rendered template output may hold several YAML documents. Each is decoded
//! into a [`Build`] (running the structural normalizers) and the documents
//! are merged in order.

use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use crate::constants::DEFAULT_VERSION;
use crate::error::Result;
use crate::yaml::Build;
use crate::yaml::ruleset::{expand_events, is_legacy_event};

/// A decoded pipeline document together with deprecation warnings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parsed {
    pub build: Build,
    pub warnings: Vec<String>,
}

/// Parse pipeline YAML, possibly spread over several documents
pub fn parse_pipeline(text: &str) -> Result<Parsed> {
    let mut parsed = Parsed::default();
    let mut documents = 0;

    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        if !value.is_mapping() {
            let err: serde_yaml::Error =
                serde::de::Error::custom("pipeline document must be a mapping");
            return Err(err.into());
        }

        collect_warnings(&value, &mut parsed.warnings);

        let build: Build = serde_yaml::from_value(value)?;
        parsed.build.merge(build);
        documents += 1;
    }

    if parsed.build.version.is_empty() {
        parsed.build.version = DEFAULT_VERSION.to_string();
    }

    debug!(
        "Parsed {} pipeline document(s) with {} step(s) and {} stage(s)",
        documents,
        parsed.build.steps.len(),
        parsed.build.stages.len()
    );

    Ok(parsed)
}

/// Record deprecated constructs that the normalizers silently rewrite
fn collect_warnings(document: &Value, warnings: &mut Vec<String>) {
    for (kind, key) in [("step", "steps"), ("service", "services")] {
        if let Some(containers) = document.get(key).and_then(Value::as_sequence) {
            for container in containers {
                lint_container(kind, container, warnings);
            }
        }
    }

    if let Some(stages) = document.get("stages").and_then(Value::as_mapping) {
        for stage in stages.values() {
            if let Some(steps) = stage.get("steps").and_then(Value::as_sequence) {
                for step in steps {
                    lint_container("step", step, warnings);
                }
            }
        }
    }

    if let Some(secrets) = document.get("secrets").and_then(Value::as_sequence) {
        for secret in secrets {
            if let Some(origin) = secret.get("origin") {
                lint_container("secret origin", origin, warnings);
            }
        }
    }
}

fn lint_container(kind: &str, container: &Value, warnings: &mut Vec<String>) {
    let name = container
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>");

    let deprecated_pull = match container.get("pull") {
        Some(Value::Bool(pull)) => Some(pull.to_string()),
        Some(Value::String(pull))
            if pull.eq_ignore_ascii_case("true") || pull.eq_ignore_ascii_case("false") =>
        {
            Some(pull.clone())
        }
        _ => None,
    };
    if let Some(pull) = deprecated_pull {
        let replacement = if pull.eq_ignore_ascii_case("true") {
            "always"
        } else {
            "not_present"
        };
        warnings.push(format!(
            "{} {}: pull value {} is deprecated, use {}",
            kind, name, pull, replacement
        ));
    }

    let Some(ruleset) = container.get("ruleset") else {
        return;
    };
    for rules in [Some(ruleset), ruleset.get("if"), ruleset.get("unless")]
        .into_iter()
        .flatten()
    {
        let events: Vec<String> = match rules.get("event") {
            Some(Value::String(event)) => vec![event.clone()],
            Some(Value::Sequence(events)) => events
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => continue,
        };

        for event in events.into_iter().filter(|e| is_legacy_event(e)) {
            let expanded = expand_events(vec![event.clone()]);
            warnings.push(format!(
                "{} {}: event {} is expanded to {}",
                kind,
                name,
                event,
                expanded.join(", ")
            ));
        }
    }
}
