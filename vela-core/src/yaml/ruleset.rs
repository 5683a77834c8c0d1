//! Ruleset and Rules decoding
//!
//! A ruleset accepts two shapes at once. The simple shape puts rule types
//! straight under `ruleset:`, the advanced shape nests them under `if:` and
//! `unless:`. Both are decoded from the same node and merged, so
//!
//! ```yaml
//! ruleset:
//!   branch: main
//! ```
//!
//! and
//!
//! ```yaml
//! ruleset:
//!   if:
//!     branch: main
//! ```
//!
//! produce the same ruleset.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::constants::{
    EVENT_COMMENT, EVENT_COMMENT_CREATED, EVENT_COMMENT_EDITED, EVENT_DEPLOY,
    EVENT_DEPLOY_CREATED, EVENT_PULL, EVENT_PULL_OPENED, EVENT_PULL_REOPENED,
    EVENT_PULL_SYNCHRONIZE, MATCHER_FILEPATH, OPERATOR_AND,
};
use crate::raw;

/// Conditional execution gate attached to a step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ruleset {
    #[serde(rename = "if", skip_serializing_if = "Rules::is_empty")]
    pub if_: Rules,
    /// `None` when the document has no `unless` block at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unless: Option<Rules>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub matcher: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub operator: String,
    #[serde(rename = "continue", skip_serializing_if = "std::ops::Not::not")]
    pub continue_: bool,
}

/// A set of match conditions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Rules {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branch: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comment: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repo: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub label: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub instance: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operation: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub eval: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub matcher: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub operator: String,
}

impl Rules {
    /// True when no match condition is set (matcher and operator are ignored)
    pub fn is_empty(&self) -> bool {
        self.branch.is_empty()
            && self.comment.is_empty()
            && self.event.is_empty()
            && self.path.is_empty()
            && self.repo.is_empty()
            && self.status.is_empty()
            && self.tag.is_empty()
            && self.target.is_empty()
            && self.label.is_empty()
            && self.instance.is_empty()
            && self.operation.is_empty()
            && self.eval.is_empty()
    }

    /// Append every rule type of `other` onto this set; a non-empty `eval` replaces ours
    fn absorb(&mut self, other: Rules) {
        self.branch.extend(other.branch);
        self.comment.extend(other.comment);
        self.event.extend(other.event);
        self.path.extend(other.path);
        self.repo.extend(other.repo);
        self.status.extend(other.status);
        self.tag.extend(other.tag);
        self.target.extend(other.target);
        self.label.extend(other.label);
        self.instance.extend(other.instance);
        self.operation.extend(other.operation);

        if !other.eval.is_empty() {
            self.eval = other.eval;
        }
    }

    fn inherit(&mut self, matcher: &str, operator: &str) {
        if self.matcher.is_empty() {
            self.matcher = matcher.to_string();
        }
        if self.operator.is_empty() {
            self.operator = operator.to_string();
        }
    }
}

/// Expand legacy event names into their action-qualified forms
pub fn expand_events(events: Vec<String>) -> Vec<String> {
    let mut expanded = Vec::with_capacity(events.len());

    for event in events {
        match event.as_str() {
            EVENT_PULL => expanded.extend(
                [EVENT_PULL_OPENED, EVENT_PULL_SYNCHRONIZE, EVENT_PULL_REOPENED]
                    .map(String::from),
            ),
            EVENT_DEPLOY => expanded.push(EVENT_DEPLOY_CREATED.to_string()),
            EVENT_COMMENT => {
                expanded.extend([EVENT_COMMENT_CREATED, EVENT_COMMENT_EDITED].map(String::from))
            }
            _ => expanded.push(event),
        }
    }

    expanded
}

/// Event names that are expanded at parse time
pub fn is_legacy_event(event: &str) -> bool {
    matches!(event, EVENT_PULL | EVENT_DEPLOY | EVENT_COMMENT)
}

#[derive(Deserialize)]
struct RawRules {
    #[serde(default, deserialize_with = "raw::rule_values")]
    branch: Vec<String>,
    #[serde(default, deserialize_with = "raw::rule_values")]
    comment: Vec<String>,
    #[serde(default, deserialize_with = "raw::rule_values")]
    event: Vec<String>,
    #[serde(default, deserialize_with = "raw::rule_values")]
    path: Vec<String>,
    #[serde(default, deserialize_with = "raw::rule_values")]
    repo: Vec<String>,
    #[serde(default, deserialize_with = "raw::rule_values")]
    status: Vec<String>,
    #[serde(default, deserialize_with = "raw::rule_values")]
    tag: Vec<String>,
    #[serde(default, deserialize_with = "raw::rule_values")]
    target: Vec<String>,
    #[serde(default, deserialize_with = "raw::rule_values")]
    label: Vec<String>,
    #[serde(default, deserialize_with = "raw::rule_values")]
    instance: Vec<String>,
    #[serde(default, deserialize_with = "raw::rule_values")]
    operation: Vec<String>,
    #[serde(default)]
    eval: String,
    #[serde(default)]
    matcher: String,
    #[serde(default)]
    operator: String,
}

impl<'de> Deserialize<'de> for Rules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<RawRules>::deserialize(deserializer)?;
        let Some(raw) = raw else {
            return Ok(Rules::default());
        };

        Ok(Rules {
            branch: raw.branch,
            comment: raw.comment,
            event: expand_events(raw.event),
            path: raw.path,
            repo: raw.repo,
            status: raw.status,
            tag: raw.tag,
            target: raw.target,
            label: raw.label,
            instance: raw.instance,
            operation: raw.operation,
            eval: raw.eval,
            matcher: raw.matcher,
            operator: raw.operator,
        })
    }
}

#[derive(Deserialize)]
struct AdvancedRuleset {
    #[serde(default, rename = "if")]
    if_: Rules,
    #[serde(default)]
    unless: Option<Rules>,
    #[serde(default)]
    matcher: String,
    #[serde(default)]
    operator: String,
    #[serde(default, rename = "continue")]
    continue_: bool,
}

impl Ruleset {
    /// True when the ruleset places no constraint on the step
    pub fn is_empty(&self) -> bool {
        self.if_.is_empty() && self.unless.is_none() && !self.continue_
    }

    fn from_forms(simple: Rules, advanced: AdvancedRuleset) -> Self {
        let mut ruleset = Ruleset {
            if_: advanced.if_,
            unless: advanced.unless,
            matcher: advanced.matcher,
            operator: advanced.operator,
            continue_: advanced.continue_,
        };

        if ruleset.matcher.is_empty() {
            ruleset.matcher = MATCHER_FILEPATH.to_string();
        }
        if ruleset.operator.is_empty() {
            ruleset.operator = OPERATOR_AND.to_string();
        }

        ruleset.if_.absorb(simple);
        ruleset.if_.inherit(&ruleset.matcher, &ruleset.operator);
        if let Some(unless) = ruleset.unless.as_mut() {
            unless.inherit(&ruleset.matcher, &ruleset.operator);
        }

        // matcher and operator only live on the rules from here on
        ruleset.matcher.clear();
        ruleset.operator.clear();

        ruleset
    }
}

impl<'de> Deserialize<'de> for Ruleset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut node = serde_yaml::Value::deserialize(deserializer)?;
        if node.is_null() {
            node = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
        }

        let simple: Rules = serde_yaml::from_value(node.clone()).map_err(de::Error::custom)?;
        let advanced: AdvancedRuleset = serde_yaml::from_value(node).map_err(de::Error::custom)?;

        Ok(Ruleset::from_forms(simple, advanced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Ruleset {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_simple_and_advanced_forms_match() {
        let simple = parse("branch: [main]");
        let advanced = parse("if:\n  branch: [main]");

        assert_eq!(simple, advanced);
        assert_eq!(simple.if_.branch, strings(&["main"]));
        assert_eq!(simple.if_.matcher, MATCHER_FILEPATH);
        assert_eq!(simple.if_.operator, OPERATOR_AND);
        assert!(simple.matcher.is_empty());
        assert!(simple.operator.is_empty());
        assert_eq!(simple.unless, None);
    }

    #[test]
    fn test_simple_values_append_onto_if() {
        let ruleset = parse(
            r#"
branch: dev
event: push
if:
  branch: main
"#,
        );

        assert_eq!(ruleset.if_.branch, strings(&["main", "dev"]));
        assert_eq!(ruleset.if_.event, strings(&["push"]));
    }

    #[test]
    fn test_simple_eval_overwrites() {
        let ruleset = parse(
            r#"
eval: "VELA_BUILD_AUTHOR == 'octocat'"
if:
  eval: "VELA_BUILD_NUMBER > 1"
"#,
        );

        assert_eq!(ruleset.if_.eval, "VELA_BUILD_AUTHOR == 'octocat'");
    }

    #[test]
    fn test_ruleset_level_defaults_propagate() {
        let ruleset = parse(
            r#"
matcher: regexp
operator: or
if:
  branch: main
unless:
  event: tag
"#,
        );

        assert_eq!(ruleset.if_.matcher, "regexp");
        assert_eq!(ruleset.if_.operator, "or");
        let unless = ruleset.unless.unwrap();
        assert_eq!(unless.matcher, "regexp");
        assert_eq!(unless.operator, "or");
        assert_eq!(unless.event, strings(&["tag"]));
        assert!(ruleset.matcher.is_empty());
    }

    #[test]
    fn test_rule_level_matcher_is_authoritative() {
        let ruleset = parse(
            r#"
matcher: regexp
if:
  branch: main
  matcher: filepath
  operator: or
"#,
        );

        assert_eq!(ruleset.if_.matcher, "filepath");
        assert_eq!(ruleset.if_.operator, "or");
    }

    #[test]
    fn test_unless_presence_is_preserved() {
        assert_eq!(parse("branch: main").unless, None);

        let explicit = parse("unless: {}");
        let unless = explicit.unless.unwrap();
        assert!(unless.is_empty());
        assert_eq!(unless.matcher, MATCHER_FILEPATH);
    }

    #[test]
    fn test_continue_flag() {
        assert!(parse("continue: true").continue_);
        assert!(!parse("branch: main").continue_);
    }

    #[test]
    fn test_legacy_event_expansion() {
        let rules: Rules = serde_yaml::from_str("event: [pull_request]").unwrap();
        assert_eq!(
            rules.event,
            strings(&[
                "pull_request:opened",
                "pull_request:synchronize",
                "pull_request:reopened"
            ])
        );

        let rules: Rules = serde_yaml::from_str("event: push").unwrap();
        assert_eq!(rules.event, strings(&["push"]));

        let rules: Rules = serde_yaml::from_str("event: [deployment, comment, tag]").unwrap();
        assert_eq!(
            rules.event,
            strings(&[
                "deployment:created",
                "comment:created",
                "comment:edited",
                "tag"
            ])
        );
    }

    #[test]
    fn test_expansion_applies_to_both_forms() {
        let ruleset = parse(
            r#"
event: comment
unless:
  event: deployment
"#,
        );

        assert_eq!(
            ruleset.if_.event,
            strings(&["comment:created", "comment:edited"])
        );
        assert_eq!(
            ruleset.unless.unwrap().event,
            strings(&["deployment:created"])
        );
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let once = expand_events(strings(&["pull_request"]));
        assert_eq!(expand_events(once.clone()), once);
    }

    #[test]
    fn test_float_rule_values() {
        let err = serde_yaml::from_str::<Ruleset>("branch: 2.0").unwrap_err();
        assert!(err.to_string().contains("floating point"), "{}", err);

        assert!(serde_yaml::from_str::<Ruleset>("if: { tag: [v1, 1.10] }").is_err());
        assert!(serde_yaml::from_str::<Ruleset>("unless: { branch: [2.5] }").is_err());

        assert_eq!(parse("tag: '1.10'").if_.tag, strings(&["1.10"]));
    }

    #[test]
    fn test_null_ruleset() {
        let ruleset = parse("~");
        assert!(ruleset.is_empty());
        assert_eq!(ruleset.if_.matcher, MATCHER_FILEPATH);
    }

    #[test]
    fn test_serialized_ruleset_round_trips() {
        let ruleset = parse("branch: main\nevent: pull_request\nunless: { tag: v1 }");
        let yaml = serde_yaml::to_string(&ruleset).unwrap();
        assert_eq!(parse(&yaml), ruleset);
    }
}
