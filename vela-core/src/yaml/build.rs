//! The pipeline document

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::secret::deserialize_secrets;
use super::service::deserialize_services;
use super::stage::{deserialize_stages, serialize_stages};
use super::step::deserialize_steps;
use super::{Rules, Secret, Service, Stage, Step, Template};
use crate::constants::{
    MATCHER_FILEPATH, MATCHER_REGEX, OPERATOR_AND, OPERATOR_OR, PULL_POLICIES,
    SECRET_PULL_BUILD, SECRET_PULL_STEP,
};
use crate::error::{Error, Result};
use crate::raw::{self, Environment};

/// A pipeline as written by users and produced by templates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Build {
    #[serde(
        default,
        deserialize_with = "raw::scalar",
        skip_serializing_if = "String::is_empty"
    )]
    pub version: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(
        default,
        deserialize_with = "raw::string_slice_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Worker::is_empty")]
    pub worker: Worker,
    #[serde(
        default,
        deserialize_with = "deserialize_secrets",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub secrets: Vec<Secret>,
    #[serde(
        default,
        deserialize_with = "deserialize_services",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub services: Vec<Service>,
    #[serde(
        default,
        deserialize_with = "deserialize_stages",
        serialize_with = "serialize_stages",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub stages: Vec<Stage>,
    #[serde(
        default,
        deserialize_with = "deserialize_steps",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<Template>,
    #[serde(default, skip_serializing_if = "Git::is_empty")]
    pub git: Git,
}

/// Build-level behaviour switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub template: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone: Option<bool>,
    #[serde(
        default,
        deserialize_with = "raw::string_slice",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub environment: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_cancel: Option<CancelOptions>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub render_inline: bool,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        *self == Metadata::default()
    }
}

/// Auto-cancellation of superseded builds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<bool>,
}

/// Worker affinity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flavor: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub platform: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runtime: String,
}

impl Worker {
    pub fn is_empty(&self) -> bool {
        self.flavor.is_empty() && self.platform.is_empty() && self.runtime.is_empty()
    }
}

/// Git policy for the clone step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Git {
    #[serde(default, skip_serializing_if = "Token::is_empty")]
    pub token: Token,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submodules: Option<bool>,
}

impl Git {
    pub fn is_empty(&self) -> bool {
        self.token.is_empty() && self.submodules.is_none()
    }
}

/// Installation token scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(
        default,
        deserialize_with = "raw::string_slice",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub repositories: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, String>,
}

impl Token {
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty() && self.permissions.is_empty()
    }
}

impl Build {
    /// Rename every step to `<prefix>_<name>`
    pub fn prefix_steps(&mut self, prefix: &str) {
        for step in &mut self.steps {
            step.name = format!("{}_{}", prefix, step.name);
        }
    }

    /// Merge a later document into this one
    ///
    /// Lists are appended, the environment is overlaid and the scalar
    /// sections keep the first non-empty value.
    pub fn merge(&mut self, other: Build) {
        if self.version.is_empty() {
            self.version = other.version;
        }
        if self.metadata.is_empty() {
            self.metadata = other.metadata;
        }
        if self.worker.is_empty() {
            self.worker = other.worker;
        }
        if self.git.is_empty() {
            self.git = other.git;
        }

        self.environment.extend(other.environment);
        self.secrets.extend(other.secrets);
        self.services.extend(other.services);
        self.stages.extend(other.stages);
        self.steps.extend(other.steps);
        self.templates.extend(other.templates);
    }

    /// Check the document against its field constraints
    pub fn validate(&self) -> Result<()> {
        if !self.steps.is_empty() && !self.stages.is_empty() {
            return Err(Error::validation(
                "pipeline cannot contain both steps and stages",
            ));
        }

        validate_steps(&self.steps, "pipeline")?;

        let mut stage_names = HashSet::new();
        for stage in &self.stages {
            if !stage_names.insert(stage.name.as_str()) {
                return Err(Error::validation(format!(
                    "duplicate stage name {}",
                    stage.name
                )));
            }
            validate_steps(&stage.steps, &format!("stage {}", stage.name))?;
        }

        let mut service_names = HashSet::new();
        for service in &self.services {
            if service.name.is_empty() {
                return Err(Error::validation("service has no name"));
            }
            if !service_names.insert(service.name.as_str()) {
                return Err(Error::validation(format!(
                    "duplicate service name {}",
                    service.name
                )));
            }
            validate_pull(&service.pull, "service", &service.name)?;
        }

        for secret in &self.secrets {
            if secret.pull != SECRET_PULL_BUILD && secret.pull != SECRET_PULL_STEP {
                return Err(Error::validation(format!(
                    "secret {} has invalid pull value {}: expected {} or {}",
                    secret.name, secret.pull, SECRET_PULL_BUILD, SECRET_PULL_STEP
                )));
            }
            if let Some(origin) = &secret.origin {
                validate_pull(&origin.pull, "secret origin", &origin.name)?;
                validate_rules(&origin.ruleset.if_, "secret origin", &origin.name)?;
                if let Some(unless) = &origin.ruleset.unless {
                    validate_rules(unless, "secret origin", &origin.name)?;
                }
            }
        }

        Ok(())
    }
}

fn validate_steps(steps: &[Step], scope: &str) -> Result<()> {
    let mut names = HashSet::new();

    for step in steps {
        if step.name.is_empty() {
            return Err(Error::validation(format!("{} contains a step with no name", scope)));
        }
        if !names.insert(step.name.as_str()) {
            return Err(Error::validation(format!(
                "{} contains duplicate step name {}",
                scope, step.name
            )));
        }
        if step.image.is_empty() && step.template.name.is_empty() {
            return Err(Error::validation(format!(
                "step {} must define an image or a template",
                step.name
            )));
        }

        validate_pull(&step.pull, "step", &step.name)?;
        validate_rules(&step.ruleset.if_, "step", &step.name)?;
        if let Some(unless) = &step.ruleset.unless {
            validate_rules(unless, "step", &step.name)?;
        }
    }

    Ok(())
}

fn validate_pull(pull: &str, kind: &str, name: &str) -> Result<()> {
    if PULL_POLICIES.contains(&pull) {
        return Ok(());
    }

    Err(Error::validation(format!(
        "{} {} has invalid pull value {}: expected one of {}",
        kind,
        name,
        pull,
        PULL_POLICIES.join(", ")
    )))
}

fn validate_rules(rules: &Rules, kind: &str, name: &str) -> Result<()> {
    if !rules.matcher.is_empty() && rules.matcher != MATCHER_FILEPATH && rules.matcher != MATCHER_REGEX
    {
        return Err(Error::validation(format!(
            "{} {} has invalid ruleset matcher {}: expected {} or {}",
            kind, name, rules.matcher, MATCHER_FILEPATH, MATCHER_REGEX
        )));
    }

    if !rules.operator.is_empty() && rules.operator != OPERATOR_AND && rules.operator != OPERATOR_OR
    {
        return Err(Error::validation(format!(
            "{} {} has invalid ruleset operator {}: expected {} or {}",
            kind, name, rules.operator, OPERATOR_AND, OPERATOR_OR
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parse(yaml: &str) -> Build {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_full_build() {
        let build = parse(
            r#"
version: "1"
metadata:
  template: false
  clone: false
  auto_cancel:
    running: true
environment:
  GLOBAL: "yes"
worker:
  flavor: large
services:
  - name: postgres
    image: postgres:16
    ports: ["5432:5432"]
steps:
  - name: test
    image: golang
    commands: [go test ./...]
secrets:
  - name: token
templates:
  - name: go
    source: github.com/octocat/templates/go.yml
    type: github
git:
  submodules: true
"#,
        );

        assert_eq!(build.version, "1");
        assert_eq!(build.metadata.clone, Some(false));
        assert_eq!(
            build.metadata.auto_cancel.as_ref().unwrap().running,
            Some(true)
        );
        assert_eq!(build.environment.get("GLOBAL"), Some(&"yes".to_string()));
        assert_eq!(build.worker.flavor, "large");
        assert_eq!(build.services[0].pull, "not_present");
        assert_eq!(build.secrets[0].engine, "native");
        assert_eq!(build.git.submodules, Some(true));
        assert!(build.validate().is_ok());
    }

    #[test]
    fn test_prefix_steps() {
        let mut build = parse("steps: [{name: install, image: a}, {name: test, image: a}]");
        build.prefix_steps("foo");

        let names: Vec<&str> = build.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["foo_install", "foo_test"]);
    }

    #[test]
    fn test_validate_rejects_steps_and_stages() {
        let build = parse(
            r#"
steps: [{name: a, image: alpine}]
stages:
  build:
    steps: [{name: b, image: alpine}]
"#,
        );

        assert_eq!(build.validate().unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_validate_rejects_duplicate_step_names() {
        let build = parse("steps: [{name: a, image: alpine}, {name: a, image: alpine}]");
        let err = build.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate step name a"));
    }

    #[test]
    fn test_validate_allows_same_step_name_in_different_stages() {
        let build = parse(
            r#"
stages:
  test:
    steps: [{name: run, image: alpine}]
  build:
    steps: [{name: run, image: alpine}]
"#,
        );
        assert!(build.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_invalid_enums() {
        let build = parse("steps: [{name: a, image: alpine, pull: sometimes}]");
        assert!(build.validate().unwrap_err().to_string().contains("pull"));

        let build = parse("steps: [{name: a, image: alpine, ruleset: {matcher: glob, branch: main}}]");
        assert!(build.validate().unwrap_err().to_string().contains("matcher"));

        let build = parse("steps: [{name: a, image: alpine, ruleset: {if: {operator: xor}}}]");
        assert!(build.validate().unwrap_err().to_string().contains("operator"));

        let build = parse("secrets: [{name: a, pull: never}]");
        assert!(build.validate().is_err());
    }

    #[test]
    fn test_validate_requires_image_or_template() {
        let build = parse("steps: [{name: a}]");
        assert!(build.validate().is_err());

        let build = parse("steps: [{name: a, template: {name: go}}]");
        assert!(build.validate().is_ok());
    }

    #[test]
    fn test_merge_documents() {
        let mut first = parse("version: '1'\nenvironment: {A: '1'}\nsteps: [{name: a, image: x}]");
        let second = parse("version: '2'\nenvironment: {A: '2', B: '3'}\nsteps: [{name: b, image: x}]");

        first.merge(second);

        assert_eq!(first.version, "1");
        assert_eq!(first.environment.get("A"), Some(&"2".to_string()));
        assert_eq!(first.environment.get("B"), Some(&"3".to_string()));
        assert_eq!(first.steps.len(), 2);
    }
}
