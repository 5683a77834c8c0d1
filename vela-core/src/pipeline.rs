//! Canonical pipeline form handed to the execution layer
//!
//! Produced from a decoded [`yaml::Build`]. YAML-only scaffolding is dropped:
//! rulesets keep only `if`, `unless` and `continue`, steps and services become
//! numbered containers with stable ids.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::env::MergeEnv;
use crate::raw::Environment;
use crate::yaml::{self, Metadata, Rules, StepSecret, Ulimit, Volume, Worker};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Build {
    pub version: String,
    pub metadata: Metadata,
    pub environment: Environment,
    pub worker: Worker,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<Secret>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Container>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<Stage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Container>,
}

/// A step or service ready to be scheduled
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Container {
    pub id: String,
    pub number: usize,
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    pub detach: bool,
    pub privileged: bool,
    pub pull: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_yaml::Value>,
    pub ruleset: Ruleset,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<StepSecret>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ulimits: Vec<Ulimit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub report_as: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stage {
    pub name: String,
    pub needs: Vec<String>,
    pub independent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    pub steps: Vec<Container>,
}

/// Execution gate; matcher and operator live on the rules only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ruleset {
    #[serde(rename = "if")]
    pub if_: Rules,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unless: Option<Rules>,
    #[serde(rename = "continue")]
    pub continue_: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Secret {
    pub name: String,
    pub key: String,
    pub engine: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Container>,
    pub pull: String,
}

impl yaml::Ruleset {
    pub fn to_pipeline(&self) -> Ruleset {
        Ruleset {
            if_: self.if_.clone(),
            unless: self.unless.clone(),
            continue_: self.continue_,
        }
    }
}

impl yaml::Step {
    /// Convert into a container with the given id and 1-based position
    pub fn to_pipeline(&self, id: String, number: usize) -> Container {
        Container {
            id,
            number,
            name: self.name.clone(),
            image: self.image.clone(),
            commands: self.commands.clone(),
            entrypoint: self.entrypoint.clone(),
            environment: self.environment.clone(),
            detach: self.detach,
            privileged: self.privileged,
            pull: self.pull.clone(),
            parameters: self.parameters.clone(),
            ruleset: self.ruleset.to_pipeline(),
            secrets: self.secrets.clone(),
            ulimits: self.ulimits.clone(),
            volumes: self.volumes.clone(),
            ports: Vec::new(),
            user: self.user.clone(),
            report_as: self.report_as.clone(),
        }
    }
}

impl yaml::Service {
    pub fn to_pipeline(&self, number: usize) -> Container {
        Container {
            id: format!("service_{}_{}", number, self.name),
            number,
            name: self.name.clone(),
            image: self.image.clone(),
            entrypoint: self.entrypoint.clone(),
            environment: self.environment.clone(),
            detach: true,
            pull: self.pull.clone(),
            ulimits: self.ulimits.clone(),
            ports: self.ports.clone(),
            user: self.user.clone(),
            ..Default::default()
        }
    }
}

impl yaml::Secret {
    pub fn to_pipeline(&self) -> Secret {
        let origin = self.origin.as_ref().map(|origin| Container {
            id: format!("secret_{}", origin.name),
            number: 1,
            name: origin.name.clone(),
            image: origin.image.clone(),
            environment: origin.environment.clone(),
            pull: origin.pull.clone(),
            parameters: origin.parameters.clone(),
            ruleset: origin.ruleset.to_pipeline(),
            secrets: origin.secrets.clone(),
            detach: true,
            ..Default::default()
        });

        Secret {
            name: self.name.clone(),
            key: self.key.clone(),
            engine: self.engine.clone(),
            kind: self.kind.clone(),
            origin,
            pull: self.pull.clone(),
        }
    }
}

impl yaml::Stage {
    pub fn to_pipeline(&self) -> Stage {
        Stage {
            name: self.name.clone(),
            needs: self.needs.clone(),
            independent: self.independent,
            environment: self.environment.clone(),
            steps: self
                .steps
                .iter()
                .enumerate()
                .map(|(index, step)| {
                    step.to_pipeline(format!("{}_{}", self.name, step.name), index + 1)
                })
                .collect(),
        }
    }
}

impl yaml::Build {
    /// Convert the decoded document into its canonical form
    pub fn to_pipeline(&self) -> Build {
        Build {
            version: self.version.clone(),
            metadata: self.metadata.clone(),
            environment: self.environment.clone(),
            worker: self.worker.clone(),
            secrets: self.secrets.iter().map(yaml::Secret::to_pipeline).collect(),
            services: self
                .services
                .iter()
                .enumerate()
                .map(|(index, service)| service.to_pipeline(index + 1))
                .collect(),
            stages: self.stages.iter().map(yaml::Stage::to_pipeline).collect(),
            steps: self
                .steps
                .iter()
                .enumerate()
                .map(|(index, step)| {
                    step.to_pipeline(format!("step_{}_{}", index + 1, step.name), index + 1)
                })
                .collect(),
        }
    }
}

impl MergeEnv for Container {
    const KIND: &'static str = "container";

    fn name(&self) -> &str {
        &self.name
    }

    fn environment_mut(&mut self) -> Option<&mut Environment> {
        self.environment.as_mut()
    }
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
