//! Platform variable namespacing
//!
//! The server injects variables such as `VELA_BUILD_NUMBER` or
//! `DEPLOYMENT_PARAMETER_REGION` into every render. Templates never see the
//! raw map: it is routed into the `build`, `repo`, `user`, `deployment` and
//! `system` namespaces, and flattened again for the native engine's `vela`
//! helper.

use std::collections::{BTreeMap, HashMap};

const VELA_PREFIX: &str = "vela_";
const DEPLOYMENT_PREFIX: &str = "deployment_parameter_";
const BUILD_PREFIX: &str = "build_";
const REPO_PREFIX: &str = "repo_";
const USER_PREFIX: &str = "user_";

/// Key under the system namespace carrying the template display name
pub const TEMPLATE_NAME: &str = "template_name";

/// Namespaced snapshot of the platform variables for one render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformVars {
    pub build: BTreeMap<String, String>,
    pub repo: BTreeMap<String, String>,
    pub user: BTreeMap<String, String>,
    pub deployment: BTreeMap<String, String>,
    pub system: BTreeMap<String, String>,
}

impl PlatformVars {
    /// Route the injected variables into namespaces
    ///
    /// Keys are matched case-insensitively and stored lower-cased. Keys that
    /// carry neither the `VELA_` nor the `DEPLOYMENT_PARAMETER_` prefix are
    /// dropped.
    pub fn new(environment: &HashMap<String, String>, template_name: &str) -> Self {
        let mut vars = Self::default();

        for (key, value) in environment {
            let key = key.to_lowercase();

            if let Some(key) = key.strip_prefix(VELA_PREFIX) {
                let (namespace, field) = if let Some(field) = key.strip_prefix(BUILD_PREFIX) {
                    (&mut vars.build, field)
                } else if let Some(field) = key.strip_prefix(REPO_PREFIX) {
                    (&mut vars.repo, field)
                } else if let Some(field) = key.strip_prefix(USER_PREFIX) {
                    (&mut vars.user, field)
                } else {
                    (&mut vars.system, key)
                };
                namespace.insert(field.to_string(), value.clone());
            } else if let Some(field) = key.strip_prefix(DEPLOYMENT_PREFIX) {
                vars.deployment.insert(field.to_string(), value.clone());
            }
        }

        vars.system
            .insert(TEMPLATE_NAME.to_string(), template_name.to_string());

        vars
    }

    /// Namespaces in the order they are exposed to scripts
    pub fn namespaces(&self) -> [(&'static str, &BTreeMap<String, String>); 5] {
        [
            ("build", &self.build),
            ("repo", &self.repo),
            ("user", &self.user),
            ("deployment", &self.deployment),
            ("system", &self.system),
        ]
    }

    /// Flatten back into a single lookup table
    ///
    /// `build`, `repo` and `user` keep their category prefix, system keys are
    /// bare and deployment parameters keep their full prefix, so the flat key
    /// is always the injected variable name without `vela_`.
    pub fn flatten(&self) -> FlatPlatformVars {
        let mut vars = HashMap::new();

        for (prefix, namespace) in [
            (BUILD_PREFIX, &self.build),
            (REPO_PREFIX, &self.repo),
            (USER_PREFIX, &self.user),
            (DEPLOYMENT_PREFIX, &self.deployment),
            ("", &self.system),
        ] {
            for (key, value) in namespace {
                vars.insert(format!("{}{}", prefix, key), value.clone());
            }
        }

        FlatPlatformVars { vars }
    }
}

/// Flat platform variable table used by the native engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatPlatformVars {
    vars: HashMap<String, String>,
}

impl FlatPlatformVars {
    /// Case-insensitive lookup that tolerates a leading `vela_`
    ///
    /// Returns an empty string when the variable is not set.
    pub fn lookup(&self, key: &str) -> &str {
        let key = key.to_lowercase();
        let key = key.strip_prefix(VELA_PREFIX).unwrap_or(key.as_str());

        self.vars.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.vars.get(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
