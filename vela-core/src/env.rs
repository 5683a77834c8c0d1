//! Environment merging for containers and stages

use crate::error::{Error, Result};
use crate::raw::Environment;

/// Entities carrying an environment that can be overlaid at compile time
pub trait MergeEnv {
    /// Entity kind used in error messages (e.g. "step")
    const KIND: &'static str;

    fn name(&self) -> &str;

    /// The entity's environment, `None` when it has none
    fn environment_mut(&mut self) -> Option<&mut Environment>;

    /// Overlay `environment` onto the entity's environment in place
    ///
    /// An entity without an environment is left untouched. Supplying no
    /// environment to an entity that has one is an error.
    fn merge_env(&mut self, environment: Option<&Environment>) -> Result<()> {
        if self.environment_mut().is_none() {
            return Ok(());
        }

        let Some(environment) = environment else {
            return Err(Error::EmptyEnvironment {
                kind: Self::KIND,
                name: self.name().to_string(),
            });
        };

        if let Some(existing) = self.environment_mut() {
            existing.extend(
                environment
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );
        }

        Ok(())
    }
}

impl<T: MergeEnv> MergeEnv for Option<T> {
    const KIND: &'static str = T::KIND;

    fn name(&self) -> &str {
        self.as_ref().map(T::name).unwrap_or_default()
    }

    fn environment_mut(&mut self) -> Option<&mut Environment> {
        self.as_mut().and_then(T::environment_mut)
    }
}
