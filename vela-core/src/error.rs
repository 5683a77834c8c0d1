//! Error types for the pipeline compiler

use thiserror::Error;

use crate::engine::Engine;

/// Result type alias for compiler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering or compiling a pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Template or script syntax is invalid
    #[error("failed to parse {engine} template {template}: {message}")]
    Parse {
        engine: Engine,
        template: String,
        message: String,
    },

    /// Runtime failure while executing a template or script
    #[error("failed to execute {engine} template {template}: {message}")]
    Execution {
        engine: Engine,
        template: String,
        message: String,
    },

    /// The sandbox instruction budget was exhausted
    #[error("{engine} template {template} exceeded the step limit of {limit}")]
    ResourceExhausted {
        engine: Engine,
        template: String,
        limit: u64,
    },

    /// Script does not define a `main` entry point
    #[error("{engine} template {template} does not define a main function")]
    MissingMain { engine: Engine, template: String },

    /// Script binds `main` to something that cannot be called
    #[error("{engine} template {template}: main must be a function, found {found}")]
    MainNotCallable {
        engine: Engine,
        template: String,
        found: String,
    },

    /// Script returned something other than a mapping or a list of mappings
    #[error(
        "{engine} template {template}: main must return a table or a list of tables, found {found}"
    )]
    InvalidReturnType {
        engine: Engine,
        template: String,
        found: String,
    },

    /// Rendered text is not valid pipeline YAML
    #[error("unable to unmarshal pipeline: {0}")]
    Unmarshal(#[from] serde_yaml::Error),

    /// The document violates a field constraint
    #[error("invalid pipeline: {0}")]
    Validation(String),

    /// An environment merge was attempted with no environment
    #[error("empty environment provided for {kind} {name}")]
    EmptyEnvironment { kind: &'static str, name: String },

    /// The sandbox step limit is negative
    #[error("invalid step limit {0}: must be greater than or equal to zero")]
    InvalidStepLimit(i64),

    /// Invalid compiler configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A document-level failure raised while rendering a template
    #[error("{engine} template {template}: {source}")]
    Render {
        engine: Engine,
        template: String,
        #[source]
        source: Box<Error>,
    },
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Execution,
    ResourceExhausted,
    Structural,
    Unmarshal,
    Validation,
    Config,
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Attach template context to a document-level error
    pub fn in_template(self, engine: Engine, template: impl Into<String>) -> Self {
        match self {
            Self::Unmarshal(_) | Self::Validation(_) => Self::Render {
                engine,
                template: template.into(),
                source: Box::new(self),
            },
            other => other,
        }
    }

    /// Classify this error, looking through template context
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            Self::MissingMain { .. }
            | Self::MainNotCallable { .. }
            | Self::InvalidReturnType { .. } => ErrorKind::Structural,
            Self::Unmarshal(_) => ErrorKind::Unmarshal,
            Self::Validation(_) | Self::EmptyEnvironment { .. } => ErrorKind::Validation,
            Self::InvalidStepLimit(_) | Self::Config(_) => ErrorKind::Config,
            Self::Render { source, .. } => source.kind(),
        }
    }

    /// Check if this error reports an exhausted step limit
    pub fn is_resource_exhausted(&self) -> bool {
        self.kind() == ErrorKind::ResourceExhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_context_keeps_kind() {
        let err = Error::validation("duplicate step name build")
            .in_template(Engine::Native, "golang");

        assert_eq!(err.kind(), ErrorKind::Validation);
        let message = err.to_string();
        assert!(message.contains("native template golang"));
        assert!(message.contains("duplicate step name build"));
    }

    #[test]
    fn test_in_template_leaves_engine_errors_alone() {
        let err = Error::MissingMain {
            engine: Engine::Sandboxed,
            template: "lua".to_string(),
        }
        .in_template(Engine::Sandboxed, "other");

        assert!(matches!(err, Error::MissingMain { ref template, .. } if template == "lua"));
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_resource_exhausted_kind() {
        let err = Error::ResourceExhausted {
            engine: Engine::Sandboxed,
            template: "loop".to_string(),
            limit: 10,
        };

        assert!(err.is_resource_exhausted());
        assert!(err.to_string().contains("step limit of 10"));
    }
}
