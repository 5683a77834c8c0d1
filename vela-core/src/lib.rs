//! Vela Core
//!
//! Pipeline types and structural normalizers shared by the template engines.
//!
//! This crate contains:
//! - YAML types: the pipeline document as written and rendered, with the
//!   normalizers applied while decoding
//! - Pipeline types: the canonical form handed to the execution layer
//! - Platform variables: the `vela` namespaces exposed to templates

pub mod constants;
pub mod engine;
pub mod env;
pub mod error;
pub mod parse;
pub mod pipeline;
pub mod platform;
pub mod raw;
pub mod yaml;

pub use engine::Engine;
pub use env::MergeEnv;
pub use error::{Error, ErrorKind, Result};
pub use parse::{Parsed, parse_pipeline};
pub use platform::{FlatPlatformVars, PlatformVars};
pub use raw::Environment;

/// Template variables supplied by the caller
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// Output of a template render: the pipeline plus any warnings
pub type Rendered = Parsed;
