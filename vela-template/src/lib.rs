//! Vela native templates
//!
//! Handlebars templates that expand into pipeline YAML, rendered with a
//! fixed set of pure helpers and strict variable checking.

pub mod helpers;
pub mod render;

pub use helpers::{ALLOWED_HELPERS, MAX_HELPER_OUTPUT, VelaHelper};
pub use render::{render, render_build, render_text};
