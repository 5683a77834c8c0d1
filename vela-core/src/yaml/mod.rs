//! YAML pipeline document types
//!
//! These types are what users write and what templates render. Decoding
//! applies the structural normalizers (pull defaults, stage dependencies,
//! volume shorthand, ruleset merging) so a decoded [`Build`] is always in
//! canonical YAML form.

pub mod build;
pub mod ruleset;
pub mod secret;
pub mod service;
pub mod stage;
pub mod step;
pub mod template;
pub mod ulimit;
pub mod volume;

pub use build::{Build, CancelOptions, Git, Metadata, Token, Worker};
pub use ruleset::{Rules, Ruleset};
pub use secret::{Origin, Secret};
pub use service::Service;
pub use stage::Stage;
pub use step::{Step, StepSecret, StepTemplate};
pub use template::Template;
pub use ulimit::Ulimit;
pub use volume::Volume;
