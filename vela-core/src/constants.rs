//! Values shared across the YAML and canonical pipeline types

/// Schema version assumed when a document omits `version`
pub const DEFAULT_VERSION: &str = "1";

// Image pull policies
pub const PULL_ALWAYS: &str = "always";
pub const PULL_NOT_PRESENT: &str = "not_present";
pub const PULL_ON_START: &str = "on_start";
pub const PULL_NEVER: &str = "never";

pub const PULL_POLICIES: [&str; 4] = [PULL_ALWAYS, PULL_NOT_PRESENT, PULL_ON_START, PULL_NEVER];

// Ruleset matchers and operators
pub const MATCHER_FILEPATH: &str = "filepath";
pub const MATCHER_REGEX: &str = "regexp";
pub const OPERATOR_AND: &str = "and";
pub const OPERATOR_OR: &str = "or";

// Events and their legacy expansions
pub const EVENT_PULL: &str = "pull_request";
pub const EVENT_PULL_OPENED: &str = "pull_request:opened";
pub const EVENT_PULL_SYNCHRONIZE: &str = "pull_request:synchronize";
pub const EVENT_PULL_REOPENED: &str = "pull_request:reopened";
pub const EVENT_DEPLOY: &str = "deployment";
pub const EVENT_DEPLOY_CREATED: &str = "deployment:created";
pub const EVENT_COMMENT: &str = "comment";
pub const EVENT_COMMENT_CREATED: &str = "comment:created";
pub const EVENT_COMMENT_EDITED: &str = "comment:edited";

// Secrets
pub const SECRET_ENGINE_NATIVE: &str = "native";
pub const SECRET_TYPE_REPO: &str = "repo";
pub const SECRET_PULL_BUILD: &str = "build_start";
pub const SECRET_PULL_STEP: &str = "step_start";

// Volumes
pub const ACCESS_MODE_READ_ONLY: &str = "ro";

// Stages that never depend on the clone stage
pub const STAGE_CLONE: &str = "clone";
pub const STAGE_INIT: &str = "init";

/// Template format assumed when a template reference omits `format`
pub const TEMPLATE_FORMAT_DEFAULT: &str = "handlebars";
