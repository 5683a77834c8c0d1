//! Vela Lua templates
//!
//! Renders pipeline templates written in Lua inside a restricted sandbox.
//! It includes:
//! - Sandbox creation and the instruction budget
//! - Module trait and registry, with the `log` module
//! - Conversion of template variables into Lua values
//! - Conversion of `main`'s return value into pipeline documents
//! - Stub generation for local development

pub mod bridge;
pub mod module;
pub mod modules;
pub mod render;
pub mod sandbox;
pub mod writer;

pub use module::{ModuleMetadata, ModuleRegistry, VelaModule};
pub use modules::{LogLevel, LogModule, LogSink, NullSink, RenderSink};
pub use render::{
    Limits, render, render_build, render_build_with_limits, render_with_limits,
};
pub use sandbox::{InstructionBudget, create_sandbox};
pub use writer::PipelineFragment;

/// Registry of every module a template can use, for stub generation
pub fn stub_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(LogModule::new(NullSink));
    registry
}

/// LuaLS annotations for the `main(ctx)` entry point
pub fn context_stubs() -> String {
    r#"---@meta

---Platform variables, grouped by namespace
---@class VelaNamespaces
---@field build table<string, string> VELA_BUILD_* variables
---@field repo table<string, string> VELA_REPO_* variables
---@field user table<string, string> VELA_USER_* variables
---@field deployment table<string, string> DEPLOYMENT_PARAMETER_* variables
---@field system table<string, string> other VELA_* variables and template_name

---Argument passed to main
---@class Context
---@field vela VelaNamespaces
---@field vars table<string, any> template variables

---Template entry point, returns a pipeline table or a list of them
---@param ctx Context
---@return table
function main(ctx) end
"#
    .to_string()
}
