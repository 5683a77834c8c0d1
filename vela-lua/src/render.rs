//! Lua template rendering
//!
//! A template is a Lua chunk defining `main(ctx)`. `ctx.vela` carries the
//! platform variables by namespace and `ctx.vars` the template variables.
//! Whatever `main` returns is written out as pipeline documents and decoded.

use mlua::{Function, Lua, Table, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use vela_core::platform::PlatformVars;
use vela_core::{Engine, Error, Rendered, Result, Variables, parse_pipeline};

use crate::bridge;
use crate::module::VelaModule;
use crate::modules::{LogModule, RenderSink};
use crate::sandbox::{InstructionBudget, create_sandbox};
use crate::writer::PipelineFragment;

const ENGINE: Engine = Engine::Sandboxed;

/// Resource limits for one render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of VM instructions, must not be negative
    pub steps: i64,
    /// Optional cap on Lua allocations in bytes
    pub memory: Option<usize>,
}

impl Limits {
    pub fn steps(steps: i64) -> Self {
        Self {
            steps,
            memory: None,
        }
    }
}

/// Render a step template, prefixing every produced step with `display_name`
pub fn render(
    body: &str,
    step_name: &str,
    display_name: &str,
    env: &HashMap<String, String>,
    vars: &Variables,
    step_limit: i64,
) -> Result<Rendered> {
    render_with_limits(
        body,
        step_name,
        display_name,
        env,
        vars,
        Limits::steps(step_limit),
    )
}

pub fn render_with_limits(
    body: &str,
    step_name: &str,
    display_name: &str,
    env: &HashMap<String, String>,
    vars: &Variables,
    limits: Limits,
) -> Result<Rendered> {
    debug!(step = step_name, template = display_name, "Rendering Lua step template");

    let mut rendered = execute(display_name, body, env, vars, limits)?;
    rendered.build.prefix_steps(display_name);
    rendered
        .build
        .validate()
        .map_err(|e| e.in_template(ENGINE, display_name))?;

    Ok(rendered)
}

/// Render a whole pipeline; step names are left untouched
pub fn render_build(
    name: &str,
    body: &str,
    env: &HashMap<String, String>,
    vars: &Variables,
    step_limit: i64,
) -> Result<Rendered> {
    render_build_with_limits(name, body, env, vars, Limits::steps(step_limit))
}

pub fn render_build_with_limits(
    name: &str,
    body: &str,
    env: &HashMap<String, String>,
    vars: &Variables,
    limits: Limits,
) -> Result<Rendered> {
    debug!(template = name, "Rendering Lua pipeline template");

    let rendered = execute(name, body, env, vars, limits)?;
    rendered
        .build
        .validate()
        .map_err(|e| e.in_template(ENGINE, name))?;

    Ok(rendered)
}

fn execute(
    name: &str,
    body: &str,
    env: &HashMap<String, String>,
    vars: &Variables,
    limits: Limits,
) -> Result<Rendered> {
    if limits.steps < 0 {
        return Err(Error::InvalidStepLimit(limits.steps));
    }

    let run = Run {
        name,
        budget: InstructionBudget::new(limits.steps as u64),
    };

    let lua = create_sandbox(limits.memory).map_err(|e| run.fail(e))?;
    let log = LogModule::new(RenderSink::new(name));
    log.register(&lua).map_err(|e| run.fail(e))?;

    let chunk = lua
        .load(body)
        .set_name(format!("={}", name))
        .into_function()
        .map_err(|e| Error::Parse {
            engine: ENGINE,
            template: name.to_string(),
            message: e.to_string(),
        })?;
    run.budget
        .call::<()>(&lua, chunk, ())
        .map_err(|e| run.fail(e))?;

    let main = match lua.globals().raw_get::<Value>("main") {
        Ok(Value::Function(main)) => main,
        Ok(Value::Nil) => {
            return Err(Error::MissingMain {
                engine: ENGINE,
                template: name.to_string(),
            });
        }
        Ok(other) => {
            return Err(Error::MainNotCallable {
                engine: ENGINE,
                template: name.to_string(),
                found: other.type_name().to_string(),
            });
        }
        Err(e) => return Err(run.fail(e)),
    };

    let platform = PlatformVars::new(env, name);
    let ctx = context(&lua, &platform, vars).map_err(|e| run.fail(e))?;
    let result = call_main(&run, &lua, main, ctx)?;

    let fragment = PipelineFragment::classify(result).map_err(|found| Error::InvalidReturnType {
        engine: ENGINE,
        template: name.to_string(),
        found: found.to_string(),
    })?;
    let documents = fragment.to_documents().map_err(|e| run.fail(e))?;

    debug!(
        template = name,
        documents = fragment.tables().len(),
        steps_used = run.budget.used(),
        "Lua template executed"
    );

    let mut warnings = run.take_warnings(&log.sink())?;

    let mut rendered = parse_pipeline(&documents).map_err(|e| e.in_template(ENGINE, name))?;
    warnings.append(&mut rendered.warnings);
    rendered.warnings = warnings;

    Ok(rendered)
}

struct Run<'a> {
    name: &'a str,
    budget: InstructionBudget,
}

impl Run<'_> {
    /// Classify a Lua failure, telling budget exhaustion apart from script errors
    fn fail(&self, err: mlua::Error) -> Error {
        if self.budget.is_exhausted() {
            Error::ResourceExhausted {
                engine: ENGINE,
                template: self.name.to_string(),
                limit: self.budget.limit(),
            }
        } else {
            Error::Execution {
                engine: ENGINE,
                template: self.name.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl Run<'_> {
    /// Drain `log.warning` messages collected during the run
    fn take_warnings(&self, sink: &Mutex<RenderSink>) -> Result<Vec<String>> {
        let mut sink = sink.lock().map_err(|_| Error::Execution {
            engine: ENGINE,
            template: self.name.to_string(),
            message: "log sink was poisoned; warnings are unavailable".to_string(),
        })?;
        Ok(sink.take_warnings())
    }
}

fn call_main(run: &Run<'_>, lua: &Lua, main: Function, ctx: Table) -> Result<Value> {
    run.budget
        .call::<Value>(lua, main, ctx)
        .map_err(|e| run.fail(e))
}

/// Build the `ctx` table passed to `main`
fn context(lua: &Lua, platform: &PlatformVars, vars: &Variables) -> mlua::Result<Table> {
    let vela = lua.create_table()?;
    for (namespace, values) in platform.namespaces() {
        vela.raw_set(namespace, bridge::strings_to_table(lua, values)?)?;
    }

    let ctx = lua.create_table()?;
    ctx.raw_set("vela", vela)?;
    ctx.raw_set("vars", bridge::map_to_table(lua, vars)?)?;
    Ok(ctx)
}
