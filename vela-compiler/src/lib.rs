//! Vela Compiler
//!
//! Single entry point over both template engines. Callers pick an engine,
//! hand over the template body with the platform variables and template
//! variables, and get back a validated pipeline plus warnings.

pub mod config;

use std::collections::HashMap;
use tracing::info;

use vela_core::{Engine, Error, Rendered, Result, Variables, pipeline};

pub use config::CompilerConfig;

/// Template name used when a whole pipeline is rendered without one
pub const PIPELINE_TEMPLATE_NAME: &str = "pipeline";

/// Render a step template with the chosen engine
///
/// Produced step names are prefixed with `display_name`. `step_limit` is
/// required for the sandboxed engine and ignored by the native one.
pub fn render_step_template(
    engine: Engine,
    body: &str,
    step_name: &str,
    display_name: &str,
    env: &HashMap<String, String>,
    vars: &Variables,
    step_limit: Option<i64>,
) -> Result<Rendered> {
    match engine {
        Engine::Native => vela_template::render(body, step_name, display_name, env, vars),
        Engine::Sandboxed => {
            let limit = require_limit(step_limit)?;
            vela_lua::render(body, step_name, display_name, env, vars, limit)
        }
    }
}

/// Render a template that produces a whole pipeline
pub fn render_full_pipeline_template(
    engine: Engine,
    body: &str,
    env: &HashMap<String, String>,
    vars: &Variables,
    step_limit: Option<i64>,
) -> Result<Rendered> {
    match engine {
        Engine::Native => vela_template::render_build(PIPELINE_TEMPLATE_NAME, body, env, vars),
        Engine::Sandboxed => {
            let limit = require_limit(step_limit)?;
            vela_lua::render_build(PIPELINE_TEMPLATE_NAME, body, env, vars, limit)
        }
    }
}

fn require_limit(step_limit: Option<i64>) -> Result<i64> {
    step_limit.ok_or_else(|| {
        Error::Config("a step limit is required for the sandboxed engine".to_string())
    })
}

/// A rendered pipeline in canonical form
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub pipeline: pipeline::Build,
    pub warnings: Vec<String>,
}

/// Compiler bound to a configuration
#[derive(Debug, Clone)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    fn limits(&self) -> vela_lua::Limits {
        vela_lua::Limits {
            steps: self.config.script_exec_limit,
            memory: self.config.script_memory_limit,
        }
    }

    /// Render a step template; `engine` falls back to the configured default
    pub fn render_step(
        &self,
        engine: Option<Engine>,
        body: &str,
        step_name: &str,
        display_name: &str,
        env: &HashMap<String, String>,
        vars: &Variables,
    ) -> Result<Rendered> {
        match engine.unwrap_or(self.config.default_engine) {
            Engine::Native => vela_template::render(body, step_name, display_name, env, vars),
            Engine::Sandboxed => vela_lua::render_with_limits(
                body,
                step_name,
                display_name,
                env,
                vars,
                self.limits(),
            ),
        }
    }

    /// Render a whole-pipeline template
    pub fn render_pipeline(
        &self,
        engine: Option<Engine>,
        name: &str,
        body: &str,
        env: &HashMap<String, String>,
        vars: &Variables,
    ) -> Result<Rendered> {
        match engine.unwrap_or(self.config.default_engine) {
            Engine::Native => vela_template::render_build(name, body, env, vars),
            Engine::Sandboxed => {
                vela_lua::render_build_with_limits(name, body, env, vars, self.limits())
            }
        }
    }

    /// Render a whole-pipeline template and convert it to canonical form
    pub fn compile(
        &self,
        engine: Option<Engine>,
        name: &str,
        body: &str,
        env: &HashMap<String, String>,
        vars: &Variables,
    ) -> Result<Compiled> {
        let rendered = self.render_pipeline(engine, name, body, env, vars)?;
        let pipeline = rendered.build.to_pipeline();

        info!(
            template = name,
            steps = pipeline.steps.len(),
            stages = pipeline.stages.len(),
            warnings = rendered.warnings.len(),
            "Compiled pipeline"
        );

        Ok(Compiled {
            pipeline,
            warnings: rendered.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vela_core::ErrorKind;

    fn vars(value: serde_json::Value) -> Variables {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("vars must be an object"),
        }
    }

    const NATIVE: &str = r#"
steps:
  - name: install
    image: {{ image }}
  - name: test
    image: {{ image }}
"#;

    const LUA: &str = r#"
function main(ctx)
  return {
    steps = {
      { name = "install", image = ctx.vars.image },
      { name = "test", image = ctx.vars.image },
    },
  }
end
"#;

    #[test]
    fn test_engines_agree() {
        let vars = vars(json!({"image": "golang"}));
        let env = HashMap::new();

        let native =
            render_step_template(Engine::Native, NATIVE, "sample", "foo", &env, &vars, None)
                .unwrap();
        let lua = render_step_template(
            Engine::Sandboxed,
            LUA,
            "sample",
            "foo",
            &env,
            &vars,
            Some(7500),
        )
        .unwrap();

        assert_eq!(native.build.steps, lua.build.steps);
        assert_eq!(native.build.steps[0].name, "foo_install");
    }

    #[test]
    fn test_full_pipeline_is_not_prefixed() {
        let vars = vars(json!({"image": "golang"}));
        let rendered = render_full_pipeline_template(
            Engine::Sandboxed,
            LUA,
            &HashMap::new(),
            &vars,
            Some(7500),
        )
        .unwrap();

        assert_eq!(rendered.build.steps[1].name, "test");
    }

    #[test]
    fn test_sandboxed_requires_limit() {
        let err = render_full_pipeline_template(
            Engine::Sandboxed,
            LUA,
            &HashMap::new(),
            &Variables::new(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = render_full_pipeline_template(
            Engine::Sandboxed,
            LUA,
            &HashMap::new(),
            &Variables::new(),
            Some(-5),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidStepLimit(-5)));
    }

    #[test]
    fn test_compiler_uses_configured_limit() {
        let spin = "function main(ctx) while true do end end";

        let compiler = Compiler::new(CompilerConfig::default()).unwrap();
        let err = compiler
            .render_pipeline(Some(Engine::Sandboxed), "spin", spin, &HashMap::new(), &Variables::new())
            .unwrap_err();
        assert!(err.is_resource_exhausted());
        match err {
            Error::ResourceExhausted { limit, .. } => assert_eq!(limit, 7500),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_compiler_default_engine() {
        let compiler =
            Compiler::new(CompilerConfig::default().with_engine(Engine::Sandboxed)).unwrap();
        let compiled = compiler
            .compile(
                None,
                "build",
                LUA,
                &HashMap::new(),
                &vars(json!({"image": "golang"})),
            )
            .unwrap();

        assert_eq!(compiled.pipeline.steps[0].id, "step_1_install");
        assert_eq!(compiled.pipeline.steps[0].pull, "not_present");
        assert!(compiled.warnings.is_empty());
    }

    #[test]
    fn test_compiler_rejects_invalid_config() {
        let err = Compiler::new(CompilerConfig::default().with_script_exec_limit(-1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
