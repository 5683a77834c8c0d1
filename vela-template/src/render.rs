//! Native template rendering
//!
//! Templates are handlebars text producing pipeline YAML. Template variables
//! are the render data; platform variables are only reachable through the
//! `vela` helper.

use std::collections::HashMap;
use tracing::debug;

use vela_core::platform::PlatformVars;
use vela_core::{Engine, Error, Rendered, Result, Variables, parse_pipeline};

use crate::helpers;

const ENGINE: Engine = Engine::Native;

/// Render a step template, prefixing every produced step with `display_name`
pub fn render(
    body: &str,
    step_name: &str,
    display_name: &str,
    env: &HashMap<String, String>,
    vars: &Variables,
) -> Result<Rendered> {
    debug!(step = step_name, template = display_name, "Rendering native step template");

    let mut rendered = execute(display_name, body, env, vars)?;
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
) -> Result<Rendered> {
    debug!(template = name, "Rendering native pipeline template");

    let rendered = execute(name, body, env, vars)?;
    rendered
        .build
        .validate()
        .map_err(|e| e.in_template(ENGINE, name))?;

    Ok(rendered)
}

/// Render the template text without decoding it
pub fn render_text(
    name: &str,
    body: &str,
    env: &HashMap<String, String>,
    vars: &Variables,
) -> Result<String> {
    let platform = PlatformVars::new(env, name);
    let mut registry = helpers::registry(platform.flatten());

    registry
        .register_template_string(name, body)
        .map_err(|e| Error::Parse {
            engine: ENGINE,
            template: name.to_string(),
            message: e.to_string(),
        })?;

    registry.render(name, vars).map_err(|e| Error::Execution {
        engine: ENGINE,
        template: name.to_string(),
        message: e.to_string(),
    })
}

fn execute(
    name: &str,
    body: &str,
    env: &HashMap<String, String>,
    vars: &Variables,
) -> Result<Rendered> {
    let text = render_text(name, body, env, vars)?;
    debug!(template = name, bytes = text.len(), "Native template executed");

    parse_pipeline(&text).map_err(|e| e.in_template(ENGINE, name))
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

    const STEPS: &str = r#"
metadata:
  template: true

steps:
  - name: install
    commands:
      - go get ./...
    image: {{ image }}
    pull: always
    ruleset:
      event: [ push, pull_request ]

  - name: test
    commands:
      - go test ./...
    image: {{ image }}
    pull: always
    ruleset:
      event: [ push, pull_request ]
"#;

    #[test]
    fn test_render_prefixes_steps() {
        let rendered = render(
            STEPS,
            "sample",
            "foo",
            &HashMap::new(),
            &vars(json!({"image": "golang:latest"})),
        )
        .unwrap();

        let names: Vec<&str> = rendered.build.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["foo_install", "foo_test"]);
        assert_eq!(rendered.build.steps[0].image, "golang:latest");
        assert!(rendered.build.metadata.template);
        assert_eq!(
            rendered.build.steps[0].ruleset.if_.event,
            vec![
                "push",
                "pull_request:opened",
                "pull_request:synchronize",
                "pull_request:reopened"
            ]
        );
        assert_eq!(rendered.warnings.len(), 2);
    }

    #[test]
    fn test_render_build_keeps_names() {
        let rendered = render_build(
            "build",
            STEPS,
            &HashMap::new(),
            &vars(json!({"image": "golang:latest"})),
        )
        .unwrap();

        let names: Vec<&str> = rendered.build.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["install", "test"]);
    }

    #[test]
    fn test_rendering_is_repeatable() {
        let vars = vars(json!({"image": "golang:latest"}));
        let first = render_build("build", STEPS, &HashMap::new(), &vars).unwrap();
        let second = render_build("build", STEPS, &HashMap::new(), &vars).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_plain_body_matches_direct_parse() {
        let body = r#"
version: "1"
steps:
  - name: test
    image: golang:1.22
    pull: not_present
    commands:
      - go test ./...
    ruleset:
      branch: main
      event: [ push, pull_request ]
"#;
        let rendered = render_build("plain", body, &HashMap::new(), &Variables::new()).unwrap();

        let direct = parse_pipeline(body).unwrap();
        direct.build.validate().unwrap();
        assert_eq!(rendered, direct);
    }

    #[test]
    fn test_oversized_repeat_is_execution_error() {
        let body = "steps:\n  - name: a\n    image: \"{{repeat 18446744073709551615 \"ab\"}}\"\n";
        let err = render_build("greedy", body, &HashMap::new(), &Variables::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("greedy"));
    }

    #[test]
    fn test_platform_variables() {
        let mut env = HashMap::new();
        env.insert("VELA_REPO_FULL_NAME".to_string(), "go-vela/hello".to_string());
        env.insert("DEPLOYMENT_PARAMETER_REGION".to_string(), "us-east-1".to_string());
        env.insert("VELA_WORKSPACE".to_string(), "/vela/src".to_string());

        let body = r#"
steps:
  - name: echo
    image: alpine
    commands:
      - echo {{vela "repo_full_name"}}
      - echo {{vela "VELA_DEPLOYMENT_PARAMETER_REGION"}}
      - echo {{vela "workspace"}}
      - echo {{vela "template_name"}}
      - echo [{{vela "build_missing"}}]
"#;
        let rendered = render_build("deploy", body, &env, &Variables::new()).unwrap();

        assert_eq!(
            rendered.build.steps[0].commands,
            vec![
                "echo go-vela/hello",
                "echo us-east-1",
                "echo /vela/src",
                "echo deploy",
                "echo []"
            ]
        );
    }

    #[test]
    fn test_environment_access_fails() {
        let body = "steps:\n  - name: a\n    image: {{env \"HOME\"}}\n";
        let err = render_build("sneaky", body, &HashMap::new(), &Variables::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("sneaky"));
    }

    #[test]
    fn test_syntax_error() {
        let err = render_build(
            "broken",
            "steps: {{#each items}}",
            &HashMap::new(),
            &Variables::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_undefined_variable() {
        let err = render_build("strict", STEPS, &HashMap::new(), &Variables::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_invalid_output() {
        let err = render_build(
            "bad",
            "steps: [{{ image }}",
            &HashMap::new(),
            &vars(json!({"image": "alpine"})),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unmarshal);
        assert!(err.to_string().contains("native template bad"));
    }

    #[test]
    fn test_stages_and_loops() {
        let body = r#"
stages:
{{#each services}}
  {{this}}:
    steps:
      - name: build
        image: golang
        commands:
          - go build ./cmd/{{this}}
{{/each}}
"#;
        let rendered = render_build(
            "mono",
            body,
            &HashMap::new(),
            &vars(json!({"services": ["api", "worker"]})),
        )
        .unwrap();

        let stages: Vec<&str> = rendered.build.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(stages, vec!["api", "worker"]);
        assert_eq!(rendered.build.stages[1].needs, vec!["clone"]);
        assert_eq!(
            rendered.build.stages[1].steps[0].commands,
            vec!["go build ./cmd/worker"]
        );
    }

    #[test]
    fn test_both_steps_and_stages_rejected() {
        let body = r#"
steps:
  - name: a
    image: alpine
stages:
  test:
    steps:
      - name: b
        image: alpine
"#;
        let err = render_build("mixed", body, &HashMap::new(), &Variables::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
