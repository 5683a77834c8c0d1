//! Helpers available to native templates
//!
//! Every render builds its own registry from the lists below. Only pure
//! helpers are registered: nothing here can read the process environment or
//! the filesystem, so a template like `{{env "HOME"}}` fails to render.

use handlebars::{
    Context, Handlebars, Helper, HelperDef, JsonValue as Json, RenderContext, RenderError,
    ScopedJson, handlebars_helper, no_escape,
};
use vela_core::FlatPlatformVars;

/// Upper bound on text produced by a single `repeat`, `indent` or `nindent`
pub const MAX_HELPER_OUTPUT: usize = 1 << 20;

/// Helpers registered on top of the handlebars builtins, `vela` included
pub const ALLOWED_HELPERS: [&str; 32] = [
    // platform
    "vela",
    // strings
    "upper",
    "lower",
    "title",
    "trim",
    "trim_prefix",
    "trim_suffix",
    "replace",
    "contains",
    "has_prefix",
    "has_suffix",
    "split",
    "join",
    "quote",
    "squote",
    "repeat",
    "indent",
    "nindent",
    "default",
    // math
    "add",
    "sub",
    "mul",
    "div",
    "mod",
    "max",
    "min",
    // collections
    "list",
    "first",
    "last",
    "keys",
    // serialization
    "to_json",
    "to_yaml",
];

handlebars_helper!(upper: |s: str| s.to_uppercase());
handlebars_helper!(lower: |s: str| s.to_lowercase());
handlebars_helper!(title: |s: str| title_case(s));
handlebars_helper!(trim: |s: str| s.trim());
handlebars_helper!(trim_prefix: |prefix: str, s: str| s.strip_prefix(prefix).unwrap_or(s));
handlebars_helper!(trim_suffix: |suffix: str, s: str| s.strip_suffix(suffix).unwrap_or(s));
handlebars_helper!(replace: |old: str, new: str, s: str| s.replace(old, new));
handlebars_helper!(contains: |needle: str, s: str| s.contains(needle));
handlebars_helper!(has_prefix: |prefix: str, s: str| s.starts_with(prefix));
handlebars_helper!(has_suffix: |suffix: str, s: str| s.ends_with(suffix));
handlebars_helper!(split: |sep: str, s: str| s.split(sep).collect::<Vec<&str>>());
handlebars_helper!(join: |sep: str, items: array| items.iter().map(plain).collect::<Vec<String>>().join(sep));
handlebars_helper!(quote: |value: Json| format!("{:?}", plain(value)));
handlebars_helper!(squote: |value: Json| format!("'{}'", plain(value)));
handlebars_helper!(repeat: |count: u64, s: str| repeat_text("repeat", count, s)?);
handlebars_helper!(indent: |spaces: u64, s: str| indent_lines("indent", spaces, s)?);
handlebars_helper!(nindent: |spaces: u64, s: str| format!("\n{}", indent_lines("nindent", spaces, s)?));
handlebars_helper!(or_default: |fallback: Json, value: Json| {
    if is_blank(value) { fallback.clone() } else { value.clone() }
});

handlebars_helper!(add: |a: i64, b: i64| a.wrapping_add(b));
handlebars_helper!(sub: |a: i64, b: i64| a.wrapping_sub(b));
handlebars_helper!(mul: |a: i64, b: i64| a.wrapping_mul(b));
handlebars_helper!(div: |a: i64, b: i64| a.checked_div(b).map(Json::from).unwrap_or(Json::Null));
handlebars_helper!(modulo: |a: i64, b: i64| a.checked_rem(b).map(Json::from).unwrap_or(Json::Null));
handlebars_helper!(max: |a: i64, b: i64| a.max(b));
handlebars_helper!(min: |a: i64, b: i64| a.min(b));

handlebars_helper!(list: |*args| args.into_iter().cloned().collect::<Vec<Json>>());
handlebars_helper!(first: |items: array| items.first().cloned().unwrap_or(Json::Null));
handlebars_helper!(last: |items: array| items.last().cloned().unwrap_or(Json::Null));
handlebars_helper!(keys: |map: object| map.keys().cloned().collect::<Vec<String>>());

handlebars_helper!(to_json: |value: Json| value.to_string());
handlebars_helper!(to_yaml: |value: Json| serde_yaml::to_string(value).unwrap_or_default().trim_end().to_string());

/// `{{vela "build_number"}}` looks up a platform variable
///
/// The key is matched case-insensitively with an optional `vela_` prefix.
/// Unknown keys render as an empty string.
pub struct VelaHelper {
    vars: FlatPlatformVars,
}

impl VelaHelper {
    pub fn new(vars: FlatPlatformVars) -> Self {
        Self { vars }
    }
}

impl HelperDef for VelaHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'reg, 'rc>, RenderError> {
        let key = h
            .param(0)
            .and_then(|param| param.value().as_str())
            .ok_or_else(|| RenderError::new("vela helper expects a variable name"))?;

        Ok(ScopedJson::Derived(Json::String(
            self.vars.lookup(key).to_string(),
        )))
    }
}

/// Build the registry for one render
pub fn registry<'reg>(vars: FlatPlatformVars) -> Handlebars<'reg> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(no_escape);

    registry.register_helper("vela", Box::new(VelaHelper::new(vars)));

    registry.register_helper("upper", Box::new(upper));
    registry.register_helper("lower", Box::new(lower));
    registry.register_helper("title", Box::new(title));
    registry.register_helper("trim", Box::new(trim));
    registry.register_helper("trim_prefix", Box::new(trim_prefix));
    registry.register_helper("trim_suffix", Box::new(trim_suffix));
    registry.register_helper("replace", Box::new(replace));
    registry.register_helper("contains", Box::new(contains));
    registry.register_helper("has_prefix", Box::new(has_prefix));
    registry.register_helper("has_suffix", Box::new(has_suffix));
    registry.register_helper("split", Box::new(split));
    registry.register_helper("join", Box::new(join));
    registry.register_helper("quote", Box::new(quote));
    registry.register_helper("squote", Box::new(squote));
    registry.register_helper("repeat", Box::new(repeat));
    registry.register_helper("indent", Box::new(indent));
    registry.register_helper("nindent", Box::new(nindent));
    registry.register_helper("default", Box::new(or_default));

    registry.register_helper("add", Box::new(add));
    registry.register_helper("sub", Box::new(sub));
    registry.register_helper("mul", Box::new(mul));
    registry.register_helper("div", Box::new(div));
    registry.register_helper("mod", Box::new(modulo));
    registry.register_helper("max", Box::new(max));
    registry.register_helper("min", Box::new(min));

    registry.register_helper("list", Box::new(list));
    registry.register_helper("first", Box::new(first));
    registry.register_helper("last", Box::new(last));
    registry.register_helper("keys", Box::new(keys));

    registry.register_helper("to_json", Box::new(to_json));
    registry.register_helper("to_yaml", Box::new(to_yaml));

    registry
}

/// Render a value the way it appears in text: strings without quotes
fn plain(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_blank(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::Bool(b) => !b,
        Json::String(s) => s.is_empty(),
        Json::Array(items) => items.is_empty(),
        Json::Object(map) => map.is_empty(),
        Json::Number(_) => false,
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(head) => head.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Size `count` copies of `unit` bytes, failing past [`MAX_HELPER_OUTPUT`]
fn bounded_len(helper: &str, count: u64, unit: usize) -> Result<usize, RenderError> {
    usize::try_from(count)
        .ok()
        .and_then(|count| count.checked_mul(unit))
        .filter(|len| *len <= MAX_HELPER_OUTPUT)
        .ok_or_else(|| {
            RenderError::new(format!(
                "`{}` helper: output exceeds {} bytes",
                helper, MAX_HELPER_OUTPUT
            ))
        })
}

fn repeat_text(helper: &str, count: u64, s: &str) -> Result<String, RenderError> {
    bounded_len(helper, count, s.len())?;
    Ok(s.repeat(count as usize))
}

fn indent_lines(helper: &str, spaces: u64, s: &str) -> Result<String, RenderError> {
    let lines = s.lines().count().max(1);
    let padding = bounded_len(helper, spaces, lines)?;
    if padding.saturating_add(s.len()) > MAX_HELPER_OUTPUT {
        return Err(RenderError::new(format!(
            "`{}` helper: output exceeds {} bytes",
            helper, MAX_HELPER_OUTPUT
        )));
    }

    let pad = " ".repeat(spaces as usize);
    Ok(s.lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<String>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use vela_core::PlatformVars;

    fn render(template: &str, data: &Json) -> Result<String, String> {
        let mut env = HashMap::new();
        env.insert("VELA_BUILD_NUMBER".to_string(), "42".to_string());
        let registry = registry(PlatformVars::new(&env, "sample").flatten());
        registry
            .render_template(template, data)
            .map_err(|e| e.to_string())
    }

    #[test]
    fn test_every_allowed_helper_renders() {
        let data = json!({
            "name": "  hello world  ",
            "image": "golang:1.22",
            "tags": ["a", "b"],
            "map": {"x": 1, "y": 2},
            "empty": "",
            "script": "echo a\necho b",
        });

        let cases = [
            ("{{vela \"BUILD_NUMBER\"}}", "42"),
            ("{{upper image}}", "GOLANG:1.22"),
            ("{{lower \"ABC\"}}", "abc"),
            ("{{title \"hello world\"}}", "Hello World"),
            ("{{trim name}}", "hello world"),
            ("{{trim_prefix \"golang:\" image}}", "1.22"),
            ("{{trim_suffix \":1.22\" image}}", "golang"),
            ("{{replace \":\" \"@\" image}}", "golang@1.22"),
            ("{{contains \"lang\" image}}", "true"),
            ("{{has_prefix \"go\" image}}", "true"),
            ("{{has_suffix \"go\" image}}", "false"),
            ("{{join \",\" (split \":\" image)}}", "golang,1.22"),
            ("{{join \" \" tags}}", "a b"),
            ("{{quote image}}", "\"golang:1.22\""),
            ("{{squote image}}", "'golang:1.22'"),
            ("{{repeat 3 \"ab\"}}", "ababab"),
            ("{{indent 2 script}}", "  echo a\n  echo b"),
            ("{{nindent 2 \"x\"}}", "\n  x"),
            ("{{default \"alpine\" empty}}", "alpine"),
            ("{{default \"alpine\" image}}", "golang:1.22"),
            ("{{add 1 2}}", "3"),
            ("{{sub 1 2}}", "-1"),
            ("{{mul 3 4}}", "12"),
            ("{{div 9 2}}", "4"),
            ("{{mod 9 2}}", "1"),
            ("{{max 9 2}}", "9"),
            ("{{min 9 2}}", "2"),
            ("{{join \"-\" (list \"x\" \"y\")}}", "x-y"),
            ("{{first tags}}", "a"),
            ("{{last tags}}", "b"),
            ("{{join \",\" (keys map)}}", "x,y"),
            ("{{to_json tags}}", "[\"a\",\"b\"]"),
            ("{{to_yaml map}}", "x: 1\ny: 2"),
        ];

        for (template, expected) in cases {
            assert_eq!(render(template, &data).unwrap(), expected, "{}", template);
        }

        // every registered name is exercised above
        for name in ALLOWED_HELPERS {
            assert!(
                cases.iter().any(|(t, _)| t.contains(&format!("{{{{{} ", name))
                    || t.contains(&format!("({} ", name))),
                "{} is not covered",
                name
            );
        }
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("go build  now"), "Go Build  Now");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_oversized_text_helpers_fail() {
        let data = json!({"script": "echo a\necho b"});

        let err = render("{{repeat 18446744073709551615 \"ab\"}}", &data).unwrap_err();
        assert!(err.contains("repeat"), "{}", err);

        let err = render("{{repeat 600000 \"ab\"}}", &data).unwrap_err();
        assert!(err.contains("exceeds"), "{}", err);

        assert!(render("{{indent 18446744073709551615 script}}", &data).is_err());
        assert!(render("{{nindent 2000000 \"x\"}}", &data).is_err());

        // at the cap is still fine
        let out = render("{{repeat 524288 \"ab\"}}", &data).unwrap();
        assert_eq!(out.len(), MAX_HELPER_OUTPUT);
    }

    #[test]
    fn test_environment_helper_is_unavailable() {
        let err = render("{{env \"HOME\"}}", &json!({})).unwrap_err();
        assert!(err.contains("env"));
    }

    #[test]
    fn test_no_html_escaping() {
        assert_eq!(
            render("{{cmd}}", &json!({"cmd": "a && b > <c>"})).unwrap(),
            "a && b > <c>"
        );
    }

    #[test]
    fn test_strict_mode() {
        assert!(render("{{missing}}", &json!({})).is_err());
    }

    #[test]
    fn test_vela_lookup_misses_are_empty() {
        assert_eq!(render("[{{vela \"nope\"}}]", &json!({})).unwrap(), "[]");
        assert_eq!(
            render("{{vela \"vela_build_number\"}}", &json!({})).unwrap(),
            "42"
        );
        assert_eq!(
            render("{{vela \"template_name\"}}", &json!({})).unwrap(),
            "sample"
        );
    }
}
