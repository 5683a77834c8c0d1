//! Logging module for Lua templates
//!
//! Scripts call `log.info(...)` and friends. Where the messages end up is
//! decided by the [`LogSink`] the module is built with: the renderer forwards
//! them to `tracing` and keeps warnings for the render result.

use crate::module::{ModuleMetadata, VelaModule};
use mlua::prelude::*;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Severity of a message logged from a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn function_name(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// Destination for script log messages
pub trait LogSink: Send + Sync {
    fn write(&mut self, level: LogLevel, message: &str);
}

/// Sink used while rendering: messages go to `tracing`, warnings are kept
#[derive(Debug, Default)]
pub struct RenderSink {
    template: String,
    warnings: Vec<String>,
}

impl RenderSink {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            warnings: Vec::new(),
        }
    }

    /// Drain the warnings collected so far
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

impl LogSink for RenderSink {
    fn write(&mut self, level: LogLevel, message: &str) {
        let template = self.template.as_str();
        match level {
            LogLevel::Debug => debug!(template, "{}", message),
            LogLevel::Info => info!(template, "{}", message),
            LogLevel::Warning => {
                warn!(template, "{}", message);
                self.warnings.push(message.to_string());
            }
            LogLevel::Error => error!(template, "{}", message),
        }
    }
}

/// Sink that drops everything, used for stub generation
#[derive(Debug, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write(&mut self, _level: LogLevel, _message: &str) {}
}

pub struct LogModule<S: LogSink> {
    sink: Arc<Mutex<S>>,
}

impl<S: LogSink> LogModule<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Shared handle to the sink, for reading back what was logged
    pub fn sink(&self) -> Arc<Mutex<S>> {
        self.sink.clone()
    }
}

impl<S: LogSink + 'static> VelaModule for LogModule<S> {
    fn id(&self) -> &'static str {
        "log"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let log_table = lua.create_table()?;

        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Error,
        ] {
            let sink = self.sink.clone();
            log_table.set(
                level.function_name(),
                lua.create_function(move |_, msg: String| {
                    sink.lock()
                        .map_err(|e| LuaError::RuntimeError(format!("Failed to lock sink: {}", e)))?
                        .write(level, &msg);
                    Ok(())
                })?,
            )?;
        }

        lua.globals().set(self.id(), log_table)?;
        Ok(())
    }

    fn stubs(&self) -> String {
        r#"---@meta

---Logging module for Vela templates
---@class log
log = {}

---Log a debug message
---@param msg string The message to log
function log.debug(msg) end

---Log an info message
---@param msg string The message to log
function log.info(msg) end

---Log a warning message, reported alongside the rendered pipeline
---@param msg string The message to log
function log.warning(msg) end

---Log an error message
---@param msg string The message to log
function log.error(msg) end
"#
        .to_string()
    }

    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata {
            id: self.id(),
            version: "1.0.0",
            description: "Logging functionality for Vela templates",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestLogSink {
        messages: Arc<Mutex<Vec<(LogLevel, String)>>>,
    }

    impl TestLogSink {
        fn new() -> (Self, Arc<Mutex<Vec<(LogLevel, String)>>>) {
            let messages = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    messages: messages.clone(),
                },
                messages,
            )
        }
    }

    impl LogSink for TestLogSink {
        fn write(&mut self, level: LogLevel, message: &str) {
            self.messages
                .lock()
                .unwrap()
                .push((level, message.to_string()));
        }
    }

    #[test]
    fn test_log_module_registration() {
        let (sink, _messages) = TestLogSink::new();
        let lua = Lua::new();
        let module = LogModule::new(sink);

        assert_eq!(module.id(), "log");
        assert!(module.register(&lua).is_ok());

        let result: LuaResult<bool> = lua.load("return type(log.warning) == 'function'").eval();
        assert!(result.unwrap());
    }

    #[test]
    fn test_log_all_levels() {
        let (sink, messages) = TestLogSink::new();
        let lua = Lua::new();
        LogModule::new(sink).register(&lua).unwrap();

        lua.load(
            r#"
            log.debug("debug")
            log.info("info")
            log.warning("warning")
            log.error("error")
        "#,
        )
        .exec()
        .unwrap();

        let logs = messages.lock().unwrap();
        assert_eq!(logs.len(), 4);
        assert_eq!(logs[0].0, LogLevel::Debug);
        assert_eq!(logs[1].0, LogLevel::Info);
        assert_eq!(logs[2], (LogLevel::Warning, "warning".to_string()));
        assert_eq!(logs[3].0, LogLevel::Error);
    }

    #[test]
    fn test_render_sink_keeps_warnings() {
        let lua = Lua::new();
        let module = LogModule::new(RenderSink::new("go"));
        module.register(&lua).unwrap();

        lua.load(r#"log.info("building"); log.warning("image tag is latest")"#)
            .exec()
            .unwrap();

        let warnings = module.sink().lock().unwrap().take_warnings();
        assert_eq!(warnings, vec!["image tag is latest"]);
        assert!(module.sink().lock().unwrap().take_warnings().is_empty());
    }

    #[test]
    fn test_log_module_stubs() {
        let module = LogModule::new(NullSink);
        let stubs = module.stubs();

        assert!(stubs.contains("---@meta"));
        assert!(stubs.contains("function log.warning"));
        assert_eq!(module.metadata().id, "log");
    }
}
