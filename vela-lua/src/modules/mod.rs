//! Modules available to Lua templates
//!
//! Templates run without any host access, so the only module is `log`.

pub mod log;

pub use log::{LogLevel, LogModule, LogSink, NullSink, RenderSink};
