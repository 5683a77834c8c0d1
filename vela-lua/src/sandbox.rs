//! Lua sandbox creation
//!
//! Templates run in a Lua state with only the pure standard libraries
//! (table, string, math, utf8). Nothing can reach the filesystem, the
//! process environment or load further code. Execution is metered by an
//! instruction hook so a hostile template cannot run forever.

use mlua::{
    Function, HookTriggers, Lua, LuaOptions, Result as LuaResult, StdLib, Thread, Value,
    Variadic, VmState,
};
use mlua::{FromLuaMulti, IntoLuaMulti};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Globals from the base library that load code or poke at the collector
const REMOVED_GLOBALS: [&str; 5] = ["require", "dofile", "loadfile", "load", "collectgarbage"];

/// Create a restricted Lua sandbox
///
/// `print` is kept but writes to the debug log. An optional memory limit in
/// bytes caps allocations for the lifetime of the state.
pub fn create_sandbox(memory_limit: Option<usize>) -> LuaResult<Lua> {
    let lua = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8,
        LuaOptions::default(),
    )?;

    let globals = lua.globals();
    for name in REMOVED_GLOBALS {
        globals.set(name, mlua::Nil)?;
    }

    let print = lua.create_function(|lua, args: Variadic<Value>| {
        let tostring: Function = lua.globals().get("tostring")?;
        let mut parts = Vec::with_capacity(args.len());
        for arg in args {
            parts.push(tostring.call::<String>(arg)?);
        }
        debug!(target: "vela_lua::print", "{}", parts.join("\t"));
        Ok(())
    })?;
    globals.set("print", print)?;

    if let Some(limit) = memory_limit {
        lua.set_memory_limit(limit)?;
    }

    Ok(lua)
}

/// Instruction counter shared by every thread a render runs
///
/// Each executed VM instruction increments the counter; once it passes the
/// limit the hook raises an error that unwinds the running script.
#[derive(Debug, Clone)]
pub struct InstructionBudget {
    limit: u64,
    used: Arc<AtomicU64>,
}

impl InstructionBudget {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used() > self.limit
    }

    /// Meter every instruction executed on `thread`
    pub fn attach(&self, thread: &Thread) -> LuaResult<()> {
        let used = self.used.clone();
        let limit = self.limit;

        thread.set_hook(
            HookTriggers::new().every_nth_instruction(1),
            move |_lua, _debug| {
                if used.fetch_add(1, Ordering::Relaxed) + 1 > limit {
                    return Err(mlua::Error::runtime(format!(
                        "step limit of {} exceeded",
                        limit
                    )));
                }
                Ok(VmState::Continue)
            },
        )
    }

    /// Call `function` on a fresh metered thread
    pub fn call<R: FromLuaMulti>(
        &self,
        lua: &Lua,
        function: Function,
        args: impl IntoLuaMulti,
    ) -> LuaResult<R> {
        let thread = lua.create_thread(function)?;
        self.attach(&thread)?;
        thread.resume(args)
    }
}
