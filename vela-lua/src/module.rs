use mlua::prelude::*;

/// A module exposed to Lua templates as a global table.
///
/// Modules register their functions into a fresh sandbox for every render
/// and can describe themselves as LuaLS stubs for editor support.
pub trait VelaModule: Send + Sync {
    /// Global name of the module in Lua, e.g. `"log"` for `log.info(...)`.
    ///
    /// Must be a valid Lua identifier and unique across a registry.
    fn id(&self) -> &'static str;

    /// Register this module's functions into the Lua state.
    fn register(&self, lua: &Lua) -> LuaResult<()>;

    /// LuaLS annotations for this module, starting with `---@meta`.
    fn stubs(&self) -> String;

    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata {
            id: self.id(),
            version: "0.1.0",
            description: "",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleMetadata {
    pub id: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

/// Ordered set of modules loaded into a sandbox
pub struct ModuleRegistry {
    modules: Vec<Box<dyn VelaModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Registers a module
    ///
    /// # Panics
    /// Panics if a module with the same ID is already registered
    pub fn register<M: VelaModule + 'static>(&mut self, module: M) {
        let id = module.id();
        if self.modules.iter().any(|m| m.id() == id) {
            panic!("Module with id '{}' is already registered", id);
        }
        self.modules.push(Box::new(module));
    }

    pub fn get(&self, id: &str) -> Option<&dyn VelaModule> {
        self.modules
            .iter()
            .find(|m| m.id() == id)
            .map(|m| m.as_ref())
    }

    pub fn modules(&self) -> &[Box<dyn VelaModule>] {
        &self.modules
    }

    /// Registers all modules into a Lua context, stopping at the first error
    pub fn register_all(&self, lua: &Lua) -> LuaResult<()> {
        for module in &self.modules {
            module.register(lua)?;
        }
        Ok(())
    }

    /// Combined stub file for every registered module
    pub fn generate_stubs(&self) -> String {
        let mut stubs = String::new();
        for module in &self.modules {
            stubs.push_str(&module.stubs());
            stubs.push_str("\n\n");
        }
        stubs
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestModule;

    impl VelaModule for TestModule {
        fn id(&self) -> &'static str {
            "test"
        }

        fn register(&self, lua: &Lua) -> LuaResult<()> {
            let table = lua.create_table()?;
            table.set("value", 42)?;
            lua.globals().set(self.id(), table)?;
            Ok(())
        }

        fn stubs(&self) -> String {
            "---@meta\n---@class test\ntest = {}".to_string()
        }
    }

    #[test]
    fn test_module_registration() {
        let mut registry = ModuleRegistry::new();
        registry.register(TestModule);

        assert!(registry.get("test").is_some());
        assert!(registry.get("nonexistent").is_none());

        let lua = Lua::new();
        registry.register_all(&lua).unwrap();
        let value: i64 = lua.load("return test.value").eval().unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration() {
        let mut registry = ModuleRegistry::new();
        registry.register(TestModule);
        registry.register(TestModule);
    }

    #[test]
    fn test_stub_generation() {
        let mut registry = ModuleRegistry::new();
        registry.register(TestModule);

        let stubs = registry.generate_stubs();
        assert!(stubs.contains("---@meta"));
        assert!(stubs.contains("test = {}"));
    }
}
