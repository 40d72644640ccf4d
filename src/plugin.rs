//! Dynamically loaded plugin modules and the registry that owns them.
//!
//! A plugin is a shared library exporting two entry points with C linkage:
//!
//! - `int initialize(void)` — called once when the module is loaded; a
//!   return value of 0 means success.
//! - `int run(char **argv)` — called on every invocation whose command name
//!   matches the registered plugin name; receives the full NULL-terminated
//!   argument vector, `argv[0]` included. The return value is logged but not
//!   otherwise interpreted by the shell.
//!
//! The shell talks to modules through the [`PluginModule`] trait so the
//! registry and the dispatcher can be exercised in tests without real shared
//! objects; [`DynModule`] is the production implementation backed by
//! `libloading`.

use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::lexer::Argv;
use anyhow::Result;
use libloading::{Library, Symbol};
use log::debug;
use std::ffi::{CString, c_char, c_int};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum number of plugins the registry will hold at once.
pub const MAX_PLUGINS: usize = 10;

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors that can occur while loading or invoking a plugin module.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The shared library could not be opened at all.
    #[error("failed to open module {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// A required exported function is missing from the module.
    #[error("module has no '{0}' entry point")]
    MissingEntryPoint(&'static str),

    /// The registry already holds the maximum number of plugins.
    #[error("the plugin registry is full ({0} plugins)")]
    RegistryFull(usize),

    /// An argument could not be marshalled across the FFI boundary.
    #[error("argument contains an interior NUL byte")]
    BadArgument(#[from] std::ffi::NulError),
}

/// A loaded plugin module: the capability to resolve and call its entry points.
///
/// Both operations are resolve-then-invoke: a missing export surfaces as
/// [`PluginError::MissingEntryPoint`] rather than a crash or a sentinel.
pub trait PluginModule {
    /// Resolve and call the module's `initialize` entry point.
    fn initialize(&self) -> PluginResult<ExitCode>;

    /// Resolve and call the module's `run` entry point with the full
    /// argument vector, command name first.
    fn run(&self, argv: &[String]) -> PluginResult<ExitCode>;
}

type InitFn = unsafe extern "C" fn() -> c_int;
type RunFn = unsafe extern "C" fn(*const *const c_char) -> c_int;

/// A [`PluginModule`] backed by a dynamically loaded shared library.
///
/// The library handle is owned by this value; dropping it closes the module.
#[derive(Debug)]
pub struct DynModule {
    lib: Library,
}

impl DynModule {
    /// Open the shared library at `path`.
    pub fn open(path: &Path) -> PluginResult<Self> {
        // Safety: loading a library runs its initialization routines; the
        // plugin contract places loaded code inside the shell's trust
        // boundary.
        let lib = unsafe { Library::new(path) }.map_err(|source| PluginError::Open {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self { lib })
    }
}

impl PluginModule for DynModule {
    fn initialize(&self) -> PluginResult<ExitCode> {
        let init: Symbol<InitFn> = unsafe { self.lib.get(b"initialize\0") }
            .map_err(|_| PluginError::MissingEntryPoint("initialize"))?;
        Ok(unsafe { init() })
    }

    fn run(&self, argv: &[String]) -> PluginResult<ExitCode> {
        let run: Symbol<RunFn> = unsafe { self.lib.get(b"run\0") }
            .map_err(|_| PluginError::MissingEntryPoint("run"))?;
        let owned: Vec<CString> = argv
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<_, _>>()?;
        let mut ptrs: Vec<*const c_char> = owned.iter().map(|arg| arg.as_ptr()).collect();
        // The run() contract expects a NULL-terminated vector.
        ptrs.push(std::ptr::null());
        Ok(unsafe { run(ptrs.as_ptr()) })
    }
}

/// Derive the module path for a plugin short name: `./<name><dll suffix>`,
/// e.g. `./math.so` on Linux.
pub fn module_path(name: &str) -> PathBuf {
    PathBuf::from(format!("./{name}{}", std::env::consts::DLL_SUFFIX))
}

/// A registered plugin: a name plus the module it resolves to.
pub struct Plugin {
    name: String,
    module: Box<dyn PluginModule>,
}

impl Plugin {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &dyn PluginModule {
        self.module.as_ref()
    }
}

/// Outcome of a successful [`PluginRegistry::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A new record was appended.
    Registered,
    /// An existing record's module was replaced in place.
    Replaced,
}

/// A bounded, insertion-ordered collection of plugins, searched linearly by
/// name. No two records ever share a name: loading a name that is already
/// registered replaces that record's module (the previous library handle is
/// closed when it drops).
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
    capacity: usize,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_capacity(MAX_PLUGINS)
    }
}

impl PluginRegistry {
    /// Create a registry holding at most `capacity` plugins.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            plugins: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Look up a plugin by name, in insertion order.
    pub fn find(&self, name: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Register `module` under `name`, replacing the module of an existing
    /// record with the same name. Fails with [`PluginError::RegistryFull`]
    /// when a new record would exceed the capacity.
    pub fn load(&mut self, name: &str, module: Box<dyn PluginModule>) -> PluginResult<LoadOutcome> {
        if let Some(existing) = self.plugins.iter_mut().find(|p| p.name == name) {
            existing.module = module;
            return Ok(LoadOutcome::Replaced);
        }
        if self.plugins.len() >= self.capacity {
            return Err(PluginError::RegistryFull(self.capacity));
        }
        self.plugins.push(Plugin {
            name: name.to_owned(),
            module,
        });
        Ok(LoadOutcome::Registered)
    }
}

/// One invocation of a registered plugin's `run` entry point.
///
/// Fire-and-forget from the shell's perspective: the plugin's return value
/// is logged at debug level and the shell returns to the prompt.
pub struct PluginCommand {
    argv: Vec<String>,
}

impl CommandFactory for Factory<PluginCommand> {
    fn try_create(&self, env: &Environment, argv: &Argv) -> Option<Box<dyn ExecutableCommand>> {
        let name = argv.name()?;
        env.plugins.find(name)?;
        Some(Box::new(PluginCommand {
            argv: argv.tokens().to_vec(),
        }))
    }
}

impl ExecutableCommand for PluginCommand {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let name = &self.argv[0];
        let plugin = env
            .plugins
            .find(name)
            .ok_or_else(|| anyhow::anyhow!("plugin '{}' is no longer registered", name))?;
        match plugin.module().run(&self.argv) {
            Ok(status) => {
                debug!("plugin '{name}' returned {status}");
                Ok(0)
            }
            Err(PluginError::MissingEntryPoint(_)) => {
                writeln!(
                    stdout,
                    "Error: Plugin {name} does not contain a 'run' function"
                )?;
                Ok(1)
            }
            Err(err) => {
                writeln!(stdout, "Error: Plugin {name} invocation failed: {err}")?;
                Ok(1)
            }
        }
    }
}
