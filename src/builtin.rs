use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::lexer::Argv;
use crate::plugin::{self, DynModule, LoadOutcome, PluginError, PluginModule};
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use log::info;
use std::io::Write;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "exit" or "load".
    fn name() -> &'static str;

    /// Executes the command using the provided output stream and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match T::execute(*self, stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stdout, "{e:#}")?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        stdout.write_all(self.output.as_bytes())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, _env: &Environment, argv: &Argv) -> Option<Box<dyn ExecutableCommand>> {
        if argv.name()? != T::name() {
            return None;
        }
        let args: Vec<&str> = argv.args().iter().map(String::as_str).collect();
        Some(match T::from_args(&[T::name()], &args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

#[derive(FromArgs)]
/// Leave the shell with status 0.
pub struct Exit {
    #[argh(positional, greedy)]
    /// extra arguments are accepted and ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Load a plugin module from the current directory and register it under
/// its short name. `load math` opens `./math.so` (platform suffix varies),
/// calls its `initialize` entry point, and on success makes `math` callable
/// like a builtin. Loading a name again replaces the registered module.
pub struct Load {
    #[argh(positional)]
    /// short name of the plugin; resolved to ./<name><dll-suffix>.
    pub name: String,
}

impl BuiltinCommand for Load {
    fn name() -> &'static str {
        "load"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let path = plugin::module_path(&self.name);
        match DynModule::open(&path) {
            Ok(module) => self.install(Box::new(module), &path, stdout, env),
            Err(err) => {
                writeln!(stdout, "Error: Plugin {} failed to load: {err}", self.name)?;
                Ok(1)
            }
        }
    }
}

impl Load {
    /// Initialize an opened module and register it under this load's name.
    ///
    /// A failed initialization drops (and thereby closes) the module without
    /// touching the registry.
    fn install(
        &self,
        module: Box<dyn PluginModule>,
        path: &std::path::Path,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match module.initialize() {
            Ok(0) => {}
            Ok(_status) => {
                writeln!(stdout, "Error: Plugin {} initialization failed!", self.name)?;
                return Ok(1);
            }
            Err(err) => {
                writeln!(
                    stdout,
                    "Error: Plugin {} has no 'initialize' entry point: {err}",
                    self.name
                )?;
                return Ok(1);
            }
        }

        match env.plugins.load(&self.name, module) {
            Ok(LoadOutcome::Registered) => {
                info!("loaded plugin '{}' from {}", self.name, path.display());
                Ok(0)
            }
            Ok(LoadOutcome::Replaced) => {
                info!("reloaded plugin '{}' from {}", self.name, path.display());
                Ok(0)
            }
            Err(err @ PluginError::RegistryFull(_)) => {
                writeln!(stdout, "Error: Plugin {} not loaded: {err}", self.name)?;
                Ok(1)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::testing::FakeModule;

    fn run_builtin<T: BuiltinCommand>(cmd: T, env: &mut Environment) -> (ExitCode, String) {
        let mut out = Vec::new();
        let code = cmd.execute(&mut out, env).unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn exit_sets_the_flag_and_succeeds() {
        let mut env = Environment::new();
        let (code, out) = run_builtin(Exit { _args: Vec::new() }, &mut env);
        assert_eq!(code, 0);
        assert!(out.is_empty());
        assert!(env.should_exit);
    }

    #[test]
    fn exit_ignores_extra_arguments() {
        let mut env = Environment::new();
        let cmd = Exit {
            _args: vec!["now".to_owned(), "please".to_owned()],
        };
        let (code, _) = run_builtin(cmd, &mut env);
        assert_eq!(code, 0);
        assert!(env.should_exit);
    }

    #[test]
    fn load_missing_module_reports_and_leaves_registry_alone() {
        let mut env = Environment::new();
        let cmd = Load {
            name: "no_such_plugin_here".to_owned(),
        };
        let (code, out) = run_builtin(cmd, &mut env);
        assert_eq!(code, 1);
        assert!(out.contains("Error: Plugin no_such_plugin_here failed to load"));
        assert!(env.plugins.is_empty());
        assert!(!env.should_exit);
    }

    fn install_module(
        name: &str,
        module: Box<dyn PluginModule>,
        env: &mut Environment,
    ) -> (ExitCode, String) {
        let load = Load {
            name: name.to_owned(),
        };
        let path = plugin::module_path(name);
        let mut out = Vec::new();
        let code = load.install(module, &path, &mut out, env).unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn install_registers_a_well_behaved_module() {
        let mut env = Environment::new();
        let (code, out) = install_module("math", Box::new(FakeModule::new()), &mut env);
        assert_eq!(code, 0);
        assert!(out.is_empty());
        assert_eq!(env.plugins.len(), 1);
        assert!(env.plugins.find("math").is_some());
    }

    #[test]
    fn nonzero_initialize_is_reported_and_module_not_registered() {
        let mut env = Environment::new();
        let module = FakeModule {
            init_status: 3,
            ..FakeModule::new()
        };
        let (code, out) = install_module("math", Box::new(module), &mut env);
        assert_eq!(code, 1);
        assert_eq!(out, "Error: Plugin math initialization failed!\n");
        assert!(env.plugins.is_empty());
        assert!(!env.should_exit);
    }

    #[test]
    fn missing_initialize_is_non_fatal_and_registry_untouched() {
        let mut env = Environment::new();
        let module = FakeModule::without_initialize();
        let (code, out) = install_module("math", Box::new(module), &mut env);
        assert_eq!(code, 1);
        assert!(out.contains("Error: Plugin math has no 'initialize' entry point"));
        assert!(env.plugins.is_empty());
        assert!(!env.should_exit);
    }

    #[test]
    fn registry_full_is_reported_through_the_load_flow() {
        let mut env = Environment::new();
        env.plugins = crate::plugin::PluginRegistry::with_capacity(0);
        let (code, out) = install_module("extra", Box::new(FakeModule::new()), &mut env);
        assert_eq!(code, 1);
        assert!(out.contains("Error: Plugin extra not loaded"));
        assert!(out.contains("registry is full"));
        assert!(env.plugins.is_empty());
    }

    #[test]
    fn load_requires_a_name_argument() {
        // `load` with no arguments is rejected at parse time with a usage
        // message rather than falling through to external lookup.
        let parsed = Load::from_args(&["load"], &[]);
        assert!(parsed.is_err());
    }
}
