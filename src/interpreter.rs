use crate::builtin::{Exit, Load};
use crate::command::{CommandFactory, ExitCode};
use crate::env::Environment;
use crate::external::ExternalCommand;
use crate::lexer::{self, Argv};
use crate::plugin::PluginCommand;
use log::debug;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate — builtins, plugin
/// invocations and external commands.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The shell's resolution and dispatch engine plus its read-eval loop.
///
/// The interpreter owns an [`Environment`] (variables, working directory,
/// the plugin registry) and an ordered list of [`CommandFactory`] objects.
/// Factories are queried first-match-wins, which encodes the routing
/// precedence: builtins, then registered plugins, then external programs.
///
/// Example
/// ```
/// use mshell::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.eval_line("").unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            commands,
        }
    }

    /// Tokenize one input line and dispatch it.
    ///
    /// Returns the resulting exit code. Recoverable failures (unknown
    /// command, plugin errors) are reported on stdout and yield a non-zero
    /// code; an `Err` means the host environment failed the shell (spawn or
    /// wait failure) and the caller should terminate.
    pub fn eval_line(&mut self, line: &str) -> anyhow::Result<ExitCode> {
        let argv = lexer::tokenize(line);
        self.dispatch(&argv, &mut std::io::stdout())
    }

    /// Route one argument vector to the first factory that claims it.
    ///
    /// An empty vector is a no-op. A vector nobody claims is reported as
    /// `command not found` with exit code 127.
    fn dispatch(&mut self, argv: &Argv, stdout: &mut dyn Write) -> anyhow::Result<ExitCode> {
        let Some(name) = argv.name() else {
            return Ok(0);
        };
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, argv) {
                return cmd.execute(stdout, &mut self.env);
            }
        }
        writeln!(stdout, "mshell: {name}: command not found")?;
        Ok(127)
    }

    /// The interactive Read-Eval-Print Loop.
    ///
    /// Runs until the `exit` builtin sets the exit flag or the input reaches
    /// end of file. Ctrl-C cancels the current line and re-prompts.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline("> ") {
                Ok(line) => {
                    rl.add_history_entry(line.as_str())?;
                    let code = self.eval_line(&line)?;
                    debug!("command finished with exit code {code}");
                    if self.env.should_exit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the full routing order:
    /// builtins (`exit`, `load`), registered plugins, external programs.
    fn default() -> Self {
        Self::new(vec![
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Load>::default()),
            Box::new(Factory::<PluginCommand>::default()),
            Box::new(Factory::<ExternalCommand>::default()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::testing::FakeModule;

    fn dispatch_line(sh: &mut Interpreter, line: &str) -> (ExitCode, String) {
        let argv = lexer::tokenize(line);
        let mut out = Vec::new();
        let code = sh.dispatch(&argv, &mut out).unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn empty_and_whitespace_input_are_no_ops() {
        let mut sh = Interpreter::default();
        for line in ["", "   ", "        "] {
            let (code, out) = dispatch_line(&mut sh, line);
            assert_eq!(code, 0);
            assert!(out.is_empty(), "no message expected for {line:?}");
            assert!(!sh.env.should_exit);
        }
    }

    #[test]
    fn unknown_command_is_reported_and_shell_stays_alive() {
        let mut sh = Interpreter::default();
        let (code, out) = dispatch_line(&mut sh, "definitely_not_a_command_xyz");
        assert_eq!(code, 127);
        assert_eq!(out, "mshell: definitely_not_a_command_xyz: command not found\n");
        assert!(!sh.env.should_exit);
    }

    #[test]
    fn exit_wins_over_everything_and_sets_the_flag() {
        let mut sh = Interpreter::default();
        let (code, out) = dispatch_line(&mut sh, "exit");
        assert_eq!(code, 0);
        assert!(out.is_empty());
        assert!(sh.env.should_exit);
    }

    #[test]
    fn registered_plugin_receives_full_argv() {
        let mut sh = Interpreter::default();
        let module = FakeModule::new();
        let calls = module.calls.clone();
        sh.env.plugins.load("math", Box::new(module)).unwrap();

        let (code, out) = dispatch_line(&mut sh, "math 2 2");
        assert_eq!(code, 0);
        assert!(out.is_empty());
        assert_eq!(*calls.borrow(), vec![vec!["math", "2", "2"]]);
    }

    #[test]
    fn plugin_return_value_is_not_surfaced() {
        let mut sh = Interpreter::default();
        let module = FakeModule {
            run_status: 42,
            ..FakeModule::new()
        };
        sh.env.plugins.load("noisy", Box::new(module)).unwrap();

        let (code, out) = dispatch_line(&mut sh, "noisy");
        assert_eq!(code, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn plugin_without_run_reports_and_survives() {
        let mut sh = Interpreter::default();
        sh.env
            .plugins
            .load("broken", Box::new(FakeModule::without_run()))
            .unwrap();

        let (code, out) = dispatch_line(&mut sh, "broken 1 2");
        assert_eq!(code, 1);
        assert_eq!(out, "Error: Plugin broken does not contain a 'run' function\n");
        assert!(!sh.env.should_exit);
    }

    #[test]
    fn plugin_name_shadows_external_program() {
        let mut sh = Interpreter::default();
        let module = FakeModule::new();
        let calls = module.calls.clone();
        // "true" exists on PATH on any Unix box; the plugin must win.
        sh.env.plugins.load("true", Box::new(module)).unwrap();

        let (code, _) = dispatch_line(&mut sh, "true");
        assert_eq!(code, 0);
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn load_of_missing_module_is_reported_not_fatal() {
        let mut sh = Interpreter::default();
        let (code, out) = dispatch_line(&mut sh, "load ghost_plugin");
        assert_eq!(code, 1);
        assert!(out.contains("Error: Plugin ghost_plugin failed to load"));
        assert!(sh.env.plugins.is_empty());
        assert!(!sh.env.should_exit);
    }

    #[test]
    fn load_without_a_name_prints_usage() {
        let mut sh = Interpreter::default();
        let (code, out) = dispatch_line(&mut sh, "load");
        assert_eq!(code, 1);
        assert!(!out.is_empty());
        assert!(!sh.env.should_exit);
    }

    #[test]
    #[cfg(unix)]
    fn external_command_runs_and_its_status_is_returned() {
        let mut sh = Interpreter::default();
        let (code, out) = dispatch_line(&mut sh, "true");
        assert_eq!(code, 0);
        assert!(out.is_empty());

        let (code, _) = dispatch_line(&mut sh, "false");
        assert_ne!(code, 0);
        assert!(!sh.env.should_exit);
    }

    #[test]
    fn builtins_win_over_plugins_of_the_same_name() {
        let mut sh = Interpreter::default();
        let module = FakeModule::new();
        let calls = module.calls.clone();
        sh.env.plugins.load("exit", Box::new(module)).unwrap();

        let (code, _) = dispatch_line(&mut sh, "exit");
        assert_eq!(code, 0);
        assert!(sh.env.should_exit);
        assert!(calls.borrow().is_empty());
    }
}
