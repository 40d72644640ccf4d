use crate::env::Environment;
use crate::lexer::Argv;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Object-safe trait for any command the shell can execute.
///
/// Implemented by built-ins via a blanket impl, by plugin invocations and by
/// external commands. `stdout` receives user-facing diagnostics so callers
/// (and tests) can capture them; external programs and plugins write to the
/// process's real stdio regardless.
pub trait ExecutableCommand {
    /// Executes the command against the interpreter's persistent state.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Factory that tries to create a command from an argument vector.
///
/// Returns `None` when the factory doesn't recognize `argv[0]`. Factories
/// are queried in a fixed order by the interpreter, which is how the
/// builtin → plugin → external routing precedence is encoded.
pub trait CommandFactory {
    /// Attempt to create a command instance for the given argument vector.
    fn try_create(&self, env: &Environment, argv: &Argv) -> Option<Box<dyn ExecutableCommand>>;
}
