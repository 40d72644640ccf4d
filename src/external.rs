use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::lexer::Argv;
use anyhow::{Context, Result};
use log::debug;
use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// A command that is neither a builtin nor a registered plugin: an external
/// program resolved against PATH and run as a child process.
///
/// The shell blocks until the child terminates; the child's exit status is
/// reported to the caller of `execute` but not printed.
pub struct ExternalCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ExternalCommand {
    pub fn new(program: OsString, args: Vec<OsString>) -> Self {
        Self { program, args }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(&self, env: &Environment, argv: &Argv) -> Option<Box<dyn ExecutableCommand>> {
        let name = argv.name()?;
        let search_paths = env.get_var("PATH")?;
        let executable = find_command_path(OsStr::new(&search_paths), Path::new(name))?;
        Some(Box::new(ExternalCommand::new(
            executable.into_os_string(),
            argv.args().iter().map(|a| a.into()).collect(),
        )))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let mut child = match std::process::Command::new(&self.program)
            .args(&self.args)
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir)
            .spawn()
        {
            Ok(child) => child,
            // The file can disappear between PATH resolution and spawn;
            // report it like any unresolvable command and keep the loop alive.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                writeln!(
                    stdout,
                    "mshell: {}: command not found",
                    self.program.to_string_lossy()
                )?;
                return Ok(127);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to spawn {}", self.program.to_string_lossy())
                });
            }
        };
        let exit_status = child
            .wait()
            .with_context(|| format!("failed to wait for {}", self.program.to_string_lossy()))?;
        debug!(
            "{} exited with {exit_status}",
            self.program.to_string_lossy()
        );
        match exit_status.code() {
            Some(x) => Ok(x),
            None => Ok(terminated_by_signal(exit_status)),
        }
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// - Absolute path: returned if it exists.
/// - `./`-prefixed path (any relative path on non-Unix): returned if it exists.
/// - Relative path with multiple components (e.g. `bin/sh`): returned if it exists.
/// - Single component: each directory in `search_paths` (PATH) is tried in
///   order and the first existing match wins.
/// - Empty path: `None`.
pub fn find_command_path(search_paths: &OsStr, path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        return path.exists().then(|| path.to_owned());
    }

    let search_in_current_dir = cfg!(not(unix)) || path.starts_with("./");
    if search_in_current_dir && path.exists() {
        return Some(path.to_owned());
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => None,
        (Some(cmd), None) => find_in_path(search_paths, cmd.as_os_str()),
        _ => path.exists().then(|| path.to_owned()),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|candidate| candidate.exists())
}
