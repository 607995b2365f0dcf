//! Lifecycle hooks.
//!
//! A hook is a shell command registered under a name in the deployment file.
//! Unlike the notifiers, a hook that is not configured counts as a success.

use std::collections::BTreeMap;
use std::io;
use std::process::{Command, Stdio};

use tracing::{info, warn};

use crate::orchestrator::BlueGreen;
use crate::transport::Transport;

/// Extra environment variables for a hook command.
pub type HookEnv = BTreeMap<String, String>;

/// Runs a hook command to completion.
pub trait CommandRunner {
    /// Run `command` with `env` added to the inherited environment.
    ///
    /// Returns `Ok(true)` when the command exited successfully, `Ok(false)`
    /// when it ran but failed, and `Err` when it could not be started.
    fn run(&self, command: &str, env: &HookEnv) -> io::Result<bool>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &str, env: &HookEnv) -> io::Result<bool> {
        (**self).run(command, env)
    }
}

/// Runs commands through a POSIX shell with output discarded.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    /// Use `shell` (invoked as `<shell> -c <command>`) instead of `sh`.
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, env: &HookEnv) -> io::Result<bool> {
        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;

        Ok(status.success())
    }
}

impl<T: Transport, R: CommandRunner> BlueGreen<T, R> {
    /// Run the hook registered under `name`.
    ///
    /// Returns `true` when no such hook is configured. Launch failures are
    /// logged and reported as `false`; they never propagate.
    pub fn run_hook(&self, name: &str, env: &HookEnv) -> bool {
        let _guard = self.span.enter();

        let Some(command) = self.session.hooks().command(name) else {
            return true;
        };

        info!(hook = name, "running hook");
        match self.runner.run(command, env) {
            Ok(true) => true,
            Ok(false) => {
                warn!(hook = name, "hook exited with a failure status");
                false
            }
            Err(e) => {
                warn!(hook = name, error = %e, "hook could not be started");
                false
            }
        }
    }
}
