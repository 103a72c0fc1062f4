//! The command layer: everything that talks to the `p4` binary goes through
//! [`CommandRunner`].

mod process;
mod tagged;

pub use process::P4Process;
pub use tagged::{Record, parse_tagged};

use async_trait::async_trait;

use crate::error::Result;

/// Session variables overlaid onto the inherited process environment for a
/// single command. Values are never mutated in place; activating a client
/// produces a new `P4Env`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct P4Env {
    pub port: String,
    pub user: String,
    pub client: Option<String>,
    /// Host the server should see, when it differs from the machine name.
    pub host: Option<String>,
}

impl P4Env {
    pub fn new(port: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            user: user.into(),
            client: None,
            host: None,
        }
    }

    #[must_use]
    pub fn with_host(&self, host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_client(&self, client: impl Into<String>) -> Self {
        Self {
            client: Some(client.into()),
            ..self.clone()
        }
    }

    pub fn vars(&self) -> Vec<(&'static str, &str)> {
        let mut vars = vec![("P4PORT", self.port.as_str()), ("P4USER", self.user.as_str())];
        if let Some(client) = &self.client {
            vars.push(("P4CLIENT", client.as_str()));
        }
        if let Some(host) = &self.host {
            vars.push(("P4HOST", host.as_str()));
        }
        vars
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Return the output instead of failing when the exit code is non-zero.
    pub allow_non_zero_exit: bool,
    /// Do not log captured output.
    pub silent: bool,
}

impl RunOptions {
    pub const STRICT: RunOptions = RunOptions {
        allow_non_zero_exit: false,
        silent: false,
    };

    pub const TOLERANT: RunOptions = RunOptions {
        allow_non_zero_exit: true,
        silent: false,
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Both output streams, trimmed. `p4` reports most messages on stderr.
    pub fn text(&self) -> String {
        format!("{}{}", self.stdout, self.stderr).trim().to_string()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs `p4` with the given arguments. Implementations must report any
/// non-zero exit as [`crate::error::Error::CommandFailed`] unless the options
/// allow it.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        env: &P4Env,
        args: &[String],
        input: Option<&[u8]>,
        options: RunOptions,
    ) -> Result<CommandOutput>;
}

/// Runs a command with `-ztag -Mj` and decodes one record per output line.
pub async fn run_tagged<R: CommandRunner + ?Sized>(
    runner: &R,
    env: &P4Env,
    args: &[&str],
) -> Result<Vec<Record>> {
    let mut full: Vec<String> = vec!["-ztag".into(), "-Mj".into()];
    full.extend(args.iter().map(|a| a.to_string()));
    let output = runner.run(env, &full, None, RunOptions::STRICT).await?;
    parse_tagged(&full.join(" "), &output.stdout)
}

/// Runs a plain command and returns its stdout.
pub async fn run_plain<R: CommandRunner + ?Sized>(
    runner: &R,
    env: &P4Env,
    args: &[&str],
    options: RunOptions,
) -> Result<CommandOutput> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    runner.run(env, &args, None, options).await
}
