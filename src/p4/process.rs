use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{CommandOutput, CommandRunner, P4Env, RunOptions};
use crate::error::{Error, Result};

const P4_COMMAND_TIMEOUT: Duration = Duration::from_secs(3600);

/// Runs the real `p4` executable.
#[derive(Debug, Clone)]
pub struct P4Process {
    bin: PathBuf,
    timeout: Duration,
}

impl P4Process {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            timeout: P4_COMMAND_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut line = self.bin.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[async_trait]
impl CommandRunner for P4Process {
    async fn run(
        &self,
        env: &P4Env,
        args: &[String],
        input: Option<&[u8]>,
        options: RunOptions,
    ) -> Result<CommandOutput> {
        let command_line = self.command_line(args);
        debug!("running {command_line}");

        let mut cmd = Command::new(&self.bin);
        cmd.args(args);
        cmd.envs(env.vars());
        cmd.stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(Error::Io)?;

        // Feed stdin concurrently so a large client form cannot fill the pipe
        // while stdout is not being drained.
        let writer = match (input, child.stdin.take()) {
            (Some(data), Some(mut stdin)) => {
                let data = data.to_vec();
                Some(tokio::spawn(async move { stdin.write_all(&data).await }))
            }
            _ => None,
        };

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::CommandTimedOut(command_line.clone()))?
            .map_err(Error::Io)?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code().unwrap_or(-1);

        if let Some(writer) = writer {
            let written = writer.await.map_err(|e| Error::Io(std::io::Error::other(e)))?;
            match written {
                Ok(()) => {}
                Err(e) if exit_code == 0 => return Err(Error::Io(e)),
                Err(e) => debug!("writing stdin to {command_line} failed: {e}"),
            }
        }

        if !options.silent {
            for line in stdout.lines().chain(stderr.lines()) {
                debug!("{line}");
            }
        }

        let output = CommandOutput {
            exit_code,
            stdout,
            stderr,
        };

        if exit_code != 0 && !options.allow_non_zero_exit {
            return Err(Error::CommandFailed {
                command: command_line,
                exit_code,
                output: output.text(),
            });
        }

        Ok(output)
    }
}
