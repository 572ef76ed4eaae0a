//! External command execution
//!
//! Every interaction with the container runtime or the database client goes
//! through a [`CommandExecutor`]. Commands are structured argument vectors,
//! never shell strings, so names and addresses are passed through verbatim.

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors reported by a single command invocation
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {}", format_code(.code), .stderr.trim())]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn format_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl ExecutionError {
    /// Captured standard error, empty when the process never ran
    pub fn stderr(&self) -> &str {
        match self {
            ExecutionError::Failed { stderr, .. } => stderr,
            _ => "",
        }
    }

    /// Exit status of the process, if it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionError::Failed { code, .. } => *code,
            _ => None,
        }
    }
}

/// A fully formed command: program, argument vector, extra environment and
/// optional content piped to stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
        }
    }

    /// A `docker` invocation with the given arguments
    pub fn docker(args: Vec<String>) -> Self {
        Self::new("docker").with_args(args)
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

/// Renders the command line for logs and error messages.
/// Environment values are never printed.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Runs one external command and reports its outcome.
///
/// Implementations perform no retries and make no judgment about whether a
/// failure is fatal; that decision belongs to the caller.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run the command to completion, returning captured stdout on a zero exit status
    async fn execute(&self, command: &CommandSpec) -> Result<String, ExecutionError>;
}

/// Executor backed by real child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, command: &CommandSpec) -> Result<String, ExecutionError> {
        let command_line = command.to_string();
        debug!("Executing: {}", command_line);

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        // Feed stdin from a separate task so stdout/stderr keep draining while
        // a large script is still being written.
        let writer = match (child.stdin.take(), command.stdin.clone()) {
            (Some(mut pipe), Some(input)) => Some(tokio::spawn(async move {
                pipe.write_all(&input).await?;
                pipe.shutdown().await
            })),
            _ => None,
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ExecutionError::Io {
                command: command_line.clone(),
                source,
            })?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                // The process exited without reading everything; its status says why.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("stdin closed early by `{}`", command_line);
                }
                Ok(Err(source)) => {
                    return Err(ExecutionError::Io {
                        command: command_line,
                        source,
                    })
                }
                Err(e) => warn!("stdin writer for `{}` did not complete: {}", command_line, e),
            }
        }

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(ExecutionError::Failed {
                command: command_line,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

// ============================================================================
// Test helpers
// ============================================================================
