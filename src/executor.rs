//! External media tool execution.
//!
//! The executor runs one resolved command and reports what happened. A
//! non-zero exit status is a result, not an error; only failing to run the
//! command at all is a [`BackendError`].
use crate::error::BackendError;
use crate::util::truncate_string;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

/// Captured output is bounded so one noisy run cannot bloat the report.
const MAX_CAPTURE_BYTES: usize = 64 * 1024;

/// Outcome of running one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub command: String,
    pub program: String,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

pub trait Executor {
    fn execute(&self, command: &str) -> Result<ExecutionResult, BackendError>;
}

/// Runs commands for a single allowed program (by default `ffmpeg`).
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn resolve_program(&self, requested: &str) -> Result<PathBuf, BackendError> {
        if program_stem(requested) != program_stem(&self.program) {
            return Err(BackendError::Executor(format!(
                "command runs `{requested}`, expected `{}`",
                self.program
            )));
        }
        let path = Path::new(requested);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        which::which(&self.program).map_err(|err| {
            BackendError::Executor(format!("`{}` not found on PATH: {err}", self.program))
        })
    }
}

fn program_stem(program: &str) -> &str {
    Path::new(program)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(program)
}

impl Executor for ProcessExecutor {
    fn execute(&self, command: &str) -> Result<ExecutionResult, BackendError> {
        let args = shell_words::split(command).map_err(|err| BackendError::InvalidCommand {
            command: command.to_string(),
            message: err.to_string(),
        })?;
        let Some((requested, rest)) = args.split_first() else {
            return Err(BackendError::Executor("command is empty".to_string()));
        };
        let program = self.resolve_program(requested)?;

        let start = Instant::now();
        let output = Command::new(&program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| BackendError::Spawn {
                program: program.display().to_string(),
                source,
            })?;
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            program = %program.display(),
            exit_code = output.status.code(),
            duration_ms,
            "media command finished"
        );

        Ok(ExecutionResult {
            command: command.to_string(),
            program: program.display().to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: truncate_string(&String::from_utf8_lossy(&output.stdout), MAX_CAPTURE_BYTES),
            stderr: truncate_string(&String::from_utf8_lossy(&output.stderr), MAX_CAPTURE_BYTES),
            duration_ms,
        })
    }
}
