//! Error taxonomy for stage invocations and collaborators.
//!
//! `BackendError` covers every call that leaves the process (model backend or
//! media executor). `StageError` adds the one failure a stage can produce on
//! its own: a template variable the caller forgot to bind.
use thiserror::Error;

/// Failure of an external collaborator call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("LM command is empty")]
    EmptyCommand,

    #[error("parse command `{command}`: {message}")]
    InvalidCommand { command: String, message: String },

    #[error("spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("LM command failed with status {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("model request failed: {0}")]
    Http(String),

    #[error("malformed model response: {0}")]
    Malformed(String),

    #[error("executor failed: {0}")]
    Executor(String),
}

/// Failure of a single stage invocation.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage `{stage}` is missing template variable `{name}`")]
    MissingVariable { stage: &'static str, name: &'static str },

    #[error(transparent)]
    Backend(#[from] BackendError),
}
