//! Turn a free-form clip editing goal into media tool commands.
//!
//! A run plans with a language model, parses the plan into numbered tasks,
//! classifies each task, and for executable ones generates, resolves and runs
//! a single command. Every task leaves one entry in the run report.
pub mod capability;
pub mod config;
pub mod context;
pub mod dsl;
pub mod error;
pub mod executor;
pub mod intent;
pub mod lm;
pub mod orchestrator;
pub mod paths;
pub mod pipeline;
pub mod prompts;
pub mod run;
pub mod util;

pub use capability::{Capability, AFFIRMATIVE_MARKER};
pub use error::{BackendError, StageError};
pub use orchestrator::{Orchestrator, RunOptions};
pub use run::{ExecutionLogEntry, RunReport, TaskState};
