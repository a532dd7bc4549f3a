//! Shared test doubles for the model backend and the media executor.

use clipagent::context::ExecutionContext;
use clipagent::error::BackendError;
use clipagent::executor::{ExecutionResult, Executor};
use clipagent::lm::ModelBackend;
use clipagent::prompts::{
    GENERATE_STAGE, INTERPRET_STAGE, PLAN_STAGE, STRUCTURE_STAGE, TASKIFY_STAGE,
};
use std::cell::RefCell;

/// Name of the stage whose instructions were sent.
pub fn stage_name(system: &str) -> &'static str {
    [
        PLAN_STAGE,
        TASKIFY_STAGE,
        INTERPRET_STAGE,
        STRUCTURE_STAGE,
        GENERATE_STAGE,
    ]
    .iter()
    .find(|stage| stage.instructions == system)
    .map(|stage| stage.name)
    .unwrap_or("unknown")
}

/// Task text carried by a generate-stage input.
pub fn context_task(input: &str) -> String {
    let context: ExecutionContext =
        serde_json::from_str(input).expect("generate input is a packed context");
    context.task_text
}

type Responder = Box<dyn Fn(&str, &str) -> Result<String, BackendError>>;

/// Backend answering through a closure of `(stage name, variable text)`.
pub struct ScriptedBackend {
    respond: Responder,
    pub calls: RefCell<Vec<(&'static str, String)>>,
}

impl ScriptedBackend {
    pub fn new(respond: impl Fn(&str, &str) -> Result<String, BackendError> + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn stages(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(|(stage, _)| *stage).collect()
    }
}

impl ModelBackend for ScriptedBackend {
    fn complete(&self, system: &str, input: &str) -> Result<String, BackendError> {
        let stage = stage_name(system);
        self.calls.borrow_mut().push((stage, input.to_string()));
        (self.respond)(stage, input)
    }
}

/// Executor that records commands instead of running them.
pub struct RecordingExecutor {
    pub commands: RefCell<Vec<String>>,
    fail_on: Option<String>,
    exit_code: i32,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            commands: RefCell::new(Vec::new()),
            fail_on: None,
            exit_code: 0,
        }
    }

    /// Return `BackendError::Executor` for commands containing `needle`.
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            ..Self::new()
        }
    }

    pub fn exiting_with(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::new()
        }
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, command: &str) -> Result<ExecutionResult, BackendError> {
        self.commands.borrow_mut().push(command.to_string());
        if let Some(needle) = &self.fail_on {
            if command.contains(needle.as_str()) {
                return Err(BackendError::Executor(format!("cannot run {needle}")));
            }
        }
        Ok(ExecutionResult {
            command: command.to_string(),
            program: "/usr/bin/ffmpeg".to_string(),
            exit_code: Some(self.exit_code),
            success: self.exit_code == 0,
            stdout: String::new(),
            stderr: if self.exit_code == 0 {
                String::new()
            } else {
                "Invalid argument".to_string()
            },
            duration_ms: 1,
        })
    }
}
