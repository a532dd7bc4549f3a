//! Model backends and the stage invoker.
//!
//! Every pipeline stage is one call of the form
//! `(system instructions, variable text) -> text`. The backend is a
//! user-configured collaborator: either a local command that reads the prompt
//! on stdin (e.g. `llm`, `ollama run`, `claude -p`) or an OpenAI-compatible
//! chat completion endpoint. Neither retries; a failure surfaces as a
//! [`BackendError`] to the caller.

use crate::config::BackendConfig;
use crate::error::{BackendError, StageError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// External model collaborator.
pub trait ModelBackend {
    fn complete(&self, system: &str, input: &str) -> Result<String, BackendError>;
}

/// Template variables bound for one stage invocation.
pub type TemplateVars = BTreeMap<&'static str, String>;

/// A fixed system prompt plus one named variable input.
#[derive(Debug, Clone, Copy)]
pub struct Stage {
    pub name: &'static str,
    pub instructions: &'static str,
    pub variable: &'static str,
}

impl Stage {
    pub const fn new(name: &'static str, instructions: &'static str, variable: &'static str) -> Self {
        Self {
            name,
            instructions,
            variable,
        }
    }

    /// Bind the stage variable and call the backend once.
    pub fn invoke(
        &self,
        backend: &dyn ModelBackend,
        vars: &TemplateVars,
    ) -> Result<String, StageError> {
        let input = vars.get(self.variable).ok_or(StageError::MissingVariable {
            stage: self.name,
            name: self.variable,
        })?;

        let start = Instant::now();
        let result = backend.complete(self.instructions, input);
        let elapsed_ms = start.elapsed().as_millis();

        match &result {
            Ok(text) => tracing::debug!(
                stage = self.name,
                elapsed_ms,
                input_bytes = input.len(),
                response_bytes = text.len(),
                "stage complete"
            ),
            Err(err) => tracing::warn!(stage = self.name, elapsed_ms, error = %err, "stage failed"),
        }
        result.map_err(StageError::from)
    }

    /// Convenience for the common single-variable call.
    pub fn invoke_with(
        &self,
        backend: &dyn ModelBackend,
        value: impl Into<String>,
    ) -> Result<String, StageError> {
        let mut vars = TemplateVars::new();
        vars.insert(self.variable, value.into());
        self.invoke(backend, &vars)
    }
}

/// Backend that pipes the prompt to a local command and reads stdout.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    /// The command to invoke (parsed via shell-words).
    pub command: String,
}

impl CommandBackend {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl ModelBackend for CommandBackend {
    fn complete(&self, system: &str, input: &str) -> Result<String, BackendError> {
        let prompt = format!("{}\n\n{}\n", system.trim(), input);
        invoke_lm_command(&self.command, &prompt)
    }
}

fn invoke_lm_command(command: &str, prompt: &str) -> Result<String, BackendError> {
    let args = shell_words::split(command).map_err(|err| BackendError::InvalidCommand {
        command: command.to_string(),
        message: err.to_string(),
    })?;
    let Some((program, rest)) = args.split_first() else {
        return Err(BackendError::EmptyCommand);
    };

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| BackendError::Spawn {
            program: program.clone(),
            source,
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(prompt.as_bytes())
            .map_err(|source| BackendError::Spawn {
                program: program.clone(),
                source,
            })?;
    }

    let output = child.wait_with_output().map_err(|source| BackendError::Spawn {
        program: program.clone(),
        source,
    })?;
    let elapsed_ms = start.elapsed().as_millis();

    tracing::info!(
        elapsed_ms,
        prompt_bytes = prompt.len(),
        response_bytes = output.stdout.len(),
        "lm invoke complete"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BackendError::CommandFailed {
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    String::from_utf8(output.stdout)
        .map_err(|err| BackendError::Malformed(format!("LM stdout is not UTF-8: {err}")))
}

/// Backend for OpenAI-compatible chat completion endpoints.
pub struct HttpBackend {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpBackend {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            temperature,
            api_key,
        }
    }
}

impl ModelBackend for HttpBackend {
    fn complete(&self, system: &str, input: &str) -> Result<String, BackendError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
        };

        let start = Instant::now();
        let mut request = self.agent.post(self.endpoint.as_str());
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        let mut response = request
            .send_json(&body)
            .map_err(|err| BackendError::Http(err.to_string()))?;
        let parsed: ChatResponse = response
            .body_mut()
            .read_json()
            .map_err(|err| BackendError::Malformed(err.to_string()))?;
        let elapsed_ms = start.elapsed().as_millis();

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::Malformed("response has no message content".to_string()))?;

        tracing::info!(
            elapsed_ms,
            model = %self.model,
            prompt_bytes = system.len() + input.len(),
            response_bytes = content.len(),
            "lm invoke complete"
        );
        Ok(content)
    }
}

/// Build the backend described by a resolved config.
pub fn build_backend(config: &BackendConfig) -> Box<dyn ModelBackend> {
    match config {
        BackendConfig::Command { command } => Box::new(CommandBackend::new(command.clone())),
        BackendConfig::Http {
            endpoint,
            model,
            temperature,
            api_key_env,
            timeout_secs,
        } => {
            let api_key = std::env::var(api_key_env).ok().filter(|key| !key.is_empty());
            if api_key.is_none() {
                tracing::warn!(api_key_env = %api_key_env, "no API key set for HTTP backend");
            }
            Box::new(HttpBackend::new(
                endpoint.clone(),
                model.clone(),
                *temperature,
                api_key,
                Duration::from_secs(*timeout_secs),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Echo {
        calls: RefCell<Vec<(String, String)>>,
    }

    impl ModelBackend for Echo {
        fn complete(&self, system: &str, input: &str) -> Result<String, BackendError> {
            self.calls
                .borrow_mut()
                .push((system.to_string(), input.to_string()));
            Ok(format!("echo: {input}"))
        }
    }

    struct Down;

    impl ModelBackend for Down {
        fn complete(&self, _system: &str, _input: &str) -> Result<String, BackendError> {
            Err(BackendError::Http("connection refused".to_string()))
        }
    }

    const STAGE: Stage = Stage::new("plan", "You plan.", "user_goal");

    #[test]
    fn invoke_binds_named_variable() {
        let backend = Echo {
            calls: RefCell::new(Vec::new()),
        };
        let mut vars = TemplateVars::new();
        vars.insert("user_goal", "a.mp4: 00:10 ~ 00:20".to_string());
        vars.insert("unused", "ignored".to_string());

        let out = STAGE.invoke(&backend, &vars).expect("invoke");
        assert_eq!(out, "echo: a.mp4: 00:10 ~ 00:20");
        let calls = backend.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "You plan.");
    }

    #[test]
    fn missing_variable_is_reported_without_calling_backend() {
        let backend = Echo {
            calls: RefCell::new(Vec::new()),
        };
        let err = STAGE
            .invoke(&backend, &TemplateVars::new())
            .expect_err("missing variable");
        assert!(matches!(
            err,
            StageError::MissingVariable {
                stage: "plan",
                name: "user_goal"
            }
        ));
        assert!(backend.calls.borrow().is_empty());
    }

    #[test]
    fn backend_errors_propagate_once() {
        let err = STAGE.invoke_with(&Down, "goal").expect_err("backend down");
        assert!(matches!(err, StageError::Backend(BackendError::Http(_))));
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = CommandBackend::new("   ")
            .complete("sys", "input")
            .expect_err("empty command");
        assert!(matches!(err, BackendError::EmptyCommand));
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let err = CommandBackend::new("llm 'unterminated")
            .complete("sys", "input")
            .expect_err("bad quoting");
        assert!(matches!(err, BackendError::InvalidCommand { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn command_backend_pipes_prompt_through_stdin() {
        let out = CommandBackend::new("cat")
            .complete("  System text.  ", "Variable text")
            .expect("cat backend");
        assert_eq!(out, "System text.\n\nVariable text\n");
    }

    #[cfg(unix)]
    #[test]
    fn command_backend_reports_failure_status() {
        let err = CommandBackend::new("sh -c 'cat >/dev/null; echo boom >&2; exit 3'")
            .complete("sys", "input")
            .expect_err("failing command");
        match err {
            BackendError::CommandFailed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
