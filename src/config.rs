//! Agent configuration.
//!
//! A single JSON file selects the model backend, the directories used for path
//! resolution, and the media tool the executor is allowed to run. Every field
//! has a default so a missing file is a valid configuration.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Environment variable consulted for the LM command when neither the CLI nor
/// the config file names one.
pub const LM_COMMAND_ENV: &str = "CLIPAGENT_LM_COMMAND";

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_PROGRAM: &str = "ffmpeg";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub schema_version: u32,
    #[serde(default)]
    pub backend: Option<BackendConfig>,
    #[serde(default)]
    pub paths: PathEnv,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Local command reading the prompt on stdin (parsed via shell-words).
    Command { command: String },
    /// OpenAI-compatible chat completion endpoint.
    Http {
        #[serde(default = "default_endpoint")]
        endpoint: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_temperature")]
        temperature: f32,
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

/// Directory roots for logical file references in generated commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathEnv {
    #[serde(default)]
    pub input_dir: Option<PathBuf>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    #[serde(default = "default_program")]
    pub program: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_program() -> String {
    DEFAULT_PROGRAM.to_string()
}

/// Default HTTP backend (chat completions, low temperature).
pub fn default_http_backend() -> BackendConfig {
    BackendConfig::Http {
        endpoint: default_endpoint(),
        model: default_model(),
        temperature: default_temperature(),
        api_key_env: default_api_key_env(),
        timeout_secs: default_timeout_secs(),
    }
}

pub fn default_config() -> AgentConfig {
    AgentConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        backend: None,
        paths: PathEnv::default(),
        executor: ExecutorConfig::default(),
    }
}

/// `<config dir>/clipagent/config.json`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("clipagent").join("config.json"))
}

pub fn load_config(path: &Path) -> Result<AgentConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: AgentConfig =
        serde_json::from_slice(&bytes).with_context(|| format!("parse config {}", path.display()))?;
    validate_config(&config).with_context(|| format!("validate config {}", path.display()))?;
    Ok(config)
}

/// Load the explicit config, else the default location if present, else
/// built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<AgentConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match default_config_path().filter(|path| path.is_file()) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading default config");
            load_config(&path)
        }
        None => Ok(default_config()),
    }
}

/// Pick the backend: explicit LM command > config file > environment > HTTP
/// default.
pub fn resolve_backend(config: &AgentConfig, lm_override: Option<&str>) -> BackendConfig {
    resolve_backend_with_env(config, lm_override, std::env::var(LM_COMMAND_ENV).ok())
}

fn resolve_backend_with_env(
    config: &AgentConfig,
    lm_override: Option<&str>,
    env_command: Option<String>,
) -> BackendConfig {
    if let Some(command) = lm_override.filter(|command| !command.trim().is_empty()) {
        return BackendConfig::Command {
            command: command.to_string(),
        };
    }
    if let Some(backend) = &config.backend {
        return backend.clone();
    }
    if let Some(command) = env_command.filter(|command| !command.trim().is_empty()) {
        return BackendConfig::Command { command };
    }
    default_http_backend()
}

pub fn validate_config(config: &AgentConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    match &config.backend {
        Some(BackendConfig::Command { command }) if command.trim().is_empty() => {
            return Err(anyhow!("backend.command must be non-empty"));
        }
        Some(BackendConfig::Http {
            endpoint,
            model,
            temperature,
            ..
        }) => {
            if endpoint.trim().is_empty() {
                return Err(anyhow!("backend.endpoint must be non-empty"));
            }
            if model.trim().is_empty() {
                return Err(anyhow!("backend.model must be non-empty"));
            }
            if !(0.0..=2.0).contains(temperature) {
                return Err(anyhow!(
                    "backend.temperature must be within 0.0..=2.0 (got {temperature})"
                ));
            }
        }
        _ => {}
    }
    if config.executor.program.trim().is_empty() {
        return Err(anyhow!("executor.program must be non-empty"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
