//! Generation oracle adapters.
//!
//! The oracle is an external collaborator: it receives a prompt and answers
//! with the source of an extraction rule. Two adapters are provided, one that
//! pipes the prompt through a local command and one that talks to an HTTP
//! messages endpoint.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::OracleConfig;
use crate::errors::{CodeMapError, Result};

/// Produces text for a prompt.
pub trait GenerationOracle {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Runs a program with the prompt on stdin and reads the answer from stdout.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    unset_env: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            unset_env: Vec::new(),
            working_dir: None,
        }
    }

    /// Environment variables removed from the child's environment.
    pub fn unset_env(mut self, vars: Vec<String>) -> Self {
        self.unset_env = vars;
        self
    }

    pub fn working_dir(mut self, dir: &Path) -> Self {
        self.working_dir = Some(dir.to_path_buf());
        self
    }
}

impl GenerationOracle for CommandOracle {
    fn generate(&self, prompt: &str) -> Result<String> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for var in &self.unset_env {
            command.env_remove(var);
        }
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| CodeMapError::OracleUnavailable {
                message: format!("failed to spawn '{}': {}", self.program, e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .map_err(|e| CodeMapError::OracleFailure {
                    message: format!("failed to write prompt: {}", e),
                })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| CodeMapError::OracleFailure {
                message: format!("failed to wait for '{}': {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(CodeMapError::OracleFailure {
                message: format!(
                    "'{}' exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(CodeMapError::OracleFailure {
                message: format!("'{}' produced no output", self.program),
            });
        }
        Ok(text)
    }
}

/// Sends the prompt to a messages-style HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    endpoint: String,
    model: String,
    api_key_env: String,
    max_tokens: u32,
    timeout: Duration,
}

impl HttpOracle {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key_env: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key_env: api_key_env.into(),
            max_tokens,
            timeout,
        }
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        })
    }
}

impl GenerationOracle for HttpOracle {
    fn generate(&self, prompt: &str) -> Result<String> {
        let api_key =
            std::env::var(&self.api_key_env).map_err(|_| CodeMapError::OracleUnavailable {
                message: format!("environment variable {} is not set", self.api_key_env),
            })?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build()
            .into();

        let mut response = agent
            .post(&self.endpoint)
            .header("x-api-key", &api_key)
            .header("anthropic-version", "2023-06-01")
            .send_json(self.request_body(prompt))
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => CodeMapError::OracleFailure {
                    message: format!("{} returned HTTP {}", self.endpoint, code),
                },
                other => CodeMapError::OracleUnavailable {
                    message: format!("request to {} failed: {}", self.endpoint, other),
                },
            })?;

        let body: Value =
            response
                .body_mut()
                .read_json()
                .map_err(|e| CodeMapError::OracleFailure {
                    message: format!("malformed response body: {}", e),
                })?;

        response_text(&body).ok_or_else(|| CodeMapError::OracleFailure {
            message: "response has no text content".to_string(),
        })
    }
}

/// Text of the first `text` content block of a messages response.
fn response_text(body: &Value) -> Option<String> {
    body.get("content")?
        .as_array()?
        .iter()
        .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))?
        .get("text")?
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Builds the oracle described by the configuration, or `None` when synthesis
/// is disabled.
pub fn oracle_from_config(
    config: &OracleConfig,
    project_root: &Path,
) -> Option<Box<dyn GenerationOracle>> {
    match config {
        OracleConfig::Command {
            program,
            args,
            unset_env,
        } => Some(Box::new(
            CommandOracle::new(program.clone(), args.clone())
                .unset_env(unset_env.clone())
                .working_dir(project_root),
        )),
        OracleConfig::Http {
            endpoint,
            model,
            api_key_env,
            max_tokens,
            timeout_secs,
        } => Some(Box::new(HttpOracle::new(
            endpoint.clone(),
            model.clone(),
            api_key_env.clone(),
            *max_tokens,
            Duration::from_secs(*timeout_secs),
        ))),
        OracleConfig::Disabled => None,
    }
}
