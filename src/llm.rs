//! Optional LLM collaborator.
//!
//! The client is specified purely by message shapes: callers send a system
//! preamble plus a user prompt and expect text (or JSON) back. No pipeline
//! step requires it; every caller has a deterministic fallback. Two
//! transports are supported: the HTTP messages API and a local CLI in
//! print mode, selected by `llm.use_cli`.

use std::path::Path;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

const API_VERSION: &str = "2023-06-01";
const API_TIMEOUT: Duration = Duration::from_secs(60);
const CLI_TIMEOUT: Duration = Duration::from_secs(120);

/// Environment variable providing the API key when `llm.api_key` is null.
pub const API_KEY_ENV: &str = "METAHUB_API_KEY";

/// Name of the CLI binary used in `use_cli` mode.
const CLI_BIN: &str = "claude";

#[derive(Debug, Clone)]
enum Auth {
    Bearer(String),
    ApiKey(String),
}

#[derive(Debug)]
enum Transport {
    Cli,
    Api { auth: Auth },
}

/// Client for the optional LLM collaborator.
pub struct LlmClient {
    transport: Transport,
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl LlmClient {
    /// Build a client from configuration.
    ///
    /// Credential resolution: CLI mode needs the binary on `PATH`; API mode
    /// takes a bearer token from the configured token file, else an API key
    /// from config or [`API_KEY_ENV`]. Missing credentials fail here, once,
    /// rather than on every request.
    pub fn from_config(config: &Config, store_root: &Path) -> Result<Self> {
        let transport = if config.llm.use_cli && cli_available() {
            Transport::Cli
        } else {
            let token_path = store_root.join(&config.llm.token_file);
            let token = std::fs::read_to_string(&token_path)
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());

            let auth = if let Some(token) = token {
                Auth::Bearer(token)
            } else if let Some(key) = config
                .llm
                .api_key
                .clone()
                .or_else(|| std::env::var(API_KEY_ENV).ok())
                .filter(|k| !k.is_empty())
            {
                Auth::ApiKey(key)
            } else {
                return Err(Error::AuthMissing);
            };
            Transport::Api { auth }
        };

        let http = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| Error::Llm(e.to_string()))?;

        Ok(Self {
            transport,
            base_url: config.llm.base_url.trim_end_matches('/').to_string(),
            model: config.llm.model.clone(),
            http,
        })
    }

    /// Send a message and return the raw text response.
    pub async fn send_message(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        match &self.transport {
            Transport::Cli => self.call_cli(system, prompt).await,
            Transport::Api { auth } => self.call_api(auth, system, prompt, max_tokens).await,
        }
    }

    /// Send a message and parse the response as JSON, tolerating a fenced
    /// code block around the payload.
    pub async fn send_json(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<Value> {
        let text = self.send_message(system, prompt, max_tokens).await?;
        let unfenced = strip_code_fence(text.trim());
        serde_json::from_str(unfenced).map_err(|e| {
            let head: String = unfenced.chars().take(200).collect();
            Error::Llm(format!("response is not valid JSON ({e}): {head}"))
        })
    }

    async fn call_api(
        &self,
        auth: &Auth,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "system": system,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut request = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("anthropic-version", API_VERSION)
            .json(&payload);
        request = match auth {
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::ApiKey(key) => request.header("x-api-key", key),
        };

        let response = request.send().await.map_err(|e| Error::Llm(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let head: String = body.chars().take(200).collect();
            return Err(Error::Llm(format!("API returned {status}: {head}")));
        }

        let data: Value = response.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        let text = data["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        debug!(model = %self.model, chars = text.len(), "llm response received");
        Ok(text)
    }

    async fn call_cli(&self, system: &str, prompt: &str) -> Result<String> {
        let full_prompt = if system.is_empty() {
            prompt.to_string()
        } else {
            format!("System: {system}\n\nUser: {prompt}")
        };

        let mut child = tokio::process::Command::new(CLI_BIN)
            .arg("-p")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Llm(format!("could not spawn {CLI_BIN}: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(full_prompt.as_bytes())
                .await
                .map_err(|e| Error::Llm(e.to_string()))?;
        }

        let output = tokio::time::timeout(CLI_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| Error::Llm(format!("{CLI_BIN} timed out after {}s", CLI_TIMEOUT.as_secs())))?
            .map_err(|e| Error::Llm(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let head: String = stderr.chars().take(200).collect();
            return Err(Error::Llm(format!("{CLI_BIN} exited with error: {head}")));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn cli_available() -> bool {
    std::process::Command::new(CLI_BIN)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Strip a surrounding markdown code fence (```json … ```), returning the
/// inner payload. Text without a leading fence is returned unchanged.
fn strip_code_fence(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    let after_fence = match text.find('\n') {
        Some(idx) => &text[idx + 1..],
        None => return text,
    };
    match after_fence.find("```") {
        Some(end) => after_fence[..end].trim(),
        None => after_fence.trim(),
    }
}
