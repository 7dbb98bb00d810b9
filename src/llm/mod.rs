//! Generative-model client for the content pipeline.
//!
//! The pipeline only ever sees the [`ModelClient`] trait: a prompt goes in,
//! best-effort free text comes out. No promise is made that the text is
//! valid structured data — recovering a payload from it is the sanitizer's
//! job (`crate::extract`). The bundled [`OllamaClient`] talks to an
//! Ollama-compatible HTTP endpoint; tests inject scripted clients instead.
//!
//! Client construction is explicit and fallible: a missing or unreachable
//! service fails at [`OllamaClient::connect`] time, not on the first
//! pipeline call.

pub mod retry;

pub use retry::{RetryPolicy, with_retry};

use miette::Diagnostic;
use thiserror::Error;

/// Errors from the model-client subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("model service is not available at {url}")]
    #[diagnostic(
        code(lectern::llm::unavailable),
        help(
            "The model endpoint did not respond to a probe. Start the service \
             (e.g. `ollama serve`) or point OllamaConfig::base_url at a \
             reachable host."
        )
    )]
    Unavailable { url: String },

    #[error("model request failed: {message}")]
    #[diagnostic(
        code(lectern::llm::request_failed),
        help(
            "The request could not be completed. Check that the service is \
             running, the model is pulled, and the network is reachable."
        )
    )]
    RequestFailed { message: String },

    #[error("model service returned server error {status}: {message}")]
    #[diagnostic(
        code(lectern::llm::server_fault),
        help(
            "The provider reported an internal error. These faults are usually \
             transient; the pipeline retries them automatically with backoff."
        )
    )]
    ServerFault { status: u16, message: String },

    #[error("failed to read model response: {message}")]
    #[diagnostic(
        code(lectern::llm::response_error),
        help("The service answered with an unexpected response envelope.")
    )]
    ResponseError { message: String },
}

impl LlmError {
    /// Whether this failure class is worth an automatic retry.
    ///
    /// Only server-side internal errors (5xx) qualify. Everything else is
    /// either permanent (unreachable host, rejected request) or already a
    /// response the caller must deal with.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServerFault { status, .. } if (500..600).contains(status))
    }
}

/// A single request to the generative model.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// The user prompt. All operation parameters are baked into this text.
    pub prompt: String,
    /// Optional system instruction.
    pub system: Option<String>,
    /// Hint that the response should be raw JSON with no surrounding prose.
    /// Best-effort: the sanitizer still assumes the hint may be ignored.
    pub json_mode: bool,
}

impl ModelRequest {
    /// A plain text request.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            json_mode: false,
        }
    }

    /// Attach a system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Request raw JSON output.
    pub fn as_json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// A handle to a generative-model service.
///
/// Implementations are stateless per call and safe to share across
/// concurrent pipeline invocations. Provider-level failures surface as
/// [`LlmError`]; the returned text is best-effort and may not be valid
/// structured data.
pub trait ModelClient: Send + Sync {
    /// Send one prompt and return the raw response text.
    fn generate(&self, request: &ModelRequest) -> Result<String, LlmError>;
}

/// Configuration for the bundled Ollama-compatible client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for the API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 120,
        }
    }
}

/// Client for an Ollama-compatible REST API.
pub struct OllamaClient {
    config: OllamaConfig,
}

impl OllamaClient {
    /// Connect to the configured endpoint.
    ///
    /// Probes `/api/tags` once so that a missing or misconfigured service
    /// fails here, at construction time, rather than partway through a
    /// pipeline run. Every entry point downstream can then assume a
    /// functioning client.
    pub fn connect(config: OllamaConfig) -> Result<Self, LlmError> {
        let url = format!("{}/api/tags", config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(5))
            .build();

        match agent.get(&url).call() {
            Ok(resp) if resp.status() == 200 => Ok(Self { config }),
            Ok(resp) => Err(LlmError::Unavailable {
                url: format!("{} (status {})", config.base_url, resp.status()),
            }),
            Err(_) => Err(LlmError::Unavailable {
                url: config.base_url.clone(),
            }),
        }
    }

    /// The model name being used.
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl ModelClient for OllamaClient {
    fn generate(&self, request: &ModelRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "prompt": request.prompt,
            "stream": false,
        });
        if let Some(system) = &request.system {
            body["system"] = serde_json::Value::String(system.clone());
        }
        if request.json_mode {
            body["format"] = serde_json::Value::String("json".into());
        }

        let body_str = serde_json::to_string(&body).map_err(|e| LlmError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        let resp = match agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body_str)
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, resp)) => {
                let message = resp.into_string().unwrap_or_default();
                return if (500..600).contains(&status) {
                    Err(LlmError::ServerFault { status, message })
                } else {
                    Err(LlmError::RequestFailed {
                        message: format!("status {status}: {message}"),
                    })
                };
            }
            Err(transport) => {
                return Err(LlmError::RequestFailed {
                    message: transport.to_string(),
                });
            }
        };

        let resp_str = resp.into_string().map_err(|e| LlmError::ResponseError {
            message: e.to_string(),
        })?;

        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| LlmError::ResponseError {
                message: e.to_string(),
            })?;

        json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::ResponseError {
                message: "missing 'response' field".into(),
            })
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}
