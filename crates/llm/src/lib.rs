//! ParcelScope knowledge collaborator over the Anthropic Messages API.
//!
//! Implements [`pipeline::KnowledgeCollaborator`]. Additional providers are
//! added as new types in this crate without any changes to the `pipeline`
//! crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, response parsing
//! and error classification live here. The [`pipeline`] crate sees only
//! [`pipeline::KnowledgeCollaborator`] and [`pipeline::CollaboratorError`].
//!
//! ## Error mapping
//!
//! | Condition | `CollaboratorError` |
//! |-----------|---------------------|
//! | Connection failure | `Unavailable` |
//! | Request timeout | `Timeout` |
//! | HTTP 429 / 5xx | `Unavailable` (with `retry-after` when sent) |
//! | Other HTTP 4xx | `InvalidResponse` |
//! | Undecodable body / no text content | `InvalidResponse` |

mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use pipeline::{Collaborator, CollaboratorError, KnowledgeCollaborator, LandParcel};

pub use prompt::{analysis_prompt, SYSTEM_PROMPT};

/// Default Messages API origin.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

/// API version header value sent with every request.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const COLLABORATOR: Collaborator = Collaborator::Knowledge;

/// Longest slice of an error body carried into a [`CollaboratorError`].
const ERROR_BODY_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection and sampling settings for [`AnthropicKnowledge`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    /// Origin of the Messages API, without a trailing path.
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Transport-level bound on one HTTP exchange.
    pub request_timeout: Duration,
}

impl AnthropicConfig {
    /// Settings with the given key and the service defaults for everything else.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 4096,
            temperature: 0.1,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Errors constructing an [`AnthropicKnowledge`].
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Anthropic API key is empty")]
    MissingApiKey,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`KnowledgeCollaborator`] backed by the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicKnowledge {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicKnowledge {
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn transport_error(&self, err: reqwest::Error) -> CollaboratorError {
        if err.is_timeout() {
            CollaboratorError::Timeout {
                collaborator: COLLABORATOR,
                after: self.config.request_timeout,
            }
        } else if err.is_decode() {
            CollaboratorError::invalid_response(COLLABORATOR, err.to_string())
        } else {
            CollaboratorError::unavailable(COLLABORATOR, err.to_string())
        }
    }
}

#[async_trait]
impl KnowledgeCollaborator for AnthropicKnowledge {
    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn analyze(&self, parcel: &LandParcel) -> Result<String, CollaboratorError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: analysis_prompt(parcel),
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "messages request rejected");
            return Err(CollaboratorError::from_http_status(
                COLLABORATOR,
                status.as_u16(),
                retry_after,
                &truncate(&body, ERROR_BODY_LIMIT),
            ));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;

        let text = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(CollaboratorError::invalid_response(
                COLLABORATOR,
                "response contained no text content",
            ));
        }
        debug!(chars = text.len(), "knowledge analysis received");
        Ok(text)
    }
}

/// Parses a `retry-after` header given in whole seconds.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
