//! Agent invoker: send the assembled conversation to the external agent and
//! return its reply.
//!
//! Endpoint: `POST {api_base}/{owner_login}/{agent_name}` with a bearer key and
//! `{ "input": <text> }`. Every path returns a `Result`; nothing panics or
//! escapes this boundary.

use async_trait::async_trait;
use serde::Serialize;

pub const DEFAULT_AGENT_API_BASE: &str = "https://api.langbase.com";

/// Object fields searched (in order) for the reply text.
const TEXT_FIELDS: [&str; 4] = ["completion", "output", "text", "answer"];

/// Agent call failed. `Display` is the text shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Configuration error: Missing required environment variables")]
    Config { missing: Vec<&'static str> },
    #[error("Invalid input: Content cannot be empty")]
    InvalidInput,
    #[error("Something went wrong while running the agent")]
    Request(#[from] reqwest::Error),
    #[error("Something went wrong while running the agent ({reason})")]
    Upstream { status: u16, reason: String },
    #[error("Failed to parse agent response")]
    Parse(#[source] serde_json::Error),
    #[error("Empty response received")]
    EmptyResponse,
}

/// Successful agent response: the parsed body.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub payload: serde_json::Value,
}

impl AgentReply {
    /// Text to display: a string body as-is, a known text field of an object,
    /// or the compact JSON otherwise.
    pub fn text(&self) -> String {
        match &self.payload {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => TEXT_FIELDS
                .iter()
                .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| self.payload.to_string()),
            other => other.to_string(),
        }
    }
}

/// Runs the agent on a block of conversation text.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, content: &str) -> Result<AgentReply, AgentError>;
}

/// Agent identity and credentials; all three are required per call.
#[derive(Debug, Clone, Default)]
pub struct AgentSettings {
    pub owner_login: Option<String>,
    pub agent_name: Option<String>,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

/// Validated settings.
struct Endpoint<'a> {
    url: String,
    api_key: &'a str,
}

impl AgentSettings {
    fn endpoint(&self) -> Result<Endpoint<'_>, AgentError> {
        let owner = non_blank(&self.owner_login);
        let agent = non_blank(&self.agent_name);
        let key = non_blank(&self.api_key);
        match (owner, agent, key) {
            (Some(owner), Some(agent), Some(api_key)) => {
                let base = self
                    .api_base
                    .as_deref()
                    .map(|b| b.trim_end_matches('/'))
                    .filter(|b| !b.is_empty())
                    .unwrap_or(DEFAULT_AGENT_API_BASE);
                Ok(Endpoint {
                    url: format!("{}/{}/{}", base, owner, agent),
                    api_key,
                })
            }
            _ => {
                let mut missing = Vec::new();
                if owner.is_none() {
                    missing.push("ownerLogin");
                }
                if agent.is_none() {
                    missing.push("agentName");
                }
                if key.is_none() {
                    missing.push("apiKey");
                }
                Err(AgentError::Config { missing })
            }
        }
    }

    /// Names of missing required settings (empty when complete).
    pub fn missing(&self) -> Vec<&'static str> {
        match self.endpoint() {
            Err(AgentError::Config { missing }) => missing,
            _ => Vec::new(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Serialize)]
struct AgentRequest<'a> {
    input: &'a str,
}

/// HTTP client for the agent endpoint.
#[derive(Clone)]
pub struct AgentClient {
    settings: AgentSettings,
    client: reqwest::Client,
}

impl AgentClient {
    pub fn new(settings: AgentSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }
}

/// JavaScript-style falsy: what the agent service uses to mean "no answer".
fn is_falsy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Bool(b) => !b,
        serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl AgentRunner for AgentClient {
    async fn run(&self, content: &str) -> Result<AgentReply, AgentError> {
        let endpoint = self.settings.endpoint().map_err(|e| {
            log::error!("agent: not configured: {:?}", e);
            e
        })?;
        if content.trim().is_empty() {
            return Err(AgentError::InvalidInput);
        }

        let res = self
            .client
            .post(&endpoint.url)
            .bearer_auth(endpoint.api_key)
            .json(&AgentRequest { input: content })
            .send()
            .await
            .map_err(|e| {
                log::warn!("agent: request failed: {}", e);
                AgentError::Request(e)
            })?;
        let status = res.status();
        if !status.is_success() {
            let reason = status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string();
            log::warn!("agent: request failed: {} {}", status.as_u16(), reason);
            return Err(AgentError::Upstream {
                status: status.as_u16(),
                reason,
            });
        }

        let body = res.bytes().await?;
        let payload: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
            log::warn!("agent: failed to parse response: {}", e);
            AgentError::Parse(e)
        })?;
        if is_falsy(&payload) {
            return Err(AgentError::EmptyResponse);
        }
        let reply = AgentReply { payload };
        if reply.text().trim().is_empty() {
            return Err(AgentError::EmptyResponse);
        }
        Ok(reply)
    }
}
