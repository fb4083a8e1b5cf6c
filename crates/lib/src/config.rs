//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.agentbridge/config.json`) and
//! environment. Secrets usually come from the environment; missing values do not
//! stop the gateway from starting, they fail the requests that need them.

use crate::agent::AgentSettings;
use crate::slack::SLACK_API_BASE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Webhook server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Slack app credentials.
    #[serde(default)]
    pub slack: SlackConfig,

    /// Agent endpoint identity and key.
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Gateway bind, port, and webhook route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 3000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Route Slack posts events to (default "/api/events").
    #[serde(default = "default_events_path")]
    pub events_path: String,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_events_path() -> String {
    "/api/events".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            events_path: default_events_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    /// Bot token (xoxb-…). Overridden by SLACK_BOT_TOKEN.
    pub bot_token: Option<String>,
    /// Signing secret. Overridden by SLACK_SIGNING_SECRET.
    pub signing_secret: Option<String>,
    /// Web API base URL (default https://slack.com/api).
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Overridden by OWNER_LOGIN.
    pub owner_login: Option<String>,
    /// Overridden by AGENT_NAME.
    pub agent_name: Option<String>,
    /// Overridden by LANGBASE_API_KEY.
    pub api_key: Option<String>,
    /// Agent API base URL (default https://api.langbase.com).
    pub api_base: Option<String>,
}

/// Non-blank env value wins over a non-blank file value.
fn pick(env_value: Option<String>, file_value: &Option<String>) -> Option<String> {
    env_value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            file_value
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

fn env_or(var: &str, file_value: &Option<String>) -> Option<String> {
    pick(std::env::var(var).ok(), file_value)
}

/// Resolve the Slack bot token: env SLACK_BOT_TOKEN overrides config.
pub fn resolve_bot_token(config: &Config) -> Option<String> {
    env_or("SLACK_BOT_TOKEN", &config.slack.bot_token)
}

/// Resolve the signing secret: env SLACK_SIGNING_SECRET overrides config.
pub fn resolve_signing_secret(config: &Config) -> Option<String> {
    env_or("SLACK_SIGNING_SECRET", &config.slack.signing_secret)
}

pub fn resolve_slack_api_base(config: &Config) -> String {
    pick(None, &config.slack.api_base).unwrap_or_else(|| SLACK_API_BASE.to_string())
}

/// Agent settings with OWNER_LOGIN, AGENT_NAME and LANGBASE_API_KEY applied.
pub fn resolve_agent_settings(config: &Config) -> AgentSettings {
    AgentSettings {
        owner_login: env_or("OWNER_LOGIN", &config.agent.owner_login),
        agent_name: env_or("AGENT_NAME", &config.agent.agent_name),
        api_key: env_or("LANGBASE_API_KEY", &config.agent.api_key),
        api_base: pick(None, &config.agent.api_base),
    }
}

/// Names of required values that resolve to nothing, for startup warnings.
pub fn missing_values(config: &Config) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if resolve_bot_token(config).is_none() {
        missing.push("slack.botToken (SLACK_BOT_TOKEN)");
    }
    if resolve_signing_secret(config).is_none() {
        missing.push("slack.signingSecret (SLACK_SIGNING_SECRET)");
    }
    for name in resolve_agent_settings(config).missing() {
        missing.push(match name {
            "ownerLogin" => "agent.ownerLogin (OWNER_LOGIN)",
            "agentName" => "agent.agentName (AGENT_NAME)",
            _ => "agent.apiKey (LANGBASE_API_KEY)",
        });
    }
    missing
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("AGENTBRIDGE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".agentbridge").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, or the default path (or AGENTBRIDGE_CONFIG_PATH).
/// Missing file => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
