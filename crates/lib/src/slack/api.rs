//! Slack Web API seam: the calls the orchestrator makes against the chat platform.
//!
//! Components take `&dyn SlackApi` so the HTTP client can be swapped for a test double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error from a Slack Web API call.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("slack bot token not configured")]
    MissingToken,
    #[error("slack request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{method} failed: http {status}")]
    Http { method: &'static str, status: u16 },
    #[error("{method} failed: {error}")]
    Api { method: &'static str, error: String },
    #[error("{method} response is missing {field}")]
    MissingField {
        method: &'static str,
        field: &'static str,
    },
}

/// A message as returned by `conversations.replies` / `conversations.history`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryMessage {
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl HistoryMessage {
    /// True when the message was authored by any bot (including this one).
    pub fn is_bot(&self) -> bool {
        self.bot_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Layout block attached to a posted message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { text: BlockText },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockText {
    Mrkdwn { text: String },
}

impl Block {
    /// A single `section` block rendering `text` as Slack markdown.
    pub fn markdown_section(text: impl Into<String>) -> Self {
        Block::Section {
            text: BlockText::Mrkdwn { text: text.into() },
        }
    }
}

/// `chat.postMessage` arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostMessage {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfurl_links: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

impl PostMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            thread_ts: None,
            text: text.into(),
            unfurl_links: None,
            blocks: Vec::new(),
        }
    }

    /// Post as a reply under the given thread anchor.
    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }

    /// Render the text as a markdown section and disable link unfurling.
    pub fn as_markdown(mut self) -> Self {
        self.blocks = vec![Block::markdown_section(self.text.clone())];
        self.unfurl_links = Some(false);
        self
    }
}

/// Chat-platform calls used by a turn.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// `auth.test`: the bot's own user id.
    async fn auth_test(&self) -> Result<String, PlatformError>;

    /// `chat.postMessage`: returns the new message's timestamp.
    async fn post_message(&self, message: &PostMessage) -> Result<String, PlatformError>;

    /// `chat.update`: replace the text of the message at `ts`.
    async fn update_message(&self, channel: &str, ts: &str, text: &str)
        -> Result<(), PlatformError>;

    /// `conversations.replies`: thread messages in delivery order (anchor first).
    async fn conversation_replies(
        &self,
        channel: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Vec<HistoryMessage>, PlatformError>;

    /// `conversations.history`: latest channel messages as delivered by the platform.
    async fn conversation_history(
        &self,
        channel: &str,
        limit: u32,
    ) -> Result<Vec<HistoryMessage>, PlatformError>;

    /// `assistant.threads.setStatus`: an empty status clears the indicator.
    async fn set_assistant_status(
        &self,
        channel: &str,
        thread_ts: &str,
        status: &str,
    ) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_post_serializes_section_block() {
        let msg = PostMessage::new("C1", "*hi*").in_thread("1.2").as_markdown();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "channel": "C1",
                "thread_ts": "1.2",
                "text": "*hi*",
                "unfurl_links": false,
                "blocks": [{ "type": "section", "text": { "type": "mrkdwn", "text": "*hi*" } }]
            })
        );
    }

    #[test]
    fn plain_post_omits_optional_fields() {
        let json = serde_json::to_value(PostMessage::new("C1", "hello")).unwrap();
        assert_eq!(json, serde_json::json!({ "channel": "C1", "text": "hello" }));
    }

    #[test]
    fn empty_bot_id_is_not_a_bot() {
        let m = HistoryMessage {
            bot_id: Some(String::new()),
            ..Default::default()
        };
        assert!(!m.is_bot());
    }
}
