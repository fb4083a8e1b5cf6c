//! Slack Web API client over HTTPS (bot token, JSON bodies).

use crate::slack::api::{HistoryMessage, PlatformError, PostMessage, SlackApi};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Every Web API response carries `ok` and, on failure, an `error` code.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    data: T,
}

#[derive(Debug, Deserialize)]
struct NoData {}

#[derive(Debug, Deserialize)]
struct PostMessageData {
    #[serde(default)]
    ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthTestData {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesData {
    #[serde(default)]
    messages: Vec<HistoryMessage>,
}

/// Slack client authenticated with a bot token.
#[derive(Clone)]
pub struct SlackClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(token: Option<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| SLACK_API_BASE.to_string());
        Self {
            base_url,
            token,
            client: reqwest::Client::new(),
        }
    }

    fn token(&self) -> Result<&str, PlatformError> {
        self.token.as_deref().ok_or(PlatformError::MissingToken)
    }

    /// POST a JSON body to a Web API method.
    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: &B,
    ) -> Result<T, PlatformError> {
        let url = format!("{}/{}", self.base_url, method);
        let res = self
            .client
            .post(&url)
            .bearer_auth(self.token()?)
            .json(body)
            .send()
            .await?;
        read_response(method, res).await
    }

    /// GET a Web API method with query arguments (read methods).
    async fn get_query<T: DeserializeOwned>(
        &self,
        method: &'static str,
        query: &[(&str, String)],
    ) -> Result<T, PlatformError> {
        let url = format!("{}/{}", self.base_url, method);
        let res = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .query(query)
            .send()
            .await?;
        read_response(method, res).await
    }
}

async fn read_response<T: DeserializeOwned>(
    method: &'static str,
    res: reqwest::Response,
) -> Result<T, PlatformError> {
    if !res.status().is_success() {
        return Err(PlatformError::Http {
            method,
            status: res.status().as_u16(),
        });
    }
    let data: ApiResponse<T> = res.json().await?;
    if !data.ok {
        return Err(PlatformError::Api {
            method,
            error: data.error.unwrap_or_else(|| "unknown_error".to_string()),
        });
    }
    Ok(data.data)
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn auth_test(&self) -> Result<String, PlatformError> {
        let data: AuthTestData = self.post_json("auth.test", &json!({})).await?;
        data.user_id
            .filter(|id| !id.is_empty())
            .ok_or(PlatformError::MissingField {
                method: "auth.test",
                field: "user_id",
            })
    }

    async fn post_message(&self, message: &PostMessage) -> Result<String, PlatformError> {
        let data: PostMessageData = self.post_json("chat.postMessage", message).await?;
        data.ts.filter(|ts| !ts.is_empty()).ok_or(PlatformError::MissingField {
            method: "chat.postMessage",
            field: "ts",
        })
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
    ) -> Result<(), PlatformError> {
        let body = json!({ "channel": channel, "ts": ts, "text": text });
        let _: NoData = self.post_json("chat.update", &body).await?;
        Ok(())
    }

    async fn conversation_replies(
        &self,
        channel: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Vec<HistoryMessage>, PlatformError> {
        let query = [
            ("channel", channel.to_string()),
            ("ts", thread_ts.to_string()),
            ("limit", limit.to_string()),
        ];
        let data: MessagesData = self.get_query("conversations.replies", &query).await?;
        Ok(data.messages)
    }

    async fn conversation_history(
        &self,
        channel: &str,
        limit: u32,
    ) -> Result<Vec<HistoryMessage>, PlatformError> {
        let query = [
            ("channel", channel.to_string()),
            ("limit", limit.to_string()),
        ];
        let data: MessagesData = self.get_query("conversations.history", &query).await?;
        Ok(data.messages)
    }

    async fn set_assistant_status(
        &self,
        channel: &str,
        thread_ts: &str,
        status: &str,
    ) -> Result<(), PlatformError> {
        let body = json!({ "channel_id": channel, "thread_ts": thread_ts, "status": status });
        let _: NoData = self.post_json("assistant.threads.setStatus", &body).await?;
        Ok(())
    }
}
