//! In-memory `SlackApi` that records every call, for unit tests.

use crate::slack::api::{HistoryMessage, PlatformError, PostMessage, SlackApi};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    AuthTest,
    Post(PostMessage),
    Update {
        channel: String,
        ts: String,
        text: String,
    },
    Replies {
        channel: String,
        thread_ts: String,
        limit: u32,
    },
    History {
        channel: String,
        limit: u32,
    },
    SetStatus {
        channel: String,
        thread_ts: String,
        status: String,
    },
}

#[derive(Default)]
pub struct FakeSlack {
    pub bot_user_id: String,
    pub replies: Vec<HistoryMessage>,
    pub history: Vec<HistoryMessage>,
    pub fail_auth: bool,
    pub fail_post: bool,
    pub fail_update: bool,
    pub fail_fetch: bool,
    pub fail_set_status: bool,
    pub fail_clear_status: bool,
    posted: AtomicU32,
    calls: Mutex<Vec<Call>>,
}

pub fn message(user: Option<&str>, bot_id: Option<&str>, ts: &str, text: Option<&str>) -> HistoryMessage {
    HistoryMessage {
        ts: Some(ts.to_string()),
        user: user.map(str::to_string),
        bot_id: bot_id.map(str::to_string),
        text: text.map(str::to_string),
    }
}

fn api_error(method: &'static str) -> PlatformError {
    PlatformError::Api {
        method,
        error: "fake_failure".to_string(),
    }
}

impl FakeSlack {
    pub fn new(bot_user_id: &str) -> Self {
        Self {
            bot_user_id: bot_user_id.to_string(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SlackApi for FakeSlack {
    async fn auth_test(&self) -> Result<String, PlatformError> {
        self.record(Call::AuthTest);
        if self.fail_auth {
            return Err(api_error("auth.test"));
        }
        Ok(self.bot_user_id.clone())
    }

    async fn post_message(&self, message: &PostMessage) -> Result<String, PlatformError> {
        self.record(Call::Post(message.clone()));
        if self.fail_post {
            return Err(api_error("chat.postMessage"));
        }
        let n = self.posted.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("900.{:04}", n))
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
    ) -> Result<(), PlatformError> {
        self.record(Call::Update {
            channel: channel.to_string(),
            ts: ts.to_string(),
            text: text.to_string(),
        });
        if self.fail_update {
            return Err(api_error("chat.update"));
        }
        Ok(())
    }

    async fn conversation_replies(
        &self,
        channel: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Vec<HistoryMessage>, PlatformError> {
        self.record(Call::Replies {
            channel: channel.to_string(),
            thread_ts: thread_ts.to_string(),
            limit,
        });
        if self.fail_fetch {
            return Err(api_error("conversations.replies"));
        }
        Ok(self.replies.iter().take(limit as usize).cloned().collect())
    }

    async fn conversation_history(
        &self,
        channel: &str,
        limit: u32,
    ) -> Result<Vec<HistoryMessage>, PlatformError> {
        self.record(Call::History {
            channel: channel.to_string(),
            limit,
        });
        if self.fail_fetch {
            return Err(api_error("conversations.history"));
        }
        Ok(self.history.iter().take(limit as usize).cloned().collect())
    }

    async fn set_assistant_status(
        &self,
        channel: &str,
        thread_ts: &str,
        status: &str,
    ) -> Result<(), PlatformError> {
        self.record(Call::SetStatus {
            channel: channel.to_string(),
            thread_ts: thread_ts.to_string(),
            status: status.to_string(),
        });
        let fail = if status.is_empty() {
            self.fail_clear_status
        } else {
            self.fail_set_status
        };
        if fail {
            return Err(api_error("assistant.threads.setStatus"));
        }
        Ok(())
    }
}
