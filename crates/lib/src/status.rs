//! Interim status shown while the agent works.
//!
//! Two forms: a chat message posted then edited in place ([`StatusMessage`]),
//! and the assistant-thread "thinking" indicator ([`ThinkingIndicator`]).
//! Both exist only after a successful post/set, so later calls always carry the
//! timestamp the platform returned. `Cleared` and `Failed` are terminal.

use crate::slack::{PlatformError, PostMessage, SlackApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Posted,
    Updated,
    Cleared,
    Failed,
}

impl Lifecycle {
    fn is_terminal(self) -> bool {
        matches!(self, Lifecycle::Cleared | Lifecycle::Failed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("status is already {0:?}")]
    Closed(Lifecycle),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// A posted status message owned by one turn.
pub struct StatusMessage<'a> {
    slack: &'a dyn SlackApi,
    channel: String,
    ts: String,
    lifecycle: Lifecycle,
}

impl<'a> StatusMessage<'a> {
    /// Post `text` under `anchor_ts`. A failure here aborts the turn.
    pub async fn post(
        slack: &'a dyn SlackApi,
        channel: &str,
        anchor_ts: &str,
        text: &str,
    ) -> Result<StatusMessage<'a>, PlatformError> {
        let ts = slack
            .post_message(&PostMessage::new(channel, text).in_thread(anchor_ts))
            .await?;
        log::debug!("status: posted {} in {}", ts, channel);
        Ok(Self {
            slack,
            channel: channel.to_string(),
            ts,
            lifecycle: Lifecycle::Posted,
        })
    }

    /// Replace the status text in place. Failures are logged and move the status to `Failed`.
    pub async fn update(&mut self, text: &str) -> Result<(), StatusError> {
        if self.lifecycle.is_terminal() {
            return Err(StatusError::Closed(self.lifecycle));
        }
        match self.slack.update_message(&self.channel, &self.ts, text).await {
            Ok(()) => {
                self.lifecycle = Lifecycle::Updated;
                Ok(())
            }
            Err(e) => {
                log::warn!("status: failed to update {} in {}: {}", self.ts, self.channel, e);
                self.lifecycle = Lifecycle::Failed;
                Err(e.into())
            }
        }
    }

    pub fn ts(&self) -> &str {
        &self.ts
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }
}

/// Platform-native "thinking" indicator on an assistant thread.
pub struct ThinkingIndicator<'a> {
    slack: &'a dyn SlackApi,
    channel: String,
    thread_ts: String,
    lifecycle: Lifecycle,
}

impl<'a> ThinkingIndicator<'a> {
    /// Show `status` on the thread. A failure here aborts the turn.
    pub async fn set(
        slack: &'a dyn SlackApi,
        channel: &str,
        thread_ts: &str,
        status: &str,
    ) -> Result<ThinkingIndicator<'a>, PlatformError> {
        slack.set_assistant_status(channel, thread_ts, status).await?;
        Ok(Self {
            slack,
            channel: channel.to_string(),
            thread_ts: thread_ts.to_string(),
            lifecycle: Lifecycle::Posted,
        })
    }

    /// Remove the indicator (empty status).
    pub async fn clear(&mut self) -> Result<(), StatusError> {
        if self.lifecycle.is_terminal() {
            return Err(StatusError::Closed(self.lifecycle));
        }
        match self
            .slack
            .set_assistant_status(&self.channel, &self.thread_ts, "")
            .await
        {
            Ok(()) => {
                self.lifecycle = Lifecycle::Cleared;
                Ok(())
            }
            Err(e) => {
                log::warn!(
                    "status: failed to clear indicator on {} in {}: {}",
                    self.thread_ts,
                    self.channel,
                    e
                );
                self.lifecycle = Lifecycle::Failed;
                Err(e.into())
            }
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::fake::{Call, FakeSlack};

    #[tokio::test]
    async fn update_targets_the_posted_timestamp() {
        let slack = FakeSlack::new("UBOT");
        let mut status = StatusMessage::post(&slack, "C1", "10.1", "Agent is thinking...")
            .await
            .unwrap();
        assert_eq!(status.lifecycle(), Lifecycle::Posted);
        status.update("done").await.unwrap();
        status.update("done again").await.unwrap();
        assert_eq!(status.lifecycle(), Lifecycle::Updated);

        let calls = slack.calls();
        assert_eq!(
            calls[0],
            Call::Post(PostMessage::new("C1", "Agent is thinking...").in_thread("10.1"))
        );
        assert_eq!(
            calls[1],
            Call::Update {
                channel: "C1".to_string(),
                ts: status.ts().to_string(),
                text: "done".to_string()
            }
        );
    }

    #[tokio::test]
    async fn failed_post_yields_no_status() {
        let mut slack = FakeSlack::new("UBOT");
        slack.fail_post = true;
        assert!(StatusMessage::post(&slack, "C1", "1", "x").await.is_err());
        assert_eq!(slack.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_update_is_terminal() {
        let mut slack = FakeSlack::new("UBOT");
        slack.fail_update = true;
        let mut status = StatusMessage::post(&slack, "C1", "1", "x").await.unwrap();
        assert!(matches!(
            status.update("y").await,
            Err(StatusError::Platform(_))
        ));
        assert_eq!(status.lifecycle(), Lifecycle::Failed);
        assert!(matches!(
            status.update("z").await,
            Err(StatusError::Closed(Lifecycle::Failed))
        ));
        assert_eq!(slack.calls().len(), 2);
    }

    #[tokio::test]
    async fn indicator_set_then_clear() {
        let slack = FakeSlack::new("UBOT");
        let mut indicator = ThinkingIndicator::set(&slack, "D1", "5.0", "agent is thinking...")
            .await
            .unwrap();
        indicator.clear().await.unwrap();
        assert_eq!(indicator.lifecycle(), Lifecycle::Cleared);
        assert!(matches!(
            indicator.clear().await,
            Err(StatusError::Closed(Lifecycle::Cleared))
        ));
        assert_eq!(
            slack.calls(),
            vec![
                Call::SetStatus {
                    channel: "D1".to_string(),
                    thread_ts: "5.0".to_string(),
                    status: "agent is thinking...".to_string()
                },
                Call::SetStatus {
                    channel: "D1".to_string(),
                    thread_ts: "5.0".to_string(),
                    status: String::new()
                },
            ]
        );
    }

    #[tokio::test]
    async fn failed_clear_marks_indicator_failed() {
        let mut slack = FakeSlack::new("UBOT");
        slack.fail_clear_status = true;
        let mut indicator = ThinkingIndicator::set(&slack, "D1", "5.0", "busy").await.unwrap();
        assert!(indicator.clear().await.is_err());
        assert_eq!(indicator.lifecycle(), Lifecycle::Failed);
    }
}
