//! Context assembly: turn thread replies or recent channel history into the
//! ordered conversation handed to the agent.
//!
//! Messages keep platform delivery order. Messages without text are dropped.

use crate::slack::{HistoryMessage, PlatformError, SlackApi};

/// Maximum replies fetched for a thread.
pub const THREAD_HISTORY_LIMIT: u32 = 50;
/// Maximum messages fetched when there is no thread to read.
pub const CHANNEL_HISTORY_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One prior message, attributed to the user or the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

/// Non-empty, ordered (oldest first as delivered) conversation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadContext {
    messages: Vec<ConversationMessage>,
}

impl ThreadContext {
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; an empty context is a [`ContextError`].
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Agent input: message contents joined by newline.
    pub fn to_agent_input(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Context could not be assembled. `Display` is the text shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Failed to retrieve thread messages or thread is empty")]
    EmptyThread,
    #[error("No context found")]
    EmptyChannel,
    #[error("Something went wrong while processing thread messages")]
    ThreadFetch(#[source] PlatformError),
    #[error("Something went wrong while processing channel messages")]
    ChannelFetch(#[source] PlatformError),
}

/// Remove one leading `<@bot_user_id> ` token.
pub fn strip_self_mention<'a>(text: &'a str, bot_user_id: &str) -> &'a str {
    let prefix = format!("<@{}> ", bot_user_id);
    text.strip_prefix(prefix.as_str()).unwrap_or(text)
}

fn to_conversation_message(message: &HistoryMessage) -> Option<ConversationMessage> {
    let text = message.text.as_deref().filter(|t| !t.is_empty())?;
    let role = if message.is_bot() {
        Role::Assistant
    } else {
        Role::User
    };
    Some(ConversationMessage {
        role,
        content: text.to_string(),
    })
}

/// Thread mode: up to [`THREAD_HISTORY_LIMIT`] replies of `thread_ts`.
///
/// The self-mention prefix is stripped only from the message whose timestamp is
/// `own_ts` (the event being answered), and only when a user wrote it.
pub async fn thread_context(
    slack: &dyn SlackApi,
    channel: &str,
    thread_ts: &str,
    bot_user_id: &str,
    own_ts: &str,
) -> Result<ThreadContext, ContextError> {
    let replies = slack
        .conversation_replies(channel, thread_ts, THREAD_HISTORY_LIMIT)
        .await
        .map_err(|e| {
            log::warn!("context: conversations.replies failed for {}: {}", channel, e);
            ContextError::ThreadFetch(e)
        })?;

    let messages: Vec<ConversationMessage> = replies
        .iter()
        .filter_map(|m| {
            let mut msg = to_conversation_message(m)?;
            if msg.role == Role::User && m.ts.as_deref() == Some(own_ts) {
                msg.content = strip_self_mention(&msg.content, bot_user_id).to_string();
            }
            Some(msg)
        })
        .filter(|m| !m.content.is_empty())
        .collect();

    log::debug!(
        "context: thread {} yielded {} of {} messages",
        thread_ts,
        messages.len(),
        replies.len()
    );
    if messages.is_empty() {
        return Err(ContextError::EmptyThread);
    }
    Ok(ThreadContext { messages })
}

/// Channel mode: up to [`CHANNEL_HISTORY_LIMIT`] latest messages, no prefix stripping.
pub async fn channel_context(
    slack: &dyn SlackApi,
    channel: &str,
) -> Result<ThreadContext, ContextError> {
    let history = slack
        .conversation_history(channel, CHANNEL_HISTORY_LIMIT)
        .await
        .map_err(|e| {
            log::warn!("context: conversations.history failed for {}: {}", channel, e);
            ContextError::ChannelFetch(e)
        })?;

    let messages: Vec<ConversationMessage> =
        history.iter().filter_map(to_conversation_message).collect();
    if messages.is_empty() {
        return Err(ContextError::EmptyChannel);
    }
    Ok(ThreadContext { messages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::fake::{message, Call, FakeSlack};

    #[test]
    fn strips_leading_mention_exactly_once() {
        assert_eq!(
            strip_self_mention("<@U123> hello <@U123>", "U123"),
            "hello <@U123>"
        );
        assert_eq!(strip_self_mention("hello <@U123> x", "U123"), "hello <@U123> x");
        assert_eq!(strip_self_mention("<@U999> hi", "U123"), "<@U999> hi");
        assert_eq!(strip_self_mention("<@U123>", "U123"), "<@U123>");
    }

    #[tokio::test]
    async fn thread_mode_maps_roles_drops_empty_and_keeps_order() {
        let mut slack = FakeSlack::new("U123");
        slack.replies = vec![
            message(Some("U1"), None, "1.0", Some("question")),
            message(None, Some("B1"), "1.1", Some("answer")),
            message(Some("U2"), None, "1.2", None),
            message(Some("U2"), None, "1.3", Some("")),
            message(Some("U1"), None, "1.4", Some("<@U123> follow up <@U123>")),
        ];
        let ctx = thread_context(&slack, "C1", "1.0", "U123", "1.4").await.unwrap();
        assert_eq!(
            ctx.messages(),
            &[
                ConversationMessage {
                    role: Role::User,
                    content: "question".to_string()
                },
                ConversationMessage {
                    role: Role::Assistant,
                    content: "answer".to_string()
                },
                ConversationMessage {
                    role: Role::User,
                    content: "follow up <@U123>".to_string()
                },
            ]
        );
        assert_eq!(ctx.to_agent_input(), "question\nanswer\nfollow up <@U123>");
        assert_eq!(
            slack.calls(),
            vec![Call::Replies {
                channel: "C1".to_string(),
                thread_ts: "1.0".to_string(),
                limit: THREAD_HISTORY_LIMIT
            }]
        );
    }

    #[tokio::test]
    async fn historical_messages_keep_their_mentions() {
        let mut slack = FakeSlack::new("U123");
        slack.replies = vec![
            message(Some("U1"), None, "1.0", Some("<@U123> earlier")),
            message(None, Some("B1"), "1.1", Some("<@U123> bot text")),
            message(Some("U1"), None, "1.2", Some("<@U123> now")),
        ];
        let ctx = thread_context(&slack, "C1", "1.0", "U123", "1.2").await.unwrap();
        let contents: Vec<&str> = ctx.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["<@U123> earlier", "<@U123> bot text", "now"]);
    }

    #[tokio::test]
    async fn bot_authored_own_message_is_not_stripped() {
        let mut slack = FakeSlack::new("U123");
        slack.replies = vec![message(None, Some("B1"), "1.0", Some("<@U123> relay"))];
        let ctx = thread_context(&slack, "C1", "1.0", "U123", "1.0").await.unwrap();
        assert_eq!(ctx.messages()[0].content, "<@U123> relay");
    }

    #[tokio::test]
    async fn empty_thread_is_typed_error() {
        let mut slack = FakeSlack::new("U123");
        slack.replies = vec![message(Some("U1"), None, "1.0", None)];
        assert!(matches!(
            thread_context(&slack, "C1", "1.0", "U123", "1.0").await,
            Err(ContextError::EmptyThread)
        ));
    }

    #[tokio::test]
    async fn channel_mode_fetches_five_and_never_strips() {
        let mut slack = FakeSlack::new("U123");
        slack.history = (0..7)
            .map(|i| {
                let text = format!("<@U123> m{}", i);
                message(Some("U1"), None, &format!("2.{}", i), Some(text.as_str()))
            })
            .collect();
        let ctx = channel_context(&slack, "C1").await.unwrap();
        assert_eq!(ctx.len(), CHANNEL_HISTORY_LIMIT as usize);
        assert_eq!(ctx.messages()[0].content, "<@U123> m0");
        assert_eq!(
            slack.calls(),
            vec![Call::History {
                channel: "C1".to_string(),
                limit: 5
            }]
        );
    }

    #[tokio::test]
    async fn channel_without_text_is_no_context() {
        let slack = FakeSlack::new("U123");
        let err = channel_context(&slack, "C1").await.unwrap_err();
        assert!(matches!(err, ContextError::EmptyChannel));
        assert_eq!(err.to_string(), "No context found");
    }

    #[tokio::test]
    async fn transport_failures_become_context_errors() {
        let mut slack = FakeSlack::new("U123");
        slack.fail_fetch = true;
        assert!(matches!(
            thread_context(&slack, "C1", "1.0", "U123", "1.0").await,
            Err(ContextError::ThreadFetch(_))
        ));
        assert!(matches!(
            channel_context(&slack, "C1").await,
            Err(ContextError::ChannelFetch(_))
        ));
    }
}
