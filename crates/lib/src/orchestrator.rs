//! Turn flows: one per classified event variant, run as a detached background task.
//!
//! A turn is strictly sequential. It owns its status message; nothing is shared
//! between turns.

use crate::agent::{AgentError, AgentRunner};
use crate::context::{channel_context, thread_context, ContextError, ThreadContext};
use crate::slack::{
    Classification, DirectMessage, IgnoreReason, Mention, PlatformError, PostMessage, SlackApi,
    ThreadStarted,
};
use crate::status::{StatusError, StatusMessage, ThinkingIndicator};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const MENTION_STATUS_TEXT: &str = "Agent is thinking...";
pub const THINKING_INDICATOR_TEXT: &str = "agent is thinking...";
pub const DIRECT_MESSAGE_ERROR_TEXT: &str =
    "Something went wrong while processing the message. Please try again.";
pub const WELCOME_TEXT: &str = "Hello, I'm an Agent! I'm here to help you with your questions.";

/// Collaborators for one turn.
pub struct TurnContext<'a> {
    pub slack: &'a dyn SlackApi,
    pub agent: &'a dyn AgentRunner,
    pub bot_user_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The agent's reply was delivered (or its delivery failure was logged).
    Replied,
    Welcomed,
    Skipped(IgnoreReason),
    /// Handshake payloads are answered on the request path; nothing to do here.
    Handshake,
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("failed to post status: {0}")]
    StatusPost(#[source] PlatformError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("failed to post reply: {0}")]
    Reply(#[source] PlatformError),
    #[error("reply posted but thinking indicator was not cleared: {0}")]
    ClearStatus(#[source] StatusError),
    #[error("failed to post welcome message: {0}")]
    Welcome(#[source] PlatformError),
}

/// Mention: status message → thread or channel context → agent → status rewritten with the result.
pub async fn handle_mention(
    ctx: &TurnContext<'_>,
    mention: &Mention,
) -> Result<TurnOutcome, TurnError> {
    if mention.sender.is_bot_or_self(ctx.bot_user_id) {
        return Ok(TurnOutcome::Skipped(IgnoreReason::FromBotOrSelf));
    }
    let mut status = StatusMessage::post(
        ctx.slack,
        &mention.channel,
        mention.reply_anchor(),
        MENTION_STATUS_TEXT,
    )
    .await
    .map_err(TurnError::StatusPost)?;

    let context = match &mention.thread_ts {
        Some(thread_ts) => {
            thread_context(
                ctx.slack,
                &mention.channel,
                thread_ts,
                ctx.bot_user_id,
                &mention.ts,
            )
            .await
        }
        None => channel_context(ctx.slack, &mention.channel).await,
    };
    let context = match context {
        Ok(c) => c,
        Err(e) => {
            // update() logs its own failure; the turn fails on the context error either way.
            let _ = status.update(&e.to_string()).await;
            return Err(e.into());
        }
    };

    match ctx.agent.run(&context.to_agent_input()).await {
        Ok(reply) => {
            let _ = status.update(&reply.text()).await;
            Ok(TurnOutcome::Replied)
        }
        Err(e) => {
            let _ = status.update(&e.to_string()).await;
            Err(e.into())
        }
    }
}

/// Assistant thread opened: post the welcome message. No agent call.
pub async fn handle_thread_started(
    ctx: &TurnContext<'_>,
    started: &ThreadStarted,
) -> Result<TurnOutcome, TurnError> {
    ctx.slack
        .post_message(&PostMessage::new(&started.channel, WELCOME_TEXT).in_thread(&started.thread_ts))
        .await
        .map_err(TurnError::Welcome)?;
    Ok(TurnOutcome::Welcomed)
}

/// Direct message: thinking indicator → thread context → agent → reply posted → indicator cleared.
///
/// On failure a generic error message is posted and the indicator is left as-is.
pub async fn handle_direct_message(
    ctx: &TurnContext<'_>,
    message: &DirectMessage,
) -> Result<TurnOutcome, TurnError> {
    if message.sender.is_bot_or_self(ctx.bot_user_id) {
        return Ok(TurnOutcome::Skipped(IgnoreReason::FromBotOrSelf));
    }
    let mut indicator = ThinkingIndicator::set(
        ctx.slack,
        &message.channel,
        &message.thread_ts,
        THINKING_INDICATOR_TEXT,
    )
    .await
    .map_err(TurnError::StatusPost)?;

    let reply = match direct_message_reply(ctx, message).await {
        Ok(text) => text,
        Err(e) => {
            post_error(ctx, message).await;
            return Err(e);
        }
    };

    ctx.slack
        .post_message(
            &PostMessage::new(&message.channel, reply)
                .in_thread(&message.thread_ts)
                .as_markdown(),
        )
        .await
        .map_err(TurnError::Reply)?;
    indicator.clear().await.map_err(TurnError::ClearStatus)?;
    Ok(TurnOutcome::Replied)
}

async fn direct_message_reply(
    ctx: &TurnContext<'_>,
    message: &DirectMessage,
) -> Result<String, TurnError> {
    let context: ThreadContext = thread_context(
        ctx.slack,
        &message.channel,
        &message.thread_ts,
        ctx.bot_user_id,
        &message.ts,
    )
    .await?;
    let reply = ctx.agent.run(&context.to_agent_input()).await?;
    Ok(reply.text())
}

async fn post_error(ctx: &TurnContext<'_>, message: &DirectMessage) {
    let post = PostMessage::new(&message.channel, DIRECT_MESSAGE_ERROR_TEXT).in_thread(&message.thread_ts);
    if let Err(e) = ctx.slack.post_message(&post).await {
        log::warn!(
            "turn: failed to post error message in {}: {}",
            message.channel,
            e
        );
    }
}

/// Run the flow for one classification.
pub async fn dispatch(
    ctx: &TurnContext<'_>,
    work: &Classification,
) -> Result<TurnOutcome, TurnError> {
    match work {
        Classification::Mention(m) => handle_mention(ctx, m).await,
        Classification::ThreadStarted(t) => handle_thread_started(ctx, t).await,
        Classification::DirectMessage(m) => handle_direct_message(ctx, m).await,
        Classification::Ignored(reason) => Ok(TurnOutcome::Skipped(reason.clone())),
        Classification::UrlVerification { .. } => {
            log::warn!("turn: url_verification reached a turn; it is answered on the request path");
            Ok(TurnOutcome::Handshake)
        }
    }
}

fn describe(work: &Classification) -> String {
    match work {
        Classification::Mention(m) => format!("mention in {} at {}", m.channel, m.ts),
        Classification::ThreadStarted(t) => format!("thread started in {}", t.channel),
        Classification::DirectMessage(m) => format!("direct message in {} at {}", m.channel, m.ts),
        other => format!("{:?}", other),
    }
}

/// Spawn a supervised turn. The returned handle completes when the turn has
/// finished; errors and panics are logged under the turn id, never propagated.
pub fn spawn_turn(
    slack: Arc<dyn SlackApi>,
    agent: Arc<dyn AgentRunner>,
    bot_user_id: String,
    work: Classification,
) -> JoinHandle<()> {
    let turn_id = format!("turn-{}", uuid::Uuid::new_v4());
    log::info!("{}: started: {}", turn_id, describe(&work));
    tokio::spawn(async move {
        let inner = tokio::spawn(async move {
            let ctx = TurnContext {
                slack: slack.as_ref(),
                agent: agent.as_ref(),
                bot_user_id: &bot_user_id,
            };
            dispatch(&ctx, &work).await
        });
        match inner.await {
            Ok(Ok(outcome)) => log::info!("{}: finished: {:?}", turn_id, outcome),
            Ok(Err(e)) => log::warn!("{}: failed: {}", turn_id, e),
            Err(e) if e.is_panic() => log::error!("{}: panicked", turn_id),
            Err(e) => log::error!("{}: aborted: {}", turn_id, e),
        }
    })
}
