//! Events API payloads and their classification into conversational variants.

use serde::Deserialize;

/// Outer Events API envelope, keyed by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Endpoint handshake; carries no signature requirement.
    UrlVerification { challenge: String },
    EventCallback {
        event: SlackEvent,
        #[serde(default)]
        event_id: Option<String>,
    },
    /// Any other envelope type (e.g. `app_rate_limited`).
    #[serde(other)]
    Unsupported,
}

/// Inner event, keyed by `event.type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    AppMention(MessageEvent),
    AssistantThreadStarted(AssistantThreadStartedEvent),
    Message(MessageEvent),
    #[serde(other)]
    Other,
}

/// Fields shared by `app_mention` and `message` events. Text is read back from
/// conversation history, not from the event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub bot_profile: Option<serde_json::Value>,
    #[serde(default)]
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantThreadStartedEvent {
    #[serde(default)]
    pub assistant_thread: AssistantThread,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantThread {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

/// Who sent a message, as far as self/bot filtering is concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub user: Option<String>,
    pub bot_id: Option<String>,
    pub has_bot_profile: bool,
}

impl Sender {
    fn of(event: &MessageEvent) -> Self {
        Self {
            user: event.user.clone(),
            bot_id: event.bot_id.clone().filter(|id| !id.is_empty()),
            has_bot_profile: event
                .bot_profile
                .as_ref()
                .is_some_and(|p| !p.is_null()),
        }
    }

    /// True for messages the bot must never answer: its own, or any other bot's.
    pub fn is_bot_or_self(&self, bot_user_id: &str) -> bool {
        self.bot_id.is_some()
            || self.has_bot_profile
            || self.user.as_deref() == Some(bot_user_id)
    }
}

/// An `app_mention` that should be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub channel: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub sender: Sender,
}

impl Mention {
    /// Where the status message goes: the existing thread, or a new one under the mention.
    pub fn reply_anchor(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

/// A new assistant thread that should receive the welcome message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStarted {
    pub channel: String,
    pub thread_ts: String,
}

/// A direct message inside an assistant thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMessage {
    pub channel: String,
    pub ts: String,
    pub thread_ts: String,
    pub sender: Sender,
}

/// Why an event produced no turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    FromBotOrSelf,
    Subtype(String),
    NotDirectMessage,
    NoThreadAnchor,
    MissingField(&'static str),
    UnsupportedEvent,
    UnsupportedEnvelope,
}

/// Closed set of outcomes for a verified payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    UrlVerification { challenge: String },
    Mention(Mention),
    ThreadStarted(ThreadStarted),
    DirectMessage(DirectMessage),
    Ignored(IgnoreReason),
}

impl Classification {
    /// True when a background turn has work to do.
    pub fn needs_turn(&self) -> bool {
        matches!(
            self,
            Classification::Mention(_)
                | Classification::ThreadStarted(_)
                | Classification::DirectMessage(_)
        )
    }
}

/// Classify an envelope. Rules are evaluated in order; the first match wins.
pub fn classify(envelope: &EventEnvelope, bot_user_id: &str) -> Classification {
    match envelope {
        EventEnvelope::UrlVerification { challenge } => Classification::UrlVerification {
            challenge: challenge.clone(),
        },
        EventEnvelope::EventCallback { event, .. } => classify_event(event, bot_user_id),
        EventEnvelope::Unsupported => Classification::Ignored(IgnoreReason::UnsupportedEnvelope),
    }
}

fn classify_event(event: &SlackEvent, bot_user_id: &str) -> Classification {
    match event {
        SlackEvent::AppMention(ev) => classify_mention(ev, bot_user_id),
        SlackEvent::AssistantThreadStarted(ev) => classify_thread_started(ev),
        SlackEvent::Message(ev) => classify_message(ev, bot_user_id),
        SlackEvent::Other => Classification::Ignored(IgnoreReason::UnsupportedEvent),
    }
}

fn classify_mention(ev: &MessageEvent, bot_user_id: &str) -> Classification {
    let sender = Sender::of(ev);
    if sender.is_bot_or_self(bot_user_id) {
        return Classification::Ignored(IgnoreReason::FromBotOrSelf);
    }
    let (channel, ts) = match required(ev) {
        Ok(fields) => fields,
        Err(reason) => return Classification::Ignored(reason),
    };
    Classification::Mention(Mention {
        channel,
        ts,
        thread_ts: ev.thread_ts.clone().filter(|t| !t.is_empty()),
        sender,
    })
}

fn classify_thread_started(ev: &AssistantThreadStartedEvent) -> Classification {
    let thread = &ev.assistant_thread;
    let Some(channel) = thread.channel_id.clone().filter(|c| !c.is_empty()) else {
        return Classification::Ignored(IgnoreReason::MissingField("assistant_thread.channel_id"));
    };
    let Some(thread_ts) = thread.thread_ts.clone().filter(|t| !t.is_empty()) else {
        return Classification::Ignored(IgnoreReason::MissingField("assistant_thread.thread_ts"));
    };
    Classification::ThreadStarted(ThreadStarted { channel, thread_ts })
}

fn classify_message(ev: &MessageEvent, bot_user_id: &str) -> Classification {
    if let Some(subtype) = ev.subtype.as_ref().filter(|s| !s.is_empty()) {
        return Classification::Ignored(IgnoreReason::Subtype(subtype.clone()));
    }
    if ev.channel_type.as_deref() != Some("im") {
        return Classification::Ignored(IgnoreReason::NotDirectMessage);
    }
    let sender = Sender::of(ev);
    if sender.is_bot_or_self(bot_user_id) {
        return Classification::Ignored(IgnoreReason::FromBotOrSelf);
    }
    let Some(thread_ts) = ev.thread_ts.clone().filter(|t| !t.is_empty()) else {
        return Classification::Ignored(IgnoreReason::NoThreadAnchor);
    };
    let (channel, ts) = match required(ev) {
        Ok(fields) => fields,
        Err(reason) => return Classification::Ignored(reason),
    };
    Classification::DirectMessage(DirectMessage {
        channel,
        ts,
        thread_ts,
        sender,
    })
}

fn required(ev: &MessageEvent) -> Result<(String, String), IgnoreReason> {
    let channel = ev
        .channel
        .clone()
        .filter(|c| !c.is_empty())
        .ok_or(IgnoreReason::MissingField("channel"))?;
    let ts = ev
        .ts
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or(IgnoreReason::MissingField("ts"))?;
    Ok((channel, ts))
}
