//! Slack platform: request signing, Events API payloads, and the Web API client.
//!
//! The gateway verifies and classifies inbound events here; turns talk to Slack
//! through the [`SlackApi`] trait so tests can substitute a fake.

mod api;
mod client;
pub mod event;
pub mod signature;

#[cfg(test)]
pub(crate) mod fake;

pub use api::{Block, BlockText, HistoryMessage, PlatformError, PostMessage, SlackApi};
pub use client::{SlackClient, SLACK_API_BASE};
pub use event::{
    classify, Classification, DirectMessage, EventEnvelope, IgnoreReason, Mention, Sender,
    SlackEvent, ThreadStarted,
};
