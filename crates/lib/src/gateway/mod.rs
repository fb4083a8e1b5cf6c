//! Gateway: HTTP entry point for Slack Events API deliveries.
//!
//! The request path only parses, verifies and classifies, then answers; agent
//! work runs in a detached turn (see [`crate::orchestrator`]).

mod server;

pub use server::{acknowledge, router, run_gateway, Acknowledgment, GatewayState, PendingTurn};
