//! Agentbridge core library: Slack webhook verification and classification,
//! context assembly, the agent client, and the gateway that ties them together.

pub mod agent;
pub mod config;
pub mod context;
pub mod gateway;
pub mod init;
pub mod orchestrator;
pub mod slack;
pub mod status;
