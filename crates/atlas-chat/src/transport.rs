//! The network boundary: wire types and the `Transport` trait.

use async_trait::async_trait;
use atlas_core::{ExecutionResult, Message};
use serde::{Deserialize, Serialize};

use crate::composer::TurnRequest;
use crate::error::ChatError;

/// Reply to a `/chat` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_result: Option<ExecutionResult>,
}

/// Body of a `/jobs` call.
///
/// An interval that could not be parsed goes out as `null`; rejecting it is
/// the server's call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub query: String,
    pub interval_seconds: Option<i64>,
}

/// Reply to a `/jobs` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAck {
    pub status: String,
}

/// Performs the three backend calls. Every call carries the caller identity.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET /history`
    async fn fetch_history(&self) -> Result<Vec<Message>, ChatError>;

    /// `POST /chat`
    async fn send_turn(&self, request: TurnRequest) -> Result<ChatReply, ChatError>;

    /// `POST /jobs`
    async fn schedule_job(&self, request: JobRequest) -> Result<JobAck, ChatError>;
}
