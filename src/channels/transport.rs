//! Transport Trait
//!
//! The three operations the poll engine needs from a chat platform. Every
//! call is best-effort: callers log failures and carry on, except when a
//! poll is being published.

use crate::polls::{ChatId, MessageRef, RenderedMessage};
use async_trait::async_trait;
use std::sync::Arc;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while talking to the chat platform
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Message edit failed: {0}")]
    EditFailed(String),

    #[error("Transport error: {0}")]
    Other(String),
}

/// Outbound side of a chat platform
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a new message to a chat and return where it landed
    async fn send_message(
        &self,
        chat_id: &ChatId,
        message: &RenderedMessage,
    ) -> TransportResult<MessageRef>;

    /// Replace the text and controls of a previously delivered message
    async fn edit_message(
        &self,
        target: &MessageRef,
        message: &RenderedMessage,
    ) -> TransportResult<()>;

    /// Acknowledge a pressed control with a short notice
    async fn answer_callback(&self, callback_id: &str, text: &str) -> TransportResult<()>;
}

/// Type-erased transport for storage
pub type DynTransport = Arc<dyn Transport>;
