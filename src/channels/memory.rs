//! In-memory transport that records every call.
//!
//! Used by tests and by embedders that want to inspect what the engine would
//! have sent. Failures can be switched on per operation.

use super::transport::{Transport, TransportError, TransportResult};
use crate::polls::{ChatId, MessageRef, RenderedMessage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A recorded transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Send {
        chat_id: ChatId,
        message: RenderedMessage,
    },
    Edit {
        target: MessageRef,
        message: RenderedMessage,
    },
    Answer {
        callback_id: String,
        text: String,
    },
}

/// Transport that keeps its calls in memory
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<RecordedCall>>,
    next_message_id: AtomicU64,
    fail_send: AtomicBool,
    fail_edit: AtomicBool,
    fail_answer: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `send_message` fail until switched off again
    pub fn fail_sends(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Make `edit_message` fail until switched off again
    pub fn fail_edits(&self, fail: bool) {
        self.fail_edit.store(fail, Ordering::SeqCst);
    }

    /// Make `answer_callback` fail until switched off again
    pub fn fail_answers(&self, fail: bool) {
        self.fail_answer.store(fail, Ordering::SeqCst);
    }

    /// Every successful call so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// The most recent successful edit, if any
    pub fn last_edit(&self) -> Option<(MessageRef, RenderedMessage)> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            RecordedCall::Edit { target, message } => Some((target.clone(), message.clone())),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(
        &self,
        chat_id: &ChatId,
        message: &RenderedMessage,
    ) -> TransportResult<MessageRef> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("send disabled".to_string()));
        }
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().push(RecordedCall::Send {
            chat_id: chat_id.clone(),
            message: message.clone(),
        });
        Ok(MessageRef {
            chat_id: chat_id.clone(),
            message_id: message_id.to_string(),
        })
    }

    async fn edit_message(
        &self,
        target: &MessageRef,
        message: &RenderedMessage,
    ) -> TransportResult<()> {
        if self.fail_edit.load(Ordering::SeqCst) {
            return Err(TransportError::EditFailed("edit disabled".to_string()));
        }
        self.calls.lock().push(RecordedCall::Edit {
            target: target.clone(),
            message: message.clone(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> TransportResult<()> {
        if self.fail_answer.load(Ordering::SeqCst) {
            return Err(TransportError::Other("answer disabled".to_string()));
        }
        self.calls.lock().push(RecordedCall::Answer {
            callback_id: callback_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
