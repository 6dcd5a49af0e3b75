//! Polling Module
//!
//! Polls and quizzes for chat channels: per-creator drafting, publishing,
//! single and multiple choice voting, anonymous results, and creator-only
//! management (close, reopen, export, delete).

pub mod draft;
pub mod engine;
pub mod poll;
pub mod render;
pub mod service;
pub mod vote;

pub use draft::{
    parse_draft_text, DraftSession, DraftState, DraftStore, DraftSummary, DraftToggle,
};
pub use engine::{create_engine, PollEngine, PollEngineStats};
pub use poll::{ChatId, MessageRef, Poll, PollError, PollId, PollKind, UserId, MAX_OPTIONS};
pub use render::{Control, ControlAction, RenderedMessage};
pub use service::{PollService, VoteReceipt};
pub use vote::{apply_vote, set_multi_choice_done, VoteOutcome};
