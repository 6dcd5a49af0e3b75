//! Configuration Workflow
//!
//! Per-creator staging of a poll before it is published:
//!
//! ```text
//! AwaitingData --submit_text--> AwaitingConfig --publish--> Published
//!       \                            |                        |
//!        `----------cancel-----------+--> Cancelled           `--fail--> Failed
//! ```
//!
//! A creator may stage at most one draft at a time.
//!
//! The store only holds sessions that can still make progress. Cancelling
//! drops the session from the store, and publishing takes it out before it
//! is delivered, so the terminal states are seen only on the session value
//! the caller holds. `DraftStore::session` never returns one.

use super::poll::{ChatId, Poll, PollError, PollId, PollKind, UserId, MAX_OPTIONS};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Error text for draft input without a question and two options.
pub const NOT_ENOUGH_LINES: &str = "need a question and at least two options";

/// State of a creator's draft session
#[derive(Debug, Clone)]
pub enum DraftState {
    /// Waiting for the question and option lines
    AwaitingData,
    /// Draft built; flags may be toggled before publishing
    AwaitingConfig(Poll),
    /// Handed over to the registry under this identifier
    Published(PollId),
    /// Discarded by the creator
    Cancelled,
    /// Delivery of the published poll failed; the draft is gone
    Failed(String),
}

impl DraftState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DraftState::Published(_) | DraftState::Cancelled | DraftState::Failed(_)
        )
    }

    fn name(&self) -> &'static str {
        match self {
            DraftState::AwaitingData => "awaiting_data",
            DraftState::AwaitingConfig(_) => "awaiting_config",
            DraftState::Published(_) => "published",
            DraftState::Cancelled => "cancelled",
            DraftState::Failed(_) => "failed",
        }
    }
}

/// Which draft flag to flip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftToggle {
    MultiChoice,
    Anonymous,
}

/// Snapshot of a staged draft, shown to the creator during configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub is_quiz: bool,
    pub question: String,
    pub options: Vec<String>,
    pub is_multi_choice: bool,
    pub is_anonymous_results: bool,
}

impl DraftSummary {
    fn of(poll: &Poll) -> Self {
        Self {
            is_quiz: poll.is_quiz(),
            question: poll.question().to_string(),
            options: poll.options().to_vec(),
            is_multi_choice: poll.is_multi_choice(),
            is_anonymous_results: poll.is_anonymous_results(),
        }
    }
}

/// Split draft text into a question and its options.
///
/// Lines are trimmed and blank lines dropped; the first remaining line is the
/// question and the rest are options in order.
pub fn parse_draft_text(raw: &str, max_options: usize) -> Result<(String, Vec<String>), PollError> {
    let mut lines = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string);

    let question = lines.next();
    let options: Vec<String> = lines.collect();
    let question = match question {
        Some(q) if options.len() >= 2 => q,
        _ => return Err(PollError::InvalidInput(NOT_ENOUGH_LINES.to_string())),
    };

    let limit = max_options.min(MAX_OPTIONS);
    if options.len() > limit {
        return Err(PollError::InvalidInput(format!(
            "at most {} options are allowed",
            limit
        )));
    }

    Ok((question, options))
}

/// One creator's in-progress poll
#[derive(Debug, Clone)]
pub struct DraftSession {
    creator_id: UserId,
    chat_id: ChatId,
    is_quiz: bool,
    state: DraftState,
}

impl DraftSession {
    pub fn new(creator_id: UserId, chat_id: ChatId, is_quiz: bool) -> Self {
        Self {
            creator_id,
            chat_id,
            is_quiz,
            state: DraftState::AwaitingData,
        }
    }

    pub fn state(&self) -> &DraftState {
        &self.state
    }

    pub fn is_quiz(&self) -> bool {
        self.is_quiz
    }

    /// The staged draft, once text has been submitted
    pub fn draft(&self) -> Option<&Poll> {
        match &self.state {
            DraftState::AwaitingConfig(poll) => Some(poll),
            _ => None,
        }
    }

    pub fn summary(&self) -> Option<DraftSummary> {
        self.draft().map(DraftSummary::of)
    }

    /// Build the draft from the creator's text. Quizzes take the first
    /// option as the correct answer.
    pub fn submit_text(&mut self, raw: &str, max_options: usize) -> Result<DraftSummary, PollError> {
        if !matches!(self.state, DraftState::AwaitingData) {
            return Err(self.wrong_state("submit draft text"));
        }

        let (question, options) = parse_draft_text(raw, max_options)?;
        let kind = if self.is_quiz {
            PollKind::Quiz { correct_option: 0 }
        } else {
            PollKind::Poll
        };
        let poll = Poll::new(
            self.creator_id.clone(),
            self.chat_id.clone(),
            question,
            options,
            kind,
        )?;

        let summary = DraftSummary::of(&poll);
        self.state = DraftState::AwaitingConfig(poll);
        Ok(summary)
    }

    /// Flip a draft flag and return the new value.
    ///
    /// Multi-choice is rejected for quizzes and the flag stays off.
    pub fn toggle(&mut self, toggle: DraftToggle) -> Result<bool, PollError> {
        let state_name = self.state.name();
        let DraftState::AwaitingConfig(poll) = &mut self.state else {
            return Err(PollError::InvalidInput(format!(
                "cannot change options while {}",
                state_name
            )));
        };

        match toggle {
            DraftToggle::MultiChoice => {
                let next = !poll.is_multi_choice();
                if !poll.set_multi_choice(next) {
                    return Err(PollError::InvalidInput(
                        "quizzes do not support multiple choice".to_string(),
                    ));
                }
                Ok(next)
            }
            DraftToggle::Anonymous => {
                let next = !poll.is_anonymous_results();
                poll.set_anonymous_results(next);
                Ok(next)
            }
        }
    }

    /// Release the draft for publishing under a fresh identifier.
    pub fn publish(&mut self) -> Result<Poll, PollError> {
        let state = std::mem::replace(&mut self.state, DraftState::Cancelled);
        match state {
            DraftState::AwaitingConfig(mut poll) => {
                poll.regenerate_id();
                self.state = DraftState::Published(poll.id().clone());
                Ok(poll)
            }
            other => {
                self.state = other;
                Err(self.wrong_state("publish"))
            }
        }
    }

    /// Discard the draft.
    pub fn cancel(&mut self) {
        self.state = DraftState::Cancelled;
    }

    /// Record that the published poll could not be delivered.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.state = DraftState::Failed(reason.into());
    }

    fn wrong_state(&self, action: &str) -> PollError {
        PollError::InvalidInput(format!("cannot {} while {}", action, self.state.name()))
    }
}

/// Draft sessions keyed by creator.
///
/// Holds no terminal sessions: a creator with no entry is free to start.
#[derive(Debug)]
pub struct DraftStore {
    sessions: Mutex<HashMap<UserId, DraftSession>>,
    max_options: usize,
}

impl Default for DraftStore {
    fn default() -> Self {
        Self::new(MAX_OPTIONS)
    }
}

impl DraftStore {
    pub fn new(max_options: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_options,
        }
    }

    /// Open a session for `creator`. Fails with `SessionBusy` if one is open.
    pub fn start(&self, creator: &UserId, chat: &ChatId, is_quiz: bool) -> Result<(), PollError> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(creator) {
            return Err(PollError::SessionBusy);
        }
        sessions.insert(
            creator.clone(),
            DraftSession::new(creator.clone(), chat.clone(), is_quiz),
        );
        debug!(creator = %creator, is_quiz, "draft session started");
        Ok(())
    }

    pub fn submit_text(&self, creator: &UserId, raw: &str) -> Result<DraftSummary, PollError> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(creator).ok_or(PollError::NoDraft)?;
        session.submit_text(raw, self.max_options)
    }

    pub fn toggle(&self, creator: &UserId, toggle: DraftToggle) -> Result<DraftSummary, PollError> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(creator).ok_or(PollError::NoDraft)?;
        session.toggle(toggle)?;
        session.summary().ok_or(PollError::NoDraft)
    }

    /// Remove the creator's session so it can be published.
    ///
    /// Only a session with a staged draft is released; otherwise it stays in
    /// the store. Once released, the session is gone whatever happens to the
    /// publish; a creator whose publish fails has to start again.
    pub fn take_for_publish(&self, creator: &UserId) -> Result<DraftSession, PollError> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get(creator).ok_or(PollError::NoDraft)?;
        if session.draft().is_none() {
            return Err(session.wrong_state("publish"));
        }
        sessions.remove(creator).ok_or(PollError::NoDraft)
    }

    /// Drop the creator's session. Returns `false` if there was none.
    pub fn cancel(&self, creator: &UserId) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.remove(creator) {
            Some(mut session) => {
                session.cancel();
                debug!(creator = %creator, "draft session cancelled");
                true
            }
            None => false,
        }
    }

    /// Current session of a creator, if any
    pub fn session(&self, creator: &UserId) -> Option<DraftSession> {
        self.sessions.lock().get(creator).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
