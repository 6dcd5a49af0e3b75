//! Poll Entity
//!
//! The aggregate that holds a question, its options, the vote tally and the
//! per-voter selections. Identity, question and options are fixed once the
//! poll is built; only the tally, the flags and the message reference change.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard upper bound on the number of options a poll may carry.
pub const MAX_OPTIONS: usize = 50;

/// Errors returned by poll operations.
///
/// Every variant is an expected, recoverable outcome of user input; none of
/// them indicate a bug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Option {0} does not exist")]
    InvalidOption(usize),

    #[error("A poll is already being created; finish it or cancel first")]
    SessionBusy,

    #[error("No poll is being created")]
    NoDraft,

    #[error("Poll is closed")]
    PollClosed,

    #[error("Poll '{0}' not found")]
    NotFound(PollId),

    #[error("Only the poll creator can do that")]
    NotAuthorized,

    #[error("Failed to publish poll: {0}")]
    PublishFailed(String),
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id.to_string())
            }
        }
    };
}

opaque_id!(
    /// Identifier of a published (or drafted) poll
    PollId
);
opaque_id!(
    /// Identifier of a user: creator, voter or acting manager
    UserId
);
opaque_id!(
    /// Identifier of the chat a poll is delivered to
    ChatId
);

impl PollId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Where a published poll message lives on the transport side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: String,
}

/// Whether a poll is an open poll or a quiz with a designated answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum PollKind {
    Poll,
    Quiz { correct_option: usize },
}

/// A poll or quiz and its vote state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    id: PollId,
    creator_id: UserId,
    chat_id: ChatId,
    question: String,
    options: Vec<String>,
    kind: PollKind,
    is_multi_choice: bool,
    is_anonymous_results: bool,
    is_closed: bool,
    /// Selection count per option index
    votes: Vec<u32>,
    /// Current selections per voter, in first-vote order
    voters: IndexMap<UserId, Vec<usize>>,
    message_ref: Option<MessageRef>,
    created_at: DateTime<Utc>,
    /// Set under the poll's lock when it leaves the registry
    #[serde(skip)]
    deleted: bool,
}

impl Poll {
    /// Build a new poll with an empty tally.
    ///
    /// Fails with [`PollError::InvalidInput`] for an empty question, fewer
    /// than two options, an empty option, more than [`MAX_OPTIONS`] options,
    /// or a quiz answer index outside the options.
    pub fn new(
        creator_id: impl Into<UserId>,
        chat_id: impl Into<ChatId>,
        question: impl Into<String>,
        options: Vec<String>,
        kind: PollKind,
    ) -> Result<Self, PollError> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(PollError::InvalidInput("question is required".to_string()));
        }
        if options.len() < 2 {
            return Err(PollError::InvalidInput(
                "poll must have at least 2 options".to_string(),
            ));
        }
        if options.len() > MAX_OPTIONS {
            return Err(PollError::InvalidInput(format!(
                "poll cannot have more than {} options",
                MAX_OPTIONS
            )));
        }
        if let Some(pos) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(PollError::InvalidInput(format!("option {} is empty", pos)));
        }
        if let PollKind::Quiz { correct_option } = kind {
            if correct_option >= options.len() {
                return Err(PollError::InvalidInput(format!(
                    "correct answer {} is not one of the {} options",
                    correct_option,
                    options.len()
                )));
            }
        }

        Ok(Self {
            id: PollId::generate(),
            creator_id: creator_id.into(),
            chat_id: chat_id.into(),
            question,
            votes: vec![0; options.len()],
            options,
            kind,
            is_multi_choice: false,
            is_anonymous_results: false,
            is_closed: false,
            voters: IndexMap::new(),
            message_ref: None,
            created_at: Utc::now(),
            deleted: false,
        })
    }

    pub fn id(&self) -> &PollId {
        &self.id
    }

    pub fn creator_id(&self) -> &UserId {
        &self.creator_id
    }

    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn kind(&self) -> PollKind {
        self.kind
    }

    pub fn is_quiz(&self) -> bool {
        matches!(self.kind, PollKind::Quiz { .. })
    }

    /// The correct option index, for quizzes
    pub fn correct_option(&self) -> Option<usize> {
        match self.kind {
            PollKind::Quiz { correct_option } => Some(correct_option),
            PollKind::Poll => None,
        }
    }

    pub fn is_multi_choice(&self) -> bool {
        self.is_multi_choice
    }

    pub fn is_anonymous_results(&self) -> bool {
        self.is_anonymous_results
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    /// Selection count per option index
    pub fn votes(&self) -> &[u32] {
        &self.votes
    }

    /// Voters and their current selections, in first-vote order
    pub fn voters(&self) -> &IndexMap<UserId, Vec<usize>> {
        &self.voters
    }

    /// The selections a voter currently holds (empty if they have not voted)
    pub fn selections_of(&self, voter: &UserId) -> &[usize] {
        self.voters.get(voter).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_voted(&self, voter: &UserId) -> bool {
        self.voters.contains_key(voter)
    }

    /// Sum of all selections across options
    pub fn total_selections(&self) -> u32 {
        self.votes.iter().sum()
    }

    pub fn message_ref(&self) -> Option<&MessageRef> {
        self.message_ref.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_created_by(&self, user: &UserId) -> bool {
        &self.creator_id == user
    }

    /// Set multi-choice mode. Quizzes are always single-choice; returns
    /// `false` and leaves the flag alone for them.
    pub fn set_multi_choice(&mut self, enabled: bool) -> bool {
        if self.is_quiz() {
            return false;
        }
        self.is_multi_choice = enabled;
        true
    }

    pub fn set_anonymous_results(&mut self, enabled: bool) {
        self.is_anonymous_results = enabled;
    }

    pub fn close(&mut self) {
        self.is_closed = true;
    }

    pub fn reopen(&mut self) {
        self.is_closed = false;
    }

    pub fn set_message_ref(&mut self, message_ref: MessageRef) {
        self.message_ref = Some(message_ref);
    }

    /// Whether the poll has been removed from the registry
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Replace the identifier. Drafts get a fresh one when they are published.
    pub(crate) fn regenerate_id(&mut self) {
        self.id = PollId::generate();
    }

    pub(crate) fn tally_mut(&mut self) -> (&mut Vec<u32>, &mut IndexMap<UserId, Vec<usize>>) {
        (&mut self.votes, &mut self.voters)
    }

    /// Check that every option's count equals the number of voters holding it
    /// and that no voter entry is empty.
    pub fn tally_is_consistent(&self) -> bool {
        if self.voters.values().any(Vec::is_empty) {
            return false;
        }
        self.votes.iter().enumerate().all(|(i, &count)| {
            let holders = self.voters.values().filter(|sel| sel.contains(&i)).count();
            holders == count as usize
        })
    }
}
