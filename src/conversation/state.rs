use crate::models::chat::{ OutgoingMessage, Role, Turn };
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("a request is already in flight")]
    Busy,
    #[error("refusing to submit an empty message")]
    EmptyDraft,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Awaiting {
        request_id: String,
    },
}

/// How an exchange ended, as applied to the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Replied(Turn),
    Failed(String),
    Cancelled,
}

/// Turn history, draft and the single-flight phase for one session.
///
/// All mutation goes through the transition methods so that the
/// `Idle`/`Awaiting` bookkeeping stays consistent with `turns`.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
    draft: String,
    phase: Phase,
    last_error: Option<String>,
    allow_blank: bool,
}

impl Conversation {
    pub fn new(allow_blank: bool) -> Self {
        Self {
            turns: Vec::new(),
            draft: String::new(),
            phase: Phase::Idle,
            last_error: None,
            allow_blank,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Awaiting { .. })
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn allows_blank(&self) -> bool {
        self.allow_blank
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn apply_suggestion(&mut self, suggestion: &str) {
        self.draft = suggestion.to_string();
    }

    /// Accepts the current draft: appends the user turn, clears the draft and
    /// moves to `Awaiting`. The returned message is what goes on the wire.
    pub fn begin_submit(&mut self) -> Result<OutgoingMessage, SubmitError> {
        if self.is_pending() {
            return Err(SubmitError::Busy);
        }
        if !self.allow_blank && self.draft.trim().is_empty() {
            return Err(SubmitError::EmptyDraft);
        }

        let id = Uuid::new_v4().to_string();
        let content = std::mem::take(&mut self.draft);
        self.phase = Phase::Awaiting { request_id: id.clone() };
        self.last_error = None;
        self.turns.push(Turn::user(id.clone(), content.clone()));

        Ok(OutgoingMessage {
            id,
            role: Role::User,
            content,
        })
    }

    /// Returns to `Idle` for `request_id`. Returns false, changing nothing,
    /// when that request is not the one in flight.
    pub fn settle(&mut self, request_id: &str, settlement: Settlement) -> bool {
        match &self.phase {
            Phase::Awaiting { request_id: current } if current == request_id => {}
            _ => {
                return false;
            }
        }

        match settlement {
            Settlement::Replied(turn) => self.turns.push(turn),
            Settlement::Failed(message) => {
                self.last_error = Some(message);
            }
            Settlement::Cancelled => {}
        }
        self.phase = Phase::Idle;
        true
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(false)
    }
}
