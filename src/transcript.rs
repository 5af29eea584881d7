//! In-memory transcript of a conversation view
//!
//! The transcript is the persisted history plus turns the store does not
//! hold (the seeded greeting, failed writes) and at most one trailing
//! pending turn. Pending turns are a separate variant so they can never be
//! handed to the persistence layer, which only accepts [`NewMessage`].

use crate::persistence::{Message, NewMessage, Role};
use crate::sources::Citation;

/// One turn as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// A stored turn
    Persisted(Message),
    /// A settled turn that is not stored
    Local(NewMessage),
    /// The transient "thinking" placeholder
    Pending(String),
}

impl Turn {
    /// Author of the turn; pending turns are shown as the assistant
    pub fn role(&self) -> Role {
        match self {
            Turn::Persisted(m) => m.role,
            Turn::Local(m) => m.role,
            Turn::Pending(_) => Role::Assistant,
        }
    }

    /// Text content
    pub fn content(&self) -> &str {
        match self {
            Turn::Persisted(m) => &m.content,
            Turn::Local(m) => &m.content,
            Turn::Pending(text) => text,
        }
    }

    /// Citations attached to the turn
    pub fn citations(&self) -> &[Citation] {
        match self {
            Turn::Persisted(m) => &m.citations,
            Turn::Local(m) => &m.citations,
            Turn::Pending(_) => &[],
        }
    }

    /// Whether this is the transient placeholder
    pub fn is_pending(&self) -> bool {
        matches!(self, Turn::Pending(_))
    }
}

/// Ordered turns of the current view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// A transcript holding only the greeting
    pub fn greeting(text: &str) -> Self {
        Self {
            turns: vec![Turn::Local(NewMessage::assistant(text, Vec::new()))],
        }
    }

    /// Rebuild a view from persisted history
    ///
    /// An empty history yields the greeting transcript.
    pub fn from_history(history: Vec<Message>, greeting: &str) -> Self {
        if history.is_empty() {
            return Self::greeting(greeting);
        }
        Self {
            turns: history.into_iter().map(Turn::Persisted).collect(),
        }
    }

    /// All turns in display order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns, including a pending one
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the transcript has no turns
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The last turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Whether a pending turn is present
    pub fn has_pending(&self) -> bool {
        self.turns.last().is_some_and(Turn::is_pending)
    }

    /// Append a settled turn, dropping any pending turn first
    pub fn push_settled(&mut self, turn: Turn) {
        debug_assert!(!turn.is_pending());
        self.clear_pending();
        self.turns.push(turn);
    }

    /// Append the pending turn, replacing any existing one
    pub fn push_pending(&mut self, text: impl Into<String>) {
        self.clear_pending();
        self.turns.push(Turn::Pending(text.into()));
    }

    /// Remove the pending turn if present
    pub fn clear_pending(&mut self) {
        self.turns.retain(|turn| !turn.is_pending());
    }

    /// Replace the local turn at `index` with its stored counterpart
    pub(crate) fn mark_persisted(&mut self, index: usize, stored: Message) {
        if let Some(turn) = self.turns.get_mut(index) {
            if matches!(turn, Turn::Local(_)) {
                *turn = Turn::Persisted(stored);
            }
        }
    }
}
