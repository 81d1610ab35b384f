//! Add-item conversation state, one session per user.
//!
//! ```text
//!   Idle --/add <text>--------------------------> Idle            (append)
//!   Idle --/add | add button--------------------> AwaitingItemText (prompt)
//!   AwaitingItemText --text (blank/menu label)--> AwaitingItemText (re-prompt)
//!   AwaitingItemText --text---------------------> Idle            (append)
//!   AwaitingItemText --/cancel------------------> Idle            (nothing appended)
//! ```
//!
//! [`transition`] is the pure machine. [`SessionStore`] keeps the per-user
//! state, applies transitions atomically and forgets sessions that have been
//! idle longer than the configured TTL.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;
use tracing::debug;

use crate::UserId;

/// Menu button labels. Sent as plain text by the chat client, so they are
/// never accepted as item names.
pub const MENU_LABELS: [&str; 3] = [MENU_ADD, MENU_LIST, MENU_CANCEL];

/// Menu label that starts the add flow
pub const MENU_ADD: &str = "➕ Add item";
/// Menu label that shows the list
pub const MENU_LIST: &str = "🛒 Show list";
/// Menu label that cancels the add flow
pub const MENU_CANCEL: &str = "✖ Cancel";

/// Whether `text` is one of the reserved menu labels
#[must_use]
pub fn is_menu_label(text: &str) -> bool {
    let text = text.trim();
    MENU_LABELS.iter().any(|label| *label == text)
}

/// Where a user is in the add flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No flow in progress
    #[default]
    Idle,
    /// The bot asked for an item name and waits for it
    AwaitingItemText,
}

/// What the user did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    /// `/add`, with inline text if any was given
    AddCommand(Option<&'a str>),
    /// The add button
    AddButton,
    /// A plain text message
    Text(&'a str),
    /// `/cancel`
    Cancel,
}

/// What the caller must do after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Append this item name
    Append(String),
    /// Ask for the item name
    Prompt,
    /// The text was not usable; ask again
    Reprompt,
    /// The flow was abandoned
    Cancelled,
    /// Cancel with no flow in progress
    NothingToCancel,
    /// Nothing to do
    Ignore,
}

/// The pure state machine
#[must_use]
pub fn transition(state: SessionState, input: Input<'_>) -> (SessionState, Action) {
    use SessionState::{AwaitingItemText, Idle};

    match (state, input) {
        (_, Input::AddCommand(Some(text))) if !text.trim().is_empty() => {
            (Idle, Action::Append(text.trim().to_string()))
        }
        (_, Input::AddCommand(_) | Input::AddButton) => (AwaitingItemText, Action::Prompt),
        (AwaitingItemText, Input::Text(text)) => {
            if text.trim().is_empty() || is_menu_label(text) {
                (AwaitingItemText, Action::Reprompt)
            } else {
                (Idle, Action::Append(text.trim().to_string()))
            }
        }
        (AwaitingItemText, Input::Cancel) => (Idle, Action::Cancelled),
        (Idle, Input::Cancel) => (Idle, Action::NothingToCancel),
        (Idle, Input::Text(_)) => (Idle, Action::Ignore),
    }
}

#[derive(Debug, Clone, Copy)]
struct Session {
    state: SessionState,
    touched_at: Instant,
}

/// Per-user session states with an inactivity TTL
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store whose sessions expire after `ttl` without input
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Current state of `user`'s session
    pub async fn state(&self, user: UserId) -> SessionState {
        self.state_at(user, Instant::now()).await
    }

    /// Feed `input` to `user`'s session and return the action to perform
    pub async fn apply(&self, user: UserId, input: Input<'_>) -> Action {
        self.apply_at(user, input, Instant::now()).await
    }

    /// Put `user` back into [`SessionState::AwaitingItemText`], e.g. after
    /// an append failed and the text has to be sent again
    pub async fn resume_awaiting(&self, user: UserId) {
        let session = Session {
            state: SessionState::AwaitingItemText,
            touched_at: Instant::now(),
        };
        self.sessions.lock().await.insert(user, session);
    }

    /// Drop every expired session, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now()).await
    }

    /// Number of sessions with a flow in progress
    pub async fn active(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn state_at(&self, user: UserId, now: Instant) -> SessionState {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&user)
            .filter(|s| !self.is_expired(s, now))
            .map_or(SessionState::Idle, |s| s.state)
    }

    async fn apply_at(&self, user: UserId, input: Input<'_>, now: Instant) -> Action {
        let mut sessions = self.sessions.lock().await;
        let current = sessions
            .get(&user)
            .filter(|s| !self.is_expired(s, now))
            .map_or(SessionState::Idle, |s| s.state);

        let (next, action) = transition(current, input);
        debug!(%user, from = ?current, to = ?next, ?action, "session transition");

        match next {
            SessionState::Idle => {
                sessions.remove(&user);
            }
            SessionState::AwaitingItemText => {
                sessions.insert(
                    user,
                    Session {
                        state: next,
                        touched_at: now,
                    },
                );
            }
        }
        action
    }

    async fn purge_expired_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| !self.is_expired(s, now));
        before - sessions.len()
    }

    fn is_expired(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.touched_at) >= self.ttl
    }
}
