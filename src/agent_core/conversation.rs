//! Per-session conversation history.
//!
//! Each session id maps to a sliding window of the most recent messages.
//! A turn is committed only once it completes with an answer, so aborted or
//! failed turns never touch stored history. The number of sessions is
//! bounded: past the limit, the least recently active session is dropped.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::inference::types::ChatMessage;

/// Session used when the caller does not supply one.
pub const DEFAULT_SESSION: &str = "default";

/// Stored messages kept per session.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Sessions kept before the least recently active one is evicted.
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

struct Session {
    messages: Vec<ChatMessage>,
    /// Value of the store's turn counter at this session's last commit.
    last_turn: u64,
}

#[derive(Default)]
struct Sessions {
    by_id: HashMap<String, Session>,
    turns: u64,
}

/// Session id → recent messages.
pub struct ConversationStore {
    sessions: Mutex<Sessions>,
    window: usize,
    max_sessions: usize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl ConversationStore {
    pub fn new(window: usize) -> Self {
        Self::with_limits(window, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_limits(window: usize, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(Sessions::default()),
            window: window.max(1),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Snapshot of a session's stored window (empty for unknown sessions).
    pub fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.lock()
            .by_id
            .get(session_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Append a completed turn's messages and trim to the window.
    pub fn commit_turn(&self, session_id: &str, messages: Vec<ChatMessage>) {
        let mut sessions = self.lock();
        sessions.turns += 1;
        let turn = sessions.turns;

        let session = sessions
            .by_id
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                messages: Vec::new(),
                last_turn: turn,
            });
        session.last_turn = turn;
        session.messages.extend(messages);
        if session.messages.len() > self.window {
            let excess = session.messages.len() - self.window;
            session.messages.drain(..excess);
        }
        let stored = session.messages.len();

        while sessions.by_id.len() > self.max_sessions {
            let Some(idle) = sessions
                .by_id
                .iter()
                .min_by_key(|(_, s)| s.last_turn)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            sessions.by_id.remove(&idle);
            tracing::debug!(session_id = %idle, "evicted idle session");
        }

        tracing::debug!(session_id, stored, "turn committed");
    }

    /// Forget a session. Returns whether it had any history.
    pub fn reset(&self, session_id: &str) -> bool {
        self.lock().by_id.remove(session_id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.lock().by_id.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
