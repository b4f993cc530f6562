//! In-process conversation history, one bounded transcript per session.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    fn label(self) -> &'static str {
        match self {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Keyed session store. Each write holds the lock only for the append itself.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Vec<Turn>>>,
    max_turns: usize,
}

impl SessionStore {
    /// `max_history` counts exchanges; the store keeps twice as many turns.
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns: max_history.saturating_mul(2),
        }
    }

    /// Returns a usable session id. Blank or missing ids get a fresh UUID,
    /// unknown ids are adopted with an empty history.
    pub async fn get_or_create(&self, session_id: Option<&str>) -> String {
        let id = match session_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let mut sessions = self.sessions.write().await;
        sessions.entry(id.clone()).or_default();
        id
    }

    pub async fn append(&self, session_id: &str, role: TurnRole, content: &str) {
        let mut sessions = self.sessions.write().await;
        let turns = sessions.entry(session_id.to_string()).or_default();
        turns.push(Turn::new(role, content));
        Self::truncate(turns, self.max_turns);
    }

    /// Appends a user/assistant pair under a single write lock.
    pub async fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) {
        let mut sessions = self.sessions.write().await;
        let turns = sessions.entry(session_id.to_string()).or_default();
        turns.push(Turn::new(TurnRole::User, user));
        turns.push(Turn::new(TurnRole::Assistant, assistant));
        Self::truncate(turns, self.max_turns);
    }

    pub async fn get_history(&self, session_id: &str) -> Option<Vec<Turn>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Renders the transcript as `User: ...` / `Assistant: ...` lines.
    pub async fn format_history(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        let turns = sessions.get(session_id)?;
        if turns.is_empty() {
            return None;
        }

        Some(
            turns
                .iter()
                .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Removes a session. Returns whether it existed.
    pub async fn clear(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn truncate(turns: &mut Vec<Turn>, max_turns: usize) {
        if turns.len() > max_turns {
            let excess = turns.len() - max_turns;
            turns.drain(..excess);
        }
    }
}
