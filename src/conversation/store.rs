//! # Session Store
//!
//! In-memory, per-session conversation history. The store owns every session;
//! callers only ever receive cloned snapshots of a session's messages.
//!
//! ## Locking:
//! - The session map sits behind one `RwLock` that is held only long enough to
//!   find or insert a session.
//! - Each session's log has its own `Mutex`, so appends to different sessions
//!   never contend with each other.
//!
//! Appends to the *same* session from concurrent requests are not serialized
//! across a whole user/assistant exchange; two in-flight turns can interleave
//! their message pairs.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

type SessionLog = Arc<Mutex<VecDeque<Message>>>;

/// Process-wide store mapping session ids to bounded message logs.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionLog>>,
    max_messages: usize,
}

impl SessionStore {
    /// Create a store whose sessions keep at most `max_messages` entries.
    pub fn new(max_messages: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_messages: max_messages.max(1),
        }
    }

    /// Ordered snapshot of a session's history, oldest first.
    ///
    /// Creates an empty session on first access. Only fails when the id itself
    /// is invalid.
    pub fn get(&self, session_id: &str) -> AppResult<Vec<Message>> {
        validate_session_id(session_id)?;
        let log = self.log_for(session_id);
        let messages = log.lock();
        Ok(messages.iter().cloned().collect())
    }

    /// Append a message stamped with the current time, evicting the oldest
    /// entries once the cap is exceeded.
    pub fn append(&self, session_id: &str, role: Role, content: &str) -> AppResult<()> {
        validate_session_id(session_id)?;
        if content.trim().is_empty() {
            return Err(AppError::Validation(
                "Message content cannot be empty".to_string(),
            ));
        }

        let log = self.log_for(session_id);
        let mut messages = log.lock();
        messages.push_back(Message {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        while messages.len() > self.max_messages {
            messages.pop_front();
        }

        tracing::debug!(
            session_id = %session_id,
            role = %role,
            message_count = messages.len(),
            "Appended message to session"
        );
        Ok(())
    }

    /// Drop a session's history. Clearing an unknown session is a no-op.
    pub fn clear(&self, session_id: &str) -> AppResult<()> {
        validate_session_id(session_id)?;
        let removed = self.sessions.write().remove(session_id).is_some();
        tracing::debug!(session_id = %session_id, removed, "Cleared session history");
        Ok(())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    fn log_for(&self, session_id: &str) -> SessionLog {
        if let Some(log) = self.sessions.read().get(session_id) {
            return Arc::clone(log);
        }

        let mut sessions = self.sessions.write();
        Arc::clone(sessions.entry(session_id.to_string()).or_default())
    }
}

/// Session ids are opaque, but they must contain something.
pub fn validate_session_id(session_id: &str) -> AppResult<()> {
    if session_id.trim().is_empty() {
        return Err(AppError::Validation("Session ID is required".to_string()));
    }
    Ok(())
}
