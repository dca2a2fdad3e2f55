use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub max_sessions: usize,
    pub max_history: usize,
    pub ttl: Duration,
}

struct Session {
    messages: VecDeque<ChatMessage>,
    last_access: Instant,
}

/// Chat histories keyed by session id.
///
/// Bounded three ways: idle sessions expire after `ttl`, the least recently
/// used session is evicted once `max_sessions` is reached, and each history
/// keeps only its newest `max_history` messages.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    limits: SessionLimits,
}

impl SessionStore {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            limits,
        }
    }

    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Append a message and return the session's history including it.
    pub async fn append(&self, session_id: &str, role: Role, content: String) -> Vec<ChatMessage> {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        self.evict_expired(&mut sessions, now);

        if !sessions.contains_key(session_id) {
            while sessions.len() >= self.limits.max_sessions {
                let Some(oldest) = sessions
                    .iter()
                    .min_by_key(|(_, session)| session.last_access)
                    .map(|(id, _)| id.clone())
                else {
                    break;
                };
                debug!("Evicting least recently used chat session {}", oldest);
                sessions.remove(&oldest);
            }
        }

        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                messages: VecDeque::new(),
                last_access: now,
            });
        session.last_access = now;
        session.messages.push_back(ChatMessage::new(role, content));
        while session.messages.len() > self.limits.max_history {
            session.messages.pop_front();
        }

        session.messages.iter().cloned().collect()
    }

    pub async fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        self.evict_expired(&mut sessions, now);

        match sessions.get_mut(session_id) {
            Some(session) => {
                session.last_access = now;
                session.messages.iter().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn evict_expired(&self, sessions: &mut HashMap<String, Session>, now: Instant) {
        let ttl = self.limits.ttl;
        sessions.retain(|id, session| {
            let keep = now.duration_since(session.last_access) <= ttl;
            if !keep {
                debug!("Expiring idle chat session {}", id);
            }
            keep
        });
    }
}
