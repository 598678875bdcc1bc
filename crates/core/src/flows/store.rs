use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::user::UserId;
use crate::flows::states::Session;

/// Per-user transient dialog state. An absent entry reads as `Session::Idle`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user: &UserId) -> Session;
    async fn set(&self, user: &UserId, session: Session);
    async fn clear(&self, user: &UserId);
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<UserId, Session>>,
}

impl InMemorySessionStore {
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user: &UserId) -> Session {
        self.sessions.read().await.get(user).cloned().unwrap_or_default()
    }

    async fn set(&self, user: &UserId, session: Session) {
        let mut sessions = self.sessions.write().await;
        if session.is_idle() {
            sessions.remove(user);
        } else {
            sessions.insert(user.clone(), session);
        }
    }

    async fn clear(&self, user: &UserId) {
        self.sessions.write().await.remove(user);
    }
}
