use std::sync::{Arc, RwLock};

use serenity::{cache::Cache, http::Http};

/// Live gateway session handles, filled in once the bot is ready.
#[derive(Clone)]
pub struct Session {
    pub http: Arc<Http>,
    pub cache: Arc<Cache>,
    pub bot_user_id: u64,
}

/// Shared between the event handler (writer) and the platform (reader).
#[derive(Clone, Default)]
pub struct SessionState {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionState {
    pub fn set(&self, session: Session) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
    }

    pub fn get(&self) -> Option<Session> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn bot_user_id(&self) -> Option<u64> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.bot_user_id)
    }
}
