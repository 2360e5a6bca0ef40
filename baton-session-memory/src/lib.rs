#![deny(missing_docs)]
//! In-memory implementation of baton-core's Session trait.
//!
//! Uses a `HashMap` behind a `RwLock` for concurrent access. Suitable
//! for testing, prototyping, and single-process use cases where history
//! across restarts is not required.

use async_trait::async_trait;
use baton_core::{ConversationItem, Session, SessionError, SessionId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory session store backed by a `HashMap` behind a `RwLock`.
pub struct MemorySession {
    data: RwLock<HashMap<SessionId, Vec<ConversationItem>>>,
}

impl MemorySession {
    /// Create a new empty in-memory session store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn get_items(
        &self,
        session_id: &SessionId,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationItem>, SessionError> {
        let data = self.data.read().await;
        let items = data.get(session_id).cloned().unwrap_or_default();
        Ok(match limit {
            Some(n) if n < items.len() => items[items.len() - n..].to_vec(),
            _ => items,
        })
    }

    async fn append_items(
        &self,
        session_id: &SessionId,
        items: &[ConversationItem],
    ) -> Result<(), SessionError> {
        let mut data = self.data.write().await;
        data.entry(session_id.clone())
            .or_default()
            .extend_from_slice(items);
        Ok(())
    }

    async fn clear(&self, session_id: &SessionId) -> Result<(), SessionError> {
        let mut data = self.data.write().await;
        data.remove(session_id);
        Ok(())
    }
}
