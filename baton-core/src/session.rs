//! The Session protocol — how conversation history persists across runs.

use crate::error::SessionError;
use crate::id::SessionId;
use crate::item::ConversationItem;
use async_trait::async_trait;

/// An append-only ordered conversation log keyed by a session identifier.
///
/// Implementations:
/// - `MemorySession`: HashMap behind an RwLock (testing, ephemeral)
/// - `FsSession`: one JSONL file per session (survives restarts)
/// - `EncryptedSession`: transparent-encryption decorator over any backend
///
/// The runner calls [`Session::get_items`] once at run start to seed
/// history and [`Session::append_items`] once at run end with every new
/// item produced. All items for a given session share a strictly
/// increasing order; position is the only relevance of order.
///
/// The session is the one piece of shared mutable state across runs. The
/// core provides no cross-run mutual exclusion — callers running
/// concurrent runs against one session ID must serialize access or accept
/// interleaved history.
#[async_trait]
pub trait Session: Send + Sync {
    /// Read items for a session in order. With `limit`, the *last* `limit`
    /// items are returned, still in order. A session that has never been
    /// written reads as empty, not as an error.
    async fn get_items(
        &self,
        session_id: &SessionId,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationItem>, SessionError>;

    /// Append items to the end of a session's log. Creates the session on
    /// first write.
    async fn append_items(
        &self,
        session_id: &SessionId,
        items: &[ConversationItem],
    ) -> Result<(), SessionError>;

    /// Remove all items for a session. No-op if the session doesn't exist.
    async fn clear(&self, session_id: &SessionId) -> Result<(), SessionError>;
}
