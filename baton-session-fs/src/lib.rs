#![deny(missing_docs)]
//! Filesystem-backed implementation of baton-core's Session trait.
//!
//! Each session maps to one JSON-lines file under the root directory:
//! one serialized [`ConversationItem`] per line, appended in order.
//! Session IDs are URL-encoded to form safe filenames. Provides true
//! persistence across process restarts.

use async_trait::async_trait;
use baton_core::{ConversationItem, Session, SessionError, SessionId};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Filesystem-backed session store.
///
/// Directory layout:
/// ```text
/// root/
///   <url-encoded-session-id>.jsonl
/// ```
///
/// Suitable for development, single-machine deployments, and cases
/// where history must survive process restarts without a database.
pub struct FsSession {
    root: PathBuf,
}

impl FsSession {
    /// Create a new filesystem store rooted at the given directory.
    ///
    /// The directory is created lazily on first write.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn path_for(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(id_to_filename(session_id.as_str()))
    }
}

/// Encode a session ID into a safe filename.
fn id_to_filename(id: &str) -> String {
    let mut encoded = String::new();
    for ch in id.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => encoded.push(ch),
            _ => {
                for byte in ch.to_string().as_bytes() {
                    encoded.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    format!("{encoded}.jsonl")
}

#[async_trait]
impl Session for FsSession {
    async fn get_items(
        &self,
        session_id: &SessionId,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationItem>, SessionError> {
        let path = self.path_for(session_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(SessionError::Backend(e.to_string())),
        };

        let mut items = Vec::new();
        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            let item: ConversationItem = serde_json::from_str(line)
                .map_err(|e| SessionError::Serialization(e.to_string()))?;
            items.push(item);
        }
        Ok(match limit {
            Some(n) if n < items.len() => items.split_off(items.len() - n),
            _ => items,
        })
    }

    async fn append_items(
        &self,
        session_id: &SessionId,
        items: &[ConversationItem],
    ) -> Result<(), SessionError> {
        if items.is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;

        let mut buf = String::new();
        for item in items {
            let line = serde_json::to_string(item)
                .map_err(|e| SessionError::Serialization(e.to_string()))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(session_id))
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self, session_id: &SessionId) -> Result<(), SessionError> {
        match tokio::fs::remove_file(self.path_for(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Backend(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::new(s)
    }

    #[test]
    fn id_encoding_is_filesystem_safe() {
        let ids = ["simple", "user:session", "path/to/session", "has spaces"];
        for id in &ids {
            let filename = id_to_filename(id);
            assert!(!filename.contains('/'), "unsafe filename for {id}");
            assert!(!filename.contains(' '), "unsafe filename for {id}");
            assert!(filename.ends_with(".jsonl"));
        }
    }

    #[test]
    fn distinct_ids_get_distinct_filenames() {
        assert_ne!(id_to_filename("a/b"), id_to_filename("a_b"));
        assert_ne!(id_to_filename("s1"), id_to_filename("s2"));
    }

    #[tokio::test]
    async fn append_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSession::new(dir.path());

        let items = vec![
            ConversationItem::user("hello"),
            ConversationItem::assistant("hi there"),
        ];
        store.append_items(&sid("s1"), &items).await.unwrap();

        let read = store.get_items(&sid("s1"), None).await.unwrap();
        assert_eq!(read, items);
    }

    #[tokio::test]
    async fn read_nonexistent_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSession::new(dir.path());
        let read = store.get_items(&sid("missing"), None).await.unwrap();
        assert!(read.is_empty());
    }

    #[tokio::test]
    async fn successive_appends_accumulate_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSession::new(dir.path());

        store
            .append_items(&sid("s1"), &[ConversationItem::user("first")])
            .await
            .unwrap();
        store
            .append_items(&sid("s1"), &[ConversationItem::assistant("second")])
            .await
            .unwrap();

        let read = store.get_items(&sid("s1"), None).await.unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].as_text(), Some("first"));
        assert_eq!(read[1].as_text(), Some("second"));
    }

    #[tokio::test]
    async fn limit_returns_last_n() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSession::new(dir.path());

        let items: Vec<ConversationItem> = (0..4)
            .map(|i| ConversationItem::user(format!("msg{i}")))
            .collect();
        store.append_items(&sid("s1"), &items).await.unwrap();

        let read = store.get_items(&sid("s1"), Some(2)).await.unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].as_text(), Some("msg2"));
        assert_eq!(read[1].as_text(), Some("msg3"));
    }

    #[tokio::test]
    async fn clear_removes_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSession::new(dir.path());

        store
            .append_items(&sid("s1"), &[ConversationItem::user("hi")])
            .await
            .unwrap();
        store.clear(&sid("s1")).await.unwrap();
        let read = store.get_items(&sid("s1"), None).await.unwrap();
        assert!(read.is_empty());
    }

    #[tokio::test]
    async fn clear_nonexistent_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSession::new(dir.path());
        assert!(store.clear(&sid("missing")).await.is_ok());
    }

    #[tokio::test]
    async fn history_survives_store_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FsSession::new(dir.path());
            store
                .append_items(&sid("s1"), &[ConversationItem::user("persisted")])
                .await
                .unwrap();
        }
        let reopened = FsSession::new(dir.path());
        let read = reopened.get_items(&sid("s1"), None).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].as_text(), Some("persisted"));
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSession::new(dir.path());

        store
            .append_items(&sid("a"), &[ConversationItem::user("for a")])
            .await
            .unwrap();
        store
            .append_items(&sid("b"), &[ConversationItem::user("for b")])
            .await
            .unwrap();

        let a = store.get_items(&sid("a"), None).await.unwrap();
        let b = store.get_items(&sid("b"), None).await.unwrap();
        assert_eq!(a[0].as_text(), Some("for a"));
        assert_eq!(b[0].as_text(), Some("for b"));
    }

    #[test]
    fn fs_session_implements_session() {
        fn _assert_session<T: Session>() {}
        _assert_session::<FsSession>();
    }
}
