#![deny(missing_docs)]
//! Transparent-encryption decorator for baton-core's Session trait.
//!
//! Wraps any `Session` backend and seals each [`ConversationItem`] with
//! AES-256-GCM before it is written. The per-session data key is derived
//! from a master key via HKDF-SHA256 with the session ID as salt, so two
//! sessions never share a key. Sealed envelopes carry an expiry time;
//! reads unseal, drop expired or unopenable items, and preserve order.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use baton_core::{ConversationItem, Session, SessionError, SessionId};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Domain-separation label for the key derivation.
const HKDF_INFO: &[u8] = b"baton.session.v1";

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// HKDF-SHA256: extract with the session ID as salt, then a single
/// expand step (32 bytes of output is one block).
fn derive_session_key(master: &[u8; 32], session_id: &SessionId) -> [u8; 32] {
    let mut extract =
        <HmacSha256 as Mac>::new_from_slice(session_id.as_str().as_bytes()).expect("hmac accepts any key length");
    extract.update(master);
    let prk = extract.finalize().into_bytes();

    let mut expand = <HmacSha256 as Mac>::new_from_slice(&prk).expect("hmac accepts any key length");
    expand.update(HKDF_INFO);
    expand.update(&[0x01]);
    expand.finalize().into_bytes().into()
}

/// Session decorator that encrypts items at rest.
///
/// The wrapped backend only ever sees [`ConversationItem::Sealed`]
/// envelopes. Reading through a plain backend without this decorator
/// yields the opaque envelopes; reading through the decorator with the
/// wrong master key yields an empty (or partial) history, never an
/// error.
pub struct EncryptedSession {
    inner: Arc<dyn Session>,
    master_key: [u8; 32],
    ttl: Option<Duration>,
    clock: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl EncryptedSession {
    /// Wrap a backend. Items never expire.
    pub fn new(inner: Arc<dyn Session>, master_key: [u8; 32]) -> Self {
        Self {
            inner,
            master_key,
            ttl: None,
            clock: Box::new(unix_now),
        }
    }

    /// Set a time-to-live. Items older than the TTL are dropped on read.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Replace the wall clock. Test support for expiry behavior.
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    fn seal(
        &self,
        session_id: &SessionId,
        item: &ConversationItem,
    ) -> Result<ConversationItem, SessionError> {
        let key = derive_session_key(&self.master_key, session_id);
        let cipher = Aes256Gcm::new(&key.into());

        let plaintext = serde_json::to_vec(item)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
            .map_err(|e| SessionError::Backend(format!("encryption failed: {e}")))?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&ciphertext);

        let expires_at = match self.ttl {
            Some(ttl) => (self.clock)().saturating_add(ttl.as_secs()),
            None => u64::MAX,
        };
        Ok(ConversationItem::Sealed {
            id: item.id().to_owned(),
            payload: B64.encode(envelope),
            expires_at,
        })
    }

    /// Open one stored item. Plaintext items written before the decorator
    /// was installed pass through unchanged. `None` means the item is
    /// expired or is an envelope this key cannot open; both are dropped
    /// without error.
    fn unseal(&self, session_id: &SessionId, item: &ConversationItem) -> Option<ConversationItem> {
        let ConversationItem::Sealed {
            id,
            payload,
            expires_at,
        } = item
        else {
            return Some(item.clone());
        };
        if *expires_at <= (self.clock)() {
            tracing::debug!(item_id = %id, "dropping expired item");
            return None;
        }

        let envelope = match B64.decode(payload) {
            Ok(bytes) if bytes.len() > NONCE_LEN => bytes,
            _ => {
                tracing::debug!(item_id = %id, "dropping malformed envelope");
                return None;
            }
        };
        let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);
        let key = derive_session_key(&self.master_key, session_id);
        let cipher = Aes256Gcm::new(&key.into());
        let plaintext = match cipher.decrypt(Nonce::from_slice(nonce), ciphertext) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                tracing::debug!(item_id = %id, "dropping undecryptable item");
                return None;
            }
        };
        match serde_json::from_slice(&plaintext) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!(item_id = %id, error = %e, "dropping unparseable item");
                None
            }
        }
    }
}

#[async_trait]
impl Session for EncryptedSession {
    async fn get_items(
        &self,
        session_id: &SessionId,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationItem>, SessionError> {
        // Expired items must not count against the limit, so filtering
        // happens before the limit is applied.
        let stored = self.inner.get_items(session_id, None).await?;
        let mut items: Vec<ConversationItem> = stored
            .iter()
            .filter_map(|item| self.unseal(session_id, item))
            .collect();
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
        let sealed: Vec<ConversationItem> = items
            .iter()
            .map(|item| self.seal(session_id, item))
            .collect::<Result<_, _>>()?;
        self.inner.append_items(session_id, &sealed).await
    }

    async fn clear(&self, session_id: &SessionId) -> Result<(), SessionError> {
        self.inner.clear(session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_session_memory::MemorySession;

    fn sid(s: &str) -> SessionId {
        SessionId::new(s)
    }

    fn store_with_key(key: u8) -> EncryptedSession {
        EncryptedSession::new(Arc::new(MemorySession::new()), [key; 32])
    }

    #[test]
    fn derived_keys_differ_per_session() {
        let master = [7u8; 32];
        let a = derive_session_key(&master, &sid("a"));
        let b = derive_session_key(&master, &sid("b"));
        assert_ne!(a, b);
        assert_eq!(a, derive_session_key(&master, &sid("a")));
    }

    #[tokio::test]
    async fn roundtrip_preserves_items_and_order() {
        let store = store_with_key(1);
        let items = vec![
            ConversationItem::user("hello"),
            ConversationItem::assistant("hi"),
            ConversationItem::user("bye"),
        ];
        store.append_items(&sid("s1"), &items).await.unwrap();

        let read = store.get_items(&sid("s1"), None).await.unwrap();
        assert_eq!(read, items);
    }

    #[tokio::test]
    async fn backend_only_sees_sealed_envelopes() {
        let inner = Arc::new(MemorySession::new());
        let store = EncryptedSession::new(inner.clone(), [1u8; 32]);
        store
            .append_items(&sid("s1"), &[ConversationItem::user("secret text")])
            .await
            .unwrap();

        let raw = inner.get_items(&sid("s1"), None).await.unwrap();
        assert_eq!(raw.len(), 1);
        match &raw[0] {
            ConversationItem::Sealed { payload, .. } => {
                assert!(!payload.contains("secret text"));
            }
            other => panic!("expected sealed envelope, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_key_reads_empty_not_error() {
        let inner = Arc::new(MemorySession::new());
        let writer = EncryptedSession::new(inner.clone(), [1u8; 32]);
        writer
            .append_items(&sid("s1"), &[ConversationItem::user("hello")])
            .await
            .unwrap();

        let reader = EncryptedSession::new(inner, [2u8; 32]);
        let read = reader.get_items(&sid("s1"), None).await.unwrap();
        assert!(read.is_empty());
    }

    #[tokio::test]
    async fn expired_items_are_dropped() {
        let now = Arc::new(std::sync::atomic::AtomicU64::new(1_000));
        let clock = {
            let now = now.clone();
            move || now.load(std::sync::atomic::Ordering::SeqCst)
        };
        let store = EncryptedSession::new(Arc::new(MemorySession::new()), [1u8; 32])
            .with_ttl(Duration::from_secs(60))
            .with_clock(clock);

        store
            .append_items(&sid("s1"), &[ConversationItem::user("early")])
            .await
            .unwrap();
        now.store(1_030, std::sync::atomic::Ordering::SeqCst);
        store
            .append_items(&sid("s1"), &[ConversationItem::user("late")])
            .await
            .unwrap();

        // past the first item's expiry, within the second's
        now.store(1_065, std::sync::atomic::Ordering::SeqCst);
        let read = store.get_items(&sid("s1"), None).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].as_text(), Some("late"));
    }

    #[tokio::test]
    async fn limit_applies_after_expiry_filtering() {
        let now = Arc::new(std::sync::atomic::AtomicU64::new(1_000));
        let clock = {
            let now = now.clone();
            move || now.load(std::sync::atomic::Ordering::SeqCst)
        };
        let store = EncryptedSession::new(Arc::new(MemorySession::new()), [1u8; 32])
            .with_ttl(Duration::from_secs(60))
            .with_clock(clock);

        store
            .append_items(&sid("s1"), &[ConversationItem::user("expired")])
            .await
            .unwrap();
        now.store(1_100, std::sync::atomic::Ordering::SeqCst);
        for text in ["a", "b", "c"] {
            store
                .append_items(&sid("s1"), &[ConversationItem::user(text)])
                .await
                .unwrap();
        }

        let read = store.get_items(&sid("s1"), Some(3)).await.unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read[0].as_text(), Some("a"));
        assert_eq!(read[2].as_text(), Some("c"));
    }

    #[tokio::test]
    async fn no_ttl_means_items_never_expire() {
        let store = EncryptedSession::new(Arc::new(MemorySession::new()), [1u8; 32])
            .with_clock(|| u64::MAX - 1);
        store
            .append_items(&sid("s1"), &[ConversationItem::user("forever")])
            .await
            .unwrap();
        let read = store.get_items(&sid("s1"), None).await.unwrap();
        assert_eq!(read.len(), 1);
    }

    #[tokio::test]
    async fn clear_passes_through() {
        let store = store_with_key(1);
        store
            .append_items(&sid("s1"), &[ConversationItem::user("hi")])
            .await
            .unwrap();
        store.clear(&sid("s1")).await.unwrap();
        assert!(store.get_items(&sid("s1"), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tool_items_roundtrip_too() {
        let store = store_with_key(1);
        let items = vec![
            ConversationItem::tool_call(baton_core::ToolCallId::new("c1"), "lookup", r#"{"q":1}"#),
            ConversationItem::tool_result(baton_core::ToolCallId::new("c1"), "42", false),
        ];
        store.append_items(&sid("s1"), &items).await.unwrap();
        let read = store.get_items(&sid("s1"), None).await.unwrap();
        assert_eq!(read, items);
    }

    #[tokio::test]
    async fn plaintext_history_passes_through() {
        let inner = Arc::new(MemorySession::new());
        inner
            .append_items(&sid("s1"), &[ConversationItem::user("legacy")])
            .await
            .unwrap();

        let store = EncryptedSession::new(inner, [1u8; 32]);
        let read = store.get_items(&sid("s1"), None).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].as_text(), Some("legacy"));
    }

    #[test]
    fn encrypted_session_implements_session() {
        fn _assert_session<T: Session>() {}
        _assert_session::<EncryptedSession>();
    }
}
