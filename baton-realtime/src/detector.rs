//! Turn detection — partitioning a continuous input stream into turns.

use async_trait::async_trait;

/// Decides where one caller turn ends and the next begins.
///
/// The session feeds it every piece of caller input plus the backend's
/// boundary signals; whenever a call returns `Some`, the returned text
/// is a completed turn ready for a runner pass.
#[async_trait]
pub trait TurnDetector: Send {
    /// Observe caller text. Returns the completed turn when this input
    /// closes one.
    async fn push_text(&mut self, text: &str) -> Option<String>;

    /// Observe caller audio.
    async fn push_audio(&mut self, bytes: &[u8]) -> Option<String> {
        let _ = bytes;
        None
    }

    /// The backend signaled a turn boundary.
    async fn boundary(&mut self) -> Option<String>;
}

/// Trusts the backend's voice-activity detection: input accumulates
/// until a [`TurnDetector::boundary`] signal arrives.
///
/// Audio is forwarded to the backend as-is; the turn content this
/// detector yields is the text received since the last boundary.
#[derive(Debug, Default)]
pub struct BackendVad {
    pending: String,
}

impl BackendVad {
    /// Create a detector with no pending input.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TurnDetector for BackendVad {
    async fn push_text(&mut self, text: &str) -> Option<String> {
        self.pending.push_str(text);
        None
    }

    async fn boundary(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Closes a turn once the pending text reaches a character threshold.
/// Intended for text-only flows and tests; counts characters, not bytes.
#[derive(Debug)]
pub struct CharThreshold {
    threshold: usize,
    pending: String,
}

impl CharThreshold {
    /// Create a detector that closes a turn at `threshold` characters.
    /// A threshold of zero behaves as one.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            pending: String::new(),
        }
    }
}

#[async_trait]
impl TurnDetector for CharThreshold {
    async fn push_text(&mut self, text: &str) -> Option<String> {
        self.pending.push_str(text);
        if self.pending.chars().count() >= self.threshold {
            Some(std::mem::take(&mut self.pending))
        } else {
            None
        }
    }

    async fn boundary(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}
