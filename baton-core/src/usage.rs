//! Token and request accounting for a run.

use serde::{Deserialize, Serialize};

/// Accumulated model usage for one run.
///
/// Every field is concrete (not optional) because every model call
/// produces this data. Backends that can't report a field use zero.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of model requests made.
    pub requests: u64,
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Total tokens (input + output, as reported by the backend).
    pub total_tokens: u64,
}

impl Usage {
    /// Usage for a single request with the given token counts.
    pub fn for_request(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            requests: 1,
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }

    /// Fold another usage record into this one.
    pub fn add(&mut self, other: &Usage) {
        self.requests += other.requests;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}
