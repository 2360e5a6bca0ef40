//! The run context — the caller-defined data bag threaded through a run.

use crate::usage::Usage;
use std::sync::Mutex;

/// Run-scoped wrapper around an application-defined payload plus a usage
/// accumulator.
///
/// Exactly one `RunContext` exists per run. The runner threads it by
/// reference (typically behind an `Arc`) into every tool call, guardrail,
/// and the realtime session. The payload type `C` is fixed for the
/// lifetime of the run by the type parameter — mismatched context types
/// between an agent and its tools are a compile error, not a runtime one.
pub struct RunContext<C> {
    payload: C,
    usage: Mutex<Usage>,
}

impl<C> RunContext<C> {
    /// Wrap a payload in a fresh context with zero usage.
    pub fn new(payload: C) -> Self {
        Self {
            payload,
            usage: Mutex::new(Usage::default()),
        }
    }

    /// Borrow the caller's payload.
    pub fn payload(&self) -> &C {
        &self.payload
    }

    /// Snapshot of the usage accumulated so far.
    pub fn usage(&self) -> Usage {
        // Lock poisoning would mean a panic while holding the lock in
        // `add_usage`, which performs no panicking operations.
        self.usage.lock().map(|u| u.clone()).unwrap_or_default()
    }

    /// Fold usage from one model call into the run's accumulator.
    pub fn add_usage(&self, usage: &Usage) {
        if let Ok(mut total) = self.usage.lock() {
            total.add(usage);
        }
    }
}

impl<C: Default> Default for RunContext<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}
