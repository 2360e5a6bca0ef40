#![deny(missing_docs)]
//! Guardrails for agent runs.
//!
//! A guardrail is a check that runs alongside the agent and can trip a
//! tripwire that aborts the run. Input guardrails screen the user's
//! input before the first model call; output guardrails screen the
//! final candidate output before it is returned. All guardrails of a
//! stage are issued together and awaited jointly; a trip aborts the
//! run, a check failure is an error in its own right.
//!
//! The [`Debouncer`] supports checking streamed output incrementally
//! without running a check on every token.

use async_trait::async_trait;
use baton_core::{AgentName, ConversationItem, RunContext};
use futures_util::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors from guardrail execution (distinct from a tripped tripwire).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GuardrailError {
    /// A check implementation failed to run.
    #[error("guardrail check failed: {0}")]
    Failed(String),

    /// A named guardrail failed to run. Produced by the engine so callers
    /// know which of the configured guardrails errored.
    #[error("guardrail {guardrail} failed: {message}")]
    Execution {
        /// Name of the guardrail that errored.
        guardrail: String,
        /// Error message.
        message: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The verdict of one guardrail check.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailResult {
    /// Whether the tripwire fired. A fired tripwire aborts the run.
    pub tripwire_triggered: bool,
    /// Diagnostic payload explaining the verdict.
    pub output: Value,
}

impl GuardrailResult {
    /// A passing verdict with no diagnostic payload.
    pub fn pass() -> Self {
        Self {
            tripwire_triggered: false,
            output: Value::Null,
        }
    }

    /// A tripped verdict with a diagnostic payload.
    pub fn trip(output: Value) -> Self {
        Self {
            tripwire_triggered: true,
            output,
        }
    }
}

/// A guardrail that screens the input items before the first model call.
///
/// Generic over the run's context payload type, so a guardrail can read
/// application state (tenant, user record, feature flags) without
/// downcasting.
#[async_trait]
pub trait InputGuardrail<C: Send + Sync>: Send + Sync {
    /// Stable name used in error reporting and trace spans.
    fn name(&self) -> &str;

    /// Run the check against the input the run starts from.
    async fn check(
        &self,
        ctx: &RunContext<C>,
        agent: &AgentName,
        input: &[ConversationItem],
    ) -> Result<GuardrailResult, GuardrailError>;
}

/// A guardrail that screens the final candidate output of a run.
#[async_trait]
pub trait OutputGuardrail<C: Send + Sync>: Send + Sync {
    /// Stable name used in error reporting and trace spans.
    fn name(&self) -> &str;

    /// Run the check against the candidate final output.
    async fn check(
        &self,
        ctx: &RunContext<C>,
        agent: &AgentName,
        output: &str,
    ) -> Result<GuardrailResult, GuardrailError>;
}

/// Outcome of running one stage of guardrails.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardrailsOutcome {
    /// Every guardrail passed.
    Passed,
    /// A tripwire fired. When several fire in the same stage, the first
    /// in declaration order is reported.
    Tripped {
        /// Name of the tripped guardrail.
        guardrail: String,
        /// Its diagnostic payload.
        output: Value,
    },
}

/// Run all input guardrails jointly and fold their verdicts.
///
/// Checks are issued together and awaited as a group. Verdicts are then
/// scanned in declaration order: the first tripped tripwire wins, and a
/// check that errored surfaces as [`GuardrailError::Execution`].
pub async fn run_input_guardrails<C: Send + Sync>(
    guardrails: &[Arc<dyn InputGuardrail<C>>],
    ctx: &RunContext<C>,
    agent: &AgentName,
    input: &[ConversationItem],
) -> Result<GuardrailsOutcome, GuardrailError> {
    let checks = guardrails.iter().map(|g| g.check(ctx, agent, input));
    fold_verdicts(guardrails.iter().map(|g| g.name()), join_all(checks).await)
}

/// Run all output guardrails jointly and fold their verdicts.
///
/// Same contract as [`run_input_guardrails`], applied to the final
/// candidate output.
pub async fn run_output_guardrails<C: Send + Sync>(
    guardrails: &[Arc<dyn OutputGuardrail<C>>],
    ctx: &RunContext<C>,
    agent: &AgentName,
    output: &str,
) -> Result<GuardrailsOutcome, GuardrailError> {
    let checks = guardrails.iter().map(|g| g.check(ctx, agent, output));
    fold_verdicts(guardrails.iter().map(|g| g.name()), join_all(checks).await)
}

fn fold_verdicts<'a>(
    names: impl Iterator<Item = &'a str>,
    verdicts: Vec<Result<GuardrailResult, GuardrailError>>,
) -> Result<GuardrailsOutcome, GuardrailError> {
    for (name, verdict) in names.zip(verdicts) {
        let result = verdict.map_err(|e| GuardrailError::Execution {
            guardrail: name.to_owned(),
            message: e.to_string(),
        })?;
        if result.tripwire_triggered {
            return Ok(GuardrailsOutcome::Tripped {
                guardrail: name.to_owned(),
                output: result.output,
            });
        }
    }
    Ok(GuardrailsOutcome::Passed)
}

/// Default character threshold between debounced checks.
pub const DEFAULT_DEBOUNCE_CHARS: usize = 100;

/// Character-count debounce for guardrails over streamed output.
///
/// Feed each text delta as it arrives; `feed` returns `true` when enough
/// new characters have accumulated that a check is due. The caller runs
/// one final check at turn end regardless, so text arriving after the
/// last debounced check is still screened.
#[derive(Debug)]
pub struct Debouncer {
    threshold: usize,
    pending: usize,
}

impl Debouncer {
    /// Create a debouncer with the default threshold.
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_DEBOUNCE_CHARS)
    }

    /// Create a debouncer firing every `threshold` characters.
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            pending: 0,
        }
    }

    /// Account for a new text delta. Returns `true` when a check is due;
    /// the pending count resets when it fires.
    pub fn feed(&mut self, delta: &str) -> bool {
        self.pending += delta.chars().count();
        if self.pending >= self.threshold {
            self.pending = 0;
            true
        } else {
            false
        }
    }

    /// Discard accumulated characters (e.g. after an interruption).
    pub fn reset(&mut self) {
        self.pending = 0;
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}
