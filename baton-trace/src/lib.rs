#![deny(missing_docs)]
//! Domain tracing for baton runs.
//!
//! A [`TraceContext`] wraps one end-to-end run. Spans are timed
//! sub-operations (agent execution, generation call, tool call, guardrail
//! check, handoff, transcription) that nest strictly: every span belongs
//! to exactly one open ancestor. Nesting is tracked by an explicit
//! context-stack object owned by the run and passed by reference — not by
//! thread-local state — with RAII handles guaranteeing that spans are
//! closed on every exit path, including error paths.
//!
//! Completed records flow to a [`BatchProcessor`], which buffers them and
//! flushes to one or more [`TraceExporter`] sinks. Export failures are
//! logged via [`tracing`] and never surface into the run.
//!
//! This is NOT the `tracing` crate's span machinery: these spans are
//! exportable domain records with a typed payload. `tracing` is used
//! alongside for operational diagnostics.

pub mod context;
pub mod processor;
pub mod record;

pub use context::{SpanHandle, TraceContext};
pub use processor::{BatchProcessor, ConsoleExporter, ExportError, MemoryExporter, TraceExporter};
pub use record::{ExportItem, SpanKind, SpanRecord, TraceConfig, TraceInfo};
