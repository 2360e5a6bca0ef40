//! The explicit trace context and RAII span handles.

use crate::processor::BatchProcessor;
use crate::record::{ExportItem, SpanKind, SpanRecord, TraceConfig, TraceInfo};
use baton_core::{GroupId, SpanId, TraceId};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The per-run trace context.
///
/// Owns the stack of currently-open span IDs. The stack is read at span
/// start to assign the parent and popped at span end; it is a nesting
/// record, not a shared resource requiring coordination beyond its own
/// mutex. The runner creates one context per run and passes it by
/// reference through the call chain.
pub struct TraceContext {
    info: TraceInfo,
    disabled: bool,
    include_sensitive: bool,
    stack: Mutex<Vec<SpanId>>,
    processor: Arc<BatchProcessor>,
}

impl TraceContext {
    /// Open a trace with a generated identifier. Emits a trace-started
    /// record unless tracing is disabled.
    pub fn new(
        name: impl Into<String>,
        group_id: Option<GroupId>,
        metadata: serde_json::Value,
        config: &TraceConfig,
        processor: Arc<BatchProcessor>,
    ) -> Self {
        Self::with_trace_id(TraceId::generate(), name, group_id, metadata, config, processor)
    }

    /// Open a trace under a caller-supplied identifier, linking the run
    /// into a trace created elsewhere.
    pub fn with_trace_id(
        id: TraceId,
        name: impl Into<String>,
        group_id: Option<GroupId>,
        metadata: serde_json::Value,
        config: &TraceConfig,
        processor: Arc<BatchProcessor>,
    ) -> Self {
        let info = TraceInfo {
            id,
            name: name.into(),
            group_id,
            metadata,
        };
        let ctx = Self {
            info,
            disabled: config.disabled,
            include_sensitive: config.include_sensitive_data,
            stack: Mutex::new(Vec::new()),
            processor,
        };
        if !ctx.disabled {
            ctx.processor
                .enqueue(ExportItem::TraceStarted(ctx.info.clone()));
        }
        ctx
    }

    /// The trace identifier.
    pub fn trace_id(&self) -> &TraceId {
        &self.info.id
    }

    /// Open a span nested under the innermost currently-open span.
    ///
    /// The returned handle finishes the span when consumed by
    /// [`SpanHandle::finish`] or [`SpanHandle::fail`], or on drop —
    /// whichever comes first. Dropping on an error path therefore still
    /// closes the span.
    pub fn start_span(&self, kind: SpanKind) -> SpanHandle<'_> {
        let id = SpanId::generate();
        let parent = {
            let mut stack = self.stack.lock().unwrap_or_else(|e| e.into_inner());
            let parent = stack.last().cloned();
            stack.push(id.clone());
            parent
        };
        SpanHandle {
            ctx: self,
            id,
            parent,
            started_at: now_ms(),
            kind,
            error: None,
            finished: false,
        }
    }

    /// Open a span under an explicit parent, leaving the nesting stack
    /// untouched. For spans that run concurrently — sibling tool calls
    /// within one turn — where stack order does not reflect call
    /// structure.
    pub fn start_span_under(&self, kind: SpanKind, parent: &SpanId) -> SpanHandle<'_> {
        SpanHandle {
            ctx: self,
            id: SpanId::generate(),
            parent: Some(parent.clone()),
            started_at: now_ms(),
            kind,
            error: None,
            finished: false,
        }
    }

    /// Close the trace. Emits a trace-ended record unless tracing is
    /// disabled. Open spans are unaffected — callers finish those via
    /// their handles.
    pub fn end(&self) {
        if !self.disabled {
            self.processor.enqueue(ExportItem::TraceEnded {
                id: self.info.id.clone(),
            });
        }
    }

    fn complete_span(&self, handle: &mut SpanHandle<'_>) {
        {
            let mut stack = self.stack.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(pos) = stack.iter().rposition(|open| *open == handle.id) {
                stack.remove(pos);
            }
        }
        if self.disabled {
            return;
        }
        let record = SpanRecord {
            id: handle.id.clone(),
            trace_id: self.info.id.clone(),
            parent_id: handle.parent.clone(),
            started_at: handle.started_at,
            ended_at: now_ms(),
            kind: handle.kind.clone(),
            error: handle.error.take(),
            sensitive_data_included: self.include_sensitive,
        };
        self.processor.enqueue(ExportItem::Span(record));
    }
}

/// A handle to an open span. Completing the handle (or dropping it)
/// records the span and restores the nesting stack.
pub struct SpanHandle<'a> {
    ctx: &'a TraceContext,
    id: SpanId,
    parent: Option<SpanId>,
    started_at: u64,
    kind: SpanKind,
    error: Option<String>,
    finished: bool,
}

impl SpanHandle<'_> {
    /// This span's identifier.
    pub fn id(&self) -> &SpanId {
        &self.id
    }

    /// Replace the span payload — used to fill in data only known at the
    /// end of the operation (e.g. generation usage, guardrail verdict).
    pub fn set_kind(&mut self, kind: SpanKind) {
        self.kind = kind;
    }

    /// Close the span successfully.
    pub fn finish(mut self) {
        self.complete();
    }

    /// Close the span as errored.
    pub fn fail(mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.complete();
    }

    fn complete(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let ctx = self.ctx;
        ctx.complete_span(self);
    }
}

impl Drop for SpanHandle<'_> {
    fn drop(&mut self) {
        self.complete();
    }
}
