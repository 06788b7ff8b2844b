//! Diagnostic channel for callback failures.
//!
//! Every error or panic raised by a job callback or task hook is turned into a
//! [`Diagnostic`] and handed to the dispatcher's [`DiagnosticSink`]. Sinks never
//! fail and never stop the frame.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::FramePhase;
use crate::util::clock::now_ms;
use crate::util::ids::{JobId, TaskId};

/// A single reported callback failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Failing job, if the failure came from a queued job.
    pub job_id: Option<JobId>,
    /// Owning task, if the job or hook belongs to one.
    pub task_id: Option<TaskId>,
    /// Which callback failed (`update`, `render`, `stop`, `exit`, ...).
    pub source: String,
    /// Phase during which the failure happened, if inside a pass.
    pub phase: Option<FramePhase>,
    /// Update pass count at the time of the failure.
    pub frame: u64,
    /// Error description.
    pub message: String,
    /// Wall-clock timestamp in milliseconds.
    pub recorded_at_ms: u128,
}

/// Receiver of diagnostics.
pub trait DiagnosticSink: Send {
    /// Record a diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);
}

impl<S: DiagnosticSink> DiagnosticSink for Arc<Mutex<S>> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.lock().report(diagnostic);
    }
}

/// Logs each diagnostic at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnosticSink;

impl DiagnosticSink for TracingDiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::error!(
            job = ?diagnostic.job_id,
            task = ?diagnostic.task_id,
            source = %diagnostic.source,
            phase = ?diagnostic.phase,
            frame = diagnostic.frame,
            "callback failed: {}",
            diagnostic.message
        );
    }
}

/// Bounded in-memory sink for tests and tooling. Oldest entries are dropped
/// first once full.
#[derive(Debug)]
pub struct InMemoryDiagnosticSink {
    entries: VecDeque<Diagnostic>,
    max_entries: usize,
}

impl InMemoryDiagnosticSink {
    /// Create a sink holding at most `max_entries` diagnostics.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries.min(1024)),
            max_entries,
        }
    }

    /// Snapshot of stored diagnostics, oldest first.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.iter().cloned().collect()
    }
}

impl DiagnosticSink for InMemoryDiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{}: {}", diagnostic.source, diagnostic.message);
        if self.max_entries == 0 {
            return;
        }
        if self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(diagnostic);
    }
}

/// Forwards diagnostics over a crossbeam channel so the host can drain them
/// wherever it likes.
#[derive(Debug, Clone)]
pub struct ChannelDiagnosticSink {
    tx: Sender<Diagnostic>,
}

impl ChannelDiagnosticSink {
    /// Create a sink and the receiver that drains it.
    pub fn unbounded() -> (Self, Receiver<Diagnostic>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl DiagnosticSink for ChannelDiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        if let Err(e) = self.tx.send(diagnostic) {
            let diagnostic = e.into_inner();
            tracing::error!(
                "diagnostic receiver gone; {}: {}",
                diagnostic.source,
                diagnostic.message
            );
        }
    }
}

/// Helper to build a diagnostic stamped with the current time.
pub fn build_diagnostic(
    job_id: Option<JobId>,
    task_id: Option<TaskId>,
    source: impl Into<String>,
    phase: Option<FramePhase>,
    frame: u64,
    message: impl Into<String>,
) -> Diagnostic {
    Diagnostic {
        job_id,
        task_id,
        source: source.into(),
        phase,
        frame,
        message: message.into(),
        recorded_at_ms: now_ms(),
    }
}
