//! Job model: kinds, lifecycle state, options, and the caller-facing token.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::CallbackResult;
use crate::util::ids::{JobId, Priority, TaskId};

/// Queue a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// One-shot job run on the next update pass.
    Immediate,
    /// Recurring job run on every update pass.
    Update,
    /// Recurring job run on every render pass.
    Render,
    /// One-shot job run during the exit pass at shutdown.
    Exit,
    /// One-shot job run after a number of update passes.
    DeferredUpdate,
}

impl JobKind {
    /// Whether the job transitions to `Completed` after its first invocation.
    pub const fn is_one_shot(self) -> bool {
        matches!(self, Self::Immediate | Self::Exit | Self::DeferredUpdate)
    }
}

/// Lifecycle state of a job.
///
/// `Cancelled` and `Completed` are absorbing; only `Active` and `Paused`
/// can move back and forth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Eligible to run.
    Active,
    /// Held in place; keeps its position in the queue.
    Paused,
    /// Will never run again.
    Cancelled,
    /// One-shot job that has run.
    Completed,
}

impl JobState {
    /// Whether the state is absorbing.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Options accepted by recurring registrations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Higher runs earlier within a phase.
    pub priority: Priority,
    /// Keep running while the engine is globally paused.
    pub background: bool,
}

impl JobOptions {
    /// Options with the given priority, not background.
    pub const fn with_priority(priority: Priority) -> Self {
        Self {
            priority,
            background: false,
        }
    }

    /// Set the background flag.
    #[must_use]
    pub const fn in_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }
}

/// Boxed job callback.
pub(crate) type Callback = Box<dyn FnMut() -> CallbackResult + Send>;

/// State cell shared between a queued job and every token for it.
#[derive(Debug)]
pub(crate) struct JobCell {
    state: Mutex<JobState>,
}

impl JobCell {
    pub(crate) fn new(state: JobState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    pub(crate) fn state(&self) -> JobState {
        *self.state.lock()
    }

    pub(crate) fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        *state = JobState::Cancelled;
        true
    }

    pub(crate) fn pause(&self) -> bool {
        let mut state = self.state.lock();
        if *state != JobState::Active {
            return false;
        }
        *state = JobState::Paused;
        true
    }

    pub(crate) fn resume(&self) -> bool {
        let mut state = self.state.lock();
        if *state != JobState::Paused {
            return false;
        }
        *state = JobState::Active;
        true
    }

    /// Marks a one-shot job as having run, unless it was cancelled meanwhile.
    pub(crate) fn complete(&self) {
        let mut state = self.state.lock();
        if !state.is_terminal() {
            *state = JobState::Completed;
        }
    }
}

/// Where a job came from, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JobSource {
    pub owner: Option<TaskId>,
    pub label: &'static str,
}

impl JobSource {
    pub(crate) const fn anonymous(label: &'static str) -> Self {
        Self { owner: None, label }
    }
}

/// A registered job as stored by the dispatcher.
pub(crate) struct JobEntry {
    pub id: JobId,
    pub kind: JobKind,
    pub priority: Priority,
    pub seq: u64,
    pub background: bool,
    pub source: JobSource,
    pub cell: Arc<JobCell>,
    pub callback: Arc<Mutex<Callback>>,
}

impl JobEntry {
    pub(crate) fn token(&self) -> JobToken {
        JobToken {
            id: self.id,
            kind: self.kind,
            cell: Arc::clone(&self.cell),
        }
    }
}

/// Handle to a registered job.
///
/// All operations are idempotent and never fail; on a cancelled or
/// completed job they do nothing. Cancelling from inside the job's own
/// callback lets the current invocation finish and prevents any later one.
#[derive(Debug, Clone)]
pub struct JobToken {
    id: JobId,
    kind: JobKind,
    cell: Arc<JobCell>,
}

impl JobToken {
    /// Token for a registration that was refused (dispatcher already shut down).
    pub(crate) fn refused(kind: JobKind) -> Self {
        Self {
            id: JobId::new(),
            kind,
            cell: JobCell::new(JobState::Cancelled),
        }
    }

    /// Stable job identity.
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Queue the job was registered in.
    pub const fn kind(&self) -> JobKind {
        self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        self.cell.state()
    }

    /// Whether the job will never run again.
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Cancel the job.
    pub fn cancel(&self) {
        if self.cell.cancel() {
            tracing::debug!("{} cancelled", self.id);
        }
    }

    /// Hold the job in place without losing its position.
    pub fn pause(&self) {
        if self.cell.pause() {
            tracing::debug!("{} paused", self.id);
        }
    }

    /// Undo [`pause`](Self::pause).
    pub fn resume(&self) {
        if self.cell.resume() {
            tracing::debug!("{} resumed", self.id);
        }
    }
}
