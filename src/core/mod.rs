//! Core scheduling: jobs, the frame-phase dispatcher, tasks, and focus.

pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod focus;
pub mod job;
pub mod task;
mod timer;

pub use diagnostics::{
    build_diagnostic, ChannelDiagnosticSink, Diagnostic, DiagnosticSink, InMemoryDiagnosticSink,
    TracingDiagnosticSink,
};
pub use dispatcher::{Dispatcher, FramePhase, PassReport, Sleep};
pub use error::{AppResult, CallbackResult, SchedulerError};
pub use focus::{
    FocusArbitrator, FocusEvent, FocusListener, FocusNotice, FocusTarget, DEFAULT_AUDIT_CAPACITY,
};
pub use job::{JobKind, JobOptions, JobState, JobToken};
pub use task::{Hook, Task, TaskHooks, TaskState};
