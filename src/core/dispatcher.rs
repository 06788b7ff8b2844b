//! Frame-phase job dispatcher.
//!
//! The dispatcher owns one queue per job kind plus the deferred timer, and is
//! advanced by the host once per phase per frame. It is single-threaded and
//! cooperative: a pass takes a snapshot of the eligible jobs, releases its
//! lock, and invokes each callback to completion in order. Anything a callback
//! registers lands in the table and is only picked up by the next pass of the
//! relevant phase.
//!
//! Within a pass jobs run by priority (highest first), then registration order.
//! An update pass runs, in order: due immediate jobs, recurring update jobs,
//! then deferred jobs whose countdown reached zero on this pass.

use std::any::Any;
use std::cmp::Reverse;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::core::diagnostics::{build_diagnostic, DiagnosticSink, TracingDiagnosticSink};
use crate::core::focus::FocusArbitrator;
use crate::core::job::{Callback, JobCell, JobEntry, JobKind, JobOptions, JobSource, JobState, JobToken};
use crate::core::timer::{DeferredTimer, TimerGate};
use crate::core::{CallbackResult, SchedulerError};
use crate::util::ids::{JobId, Priority, TaskId};

/// Phase of a frame the host can tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePhase {
    /// Input check and logic update.
    Update,
    /// Drawing.
    Render,
    /// Shutdown; runs once.
    Exit,
}

/// Outcome of one dispatcher pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Phase that was ticked.
    pub phase: FramePhase,
    /// Callbacks invoked.
    pub ran: usize,
    /// Invoked callbacks that returned an error or panicked.
    pub failed: usize,
    /// Live jobs that were held back (paused, or excluded by global pause).
    pub skipped: usize,
}

impl PassReport {
    const fn empty(phase: FramePhase) -> Self {
        Self {
            phase,
            ran: 0,
            failed: 0,
            skipped: 0,
        }
    }
}

/// One job picked for the current pass.
struct Scheduled {
    id: JobId,
    kind: JobKind,
    source: JobSource,
    cell: Arc<JobCell>,
    callback: Arc<Mutex<Callback>>,
}

impl Scheduled {
    fn from_entry(entry: &JobEntry) -> Self {
        Self {
            id: entry.id,
            kind: entry.kind,
            source: entry.source,
            cell: Arc::clone(&entry.cell),
            callback: Arc::clone(&entry.callback),
        }
    }
}

/// Registered jobs and pass bookkeeping.
struct JobTable {
    /// Registration order; `seq` is strictly increasing along the vector.
    jobs: Vec<JobEntry>,
    next_seq: u64,
    timer: DeferredTimer,
    paused: bool,
    exited: bool,
    shut_down: bool,
    update_passes: u64,
}

impl JobTable {
    fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_seq: 0,
            timer: DeferredTimer::new(),
            paused: false,
            exited: false,
            shut_down: false,
            update_passes: 0,
        }
    }

    fn prune(&mut self) {
        self.jobs.retain(|job| !job.cell.state().is_terminal());
    }

    const fn admits(&self, background: bool) -> bool {
        background || !self.paused
    }

    /// Eligible jobs of `kind` in dispatch order, plus the count held back.
    fn collect(&self, kind: JobKind) -> (Vec<&JobEntry>, usize) {
        let mut skipped = 0;
        let mut picked: Vec<&JobEntry> = Vec::new();
        for job in self.jobs.iter().filter(|job| job.kind == kind) {
            match job.cell.state() {
                JobState::Active if self.admits(job.background) => picked.push(job),
                JobState::Active | JobState::Paused => skipped += 1,
                JobState::Cancelled | JobState::Completed => {}
            }
        }
        picked.sort_by_key(|job| Reverse(job.priority));
        (picked, skipped)
    }

    fn collect_update(&mut self) -> (Vec<Scheduled>, usize) {
        let (immediate, held_immediate) = self.collect(JobKind::Immediate);
        let (recurring, held_recurring) = self.collect(JobKind::Update);
        let mut batch: Vec<Scheduled> = immediate
            .into_iter()
            .chain(recurring)
            .map(Scheduled::from_entry)
            .collect();

        let Self {
            jobs, timer, paused, ..
        } = self;
        let paused = *paused;
        let mut held_deferred = 0;
        let fired = timer.advance(|id| {
            let Some(job) = jobs.iter().find(|job| job.id == id) else {
                return TimerGate::Discard;
            };
            match job.cell.state() {
                JobState::Active if job.background || !paused => TimerGate::Advance,
                JobState::Active | JobState::Paused => {
                    held_deferred += 1;
                    TimerGate::Hold
                }
                JobState::Cancelled | JobState::Completed => TimerGate::Discard,
            }
        });

        let mut due: Vec<&JobEntry> = jobs.iter().filter(|job| fired.contains(&job.id)).collect();
        due.sort_by_key(|job| Reverse(job.priority));
        batch.extend(due.into_iter().map(Scheduled::from_entry));

        (batch, held_immediate + held_recurring + held_deferred)
    }

    fn collect_exit(&self) -> Vec<Scheduled> {
        let mut exits: Vec<&JobEntry> = self
            .jobs
            .iter()
            .filter(|job| job.kind == JobKind::Exit && !job.cell.state().is_terminal())
            .collect();
        exits.sort_by_key(|job| Reverse(job.priority));
        exits.into_iter().map(Scheduled::from_entry).collect()
    }

    fn teardown(&mut self) {
        for job in &self.jobs {
            job.cell.cancel();
        }
        self.jobs.clear();
        self.timer.clear();
        self.shut_down = true;
    }
}

/// Single-threaded multiplexer of frame-phase jobs.
///
/// `Dispatcher` is a cheap handle; clones share the same job table and
/// diagnostic sink, so callbacks can capture a clone and register more work.
#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<Mutex<JobTable>>,
    diagnostics: Arc<Mutex<Box<dyn DiagnosticSink>>>,
    /// Arbitrators latched at the start of each update pass.
    focus: Arc<Mutex<Vec<FocusArbitrator>>>,
    catch_panics: bool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a dispatcher that logs diagnostics through `tracing` and turns
    /// callback panics into diagnostics.
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(JobTable::new())),
            diagnostics: Arc::new(Mutex::new(Box::new(TracingDiagnosticSink))),
            focus: Arc::new(Mutex::new(Vec::new())),
            catch_panics: true,
        }
    }

    /// Replace the diagnostic sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Arc::new(Mutex::new(sink));
        self
    }

    /// Choose whether callback panics are caught and reported (default) or
    /// propagated to the host.
    #[must_use]
    pub const fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }

    /// Run `callback` once on the next update pass.
    pub fn schedule_immediate<F>(&self, callback: F, background: bool) -> JobToken
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.register(
            JobKind::Immediate,
            JobOptions::default().in_background(background),
            JobSource::anonymous("immediate"),
            None,
            Box::new(callback),
        )
    }

    /// Run `callback` once after `frames` update passes; 0 behaves like 1 and
    /// fires on the next update pass.
    pub fn schedule_deferred<F>(&self, frames: u32, callback: F, background: bool) -> JobToken
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.register(
            JobKind::DeferredUpdate,
            JobOptions::default().in_background(background),
            JobSource::anonymous("deferred"),
            Some(frames),
            Box::new(callback),
        )
    }

    /// Run `callback` on every pass of `phase` until cancelled.
    ///
    /// `FramePhase::Exit` registers a one-shot exit job at the given priority.
    pub fn schedule_recurring<F>(&self, phase: FramePhase, callback: F, options: JobOptions) -> JobToken
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.schedule_owned(phase, options, JobSource::anonymous(phase_label(phase)), callback)
    }

    /// Run `callback` once when the host shuts down.
    pub fn schedule_on_exit<F>(&self, callback: F) -> JobToken
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.schedule_on_exit_with(0, callback)
    }

    /// Run `callback` once when the host shuts down, ordered by `priority`.
    pub fn schedule_on_exit_with<F>(&self, priority: Priority, callback: F) -> JobToken
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.register(
            JobKind::Exit,
            JobOptions::with_priority(priority),
            JobSource::anonymous("exit"),
            None,
            Box::new(callback),
        )
    }

    /// Wait for `frames` update passes.
    pub fn sleep(&self, frames: u32) -> Sleep {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let token = self.schedule_deferred(
            frames,
            move || {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
                Ok(())
            },
            false,
        );
        Sleep { token, rx }
    }

    pub(crate) fn schedule_owned<F>(
        &self,
        phase: FramePhase,
        options: JobOptions,
        source: JobSource,
        callback: F,
    ) -> JobToken
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        let kind = match phase {
            FramePhase::Update => JobKind::Update,
            FramePhase::Render => JobKind::Render,
            FramePhase::Exit => JobKind::Exit,
        };
        self.register(kind, options, source, None, Box::new(callback))
    }

    fn register(
        &self,
        kind: JobKind,
        options: JobOptions,
        source: JobSource,
        delay: Option<u32>,
        callback: Callback,
    ) -> JobToken {
        let mut table = self.table.lock();
        if table.shut_down {
            tracing::warn!("{:?} job registered after shutdown; ignored", kind);
            return JobToken::refused(kind);
        }
        let seq = table.next_seq;
        table.next_seq += 1;
        let entry = JobEntry {
            id: JobId::new(),
            kind,
            priority: options.priority,
            seq,
            background: options.background,
            source,
            cell: JobCell::new(JobState::Active),
            callback: Arc::new(Mutex::new(callback)),
        };
        if let Some(frames) = delay {
            table.timer.arm(entry.id, frames);
        }
        let token = entry.token();
        tracing::debug!(
            "registered {} ({:?}, priority {}, seq {})",
            entry.id,
            kind,
            entry.priority,
            entry.seq
        );
        table.jobs.push(entry);
        token
    }

    /// Latch `arbitrator`'s holder at the start of every update pass, so
    /// focus-gated jobs see one holder for the whole pass.
    pub fn track_focus(&self, arbitrator: &FocusArbitrator) {
        let mut tracked = self.focus.lock();
        if !tracked.iter().any(|known| known.same_slot(arbitrator)) {
            tracked.push(arbitrator.clone());
        }
    }

    /// Cancel every job except exit jobs.
    pub fn cancel_all(&self) {
        let table = self.table.lock();
        let mut cancelled = 0usize;
        for job in table.jobs.iter().filter(|job| job.kind != JobKind::Exit) {
            if job.cell.cancel() {
                cancelled += 1;
            }
        }
        tracing::info!("cancelled {} jobs", cancelled);
    }

    /// Enter or leave engine-wide pause. While paused only background jobs
    /// (and exit jobs) run.
    pub fn set_paused(&self, paused: bool) {
        let mut table = self.table.lock();
        if table.paused != paused {
            tracing::info!("engine {}", if paused { "paused" } else { "resumed" });
        }
        table.paused = paused;
    }

    /// Whether engine-wide pause is active.
    pub fn is_paused(&self) -> bool {
        self.table.lock().paused
    }

    /// Number of update passes run so far.
    pub fn frame(&self) -> u64 {
        self.table.lock().update_passes
    }

    /// Number of jobs that may still run.
    pub fn pending_jobs(&self) -> usize {
        self.table
            .lock()
            .jobs
            .iter()
            .filter(|job| !job.cell.state().is_terminal())
            .count()
    }

    /// Number of deferred jobs still counting down.
    pub fn pending_deferred(&self) -> usize {
        self.table.lock().timer.len()
    }

    /// Update passes left before a deferred job fires.
    pub fn deferred_remaining(&self, token: &JobToken) -> Option<u32> {
        self.table.lock().timer.remaining(token.id())
    }

    /// Whether [`shutdown`](Self::shutdown) has torn the dispatcher down.
    pub fn is_shut_down(&self) -> bool {
        self.table.lock().shut_down
    }

    /// Run one pass of `phase`.
    ///
    /// The exit pass runs at most once; ticking after shutdown does nothing.
    pub fn tick(&self, phase: FramePhase) -> PassReport {
        let (batch, skipped, frame) = {
            let mut table = self.table.lock();
            if table.shut_down {
                return PassReport::empty(phase);
            }
            table.prune();
            let (batch, skipped) = match phase {
                FramePhase::Update => {
                    table.update_passes += 1;
                    table.collect_update()
                }
                FramePhase::Render => {
                    let (picked, skipped) = table.collect(JobKind::Render);
                    (picked.into_iter().map(Scheduled::from_entry).collect(), skipped)
                }
                FramePhase::Exit => {
                    if table.exited {
                        return PassReport::empty(phase);
                    }
                    table.exited = true;
                    (table.collect_exit(), 0)
                }
            };
            (batch, skipped, table.update_passes)
        };
        if phase == FramePhase::Update {
            for arbitrator in self.focus.lock().iter() {
                arbitrator.latch();
            }
        }

        let mut report = PassReport {
            phase,
            ran: 0,
            failed: 0,
            skipped,
        };
        for job in batch {
            match job.cell.state() {
                JobState::Active => {}
                JobState::Paused if phase == FramePhase::Exit => {}
                JobState::Paused => {
                    report.skipped += 1;
                    continue;
                }
                JobState::Cancelled | JobState::Completed => continue,
            }
            let outcome = self.invoke(&job);
            report.ran += 1;
            if job.kind.is_one_shot() {
                job.cell.complete();
            }
            if let Err(message) = outcome {
                report.failed += 1;
                self.emit(Some(job.id), job.source.owner, job.source.label, Some(phase), frame, message);
            }
        }
        tracing::debug!(
            "{:?} pass {}: ran {}, failed {}, skipped {}",
            phase,
            frame,
            report.ran,
            report.failed,
            report.skipped
        );
        report
    }

    /// Run the exit pass (once) and tear the dispatcher down. Registrations
    /// made afterwards are refused.
    pub fn shutdown(&self) -> PassReport {
        let report = self.tick(FramePhase::Exit);
        let mut table = self.table.lock();
        if !table.shut_down {
            table.teardown();
            tracing::info!("dispatcher shut down after {} frames", table.update_passes);
        }
        report
    }

    fn invoke(&self, job: &Scheduled) -> Result<(), String> {
        let Some(mut callback) = job.callback.try_lock() else {
            return Err(format!("{} re-entered while already running", job.id));
        };
        run_guarded(self.catch_panics, || (&mut **callback)())
    }

    pub(crate) const fn catch_panics(&self) -> bool {
        self.catch_panics
    }

    /// Send a failure to the diagnostic channel from outside a pass.
    pub(crate) fn report(&self, task_id: Option<TaskId>, source: &str, message: String) {
        let frame = self.frame();
        self.emit(None, task_id, source, None, frame, message);
    }

    fn emit(
        &self,
        job_id: Option<JobId>,
        task_id: Option<TaskId>,
        source: &str,
        phase: Option<FramePhase>,
        frame: u64,
        message: String,
    ) {
        let diagnostic = build_diagnostic(job_id, task_id, source, phase, frame, message);
        self.diagnostics.lock().report(diagnostic);
    }
}

const fn phase_label(phase: FramePhase) -> &'static str {
    match phase {
        FramePhase::Update => "update",
        FramePhase::Render => "render",
        FramePhase::Exit => "exit",
    }
}

/// Run a callback, turning its error (and, if enabled, its panic) into a
/// message for the diagnostic channel.
pub(crate) fn run_guarded<F>(catch_panics: bool, f: F) -> Result<(), String>
where
    F: FnOnce() -> CallbackResult,
{
    if !catch_panics {
        return f().map_err(|e| format!("{e:#}"));
    }
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.map_err(|e| format!("{e:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}

/// Future returned by [`Dispatcher::sleep`]; resolves on the update pass
/// where its deferred job fires.
#[derive(Debug)]
pub struct Sleep {
    token: JobToken,
    rx: oneshot::Receiver<()>,
}

impl Sleep {
    /// Token of the underlying deferred job.
    pub const fn token(&self) -> &JobToken {
        &self.token
    }
}

impl Future for Sleep {
    type Output = Result<(), SchedulerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.map_err(|_| SchedulerError::Cancelled))
    }
}
