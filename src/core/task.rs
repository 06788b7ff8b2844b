//! Stateful tasks built from lifecycle hooks.
//!
//! A [`Task`] bundles up to five hooks (start, stop, input check, update,
//! render) and, while running, keeps one dispatcher job per phase hook plus an
//! exit job that stops it at shutdown. All of its jobs share the task's
//! priority and background flag.
//!
//! ```text
//! Constructed -> Starting -> Running -> Stopping -> Stopped
//! ```
//!
//! The input-check hook only runs on update passes the task started while
//! holding focus; a focus change made during a pass counts from the next one.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::core::dispatcher::run_guarded;
use crate::core::focus::{FocusArbitrator, FocusNotice, FocusTarget};
use crate::core::job::{JobOptions, JobSource, JobToken};
use crate::core::{CallbackResult, Dispatcher, FramePhase, SchedulerError};
use crate::util::ids::{Priority, TaskId};

/// A lifecycle hook.
pub type Hook = Box<dyn FnMut() -> CallbackResult + Send>;

type HookSlot = Arc<Mutex<Option<Hook>>>;

/// The set of hooks a task is built from. Missing hooks are no-ops.
#[derive(Default)]
pub struct TaskHooks {
    start: Option<Hook>,
    stop: Option<Hook>,
    input_check: Option<Hook>,
    update: Option<Hook>,
    render: Option<Hook>,
}

impl TaskHooks {
    /// No hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run once, synchronously, inside [`Task::start`].
    #[must_use]
    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.start = Some(Box::new(hook));
        self
    }

    /// Run once when the task stops, explicitly or at shutdown.
    #[must_use]
    pub fn on_stop<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.stop = Some(Box::new(hook));
        self
    }

    /// Run every update pass, just before the update hook, while the task
    /// holds focus.
    #[must_use]
    pub fn on_input_check<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.input_check = Some(Box::new(hook));
        self
    }

    /// Run every update pass.
    #[must_use]
    pub fn on_update<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.update = Some(Box::new(hook));
        self
    }

    /// Run every render pass.
    #[must_use]
    pub fn on_render<F>(mut self, hook: F) -> Self
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.render = Some(Box::new(hook));
        self
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Built, never started (or start hook failed).
    Constructed,
    /// Start hook in progress.
    Starting,
    /// Jobs live.
    Running,
    /// Stop in progress.
    Stopping,
    /// Terminal.
    Stopped,
}

struct TaskRuntime {
    state: TaskState,
    paused: bool,
    phase_jobs: Vec<JobToken>,
    exit_job: Option<JobToken>,
}

struct TaskInner {
    id: TaskId,
    options: JobOptions,
    dispatcher: Dispatcher,
    arbitrator: FocusArbitrator,
    focus: FocusTarget,
    start_hook: Mutex<Option<Hook>>,
    stop_hook: Mutex<Option<Hook>>,
    input_check_hook: HookSlot,
    update_hook: HookSlot,
    render_hook: HookSlot,
    runtime: Mutex<TaskRuntime>,
    status: watch::Sender<TaskState>,
}

fn run_slot(slot: &Mutex<Option<Hook>>) -> CallbackResult {
    let mut slot = slot.lock();
    match slot.as_mut() {
        Some(hook) => hook(),
        None => Ok(()),
    }
}

/// A long-lived cooperative unit of work.
///
/// Cheap to clone; clones refer to the same task.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    /// Build a task bound to `dispatcher` that contends for focus on
    /// `arbitrator`. The task is registered as a focus contender right away
    /// but runs nothing until [`start`](Self::start).
    pub fn new(
        dispatcher: &Dispatcher,
        arbitrator: &FocusArbitrator,
        options: JobOptions,
        hooks: TaskHooks,
    ) -> Self {
        let id = TaskId::new();
        let focus = FocusTarget::with_listener(
            arbitrator,
            options.priority,
            Box::new(move |notice: FocusNotice| match notice {
                FocusNotice::Gained => tracing::debug!("{} gained focus", id),
                FocusNotice::Lost => tracing::debug!("{} lost focus", id),
            }),
        );
        dispatcher.track_focus(arbitrator);
        let (status, _) = watch::channel(TaskState::Constructed);
        Self {
            inner: Arc::new(TaskInner {
                id,
                options,
                dispatcher: dispatcher.clone(),
                arbitrator: arbitrator.clone(),
                focus,
                start_hook: Mutex::new(hooks.start),
                stop_hook: Mutex::new(hooks.stop),
                input_check_hook: Arc::new(Mutex::new(hooks.input_check)),
                update_hook: Arc::new(Mutex::new(hooks.update)),
                render_hook: Arc::new(Mutex::new(hooks.render)),
                runtime: Mutex::new(TaskRuntime {
                    state: TaskState::Constructed,
                    paused: false,
                    phase_jobs: Vec::new(),
                    exit_job: None,
                }),
                status,
            }),
        }
    }

    /// Task identity.
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Priority shared by all of the task's jobs.
    pub fn priority(&self) -> Priority {
        self.inner.options.priority
    }

    /// Whether the task keeps running during engine-wide pause.
    pub fn in_background(&self) -> bool {
        self.inner.options.background
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.inner.runtime.lock().state
    }

    /// Whether the task is between a successful start and its stop.
    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }

    /// Whether the task's phase jobs are paused.
    pub fn is_paused(&self) -> bool {
        self.inner.runtime.lock().paused
    }

    /// Whether the task holds focus.
    pub fn has_focus(&self) -> bool {
        self.inner.focus.has_focus()
    }

    fn publish(&self, state: TaskState) {
        self.inner.status.send_replace(state);
    }

    /// Run the start hook, then register the task's jobs.
    ///
    /// Fails if the task is already running or has stopped. If the start hook
    /// fails the task stays `Constructed` and nothing is registered.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let id = self.inner.id;
        {
            let mut runtime = self.inner.runtime.lock();
            match runtime.state {
                TaskState::Constructed => runtime.state = TaskState::Starting,
                TaskState::Starting | TaskState::Running | TaskState::Stopping => {
                    tracing::warn!("{} started twice", id);
                    return Err(SchedulerError::AlreadyRunning(id.to_string()));
                }
                TaskState::Stopped => return Err(SchedulerError::AlreadyStopped(id.to_string())),
            }
        }
        if self.inner.dispatcher.is_shut_down() {
            self.inner.runtime.lock().state = TaskState::Constructed;
            return Err(SchedulerError::ShutDown);
        }
        self.publish(TaskState::Starting);

        let started = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut hook = self.inner.start_hook.lock();
            match hook.as_mut() {
                Some(hook) => run_guarded(self.inner.dispatcher.catch_panics(), || hook()),
                None => Ok(()),
            }
        }));
        let started = match started {
            Ok(started) => started,
            Err(payload) => {
                // Uncaught panic from the start hook: back out, then let it unwind.
                self.reset_to_constructed();
                panic::resume_unwind(payload);
            }
        };
        if let Err(reason) = started {
            self.reset_to_constructed();
            tracing::warn!("{} failed to start: {}", id, reason);
            return Err(SchedulerError::HookFailed {
                hook: "start",
                reason,
            });
        }

        let phase_jobs = self.register_phase_jobs();
        let exit_job = self.register_exit_job();
        {
            let mut runtime = self.inner.runtime.lock();
            if runtime.paused {
                for token in &phase_jobs {
                    token.pause();
                }
            }
            runtime.phase_jobs = phase_jobs;
            runtime.exit_job = Some(exit_job);
            runtime.state = TaskState::Running;
        }
        self.publish(TaskState::Running);
        tracing::info!("{} running at priority {}", id, self.priority());
        Ok(())
    }

    /// [`start`](Self::start) as a future, for callers that await task
    /// bring-up. The start hook runs before this returns; the future is
    /// already resolved.
    pub fn start_async(&self) -> impl Future<Output = Result<(), SchedulerError>> + Send + 'static {
        std::future::ready(self.start())
    }

    fn reset_to_constructed(&self) {
        self.inner.runtime.lock().state = TaskState::Constructed;
        self.publish(TaskState::Constructed);
    }

    fn register_phase_jobs(&self) -> Vec<JobToken> {
        let inner = &self.inner;
        let owner = Some(inner.id);
        let mut tokens = Vec::new();

        if inner.input_check_hook.lock().is_some() {
            let slot = Arc::clone(&inner.input_check_hook);
            let arbitrator = inner.arbitrator.clone();
            let contender = inner.focus.id();
            // Gated on the holder latched when the pass started.
            tokens.push(inner.dispatcher.schedule_owned(
                FramePhase::Update,
                inner.options,
                JobSource {
                    owner,
                    label: "input_check",
                },
                move || {
                    if arbitrator.held_at_latch(contender) {
                        run_slot(&slot)
                    } else {
                        Ok(())
                    }
                },
            ));
        }
        if inner.update_hook.lock().is_some() {
            let slot = Arc::clone(&inner.update_hook);
            tokens.push(inner.dispatcher.schedule_owned(
                FramePhase::Update,
                inner.options,
                JobSource {
                    owner,
                    label: "update",
                },
                move || run_slot(&slot),
            ));
        }
        if inner.render_hook.lock().is_some() {
            let slot = Arc::clone(&inner.render_hook);
            tokens.push(inner.dispatcher.schedule_owned(
                FramePhase::Render,
                inner.options,
                JobSource {
                    owner,
                    label: "render",
                },
                move || run_slot(&slot),
            ));
        }
        tokens
    }

    fn register_exit_job(&self) -> JobToken {
        let weak: Weak<TaskInner> = Arc::downgrade(&self.inner);
        self.inner.dispatcher.schedule_owned(
            FramePhase::Exit,
            JobOptions::with_priority(self.priority()),
            JobSource {
                owner: Some(self.inner.id),
                label: "shutdown",
            },
            move || {
                if let Some(inner) = weak.upgrade() {
                    Task { inner }.stop();
                }
                Ok(())
            },
        )
    }

    /// Cancel the task's jobs, run the stop hook once, and give up focus.
    ///
    /// Does nothing unless the task is running; calling it again while
    /// stopping or after stopping is a no-op.
    pub fn stop(&self) {
        let id = self.inner.id;
        let (phase_jobs, exit_job) = {
            let mut runtime = self.inner.runtime.lock();
            if runtime.state != TaskState::Running {
                return;
            }
            runtime.state = TaskState::Stopping;
            (std::mem::take(&mut runtime.phase_jobs), runtime.exit_job.take())
        };
        self.publish(TaskState::Stopping);

        for token in phase_jobs.iter().chain(exit_job.iter()) {
            token.cancel();
        }

        let stopped = {
            let mut hook = self.inner.stop_hook.lock();
            match hook.as_mut() {
                Some(hook) => run_guarded(self.inner.dispatcher.catch_panics(), || hook()),
                None => Ok(()),
            }
        };
        if let Err(reason) = stopped {
            self.inner.dispatcher.report(Some(id), "stop", reason);
        }

        self.inner.focus.dispose();

        self.inner.runtime.lock().state = TaskState::Stopped;
        self.publish(TaskState::Stopped);
        tracing::info!("{} stopped", id);
    }

    /// Pause the task's input-check, update and render jobs together.
    pub fn pause(&self) {
        let mut runtime = self.inner.runtime.lock();
        runtime.paused = true;
        for token in &runtime.phase_jobs {
            token.pause();
        }
    }

    /// Undo [`pause`](Self::pause).
    pub fn resume(&self) {
        let mut runtime = self.inner.runtime.lock();
        runtime.paused = false;
        for token in &runtime.phase_jobs {
            token.resume();
        }
    }

    /// Take focus from whoever holds it.
    pub fn take_focus(&self) -> Result<(), SchedulerError> {
        self.inner.focus.take_focus()
    }

    /// Give up focus if held; the best remaining contender is promoted.
    pub fn yield_focus(&self) {
        self.inner.focus.yield_focus();
    }

    /// Resolves once every task in `tasks` has stopped. Never resolves if one
    /// of them is never started.
    pub fn join(tasks: &[Self]) -> impl Future<Output = ()> + Send + 'static {
        let receivers: Vec<watch::Receiver<TaskState>> =
            tasks.iter().map(|task| task.inner.status.subscribe()).collect();
        async move {
            for mut rx in receivers {
                let stopped = rx.wait_for(|state| *state == TaskState::Stopped).await.is_ok();
                if !stopped {
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}
