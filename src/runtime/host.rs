//! The host frame driver.
//!
//! Each frame runs the update pass (input check, update, deferred timers) and
//! then the render pass. Shutdown runs the exit pass once and tears the
//! dispatcher down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::HostConfig;
use crate::core::{
    Diagnostic, Dispatcher, FocusArbitrator, FocusTarget, FramePhase, InMemoryDiagnosticSink,
    JobOptions, PassReport, Sleep, Task, TaskHooks,
};
use crate::util::ids::Priority;

/// Reports of the two passes of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Update pass.
    pub update: PassReport,
    /// Render pass; `None` for frames skipped to catch up.
    pub render: Option<PassReport>,
}

/// Cloneable handle callbacks can use to ask the host loop to stop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Ask the host to shut down after the current frame.
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::AcqRel) {
            tracing::info!("shutdown requested");
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// Owns the dispatcher and the focus arbitrator and drives them frame by frame.
pub struct Host {
    config: HostConfig,
    dispatcher: Dispatcher,
    focus: FocusArbitrator,
    memory_sink: Option<Arc<Mutex<InMemoryDiagnosticSink>>>,
    frames: u64,
    shutdown: ShutdownHandle,
}

impl Host {
    /// Build a host from configuration.
    pub fn new(config: HostConfig) -> Result<Self, crate::core::SchedulerError> {
        crate::builders::build_host(&config)
    }

    pub(crate) fn from_parts(
        config: HostConfig,
        dispatcher: Dispatcher,
        memory_sink: Option<Arc<Mutex<InMemoryDiagnosticSink>>>,
    ) -> Self {
        let focus = FocusArbitrator::with_audit_capacity(config.focus_audit_capacity);
        dispatcher.track_focus(&focus);
        Self {
            config,
            dispatcher,
            focus,
            memory_sink,
            frames: 0,
            shutdown: ShutdownHandle::default(),
        }
    }

    /// Active configuration.
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The host's dispatcher.
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The host's focus arbitrator.
    pub const fn focus(&self) -> &FocusArbitrator {
        &self.focus
    }

    /// Build a task bound to this host.
    pub fn new_task(&self, options: JobOptions, hooks: TaskHooks) -> Task {
        Task::new(&self.dispatcher, &self.focus, options, hooks)
    }

    /// Register a standalone focus target.
    pub fn new_focus_target(&self, priority: Priority) -> FocusTarget {
        FocusTarget::new(&self.focus, priority)
    }

    /// Completed frames, including frames skipped to catch up.
    pub const fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Wait for `frames` update passes.
    pub fn sleep(&self, frames: u32) -> Sleep {
        self.dispatcher.sleep(frames)
    }

    /// Enter or leave engine-wide pause.
    pub fn set_paused(&self, paused: bool) {
        self.dispatcher.set_paused(paused);
    }

    /// Whether engine-wide pause is active.
    pub fn is_paused(&self) -> bool {
        self.dispatcher.is_paused()
    }

    /// Handle for requesting shutdown from inside callbacks.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Ask the real-time loop to stop after the current frame.
    pub fn request_shutdown(&self) {
        self.shutdown.request();
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_requested()
    }

    /// Run one full frame: update pass, then render pass.
    pub fn run_frame(&mut self) -> FrameReport {
        let update = self.dispatcher.tick(FramePhase::Update);
        let render = self.dispatcher.tick(FramePhase::Render);
        self.frames += 1;
        FrameReport {
            update,
            render: Some(render),
        }
    }

    /// Run `count` full frames.
    pub fn run_frames(&mut self, count: u32) -> Vec<FrameReport> {
        (0..count).map(|_| self.run_frame()).collect()
    }

    /// Run an update pass without rendering, to catch up when behind.
    pub fn skip_frame(&mut self) -> FrameReport {
        let update = self.dispatcher.tick(FramePhase::Update);
        self.frames += 1;
        FrameReport {
            update,
            render: None,
        }
    }

    /// Run the exit pass once and tear the dispatcher down.
    pub fn shut_down(&mut self) -> PassReport {
        self.shutdown.request();
        let report = self.dispatcher.shutdown();
        tracing::info!("host shut down after {} frames", self.frames);
        report
    }

    /// Diagnostics collected by the in-memory sink; empty when another sink
    /// is configured.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.memory_sink
            .as_ref()
            .map(|sink| sink.lock().entries())
            .unwrap_or_default()
    }

    /// Pace frames at the configured frame rate until shutdown is requested,
    /// then shut down.
    ///
    /// When a frame starts late, up to `max_frame_skip` update-only frames run
    /// first to catch up.
    #[cfg(feature = "tokio-runtime")]
    pub async fn run(&mut self) -> PassReport {
        use std::time::Duration;
        use tokio::time::{interval, Instant, MissedTickBehavior};

        let period = Duration::from_secs_f64(1.0 / f64::from(self.config.frame_rate));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!("host loop running at {} fps", self.config.frame_rate);

        while !self.is_shutdown_requested() {
            let scheduled = ticker.tick().await;
            let behind = Instant::now().saturating_duration_since(scheduled).as_nanos() / period.as_nanos().max(1);
            let skips = behind.min(u128::from(self.config.max_frame_skip));
            for _ in 0..skips {
                self.skip_frame();
            }
            self.run_frame();
        }
        self.shut_down()
    }
}
