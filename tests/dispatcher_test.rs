//! Integration tests for the frame-phase dispatcher.
//!
//! These tests validate:
//! 1. Stable ordering by priority, then registration
//! 2. Cancellation, including from inside the job's own callback
//! 3. Pause/resume keeping a job's place in the queue
//! 4. Deferred countdowns measured in update passes
//! 5. Exit jobs surviving `cancel_all` and engine pause
//! 6. Callback failures never stopping a pass

use std::sync::Arc;

use frame_scheduler::core::{
    ChannelDiagnosticSink, Dispatcher, FramePhase, JobOptions, JobState, JobToken,
};
use parking_lot::Mutex;
use rand::Rng;

// ============================================================================
// HELPERS
// ============================================================================

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn push(log: &Log, name: impl Into<String>) -> impl FnMut() -> anyhow::Result<()> + Send + 'static {
    let log = Arc::clone(log);
    let name = name.into();
    move || {
        log.lock().push(name.clone());
        Ok(())
    }
}

fn drain(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.lock())
}

// ============================================================================
// ORDERING
// ============================================================================

#[test]
fn test_equal_priority_runs_in_registration_order() {
    let d = Dispatcher::new();
    let log = new_log();
    for name in ["a", "b", "c", "d"] {
        d.schedule_recurring(FramePhase::Render, push(&log, name), JobOptions::with_priority(3));
    }
    d.tick(FramePhase::Render);
    assert_eq!(drain(&log), vec!["a", "b", "c", "d"]);
}

#[test]
fn test_random_priorities_sort_stably() {
    let d = Dispatcher::new();
    let log = new_log();
    let mut rng = rand::rng();
    let mut expected: Vec<(i32, usize)> = Vec::new();
    for index in 0..200 {
        let priority = rng.random_range(-3..4);
        expected.push((priority, index));
        d.schedule_recurring(
            FramePhase::Update,
            push(&log, index.to_string()),
            JobOptions::with_priority(priority),
        );
    }
    expected.sort_by_key(|(priority, _)| std::cmp::Reverse(*priority));
    let expected: Vec<String> = expected.into_iter().map(|(_, i)| i.to_string()).collect();

    d.tick(FramePhase::Update);
    assert_eq!(drain(&log), expected);
    d.tick(FramePhase::Update);
    assert_eq!(drain(&log), expected);
}

#[test]
fn test_phases_are_independent() {
    let d = Dispatcher::new();
    let log = new_log();
    d.schedule_recurring(FramePhase::Update, push(&log, "update"), JobOptions::default());
    d.schedule_recurring(FramePhase::Render, push(&log, "render"), JobOptions::default());
    d.tick(FramePhase::Render);
    assert_eq!(drain(&log), vec!["render"]);
    d.tick(FramePhase::Update);
    assert_eq!(drain(&log), vec!["update"]);
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[test]
fn test_cancelled_job_never_runs_again() {
    let d = Dispatcher::new();
    let log = new_log();
    let token = d.schedule_recurring(FramePhase::Update, push(&log, "x"), JobOptions::default());
    d.tick(FramePhase::Update);
    token.cancel();
    token.cancel();
    d.tick(FramePhase::Update);
    d.tick(FramePhase::Update);
    assert_eq!(drain(&log), vec!["x"]);
    assert_eq!(token.state(), JobState::Cancelled);
}

#[test]
fn test_self_cancellation_finishes_current_invocation() {
    let d = Dispatcher::new();
    let log = new_log();
    let slot: Arc<Mutex<Option<JobToken>>> = Arc::new(Mutex::new(None));
    let own = Arc::clone(&slot);
    let sink = Arc::clone(&log);
    let token = d.schedule_recurring(
        FramePhase::Update,
        move || {
            if let Some(token) = own.lock().as_ref() {
                token.cancel();
            }
            sink.lock().push("self".into());
            Ok(())
        },
        JobOptions::default(),
    );
    *slot.lock() = Some(token.clone());

    d.tick(FramePhase::Update);
    d.tick(FramePhase::Update);
    assert_eq!(drain(&log), vec!["self"]);
    assert_eq!(token.state(), JobState::Cancelled);
}

#[test]
fn test_cancel_later_job_from_earlier_job_in_same_pass() {
    let d = Dispatcher::new();
    let log = new_log();
    let victim_slot: Arc<Mutex<Option<JobToken>>> = Arc::new(Mutex::new(None));
    let victim = Arc::clone(&victim_slot);
    d.schedule_recurring(
        FramePhase::Update,
        move || {
            if let Some(token) = victim.lock().as_ref() {
                token.cancel();
            }
            Ok(())
        },
        JobOptions::with_priority(1),
    );
    let token = d.schedule_recurring(FramePhase::Update, push(&log, "victim"), JobOptions::default());
    *victim_slot.lock() = Some(token);

    d.tick(FramePhase::Update);
    assert!(drain(&log).is_empty());
}

#[test]
fn test_cancel_all_spares_exit_jobs() {
    let d = Dispatcher::new();
    let log = new_log();
    let update = d.schedule_recurring(FramePhase::Update, push(&log, "update"), JobOptions::default());
    let once = d.schedule_immediate(push(&log, "once"), false);
    let later = d.schedule_deferred(2, push(&log, "later"), true);
    let exit = d.schedule_on_exit(push(&log, "exit"));

    d.cancel_all();
    for token in [&update, &once, &later] {
        assert_eq!(token.state(), JobState::Cancelled);
    }
    assert_eq!(exit.state(), JobState::Active);

    d.tick(FramePhase::Update);
    d.tick(FramePhase::Update);
    d.shutdown();
    assert_eq!(drain(&log), vec!["exit"]);
    assert_eq!(exit.state(), JobState::Completed);
}

// ============================================================================
// PAUSE / RESUME
// ============================================================================

#[test]
fn test_pause_resume_restores_order() {
    let d = Dispatcher::new();
    let log = new_log();
    let _a = d.schedule_recurring(FramePhase::Update, push(&log, "a"), JobOptions::default());
    let b = d.schedule_recurring(FramePhase::Update, push(&log, "b"), JobOptions::default());
    let _c = d.schedule_recurring(FramePhase::Update, push(&log, "c"), JobOptions::default());

    b.pause();
    let report = d.tick(FramePhase::Update);
    assert_eq!(report.skipped, 1);
    assert_eq!(drain(&log), vec!["a", "c"]);

    b.resume();
    d.tick(FramePhase::Update);
    assert_eq!(drain(&log), vec!["a", "b", "c"]);
}

#[test]
fn test_paused_immediate_waits() {
    let d = Dispatcher::new();
    let log = new_log();
    let token = d.schedule_immediate(push(&log, "now"), false);
    token.pause();
    d.tick(FramePhase::Update);
    assert!(drain(&log).is_empty());
    token.resume();
    d.tick(FramePhase::Update);
    assert_eq!(drain(&log), vec!["now"]);
    assert_eq!(token.state(), JobState::Completed);
    token.resume();
    assert_eq!(token.state(), JobState::Completed);
}

#[test]
fn test_global_pause_holds_foreground_deferred() {
    let d = Dispatcher::new();
    let log = new_log();
    d.schedule_deferred(1, push(&log, "fg"), false);
    d.schedule_deferred(1, push(&log, "bg"), true);
    d.set_paused(true);
    d.tick(FramePhase::Update);
    assert_eq!(drain(&log), vec!["bg"]);
    d.set_paused(false);
    d.tick(FramePhase::Update);
    assert_eq!(drain(&log), vec!["fg"]);
}

// ============================================================================
// DEFERRED
// ============================================================================

#[test]
fn test_deferred_fires_on_exact_pass() {
    let d = Dispatcher::new();
    let log = new_log();
    let token = d.schedule_deferred(3, push(&log, "three"), false);

    d.tick(FramePhase::Update);
    d.tick(FramePhase::Render);
    assert_eq!(d.deferred_remaining(&token), Some(2));
    d.tick(FramePhase::Update);
    d.tick(FramePhase::Render);
    assert!(drain(&log).is_empty());

    d.tick(FramePhase::Update);
    assert_eq!(drain(&log), vec!["three"]);
    assert_eq!(token.state(), JobState::Completed);

    d.tick(FramePhase::Update);
    assert!(drain(&log).is_empty());
    assert_eq!(d.pending_deferred(), 0);
}

#[test]
fn test_zero_delay_fires_next_pass() {
    let d = Dispatcher::new();
    let log = new_log();
    d.schedule_deferred(0, push(&log, "zero"), false);
    d.tick(FramePhase::Update);
    assert_eq!(drain(&log), vec!["zero"]);
}

#[test]
fn test_deferred_registered_mid_pass_counts_from_next_pass() {
    let d = Dispatcher::new();
    let log = new_log();
    let inner = d.clone();
    let sink = Arc::clone(&log);
    d.schedule_immediate(
        move || {
            inner.schedule_deferred(1, push(&sink, "deferred"), false);
            Ok(())
        },
        false,
    );
    d.tick(FramePhase::Update);
    assert!(drain(&log).is_empty());
    d.tick(FramePhase::Update);
    assert_eq!(drain(&log), vec!["deferred"]);
}

// ============================================================================
// EXIT / FAILURES
// ============================================================================

#[test]
fn test_exit_runs_by_priority_even_when_paused() {
    let d = Dispatcher::new();
    let log = new_log();
    d.schedule_on_exit(push(&log, "zero"));
    d.schedule_on_exit_with(5, push(&log, "high"));
    d.schedule_on_exit_with(1, push(&log, "low"));
    d.set_paused(true);

    let report = d.shutdown();
    assert_eq!(report.ran, 3);
    assert_eq!(drain(&log), vec!["high", "low", "zero"]);
}

#[test]
fn test_exit_phase_via_recurring_registration() {
    let d = Dispatcher::new();
    let log = new_log();
    let token = d.schedule_recurring(FramePhase::Exit, push(&log, "exit"), JobOptions::default());
    d.tick(FramePhase::Update);
    assert!(drain(&log).is_empty());
    d.shutdown();
    assert_eq!(drain(&log), vec!["exit"]);
    assert_eq!(token.state(), JobState::Completed);
}

#[test]
fn test_failures_reach_diagnostic_channel() {
    let (sink, rx) = ChannelDiagnosticSink::unbounded();
    let d = Dispatcher::new().with_sink(Box::new(sink));
    let log = new_log();
    let failing = d.schedule_recurring(
        FramePhase::Render,
        || anyhow::bail!("texture missing"),
        JobOptions::with_priority(1),
    );
    d.schedule_recurring(FramePhase::Render, push(&log, "next"), JobOptions::default());

    let first = d.tick(FramePhase::Render);
    let second = d.tick(FramePhase::Render);
    assert_eq!((first.failed, second.failed), (1, 1));
    assert_eq!(drain(&log), vec!["next", "next"]);
    assert_eq!(failing.state(), JobState::Active);

    let reported: Vec<_> = rx.try_iter().collect();
    assert_eq!(reported.len(), 2);
    assert_eq!(reported[0].job_id, Some(failing.id()));
    assert_eq!(reported[0].source, "render");
    assert_eq!(reported[0].phase, Some(FramePhase::Render));
    assert_eq!(reported[0].message, "texture missing");
}

#[test]
#[should_panic(expected = "unguarded")]
fn test_panics_propagate_when_not_caught() {
    let d = Dispatcher::new().with_catch_panics(false);
    d.schedule_immediate(|| panic!("unguarded"), false);
    d.tick(FramePhase::Update);
}
