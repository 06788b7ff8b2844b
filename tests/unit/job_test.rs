//! Tests for job tokens and options

use frame_scheduler::core::{Dispatcher, FramePhase, JobKind, JobOptions, JobState};

#[test]
fn test_job_options_builders() {
    let options = JobOptions::with_priority(7).in_background(true);
    assert_eq!(options.priority, 7);
    assert!(options.background);
    assert_eq!(JobOptions::default(), JobOptions::with_priority(0));
}

#[test]
fn test_token_kinds_match_registration() {
    let d = Dispatcher::new();
    assert_eq!(d.schedule_immediate(|| Ok(()), false).kind(), JobKind::Immediate);
    assert_eq!(d.schedule_deferred(2, || Ok(()), false).kind(), JobKind::DeferredUpdate);
    assert_eq!(
        d.schedule_recurring(FramePhase::Render, || Ok(()), JobOptions::default()).kind(),
        JobKind::Render
    );
    assert_eq!(
        d.schedule_recurring(FramePhase::Exit, || Ok(()), JobOptions::default()).kind(),
        JobKind::Exit
    );
    assert_eq!(d.schedule_on_exit(|| Ok(())).kind(), JobKind::Exit);
}

#[test]
fn test_token_clones_share_state() {
    let d = Dispatcher::new();
    let token = d.schedule_recurring(FramePhase::Update, || Ok(()), JobOptions::default());
    let other = token.clone();
    other.pause();
    assert_eq!(token.state(), JobState::Paused);
    token.cancel();
    other.resume();
    assert_eq!(other.state(), JobState::Cancelled);
    assert!(token.is_finished());
}

#[test]
fn test_completed_immediate_ignores_cancel() {
    let d = Dispatcher::new();
    let token = d.schedule_immediate(|| Ok(()), false);
    d.tick(FramePhase::Update);
    token.cancel();
    assert_eq!(token.state(), JobState::Completed);
}

#[test]
fn test_states_display() {
    assert_eq!(JobState::Active.to_string(), "active");
    assert_eq!(JobState::Cancelled.to_string(), "cancelled");
}
