//! Tests for error types

use frame_scheduler::core::SchedulerError;

#[test]
fn test_already_running_error() {
    let err = SchedulerError::AlreadyRunning("task-1".to_string());
    assert_eq!(format!("{}", err), "task task-1 is already running");
}

#[test]
fn test_already_stopped_error() {
    let err = SchedulerError::AlreadyStopped("task-1".to_string());
    assert_eq!(format!("{}", err), "task task-1 has already stopped");
}

#[test]
fn test_unregistered_contender_error() {
    let err = SchedulerError::UnregisteredContender("contender-9".to_string());
    assert_eq!(format!("{}", err), "focus contender contender-9 is not registered");
}

#[test]
fn test_hook_failed_error() {
    let err = SchedulerError::HookFailed {
        hook: "start",
        reason: "no assets".to_string(),
    };
    assert_eq!(format!("{}", err), "start hook failed: no assets");
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("frame_rate must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: frame_rate must be greater than 0"
    );
}

#[test]
fn test_cancelled_and_shut_down_errors() {
    assert_eq!(format!("{}", SchedulerError::Cancelled), "scheduled wait was cancelled");
    assert_eq!(format!("{}", SchedulerError::ShutDown), "dispatcher has shut down");
}

#[test]
fn test_error_converts_into_anyhow() {
    let err: anyhow::Error = SchedulerError::ShutDown.into();
    assert!(err.downcast_ref::<SchedulerError>().is_some());
}
