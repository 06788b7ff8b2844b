//! Tests for utility functions

use std::collections::HashSet;

use frame_scheduler::util::{now_ms, ContenderId, JobId, TaskId};

#[test]
fn test_ids_are_unique() {
    let ids: HashSet<JobId> = (0..100).map(|_| JobId::new()).collect();
    assert_eq!(ids.len(), 100);
}

#[test]
fn test_id_display_prefixes() {
    assert!(JobId::new().to_string().starts_with("job-"));
    assert!(TaskId::new().to_string().starts_with("task-"));
    assert!(ContenderId::new().to_string().starts_with("contender-"));
}

#[test]
fn test_ids_serialize_as_uuid_strings() {
    let id = TaskId::new();
    let json = serde_json::to_string(&id).unwrap();
    let back: TaskId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, back);
}

#[test]
fn test_now_ms_advances() {
    let earlier = now_ms();
    let later = now_ms();
    assert!(earlier > 0);
    assert!(later >= earlier);
}

#[test]
fn test_init_tracing_is_idempotent() {
    assert!(frame_scheduler::util::DEFAULT_FILTER
        .parse::<tracing_subscriber::EnvFilter>()
        .is_ok());
    frame_scheduler::util::init_tracing();
    frame_scheduler::util::init_tracing();
    tracing::info!("tracing initialised");
}
