//! Tests for diagnostic sinks

use std::sync::Arc;

use frame_scheduler::core::{
    build_diagnostic, Diagnostic, DiagnosticSink, FramePhase, InMemoryDiagnosticSink,
};
use frame_scheduler::util::TaskId;
use parking_lot::Mutex;

#[test]
fn test_memory_sink_drops_oldest() {
    let mut sink = InMemoryDiagnosticSink::new(3);
    for frame in 0..5 {
        sink.report(build_diagnostic(None, None, "update", Some(FramePhase::Update), frame, "x"));
    }
    let frames: Vec<u64> = sink.entries().iter().map(|d| d.frame).collect();
    assert_eq!(frames, vec![2, 3, 4]);
}

#[test]
fn test_shared_sink_reports_through_mutex() {
    let shared = Arc::new(Mutex::new(InMemoryDiagnosticSink::new(4)));
    let mut handle = Arc::clone(&shared);
    let task = TaskId::new();
    handle.report(build_diagnostic(None, Some(task), "stop", None, 7, "save failed"));

    let entries = shared.lock().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].task_id, Some(task));
    assert_eq!(entries[0].phase, None);
}

#[test]
fn test_diagnostic_serializes() {
    let diagnostic = build_diagnostic(None, None, "render", Some(FramePhase::Render), 3, "gpu lost");
    let json = serde_json::to_value(&diagnostic).unwrap();
    assert_eq!(json["source"], "render");
    assert_eq!(json["phase"], "render");
    assert_eq!(json["frame"], 3);

    let back: Diagnostic = serde_json::from_value(json).unwrap();
    assert_eq!(back.message, "gpu lost");
}
