//! Tests for builder modules

use frame_scheduler::builders::{build_dispatcher, build_host, build_host_with_sink};
use frame_scheduler::config::{DiagnosticsConfig, HostConfig};
use frame_scheduler::core::{ChannelDiagnosticSink, FramePhase, SchedulerError};

#[test]
fn test_build_dispatcher_with_memory_sink() {
    let config = HostConfig {
        diagnostics: DiagnosticsConfig::Memory,
        diagnostics_capacity: 8,
        ..HostConfig::default()
    };
    let (dispatcher, memory) = build_dispatcher(&config).unwrap();
    let memory = memory.expect("memory sink selected");

    dispatcher.schedule_immediate(|| anyhow::bail!("bad"), false);
    dispatcher.tick(FramePhase::Update);
    assert_eq!(memory.lock().entries().len(), 1);
}

#[test]
fn test_build_dispatcher_with_tracing_sink() {
    let (_, memory) = build_dispatcher(&HostConfig::default()).unwrap();
    assert!(memory.is_none());
}

#[test]
fn test_build_host_keeps_config() {
    let config = HostConfig {
        frame_rate: 30,
        ..HostConfig::default()
    };
    let host = build_host(&config).unwrap();
    assert_eq!(host.config(), &config);
    assert_eq!(host.frame_count(), 0);
}

#[test]
fn test_build_host_rejects_invalid_config() {
    let config = HostConfig {
        diagnostics_capacity: 0,
        ..HostConfig::default()
    };
    assert!(matches!(build_host(&config), Err(SchedulerError::InvalidConfig(_))));

    let (sink, _rx) = ChannelDiagnosticSink::unbounded();
    let config = HostConfig {
        frame_rate: 0,
        ..HostConfig::default()
    };
    assert!(build_host_with_sink(&config, Box::new(sink)).is_err());
}

#[test]
#[should_panic(expected = "propagated")]
fn test_build_dispatcher_without_panic_catching() {
    let config = HostConfig {
        catch_panics: false,
        ..HostConfig::default()
    };
    let (dispatcher, _) = build_dispatcher(&config).unwrap();
    dispatcher.schedule_immediate(|| panic!("propagated"), false);
    dispatcher.tick(FramePhase::Update);
}
