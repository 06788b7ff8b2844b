//! Tests for configuration validation

use frame_scheduler::config::{DiagnosticsConfig, HostConfig};

#[test]
fn test_default_config_is_valid() {
    let config = HostConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.frame_rate, 60);
    assert_eq!(config.max_frame_skip, 0);
    assert_eq!(config.diagnostics_capacity, 256);
    assert!(config.catch_panics);
    assert_eq!(config.diagnostics, DiagnosticsConfig::Tracing);
}

#[test]
fn test_zero_frame_rate_is_invalid() {
    let invalid = HostConfig {
        frame_rate: 0,
        ..HostConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_zero_diagnostics_capacity_is_invalid() {
    let invalid = HostConfig {
        diagnostics_capacity: 0,
        ..HostConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "frame_rate": 120,
        "max_frame_skip": 3,
        "diagnostics": "memory"
    }"#;

    let config = HostConfig::from_json_str(json).unwrap();
    assert_eq!(config.frame_rate, 120);
    assert_eq!(config.max_frame_skip, 3);
    assert_eq!(config.diagnostics, DiagnosticsConfig::Memory);
    assert_eq!(config.diagnostics_capacity, 256);
}

#[test]
fn test_config_from_json_rejects_invalid_values() {
    assert!(HostConfig::from_json_str(r#"{ "frame_rate": 0 }"#).is_err());
    assert!(HostConfig::from_json_str(r#"{ "diagnostics": "stdout" }"#).is_err());
    assert!(HostConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_round_trips_through_json() {
    let config = HostConfig {
        catch_panics: false,
        ..HostConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(HostConfig::from_json_str(&json).unwrap(), config);
}
