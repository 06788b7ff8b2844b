//! Host configuration structures.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where callback failures are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticsConfig {
    /// Bounded in-memory buffer, readable through the host.
    Memory,
    /// `tracing` at error level.
    Tracing,
}

impl FromStr for DiagnosticsConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "tracing" => Ok(Self::Tracing),
            other => Err(format!("unknown diagnostics sink `{other}`")),
        }
    }
}

/// Host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Target frames per second for the real-time loop.
    pub frame_rate: u32,
    /// Frames the real-time loop may run back to back to catch up.
    pub max_frame_skip: u32,
    /// Capacity of the in-memory diagnostic buffer.
    pub diagnostics_capacity: usize,
    /// Focus events kept in the arbitrator's audit trail.
    pub focus_audit_capacity: usize,
    /// Turn callback panics into diagnostics instead of unwinding.
    pub catch_panics: bool,
    /// Diagnostic sink selection.
    pub diagnostics: DiagnosticsConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            max_frame_skip: 0,
            diagnostics_capacity: 256,
            focus_audit_capacity: 256,
            catch_panics: true,
            diagnostics: DiagnosticsConfig::Tracing,
        }
    }
}

impl HostConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_rate == 0 {
            return Err("frame_rate must be greater than 0".into());
        }
        if self.diagnostics_capacity == 0 {
            return Err("diagnostics_capacity must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields
    /// take their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from `FRAME_SCHED_*` environment variables, reading
    /// a `.env` file first if one exists.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Some(v) = read_var("FRAME_SCHED_FRAME_RATE")? {
            cfg.frame_rate = v;
        }
        if let Some(v) = read_var("FRAME_SCHED_MAX_FRAME_SKIP")? {
            cfg.max_frame_skip = v;
        }
        if let Some(v) = read_var("FRAME_SCHED_DIAGNOSTICS_CAPACITY")? {
            cfg.diagnostics_capacity = v;
        }
        if let Some(v) = read_var("FRAME_SCHED_FOCUS_AUDIT_CAPACITY")? {
            cfg.focus_audit_capacity = v;
        }
        if let Some(v) = read_var("FRAME_SCHED_CATCH_PANICS")? {
            cfg.catch_panics = v;
        }
        if let Some(v) = read_var("FRAME_SCHED_DIAGNOSTICS")? {
            cfg.diagnostics = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn read_var<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{name}: {e}")),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(format!("{name}: {e}")),
    }
}
