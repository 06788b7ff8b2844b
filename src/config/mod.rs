//! Configuration models for the host and its dispatcher.

pub mod host;

pub use host::{DiagnosticsConfig, HostConfig};
