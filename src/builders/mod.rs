//! Builders to construct the host and dispatcher from configuration.

pub mod host_builder;

pub use host_builder::{build_dispatcher, build_host, build_host_with_sink};
