//! Build a [`Host`] from [`HostConfig`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{DiagnosticsConfig, HostConfig};
use crate::core::{
    DiagnosticSink, Dispatcher, InMemoryDiagnosticSink, SchedulerError, TracingDiagnosticSink,
};
use crate::runtime::Host;

/// Build a dispatcher with the configured sink. Returns the in-memory sink
/// too when one was selected, so the host can read it back.
pub fn build_dispatcher(
    cfg: &HostConfig,
) -> Result<(Dispatcher, Option<Arc<Mutex<InMemoryDiagnosticSink>>>), SchedulerError> {
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;

    let mut memory = None;
    let sink: Box<dyn DiagnosticSink> = match cfg.diagnostics {
        DiagnosticsConfig::Memory => {
            let buffer = Arc::new(Mutex::new(InMemoryDiagnosticSink::new(cfg.diagnostics_capacity)));
            memory = Some(Arc::clone(&buffer));
            Box::new(buffer)
        }
        DiagnosticsConfig::Tracing => Box::new(TracingDiagnosticSink),
    };
    let dispatcher = Dispatcher::new()
        .with_sink(sink)
        .with_catch_panics(cfg.catch_panics);
    Ok((dispatcher, memory))
}

/// Build a host from configuration.
pub fn build_host(cfg: &HostConfig) -> Result<Host, SchedulerError> {
    let (dispatcher, memory) = build_dispatcher(cfg)?;
    tracing::debug!("host built: {:?}", cfg);
    Ok(Host::from_parts(cfg.clone(), dispatcher, memory))
}

/// Build a host that reports diagnostics to `sink`, ignoring the configured
/// sink selection.
pub fn build_host_with_sink(cfg: &HostConfig, sink: Box<dyn DiagnosticSink>) -> Result<Host, SchedulerError> {
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;
    let dispatcher = Dispatcher::new()
        .with_sink(sink)
        .with_catch_panics(cfg.catch_panics);
    Ok(Host::from_parts(cfg.clone(), dispatcher, None))
}
