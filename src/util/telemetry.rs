//! Log subscriber setup for hosts that do not bring their own.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: lifecycle events (task start/stop,
/// pause, shutdown) and callback failures, without the per-pass lines.
pub const DEFAULT_FILTER: &str = "frame_scheduler=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`]. Set `RUST_LOG=frame_scheduler=debug` to see one line
/// per dispatcher pass and every focus change.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
