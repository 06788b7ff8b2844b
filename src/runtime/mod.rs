//! Host frame driver.

pub mod host;

pub use host::{FrameReport, Host, ShutdownHandle};
