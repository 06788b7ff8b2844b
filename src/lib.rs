//! # Frame Scheduler
//!
//! A deterministic, single-threaded cooperative scheduler for real-time hosts
//! that run a fixed-phase frame loop (update, then render, and an exit pass at
//! shutdown).
//!
//! ## Core Problem Solved
//!
//! Scripts in a real-time host register many small pieces of work that must
//! interleave predictably inside one thread:
//!
//! - **One-shot work**: run on the next update pass, or after N frames
//! - **Recurring work**: run every update or render pass until cancelled
//! - **Teardown work**: run once, in priority order, when the host shuts down
//! - **Stateful tasks**: long-lived units with start/stop/input/update/render hooks
//! - **Exclusive input**: exactly one task at a time holds input focus
//!
//! ## Key Properties
//!
//! - **Stable ordering**: priority first, then registration order
//! - **No mid-pass growth**: work registered by a callback runs from the next pass
//! - **Failures never stop the frame**: callback errors and panics go to a
//!   diagnostic channel
//! - **Engine-wide pause**: only background jobs keep running
//!
//! ## Dispatcher
//!
//! ```rust
//! use frame_scheduler::core::{Dispatcher, FramePhase, JobOptions};
//!
//! let dispatcher = Dispatcher::new();
//! let token = dispatcher.schedule_recurring(
//!     FramePhase::Update,
//!     || Ok(()),
//!     JobOptions::with_priority(10),
//! );
//! dispatcher.tick(FramePhase::Update);
//! token.cancel();
//! ```
//!
//! ## Host, Tasks, and Focus
//!
//! ```rust
//! use frame_scheduler::config::HostConfig;
//! use frame_scheduler::core::{JobOptions, TaskHooks};
//! use frame_scheduler::runtime::Host;
//!
//! let mut host = Host::new(HostConfig::default()).unwrap();
//! let menu = host.new_task(
//!     JobOptions::with_priority(10),
//!     TaskHooks::new().on_input_check(|| Ok(())).on_render(|| Ok(())),
//! );
//! menu.start().unwrap();
//! menu.take_focus().unwrap();
//! host.run_frame();
//! host.shut_down();
//! assert!(!menu.is_running());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling: jobs, dispatcher, tasks, focus, diagnostics.
pub mod core;
/// Configuration models for the host.
pub mod config;
/// Builders to construct the host from configuration.
pub mod builders;
/// Host frame driver.
pub mod runtime;
/// Shared utilities.
pub mod util;
