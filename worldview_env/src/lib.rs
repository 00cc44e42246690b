//! WorldView Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction that lets the WorldView map
//! core run against a real clock (**Production**, tokio) or a virtual one
//! (**Simulation**, tests and the DST harness).
//!
//! # Core Concept: The Event Loop
//!
//! The map core is single-threaded and cooperative. Its only suspension
//! points are timers and animation frames, so everything it needs from the
//! outside world is:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Handles for the timers and listeners it creates (`TimerId`, `ListenerId`)
//!
//! Driving the core from a virtual clock makes every frame, throttle window
//! and debounce deadline reproducible.
//!
//! # Example
//!
//! ```ignore
//! use worldview_env::{MapContext, TokioContext};
//!
//! async fn frame_loop<Ctx: MapContext>(ctx: &Ctx) {
//!     loop {
//!         ctx.sleep(Duration::from_millis(16)).await;
//!         tick(ctx.now());
//!     }
//! }
//! ```

mod context;
mod manual;
mod types;
mod error;
mod tokio_impl;

pub use context::MapContext;
pub use manual::ManualContext;
pub use types::{ListenerId, TimerId};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
