//! WorldView Deterministic Simulation Testing (DST) Harness
//!
//! This crate drives the WorldView map core through scripted interaction
//! under full control of every source of non-determinism:
//! - **Time**: a virtual clock that only moves when the frame driver sleeps
//! - **Feeds**: synthetic earthquakes, protests, flights, vessels, outages
//!   and headlines drawn from one seeded stream
//! - **Backends**: recording backends of both kinds whose backing store can
//!   be mutated or lost on demand
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ScenarioRunner                    │
//! │  ┌──────────────┐   feeds    ┌────────────────────┐  │
//! │  │ FeedGenerator│──────────► │      MapCore       │  │
//! │  └──────────────┘            │  (scheduler, clus- │  │
//! │  ┌──────────────┐   clock    │   tering, escal.)  │  │
//! │  │  SimContext  │──────────► └─────────┬──────────┘  │
//! │  └──────────────┘                      │ frames      │
//! │                              ┌─────────▼──────────┐  │
//! │                              │ RecordingBackend   │  │
//! │                              │ (vector/compositor)│  │
//! │                              └────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use worldview_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::PanStorm).await;
//! assert!(result.passed);
//! ```

mod backend;
mod context;
mod error;
mod feeds;
mod runner;
pub mod scenarios;

pub use backend::{BackendCounters, FrameRecord, OverlayRecord, RecordingBackend};
pub use context::SimContext;
pub use error::SimError;
pub use feeds::{reference_catalog, FeedGenerator};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
