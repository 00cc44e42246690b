//! Core environment context trait for the WorldView map core.

use async_trait::async_trait;
use std::time::{Duration, SystemTime};

/// The central interface for environment interaction.
///
/// This trait abstracts the clock so that the map core's schedulers can run
/// against real time (a browser-like event loop hosted on tokio) or a virtual
/// clock in tests and simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`
/// - **Manual**: `ManualContext` - virtual clock advanced explicitly
///
/// # Determinism
///
/// Everything time-dependent in the core (throttle windows, debounce
/// deadlines, highlight TTLs, health checks, escalation recency) reads
/// the clock through this trait only.
#[async_trait]
pub trait MapContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used for timers, frame budgets and animation-frame pacing.
    fn now(&self) -> Duration;
    
    /// Returns the wall-clock time.
    ///
    /// Used to age feed items (news recency, time-range filtering).
    fn system_time(&self) -> SystemTime;
    
    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);
}
