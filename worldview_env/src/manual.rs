//! Manually advanced context for tests and deterministic driving.

use crate::MapContext;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Virtual-clock context.
///
/// Time only moves when `advance` or `sleep` is called. Clones share the
/// same clock.
#[derive(Debug, Clone)]
pub struct ManualContext {
    /// Current virtual time (nanoseconds since context creation)
    virtual_time_ns: Arc<Mutex<u64>>,
    
    /// Wall-clock time that virtual time 0 maps to
    epoch: SystemTime,
}

impl ManualContext {
    /// Creates a context whose wall clock starts at 2024-01-01 00:00:00 UTC.
    pub fn new() -> Self {
        Self::with_epoch(UNIX_EPOCH + Duration::from_secs(1_704_067_200))
    }
    
    /// Creates a context whose wall clock starts at `epoch`.
    pub fn with_epoch(epoch: SystemTime) -> Self {
        Self {
            virtual_time_ns: Arc::new(Mutex::new(0)),
            epoch,
        }
    }
    
    /// Creates an Arc-wrapped context for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
    
    /// Advances virtual time by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut time = self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner);
        *time = time.saturating_add(duration.as_nanos() as u64);
    }
    
    /// Sets the virtual time to a specific value.
    ///
    /// Time never runs backwards; earlier values are ignored.
    pub fn set_time(&self, time: Duration) {
        let mut current = self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner);
        *current = (*current).max(time.as_nanos() as u64);
    }
    
    /// Returns the wall-clock epoch.
    pub fn epoch(&self) -> SystemTime {
        self.epoch
    }
}

impl Default for ManualContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MapContext for ManualContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(*self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner))
    }
    
    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }
    
    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
