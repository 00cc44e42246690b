//! Production implementation of MapContext using Tokio.

use crate::MapContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Production context backed by Tokio and the system clock.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
    
    /// Creates an Arc-wrapped context for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MapContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
    
    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
    
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[tokio::test]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new();
        let t1 = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();
        
        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }
    
    #[test]
    fn test_tokio_context_wall_clock() {
        let ctx = TokioContext::new();
        assert!(ctx.system_time() > SystemTime::UNIX_EPOCH);
    }
}
