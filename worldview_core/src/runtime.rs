//! Async frame driver.
//!
//! Stands in for the browser event loop: sleeps on the [`MapContext`] until
//! the next timer deadline or vsync, polls timers, and runs animation
//! frames. Under a virtual clock every run is deterministic.

use crate::map::{MapCore, RenderBackend};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use worldview_env::MapContext;

/// Default vsync interval (60 Hz).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// Counters of one driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DriverReport {
    pub wakeups: u64,
    pub frames: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameDriver {
    frame_interval: Duration,
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl FrameDriver {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval: frame_interval.max(Duration::from_micros(1)),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Drives `core` for `duration` of context time.
    ///
    /// Frames run at most once per vsync interval, and only when the core
    /// requested one. Returns early once the core is destroyed.
    pub async fn run_for<Ctx, B>(&self, core: &mut MapCore<Ctx, B>, duration: Duration) -> DriverReport
    where
        Ctx: MapContext,
        B: RenderBackend,
    {
        let ctx = core.context().clone();
        let start = ctx.now();
        let end = start + duration;
        let mut next_vsync = start;
        let mut report = DriverReport::default();

        loop {
            let now = ctx.now();
            if now >= end || core.is_destroyed() {
                break;
            }
            report.wakeups += 1;
            core.poll_timers();
            if core.wants_frame() && now >= next_vsync {
                if core.on_animation_frame().is_some() {
                    report.frames += 1;
                }
                next_vsync = now + self.frame_interval;
            }

            let mut wake = end;
            if let Some(deadline) = core.next_deadline() {
                wake = wake.min(deadline);
            }
            if core.wants_frame() {
                wake = wake.min(next_vsync);
            }
            // A deadline at `now` was just polled; never spin on it.
            let wake = wake.max(now + Duration::from_micros(1));
            ctx.sleep(wake - now).await;
        }

        report.elapsed = ctx.now().saturating_sub(start);
        debug!(
            "Frame driver ran {:?}: {} wakeups, {} frames",
            report.elapsed, report.wakeups, report.frames
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ReferenceCatalog;
    use crate::config::MapConfig;
    use crate::layers::LayerKey;
    use crate::map::{FrameSnapshot, OverlayFrame};
    use crate::projection::{GeoPoint, Projector, WebMercator};
    use crate::scheduler::{BackendKind, BackingStore};
    use crate::view::ViewState;
    use worldview_env::ManualContext;

    struct CountingBackend {
        projector: WebMercator,
        frames: usize,
    }

    impl BackingStore for CountingBackend {
        fn epoch(&self) -> u64 {
            0
        }

        fn is_layer_empty(&self, _layer: LayerKey) -> bool {
            false
        }
    }

    impl RenderBackend for CountingBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Compositor
        }

        fn projector(&self) -> &dyn Projector {
            &self.projector
        }

        fn set_view(&mut self, view: &ViewState) {
            self.projector = WebMercator::new(view.center, view.zoom, 1280.0, 720.0);
        }

        fn full_rebuild(&mut self, _frame: &FrameSnapshot<'_>) {
            self.frames += 1;
        }

        fn push_props(&mut self, _frame: &FrameSnapshot<'_>) {
            self.frames += 1;
        }

        fn sync_overlays(&mut self, _overlay: &OverlayFrame<'_>) {}
    }

    fn core() -> MapCore<ManualContext, CountingBackend> {
        let backend = CountingBackend {
            projector: WebMercator::new(GeoPoint::new(0.0, 0.0), 1.0, 1280.0, 720.0),
            frames: 0,
        };
        MapCore::new(ManualContext::shared(), backend, MapConfig::default(), ReferenceCatalog::new()).unwrap()
    }

    #[tokio::test]
    async fn test_driver_runs_pending_frames() {
        let mut core = core();
        let report = FrameDriver::default().run_for(&mut core, Duration::from_secs(1)).await;
        assert_eq!(report.frames, 1);
        assert_eq!(report.elapsed, Duration::from_secs(1));
        assert_eq!(core.backend().frames, 1);
    }

    #[tokio::test]
    async fn test_driver_sleeps_through_idle_time() {
        let mut core = core();
        // Only the 30 s health interval is armed once the first frame ran.
        let report = FrameDriver::default().run_for(&mut core, Duration::from_secs(95)).await;
        assert!(report.wakeups <= 6, "wakeups: {}", report.wakeups);
        assert_eq!(core.scheduler_stats().recoveries, 0);
    }

    #[tokio::test]
    async fn test_driver_stops_after_destroy() {
        let mut core = core();
        core.destroy();
        let report = FrameDriver::default().run_for(&mut core, Duration::from_secs(5)).await;
        assert_eq!(report.wakeups, 0);
    }
}
