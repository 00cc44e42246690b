//! The "SCHEDULER" Engine - coalesced, frame-budgeted redraw scheduling.
//!
//! Three kinds of work reach a renderer:
//! - **Overlay sync**: reposition screen-anchored overlays (throttled, leading edge)
//! - **Full rebuild**: rebuild every drawn layer (debounced, trailing edge)
//! - **Prop update**: push fresh layer data (one pending animation frame)
//!
//! The scheduler does no drawing. It decides *what* runs in the next
//! animation frame and hands a [`FramePlan`] to the map core. A periodic health
//! check compares the backend's cache epoch with the one recorded at the
//! last rebuild and forces a single recovery when they diverge.

use crate::layers::LayerKey;
use crate::timers::TimerQueue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};
use worldview_env::TimerId;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Cost model of a renderer backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// DOM/SVG-style: every data change is a full rebuild
    Vector,
    /// GPU-compositor-style: data changes are prop pushes
    #[default]
    Compositor,
}

/// Timing parameters of the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum spacing of overlay syncs (≈ one frame)
    pub overlay_interval_ms: u64,
    /// Quiet period before a full rebuild runs
    pub rebuild_debounce_ms: u64,
    /// Period of the backing-store health check
    pub health_interval_ms: u64,
    /// Cluster recomputation budget per frame
    pub frame_budget_ms: u64,
    /// Zoom distance past a bucket boundary before the bucket changes
    pub zoom_hysteresis: f64,
    pub backend: BackendKind,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            overlay_interval_ms: 16,
            rebuild_debounce_ms: 150,
            health_interval_ms: 30_000,
            frame_budget_ms: 12,
            zoom_hysteresis: 0.1,
            backend: BackendKind::Compositor,
        }
    }
}

impl SchedulerConfig {
    pub fn check(&self) -> Result<(), String> {
        let intervals = [
            ("overlay_interval_ms", self.overlay_interval_ms),
            ("rebuild_debounce_ms", self.rebuild_debounce_ms),
            ("health_interval_ms", self.health_interval_ms),
            ("frame_budget_ms", self.frame_budget_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(format!("{} must be positive", name));
            }
        }
        if !self.zoom_hysteresis.is_finite() || self.zoom_hysteresis < 0.0 {
            return Err(format!("zoom_hysteresis must be non-negative, got {}", self.zoom_hysteresis));
        }
        Ok(())
    }

    pub fn overlay_interval(&self) -> Duration {
        Duration::from_millis(self.overlay_interval_ms)
    }

    pub fn rebuild_debounce(&self) -> Duration {
        Duration::from_millis(self.rebuild_debounce_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms)
    }
}

// =============================================================================
// BACKING STORE
// =============================================================================

/// What the health check may ask a backend about its retained render state.
pub trait BackingStore {
    /// Counter bumped by any mutation of retained state outside the scheduler
    fn epoch(&self) -> u64;

    /// True when the backend holds no drawn objects for `layer`
    fn is_layer_empty(&self, layer: LayerKey) -> bool;
}

/// Result of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    Healthy,
    /// Store diverged; one recovery rebuild was scheduled
    Recovering,
    /// Store still diverged after a recovery; left for the next cycle
    StillStale,
    /// Checks are skipped while paused or before the first rebuild
    Skipped,
}

// =============================================================================
// FRAME PLAN & BUDGET
// =============================================================================

/// Work to run in one animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FramePlan {
    pub full_rebuild: bool,
    pub overlay_sync: bool,
    pub prop_update: bool,
}

impl FramePlan {
    pub fn is_empty(&self) -> bool {
        !self.full_rebuild && !self.overlay_sync && !self.prop_update
    }
}

/// Time budget of one frame's cluster recomputation.
#[derive(Debug, Clone, Copy)]
pub struct FrameBudget {
    started_at: Duration,
    limit: Duration,
}

impl FrameBudget {
    pub fn new(started_at: Duration, limit: Duration) -> Self {
        Self { started_at, limit }
    }

    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started_at)
    }

    pub fn remaining(&self, now: Duration) -> Duration {
        self.limit.saturating_sub(self.elapsed(now))
    }

    pub fn is_exhausted(&self, now: Duration) -> bool {
        self.elapsed(now) >= self.limit
    }
}

/// Counters exposed for diagnostics and the simulation harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SchedulerStats {
    /// Animation frames requested (false -> true transitions of the flag)
    pub frame_requests: u64,
    pub frames: u64,
    pub full_rebuilds: u64,
    pub overlay_syncs: u64,
    pub prop_updates: u64,
    /// `render()` calls absorbed by an already pending prop update
    pub dropped_prop_requests: u64,
    /// Requests that arrived while paused
    pub latched_requests: u64,
    pub recoveries: u64,
    pub failed_recoveries: u64,
    pub budget_overruns: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerTimer {
    OverlayTrailing,
    RebuildDebounce,
    HealthCheck,
}

/// Events surfaced by [`RenderScheduler::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// The health interval elapsed; the caller runs [`RenderScheduler::check_health`]
    HealthCheckDue,
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Pure scheduling state machine.
///
/// Time is passed in by the caller. Every timeout and interval the scheduler
/// arms lives in its own [`TimerQueue`].
#[derive(Debug, Clone)]
pub struct RenderScheduler {
    config: SchedulerConfig,
    timers: TimerQueue<SchedulerTimer>,
    overlay_timer: Option<TimerId>,
    rebuild_timer: Option<TimerId>,
    health_timer: Option<TimerId>,
    last_overlay_sync: Option<Duration>,
    frame_requested: bool,
    pending: FramePlan,
    paused: bool,
    latched: bool,
    recorded_epoch: Option<u64>,
    populated: BTreeSet<LayerKey>,
    recovery_pending: bool,
    stats: SchedulerStats,
}

impl RenderScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            timers: TimerQueue::new(),
            overlay_timer: None,
            rebuild_timer: None,
            health_timer: None,
            last_overlay_sync: None,
            frame_requested: false,
            pending: FramePlan::default(),
            paused: false,
            latched: false,
            recorded_epoch: None,
            populated: BTreeSet::new(),
            recovery_pending: false,
            stats: SchedulerStats::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.config.backend
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Arms the periodic health check.
    pub fn start(&mut self, now: Duration) {
        if self.health_timer.is_none() {
            let id = self
                .timers
                .set_interval(now, self.config.health_interval(), SchedulerTimer::HealthCheck);
            self.health_timer = Some(id);
        }
    }

    fn request_frame(&mut self) {
        if !self.frame_requested {
            self.frame_requested = true;
            self.stats.frame_requests += 1;
        }
    }

    /// Returns true (and latches) when the request must wait for `resume`.
    fn latch_if_paused(&mut self) -> bool {
        if self.paused {
            self.latched = true;
            self.stats.latched_requests += 1;
        }
        self.paused
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    /// Requests a prop update in the next animation frame.
    ///
    /// Any number of calls before that frame coalesce into one.
    pub fn render(&mut self) {
        if self.latch_if_paused() {
            return;
        }
        if self.pending.prop_update {
            self.stats.dropped_prop_requests += 1;
            return;
        }
        self.pending.prop_update = true;
        self.request_frame();
    }

    /// Leading-edge throttled overlay sync.
    ///
    /// The first request in a window syncs on the next frame; later requests
    /// in the same window arm a single trailing sync at the window's end.
    pub fn request_overlay_sync(&mut self, now: Duration) {
        if self.latch_if_paused() {
            return;
        }
        let interval = self.config.overlay_interval();
        match self.last_overlay_sync {
            Some(last) if now.saturating_sub(last) < interval => {
                if self.overlay_timer.is_none() {
                    let delay = interval - now.saturating_sub(last);
                    let id = self.timers.set_timeout(now, delay, SchedulerTimer::OverlayTrailing);
                    self.overlay_timer = Some(id);
                    debug!("Overlay sync throttled, trailing sync in {:?}", delay);
                }
            }
            _ => self.schedule_overlay_sync(now),
        }
    }

    fn schedule_overlay_sync(&mut self, now: Duration) {
        self.last_overlay_sync = Some(now);
        self.pending.overlay_sync = true;
        self.request_frame();
    }

    /// Trailing-edge debounced full rebuild; each call restarts the window.
    pub fn request_rebuild(&mut self, now: Duration) {
        if self.latch_if_paused() {
            return;
        }
        if let Some(id) = self.rebuild_timer.take() {
            self.timers.clear(id);
        }
        let id = self
            .timers
            .set_timeout(now, self.config.rebuild_debounce(), SchedulerTimer::RebuildDebounce);
        self.rebuild_timer = Some(id);
    }

    /// Schedules a full rebuild for the next frame, bypassing the debounce.
    pub fn force_rebuild(&mut self) {
        if let Some(id) = self.rebuild_timer.take() {
            self.timers.clear(id);
        }
        self.pending.full_rebuild = true;
        self.request_frame();
    }

    /// Asks for another frame to finish cluster work left over by the budget.
    pub fn request_continuation(&mut self) {
        self.stats.budget_overruns += 1;
        self.pending.prop_update = true;
        self.request_frame();
    }

    // -------------------------------------------------------------------------
    // Pause / resume
    // -------------------------------------------------------------------------

    pub fn pause(&mut self) {
        if !self.paused {
            debug!("Render scheduler paused");
            self.paused = true;
        }
    }

    /// Resumes. A latched request is replayed exactly once as one forced rebuild.
    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        if std::mem::take(&mut self.latched) {
            debug!("Replaying latched request as one rebuild");
            self.force_rebuild();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    // -------------------------------------------------------------------------
    // Timers & frames
    // -------------------------------------------------------------------------

    /// Fires every timer due at `now`.
    pub fn poll(&mut self, now: Duration) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        for (id, timer) in self.timers.pop_due(now) {
            match timer {
                SchedulerTimer::OverlayTrailing => {
                    self.overlay_timer = None;
                    if !self.latch_if_paused() {
                        self.schedule_overlay_sync(now);
                    }
                }
                SchedulerTimer::RebuildDebounce => {
                    if self.rebuild_timer == Some(id) {
                        self.rebuild_timer = None;
                    }
                    if !self.latch_if_paused() {
                        debug!("Debounce window closed, full rebuild scheduled");
                        self.pending.full_rebuild = true;
                        self.request_frame();
                    }
                }
                SchedulerTimer::HealthCheck => events.push(SchedulerEvent::HealthCheckDue),
            }
        }
        events
    }

    pub fn wants_frame(&self) -> bool {
        self.frame_requested
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Consumes the pending animation frame and returns the work to run.
    ///
    /// A full rebuild subsumes the overlay sync and the prop update of the
    /// same frame. On a vector backend a prop update is realized as a full
    /// rebuild.
    ///
    /// A frame that arrives while paused draws nothing. Work queued before the
    /// pause is latched and replayed by `resume`.
    pub fn begin_frame(&mut self) -> Option<FramePlan> {
        if !self.frame_requested {
            return None;
        }
        self.frame_requested = false;
        if self.paused {
            if !std::mem::take(&mut self.pending).is_empty() {
                debug!("Frame arrived while paused, pending work latched");
                self.latched = true;
                self.stats.latched_requests += 1;
            }
            return None;
        }
        self.stats.frames += 1;

        let mut plan = std::mem::take(&mut self.pending);
        if plan.prop_update && self.config.backend == BackendKind::Vector {
            plan.full_rebuild = true;
        }
        if plan.full_rebuild {
            plan.overlay_sync = false;
            plan.prop_update = false;
            self.stats.full_rebuilds += 1;
        }
        if plan.overlay_sync {
            self.stats.overlay_syncs += 1;
        }
        if plan.prop_update {
            self.stats.prop_updates += 1;
        }
        Some(plan)
    }

    // -------------------------------------------------------------------------
    // Health
    // -------------------------------------------------------------------------

    /// Records the store state a rebuild or prop push left behind.
    pub fn record_rebuild(&mut self, epoch: u64, populated: impl IntoIterator<Item = LayerKey>) {
        self.recorded_epoch = Some(epoch);
        self.populated = populated.into_iter().collect();
    }

    /// Compares the store with the last recorded state.
    ///
    /// The first divergence forces one recovery rebuild; if the following
    /// check still fails, it warns and waits for the next cycle.
    pub fn check_health(&mut self, store: &dyn BackingStore) -> HealthOutcome {
        let Some(recorded) = self.recorded_epoch else {
            return HealthOutcome::Skipped;
        };
        if self.paused {
            return HealthOutcome::Skipped;
        }

        let epoch = store.epoch();
        let emptied: Vec<LayerKey> = self
            .populated
            .iter()
            .copied()
            .filter(|&layer| store.is_layer_empty(layer))
            .collect();
        let stale = epoch != recorded || !emptied.is_empty();

        if !stale {
            self.recovery_pending = false;
            return HealthOutcome::Healthy;
        }
        if self.recovery_pending {
            warn!(
                "Backing store still stale after recovery (epoch {} vs {}, emptied {:?})",
                epoch, recorded, emptied
            );
            self.recovery_pending = false;
            self.stats.failed_recoveries += 1;
            return HealthOutcome::StillStale;
        }
        debug!(
            "Backing store diverged (epoch {} vs {}, emptied {:?}), forcing recovery rebuild",
            epoch, recorded, emptied
        );
        self.recovery_pending = true;
        self.stats.recoveries += 1;
        self.force_rebuild();
        HealthOutcome::Recovering
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    /// Cancels every timer and drops pending work.
    pub fn destroy(&mut self) {
        self.timers.clear_all();
        self.overlay_timer = None;
        self.rebuild_timer = None;
        self.health_timer = None;
        self.frame_requested = false;
        self.pending = FramePlan::default();
        self.latched = false;
        self.recovery_pending = false;
    }
}
