//! Scenario runner - drives the map core through deterministic scenarios.

use crate::backend::RecordingBackend;
use crate::context::SimContext;
use crate::error::SimError;
use crate::feeds::{reference_catalog, FeedGenerator};
use crate::scenarios::ScenarioId;

use rand::Rng;
use serde::Serialize;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use worldview_core::{
    AssetType, BackendKind, ClusterMode, FrameDriver, GroupKeyStrategy, LayerDataStatus, LayerKey, MapConfig,
    MapCore, MapView, TimeRange,
};
use worldview_env::MapContext;

type SimCore = MapCore<SimContext, RecordingBackend>;

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    pub backend: BackendKind,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Animation frames executed
    pub total_frames: u64,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Counters collected from the core at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioMetrics {
    pub frame_requests: u64,
    pub frames: u64,
    pub full_rebuilds: u64,
    pub prop_updates: u64,
    pub overlay_syncs: u64,
    pub dropped_prop_requests: u64,
    pub latched_requests: u64,
    pub recoveries: u64,
    pub failed_recoveries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl ScenarioMetrics {
    fn capture(core: &SimCore) -> Self {
        let stats = core.scheduler_stats();
        let (cache_hits, cache_misses) = core.cache_stats();
        Self {
            frame_requests: stats.frame_requests,
            frames: stats.frames,
            full_rebuilds: stats.full_rebuilds,
            prop_updates: stats.prop_updates,
            overlay_syncs: stats.overlay_syncs,
            dropped_prop_requests: stats.dropped_prop_requests,
            latched_requests: stats.latched_requests,
            recoveries: stats.recoveries,
            failed_recoveries: stats.failed_recoveries,
            cache_hits,
            cache_misses,
        }
    }

    /// Counter growth since `earlier`.
    fn since(&self, earlier: &ScenarioMetrics) -> ScenarioMetrics {
        ScenarioMetrics {
            frame_requests: self.frame_requests - earlier.frame_requests,
            frames: self.frames - earlier.frames,
            full_rebuilds: self.full_rebuilds - earlier.full_rebuilds,
            prop_updates: self.prop_updates - earlier.prop_updates,
            overlay_syncs: self.overlay_syncs - earlier.overlay_syncs,
            dropped_prop_requests: self.dropped_prop_requests - earlier.dropped_prop_requests,
            latched_requests: self.latched_requests - earlier.latched_requests,
            recoveries: self.recoveries - earlier.recoveries,
            failed_recoveries: self.failed_recoveries - earlier.failed_recoveries,
            cache_hits: self.cache_hits - earlier.cache_hits,
            cache_misses: self.cache_misses - earlier.cache_misses,
        }
    }
}

// ============================================================================
// HARNESS
// ============================================================================

/// Failed assertions of one run.
#[derive(Debug, Default)]
struct Checks {
    failures: Vec<String>,
}

impl Checks {
    fn check(&mut self, ok: bool, failure: impl FnOnce() -> String) {
        if !ok {
            let message = failure();
            warn!("  check failed: {}", message);
            self.failures.push(message);
        }
    }

    fn failure_reason(&self) -> Option<String> {
        (!self.failures.is_empty()).then(|| self.failures.join("; "))
    }
}

/// One map core wired to a recording backend and a seeded feed stream.
struct Harness {
    ctx: Arc<SimContext>,
    core: SimCore,
    feeds: FeedGenerator,
    driver: FrameDriver,
}

impl Harness {
    fn new(seed: u64, kind: BackendKind) -> Result<Self, SimError> {
        let ctx = SimContext::shared(seed);
        let feeds = FeedGenerator::new(ctx.derive_seed(1), 2.0)?;
        let mut core = MapCore::new(
            Arc::clone(&ctx),
            RecordingBackend::new(kind),
            MapConfig::default(),
            reference_catalog(),
        )?;
        for layer in [LayerKey::Flights, LayerKey::Vessels, LayerKey::Outages] {
            core.toggle_layer(layer, true);
        }
        Ok(Self {
            ctx,
            core,
            feeds,
            driver: FrameDriver::default(),
        })
    }

    /// Delivers one refresh of every feed.
    fn load_feeds(&mut self, n: usize) {
        let now = self.ctx.system_time();
        let catalog = self.core.catalog().clone();
        self.core.set_earthquakes(&self.feeds.earthquakes(n, now));
        self.core.set_protests(&self.feeds.protests(n, now));
        self.core.set_vessels(&self.feeds.vessels(n, now));
        self.core.set_outages(&self.feeds.outages(n / 4, now));
        let (flights, formations) = self.feeds.flights(n / 2, now);
        self.core.set_military_flights(&flights, &formations);
        self.core.set_news(&self.feeds.news(&catalog, n, now));
    }

    async fn run_for(&mut self, duration: Duration) {
        self.driver.run_for(&mut self.core, duration).await;
    }

    /// Runs until virtual time reaches `at`.
    async fn run_until(&mut self, at: Duration) {
        let now = self.ctx.now();
        if at > now {
            self.run_for(at - now).await;
        }
    }

    fn metrics(&self) -> ScenarioMetrics {
        ScenarioMetrics::capture(&self.core)
    }

    fn outcome(&self, checks: Checks) -> Outcome {
        Outcome {
            checks,
            metrics: self.metrics(),
            final_time_secs: self.ctx.now().as_secs_f64(),
        }
    }
}

struct Outcome {
    checks: Checks,
    metrics: ScenarioMetrics,
    final_time_secs: f64,
}

/// Cluster member ids of every visible marker layer.
fn partitions(core: &SimCore) -> BTreeMap<LayerKey, Vec<Vec<String>>> {
    LayerKey::MARKER_LAYERS
        .iter()
        .filter(|&&layer| core.visibility(layer).is_visible)
        .filter_map(|&layer| {
            let clusters = core.clusters(layer)?;
            let ids = clusters
                .iter()
                .map(|c| c.members.iter().map(|m| m.id.clone()).collect())
                .collect();
            Some((layer, ids))
        })
        .collect()
}

/// Every drawn marker is in exactly one cluster and keyed layers never mix keys.
fn check_cluster_invariants(core: &SimCore, checks: &mut Checks) {
    for layer in LayerKey::MARKER_LAYERS {
        if !core.visibility(layer).is_visible {
            continue;
        }
        let LayerDataStatus::Ready { count } = core.layer_status(layer) else {
            continue;
        };
        let Some(clusters) = core.clusters(layer) else {
            checks.check(false, || format!("{} has data but no clusters", layer));
            continue;
        };
        let assigned: usize = clusters.iter().map(|c| c.len()).sum();
        checks.check(assigned == count, || {
            format!("{}: {} markers but {} cluster members", layer, count, assigned)
        });

        let keyed = matches!(
            core.config().cluster_mode(layer),
            ClusterMode::Radius {
                group_key: GroupKeyStrategy::Marker
            }
        );
        if keyed {
            let mixed = clusters
                .iter()
                .filter(|c| c.members.iter().any(|m| m.group_key != c.members[0].group_key))
                .count();
            checks.check(mixed == 0, || format!("{}: {} clusters mix group keys", layer, mixed));
        }

        let drawn = core.backend().drawn(layer);
        checks.check(drawn == clusters.len(), || {
            format!("{}: backend drew {} objects for {} clusters", layer, drawn, clusters.len())
        });
    }
}

// ============================================================================
// RUNNER
// ============================================================================

/// Number of pans in the pan storm, one per millisecond.
const STORM_PANS: u64 = 300;

/// Render calls stacked on top of the feed burst.
const BURST_RENDERS: u64 = 40;

/// Runs map-core scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Backend kind for single-backend scenarios
    backend: BackendKind,

    /// Records per feed refresh
    markers_per_feed: usize,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            backend: BackendKind::Compositor,
            markers_per_feed: 200,
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_markers(mut self, markers_per_feed: usize) -> Self {
        self.markers_per_feed = markers_per_feed.max(4);
        self
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={}, {:?} backend)", scenario.name(), self.seed, self.backend);

        let outcome = match scenario {
            ScenarioId::PanStorm => self.run_pan_storm().await,
            ScenarioId::FeedBurst => self.run_feed_burst().await,
            ScenarioId::PauseResume => self.run_pause_resume().await,
            ScenarioId::StaleStore => self.run_stale_store().await,
            ScenarioId::FlashExpiry => self.run_flash_expiry().await,
            ScenarioId::BackendParity => self.run_backend_parity().await,
        };

        match outcome {
            Ok(outcome) => {
                let failure_reason = outcome.checks.failure_reason();
                ScenarioResult {
                    scenario,
                    seed: self.seed,
                    backend: self.backend,
                    passed: failure_reason.is_none(),
                    total_frames: outcome.metrics.frames,
                    final_time_secs: outcome.final_time_secs,
                    failure_reason,
                    metrics: outcome.metrics,
                }
            }
            Err(e) => ScenarioResult {
                scenario,
                seed: self.seed,
                backend: self.backend,
                passed: false,
                total_frames: 0,
                final_time_secs: 0.0,
                failure_reason: Some(e.to_string()),
                metrics: ScenarioMetrics::default(),
            },
        }
    }

    /// WV-001: PanStorm - one pan per millisecond for 300 ms.
    ///
    /// **Assertion**: overlay syncs stay within the throttle bound, the
    /// trailing sync lands on the final camera, and nothing re-clusters.
    async fn run_pan_storm(&self) -> Result<Outcome, SimError> {
        info!("WV-001: PanStorm - throttled overlay sync");
        let mut h = Harness::new(self.seed, self.backend)?;
        h.load_feeds(self.markers_per_feed);
        h.run_for(Duration::from_secs(1)).await;

        let before = h.metrics();
        let state_changes = Rc::new(Cell::new(0u64));
        let counter = Rc::clone(&state_changes);
        h.core.on_state_change(move |_| counter.set(counter.get() + 1));

        let mut last_center = h.core.view().center;
        for _ in 0..STORM_PANS {
            last_center = h.feeds.pan_target();
            h.core.pan(last_center);
            h.run_for(Duration::from_millis(1)).await;
        }
        h.run_for(Duration::from_millis(200)).await;
        let delta = h.metrics().since(&before);

        let interval_ms = h.core.config().scheduler.overlay_interval_ms.max(1);
        let upper = STORM_PANS / interval_ms + 3;
        let lower = STORM_PANS / (2 * interval_ms);
        debug!("  overlay syncs={} (bound {}..={})", delta.overlay_syncs, lower, upper);

        let mut checks = Checks::default();
        checks.check(delta.overlay_syncs <= upper, || {
            format!("{} overlay syncs for {} pans exceeds throttle bound {}", delta.overlay_syncs, STORM_PANS, upper)
        });
        checks.check(delta.overlay_syncs >= lower, || {
            format!("only {} overlay syncs, trailing edge lost", delta.overlay_syncs)
        });
        checks.check(delta.cache_misses == 0, || format!("pan re-clustered {} layers", delta.cache_misses));
        checks.check(delta.full_rebuilds == 0 && delta.prop_updates == 0, || {
            format!("pan caused {} rebuilds and {} prop updates", delta.full_rebuilds, delta.prop_updates)
        });
        let synced_center = h.core.backend().last_overlay().map(|o| o.center);
        checks.check(synced_center == Some(last_center), || {
            format!("last overlay sync at {:?}, camera at {:?}", synced_center, last_center)
        });
        checks.check(state_changes.get() == STORM_PANS, || {
            format!("{} state changes for {} pans", state_changes.get(), STORM_PANS)
        });

        info!("✓ PanStorm complete: {} pans, {} overlay syncs", STORM_PANS, delta.overlay_syncs);
        Ok(h.outcome(checks))
    }

    /// WV-002: FeedBurst - three refreshes of every feed plus 40 render calls
    /// between two frames.
    ///
    /// **Assertion**: one frame request, one data update, every other request
    /// absorbed, and the clustering invariants hold on what was drawn.
    async fn run_feed_burst(&self) -> Result<Outcome, SimError> {
        info!("WV-002: FeedBurst - render coalescing");
        let mut h = Harness::new(self.seed, self.backend)?;
        h.run_for(Duration::from_secs(1)).await;

        let before = h.metrics();
        for _ in 0..3 {
            h.load_feeds(self.markers_per_feed);
        }
        for _ in 0..BURST_RENDERS {
            h.core.render();
        }
        // 3 refreshes of 6 setters, each one render() call
        let requests = 3 * 6 + BURST_RENDERS;
        h.run_for(Duration::from_millis(100)).await;
        let delta = h.metrics().since(&before);

        let mut checks = Checks::default();
        checks.check(delta.frame_requests == 1, || {
            format!("{} render requests produced {} frame requests", requests, delta.frame_requests)
        });
        checks.check(delta.frames == 1, || format!("{} frames ran", delta.frames));
        checks.check(delta.dropped_prop_requests == requests - 1, || {
            format!("{} of {} requests absorbed", delta.dropped_prop_requests, requests)
        });
        let (rebuilds, props) = match self.backend {
            BackendKind::Vector => (1, 0),
            BackendKind::Compositor => (0, 1),
        };
        checks.check(delta.full_rebuilds == rebuilds && delta.prop_updates == props, || {
            format!(
                "expected {} rebuilds and {} prop updates, got {} and {}",
                rebuilds, props, delta.full_rebuilds, delta.prop_updates
            )
        });
        check_cluster_invariants(&h.core, &mut checks);

        info!("✓ FeedBurst complete: {} requests coalesced into {} frame", requests, delta.frames);
        Ok(h.outcome(checks))
    }

    /// WV-003: PauseResume - two seconds of pans, zooms and feed refreshes
    /// while paused.
    ///
    /// **Assertion**: nothing is drawn while paused and resume replays the
    /// latched work as exactly one rebuild of the latest state.
    async fn run_pause_resume(&self) -> Result<Outcome, SimError> {
        info!("WV-003: PauseResume - latch and replay");
        let mut h = Harness::new(self.seed, self.backend)?;
        h.load_feeds(self.markers_per_feed);
        h.run_for(Duration::from_secs(1)).await;

        // A frame is already pending when the pause lands.
        let before = h.metrics();
        h.core.render();
        let pending_at_pause = h.core.wants_frame();
        h.core.pause();
        let mut last_zoom = h.core.view().zoom;
        for _ in 0..20 {
            let center = h.feeds.pan_target();
            h.core.pan(center);
            last_zoom = h.ctx.with_rng(|rng| rng.gen_range(1.0..6.0));
            h.core.set_zoom(last_zoom);
            let now = h.ctx.system_time();
            let quakes = h.feeds.earthquakes(self.markers_per_feed, now);
            h.core.set_earthquakes(&quakes);
            h.core.render();
            h.run_for(Duration::from_millis(100)).await;
        }
        let paused = h.metrics().since(&before);

        let mut checks = Checks::default();
        checks.check(paused.frames == 0, || format!("{} frames ran while paused", paused.frames));
        checks.check(paused.latched_requests > 0, || "no requests were latched".to_string());
        checks.check(h.core.is_paused(), || "core is not paused".to_string());
        checks.check(pending_at_pause, || "no frame was pending at pause".to_string());

        let mid = h.metrics();
        h.core.resume();
        h.run_for(Duration::from_secs(1)).await;
        let resumed = h.metrics().since(&mid);

        checks.check(resumed.full_rebuilds == 1 && resumed.prop_updates == 0, || {
            format!(
                "resume replayed {} rebuilds and {} prop updates",
                resumed.full_rebuilds, resumed.prop_updates
            )
        });
        checks.check(resumed.frames == 1, || format!("resume ran {} frames", resumed.frames));
        checks.check(h.core.view().zoom == last_zoom, || {
            format!("zoom {} after resume, last requested {}", h.core.view().zoom, last_zoom)
        });
        check_cluster_invariants(&h.core, &mut checks);

        info!("✓ PauseResume complete: {} latched requests, 1 replay", paused.latched_requests);
        Ok(h.outcome(checks))
    }

    /// WV-004: StaleStore - the backing store changes behind the core's back.
    ///
    /// **Assertion**: an external mutation is recovered by one rebuild; a
    /// store that stays empty gets one recovery and a warning, never a loop.
    async fn run_stale_store(&self) -> Result<Outcome, SimError> {
        info!("WV-004: StaleStore - one-shot recovery");
        let mut h = Harness::new(self.seed, self.backend)?;
        let interval = h.core.config().scheduler.health_interval();
        h.load_feeds(self.markers_per_feed);
        h.run_for(Duration::from_secs(1)).await;
        let mut checks = Checks::default();

        // Mutation: the next check recovers it, the one after is healthy.
        let before = h.metrics();
        let rebuilds_before = h.core.backend().counters().rebuilds;
        h.core.backend_mut().mutate_externally();
        h.run_until(interval * 2 + Duration::from_secs(1)).await;
        let mutated = h.metrics().since(&before);
        let rebuilds = h.core.backend().counters().rebuilds - rebuilds_before;
        checks.check(mutated.recoveries == 1 && mutated.failed_recoveries == 0, || {
            format!("mutation: {} recoveries, {} failed", mutated.recoveries, mutated.failed_recoveries)
        });
        checks.check(rebuilds == 1, || format!("mutation caused {} rebuilds", rebuilds));

        // Lost context: one recovery, then a warning on the next check.
        let before = h.metrics();
        let rebuilds_before = h.core.backend().counters().rebuilds;
        h.core.backend_mut().lose_context();
        h.run_until(interval * 4 + Duration::from_secs(1)).await;
        let lost = h.metrics().since(&before);
        let rebuilds = h.core.backend().counters().rebuilds - rebuilds_before;
        checks.check(lost.recoveries == 1 && lost.failed_recoveries == 1, || {
            format!("lost store: {} recoveries, {} failed", lost.recoveries, lost.failed_recoveries)
        });
        checks.check(rebuilds == 1, || format!("lost store caused {} rebuilds", rebuilds));

        // Restored: the next cycle recovers and the one after is healthy.
        let before = h.metrics();
        h.core.backend_mut().restore_context();
        h.run_until(interval * 6 + Duration::from_secs(1)).await;
        let restored = h.metrics().since(&before);
        checks.check(restored.recoveries == 1 && restored.failed_recoveries == 0, || {
            format!("restored: {} recoveries, {} failed", restored.recoveries, restored.failed_recoveries)
        });
        check_cluster_invariants(&h.core, &mut checks);

        info!("✓ StaleStore complete: {} recoveries total", h.metrics().recoveries);
        Ok(h.outcome(checks))
    }

    /// WV-005: FlashExpiry - overlapping flashes, one of them renewed.
    ///
    /// **Assertion**: each id is highlighted until its latest expiry and gone
    /// right after, and no flash timer outlives its batch.
    async fn run_flash_expiry(&self) -> Result<Outcome, SimError> {
        info!("WV-005: FlashExpiry - highlight TTLs");
        let mut h = Harness::new(self.seed, self.backend)?;
        h.run_for(Duration::from_secs(1)).await;
        let idle_timers = h.core.active_timers();
        let ttl = h.core.config().highlight_ttl();
        let renew_after = ttl / 2;
        let dc_ttl = Duration::from_millis(h.ctx.with_rng(|rng| rng.gen_range(500..2_500)));

        let t0 = h.ctx.now();
        h.core.flash_assets(AssetType::Base, &["ramstein", "incirlik"]);
        h.run_for(renew_after).await;
        h.core.flash_assets(AssetType::Base, &["ramstein"]);
        h.core.flash_assets_for(AssetType::Datacenter, &["fra-1"], dc_ttl);

        let first_expiry = t0 + ttl;
        let renewed_expiry = t0 + renew_after + ttl;
        let dc_expiry = t0 + renew_after + dc_ttl;
        let ms = Duration::from_millis(1);
        let mut probes = vec![
            (first_expiry - ms, AssetType::Base, "incirlik", true),
            (first_expiry + ms, AssetType::Base, "incirlik", false),
            // The renewal outlives the first batch.
            (first_expiry + ms, AssetType::Base, "ramstein", true),
            (renewed_expiry - ms, AssetType::Base, "ramstein", true),
            (renewed_expiry + ms, AssetType::Base, "ramstein", false),
            (dc_expiry - ms, AssetType::Datacenter, "fra-1", true),
            (dc_expiry + ms, AssetType::Datacenter, "fra-1", false),
        ];
        probes.sort_by_key(|p| p.0);

        let mut checks = Checks::default();
        for (at, asset_type, id, expected) in probes {
            h.run_until(at).await;
            let highlighted = h.core.is_highlighted(asset_type, id);
            checks.check(highlighted == expected, || {
                format!("{:?} {} highlighted={} at {:?}, expected {}", asset_type, id, highlighted, at - t0, expected)
            });
            if !expected {
                let drawn = h
                    .core
                    .backend()
                    .last_frame()
                    .and_then(|f| f.highlights.get(&asset_type))
                    .is_some_and(|ids| ids.contains(id));
                checks.check(!drawn, || format!("{:?} {} still drawn highlighted after expiry", asset_type, id));
            }
        }
        checks.check(h.core.active_timers() == idle_timers, || {
            format!("{} timers armed after expiry, {} when idle", h.core.active_timers(), idle_timers)
        });

        info!("✓ FlashExpiry complete: datacenter TTL {:?}", dc_ttl);
        Ok(h.outcome(checks))
    }

    /// WV-006: BackendParity - one interaction script on both backend kinds.
    ///
    /// **Assertion**: identical clusters, visibility, draw counts and
    /// escalation after every step; the vector backend never gets a prop push.
    async fn run_backend_parity(&self) -> Result<Outcome, SimError> {
        info!("WV-006: BackendParity - vector vs compositor");
        let mut vector = Harness::new(self.seed, BackendKind::Vector)?;
        let mut compositor = Harness::new(self.seed, BackendKind::Compositor)?;
        let mut checks = Checks::default();

        for step in 0..8 {
            for h in [&mut vector, &mut compositor] {
                match step {
                    0 | 7 => h.load_feeds(self.markers_per_feed),
                    1 => h.core.set_zoom(3.2),
                    2 => {
                        let center = h.feeds.pan_target();
                        h.core.pan(center);
                    }
                    3 => h.core.set_view(MapView::Eu),
                    4 => h.core.set_time_range(TimeRange::Day),
                    5 => h.core.set_zoom(5.5),
                    _ => {
                        h.core.toggle_layer(LayerKey::Protests, false);
                    }
                }
                h.run_for(Duration::from_millis(500)).await;
            }

            let (a, b) = (&vector.core, &compositor.core);
            checks.check(partitions(a) == partitions(b), || format!("step {}: cluster partitions differ", step));
            for layer in LayerKey::ALL {
                checks.check(a.visibility(layer) == b.visibility(layer), || {
                    format!("step {}: {} visibility differs", step, layer)
                });
                let (da, db) = (a.backend().drawn(layer), b.backend().drawn(layer));
                checks.check(da == db, || format!("step {}: {} drew {} vs {}", step, layer, da, db));
            }
            for hotspot in &a.catalog().hotspots {
                checks.check(a.escalation(&hotspot.id) == b.escalation(&hotspot.id), || {
                    format!("step {}: escalation of {} differs", step, hotspot.id)
                });
            }
            check_cluster_invariants(a, &mut checks);
            check_cluster_invariants(b, &mut checks);
        }

        let vector_counters = vector.core.backend().counters();
        let compositor_counters = compositor.core.backend().counters();
        checks.check(vector_counters.prop_pushes == 0, || {
            format!("vector backend got {} prop pushes", vector_counters.prop_pushes)
        });
        checks.check(compositor_counters.rebuilds <= vector_counters.rebuilds, || {
            format!(
                "compositor rebuilt {} times, vector {}",
                compositor_counters.rebuilds, vector_counters.rebuilds
            )
        });

        info!(
            "✓ BackendParity complete: vector {} rebuilds, compositor {} rebuilds + {} prop pushes",
            vector_counters.rebuilds, compositor_counters.rebuilds, compositor_counters.prop_pushes
        );
        Ok(compositor.outcome(checks))
    }
}
