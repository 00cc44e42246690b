//! `MapCore` - the behavioral core both renderer backends drive.
//!
//! Owns the view state, the layer registry, the feed store and every
//! scheduling, clustering, highlight, escalation and popup component. A
//! backend implements [`RenderBackend`] and only draws what it is handed in a
//! [`FrameSnapshot`]; it never decides when or what to recompute.

use crate::catalog::ReferenceCatalog;
use crate::clustering::{cluster, cluster_with_strategy, Cluster, ClusterCache, ZoomBucketTracker};
use crate::config::{ClusterMode, MapConfig};
use crate::error::{ConfigError, ViewStateError};
use crate::escalation::{ActivityPulse, AlertLookup, EscalationScorer, EscalationState};
use crate::feeds::{
    to_markers, Earthquake, IntoMarker, Marker, MilitaryFlight, MilitaryFlightCluster, NewsItem, Outage, Protest,
    Vessel,
};
use crate::highlight::{AssetType, HighlightTracker};
use crate::layers::LayerKey;
use crate::popup::{PopupEvent, PopupResolver, PopupSources, PopupTarget, RelatedNewsQuery, TriggerMode};
use crate::projection::{GeoPoint, Projector, ScreenPoint};
use crate::scheduler::{
    BackendKind, BackingStore, FrameBudget, FramePlan, HealthOutcome, RenderScheduler, SchedulerEvent, SchedulerStats,
};
use crate::view::{MapView, TimeRange, ViewState};
use crate::visibility::{LayerRegistry, LayerVisibility};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use worldview_env::{ListenerId, MapContext};

// ============================================================================
// BACKEND SEAM
// ============================================================================

/// A renderer backend (vector or compositor).
///
/// The backend also answers the scheduler's health checks about its retained
/// render state through [`BackingStore`].
pub trait RenderBackend: BackingStore {
    fn kind(&self) -> BackendKind;

    /// Projection for the current camera
    fn projector(&self) -> &dyn Projector;

    /// Camera moved; the backend updates its projection
    fn set_view(&mut self, view: &ViewState);

    /// Rebuild every drawn layer from scratch
    fn full_rebuild(&mut self, frame: &FrameSnapshot<'_>);

    /// Push fresh layer data without rebuilding (compositor backends)
    fn push_props(&mut self, frame: &FrameSnapshot<'_>);

    /// Reposition screen-anchored overlays
    fn sync_overlays(&mut self, overlay: &OverlayFrame<'_>);
}

/// Load state of one layer's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LayerDataStatus {
    /// No data delivered yet
    #[default]
    Pending,
    Empty,
    Ready { count: usize },
}

impl LayerDataStatus {
    fn from_count(count: usize) -> Self {
        if count == 0 {
            LayerDataStatus::Empty
        } else {
            LayerDataStatus::Ready { count }
        }
    }
}

/// What one layer looks like in a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFrame {
    pub layer: LayerKey,
    pub visibility: LayerVisibility,
    pub status: LayerDataStatus,
    /// Clusters with screen positions for this frame (marker layers only)
    pub clusters: Vec<Cluster>,
    /// Objects the backend is expected to draw for this layer
    pub drawn: usize,
}

/// Everything a backend draws in one rebuild or prop push.
pub struct FrameSnapshot<'a> {
    pub view: &'a ViewState,
    pub catalog: &'a ReferenceCatalog,
    pub layers: Vec<LayerFrame>,
    pub highlights: BTreeMap<AssetType, BTreeSet<String>>,
    pub escalation: &'a BTreeMap<String, EscalationState>,
}

impl FrameSnapshot<'_> {
    pub fn layer(&self, layer: LayerKey) -> Option<&LayerFrame> {
        self.layers.iter().find(|f| f.layer == layer)
    }
}

/// A screen-anchored overlay element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayAnchor {
    pub layer: LayerKey,
    pub id: String,
    pub screen_pos: ScreenPoint,
    pub count: usize,
}

pub struct OverlayFrame<'a> {
    pub view: &'a ViewState,
    pub anchors: Vec<OverlayAnchor>,
    pub pulses: &'a BTreeMap<String, ActivityPulse>,
}

// ============================================================================
// LISTENERS
// ============================================================================

type PopupListener = Box<dyn FnMut(&PopupEvent)>;
type ToggleListener = Box<dyn FnMut(LayerKey, bool)>;
type StateListener = Box<dyn FnMut(&ViewState)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    popup: Vec<(ListenerId, PopupListener)>,
    toggle: Vec<(ListenerId, ToggleListener)>,
    state: Vec<(ListenerId, StateListener)>,
}

impl Listeners {
    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.len();
        self.popup.retain(|(l, _)| *l != id);
        self.toggle.retain(|(l, _)| *l != id);
        self.state.retain(|(l, _)| *l != id);
        self.len() != before
    }

    fn len(&self) -> usize {
        self.popup.len() + self.toggle.len() + self.state.len()
    }

    fn clear(&mut self) {
        self.popup.clear();
        self.toggle.clear();
        self.state.clear();
    }

    fn emit_popup(&mut self, event: &PopupEvent) {
        for (_, listener) in &mut self.popup {
            listener(event);
        }
    }

    fn emit_toggle(&mut self, layer: LayerKey, enabled: bool) {
        for (_, listener) in &mut self.toggle {
            listener(layer, enabled);
        }
    }

    fn emit_state(&mut self, view: &ViewState) {
        for (_, listener) in &mut self.state {
            listener(view);
        }
    }
}

// ============================================================================
// FEED STORE
// ============================================================================

#[derive(Debug, Default)]
struct FeedStore {
    /// Validated markers as delivered
    raw: BTreeMap<LayerKey, Arc<[Marker]>>,
    /// Markers inside the active time range (what is clustered and drawn)
    filtered: BTreeMap<LayerKey, Arc<[Marker]>>,
    status: BTreeMap<LayerKey, LayerDataStatus>,
    flight_clusters: Vec<MilitaryFlightCluster>,
    news: Vec<NewsItem>,
}

impl FeedStore {
    fn insert(&mut self, layer: LayerKey, markers: Arc<[Marker]>, range: TimeRange, now: SystemTime) {
        self.raw.insert(layer, markers);
        self.refilter(layer, range, now);
    }

    /// Recomputes the filtered array. The array is shared with `raw` when
    /// nothing is excluded, so the cluster cache keeps hitting.
    fn refilter(&mut self, layer: LayerKey, range: TimeRange, now: SystemTime) {
        let Some(raw) = self.raw.get(&layer) else {
            return;
        };
        let filtered: Arc<[Marker]> = if !layer.is_live_feed() || raw.iter().all(|m| range.includes(m.observed_at, now)) {
            Arc::clone(raw)
        } else {
            raw.iter()
                .filter(|m| range.includes(m.observed_at, now))
                .cloned()
                .collect::<Vec<_>>()
                .into()
        };
        self.status.insert(layer, LayerDataStatus::from_count(filtered.len()));
        self.filtered.insert(layer, filtered);
    }
}

// ============================================================================
// MAP CORE
// ============================================================================

pub struct MapCore<Ctx: MapContext, B: RenderBackend> {
    ctx: Arc<Ctx>,
    backend: B,
    config: MapConfig,
    view: ViewState,
    registry: LayerRegistry,
    catalog: ReferenceCatalog,
    feeds: FeedStore,
    cache: ClusterCache,
    buckets: ZoomBucketTracker,
    layer_clusters: BTreeMap<LayerKey, Arc<Vec<Cluster>>>,
    dirty: BTreeSet<LayerKey>,
    scheduler: RenderScheduler,
    highlights: HighlightTracker,
    scorer: EscalationScorer,
    escalation: BTreeMap<String, EscalationState>,
    pulses: BTreeMap<String, ActivityPulse>,
    popups: PopupResolver,
    listeners: Listeners,
    /// Set while several view changes are applied as one
    batching_state: bool,
    destroyed: bool,
}

impl<Ctx: MapContext, B: RenderBackend> MapCore<Ctx, B> {
    /// Validates the config, enables the default layers and schedules the
    /// first full rebuild.
    pub fn new(ctx: Arc<Ctx>, backend: B, config: MapConfig, catalog: ReferenceCatalog) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut config = config;
        config.scheduler.backend = backend.kind();

        let now = ctx.now();
        let view = ViewState::default();
        let mut core = Self {
            registry: LayerRegistry::new(config.thresholds.clone()),
            buckets: ZoomBucketTracker::new(config.scheduler.zoom_hysteresis),
            scheduler: RenderScheduler::new(config.scheduler.clone()),
            scorer: EscalationScorer::new(config.escalation.clone()),
            ctx,
            backend,
            view,
            catalog,
            feeds: FeedStore::default(),
            cache: ClusterCache::new(),
            layer_clusters: BTreeMap::new(),
            dirty: BTreeSet::new(),
            highlights: HighlightTracker::new(),
            escalation: BTreeMap::new(),
            pulses: BTreeMap::new(),
            popups: PopupResolver::default(),
            listeners: Listeners::default(),
            batching_state: false,
            destroyed: false,
            config,
        };

        for layer in core.config.default_layers.clone() {
            core.registry.set_enabled(layer, true, core.view.zoom);
            core.view.active_layers.insert(layer);
        }
        core.load_datacenters();
        core.refresh_escalation();
        core.buckets.update(core.view.zoom, &core.config.radius);
        core.backend.set_view(&core.view);
        core.scheduler.start(now);
        core.scheduler.force_rebuild();
        info!(
            "Map core started ({:?} backend, {} layers enabled)",
            core.scheduler.backend_kind(),
            core.view.active_layers.len()
        );
        Ok(core)
    }

    /// Replaces the breaking-news classification used by escalation scoring.
    pub fn with_alert_lookup(mut self, alerts: impl AlertLookup + 'static) -> Self {
        self.scorer = EscalationScorer::with_alerts(self.config.escalation.clone(), alerts);
        self.refresh_escalation();
        self
    }

    /// Replaces the related-news query used when popups are assembled.
    pub fn with_related_news(mut self, query: impl RelatedNewsQuery + 'static) -> Self {
        self.popups = PopupResolver::new(query);
        self
    }

    fn load_datacenters(&mut self) {
        let (markers, dropped) = to_markers(&self.catalog.datacenters);
        if dropped > 0 {
            debug!("Dropped {} datacenters with invalid coordinates", dropped);
        }
        let now = self.ctx.system_time();
        self.feeds.insert(LayerKey::Datacenters, markers, self.view.time_range, now);
        self.cache.invalidate_layer(LayerKey::Datacenters);
        self.dirty.insert(LayerKey::Datacenters);
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn context(&self) -> &Arc<Ctx> {
        &self.ctx
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }

    pub fn visibility(&self, layer: LayerKey) -> LayerVisibility {
        self.registry.visibility(layer, self.view.zoom)
    }

    pub fn layer_status(&self, layer: LayerKey) -> LayerDataStatus {
        if !layer_has_markers(layer) {
            return LayerDataStatus::from_count(self.static_count(layer));
        }
        self.feeds.status.get(&layer).copied().unwrap_or_default()
    }

    /// Last computed clusters of a marker layer.
    pub fn clusters(&self, layer: LayerKey) -> Option<Arc<Vec<Cluster>>> {
        self.layer_clusters.get(&layer).cloned()
    }

    pub fn escalation(&self, hotspot_id: &str) -> Option<&EscalationState> {
        self.escalation.get(hotspot_id)
    }

    pub fn pulse(&self, hotspot_id: &str) -> Option<&ActivityPulse> {
        self.pulses.get(hotspot_id)
    }

    pub fn is_highlighted(&self, asset_type: AssetType, id: &str) -> bool {
        self.highlights.is_highlighted(asset_type, id, self.ctx.now())
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// `(hits, misses)` of the cluster cache.
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.hit_stats()
    }

    pub fn is_paused(&self) -> bool {
        self.scheduler.is_paused()
    }

    /// Timers currently armed across the scheduler and highlight tracker.
    pub fn active_timers(&self) -> usize {
        self.scheduler.active_timers() + self.highlights.pending_timers()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    pub fn on_popup(&mut self, listener: impl FnMut(&PopupEvent) + 'static) -> ListenerId {
        let id = self.listeners.allocate();
        self.listeners.popup.push((id, Box::new(listener)));
        id
    }

    pub fn on_layer_toggle(&mut self, listener: impl FnMut(LayerKey, bool) + 'static) -> ListenerId {
        let id = self.listeners.allocate();
        self.listeners.toggle.push((id, Box::new(listener)));
        id
    }

    pub fn on_state_change(&mut self, listener: impl FnMut(&ViewState) + 'static) -> ListenerId {
        let id = self.listeners.allocate();
        self.listeners.state.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // ------------------------------------------------------------------------
    // Scheduling helpers
    // ------------------------------------------------------------------------

    /// Requests one coalesced prop update.
    pub fn render(&mut self) {
        if !self.destroyed {
            self.scheduler.render();
        }
    }

    fn request_rebuild(&mut self) {
        if !self.destroyed {
            self.scheduler.request_rebuild(self.ctx.now());
        }
    }

    fn request_overlay_sync(&mut self) {
        if !self.destroyed {
            self.scheduler.request_overlay_sync(self.ctx.now());
        }
    }

    fn emit_state(&mut self) {
        if !self.batching_state {
            self.listeners.emit_state(&self.view);
        }
    }

    pub fn pause(&mut self) {
        self.scheduler.pause();
    }

    pub fn resume(&mut self) {
        self.scheduler.resume();
    }

    // ------------------------------------------------------------------------
    // Data inputs
    // ------------------------------------------------------------------------

    fn store_layer<T: IntoMarker>(&mut self, layer: LayerKey, records: &[T]) {
        let (markers, dropped) = to_markers(records);
        if dropped > 0 {
            debug!("Dropped {} {} records with invalid coordinates", dropped, layer);
        }
        let now = self.ctx.system_time();
        self.feeds.insert(layer, markers, self.view.time_range, now);
        self.cache.invalidate_layer(layer);
        self.dirty.insert(layer);
        self.render();
    }

    pub fn set_earthquakes(&mut self, earthquakes: &[Earthquake]) {
        self.store_layer(LayerKey::Earthquakes, earthquakes);
    }

    pub fn set_protests(&mut self, protests: &[Protest]) {
        self.store_layer(LayerKey::Protests, protests);
    }

    /// Flights plus the clusters the flight feed computed upstream.
    pub fn set_military_flights(&mut self, flights: &[MilitaryFlight], clusters: &[MilitaryFlightCluster]) {
        self.feeds.flight_clusters = clusters.to_vec();
        self.store_layer(LayerKey::Flights, flights);
    }

    pub fn set_vessels(&mut self, vessels: &[Vessel]) {
        self.store_layer(LayerKey::Vessels, vessels);
    }

    pub fn set_outages(&mut self, outages: &[Outage]) {
        self.store_layer(LayerKey::Outages, outages);
    }

    /// New headlines: escalation is recomputed wholesale for every hotspot.
    pub fn set_news(&mut self, news: &[NewsItem]) {
        self.feeds.news = news.to_vec();
        self.refresh_escalation();
        self.render();
    }

    fn refresh_escalation(&mut self) {
        let now = self.ctx.system_time();
        self.escalation = self.scorer.assess_all(&self.catalog.hotspots, &self.feeds.news, now);
        self.pulses = self
            .catalog
            .hotspots
            .iter()
            .map(|h| (h.id.clone(), self.scorer.pulse(h, &self.feeds.news, now)))
            .collect();
    }

    // ------------------------------------------------------------------------
    // View & interaction
    // ------------------------------------------------------------------------

    /// Applies a user toggle. Returns false when nothing changed.
    pub fn toggle_layer(&mut self, layer: LayerKey, enabled: bool) -> bool {
        if !self.registry.set_enabled(layer, enabled, self.view.zoom) {
            return false;
        }
        if enabled {
            self.view.active_layers.insert(layer);
            if layer_has_markers(layer) {
                self.dirty.insert(layer);
            }
        } else {
            self.view.active_layers.remove(&layer);
        }
        self.listeners.emit_toggle(layer, enabled);
        self.emit_state();
        self.request_rebuild();
        true
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        let zoom = ViewState::clamp_zoom(zoom);
        if zoom == self.view.zoom {
            return;
        }
        let before: Vec<LayerVisibility> = LayerKey::ALL.iter().map(|&l| self.visibility(l)).collect();
        self.view.zoom = zoom;
        self.backend.set_view(&self.view);

        let bucket_changed = self.update_bucket();
        let visibility_changed = LayerKey::ALL
            .iter()
            .zip(before)
            .any(|(&l, old)| self.visibility(l) != old);
        if bucket_changed || visibility_changed {
            self.request_rebuild();
        }
        self.request_overlay_sync();
        self.emit_state();
    }

    /// Feeds the zoom to the bucket tracker; a new bucket drops the cache.
    fn update_bucket(&mut self) -> bool {
        match self.buckets.update(self.view.zoom, &self.config.radius) {
            Some(bucket) => {
                debug!("Zoom bucket changed to {} at zoom {:.2}", bucket, self.view.zoom);
                self.cache.clear();
                self.dirty.extend(LayerKey::MARKER_LAYERS);
                true
            }
            None => false,
        }
    }

    /// Moves the camera without changing zoom: overlays only, no re-clustering.
    pub fn pan(&mut self, center: GeoPoint) {
        if !center.is_valid() {
            debug!("Ignoring pan to invalid center {:?}", center);
            return;
        }
        self.view.center = center;
        self.backend.set_view(&self.view);
        self.request_overlay_sync();
        self.emit_state();
    }

    pub fn set_view(&mut self, view: MapView) {
        self.view.apply_preset(view);
        self.backend.set_view(&self.view);
        self.update_bucket();
        self.request_rebuild();
        self.emit_state();
    }

    pub fn set_time_range(&mut self, range: TimeRange) {
        if range == self.view.time_range {
            return;
        }
        self.view.time_range = range;
        let now = self.ctx.system_time();
        for layer in LayerKey::MARKER_LAYERS {
            if layer.is_live_feed() {
                self.feeds.refilter(layer, range, now);
                self.dirty.insert(layer);
            }
        }
        self.render();
        self.emit_state();
    }

    /// Restores camera, layers and time range from URL query parameters.
    ///
    /// State listeners see one change for the whole restore.
    pub fn restore_from_query(&mut self, query: &str) -> Result<(), ViewStateError> {
        let target = ViewState::from_query(query, &self.view)?;
        self.batching_state = true;
        for layer in LayerKey::ALL {
            let enabled = target.active_layers.contains(&layer);
            if self.registry.is_enabled(layer) != enabled {
                self.toggle_layer(layer, enabled);
            }
        }
        self.view.active_view = target.active_view;
        self.view.center = target.center;
        self.set_time_range(target.time_range);
        self.set_zoom(target.zoom);
        self.backend.set_view(&self.view);
        self.request_rebuild();
        self.batching_state = false;
        self.emit_state();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Highlights
    // ------------------------------------------------------------------------

    pub fn highlight_assets(&mut self, asset_type: AssetType, ids: &[&str]) {
        self.highlights.highlight(asset_type, ids.iter().copied());
        self.render();
    }

    pub fn clear_highlights(&mut self, asset_type: AssetType) {
        self.highlights.clear(asset_type);
        self.render();
    }

    /// Highlights ids for the configured flash TTL.
    pub fn flash_assets(&mut self, asset_type: AssetType, ids: &[&str]) {
        let ttl = self.config.highlight_ttl();
        self.flash_assets_for(asset_type, ids, ttl);
    }

    pub fn flash_assets_for(&mut self, asset_type: AssetType, ids: &[&str], ttl: Duration) {
        if self.destroyed {
            return;
        }
        self.highlights.flash(asset_type, ids.iter().copied(), ttl, self.ctx.now());
        self.render();
    }

    // ------------------------------------------------------------------------
    // Popups
    // ------------------------------------------------------------------------

    fn popup_sources(&self) -> PopupSources<'_> {
        PopupSources {
            catalog: &self.catalog,
            markers: &self.feeds.filtered,
            flight_clusters: &self.feeds.flight_clusters,
            escalation: &self.escalation,
        }
    }

    /// Resolves a renderer hit and notifies popup listeners.
    ///
    /// Returns false when the hit resolves to nothing.
    pub fn handle_click(&mut self, layer_id: &str, hit: &Value, screen: Option<ScreenPoint>) -> bool {
        let Some(request) = self.popups.resolve(layer_id, hit, &self.popup_sources()) else {
            return false;
        };
        let event = self.popups.event(request, screen, &self.feeds.news);
        self.listeners.emit_popup(&event);
        true
    }

    /// Opens a popup by id (deep links, search results).
    pub fn trigger_popup(&mut self, target: &PopupTarget, mode: TriggerMode) -> bool {
        let event = self.popups.trigger(
            target,
            mode,
            &self.popup_sources(),
            self.backend.projector(),
            &self.feeds.news,
        );
        match event {
            Some(event) => {
                self.listeners.emit_popup(&event);
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------------

    /// Fires due timers: flash expiry, throttle/debounce windows, health checks.
    pub fn poll_timers(&mut self) {
        if self.destroyed {
            return;
        }
        let now = self.ctx.now();
        if self.highlights.expire(now) {
            self.render();
        }
        for event in self.scheduler.poll(now) {
            match event {
                SchedulerEvent::HealthCheckDue => {
                    if self.scheduler.check_health(&self.backend) == HealthOutcome::Recovering {
                        info!("Backing store diverged, recovery rebuild scheduled");
                    }
                }
            }
        }
    }

    pub fn wants_frame(&self) -> bool {
        !self.destroyed && self.scheduler.wants_frame()
    }

    /// Earliest armed timer deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        match (self.scheduler.next_deadline(), self.highlights.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Runs one animation frame. Returns the plan that ran, if any.
    pub fn on_animation_frame(&mut self) -> Option<FramePlan> {
        if self.destroyed {
            return None;
        }
        let plan = self.scheduler.begin_frame()?;
        if plan.full_rebuild || plan.prop_update {
            self.recompute_clusters();
            let layers = self.layer_frames();
            let populated: Vec<LayerKey> = layers
                .iter()
                .filter(|f| f.visibility.is_visible && f.drawn > 0)
                .map(|f| f.layer)
                .collect();
            let snapshot = FrameSnapshot {
                view: &self.view,
                catalog: &self.catalog,
                layers,
                highlights: self.current_highlights(),
                escalation: &self.escalation,
            };
            if plan.full_rebuild {
                self.backend.full_rebuild(&snapshot);
            } else {
                self.backend.push_props(&snapshot);
            }
            self.scheduler.record_rebuild(self.backend.epoch(), populated);
        }
        if plan.overlay_sync {
            let anchors = self.overlay_anchors();
            let overlay = OverlayFrame {
                view: &self.view,
                anchors,
                pulses: &self.pulses,
            };
            self.backend.sync_overlays(&overlay);
        }
        Some(plan)
    }

    /// Recomputes dirty, visible marker layers within the frame budget.
    ///
    /// Layers left over keep their previous clusters and get a continuation
    /// frame. At least one layer is recomputed per frame.
    fn recompute_clusters(&mut self) {
        let budget = FrameBudget::new(self.ctx.now(), self.config.scheduler.frame_budget());
        let bucket = self
            .buckets
            .current()
            .unwrap_or_else(|| self.config.radius.bucket_for(self.view.zoom));
        let radius = self.config.radius.radius_for_bucket(bucket);

        let pending: Vec<LayerKey> = self
            .dirty
            .iter()
            .copied()
            .filter(|&l| self.visibility(l).is_visible)
            .collect();
        let mut progressed = 0;
        for layer in pending {
            if progressed > 0 && budget.is_exhausted(self.ctx.now()) {
                break;
            }
            let clusters = self.compute_layer(layer, bucket, radius);
            self.layer_clusters.insert(layer, clusters);
            self.dirty.remove(&layer);
            progressed += 1;
        }

        let left: Vec<LayerKey> = self
            .dirty
            .iter()
            .copied()
            .filter(|&l| self.visibility(l).is_visible)
            .collect();
        if !left.is_empty() {
            warn!(
                "Frame budget exhausted after {:?}, {} layers deferred: {:?}",
                budget.elapsed(self.ctx.now()),
                left.len(),
                left
            );
            self.scheduler.request_continuation();
        }
    }

    fn compute_layer(&mut self, layer: LayerKey, bucket: usize, radius: f64) -> Arc<Vec<Cluster>> {
        let Some(markers) = self.feeds.filtered.get(&layer).cloned() else {
            return Arc::new(Vec::new());
        };
        let projector = self.backend.projector();
        match self.config.cluster_mode(layer) {
            ClusterMode::Off => Arc::new(cluster(&markers, 0.0, projector, None::<fn(&Marker) -> Option<&str>>)),
            ClusterMode::Radius { group_key } => {
                if let Some(hit) = self.cache.get(layer, bucket, &markers) {
                    return hit;
                }
                let clusters = cluster_with_strategy(&markers, radius, projector, group_key);
                debug!("Clustered {} {} markers into {} clusters", markers.len(), layer, clusters.len());
                self.cache.insert(layer, bucket, markers, clusters)
            }
            ClusterMode::Upstream => {
                Arc::new(upstream_clusters(&markers, &self.feeds.flight_clusters, radius > 0.0, projector))
            }
        }
    }

    fn static_count(&self, layer: LayerKey) -> usize {
        match layer {
            LayerKey::Hotspots => self.catalog.hotspots.len(),
            LayerKey::Conflicts => self.catalog.conflicts.len(),
            LayerKey::Bases => self.catalog.bases.len(),
            LayerKey::Nuclear => self.catalog.nuclear.len(),
            LayerKey::Cables => self.catalog.cables.len(),
            LayerKey::Pipelines => self.catalog.pipelines.len(),
            _ => 0,
        }
    }

    fn layer_frames(&self) -> Vec<LayerFrame> {
        let projector = self.backend.projector();
        LayerKey::ALL
            .iter()
            .map(|&layer| {
                let visibility = self.visibility(layer);
                let status = self.layer_status(layer);
                let clusters: Vec<Cluster> = match self.layer_clusters.get(&layer) {
                    Some(clusters) if visibility.is_visible => {
                        clusters.iter().filter_map(|c| c.reprojected(projector)).collect()
                    }
                    _ => Vec::new(),
                };
                let drawn = if !visibility.is_visible {
                    0
                } else if layer_has_markers(layer) {
                    clusters.len()
                } else {
                    self.static_count(layer)
                };
                LayerFrame {
                    layer,
                    visibility,
                    status,
                    clusters,
                    drawn,
                }
            })
            .collect()
    }

    fn overlay_anchors(&self) -> Vec<OverlayAnchor> {
        let projector = self.backend.projector();
        let mut anchors = Vec::new();
        if self.visibility(LayerKey::Hotspots).is_visible {
            for hotspot in &self.catalog.hotspots {
                if let Some(screen_pos) = projector.project(hotspot.lon, hotspot.lat) {
                    anchors.push(OverlayAnchor {
                        layer: LayerKey::Hotspots,
                        id: hotspot.id.clone(),
                        screen_pos,
                        count: 1,
                    });
                }
            }
        }
        for (&layer, clusters) in &self.layer_clusters {
            if !self.visibility(layer).is_visible {
                continue;
            }
            for c in clusters.iter().filter_map(|c| c.reprojected(projector)) {
                anchors.push(OverlayAnchor {
                    layer,
                    id: c.members.first().map(|m| m.id.clone()).unwrap_or_default(),
                    screen_pos: c.screen_pos,
                    count: c.len(),
                });
            }
        }
        anchors
    }

    fn current_highlights(&self) -> BTreeMap<AssetType, BTreeSet<String>> {
        let now = self.ctx.now();
        [
            AssetType::Pipeline,
            AssetType::Cable,
            AssetType::Datacenter,
            AssetType::Base,
            AssetType::Nuclear,
        ]
        .into_iter()
        .map(|t| (t, self.highlights.highlighted(t, now)))
        .filter(|(_, ids)| !ids.is_empty())
        .collect()
    }

    /// Clears every timer, listener and cache. Later calls are no-ops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.scheduler.destroy();
        self.highlights.destroy();
        self.listeners.clear();
        self.cache.clear();
        self.layer_clusters.clear();
        self.dirty.clear();
        self.destroyed = true;
        info!("Map core destroyed");
    }
}

fn layer_has_markers(layer: LayerKey) -> bool {
    LayerKey::MARKER_LAYERS.contains(&layer)
}

/// Turns the flight feed's own clusters into [`Cluster`]s.
///
/// Flights outside every upstream cluster stay single. With clustering
/// inactive at this zoom every flight is single.
fn upstream_clusters(
    flights: &[Marker],
    upstream: &[MilitaryFlightCluster],
    active: bool,
    projector: &dyn Projector,
) -> Vec<Cluster> {
    let mut clustered: BTreeSet<&str> = BTreeSet::new();
    let mut out = Vec::new();
    if active {
        for group in upstream {
            // A flight listed by several groups belongs to the first one.
            let members: Vec<Marker> = flights
                .iter()
                .filter(|f| !clustered.contains(f.id.as_str()))
                .filter(|f| group.flight_ids.iter().any(|id| *id == f.id))
                .cloned()
                .collect();
            if members.is_empty() {
                continue;
            }
            let centroid = GeoPoint::new(group.lat, group.lon);
            let Some(screen_pos) = projector
                .project_point(centroid)
                .or_else(|| members.iter().find_map(|m| projector.project(m.lon, m.lat)))
            else {
                continue;
            };
            clustered.extend(
                flights
                    .iter()
                    .filter(|f| members.iter().any(|m| m.id == f.id))
                    .map(|f| f.id.as_str()),
            );
            out.push(Cluster {
                members,
                centroid,
                screen_pos,
            });
        }
    }
    for flight in flights.iter().filter(|f| !clustered.contains(f.id.as_str())) {
        if let Some(screen_pos) = projector.project(flight.lon, flight.lat) {
            out.push(Cluster {
                members: vec![flight.clone()],
                centroid: flight.position(),
                screen_pos,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ConflictZone, Hotspot};
    use crate::popup::LayerId;
    use crate::projection::Equirectangular;
    use crate::scheduler::SchedulerConfig;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use worldview_env::ManualContext;

    #[derive(Default)]
    struct TestBackend {
        kind: BackendKind,
        projector: Option<Equirectangular>,
        rebuilds: usize,
        pushes: usize,
        overlay_syncs: usize,
        drawn: HashMap<LayerKey, usize>,
        epoch: u64,
    }

    impl TestBackend {
        fn new(kind: BackendKind) -> Self {
            Self {
                kind,
                ..Self::default()
            }
        }

        fn record(&mut self, frame: &FrameSnapshot<'_>) {
            self.drawn = frame.layers.iter().map(|l| (l.layer, l.drawn)).collect();
        }
    }

    fn off_world(_: f64, _: f64) -> Option<ScreenPoint> {
        None
    }

    static OFF_WORLD: fn(f64, f64) -> Option<ScreenPoint> = off_world;

    impl BackingStore for TestBackend {
        fn epoch(&self) -> u64 {
            self.epoch
        }

        fn is_layer_empty(&self, layer: LayerKey) -> bool {
            self.drawn.get(&layer).copied().unwrap_or(0) == 0
        }
    }

    impl RenderBackend for TestBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn projector(&self) -> &dyn Projector {
            self.projector
                .as_ref()
                .map(|p| p as &dyn Projector)
                .unwrap_or(&OFF_WORLD)
        }

        fn set_view(&mut self, view: &ViewState) {
            self.projector = Some(Equirectangular::for_view(view.center, view.zoom, 1280.0, 720.0));
        }

        fn full_rebuild(&mut self, frame: &FrameSnapshot<'_>) {
            self.rebuilds += 1;
            self.record(frame);
        }

        fn push_props(&mut self, frame: &FrameSnapshot<'_>) {
            self.pushes += 1;
            self.record(frame);
        }

        fn sync_overlays(&mut self, _overlay: &OverlayFrame<'_>) {
            self.overlay_syncs += 1;
        }
    }

    fn earthquake(id: &str, lat: f64, lon: f64) -> Earthquake {
        Earthquake {
            id: id.to_string(),
            lat,
            lon,
            magnitude: 5.1,
            depth_km: 10.0,
            place: "Offshore".to_string(),
            time: ManualContext::new().epoch(),
        }
    }

    fn catalog() -> ReferenceCatalog {
        ReferenceCatalog::new()
            .with_hotspots(vec![Hotspot {
                id: "kyiv".to_string(),
                name: "Kyiv".to_string(),
                lat: 50.45,
                lon: 30.52,
                keywords: vec!["kyiv".to_string(), "ukraine".to_string()],
                baseline_level: Default::default(),
                description: String::new(),
            }])
            .with_conflicts(vec![ConflictZone {
                id: "gaza".to_string(),
                name: "Gaza".to_string(),
                center: GeoPoint::new(31.4, 34.4),
                parties: vec![],
                casualties: None,
                description: String::new(),
            }])
    }

    fn core(kind: BackendKind) -> (Arc<ManualContext>, MapCore<ManualContext, TestBackend>) {
        let ctx = Arc::new(ManualContext::new());
        let core = MapCore::new(Arc::clone(&ctx), TestBackend::new(kind), MapConfig::default(), catalog()).unwrap();
        (ctx, core)
    }

    /// Runs every due timer and pending frame at the current time.
    fn settle(core: &mut MapCore<ManualContext, TestBackend>) {
        core.poll_timers();
        while core.on_animation_frame().is_some() {}
    }

    #[test]
    fn test_startup_schedules_one_rebuild() {
        let (_ctx, mut core) = core(BackendKind::Compositor);
        assert!(core.wants_frame());
        settle(&mut core);
        assert_eq!(core.backend().rebuilds, 1);
        assert_eq!(core.layer_status(LayerKey::Earthquakes), LayerDataStatus::Pending);
        assert_eq!(core.layer_status(LayerKey::Conflicts), LayerDataStatus::Ready { count: 1 });
    }

    #[test]
    fn test_setters_coalesce_into_one_frame() {
        let (_ctx, mut core) = core(BackendKind::Compositor);
        settle(&mut core);
        let before = core.scheduler_stats().frame_requests;
        for i in 0..50 {
            core.set_earthquakes(&[earthquake(&format!("q{}", i), 10.0, 20.0)]);
        }
        assert_eq!(core.scheduler_stats().frame_requests, before + 1);
        settle(&mut core);
        assert_eq!(core.backend().pushes, 1);
        assert_eq!(core.layer_status(LayerKey::Earthquakes), LayerDataStatus::Ready { count: 1 });
    }

    #[test]
    fn test_vector_backend_rebuilds_on_data() {
        let (_ctx, mut core) = core(BackendKind::Vector);
        settle(&mut core);
        core.set_earthquakes(&[earthquake("q1", 10.0, 20.0)]);
        settle(&mut core);
        assert_eq!(core.backend().rebuilds, 2);
        assert_eq!(core.backend().pushes, 0);
    }

    #[test]
    fn test_invalid_coordinates_filtered() {
        let (_ctx, mut core) = core(BackendKind::Compositor);
        core.set_earthquakes(&[earthquake("bad", 120.0, 0.0), earthquake("nan", f64::NAN, 0.0)]);
        assert_eq!(core.layer_status(LayerKey::Earthquakes), LayerDataStatus::Empty);
        core.set_earthquakes(&[]);
        assert_eq!(core.layer_status(LayerKey::Earthquakes), LayerDataStatus::Empty);
    }

    #[test]
    fn test_clusters_cached_across_pan() {
        let (_ctx, mut core) = core(BackendKind::Compositor);
        core.set_earthquakes(&[earthquake("a", 10.0, 20.0), earthquake("b", 10.1, 20.1), earthquake("c", -40.0, 150.0)]);
        settle(&mut core);
        let clusters = core.clusters(LayerKey::Earthquakes).unwrap();
        assert_eq!(clusters.len(), 2);

        core.pan(GeoPoint::new(0.0, 40.0));
        settle(&mut core);
        assert!(Arc::ptr_eq(&clusters, &core.clusters(LayerKey::Earthquakes).unwrap()));
        assert_eq!(core.backend().overlay_syncs, 1);
    }

    #[test]
    fn test_zoom_bucket_change_reclusters() {
        let (ctx, mut core) = core(BackendKind::Compositor);
        core.set_earthquakes(&[earthquake("a", 10.0, 20.0), earthquake("b", 10.5, 20.5)]);
        settle(&mut core);
        assert_eq!(core.clusters(LayerKey::Earthquakes).unwrap().len(), 1);

        core.set_zoom(8.0);
        ctx.advance(Duration::from_millis(150));
        settle(&mut core);
        assert_eq!(core.clusters(LayerKey::Earthquakes).unwrap().len(), 2);
    }

    #[test]
    fn test_toggle_emits_listeners_and_override() {
        let (ctx, mut core) = core(BackendKind::Compositor);
        settle(&mut core);
        let toggles = Rc::new(RefCell::new(Vec::new()));
        let states = Rc::new(RefCell::new(0));
        let t = Rc::clone(&toggles);
        core.on_layer_toggle(move |layer, enabled| t.borrow_mut().push((layer, enabled)));
        let s = Rc::clone(&states);
        core.on_state_change(move |_| *s.borrow_mut() += 1);

        // Datacenters auto-hide below zoom 5; enabling at zoom 1 overrides.
        assert!(core.toggle_layer(LayerKey::Datacenters, true));
        assert!(!core.toggle_layer(LayerKey::Datacenters, true));
        assert!(core.visibility(LayerKey::Datacenters).is_visible);
        assert_eq!(*toggles.borrow(), vec![(LayerKey::Datacenters, true)]);
        assert_eq!(*states.borrow(), 1);
        assert!(core.view().active_layers.contains(&LayerKey::Datacenters));

        ctx.advance(Duration::from_millis(150));
        settle(&mut core);
        assert_eq!(core.scheduler_stats().full_rebuilds, 2);
    }

    #[test]
    fn test_flash_expiry_requests_redraw() {
        let (ctx, mut core) = core(BackendKind::Compositor);
        settle(&mut core);
        core.flash_assets(AssetType::Cable, &["c1"]);
        assert!(core.is_highlighted(AssetType::Cable, "c1"));
        settle(&mut core);
        let pushes = core.backend().pushes;

        ctx.advance(Duration::from_millis(2999));
        core.poll_timers();
        assert!(core.is_highlighted(AssetType::Cable, "c1"));
        ctx.advance(Duration::from_millis(2));
        settle(&mut core);
        assert!(!core.is_highlighted(AssetType::Cable, "c1"));
        assert_eq!(core.backend().pushes, pushes + 1);
    }

    #[test]
    fn test_click_and_trigger_popup() {
        let (_ctx, mut core) = core(BackendKind::Compositor);
        let events = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&events);
        core.on_popup(move |event| e.borrow_mut().push(event.clone()));

        assert!(core.handle_click("conflict-zones-layer", &json!({ "properties": { "id": "gaza" } }), None));
        assert!(!core.handle_click("unknown-layer", &json!({ "id": "gaza" }), None));
        assert!(core.trigger_popup(&PopupTarget::new(LayerId::Hotspots, "kyiv"), TriggerMode::Strict));

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].popup_type, "conflict");
        assert_eq!(events[1].popup_type, "hotspot");
        assert!(events[1].screen_x.is_some());
    }

    #[test]
    fn test_news_updates_escalation() {
        let (ctx, mut core) = core(BackendKind::Compositor);
        let item = NewsItem {
            id: "n1".to_string(),
            title: "Air raid alert in Kyiv".to_string(),
            source: "wire".to_string(),
            published_at: ctx.system_time(),
            is_alert: true,
        };
        core.set_news(&[item]);
        let state = core.escalation("kyiv").unwrap();
        assert!(state.has_breaking);
        assert_eq!(state.level, crate::escalation::EscalationLevel::High);
        assert_eq!(core.pulse("kyiv").unwrap().matched_count, 1);
    }

    #[test]
    fn test_time_range_filters_live_markers() {
        let (ctx, mut core) = core(BackendKind::Compositor);
        let mut old = earthquake("old", 0.0, 0.0);
        old.time = ctx.system_time();
        ctx.advance(Duration::from_secs(3 * 3_600));
        let mut fresh = earthquake("fresh", 5.0, 5.0);
        fresh.time = ctx.system_time();
        core.set_earthquakes(&[old, fresh]);
        assert_eq!(core.layer_status(LayerKey::Earthquakes), LayerDataStatus::Ready { count: 2 });

        core.set_time_range(TimeRange::Hour);
        assert_eq!(core.layer_status(LayerKey::Earthquakes), LayerDataStatus::Ready { count: 1 });
        assert_eq!(core.view().time_range, TimeRange::Hour);
    }

    #[test]
    fn test_stale_store_recovers_once() {
        let (ctx, mut core) = core(BackendKind::Compositor);
        core.set_earthquakes(&[earthquake("a", 10.0, 20.0)]);
        settle(&mut core);
        core.backend_mut().drawn.clear();

        ctx.advance(Duration::from_secs(30));
        settle(&mut core);
        assert_eq!(core.scheduler_stats().recoveries, 1);
        assert_eq!(core.backend().rebuilds, 2);

        ctx.advance(Duration::from_secs(30));
        settle(&mut core);
        assert_eq!(core.scheduler_stats().recoveries, 1);
        assert_eq!(core.scheduler_stats().failed_recoveries, 0);
    }

    #[test]
    fn test_upstream_flight_clusters() {
        let (ctx, mut core) = core(BackendKind::Compositor);
        core.toggle_layer(LayerKey::Flights, true);
        let flight = |id: &str, lat: f64| MilitaryFlight {
            id: id.to_string(),
            callsign: id.to_uppercase(),
            lat,
            lon: 30.0,
            altitude_ft: 30_000.0,
            operator: "USAF".to_string(),
            aircraft_type: "KC-135".to_string(),
            last_seen: ctx.system_time(),
        };
        let group = MilitaryFlightCluster {
            id: "black-sea".to_string(),
            name: "Black Sea".to_string(),
            lat: 43.0,
            lon: 30.0,
            flight_ids: vec!["f1".to_string(), "f2".to_string()],
        };
        core.set_military_flights(&[flight("f1", 43.0), flight("f2", 43.2), flight("f3", 10.0)], &[group]);
        settle(&mut core);
        let clusters = core.clusters(LayerKey::Flights).unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].member_ids(), vec!["f1", "f2"]);
    }

    #[test]
    fn test_overlapping_upstream_groups_share_no_flight() {
        let (ctx, mut core) = core(BackendKind::Compositor);
        core.toggle_layer(LayerKey::Flights, true);
        let flight = |id: &str, lat: f64| MilitaryFlight {
            id: id.to_string(),
            callsign: id.to_uppercase(),
            lat,
            lon: 30.0,
            altitude_ft: 30_000.0,
            operator: "USAF".to_string(),
            aircraft_type: "KC-135".to_string(),
            last_seen: ctx.system_time(),
        };
        let group = |id: &str, ids: &[&str]| MilitaryFlightCluster {
            id: id.to_string(),
            name: id.to_string(),
            lat: 43.0,
            lon: 30.0,
            flight_ids: ids.iter().map(|s| s.to_string()).collect(),
        };
        core.set_military_flights(
            &[flight("f1", 43.0), flight("f2", 43.2), flight("f3", 43.4)],
            &[group("a", &["f1", "f2"]), group("b", &["f2", "f3"]), group("c", &["f1"])],
        );
        settle(&mut core);

        let clusters = core.clusters(LayerKey::Flights).unwrap();
        let mut ids: Vec<&str> = clusters.iter().flat_map(|c| c.member_ids()).collect();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].member_ids(), vec!["f1", "f2"]);
        assert_eq!(clusters[1].member_ids(), vec!["f3"]);
        ids.sort_unstable();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);
    }

    #[test]
    fn test_frame_pending_at_pause_draws_nothing() {
        let (_ctx, mut core) = core(BackendKind::Compositor);
        settle(&mut core);
        let rebuilds = core.backend().rebuilds;

        core.set_earthquakes(&[earthquake("q1", 10.0, 20.0)]);
        core.render();
        core.pause();
        assert!(core.on_animation_frame().is_none());
        assert!(!core.wants_frame());
        assert_eq!(core.backend().pushes, 0);
        assert_eq!(core.backend().rebuilds, rebuilds);

        core.resume();
        let plan = core.on_animation_frame().unwrap();
        assert!(plan.full_rebuild);
        assert!(core.on_animation_frame().is_none());
        assert_eq!(core.backend().rebuilds, rebuilds + 1);
        assert_eq!(core.backend().pushes, 0);
        assert_eq!(core.layer_status(LayerKey::Earthquakes), LayerDataStatus::Ready { count: 1 });
    }

    #[test]
    fn test_restore_emits_one_state_change() {
        let (_ctx, mut core) = core(BackendKind::Compositor);
        settle(&mut core);
        let states = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&states);
        core.on_state_change(move |view| s.borrow_mut().push(view.clone()));

        core.restore_from_query("view=mena&layers=protests,bases&timeRange=24h").unwrap();
        assert_eq!(states.borrow().len(), 1);
        assert_eq!(states.borrow()[0].active_view, MapView::Mena);
        assert_eq!(states.borrow()[0].time_range, TimeRange::Day);

        assert!(core.restore_from_query("zoom=abc").is_err());
        assert_eq!(states.borrow().len(), 1);
        core.pan(GeoPoint::new(10.0, 10.0));
        assert_eq!(states.borrow().len(), 2);
    }

    #[test]
    fn test_restore_from_query() {
        let (_ctx, mut core) = core(BackendKind::Compositor);
        core.restore_from_query("view=mena&layers=protests,bases&timeRange=24h").unwrap();
        assert_eq!(core.view().active_view, MapView::Mena);
        assert_eq!(core.view().zoom, 3.5);
        assert!(core.visibility(LayerKey::Bases).is_visible);
        assert!(!core.visibility(LayerKey::Hotspots).is_visible);
        assert!(core.restore_from_query("zoom=abc").is_err());
    }

    struct TickingContext {
        now_ns: AtomicU64,
    }

    #[async_trait::async_trait]
    impl MapContext for TickingContext {
        /// Every reading advances the clock by 5 ms.
        fn now(&self) -> Duration {
            Duration::from_nanos(self.now_ns.fetch_add(5_000_000, Ordering::SeqCst))
        }

        fn system_time(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_704_067_200)
        }

        async fn sleep(&self, duration: Duration) {
            self.now_ns.fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_frame_budget_defers_layers() {
        let ctx = Arc::new(TickingContext { now_ns: AtomicU64::new(0) });
        let config = MapConfig {
            scheduler: SchedulerConfig {
                frame_budget_ms: 1,
                ..SchedulerConfig::default()
            },
            ..MapConfig::default()
        };
        let mut core = MapCore::new(ctx, TestBackend::new(BackendKind::Compositor), config, catalog()).unwrap();
        core.toggle_layer(LayerKey::Vessels, true);
        core.toggle_layer(LayerKey::Outages, true);
        core.on_animation_frame();
        assert!(core.scheduler_stats().budget_overruns >= 1);
        assert!(core.wants_frame());
        while core.on_animation_frame().is_some() {}
        assert!(core.clusters(LayerKey::Vessels).is_some());
        assert!(core.clusters(LayerKey::Outages).is_some());
    }

    #[test]
    fn test_destroy_leaves_nothing_armed() {
        let (_ctx, mut core) = core(BackendKind::Compositor);
        core.on_popup(|_| {});
        core.on_state_change(|_| {});
        core.flash_assets(AssetType::Pipeline, &["p1"]);
        core.toggle_layer(LayerKey::Vessels, true);
        assert!(core.active_timers() >= 3);

        core.destroy();
        assert_eq!(core.active_timers(), 0);
        assert_eq!(core.listener_count(), 0);
        assert!(!core.wants_frame());
        core.set_earthquakes(&[earthquake("a", 1.0, 1.0)]);
        assert!(!core.wants_frame());
    }
}
