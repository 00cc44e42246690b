//! Recording render backend.
//!
//! Stands in for either renderer kind. It projects with Web Mercator, keeps
//! a backing store of per-layer drawn counts, and records what the core
//! asked it to draw so scenarios can compare runs.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use worldview_core::map::{FrameSnapshot, OverlayFrame};
use worldview_core::{AssetType, BackendKind, BackingStore, GeoPoint, LayerKey, Projector, RenderBackend, ViewState, WebMercator};

pub const VIEWPORT_WIDTH: f64 = 1280.0;
pub const VIEWPORT_HEIGHT: f64 = 720.0;

/// What one rebuild or prop push carried.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameRecord {
    pub full_rebuild: bool,
    pub drawn: BTreeMap<LayerKey, usize>,
    /// Cluster member ids per visible marker layer
    pub partitions: BTreeMap<LayerKey, Vec<Vec<String>>>,
    pub highlights: BTreeMap<AssetType, BTreeSet<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayRecord {
    pub center: GeoPoint,
    pub zoom: f64,
    pub anchors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendCounters {
    pub rebuilds: u64,
    pub prop_pushes: u64,
    pub overlay_syncs: u64,
}

pub struct RecordingBackend {
    kind: BackendKind,
    projector: WebMercator,
    epoch: u64,
    store: BTreeMap<LayerKey, usize>,
    /// While lost, draws leave the store empty (a dropped GPU context)
    context_lost: bool,
    counters: BackendCounters,
    last_frame: Option<FrameRecord>,
    last_overlay: Option<OverlayRecord>,
}

impl RecordingBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            projector: WebMercator::new(GeoPoint::new(0.0, 0.0), 1.0, VIEWPORT_WIDTH, VIEWPORT_HEIGHT),
            epoch: 0,
            store: BTreeMap::new(),
            context_lost: false,
            counters: BackendCounters::default(),
            last_frame: None,
            last_overlay: None,
        }
    }

    pub fn counters(&self) -> BackendCounters {
        self.counters
    }

    pub fn last_frame(&self) -> Option<&FrameRecord> {
        self.last_frame.as_ref()
    }

    pub fn last_overlay(&self) -> Option<&OverlayRecord> {
        self.last_overlay.as_ref()
    }

    pub fn drawn(&self, layer: LayerKey) -> usize {
        self.store.get(&layer).copied().unwrap_or(0)
    }

    /// Something outside the core rewrote the store (a style reload).
    pub fn mutate_externally(&mut self) {
        self.epoch += 1;
        debug!("Backing store mutated externally, epoch now {}", self.epoch);
    }

    /// Drops every drawn object and keeps dropping them until restored.
    pub fn lose_context(&mut self) {
        self.context_lost = true;
        self.store.clear();
    }

    pub fn restore_context(&mut self) {
        self.context_lost = false;
    }

    fn record(&mut self, frame: &FrameSnapshot<'_>, full_rebuild: bool) {
        let drawn: BTreeMap<LayerKey, usize> = frame.layers.iter().map(|l| (l.layer, l.drawn)).collect();
        let partitions = frame
            .layers
            .iter()
            .filter(|l| l.visibility.is_visible && !l.clusters.is_empty())
            .map(|l| {
                let members = l
                    .clusters
                    .iter()
                    .map(|c| c.members.iter().map(|m| m.id.clone()).collect())
                    .collect();
                (l.layer, members)
            })
            .collect();
        self.store = if self.context_lost { BTreeMap::new() } else { drawn.clone() };
        self.last_frame = Some(FrameRecord {
            full_rebuild,
            drawn,
            partitions,
            highlights: frame.highlights.clone(),
        });
    }
}

impl BackingStore for RecordingBackend {
    fn epoch(&self) -> u64 {
        self.epoch
    }

    fn is_layer_empty(&self, layer: LayerKey) -> bool {
        self.drawn(layer) == 0
    }
}

impl RenderBackend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn projector(&self) -> &dyn Projector {
        &self.projector
    }

    fn set_view(&mut self, view: &ViewState) {
        self.projector = WebMercator::new(view.center, view.zoom, VIEWPORT_WIDTH, VIEWPORT_HEIGHT);
    }

    fn full_rebuild(&mut self, frame: &FrameSnapshot<'_>) {
        self.counters.rebuilds += 1;
        self.record(frame, true);
    }

    fn push_props(&mut self, frame: &FrameSnapshot<'_>) {
        self.counters.prop_pushes += 1;
        self.record(frame, false);
    }

    fn sync_overlays(&mut self, overlay: &OverlayFrame<'_>) {
        self.counters.overlay_syncs += 1;
        self.last_overlay = Some(OverlayRecord {
            center: overlay.view.center,
            zoom: overlay.view.zoom,
            anchors: overlay.anchors.len(),
        });
    }
}
