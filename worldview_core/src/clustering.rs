//! The "CLUSTER" Engine - seed-anchored greedy screen-space clustering.
//!
//! Markers closer than a pixel radius on screen collapse into one cluster.
//! The pipeline is:
//! 1. Radius selection (zoom bucket step table with hysteresis)
//! 2. Greedy grouping (input order, seed-anchored radius test, group keys)
//! 3. Centroid (arithmetic mean coordinate, reprojected)
//!
//! Results are cached per `(layer, bucket)` and invalidated only on a bucket
//! change or a new marker array, so panning never re-clusters.

use crate::feeds::Marker;
use crate::layers::LayerKey;
use crate::projection::{GeoPoint, Projector, ScreenPoint};
use geo::{Centroid, MultiPoint, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// CLUSTER
// ============================================================================

/// A group of markers drawn as one symbol at the current zoom.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub members: Vec<Marker>,
    pub centroid: GeoPoint,
    pub screen_pos: ScreenPoint,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.members.len() == 1
    }

    /// Member ids in assignment order.
    pub fn member_ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.id.as_str()).collect()
    }

    /// Recomputes the screen position for a new view without touching membership.
    ///
    /// If the centroid no longer projects, the first projectable member is used.
    pub fn reprojected(&self, projector: &dyn Projector) -> Option<Cluster> {
        let screen_pos = projector.project_point(self.centroid).or_else(|| {
            self.members
                .iter()
                .find_map(|m| projector.project(m.lon, m.lat))
        })?;
        Some(Cluster {
            screen_pos,
            ..self.clone()
        })
    }
}

/// Which partition key a layer's markers are clustered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKeyStrategy {
    /// Ignore group keys; only distance matters
    #[default]
    None,
    /// Use the marker's own `group_key`
    Marker,
}

fn marker_group_key(marker: &Marker) -> Option<&str> {
    marker.group_key.as_deref()
}

impl GroupKeyStrategy {
    pub fn key_fn(&self) -> Option<fn(&Marker) -> Option<&str>> {
        match self {
            GroupKeyStrategy::None => None,
            GroupKeyStrategy::Marker => Some(marker_group_key as fn(&Marker) -> Option<&str>),
        }
    }
}

/// Arithmetic mean geographic coordinate of the members.
fn mean_position(members: &[Marker]) -> Option<GeoPoint> {
    let points: MultiPoint<f64> = members
        .iter()
        .map(|m| Point::new(m.lon, m.lat))
        .collect();
    points.centroid().map(|c| GeoPoint::new(c.y(), c.x()))
}

/// Greedy single-link clustering anchored on each cluster's seed.
///
/// Markers are visited in input order. Each unassigned marker that projects
/// becomes a seed; every later unassigned marker whose group key matches the
/// seed's and whose projected distance to the *seed* is within
/// `pixel_radius` joins it. Markers that do not project are dropped from the
/// pass. Identical input, radius and projector always give identical
/// partitions.
///
/// # Arguments
/// * `markers` - Markers in feed order
/// * `pixel_radius` - Join distance in pixels (0 disables merging)
/// * `projector` - Backend projection for the current view
/// * `group_key` - Optional partition key; `None` ignores keys
pub fn cluster<F>(
    markers: &[Marker],
    pixel_radius: f64,
    projector: &dyn Projector,
    group_key: Option<F>,
) -> Vec<Cluster>
where
    F: Fn(&Marker) -> Option<&str>,
{
    let projected: Vec<Option<ScreenPoint>> = markers
        .iter()
        .map(|m| projector.project(m.lon, m.lat))
        .collect();
    let mut assigned = vec![false; markers.len()];
    let mut clusters = Vec::new();

    for seed_idx in 0..markers.len() {
        if assigned[seed_idx] {
            continue;
        }
        let Some(seed_pos) = projected[seed_idx] else {
            continue;
        };
        assigned[seed_idx] = true;

        let seed_key = group_key.as_ref().map(|f| f(&markers[seed_idx]));
        let mut members = vec![markers[seed_idx].clone()];

        if pixel_radius > 0.0 {
            for idx in (seed_idx + 1)..markers.len() {
                if assigned[idx] {
                    continue;
                }
                let Some(pos) = projected[idx] else {
                    continue;
                };
                if let (Some(f), Some(key)) = (group_key.as_ref(), seed_key) {
                    if f(&markers[idx]) != key {
                        continue;
                    }
                }
                if pos.distance(&seed_pos) <= pixel_radius {
                    assigned[idx] = true;
                    members.push(markers[idx].clone());
                }
            }
        }

        let centroid = mean_position(&members).unwrap_or_else(|| markers[seed_idx].position());
        let screen_pos = projector.project_point(centroid).unwrap_or(seed_pos);
        clusters.push(Cluster {
            members,
            centroid,
            screen_pos,
        });
    }

    clusters
}

/// Convenience wrapper choosing the key function from a strategy.
pub fn cluster_with_strategy(
    markers: &[Marker],
    pixel_radius: f64,
    projector: &dyn Projector,
    strategy: GroupKeyStrategy,
) -> Vec<Cluster> {
    cluster(markers, pixel_radius, projector, strategy.key_fn())
}

// ============================================================================
// RADIUS POLICY
// ============================================================================

/// One step of the radius table: from `min_zoom` upward use `radius_px`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusStep {
    pub min_zoom: f64,
    pub radius_px: f64,
}

/// Zoom-bucketed clustering radius.
///
/// Steps are sorted by `min_zoom`; the radius never grows as zoom increases,
/// so zooming out never shrinks clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiusPolicy {
    pub steps: Vec<RadiusStep>,
}

impl Default for RadiusPolicy {
    fn default() -> Self {
        let steps = [(0.0, 40.0), (2.0, 32.0), (3.0, 24.0), (4.0, 16.0), (5.0, 10.0), (7.0, 0.0)]
            .into_iter()
            .map(|(min_zoom, radius_px)| RadiusStep { min_zoom, radius_px })
            .collect();
        Self { steps }
    }
}

impl RadiusPolicy {
    /// Checks ordering and monotonicity. Returns a description of the first problem.
    pub fn check(&self) -> Result<(), String> {
        if self.steps.is_empty() {
            return Err("radius table is empty".to_string());
        }
        for step in &self.steps {
            if !step.min_zoom.is_finite() || !step.radius_px.is_finite() || step.radius_px < 0.0 {
                return Err(format!("invalid radius step {:?}", step));
            }
        }
        for pair in self.steps.windows(2) {
            if pair[1].min_zoom <= pair[0].min_zoom {
                return Err(format!(
                    "min_zoom must increase ({} then {})",
                    pair[0].min_zoom, pair[1].min_zoom
                ));
            }
            if pair[1].radius_px > pair[0].radius_px {
                return Err(format!(
                    "radius must not grow with zoom ({}px at {} then {}px at {})",
                    pair[0].radius_px, pair[0].min_zoom, pair[1].radius_px, pair[1].min_zoom
                ));
            }
        }
        Ok(())
    }

    pub fn bucket_count(&self) -> usize {
        self.steps.len()
    }

    /// Raw bucket for a zoom (zooms below the first step use bucket 0).
    pub fn bucket_for(&self, zoom: f64) -> usize {
        self.steps
            .iter()
            .rposition(|s| zoom >= s.min_zoom)
            .unwrap_or(0)
    }

    pub fn radius_for_bucket(&self, bucket: usize) -> f64 {
        self.steps
            .get(bucket.min(self.steps.len().saturating_sub(1)))
            .map(|s| s.radius_px)
            .unwrap_or(0.0)
    }

    pub fn radius_for_zoom(&self, zoom: f64) -> f64 {
        self.radius_for_bucket(self.bucket_for(zoom))
    }
}

/// Tracks the current zoom bucket with hysteresis.
///
/// The bucket only changes once zoom has moved `hysteresis` past a boundary,
/// so jitter around a boundary does not thrash the cluster cache.
#[derive(Debug, Clone)]
pub struct ZoomBucketTracker {
    last_bucket: Option<usize>,
    hysteresis: f64,
}

impl ZoomBucketTracker {
    pub fn new(hysteresis: f64) -> Self {
        Self {
            last_bucket: None,
            hysteresis: hysteresis.max(0.0),
        }
    }

    pub fn current(&self) -> Option<usize> {
        self.last_bucket
    }

    /// Feeds a new zoom. Returns `Some(bucket)` when the bucket changed.
    pub fn update(&mut self, zoom: f64, policy: &RadiusPolicy) -> Option<usize> {
        let Some(last) = self.last_bucket else {
            let bucket = policy.bucket_for(zoom);
            self.last_bucket = Some(bucket);
            return Some(bucket);
        };
        let zoomed_in = policy.bucket_for(zoom - self.hysteresis);
        let zoomed_out = policy.bucket_for(zoom + self.hysteresis);
        let next = if zoomed_in > last {
            zoomed_in
        } else if zoomed_out < last {
            zoomed_out
        } else {
            last
        };
        if next != last {
            self.last_bucket = Some(next);
            Some(next)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.last_bucket = None;
    }
}

// ============================================================================
// CLUSTER CACHE
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    source: Arc<[Marker]>,
    clusters: Arc<Vec<Cluster>>,
}

/// Clustering results keyed by `(layer, radius bucket)`.
#[derive(Debug, Clone, Default)]
pub struct ClusterCache {
    entries: HashMap<(LayerKey, usize), CacheEntry>,
    hits: u64,
    misses: u64,
}

impl ClusterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached clusters, provided they were computed from this exact marker array.
    pub fn get(&mut self, layer: LayerKey, bucket: usize, source: &Arc<[Marker]>) -> Option<Arc<Vec<Cluster>>> {
        match self.entries.get(&(layer, bucket)) {
            Some(entry) if Arc::ptr_eq(&entry.source, source) => {
                self.hits += 1;
                Some(Arc::clone(&entry.clusters))
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    /// Any cached clusters for the layer, regardless of bucket or source.
    pub fn stale(&self, layer: LayerKey) -> Option<Arc<Vec<Cluster>>> {
        self.entries
            .iter()
            .find(|((l, _), _)| *l == layer)
            .map(|(_, e)| Arc::clone(&e.clusters))
    }

    pub fn insert(&mut self, layer: LayerKey, bucket: usize, source: Arc<[Marker]>, clusters: Vec<Cluster>) -> Arc<Vec<Cluster>> {
        let clusters = Arc::new(clusters);
        self.entries.retain(|(l, _), _| *l != layer);
        self.entries.insert(
            (layer, bucket),
            CacheEntry {
                source,
                clusters: Arc::clone(&clusters),
            },
        );
        clusters
    }

    /// Drops one layer's entries (its marker array was replaced).
    pub fn invalidate_layer(&mut self, layer: LayerKey) {
        self.entries.retain(|(l, _), _| *l != layer);
    }

    /// Drops everything (zoom bucket boundary crossed).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn hit_stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::MarkerPayload;
    use crate::feeds::{Earthquake, IntoMarker};
    use approx::assert_relative_eq;
    use std::time::SystemTime;

    /// 1 degree = 1 pixel, north up.
    fn flat(lon: f64, lat: f64) -> Option<ScreenPoint> {
        (lon.is_finite() && lat.is_finite() && lat.abs() <= 90.0).then(|| ScreenPoint::new(lon, -lat))
    }

    fn m(id: &str, lat: f64, lon: f64, key: Option<&str>) -> Marker {
        let mut marker = Earthquake {
            id: id.to_string(),
            lat,
            lon,
            magnitude: 4.0,
            depth_km: 5.0,
            place: String::new(),
            time: SystemTime::UNIX_EPOCH,
        }
        .to_marker();
        marker.group_key = key.map(str::to_string);
        marker
    }

    fn partitions(clusters: &[Cluster]) -> Vec<Vec<String>> {
        clusters
            .iter()
            .map(|c| c.members.iter().map(|m| m.id.clone()).collect())
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let out = cluster_with_strategy(&[], 20.0, &flat, GroupKeyStrategy::None);
        assert!(out.is_empty());
    }

    #[test]
    fn test_seed_anchored_not_chained() {
        // b is within 10px of a, c is within 10px of b but 16px from a.
        let markers = vec![m("a", 0.0, 0.0, None), m("b", 0.0, 8.0, None), m("c", 0.0, 16.0, None)];
        let out = cluster_with_strategy(&markers, 10.0, &flat, GroupKeyStrategy::None);
        assert_eq!(partitions(&out), vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn test_centroid_is_mean_coordinate() {
        let markers = vec![m("a", 0.0, 0.0, None), m("b", 2.0, 4.0, None)];
        let out = cluster_with_strategy(&markers, 10.0, &flat, GroupKeyStrategy::None);
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].centroid.lat, 1.0, epsilon = 1e-9);
        assert_relative_eq!(out[0].centroid.lon, 2.0, epsilon = 1e-9);
        assert_eq!(out[0].screen_pos, ScreenPoint::new(2.0, -1.0));
    }

    #[test]
    fn test_group_keys_never_merge() {
        let markers = vec![
            m("cairo-1", 30.0, 31.0, Some("Cairo")),
            m("giza-1", 30.0, 31.0, Some("Giza")),
            m("cairo-2", 30.0, 31.0, Some("Cairo")),
        ];
        let out = cluster_with_strategy(&markers, 50.0, &flat, GroupKeyStrategy::Marker);
        assert_eq!(partitions(&out), vec![vec!["cairo-1", "cairo-2"], vec!["giza-1"]]);
    }

    #[test]
    fn test_same_key_far_apart_stays_separate() {
        let markers = vec![m("a", 0.0, 0.0, Some("X")), m("b", 0.0, 100.0, Some("X"))];
        let out = cluster_with_strategy(&markers, 10.0, &flat, GroupKeyStrategy::Marker);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_zero_radius_gives_singletons() {
        let markers = vec![m("a", 0.0, 0.0, None), m("b", 0.0, 0.0, None)];
        let out = cluster_with_strategy(&markers, 0.0, &flat, GroupKeyStrategy::None);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(Cluster::is_single));
    }

    #[test]
    fn test_unprojectable_markers_dropped() {
        let projector = |lon: f64, lat: f64| if lon > 100.0 { None } else { flat(lon, lat) };
        let markers = vec![m("off", 0.0, 120.0, None), m("a", 0.0, 0.0, None), m("b", 0.0, 1.0, None)];
        let out = cluster_with_strategy(&markers, 5.0, &projector, GroupKeyStrategy::None);
        assert_eq!(partitions(&out), vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_centroid_reprojection_fallback() {
        // Centroid at lon 100 is unprojectable -> falls back to seed position.
        let projector = |lon: f64, lat: f64| if (lon - 100.0).abs() < 1e-9 { None } else { flat(lon, lat) };
        let markers = vec![m("a", 0.0, 99.0, None), m("b", 0.0, 101.0, None)];
        let out = cluster_with_strategy(&markers, 5.0, &projector, GroupKeyStrategy::None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].screen_pos, ScreenPoint::new(99.0, -0.0));
    }

    #[test]
    fn test_radius_policy_default_is_valid() {
        let policy = RadiusPolicy::default();
        assert!(policy.check().is_ok());
        assert_eq!(policy.radius_for_zoom(-1.0), 40.0);
        assert_eq!(policy.radius_for_zoom(3.5), 24.0);
        assert_eq!(policy.radius_for_zoom(12.0), 0.0);
    }

    #[test]
    fn test_radius_policy_rejects_growth() {
        let policy = RadiusPolicy {
            steps: vec![
                RadiusStep { min_zoom: 0.0, radius_px: 10.0 },
                RadiusStep { min_zoom: 3.0, radius_px: 20.0 },
            ],
        };
        assert!(policy.check().is_err());
    }

    #[test]
    fn test_bucket_hysteresis() {
        let policy = RadiusPolicy::default();
        let mut tracker = ZoomBucketTracker::new(0.1);
        assert_eq!(tracker.update(2.5, &policy), Some(1));
        // Jitter around the 3.0 boundary does not flip the bucket.
        assert_eq!(tracker.update(3.05, &policy), None);
        assert_eq!(tracker.update(2.95, &policy), None);
        assert_eq!(tracker.update(3.15, &policy), Some(2));
        assert_eq!(tracker.update(2.95, &policy), None);
        assert_eq!(tracker.update(2.85, &policy), Some(1));
    }

    #[test]
    fn test_cache_keyed_by_source_identity() {
        let markers: Arc<[Marker]> = vec![m("a", 0.0, 0.0, None)].into();
        let mut cache = ClusterCache::new();
        let clusters = cluster_with_strategy(&markers, 10.0, &flat, GroupKeyStrategy::None);
        cache.insert(LayerKey::Earthquakes, 1, Arc::clone(&markers), clusters);
        assert!(cache.get(LayerKey::Earthquakes, 1, &markers).is_some());
        assert!(cache.get(LayerKey::Earthquakes, 2, &markers).is_none());

        // Same contents, new array: a miss.
        let replaced: Arc<[Marker]> = markers.to_vec().into();
        assert!(cache.get(LayerKey::Earthquakes, 1, &replaced).is_none());
        assert_eq!(cache.hit_stats(), (1, 2));
        assert!(cache.stale(LayerKey::Earthquakes).is_some());
        cache.invalidate_layer(LayerKey::Earthquakes);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reprojected_keeps_membership() {
        let markers = vec![m("a", 0.0, 0.0, None), m("b", 0.0, 2.0, None)];
        let out = cluster_with_strategy(&markers, 5.0, &flat, GroupKeyStrategy::None);
        let shifted = |lon: f64, lat: f64| flat(lon, lat).map(|p| ScreenPoint::new(p.x + 100.0, p.y));
        let moved = out[0].reprojected(&shifted).unwrap();
        assert_eq!(moved.member_ids(), vec!["a", "b"]);
        assert_relative_eq!(moved.screen_pos.x, 101.0, epsilon = 1e-9);
        assert!(matches!(&*moved.members[0].payload, MarkerPayload::Earthquake(_)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn markers_strategy() -> impl Strategy<Value = Vec<Marker>> {
            prop::collection::vec((-60.0f64..60.0, -170.0f64..170.0, prop::option::of(0u8..3)), 0..40).prop_map(|points| {
                points
                    .into_iter()
                    .enumerate()
                    .map(|(i, (lat, lon, key))| {
                        let key = key.map(|k| format!("k{}", k));
                        m(&format!("m{}", i), lat, lon, key.as_deref())
                    })
                    .collect()
            })
        }

        proptest! {
            #[test]
            fn test_clustering_is_deterministic(markers in markers_strategy(), radius in 0.0f64..50.0) {
                let a = cluster_with_strategy(&markers, radius, &flat, GroupKeyStrategy::Marker);
                let b = cluster_with_strategy(&markers, radius, &flat, GroupKeyStrategy::Marker);
                prop_assert_eq!(partitions(&a), partitions(&b));
            }

            #[test]
            fn test_every_marker_assigned_once(markers in markers_strategy(), radius in 0.0f64..50.0) {
                let out = cluster_with_strategy(&markers, radius, &flat, GroupKeyStrategy::None);
                let mut ids: Vec<String> = partitions(&out).into_iter().flatten().collect();
                ids.sort();
                let mut expected: Vec<String> = markers.iter().map(|m| m.id.clone()).collect();
                expected.sort();
                prop_assert_eq!(ids, expected);
            }

            #[test]
            fn test_clusters_never_mix_group_keys(markers in markers_strategy(), radius in 0.0f64..80.0) {
                let out = cluster_with_strategy(&markers, radius, &flat, GroupKeyStrategy::Marker);
                for c in &out {
                    let key = &c.members[0].group_key;
                    prop_assert!(c.members.iter().all(|m| &m.group_key == key));
                }
            }

            #[test]
            fn test_members_within_radius_of_seed(markers in markers_strategy(), radius in 0.0f64..50.0) {
                let out = cluster_with_strategy(&markers, radius, &flat, GroupKeyStrategy::None);
                for c in &out {
                    let seed = flat(c.members[0].lon, c.members[0].lat).unwrap();
                    for member in &c.members[1..] {
                        let pos = flat(member.lon, member.lat).unwrap();
                        prop_assert!(pos.distance(&seed) <= radius + 1e-9);
                    }
                }
            }

            #[test]
            fn test_radius_never_grows_with_zoom(a in 0.0f64..12.0, b in 0.0f64..12.0) {
                let policy = RadiusPolicy::default();
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                prop_assert!(policy.radius_for_zoom(hi) <= policy.radius_for_zoom(lo));
            }
        }
    }
}
