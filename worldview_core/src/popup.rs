//! Popup resolution: hit-tested render object + layer id -> typed payload.
//!
//! Renderers report hits as loose JSON objects, often carrying nothing but an
//! id (`{"properties":{"id":"gaza"}}`). Resolution always returns the full
//! record from the reference catalog or the live marker store, never the hit
//! object itself.

use crate::catalog::{
    path_anchor, Cable, ConflictZone, Datacenter, Hotspot, MilitaryBase, NuclearSite, Pipeline, ReferenceCatalog,
};
use crate::clustering::Cluster;
use crate::escalation::EscalationState;
use crate::feeds::{
    Earthquake, Marker, MarkerPayload, MilitaryFlight, MilitaryFlightCluster, NewsItem, Outage, Protest, Vessel,
};
use crate::layers::LayerKey;
use crate::projection::{GeoPoint, Projector, ScreenPoint};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// LAYER IDS
// ============================================================================

/// Renderer layer identifiers that can be hit-tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LayerId {
    Hotspots,
    ConflictZones,
    Bases,
    Nuclear,
    Cables,
    Pipelines,
    Datacenters,
    Earthquakes,
    Protests,
    ProtestClusters,
    Flights,
    FlightClusters,
    Vessels,
    Outages,
}

impl LayerId {
    pub const ALL: [LayerId; 14] = [
        LayerId::Hotspots,
        LayerId::ConflictZones,
        LayerId::Bases,
        LayerId::Nuclear,
        LayerId::Cables,
        LayerId::Pipelines,
        LayerId::Datacenters,
        LayerId::Earthquakes,
        LayerId::Protests,
        LayerId::ProtestClusters,
        LayerId::Flights,
        LayerId::FlightClusters,
        LayerId::Vessels,
        LayerId::Outages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerId::Hotspots => "hotspots-layer",
            LayerId::ConflictZones => "conflict-zones-layer",
            LayerId::Bases => "bases-layer",
            LayerId::Nuclear => "nuclear-layer",
            LayerId::Cables => "cables-layer",
            LayerId::Pipelines => "pipelines-layer",
            LayerId::Datacenters => "datacenters-layer",
            LayerId::Earthquakes => "earthquakes-layer",
            LayerId::Protests => "protests-layer",
            LayerId::ProtestClusters => "protest-clusters-layer",
            LayerId::Flights => "flights-layer",
            LayerId::FlightClusters => "flight-clusters-layer",
            LayerId::Vessels => "vessels-layer",
            LayerId::Outages => "outages-layer",
        }
    }

    /// Parses a renderer layer id; unmapped ids give `None`.
    pub fn parse(id: &str) -> Option<LayerId> {
        LayerId::ALL.iter().copied().find(|l| l.as_str() == id)
    }

    /// The toggleable layer this renderer layer belongs to.
    pub fn layer_key(&self) -> LayerKey {
        match self {
            LayerId::Hotspots => LayerKey::Hotspots,
            LayerId::ConflictZones => LayerKey::Conflicts,
            LayerId::Bases => LayerKey::Bases,
            LayerId::Nuclear => LayerKey::Nuclear,
            LayerId::Cables => LayerKey::Cables,
            LayerId::Pipelines => LayerKey::Pipelines,
            LayerId::Datacenters => LayerKey::Datacenters,
            LayerId::Earthquakes => LayerKey::Earthquakes,
            LayerId::Protests | LayerId::ProtestClusters => LayerKey::Protests,
            LayerId::Flights | LayerId::FlightClusters => LayerKey::Flights,
            LayerId::Vessels => LayerKey::Vessels,
            LayerId::Outages => LayerKey::Outages,
        }
    }

    /// Renderer layer drawing a clustered or single marker of `layer`.
    pub fn for_markers(layer: LayerKey, clustered: bool) -> Option<LayerId> {
        let id = match (layer, clustered) {
            (LayerKey::Protests, true) => LayerId::ProtestClusters,
            (LayerKey::Protests, false) => LayerId::Protests,
            (LayerKey::Flights, true) => LayerId::FlightClusters,
            (LayerKey::Flights, false) => LayerId::Flights,
            (LayerKey::Datacenters, _) => LayerId::Datacenters,
            (LayerKey::Earthquakes, _) => LayerId::Earthquakes,
            (LayerKey::Vessels, _) => LayerId::Vessels,
            (LayerKey::Outages, _) => LayerId::Outages,
            _ => return None,
        };
        Some(id)
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

/// A resolved popup payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum PopupRequest {
    Hotspot {
        hotspot: Hotspot,
        escalation: Option<EscalationState>,
    },
    Conflict(ConflictZone),
    Base(MilitaryBase),
    Nuclear(NuclearSite),
    Cable(Cable),
    Pipeline(Pipeline),
    Datacenter(Datacenter),
    DatacenterCluster(Vec<Datacenter>),
    Earthquake(Earthquake),
    Protest(Protest),
    ProtestCluster(Vec<Protest>),
    Flight(MilitaryFlight),
    FlightCluster {
        cluster: MilitaryFlightCluster,
        flights: Vec<MilitaryFlight>,
    },
    Vessel(Vessel),
    Outage(Outage),
    /// Cluster on a layer without a dedicated cluster popup
    MarkerCluster {
        layer: LayerKey,
        items: Vec<MarkerPayload>,
    },
}

impl PopupRequest {
    pub fn popup_type(&self) -> &'static str {
        match self {
            PopupRequest::Hotspot { .. } => "hotspot",
            PopupRequest::Conflict(_) => "conflict",
            PopupRequest::Base(_) => "base",
            PopupRequest::Nuclear(_) => "nuclear",
            PopupRequest::Cable(_) => "cable",
            PopupRequest::Pipeline(_) => "pipeline",
            PopupRequest::Datacenter(_) => "datacenter",
            PopupRequest::DatacenterCluster(_) => "datacenter_cluster",
            PopupRequest::Earthquake(_) => "earthquake",
            PopupRequest::Protest(_) => "protest",
            PopupRequest::ProtestCluster(_) => "protest_cluster",
            PopupRequest::Flight(_) => "military_flight",
            PopupRequest::FlightCluster { .. } => "military_flight_cluster",
            PopupRequest::Vessel(_) => "vessel",
            PopupRequest::Outage(_) => "outage",
            PopupRequest::MarkerCluster { .. } => "cluster",
        }
    }

    /// Geographic point the popup is anchored to.
    pub fn anchor(&self) -> Option<GeoPoint> {
        let point = match self {
            PopupRequest::Hotspot { hotspot, .. } => GeoPoint::new(hotspot.lat, hotspot.lon),
            PopupRequest::Conflict(c) => c.center,
            PopupRequest::Base(b) => GeoPoint::new(b.lat, b.lon),
            PopupRequest::Nuclear(n) => GeoPoint::new(n.lat, n.lon),
            PopupRequest::Cable(c) => return path_anchor(&c.path),
            PopupRequest::Pipeline(p) => return path_anchor(&p.path),
            PopupRequest::Datacenter(d) => GeoPoint::new(d.lat, d.lon),
            PopupRequest::DatacenterCluster(items) => items.first().map(|d| GeoPoint::new(d.lat, d.lon))?,
            PopupRequest::Earthquake(e) => GeoPoint::new(e.lat, e.lon),
            PopupRequest::Protest(p) => GeoPoint::new(p.lat, p.lon),
            PopupRequest::ProtestCluster(items) => items.first().map(|p| GeoPoint::new(p.lat, p.lon))?,
            PopupRequest::Flight(f) => GeoPoint::new(f.lat, f.lon),
            PopupRequest::FlightCluster { cluster, .. } => GeoPoint::new(cluster.lat, cluster.lon),
            PopupRequest::Vessel(v) => GeoPoint::new(v.lat, v.lon),
            PopupRequest::Outage(o) => GeoPoint::new(o.lat, o.lon),
            PopupRequest::MarkerCluster { items, .. } => items.first().map(payload_position)?,
        };
        Some(point)
    }

    /// Terms a related-news lookup matches headlines against.
    pub fn search_terms(&self) -> Vec<String> {
        match self {
            PopupRequest::Hotspot { hotspot, .. } => hotspot.keywords.clone(),
            PopupRequest::Conflict(c) => std::iter::once(c.name.clone()).chain(c.parties.iter().cloned()).collect(),
            PopupRequest::Base(b) => vec![b.name.clone()],
            PopupRequest::Nuclear(n) => vec![n.name.clone()],
            PopupRequest::Cable(c) => vec![c.name.clone()],
            PopupRequest::Pipeline(p) => vec![p.name.clone()],
            PopupRequest::Datacenter(d) => vec![d.name.clone(), d.operator.clone()],
            PopupRequest::Protest(p) => vec![p.city.clone(), p.country.clone()],
            PopupRequest::ProtestCluster(items) => items.first().map(|p| vec![p.city.clone()]).unwrap_or_default(),
            PopupRequest::Outage(o) => vec![o.country.clone()],
            _ => Vec::new(),
        }
    }
}

fn payload_position(payload: &MarkerPayload) -> GeoPoint {
    match payload {
        MarkerPayload::Earthquake(e) => GeoPoint::new(e.lat, e.lon),
        MarkerPayload::Protest(p) => GeoPoint::new(p.lat, p.lon),
        MarkerPayload::Flight(f) => GeoPoint::new(f.lat, f.lon),
        MarkerPayload::Vessel(v) => GeoPoint::new(v.lat, v.lon),
        MarkerPayload::Outage(o) => GeoPoint::new(o.lat, o.lon),
        MarkerPayload::Datacenter(d) => GeoPoint::new(d.lat, d.lon),
    }
}

/// Delivered to the popup-display collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupEvent {
    pub popup_type: &'static str,
    pub data: PopupRequest,
    pub screen_x: Option<f64>,
    pub screen_y: Option<f64>,
    pub related_items: Vec<NewsItem>,
}

/// Deep-link / search target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupTarget {
    pub layer: LayerId,
    pub id: String,
}

impl PopupTarget {
    pub fn new(layer: LayerId, id: impl Into<String>) -> Self {
        Self { layer, id: id.into() }
    }
}

/// Behavior of trigger-by-id when the entity does not project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    /// Show the popup without a screen position
    #[default]
    Lenient,
    /// Show nothing
    Strict,
}

// ============================================================================
// RELATED NEWS
// ============================================================================

/// Supplies related headlines when a popup is assembled.
pub trait RelatedNewsQuery {
    fn related(&self, request: &PopupRequest, news: &[NewsItem]) -> Vec<NewsItem>;
}

impl<F> RelatedNewsQuery for F
where
    F: Fn(&PopupRequest, &[NewsItem]) -> Vec<NewsItem>,
{
    fn related(&self, request: &PopupRequest, news: &[NewsItem]) -> Vec<NewsItem> {
        self(request, news)
    }
}

/// Case-insensitive headline match on the request's search terms.
#[derive(Debug, Clone, Copy)]
pub struct KeywordNews {
    pub limit: usize,
}

impl Default for KeywordNews {
    fn default() -> Self {
        Self { limit: 5 }
    }
}

impl RelatedNewsQuery for KeywordNews {
    fn related(&self, request: &PopupRequest, news: &[NewsItem]) -> Vec<NewsItem> {
        let terms: Vec<String> = request
            .search_terms()
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }
        news.iter()
            .filter(|item| {
                let title = item.title.to_lowercase();
                terms.iter().any(|t| title.contains(t.as_str()))
            })
            .take(self.limit)
            .cloned()
            .collect()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Everything a hit can be resolved against.
#[derive(Clone, Copy)]
pub struct PopupSources<'a> {
    pub catalog: &'a ReferenceCatalog,
    pub markers: &'a BTreeMap<LayerKey, Arc<[Marker]>>,
    pub flight_clusters: &'a [MilitaryFlightCluster],
    pub escalation: &'a BTreeMap<String, EscalationState>,
}

/// Id of a hit object: top-level `id` or `properties.id`.
pub fn hit_id(hit: &Value) -> Option<String> {
    let raw = hit.get("id").or_else(|| hit.pointer("/properties/id"))?;
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Member ids of a cluster hit (`members` as ids or objects with an id).
pub fn hit_members(hit: &Value) -> Vec<String> {
    hit.get("members")
        .or_else(|| hit.pointer("/properties/members"))
        .and_then(Value::as_array)
        .map(|members| {
            members
                .iter()
                .filter_map(|m| match m {
                    Value::String(s) => Some(s.clone()),
                    other => hit_id(other),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// The hit object a renderer reports for a drawn cluster.
pub fn cluster_hit(cluster: &Cluster) -> Value {
    json!({
        "id": cluster.members.first().map(|m| m.id.clone()),
        "members": cluster.member_ids(),
        "lat": cluster.centroid.lat,
        "lon": cluster.centroid.lon,
    })
}

pub struct PopupResolver {
    related: Box<dyn RelatedNewsQuery>,
}

impl Default for PopupResolver {
    fn default() -> Self {
        Self::new(KeywordNews::default())
    }
}

impl PopupResolver {
    pub fn new(related: impl RelatedNewsQuery + 'static) -> Self {
        Self {
            related: Box::new(related),
        }
    }

    /// Resolves a hit on `layer_id`. Unknown layers and ids give `None`.
    pub fn resolve(&self, layer_id: &str, hit: &Value, sources: &PopupSources<'_>) -> Option<PopupRequest> {
        let Some(layer) = LayerId::parse(layer_id) else {
            debug!("No popup for unmapped layer {}", layer_id);
            return None;
        };
        let request = self.resolve_layer(layer, hit, sources);
        if request.is_none() {
            debug!("Hit on {} did not resolve to a record", layer_id);
        }
        request
    }

    fn resolve_layer(&self, layer: LayerId, hit: &Value, sources: &PopupSources<'_>) -> Option<PopupRequest> {
        let catalog = sources.catalog;
        let members = hit_members(hit);

        match layer {
            LayerId::Hotspots => {
                let hotspot = catalog.hotspot(&hit_id(hit)?)?.clone();
                let escalation = sources.escalation.get(&hotspot.id).cloned();
                Some(PopupRequest::Hotspot { hotspot, escalation })
            }
            LayerId::ConflictZones => catalog.conflict(&hit_id(hit)?).cloned().map(PopupRequest::Conflict),
            LayerId::Bases => catalog.base(&hit_id(hit)?).cloned().map(PopupRequest::Base),
            LayerId::Nuclear => catalog.nuclear_site(&hit_id(hit)?).cloned().map(PopupRequest::Nuclear),
            LayerId::Cables => catalog.cable(&hit_id(hit)?).cloned().map(PopupRequest::Cable),
            LayerId::Pipelines => catalog.pipeline(&hit_id(hit)?).cloned().map(PopupRequest::Pipeline),
            LayerId::Datacenters if members.len() > 1 => {
                let items: Vec<Datacenter> = members.iter().filter_map(|id| catalog.datacenter(id).cloned()).collect();
                (!items.is_empty()).then_some(PopupRequest::DatacenterCluster(items))
            }
            LayerId::Datacenters => {
                let id = hit_id(hit).or_else(|| members.first().cloned())?;
                catalog.datacenter(&id).cloned().map(PopupRequest::Datacenter)
            }
            LayerId::ProtestClusters | LayerId::Protests if members.len() > 1 => {
                let items: Vec<Protest> = self
                    .payloads(LayerKey::Protests, &members, sources)
                    .into_iter()
                    .filter_map(|p| match p {
                        MarkerPayload::Protest(protest) => Some(protest),
                        _ => None,
                    })
                    .collect();
                (!items.is_empty()).then_some(PopupRequest::ProtestCluster(items))
            }
            LayerId::FlightClusters => {
                let id = hit_id(hit)?;
                let cluster = sources.flight_clusters.iter().find(|c| c.id == id)?.clone();
                let flights = self
                    .payloads(LayerKey::Flights, &cluster.flight_ids, sources)
                    .into_iter()
                    .filter_map(|p| match p {
                        MarkerPayload::Flight(flight) => Some(flight),
                        _ => None,
                    })
                    .collect();
                Some(PopupRequest::FlightCluster { cluster, flights })
            }
            LayerId::Earthquakes | LayerId::Vessels | LayerId::Outages | LayerId::Flights if members.len() > 1 => {
                let items = self.payloads(layer.layer_key(), &members, sources);
                (!items.is_empty()).then_some(PopupRequest::MarkerCluster {
                    layer: layer.layer_key(),
                    items,
                })
            }
            LayerId::Earthquakes
            | LayerId::Vessels
            | LayerId::Outages
            | LayerId::Flights
            | LayerId::Protests
            | LayerId::ProtestClusters => {
                let id = hit_id(hit).or_else(|| members.first().cloned())?;
                let payload = self.payloads(layer.layer_key(), &[id], sources).into_iter().next()?;
                Some(match payload {
                    MarkerPayload::Earthquake(e) => PopupRequest::Earthquake(e),
                    MarkerPayload::Protest(p) => PopupRequest::Protest(p),
                    MarkerPayload::Flight(f) => PopupRequest::Flight(f),
                    MarkerPayload::Vessel(v) => PopupRequest::Vessel(v),
                    MarkerPayload::Outage(o) => PopupRequest::Outage(o),
                    MarkerPayload::Datacenter(d) => PopupRequest::Datacenter(d),
                })
            }
        }
    }

    /// Marker payloads of `layer` for the given ids, in id order.
    fn payloads(&self, layer: LayerKey, ids: &[String], sources: &PopupSources<'_>) -> Vec<MarkerPayload> {
        let Some(markers) = sources.markers.get(&layer) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| markers.iter().find(|m| &m.id == id))
            .map(|m| (*m.payload).clone())
            .collect()
    }

    /// Wraps a resolved request for the popup listener.
    pub fn event(&self, request: PopupRequest, screen: Option<ScreenPoint>, news: &[NewsItem]) -> PopupEvent {
        let related_items = self.related.related(&request, news);
        PopupEvent {
            popup_type: request.popup_type(),
            screen_x: screen.map(|p| p.x),
            screen_y: screen.map(|p| p.y),
            related_items,
            data: request,
        }
    }

    /// Trigger-by-id: locate, project, then build the same event a click would.
    pub fn trigger(
        &self,
        target: &PopupTarget,
        mode: TriggerMode,
        sources: &PopupSources<'_>,
        projector: &dyn Projector,
        news: &[NewsItem],
    ) -> Option<PopupEvent> {
        let hit = json!({ "id": target.id });
        let request = self.resolve_layer(target.layer, &hit, sources)?;
        let screen = request.anchor().and_then(|p| projector.project_point(p));
        if screen.is_none() && mode == TriggerMode::Strict {
            debug!("Strict popup trigger for {} skipped: not projectable", target.id);
            return None;
        }
        Some(self.event(request, screen, news))
    }
}

impl std::fmt::Debug for PopupResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::{to_markers, Severity};
    use std::time::SystemTime;

    struct Fixture {
        catalog: ReferenceCatalog,
        markers: BTreeMap<LayerKey, Arc<[Marker]>>,
        flight_clusters: Vec<MilitaryFlightCluster>,
        escalation: BTreeMap<String, EscalationState>,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = ReferenceCatalog::new()
                .with_conflicts(vec![ConflictZone {
                    id: "gaza".to_string(),
                    name: "Gaza".to_string(),
                    center: GeoPoint::new(31.4, 34.4),
                    parties: vec!["Israel".to_string(), "Hamas".to_string()],
                    casualties: None,
                    description: "Ongoing conflict".to_string(),
                }])
                .with_pipelines(vec![Pipeline {
                    id: "nord".to_string(),
                    name: "Nord Stream".to_string(),
                    path: vec![GeoPoint::new(60.0, 28.0), GeoPoint::new(54.0, 13.0)],
                    commodity: "gas".to_string(),
                    status: "damaged".to_string(),
                }]);
            let protest = |id: &str, city: &str| Protest {
                id: id.to_string(),
                lat: 30.0,
                lon: 31.2,
                city: city.to_string(),
                country: "Egypt".to_string(),
                title: "March".to_string(),
                severity: Severity::Medium,
                time: SystemTime::UNIX_EPOCH,
            };
            let (protests, _) = to_markers(&[protest("p1", "Cairo"), protest("p2", "Cairo")]);
            let mut markers = BTreeMap::new();
            markers.insert(LayerKey::Protests, protests);
            Self {
                catalog,
                markers,
                flight_clusters: Vec::new(),
                escalation: BTreeMap::new(),
            }
        }

        fn sources(&self) -> PopupSources<'_> {
            PopupSources {
                catalog: &self.catalog,
                markers: &self.markers,
                flight_clusters: &self.flight_clusters,
                escalation: &self.escalation,
            }
        }
    }

    #[test]
    fn test_minimal_feature_resolves_full_record() {
        let fx = Fixture::new();
        let resolver = PopupResolver::default();
        let hit = json!({ "properties": { "id": "gaza" } });
        let request = resolver.resolve("conflict-zones-layer", &hit, &fx.sources()).unwrap();
        assert_eq!(request.popup_type(), "conflict");
        let PopupRequest::Conflict(zone) = request else {
            panic!("expected conflict popup");
        };
        assert_eq!(zone.name, "Gaza");
        assert_eq!(zone.parties.len(), 2);
        assert_eq!(zone.description, "Ongoing conflict");
    }

    #[test]
    fn test_unknown_layer_or_id() {
        let fx = Fixture::new();
        let resolver = PopupResolver::default();
        assert!(resolver.resolve("weather-layer", &json!({ "id": "gaza" }), &fx.sources()).is_none());
        assert!(resolver.resolve("conflict-zones-layer", &json!({ "id": "nowhere" }), &fx.sources()).is_none());
        assert!(resolver.resolve("conflict-zones-layer", &json!({}), &fx.sources()).is_none());
    }

    #[test]
    fn test_cluster_hit_resolves_members() {
        let fx = Fixture::new();
        let resolver = PopupResolver::default();
        let hit = json!({ "id": "p1", "members": ["p1", "p2"] });
        let request = resolver.resolve("protest-clusters-layer", &hit, &fx.sources()).unwrap();
        assert!(matches!(&request, PopupRequest::ProtestCluster(items) if items.len() == 2));

        let single = resolver.resolve("protests-layer", &json!({ "id": "p2" }), &fx.sources()).unwrap();
        assert_eq!(single.popup_type(), "protest");
    }

    #[test]
    fn test_related_news_injected() {
        let resolver = PopupResolver::new(KeywordNews { limit: 1 });
        let fx = Fixture::new();
        let request = resolver.resolve("conflict-zones-layer", &json!({ "id": "gaza" }), &fx.sources()).unwrap();
        let news = vec![
            NewsItem {
                id: "n1".to_string(),
                title: "Talks on GAZA ceasefire".to_string(),
                source: "wire".to_string(),
                published_at: SystemTime::UNIX_EPOCH,
                is_alert: false,
            },
            NewsItem {
                id: "n2".to_string(),
                title: "Hamas statement".to_string(),
                source: "wire".to_string(),
                published_at: SystemTime::UNIX_EPOCH,
                is_alert: false,
            },
        ];
        let event = resolver.event(request, Some(ScreenPoint::new(5.0, 6.0)), &news);
        assert_eq!(event.related_items.len(), 1);
        assert_eq!(event.related_items[0].id, "n1");
        assert_eq!((event.screen_x, event.screen_y), (Some(5.0), Some(6.0)));
    }

    #[test]
    fn test_trigger_modes() {
        let fx = Fixture::new();
        let resolver = PopupResolver::default();
        let nowhere = |_: f64, _: f64| -> Option<ScreenPoint> { None };
        let target = PopupTarget::new(LayerId::Pipelines, "nord");

        let lenient = resolver
            .trigger(&target, TriggerMode::Lenient, &fx.sources(), &nowhere, &[])
            .unwrap();
        assert_eq!(lenient.popup_type, "pipeline");
        assert_eq!(lenient.screen_x, None);

        assert!(resolver.trigger(&target, TriggerMode::Strict, &fx.sources(), &nowhere, &[]).is_none());

        let flat = |lon: f64, lat: f64| Some(ScreenPoint::new(lon, lat));
        let strict = resolver
            .trigger(&target, TriggerMode::Strict, &fx.sources(), &flat, &[])
            .unwrap();
        assert!(strict.screen_x.is_some());
    }

    #[test]
    fn test_layer_id_parse() {
        for layer in LayerId::ALL {
            assert_eq!(LayerId::parse(layer.as_str()), Some(layer));
        }
        assert_eq!(LayerId::parse("hotspots"), None);
        assert_eq!(LayerId::FlightClusters.layer_key(), LayerKey::Flights);
    }
}
