//! Typed feed records and their conversion into clusterable markers.
//!
//! The data-loading collaborators hand the core already-parsed collections;
//! this module defines those records and the [`Marker`] unit every clustering
//! pass works on.

use crate::catalog::Datacenter;
use crate::projection::GeoPoint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Severity used by protest and outage feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Earthquake {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub magnitude: f64,
    pub depth_km: f64,
    pub place: String,
    pub time: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protest {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub city: String,
    pub country: String,
    pub title: String,
    pub severity: Severity,
    pub time: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilitaryFlight {
    pub id: String,
    pub callsign: String,
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: f64,
    pub operator: String,
    pub aircraft_type: String,
    pub last_seen: SystemTime,
}

/// A group of flights clustered upstream by the flight-tracking feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilitaryFlightCluster {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub flight_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    /// MMSI
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub vessel_type: String,
    pub last_seen: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outage {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    pub title: String,
    pub severity: Severity,
    pub time: SystemTime,
}

/// A news headline, input to escalation scoring and related-news lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub source: String,
    pub published_at: SystemTime,
    /// Set by the upstream classifier for breaking/alert items
    pub is_alert: bool,
}

// ============================================================================
// MARKERS
// ============================================================================

/// The record a marker stands for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum MarkerPayload {
    Earthquake(Earthquake),
    Protest(Protest),
    Flight(MilitaryFlight),
    Vessel(Vessel),
    Outage(Outage),
    Datacenter(Datacenter),
}

/// The unit of clustering.
///
/// Immutable per update cycle: a feed refresh replaces the layer's whole
/// marker array.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    /// Partition key; markers with different keys never share a cluster
    pub group_key: Option<String>,
    /// Observation time for live feeds, `None` for reference data
    pub observed_at: Option<SystemTime>,
    pub payload: Arc<MarkerPayload>,
}

impl Marker {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// Conversion of a feed record into a marker.
pub trait IntoMarker {
    fn to_marker(&self) -> Marker;
}

fn marker(
    id: &str,
    lat: f64,
    lon: f64,
    group_key: Option<&str>,
    observed_at: Option<SystemTime>,
    payload: MarkerPayload,
) -> Marker {
    Marker {
        id: id.to_string(),
        lat,
        lon,
        group_key: group_key.map(str::to_string),
        observed_at,
        payload: Arc::new(payload),
    }
}

impl IntoMarker for Earthquake {
    fn to_marker(&self) -> Marker {
        marker(&self.id, self.lat, self.lon, None, Some(self.time), MarkerPayload::Earthquake(self.clone()))
    }
}

impl IntoMarker for Protest {
    fn to_marker(&self) -> Marker {
        // Protests in the same city collapse together; different cities never do.
        marker(&self.id, self.lat, self.lon, Some(&self.city), Some(self.time), MarkerPayload::Protest(self.clone()))
    }
}

impl IntoMarker for MilitaryFlight {
    fn to_marker(&self) -> Marker {
        marker(&self.id, self.lat, self.lon, None, Some(self.last_seen), MarkerPayload::Flight(self.clone()))
    }
}

impl IntoMarker for Vessel {
    fn to_marker(&self) -> Marker {
        marker(&self.id, self.lat, self.lon, None, Some(self.last_seen), MarkerPayload::Vessel(self.clone()))
    }
}

impl IntoMarker for Outage {
    fn to_marker(&self) -> Marker {
        marker(&self.id, self.lat, self.lon, Some(&self.country), Some(self.time), MarkerPayload::Outage(self.clone()))
    }
}

impl IntoMarker for Datacenter {
    fn to_marker(&self) -> Marker {
        marker(&self.id, self.lat, self.lon, Some(&self.country), None, MarkerPayload::Datacenter(self.clone()))
    }
}

/// Converts a feed collection into a marker array, dropping entries with
/// malformed coordinates.
///
/// Returns the markers and the number of dropped records.
pub fn to_markers<T: IntoMarker>(records: &[T]) -> (Arc<[Marker]>, usize) {
    let mut dropped = 0;
    let markers: Vec<Marker> = records
        .iter()
        .map(IntoMarker::to_marker)
        .filter(|m| {
            let ok = m.position().is_valid();
            if !ok {
                dropped += 1;
            }
            ok
        })
        .collect();
    (markers.into(), dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quake(id: &str, lat: f64, lon: f64) -> Earthquake {
        Earthquake {
            id: id.to_string(),
            lat,
            lon,
            magnitude: 5.1,
            depth_km: 10.0,
            place: "Offshore".to_string(),
            time: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_to_markers_drops_malformed() {
        let records = vec![quake("a", 10.0, 20.0), quake("b", f64::NAN, 0.0), quake("c", 95.0, 0.0)];
        let (markers, dropped) = to_markers(&records);
        assert_eq!(markers.len(), 1);
        assert_eq!(dropped, 2);
        assert_eq!(markers[0].id, "a");
        assert!(markers[0].group_key.is_none());
    }

    #[test]
    fn test_protest_groups_by_city() {
        let protest = Protest {
            id: "p1".to_string(),
            lat: 30.0,
            lon: 31.2,
            city: "Cairo".to_string(),
            country: "Egypt".to_string(),
            title: "March".to_string(),
            severity: Severity::Medium,
            time: SystemTime::UNIX_EPOCH,
        };
        let m = protest.to_marker();
        assert_eq!(m.group_key.as_deref(), Some("Cairo"));
        assert!(matches!(&*m.payload, MarkerPayload::Protest(p) if p.id == "p1"));
    }

    #[test]
    fn test_empty_collection() {
        let (markers, dropped) = to_markers::<Earthquake>(&[]);
        assert!(markers.is_empty());
        assert_eq!(dropped, 0);
    }
}
