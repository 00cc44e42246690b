//! View state: the single source of truth for camera, layers and time range.
//!
//! A `ViewState` round-trips through URL query parameters
//! (`lat`, `lon`, `zoom`, `view`, `layers`, `timeRange`) so a shared link
//! restores the same map.

use crate::error::ViewStateError;
use crate::layers::LayerKey;
use crate::projection::GeoPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 10.0;

// ============================================================================
// PRESETS
// ============================================================================

/// Regional camera presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapView {
    #[default]
    Global,
    America,
    Mena,
    Eu,
    Asia,
    Africa,
    Latam,
    Oceania,
}

impl MapView {
    pub const ALL: [MapView; 8] = [
        MapView::Global,
        MapView::America,
        MapView::Mena,
        MapView::Eu,
        MapView::Asia,
        MapView::Africa,
        MapView::Latam,
        MapView::Oceania,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MapView::Global => "global",
            MapView::America => "america",
            MapView::Mena => "mena",
            MapView::Eu => "eu",
            MapView::Asia => "asia",
            MapView::Africa => "africa",
            MapView::Latam => "latam",
            MapView::Oceania => "oceania",
        }
    }

    /// Default `(center, zoom)` of the preset.
    pub fn camera(&self) -> (GeoPoint, f64) {
        match self {
            MapView::Global => (GeoPoint::new(20.0, 0.0), 1.0),
            MapView::America => (GeoPoint::new(39.0, -98.0), 3.0),
            MapView::Mena => (GeoPoint::new(28.0, 42.0), 3.5),
            MapView::Eu => (GeoPoint::new(50.0, 10.0), 3.5),
            MapView::Asia => (GeoPoint::new(34.0, 105.0), 3.0),
            MapView::Africa => (GeoPoint::new(2.0, 20.0), 3.0),
            MapView::Latam => (GeoPoint::new(-15.0, -60.0), 3.0),
            MapView::Oceania => (GeoPoint::new(-25.0, 140.0), 3.5),
        }
    }
}

impl fmt::Display for MapView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MapView {
    type Err = ViewStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MapView::ALL
            .iter()
            .copied()
            .find(|v| v.name() == s)
            .ok_or_else(|| ViewStateError::UnknownView(s.to_string()))
    }
}

/// Age filter applied to live-feed markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "48h")]
    TwoDays,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    pub const ALL: [TimeRange; 6] = [
        TimeRange::Hour,
        TimeRange::SixHours,
        TimeRange::Day,
        TimeRange::TwoDays,
        TimeRange::Week,
        TimeRange::All,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TimeRange::Hour => "1h",
            TimeRange::SixHours => "6h",
            TimeRange::Day => "24h",
            TimeRange::TwoDays => "48h",
            TimeRange::Week => "7d",
            TimeRange::All => "all",
        }
    }

    /// Maximum age, `None` for no limit.
    pub fn max_age(&self) -> Option<Duration> {
        let hours = match self {
            TimeRange::Hour => 1,
            TimeRange::SixHours => 6,
            TimeRange::Day => 24,
            TimeRange::TwoDays => 48,
            TimeRange::Week => 7 * 24,
            TimeRange::All => return None,
        };
        Some(Duration::from_secs(hours * 3_600))
    }

    /// True when an observation at `observed_at` falls inside the range.
    ///
    /// Undated records and records stamped in the future are always included.
    pub fn includes(&self, observed_at: Option<SystemTime>, now: SystemTime) -> bool {
        match (self.max_age(), observed_at) {
            (Some(max_age), Some(at)) => now.duration_since(at).map_or(true, |age| age <= max_age),
            _ => true,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimeRange {
    type Err = ViewStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .iter()
            .copied()
            .find(|r| r.name() == s)
            .ok_or_else(|| ViewStateError::UnknownTimeRange(s.to_string()))
    }
}

// ============================================================================
// VIEW STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub zoom: f64,
    pub center: GeoPoint,
    pub active_view: MapView,
    pub active_layers: BTreeSet<LayerKey>,
    pub time_range: TimeRange,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::for_preset(MapView::Global)
    }
}

impl ViewState {
    pub fn for_preset(view: MapView) -> Self {
        let (center, zoom) = view.camera();
        Self {
            zoom,
            center,
            active_view: view,
            active_layers: BTreeSet::new(),
            time_range: TimeRange::default(),
        }
    }

    pub fn with_layers(mut self, layers: impl IntoIterator<Item = LayerKey>) -> Self {
        self.active_layers = layers.into_iter().collect();
        self
    }

    pub fn clamp_zoom(zoom: f64) -> f64 {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    }

    /// Moves the camera to a preset, keeping layers and time range.
    pub fn apply_preset(&mut self, view: MapView) {
        let (center, zoom) = view.camera();
        self.active_view = view;
        self.center = center;
        self.zoom = zoom;
    }

    /// Encodes the state as URL query parameters.
    pub fn to_query(&self) -> String {
        let layers: Vec<&str> = self.active_layers.iter().map(LayerKey::name).collect();
        format!(
            "lat={:.4}&lon={:.4}&zoom={:.2}&view={}&layers={}&timeRange={}",
            self.center.lat,
            self.center.lon,
            self.zoom,
            self.active_view,
            layers.join(","),
            self.time_range
        )
    }

    /// Applies URL query parameters on top of `base`.
    ///
    /// A `view` parameter moves the camera to the preset first; explicit
    /// `lat`/`lon`/`zoom` then override it. Unknown parameters are ignored.
    pub fn from_query(query: &str, base: &ViewState) -> Result<ViewState, ViewStateError> {
        let params: Vec<(&str, &str)> = query
            .trim_start_matches('?')
            .split('&')
            .filter(|p| !p.is_empty())
            .map(|p| p.split_once('=').unwrap_or((p, "")))
            .collect();
        let get = |name: &str| params.iter().find(|(k, _)| *k == name).map(|(_, v)| *v);

        let mut state = base.clone();
        if let Some(view) = get("view") {
            state.apply_preset(view.parse()?);
        }
        if let Some(lat) = get("lat") {
            state.center.lat = parse_number("lat", lat, -90.0, 90.0)?;
        }
        if let Some(lon) = get("lon") {
            state.center.lon = parse_number("lon", lon, -180.0, 180.0)?;
        }
        if let Some(zoom) = get("zoom") {
            state.zoom = Self::clamp_zoom(parse_number("zoom", zoom, f64::MIN, f64::MAX)?);
        }
        if let Some(layers) = get("layers") {
            state.active_layers = layers
                .split(',')
                .filter(|l| !l.is_empty())
                .map(|l| l.parse::<LayerKey>().map_err(|_| ViewStateError::UnknownLayer(l.to_string())))
                .collect::<Result<_, _>>()?;
        }
        if let Some(range) = get("timeRange") {
            state.time_range = range.parse()?;
        }
        Ok(state)
    }
}

fn parse_number(param: &'static str, raw: &str, min: f64, max: f64) -> Result<f64, ViewStateError> {
    let value: f64 = raw.parse().map_err(|_| ViewStateError::NotANumber {
        param,
        value: raw.to_string(),
    })?;
    if !value.is_finite() || value < min || value > max {
        return Err(ViewStateError::OutOfRange { param, value });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_roundtrip() {
        let mut state = ViewState::for_preset(MapView::Mena)
            .with_layers([LayerKey::Protests, LayerKey::Bases]);
        state.time_range = TimeRange::Day;
        let query = state.to_query();
        assert_eq!(
            query,
            "lat=28.0000&lon=42.0000&zoom=3.50&view=mena&layers=bases,protests&timeRange=24h"
        );
        assert_eq!(ViewState::from_query(&query, &ViewState::default()).unwrap(), state);
    }

    #[test]
    fn test_view_param_applies_preset() {
        let state = ViewState::from_query("?view=eu", &ViewState::default()).unwrap();
        assert_eq!(state.active_view, MapView::Eu);
        assert_eq!(state.zoom, 3.5);

        let state = ViewState::from_query("view=eu&zoom=6", &ViewState::default()).unwrap();
        assert_eq!(state.zoom, 6.0);
        assert_eq!(state.center, MapView::Eu.camera().0);
    }

    #[test]
    fn test_bad_params() {
        let base = ViewState::default();
        assert!(matches!(
            ViewState::from_query("lat=abc", &base),
            Err(ViewStateError::NotANumber { param: "lat", .. })
        ));
        assert!(matches!(
            ViewState::from_query("lat=95", &base),
            Err(ViewStateError::OutOfRange { param: "lat", .. })
        ));
        assert_eq!(
            ViewState::from_query("layers=protests,ufos", &base),
            Err(ViewStateError::UnknownLayer("ufos".to_string()))
        );
        assert_eq!(
            ViewState::from_query("timeRange=3d", &base),
            Err(ViewStateError::UnknownTimeRange("3d".to_string()))
        );
    }

    #[test]
    fn test_zoom_clamped() {
        let state = ViewState::from_query("zoom=40", &ViewState::default()).unwrap();
        assert_eq!(state.zoom, MAX_ZOOM);
    }

    #[test]
    fn test_time_range_filter() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let two_hours_ago = Some(now - Duration::from_secs(7_200));
        assert!(!TimeRange::Hour.includes(two_hours_ago, now));
        assert!(TimeRange::SixHours.includes(two_hours_ago, now));
        assert!(TimeRange::Hour.includes(None, now));
        assert!(TimeRange::All.includes(Some(SystemTime::UNIX_EPOCH), now));
        assert!(TimeRange::Hour.includes(Some(now + Duration::from_secs(60)), now));
    }
}
