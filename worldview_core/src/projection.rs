//! The projection seam shared by both renderer backends.
//!
//! Every geographic-to-screen conversion in the core goes through the
//! [`Projector`] trait. Each backend supplies its own projector; the core
//! never assumes a particular projection.

use geo::Coord;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Latitude limit of the Web Mercator square world.
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// A point in screen space (pixels, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean pixel distance.
    pub fn distance(&self, other: &ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A geographic coordinate in degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both components are finite and inside the valid ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Converts to a `geo` coordinate (x = lon, y = lat).
    pub fn to_coord(self) -> Coord<f64> {
        Coord { x: self.lon, y: self.lat }
    }
}

impl From<Coord<f64>> for GeoPoint {
    fn from(c: Coord<f64>) -> Self {
        Self { lat: c.y, lon: c.x }
    }
}

/// Converts a geographic coordinate into a screen point for the current view.
///
/// Returns `None` when the coordinate cannot be projected (off-world,
/// non-finite). Callers drop such points; a projector never panics.
pub trait Projector {
    fn project(&self, lon: f64, lat: f64) -> Option<ScreenPoint>;

    fn project_point(&self, point: GeoPoint) -> Option<ScreenPoint> {
        self.project(point.lon, point.lat)
    }
}

impl<F> Projector for F
where
    F: Fn(f64, f64) -> Option<ScreenPoint>,
{
    fn project(&self, lon: f64, lat: f64) -> Option<ScreenPoint> {
        self(lon, lat)
    }
}

// ============================================================================
// WEB MERCATOR (compositor-style backends)
// ============================================================================

/// Tile-based Web Mercator projection, as used by GPU map compositors.
///
/// World size in pixels is `tile_size * 2^zoom`; the view center maps to the
/// middle of the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercator {
    pub center: GeoPoint,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
    pub tile_size: f64,
}

impl WebMercator {
    pub fn new(center: GeoPoint, zoom: f64, width: f64, height: f64) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
            tile_size: 512.0,
        }
    }

    fn world_size(&self) -> f64 {
        self.tile_size * 2f64.powf(self.zoom)
    }

    /// Projects to absolute world pixels (before centering).
    fn world_xy(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        if lon.abs() > 180.0 || lat.abs() > MERCATOR_MAX_LAT {
            return None;
        }
        let size = self.world_size();
        let x = (lon + 180.0) / 360.0 * size;
        let phi = lat.to_radians();
        let y = (1.0 - (PI / 4.0 + phi / 2.0).tan().ln() / PI) / 2.0 * size;
        (x.is_finite() && y.is_finite()).then_some((x, y))
    }
}

impl Projector for WebMercator {
    fn project(&self, lon: f64, lat: f64) -> Option<ScreenPoint> {
        let (cx, cy) = self.world_xy(self.center.lon, self.center.lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT))?;
        let (x, y) = self.world_xy(lon, lat)?;
        Some(ScreenPoint::new(
            x - cx + self.width / 2.0,
            y - cy + self.height / 2.0,
        ))
    }
}

// ============================================================================
// EQUIRECTANGULAR (vector-style backends)
// ============================================================================

/// Plate carrée projection with a scale/translate transform, as used by
/// vector (SVG/DOM) map renderers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equirectangular {
    /// Pixels per degree
    pub scale: f64,
    /// Screen position of the view center
    pub translate: ScreenPoint,
    pub center: GeoPoint,
}

impl Equirectangular {
    /// Fits the whole world into `width` at zoom 0; each zoom level doubles it.
    pub fn for_view(center: GeoPoint, zoom: f64, width: f64, height: f64) -> Self {
        Self {
            scale: width / 360.0 * 2f64.powf(zoom),
            translate: ScreenPoint::new(width / 2.0, height / 2.0),
            center,
        }
    }
}

impl Projector for Equirectangular {
    fn project(&self, lon: f64, lat: f64) -> Option<ScreenPoint> {
        let point = GeoPoint::new(lat, lon);
        if !point.is_valid() {
            return None;
        }
        Some(ScreenPoint::new(
            (lon - self.center.lon) * self.scale + self.translate.x,
            (self.center.lat - lat) * self.scale + self.translate.y,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mercator_center_maps_to_viewport_middle() {
        let proj = WebMercator::new(GeoPoint::new(48.85, 2.35), 4.0, 800.0, 600.0);
        let p = proj.project(2.35, 48.85).unwrap();
        assert_relative_eq!(p.x, 400.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mercator_rejects_polar_and_invalid() {
        let proj = WebMercator::new(GeoPoint::new(0.0, 0.0), 2.0, 800.0, 600.0);
        assert!(proj.project(0.0, 89.0).is_none());
        assert!(proj.project(f64::NAN, 10.0).is_none());
        assert!(proj.project(181.0, 10.0).is_none());
    }

    #[test]
    fn test_mercator_zoom_doubles_distance() {
        let a = WebMercator::new(GeoPoint::new(0.0, 0.0), 3.0, 800.0, 600.0);
        let b = WebMercator { zoom: 4.0, ..a };
        let da = a.project(0.0, 0.0).unwrap().distance(&a.project(1.0, 0.0).unwrap());
        let db = b.project(0.0, 0.0).unwrap().distance(&b.project(1.0, 0.0).unwrap());
        assert_relative_eq!(db, da * 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_equirectangular_north_is_up() {
        let proj = Equirectangular::for_view(GeoPoint::new(0.0, 0.0), 0.0, 720.0, 360.0);
        let north = proj.project(0.0, 10.0).unwrap();
        let south = proj.project(0.0, -10.0).unwrap();
        assert!(north.y < south.y);
        assert_relative_eq!(proj.project(90.0, 0.0).unwrap().x, 540.0, epsilon = 1e-9);
        assert!(proj.project(0.0, 91.0).is_none());
    }

    #[test]
    fn test_closure_projector() {
        let proj = |lon: f64, lat: f64| Some(ScreenPoint::new(lon, lat));
        assert_eq!(proj.project_point(GeoPoint::new(2.0, 1.0)), Some(ScreenPoint::new(1.0, 2.0)));
    }
}
