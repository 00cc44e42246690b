//! Seeded synthetic feeds.
//!
//! Every record is drawn from one ChaCha8 stream, so a seed reproduces the
//! exact same earthquakes, protests, flights, vessels, outages and headlines.

use crate::error::SimError;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp, Normal};
use std::time::{Duration, SystemTime};
use worldview_core::catalog::{ConflictZone, Datacenter, Hotspot, MilitaryBase, NuclearSite};
use worldview_core::feeds::{
    Earthquake, MilitaryFlight, MilitaryFlightCluster, NewsItem, Outage, Protest, Severity, Vessel,
};
use worldview_core::{EscalationLevel, GeoPoint, ReferenceCatalog};

/// Activity centers the generator scatters records around.
const REGIONS: [(&str, f64, f64); 8] = [
    ("Japan", 36.0, 138.0),
    ("Chile", -30.0, -71.0),
    ("Turkey", 39.0, 35.0),
    ("Indonesia", -2.0, 118.0),
    ("Iran", 32.0, 53.0),
    ("Mexico", 19.4, -99.1),
    ("Ukraine", 49.0, 32.0),
    ("Nigeria", 9.0, 8.0),
];

const OPERATORS: [&str; 4] = ["USAF", "RAF", "PLAAF", "VKS"];
const VESSEL_TYPES: [&str; 4] = ["tanker", "cargo", "warship", "fishing"];
const FILLER_HEADLINES: [&str; 4] = [
    "Markets close higher",
    "Central bank holds rates",
    "Tech earnings beat forecasts",
    "Football final draws record crowd",
];

/// Latitudes are kept inside what Web Mercator can draw.
const MAX_LAT: f64 = 80.0;

/// Fraction of records emitted with unusable coordinates.
const INVALID_RATE: f64 = 0.02;

/// Oldest age a generated live record can have (inside the default 7d range).
const MAX_AGE: Duration = Duration::from_secs(6 * 24 * 3_600);

pub struct FeedGenerator {
    rng: ChaCha8Rng,
    scatter: Normal<f64>,
    magnitude: Exp<f64>,
    age_hours: Exp<f64>,
    next_id: u64,
}

impl FeedGenerator {
    /// # Arguments
    /// * `seed` - Stream seed
    /// * `scatter_deg` - Standard deviation of the offset from a region center
    pub fn new(seed: u64, scatter_deg: f64) -> Result<Self, SimError> {
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            scatter: Normal::new(0.0, scatter_deg).map_err(|e| SimError::Distribution(e.to_string()))?,
            magnitude: Exp::new(1.2).map_err(|e| SimError::Distribution(e.to_string()))?,
            age_hours: Exp::new(1.0 / 12.0).map_err(|e| SimError::Distribution(e.to_string()))?,
            next_id: 0,
        })
    }

    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn region(&mut self) -> (&'static str, f64, f64) {
        REGIONS[self.rng.gen_range(0..REGIONS.len())]
    }

    /// A point scattered around a region center, occasionally unusable.
    fn point_near(&mut self, lat: f64, lon: f64) -> (f64, f64) {
        if self.rng.gen_bool(INVALID_RATE) {
            return (f64::NAN, lon);
        }
        let lat = (lat + self.scatter.sample(&mut self.rng)).clamp(-MAX_LAT, MAX_LAT);
        let mut lon = lon + self.scatter.sample(&mut self.rng);
        if lon > 180.0 {
            lon -= 360.0;
        } else if lon < -180.0 {
            lon += 360.0;
        }
        (lat, lon)
    }

    fn observed_at(&mut self, now: SystemTime) -> SystemTime {
        let age = Duration::from_secs_f64(self.age_hours.sample(&mut self.rng) * 3_600.0).min(MAX_AGE);
        now.checked_sub(age).unwrap_or(now)
    }

    fn severity(&mut self) -> Severity {
        match self.rng.gen_range(0..10) {
            0..=5 => Severity::Low,
            6..=8 => Severity::Medium,
            _ => Severity::High,
        }
    }

    pub fn earthquakes(&mut self, n: usize, now: SystemTime) -> Vec<Earthquake> {
        (0..n)
            .map(|_| {
                let (name, clat, clon) = self.region();
                let (lat, lon) = self.point_near(clat, clon);
                Earthquake {
                    id: self.id("eq"),
                    lat,
                    lon,
                    magnitude: 2.5 + self.magnitude.sample(&mut self.rng),
                    depth_km: self.rng.gen_range(2.0..300.0),
                    place: format!("near {}", name),
                    time: self.observed_at(now),
                }
            })
            .collect()
    }

    pub fn protests(&mut self, n: usize, now: SystemTime) -> Vec<Protest> {
        (0..n)
            .map(|_| {
                let (country, clat, clon) = self.region();
                let (lat, lon) = self.point_near(clat, clon);
                let severity = self.severity();
                Protest {
                    id: self.id("protest"),
                    lat,
                    lon,
                    city: format!("{} city", country),
                    country: country.to_string(),
                    title: format!("Demonstration in {}", country),
                    severity,
                    time: self.observed_at(now),
                }
            })
            .collect()
    }

    pub fn vessels(&mut self, n: usize, now: SystemTime) -> Vec<Vessel> {
        (0..n)
            .map(|_| {
                let (_, clat, clon) = self.region();
                let (lat, lon) = self.point_near(clat, clon);
                Vessel {
                    id: format!("{:09}", self.rng.gen_range(200_000_000u32..800_000_000)),
                    name: self.id("vessel"),
                    lat,
                    lon,
                    vessel_type: VESSEL_TYPES[self.rng.gen_range(0..VESSEL_TYPES.len())].to_string(),
                    last_seen: self.observed_at(now),
                }
            })
            .collect()
    }

    pub fn outages(&mut self, n: usize, now: SystemTime) -> Vec<Outage> {
        (0..n)
            .map(|_| {
                let (country, clat, clon) = self.region();
                let (lat, lon) = self.point_near(clat, clon);
                let severity = self.severity();
                Outage {
                    id: self.id("outage"),
                    lat,
                    lon,
                    country: country.to_string(),
                    title: format!("Internet disruption in {}", country),
                    severity,
                    time: self.observed_at(now),
                }
            })
            .collect()
    }

    /// Flights plus the formations the flight feed reports for them.
    ///
    /// Roughly a third of the flights fly in formations of two to four.
    pub fn flights(&mut self, n: usize, now: SystemTime) -> (Vec<MilitaryFlight>, Vec<MilitaryFlightCluster>) {
        let mut flights = Vec::with_capacity(n);
        let mut formations = Vec::new();
        while flights.len() < n {
            let (name, clat, clon) = self.region();
            let (lat, lon) = self.point_near(clat, clon);
            let operator = OPERATORS[self.rng.gen_range(0..OPERATORS.len())];
            let size = if self.rng.gen_bool(0.33) {
                self.rng.gen_range(2..=4).min(n - flights.len())
            } else {
                1
            };
            let mut ids = Vec::with_capacity(size);
            for _ in 0..size {
                let id = self.id("flight");
                ids.push(id.clone());
                flights.push(MilitaryFlight {
                    callsign: format!("{}{:03}", &operator[..2], self.rng.gen_range(0..1000)),
                    id,
                    lat: lat + self.rng.gen_range(-0.05..0.05),
                    lon: lon + self.rng.gen_range(-0.05..0.05),
                    altitude_ft: self.rng.gen_range(5_000.0..40_000.0),
                    operator: operator.to_string(),
                    aircraft_type: "unknown".to_string(),
                    last_seen: self.observed_at(now),
                });
            }
            if size > 1 && lat.is_finite() {
                formations.push(MilitaryFlightCluster {
                    id: self.id("formation"),
                    name: format!("{} formation near {}", operator, name),
                    lat,
                    lon,
                    flight_ids: ids,
                });
            }
        }
        (flights, formations)
    }

    /// Headlines, about half of which mention a hotspot keyword.
    pub fn news(&mut self, catalog: &ReferenceCatalog, n: usize, now: SystemTime) -> Vec<NewsItem> {
        (0..n)
            .map(|_| {
                let keyword = catalog
                    .hotspots
                    .choose(&mut self.rng)
                    .and_then(|h| h.keywords.choose(&mut self.rng))
                    .filter(|_| self.rng.gen_bool(0.5));
                let title = match keyword {
                    Some(keyword) => format!("Tensions rise around {}", keyword),
                    None => FILLER_HEADLINES[self.rng.gen_range(0..FILLER_HEADLINES.len())].to_string(),
                };
                NewsItem {
                    id: self.id("news"),
                    title,
                    source: "wire".to_string(),
                    published_at: self.observed_at(now),
                    is_alert: self.rng.gen_bool(0.05),
                }
            })
            .collect()
    }

    /// A camera center near one of the regions.
    pub fn pan_target(&mut self) -> GeoPoint {
        let (_, clat, clon) = self.region();
        GeoPoint::new(
            (clat + self.rng.gen_range(-5.0..5.0)).clamp(-MAX_LAT, MAX_LAT),
            (clon + self.rng.gen_range(-5.0..5.0)).clamp(-180.0, 180.0),
        )
    }
}

/// Fixed reference data shared by every scenario.
pub fn reference_catalog() -> ReferenceCatalog {
    let hotspot = |id: &str, name: &str, lat: f64, lon: f64, keywords: &[&str]| Hotspot {
        id: id.to_string(),
        name: name.to_string(),
        lat,
        lon,
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        baseline_level: EscalationLevel::Low,
        description: String::new(),
    };
    let base = |id: &str, name: &str, lat: f64, lon: f64, country: &str| MilitaryBase {
        id: id.to_string(),
        name: name.to_string(),
        lat,
        lon,
        country: country.to_string(),
        operator: country.to_string(),
    };
    let datacenter = |id: &str, lat: f64, lon: f64, country: &str| Datacenter {
        id: id.to_string(),
        name: id.to_uppercase(),
        lat,
        lon,
        country: country.to_string(),
        operator: "hyperscale".to_string(),
        capacity_mw: Some(120.0),
    };

    ReferenceCatalog::new()
        .with_hotspots(vec![
            hotspot("kyiv", "Kyiv", 50.45, 30.52, &["kyiv", "ukraine"]),
            hotspot("taiwan-strait", "Taiwan Strait", 24.0, 119.5, &["taiwan", "strait"]),
            hotspot("tehran", "Tehran", 35.69, 51.39, &["tehran", "iran"]),
        ])
        .with_conflicts(vec![ConflictZone {
            id: "gaza".to_string(),
            name: "Gaza".to_string(),
            center: GeoPoint::new(31.4, 34.4),
            parties: vec!["Israel".to_string(), "Hamas".to_string()],
            casualties: None,
            description: String::new(),
        }])
        .with_bases(vec![
            base("ramstein", "Ramstein AB", 49.44, 7.6, "Germany"),
            base("incirlik", "Incirlik AB", 37.0, 35.43, "Turkey"),
            base("kadena", "Kadena AB", 26.35, 127.77, "Japan"),
        ])
        .with_nuclear(vec![NuclearSite {
            id: "zaporizhzhia".to_string(),
            name: "Zaporizhzhia NPP".to_string(),
            lat: 47.51,
            lon: 34.58,
            kind: "plant".to_string(),
            status: "occupied".to_string(),
        }])
        .with_datacenters(vec![
            datacenter("fra-1", 50.11, 8.68, "Germany"),
            datacenter("fra-2", 50.12, 8.70, "Germany"),
            datacenter("ams-1", 52.37, 4.9, "Netherlands"),
        ])
}
