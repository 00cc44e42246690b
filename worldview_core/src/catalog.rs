//! Static reference collections (hotspots, conflict zones, infrastructure).
//!
//! Renderers often hit-test a minimal object (a polygon feature carrying only
//! an id); the catalog is where the full record is looked up.

use crate::escalation::EscalationLevel;
use crate::projection::GeoPoint;
use geo::{Centroid, LineString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fixed point of interest scored by the escalation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Case-insensitive substrings matched against headlines
    pub keywords: Vec<String>,
    /// Level shown when there is no matching activity
    #[serde(default)]
    pub baseline_level: EscalationLevel,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictZone {
    pub id: String,
    pub name: String,
    pub center: GeoPoint,
    pub parties: Vec<String>,
    #[serde(default)]
    pub casualties: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilitaryBase {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    pub operator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NuclearSite {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// plant, enrichment, weapons, research
    pub kind: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    pub path: Vec<GeoPoint>,
    /// oil, gas, products
    pub commodity: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cable {
    pub id: String,
    pub name: String,
    pub path: Vec<GeoPoint>,
    pub capacity_tbps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datacenter {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    pub operator: String,
    pub capacity_mw: Option<f64>,
}

/// Representative point for a polyline asset (length-weighted centroid).
pub fn path_anchor(path: &[GeoPoint]) -> Option<GeoPoint> {
    let line: LineString<f64> = path.iter().map(|p| p.to_coord()).collect();
    line.centroid().map(|p| GeoPoint::new(p.y(), p.x()))
}

/// Id-indexed reference collections.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    pub hotspots: Vec<Hotspot>,
    pub conflicts: Vec<ConflictZone>,
    pub bases: Vec<MilitaryBase>,
    pub nuclear: Vec<NuclearSite>,
    pub pipelines: Vec<Pipeline>,
    pub cables: Vec<Cable>,
    pub datacenters: Vec<Datacenter>,
    index: CatalogIndex,
}

#[derive(Debug, Clone, Default)]
struct CatalogIndex {
    hotspots: HashMap<String, usize>,
    conflicts: HashMap<String, usize>,
    bases: HashMap<String, usize>,
    nuclear: HashMap<String, usize>,
    pipelines: HashMap<String, usize>,
    cables: HashMap<String, usize>,
    datacenters: HashMap<String, usize>,
}

fn index_by<T>(items: &[T], id: impl Fn(&T) -> &str) -> HashMap<String, usize> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| (id(item).to_string(), i))
        .collect()
}

/// Indexed lookup that stays correct when the public vectors were edited
/// after the last builder call: a missing or mismatched slot falls back to a scan.
fn lookup<'a, T>(items: &'a [T], index: &HashMap<String, usize>, key: &str, id: impl Fn(&T) -> &str) -> Option<&'a T> {
    index
        .get(key)
        .and_then(|&i| items.get(i))
        .filter(|&item| id(item) == key)
        .or_else(|| items.iter().find(|&item| id(item) == key))
}

impl ReferenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hotspots(mut self, hotspots: Vec<Hotspot>) -> Self {
        self.hotspots = hotspots;
        self.reindex()
    }

    pub fn with_conflicts(mut self, conflicts: Vec<ConflictZone>) -> Self {
        self.conflicts = conflicts;
        self.reindex()
    }

    pub fn with_bases(mut self, bases: Vec<MilitaryBase>) -> Self {
        self.bases = bases;
        self.reindex()
    }

    pub fn with_nuclear(mut self, nuclear: Vec<NuclearSite>) -> Self {
        self.nuclear = nuclear;
        self.reindex()
    }

    pub fn with_pipelines(mut self, pipelines: Vec<Pipeline>) -> Self {
        self.pipelines = pipelines;
        self.reindex()
    }

    pub fn with_cables(mut self, cables: Vec<Cable>) -> Self {
        self.cables = cables;
        self.reindex()
    }

    pub fn with_datacenters(mut self, datacenters: Vec<Datacenter>) -> Self {
        self.datacenters = datacenters;
        self.reindex()
    }

    fn reindex(mut self) -> Self {
        self.index = CatalogIndex {
            hotspots: index_by(&self.hotspots, |h| &h.id),
            conflicts: index_by(&self.conflicts, |c| &c.id),
            bases: index_by(&self.bases, |b| &b.id),
            nuclear: index_by(&self.nuclear, |n| &n.id),
            pipelines: index_by(&self.pipelines, |p| &p.id),
            cables: index_by(&self.cables, |c| &c.id),
            datacenters: index_by(&self.datacenters, |d| &d.id),
        };
        self
    }

    pub fn hotspot(&self, id: &str) -> Option<&Hotspot> {
        lookup(&self.hotspots, &self.index.hotspots, id, |h| &h.id)
    }

    pub fn conflict(&self, id: &str) -> Option<&ConflictZone> {
        lookup(&self.conflicts, &self.index.conflicts, id, |c| &c.id)
    }

    pub fn base(&self, id: &str) -> Option<&MilitaryBase> {
        lookup(&self.bases, &self.index.bases, id, |b| &b.id)
    }

    pub fn nuclear_site(&self, id: &str) -> Option<&NuclearSite> {
        lookup(&self.nuclear, &self.index.nuclear, id, |n| &n.id)
    }

    pub fn pipeline(&self, id: &str) -> Option<&Pipeline> {
        lookup(&self.pipelines, &self.index.pipelines, id, |p| &p.id)
    }

    pub fn cable(&self, id: &str) -> Option<&Cable> {
        lookup(&self.cables, &self.index.cables, id, |c| &c.id)
    }

    pub fn datacenter(&self, id: &str) -> Option<&Datacenter> {
        lookup(&self.datacenters, &self.index.datacenters, id, |d| &d.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lookup_after_builder() {
        let catalog = ReferenceCatalog::new().with_conflicts(vec![ConflictZone {
            id: "gaza".to_string(),
            name: "Gaza".to_string(),
            center: GeoPoint::new(31.4, 34.4),
            parties: vec!["Israel".to_string(), "Hamas".to_string()],
            casualties: None,
            description: String::new(),
        }]);
        assert_eq!(catalog.conflict("gaza").map(|c| c.name.as_str()), Some("Gaza"));
        assert!(catalog.conflict("sudan").is_none());
        assert!(catalog.hotspot("gaza").is_none());
    }

    #[test]
    fn test_lookup_survives_direct_edits() {
        let hotspot = |id: &str| Hotspot {
            id: id.to_string(),
            name: id.to_uppercase(),
            lat: 0.0,
            lon: 0.0,
            keywords: vec![],
            baseline_level: EscalationLevel::Low,
            description: String::new(),
        };
        let mut catalog = ReferenceCatalog::new().with_hotspots(vec![hotspot("kyiv"), hotspot("tehran")]);

        catalog.hotspots.clear();
        assert!(catalog.hotspot("kyiv").is_none());

        catalog.hotspots = vec![hotspot("tehran"), hotspot("kyiv")];
        assert_eq!(catalog.hotspot("kyiv").map(|h| h.name.as_str()), Some("KYIV"));
        assert_eq!(catalog.hotspot("tehran").map(|h| h.name.as_str()), Some("TEHRAN"));

        catalog.bases.clear();
        assert!(catalog.base("ramstein").is_none());
    }

    #[test]
    fn test_path_anchor_midpoint() {
        let anchor = path_anchor(&[GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 10.0)]).unwrap();
        assert_relative_eq!(anchor.lon, 5.0, epsilon = 1e-9);
        assert_relative_eq!(anchor.lat, 0.0, epsilon = 1e-9);
        assert!(path_anchor(&[]).is_none());
    }
}
