//! Layer identifiers shared by every component and both backends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A toggleable map layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKey {
    Hotspots,
    Conflicts,
    Bases,
    Nuclear,
    Cables,
    Pipelines,
    Datacenters,
    Earthquakes,
    Protests,
    Flights,
    Vessels,
    Outages,
}

impl LayerKey {
    pub const ALL: [LayerKey; 12] = [
        LayerKey::Hotspots,
        LayerKey::Conflicts,
        LayerKey::Bases,
        LayerKey::Nuclear,
        LayerKey::Cables,
        LayerKey::Pipelines,
        LayerKey::Datacenters,
        LayerKey::Earthquakes,
        LayerKey::Protests,
        LayerKey::Flights,
        LayerKey::Vessels,
        LayerKey::Outages,
    ];

    /// Layers whose content is a marker collection that goes through clustering.
    pub const MARKER_LAYERS: [LayerKey; 6] = [
        LayerKey::Datacenters,
        LayerKey::Earthquakes,
        LayerKey::Protests,
        LayerKey::Flights,
        LayerKey::Vessels,
        LayerKey::Outages,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LayerKey::Hotspots => "hotspots",
            LayerKey::Conflicts => "conflicts",
            LayerKey::Bases => "bases",
            LayerKey::Nuclear => "nuclear",
            LayerKey::Cables => "cables",
            LayerKey::Pipelines => "pipelines",
            LayerKey::Datacenters => "datacenters",
            LayerKey::Earthquakes => "earthquakes",
            LayerKey::Protests => "protests",
            LayerKey::Flights => "flights",
            LayerKey::Vessels => "vessels",
            LayerKey::Outages => "outages",
        }
    }

    /// True for layers backed by live feeds (subject to the time-range filter).
    pub fn is_live_feed(&self) -> bool {
        matches!(
            self,
            LayerKey::Earthquakes
                | LayerKey::Protests
                | LayerKey::Flights
                | LayerKey::Vessels
                | LayerKey::Outages
        )
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayerKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayerKey::ALL
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| format!("Unknown layer: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_name_roundtrip() {
        for key in LayerKey::ALL {
            assert_eq!(key.name().parse::<LayerKey>().unwrap(), key);
        }
        assert!("weather".parse::<LayerKey>().is_err());
    }

    #[test]
    fn test_marker_layers_subset() {
        for key in LayerKey::MARKER_LAYERS {
            assert!(LayerKey::ALL.contains(&key));
        }
        assert!(!LayerKey::Hotspots.is_live_feed());
        assert!(LayerKey::Protests.is_live_feed());
    }
}
