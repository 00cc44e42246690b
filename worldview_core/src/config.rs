//! Map configuration.
//!
//! Every field has a default, so `{}` is a valid configuration and a file
//! only needs to name what it changes.

use crate::clustering::{GroupKeyStrategy, RadiusPolicy};
use crate::error::ConfigError;
use crate::escalation::EscalationPolicy;
use crate::highlight::DEFAULT_FLASH_TTL;
use crate::layers::LayerKey;
use crate::scheduler::SchedulerConfig;
use crate::visibility::ThresholdTable;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// How a marker layer is clustered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClusterMode {
    /// Every marker is drawn on its own
    Off,
    /// Screen-space radius clustering
    Radius {
        #[serde(default)]
        group_key: GroupKeyStrategy,
    },
    /// Clusters arrive precomputed with the feed (military flights)
    Upstream,
}

fn default_cluster_modes() -> BTreeMap<LayerKey, ClusterMode> {
    let marker_keyed = ClusterMode::Radius {
        group_key: GroupKeyStrategy::Marker,
    };
    let plain = ClusterMode::Radius {
        group_key: GroupKeyStrategy::None,
    };
    [
        (LayerKey::Earthquakes, plain),
        (LayerKey::Vessels, plain),
        (LayerKey::Protests, marker_keyed),
        (LayerKey::Outages, marker_keyed),
        (LayerKey::Datacenters, marker_keyed),
        (LayerKey::Flights, ClusterMode::Upstream),
    ]
    .into_iter()
    .collect()
}

/// Layers named in the file replace their default mode; the rest keep it.
fn merge_cluster_modes<'de, D>(deserializer: D) -> Result<BTreeMap<LayerKey, ClusterMode>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<LayerKey, ClusterMode>::deserialize(deserializer)?;
    let mut modes = default_cluster_modes();
    modes.extend(overrides);
    Ok(modes)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub scheduler: SchedulerConfig,
    pub radius: RadiusPolicy,
    pub thresholds: ThresholdTable,
    pub escalation: EscalationPolicy,
    pub highlight_ttl_ms: u64,
    /// Per-layer modes merged over the defaults. Layers absent from the
    /// merged table are not clustered.
    #[serde(deserialize_with = "merge_cluster_modes")]
    pub clustering: BTreeMap<LayerKey, ClusterMode>,
    /// Layers enabled at startup
    pub default_layers: Vec<LayerKey>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            radius: RadiusPolicy::default(),
            thresholds: ThresholdTable::default(),
            escalation: EscalationPolicy::default(),
            highlight_ttl_ms: DEFAULT_FLASH_TTL.as_millis() as u64,
            clustering: default_cluster_modes(),
            default_layers: vec![
                LayerKey::Hotspots,
                LayerKey::Conflicts,
                LayerKey::Bases,
                LayerKey::Earthquakes,
                LayerKey::Protests,
            ],
        }
    }
}

impl MapConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: MapConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.radius.check().map_err(ConfigError::RadiusTable)?;
        self.scheduler.check().map_err(ConfigError::Scheduler)?;
        self.escalation.check().map_err(ConfigError::Escalation)?;
        for (layer, threshold) in &self.thresholds.0 {
            let label_zoom = threshold.label_zoom();
            if !threshold.min_zoom.is_finite() || !label_zoom.is_finite() {
                return Err(ConfigError::Threshold {
                    layer: layer.to_string(),
                    reason: "zoom levels must be finite".to_string(),
                });
            }
        }
        if self.highlight_ttl_ms == 0 {
            return Err(ConfigError::HighlightTtl(self.highlight_ttl_ms));
        }
        Ok(())
    }

    pub fn highlight_ttl(&self) -> Duration {
        Duration::from_millis(self.highlight_ttl_ms)
    }

    pub fn cluster_mode(&self, layer: LayerKey) -> ClusterMode {
        self.clustering.get(&layer).copied().unwrap_or(ClusterMode::Off)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::BackendKind;

    #[test]
    fn test_empty_json_is_default() {
        let config = MapConfig::from_json_str("{}").unwrap();
        assert_eq!(config, MapConfig::default());
        assert_eq!(config.highlight_ttl(), Duration::from_millis(3000));
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "scheduler": { "backend": "vector", "rebuild_debounce_ms": 200 },
            "clustering": { "vessels": { "mode": "off" }, "protests": { "mode": "radius", "group_key": "marker" } }
        }"#;
        let config = MapConfig::from_json_str(json).unwrap();
        assert_eq!(config.scheduler.backend, BackendKind::Vector);
        assert_eq!(config.scheduler.rebuild_debounce_ms, 200);
        assert_eq!(config.scheduler.overlay_interval_ms, 16);
        assert_eq!(config.cluster_mode(LayerKey::Vessels), ClusterMode::Off);
        assert_eq!(
            config.cluster_mode(LayerKey::Earthquakes),
            ClusterMode::Radius { group_key: GroupKeyStrategy::None }
        );
        assert_eq!(config.cluster_mode(LayerKey::Flights), ClusterMode::Upstream);
    }

    #[test]
    fn test_partial_clustering_merges_per_layer() {
        let json = r#"{ "clustering": { "earthquakes": { "mode": "off" } } }"#;
        let config = MapConfig::from_json_str(json).unwrap();
        assert_eq!(config.cluster_mode(LayerKey::Earthquakes), ClusterMode::Off);
        for layer in [LayerKey::Vessels, LayerKey::Protests, LayerKey::Outages, LayerKey::Flights] {
            assert_eq!(config.cluster_mode(layer), MapConfig::default().cluster_mode(layer));
        }
        assert_eq!(config.clustering.len(), MapConfig::default().clustering.len());
    }

    #[test]
    fn test_rejects_growing_radius() {
        let json = r#"{ "radius": { "steps": [
            { "min_zoom": 0, "radius_px": 10 },
            { "min_zoom": 4, "radius_px": 30 }
        ] } }"#;
        assert!(matches!(MapConfig::from_json_str(json), Err(ConfigError::RadiusTable(_))));
    }

    #[test]
    fn test_rejects_bad_json_and_intervals() {
        assert!(matches!(MapConfig::from_json_str("{"), Err(ConfigError::Parse(_))));
        let json = r#"{ "scheduler": { "health_interval_ms": 0 } }"#;
        assert!(matches!(MapConfig::from_json_str(json), Err(ConfigError::Scheduler(_))));
        let json = r#"{ "highlight_ttl_ms": 0 }"#;
        assert!(matches!(MapConfig::from_json_str(json), Err(ConfigError::HighlightTtl(0))));
    }
}
