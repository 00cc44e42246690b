//! Zoom-dependent layer visibility.
//!
//! [`resolve`] is a pure function of its inputs; the only state is the
//! per-layer [`LayerState`] kept by [`LayerRegistry`], which applies the
//! toggle rules that set and clear the zoom override.

use crate::layers::LayerKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Zoom threshold for one layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomThreshold {
    /// Layer is auto-hidden below this zoom (unless overridden)
    pub min_zoom: f64,
    /// Labels appear from this zoom; defaults to `min_zoom`
    #[serde(default)]
    pub show_labels: Option<f64>,
}

impl ZoomThreshold {
    pub fn new(min_zoom: f64) -> Self {
        Self {
            min_zoom,
            show_labels: None,
        }
    }

    pub fn with_labels(min_zoom: f64, show_labels: f64) -> Self {
        Self {
            min_zoom,
            show_labels: Some(show_labels),
        }
    }

    pub fn label_zoom(&self) -> f64 {
        self.show_labels.unwrap_or(self.min_zoom)
    }
}

/// Per-layer zoom thresholds. Layers without an entry are always eligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable(pub BTreeMap<LayerKey, ZoomThreshold>);

impl Default for ThresholdTable {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert(LayerKey::Bases, ZoomThreshold::with_labels(3.0, 5.0));
        table.insert(LayerKey::Nuclear, ZoomThreshold::new(2.0));
        table.insert(LayerKey::Datacenters, ZoomThreshold::new(5.0));
        table.insert(LayerKey::Pipelines, ZoomThreshold::new(2.0));
        table.insert(LayerKey::Cables, ZoomThreshold::with_labels(2.0, 4.0));
        Self(table)
    }
}

impl ThresholdTable {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, layer: LayerKey) -> Option<&ZoomThreshold> {
        self.0.get(&layer)
    }

    pub fn set(&mut self, layer: LayerKey, threshold: ZoomThreshold) {
        self.0.insert(layer, threshold);
    }
}

/// Resolved visibility of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayerVisibility {
    pub is_visible: bool,
    pub labels_visible: bool,
    /// Enabled but hidden by the zoom threshold ("dimmed" affordance, not "off")
    pub auto_hidden: bool,
}

/// Decides whether a layer and its labels are drawn.
pub fn resolve(
    layer: LayerKey,
    zoom: f64,
    enabled: bool,
    zoom_override: bool,
    thresholds: &ThresholdTable,
) -> LayerVisibility {
    match thresholds.get(layer) {
        None => LayerVisibility {
            is_visible: enabled,
            labels_visible: enabled,
            auto_hidden: false,
        },
        Some(t) => LayerVisibility {
            is_visible: enabled && (zoom_override || zoom >= t.min_zoom),
            labels_visible: enabled && zoom >= t.label_zoom(),
            auto_hidden: enabled && !zoom_override && zoom < t.min_zoom,
        },
    }
}

/// User toggle state of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayerState {
    pub enabled: bool,
    pub zoom_override: bool,
}

/// Toggle state for every layer plus the threshold table.
#[derive(Debug, Clone)]
pub struct LayerRegistry {
    states: BTreeMap<LayerKey, LayerState>,
    thresholds: ThresholdTable,
}

impl LayerRegistry {
    pub fn new(thresholds: ThresholdTable) -> Self {
        let states = LayerKey::ALL
            .iter()
            .map(|&key| (key, LayerState::default()))
            .collect();
        Self { states, thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    pub fn state(&self, layer: LayerKey) -> LayerState {
        self.states.get(&layer).copied().unwrap_or_default()
    }

    pub fn is_enabled(&self, layer: LayerKey) -> bool {
        self.state(layer).enabled
    }

    pub fn enabled_layers(&self) -> impl Iterator<Item = LayerKey> + '_ {
        self.states
            .iter()
            .filter(|(_, s)| s.enabled)
            .map(|(&k, _)| k)
    }

    /// Applies a user toggle at the current zoom.
    ///
    /// Enabling below the layer's threshold sets the override; disabling
    /// always clears it. Returns true when the enabled flag changed.
    pub fn set_enabled(&mut self, layer: LayerKey, enabled: bool, zoom: f64) -> bool {
        let below_threshold = self
            .thresholds
            .get(layer)
            .is_some_and(|t| zoom < t.min_zoom);
        let state = self.states.entry(layer).or_default();
        let changed = state.enabled != enabled;
        if enabled {
            state.enabled = true;
            if below_threshold {
                state.zoom_override = true;
            }
        } else {
            state.enabled = false;
            state.zoom_override = false;
        }
        changed
    }

    pub fn visibility(&self, layer: LayerKey, zoom: f64) -> LayerVisibility {
        let state = self.state(layer);
        resolve(layer, zoom, state.enabled, state.zoom_override, &self.thresholds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ThresholdTable {
        let mut t = ThresholdTable::empty();
        t.set(LayerKey::Bases, ZoomThreshold::with_labels(3.0, 5.0));
        t
    }

    #[test]
    fn test_unthresholded_layer_follows_enabled() {
        let t = table();
        let on = resolve(LayerKey::Conflicts, 0.5, true, false, &t);
        assert_eq!(on, LayerVisibility { is_visible: true, labels_visible: true, auto_hidden: false });
        let off = resolve(LayerKey::Conflicts, 9.0, false, false, &t);
        assert_eq!(off, LayerVisibility::default());
    }

    #[test]
    fn test_threshold_rules() {
        let t = table();
        let below = resolve(LayerKey::Bases, 2.0, true, false, &t);
        assert!(!below.is_visible && !below.labels_visible && below.auto_hidden);

        let mid = resolve(LayerKey::Bases, 4.0, true, false, &t);
        assert!(mid.is_visible && !mid.labels_visible && !mid.auto_hidden);

        let high = resolve(LayerKey::Bases, 5.0, true, false, &t);
        assert!(high.is_visible && high.labels_visible);

        let forced = resolve(LayerKey::Bases, 1.0, true, true, &t);
        assert!(forced.is_visible && !forced.labels_visible && !forced.auto_hidden);

        let disabled = resolve(LayerKey::Bases, 1.0, false, true, &t);
        assert_eq!(disabled, LayerVisibility::default());
    }

    #[test]
    fn test_override_persists_across_zoom() {
        let mut registry = LayerRegistry::new(ThresholdTable(
            [(LayerKey::Bases, ZoomThreshold::new(3.0))].into_iter().collect(),
        ));
        registry.set_enabled(LayerKey::Bases, true, 1.0);
        assert!(registry.state(LayerKey::Bases).zoom_override);
        for zoom in [1.0, 5.0, 1.0] {
            assert!(registry.visibility(LayerKey::Bases, zoom).is_visible, "zoom {}", zoom);
        }
        assert!(registry.state(LayerKey::Bases).zoom_override);
    }

    #[test]
    fn test_disable_clears_override() {
        let mut registry = LayerRegistry::new(table());
        registry.set_enabled(LayerKey::Bases, true, 1.0);
        registry.set_enabled(LayerKey::Bases, false, 1.0);
        assert_eq!(registry.state(LayerKey::Bases), LayerState::default());

        // Re-enabling above the threshold starts without an override.
        registry.set_enabled(LayerKey::Bases, true, 4.0);
        assert!(!registry.state(LayerKey::Bases).zoom_override);
        assert!(registry.visibility(LayerKey::Bases, 2.0).auto_hidden);

        // ...and below it re-derives the override from scratch.
        registry.set_enabled(LayerKey::Bases, false, 2.0);
        registry.set_enabled(LayerKey::Bases, true, 1.0);
        assert!(registry.state(LayerKey::Bases).zoom_override);
    }

    #[test]
    fn test_enabled_layers_iter() {
        let mut registry = LayerRegistry::new(ThresholdTable::default());
        assert!(registry.set_enabled(LayerKey::Protests, true, 2.0));
        assert!(!registry.set_enabled(LayerKey::Protests, true, 2.0));
        assert_eq!(registry.enabled_layers().collect::<Vec<_>>(), vec![LayerKey::Protests]);
    }
}
