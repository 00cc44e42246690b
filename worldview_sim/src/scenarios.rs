//! Deterministic scenarios for the map core.

use serde::Serialize;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// WV-001: hundreds of pans inside a few throttle windows
    PanStorm,

    /// WV-002: every feed refreshes inside one frame
    FeedBurst,

    /// WV-003: interaction while paused, then resume
    PauseResume,

    /// WV-004: backing store mutated and then lost
    StaleStore,

    /// WV-005: overlapping flashes with seeded TTLs
    FlashExpiry,

    /// WV-006: vector and compositor backends under one script
    BackendParity,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::PanStorm,
            ScenarioId::FeedBurst,
            ScenarioId::PauseResume,
            ScenarioId::StaleStore,
            ScenarioId::FlashExpiry,
            ScenarioId::BackendParity,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::PanStorm => "pan_storm",
            ScenarioId::FeedBurst => "feed_burst",
            ScenarioId::PauseResume => "pause_resume",
            ScenarioId::StaleStore => "stale_store",
            ScenarioId::FlashExpiry => "flash_expiry",
            ScenarioId::BackendParity => "backend_parity",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::PanStorm => "300 pans in 300ms: overlay syncs stay throttled, nothing re-clusters",
            ScenarioId::FeedBurst => "All feeds plus 40 render calls in one frame coalesce into one update",
            ScenarioId::PauseResume => "Requests while paused draw nothing and replay as one rebuild",
            ScenarioId::StaleStore => "External mutation recovers once; a lost store warns instead of looping",
            ScenarioId::FlashExpiry => "Flashed assets vanish exactly at their latest expiry",
            ScenarioId::BackendParity => "Both backend kinds cluster and draw the same thing",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pan_storm" | "panstorm" | "wv-001" => Ok(ScenarioId::PanStorm),
            "feed_burst" | "feedburst" | "wv-002" => Ok(ScenarioId::FeedBurst),
            "pause_resume" | "pauseresume" | "wv-003" => Ok(ScenarioId::PauseResume),
            "stale_store" | "stalestore" | "wv-004" => Ok(ScenarioId::StaleStore),
            "flash_expiry" | "flashexpiry" | "wv-005" => Ok(ScenarioId::FlashExpiry),
            "backend_parity" | "backendparity" | "wv-006" => Ok(ScenarioId::BackendParity),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
