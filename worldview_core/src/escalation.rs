//! The "ESCALATION" Engine - activity scoring for fixed points of interest.
//!
//! Each hotspot is matched against recent headlines by keyword:
//! - **Score**: keyword weight per distinct match, breaking bonus, recency bonus
//! - **Velocity**: score per matched item
//! - **Level**: low / elevated / high from count and score thresholds
//!
//! States are recomputed wholesale from the current input window; nothing is
//! carried over between assessments.

use crate::catalog::Hotspot;
use crate::feeds::NewsItem;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, SystemTime};

/// Three-tier activity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    #[default]
    Low,
    Elevated,
    High,
}

impl EscalationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationLevel::Low => "low",
            EscalationLevel::Elevated => "elevated",
            EscalationLevel::High => "high",
        }
    }
}

// =============================================================================
// POLICY
// =============================================================================

/// Items younger than `max_age_secs` earn `bonus`. Buckets are checked in order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecencyBucket {
    pub max_age_secs: u64,
    pub bonus: f64,
}

/// Weights and thresholds of the escalation model.
///
/// The defaults are empirical. Any non-negative weights keep the model
/// monotone: one more matching item never lowers the level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationPolicy {
    /// Score per distinct matched keyword
    pub keyword_weight: f64,
    /// Extra score for a breaking/alert item
    pub breaking_bonus: f64,
    pub recency_buckets: Vec<RecencyBucket>,
    pub high_min_matches: usize,
    pub high_min_score: f64,
    pub elevated_min_matches: usize,
    pub elevated_min_score: f64,
    /// Window of the lightweight pulse used for overlay animation
    pub pulse_window_secs: u64,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            keyword_weight: 2.0,
            breaking_bonus: 5.0,
            recency_buckets: vec![
                RecencyBucket { max_age_secs: 3_600, bonus: 3.0 },
                RecencyBucket { max_age_secs: 6 * 3_600, bonus: 2.0 },
                RecencyBucket { max_age_secs: 24 * 3_600, bonus: 1.0 },
            ],
            high_min_matches: 4,
            high_min_score: 10.0,
            elevated_min_matches: 2,
            elevated_min_score: 4.0,
            pulse_window_secs: 2 * 3_600,
        }
    }
}

impl EscalationPolicy {
    /// Checks that every weight is finite and non-negative.
    pub fn check(&self) -> Result<(), String> {
        let weights = [
            ("keyword_weight", self.keyword_weight),
            ("breaking_bonus", self.breaking_bonus),
            ("high_min_score", self.high_min_score),
            ("elevated_min_score", self.elevated_min_score),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number, got {}", name, value));
            }
        }
        if let Some(bucket) = self.recency_buckets.iter().find(|b| !b.bonus.is_finite() || b.bonus < 0.0) {
            return Err(format!("recency bonus must be non-negative, got {}", bucket.bonus));
        }
        if self.pulse_window_secs == 0 {
            return Err("pulse_window_secs must be positive".to_string());
        }
        Ok(())
    }

    pub fn recency_bonus(&self, age: Duration) -> f64 {
        self.recency_buckets
            .iter()
            .find(|b| age < Duration::from_secs(b.max_age_secs))
            .map(|b| b.bonus)
            .unwrap_or(0.0)
    }

    pub fn level_for(&self, has_breaking: bool, matched_count: usize, score: f64) -> EscalationLevel {
        if has_breaking || matched_count >= self.high_min_matches || score >= self.high_min_score {
            EscalationLevel::High
        } else if matched_count >= self.elevated_min_matches || score >= self.elevated_min_score {
            EscalationLevel::Elevated
        } else {
            EscalationLevel::Low
        }
    }
}

// =============================================================================
// DATA SOURCES
// =============================================================================

/// Decides whether a news item counts as breaking.
///
/// Injected into the scorer so the alert classification can come from any
/// upstream collaborator.
pub trait AlertLookup {
    fn is_breaking(&self, item: &NewsItem) -> bool;
}

/// Trusts the `is_alert` flag set by the feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedAlertFlag;

impl AlertLookup for FeedAlertFlag {
    fn is_breaking(&self, item: &NewsItem) -> bool {
        item.is_alert
    }
}

impl<F> AlertLookup for F
where
    F: Fn(&NewsItem) -> bool,
{
    fn is_breaking(&self, item: &NewsItem) -> bool {
        self(item)
    }
}

// =============================================================================
// ASSESSMENT
// =============================================================================

/// Activity state of one point of interest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EscalationState {
    pub matched_count: usize,
    pub score: f64,
    /// `score / matched_count`, 0 without matches
    pub velocity: f64,
    pub has_breaking: bool,
    pub level: EscalationLevel,
    /// Configured floor of the point, reported as-is
    pub baseline_level: EscalationLevel,
}

/// Short-window activity used only for overlay animation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActivityPulse {
    pub has_breaking: bool,
    pub matched_count: usize,
    /// Matching items per hour over the window
    pub velocity: f64,
}

/// Lower-cased distinct keywords of a point of interest.
fn normalized_keywords(poi: &Hotspot) -> BTreeSet<String> {
    poi.keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn distinct_matches(keywords: &BTreeSet<String>, title: &str) -> usize {
    let title = title.to_lowercase();
    keywords.iter().filter(|k| title.contains(k.as_str())).count()
}

/// Age at evaluation time; items dated in the future count as brand new.
fn age_of(item: &NewsItem, now: SystemTime) -> Duration {
    now.duration_since(item.published_at).unwrap_or(Duration::ZERO)
}

/// Scores hotspots against headlines.
pub struct EscalationScorer {
    policy: EscalationPolicy,
    alerts: Box<dyn AlertLookup>,
}

impl EscalationScorer {
    pub fn new(policy: EscalationPolicy) -> Self {
        Self::with_alerts(policy, FeedAlertFlag)
    }

    pub fn with_alerts(policy: EscalationPolicy, alerts: impl AlertLookup + 'static) -> Self {
        Self {
            policy,
            alerts: Box::new(alerts),
        }
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Full assessment of one point of interest.
    ///
    /// The level never drops below the point's baseline level, but a baseline
    /// alone lifts it to `Elevated` at most. `High` always needs breaking news,
    /// enough matches or enough score.
    pub fn assess(&self, poi: &Hotspot, items: &[NewsItem], now: SystemTime) -> EscalationState {
        let keywords = normalized_keywords(poi);
        let mut state = EscalationState::default();

        for item in items {
            let matches = distinct_matches(&keywords, &item.title);
            if matches == 0 {
                continue;
            }
            state.matched_count += 1;
            state.score += self.policy.keyword_weight * matches as f64;
            if self.alerts.is_breaking(item) {
                state.score += self.policy.breaking_bonus;
                state.has_breaking = true;
            }
            state.score += self.policy.recency_bonus(age_of(item, now));
        }

        state.velocity = if state.matched_count > 0 {
            state.score / state.matched_count as f64
        } else {
            0.0
        };
        state.level = self
            .policy
            .level_for(state.has_breaking, state.matched_count, state.score)
            .max(poi.baseline_level.min(EscalationLevel::Elevated));
        state.baseline_level = poi.baseline_level;
        state
    }

    /// Lightweight short-window pulse (no score).
    pub fn pulse(&self, poi: &Hotspot, items: &[NewsItem], now: SystemTime) -> ActivityPulse {
        let keywords = normalized_keywords(poi);
        let window = Duration::from_secs(self.policy.pulse_window_secs);
        let mut pulse = ActivityPulse::default();

        for item in items.iter().filter(|i| age_of(i, now) < window) {
            if distinct_matches(&keywords, &item.title) == 0 {
                continue;
            }
            pulse.matched_count += 1;
            pulse.has_breaking |= self.alerts.is_breaking(item);
        }
        pulse.velocity = pulse.matched_count as f64 / (window.as_secs_f64() / 3_600.0);
        pulse
    }

    /// Assesses every hotspot, keyed by hotspot id.
    pub fn assess_all(&self, hotspots: &[Hotspot], items: &[NewsItem], now: SystemTime) -> BTreeMap<String, EscalationState> {
        hotspots
            .iter()
            .map(|h| (h.id.clone(), self.assess(h, items, now)))
            .collect()
    }
}

impl std::fmt::Debug for EscalationScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationScorer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
