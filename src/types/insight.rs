//! Insight catalog and candidate types
//!
//! Templates are immutable catalog entries created once at startup.
//! Candidates are transient, produced per session evaluation; a candidate id
//! is globally unique per logical insight instance and is the unit of
//! cooldown tracking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::Surface;

/// The four template kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightKind {
    GateFail,
    PositiveHook,
    NegativePattern,
    GeneralTip,
}

/// Which producer a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightSource {
    Gates,
    Hooks,
    Patterns,
    General,
    Mood,
    Synergy,
    Analyzer,
}

impl InsightSource {
    pub fn label(&self) -> &'static str {
        match self {
            InsightSource::Gates => "gates",
            InsightSource::Hooks => "hooks",
            InsightSource::Patterns => "patterns",
            InsightSource::General => "general",
            InsightSource::Mood => "mood",
            InsightSource::Synergy => "synergy",
            InsightSource::Analyzer => "analyzer",
        }
    }
}

/// Optional trigger requirement on a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKey {
    Gate(String),
    Hook(String),
    Pattern(String),
}

/// Immutable catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightTemplate {
    /// Globally stable id, never reused
    pub id: String,
    pub kind: InsightKind,
    /// Free-form tag, e.g. "opening", "humor", "escalation"
    pub category: String,
    /// Tie-break priority within a kind
    pub weight: i32,
    /// Informational: suggested missions before this id repeats
    pub cooldown_missions: u32,
    pub title: String,
    /// May embed computed values via `{placeholders}` at candidate build time
    pub body: String,
    /// Trigger requirement; None for the unconditional general-tip pool
    #[serde(default)]
    pub requires: Option<TriggerKey>,
}

/// Transient candidate produced per session evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateInsight {
    pub id: String,
    pub kind: InsightKind,
    pub source: InsightSource,
    pub category: String,
    /// Source-tier priority (sort key 1)
    pub priority: i32,
    /// Tie-break weight (sort key 2; sort key 3 is lexical id)
    pub weight: i32,
    /// Self-contained rendered title/body, no catalog lookup needed
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub is_premium: bool,
    /// UI surfaces this candidate is eligible for; empty = all surfaces
    #[serde(default)]
    pub surfaces: BTreeSet<Surface>,
    #[serde(default)]
    pub related_turn_index: Option<usize>,
}

impl CandidateInsight {
    /// Does this candidate match the given surface? Empty set matches all.
    pub fn matches_surface(&self, surface: &Surface) -> bool {
        self.surfaces.is_empty() || self.surfaces.contains(surface)
    }
}

/// A selected card as persisted inside a rotation pack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightCard {
    pub id: String,
    pub kind: InsightKind,
    pub source: InsightSource,
    pub category: String,
    pub title: String,
    pub body: String,
    pub is_premium: bool,
    #[serde(default)]
    pub related_turn_index: Option<usize>,
}

impl From<&CandidateInsight> for InsightCard {
    fn from(c: &CandidateInsight) -> Self {
        Self {
            id: c.id.clone(),
            kind: c.kind,
            source: c.source,
            category: c.category.clone(),
            title: c.title.clone().unwrap_or_default(),
            body: c.body.clone().unwrap_or_default(),
            is_premium: c.is_premium,
            related_turn_index: c.related_turn_index,
        }
    }
}

/// Legacy deep-insights payload: three category buckets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeepInsightsPayload {
    pub version: u32,
    /// GateFail cards
    #[serde(default)]
    pub gate: Vec<InsightCard>,
    /// PositiveHook cards (plus tip spill)
    #[serde(default)]
    pub positive: Vec<InsightCard>,
    /// NegativePattern cards (plus tip spill)
    #[serde(default)]
    pub negative: Vec<InsightCard>,
}

impl DeepInsightsPayload {
    pub fn total(&self) -> usize {
        self.gate.len() + self.positive.len() + self.negative.len()
    }

    /// All selected ids across buckets
    pub fn ids(&self) -> Vec<String> {
        self.gate
            .iter()
            .chain(&self.positive)
            .chain(&self.negative)
            .map(|c| c.id.clone())
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str) -> CandidateInsight {
        CandidateInsight {
            id: id.to_string(),
            kind: InsightKind::GeneralTip,
            source: InsightSource::General,
            category: "general".to_string(),
            priority: 40,
            weight: 10,
            title: None,
            body: None,
            is_premium: false,
            surfaces: BTreeSet::new(),
            related_turn_index: None,
        }
    }

    #[test]
    fn test_empty_surfaces_matches_all() {
        let c = candidate("tip_x_v1");
        assert!(c.matches_surface(&Surface::MissionEnd));
        assert!(c.matches_surface(&Surface::Other("weird".to_string())));
    }

    #[test]
    fn test_restricted_surfaces() {
        let mut c = candidate("syn_x_v1");
        c.surfaces.insert(Surface::SynergyMap);
        assert!(c.matches_surface(&Surface::SynergyMap));
        assert!(!c.matches_surface(&Surface::MissionEnd));
    }

    #[test]
    fn test_card_from_candidate_defaults_empty_text() {
        let card = InsightCard::from(&candidate("tip_y_v1"));
        assert_eq!(card.id, "tip_y_v1");
        assert_eq!(card.title, "");
    }
}
