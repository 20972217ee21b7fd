//! Rotation pack, surfaces, quotas and cooldown history
//!
//! The persisted pack is viewer-agnostic (premium and free cards together);
//! the viewer-specific view is derived on every read, never recomputed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{InsightCard, InsightSource};

/// A named UI context with its own quota table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Surface {
    MissionEnd,
    Analyzer,
    SynergyMap,
    MoodTimeline,
    /// Unknown surface: gets the minimal default quota table
    Other(String),
}

impl Surface {
    pub fn as_str(&self) -> &str {
        match self {
            Surface::MissionEnd => "MISSION_END",
            Surface::Analyzer => "ANALYZER",
            Surface::SynergyMap => "SYNERGY_MAP",
            Surface::MoodTimeline => "MOOD_TIMELINE",
            Surface::Other(s) => s,
        }
    }
}

impl From<String> for Surface {
    fn from(s: String) -> Self {
        match s.as_str() {
            "MISSION_END" => Surface::MissionEnd,
            "ANALYZER" => Surface::Analyzer,
            "SYNERGY_MAP" => Surface::SynergyMap,
            "MOOD_TIMELINE" => Surface::MoodTimeline,
            _ => Surface::Other(s),
        }
    }
}

impl From<Surface> for String {
    fn from(s: Surface) -> Self {
        s.as_str().to_string()
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-source selection caps for one surface; zero excludes the source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaTable {
    pub gate: usize,
    pub hook: usize,
    pub pattern: usize,
    pub tip: usize,
    pub mood: usize,
    pub synergy: usize,
    pub analyzer: usize,
}

impl QuotaTable {
    /// Quota table for a surface; pure function of the surface
    pub fn for_surface(surface: &Surface) -> Self {
        match surface {
            Surface::MissionEnd => Self {
                gate: 2,
                hook: 2,
                pattern: 1,
                tip: 3,
                mood: 1,
                synergy: 1,
                analyzer: 0,
            },
            Surface::Analyzer => Self {
                analyzer: 2,
                ..Self::default()
            },
            Surface::SynergyMap => Self {
                synergy: 3,
                ..Self::default()
            },
            Surface::MoodTimeline => Self {
                mood: 3,
                ..Self::default()
            },
            Surface::Other(_) => Self {
                gate: 1,
                hook: 1,
                pattern: 1,
                tip: 1,
                ..Self::default()
            },
        }
    }

    /// Cap for a candidate source
    pub fn for_source(&self, source: InsightSource) -> usize {
        match source {
            InsightSource::Gates => self.gate,
            InsightSource::Hooks => self.hook,
            InsightSource::Patterns => self.pattern,
            InsightSource::General => self.tip,
            InsightSource::Mood => self.mood,
            InsightSource::Synergy => self.synergy,
            InsightSource::Analyzer => self.analyzer,
        }
    }
}

/// Metadata persisted with (and recomputed on read of) a rotation pack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RotationMeta {
    /// Seed string the build used
    #[serde(default)]
    pub seed: String,
    /// Ids excluded by cooldown during the build
    #[serde(default)]
    pub excluded_ids: Vec<String>,
    /// Ids visible to the current viewer (recomputed on read)
    #[serde(default)]
    pub picked_ids: Vec<String>,
    #[serde(default)]
    pub quotas: QuotaTable,
    /// Candidates available before quota application
    #[serde(default)]
    pub total_available: usize,
    /// Cards hidden from this viewer because they are premium-only
    #[serde(default)]
    pub filtered_because_premium: usize,
    #[serde(default)]
    pub is_premium_user: bool,
    /// Premium-only card ids (empty for premium viewers)
    #[serde(default)]
    pub premium_insight_ids: Vec<String>,
}

/// Persisted, viewer-agnostic rotation result for one (session, surface) pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RotationPack {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub session_id: String,
    #[serde(default = "default_surface")]
    pub surface: Surface,
    /// Ordered union of premium and free cards (the base pack)
    #[serde(default)]
    pub selected_insights: Vec<InsightCard>,
    /// Surface-specific analyzer paragraphs
    #[serde(default)]
    pub selected_paragraphs: Vec<InsightCard>,
    #[serde(default)]
    pub meta: RotationMeta,
}

fn default_surface() -> Surface {
    Surface::Other(String::new())
}

impl Default for Surface {
    fn default() -> Self {
        default_surface()
    }
}

/// Read-only aggregate over a user's recent prior sessions, used purely for
/// cooldown exclusion; rebuilt fresh from persisted documents each time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub insight_ids: BTreeSet<String>,
    #[serde(default)]
    pub mood_ids: BTreeSet<String>,
    #[serde(default)]
    pub paragraph_ids: BTreeSet<String>,
    #[serde(default)]
    pub synergy_ids: BTreeSet<String>,
}

impl History {
    /// Unified cooldown set: union of all four producer id-sets
    pub fn all_ids(&self) -> BTreeSet<String> {
        self.insight_ids
            .iter()
            .chain(&self.mood_ids)
            .chain(&self.paragraph_ids)
            .chain(&self.synergy_ids)
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.insight_ids.contains(id)
            || self.mood_ids.contains(id)
            || self.paragraph_ids.contains(id)
            || self.synergy_ids.contains(id)
    }
}

// =============================================================================
// TESTS
// =============================================================================
