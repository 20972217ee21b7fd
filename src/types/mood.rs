//! Mood timeline types
//!
//! One MoodSnapshot per user message, strictly in turn order. The smoothed
//! score and flow value at index i depend on index i-1, so the sequence is
//! immutable once computed.

use serde::{Deserialize, Serialize};

/// Discrete mood classification of one point on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoodState {
    Cold,
    Neutral,
    Warm,
    Tense,
    Flow,
}

impl MoodState {
    /// Get ANSI-friendly color name for terminal display
    pub fn color(&self) -> colored::Color {
        match self {
            MoodState::Cold => colored::Color::Blue,
            MoodState::Neutral => colored::Color::White,
            MoodState::Warm => colored::Color::Yellow,
            MoodState::Tense => colored::Color::Red,
            MoodState::Flow => colored::Color::Green,
        }
    }

    /// Get emoji for state
    pub fn emoji(&self) -> &'static str {
        match self {
            MoodState::Cold => "🧊",
            MoodState::Neutral => "😐",
            MoodState::Warm => "🔥",
            MoodState::Tense => "⚡",
            MoodState::Flow => "🌊",
        }
    }
}

impl std::fmt::Display for MoodState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MoodState::Cold => "COLD",
            MoodState::Neutral => "NEUTRAL",
            MoodState::Warm => "WARM",
            MoodState::Tense => "TENSE",
            MoodState::Flow => "FLOW",
        };
        write!(f, "{}", name)
    }
}

/// One point on the emotional timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodSnapshot {
    pub turn_index: usize,
    /// Raw message score 0-100
    pub raw_score: f64,
    /// EMA-smoothed mood score 0-100
    pub smoothed_mood_score: f64,
    pub mood_state: MoodState,
    pub tension: f64,
    pub warmth: f64,
    pub vibe: f64,
    pub flow: f64,
}

/// Named multi-point shape detected over a contiguous sub-sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArcKind {
    RisingWarmth,
    RecoveryArc,
    TestingSpike,
    CoolDown,
}

impl ArcKind {
    /// Stable slug used in mood candidate ids
    pub fn slug(&self) -> &'static str {
        match self {
            ArcKind::RisingWarmth => "rising_warmth",
            ArcKind::RecoveryArc => "recovery_arc",
            ArcKind::TestingSpike => "testing_spike",
            ArcKind::CoolDown => "cool_down",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArcKind::RisingWarmth => "Rising warmth",
            ArcKind::RecoveryArc => "Recovery arc",
            ArcKind::TestingSpike => "Testing spike",
            ArcKind::CoolDown => "Cool-down",
        }
    }
}

/// A detected arc with its supporting magnitude
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodArc {
    pub kind: ArcKind,
    /// Turn index where the shape starts
    pub start_index: usize,
    /// Turn index where the shape ends
    pub end_index: usize,
    /// Size of the move that triggered detection (score or tension points)
    pub magnitude: f64,
}

/// Per-mission configuration for timeline computation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoodConfig {
    /// Skip arc detection entirely (snapshots are still produced)
    pub detect_arcs: bool,
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self { detect_arcs: true }
    }
}

/// Persisted timeline payload, keyed by session id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodTimelinePayload {
    pub version: u32,
    pub session_id: String,
    pub snapshots: Vec<MoodSnapshot>,
    #[serde(default)]
    pub arcs: Vec<MoodArc>,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_state_serde_screaming_case() {
        let json = serde_json::to_string(&MoodState::Flow).unwrap();
        assert_eq!(json, "\"FLOW\"");
        let back: MoodState = serde_json::from_str("\"COLD\"").unwrap();
        assert_eq!(back, MoodState::Cold);
    }

    #[test]
    fn test_arc_slug_stability() {
        assert_eq!(ArcKind::RisingWarmth.slug(), "rising_warmth");
        assert_eq!(ArcKind::CoolDown.slug(), "cool_down");
    }

    #[test]
    fn test_payload_without_arcs_field_normalizes() {
        let json = r#"{
            "version": 1,
            "session_id": "s1",
            "snapshots": [],
            "generated_at": "2024-01-01T00:00:00Z"
        }"#;
        let payload: MoodTimelinePayload = serde_json::from_str(json).unwrap();
        assert!(payload.arcs.is_empty());
    }
}
