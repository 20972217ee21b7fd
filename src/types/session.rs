//! Session snapshot contract
//!
//! A SessionSnapshot is the normalized view of a finished session handed to
//! the engines by an external loader: role-tagged, turn-ordered messages with
//! 0-100 trait values, hook/pattern tag lists and an optional message score.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The six fixed traits scored on every user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraitKey {
    Confidence,
    Clarity,
    Humor,
    TensionControl,
    EmotionalWarmth,
    Dominance,
}

impl TraitKey {
    /// All traits in fixed index order (load-bearing for synergy ids and
    /// the circular graph layout)
    pub const ALL: [TraitKey; 6] = [
        TraitKey::Confidence,
        TraitKey::Clarity,
        TraitKey::Humor,
        TraitKey::TensionControl,
        TraitKey::EmotionalWarmth,
        TraitKey::Dominance,
    ];

    /// Stable camelCase key used in trait maps and insight ids
    pub fn key(&self) -> &'static str {
        match self {
            TraitKey::Confidence => "confidence",
            TraitKey::Clarity => "clarity",
            TraitKey::Humor => "humor",
            TraitKey::TensionControl => "tensionControl",
            TraitKey::EmotionalWarmth => "emotionalWarmth",
            TraitKey::Dominance => "dominance",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            TraitKey::Confidence => "Confidence",
            TraitKey::Clarity => "Clarity",
            TraitKey::Humor => "Humor",
            TraitKey::TensionControl => "Tension Control",
            TraitKey::EmotionalWarmth => "Emotional Warmth",
            TraitKey::Dominance => "Dominance",
        }
    }

    /// Position in `ALL`
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }
}

impl std::fmt::Display for TraitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Partner,
}

/// One scored message in a finished session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    /// Zero-based position in the session (ordering is load-bearing)
    pub turn_index: usize,
    pub role: Role,
    /// Overall message score 0-100, absent for partner messages
    #[serde(default)]
    pub score: Option<f64>,
    /// Trait values 0-100 keyed by `TraitKey::key()`
    #[serde(default)]
    pub traits: HashMap<String, f64>,
    /// Positive hook tags detected on this message
    #[serde(default)]
    pub hooks: Vec<String>,
    /// Negative pattern tags detected on this message
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl SessionMessage {
    /// Trait value, if present and usable (finite, within 0-100)
    pub fn trait_value(&self, key: TraitKey) -> Option<f64> {
        self.traits
            .get(key.key())
            .copied()
            .filter(|v| v.is_finite() && (0.0..=100.0).contains(v))
    }
}

/// Auxiliary gate outcome attached to a finalized session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateOutcome {
    pub gate_key: String,
    pub passed: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Auxiliary structured hook trigger (preferred over message tags)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookTrigger {
    pub hook_key: String,
    pub occurrences: u32,
    #[serde(default)]
    pub turn_index: Option<usize>,
}

/// Auxiliary structured pattern detection (preferred over message tags)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDetection {
    pub pattern_key: String,
    pub occurrences: u32,
    #[serde(default)]
    pub turn_index: Option<usize>,
}

/// Normalized view of a finished session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_id: String,
    /// Mission template this session ran against, if any
    #[serde(default)]
    pub template_id: Option<String>,
    pub finalized: bool,
    /// Turn-ordered messages (user and partner interleaved)
    pub messages: Vec<SessionMessage>,
    /// Structured gate outcomes; empty for legacy sessions
    #[serde(default)]
    pub gate_outcomes: Vec<GateOutcome>,
    /// Structured hook triggers; empty for legacy sessions
    #[serde(default)]
    pub hook_triggers: Vec<HookTrigger>,
    /// Structured pattern detections; empty for legacy sessions
    #[serde(default)]
    pub pattern_detections: Vec<PatternDetection>,
}

impl SessionSnapshot {
    /// User-authored messages in turn order
    pub fn user_messages(&self) -> Vec<&SessionMessage> {
        self.messages.iter().filter(|m| m.role == Role::User).collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_key_order_is_stable() {
        assert_eq!(TraitKey::Confidence.index(), 0);
        assert_eq!(TraitKey::Dominance.index(), 5);
        assert_eq!(TraitKey::TensionControl.key(), "tensionControl");
    }

    #[test]
    fn test_trait_value_rejects_invalid() {
        let mut traits = HashMap::new();
        traits.insert("confidence".to_string(), 150.0);
        traits.insert("humor".to_string(), f64::NAN);
        traits.insert("clarity".to_string(), 60.0);
        let msg = SessionMessage {
            turn_index: 0,
            role: Role::User,
            score: Some(50.0),
            traits,
            hooks: vec![],
            patterns: vec![],
        };
        assert_eq!(msg.trait_value(TraitKey::Confidence), None);
        assert_eq!(msg.trait_value(TraitKey::Humor), None);
        assert_eq!(msg.trait_value(TraitKey::Clarity), Some(60.0));
    }

    #[test]
    fn test_user_messages_filters_partner() {
        let snapshot = SessionSnapshot {
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            template_id: None,
            finalized: true,
            messages: vec![
                SessionMessage {
                    turn_index: 0,
                    role: Role::User,
                    score: Some(40.0),
                    traits: HashMap::new(),
                    hooks: vec![],
                    patterns: vec![],
                },
                SessionMessage {
                    turn_index: 1,
                    role: Role::Partner,
                    score: None,
                    traits: HashMap::new(),
                    hooks: vec![],
                    patterns: vec![],
                },
            ],
            gate_outcomes: vec![],
            hook_triggers: vec![],
            pattern_detections: vec![],
        };
        assert_eq!(snapshot.user_messages().len(), 1);
    }

    #[test]
    fn test_legacy_session_deserializes_without_structured_facts() {
        let json = r#"{
            "session_id": "s1",
            "user_id": "u1",
            "finalized": true,
            "messages": []
        }"#;
        let snapshot: SessionSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.gate_outcomes.is_empty());
        assert!(snapshot.hook_triggers.is_empty());
    }
}
