//! Typed signal buckets extracted from a finished session
//!
//! Signals feed the deep-insight selector: failed gates, positive hooks,
//! negative patterns and an aggregate trait snapshot, plus evidence messages
//! at the score extremes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::TraitKey;

/// Which stage of the resolver produced the hook/pattern signals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalOrigin {
    /// Structured trigger facts supplied with the session
    Structured,
    /// Derived from per-message tag lists (legacy sessions)
    #[default]
    Tags,
}

/// A gate the session failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedGate {
    pub gate_key: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A positive hook with normalized strength
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositiveHook {
    pub hook_key: String,
    /// min(1, occurrences / 3)
    pub strength: f64,
    #[serde(default)]
    pub turn_index: Option<usize>,
}

/// A negative pattern with normalized severity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegativePattern {
    pub pattern_key: String,
    /// min(1, occurrences / 2)
    pub severity: f64,
    #[serde(default)]
    pub turn_index: Option<usize>,
}

/// Per-trait mean over all user messages (invalid samples excluded)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraitSnapshot {
    pub means: HashMap<String, f64>,
}

impl TraitSnapshot {
    pub fn mean(&self, key: TraitKey) -> f64 {
        self.means.get(key.key()).copied().unwrap_or(0.0)
    }

    /// Highest-mean trait, ties broken by fixed trait order
    pub fn strongest(&self) -> (TraitKey, f64) {
        let mut best = (TraitKey::Confidence, f64::MIN);
        for key in TraitKey::ALL {
            let v = self.mean(key);
            if v > best.1 {
                best = (key, v);
            }
        }
        best
    }

    /// Lowest-mean trait, ties broken by fixed trait order
    pub fn weakest(&self) -> (TraitKey, f64) {
        let mut worst = (TraitKey::Confidence, f64::MAX);
        for key in TraitKey::ALL {
            let v = self.mean(key);
            if v < worst.1 {
                worst = (key, v);
            }
        }
        worst
    }
}

/// A message attached as evidence (score extreme)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceMessage {
    pub turn_index: usize,
    pub score: f64,
}

/// Complete signal bundle for one session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSignals {
    #[serde(default)]
    pub failed_gates: Vec<FailedGate>,
    #[serde(default)]
    pub positive_hooks: Vec<PositiveHook>,
    #[serde(default)]
    pub negative_patterns: Vec<NegativePattern>,
    #[serde(default)]
    pub trait_snapshot: TraitSnapshot,
    /// Top-3 scored user messages, best first
    #[serde(default)]
    pub top_messages: Vec<EvidenceMessage>,
    /// Bottom-3 scored user messages, worst first
    #[serde(default)]
    pub bottom_messages: Vec<EvidenceMessage>,
    /// Which resolver stage produced hooks/patterns
    #[serde(default = "default_origin")]
    pub origin: SignalOrigin,
}

fn default_origin() -> SignalOrigin {
    SignalOrigin::Tags
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strongest_weakest() {
        let mut snap = TraitSnapshot::default();
        snap.means.insert("confidence".to_string(), 72.0);
        snap.means.insert("humor".to_string(), 31.0);
        snap.means.insert("clarity".to_string(), 55.0);
        assert_eq!(snap.strongest().0, TraitKey::Confidence);
        // Missing traits default to 0 and win "weakest"
        assert_eq!(snap.weakest().1, 0.0);
    }

    #[test]
    fn test_legacy_signals_normalize() {
        let json = r#"{ "failed_gates": [] }"#;
        let signals: SessionSignals = serde_json::from_str(json).unwrap();
        assert!(signals.positive_hooks.is_empty());
        assert_eq!(signals.origin, SignalOrigin::Tags);
    }
}
