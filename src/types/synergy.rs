//! Trait synergy types
//!
//! The correlation matrix is symmetric with a unit diagonal and is recomputed
//! once per finalized session from the user's trailing history; each
//! recomputation supersedes the previous payload for that session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::TraitKey;

/// Pairwise Pearson correlations over the six traits, keyed by trait key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// matrix[traitA][traitB] in [-1, 1]; symmetric; diagonal 1.0
    pub values: HashMap<String, HashMap<String, f64>>,
}

impl CorrelationMatrix {
    /// Identity matrix: ones on the diagonal, zeros elsewhere. Emitted when
    /// the user has too little history for a real correlation.
    pub fn identity() -> Self {
        let mut values = HashMap::new();
        for a in TraitKey::ALL {
            let mut row = HashMap::new();
            for b in TraitKey::ALL {
                row.insert(b.key().to_string(), if a == b { 1.0 } else { 0.0 });
            }
            values.insert(a.key().to_string(), row);
        }
        Self { values }
    }

    pub fn get(&self, a: TraitKey, b: TraitKey) -> f64 {
        self.values
            .get(a.key())
            .and_then(|row| row.get(b.key()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set(&mut self, a: TraitKey, b: TraitKey, r: f64) {
        self.values
            .entry(a.key().to_string())
            .or_default()
            .insert(b.key().to_string(), r);
    }
}

/// A node in the fixed circular synergy graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub trait_key: String,
    pub label: String,
    /// Deterministic layout coordinates (angle is a function of trait index,
    /// never of the data)
    pub x: f64,
    pub y: f64,
}

/// An edge carrying the pair's correlation weight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    /// Same value as the correlation matrix entry
    pub weight: f64,
}

/// Fixed circular layout plus weighted edges
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynergyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Reserved cross-links between traits and emotional-timeline features
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmotionLinks {
    #[serde(default)]
    pub links: Vec<EmotionLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionLink {
    pub trait_key: String,
    pub mood_dimension: String,
    pub weight: f64,
}

/// Persisted synergy payload, keyed by session id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynergyPayload {
    pub version: u32,
    pub session_id: String,
    pub user_id: String,
    /// Number of prior sessions the matrix was computed from
    pub sessions_used: usize,
    pub correlation_matrix: CorrelationMatrix,
    #[serde(default)]
    pub graph_data: SynergyGraph,
    #[serde(default)]
    pub emotion_links: EmotionLinks,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_matrix_shape() {
        let m = CorrelationMatrix::identity();
        assert_eq!(m.get(TraitKey::Humor, TraitKey::Humor), 1.0);
        assert_eq!(m.get(TraitKey::Humor, TraitKey::Clarity), 0.0);
        assert_eq!(m.values.len(), 6);
    }

    #[test]
    fn test_set_get_roundtrip() {
        let mut m = CorrelationMatrix::identity();
        m.set(TraitKey::Confidence, TraitKey::Humor, 0.62);
        assert_eq!(m.get(TraitKey::Confidence, TraitKey::Humor), 0.62);
    }

    #[test]
    fn test_legacy_payload_without_graph_normalizes() {
        let json = r#"{
            "version": 1,
            "session_id": "s1",
            "user_id": "u1",
            "sessions_used": 0,
            "correlation_matrix": { "values": {} },
            "generated_at": "2024-01-01T00:00:00Z"
        }"#;
        let payload: SynergyPayload = serde_json::from_str(json).unwrap();
        assert!(payload.graph_data.nodes.is_empty());
        assert!(payload.emotion_links.links.is_empty());
    }
}
