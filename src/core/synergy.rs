//! Trait synergy engine: cross-session Pearson correlations
//!
//! Input is the user's prior finalized-session trait averages, newest first.
//! Correlation itself is order-insensitive, but which K sessions enter the
//! window must be deterministic, so callers supply newest-first and the
//! engine truncates.

use std::f64::consts::TAU;

use crate::types::{
    CandidateInsight, CorrelationMatrix, GraphEdge, GraphNode, InsightKind, InsightSource,
    Surface, SynergyGraph, SynergyPayload, TraitKey,
};
use crate::{
    PAYLOAD_VERSION, SYNERGY_CANDIDATE_THRESHOLD, SYNERGY_LAYOUT_RADIUS, SYNERGY_MAX_SESSIONS,
    SYNERGY_MIN_SESSIONS, SYNERGY_STRONG_THRESHOLD,
};

/// One prior session's per-trait averages, in `TraitKey::ALL` order
pub type TraitVector = [f64; 6];

/// Trait synergy engine
#[derive(Debug, Default)]
pub struct TraitSynergyEngine;

impl TraitSynergyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compute the synergy payload from prior-session trait vectors
    /// (newest first, current session excluded by the caller).
    ///
    /// Below the minimum history the matrix degenerates to the identity,
    /// which is a valid output, not an error.
    pub fn compute(
        &self,
        user_id: &str,
        session_id: &str,
        history: &[TraitVector],
    ) -> SynergyPayload {
        let window = &history[..history.len().min(SYNERGY_MAX_SESSIONS)];

        let matrix = if window.len() < SYNERGY_MIN_SESSIONS {
            CorrelationMatrix::identity()
        } else {
            correlate(window)
        };

        SynergyPayload {
            version: PAYLOAD_VERSION,
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            sessions_used: window.len(),
            graph_data: build_graph(&matrix),
            correlation_matrix: matrix,
            emotion_links: Default::default(),
            generated_at: chrono::Utc::now(),
        }
    }

    /// High-correlation pairs become premium insight candidates restricted
    /// to the analytics surfaces.
    pub fn candidates(&self, payload: &SynergyPayload) -> Vec<CandidateInsight> {
        let mut out = Vec::new();
        for (ai, a) in TraitKey::ALL.iter().enumerate() {
            for b in TraitKey::ALL.iter().skip(ai + 1) {
                let r = payload.correlation_matrix.get(*a, *b);
                if r.abs() < SYNERGY_CANDIDATE_THRESHOLD {
                    continue;
                }
                let sign = if r >= 0.0 { "positive" } else { "negative" };
                let score = (100.0 * r.abs()).round() as i32;
                out.push(CandidateInsight {
                    id: format!("synergy_{}_{}_{}_v1", a.key(), b.key(), sign),
                    kind: InsightKind::GeneralTip,
                    source: InsightSource::Synergy,
                    category: "synergy".to_string(),
                    priority: score,
                    weight: score,
                    title: Some(pair_title(*a, *b, r)),
                    body: Some(pair_body(*a, *b, r)),
                    is_premium: true,
                    surfaces: [Surface::MissionEnd, Surface::SynergyMap]
                        .into_iter()
                        .collect(),
                    related_turn_index: None,
                });
            }
        }
        out
    }
}

/// Pearson correlation for every unordered trait pair, clamped to [-1, 1]
/// and rounded to 2 decimals; zero variance on either side yields 0.
fn correlate(window: &[TraitVector]) -> CorrelationMatrix {
    let mut matrix = CorrelationMatrix::identity();
    for (ai, a) in TraitKey::ALL.iter().enumerate() {
        for b in TraitKey::ALL.iter().skip(ai + 1) {
            let xs: Vec<f64> = window.iter().map(|v| v[ai]).collect();
            let ys: Vec<f64> = window.iter().map(|v| v[b.index()]).collect();
            let r = pearson(&xs, &ys);
            matrix.set(*a, *b, r);
            matrix.set(*b, *a, r);
        }
    }
    matrix
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    let r = (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0);
    (r * 100.0).round() / 100.0
}

/// Fixed circular layout: the angle is a function of the trait index only,
/// so the same six traits always render at the same coordinates.
fn build_graph(matrix: &CorrelationMatrix) -> SynergyGraph {
    let nodes = TraitKey::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let angle = TAU * i as f64 / TraitKey::ALL.len() as f64;
            GraphNode {
                trait_key: t.key().to_string(),
                label: t.label().to_string(),
                x: round1(SYNERGY_LAYOUT_RADIUS * angle.cos()),
                y: round1(SYNERGY_LAYOUT_RADIUS * angle.sin()),
            }
        })
        .collect();

    let mut edges = Vec::new();
    for (ai, a) in TraitKey::ALL.iter().enumerate() {
        for b in TraitKey::ALL.iter().skip(ai + 1) {
            edges.push(GraphEdge {
                from: a.key().to_string(),
                to: b.key().to_string(),
                weight: matrix.get(*a, *b),
            });
        }
    }

    SynergyGraph { nodes, edges }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn pair_title(a: TraitKey, b: TraitKey, r: f64) -> String {
    let strong = r.abs() >= SYNERGY_STRONG_THRESHOLD;
    if r >= 0.0 {
        if strong {
            format!("{} fuels {}", a.label(), b.label())
        } else {
            format!("{} and {} move together", a.label(), b.label())
        }
    } else if strong {
        format!("{} trades off against {}", a.label(), b.label())
    } else {
        format!("{} can crowd out {}", a.label(), b.label())
    }
}

fn pair_body(a: TraitKey, b: TraitKey, r: f64) -> String {
    let pct = (r.abs() * 100.0).round();
    let strong = r.abs() >= SYNERGY_STRONG_THRESHOLD;
    if r >= 0.0 {
        if strong {
            format!(
                "Across your recent sessions, {} and {} rise and fall together ({:.0}% \
                 correlation). Lean on one to lift the other.",
                a.label(),
                b.label(),
                pct
            )
        } else {
            format!(
                "Your {} and {} show a moderate link ({:.0}% correlation) across recent \
                 sessions. Improving one tends to nudge the other.",
                a.label(),
                b.label(),
                pct
            )
        }
    } else if strong {
        format!(
            "There is a strong trade-off between your {} and {} ({:.0}% inverse \
             correlation): when one climbs, the other reliably drops. Budget for it.",
            a.label(),
            b.label(),
            pct
        )
    } else {
        format!(
            "Your {} and {} pull against each other somewhat ({:.0}% inverse \
             correlation). Watch for moments where pushing one costs the other.",
            a.label(),
            b.label(),
            pct
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn vectors(n: usize, f: impl Fn(usize) -> TraitVector) -> Vec<TraitVector> {
        (0..n).map(f).collect()
    }

    #[test]
    fn test_below_minimum_yields_identity() {
        let engine = TraitSynergyEngine::new();
        let history = vectors(4, |_| [50.0; 6]);
        let payload = engine.compute("u1", "s1", &history);
        assert_eq!(payload.sessions_used, 4);
        assert_eq!(
            payload
                .correlation_matrix
                .get(TraitKey::Confidence, TraitKey::Humor),
            0.0
        );
        assert_eq!(
            payload
                .correlation_matrix
                .get(TraitKey::Humor, TraitKey::Humor),
            1.0
        );
    }

    #[test]
    fn test_window_truncates_to_max() {
        let engine = TraitSynergyEngine::new();
        let history = vectors(30, |i| [i as f64; 6]);
        let payload = engine.compute("u1", "s1", &history);
        assert_eq!(payload.sessions_used, SYNERGY_MAX_SESSIONS);
    }

    #[test]
    fn test_perfect_positive_correlation() {
        // confidence and humor increase in lockstep
        let history = vectors(8, |i| {
            let v = 40.0 + i as f64 * 3.0;
            [v, 50.0, v, 50.0, 50.0, 50.0]
        });
        let matrix = correlate(&history);
        assert_eq!(matrix.get(TraitKey::Confidence, TraitKey::Humor), 1.0);
    }

    #[test]
    fn test_perfect_negative_correlation() {
        let history = vectors(8, |i| {
            let v = i as f64 * 4.0;
            [40.0 + v, 50.0, 90.0 - v, 50.0, 50.0, 50.0]
        });
        let matrix = correlate(&history);
        assert_eq!(matrix.get(TraitKey::Confidence, TraitKey::Humor), -1.0);
    }

    #[test]
    fn test_constant_vector_yields_zero() {
        let history = vectors(8, |i| [50.0, 30.0 + i as f64, 50.0, 50.0, 50.0, 50.0]);
        let matrix = correlate(&history);
        assert_eq!(matrix.get(TraitKey::Confidence, TraitKey::Clarity), 0.0);
    }

    #[test]
    fn test_correlation_bounds_and_symmetry() {
        let history = vectors(10, |i| {
            [
                40.0 + (i as f64 * 7.0) % 23.0,
                60.0 - (i as f64 * 3.0) % 17.0,
                30.0 + (i as f64 * 11.0) % 31.0,
                50.0 + (i as f64 * 5.0) % 13.0,
                45.0 + (i as f64 * 2.0) % 9.0,
                55.0 - (i as f64 * 13.0) % 29.0,
            ]
        });
        let matrix = correlate(&history);
        for a in TraitKey::ALL {
            for b in TraitKey::ALL {
                let r = matrix.get(a, b);
                assert!((-1.0..=1.0).contains(&r));
                assert_eq!(r, matrix.get(b, a));
            }
            assert_eq!(matrix.get(a, a), 1.0);
        }
    }

    #[test]
    fn test_layout_is_data_independent() {
        let g1 = build_graph(&CorrelationMatrix::identity());
        let history = vectors(8, |i| [i as f64, 50.0, 90.0 - i as f64, 50.0, 50.0, 50.0]);
        let g2 = build_graph(&correlate(&history));
        for (n1, n2) in g1.nodes.iter().zip(&g2.nodes) {
            assert_eq!((n1.x, n1.y), (n2.x, n2.y));
        }
        assert_eq!(g1.nodes[0].x, 100.0);
        assert_eq!(g1.edges.len(), 15);
    }

    #[test]
    fn test_candidates_premium_and_thresholded() {
        let engine = TraitSynergyEngine::new();
        let history = vectors(8, |i| {
            let v = 40.0 + i as f64 * 3.0;
            [v, 50.0, v, 50.0, 50.0, 50.0]
        });
        let payload = engine.compute("u1", "s1", &history);
        let candidates = engine.candidates(&payload);
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.id, "synergy_confidence_humor_positive_v1");
        assert!(c.is_premium);
        assert_eq!(c.priority, 100);
        assert!(c.surfaces.contains(&Surface::SynergyMap));
    }

    #[test]
    fn test_negative_candidate_id() {
        let engine = TraitSynergyEngine::new();
        let history = vectors(8, |i| {
            let v = i as f64 * 4.0;
            [40.0 + v, 50.0, 90.0 - v, 50.0, 50.0, 50.0]
        });
        let payload = engine.compute("u1", "s1", &history);
        let candidates = engine.candidates(&payload);
        assert_eq!(candidates[0].id, "synergy_confidence_humor_negative_v1");
        assert!(candidates[0].title.as_ref().unwrap().contains("trade"));
    }
}
