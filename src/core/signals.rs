//! Signal extraction from a finished session
//!
//! Two-stage resolver: structured trigger facts are preferred when the
//! session carries them; legacy sessions fall back to counting per-message
//! tags. Each stage is testable on its own.

use std::collections::HashMap;

use crate::types::{
    EngineError, EvidenceMessage, FailedGate, NegativePattern, PositiveHook, SessionSignals,
    SessionSnapshot, SignalOrigin, TraitKey, TraitSnapshot,
};
use crate::{EVIDENCE_COUNT, HOOK_STRENGTH_DIVISOR, PATTERN_SEVERITY_DIVISOR};

/// Signal extractor
#[derive(Debug, Default)]
pub struct SignalExtractor;

impl SignalExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Build the full signal bundle for a session.
    ///
    /// Fails only on the empty-session precondition; absent structured facts
    /// are not an error, they select the tag fallback stage.
    pub fn extract(&self, snapshot: &SessionSnapshot) -> Result<SessionSignals, EngineError> {
        let messages = snapshot.user_messages();
        if messages.is_empty() {
            return Err(EngineError::EmptySession {
                session_id: snapshot.session_id.clone(),
            });
        }

        let failed_gates = snapshot
            .gate_outcomes
            .iter()
            .filter(|g| !g.passed)
            .map(|g| FailedGate {
                gate_key: g.gate_key.clone(),
                reason: g.reason.clone(),
            })
            .collect();

        let has_structured =
            !snapshot.hook_triggers.is_empty() || !snapshot.pattern_detections.is_empty();
        let (positive_hooks, negative_patterns, origin) = if has_structured {
            (
                structured_hooks(snapshot),
                structured_patterns(snapshot),
                SignalOrigin::Structured,
            )
        } else {
            (
                tag_hooks(&messages),
                tag_patterns(&messages),
                SignalOrigin::Tags,
            )
        };

        let trait_snapshot = aggregate_traits(&messages);
        let (top_messages, bottom_messages) = score_extremes(&messages);

        Ok(SessionSignals {
            failed_gates,
            positive_hooks,
            negative_patterns,
            trait_snapshot,
            top_messages,
            bottom_messages,
            origin,
        })
    }
}

/// Stage 1: structured hook triggers
fn structured_hooks(snapshot: &SessionSnapshot) -> Vec<PositiveHook> {
    snapshot
        .hook_triggers
        .iter()
        .map(|t| PositiveHook {
            hook_key: t.hook_key.clone(),
            strength: (t.occurrences as f64 / HOOK_STRENGTH_DIVISOR).min(1.0),
            turn_index: t.turn_index,
        })
        .collect()
}

/// Stage 1: structured pattern detections
fn structured_patterns(snapshot: &SessionSnapshot) -> Vec<NegativePattern> {
    snapshot
        .pattern_detections
        .iter()
        .map(|p| NegativePattern {
            pattern_key: p.pattern_key.clone(),
            severity: (p.occurrences as f64 / PATTERN_SEVERITY_DIVISOR).min(1.0),
            turn_index: p.turn_index,
        })
        .collect()
}

/// Stage 2 fallback: count hook tags across messages. The first turn a tag
/// appears on becomes its evidence index; keys are emitted in first-seen
/// order for determinism.
fn tag_hooks(messages: &[&crate::types::SessionMessage]) -> Vec<PositiveHook> {
    let counts = tag_counts(messages, |m| &m.hooks);
    counts
        .into_iter()
        .map(|(key, (occurrences, turn_index))| PositiveHook {
            hook_key: key,
            strength: (occurrences as f64 / HOOK_STRENGTH_DIVISOR).min(1.0),
            turn_index: Some(turn_index),
        })
        .collect()
}

/// Stage 2 fallback: count pattern tags across messages
fn tag_patterns(messages: &[&crate::types::SessionMessage]) -> Vec<NegativePattern> {
    let counts = tag_counts(messages, |m| &m.patterns);
    counts
        .into_iter()
        .map(|(key, (occurrences, turn_index))| NegativePattern {
            pattern_key: key,
            severity: (occurrences as f64 / PATTERN_SEVERITY_DIVISOR).min(1.0),
            turn_index: Some(turn_index),
        })
        .collect()
}

/// Count tags, keeping first-seen order and first-seen turn index
fn tag_counts<'a>(
    messages: &[&'a crate::types::SessionMessage],
    tags: impl Fn(&'a crate::types::SessionMessage) -> &'a Vec<String>,
) -> Vec<(String, (u32, usize))> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, (u32, usize)> = HashMap::new();
    for &msg in messages {
        for tag in tags(msg) {
            match counts.get_mut(tag) {
                Some(entry) => entry.0 += 1,
                None => {
                    order.push(tag.clone());
                    counts.insert(tag.clone(), (1, msg.turn_index));
                }
            }
        }
    }
    order
        .into_iter()
        .map(|key| {
            let entry = counts[&key];
            (key, entry)
        })
        .collect()
}

/// Per-trait mean over user messages. Samples outside [0, 100] or non-finite
/// are excluded; a trait with no valid samples averages to 0.
fn aggregate_traits(messages: &[&crate::types::SessionMessage]) -> TraitSnapshot {
    let mut snapshot = TraitSnapshot::default();
    for key in TraitKey::ALL {
        let samples: Vec<f64> = messages.iter().filter_map(|m| m.trait_value(key)).collect();
        let mean = if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<f64>() / samples.len() as f64
        };
        snapshot.means.insert(key.key().to_string(), mean);
    }
    snapshot
}

/// Top-3 and bottom-3 scored messages, for evidence attachment
fn score_extremes(
    messages: &[&crate::types::SessionMessage],
) -> (Vec<EvidenceMessage>, Vec<EvidenceMessage>) {
    let mut scored: Vec<EvidenceMessage> = messages
        .iter()
        .filter_map(|m| {
            m.score.filter(|s| s.is_finite()).map(|score| EvidenceMessage {
                turn_index: m.turn_index,
                score,
            })
        })
        .collect();
    // Stable by turn index on equal scores
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.turn_index.cmp(&b.turn_index)));
    let top = scored.iter().take(EVIDENCE_COUNT).cloned().collect();
    scored.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.turn_index.cmp(&b.turn_index)));
    let bottom = scored.iter().take(EVIDENCE_COUNT).cloned().collect();
    (top, bottom)
}

// =============================================================================
// TESTS
// =============================================================================
