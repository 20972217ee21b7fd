//! Mood timeline engine: smoothed emotional trajectory + arc detection
//!
//! Processing is strictly sequential per user message: the smoothed score and
//! flow value at index i depend on index i-1. Arc detection runs once over
//! the completed sequence.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{
    ArcKind, CandidateInsight, EngineError, InsightKind, InsightSource, MoodArc, MoodConfig,
    MoodSnapshot, MoodState, MoodTimelinePayload, SessionMessage, SessionSnapshot, Surface,
    TraitKey,
};
use crate::{
    EMA_ALPHA, FLOW_WINDOW, PAYLOAD_VERSION, TENSION_PATTERN_BONUS, WARMTH_HOOK_BONUS,
};

lazy_static! {
    // Pattern tags that feed the tension bonus
    static ref RE_TENSION_TAG: Regex = Regex::new(r"(?i)(negative|tension)").unwrap();

    // Hook tags that feed the warmth bonus
    static ref RE_WARMTH_TAG: Regex = Regex::new(r"(?i)(positive|warm)").unwrap();
}

/// Mood timeline engine
#[derive(Debug, Default)]
pub struct MoodTimelineEngine;

impl MoodTimelineEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compute the full timeline for a finalized session.
    ///
    /// Fails on zero user messages and on user messages missing a score or
    /// one of the four traits the formulas need; those are precondition
    /// violations, never defaulted.
    pub fn compute(
        &self,
        snapshot: &SessionSnapshot,
        config: MoodConfig,
    ) -> Result<MoodTimelinePayload, EngineError> {
        let messages = snapshot.user_messages();
        if messages.is_empty() {
            return Err(EngineError::EmptySession {
                session_id: snapshot.session_id.clone(),
            });
        }

        let mut snapshots: Vec<MoodSnapshot> = Vec::with_capacity(messages.len());
        let mut raw_scores: Vec<f64> = Vec::with_capacity(messages.len());

        for msg in messages {
            let raw_score = msg.score.filter(|s| s.is_finite()).ok_or_else(|| {
                EngineError::MissingTraitData {
                    trait_key: "score".to_string(),
                }
            })?;
            raw_scores.push(raw_score);

            let prev = snapshots.last();
            let smoothed = match prev {
                None => raw_score,
                Some(p) => {
                    (EMA_ALPHA * raw_score + (1.0 - EMA_ALPHA) * p.smoothed_mood_score).round()
                }
            };

            let tension_control = required_trait(msg, TraitKey::TensionControl)?;
            let warmth_base = required_trait(msg, TraitKey::EmotionalWarmth)?;
            let humor = required_trait(msg, TraitKey::Humor)?;
            let confidence = required_trait(msg, TraitKey::Confidence)?;

            let tension_tags = msg
                .patterns
                .iter()
                .filter(|p| RE_TENSION_TAG.is_match(p))
                .count() as f64;
            let warmth_tags = msg
                .hooks
                .iter()
                .filter(|h| RE_WARMTH_TAG.is_match(h))
                .count() as f64;

            let tension = clamp_0_100(100.0 - tension_control + TENSION_PATTERN_BONUS * tension_tags);
            let warmth = clamp_0_100(warmth_base + WARMTH_HOOK_BONUS * warmth_tags);
            let vibe = ((humor + confidence) / 2.0).round();
            let flow = compute_flow(&raw_scores, prev.map(|p| p.flow));

            let mood_state = classify(smoothed, tension, warmth, flow);

            snapshots.push(MoodSnapshot {
                turn_index: msg.turn_index,
                raw_score,
                smoothed_mood_score: smoothed,
                mood_state,
                tension,
                warmth,
                vibe,
                flow,
            });
        }

        let arcs = if config.detect_arcs {
            detect_arcs(&snapshots)
        } else {
            Vec::new()
        };

        Ok(MoodTimelinePayload {
            version: PAYLOAD_VERSION,
            session_id: snapshot.session_id.clone(),
            snapshots,
            arcs,
            generated_at: chrono::Utc::now(),
        })
    }

    /// Map a computed timeline into rotation candidates: one per detected
    /// arc, plus a decline warning when the session ends far below its peak.
    pub fn candidates(&self, payload: &MoodTimelinePayload) -> Vec<CandidateInsight> {
        let mut out = Vec::new();
        let surfaces: std::collections::BTreeSet<Surface> =
            [Surface::MissionEnd, Surface::MoodTimeline].into_iter().collect();

        for arc in &payload.arcs {
            out.push(CandidateInsight {
                id: format!("mood_arc_{}_v1", arc.kind.slug()),
                kind: InsightKind::GeneralTip,
                source: InsightSource::Mood,
                category: "mood".to_string(),
                priority: 70,
                weight: arc.magnitude.round() as i32,
                title: Some(arc.kind.label().to_string()),
                body: Some(arc_body(arc)),
                is_premium: false,
                surfaces: surfaces.clone(),
                related_turn_index: Some(arc.start_index),
            });
        }

        if let (Some(last), Some(peak)) = (
            payload.snapshots.last(),
            payload
                .snapshots
                .iter()
                .map(|s| s.smoothed_mood_score)
                .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.max(v)))),
        ) {
            let decline = peak - last.smoothed_mood_score;
            // && binds tighter than ||: warning fires on (decline > 20 AND
            // ending COLD) OR any decline > 30
            if decline > 20.0 && last.mood_state == MoodState::Cold || decline > 30.0 {
                out.push(CandidateInsight {
                    id: "mood_decline_warning_v1".to_string(),
                    kind: InsightKind::NegativePattern,
                    source: InsightSource::Mood,
                    category: "mood".to_string(),
                    priority: 70,
                    weight: decline.round() as i32,
                    title: Some("Mood slipped late".to_string()),
                    body: Some(format!(
                        "The mood dropped about {:.0} points from its peak before the session \
                         ended. Watch for the moment the energy turned and close earlier next time.",
                        decline
                    )),
                    is_premium: false,
                    surfaces,
                    related_turn_index: Some(last.turn_index),
                });
            }
        }

        out
    }
}

fn required_trait(msg: &SessionMessage, key: TraitKey) -> Result<f64, EngineError> {
    msg.trait_value(key).ok_or_else(|| EngineError::MissingTraitData {
        trait_key: key.key().to_string(),
    })
}

fn clamp_0_100(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

/// Flow at the newest point: stability of the trailing raw-score window,
/// EMA-blended with the previous flow. Fewer than 2 points in the window
/// falls back to the previous flow (or 50 if none).
fn compute_flow(raw_scores: &[f64], prev_flow: Option<f64>) -> f64 {
    let window_start = raw_scores.len().saturating_sub(FLOW_WINDOW);
    let window = &raw_scores[window_start..];
    if window.len() < 2 {
        return prev_flow.unwrap_or(50.0);
    }
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / window.len() as f64;
    let stability = (100.0 - 2.0 * variance.sqrt()).max(0.0);
    match prev_flow {
        Some(prev) => EMA_ALPHA * stability + (1.0 - EMA_ALPHA) * prev,
        None => stability,
    }
}

/// Priority-ordered classifier; first matching rule wins
fn classify(smoothed: f64, tension: f64, warmth: f64, flow: f64) -> MoodState {
    if smoothed >= 80.0 && flow > 70.0 && tension < 40.0 {
        MoodState::Flow
    } else if tension > 70.0 || (smoothed < 50.0 && tension > 50.0) {
        MoodState::Tense
    } else if (60.0..80.0).contains(&smoothed) && warmth > 50.0 {
        MoodState::Warm
    } else if smoothed < 30.0 && warmth < 40.0 {
        MoodState::Cold
    } else {
        MoodState::Neutral
    }
}

fn arc_body(arc: &MoodArc) -> String {
    match arc.kind {
        ArcKind::RisingWarmth => format!(
            "The mood climbed about {:.0} points across the session, warming as it went. \
             Whatever you did in the middle stretch, keep doing it.",
            arc.magnitude
        ),
        ArcKind::RecoveryArc => format!(
            "A rough patch early on turned around: the mood recovered {:.0} points after its \
             low. Recovering a session is harder than starting well, so this counts double.",
            arc.magnitude
        ),
        ArcKind::TestingSpike => format!(
            "Tension spiked briefly ({:.0} points) and then decayed. That reads as a test, \
             and the decay means it landed fine.",
            arc.magnitude
        ),
        ArcKind::CoolDown => format!(
            "The mood cooled roughly {:.0} points from open to close. Look at the last third \
             for the moment the energy drained.",
            arc.magnitude
        ),
    }
}

// =============================================================================
// ARC DETECTION
// =============================================================================

/// Scan the completed sequence for the four named shapes
fn detect_arcs(snapshots: &[MoodSnapshot]) -> Vec<MoodArc> {
    let mut arcs = Vec::new();
    if let Some(arc) = detect_rising_warmth(snapshots) {
        arcs.push(arc);
    }
    if let Some(arc) = detect_recovery(snapshots) {
        arcs.push(arc);
    }
    if let Some(arc) = detect_testing_spike(snapshots) {
        arcs.push(arc);
    }
    if let Some(arc) = detect_cool_down(snapshots) {
        arcs.push(arc);
    }
    arcs
}

fn third_means(snapshots: &[MoodSnapshot]) -> Option<((f64, f64), (f64, f64))> {
    if snapshots.len() < 3 {
        return None;
    }
    let third = snapshots.len() / 3;
    let first = &snapshots[..third.max(1)];
    let last = &snapshots[snapshots.len() - third.max(1)..];
    let mean =
        |points: &[MoodSnapshot], f: fn(&MoodSnapshot) -> f64| -> f64 {
            points.iter().map(f).sum::<f64>() / points.len() as f64
        };
    Some((
        (
            mean(first, |s| s.smoothed_mood_score),
            mean(first, |s| s.warmth),
        ),
        (
            mean(last, |s| s.smoothed_mood_score),
            mean(last, |s| s.warmth),
        ),
    ))
}

/// Smoothed score rises across the thirds and warmth does not fade
fn detect_rising_warmth(snapshots: &[MoodSnapshot]) -> Option<MoodArc> {
    let ((first_score, first_warmth), (last_score, last_warmth)) = third_means(snapshots)?;
    let score_gain = last_score - first_score;
    let warmth_gain = last_warmth - first_warmth;
    if score_gain >= 15.0 && warmth_gain >= 0.0 {
        Some(MoodArc {
            kind: ArcKind::RisingWarmth,
            start_index: snapshots[0].turn_index,
            end_index: snapshots[snapshots.len() - 1].turn_index,
            magnitude: score_gain,
        })
    } else {
        None
    }
}

/// Mirror of rising warmth
fn detect_cool_down(snapshots: &[MoodSnapshot]) -> Option<MoodArc> {
    let ((first_score, first_warmth), (last_score, last_warmth)) = third_means(snapshots)?;
    let score_drop = first_score - last_score;
    let warmth_drop = first_warmth - last_warmth;
    if score_drop >= 15.0 && warmth_drop >= 0.0 {
        Some(MoodArc {
            kind: ArcKind::CoolDown,
            start_index: snapshots[0].turn_index,
            end_index: snapshots[snapshots.len() - 1].turn_index,
            magnitude: score_drop,
        })
    } else {
        None
    }
}

/// Early low point followed by sustained improvement: the minimum sits in the
/// first half below 45, every later point stays at or above it, and the final
/// score recovers by at least 20.
fn detect_recovery(snapshots: &[MoodSnapshot]) -> Option<MoodArc> {
    if snapshots.len() < 4 {
        return None;
    }
    let half = snapshots.len() / 2;
    let (min_pos, min_snap) = snapshots[..half]
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.smoothed_mood_score.total_cmp(&b.1.smoothed_mood_score))?;
    let min_score = min_snap.smoothed_mood_score;
    if min_score >= 45.0 {
        return None;
    }
    let sustained = snapshots[min_pos + 1..]
        .iter()
        .all(|s| s.smoothed_mood_score >= min_score);
    let last = snapshots[snapshots.len() - 1].smoothed_mood_score;
    if sustained && last - min_score >= 20.0 {
        Some(MoodArc {
            kind: ArcKind::RecoveryArc,
            start_index: min_snap.turn_index,
            end_index: snapshots[snapshots.len() - 1].turn_index,
            magnitude: last - min_score,
        })
    } else {
        None
    }
}

/// Short tension spike followed immediately by partial decay
fn detect_testing_spike(snapshots: &[MoodSnapshot]) -> Option<MoodArc> {
    if snapshots.len() < 3 {
        return None;
    }
    for i in 1..snapshots.len() - 1 {
        let rise = snapshots[i].tension - snapshots[i - 1].tension;
        let decay = snapshots[i].tension - snapshots[i + 1].tension;
        if rise >= 20.0 && decay >= 8.0 {
            return Some(MoodArc {
                kind: ArcKind::TestingSpike,
                start_index: snapshots[i - 1].turn_index,
                end_index: snapshots[i + 1].turn_index,
                magnitude: rise,
            });
        }
    }
    None
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use std::collections::HashMap;

    fn user_message(turn_index: usize, score: f64) -> SessionMessage {
        user_message_with(turn_index, score, 50.0, 60.0)
    }

    fn user_message_with(
        turn_index: usize,
        score: f64,
        tension_control: f64,
        warmth: f64,
    ) -> SessionMessage {
        let mut traits = HashMap::new();
        traits.insert("confidence".to_string(), 60.0);
        traits.insert("clarity".to_string(), 55.0);
        traits.insert("humor".to_string(), 50.0);
        traits.insert("tensionControl".to_string(), tension_control);
        traits.insert("emotionalWarmth".to_string(), warmth);
        traits.insert("dominance".to_string(), 45.0);
        SessionMessage {
            turn_index,
            role: Role::User,
            score: Some(score),
            traits,
            hooks: vec![],
            patterns: vec![],
        }
    }

    fn session(messages: Vec<SessionMessage>) -> SessionSnapshot {
        SessionSnapshot {
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            template_id: None,
            finalized: true,
            messages,
            gate_outcomes: vec![],
            hook_triggers: vec![],
            pattern_detections: vec![],
        }
    }

    #[test]
    fn test_empty_session_is_fatal() {
        let engine = MoodTimelineEngine::new();
        let err = engine
            .compute(&session(vec![]), MoodConfig::default())
            .unwrap_err();
        assert_eq!(err.code(), "E101_EMPTY_SESSION");
    }

    #[test]
    fn test_single_message_smoothed_equals_raw() {
        let engine = MoodTimelineEngine::new();
        let payload = engine
            .compute(&session(vec![user_message(0, 73.0)]), MoodConfig::default())
            .unwrap();
        assert_eq!(payload.snapshots.len(), 1);
        assert_eq!(payload.snapshots[0].smoothed_mood_score, 73.0);
    }

    #[test]
    fn test_two_message_ema() {
        let engine = MoodTimelineEngine::new();
        let payload = engine
            .compute(
                &session(vec![user_message(0, 40.0), user_message(1, 80.0)]),
                MoodConfig::default(),
            )
            .unwrap();
        // 0.35*80 + 0.65*40 = 54
        assert_eq!(payload.snapshots[1].smoothed_mood_score, 54.0);
    }

    #[test]
    fn test_missing_trait_is_fatal() {
        let engine = MoodTimelineEngine::new();
        let mut msg = user_message(0, 50.0);
        msg.traits.remove("tensionControl");
        let err = engine
            .compute(&session(vec![msg]), MoodConfig::default())
            .unwrap_err();
        assert_eq!(err.code(), "E102_MISSING_TRAIT_DATA");
    }

    #[test]
    fn test_tension_and_warmth_bonuses() {
        let engine = MoodTimelineEngine::new();
        let mut msg = user_message_with(0, 50.0, 40.0, 55.0);
        msg.patterns.push("negative_interview_mode".to_string());
        msg.patterns.push("tension_spike".to_string());
        msg.hooks.push("positive_callback".to_string());
        let payload = engine
            .compute(&session(vec![msg]), MoodConfig::default())
            .unwrap();
        let snap = &payload.snapshots[0];
        // 100 - 40 + 5*2 = 70
        assert_eq!(snap.tension, 70.0);
        // 55 + 3*1 = 58
        assert_eq!(snap.warmth, 58.0);
    }

    #[test]
    fn test_flow_fallback_then_blend() {
        let engine = MoodTimelineEngine::new();
        let payload = engine
            .compute(
                &session(vec![
                    user_message(0, 60.0),
                    user_message(1, 60.0),
                    user_message(2, 60.0),
                ]),
                MoodConfig::default(),
            )
            .unwrap();
        // Point 0: no window yet, default 50
        assert_eq!(payload.snapshots[0].flow, 50.0);
        // Constant scores: variance 0 → stability 100, blended upward
        assert!(payload.snapshots[2].flow > payload.snapshots[0].flow);
    }

    #[test]
    fn test_classifier_priority_order() {
        assert_eq!(classify(85.0, 30.0, 60.0, 80.0), MoodState::Flow);
        // Flow-level smoothed but high tension falls through to Tense
        assert_eq!(classify(85.0, 75.0, 60.0, 80.0), MoodState::Tense);
        assert_eq!(classify(45.0, 55.0, 60.0, 50.0), MoodState::Tense);
        assert_eq!(classify(65.0, 30.0, 60.0, 50.0), MoodState::Warm);
        assert_eq!(classify(25.0, 30.0, 30.0, 50.0), MoodState::Cold);
        assert_eq!(classify(55.0, 30.0, 30.0, 50.0), MoodState::Neutral);
    }

    #[test]
    fn test_arcs_skippable() {
        let engine = MoodTimelineEngine::new();
        let messages: Vec<SessionMessage> = (0..6)
            .map(|i| user_message_with(i, 30.0 + 12.0 * i as f64, 50.0, 40.0 + 8.0 * i as f64))
            .collect();
        let with_arcs = engine
            .compute(&session(messages.clone()), MoodConfig::default())
            .unwrap();
        let without = engine
            .compute(&session(messages), MoodConfig { detect_arcs: false })
            .unwrap();
        assert!(!with_arcs.arcs.is_empty());
        assert!(without.arcs.is_empty());
        assert_eq!(with_arcs.snapshots.len(), without.snapshots.len());
    }

    #[test]
    fn test_rising_warmth_detected() {
        let snapshots: Vec<MoodSnapshot> = (0..6)
            .map(|i| MoodSnapshot {
                turn_index: i,
                raw_score: 30.0 + 12.0 * i as f64,
                smoothed_mood_score: 30.0 + 10.0 * i as f64,
                mood_state: MoodState::Neutral,
                tension: 30.0,
                warmth: 40.0 + 6.0 * i as f64,
                vibe: 50.0,
                flow: 60.0,
            })
            .collect();
        let arcs = detect_arcs(&snapshots);
        assert!(arcs.iter().any(|a| a.kind == ArcKind::RisingWarmth));
        assert!(!arcs.iter().any(|a| a.kind == ArcKind::CoolDown));
    }

    #[test]
    fn test_testing_spike_detected() {
        let tensions = [30.0, 60.0, 40.0];
        let snapshots: Vec<MoodSnapshot> = tensions
            .iter()
            .enumerate()
            .map(|(i, t)| MoodSnapshot {
                turn_index: i,
                raw_score: 60.0,
                smoothed_mood_score: 60.0,
                mood_state: MoodState::Neutral,
                tension: *t,
                warmth: 50.0,
                vibe: 50.0,
                flow: 60.0,
            })
            .collect();
        let arcs = detect_arcs(&snapshots);
        let spike = arcs.iter().find(|a| a.kind == ArcKind::TestingSpike).unwrap();
        assert_eq!(spike.magnitude, 30.0);
    }

    #[test]
    fn test_decline_warning_literal_boolean() {
        let engine = MoodTimelineEngine::new();
        // decline 35 with a NEUTRAL ending still fires via the || branch
        let mk = |scores: &[f64], state: MoodState| MoodTimelinePayload {
            version: 1,
            session_id: "s1".to_string(),
            snapshots: scores
                .iter()
                .enumerate()
                .map(|(i, s)| MoodSnapshot {
                    turn_index: i,
                    raw_score: *s,
                    smoothed_mood_score: *s,
                    mood_state: if i == scores.len() - 1 {
                        state
                    } else {
                        MoodState::Neutral
                    },
                    tension: 30.0,
                    warmth: 50.0,
                    vibe: 50.0,
                    flow: 60.0,
                })
                .collect(),
            arcs: vec![],
            generated_at: chrono::Utc::now(),
        };
        let fired = engine.candidates(&mk(&[80.0, 45.0], MoodState::Neutral));
        assert!(fired.iter().any(|c| c.id == "mood_decline_warning_v1"));

        // decline 25 ending NEUTRAL does not fire: && binds tighter than ||
        let not_fired = engine.candidates(&mk(&[80.0, 55.0], MoodState::Neutral));
        assert!(!not_fired.iter().any(|c| c.id == "mood_decline_warning_v1"));

        // decline 25 ending COLD fires via the && branch
        let cold = engine.candidates(&mk(&[80.0, 55.0], MoodState::Cold));
        assert!(cold.iter().any(|c| c.id == "mood_decline_warning_v1"));
    }
}
