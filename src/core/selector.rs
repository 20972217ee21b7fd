//! Deep-insight selector
//!
//! Matches session signals against the catalog, ranks candidates and applies
//! per-kind quotas with cooldown exclusion. Ordering is fully deterministic:
//! (priority desc, weight desc, id asc); the only randomness is the seeded
//! weight assigned to general tips, which rotates the fallback pool between
//! sessions while staying reproducible for a fixed seed.

use std::collections::BTreeSet;

use crate::core::catalog::InsightCatalog;
use crate::core::seed::SeededSequence;
use crate::types::{
    CandidateInsight, DeepInsightsPayload, InsightCard, InsightKind, InsightSource,
    InsightTemplate, SessionSignals,
};
use crate::{
    DEEP_MAX_GATE, DEEP_MAX_HOOK, DEEP_MAX_PATTERN, DEEP_MAX_TOTAL, PAYLOAD_VERSION,
    PRIORITY_GATE_FAIL, PRIORITY_GENERAL_TIP, PRIORITY_NEGATIVE_PATTERN, PRIORITY_POSITIVE_HOOK,
};

/// Deep-insight selector
#[derive(Debug)]
pub struct InsightSelector<'a> {
    catalog: &'a InsightCatalog,
}

impl<'a> InsightSelector<'a> {
    pub fn new(catalog: &'a InsightCatalog) -> Self {
        Self { catalog }
    }

    /// Expand signals into ranked, non-excluded candidates.
    ///
    /// If exclusion empties an otherwise non-empty candidate list, repeats
    /// are allowed: an all-in-cooldown session still gets insights.
    pub fn candidates(
        &self,
        signals: &SessionSignals,
        excluded: &BTreeSet<String>,
        seed: &str,
    ) -> Vec<CandidateInsight> {
        let mut out = self.expand(signals, excluded, seed);
        if out.is_empty() {
            let unexcluded = self.expand(signals, &BTreeSet::new(), seed);
            if !unexcluded.is_empty() {
                out = unexcluded;
            }
        }
        out.sort_by(rank);
        out
    }

    /// Apply per-kind quotas over ranked candidates, up to the total cap.
    /// Tips have no cap of their own; they are the fallback pool.
    pub fn select(
        &self,
        signals: &SessionSignals,
        excluded: &BTreeSet<String>,
        seed: &str,
    ) -> Vec<CandidateInsight> {
        let candidates = self.candidates(signals, excluded, seed);
        let mut picked: Vec<CandidateInsight> = Vec::new();

        for c in candidates {
            if picked.len() >= DEEP_MAX_TOTAL {
                break;
            }
            let take = match c.kind {
                InsightKind::GateFail => count_kind(&picked, InsightKind::GateFail) < DEEP_MAX_GATE,
                InsightKind::PositiveHook => {
                    count_kind(&picked, InsightKind::PositiveHook) < DEEP_MAX_HOOK
                }
                InsightKind::NegativePattern => {
                    count_kind(&picked, InsightKind::NegativePattern) < DEEP_MAX_PATTERN
                }
                InsightKind::GeneralTip => true,
            };
            if take && picked.iter().all(|p| p.id != c.id) {
                picked.push(c);
            }
        }
        picked
    }

    /// Legacy three-bucket payload. General tips not placed by kind spill
    /// into positive, then negative, then gate, each bucket capped. The
    /// spill order is historical and preserved for compatibility with
    /// existing consumers; do not reorder it.
    pub fn select_deep_insights(
        &self,
        signals: &SessionSignals,
        excluded: &BTreeSet<String>,
        seed: &str,
    ) -> DeepInsightsPayload {
        let picked = self.select(signals, excluded, seed);

        let mut payload = DeepInsightsPayload {
            version: PAYLOAD_VERSION,
            ..Default::default()
        };

        let mut tips: Vec<InsightCard> = Vec::new();
        for c in &picked {
            let card = InsightCard::from(c);
            match c.kind {
                InsightKind::GateFail => payload.gate.push(card),
                InsightKind::PositiveHook => payload.positive.push(card),
                InsightKind::NegativePattern => payload.negative.push(card),
                InsightKind::GeneralTip => tips.push(card),
            }
        }

        for tip in tips {
            if payload.positive.len() < DEEP_MAX_HOOK {
                payload.positive.push(tip);
            } else if payload.negative.len() < DEEP_MAX_PATTERN {
                payload.negative.push(tip);
            } else if payload.gate.len() < DEEP_MAX_GATE {
                payload.gate.push(tip);
            }
        }

        payload
    }

    fn expand(
        &self,
        signals: &SessionSignals,
        excluded: &BTreeSet<String>,
        seed: &str,
    ) -> Vec<CandidateInsight> {
        let mut out: Vec<CandidateInsight> = Vec::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut push = |out: &mut Vec<CandidateInsight>, c: CandidateInsight| {
            if !excluded.contains(&c.id) && seen.insert(c.id.clone()) {
                out.push(c);
            }
        };

        for gate in &signals.failed_gates {
            for t in self.catalog.for_gate(&gate.gate_key) {
                push(&mut out, candidate(t, InsightSource::Gates, PRIORITY_GATE_FAIL, t.weight, None));
            }
        }
        for hook in &signals.positive_hooks {
            for t in self.catalog.for_hook(&hook.hook_key) {
                push(
                    &mut out,
                    candidate(t, InsightSource::Hooks, PRIORITY_POSITIVE_HOOK, t.weight, hook.turn_index),
                );
            }
        }
        for pat in &signals.negative_patterns {
            for t in self.catalog.for_pattern(&pat.pattern_key) {
                push(
                    &mut out,
                    candidate(t, InsightSource::Patterns, PRIORITY_NEGATIVE_PATTERN, t.weight, pat.turn_index),
                );
            }
        }

        // Tips rotate: the seeded draw replaces the static template weight
        let mut gen = SeededSequence::derive(seed);
        let mut tips = self.catalog.general_tips();
        tips.sort_by(|a, b| a.id.cmp(&b.id));
        for t in tips {
            let weight = (gen.next() * 100.0).round() as i32;
            push(&mut out, candidate(t, InsightSource::General, PRIORITY_GENERAL_TIP, weight, None));
        }

        out
    }
}

fn candidate(
    template: &InsightTemplate,
    source: InsightSource,
    priority: i32,
    weight: i32,
    related_turn_index: Option<usize>,
) -> CandidateInsight {
    CandidateInsight {
        id: template.id.clone(),
        kind: template.kind,
        source,
        category: template.category.clone(),
        priority,
        weight,
        title: Some(template.title.clone()),
        body: Some(template.body.clone()),
        is_premium: false,
        surfaces: BTreeSet::new(),
        related_turn_index,
    }
}

fn count_kind(picked: &[CandidateInsight], kind: InsightKind) -> usize {
    picked.iter().filter(|c| c.kind == kind).count()
}

/// (priority desc, weight desc, id asc); the id comparison is ordinary
/// lexical ordering and is the deterministic tie-break
pub fn rank(a: &CandidateInsight, b: &CandidateInsight) -> std::cmp::Ordering {
    b.priority
        .cmp(&a.priority)
        .then(b.weight.cmp(&a.weight))
        .then(a.id.cmp(&b.id))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailedGate, NegativePattern, PositiveHook};

    fn signals_with(
        gates: &[&str],
        hooks: &[&str],
        patterns: &[&str],
    ) -> SessionSignals {
        SessionSignals {
            failed_gates: gates
                .iter()
                .map(|g| FailedGate {
                    gate_key: g.to_string(),
                    reason: None,
                })
                .collect(),
            positive_hooks: hooks
                .iter()
                .map(|h| PositiveHook {
                    hook_key: h.to_string(),
                    strength: 1.0,
                    turn_index: None,
                })
                .collect(),
            negative_patterns: patterns
                .iter()
                .map(|p| NegativePattern {
                    pattern_key: p.to_string(),
                    severity: 1.0,
                    turn_index: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_determinism_across_runs() {
        let catalog = InsightCatalog::standard();
        let selector = InsightSelector::new(&catalog);
        let signals = signals_with(&["opener_quality"], &["humor_landed"], &["interview_mode"]);
        let a: Vec<String> = selector
            .select(&signals, &BTreeSet::new(), "seed-1")
            .iter()
            .map(|c| c.id.clone())
            .collect();
        let b: Vec<String> = selector
            .select(&signals, &BTreeSet::new(), "seed-1")
            .iter()
            .map(|c| c.id.clone())
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_rotates_tips() {
        let catalog = InsightCatalog::standard();
        let selector = InsightSelector::new(&catalog);
        let signals = signals_with(&[], &[], &[]);
        let a: Vec<String> = selector
            .select(&signals, &BTreeSet::new(), "seed-1")
            .iter()
            .map(|c| c.id.clone())
            .collect();
        let b: Vec<String> = selector
            .select(&signals, &BTreeSet::new(), "seed-2")
            .iter()
            .map(|c| c.id.clone())
            .collect();
        // Same pool, different rotation
        assert_ne!(a, b);
        assert_eq!(a.len(), DEEP_MAX_TOTAL);
    }

    #[test]
    fn test_priority_ordering_gate_first() {
        let catalog = InsightCatalog::standard();
        let selector = InsightSelector::new(&catalog);
        let signals = signals_with(&["listening"], &["future_plans"], &["interview_mode"]);
        let picked = selector.select(&signals, &BTreeSet::new(), "s");
        assert_eq!(picked[0].kind, InsightKind::GateFail);
        // Priorities never increase down the list
        for pair in picked.windows(2) {
            assert!(pair[0].priority >= pair[1].priority);
        }
    }

    #[test]
    fn test_per_kind_quotas() {
        let catalog = InsightCatalog::standard();
        let selector = InsightSelector::new(&catalog);
        // Many gate failures: still at most 3 gate cards
        let signals = signals_with(
            &["opener_quality", "question_balance", "thread_continuity", "escalation", "listening"],
            &["humor_landed", "callback", "curiosity_spike", "storytelling"],
            &["interview_mode", "over_apologizing", "topic_hopping"],
        );
        let picked = selector.select(&signals, &BTreeSet::new(), "s");
        assert!(picked.len() <= DEEP_MAX_TOTAL);
        assert!(count_kind(&picked, InsightKind::GateFail) <= DEEP_MAX_GATE);
        assert!(count_kind(&picked, InsightKind::PositiveHook) <= DEEP_MAX_HOOK);
        assert!(count_kind(&picked, InsightKind::NegativePattern) <= DEEP_MAX_PATTERN);
    }

    #[test]
    fn test_no_duplicate_ids() {
        let catalog = InsightCatalog::standard();
        let selector = InsightSelector::new(&catalog);
        // The same hook key twice must not duplicate its templates
        let signals = signals_with(&[], &["humor_landed", "humor_landed"], &[]);
        let picked = selector.select(&signals, &BTreeSet::new(), "s");
        let mut ids: Vec<&str> = picked.iter().map(|c| c.id.as_str()).collect();
        let before = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn test_cooldown_exclusion() {
        let catalog = InsightCatalog::standard();
        let selector = InsightSelector::new(&catalog);
        let signals = signals_with(&["opener_quality"], &[], &[]);
        let mut excluded = BTreeSet::new();
        excluded.insert("gate_opener_flat_v1".to_string());
        let picked = selector.select(&signals, &excluded, "s");
        assert!(picked.iter().all(|c| c.id != "gate_opener_flat_v1"));
    }

    #[test]
    fn test_exhausted_cooldown_allows_repeats() {
        let catalog = InsightCatalog::standard();
        let selector = InsightSelector::new(&catalog);
        let signals = signals_with(&["opener_quality"], &[], &[]);
        // Exclude everything the expansion could produce
        let everything: BTreeSet<String> = selector
            .candidates(&signals, &BTreeSet::new(), "s")
            .iter()
            .map(|c| c.id.clone())
            .collect();
        let picked = selector.select(&signals, &everything, "s");
        assert!(!picked.is_empty(), "repeats allowed when pool is exhausted");
    }

    #[test]
    fn test_tips_fill_remainder() {
        let catalog = InsightCatalog::standard();
        let selector = InsightSelector::new(&catalog);
        // One gate failure only: tips top the list up to the total cap
        let signals = signals_with(&["closing"], &[], &[]);
        let picked = selector.select(&signals, &BTreeSet::new(), "s");
        assert_eq!(picked.len(), DEEP_MAX_TOTAL);
        assert!(count_kind(&picked, InsightKind::GeneralTip) >= 3);
    }

    #[test]
    fn test_bucket_spill_positive_then_negative_then_gate() {
        let catalog = InsightCatalog::standard();
        let selector = InsightSelector::new(&catalog);
        // No signals at all: six tips, spilled 3 / 2 / 1
        let signals = signals_with(&[], &[], &[]);
        let payload = selector.select_deep_insights(&signals, &BTreeSet::new(), "s");
        assert_eq!(payload.positive.len(), 3);
        assert_eq!(payload.negative.len(), 2);
        assert_eq!(payload.gate.len(), 1);
        assert_eq!(payload.total(), DEEP_MAX_TOTAL);
    }

    #[test]
    fn test_buckets_respect_kind_placement() {
        let catalog = InsightCatalog::standard();
        let selector = InsightSelector::new(&catalog);
        let signals = signals_with(&["opener_quality"], &["callback"], &["monologuing"]);
        let payload = selector.select_deep_insights(&signals, &BTreeSet::new(), "s");
        assert!(payload
            .gate
            .iter()
            .any(|c| c.id.starts_with("gate_opener")));
        assert!(payload
            .positive
            .iter()
            .any(|c| c.id.starts_with("hook_callback")));
        assert!(payload
            .negative
            .iter()
            .any(|c| c.id == "pattern_monologuing_v1"));
    }
}
