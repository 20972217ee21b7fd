//! Rotation engine
//!
//! Top-level aggregator over the four candidate producers: deep-insight
//! selector, mood-candidate mapper, synergy-candidate mapper and the
//! analyzer-paragraph mapper. Each (session, surface) pair resolves through
//! exactly one of two paths:
//!
//!   build (no persisted base pack): run all producers (failures degrade to
//!   zero candidates), apply the unified cooldown, surface filter, ordering
//!   and per-source quotas, persist the premium-agnostic base pack.
//!
//!   read (base pack exists): derive the viewer view by premium partition.
//!
//! A persisted base pack is never recomputed; premium status is evaluated
//! strictly at read time so upgrades and downgrades apply immediately.

use std::collections::BTreeSet;

use crate::core::catalog::InsightCatalog;
use crate::core::mood::MoodTimelineEngine;
use crate::core::seed::generate_seed;
use crate::core::selector::{rank, InsightSelector};
use crate::core::signals::SignalExtractor;
use crate::core::store::{keys, DocumentStore, EngineStore};
use crate::core::synergy::{TraitSynergyEngine, TraitVector};
use crate::types::{
    CandidateInsight, DeepInsightsPayload, EngineError, History, InsightCard, InsightSource,
    MoodConfig, MoodTimelinePayload, QuotaTable, RotationMeta, RotationPack, SessionSignals,
    SessionSnapshot, Surface, SynergyPayload, TraitKey,
};
use crate::{PAYLOAD_VERSION, SYNERGY_MAX_SESSIONS};

const ANALYZER_PRIORITY: i32 = 50;
const ANALYZER_STRENGTH_FLOOR: f64 = 60.0;
const ANALYZER_GROWTH_CEILING: f64 = 45.0;

/// Top-level rotation engine over a document store
#[derive(Debug)]
pub struct RotationEngine<S: DocumentStore> {
    store: EngineStore<S>,
    catalog: InsightCatalog,
    mood: MoodTimelineEngine,
    synergy: TraitSynergyEngine,
    extractor: SignalExtractor,
}

impl<S: DocumentStore> RotationEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_catalog(store, InsightCatalog::standard())
    }

    pub fn with_catalog(store: S, catalog: InsightCatalog) -> Self {
        Self {
            store: EngineStore::new(store),
            catalog,
            mood: MoodTimelineEngine::new(),
            synergy: TraitSynergyEngine::new(),
            extractor: SignalExtractor::new(),
        }
    }

    pub fn store(&self) -> &EngineStore<S> {
        &self.store
    }

    /// Persist a finalized session so the engines can see it
    pub fn ingest_session(&self, session: &SessionSnapshot) -> Result<(), EngineError> {
        self.store.save_session(session)
    }

    // =========================================================================
    // [P] PERSISTED PRODUCER PAYLOADS
    // =========================================================================

    /// Mood timeline for a session: persisted once, read thereafter
    pub fn mood_timeline(&self, session_id: &str) -> Result<MoodTimelinePayload, EngineError> {
        let key = keys::mood(session_id);
        if let Some(payload) = self.store.get_doc(&key)? {
            return Ok(payload);
        }
        let session = self.load_finalized(session_id)?;
        let payload = self.mood.compute(&session, MoodConfig::default())?;
        self.store.put_doc(&key, &payload)?;
        Ok(payload)
    }

    /// Synergy payload from the user's trailing trait history. The current
    /// session is excluded from the window so the matrix it is evaluated
    /// against never contains itself. Superseded on each recomputation, so
    /// unlike the other payloads this one always rebuilds.
    pub fn compute_synergy(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<SynergyPayload, EngineError> {
        let history = self.trait_history(user_id, session_id)?;
        let payload = self.synergy.compute(user_id, session_id, &history);
        self.store.put_doc(&keys::synergy(session_id), &payload)?;
        Ok(payload)
    }

    /// Last persisted synergy payload, recomputing if none exists yet
    pub fn synergy_payload(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<SynergyPayload, EngineError> {
        if let Some(payload) = self.store.get_doc(&keys::synergy(session_id))? {
            return Ok(payload);
        }
        self.compute_synergy(user_id, session_id)
    }

    /// Legacy deep-insights payload for one session
    pub fn deep_insights(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<DeepInsightsPayload, EngineError> {
        let session = self.load_finalized(session_id)?;
        let signals = self.extractor.extract(&session)?;
        let excluded = self.store.recent_history(user_id, session_id)?.insight_ids;
        let seed = generate_seed(user_id, session_id, "deep");
        let selector = InsightSelector::new(&self.catalog);
        Ok(selector.select_deep_insights(&signals, &excluded, &seed))
    }

    // =========================================================================
    // [R] ROTATION PACK
    // =========================================================================

    /// Read-or-build for one (session, surface) pair, returning the view
    /// for the requesting user's current premium status
    pub fn rotation_pack(
        &self,
        user_id: &str,
        session_id: &str,
        surface: &Surface,
    ) -> Result<RotationPack, EngineError> {
        let key = keys::rotation(session_id, surface);
        let is_premium = self.store.is_premium(user_id)?;
        if let Some(pack) = self.store.get_doc::<RotationPack>(&key)? {
            return Ok(view_for(pack, is_premium));
        }
        let pack = self.build_pack(user_id, session_id, surface)?;
        self.store.put_doc(&key, &pack)?;
        self.record_shown(user_id, session_id, &pack)?;
        Ok(view_for(pack, is_premium))
    }

    fn build_pack(
        &self,
        user_id: &str,
        session_id: &str,
        surface: &Surface,
    ) -> Result<RotationPack, EngineError> {
        let session = self.load_finalized(session_id)?;
        let seed = generate_seed(user_id, session_id, "rotation");
        let history = self.store.recent_history(user_id, session_id)?;
        let cooldown = history.all_ids();

        // Producers run independently; a failing producer contributes
        // nothing instead of aborting the build
        let mut candidates: Vec<CandidateInsight> = Vec::new();

        match self.extractor.extract(&session) {
            Ok(signals) => {
                let selector = InsightSelector::new(&self.catalog);
                candidates.extend(selector.candidates(&signals, &BTreeSet::new(), &seed));
                candidates.extend(self.analyzer_paragraphs(&signals));
            }
            Err(e) => {
                tracing::warn!(session_id, error = %e, producer = "signals", "producer failed");
            }
        }

        match self.mood_timeline(session_id) {
            Ok(payload) => candidates.extend(self.mood.candidates(&payload)),
            Err(e) => {
                tracing::warn!(session_id, error = %e, producer = "mood", "producer failed");
            }
        }

        match self.synergy_payload(user_id, session_id) {
            Ok(payload) => candidates.extend(self.synergy.candidates(&payload)),
            Err(e) => {
                tracing::warn!(session_id, error = %e, producer = "synergy", "producer failed");
            }
        }

        // Unified cooldown: anything shown in the recent window is out
        let mut excluded_ids: Vec<String> = Vec::new();
        candidates.retain(|c| {
            let keep = !cooldown.contains(&c.id);
            if !keep {
                excluded_ids.push(c.id.clone());
            }
            keep
        });
        excluded_ids.sort();
        excluded_ids.dedup();

        // Surface membership (empty set matches every surface), then the
        // global deterministic order
        candidates.retain(|c| c.matches_surface(surface));
        candidates.sort_by(rank);
        let total_available = candidates.len();

        // Per-source quota walk
        let quotas = QuotaTable::for_surface(surface);
        let mut selected_insights: Vec<InsightCard> = Vec::new();
        let mut selected_paragraphs: Vec<InsightCard> = Vec::new();
        for c in &candidates {
            let cap = quotas.for_source(c.source);
            let bucket = match c.source {
                InsightSource::Analyzer => &mut selected_paragraphs,
                _ => &mut selected_insights,
            };
            let taken = bucket
                .iter()
                .filter(|card| card.source == c.source)
                .count();
            if taken < cap && bucket.iter().all(|card| card.id != c.id) {
                bucket.push(InsightCard::from(c));
            }
        }

        let picked_ids = selected_insights
            .iter()
            .chain(&selected_paragraphs)
            .map(|c| c.id.clone())
            .collect();

        Ok(RotationPack {
            version: PAYLOAD_VERSION,
            session_id: session_id.to_string(),
            surface: surface.clone(),
            selected_insights,
            selected_paragraphs,
            meta: RotationMeta {
                seed,
                excluded_ids,
                picked_ids,
                quotas,
                total_available,
                filtered_because_premium: 0,
                is_premium_user: false,
                premium_insight_ids: Vec::new(),
            },
        })
    }

    /// Record what a freshly built pack shows, per producer id-set
    fn record_shown(
        &self,
        user_id: &str,
        session_id: &str,
        pack: &RotationPack,
    ) -> Result<(), EngineError> {
        let mut shown = History::default();
        for card in &pack.selected_insights {
            match card.source {
                InsightSource::Mood => shown.mood_ids.insert(card.id.clone()),
                InsightSource::Synergy => shown.synergy_ids.insert(card.id.clone()),
                _ => shown.insight_ids.insert(card.id.clone()),
            };
        }
        for card in &pack.selected_paragraphs {
            shown.paragraph_ids.insert(card.id.clone());
        }
        self.store.record_history(user_id, session_id, &shown)
    }

    // =========================================================================
    // [A] ANALYZER PARAGRAPHS
    // =========================================================================

    /// Fourth producer: prose paragraphs from the aggregate trait snapshot.
    /// One strength paragraph (highest trait, if clearly high), one growth
    /// paragraph (lowest trait, if clearly low), one session summary.
    fn analyzer_paragraphs(&self, signals: &SessionSignals) -> Vec<CandidateInsight> {
        let surfaces: BTreeSet<Surface> = [Surface::Analyzer].into_iter().collect();
        let mut out = Vec::new();

        let (strongest, high) = signals.trait_snapshot.strongest();
        if high >= ANALYZER_STRENGTH_FLOOR {
            out.push(paragraph(
                format!("analyzer_strength_{}_v1", strongest.key()),
                "strength",
                high.round() as i32,
                format!("{} is carrying you", strongest.label()),
                format!(
                    "{} averaged {:.0} across this session, your strongest trait. \
                     Lean on it when a conversation stalls.",
                    strongest.label(),
                    high
                ),
                surfaces.clone(),
            ));
        }

        let (weakest, low) = signals.trait_snapshot.weakest();
        if low <= ANALYZER_GROWTH_CEILING {
            out.push(paragraph(
                format!("analyzer_growth_{}_v1", weakest.key()),
                "growth",
                (100.0 - low).round() as i32,
                format!("{} needs reps", weakest.label()),
                format!(
                    "{} averaged {:.0}, your lowest trait this session. \
                     Pick one moment per conversation to practice it deliberately.",
                    weakest.label(),
                    low
                ),
                surfaces.clone(),
            ));
        }

        let mean_of_means = {
            let sum: f64 = TraitKey::ALL
                .iter()
                .map(|k| signals.trait_snapshot.mean(*k))
                .sum();
            sum / TraitKey::ALL.len() as f64
        };
        out.push(paragraph(
            "analyzer_summary_v1".to_string(),
            "summary",
            mean_of_means.round() as i32,
            "Session at a glance".to_string(),
            format!(
                "Traits averaged {:.0} overall, with {} on top and {} trailing. \
                 {} positive hooks and {} negative patterns surfaced.",
                mean_of_means,
                strongest.label(),
                weakest.label(),
                signals.positive_hooks.len(),
                signals.negative_patterns.len()
            ),
            surfaces,
        ));

        out
    }

    // =========================================================================
    // [H] HELPERS
    // =========================================================================

    fn load_finalized(&self, session_id: &str) -> Result<SessionSnapshot, EngineError> {
        let session = self.store.load_session(session_id)?;
        if !session.finalized {
            return Err(EngineError::SessionNotFinalized {
                session_id: session_id.to_string(),
            });
        }
        Ok(session)
    }

    /// Per-session trait mean vectors for a user's prior sessions, newest
    /// first, bounded by the synergy window. The current session is skipped,
    /// as are sessions that fail to load or extract.
    fn trait_history(
        &self,
        user_id: &str,
        current_session: &str,
    ) -> Result<Vec<TraitVector>, EngineError> {
        let mut vectors: Vec<TraitVector> = Vec::new();
        let ids = self.store.user_sessions(user_id)?;
        for id in ids.iter().rev().filter(|id| id.as_str() != current_session) {
            if vectors.len() >= SYNERGY_MAX_SESSIONS {
                break;
            }
            let session = match self.store.load_session(id) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "skipping session in trait history");
                    continue;
                }
            };
            let signals = match self.extractor.extract(&session) {
                Ok(s) => s,
                Err(_) => continue,
            };
            let mut vector = [0.0; 6];
            for key in TraitKey::ALL {
                vector[key.index()] = signals.trait_snapshot.mean(key);
            }
            vectors.push(vector);
        }
        Ok(vectors)
    }
}

/// Derive the viewer-specific pack from a base pack. Free viewers lose the
/// premium cards; `picked_ids` always reflects what this viewer can see.
/// `excluded_ids`, `quotas`, `seed` and `version` pass through unchanged.
fn view_for(pack: RotationPack, is_premium: bool) -> RotationPack {
    let mut view = pack;
    view.meta.total_available = view.selected_insights.len() + view.selected_paragraphs.len();
    view.meta.is_premium_user = is_premium;
    if is_premium {
        view.meta.filtered_because_premium = 0;
        view.meta.premium_insight_ids = Vec::new();
    } else {
        let premium_ids: Vec<String> = view
            .selected_insights
            .iter()
            .filter(|c| c.is_premium)
            .map(|c| c.id.clone())
            .collect();
        view.meta.filtered_because_premium = premium_ids.len();
        view.selected_insights.retain(|c| !c.is_premium);
        view.meta.premium_insight_ids = premium_ids;
    }
    view.meta.picked_ids = view
        .selected_insights
        .iter()
        .chain(&view.selected_paragraphs)
        .map(|c| c.id.clone())
        .collect();
    view
}

fn paragraph(
    id: String,
    category: &str,
    weight: i32,
    title: String,
    body: String,
    surfaces: BTreeSet<Surface>,
) -> CandidateInsight {
    CandidateInsight {
        id,
        kind: crate::types::InsightKind::GeneralTip,
        source: InsightSource::Analyzer,
        category: category.to_string(),
        priority: ANALYZER_PRIORITY,
        weight,
        title: Some(title),
        body: Some(body),
        is_premium: false,
        surfaces,
        related_turn_index: None,
    }
}

// =============================================================================
// TESTS
// =============================================================================
