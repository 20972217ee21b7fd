//! Type definitions for the Cadence engine

pub mod error;
pub mod insight;
pub mod mood;
pub mod rotation;
pub mod session;
pub mod signals;
pub mod synergy;

pub use error::EngineError;
pub use insight::{
    CandidateInsight, DeepInsightsPayload, InsightCard, InsightKind, InsightSource,
    InsightTemplate, TriggerKey,
};
pub use mood::{ArcKind, MoodArc, MoodConfig, MoodSnapshot, MoodState, MoodTimelinePayload};
pub use rotation::{History, QuotaTable, RotationMeta, RotationPack, Surface};
pub use session::{
    GateOutcome, HookTrigger, PatternDetection, Role, SessionMessage, SessionSnapshot, TraitKey,
};
pub use signals::{
    EvidenceMessage, FailedGate, NegativePattern, PositiveHook, SessionSignals, SignalOrigin,
    TraitSnapshot,
};
pub use synergy::{
    CorrelationMatrix, EmotionLink, EmotionLinks, GraphEdge, GraphNode, SynergyGraph,
    SynergyPayload,
};
