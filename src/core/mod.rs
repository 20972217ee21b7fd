//! Core engines for Cadence

pub mod api;
pub mod catalog;
pub mod mood;
pub mod rotation;
pub mod seed;
pub mod selector;
pub mod signals;
pub mod store;
pub mod synergy;

pub use api::{create_router, run_server};
pub use catalog::InsightCatalog;
pub use mood::MoodTimelineEngine;
pub use rotation::RotationEngine;
pub use seed::{generate_seed, SeededSequence};
pub use selector::InsightSelector;
pub use signals::SignalExtractor;
pub use store::{DocumentStore, EngineStore, JsonFileStore, MemoryStore};
pub use synergy::{TraitSynergyEngine, TraitVector};
