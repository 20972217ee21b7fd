//! Cadence: deterministic insight rotation and session analytics engine
//!
//! Pipeline: SessionSnapshot → (mood timeline | trait synergy | signal
//! extraction → deep-insight selection | analyzer paragraphs) → RotationEngine

pub mod core;
pub mod types;

// =============================================================================
// MOOD TIMELINE TUNING [C]
// =============================================================================

/// EMA smoothing factor for mood score and flow blending
pub const EMA_ALPHA: f64 = 0.35;

/// Trailing window (raw scores) for flow stability variance
pub const FLOW_WINDOW: usize = 3;

/// Tension bonus per negative/tension pattern tag on a message
pub const TENSION_PATTERN_BONUS: f64 = 5.0;

/// Warmth bonus per positive/warm hook tag on a message
pub const WARMTH_HOOK_BONUS: f64 = 3.0;

// =============================================================================
// TRAIT SYNERGY TUNING [C]
// =============================================================================

/// Maximum prior sessions used for correlation
pub const SYNERGY_MAX_SESSIONS: usize = 15;

/// Minimum prior sessions required for a real correlation matrix
pub const SYNERGY_MIN_SESSIONS: usize = 5;

/// |r| threshold for emitting a synergy insight candidate
pub const SYNERGY_CANDIDATE_THRESHOLD: f64 = 0.45;

/// |r| threshold separating "strong" from "moderate" phrasing
pub const SYNERGY_STRONG_THRESHOLD: f64 = 0.70;

/// Fixed radius of the circular synergy graph layout
pub const SYNERGY_LAYOUT_RADIUS: f64 = 100.0;

// =============================================================================
// SELECTION PRIORITIES & CAPS [C]
// =============================================================================

/// Source-tier priorities for deep-insight candidates
pub const PRIORITY_GATE_FAIL: i32 = 100;
pub const PRIORITY_POSITIVE_HOOK: i32 = 80;
pub const PRIORITY_NEGATIVE_PATTERN: i32 = 60;
pub const PRIORITY_GENERAL_TIP: i32 = 40;

/// Deep-insight selection caps (tips fill the remainder up to the total)
pub const DEEP_MAX_GATE: usize = 3;
pub const DEEP_MAX_HOOK: usize = 3;
pub const DEEP_MAX_PATTERN: usize = 2;
pub const DEEP_MAX_TOTAL: usize = 6;

// =============================================================================
// ROTATION & HISTORY [C]
// =============================================================================

/// Prior sessions consulted for cooldown exclusion
pub const COOLDOWN_SESSIONS: usize = 5;

/// Signal normalization: hook strength = occurrences / this, capped at 1
pub const HOOK_STRENGTH_DIVISOR: f64 = 3.0;

/// Signal normalization: pattern severity = occurrences / this, capped at 1
pub const PATTERN_SEVERITY_DIVISOR: f64 = 2.0;

/// Evidence messages attached per extreme (top and bottom)
pub const EVIDENCE_COUNT: usize = 3;

// =============================================================================
// VERSIONS
// =============================================================================

/// Schema version stamped on every persisted payload
pub const PAYLOAD_VERSION: u32 = 1;

pub const VERSION: &str = "1.0.0";
