//! Insight template catalog
//!
//! A fixed, hand-authored registry keyed by stable id. Constructed once and
//! passed by reference to the selector; read-only after construction, so no
//! locking and no global state.

use std::collections::HashMap;

use crate::types::{EngineError, InsightKind, InsightTemplate, TriggerKey};

/// Read-only template registry
#[derive(Debug)]
pub struct InsightCatalog {
    templates: Vec<InsightTemplate>,
    by_id: HashMap<String, usize>,
}

impl InsightCatalog {
    /// Build a catalog from an explicit template list. Duplicate ids are
    /// rejected; an id, once shipped, is never reused.
    pub fn new(templates: Vec<InsightTemplate>) -> Result<Self, EngineError> {
        let mut by_id = HashMap::with_capacity(templates.len());
        for (i, t) in templates.iter().enumerate() {
            if by_id.insert(t.id.clone(), i).is_some() {
                return Err(EngineError::DuplicateTemplate { id: t.id.clone() });
            }
        }
        Ok(Self { templates, by_id })
    }

    /// The shipped catalog
    pub fn standard() -> Self {
        Self::new(standard_templates()).expect("standard catalog has unique ids")
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn by_id(&self, id: &str) -> Option<&InsightTemplate> {
        self.by_id.get(id).map(|i| &self.templates[*i])
    }

    pub fn by_kind(&self, kind: InsightKind) -> Vec<&InsightTemplate> {
        self.templates.iter().filter(|t| t.kind == kind).collect()
    }

    /// GateFail templates whose trigger matches the gate key
    pub fn for_gate(&self, gate_key: &str) -> Vec<&InsightTemplate> {
        self.templates
            .iter()
            .filter(|t| {
                t.kind == InsightKind::GateFail
                    && matches!(&t.requires, Some(TriggerKey::Gate(k)) if k == gate_key)
            })
            .collect()
    }

    /// PositiveHook templates whose trigger matches the hook key
    pub fn for_hook(&self, hook_key: &str) -> Vec<&InsightTemplate> {
        self.templates
            .iter()
            .filter(|t| {
                t.kind == InsightKind::PositiveHook
                    && matches!(&t.requires, Some(TriggerKey::Hook(k)) if k == hook_key)
            })
            .collect()
    }

    /// NegativePattern templates whose trigger matches the pattern key
    pub fn for_pattern(&self, pattern_key: &str) -> Vec<&InsightTemplate> {
        self.templates
            .iter()
            .filter(|t| {
                t.kind == InsightKind::NegativePattern
                    && matches!(&t.requires, Some(TriggerKey::Pattern(k)) if k == pattern_key)
            })
            .collect()
    }

    /// The unconditional general-tip pool
    pub fn general_tips(&self) -> Vec<&InsightTemplate> {
        self.templates
            .iter()
            .filter(|t| t.kind == InsightKind::GeneralTip && t.requires.is_none())
            .collect()
    }
}

fn gate(id: &str, key: &str, category: &str, weight: i32, title: &str, body: &str) -> InsightTemplate {
    InsightTemplate {
        id: id.to_string(),
        kind: InsightKind::GateFail,
        category: category.to_string(),
        weight,
        cooldown_missions: 3,
        title: title.to_string(),
        body: body.to_string(),
        requires: Some(TriggerKey::Gate(key.to_string())),
    }
}

fn hook(id: &str, key: &str, category: &str, weight: i32, title: &str, body: &str) -> InsightTemplate {
    InsightTemplate {
        id: id.to_string(),
        kind: InsightKind::PositiveHook,
        category: category.to_string(),
        weight,
        cooldown_missions: 2,
        title: title.to_string(),
        body: body.to_string(),
        requires: Some(TriggerKey::Hook(key.to_string())),
    }
}

fn pattern(id: &str, key: &str, category: &str, weight: i32, title: &str, body: &str) -> InsightTemplate {
    InsightTemplate {
        id: id.to_string(),
        kind: InsightKind::NegativePattern,
        category: category.to_string(),
        weight,
        cooldown_missions: 3,
        title: title.to_string(),
        body: body.to_string(),
        requires: Some(TriggerKey::Pattern(key.to_string())),
    }
}

fn tip(id: &str, category: &str, weight: i32, title: &str, body: &str) -> InsightTemplate {
    InsightTemplate {
        id: id.to_string(),
        kind: InsightKind::GeneralTip,
        category: category.to_string(),
        weight,
        cooldown_missions: 5,
        title: title.to_string(),
        body: body.to_string(),
        requires: None,
    }
}

/// The shipped template list. Ids are stable forever; add, never rename.
fn standard_templates() -> Vec<InsightTemplate> {
    vec![
        // ---- Gate failures: opening -------------------------------------
        gate("gate_opener_flat_v1", "opener_quality", "opening", 80,
            "The opener didn't land",
            "Your first message set a flat tone. Openers that reference something specific \
             and present get far better engagement than generic greetings."),
        gate("gate_opener_generic_v1", "opener_quality", "opening", 60,
            "Generic opening",
            "Starting with a stock line makes the first minute harder than it needs to be. \
             Name something you actually noticed."),
        gate("gate_question_balance_interrogation_v1", "question_balance", "conversation", 80,
            "Too many questions in a row",
            "The session failed the question-balance gate: stacked questions read as an \
             interrogation. Trade a question for a statement or a story."),
        gate("gate_question_balance_none_v1", "question_balance", "conversation", 55,
            "No curiosity shown",
            "You asked almost nothing. A conversation with zero questions tells the other \
             person you're performing, not connecting."),
        gate("gate_thread_dropped_v1", "thread_continuity", "conversation", 75,
            "Dropped threads",
            "They offered threads you never picked up. Circling back to something they said \
             two turns ago is the cheapest high-value move available."),
        gate("gate_thread_forced_v1", "thread_continuity", "conversation", 50,
            "Forced topic changes",
            "Several hard topic pivots cut off exchanges that were still alive. Let a thread \
             end before starting the next one."),
        gate("gate_escalation_stalled_v1", "escalation", "momentum", 85,
            "The conversation plateaued",
            "Warmth held steady but never deepened. Past a certain point, staying safe reads \
             as disinterest."),
        gate("gate_escalation_rushed_v1", "escalation", "momentum", 70,
            "Escalated too fast",
            "You pushed past the comfort level the other person was signaling. Escalation \
             works in steps that get acknowledged, not leaps."),
        gate("gate_listening_missed_v1", "listening", "attention", 85,
            "Missed what they told you",
            "They stated a preference or a feeling and your reply ignored it. Reflecting one \
             concrete detail back beats any prepared line."),
        gate("gate_listening_self_focus_v1", "listening", "attention", 60,
            "Conversation tilted toward you",
            "Most turns routed the topic back to yourself. Aim for a rough balance of \
             spotlight time."),
        gate("gate_frame_lost_v1", "frame_control", "frame", 75,
            "Lost the frame",
            "You agreed your own point away under light pushback. Holding a position \
             calmly matters more than the position itself."),
        gate("gate_frame_rigid_v1", "frame_control", "frame", 50,
            "Held the frame too rigidly",
            "Refusing every reframe made the exchange adversarial. Conceding a small point \
             costs nothing and buys goodwill."),
        gate("gate_energy_mismatch_low_v1", "energy_match", "energy", 65,
            "Energy sagged below theirs",
            "They brought more energy than you returned. Matching pace and length of \
             replies is the baseline of rapport."),
        gate("gate_energy_mismatch_high_v1", "energy_match", "energy", 55,
            "Overpowered their energy",
            "Your intensity ran well above theirs for most of the session. Throttle to \
             slightly above their level, not double it."),
        gate("gate_closing_abrupt_v1", "closing", "closing", 70,
            "Abrupt ending",
            "The session ended mid-beat with no close. A one-line wrap that names a concrete \
             next step converts goodwill into momentum."),
        gate("gate_closing_dragged_v1", "closing", "closing", 45,
            "Overstayed the ending",
            "The conversation had a natural exit you rode past. End on the peak, not after it."),
        gate("gate_vulnerability_absent_v1", "vulnerability", "depth", 60,
            "Stayed armored",
            "Everything you shared was polished. One unpolished, true thing would have done \
             more than all of it."),
        gate("gate_vulnerability_dumped_v1", "vulnerability", "depth", 55,
            "Shared too heavy too early",
            "Depth works when it's earned. Heavy disclosures in the first minutes shift the \
             burden onto the other person."),

        // ---- Positive hooks ---------------------------------------------
        hook("hook_humor_landed_v1", "humor_landed", "humor", 80,
            "Your humor landed",
            "A joke got a genuine reaction and lifted the whole exchange. Note what kind of \
             humor it was; that's your lane."),
        hook("hook_humor_callback_v1", "humor_landed", "humor", 60,
            "Humor built momentum",
            "You kept a playful tone going across turns rather than one-off jokes. Sustained \
             levity is rarer and worth more."),
        hook("hook_callback_used_v1", "callback", "conversation", 85,
            "Callback connected",
            "You referenced something from earlier and they lit up. Callbacks prove you were \
             listening the whole time."),
        hook("hook_callback_theirs_v1", "callback", "conversation", 55,
            "They called back to you",
            "They reused something you said. That's an investment signal; acknowledge it and \
             build on it."),
        hook("hook_curiosity_spike_v1", "curiosity_spike", "engagement", 80,
            "You sparked real curiosity",
            "A question of theirs came unprompted and specific. Whatever topic triggered it \
             is a door; walk through it next time too."),
        hook("hook_curiosity_followup_v1", "curiosity_spike", "engagement", 55,
            "Sustained their curiosity",
            "They asked follow-ups instead of changing topics. Keep feeding short answers \
             that leave room for more."),
        hook("hook_shared_interest_v1", "shared_interest", "connection", 75,
            "Found common ground",
            "A genuine shared interest surfaced and the pace picked up immediately. Anchor \
             future plans to it."),
        hook("hook_shared_values_v1", "shared_interest", "connection", 60,
            "Values aligned",
            "The exchange touched on something you both actually care about. Those beats \
             carry more weight than any banter."),
        hook("hook_teasing_landed_v1", "teasing", "play", 70,
            "Playful push worked",
            "Light teasing got a laugh, not a flinch. You calibrated it well; the line is \
             always their reaction, not your intent."),
        hook("hook_storytelling_v1", "storytelling", "narrative", 75,
            "Your story pulled them in",
            "A story of yours generated questions and energy. Trim it ten percent and keep \
             it in rotation."),
        hook("hook_story_exchange_v1", "storytelling", "narrative", 55,
            "Stories flowed both ways",
            "Your story prompted one of theirs. A story trade is one of the strongest \
             rapport loops there is."),
        hook("hook_future_plans_v1", "future_plans", "momentum", 85,
            "Future talk appeared",
            "They talked about doing something together later. That's among the strongest \
             signals a session can produce; make the plan concrete within a day."),
        hook("hook_inside_joke_v1", "inside_joke", "connection", 80,
            "An inside joke formed",
            "Something from this session became a shared reference. Inside jokes are \
             compounding assets; reuse it sparingly."),
        hook("hook_deep_dive_v1", "deep_dive", "depth", 75,
            "The conversation went deep",
            "You got past surface level and they stayed engaged. Depth tolerance this early \
             is worth noting."),
        hook("hook_compliment_received_v1", "compliment_received", "signals", 70,
            "They complimented you",
            "An unprompted compliment is them investing. Receive it without deflecting; a \
             simple thanks keeps the frame."),
        hook("hook_laughter_sustained_v1", "humor_landed", "humor", 50,
            "Laughter ran through the session",
            "Multiple laughter beats spread across the session rather than clustered at the \
             start. That's rhythm, not luck."),
        hook("hook_vulnerability_met_v1", "deep_dive", "depth", 60,
            "Openness was reciprocated",
            "You shared something real and they matched it. Reciprocated vulnerability is \
             the fastest trust builder available."),
        hook("hook_energy_peak_v1", "curiosity_spike", "energy", 50,
            "You created an energy peak",
            "One stretch of the session ran notably hotter than the rest. Find what started \
             it; that's repeatable."),

        // ---- Negative patterns ------------------------------------------
        pattern("pattern_interview_mode_v1", "interview_mode", "conversation", 80,
            "Interview mode",
            "Question, answer, question, answer. No statements, no stories, no risk. Break \
             the loop by reacting to answers instead of filing them."),
        pattern("pattern_interview_recovery_v1", "interview_mode", "conversation", 50,
            "Interview mode crept back",
            "You broke the question loop early on but fell back into it late, usually a \
             sign of running out of material. Prepare three stories, not ten questions."),
        pattern("pattern_over_apologizing_v1", "over_apologizing", "frame", 75,
            "Apologizing too much",
            "Multiple apologies for things that need none. Each one lowers your perceived \
             status a notch. Replace 'sorry for rambling' with silence."),
        pattern("pattern_apology_spiral_v1", "over_apologizing", "frame", 55,
            "Apology spiral",
            "An apology triggered an apology for the apology. Stop at zero; nothing that \
             happened required one."),
        pattern("pattern_self_deprecation_v1", "self_deprecation", "frame", 70,
            "Self-deprecation overload",
            "One self-aware joke is charming; a run of them asks the other person to manage \
             your self-image. Cut the count in half."),
        pattern("pattern_validation_seeking_v1", "validation_seeking", "frame", 75,
            "Fishing for approval",
            "Several messages existed only to be agreed with. Opinions you'll defend are \
             attractive; opinions you'll abandon aren't."),
        pattern("pattern_topic_hopping_v1", "topic_hopping", "conversation", 65,
            "Topic hopping",
            "No thread survived more than two turns. Depth beats coverage; pick one thread \
             per session and stay until it resists."),
        pattern("pattern_one_word_replies_v1", "one_word_replies", "engagement", 70,
            "Minimal replies",
            "Stretches of one-word answers put the entire conversational burden on them. \
             If you're not feeling it, say something true about that instead."),
        pattern("pattern_over_explaining_v1", "over_explaining", "conversation", 60,
            "Over-explaining",
            "Points kept going two sentences past their landing. Trust the first version; \
             the caveats are for you, not them."),
        pattern("pattern_monologuing_v1", "monologuing", "conversation", 65,
            "Monologuing",
            "Several replies ran long with no check-in. A monologue with great content is \
             still a monologue."),
        pattern("pattern_hedging_v1", "over_explaining", "frame", 50,
            "Hedging every statement",
            "'Kind of', 'maybe', 'I guess' prefixed most of your opinions. Strip the \
             qualifiers; disagreement is cheaper than fog."),
        pattern("pattern_mirroring_loss_v1", "one_word_replies", "engagement", 45,
            "Stopped mirroring",
            "Early on you matched their message length and tempo; later replies went \
             terse while theirs stayed long. That asymmetry reads as fading interest."),
        pattern("pattern_defensiveness_v1", "validation_seeking", "frame", 55,
            "Defensive reactions",
            "Light pushback got explanations instead of play. Treat a challenge as an \
             invitation to banter, not a case to win."),
        pattern("pattern_topic_regression_v1", "topic_hopping", "conversation", 40,
            "Returning to dead topics",
            "You reopened threads that had already ended twice. Forward beats backward \
             unless you're making a callback joke."),

        // ---- General tips ------------------------------------------------
        tip("tip_specificity_v1", "conversation", 70,
            "Specific beats general",
            "'How was your weekend' gets a word; 'did you actually do the hike' gets a \
             story. Specificity is the cheapest upgrade in conversation."),
        tip("tip_silence_tolerance_v1", "frame", 65,
            "Let silences breathe",
            "Rushing to fill every pause signals anxiety. A two-second silence is the other \
             person thinking, not the conversation dying."),
        tip("tip_statement_openers_v1", "opening", 60,
            "Open with observations",
            "Statements invite response without demanding it. Three statements to one \
             question is a healthy ratio early on."),
        tip("tip_emotional_labeling_v1", "depth", 60,
            "Name the emotion in the room",
            "'You sound genuinely excited about that' moves a conversation one level \
             deeper in a single line."),
        tip("tip_story_bank_v1", "narrative", 55,
            "Keep three stories warm",
            "A travel mishap, a work absurdity, a childhood oddity. Told in under a minute \
             each, they cover ninety percent of lulls."),
        tip("tip_exit_on_peak_v1", "closing", 65,
            "End on a high note",
            "Close one beat after the best moment, not ten. The last thirty seconds set \
             the memory of the whole exchange."),
        tip("tip_curiosity_genuine_v1", "engagement", 55,
            "Ask what you actually wonder",
            "Manufactured questions get manufactured answers. If you're not curious, switch \
             topics until you are."),
        tip("tip_react_before_redirect_v1", "conversation", 60,
            "React before you redirect",
            "Acknowledge what they said in half a sentence before steering elsewhere. \
             Skipping the acknowledgment is what makes pivots feel cold."),
        tip("tip_tempo_matching_v1", "energy", 50,
            "Match tempo first",
            "Before changing a conversation's energy, match it for two turns. You can only \
             lead from alongside."),
        tip("tip_tease_calibration_v1", "play", 50,
            "Calibrate teasing by reaction",
            "The test of a tease is their face, not your intention. One flinch means one \
             apology-free step back."),
        tip("tip_own_opinions_v1", "frame", 55,
            "Have a take",
            "Agreeable is forgettable. A lightly held but clearly stated preference gives \
             the other person something to push against."),
        tip("tip_question_depth_v1", "conversation", 45,
            "Follow up instead of moving on",
            "The second question on the same topic is worth three first questions. Most \
             people never ask it."),
        tip("tip_recovery_speed_v1", "momentum", 45,
            "Recover fast, not perfectly",
            "After an awkward beat, the speed of your recovery matters more than its \
             elegance. Acknowledge lightly and move."),
        tip("tip_compliment_specific_v1", "signals", 45,
            "Compliment choices, not features",
            "Complimenting something they chose (a book, a route, a phrasing) lands better \
             than complimenting something they were born with."),
        tip("tip_listening_notes_v1", "attention", 50,
            "Collect threads out loud",
            "'You mentioned two things I want to come back to' is both a compliment and a \
             map for the next ten minutes."),
        tip("tip_energy_budget_v1", "energy", 40,
            "Budget your intensity",
            "Opening at maximum energy leaves nowhere to go. Start at seven, save ten for \
             the peaks."),
    ]
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_size() {
        let catalog = InsightCatalog::standard();
        assert!(catalog.len() >= 65, "catalog has {} templates", catalog.len());
    }

    #[test]
    fn test_unique_ids_enforced() {
        let t = tip("tip_dup_v1", "x", 10, "a", "b");
        let err = InsightCatalog::new(vec![t.clone(), t]).unwrap_err();
        assert_eq!(err.code(), "E300_DUPLICATE_TEMPLATE");
    }

    #[test]
    fn test_lookup_by_id() {
        let catalog = InsightCatalog::standard();
        let t = catalog.by_id("pattern_interview_mode_v1").unwrap();
        assert_eq!(t.kind, InsightKind::NegativePattern);
        assert!(catalog.by_id("nope").is_none());
    }

    #[test]
    fn test_gate_lookup_filters_kind_and_key() {
        let catalog = InsightCatalog::standard();
        let hits = catalog.for_gate("opener_quality");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|t| t.kind == InsightKind::GateFail));
        assert!(catalog.for_gate("no_such_gate").is_empty());
    }

    #[test]
    fn test_hook_and_pattern_lookup() {
        let catalog = InsightCatalog::standard();
        assert!(!catalog.for_hook("humor_landed").is_empty());
        assert!(!catalog.for_pattern("over_apologizing").is_empty());
        // Hook keys never match the pattern lookup
        assert!(catalog.for_pattern("humor_landed").is_empty());
    }

    #[test]
    fn test_general_tip_pool_is_unconditional() {
        let catalog = InsightCatalog::standard();
        let tips = catalog.general_tips();
        assert!(tips.len() >= 14);
        assert!(tips.iter().all(|t| t.requires.is_none()));
    }

    #[test]
    fn test_every_kind_represented() {
        let catalog = InsightCatalog::standard();
        for kind in [
            InsightKind::GateFail,
            InsightKind::PositiveHook,
            InsightKind::NegativePattern,
            InsightKind::GeneralTip,
        ] {
            assert!(!catalog.by_kind(kind).is_empty(), "{:?} missing", kind);
        }
    }
}
