//! Rule catalog: named condition → adaptation pairs.
//!
//! Conditions are plain data evaluated against one sample and the current
//! session phase, the same shape as a decision-tree branch condition. The
//! arbiter decides which matching rule is allowed to take effect.

use crate::domain::{BasicEmotion, EmotionSample, SessionPhase, TherapeuticMode};
use crate::easing::Easing;
use crate::motion::MotionPattern;
use crate::sensory::{BrainWaveState, HapticPattern};
use crate::stimulus::{
    AudioKind, AudioPatch, ConfigPatch, HapticsPatch, LightingMode, RenderPatch, Rgb,
    TransitionPatch,
};
use serde::{Deserialize, Serialize};

/// Priorities at or above this bypass every hysteresis gate.
pub const CRISIS_PRIORITY: u32 = 100;

const FEAR_AFFECTS: [&str; 4] = ["Afraid", "Scared", "Startled", "Distressed"];
const PANIC_AFFECTS: [&str; 3] = ["Afraid", "Scared", "Terrified"];
const TENSION_AFFECTS: [&str; 3] = ["Tense", "Nervous", "Anxious"];
const ANGER_AFFECTS: [&str; 3] = ["Angry", "Annoyed", "Frustrated"];
const SADNESS_AFFECTS: [&str; 3] = ["Sad", "Depressed", "Miserable"];
const INTEREST_AFFECTS: [&str; 3] = ["Interested", "Curious", "Excited"];

// ============================================================================
// Conditions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleCondition {
    ArousalAbove(f32),
    ArousalBelow(f32),
    /// Inclusive on both ends
    ArousalBetween(f32, f32),
    ValenceAbove(f32),
    ValenceBelow(f32),
    ValenceAtLeast(f32),
    ValenceBetween(f32, f32),
    /// Any of the named affects strictly above the threshold (0-100 scale)
    AnyAffectAbove(Vec<String>, f32),
    EmotionAbove(BasicEmotion, f32),
    PhaseIs(SessionPhase),
    All(Vec<RuleCondition>),
    Any(Vec<RuleCondition>),
}

impl RuleCondition {
    pub fn evaluate(&self, sample: &EmotionSample, phase: SessionPhase) -> bool {
        let (a, v) = (sample.arousal, sample.valence);
        match self {
            RuleCondition::ArousalAbove(t) => a > *t,
            RuleCondition::ArousalBelow(t) => a < *t,
            RuleCondition::ArousalBetween(lo, hi) => a >= *lo && a <= *hi,
            RuleCondition::ValenceAbove(t) => v > *t,
            RuleCondition::ValenceBelow(t) => v < *t,
            RuleCondition::ValenceAtLeast(t) => v >= *t,
            RuleCondition::ValenceBetween(lo, hi) => v >= *lo && v <= *hi,
            RuleCondition::AnyAffectAbove(names, t) => {
                names.iter().any(|name| sample.affect(name) > *t)
            }
            RuleCondition::EmotionAbove(e, t) => sample.emotion(*e) > *t,
            RuleCondition::PhaseIs(p) => phase == *p,
            RuleCondition::All(cs) => cs.iter().all(|c| c.evaluate(sample, phase)),
            RuleCondition::Any(cs) => cs.iter().any(|c| c.evaluate(sample, phase)),
        }
    }

    fn affects(names: &[&str], threshold: f32) -> Self {
        RuleCondition::AnyAffectAbove(names.iter().map(|s| s.to_string()).collect(), threshold)
    }
}

// ============================================================================
// Rules
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleIntent {
    Crisis,
    HighArousal,
    LowArousal,
    PositiveAffect,
    NegativeAffect,
    PhaseSpecific,
    OptimalWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub intent: RuleIntent,
    pub priority: u32,
    pub condition: RuleCondition,
    pub patch: ConfigPatch,
    pub rationale: String,
}

impl Rule {
    pub fn new(
        id: &str,
        intent: RuleIntent,
        priority: u32,
        condition: RuleCondition,
        patch: ConfigPatch,
        rationale: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            intent,
            priority,
            condition,
            patch,
            rationale: rationale.to_string(),
        }
    }

    pub fn matches(&self, sample: &EmotionSample, phase: SessionPhase) -> bool {
        self.condition.evaluate(sample, phase)
    }

    pub fn is_crisis(&self) -> bool {
        self.intent == RuleIntent::Crisis
    }

    /// Rules at crisis priority skip debounce, rate limiting and significance.
    pub fn bypasses_hysteresis(&self) -> bool {
        self.priority >= CRISIS_PRIORITY
    }
}

/// Ordered rule collection. Catalog order breaks priority ties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
}

impl RuleCatalog {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        Self::new(builtin_rules())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn get_rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn rules_by_intent(&self, intent: RuleIntent) -> Vec<&Rule> {
        self.rules.iter().filter(|r| r.intent == intent).collect()
    }

    /// Every rule whose condition holds, highest priority first.
    pub fn matching(&self, sample: &EmotionSample, phase: SessionPhase) -> Vec<&Rule> {
        let mut hits: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.matches(sample, phase))
            .collect();
        // sort_by is stable, so catalog order survives on ties
        hits.sort_by(|a, b| b.priority.cmp(&a.priority));
        hits
    }
}

// ============================================================================
// Built-in catalog
// ============================================================================

/// Stabilization patch used by severe-crisis rules and as the fallback when a
/// catalog carries no matching crisis rule.
pub fn crisis_patch() -> ConfigPatch {
    ConfigPatch {
        speed: Some(2.0),
        pattern: Some(MotionPattern::Horizontal),
        primary_color: Some(Rgb::new(0x6F, 0xA8, 0xDC)),
        secondary_color: Some(Rgb::new(0xA4, 0xC2, 0xF4)),
        size: Some(1.2),
        audio: Some(AudioPatch {
            volume: Some(0.3),
            frequency_hz: Some(174.0),
            kind: Some(AudioKind::Sine),
            binaural: Some(BrainWaveState::Theta),
            ..Default::default()
        }),
        haptics: Some(HapticsPatch {
            enabled: Some(true),
            pattern: Some(HapticPattern::Gentle),
            ..Default::default()
        }),
        render: Some(RenderPatch {
            lighting: Some(LightingMode::Therapeutic),
            particles: Some(false),
            glow_intensity: Some(0.1),
            ..Default::default()
        }),
        transition: Some(TransitionPatch {
            duration_ms: Some(800.0),
            easing: Some(Easing::EaseOut),
            ..Default::default()
        }),
        therapeutic_mode: Some(TherapeuticMode::TraumaSensitive),
        ..Default::default()
    }
}

fn patch(speed: f32, pattern: MotionPattern, primary: Rgb, secondary: Rgb) -> ConfigPatch {
    ConfigPatch {
        speed: Some(speed),
        pattern: Some(pattern),
        primary_color: Some(primary),
        secondary_color: Some(secondary),
        ..Default::default()
    }
}

fn binaural(state: BrainWaveState, volume: f32) -> Option<AudioPatch> {
    Some(AudioPatch {
        kind: Some(AudioKind::Binaural),
        binaural: Some(state),
        volume: Some(volume),
        ..Default::default()
    })
}

fn haptic(pattern: HapticPattern, intensity: f32) -> Option<HapticsPatch> {
    Some(HapticsPatch {
        enabled: Some(true),
        pattern: Some(pattern),
        intensity: Some(intensity),
        ..Default::default()
    })
}

fn morph(duration_ms: f32) -> Option<TransitionPatch> {
    Some(TransitionPatch {
        duration_ms: Some(duration_ms),
        easing: Some(Easing::Therapeutic),
        enable_morphing: Some(true),
        ..Default::default()
    })
}

/// The default catalog, in tie-break order.
pub fn builtin_rules() -> Vec<Rule> {
    use RuleCondition::*;

    vec![
        // Crisis / safety
        Rule::new(
            "crisis-severe-distress",
            RuleIntent::Crisis,
            100,
            All(vec![ArousalAbove(0.9), ValenceBelow(0.2)]),
            crisis_patch(),
            "Severe distress: slow down, soften and ground immediately",
        ),
        Rule::new(
            "crisis-panic",
            RuleIntent::Crisis,
            100,
            All(vec![RuleCondition::affects(&PANIC_AFFECTS, 40.0), ArousalAbove(0.8)]),
            ConfigPatch {
                speed: Some(1.5),
                haptics: haptic(HapticPattern::Heartbeat, 0.6),
                ..crisis_patch()
            },
            "Panic markers: minimal stimulation with paced heartbeat grounding",
        ),
        Rule::new(
            "safety-dissociation",
            RuleIntent::Crisis,
            90,
            All(vec![ArousalBelow(0.15), ValenceBelow(0.25)]),
            ConfigPatch {
                audio: Some(AudioPatch {
                    kind: Some(AudioKind::Chime),
                    volume: Some(0.6),
                    ..Default::default()
                }),
                haptics: haptic(HapticPattern::Pulse, 0.7),
                ..patch(
                    4.0,
                    MotionPattern::Horizontal,
                    Rgb::new(0xF6, 0xB2, 0x6B),
                    Rgb::new(0xFF, 0xE5, 0x99),
                )
            },
            "Possible dissociation: reorient with brighter, clearly lateral cues",
        ),
        // High arousal
        Rule::new(
            "acute-fear-grounding",
            RuleIntent::HighArousal,
            85,
            RuleCondition::affects(&FEAR_AFFECTS, 15.0),
            ConfigPatch {
                audio: binaural(BrainWaveState::Theta, 0.4),
                haptics: haptic(HapticPattern::Heartbeat, 0.5),
                ..patch(
                    3.0,
                    MotionPattern::Horizontal,
                    Rgb::new(0x93, 0xC4, 0x7D),
                    Rgb::new(0xD9, 0xEA, 0xD3),
                )
            },
            "Fear affects present: steady lateral tracking with grounding pulses",
        ),
        Rule::new(
            "high-arousal-regulation",
            RuleIntent::HighArousal,
            80,
            ArousalAbove(0.7),
            ConfigPatch {
                audio: binaural(BrainWaveState::Theta, 0.4),
                transition: Some(TransitionPatch {
                    duration_ms: Some(2000.0),
                    ..Default::default()
                }),
                ..patch(
                    3.0,
                    MotionPattern::Circle,
                    Rgb::new(0x76, 0xA5, 0xAF),
                    Rgb::new(0xA2, 0xC4, 0xC9),
                )
            },
            "Elevated arousal: slower, rounder motion to down-regulate",
        ),
        Rule::new(
            "anxiety-reduction",
            RuleIntent::HighArousal,
            70,
            All(vec![ArousalAbove(0.6), RuleCondition::affects(&TENSION_AFFECTS, 20.0)]),
            ConfigPatch {
                audio: binaural(BrainWaveState::Alpha, 0.45),
                haptics: haptic(HapticPattern::Gentle, 0.4),
                transition: morph(2500.0),
                ..patch(
                    3.5,
                    MotionPattern::Infinity,
                    Rgb::new(0x9F, 0xC5, 0xE8),
                    Rgb::new(0xCF, 0xE2, 0xF3),
                )
            },
            "Tension markers: flowing figure-eight with alpha entrainment",
        ),
        Rule::new(
            "anger-release",
            RuleIntent::HighArousal,
            65,
            Any(vec![
                EmotionAbove(BasicEmotion::Angry, 0.5),
                RuleCondition::affects(&ANGER_AFFECTS, 20.0),
            ]),
            ConfigPatch {
                audio: Some(AudioPatch {
                    kind: Some(AudioKind::Nature),
                    ..Default::default()
                }),
                transition: morph(2000.0),
                ..patch(
                    6.0,
                    MotionPattern::OceanWave,
                    Rgb::new(0x6D, 0x9E, 0xEB),
                    Rgb::new(0x3D, 0x85, 0xC6),
                )
            },
            "Anger present: rhythmic wave motion to discharge energy",
        ),
        // Negative affect
        Rule::new(
            "sadness-support",
            RuleIntent::NegativeAffect,
            60,
            Any(vec![
                RuleCondition::affects(&SADNESS_AFFECTS, 20.0),
                EmotionAbove(BasicEmotion::Sad, 0.5),
            ]),
            ConfigPatch {
                audio: binaural(BrainWaveState::Alpha, 0.5),
                render: Some(RenderPatch {
                    lighting: Some(LightingMode::Therapeutic),
                    glow_intensity: Some(0.5),
                    ..Default::default()
                }),
                transition: morph(2500.0),
                ..patch(
                    4.0,
                    MotionPattern::Spiral,
                    Rgb::new(0xF9, 0xCB, 0x9C),
                    Rgb::new(0xFC, 0xE5, 0xCD),
                )
            },
            "Sadness markers: warm colors and gentle upward spiral",
        ),
        // Phase specific
        Rule::new(
            "phase-closure-settle",
            RuleIntent::PhaseSpecific,
            50,
            PhaseIs(SessionPhase::Closure),
            ConfigPatch {
                audio: binaural(BrainWaveState::Alpha, 0.3),
                transition: morph(3000.0),
                ..patch(
                    2.5,
                    MotionPattern::Sphere,
                    Rgb::new(0xB4, 0xA7, 0xD6),
                    Rgb::new(0xD9, 0xD2, 0xE9),
                )
            },
            "Closure phase: settle toward a calm, contained state",
        ),
        // Low arousal
        Rule::new(
            "low-arousal-activation",
            RuleIntent::LowArousal,
            45,
            All(vec![ArousalBelow(0.3), ValenceAtLeast(0.3)]),
            ConfigPatch {
                audio: Some(AudioPatch {
                    kind: Some(AudioKind::Chime),
                    binaural: Some(BrainWaveState::Beta),
                    ..Default::default()
                }),
                transition: morph(1500.0),
                ..patch(
                    7.0,
                    MotionPattern::Lissajous,
                    Rgb::new(0xFF, 0xD9, 0x66),
                    Rgb::new(0xF6, 0xB2, 0x6B),
                )
            },
            "Low arousal: brisker, brighter stimulation to re-engage attention",
        ),
        Rule::new(
            "phase-installation-strengthen",
            RuleIntent::PhaseSpecific,
            40,
            All(vec![PhaseIs(SessionPhase::Installation), ValenceAbove(0.5)]),
            ConfigPatch {
                render: Some(RenderPatch {
                    glow_intensity: Some(0.6),
                    ..Default::default()
                }),
                transition: morph(2000.0),
                ..patch(
                    5.0,
                    MotionPattern::Helix,
                    Rgb::new(0xB6, 0xD7, 0xA8),
                    Rgb::new(0xFF, 0xE5, 0x99),
                )
            },
            "Installation with positive valence: strengthen the positive cognition",
        ),
        Rule::new(
            "phase-body-scan-calm",
            RuleIntent::PhaseSpecific,
            40,
            All(vec![PhaseIs(SessionPhase::BodyScan), ArousalAbove(0.5)]),
            patch(
                3.0,
                MotionPattern::Wave3d,
                Rgb::new(0xA2, 0xC4, 0xC9),
                Rgb::new(0xD0, 0xE0, 0xE3),
            ),
            "Body scan with residual activation: slow wave to release tension",
        ),
        // Positive affect
        Rule::new(
            "positive-resource-installation",
            RuleIntent::PositiveAffect,
            35,
            All(vec![ValenceAbove(0.7), ArousalBetween(0.3, 0.7)]),
            ConfigPatch {
                render: Some(RenderPatch {
                    particles: Some(true),
                    glow_intensity: Some(0.5),
                    ..Default::default()
                }),
                transition: morph(2000.0),
                ..patch(
                    4.5,
                    MotionPattern::Butterfly,
                    Rgb::new(0xFF, 0xE5, 0x99),
                    Rgb::new(0xB6, 0xD7, 0xA8),
                )
            },
            "Positive state: butterfly motion to anchor the resource",
        ),
        // Optimal processing window
        Rule::new(
            "optimal-processing-window",
            RuleIntent::OptimalWindow,
            30,
            All(vec![
                ArousalBetween(0.4, 0.65),
                ValenceBetween(0.35, 0.65),
                PhaseIs(SessionPhase::Desensitization),
            ]),
            ConfigPatch {
                audio: binaural(BrainWaveState::Alpha, 0.5),
                ..patch(
                    6.0,
                    MotionPattern::Horizontal,
                    Rgb::new(0x4A, 0x90, 0xE2),
                    Rgb::new(0x7E, 0xD3, 0x21),
                )
            },
            "Within the window of tolerance: standard lateral processing",
        ),
        Rule::new(
            "phase-preparation-safe-place",
            RuleIntent::PhaseSpecific,
            30,
            All(vec![PhaseIs(SessionPhase::Preparation), ValenceAbove(0.4)]),
            ConfigPatch {
                transition: morph(2500.0),
                ..patch(
                    3.0,
                    MotionPattern::Sphere,
                    Rgb::new(0xD9, 0xEA, 0xD3),
                    Rgb::new(0xCF, 0xE2, 0xF3),
                )
            },
            "Preparation: slow enveloping motion while building the safe place",
        ),
        Rule::new(
            "creative-exploration",
            RuleIntent::PositiveAffect,
            20,
            All(vec![ValenceAbove(0.6), RuleCondition::affects(&INTEREST_AFFECTS, 20.0)]),
            ConfigPatch {
                render: Some(RenderPatch {
                    lighting: Some(LightingMode::Dramatic),
                    particles: Some(true),
                    ..Default::default()
                }),
                transition: morph(2000.0),
                ..patch(
                    5.0,
                    MotionPattern::DoubleHelix,
                    Rgb::new(0x8E, 0x7C, 0xC3),
                    Rgb::new(0xFF, 0xD9, 0x66),
                )
            },
            "Curiosity with positive valence: richer 3D motion for exploration",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_unique_and_crisis_rules_outrank_others() {
        let catalog = RuleCatalog::builtin();
        let mut ids: Vec<_> = catalog.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());

        for r in catalog.iter() {
            if r.is_crisis() {
                assert!(r.priority >= 90, "{} under-prioritised", r.id);
            } else {
                assert!(r.priority < 90, "{} collides with crisis band", r.id);
            }
        }
    }

    #[test]
    fn severe_sample_matches_crisis_first() {
        let catalog = RuleCatalog::builtin();
        let s = EmotionSample::new(0, 0.95, 0.1);
        let hits = catalog.matching(&s, SessionPhase::Desensitization);
        assert_eq!(hits[0].id, "crisis-severe-distress");
        assert!(hits.iter().any(|r| r.id == "high-arousal-regulation"));
    }

    #[test]
    fn fear_affect_threshold_is_strict() {
        let catalog = RuleCatalog::builtin();
        let rule = catalog.get_rule("acute-fear-grounding").unwrap();
        let at = EmotionSample::new(0, 0.5, 0.5).with_affect("Startled", 15.0);
        let above = EmotionSample::new(0, 0.5, 0.5).with_affect("Startled", 15.5);
        assert!(!rule.matches(&at, SessionPhase::Preparation));
        assert!(rule.matches(&above, SessionPhase::Preparation));
    }

    #[test]
    fn ties_keep_catalog_order() {
        let catalog = RuleCatalog::new(vec![
            Rule::new("first", RuleIntent::LowArousal, 10, RuleCondition::ArousalBelow(1.0), ConfigPatch::default(), ""),
            Rule::new("second", RuleIntent::LowArousal, 10, RuleCondition::ArousalBelow(1.0), ConfigPatch::default(), ""),
            Rule::new("top", RuleIntent::LowArousal, 50, RuleCondition::ArousalBelow(1.0), ConfigPatch::default(), ""),
        ]);
        let hits = catalog.matching(&EmotionSample::new(0, 0.5, 0.5), SessionPhase::Preparation);
        let ids: Vec<_> = hits.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "first", "second"]);
    }

    #[test]
    fn phase_gated_rules_respect_phase() {
        let catalog = RuleCatalog::builtin();
        let s = EmotionSample::new(0, 0.5, 0.5);
        let in_window = catalog.matching(&s, SessionPhase::Desensitization);
        assert!(in_window.iter().any(|r| r.id == "optimal-processing-window"));
        let closure = catalog.matching(&s, SessionPhase::Closure);
        assert!(!closure.iter().any(|r| r.id == "optimal-processing-window"));
        assert!(closure.iter().any(|r| r.id == "phase-closure-settle"));
    }

    #[test]
    fn intent_and_id_queries() {
        let catalog = RuleCatalog::builtin();
        let crisis = catalog.rules_by_intent(RuleIntent::Crisis);
        assert_eq!(crisis.len(), 3);
        assert!(catalog.get_rule("no-such-rule").is_none());
        assert!(RuleCatalog::empty().matching(&EmotionSample::new(0, 0.95, 0.1), SessionPhase::Preparation).is_empty());
    }

    #[test]
    fn rising_arousal_scenario_matches_nothing_until_high_arousal() {
        let catalog = RuleCatalog::builtin();
        for a in [0.2f32, 0.3875, 0.575] {
            let s = EmotionSample::new(0, a, 0.15);
            assert!(catalog.matching(&s, SessionPhase::Preparation).is_empty(), "a={}", a);
        }
        let s = EmotionSample::new(0, 0.7625, 0.15);
        assert_eq!(catalog.matching(&s, SessionPhase::Preparation)[0].id, "high-arousal-regulation");
    }
}
