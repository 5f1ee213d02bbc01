//! Rule arbitration with hysteresis and a crisis override path.
//!
//! Per sample:
//! 1. Push into the telemetry window and refresh stability.
//! 2. Assess crisis severity. Severe readings short-circuit straight to the
//!    best crisis rule (or the built-in crisis patch) with no gating.
//! 3. Otherwise collect matching rules by descending priority and let the
//!    first one through the hysteresis gate win.

use crate::crisis::{CrisisAssessment, CrisisDetector, CrisisThresholds};
use crate::domain::{dt_ms, EmotionSample, SessionPhase};
use crate::rules::{crisis_patch, Rule, RuleCatalog, RuleIntent, CRISIS_PRIORITY};
use crate::stimulus::ConfigPatch;
use crate::telemetry::TelemetryWindow;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Rule id reported when a severe crisis finds no matching crisis rule.
pub const BUILTIN_CRISIS_RULE: &str = "builtin-crisis-stabilization";

/// Default history ring-buffer length.
pub const DEFAULT_HISTORY_CAP: usize = 50;

// ============================================================================
// Hysteresis
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HysteresisConfig {
    /// When false every candidate passes the gate.
    pub enabled: bool,
    /// Minimum time between accepted changes.
    pub debounce_ms: u64,
    pub max_changes_per_minute: usize,
    /// Sliding window for the rate limit.
    pub rate_window_ms: u64,
    /// Minimum |Δarousal| or |Δvalence| versus the previous sample.
    pub significance_threshold: f32,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 2000,
            max_changes_per_minute: 6,
            rate_window_ms: 60_000,
            significance_threshold: 0.15,
        }
    }
}

/// Why a candidate was held back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "reason")]
pub enum HoldReason {
    Debounce { remaining_ms: u64 },
    RateLimited { changes_in_window: usize },
    NotSignificant { delta: f32 },
}

#[derive(Debug, Clone, Default)]
pub struct HysteresisGate {
    config: HysteresisConfig,
    recent_changes: VecDeque<i64>,
}

impl HysteresisGate {
    pub fn new(config: HysteresisConfig) -> Self {
        Self {
            config,
            recent_changes: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &HysteresisConfig {
        &self.config
    }

    /// Accepted changes within the rate window ending at `now_ms`.
    pub fn changes_in_window(&self, now_ms: i64) -> usize {
        self.recent_changes
            .iter()
            .filter(|&&ts| dt_ms(now_ms, ts) < self.config.rate_window_ms)
            .count()
    }

    /// All three gates must pass: debounce, rate limit, significance.
    pub fn check(
        &self,
        now_ms: i64,
        last_change_ms: Option<i64>,
        sample: &EmotionSample,
        previous: Option<&EmotionSample>,
    ) -> Result<(), HoldReason> {
        if !self.config.enabled {
            return Ok(());
        }

        if let Some(last) = last_change_ms {
            let elapsed = dt_ms(now_ms, last);
            if elapsed < self.config.debounce_ms {
                return Err(HoldReason::Debounce {
                    remaining_ms: self.config.debounce_ms - elapsed,
                });
            }
        }

        let changes = self.changes_in_window(now_ms);
        if changes >= self.config.max_changes_per_minute {
            return Err(HoldReason::RateLimited {
                changes_in_window: changes,
            });
        }

        // Without a previous sample there is nothing to compare against.
        let delta = previous
            .map(|p| {
                (sample.arousal - p.arousal)
                    .abs()
                    .max((sample.valence - p.valence).abs())
            })
            .unwrap_or(0.0);
        if previous.is_none() || delta < self.config.significance_threshold {
            return Err(HoldReason::NotSignificant { delta });
        }

        Ok(())
    }

    pub fn record_change(&mut self, now_ms: i64) {
        let window = self.config.rate_window_ms;
        while let Some(&front) = self.recent_changes.front() {
            if dt_ms(now_ms, front) >= window {
                self.recent_changes.pop_front();
            } else {
                break;
            }
        }
        self.recent_changes.push_back(now_ms);
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp_ms: i64,
    pub rule_id: String,
    pub sample: EmotionSample,
    pub patch: ConfigPatch,
}

/// Snapshot-able arbitration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveState {
    pub current_rule: Option<String>,
    pub last_change_ms: Option<i64>,
    /// Always within [0, 1]
    pub stability: f32,
    pub change_count: u64,
    pub crisis_overrides: u64,
    pub history: VecDeque<HistoryEntry>,
}

impl Default for AdaptiveState {
    fn default() -> Self {
        Self {
            current_rule: None,
            last_change_ms: None,
            stability: 1.0,
            change_count: 0,
            crisis_overrides: 0,
            history: VecDeque::new(),
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub rule_id: String,
    pub priority: u32,
    pub patch: ConfigPatch,
    pub rationale: String,
    /// Present for moderate and severe readings
    pub crisis: Option<CrisisAssessment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "outcome")]
pub enum ArbitrationOutcome {
    /// No rule matched
    NoMatch,
    /// Rules matched but hysteresis held every candidate
    Held { rule_id: String, reason: HoldReason },
    /// The current rule was selected again
    Unchanged {
        rule_id: String,
        crisis: Option<CrisisAssessment>,
    },
    /// A new rule took effect
    Adapted(Decision),
}

impl ArbitrationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Unchanged { .. } | Self::Adapted(_))
    }

    pub fn decision(&self) -> Option<&Decision> {
        match self {
            Self::Adapted(d) => Some(d),
            _ => None,
        }
    }

    pub fn rule_id(&self) -> Option<&str> {
        match self {
            Self::NoMatch => None,
            Self::Held { rule_id, .. } | Self::Unchanged { rule_id, .. } => Some(rule_id),
            Self::Adapted(d) => Some(&d.rule_id),
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSummary {
    pub id: String,
    pub intent: RuleIntent,
    pub priority: u32,
    pub rationale: String,
}

impl From<&Rule> for RuleSummary {
    fn from(r: &Rule) -> Self {
        Self {
            id: r.id.clone(),
            intent: r.intent,
            priority: r.priority,
            rationale: r.rationale.clone(),
        }
    }
}

/// Read-only explanation of how a sample would be arbitrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapeuticReasoning {
    pub matched: Vec<RuleSummary>,
    pub crisis: CrisisAssessment,
    pub stability: f32,
    pub current_rule: Option<String>,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAssessment {
    pub samples_in_window: usize,
    pub mean_arousal: f32,
    pub mean_valence: f32,
    pub stability: f32,
    pub change_count: u64,
    pub crisis_overrides: u64,
    pub current_rule: Option<String>,
    /// Most recent accepted rules, newest last
    pub recent_rules: Vec<String>,
}

// ============================================================================
// Arbiter
// ============================================================================

#[derive(Debug, Clone)]
pub struct Arbiter {
    catalog: RuleCatalog,
    window: TelemetryWindow,
    detector: CrisisDetector,
    gate: HysteresisGate,
    state: AdaptiveState,
    history_cap: usize,
}

impl Arbiter {
    pub fn new(
        catalog: RuleCatalog,
        window_size: usize,
        hysteresis: HysteresisConfig,
        crisis: CrisisThresholds,
        history_cap: usize,
    ) -> Self {
        Self {
            catalog,
            window: TelemetryWindow::new(window_size),
            detector: CrisisDetector::new(crisis),
            gate: HysteresisGate::new(hysteresis),
            state: AdaptiveState::default(),
            history_cap: history_cap.max(1),
        }
    }

    pub fn with_catalog(catalog: RuleCatalog) -> Self {
        Self::new(
            catalog,
            crate::telemetry::DEFAULT_WINDOW,
            HysteresisConfig::default(),
            CrisisThresholds::default(),
            DEFAULT_HISTORY_CAP,
        )
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn state(&self) -> &AdaptiveState {
        &self.state
    }

    pub fn window(&self) -> &TelemetryWindow {
        &self.window
    }

    /// Record a sample for stability scoring without arbitrating.
    pub fn observe(&mut self, sample: &EmotionSample) {
        self.window.push(sample.clone());
        self.state.stability = self.window.stability();
    }

    pub fn evaluate(&mut self, sample: &EmotionSample, phase: SessionPhase) -> ArbitrationOutcome {
        self.window.push(sample.clone());
        self.state.stability = self.window.stability();
        let previous = self.window.previous().cloned();

        let crisis = self.detector.assess(sample);
        if crisis.is_severe() {
            return self.crisis_override(sample, phase, crisis);
        }
        let crisis_meta = crisis.is_crisis().then_some(crisis);

        let candidates: Vec<Rule> = self
            .catalog
            .matching(sample, phase)
            .into_iter()
            .cloned()
            .collect();
        if candidates.is_empty() {
            log::debug!(
                "arbiter: no rule matched (a={:.3}, v={:.3}, phase={})",
                sample.arousal,
                sample.valence,
                phase.as_str()
            );
            return ArbitrationOutcome::NoMatch;
        }

        let mut first_hold: Option<(String, HoldReason)> = None;
        for rule in &candidates {
            if self.state.current_rule.as_deref() == Some(rule.id.as_str()) {
                log::debug!("arbiter: '{}' re-selected, no change", rule.id);
                return ArbitrationOutcome::Unchanged {
                    rule_id: rule.id.clone(),
                    crisis: crisis_meta,
                };
            }

            let verdict = if rule.bypasses_hysteresis() {
                Ok(())
            } else {
                self.gate.check(
                    sample.timestamp_ms,
                    self.state.last_change_ms,
                    sample,
                    previous.as_ref(),
                )
            };

            match verdict {
                Ok(()) => return ArbitrationOutcome::Adapted(self.accept(sample, rule, crisis_meta)),
                Err(reason) => {
                    log::debug!("arbiter: '{}' held ({:?})", rule.id, reason);
                    if first_hold.is_none() {
                        first_hold = Some((rule.id.clone(), reason));
                    }
                }
            }
        }

        match first_hold {
            Some((rule_id, reason)) => ArbitrationOutcome::Held { rule_id, reason },
            None => ArbitrationOutcome::NoMatch,
        }
    }

    fn crisis_override(
        &mut self,
        sample: &EmotionSample,
        phase: SessionPhase,
        crisis: CrisisAssessment,
    ) -> ArbitrationOutcome {
        let rule = self
            .catalog
            .matching(sample, phase)
            .into_iter()
            .find(|r| r.is_crisis())
            .cloned()
            .unwrap_or_else(|| {
                Rule::new(
                    BUILTIN_CRISIS_RULE,
                    RuleIntent::Crisis,
                    CRISIS_PRIORITY,
                    crate::rules::RuleCondition::All(Vec::new()),
                    crisis_patch(),
                    "Severe distress with no configured crisis rule: built-in stabilization",
                )
            });

        if self.state.current_rule.as_deref() == Some(rule.id.as_str()) {
            log::warn!(
                "arbiter: crisis persists (a={:.3}, v={:.3}), holding '{}'",
                sample.arousal,
                sample.valence,
                rule.id
            );
            return ArbitrationOutcome::Unchanged {
                rule_id: rule.id,
                crisis: Some(crisis),
            };
        }

        log::warn!(
            "arbiter: crisis override to '{}' (a={:.3}, v={:.3})",
            rule.id,
            sample.arousal,
            sample.valence
        );
        self.state.crisis_overrides += 1;
        ArbitrationOutcome::Adapted(self.accept(sample, &rule, Some(crisis)))
    }

    fn accept(
        &mut self,
        sample: &EmotionSample,
        rule: &Rule,
        crisis: Option<CrisisAssessment>,
    ) -> Decision {
        let ts = sample.timestamp_ms;
        log::info!(
            "arbiter: accepted '{}' (priority {}) at {}ms: {}",
            rule.id,
            rule.priority,
            ts,
            rule.rationale
        );

        self.state.current_rule = Some(rule.id.clone());
        self.state.last_change_ms = Some(ts);
        self.state.change_count += 1;
        self.gate.record_change(ts);

        if self.state.history.len() >= self.history_cap {
            self.state.history.pop_front();
        }
        self.state.history.push_back(HistoryEntry {
            timestamp_ms: ts,
            rule_id: rule.id.clone(),
            sample: sample.clone(),
            patch: rule.patch.clone(),
        });

        Decision {
            rule_id: rule.id.clone(),
            priority: rule.priority,
            patch: rule.patch.clone(),
            rationale: rule.rationale.clone(),
            crisis,
        }
    }

    /// Explain arbitration for `sample` without touching any state.
    pub fn reasoning(&self, sample: &EmotionSample, phase: SessionPhase) -> TherapeuticReasoning {
        let crisis = self.detector.assess(sample);
        let matched: Vec<RuleSummary> = self
            .catalog
            .matching(sample, phase)
            .into_iter()
            .map(RuleSummary::from)
            .collect();
        let stability = self.window.stability();

        let mut lines = vec![format!(
            "Arousal {:.2}, valence {:.2} during {} phase.",
            sample.arousal,
            sample.valence,
            phase.as_str()
        )];
        match crisis.severity {
            crate::crisis::CrisisSeverity::Severe => {
                lines.push(
                    "Severe distress detected: crisis protocol overrides all other rules."
                        .to_string(),
                );
                let steps: Vec<&str> = crisis.interventions.iter().map(|i| i.description()).collect();
                lines.push(format!("Interventions: {}.", steps.join("; ")));
            }
            crate::crisis::CrisisSeverity::Moderate => {
                lines.push("Moderate distress detected: monitor closely.".to_string())
            }
            crate::crisis::CrisisSeverity::None => {}
        }
        match matched.first() {
            Some(top) => lines.push(format!(
                "Best match '{}' (priority {}): {}.",
                top.id, top.priority, top.rationale
            )),
            None => lines.push("No adaptation rule applies.".to_string()),
        }
        if let Some((name, v)) = sample.dominant_affect() {
            lines.push(format!("Dominant affect: {} ({:.0}).", name, v));
        }
        lines.push(format!("Window stability {:.2}.", stability));

        TherapeuticReasoning {
            matched,
            crisis,
            stability,
            current_rule: self.state.current_rule.clone(),
            explanation: lines.join(" "),
        }
    }

    pub fn assessment(&self) -> SessionAssessment {
        let (mean_arousal, mean_valence) = self.window.means().unwrap_or((0.0, 0.0));
        let recent_rules = self
            .state
            .history
            .iter()
            .rev()
            .take(5)
            .rev()
            .map(|h| h.rule_id.clone())
            .collect();
        SessionAssessment {
            samples_in_window: self.window.len(),
            mean_arousal,
            mean_valence,
            stability: self.state.stability,
            change_count: self.state.change_count,
            crisis_overrides: self.state.crisis_overrides,
            current_rule: self.state.current_rule.clone(),
            recent_rules,
        }
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::with_catalog(RuleCatalog::builtin())
    }
}
