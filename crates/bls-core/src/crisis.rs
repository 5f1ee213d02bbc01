//! Crisis detection from raw arousal/valence.
//!
//! Severity is computed independently of the rule catalog so a severe reading
//! can pre-empt normal arbitration even when no crisis rule is configured.

use crate::domain::EmotionSample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrisisSeverity {
    #[default]
    None,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intervention {
    StopStimulation,
    Grounding,
    ReturnToResources,
}

impl Intervention {
    pub fn description(&self) -> &'static str {
        match self {
            Self::StopStimulation => "Pause bilateral stimulation",
            Self::Grounding => "Guide a grounding exercise (5-4-3-2-1, feet on floor)",
            Self::ReturnToResources => "Return to safe place and stabilization resources",
        }
    }
}

const SEVERE_INTERVENTIONS: [Intervention; 3] = [
    Intervention::StopStimulation,
    Intervention::Grounding,
    Intervention::ReturnToResources,
];

/// Thresholds are strict: `arousal > x && valence < y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrisisThresholds {
    pub severe_arousal: f32,
    pub severe_valence: f32,
    pub moderate_arousal: f32,
    pub moderate_valence: f32,
}

impl Default for CrisisThresholds {
    fn default() -> Self {
        Self {
            severe_arousal: 0.9,
            severe_valence: 0.2,
            moderate_arousal: 0.75,
            moderate_valence: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisAssessment {
    pub severity: CrisisSeverity,
    pub interventions: Vec<Intervention>,
}

impl CrisisAssessment {
    pub fn none() -> Self {
        Self {
            severity: CrisisSeverity::None,
            interventions: Vec::new(),
        }
    }

    pub fn is_severe(&self) -> bool {
        self.severity == CrisisSeverity::Severe
    }

    pub fn is_crisis(&self) -> bool {
        self.severity != CrisisSeverity::None
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrisisDetector {
    thresholds: CrisisThresholds,
}

impl CrisisDetector {
    pub fn new(thresholds: CrisisThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &CrisisThresholds {
        &self.thresholds
    }

    pub fn severity(&self, sample: &EmotionSample) -> CrisisSeverity {
        let t = &self.thresholds;
        let (a, v) = (sample.arousal, sample.valence);
        if a > t.severe_arousal && v < t.severe_valence {
            CrisisSeverity::Severe
        } else if a > t.moderate_arousal && v < t.moderate_valence {
            CrisisSeverity::Moderate
        } else {
            CrisisSeverity::None
        }
    }

    pub fn assess(&self, sample: &EmotionSample) -> CrisisAssessment {
        let severity = self.severity(sample);
        let interventions = match severity {
            CrisisSeverity::Severe => SEVERE_INTERVENTIONS.to_vec(),
            CrisisSeverity::Moderate | CrisisSeverity::None => Vec::new(),
        };
        CrisisAssessment {
            severity,
            interventions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_severity_bands() {
        let d = CrisisDetector::default();
        assert_eq!(d.severity(&EmotionSample::new(0, 0.95, 0.1)), CrisisSeverity::Severe);
        assert_eq!(d.severity(&EmotionSample::new(0, 0.8, 0.25)), CrisisSeverity::Moderate);
        assert_eq!(d.severity(&EmotionSample::new(0, 0.95, 0.5)), CrisisSeverity::None);
        // Boundaries are strict
        assert_eq!(d.severity(&EmotionSample::new(0, 0.9, 0.1)), CrisisSeverity::Moderate);
        assert_eq!(d.severity(&EmotionSample::new(0, 0.75, 0.1)), CrisisSeverity::None);
    }

    #[test]
    fn severe_carries_fixed_interventions() {
        let d = CrisisDetector::default();
        let severe = d.assess(&EmotionSample::new(0, 0.95, 0.1));
        assert!(severe.is_severe());
        assert_eq!(severe.interventions.len(), 3);
        assert_eq!(severe.interventions[0], Intervention::StopStimulation);

        let moderate = d.assess(&EmotionSample::new(0, 0.8, 0.25));
        assert!(moderate.is_crisis());
        assert!(moderate.interventions.is_empty());
    }

    #[test]
    fn thresholds_are_configurable() {
        let d = CrisisDetector::new(CrisisThresholds {
            severe_arousal: 0.8,
            ..CrisisThresholds::default()
        });
        assert_eq!(d.severity(&EmotionSample::new(0, 0.85, 0.1)), CrisisSeverity::Severe);
    }
}
