use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// TIME HELPERS
// ============================================================================

/// Elapsed milliseconds between two telemetry timestamps.
/// Returns 0 instead of a negative value if the clock went backwards.
#[inline]
pub fn dt_ms(now_ms: i64, last_ms: i64) -> u64 {
    if now_ms >= last_ms {
        (now_ms - last_ms) as u64
    } else {
        0
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown motion pattern '{0}'")]
    UnknownPattern(String),
    #[error("unknown easing '{0}' (expected linear, ease-in, ease-out, ease-in-out or therapeutic)")]
    UnknownEasing(String),
    #[error("unknown therapeutic mode '{0}'")]
    UnknownTherapeuticMode(String),
    #[error("unknown session phase '{0}'")]
    UnknownSessionPhase(String),
    #[error("invalid hex color '{0}' (expected #RRGGBB)")]
    InvalidColor(String),
}

// ============================================================================
// SESSION IDENTITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// TELEMETRY INPUT
// ============================================================================

/// Basic-emotion channels reported by the emotion-recognition collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BasicEmotion {
    Angry,
    Disgusted,
    Fearful,
    Happy,
    Neutral,
    Sad,
    Surprised,
}

/// One telemetry tick. Produced externally and never mutated by the engine.
///
/// `arousal` and `valence` are normalized to [0, 1]. Affect intensities are
/// on a 0-100 scale and keyed by the recognizer's affect names
/// (`Afraid`, `Scared`, `Tense`, ...). Basic-emotion intensities are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSample {
    pub timestamp_ms: i64,
    pub arousal: f32,
    pub valence: f32,
    #[serde(default)]
    pub affects: BTreeMap<String, f32>,
    #[serde(default)]
    pub basic_emotions: BTreeMap<BasicEmotion, f32>,
}

impl EmotionSample {
    pub fn new(timestamp_ms: i64, arousal: f32, valence: f32) -> Self {
        Self {
            timestamp_ms,
            arousal,
            valence,
            affects: BTreeMap::new(),
            basic_emotions: BTreeMap::new(),
        }
    }

    pub fn with_affect(mut self, name: &str, intensity: f32) -> Self {
        self.affects.insert(name.to_string(), intensity);
        self
    }

    pub fn with_emotion(mut self, emotion: BasicEmotion, intensity: f32) -> Self {
        self.basic_emotions.insert(emotion, intensity);
        self
    }

    /// Affect intensity by name, 0.0 when the recognizer did not report it.
    pub fn affect(&self, name: &str) -> f32 {
        self.affects.get(name).copied().unwrap_or(0.0)
    }

    pub fn emotion(&self, emotion: BasicEmotion) -> f32 {
        self.basic_emotions.get(&emotion).copied().unwrap_or(0.0)
    }

    /// Strongest reported affect, if any.
    pub fn dominant_affect(&self) -> Option<(&str, f32)> {
        self.affects
            .iter()
            .filter(|(_, v)| v.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, v)| (k.as_str(), *v))
    }
}

// ============================================================================
// SESSION ENUMERATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TherapeuticMode {
    #[default]
    Standard,
    TraumaSensitive,
    AnxietyFocused,
    DepressionFocused,
}

impl TherapeuticMode {
    pub const ALL: [TherapeuticMode; 4] = [
        Self::Standard,
        Self::TraumaSensitive,
        Self::AnxietyFocused,
        Self::DepressionFocused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::TraumaSensitive => "trauma-sensitive",
            Self::AnxietyFocused => "anxiety-focused",
            Self::DepressionFocused => "depression-focused",
        }
    }
}

impl FromStr for TherapeuticMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| DomainError::UnknownTherapeuticMode(s.to_string()))
    }
}

/// Phases of an EMDR session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    #[default]
    Preparation,
    Assessment,
    Desensitization,
    Installation,
    BodyScan,
    Closure,
    Reevaluation,
    Integration,
}

impl SessionPhase {
    pub const ALL: [SessionPhase; 8] = [
        Self::Preparation,
        Self::Assessment,
        Self::Desensitization,
        Self::Installation,
        Self::BodyScan,
        Self::Closure,
        Self::Reevaluation,
        Self::Integration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparation => "preparation",
            Self::Assessment => "assessment",
            Self::Desensitization => "desensitization",
            Self::Installation => "installation",
            Self::BodyScan => "body-scan",
            Self::Closure => "closure",
            Self::Reevaluation => "reevaluation",
            Self::Integration => "integration",
        }
    }
}

impl FromStr for SessionPhase {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DomainError::UnknownSessionPhase(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dt_ms_never_wraps() {
        assert_eq!(dt_ms(1_500, 1_000), 500);
        assert_eq!(dt_ms(1_000, 1_500), 0);
    }

    #[test]
    fn missing_affect_reads_as_zero() {
        let s = EmotionSample::new(0, 0.5, 0.5).with_affect("Afraid", 22.0);
        assert_eq!(s.affect("Afraid"), 22.0);
        assert_eq!(s.affect("Scared"), 0.0);
        assert_eq!(s.emotion(BasicEmotion::Sad), 0.0);
    }

    #[test]
    fn dominant_affect_picks_strongest() {
        let s = EmotionSample::new(0, 0.5, 0.5)
            .with_affect("Tense", 12.0)
            .with_affect("Distressed", 40.0);
        assert_eq!(s.dominant_affect(), Some(("Distressed", 40.0)));
    }

    #[test]
    fn phase_and_mode_identifiers_parse() {
        assert_eq!("body-scan".parse::<SessionPhase>().unwrap(), SessionPhase::BodyScan);
        assert_eq!(
            "trauma-sensitive".parse::<TherapeuticMode>().unwrap(),
            TherapeuticMode::TraumaSensitive
        );
        assert!(matches!(
            "bodyscan".parse::<SessionPhase>(),
            Err(DomainError::UnknownSessionPhase(_))
        ));
    }

    #[test]
    fn sample_deserializes_without_optional_maps() {
        let s: EmotionSample =
            serde_json::from_str(r#"{"timestamp_ms":10,"arousal":0.4,"valence":0.6}"#).unwrap();
        assert!(s.affects.is_empty());
        assert!(s.basic_emotions.is_empty());
    }
}
