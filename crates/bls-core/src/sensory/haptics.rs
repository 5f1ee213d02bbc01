//! Haptic pulse library

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HapticPattern {
    /// Single pulse per side, the classic tapper rhythm
    #[default]
    Pulse,
    DoublePulse,
    /// Slow swelling pulse for down-regulation
    Wave,
    Heartbeat,
    /// Barely perceptible tap used during crisis grounding
    Gentle,
}

impl HapticPattern {
    /// On/off timing in milliseconds, scaled so the first "on" segment equals `duration_ms`.
    pub fn timings(&self, duration_ms: f32) -> Vec<u32> {
        let base: &[f32] = match self {
            Self::Pulse => &[1.0],
            Self::DoublePulse => &[1.0, 0.8, 1.0],
            Self::Wave => &[1.0, 0.3, 1.5, 0.3, 1.0],
            Self::Heartbeat => &[1.0, 2.0, 0.6],
            Self::Gentle => &[0.5],
        };
        let unit = duration_ms.max(1.0);
        base.iter().map(|f| (f * unit).round() as u32).collect()
    }

    /// Total duration in milliseconds
    pub fn total_ms(&self, duration_ms: f32) -> u32 {
        self.timings(duration_ms).iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_timings() {
        assert_eq!(HapticPattern::Pulse.timings(100.0), vec![100]);
        assert_eq!(HapticPattern::Heartbeat.timings(50.0), vec![50, 100, 30]);
    }

    #[test]
    fn test_pattern_duration() {
        assert_eq!(HapticPattern::DoublePulse.total_ms(100.0), 280);
        assert_eq!(HapticPattern::Gentle.total_ms(100.0), 50);
    }

    #[test]
    fn zero_duration_still_produces_a_pulse() {
        assert_eq!(HapticPattern::Pulse.timings(0.0), vec![1]);
    }
}
