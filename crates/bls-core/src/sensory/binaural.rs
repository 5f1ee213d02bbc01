//! Binaural beat bands
//!
//! Maps a target brain-wave band to carrier and beat frequencies for the audio driver.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrainWaveState {
    Delta, // 1-4 Hz: Deep rest
    Theta, // 4-8 Hz: Reprocessing
    #[default]
    Alpha, // 8-13 Hz: Relaxed alertness
    Beta,  // 13-30 Hz: Active engagement
}

impl BrainWaveState {
    /// Get (carrier_hz, beat_hz) for this band
    pub fn config(&self) -> (f32, f32) {
        match self {
            Self::Delta => (200.0, 2.5),
            Self::Theta => (200.0, 6.0),
            Self::Alpha => (200.0, 10.0),
            Self::Beta => (220.0, 18.0),
        }
    }

    /// Band suggested for a normalized arousal level.
    ///
    /// High arousal is steered down towards Theta, very low arousal is
    /// lifted towards Beta, the middle band stays in Alpha.
    pub fn for_arousal(arousal: f32) -> Self {
        if arousal > 0.8 {
            Self::Theta
        } else if arousal < 0.2 {
            Self::Beta
        } else {
            Self::Alpha
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_frequencies() {
        assert_eq!(BrainWaveState::Theta.config(), (200.0, 6.0));
        assert_eq!(BrainWaveState::Beta.config().1, 18.0);
    }

    #[test]
    fn arousal_steers_band() {
        assert_eq!(BrainWaveState::for_arousal(0.95), BrainWaveState::Theta);
        assert_eq!(BrainWaveState::for_arousal(0.5), BrainWaveState::Alpha);
        assert_eq!(BrainWaveState::for_arousal(0.1), BrainWaveState::Beta);
    }
}
