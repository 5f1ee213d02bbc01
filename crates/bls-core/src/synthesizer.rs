//! Configuration synthesis: patch overlay plus continuous fine-tuning.

use crate::domain::EmotionSample;
use crate::sensory::BrainWaveState;
use crate::stimulus::{AudioKind, ConfigPatch, StimulusConfig};

/// Above this arousal the stimulus slows down.
const HIGH_AROUSAL: f32 = 0.8;
/// Below this arousal the stimulus speeds up.
const LOW_AROUSAL: f32 = 0.3;

/// Build the target configuration for an accepted rule.
///
/// The current configuration is cloned, every field present in `patch`
/// overlays it, then speed, volume and haptic intensity are tuned from the
/// raw sample. A binaural band the patch leaves unset follows arousal.
/// `current` is never mutated.
pub fn synthesize(
    current: &StimulusConfig,
    patch: &ConfigPatch,
    sample: &EmotionSample,
) -> StimulusConfig {
    let mut out = current.apply_patch(patch);
    fine_tune(&mut out, sample);

    let band_pinned = patch.audio.as_ref().and_then(|a| a.binaural).is_some();
    if out.audio.kind == AudioKind::Binaural && !band_pinned {
        out.audio.binaural = BrainWaveState::for_arousal(sample.arousal);
    }
    out
}

/// Continuous adjustments derived from arousal and valence.
pub fn fine_tune(cfg: &mut StimulusConfig, sample: &EmotionSample) {
    let a = sample.arousal;
    let v = sample.valence;

    if a > HIGH_AROUSAL {
        cfg.speed *= 0.7;
    } else if a < LOW_AROUSAL {
        cfg.speed *= 1.3;
    }
    cfg.speed = cfg.speed.clamp(1.0, 10.0);

    cfg.audio.volume = ((a * a + v * v).sqrt() * 0.8).clamp(0.1, 1.0);

    if cfg.haptics.enabled {
        cfg.haptics.intensity = ((1.0 - a) * 0.8 + 0.2).clamp(0.1, 1.0);
    }
}
