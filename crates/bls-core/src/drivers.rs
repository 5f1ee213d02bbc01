//! Output seams for the external audio and haptic collaborators.
//!
//! The engine only emits commands; synthesis and vibration happen behind
//! these traits on the host side.

use crate::sensory::HapticPattern;
use crate::stimulus::{AudioKind, StimulusConfig};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCommand {
    pub enabled: bool,
    pub kind: AudioKind,
    pub volume: f32,
    pub frequency_hz: f32,
    /// -1.0 (left) to 1.0 (right)
    pub pan: f32,
    /// (carrier Hz, beat Hz) when binaural audio is selected
    pub binaural: Option<(f32, f32)>,
    pub crossfade: bool,
}

impl AudioCommand {
    /// Build the command for the stimulus at `progress` along its sweep.
    pub fn from_config(cfg: &StimulusConfig, progress: f32, crossfade: bool) -> Self {
        let pan = (progress.clamp(0.0, 1.0) * 2.0 - 1.0) * cfg.audio.pan_range;
        let binaural = (cfg.audio.kind == AudioKind::Binaural).then(|| cfg.audio.binaural.config());
        Self {
            enabled: cfg.audio.enabled,
            kind: cfg.audio.kind,
            volume: cfg.audio.volume,
            frequency_hz: cfg.audio.frequency_hz,
            pan,
            binaural,
            crossfade,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HapticCommand {
    pub side: Side,
    pub pattern: HapticPattern,
    pub intensity: f32,
    pub duration_ms: f32,
    pub interval_ms: f32,
    /// On/off vibration timings in ms
    pub timings: Vec<u32>,
}

impl HapticCommand {
    pub fn from_config(cfg: &StimulusConfig, side: Side) -> Self {
        let h = &cfg.haptics;
        Self {
            side,
            pattern: h.pattern,
            intensity: h.intensity,
            duration_ms: h.duration_ms,
            interval_ms: h.interval_ms,
            timings: h.pattern.timings(h.duration_ms),
        }
    }
}

pub trait AudioDriver: Send + Debug {
    fn apply(&mut self, command: &AudioCommand);

    fn name(&self) -> &'static str;
}

pub trait HapticDriver: Send + Debug {
    fn pulse(&mut self, command: &HapticCommand);

    fn name(&self) -> &'static str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudioDriver;

impl AudioDriver for NullAudioDriver {
    fn apply(&mut self, _command: &AudioCommand) {}

    fn name(&self) -> &'static str {
        "null"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullHapticDriver;

impl HapticDriver for NullHapticDriver {
    fn pulse(&mut self, _command: &HapticCommand) {}

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Keeps every command it receives; clones share the log.
#[derive(Debug, Default, Clone)]
pub struct RecordingAudioDriver {
    log: Arc<Mutex<Vec<AudioCommand>>>,
}

impl RecordingAudioDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<AudioCommand> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl AudioDriver for RecordingAudioDriver {
    fn apply(&mut self, command: &AudioCommand) {
        if let Ok(mut l) = self.log.lock() {
            l.push(command.clone());
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecordingHapticDriver {
    log: Arc<Mutex<Vec<HapticCommand>>>,
}

impl RecordingHapticDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<HapticCommand> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl HapticDriver for RecordingHapticDriver {
    fn pulse(&mut self, command: &HapticCommand) {
        if let Ok(mut l) = self.log.lock() {
            l.push(command.clone());
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Driver handles passed to a session at construction.
#[derive(Debug)]
pub struct Drivers {
    pub audio: Box<dyn AudioDriver>,
    pub haptic: Box<dyn HapticDriver>,
}

impl Drivers {
    pub fn new(audio: impl AudioDriver + 'static, haptic: impl HapticDriver + 'static) -> Self {
        Self {
            audio: Box::new(audio),
            haptic: Box::new(haptic),
        }
    }

    pub fn null() -> Self {
        Self::new(NullAudioDriver, NullHapticDriver)
    }
}

impl Default for Drivers {
    fn default() -> Self {
        Self::null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensory::BrainWaveState;

    #[test]
    fn pan_follows_progress() {
        let cfg = StimulusConfig::default();
        assert_eq!(AudioCommand::from_config(&cfg, 0.0, false).pan, -1.0);
        assert_eq!(AudioCommand::from_config(&cfg, 1.0, false).pan, 1.0);
        assert_eq!(AudioCommand::from_config(&cfg, 0.5, false).pan, 0.0);
    }

    #[test]
    fn binaural_pair_only_for_binaural_kind() {
        let mut cfg = StimulusConfig::default();
        assert!(AudioCommand::from_config(&cfg, 0.5, false).binaural.is_none());
        cfg.audio.kind = AudioKind::Binaural;
        cfg.audio.binaural = BrainWaveState::Theta;
        assert_eq!(
            AudioCommand::from_config(&cfg, 0.5, false).binaural,
            Some(BrainWaveState::Theta.config())
        );
    }

    #[test]
    fn recording_driver_shares_log() {
        let rec = RecordingHapticDriver::new();
        let mut drivers = Drivers::new(NullAudioDriver, rec.clone());
        let cfg = StimulusConfig::default();
        drivers.haptic.pulse(&HapticCommand::from_config(&cfg, Side::Left));
        assert_eq!(rec.commands().len(), 1);
        assert_eq!(rec.commands()[0].timings, vec![100]);
        assert_eq!(drivers.audio.name(), "null");
    }
}
