//! Stimulus configuration: the value object handed from the synthesizer to the
//! transition engine and on to the renderer and device drivers.
//!
//! Every struct deserializes with `#[serde(default)]`, so partial documents are
//! completed from the factory defaults below instead of failing.

use crate::domain::{DomainError, SessionPhase, TherapeuticMode};
use crate::easing::Easing;
use crate::motion::MotionPattern;
use crate::sensory::{BrainWaveState, HapticPattern};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Color
// ============================================================================

/// 24-bit color, serialized as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: &str) -> Result<Self, DomainError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidColor(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| DomainError::InvalidColor(hex.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Per-channel linear interpolation in RGB space.
    pub fn lerp(&self, other: &Rgb, t: f32) -> Rgb {
        let mix = |a: u8, b: u8| -> u8 {
            let v = a as f32 * (1.0 - t) + b as f32 * t;
            v.round().clamp(0.0, 255.0) as u8
        };
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Rgb {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

// ============================================================================
// Sub-configurations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioKind {
    #[default]
    Sine,
    Binaural,
    Chime,
    Nature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    pub kind: AudioKind,
    /// 0.0 - 1.0
    pub volume: f32,
    pub frequency_hz: f32,
    /// Stereo sweep width, 0.0 (mono) - 1.0 (hard left/right)
    pub pan_range: f32,
    pub binaural: BrainWaveState,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: AudioKind::Sine,
            volume: 0.5,
            frequency_hz: 220.0,
            pan_range: 1.0,
            binaural: BrainWaveState::Alpha,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticsConfig {
    pub enabled: bool,
    pub pattern: HapticPattern,
    /// 0.0 - 1.0
    pub intensity: f32,
    pub duration_ms: f32,
    pub interval_ms: f32,
}

impl Default for HapticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pattern: HapticPattern::Pulse,
            intensity: 0.5,
            duration_ms: 100.0,
            interval_ms: 500.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraKind {
    #[default]
    Perspective,
    Orthographic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LightingMode {
    #[default]
    Ambient,
    Directional,
    Therapeutic,
    Dramatic,
}

/// 3D rendering parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub enabled: bool,
    pub camera: CameraKind,
    pub field_of_view: f32,
    pub camera_distance: f32,
    pub lighting: LightingMode,
    pub shadows: bool,
    pub particles: bool,
    pub glow_intensity: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            camera: CameraKind::Perspective,
            field_of_view: 75.0,
            camera_distance: 10.0,
            lighting: LightingMode::Ambient,
            shadows: false,
            particles: false,
            glow_intensity: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionSettings {
    pub duration_ms: f32,
    pub easing: Easing,
    pub enable_morphing: bool,
    pub audio_crossfade: bool,
}

impl TransitionSettings {
    /// Build from a textual easing identifier; unknown identifiers are rejected.
    pub fn parse(duration_ms: f32, easing: &str) -> Result<Self, DomainError> {
        Ok(Self {
            duration_ms,
            easing: easing.parse()?,
            ..Self::default()
        })
    }
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            duration_ms: 1500.0,
            easing: Easing::Therapeutic,
            enable_morphing: false,
            audio_crossfade: false,
        }
    }
}

// ============================================================================
// Stimulus configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    /// 1 - 10
    pub speed: f32,
    pub pattern: MotionPattern,
    pub primary_color: Rgb,
    pub secondary_color: Rgb,
    pub size: f32,
    pub audio: AudioConfig,
    pub haptics: HapticsConfig,
    pub render: RenderConfig,
    pub transition: TransitionSettings,
    pub adaptive: bool,
    pub emotion_mapping: bool,
    pub hysteresis: bool,
    pub therapeutic_mode: TherapeuticMode,
    pub session_phase: SessionPhase,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            speed: 5.0,
            pattern: MotionPattern::Horizontal,
            primary_color: Rgb::new(0x4A, 0x90, 0xE2),
            secondary_color: Rgb::new(0x7E, 0xD3, 0x21),
            size: 1.0,
            audio: AudioConfig::default(),
            haptics: HapticsConfig::default(),
            render: RenderConfig::default(),
            transition: TransitionSettings::default(),
            adaptive: true,
            emotion_mapping: true,
            hysteresis: true,
            therapeutic_mode: TherapeuticMode::Standard,
            session_phase: SessionPhase::Preparation,
        }
    }
}

impl StimulusConfig {
    /// Overlay every field present in `patch`, returning a new configuration.
    /// Nested patches are merged field by field into their sub-object.
    pub fn apply_patch(&self, patch: &ConfigPatch) -> StimulusConfig {
        let mut out = self.clone();
        if let Some(v) = patch.speed {
            out.speed = v;
        }
        if let Some(v) = patch.pattern {
            out.pattern = v;
        }
        if let Some(v) = patch.primary_color {
            out.primary_color = v;
        }
        if let Some(v) = patch.secondary_color {
            out.secondary_color = v;
        }
        if let Some(v) = patch.size {
            out.size = v;
        }
        if let Some(a) = &patch.audio {
            a.apply(&mut out.audio);
        }
        if let Some(h) = &patch.haptics {
            h.apply(&mut out.haptics);
        }
        if let Some(r) = &patch.render {
            r.apply(&mut out.render);
        }
        if let Some(t) = &patch.transition {
            t.apply(&mut out.transition);
        }
        if let Some(v) = patch.adaptive {
            out.adaptive = v;
        }
        if let Some(v) = patch.emotion_mapping {
            out.emotion_mapping = v;
        }
        if let Some(v) = patch.hysteresis {
            out.hysteresis = v;
        }
        if let Some(v) = patch.therapeutic_mode {
            out.therapeutic_mode = v;
        }
        if let Some(v) = patch.session_phase {
            out.session_phase = v;
        }
        out
    }

    /// Pull every continuous field back into its documented range.
    pub fn clamped(mut self) -> Self {
        self.speed = self.speed.clamp(1.0, 10.0);
        self.size = self.size.clamp(0.1, 5.0);
        self.audio.volume = self.audio.volume.clamp(0.0, 1.0);
        self.audio.pan_range = self.audio.pan_range.clamp(0.0, 1.0);
        self.haptics.intensity = self.haptics.intensity.clamp(0.0, 1.0);
        self.render.glow_intensity = self.render.glow_intensity.clamp(0.0, 1.0);
        self.transition.duration_ms = self.transition.duration_ms.max(0.0);
        self
    }
}

// ============================================================================
// Patches
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<AudioKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_hz: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan_range: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binaural: Option<BrainWaveState>,
}

impl AudioPatch {
    fn apply(&self, a: &mut AudioConfig) {
        if let Some(v) = self.enabled {
            a.enabled = v;
        }
        if let Some(v) = self.kind {
            a.kind = v;
        }
        if let Some(v) = self.volume {
            a.volume = v;
        }
        if let Some(v) = self.frequency_hz {
            a.frequency_hz = v;
        }
        if let Some(v) = self.pan_range {
            a.pan_range = v;
        }
        if let Some(v) = self.binaural {
            a.binaural = v;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<HapticPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<f32>,
}

impl HapticsPatch {
    fn apply(&self, h: &mut HapticsConfig) {
        if let Some(v) = self.enabled {
            h.enabled = v;
        }
        if let Some(v) = self.pattern {
            h.pattern = v;
        }
        if let Some(v) = self.intensity {
            h.intensity = v;
        }
        if let Some(v) = self.duration_ms {
            h.duration_ms = v;
        }
        if let Some(v) = self.interval_ms {
            h.interval_ms = v;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_of_view: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lighting: Option<LightingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadows: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particles: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glow_intensity: Option<f32>,
}

impl RenderPatch {
    fn apply(&self, r: &mut RenderConfig) {
        if let Some(v) = self.enabled {
            r.enabled = v;
        }
        if let Some(v) = self.camera {
            r.camera = v;
        }
        if let Some(v) = self.field_of_view {
            r.field_of_view = v;
        }
        if let Some(v) = self.camera_distance {
            r.camera_distance = v;
        }
        if let Some(v) = self.lighting {
            r.lighting = v;
        }
        if let Some(v) = self.shadows {
            r.shadows = v;
        }
        if let Some(v) = self.particles {
            r.particles = v;
        }
        if let Some(v) = self.glow_intensity {
            r.glow_intensity = v;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easing: Option<Easing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_morphing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_crossfade: Option<bool>,
}

impl TransitionPatch {
    fn apply(&self, t: &mut TransitionSettings) {
        if let Some(v) = self.duration_ms {
            t.duration_ms = v;
        }
        if let Some(v) = self.easing {
            t.easing = v;
        }
        if let Some(v) = self.enable_morphing {
            t.enable_morphing = v;
        }
        if let Some(v) = self.audio_crossfade {
            t.audio_crossfade = v;
        }
    }
}

/// Partial configuration produced by a rule. Absent fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<MotionPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub haptics: Option<HapticsPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adaptive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion_mapping: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hysteresis: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therapeutic_mode: Option<TherapeuticMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_phase: Option<SessionPhase>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == ConfigPatch::default()
    }
}
