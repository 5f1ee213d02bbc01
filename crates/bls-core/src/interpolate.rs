//! Field-wise interpolation between two stimulus configurations.
//!
//! Numeric fields lerp, colors lerp per RGB channel, and discrete fields
//! (enums, booleans) hold the source value until the midpoint, then switch.
//! `interpolate(a, b, 0.0) == a` and `interpolate(a, b, 1.0) == b` exactly.

use crate::stimulus::{
    AudioConfig, HapticsConfig, RenderConfig, StimulusConfig, TransitionSettings,
};

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    // Weighted form so both endpoints are reproduced bit-exactly.
    a * (1.0 - t) + b * t
}

#[inline]
fn step<T: Clone>(a: &T, b: &T, t: f32) -> T {
    if t < 0.5 {
        a.clone()
    } else {
        b.clone()
    }
}

/// Interpolate at eased progress `t`, clamped to [0, 1].
pub fn interpolate(from: &StimulusConfig, to: &StimulusConfig, t: f32) -> StimulusConfig {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    StimulusConfig {
        speed: lerp(from.speed, to.speed, t),
        pattern: step(&from.pattern, &to.pattern, t),
        primary_color: from.primary_color.lerp(&to.primary_color, t),
        secondary_color: from.secondary_color.lerp(&to.secondary_color, t),
        size: lerp(from.size, to.size, t),
        audio: audio(&from.audio, &to.audio, t),
        haptics: haptics(&from.haptics, &to.haptics, t),
        render: render(&from.render, &to.render, t),
        transition: transition(&from.transition, &to.transition, t),
        adaptive: step(&from.adaptive, &to.adaptive, t),
        emotion_mapping: step(&from.emotion_mapping, &to.emotion_mapping, t),
        hysteresis: step(&from.hysteresis, &to.hysteresis, t),
        therapeutic_mode: step(&from.therapeutic_mode, &to.therapeutic_mode, t),
        session_phase: step(&from.session_phase, &to.session_phase, t),
    }
}

fn audio(a: &AudioConfig, b: &AudioConfig, t: f32) -> AudioConfig {
    AudioConfig {
        enabled: step(&a.enabled, &b.enabled, t),
        kind: step(&a.kind, &b.kind, t),
        volume: lerp(a.volume, b.volume, t),
        frequency_hz: lerp(a.frequency_hz, b.frequency_hz, t),
        pan_range: lerp(a.pan_range, b.pan_range, t),
        binaural: step(&a.binaural, &b.binaural, t),
    }
}

fn haptics(a: &HapticsConfig, b: &HapticsConfig, t: f32) -> HapticsConfig {
    HapticsConfig {
        enabled: step(&a.enabled, &b.enabled, t),
        pattern: step(&a.pattern, &b.pattern, t),
        intensity: lerp(a.intensity, b.intensity, t),
        duration_ms: lerp(a.duration_ms, b.duration_ms, t),
        interval_ms: lerp(a.interval_ms, b.interval_ms, t),
    }
}

fn render(a: &RenderConfig, b: &RenderConfig, t: f32) -> RenderConfig {
    RenderConfig {
        enabled: step(&a.enabled, &b.enabled, t),
        camera: step(&a.camera, &b.camera, t),
        field_of_view: lerp(a.field_of_view, b.field_of_view, t),
        camera_distance: lerp(a.camera_distance, b.camera_distance, t),
        lighting: step(&a.lighting, &b.lighting, t),
        shadows: step(&a.shadows, &b.shadows, t),
        particles: step(&a.particles, &b.particles, t),
        glow_intensity: lerp(a.glow_intensity, b.glow_intensity, t),
    }
}

fn transition(a: &TransitionSettings, b: &TransitionSettings, t: f32) -> TransitionSettings {
    TransitionSettings {
        duration_ms: lerp(a.duration_ms, b.duration_ms, t),
        easing: step(&a.easing, &b.easing, t),
        enable_morphing: step(&a.enable_morphing, &b.enable_morphing, t),
        audio_crossfade: step(&a.audio_crossfade, &b.audio_crossfade, t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MotionPattern;
    use crate::stimulus::Rgb;

    fn pair() -> (StimulusConfig, StimulusConfig) {
        let a = StimulusConfig::default();
        let mut b = StimulusConfig {
            speed: 9.3,
            pattern: MotionPattern::Circle,
            primary_color: Rgb::new(0x10, 0x20, 0x30),
            size: 2.7,
            adaptive: false,
            ..StimulusConfig::default()
        };
        b.audio.volume = 0.13;
        b.render.field_of_view = 33.3;
        (a, b)
    }

    #[test]
    fn endpoints_are_exact() {
        let (a, b) = pair();
        assert_eq!(interpolate(&a, &b, 0.0), a);
        assert_eq!(interpolate(&a, &b, 1.0), b);
    }

    #[test]
    fn discrete_fields_switch_at_midpoint() {
        let (a, b) = pair();
        assert_eq!(interpolate(&a, &b, 0.49).pattern, MotionPattern::Horizontal);
        assert_eq!(interpolate(&a, &b, 0.5).pattern, MotionPattern::Circle);
        assert!(interpolate(&a, &b, 0.49).adaptive);
        assert!(!interpolate(&a, &b, 0.51).adaptive);
    }

    #[test]
    fn numeric_fields_lerp() {
        let (a, b) = pair();
        let mid = interpolate(&a, &b, 0.5);
        assert!((mid.speed - (5.0 + 9.3) / 2.0).abs() < 1e-5);
        assert!((mid.size - 1.85).abs() < 1e-5);
    }

    #[test]
    fn out_of_range_progress_is_clamped() {
        let (a, b) = pair();
        assert_eq!(interpolate(&a, &b, -2.0), a);
        assert_eq!(interpolate(&a, &b, 3.0), b);
        assert_eq!(interpolate(&a, &b, f32::NAN), a);
    }
}
