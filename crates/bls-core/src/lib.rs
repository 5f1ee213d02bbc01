//! Adaptive bilateral-stimulation control engine.
//!
//! Emotion telemetry goes in, rule arbitration picks a stimulus adjustment,
//! the transition engine eases the running configuration toward it and the
//! animation loop turns the result into per-frame poses and driver commands.
//! [`SessionController`] wires one session together.

// Allowed lints, kept deliberately narrow:
// - too_many_arguments: transition/begin plumbing carries the full transition context
// - new_without_default: some new() constructors take settings
// - collapsible_if: nested guards read better in the arbiter
#![allow(clippy::too_many_arguments)]
#![allow(clippy::new_without_default)]
#![allow(clippy::collapsible_if)]

pub mod animation;
pub mod arbiter;
pub mod config;
pub mod crisis;
pub mod domain;
pub mod drivers;
pub mod easing;
pub mod events;
pub mod interpolate;
pub mod motion;
pub mod rules;
pub mod scheduler;
pub mod sensory; // Binaural bands, haptic patterns
pub mod session;
pub mod stimulus;
pub mod synthesizer;
pub mod telemetry;
pub mod timestamp;
pub mod transition;

#[cfg(test)]
pub mod tests_config;
#[cfg(test)]
pub mod tests_proptest;

// ============================================================================
// CURATED PUBLIC API EXPORTS
// ============================================================================

// Domain types
pub use domain::{
    dt_ms, BasicEmotion, DomainError, EmotionSample, SessionId, SessionPhase, TherapeuticMode,
};

// Stimulus model
pub use easing::Easing;
pub use motion::{MotionPattern, Pose};
pub use sensory::{BrainWaveState, HapticPattern};
pub use stimulus::{
    AudioConfig, AudioKind, AudioPatch, CameraKind, ConfigPatch, HapticsConfig, HapticsPatch,
    LightingMode, RenderConfig, RenderPatch, Rgb, StimulusConfig, TransitionPatch,
    TransitionSettings,
};

// Configuration
pub use config::{ConfigError, EngineConfig};

// Arbitration
pub use arbiter::{
    AdaptiveState, ArbitrationOutcome, Arbiter, Decision, HoldReason, HysteresisConfig,
    SessionAssessment, TherapeuticReasoning,
};
pub use crisis::{CrisisAssessment, CrisisDetector, CrisisSeverity, CrisisThresholds, Intervention};
pub use rules::{Rule, RuleCatalog, RuleCondition, RuleIntent};
pub use synthesizer::synthesize;
pub use telemetry::TelemetryWindow;
pub use timestamp::{TimestampLog, TimestampRegression};

// Transitions and animation
pub use animation::{AnimationLoop, AnimationSettings, Direction, LoopState, SkipReason, Viewport};
pub use interpolate::interpolate;
pub use transition::{
    create_pattern_transition, MorphState, TicketStatus, TransitionEngine, TransitionTicket,
};

// Host seams
pub use drivers::{AudioCommand, AudioDriver, Drivers, HapticCommand, HapticDriver, Side};
pub use events::{BlsEvent, EventBus, EventEnvelope};
pub use scheduler::{Clock, FrameHandle, FrameScheduler, ManualClock, ManualScheduler, SystemClock};

// Session
pub use session::{FrameReport, SessionController};
