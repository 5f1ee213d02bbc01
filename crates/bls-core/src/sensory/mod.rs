//! Sensory channel vocabularies
//!
//! Binaural beat bands and haptic pulse shapes referenced by the stimulus configuration.

pub mod binaural;
pub mod haptics;

pub use binaural::BrainWaveState;
pub use haptics::HapticPattern;
