use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::animation::AnimationSettings;
use crate::arbiter::{HysteresisConfig, DEFAULT_HISTORY_CAP};
use crate::crisis::CrisisThresholds;
use crate::domain::DomainError;
use crate::stimulus::StimulusConfig;
use crate::telemetry::DEFAULT_WINDOW;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub telemetry: TelemetryConfig,
    pub hysteresis: HysteresisConfig,
    pub crisis: CrisisThresholds,
    pub animation: AnimationSettings,
    pub transition: TransitionConfig,
    pub history: HistoryConfig,
    /// Configuration the session starts from
    pub stimulus: StimulusConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Samples kept for stability scoring
    pub window_size: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Pending transitions beyond this coalesce into the newest request
    pub max_queue: usize,
    /// Derive morphing/crossfade from the pattern pair on pattern changes
    pub pattern_aware: bool,
    /// A severe-crisis target normally queues behind the in-flight
    /// transition. When set it cancels pending transitions and starts at once.
    pub preempt_on_crisis: bool,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            max_queue: 8,
            pattern_aware: true,
            preempt_on_crisis: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAP,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(val) => val
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Validation(format!("Invalid {}", key))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Like `env_parse` but keeps the identifier error for closed enums.
fn env_ident<T: FromStr<Err = DomainError>>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(val) => Ok(Some(val.parse()?)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    /// Variables are prefixed with BLS_, e.g. BLS_HYSTERESIS_DEBOUNCE_MS=1500
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from multiple sources, highest priority last:
    /// built-in defaults, default file, user file, environment.
    pub fn load_layered(
        default_path: Option<&Path>,
        user_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut config = EngineConfig::default();

        if let Some(path) = default_path {
            if path.exists() {
                config = Self::from_file(path)?;
            }
        }

        // A user file is parsed on top of the current layer so that sections
        // it omits keep their earlier values.
        if let Some(path) = user_path {
            if path.exists() {
                config = config.merge_toml(&fs::read_to_string(path)?)?;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn merge_toml(self, overlay: &str) -> Result<Self, ConfigError> {
        let base = toml::Value::try_from(&self)
            .map_err(|e| ConfigError::Validation(format!("TOML serialization error: {}", e)))?;
        let top: toml::Value = toml::from_str(overlay)?;
        let merged = merge_values(base, top);
        Ok(merged.try_into()?)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_parse("BLS_TELEMETRY_WINDOW_SIZE")? {
            self.telemetry.window_size = v;
        }

        if let Some(v) = env_parse("BLS_HYSTERESIS_ENABLED")? {
            self.hysteresis.enabled = v;
        }
        if let Some(v) = env_parse("BLS_HYSTERESIS_DEBOUNCE_MS")? {
            self.hysteresis.debounce_ms = v;
        }
        if let Some(v) = env_parse("BLS_HYSTERESIS_MAX_CHANGES_PER_MINUTE")? {
            self.hysteresis.max_changes_per_minute = v;
        }
        if let Some(v) = env_parse("BLS_HYSTERESIS_SIGNIFICANCE_THRESHOLD")? {
            self.hysteresis.significance_threshold = v;
        }

        if let Some(v) = env_parse("BLS_CRISIS_SEVERE_AROUSAL")? {
            self.crisis.severe_arousal = v;
        }
        if let Some(v) = env_parse("BLS_CRISIS_SEVERE_VALENCE")? {
            self.crisis.severe_valence = v;
        }

        if let Some(v) = env_parse("BLS_ANIMATION_TARGET_FRAME_MS")? {
            self.animation.target_frame_ms = v;
        }
        if let Some(v) = env_parse("BLS_TRANSITION_MAX_QUEUE")? {
            self.transition.max_queue = v;
        }
        if let Some(v) = env_parse("BLS_TRANSITION_PREEMPT_ON_CRISIS")? {
            self.transition.preempt_on_crisis = v;
        }
        if let Some(v) = env_parse("BLS_HISTORY_CAPACITY")? {
            self.history.capacity = v;
        }

        if let Some(v) = env_parse("BLS_STIMULUS_SPEED")? {
            self.stimulus.speed = v;
        }
        if let Some(v) = env_ident("BLS_STIMULUS_PATTERN")? {
            self.stimulus.pattern = v;
        }
        if let Some(v) = env_ident("BLS_STIMULUS_EASING")? {
            self.stimulus.transition.easing = v;
        }
        if let Some(v) = env_ident("BLS_STIMULUS_THERAPEUTIC_MODE")? {
            self.stimulus.therapeutic_mode = v;
        }
        if let Some(v) = env_ident("BLS_STIMULUS_SESSION_PHASE")? {
            self.stimulus.session_phase = v;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telemetry.window_size == 0 {
            return Err(ConfigError::Validation(
                "telemetry.window_size must be > 0".to_string(),
            ));
        }

        let h = &self.hysteresis;
        if h.max_changes_per_minute == 0 {
            return Err(ConfigError::Validation(
                "hysteresis.max_changes_per_minute must be > 0".to_string(),
            ));
        }
        if h.rate_window_ms == 0 {
            return Err(ConfigError::Validation(
                "hysteresis.rate_window_ms must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&h.significance_threshold) {
            return Err(ConfigError::Validation(
                "hysteresis.significance_threshold must be in [0, 1]".to_string(),
            ));
        }

        let c = &self.crisis;
        if c.severe_arousal < c.moderate_arousal || c.severe_valence > c.moderate_valence {
            return Err(ConfigError::Validation(
                "crisis: severe thresholds must be stricter than moderate ones".to_string(),
            ));
        }

        let a = &self.animation;
        if a.target_frame_ms <= 0.0 || a.max_delta_ms <= 0.0 || a.budget_multiplier < 1.0 {
            return Err(ConfigError::Validation(
                "animation: frame interval and max delta must be positive, budget multiplier >= 1"
                    .to_string(),
            ));
        }

        if self.history.capacity == 0 {
            return Err(ConfigError::Validation(
                "history.capacity must be > 0".to_string(),
            ));
        }

        let s = &self.stimulus;
        if !(1.0..=10.0).contains(&s.speed) {
            return Err(ConfigError::Validation(
                "stimulus.speed must be in [1, 10]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&s.audio.volume) {
            return Err(ConfigError::Validation(
                "stimulus.audio.volume must be in [0, 1]".to_string(),
            ));
        }
        if s.size <= 0.0 {
            return Err(ConfigError::Validation(
                "stimulus.size must be positive".to_string(),
            ));
        }
        if s.transition.duration_ms < 0.0 {
            return Err(ConfigError::Validation(
                "stimulus.transition.duration_ms must be >= 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self
            .to_toml_string()
            .map_err(|e| ConfigError::Validation(format!("TOML serialization error: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Table-wise merge; scalars and arrays in `top` replace those in `base`.
fn merge_values(base: toml::Value, top: toml::Value) -> toml::Value {
    match (base, top) {
        (toml::Value::Table(mut b), toml::Value::Table(t)) => {
            for (k, v) in t {
                let merged = match b.remove(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => v,
                };
                b.insert(k, merged);
            }
            toml::Value::Table(b)
        }
        (_, top) => top,
    }
}
