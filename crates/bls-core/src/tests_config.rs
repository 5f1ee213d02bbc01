#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::easing::Easing;
    use crate::motion::MotionPattern;
    use std::env;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // apply_env_overrides reads every BLS_* variable, so tests touching the
    // environment or layered loading run one at a time.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_guard() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_default_config_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_hysteresis() {
        let mut config = EngineConfig::default();

        config.hysteresis.max_changes_per_minute = 0;
        assert!(config.validate().is_err());

        config.hysteresis.max_changes_per_minute = 6;
        config.hysteresis.significance_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_crisis() {
        let mut config = EngineConfig::default();

        // severe must be at least as strict as moderate
        config.crisis.severe_arousal = 0.7;
        config.crisis.moderate_arousal = 0.75;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_stimulus() {
        let mut config = EngineConfig::default();
        config.stimulus.speed = 12.0;
        assert!(config.validate().is_err());

        config.stimulus.speed = 5.0;
        config.stimulus.audio.volume = 1.2;
        assert!(config.validate().is_err());

        config.stimulus.audio.volume = 0.5;
        config.animation.budget_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_to_toml_string() {
        let config = EngineConfig::default();
        let toml_str = config.to_toml_string().unwrap();

        assert!(toml_str.contains("[hysteresis]"));
        assert!(toml_str.contains("[stimulus.audio]"));
        assert!(toml_str.contains("debounce_ms"));
        assert!(toml_str.contains("#4A90E2"));
    }

    #[test]
    fn test_config_from_toml_string() {
        let toml_str = r##"
            [telemetry]
            window_size = 20

            [hysteresis]
            debounce_ms = 1500
            significance_threshold = 0.1

            [stimulus]
            speed = 3.5
            pattern = "wave3d"
            primary_color = "#112233"

            [stimulus.transition]
            duration_ms = 900.0
            easing = "ease-in-out"

            [transition]
            preempt_on_crisis = true
        "##;

        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.telemetry.window_size, 20);
        assert_eq!(config.hysteresis.debounce_ms, 1500);
        // Omitted fields keep their defaults
        assert_eq!(config.hysteresis.max_changes_per_minute, 6);
        assert_eq!(config.stimulus.pattern, MotionPattern::Wave3d);
        assert_eq!(config.stimulus.primary_color.to_hex(), "#112233");
        assert_eq!(config.stimulus.transition.easing, Easing::EaseInOut);
        assert_eq!(config.stimulus.secondary_color.to_hex(), "#7ED321");
        assert!(config.transition.preempt_on_crisis);
        assert_eq!(config.transition.max_queue, 8);
    }

    #[test]
    fn test_unknown_pattern_rejected() {
        let toml_str = r#"
            [stimulus]
            pattern = "zigzag"
        "#;
        let result: Result<EngineConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let mut config = EngineConfig::default();
        config.stimulus.pattern = MotionPattern::Butterfly;
        config.history.capacity = 12;

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();
        config.save_to_file(path).unwrap();

        let loaded = EngineConfig::from_file(path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_config_env_overrides() {
        let _g = env_guard();
        env::set_var("BLS_HYSTERESIS_DEBOUNCE_MS", "1200");
        env::set_var("BLS_TELEMETRY_WINDOW_SIZE", "16");
        env::set_var("BLS_STIMULUS_PATTERN", "lemniscate");
        env::set_var("BLS_STIMULUS_EASING", "linear");
        env::set_var("BLS_TRANSITION_PREEMPT_ON_CRISIS", "true");

        let mut config = EngineConfig::default();
        let result = config.apply_env_overrides();

        env::remove_var("BLS_HYSTERESIS_DEBOUNCE_MS");
        env::remove_var("BLS_TELEMETRY_WINDOW_SIZE");
        env::remove_var("BLS_STIMULUS_PATTERN");
        env::remove_var("BLS_STIMULUS_EASING");
        env::remove_var("BLS_TRANSITION_PREEMPT_ON_CRISIS");

        result.unwrap();
        assert_eq!(config.hysteresis.debounce_ms, 1200);
        assert_eq!(config.telemetry.window_size, 16);
        assert_eq!(config.stimulus.pattern, MotionPattern::Lemniscate);
        assert_eq!(config.stimulus.transition.easing, Easing::Linear);
        assert!(config.transition.preempt_on_crisis);
    }

    #[test]
    fn test_invalid_env_var_handling() {
        let _g = env_guard();
        env::set_var("BLS_HYSTERESIS_DEBOUNCE_MS", "soon");
        let mut config = EngineConfig::default();
        let result = config.apply_env_overrides();
        env::remove_var("BLS_HYSTERESIS_DEBOUNCE_MS");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_unknown_identifier_in_env() {
        let _g = env_guard();
        env::set_var("BLS_STIMULUS_SESSION_PHASE", "warmup");
        let mut config = EngineConfig::default();
        let result = config.apply_env_overrides();
        env::remove_var("BLS_STIMULUS_SESSION_PHASE");
        assert!(matches!(result, Err(ConfigError::Domain(_))));
    }

    #[test]
    fn test_config_layered_loading() {
        let _g = env_guard();
        let default_file = NamedTempFile::new().unwrap();
        let user_file = NamedTempFile::new().unwrap();

        let mut default_config = EngineConfig::default();
        default_config.hysteresis.debounce_ms = 3000;
        default_config.stimulus.speed = 4.0;
        default_config.save_to_file(default_file.path()).unwrap();

        // The user layer only touches the stimulus speed
        fs::write(user_file.path(), "[stimulus]\nspeed = 7.0\n").unwrap();

        let loaded =
            EngineConfig::load_layered(Some(default_file.path()), Some(user_file.path())).unwrap();

        assert_eq!(loaded.stimulus.speed, 7.0);
        assert_eq!(loaded.hysteresis.debounce_ms, 3000);
    }

    #[test]
    fn test_layered_loading_missing_files_uses_defaults() {
        let _g = env_guard();
        let loaded = EngineConfig::load_layered(
            Some(std::path::Path::new("nonexistent-default.toml")),
            None,
        )
        .unwrap();
        assert_eq!(loaded, EngineConfig::default());
    }

    #[test]
    fn test_config_file_not_found() {
        let result = EngineConfig::from_file("nonexistent.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_invalid_toml_syntax() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "invalid toml: syntax").unwrap();

        let result = EngineConfig::from_file(temp_file.path());
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_file_failing_validation_is_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[history]\ncapacity = 0\n").unwrap();
        let result = EngineConfig::from_file(temp_file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_config_roundtrip() {
        let original = EngineConfig::default();
        let toml_str = original.to_toml_string().unwrap();
        let roundtrip: EngineConfig = toml::from_str(&toml_str).unwrap();

        assert!(roundtrip.validate().is_ok());
        assert_eq!(original, roundtrip);
    }
}
