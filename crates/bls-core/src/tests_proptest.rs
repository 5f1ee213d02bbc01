use proptest::prelude::*;

/// Property-based checks for the arbitration and transition invariants.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::{ArbitrationOutcome, Arbiter};
    use crate::config::EngineConfig;
    use crate::domain::{EmotionSample, SessionPhase};
    use crate::drivers::Drivers;
    use crate::interpolate::interpolate;
    use crate::motion::MotionPattern;
    use crate::rules::CRISIS_PRIORITY;
    use crate::scheduler::{ManualClock, ManualScheduler};
    use crate::session::SessionController;
    use crate::stimulus::{Rgb, StimulusConfig};
    use crate::telemetry::TelemetryWindow;

    fn arb_config() -> impl Strategy<Value = StimulusConfig> {
        (
            1.0f32..10.0,
            0usize..MotionPattern::ALL.len(),
            any::<(u8, u8, u8)>(),
            0.1f32..3.0,
            0.0f32..1.0,
        )
            .prop_map(|(speed, p, (r, g, b), size, volume)| {
                let mut cfg = StimulusConfig {
                    speed,
                    pattern: MotionPattern::ALL[p],
                    primary_color: Rgb::new(r, g, b),
                    size,
                    ..StimulusConfig::default()
                };
                cfg.audio.volume = volume;
                cfg
            })
    }

    // =========================================================================
    // Stability score bounds
    // =========================================================================
    proptest! {
        #[test]
        fn test_stability_in_unit_range(
            samples in prop::collection::vec((0.0f32..=1.0, 0.0f32..=1.0), 0..30),
            cap in 1usize..15,
        ) {
            let mut window = TelemetryWindow::new(cap);
            for (i, (a, v)) in samples.iter().enumerate() {
                window.push(EmotionSample::new(i as i64 * 100, *a, *v));
                let s = window.stability();
                prop_assert!((0.0..=1.0).contains(&s), "stability {} out of range", s);
                prop_assert!(window.len() <= cap.max(2));
            }
        }
    }

    // =========================================================================
    // Rate limit and debounce hold for non-crisis rules
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_gated_changes_respect_rate_limit(
            steps in prop::collection::vec((0i64..4_000, 0.0f32..=0.8, 0.0f32..=1.0), 1..120),
        ) {
            let mut arbiter = Arbiter::default();
            let mut ts = 0i64;
            let mut accepted: Vec<i64> = Vec::new();

            for (dt, a, v) in steps {
                ts += dt;
                let outcome = arbiter.evaluate(&EmotionSample::new(ts, a, v), SessionPhase::Desensitization);
                if let ArbitrationOutcome::Adapted(d) = outcome {
                    prop_assert!(d.priority < CRISIS_PRIORITY);
                    accepted.push(ts);
                }
            }

            for (i, &t) in accepted.iter().enumerate() {
                let in_window = accepted[..=i].iter().filter(|&&x| t - x < 60_000).count();
                prop_assert!(in_window <= 6, "{} changes within a minute ending at {}", in_window, t);
                if i > 0 {
                    prop_assert!(t - accepted[i - 1] >= 2_000, "debounce violated at {}", t);
                }
            }
        }
    }

    // =========================================================================
    // Interpolation endpoints
    // =========================================================================
    proptest! {
        #[test]
        fn test_interpolation_endpoints_exact(from in arb_config(), to in arb_config()) {
            prop_assert_eq!(interpolate(&from, &to, 0.0), from.clone());
            prop_assert_eq!(interpolate(&from, &to, 1.0), to.clone());
        }

        #[test]
        fn test_interpolated_speed_between_endpoints(
            from in arb_config(),
            to in arb_config(),
            t in 0.0f32..=1.0,
        ) {
            let mid = interpolate(&from, &to, t);
            let lo = from.speed.min(to.speed) - 1e-4;
            let hi = from.speed.max(to.speed) + 1e-4;
            prop_assert!(mid.speed >= lo && mid.speed <= hi);
        }
    }

    // =========================================================================
    // Timestamp monotonicity at the session boundary
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_backwards_sample_rejected(
            ts1 in 1_000i64..1_000_000_000i64,
            delta in -999i64..-1i64,
        ) {
            let mut ctl = SessionController::new(
                EngineConfig::default(),
                Drivers::null(),
                ManualScheduler::new(),
                ManualClock::new(0.0),
            ).unwrap();

            prop_assert!(ctl.ingest(EmotionSample::new(ts1, 0.5, 0.5)).is_some());
            let before = ctl.adaptive_state();
            prop_assert!(ctl.ingest(EmotionSample::new(ts1 + delta, 0.95, 0.05)).is_none());
            // Rejected samples leave arbitration untouched
            prop_assert_eq!(ctl.adaptive_state(), before);
        }
    }
}
