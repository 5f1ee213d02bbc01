//! Easing curves for configuration transitions.
//!
//! Every curve maps [0, 1] onto [0, 1] with `f(0) == 0` and `f(1) == 1`
//! exactly; inputs outside the unit interval are clamped first.

use crate::domain::DomainError;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Blend of smoothstep and a cosine ease with no abrupt velocity change
    /// at either end. Default for trauma-sensitive stimulation.
    #[default]
    Therapeutic,
}

impl Easing {
    pub const ALL: [Easing; 5] = [
        Self::Linear,
        Self::EaseIn,
        Self::EaseOut,
        Self::EaseInOut,
        Self::Therapeutic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::EaseIn => "ease-in",
            Self::EaseOut => "ease-out",
            Self::EaseInOut => "ease-in-out",
            Self::Therapeutic => "therapeutic",
        }
    }

    /// Map raw time progress onto eased progress.
    pub fn apply(&self, t: f32) -> f32 {
        if t.is_nan() || t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        let eased = match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Self::Therapeutic => 0.7 * smoothstep(t) + 0.3 * cosine_ease(t),
        };
        eased.clamp(0.0, 1.0)
    }
}

impl FromStr for Easing {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| DomainError::UnknownEasing(s.to_string()))
    }
}

#[inline]
fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn cosine_ease(t: f32) -> f32 {
    (1.0 - (PI * t).cos()) / 2.0
}
