//! Motion pattern registry.
//!
//! Fifteen closed-form trajectories for the stimulus object. Each maps a
//! normalized progress value `p ∈ [0, 1]` to a [`Pose`]. The animation loop
//! ping-pongs `p` between the bounds, so open curves sweep back and forth and
//! closed curves are traversed forwards then backwards.
//!
//! # Patterns
//! Legacy (planar or near-planar):
//! - **horizontal**: `x = 4(2p − 1)`
//! - **vertical**: `y = 2.5(2p − 1)`
//! - **diagonal**: `x = 4(2p − 1)`, `y = 2.5(2p − 1)`
//! - **circle**: `x = 3 cos θ`, `y = 3 sin θ`
//! - **wave3d**: `x = 4(2p − 1)`, `y = sin 2θ`, `z = 0.5 cos 2θ`
//!
//! 3D (θ = 2πp):
//! - **cube**: piecewise-linear walk along a Hamiltonian cycle of cube edges (half side 2)
//! - **spiral**: `r = 0.5 + 2.5p`, `x = r cos 3θ`, `y = r sin 3θ`, `z = 1.5 sin θ`
//! - **helix**: `x = 4(2p − 1)`, `y = 1.2 sin 3θ`, `z = 1.2 cos 3θ`
//! - **lemniscate** (Bernoulli): `x = 3 cos θ / (1 + sin²θ)`, `y = 3 sin θ cos θ / (1 + sin²θ)`, `z = 0.8 sin θ`
//! - **lissajous**: `x = 3 sin(3θ + π/2)`, `y = 2 sin 2θ`, `z = 1.5 sin 5θ`
//! - **sphere**: polar `φ = πp`, azimuth `λ = 10πp`, radius 2.5
//! - **infinity** (Gerono): `x = 4 cos θ`, `y = 2 sin θ cos θ`, `z = 0.6 sin θ`
//! - **ocean-wave**: `x = 4(2p − 1)`, `y = sin 3θ + 0.3 sin 7θ`, `z = 0.8 cos 2θ`
//! - **butterfly** (Fay): `t = 12πp`, `r = e^{cos t} − 2 cos 4t + sin⁵(t/12)`, `x = 0.6 r sin t`, `y = 0.6 r cos t`
//! - **double-helix**: outbound along one strand, return along the partner strand
//!   (phase offset blends 0 → π → 0 so the path stays continuous)

use crate::domain::DomainError;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::str::FromStr;

/// Progress units advanced per millisecond at speed 1 with a 1.0 multiplier.
/// Speed 10 therefore sweeps one full bound-to-bound pass per second.
pub const BASE_PROGRESS_PER_MS: f32 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MotionPattern {
    #[default]
    Horizontal,
    Vertical,
    Diagonal,
    Circle,
    #[serde(rename = "wave3d")]
    Wave3d,
    Cube,
    Spiral,
    Helix,
    Lemniscate,
    Lissajous,
    Sphere,
    Infinity,
    OceanWave,
    Butterfly,
    DoubleHelix,
}

/// Pattern pairs whose switch is visually dramatic enough to warrant an audio crossfade.
const DRAMATIC_PAIRS: &[(MotionPattern, MotionPattern)] = &[
    (MotionPattern::Horizontal, MotionPattern::Sphere),
    (MotionPattern::Horizontal, MotionPattern::Butterfly),
    (MotionPattern::Circle, MotionPattern::Butterfly),
    (MotionPattern::Cube, MotionPattern::OceanWave),
    (MotionPattern::Lemniscate, MotionPattern::DoubleHelix),
    (MotionPattern::Spiral, MotionPattern::Lissajous),
    (MotionPattern::Helix, MotionPattern::Sphere),
];

impl MotionPattern {
    pub const ALL: [MotionPattern; 15] = [
        Self::Horizontal,
        Self::Vertical,
        Self::Diagonal,
        Self::Circle,
        Self::Wave3d,
        Self::Cube,
        Self::Spiral,
        Self::Helix,
        Self::Lemniscate,
        Self::Lissajous,
        Self::Sphere,
        Self::Infinity,
        Self::OceanWave,
        Self::Butterfly,
        Self::DoubleHelix,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
            Self::Diagonal => "diagonal",
            Self::Circle => "circle",
            Self::Wave3d => "wave3d",
            Self::Cube => "cube",
            Self::Spiral => "spiral",
            Self::Helix => "helix",
            Self::Lemniscate => "lemniscate",
            Self::Lissajous => "lissajous",
            Self::Sphere => "sphere",
            Self::Infinity => "infinity",
            Self::OceanWave => "ocean-wave",
            Self::Butterfly => "butterfly",
            Self::DoubleHelix => "double-helix",
        }
    }

    /// True for the volumetric patterns; the five legacy patterns return false.
    pub fn is_3d(&self) -> bool {
        !matches!(
            self,
            Self::Horizontal | Self::Vertical | Self::Diagonal | Self::Circle | Self::Wave3d
        )
    }

    /// Compensates for differing apparent velocities so one speed setting
    /// feels uniform across patterns.
    pub fn speed_multiplier(&self) -> f32 {
        match self {
            Self::Horizontal => 1.0,
            Self::Vertical => 1.0,
            Self::Diagonal => 0.9,
            Self::Circle => 0.8,
            Self::Wave3d => 1.0,
            Self::Cube => 0.8,
            Self::Spiral => 1.2,
            Self::Helix => 0.9,
            Self::Lemniscate => 0.8,
            Self::Lissajous => 0.7,
            Self::Sphere => 0.6,
            Self::Infinity => 0.85,
            Self::OceanWave => 1.3,
            Self::Butterfly => 0.5,
            Self::DoubleHelix => 0.75,
        }
    }

    /// Progress advanced per millisecond for a 1-10 speed setting.
    pub fn normalized_speed(&self, speed: f32) -> f32 {
        speed.clamp(1.0, 10.0) * BASE_PROGRESS_PER_MS * self.speed_multiplier()
    }

    /// Whether switching between `self` and `other` should crossfade audio.
    pub fn is_dramatic_switch(&self, other: MotionPattern) -> bool {
        DRAMATIC_PAIRS
            .iter()
            .any(|&(a, b)| (a == *self && b == other) || (a == other && b == *self))
    }

    /// Evaluate the pattern at `progress` (clamped to [0, 1]).
    pub fn pose(&self, progress: f32) -> Pose {
        let p = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let theta = TAU * p;
        let sweep = 2.0 * p - 1.0;

        match self {
            Self::Horizontal => Pose::at(4.0 * sweep, 0.0, 0.0),
            Self::Vertical => Pose::at(0.0, 2.5 * sweep, 0.0),
            Self::Diagonal => Pose::at(4.0 * sweep, 2.5 * sweep, 0.0),
            Self::Circle => Pose::at(3.0 * theta.cos(), 3.0 * theta.sin(), 0.0),
            Self::Wave3d => Pose::at(4.0 * sweep, (2.0 * theta).sin(), 0.5 * (2.0 * theta).cos())
                .rotated(0.0, theta, 0.0),
            Self::Cube => cube_edge(p).rotated(0.25 * theta, 0.5 * theta, 0.0),
            Self::Spiral => {
                let r = 0.5 + 2.5 * p;
                Pose::at(
                    r * (3.0 * theta).cos(),
                    r * (3.0 * theta).sin(),
                    1.5 * theta.sin(),
                )
                .rotated(0.0, 0.0, 3.0 * theta)
            }
            Self::Helix => Pose::at(
                4.0 * sweep,
                1.2 * (3.0 * theta).sin(),
                1.2 * (3.0 * theta).cos(),
            )
            .rotated(3.0 * theta, 0.0, 0.0),
            Self::Lemniscate => {
                let denom = 1.0 + theta.sin() * theta.sin();
                Pose::at(
                    3.0 * theta.cos() / denom,
                    3.0 * theta.sin() * theta.cos() / denom,
                    0.8 * theta.sin(),
                )
                .rotated(0.0, 0.5 * theta.sin(), 0.0)
            }
            Self::Lissajous => Pose::at(
                3.0 * (3.0 * theta + FRAC_PI_2).sin(),
                2.0 * (2.0 * theta).sin(),
                1.5 * (5.0 * theta).sin(),
            )
            .rotated(theta, 2.0 * theta, 0.0),
            Self::Sphere => {
                let phi = PI * p;
                let lambda = 10.0 * PI * p;
                Pose::at(
                    2.5 * phi.sin() * lambda.cos(),
                    2.5 * phi.cos(),
                    2.5 * phi.sin() * lambda.sin(),
                )
                .rotated(0.0, lambda, 0.0)
                .scaled(0.9 + 0.1 * theta.sin())
            }
            Self::Infinity => Pose::at(
                4.0 * theta.cos(),
                2.0 * theta.sin() * theta.cos(),
                0.6 * theta.sin(),
            )
            .rotated(0.0, 0.0, 0.3 * theta.sin()),
            Self::OceanWave => Pose::at(
                4.0 * sweep,
                (3.0 * theta).sin() + 0.3 * (7.0 * theta).sin(),
                0.8 * (2.0 * theta).cos(),
            )
            .rotated(0.0, 0.0, 0.3 * (3.0 * theta).cos())
            .scaled(1.0 + 0.05 * (3.0 * theta).sin()),
            Self::Butterfly => {
                let t = 12.0 * PI * p;
                let r = t.cos().exp() - 2.0 * (4.0 * t).cos() + (t / 12.0).sin().powi(5);
                Pose::at(0.6 * r * t.sin(), 0.6 * r * t.cos(), 0.5 * (t / 6.0).sin())
                    .rotated(0.0, 0.0, t / 12.0)
                    .scaled(0.8)
            }
            Self::DoubleHelix => {
                let q = if p < 0.5 { 2.0 * p } else { 2.0 * (1.0 - p) };
                let offset = PI * (1.0 - theta.cos()) / 2.0;
                let angle = 6.0 * PI * q + offset;
                Pose::at(4.0 * (2.0 * q - 1.0), 1.2 * angle.sin(), 1.2 * angle.cos())
                    .rotated(angle, 0.0, 0.0)
            }
        }
    }
}

impl FromStr for MotionPattern {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DomainError::UnknownPattern(s.to_string()))
    }
}

/// Instantaneous placement of the stimulus object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: f32,
}

impl Pose {
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            rotation: Vector3::zeros(),
            scale: 1.0,
        }
    }

    fn rotated(mut self, x: f32, y: f32, z: f32) -> Self {
        self.rotation = Vector3::new(x, y, z);
        self
    }

    fn scaled(mut self, s: f32) -> Self {
        self.scale = s;
        self
    }

    /// Geometric blend used while morphing between two patterns.
    /// `factor` 0 yields `self`, 1 yields `other`.
    pub fn blend(&self, other: &Pose, factor: f32) -> Pose {
        let f = factor.clamp(0.0, 1.0);
        Pose {
            position: self.position * (1.0 - f) + other.position * f,
            rotation: self.rotation * (1.0 - f) + other.rotation * f,
            scale: self.scale * (1.0 - f) + other.scale * f,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Pose::at(0.0, 0.0, 0.0)
    }
}

const CUBE_HALF: f32 = 2.0;

/// Hamiltonian cycle over the cube's vertices; consecutive entries share an edge.
const CUBE_PATH: [[f32; 3]; 9] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0],
    [1.0, -1.0, 1.0],
    [-1.0, -1.0, 1.0],
    [-1.0, -1.0, -1.0],
];

fn cube_edge(p: f32) -> Pose {
    let segments = (CUBE_PATH.len() - 1) as f32;
    let scaled = p * segments;
    let idx = (scaled.floor() as usize).min(CUBE_PATH.len() - 2);
    let local = scaled - idx as f32;
    let a = Vector3::from(CUBE_PATH[idx]);
    let b = Vector3::from(CUBE_PATH[idx + 1]);
    let pos = (a * (1.0 - local) + b * local) * CUBE_HALF;
    Pose::at(pos.x, pos.y, pos.z)
}
