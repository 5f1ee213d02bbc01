//! Bounded ping-pong animation loop driving the stimulus along its pattern.
//!
//! Progress runs 0 → 1 → 0 → ... Each bound reached reverses direction and
//! counts one pattern completion. The loop never owns a timer; it asks the
//! injected scheduler for the next frame and is ticked by the host.

use crate::events::BlsEvent;
use crate::motion::Pose;
use crate::scheduler::{FrameHandle, FrameScheduler};
use crate::stimulus::StimulusConfig;
use crate::transition::MorphState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(&self) -> f32 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopState {
    #[default]
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    /// Nominal frame interval (60 Hz)
    pub target_frame_ms: f64,
    /// Upper bound on the delta applied in one tick
    pub max_delta_ms: f64,
    /// A gap longer than this many frame intervals skips the update
    pub budget_multiplier: f64,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            target_frame_ms: 1000.0 / 60.0,
            max_delta_ms: 33.0,
            budget_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    NotRunning,
    NoFrameRequested,
    InvalidViewport,
    Hidden,
    BudgetOverrun,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub pose: Pose,
    pub progress: f32,
    pub direction: Direction,
    pub skipped: Option<SkipReason>,
    pub events: Vec<BlsEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct AnimationLoop {
    settings: AnimationSettings,
    state: LoopState,
    progress: f32,
    direction: Direction,
    completions: u64,
    last_tick_ms: Option<f64>,
    frame: Option<FrameHandle>,
    hidden: bool,
    viewport: Viewport,
    pose: Pose,
}

impl AnimationLoop {
    pub fn new(settings: AnimationSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn completions(&self) -> u64 {
        self.completions
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn start(&mut self, now_ms: f64, scheduler: &mut dyn FrameScheduler) {
        if self.state != LoopState::Idle {
            return;
        }
        log::debug!("animation loop started at {:.1}ms", now_ms);
        self.state = LoopState::Running;
        self.progress = 0.0;
        self.direction = Direction::Forward;
        self.completions = 0;
        self.last_tick_ms = Some(now_ms);
        self.request(scheduler);
    }

    pub fn stop(&mut self, scheduler: &mut dyn FrameScheduler) {
        self.cancel(scheduler);
        self.state = LoopState::Idle;
        self.last_tick_ms = None;
    }

    pub fn pause(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.state == LoopState::Running {
            self.cancel(scheduler);
            self.state = LoopState::Paused;
        }
    }

    /// Resume without a jump: time spent paused is not applied.
    pub fn resume(&mut self, now_ms: f64, scheduler: &mut dyn FrameScheduler) {
        if self.state == LoopState::Paused {
            self.state = LoopState::Running;
            self.last_tick_ms = Some(now_ms);
            self.request(scheduler);
        }
    }

    fn request(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.frame.is_none() {
            self.frame = Some(scheduler.request_frame());
        }
    }

    fn cancel(&mut self, scheduler: &mut dyn FrameScheduler) {
        if let Some(h) = self.frame.take() {
            scheduler.cancel_frame(h);
        }
    }

    fn skip(&self, reason: SkipReason) -> FrameOutput {
        FrameOutput {
            pose: self.pose,
            progress: self.progress,
            direction: self.direction,
            skipped: Some(reason),
            events: Vec::new(),
        }
    }

    /// Advance one frame using `config`'s pattern and speed. While a morph is
    /// in flight the pose blends the two patterns by the morph factor.
    pub fn tick(
        &mut self,
        now_ms: f64,
        config: &StimulusConfig,
        morph: Option<&MorphState>,
        scheduler: &mut dyn FrameScheduler,
    ) -> FrameOutput {
        if self.state != LoopState::Running {
            return self.skip(SkipReason::NotRunning);
        }
        if self.frame.take().is_none() {
            return self.skip(SkipReason::NoFrameRequested);
        }

        let elapsed = (now_ms - self.last_tick_ms.unwrap_or(now_ms)).max(0.0);
        self.last_tick_ms = Some(now_ms);
        // Keep the loop alive whatever happens to this frame.
        self.request(scheduler);

        if !self.viewport.is_valid() {
            return self.skip(SkipReason::InvalidViewport);
        }
        if self.hidden {
            return self.skip(SkipReason::Hidden);
        }
        if elapsed > self.settings.target_frame_ms * self.settings.budget_multiplier {
            log::trace!("frame budget overrun: {:.1}ms since last tick", elapsed);
            return self.skip(SkipReason::BudgetOverrun);
        }

        let delta = elapsed.min(self.settings.max_delta_ms) as f32;
        let rate = config.pattern.normalized_speed(config.speed);
        self.progress += rate * self.direction.sign() * delta;

        let mut events = Vec::new();
        // Only a move into a bound counts; sitting on it after a zero delta does not.
        let reached = match self.direction {
            Direction::Forward => self.progress >= 1.0,
            Direction::Backward => self.progress <= 0.0,
        };
        if reached {
            self.progress = self.progress.clamp(0.0, 1.0);
            self.direction = self.direction.flipped();
            self.completions += 1;
            events.push(BlsEvent::DirectionChanged {
                direction: self.direction,
            });
            events.push(BlsEvent::PatternCompleted {
                pattern: config.pattern,
                completions: self.completions,
            });
        }

        self.pose = match morph {
            Some(m) => m
                .from_pattern
                .pose(self.progress)
                .blend(&m.to_pattern.pose(self.progress), m.blend),
            None => config.pattern.pose(self.progress),
        };

        FrameOutput {
            pose: self.pose,
            progress: self.progress,
            direction: self.direction,
            skipped: None,
            events,
        }
    }
}
