//! Per-session composition root.
//!
//! Owns one arbiter, one transition engine, one animation loop, the driver
//! handles and the event bus. Telemetry is pushed in with [`SessionController::ingest`];
//! the host calls [`SessionController::frame`] whenever a requested frame fires.

use crate::animation::{AnimationLoop, Direction, FrameOutput, LoopState, SkipReason, Viewport};
use crate::arbiter::{
    AdaptiveState, ArbitrationOutcome, Arbiter, SessionAssessment, TherapeuticReasoning,
};
use crate::config::{ConfigError, EngineConfig};
use crate::crisis::CrisisAssessment;
use crate::domain::{EmotionSample, SessionId, SessionPhase};
use crate::drivers::{AudioCommand, Drivers, HapticCommand, Side};
use crate::events::{BlsEvent, EventBus, EventEnvelope};
use crate::motion::Pose;
use crate::rules::RuleCatalog;
use crate::scheduler::{Clock, FrameScheduler};
use crate::stimulus::{StimulusConfig, TransitionSettings};
use crate::synthesizer::synthesize;
use crate::timestamp::TimestampLog;
use crate::transition::{create_pattern_transition, TransitionEngine, TransitionTicket};
use crossbeam_channel::Receiver;

/// What one host frame produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub at_ms: f64,
    pub config: StimulusConfig,
    pub pose: Pose,
    pub progress: f32,
    pub direction: Direction,
    pub skipped: Option<SkipReason>,
    pub events: Vec<BlsEvent>,
}

#[derive(Debug)]
pub struct SessionController<S: FrameScheduler, C: Clock> {
    id: SessionId,
    config: EngineConfig,
    phase: SessionPhase,
    arbiter: Arbiter,
    transitions: TransitionEngine,
    animation: AnimationLoop,
    drivers: Drivers,
    scheduler: S,
    clock: C,
    bus: EventBus,
    timestamps: TimestampLog,
    /// Last settled configuration
    current: StimulusConfig,
    /// Where the latest accepted change is heading
    target: StimulusConfig,
}

impl<S: FrameScheduler, C: Clock> SessionController<S, C> {
    pub fn new(
        config: EngineConfig,
        drivers: Drivers,
        scheduler: S,
        clock: C,
    ) -> Result<Self, ConfigError> {
        Self::with_catalog(config, RuleCatalog::builtin(), drivers, scheduler, clock)
    }

    pub fn with_catalog(
        config: EngineConfig,
        catalog: RuleCatalog,
        drivers: Drivers,
        scheduler: S,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut hysteresis = config.hysteresis.clone();
        hysteresis.enabled &= config.stimulus.hysteresis;
        let arbiter = Arbiter::new(
            catalog,
            config.telemetry.window_size,
            hysteresis,
            config.crisis.clone(),
            config.history.capacity,
        );

        let id = SessionId::new();
        log::info!(
            "session {} created ({} rules, phase {})",
            id,
            arbiter.catalog().len(),
            config.stimulus.session_phase.as_str()
        );

        Ok(Self {
            id,
            phase: config.stimulus.session_phase,
            arbiter,
            transitions: TransitionEngine::with_max_queue(config.transition.max_queue),
            animation: AnimationLoop::new(config.animation.clone()),
            drivers,
            scheduler,
            clock,
            bus: EventBus::new(id),
            timestamps: TimestampLog::new(),
            current: config.stimulus.clone(),
            target: config.stimulus.clone(),
            config,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn subscribe(&mut self) -> Receiver<EventEnvelope> {
        self.bus.subscribe()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: SessionPhase) {
        if phase != self.phase {
            log::info!("session {} phase {} -> {}", self.id, self.phase.as_str(), phase.as_str());
            self.phase = phase;
        }
    }

    pub fn animation_state(&self) -> LoopState {
        self.animation.state()
    }

    // ------------------------------------------------------------------
    // Animation control
    // ------------------------------------------------------------------

    pub fn start(&mut self) {
        let now = self.clock.now_ms();
        self.animation.start(now, &mut self.scheduler);
    }

    pub fn stop(&mut self) {
        self.animation.stop(&mut self.scheduler);
        self.cancel_transition();
    }

    pub fn pause(&mut self) {
        self.animation.pause(&mut self.scheduler);
    }

    pub fn resume(&mut self) {
        let now = self.clock.now_ms();
        self.animation.resume(now, &mut self.scheduler);
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.animation.set_hidden(hidden);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.animation.set_viewport(viewport);
    }

    // ------------------------------------------------------------------
    // Telemetry
    // ------------------------------------------------------------------

    /// Arbitrate one telemetry sample. Returns `None` when the sample was
    /// rejected for going back in time.
    ///
    /// An accepted severe-crisis target queues behind the in-flight transition
    /// unless `[transition] preempt_on_crisis` is set.
    pub fn ingest(&mut self, sample: EmotionSample) -> Option<ArbitrationOutcome> {
        let now = self.clock.now_ms();
        if let Err(e) = self.timestamps.update_ingest(sample.timestamp_ms) {
            log::warn!("session {}: sample rejected: {}", self.id, e);
            self.bus.publish(
                now,
                BlsEvent::SampleRejected {
                    timestamp_ms: sample.timestamp_ms,
                    reason: e.to_string(),
                },
            );
            return None;
        }

        if !self.target.adaptive {
            self.arbiter.observe(&sample);
            return Some(ArbitrationOutcome::NoMatch);
        }

        let outcome = self.arbiter.evaluate(&sample, self.phase);
        match &outcome {
            ArbitrationOutcome::Adapted(decision) => {
                if let Some(crisis) = &decision.crisis {
                    self.publish_crisis(now, crisis);
                }
                self.bus.publish(
                    now,
                    BlsEvent::RuleAccepted {
                        decision: Box::new(decision.clone()),
                    },
                );
                let target = synthesize(&self.target, &decision.patch, &sample);
                let urgent = decision.crisis.as_ref().is_some_and(|c| c.is_severe());
                // Tickets from arbitration are fire-and-forget; progress is
                // observed through events.
                let _ticket = if urgent && self.config.transition.preempt_on_crisis {
                    self.preempt_transition(target, now)
                } else {
                    self.begin_transition(target, now, urgent)
                };
            }
            ArbitrationOutcome::Unchanged {
                crisis: Some(crisis),
                ..
            } => self.publish_crisis(now, crisis),
            ArbitrationOutcome::Unchanged { crisis: None, .. }
            | ArbitrationOutcome::Held { .. }
            | ArbitrationOutcome::NoMatch => {}
        }
        Some(outcome)
    }

    fn publish_crisis(&mut self, now: f64, crisis: &CrisisAssessment) {
        self.bus.publish(
            now,
            BlsEvent::CrisisDetected {
                severity: crisis.severity,
                interventions: crisis.interventions.clone(),
            },
        );
    }

    /// Transition to an explicit configuration, e.g. a therapist override.
    pub fn transition_to(&mut self, target: StimulusConfig) -> TransitionTicket {
        let now = self.clock.now_ms();
        self.begin_transition(target, now, false)
    }

    /// Queue behind any in-flight transition. Urgent (crisis) targets are
    /// kept even when the queue is full.
    fn begin_transition(&mut self, target: StimulusConfig, now: f64, urgent: bool) -> TransitionTicket {
        let settings = self.settings_for(&self.target, &target);
        let source = if self.transitions.is_active() {
            // Queued; the engine substitutes the in-flight target.
            self.target.clone()
        } else {
            self.current.clone()
        };
        self.target = target.clone();
        let ticket = if urgent {
            self.transitions
                .start_urgent_transition(source, target, settings, now, &mut self.scheduler)
        } else {
            self.transitions
                .start_transition(source, target, settings, now, &mut self.scheduler)
        };
        let events = self.transitions.drain_events();
        self.bus.publish_all(now, events);
        ticket
    }

    /// Drop in-flight and queued transitions and head for `target` at once,
    /// starting from wherever the stimulus is right now.
    fn preempt_transition(&mut self, target: StimulusConfig, now: f64) -> TransitionTicket {
        let source = self
            .transitions
            .current_config(now)
            .unwrap_or_else(|| self.current.clone());
        if self.transitions.is_active() {
            log::warn!(
                "session {}: crisis pre-empts {} pending transition(s)",
                self.id,
                self.transitions.queued() + 1
            );
        }
        self.transitions.cancel_transition(&mut self.scheduler);
        self.current = source.clone();
        let settings = self.settings_for(&source, &target);
        self.target = target.clone();
        let ticket = self.transitions.start_urgent_transition(
            source,
            target,
            settings,
            now,
            &mut self.scheduler,
        );
        let events = self.transitions.drain_events();
        self.bus.publish_all(now, events);
        ticket
    }

    fn settings_for(&self, from: &StimulusConfig, to: &StimulusConfig) -> TransitionSettings {
        let mut settings = to.transition.clone();
        if self.config.transition.pattern_aware && from.pattern != to.pattern {
            let derived = create_pattern_transition(
                from.pattern,
                to.pattern,
                settings.duration_ms,
                settings.easing,
            );
            settings.enable_morphing = derived.enable_morphing;
            settings.audio_crossfade |= derived.audio_crossfade;
        }
        settings
    }

    pub fn cancel_transition(&mut self) {
        if self.transitions.is_active() {
            if let Some(last) = self.transitions.last_config() {
                self.current = last.clone();
            }
        }
        self.transitions.cancel_transition(&mut self.scheduler);
        self.target = self.current.clone();
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    /// Service one host frame at the clock's current time.
    pub fn frame(&mut self) -> FrameReport {
        let now = self.clock.now_ms();

        let mut events = self.transitions.tick(now, &mut self.scheduler);
        for e in &events {
            if let BlsEvent::TransitionCompleted { config, .. } = e {
                self.current = (**config).clone();
            }
        }

        let effective = self
            .transitions
            .current_config(now)
            .unwrap_or_else(|| self.current.clone());
        let crossfade = self
            .transitions
            .state()
            .map(|s| s.crossfade)
            .unwrap_or(false);
        let morph = self.transitions.morph().copied();

        let FrameOutput {
            pose,
            progress,
            direction,
            skipped,
            events: motion_events,
        } = self
            .animation
            .tick(now, &effective, morph.as_ref(), &mut self.scheduler);

        if skipped.is_none() {
            self.drivers
                .audio
                .apply(&AudioCommand::from_config(&effective, progress, crossfade));
            if effective.haptics.enabled && !motion_events.is_empty() {
                let side = if progress >= 1.0 { Side::Right } else { Side::Left };
                self.drivers
                    .haptic
                    .pulse(&HapticCommand::from_config(&effective, side));
            }
        }

        events.extend(motion_events);
        self.bus.publish_all(now, events.iter().cloned());

        FrameReport {
            at_ms: now,
            config: effective,
            pose,
            progress,
            direction,
            skipped,
            events,
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn adaptive_state(&self) -> AdaptiveState {
        self.arbiter.state().clone()
    }

    pub fn therapeutic_reasoning(&self, sample: &EmotionSample) -> TherapeuticReasoning {
        self.arbiter.reasoning(sample, self.phase)
    }

    pub fn assessment(&self) -> SessionAssessment {
        self.arbiter.assessment()
    }

    /// Instantaneous configuration, interpolated when a transition is in flight.
    pub fn current_config(&self) -> StimulusConfig {
        self.transitions
            .current_config(self.clock.now_ms())
            .unwrap_or_else(|| self.current.clone())
    }

    pub fn target_config(&self) -> &StimulusConfig {
        &self.target
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitions.is_active()
    }
}
