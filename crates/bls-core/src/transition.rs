//! Time-based transitions between stimulus configurations.
//!
//! At most one transition is in flight; later requests queue FIFO and start
//! from the target of the transition that just finished, so a queued A→B then
//! B→C never jumps straight from A to C. Progress is derived from `now`
//! alone, which makes repeated ticks with the same time idempotent.

use crate::easing::Easing;
use crate::events::BlsEvent;
use crate::interpolate::interpolate;
use crate::motion::MotionPattern;
use crate::scheduler::{FrameHandle, FrameScheduler};
use crate::stimulus::{StimulusConfig, TransitionSettings};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// In-flight transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionState {
    pub id: u64,
    pub from: StimulusConfig,
    pub to: StimulusConfig,
    pub start_ms: f64,
    pub duration_ms: f64,
    /// Eased progress, [0, 1]
    pub progress: f32,
    pub easing: Easing,
    /// Audio should crossfade rather than glide
    pub crossfade: bool,
}

impl TransitionState {
    /// Linear time fraction at `now_ms`, clamped to [0, 1].
    pub fn raw_progress(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        let t = (now_ms - self.start_ms) / self.duration_ms;
        if t.is_nan() {
            0.0
        } else {
            t.clamp(0.0, 1.0) as f32
        }
    }
}

/// Geometric blend between two patterns while a transition runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MorphState {
    pub from_pattern: MotionPattern,
    pub to_pattern: MotionPattern,
    pub progress: f32,
    /// 0 = pure source pose, 1 = pure target pose
    pub blend: f32,
}

/// Handle returned for every transition request. Resolves with the final
/// configuration on completion; disconnects if the transition is cancelled.
#[derive(Debug)]
pub struct TransitionTicket {
    pub id: u64,
    completion: Receiver<StimulusConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TicketStatus {
    Pending,
    Completed(Box<StimulusConfig>),
    Cancelled,
}

impl TransitionTicket {
    pub fn poll(&self) -> TicketStatus {
        match self.completion.try_recv() {
            Ok(cfg) => TicketStatus::Completed(Box::new(cfg)),
            Err(TryRecvError::Empty) => TicketStatus::Pending,
            Err(TryRecvError::Disconnected) => TicketStatus::Cancelled,
        }
    }

    /// Block up to `timeout` for completion. `None` on timeout or cancellation.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<StimulusConfig> {
        match self.completion.recv_timeout(timeout) {
            Ok(cfg) => Some(cfg),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[derive(Debug)]
struct Active {
    state: TransitionState,
    morph: Option<MorphState>,
    done: Sender<StimulusConfig>,
}

#[derive(Debug)]
struct Queued {
    id: u64,
    /// Crisis targets are never evicted from a full queue
    urgent: bool,
    to: StimulusConfig,
    settings: TransitionSettings,
    done: Sender<StimulusConfig>,
}

#[derive(Debug, Default)]
pub struct TransitionEngine {
    active: Option<Active>,
    queue: VecDeque<Queued>,
    frame: Option<FrameHandle>,
    next_id: u64,
    outbox: Vec<BlsEvent>,
    last_config: Option<StimulusConfig>,
    /// 0 means unbounded
    max_queue: usize,
}

impl TransitionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the pending queue. When full, the newest non-urgent pending
    /// request is replaced so the latest target wins; urgent requests are
    /// never dropped, even if that overfills the queue.
    pub fn with_max_queue(max_queue: usize) -> Self {
        Self {
            max_queue,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn state(&self) -> Option<&TransitionState> {
        self.active.as_ref().map(|a| &a.state)
    }

    pub fn morph(&self) -> Option<&MorphState> {
        self.active.as_ref().and_then(|a| a.morph.as_ref())
    }

    /// Most recently interpolated or completed configuration.
    pub fn last_config(&self) -> Option<&StimulusConfig> {
        self.last_config.as_ref()
    }

    pub fn frame_requested(&self) -> bool {
        self.frame.is_some()
    }

    pub fn start_transition(
        &mut self,
        from: StimulusConfig,
        to: StimulusConfig,
        settings: TransitionSettings,
        now_ms: f64,
        scheduler: &mut dyn FrameScheduler,
    ) -> TransitionTicket {
        self.enqueue(from, to, settings, now_ms, scheduler, false)
    }

    /// Like [`start_transition`](Self::start_transition), but the request
    /// survives queue coalescing. Used for crisis targets.
    pub fn start_urgent_transition(
        &mut self,
        from: StimulusConfig,
        to: StimulusConfig,
        settings: TransitionSettings,
        now_ms: f64,
        scheduler: &mut dyn FrameScheduler,
    ) -> TransitionTicket {
        self.enqueue(from, to, settings, now_ms, scheduler, true)
    }

    fn enqueue(
        &mut self,
        from: StimulusConfig,
        to: StimulusConfig,
        settings: TransitionSettings,
        now_ms: f64,
        scheduler: &mut dyn FrameScheduler,
        urgent: bool,
    ) -> TransitionTicket {
        self.next_id += 1;
        let id = self.next_id;
        let (done, completion) = bounded(1);

        if self.active.is_some() {
            if self.max_queue > 0 && self.queue.len() >= self.max_queue {
                if let Some(pos) = self.queue.iter().rposition(|q| !q.urgent) {
                    if let Some(dropped) = self.queue.remove(pos) {
                        log::debug!("transition {} coalesced into {}", dropped.id, id);
                    }
                }
            }
            log::debug!(
                "transition {} queued behind {} pending{}",
                id,
                self.queue.len() + 1,
                if urgent { " (urgent)" } else { "" }
            );
            self.queue.push_back(Queued {
                id,
                urgent,
                to,
                settings,
                done,
            });
        } else {
            self.begin(id, from, to, settings, now_ms, done);
            self.ensure_frame(scheduler);
        }

        TransitionTicket { id, completion }
    }

    fn begin(
        &mut self,
        id: u64,
        from: StimulusConfig,
        to: StimulusConfig,
        settings: TransitionSettings,
        now_ms: f64,
        done: Sender<StimulusConfig>,
    ) {
        let morph = (settings.enable_morphing && from.pattern != to.pattern).then(|| MorphState {
            from_pattern: from.pattern,
            to_pattern: to.pattern,
            progress: 0.0,
            blend: 0.0,
        });
        log::debug!(
            "transition {} started: {} -> {} over {:.0}ms ({})",
            id,
            from.pattern.as_str(),
            to.pattern.as_str(),
            settings.duration_ms,
            settings.easing.as_str()
        );
        self.outbox.push(BlsEvent::TransitionStarted {
            transition_id: id,
            from: Box::new(from.clone()),
            to: Box::new(to.clone()),
        });
        self.last_config = Some(from.clone());
        self.active = Some(Active {
            state: TransitionState {
                id,
                from,
                to,
                start_ms: now_ms,
                duration_ms: settings.duration_ms.max(0.0) as f64,
                progress: 0.0,
                easing: settings.easing,
                crossfade: settings.audio_crossfade,
            },
            morph,
            done,
        });
    }

    fn ensure_frame(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.frame.is_none() {
            self.frame = Some(scheduler.request_frame());
        }
    }

    /// Advance to `now_ms`. Returns every event produced since the last drain.
    /// Ticks arriving without a requested frame are ignored.
    pub fn tick(&mut self, now_ms: f64, scheduler: &mut dyn FrameScheduler) -> Vec<BlsEvent> {
        if self.frame.take().is_none() {
            log::trace!("transition tick at {:.1}ms ignored: no frame requested", now_ms);
            return self.drain_events();
        }

        let Some(active) = self.active.as_mut() else {
            return self.drain_events();
        };

        let raw = active.state.raw_progress(now_ms);
        let eased = active.state.easing.apply(raw);
        active.state.progress = eased;
        let id = active.state.id;
        self.outbox.push(BlsEvent::TransitionProgress {
            transition_id: id,
            progress: eased,
        });
        if let Some(m) = active.morph.as_mut() {
            m.progress = raw;
            m.blend = eased;
            self.outbox.push(BlsEvent::MorphingUpdate {
                transition_id: id,
                morph: *m,
            });
        }

        if raw >= 1.0 {
            self.complete(now_ms);
        } else {
            self.last_config = Some(interpolate(&active.state.from, &active.state.to, eased));
        }

        if self.active.is_some() {
            self.ensure_frame(scheduler);
        }
        self.drain_events()
    }

    fn complete(&mut self, now_ms: f64) {
        let Some(finished) = self.active.take() else {
            return;
        };
        let id = finished.state.id;
        let final_config = finished.state.to;
        log::debug!("transition {} completed at {:.1}ms", id, now_ms);
        self.outbox.push(BlsEvent::TransitionCompleted {
            transition_id: id,
            config: Box::new(final_config.clone()),
        });
        // Receiver may already be gone; that is not an error.
        let _ = finished.done.send(final_config.clone());
        self.last_config = Some(final_config.clone());

        if let Some(next) = self.queue.pop_front() {
            self.begin(next.id, final_config, next.to, next.settings, now_ms, next.done);
        }
    }

    /// Interpolated configuration at `now_ms`, `None` when idle.
    pub fn current_config(&self, now_ms: f64) -> Option<StimulusConfig> {
        self.active.as_ref().map(|a| {
            let p = a.state.easing.apply(a.state.raw_progress(now_ms));
            interpolate(&a.state.from, &a.state.to, p)
        })
    }

    /// Drop the in-flight and queued transitions. Their tickets observe
    /// cancellation and no events from them are delivered.
    pub fn cancel_transition(&mut self, scheduler: &mut dyn FrameScheduler) {
        if let Some(handle) = self.frame.take() {
            scheduler.cancel_frame(handle);
        }
        let dropped = self.active.take().map(|_| 1).unwrap_or(0) + self.queue.len();
        self.queue.clear();
        self.outbox.clear();
        if dropped > 0 {
            log::debug!("cancelled {} transition(s)", dropped);
        }
    }

    pub fn drain_events(&mut self) -> Vec<BlsEvent> {
        std::mem::take(&mut self.outbox)
    }
}

/// Transition settings for a pattern change: morph when both patterns are
/// 3D, crossfade audio for dramatic switches.
pub fn create_pattern_transition(
    from: MotionPattern,
    to: MotionPattern,
    duration_ms: f32,
    easing: Easing,
) -> TransitionSettings {
    TransitionSettings {
        duration_ms,
        easing,
        enable_morphing: from.is_3d() && to.is_3d(),
        audio_crossfade: from.is_dramatic_switch(to),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    fn cfg(speed: f32, pattern: MotionPattern) -> StimulusConfig {
        StimulusConfig {
            speed,
            pattern,
            ..StimulusConfig::default()
        }
    }

    fn linear(ms: f32) -> TransitionSettings {
        TransitionSettings {
            duration_ms: ms,
            easing: Easing::Linear,
            ..TransitionSettings::default()
        }
    }

    #[test]
    fn runs_to_completion_and_resolves_ticket() {
        let mut sched = ManualScheduler::new();
        let mut eng = TransitionEngine::new();
        let a = cfg(2.0, MotionPattern::Horizontal);
        let b = cfg(8.0, MotionPattern::Horizontal);
        let ticket = eng.start_transition(a.clone(), b.clone(), linear(1000.0), 0.0, &mut sched);
        assert_eq!(ticket.poll(), TicketStatus::Pending);

        let ev = eng.tick(500.0, &mut sched);
        assert!(matches!(ev[0], BlsEvent::TransitionStarted { .. }));
        assert!(matches!(ev[1], BlsEvent::TransitionProgress { progress, .. } if (progress - 0.5).abs() < 1e-6));
        assert!((eng.current_config(500.0).unwrap().speed - 5.0).abs() < 1e-5);

        let ev = eng.tick(1000.0, &mut sched);
        assert!(matches!(&ev[1], BlsEvent::TransitionCompleted { config, .. } if **config == b));
        assert_eq!(ticket.poll(), TicketStatus::Completed(Box::new(b.clone())));
        assert!(!eng.is_active());
        assert!(eng.current_config(1200.0).is_none());
        assert_eq!(eng.last_config(), Some(&b));
    }

    #[test]
    fn stale_tick_is_ignored() {
        let mut sched = ManualScheduler::new();
        let mut eng = TransitionEngine::new();
        eng.start_transition(cfg(1.0, MotionPattern::Horizontal), cfg(2.0, MotionPattern::Horizontal), linear(100.0), 0.0, &mut sched);
        eng.tick(10.0, &mut sched);
        // A second tick at the same time is fine since a new frame was requested
        let again = eng.tick(10.0, &mut sched);
        assert_eq!(again.len(), 1);
        eng.cancel_transition(&mut sched);
        assert!(!eng.frame_requested());
        assert!(eng.tick(20.0, &mut sched).is_empty());
    }

    #[test]
    fn ticks_are_idempotent_in_time() {
        let mut sched = ManualScheduler::new();
        let mut eng = TransitionEngine::new();
        eng.start_transition(cfg(1.0, MotionPattern::Horizontal), cfg(9.0, MotionPattern::Horizontal), TransitionSettings::default(), 0.0, &mut sched);
        eng.tick(300.0, &mut sched);
        let first = eng.current_config(300.0);
        eng.tick(300.0, &mut sched);
        assert_eq!(eng.current_config(300.0), first);
    }

    #[test]
    fn queued_transition_starts_from_completed_target() {
        let mut sched = ManualScheduler::new();
        let mut eng = TransitionEngine::new();
        let a = cfg(1.0, MotionPattern::Horizontal);
        let b = cfg(5.0, MotionPattern::Horizontal);
        let c = cfg(9.0, MotionPattern::Horizontal);
        let t1 = eng.start_transition(a, b.clone(), linear(1000.0), 0.0, &mut sched);
        let t2 = eng.start_transition(b.clone(), c.clone(), linear(500.0), 100.0, &mut sched);
        assert_eq!(eng.queued(), 1);

        let ev = eng.tick(1000.0, &mut sched);
        let kinds: Vec<_> = ev.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec!["transition-started", "transition-progress", "transition-completed", "transition-started"]
        );
        match &ev[3] {
            BlsEvent::TransitionStarted { from, to, transition_id } => {
                assert_eq!(*transition_id, t2.id);
                assert_eq!(**from, b);
                assert_eq!(**to, c);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(t1.poll(), TicketStatus::Completed(_)));
        assert_eq!(t2.poll(), TicketStatus::Pending);

        eng.tick(1250.0, &mut sched);
        assert!((eng.current_config(1250.0).unwrap().speed - 7.0).abs() < 1e-5);
        eng.tick(1500.0, &mut sched);
        assert_eq!(t2.poll(), TicketStatus::Completed(Box::new(c)));
    }

    #[test]
    fn cancel_disconnects_every_ticket() {
        let mut sched = ManualScheduler::new();
        let mut eng = TransitionEngine::new();
        let a = cfg(1.0, MotionPattern::Horizontal);
        let t1 = eng.start_transition(a.clone(), a.clone(), linear(1000.0), 0.0, &mut sched);
        let t2 = eng.start_transition(a.clone(), a, linear(1000.0), 0.0, &mut sched);
        eng.cancel_transition(&mut sched);
        assert_eq!(t1.poll(), TicketStatus::Cancelled);
        assert_eq!(t2.poll(), TicketStatus::Cancelled);
        assert!(eng.drain_events().is_empty());
        assert!(!eng.is_active());
    }

    #[test]
    fn morph_state_tracks_pattern_change() {
        let mut sched = ManualScheduler::new();
        let mut eng = TransitionEngine::new();
        let settings = TransitionSettings {
            enable_morphing: true,
            ..linear(1000.0)
        };
        eng.start_transition(cfg(5.0, MotionPattern::Spiral), cfg(5.0, MotionPattern::Helix), settings, 0.0, &mut sched);
        let ev = eng.tick(250.0, &mut sched);
        let morph = ev.iter().find_map(|e| match e {
            BlsEvent::MorphingUpdate { morph, .. } => Some(*morph),
            _ => None,
        });
        let morph = morph.unwrap();
        assert_eq!(morph.from_pattern, MotionPattern::Spiral);
        assert!((morph.blend - 0.25).abs() < 1e-6);
    }

    #[test]
    fn zero_duration_completes_on_first_tick() {
        let mut sched = ManualScheduler::new();
        let mut eng = TransitionEngine::new();
        let b = cfg(7.0, MotionPattern::Circle);
        let t = eng.start_transition(cfg(1.0, MotionPattern::Horizontal), b.clone(), linear(0.0), 0.0, &mut sched);
        eng.tick(0.0, &mut sched);
        assert_eq!(t.poll(), TicketStatus::Completed(Box::new(b)));
    }

    #[test]
    fn full_queue_keeps_latest_target() {
        let mut sched = ManualScheduler::new();
        let mut eng = TransitionEngine::with_max_queue(1);
        let a = cfg(1.0, MotionPattern::Horizontal);
        eng.start_transition(a.clone(), cfg(2.0, MotionPattern::Horizontal), linear(100.0), 0.0, &mut sched);
        let stale = eng.start_transition(a.clone(), cfg(3.0, MotionPattern::Horizontal), linear(100.0), 0.0, &mut sched);
        let latest = eng.start_transition(a, cfg(4.0, MotionPattern::Horizontal), linear(100.0), 0.0, &mut sched);
        assert_eq!(eng.queued(), 1);
        assert_eq!(stale.poll(), TicketStatus::Cancelled);
        eng.tick(100.0, &mut sched);
        eng.tick(200.0, &mut sched);
        assert!(matches!(latest.poll(), TicketStatus::Completed(c) if c.speed == 4.0));
    }

    #[test]
    fn full_queue_never_drops_urgent_request() {
        let mut sched = ManualScheduler::new();
        let mut eng = TransitionEngine::with_max_queue(1);
        let a = cfg(1.0, MotionPattern::Horizontal);
        eng.start_transition(a.clone(), cfg(2.0, MotionPattern::Horizontal), linear(100.0), 0.0, &mut sched);
        let urgent = eng.start_urgent_transition(a.clone(), cfg(1.5, MotionPattern::Horizontal), linear(100.0), 0.0, &mut sched);
        let later = eng.start_transition(a.clone(), cfg(9.0, MotionPattern::Horizontal), linear(100.0), 0.0, &mut sched);
        // Overfilled rather than losing the urgent target
        assert_eq!(eng.queued(), 2);
        let last = eng.start_transition(a, cfg(8.0, MotionPattern::Horizontal), linear(100.0), 0.0, &mut sched);
        assert_eq!(later.poll(), TicketStatus::Cancelled);
        assert_eq!(eng.queued(), 2);

        eng.tick(100.0, &mut sched);
        eng.tick(200.0, &mut sched);
        assert!(matches!(urgent.poll(), TicketStatus::Completed(c) if c.speed == 1.5));
        eng.tick(300.0, &mut sched);
        assert_eq!(last.wait_timeout(Duration::from_millis(10)).map(|c| c.speed), Some(8.0));
    }

    #[test]
    fn pattern_transition_settings() {
        let s = create_pattern_transition(MotionPattern::Spiral, MotionPattern::Helix, 800.0, Easing::EaseOut);
        assert!(s.enable_morphing);
        assert!(!s.audio_crossfade);
        let s = create_pattern_transition(MotionPattern::Horizontal, MotionPattern::Sphere, 800.0, Easing::EaseOut);
        assert!(!s.enable_morphing);
        assert!(s.audio_crossfade);
    }
}
