//! Engine events and the subscriber bus.

use crate::animation::Direction;
use crate::arbiter::Decision;
use crate::crisis::{CrisisSeverity, Intervention};
use crate::domain::SessionId;
use crate::motion::MotionPattern;
use crate::stimulus::StimulusConfig;
use crate::transition::MorphState;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum BlsEvent {
    TransitionStarted {
        transition_id: u64,
        from: Box<StimulusConfig>,
        to: Box<StimulusConfig>,
    },
    TransitionProgress {
        transition_id: u64,
        progress: f32,
    },
    TransitionCompleted {
        transition_id: u64,
        config: Box<StimulusConfig>,
    },
    MorphingUpdate {
        transition_id: u64,
        morph: MorphState,
    },
    PatternCompleted {
        pattern: MotionPattern,
        completions: u64,
    },
    DirectionChanged {
        direction: Direction,
    },
    RuleAccepted {
        decision: Box<Decision>,
    },
    CrisisDetected {
        severity: CrisisSeverity,
        interventions: Vec<Intervention>,
    },
    SampleRejected {
        timestamp_ms: i64,
        reason: String,
    },
}

impl BlsEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransitionStarted { .. } => "transition-started",
            Self::TransitionProgress { .. } => "transition-progress",
            Self::TransitionCompleted { .. } => "transition-completed",
            Self::MorphingUpdate { .. } => "morphing-update",
            Self::PatternCompleted { .. } => "pattern-completed",
            Self::DirectionChanged { .. } => "direction-changed",
            Self::RuleAccepted { .. } => "rule-accepted",
            Self::CrisisDetected { .. } => "crisis-detected",
            Self::SampleRejected { .. } => "sample-rejected",
        }
    }
}

/// An event stamped with its session and the engine time it was published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub session_id: SessionId,
    pub at_ms: f64,
    pub event: BlsEvent,
}

/// Fan-out to any number of subscribers. Receivers may live on other
/// threads; dropped receivers are pruned on the next publish.
#[derive(Debug)]
pub struct EventBus {
    session_id: SessionId,
    subscribers: Vec<Sender<EventEnvelope>>,
}

impl EventBus {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<EventEnvelope> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn publish(&mut self, at_ms: f64, event: BlsEvent) {
        log::trace!("event {} at {:.1}ms", event.kind(), at_ms);
        let envelope = EventEnvelope {
            session_id: self.session_id,
            at_ms,
            event,
        };
        self.subscribers
            .retain(|tx| tx.send(envelope.clone()).is_ok());
    }

    pub fn publish_all(&mut self, at_ms: f64, events: impl IntoIterator<Item = BlsEvent>) {
        for e in events {
            self.publish(at_ms, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fans_out_to_every_subscriber() {
        let mut bus = EventBus::new(SessionId::new());
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(1.0, BlsEvent::DirectionChanged { direction: Direction::Backward });
        assert_eq!(a.try_recv().unwrap().event.kind(), "direction-changed");
        assert_eq!(b.try_recv().unwrap().at_ms, 1.0);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut bus = EventBus::new(SessionId::new());
        let keep = bus.subscribe();
        drop(bus.subscribe());
        bus.publish(0.0, BlsEvent::TransitionProgress { transition_id: 1, progress: 0.5 });
        assert_eq!(bus.subscriber_count(), 1);
        assert!(keep.try_recv().is_ok());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(BlsEvent::SampleRejected {
            timestamp_ms: 5,
            reason: "late".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "sample-rejected");
    }
}
