//! Rolling telemetry window and stability scoring.

use crate::domain::EmotionSample;
use std::collections::VecDeque;

/// Default number of samples retained for stability scoring.
pub const DEFAULT_WINDOW: usize = 10;

/// Below this many samples the window reports full stability.
const MIN_SAMPLES_FOR_STABILITY: usize = 3;

/// Bounded FIFO of the most recent emotion samples.
#[derive(Debug, Clone)]
pub struct TelemetryWindow {
    capacity: usize,
    samples: VecDeque<EmotionSample>,
}

impl TelemetryWindow {
    /// Capacity is at least 2 so the significance gate always has a
    /// previous sample to compare against.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, evicting the oldest beyond capacity.
    pub fn push(&mut self, sample: EmotionSample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&EmotionSample> {
        self.samples.back()
    }

    /// The sample pushed before the latest one.
    pub fn previous(&self) -> Option<&EmotionSample> {
        let n = self.samples.len();
        if n < 2 {
            None
        } else {
            self.samples.get(n - 2)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmotionSample> {
        self.samples.iter()
    }

    /// `max(0, 1 - (var(arousal) + var(valence)))` using population variance.
    /// A window with fewer than three samples is considered fully stable.
    pub fn stability(&self) -> f32 {
        if self.samples.len() < MIN_SAMPLES_FOR_STABILITY {
            return 1.0;
        }
        let (_, var_a) = mean_var(self.samples.iter().map(|s| s.arousal));
        let (_, var_v) = mean_var(self.samples.iter().map(|s| s.valence));
        let score = 1.0 - (var_a + var_v);
        if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Window means of (arousal, valence); `None` when empty.
    pub fn means(&self) -> Option<(f32, f32)> {
        if self.samples.is_empty() {
            return None;
        }
        let (ma, _) = mean_var(self.samples.iter().map(|s| s.arousal));
        let (mv, _) = mean_var(self.samples.iter().map(|s| s.valence));
        Some((ma, mv))
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for TelemetryWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

fn mean_var(values: impl Iterator<Item = f32> + Clone) -> (f32, f32) {
    let n = values.clone().count();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.clone().sum::<f32>() / n as f32;
    let var = values.map(|x| (x - mean).powi(2)).sum::<f32>() / n as f32;
    (mean, var)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: i64, a: f32, v: f32) -> EmotionSample {
        EmotionSample::new(t, a, v)
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut w = TelemetryWindow::new(3);
        for i in 0..5 {
            w.push(sample(i, 0.1 * i as f32, 0.5));
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.iter().next().map(|s| s.timestamp_ms), Some(2));
        assert_eq!(w.latest().map(|s| s.timestamp_ms), Some(4));
        assert_eq!(w.previous().map(|s| s.timestamp_ms), Some(3));
    }

    #[test]
    fn single_slot_window_still_keeps_previous() {
        let mut w = TelemetryWindow::new(1);
        assert_eq!(w.capacity(), 2);
        w.push(sample(0, 0.1, 0.5));
        w.push(sample(1, 0.6, 0.5));
        assert_eq!(w.previous().map(|s| s.timestamp_ms), Some(0));
    }

    #[test]
    fn stability_is_one_below_three_samples() {
        let mut w = TelemetryWindow::default();
        assert_eq!(w.stability(), 1.0);
        w.push(sample(0, 0.0, 0.0));
        w.push(sample(1, 1.0, 1.0));
        assert_eq!(w.stability(), 1.0);
    }

    #[test]
    fn constant_signal_is_fully_stable() {
        let mut w = TelemetryWindow::default();
        for i in 0..5 {
            w.push(sample(i, 0.4, 0.6));
        }
        assert!((w.stability() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn oscillating_signal_lowers_stability() {
        let mut w = TelemetryWindow::default();
        for i in 0..6 {
            let x = if i % 2 == 0 { 0.0 } else { 1.0 };
            w.push(sample(i, x, x));
        }
        // var = 0.25 per channel
        assert!((w.stability() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn means_follow_window() {
        let mut w = TelemetryWindow::new(2);
        assert_eq!(w.means(), None);
        w.push(sample(0, 0.2, 0.4));
        w.push(sample(1, 0.4, 0.8));
        let (a, v) = w.means().unwrap();
        assert!((a - 0.3).abs() < 1e-6);
        assert!((v - 0.6).abs() < 1e-6);
    }
}
