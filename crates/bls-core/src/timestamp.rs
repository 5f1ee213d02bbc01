//! Telemetry and frame timestamp bookkeeping.
//!
//! Keeps the last accepted telemetry timestamp and the session start so that
//! out-of-order samples are rejected before they reach the arbiter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("timestamp regression in {context}: now={now_ms} < last={last_ms} (delta={}ms)", .now_ms - .last_ms)]
pub struct TimestampRegression {
    pub context: &'static str,
    pub now_ms: i64,
    pub last_ms: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimestampLog {
    /// Last accepted telemetry sample
    pub last_ingest: Option<i64>,
    /// First accepted telemetry sample of the session
    pub session_start: Option<i64>,
}

impl TimestampLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a telemetry timestamp. Equal timestamps are accepted; going
    /// backwards is not.
    ///
    /// Returns milliseconds since the previous sample (0 for the first).
    pub fn update_ingest(&mut self, ts_ms: i64) -> Result<u64, TimestampRegression> {
        if let Some(last) = self.last_ingest {
            if ts_ms < last {
                return Err(TimestampRegression {
                    context: "ingest",
                    now_ms: ts_ms,
                    last_ms: last,
                });
            }
        }
        let dt = self
            .last_ingest
            .map(|last| crate::domain::dt_ms(ts_ms, last))
            .unwrap_or(0);
        self.last_ingest = Some(ts_ms);
        if self.session_start.is_none() {
            self.session_start = Some(ts_ms);
        }
        Ok(dt)
    }

    /// Session length in milliseconds as of `now_ms`.
    pub fn session_duration_ms(&self, now_ms: i64) -> u64 {
        self.session_start
            .map(|start| crate::domain::dt_ms(now_ms, start))
            .unwrap_or(0)
    }
}
