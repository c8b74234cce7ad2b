//! Clock and timing utilities for stream synchronization.
//!
//! Recording and export timing is anchored to a tokio monotonic instant so
//! that tests running on paused time drive every timer deterministically.
//! This module provides utilities for:
//! - Capturing the epoch of a recording
//! - Measuring drift between two playback clocks
//! - Pacing a fixed-rate render loop

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Monotonic time since a recording started, plus the wall-clock start.
#[derive(Debug, Clone)]
pub struct RecordingClock {
    epoch: Instant,
    started_at: DateTime<Utc>,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Get seconds elapsed since recording start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Whole seconds elapsed, as shown on a recording timer.
    pub fn elapsed_whole_secs(&self) -> u64 {
        self.epoch.elapsed().as_secs()
    }

    /// Wall-clock time at recording start.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The underlying epoch instant.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

fn secs_to_ns(secs: f64) -> u64 {
    (secs.max(0.0) * 1_000_000_000.0) as u64
}

/// Drift measurement between two streams.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Timestamp in the reference stream (ns).
    pub reference_ns: u64,
    /// Timestamp in the measured stream (ns).
    pub measured_ns: u64,
}

impl DriftMeasurement {
    /// Build a measurement from two playback positions in seconds.
    pub fn from_secs(reference_secs: f64, measured_secs: f64) -> Self {
        Self {
            reference_ns: secs_to_ns(reference_secs),
            measured_ns: secs_to_ns(measured_secs),
        }
    }

    /// Drift in nanoseconds (positive = measured is ahead).
    pub fn drift_ns(&self) -> i64 {
        self.measured_ns as i64 - self.reference_ns as i64
    }

    /// Drift in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_ns() as f64 / 1_000_000.0
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}

/// Fixed frame pacing for render loops.
#[derive(Debug, Clone, Copy)]
pub struct RateController {
    target_interval_ns: u64,
}

impl RateController {
    /// Create a controller targeting the given Hz rate. Zero is treated as 1 Hz.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
        }
    }

    /// Target interval as a duration, for tokio intervals.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_nanos(self.target_interval_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_paused_time() {
        let clock = RecordingClock::start();
        assert_eq!(clock.elapsed_whole_secs(), 0);
        tokio::time::advance(std::time::Duration::from_millis(2500)).await;
        assert_eq!(clock.elapsed_whole_secs(), 2);
        assert!((clock.elapsed_secs() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_drift_measurement() {
        let drift = DriftMeasurement {
            reference_ns: 1_000_000_000,
            measured_ns: 1_050_000_000,
        };
        assert_eq!(drift.drift_ns(), 50_000_000);
        assert!((drift.drift_ms() - 50.0).abs() < 1e-9);
        assert!(drift.exceeds_threshold_ms(10.0));
        assert!(!drift.exceeds_threshold_ms(100.0));
    }

    #[test]
    fn test_drift_from_secs_negative_behind() {
        let drift = DriftMeasurement::from_secs(2.0, 1.75);
        assert!((drift.drift_ms() + 250.0).abs() < 1e-6);
    }

    #[test]
    fn test_rate_controller_interval() {
        assert_eq!(RateController::new(60).interval().as_nanos(), 16_666_666);
        assert_eq!(RateController::new(0).interval().as_secs(), 1);
    }
}
