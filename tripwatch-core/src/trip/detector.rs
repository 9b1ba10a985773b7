//! Trip detection state machine
//!
//! Two states, Idle and TripOpen, with asymmetric thresholds so speeds near
//! either threshold cannot make the machine flap:
//!
//! | Transition | Window | Smoothed speed | Raw majority | Confirmations |
//! |------------|--------|----------------|--------------|---------------|
//! | Idle → TripOpen | ≥ 3 samples | > 8 mph | 2 of last 3 > 8 mph | 1 |
//! | TripOpen → Idle | ≥ 4 samples | < 3 mph | 3 of last 4 < 3 mph | 2 consecutive |
//!
//! Smoothed speed is the mean over the last 5 samples with accuracy better
//! than 100 m. A sample with no accurate neighbours causes no transition.
//!
//! An open trip is force-closed once it has run longer than the maximum
//! duration, whatever the speed, so a GPS dropout cannot strand it.

use serde::{Deserialize, Serialize};

use crate::trip::candidate::{CloseReason, CompletedTrip, TripCandidate, TripMethod};
use crate::trip::sample::{LocationSample, SampleWindow};
use crate::vehicle::ExpenseCategory;

/// Thresholds for trip detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripConfig {
    pub start_speed_mph: f64,       // smoothed and raw speed to open a trip
    pub stop_speed_mph: f64,        // smoothed and raw speed to close a trip
    pub min_trip_distance_miles: f64,
    pub max_trip_duration_ms: u64,
    pub window_capacity: usize,
    pub smoothing_samples: usize,
    pub max_accuracy_m: f64,        // samples at or above this are not smoothed
    pub start_window: usize,        // raw samples considered for start
    pub start_votes: usize,         // of which this many must exceed start speed
    pub stop_window: usize,         // raw samples considered for stop
    pub stop_votes: usize,          // of which this many must be under stop speed
    pub stop_confirmations: u32,    // consecutive stop samples before closing
}

impl Default for TripConfig {
    fn default() -> Self {
        TripConfig {
            start_speed_mph: 8.0,
            stop_speed_mph: 3.0,
            min_trip_distance_miles: 0.5,
            max_trip_duration_ms: 10 * 60 * 1000,
            window_capacity: 15,
            smoothing_samples: 5,
            max_accuracy_m: 100.0,
            start_window: 3,
            start_votes: 2,
            stop_window: 4,
            stop_votes: 3,
            stop_confirmations: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripState {
    Idle,
    TripOpen,
}

/// Signals emitted by the detector
#[derive(Debug, Clone, PartialEq)]
pub enum TripSignal {
    Started(TripCandidate),
    Completed {
        trip: CompletedTrip,
        reason: CloseReason,
    },
}

/// Context the detector was armed with; stamped on trips it opens
#[derive(Debug, Clone, PartialEq)]
struct ArmedContext {
    method: TripMethod,
    category: ExpenseCategory,
    vehicle_id: Option<String>,
}

pub struct TripDetector {
    config: TripConfig,
    window: SampleWindow,
    candidate: Option<TripCandidate>,
    stop_count: u32,
    armed: Option<ArmedContext>,
}

impl TripDetector {
    pub fn new(config: TripConfig) -> Self {
        TripDetector {
            window: SampleWindow::new(config.window_capacity),
            config,
            candidate: None,
            stop_count: 0,
            armed: None,
        }
    }

    pub fn config(&self) -> &TripConfig {
        &self.config
    }

    pub fn state(&self) -> TripState {
        if self.candidate.is_some() {
            TripState::TripOpen
        } else {
            TripState::Idle
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn candidate(&self) -> Option<&TripCandidate> {
        self.candidate.as_ref()
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    /// Consecutive samples that have satisfied the stop condition
    pub fn stop_confirmations(&self) -> u32 {
        self.stop_count
    }

    /// Start consuming samples. Trips opened from now on carry this context.
    pub fn arm(&mut self, method: TripMethod, category: ExpenseCategory, vehicle_id: Option<String>) {
        log::debug!("Trip detector armed ({:?}, {:?})", method, category);
        self.armed = Some(ArmedContext {
            method,
            category,
            vehicle_id,
        });
    }

    /// Stop consuming samples, force-closing any open trip first.
    pub fn disarm(&mut self, reason: CloseReason) -> Option<TripSignal> {
        let signal = self.force_close(reason);
        if self.armed.take().is_some() {
            log::debug!("Trip detector disarmed ({})", reason);
        }
        self.window.clear();
        self.stop_count = 0;
        signal
    }

    /// Close the open trip at the most recent sample, if there is one.
    pub fn force_close(&mut self, reason: CloseReason) -> Option<TripSignal> {
        if self.candidate.is_none() {
            return None;
        }
        self.close(reason)
    }

    /// Feed one sample through the state machine.
    pub fn process(&mut self, sample: LocationSample) -> Option<TripSignal> {
        if self.armed.is_none() {
            log::trace!("Detector not armed, ignoring sample at {}", sample.timestamp);
            return None;
        }

        self.window.push(sample);

        if let Some(candidate) = self.candidate.as_mut() {
            candidate.record(sample);
            let elapsed = sample.timestamp.saturating_sub(candidate.start_time());
            if elapsed > self.config.max_trip_duration_ms {
                log::info!("Trip open for {} s, forcing close", elapsed / 1000);
                return self.close(CloseReason::MaxDuration);
            }
        }

        let smoothed = match self
            .window
            .smoothed_speed(self.config.smoothing_samples, self.config.max_accuracy_m)
        {
            Some(speed) => speed,
            None => {
                log::trace!("No accurate samples to smooth, skipping");
                return None;
            }
        };

        match self.state() {
            TripState::Idle => {
                if self.should_start(smoothed) {
                    self.open(sample)
                } else {
                    None
                }
            }
            TripState::TripOpen => {
                if self.should_stop(smoothed) {
                    self.stop_count += 1;
                    log::debug!(
                        "Stop condition met ({}/{}), smoothed {:.1} mph",
                        self.stop_count,
                        self.config.stop_confirmations,
                        smoothed
                    );
                    if self.stop_count >= self.config.stop_confirmations {
                        return self.close(CloseReason::StopConfirmed);
                    }
                } else {
                    self.stop_count = 0;
                }
                None
            }
        }
    }

    fn should_start(&self, smoothed: f64) -> bool {
        let threshold = self.config.start_speed_mph;
        self.window.len() >= self.config.start_window
            && smoothed > threshold
            && self
                .window
                .count_recent(self.config.start_window, |s| s.speed_mph > threshold)
                >= self.config.start_votes
    }

    fn should_stop(&self, smoothed: f64) -> bool {
        let threshold = self.config.stop_speed_mph;
        self.window.len() >= self.config.stop_window
            && smoothed < threshold
            && self
                .window
                .count_recent(self.config.stop_window, |s| s.speed_mph < threshold)
                >= self.config.stop_votes
    }

    fn open(&mut self, sample: LocationSample) -> Option<TripSignal> {
        let context = self.armed.clone()?;
        let candidate = TripCandidate::new(
            sample,
            context.method,
            context.category,
            context.vehicle_id,
        );
        log::info!(
            "Trip started at ({:.5}, {:.5}), {:.1} mph",
            sample.latitude,
            sample.longitude,
            sample.speed_mph
        );
        self.stop_count = 0;
        self.candidate = Some(candidate.clone());
        Some(TripSignal::Started(candidate))
    }

    fn close(&mut self, reason: CloseReason) -> Option<TripSignal> {
        let candidate = self.candidate.take()?;
        self.window.clear();
        self.stop_count = 0;

        let end = *candidate.latest();
        let distance = candidate.distance_miles();
        match candidate.finish(&end, distance, self.config.min_trip_distance_miles) {
            Some(trip) => {
                log::info!(
                    "Trip completed ({}): {:.2} mi in {} s",
                    reason,
                    trip.distance,
                    trip.duration / 1000
                );
                Some(TripSignal::Completed { trip, reason })
            }
            None => {
                log::debug!(
                    "Discarding trip of {:.2} mi ({}), below minimum {:.2} mi",
                    distance,
                    reason,
                    self.config.min_trip_distance_miles
                );
                None
            }
        }
    }
}
