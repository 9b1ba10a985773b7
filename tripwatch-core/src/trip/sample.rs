//! Location samples and the sliding window they are smoothed over.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::geo::Coordinate;

/// Miles per hour in one meter per second
pub const MPH_PER_MPS: f64 = 2.23694;

/// One GPS fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground speed in mph, never negative
    pub speed_mph: f64,
    /// Milliseconds since epoch
    pub timestamp: u64,
    /// Horizontal accuracy radius in meters
    pub accuracy: f64,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, speed_mph: f64, timestamp: u64, accuracy: f64) -> Self {
        LocationSample {
            latitude,
            longitude,
            speed_mph: speed_mph.max(0.0),
            timestamp,
            accuracy,
        }
    }

    /// Build a sample from a provider fix that reports speed in m/s
    pub fn from_mps(latitude: f64, longitude: f64, speed_mps: f64, timestamp: u64, accuracy: f64) -> Self {
        Self::new(latitude, longitude, speed_mps * MPH_PER_MPS, timestamp, accuracy)
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Bounded FIFO of the most recent samples; the oldest is evicted first.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<LocationSample>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        SampleWindow {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: LocationSample) {
        if self.samples.len() == self.capacity {
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

    pub fn latest(&self) -> Option<&LocationSample> {
        self.samples.back()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// The newest `n` samples, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &LocationSample> {
        self.samples.iter().skip(self.samples.len().saturating_sub(n))
    }

    /// Mean speed of the newest `n` samples whose accuracy is better than
    /// `max_accuracy_m`. None if none of them qualifies.
    pub fn smoothed_speed(&self, n: usize, max_accuracy_m: f64) -> Option<f64> {
        let (sum, count) = self
            .recent(n)
            .filter(|s| s.accuracy < max_accuracy_m)
            .fold((0.0, 0usize), |(sum, count), s| (sum + s.speed_mph, count + 1));

        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// How many of the newest `n` samples satisfy `predicate`
    pub fn count_recent<F>(&self, n: usize, predicate: F) -> usize
    where
        F: Fn(&LocationSample) -> bool,
    {
        self.recent(n).filter(|s| predicate(s)).count()
    }
}
