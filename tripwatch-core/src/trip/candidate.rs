//! Open-trip builder and the finished trip record.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geo::{accumulate_miles, Coordinate};
use crate::trip::sample::LocationSample;
use crate::vehicle::ExpenseCategory;

/// What armed the detector when the trip started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripMethod {
    /// A registered vehicle was connected
    BluetoothGps,
    /// Armed without a vehicle connection
    Gps,
}

impl Default for TripMethod {
    fn default() -> Self {
        TripMethod::Gps
    }
}

/// Why an open trip was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Low speed confirmed on consecutive samples
    StopConfirmed,
    /// Open longer than the maximum trip duration
    MaxDuration,
    /// The vehicle link dropped
    VehicleDisconnected,
    /// Tracking was switched off
    TrackingStopped,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::StopConfirmed => write!(f, "stop confirmed"),
            CloseReason::MaxDuration => write!(f, "maximum duration reached"),
            CloseReason::VehicleDisconnected => write!(f, "vehicle disconnected"),
            CloseReason::TrackingStopped => write!(f, "tracking stopped"),
        }
    }
}

/// A trip that is still open.
///
/// Only the detector mutates it, and only by appending path samples. Nothing
/// about the start changes once it is created.
#[derive(Debug, Clone, PartialEq)]
pub struct TripCandidate {
    start: LocationSample,
    path: Vec<LocationSample>,
    method: TripMethod,
    category: ExpenseCategory,
    vehicle_id: Option<String>,
}

impl TripCandidate {
    pub fn new(
        start: LocationSample,
        method: TripMethod,
        category: ExpenseCategory,
        vehicle_id: Option<String>,
    ) -> Self {
        TripCandidate {
            start,
            path: vec![start],
            method,
            category,
            vehicle_id,
        }
    }

    pub fn start(&self) -> &LocationSample {
        &self.start
    }

    pub fn start_time(&self) -> u64 {
        self.start.timestamp
    }

    pub fn path(&self) -> &[LocationSample] {
        &self.path
    }

    pub fn method(&self) -> TripMethod {
        self.method
    }

    pub fn category(&self) -> ExpenseCategory {
        self.category
    }

    pub fn vehicle_id(&self) -> Option<&str> {
        self.vehicle_id.as_deref()
    }

    pub fn latest(&self) -> &LocationSample {
        self.path.last().unwrap_or(&self.start)
    }

    pub fn record(&mut self, sample: LocationSample) {
        self.path.push(sample);
    }

    /// Path length in miles with noise segments removed
    pub fn distance_miles(&self) -> f64 {
        let coordinates: Vec<Coordinate> = self.path.iter().map(|s| s.coordinate()).collect();
        accumulate_miles(&coordinates)
    }

    /// Close the trip at `end`. Returns None when the distance is below
    /// `min_distance_miles`, which means the trip was a false start.
    pub fn finish(
        self,
        end: &LocationSample,
        distance_miles: f64,
        min_distance_miles: f64,
    ) -> Option<CompletedTrip> {
        if distance_miles < min_distance_miles {
            return None;
        }

        Some(CompletedTrip {
            id: self.start.timestamp,
            start_time: self.start.timestamp,
            end_time: end.timestamp,
            start_latitude: self.start.latitude,
            start_longitude: self.start.longitude,
            end_latitude: end.latitude,
            end_longitude: end.longitude,
            distance: distance_miles,
            duration: end.timestamp.saturating_sub(self.start.timestamp),
            method: self.method,
            category: self.category,
            vehicle_id: self.vehicle_id,
        })
    }
}

/// A finished trip as persisted in the trip list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTrip {
    pub id: u64,
    /// Milliseconds since epoch
    pub start_time: u64,
    pub end_time: u64,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
    /// Miles
    pub distance: f64,
    /// Milliseconds
    pub duration: u64,
    pub method: TripMethod,
    pub category: ExpenseCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
}
