//! Trip Detection
//!
//! GPS-driven state machine that opens a trip when smoothed speed shows the
//! vehicle is really moving and closes it once it has really stopped.
//!
//! # Architecture
//!
//! - **sample**: location samples and the bounded sliding window
//! - **candidate**: the open-trip builder and the finished trip record
//! - **detector**: the Idle / TripOpen state machine
//!
//! # Example
//!
//! ```rust,ignore
//! use tripwatch_core::trip::{LocationSample, TripConfig, TripDetector, TripSignal};
//!
//! let mut detector = TripDetector::new(TripConfig::default());
//! detector.arm(TripMethod::BluetoothGps, ExpenseCategory::Business, None);
//!
//! for sample in samples {
//!     if let Some(TripSignal::Completed { trip, .. }) = detector.process(sample) {
//!         save(trip);
//!     }
//! }
//! ```

mod candidate;
mod detector;
mod sample;

pub use candidate::{CloseReason, CompletedTrip, TripCandidate, TripMethod};
pub use detector::{TripConfig, TripDetector, TripSignal, TripState};
pub use sample::{LocationSample, SampleWindow, MPH_PER_MPS};
