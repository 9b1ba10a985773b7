//! Tripwatch Core
//!
//! Platform-independent automatic trip detection. This crate decides when a
//! registered vehicle is actually connected over Bluetooth and, from a stream
//! of GPS samples, when a trip starts, when it ends and how far it went.
//!
//! # Architecture
//!
//! - **geo**: great-circle distance and noise-filtered path length
//! - **classifier**: device name to likely-vehicle / not-vehicle
//! - **vehicle**: vehicle records and their expiry rules
//! - **registry**: durable map of device address to vehicle record
//! - **platform**: the trait a host implements for Bluetooth and location access
//! - **presence**: vehicle presence monitor over Bluetooth events
//! - **trip**: sliding sample window and the trip detection state machine
//! - **engine**: fusion of presence and trip detection behind `handle(event)`
//!
//! Nothing in here performs I/O. A host feeds [`engine::EngineEvent`]s into a
//! [`engine::TripEngine`] one at a time and forwards the returned
//! [`engine::Signal`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! use tripwatch_core::engine::{EngineConfig, EngineEvent, TripEngine};
//! use tripwatch_core::registry::MemoryStore;
//!
//! let mut engine = TripEngine::new(EngineConfig::default(), MemoryStore::default())?;
//! let mut signals = engine.start(&mut platform);
//! signals.extend(engine.handle(EngineEvent::Location(sample), &mut platform));
//! ```

pub mod classifier;
pub mod engine;
pub mod error;
pub mod geo;
pub mod platform;
pub mod presence;
pub mod registry;
pub mod trip;
pub mod vehicle;

pub use error::{Error, Result};

// Re-export commonly used types
pub use engine::{EngineConfig, EngineEvent, Signal, TripEngine, UserAction};
pub use geo::Coordinate;
pub use platform::{BluetoothDevice, Platform, PlatformError, Profile, ProfileState};
pub use registry::{MemoryStore, RegistryStore, VehicleRegistry};
pub use trip::{CompletedTrip, LocationSample, TripCandidate, TripConfig, TripDetector};
pub use vehicle::{ExpenseCategory, VehicleRecord, VehicleType};
