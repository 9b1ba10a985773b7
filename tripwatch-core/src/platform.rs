//! Platform access
//!
//! The engine never talks to Bluetooth or location hardware directly. A host
//! implements [`Platform`] on top of whatever the OS provides and passes it
//! into each engine call, the way a poll-based controller is handed its I/O
//! provider.
//!
//! ```rust,ignore
//! fn main_loop<P: Platform>(platform: &mut P, engine: &mut TripEngine<MyStore>) {
//!     let signals = engine.start(platform);
//!     while let Some(event) = next_event() {
//!         for signal in engine.handle(event, platform) {
//!             publish(signal);
//!         }
//!     }
//!     engine.stop(platform);
//! }
//! ```

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A Bluetooth device as reported by discovery or bond enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BluetoothDevice {
    /// Stable hardware address
    pub address: String,
    /// Friendly name, if the device advertised one
    #[serde(default)]
    pub name: Option<String>,
    /// Paired with this phone
    #[serde(default)]
    pub bonded: bool,
}

impl BluetoothDevice {
    pub fn new(address: &str, name: Option<&str>, bonded: bool) -> Self {
        BluetoothDevice {
            address: address.to_string(),
            name: name.map(str::to_string),
            bonded,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// Bluetooth profiles that indicate an in-car audio link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Advanced Audio Distribution (media streaming)
    A2dp,
    /// Hands-free / headset (calls)
    Headset,
}

impl Profile {
    pub fn flag(&self) -> Profiles {
        match self {
            Profile::A2dp => Profiles::A2DP,
            Profile::Headset => Profiles::HEADSET,
        }
    }
}

bitflags! {
    /// Set of profiles a device was seen connected on
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Profiles: u8 {
        const A2DP = 0b01;
        const HEADSET = 0b10;
    }
}

/// Connection state of a device on one profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl Default for ProfileState {
    fn default() -> Self {
        ProfileState::Disconnected
    }
}

/// Errors reported by the host platform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Bluetooth or location permission has been revoked
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Adapter off, provider disabled, or hardware absent
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Receivers were already detached
    #[error("receivers already unregistered")]
    AlreadyUnregistered,
}

/// Bluetooth and location services provided by the host.
pub trait Platform {
    // -------------------------------------------------------------------------
    // Bluetooth
    // -------------------------------------------------------------------------

    /// Subscribe to discovery, ACL and adapter state events
    fn register_receivers(&mut self) -> Result<(), PlatformError>;

    /// Detach the receivers registered by `register_receivers`
    fn unregister_receivers(&mut self) -> Result<(), PlatformError>;

    fn is_adapter_enabled(&self) -> bool;

    fn start_discovery(&mut self) -> Result<(), PlatformError>;

    fn cancel_discovery(&mut self);

    /// Devices currently paired with this phone
    fn bonded_devices(&mut self) -> Result<Vec<BluetoothDevice>, PlatformError>;

    /// State of a device on a profile, or None if the profile proxy is not
    /// available at all
    fn profile_state(&mut self, profile: Profile, address: &str) -> Option<ProfileState>;

    // -------------------------------------------------------------------------
    // Location
    // -------------------------------------------------------------------------

    fn start_location_updates(
        &mut self,
        min_interval_ms: u64,
        min_distance_m: f64,
    ) -> Result<(), PlatformError>;

    fn stop_location_updates(&mut self);

    // -------------------------------------------------------------------------
    // Utility
    // -------------------------------------------------------------------------

    /// Wall-clock time in milliseconds since epoch
    fn current_time_ms(&self) -> u64;
}
