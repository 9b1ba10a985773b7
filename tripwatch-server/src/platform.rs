//! Scripted implementation of the core `Platform` trait.
//!
//! The host has no Bluetooth stack or GPS of its own. `ScriptedPlatform`
//! keeps the state a phone would report (adapter power, permissions, paired
//! devices, profile connection states) and the script reader updates it
//! before each event is handed to the engine. Subscriptions the engine makes
//! are recorded so the host can honour them, e.g. dropping location fixes
//! while no one is listening.

use std::collections::HashMap;

use tripwatch_core::platform::{BluetoothDevice, Platform, PlatformError, Profile, ProfileState};

/// Platform state driven by an event script.
///
/// # Usage
///
/// ```rust,ignore
/// use tripwatch_server::platform::ScriptedPlatform;
///
/// let mut platform = ScriptedPlatform::new();
/// platform.set_bonded(vec![BluetoothDevice::new("00:11:22:33:44:55", Some("SYNC"), true)]);
/// let signals = engine.start(&mut platform);
/// ```
#[derive(Debug)]
pub struct ScriptedPlatform {
    adapter_enabled: bool,
    bluetooth_granted: bool,
    location_granted: bool,
    bonded: Vec<BluetoothDevice>,
    /// None when the profile proxy is unavailable
    a2dp: Option<HashMap<String, ProfileState>>,
    headset: Option<HashMap<String, ProfileState>>,
    receivers_registered: bool,
    discovering: bool,
    location_updates: bool,
    /// Scripted wall clock; wall time is used until the script sets it
    clock_ms: Option<u64>,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self {
            adapter_enabled: true,
            bluetooth_granted: true,
            location_granted: true,
            bonded: Vec::new(),
            a2dp: Some(HashMap::new()),
            headset: Some(HashMap::new()),
            receivers_registered: false,
            discovering: false,
            location_updates: false,
            clock_ms: None,
        }
    }

    pub fn set_adapter_enabled(&mut self, enabled: bool) {
        self.adapter_enabled = enabled;
        if !enabled {
            self.discovering = false;
        }
    }

    pub fn set_bluetooth_granted(&mut self, granted: bool) {
        self.bluetooth_granted = granted;
    }

    pub fn set_location_granted(&mut self, granted: bool) {
        self.location_granted = granted;
        if !granted && self.location_updates {
            log::warn!("Location permission revoked, updates stopped");
            self.location_updates = false;
        }
    }

    /// Replace the paired device list. Every device is marked bonded.
    pub fn set_bonded(&mut self, devices: Vec<BluetoothDevice>) {
        self.bonded = devices
            .into_iter()
            .map(|mut d| {
                d.bonded = true;
                d
            })
            .collect();
    }

    pub fn bonded_device(&self, address: &str) -> Option<&BluetoothDevice> {
        self.bonded.iter().find(|d| d.address == address)
    }

    /// Resolve an address the way an ACL broadcast would report it: with
    /// the paired name and bond state if the device is paired.
    pub fn device(&self, address: &str, name: Option<&str>) -> BluetoothDevice {
        match self.bonded_device(address) {
            Some(device) => device.clone(),
            None => BluetoothDevice::new(address, name, false),
        }
    }

    pub fn set_profile_available(&mut self, profile: Profile, available: bool) {
        let proxy = self.proxy_mut(profile);
        match (proxy.is_some(), available) {
            (false, true) => *proxy = Some(HashMap::new()),
            (true, false) => *proxy = None,
            _ => {}
        }
    }

    /// Record a profile state change. Brings the proxy up if it was down.
    pub fn set_profile_state(&mut self, profile: Profile, address: &str, state: ProfileState) {
        self.proxy_mut(profile)
            .get_or_insert_with(HashMap::new)
            .insert(address.to_string(), state);
    }

    fn proxy_mut(&mut self, profile: Profile) -> &mut Option<HashMap<String, ProfileState>> {
        match profile {
            Profile::A2dp => &mut self.a2dp,
            Profile::Headset => &mut self.headset,
        }
    }

    pub fn set_clock(&mut self, now_ms: u64) {
        self.clock_ms = Some(now_ms);
    }

    /// Move the scripted clock forward to `now_ms`; never backwards
    pub fn advance_clock(&mut self, now_ms: u64) {
        match self.clock_ms {
            Some(current) if current >= now_ms => {}
            _ => self.clock_ms = Some(now_ms),
        }
    }

    pub fn is_receiving(&self) -> bool {
        self.receivers_registered
    }

    pub fn is_discovering(&self) -> bool {
        self.discovering
    }

    pub fn is_tracking(&self) -> bool {
        self.location_updates
    }
}

impl Default for ScriptedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for ScriptedPlatform {
    fn register_receivers(&mut self) -> Result<(), PlatformError> {
        if !self.bluetooth_granted {
            return Err(PlatformError::PermissionDenied("Bluetooth".to_string()));
        }
        self.receivers_registered = true;
        log::debug!("Bluetooth receivers registered");
        Ok(())
    }

    fn unregister_receivers(&mut self) -> Result<(), PlatformError> {
        if !self.receivers_registered {
            return Err(PlatformError::AlreadyUnregistered);
        }
        self.receivers_registered = false;
        log::debug!("Bluetooth receivers unregistered");
        Ok(())
    }

    fn is_adapter_enabled(&self) -> bool {
        self.adapter_enabled
    }

    fn start_discovery(&mut self) -> Result<(), PlatformError> {
        if !self.bluetooth_granted {
            return Err(PlatformError::PermissionDenied("Bluetooth scan".to_string()));
        }
        if !self.adapter_enabled {
            return Err(PlatformError::Unavailable("Bluetooth is off".to_string()));
        }
        self.discovering = true;
        Ok(())
    }

    fn cancel_discovery(&mut self) {
        self.discovering = false;
    }

    fn bonded_devices(&mut self) -> Result<Vec<BluetoothDevice>, PlatformError> {
        if !self.bluetooth_granted {
            return Err(PlatformError::PermissionDenied("Bluetooth connect".to_string()));
        }
        Ok(self.bonded.clone())
    }

    fn profile_state(&mut self, profile: Profile, address: &str) -> Option<ProfileState> {
        let proxy = match profile {
            Profile::A2dp => self.a2dp.as_ref(),
            Profile::Headset => self.headset.as_ref(),
        }?;
        Some(proxy.get(address).copied().unwrap_or_default())
    }

    fn start_location_updates(
        &mut self,
        min_interval_ms: u64,
        min_distance_m: f64,
    ) -> Result<(), PlatformError> {
        if !self.location_granted {
            return Err(PlatformError::PermissionDenied("Location".to_string()));
        }
        self.location_updates = true;
        log::debug!(
            "Location updates every {} ms / {} m",
            min_interval_ms,
            min_distance_m
        );
        Ok(())
    }

    fn stop_location_updates(&mut self) {
        self.location_updates = false;
    }

    fn current_time_ms(&self) -> u64 {
        self.clock_ms
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis().max(0) as u64)
    }
}
