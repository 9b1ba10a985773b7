//! Vehicle Presence Monitor
//!
//! Watches Bluetooth discovery, bond and link events and decides when a
//! registered vehicle is actually connected, not merely paired.
//!
//! # Active connection
//!
//! A registered device counts as connected when it is bonded and the first of
//! these tiers holds:
//!
//! 1. it is CONNECTED on the A2DP profile,
//! 2. it is CONNECTED on the hands-free/headset profile,
//! 3. no profile proxy is available at all, so the bond is all we can see,
//! 4. proxies answered but reported nothing, the device is a registered
//!    vehicle that is paired, and no other vehicle is current. Head units on
//!    non-standard profiles land here. A nearby paired car never displaces
//!    the one already driving.
//!
//! Tiers 3 and 4 trade precision for recall: wrongly assuming a car is present
//! costs a few GPS samples, missing it loses the whole trip. Both can be
//! switched off in [`PresenceConfig`].
//!
//! At most one vehicle is current. Connecting a second one first disconnects
//! the first.

use serde::{Deserialize, Serialize};

use crate::classifier::classify;
use crate::error::Result;
use crate::platform::{BluetoothDevice, Platform, PlatformError, Profile, ProfileState, Profiles};
use crate::registry::{RegistryStore, VehicleRegistry};
use crate::vehicle::{VehicleRecord, VehicleType};

/// Fallback tiers of the active connection check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceConfig {
    /// Treat bond state alone as connected when no profile proxy is available
    pub bond_only_without_profiles: bool,
    /// Assume a paired, registered vehicle is connected when the proxies
    /// report nothing for it
    pub assume_connected_when_paired: bool,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        PresenceConfig {
            bond_only_without_profiles: true,
            assume_connected_when_paired: true,
        }
    }
}

/// Why a device was judged connected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvidence {
    /// Confirmed CONNECTED on these profiles
    Profiles(Profiles),
    /// No profile proxies; bond state only
    NoProfileProxies,
    /// Proxies silent; registered and paired
    AssumedPaired,
}

/// Signals emitted by the monitor
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceSignal {
    NewVehicleDetected { name: String, id: String },
    VehicleConnected(VehicleRecord),
    VehicleDisconnected(VehicleRecord),
    Status(String),
}

pub struct PresenceMonitor<S: RegistryStore> {
    config: PresenceConfig,
    registry: VehicleRegistry<S>,
    current: Option<VehicleRecord>,
    scanning: bool,
    receivers_attached: bool,
}

impl<S: RegistryStore> PresenceMonitor<S> {
    pub fn new(config: PresenceConfig, registry: VehicleRegistry<S>) -> Self {
        PresenceMonitor {
            config,
            registry,
            current: None,
            scanning: false,
            receivers_attached: false,
        }
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PresenceConfig) {
        self.config = config;
    }

    pub fn registry(&self) -> &VehicleRegistry<S> {
        &self.registry
    }

    /// Vehicle presumed physically connected right now
    pub fn current_vehicle(&self) -> Option<&VehicleRecord> {
        self.current.as_ref()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    // -------------------------------------------------------------------------
    // Scanning lifecycle
    // -------------------------------------------------------------------------

    /// Attach receivers and scan bonded and nearby devices.
    ///
    /// Calling this while already scanning does nothing. A permission denial
    /// leaves scanning off until the next explicit enable.
    pub fn enable_scanning<P: Platform>(&mut self, platform: &mut P) -> Vec<PresenceSignal> {
        if self.scanning {
            return Vec::new();
        }

        if !self.receivers_attached {
            if let Err(e) = platform.register_receivers() {
                log::warn!("Cannot register Bluetooth receivers: {}", e);
                return vec![PresenceSignal::Status(format!(
                    "Vehicle detection inactive: {}",
                    e
                ))];
            }
            self.receivers_attached = true;
        }
        self.scanning = true;
        log::info!("Vehicle scanning enabled");

        self.scan(platform)
    }

    /// Cancel discovery, detach receivers and drop presence.
    ///
    /// Safe to call in any state; receivers are released at most once.
    pub fn disable_scanning<P: Platform>(&mut self, platform: &mut P) -> Vec<PresenceSignal> {
        let mut signals = Vec::new();

        if self.scanning {
            platform.cancel_discovery();
            self.scanning = false;
            log::info!("Vehicle scanning disabled");
        }

        if self.receivers_attached {
            self.receivers_attached = false;
            match platform.unregister_receivers() {
                Ok(()) => {}
                Err(PlatformError::AlreadyUnregistered) => {
                    log::debug!("Bluetooth receivers were already unregistered");
                }
                Err(e) => log::warn!("Failed to unregister Bluetooth receivers: {}", e),
            }
        }

        if let Some(previous) = self.current.take() {
            signals.push(PresenceSignal::VehicleDisconnected(previous));
        }
        signals
    }

    /// Enumerate bonded devices and start discovery
    pub fn scan<P: Platform>(&mut self, platform: &mut P) -> Vec<PresenceSignal> {
        let mut signals = Vec::new();

        if !platform.is_adapter_enabled() {
            signals.push(PresenceSignal::Status("Bluetooth is off".to_string()));
            return signals;
        }

        match platform.bonded_devices() {
            Ok(devices) => {
                log::debug!("Checking {} bonded devices", devices.len());
                for device in devices {
                    signals.extend(self.check_device(&device, platform));
                }
            }
            Err(e) => {
                log::warn!("Cannot enumerate bonded devices: {}", e);
                signals.push(PresenceSignal::Status(format!(
                    "Cannot read paired devices: {}",
                    e
                )));
            }
        }

        match platform.start_discovery() {
            Ok(()) => signals.push(PresenceSignal::Status("Scanning for vehicles".to_string())),
            Err(e) => {
                log::warn!("Cannot start Bluetooth discovery: {}", e);
                signals.push(PresenceSignal::Status(format!("Discovery failed: {}", e)));
            }
        }

        signals
    }

    // -------------------------------------------------------------------------
    // Bluetooth events
    // -------------------------------------------------------------------------

    pub fn on_adapter_state<P: Platform>(
        &mut self,
        powered_on: bool,
        platform: &mut P,
    ) -> Vec<PresenceSignal> {
        if !self.scanning {
            return Vec::new();
        }
        if powered_on {
            log::debug!("Bluetooth adapter on, rescanning");
            self.scan(platform)
        } else {
            vec![PresenceSignal::Status("Bluetooth is off".to_string())]
        }
    }

    pub fn on_device_found<P: Platform>(
        &mut self,
        device: &BluetoothDevice,
        platform: &mut P,
    ) -> Vec<PresenceSignal> {
        if !self.scanning {
            return Vec::new();
        }
        self.check_device(device, platform)
    }

    pub fn on_acl_connected<P: Platform>(
        &mut self,
        device: &BluetoothDevice,
        platform: &mut P,
    ) -> Vec<PresenceSignal> {
        if !self.scanning {
            return Vec::new();
        }
        log::debug!("ACL connected: {}", device.display_name());
        self.check_device(device, platform)
    }

    /// Link dropped. Only the current vehicle's address clears presence.
    pub fn on_acl_disconnected(&mut self, address: &str) -> Vec<PresenceSignal> {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|c| c.device_id == address);
        if !is_current {
            log::trace!("ACL disconnected from non-current device {}", address);
            return Vec::new();
        }

        match self.current.take() {
            Some(previous) => {
                log::info!("Vehicle {} '{}' disconnected", previous.device_id, previous.device_name);
                vec![PresenceSignal::VehicleDisconnected(previous)]
            }
            None => Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Registry actions
    // -------------------------------------------------------------------------

    /// Register a device and, if it is connected right now, make it current.
    pub fn register_vehicle<P: Platform>(
        &mut self,
        device_id: &str,
        device_name: &str,
        vehicle_type: VehicleType,
        platform: &mut P,
    ) -> Vec<PresenceSignal> {
        let now = platform.current_time_ms();
        let mut signals = Vec::new();

        if let Err(e) = self
            .registry
            .register(device_id, device_name, vehicle_type, now)
        {
            signals.push(persistence_failed(e));
        }

        if !self.scanning {
            return signals;
        }

        // The phone may already be linked to the car being registered
        match platform.bonded_devices() {
            Ok(devices) => {
                if let Some(device) = devices.iter().find(|d| d.address == device_id) {
                    signals.extend(self.check_device(device, platform));
                }
            }
            Err(e) => log::debug!("Cannot re-check {} after registration: {}", device_id, e),
        }
        signals
    }

    /// Remove a registration, disconnecting it first if it is current.
    pub fn unregister_vehicle(&mut self, device_id: &str) -> Vec<PresenceSignal> {
        let mut signals = self.release_if_current(device_id);
        if let Err(e) = self.registry.unregister(device_id) {
            signals.push(persistence_failed(e));
        }
        signals
    }

    /// Drop expired registrations
    pub fn purge_expired(&mut self, now_ms: u64) -> Vec<PresenceSignal> {
        match self.registry.purge_expired(now_ms) {
            Ok(removed) => removed
                .iter()
                .flat_map(|v| self.release_if_current(&v.device_id))
                .collect(),
            Err(e) => vec![persistence_failed(e)],
        }
    }

    // -------------------------------------------------------------------------
    // Decision logic
    // -------------------------------------------------------------------------

    /// Evaluate one discovered or bonded device
    pub fn check_device<P: Platform>(
        &mut self,
        device: &BluetoothDevice,
        platform: &mut P,
    ) -> Vec<PresenceSignal> {
        let now = platform.current_time_ms();

        let record = match self.registry.lookup(&device.address) {
            Some(record) => record.clone(),
            None => return self.check_unregistered(device),
        };

        if record.is_expired(now) {
            log::debug!("{} is registered but expired", device.address);
            return self.purge_expired(now);
        }

        let evidence = match self.active_connection(device, platform) {
            Some(evidence) => evidence,
            None => {
                log::trace!("{} is registered but not connected", device.address);
                return Vec::new();
            }
        };

        if self
            .current
            .as_ref()
            .is_some_and(|c| c.device_id == record.device_id)
        {
            return Vec::new();
        }

        let mut signals = Vec::new();
        if let Some(previous) = self.current.take() {
            log::info!(
                "Switching vehicle from {} to {}",
                previous.device_name,
                record.device_name
            );
            signals.push(PresenceSignal::VehicleDisconnected(previous));
        }

        log::info!(
            "Vehicle {} '{}' connected ({:?})",
            record.device_id,
            record.device_name,
            evidence
        );
        self.current = Some(record.clone());
        signals.push(PresenceSignal::VehicleConnected(record));
        signals
    }

    /// Tiered active-connection check; the first tier that holds wins.
    pub fn active_connection<P: Platform>(
        &self,
        device: &BluetoothDevice,
        platform: &mut P,
    ) -> Option<ConnectionEvidence> {
        if !device.bonded {
            return None;
        }

        let a2dp = platform.profile_state(Profile::A2dp, &device.address);
        let headset = platform.profile_state(Profile::Headset, &device.address);

        let mut confirmed = Profiles::empty();
        if a2dp == Some(ProfileState::Connected) {
            confirmed |= Profile::A2dp.flag();
        }
        if headset == Some(ProfileState::Connected) {
            confirmed |= Profile::Headset.flag();
        }
        if !confirmed.is_empty() {
            return Some(ConnectionEvidence::Profiles(confirmed));
        }

        if a2dp.is_none() && headset.is_none() && self.config.bond_only_without_profiles {
            log::debug!("No profile proxies, using bond state for {}", device.address);
            return Some(ConnectionEvidence::NoProfileProxies);
        }

        let other_current = self
            .current
            .as_ref()
            .is_some_and(|c| c.device_id != device.address);
        if self.config.assume_connected_when_paired
            && !other_current
            && self.registry.is_registered(&device.address)
        {
            log::debug!(
                "Profiles silent for paired vehicle {}, assuming connected",
                device.address
            );
            return Some(ConnectionEvidence::AssumedPaired);
        }

        None
    }

    fn check_unregistered(&self, device: &BluetoothDevice) -> Vec<PresenceSignal> {
        let name = match &device.name {
            Some(name) => name,
            None => return Vec::new(),
        };
        if !classify(name).is_vehicle() {
            log::trace!("Ignoring non-vehicle device '{}'", name);
            return Vec::new();
        }

        log::info!("New vehicle detected: '{}' ({})", name, device.address);
        vec![PresenceSignal::NewVehicleDetected {
            name: name.clone(),
            id: device.address.clone(),
        }]
    }

    fn release_if_current(&mut self, device_id: &str) -> Vec<PresenceSignal> {
        self.on_acl_disconnected(device_id)
    }
}

fn persistence_failed(e: crate::Error) -> PresenceSignal {
    log::warn!("Vehicle registry not saved: {}", e);
    PresenceSignal::Status(format!("Could not save vehicles: {}", e))
}

/// Convenience for callers that only need the registry result
pub fn open_monitor<S: RegistryStore>(
    config: PresenceConfig,
    store: S,
) -> Result<PresenceMonitor<S>> {
    Ok(PresenceMonitor::new(config, VehicleRegistry::open(store)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockPlatform;
    use crate::registry::MemoryStore;
    use crate::vehicle::MS_PER_DAY;

    const CAR: &str = "00:11:22:33:44:55";
    const RENTAL: &str = "66:77:88:99:AA:BB";

    fn monitor() -> PresenceMonitor<MemoryStore> {
        open_monitor(PresenceConfig::default(), MemoryStore::default()).unwrap()
    }

    fn connected_names(signals: &[PresenceSignal]) -> Vec<String> {
        signals
            .iter()
            .filter_map(|s| match s {
                PresenceSignal::VehicleConnected(v) => Some(format!("+{}", v.device_id)),
                PresenceSignal::VehicleDisconnected(v) => Some(format!("-{}", v.device_id)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_new_vehicle_detected() {
        let mut platform = MockPlatform::new();
        platform.bond(CAR, "Toyota Camry");
        platform.bond("AA:AA", "AirPods");
        let mut m = monitor();

        let signals = m.enable_scanning(&mut platform);
        let detected: Vec<_> = signals
            .iter()
            .filter(|s| matches!(s, PresenceSignal::NewVehicleDetected { .. }))
            .collect();
        assert_eq!(
            detected,
            vec![&PresenceSignal::NewVehicleDetected {
                name: "Toyota Camry".to_string(),
                id: CAR.to_string()
            }]
        );
        assert!(platform.discovering);
    }

    #[test]
    fn test_redetection_re_emits() {
        let mut platform = MockPlatform::new();
        let mut m = monitor();
        m.enable_scanning(&mut platform);
        let device = BluetoothDevice::new(CAR, Some("Honda"), false);

        assert_eq!(m.on_device_found(&device, &mut platform).len(), 1);
        assert_eq!(m.on_device_found(&device, &mut platform).len(), 1);
    }

    #[test]
    fn test_connected_on_a2dp() {
        let mut platform = MockPlatform::new();
        let device = platform.bond(CAR, "SYNC");
        platform.set_profile(Profile::A2dp, CAR, ProfileState::Connected);
        let mut m = monitor();
        m.enable_scanning(&mut platform);
        m.register_vehicle(CAR, "SYNC", VehicleType::Personal, &mut platform);

        assert_eq!(m.current_vehicle().unwrap().device_id, CAR);
        assert_eq!(
            m.active_connection(&device, &mut platform),
            Some(ConnectionEvidence::Profiles(Profiles::A2DP))
        );
    }

    #[test]
    fn test_connected_on_headset_only() {
        let mut platform = MockPlatform::new();
        let device = platform.bond(CAR, "SYNC");
        platform.set_profile(Profile::A2dp, CAR, ProfileState::Connecting);
        platform.set_profile(Profile::Headset, CAR, ProfileState::Connected);
        let m = monitor();

        assert_eq!(
            m.active_connection(&device, &mut platform),
            Some(ConnectionEvidence::Profiles(Profiles::HEADSET))
        );
    }

    #[test]
    fn test_not_bonded_never_connected() {
        let mut platform = MockPlatform::new();
        platform.set_profile(Profile::A2dp, CAR, ProfileState::Connected);
        let m = monitor();
        let device = BluetoothDevice::new(CAR, Some("SYNC"), false);

        assert_eq!(m.active_connection(&device, &mut platform), None);
    }

    #[test]
    fn test_no_proxies_uses_bond() {
        let mut platform = MockPlatform::new();
        platform.a2dp = None;
        platform.headset = None;
        let device = platform.bond(CAR, "SYNC");
        let m = monitor();

        assert_eq!(
            m.active_connection(&device, &mut platform),
            Some(ConnectionEvidence::NoProfileProxies)
        );
    }

    #[test]
    fn test_assumed_connected_when_profiles_silent() {
        let mut platform = MockPlatform::new();
        let device = platform.bond(CAR, "SYNC");
        let mut m = monitor();

        // Not registered yet: nothing to assume
        assert_eq!(m.active_connection(&device, &mut platform), None);

        m.register_vehicle(CAR, "SYNC", VehicleType::Personal, &mut platform);
        assert_eq!(
            m.active_connection(&device, &mut platform),
            Some(ConnectionEvidence::AssumedPaired)
        );
    }

    #[test]
    fn test_fallbacks_can_be_disabled() {
        let mut platform = MockPlatform::new();
        let device = platform.bond(CAR, "SYNC");
        let mut m = monitor();
        m.register_vehicle(CAR, "SYNC", VehicleType::Personal, &mut platform);
        m.set_config(PresenceConfig {
            bond_only_without_profiles: false,
            assume_connected_when_paired: false,
        });
        assert_eq!(m.active_connection(&device, &mut platform), None);

        platform.a2dp = None;
        platform.headset = None;
        assert_eq!(m.active_connection(&device, &mut platform), None);
    }

    #[test]
    fn test_repeated_connect_is_idempotent() {
        let mut platform = MockPlatform::new();
        let device = platform.bond(CAR, "SYNC");
        platform.set_profile(Profile::A2dp, CAR, ProfileState::Connected);
        let mut m = monitor();
        m.enable_scanning(&mut platform);

        let first = m.register_vehicle(CAR, "SYNC", VehicleType::Personal, &mut platform);
        assert_eq!(connected_names(&first), vec![format!("+{}", CAR)]);

        let again = m.on_acl_connected(&device, &mut platform);
        assert!(connected_names(&again).is_empty());
        let again = m.on_device_found(&device, &mut platform);
        assert!(connected_names(&again).is_empty());
    }

    #[test]
    fn test_switch_vehicle_disconnects_first() {
        let mut platform = MockPlatform::new();
        platform.bond(CAR, "SYNC");
        let rental = platform.bond(RENTAL, "Uconnect");
        platform.set_profile(Profile::A2dp, CAR, ProfileState::Connected);
        let mut m = monitor();
        m.set_config(PresenceConfig {
            bond_only_without_profiles: true,
            assume_connected_when_paired: false,
        });
        m.enable_scanning(&mut platform);
        m.register_vehicle(CAR, "SYNC", VehicleType::Personal, &mut platform);
        m.register_vehicle(RENTAL, "Uconnect", VehicleType::Rental, &mut platform);
        assert_eq!(m.current_vehicle().unwrap().device_id, CAR);

        // Rental confirmed, car gone from A2DP
        platform.set_profile(Profile::A2dp, RENTAL, ProfileState::Connected);
        platform.set_profile(Profile::A2dp, CAR, ProfileState::Disconnected);
        let signals = m.on_acl_connected(&rental, &mut platform);
        assert_eq!(
            connected_names(&signals),
            vec![format!("-{}", CAR), format!("+{}", RENTAL)]
        );
        assert_eq!(m.current_vehicle().unwrap().device_id, RENTAL);
    }

    #[test]
    fn test_assumed_paired_does_not_displace_current() {
        let mut platform = MockPlatform::new();
        platform.bond(CAR, "SYNC");
        let rental = platform.bond(RENTAL, "Uconnect");
        platform.set_profile(Profile::A2dp, CAR, ProfileState::Connected);
        let mut m = monitor();
        m.enable_scanning(&mut platform);
        m.register_vehicle(CAR, "SYNC", VehicleType::Personal, &mut platform);

        // Rental is registered and paired but silent on every profile
        let signals = m.register_vehicle(RENTAL, "Uconnect", VehicleType::Rental, &mut platform);
        assert!(connected_names(&signals).is_empty());
        assert!(connected_names(&m.on_device_found(&rental, &mut platform)).is_empty());
        assert_eq!(m.active_connection(&rental, &mut platform), None);
        assert_eq!(m.current_vehicle().unwrap().device_id, CAR);

        // Once the car is gone the rental may be assumed
        m.on_acl_disconnected(CAR);
        let signals = m.on_device_found(&rental, &mut platform);
        assert_eq!(connected_names(&signals), vec![format!("+{}", RENTAL)]);
    }

    #[test]
    fn test_acl_disconnect_only_for_current() {
        let mut platform = MockPlatform::new();
        platform.bond(CAR, "SYNC");
        platform.set_profile(Profile::A2dp, CAR, ProfileState::Connected);
        let mut m = monitor();
        m.enable_scanning(&mut platform);
        m.register_vehicle(CAR, "SYNC", VehicleType::Personal, &mut platform);

        assert!(m.on_acl_disconnected("FF:FF").is_empty());
        assert!(m.current_vehicle().is_some());

        let signals = m.on_acl_disconnected(CAR);
        assert_eq!(connected_names(&signals), vec![format!("-{}", CAR)]);
        assert!(m.current_vehicle().is_none());
        assert!(m.on_acl_disconnected(CAR).is_empty());
    }

    #[test]
    fn test_expired_vehicle_purged_on_check() {
        let mut platform = MockPlatform::new();
        let device = platform.bond(RENTAL, "Hertz Sync");
        let mut m = monitor();
        m.enable_scanning(&mut platform);
        m.register_vehicle(RENTAL, "Hertz Sync", VehicleType::Rental, &mut platform);
        assert!(m.current_vehicle().is_some());

        platform.now_ms += 8 * MS_PER_DAY;
        let signals = m.on_acl_connected(&device, &mut platform);
        assert_eq!(connected_names(&signals), vec![format!("-{}", RENTAL)]);
        assert!(!m.registry().is_registered(RENTAL));
    }

    #[test]
    fn test_unregister_current_disconnects() {
        let mut platform = MockPlatform::new();
        platform.bond(CAR, "SYNC");
        let mut m = monitor();
        m.enable_scanning(&mut platform);
        m.register_vehicle(CAR, "SYNC", VehicleType::Personal, &mut platform);

        let signals = m.unregister_vehicle(CAR);
        assert_eq!(connected_names(&signals), vec![format!("-{}", CAR)]);
        assert!(!m.registry().is_registered(CAR));
    }

    #[test]
    fn test_disable_scanning_is_idempotent() {
        let mut platform = MockPlatform::new();
        let mut m = monitor();

        // Never enabled
        assert!(m.disable_scanning(&mut platform).is_empty());

        m.enable_scanning(&mut platform);
        m.enable_scanning(&mut platform);
        assert_eq!(platform.receiver_registrations, 1);
        assert_eq!(platform.discovery_starts, 1);

        m.disable_scanning(&mut platform);
        assert!(!platform.receivers_registered);
        assert!(!platform.discovering);
        m.disable_scanning(&mut platform);
        assert!(!m.is_scanning());
    }

    #[test]
    fn test_permission_denied_degrades() {
        let mut platform = MockPlatform::new();
        platform.bluetooth_denied = true;
        let mut m = monitor();

        let signals = m.enable_scanning(&mut platform);
        assert!(matches!(signals.as_slice(), [PresenceSignal::Status(_)]));
        assert!(!m.is_scanning());

        // Retried on the next explicit enable
        platform.bluetooth_denied = false;
        m.enable_scanning(&mut platform);
        assert!(m.is_scanning());
    }

    #[test]
    fn test_adapter_power_on_rescans() {
        let mut platform = MockPlatform::new();
        platform.adapter_enabled = false;
        let mut m = monitor();
        m.enable_scanning(&mut platform);
        assert_eq!(platform.discovery_starts, 0);

        platform.adapter_enabled = true;
        m.on_adapter_state(true, &mut platform);
        assert_eq!(platform.discovery_starts, 1);
    }
}
