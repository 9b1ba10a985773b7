//! Trip Engine
//!
//! Fuses the presence monitor and the trip detector behind a single
//! `handle(event) -> signals` surface. The engine holds no state of its own
//! beyond whether auto-detection is on and whether location updates are
//! subscribed; everything else lives in the two components it forwards to:
//!
//! - `VehicleConnected` arms the detector and subscribes to location updates
//! - `VehicleDisconnected` force-closes any open trip, disarms the detector
//!   and drops the location subscription
//!
//! The host must call into one engine from one thread at a time. Events that
//! arrive concurrently are queued by the host, not here.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::platform::{BluetoothDevice, Platform};
use crate::presence::{PresenceConfig, PresenceMonitor, PresenceSignal};
use crate::registry::{RegistryStore, VehicleRegistry};
use crate::trip::{
    CloseReason, CompletedTrip, LocationSample, TripCandidate, TripConfig, TripDetector,
    TripMethod, TripSignal,
};
use crate::vehicle::{ExpenseCategory, VehicleRecord, VehicleType};

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub trip: TripConfig,
    pub presence: PresenceConfig,
    /// Keep the detector armed while auto-detection is on, even with no
    /// vehicle connected
    pub arm_without_vehicle: bool,
    /// Minimum time between location updates requested from the platform
    pub location_interval_ms: u64,
    /// Minimum movement between location updates requested from the platform
    pub location_min_distance_m: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            trip: TripConfig::default(),
            presence: PresenceConfig::default(),
            arm_without_vehicle: false,
            location_interval_ms: 5_000,
            location_min_distance_m: 10.0,
        }
    }
}

/// Bluetooth events from the host
#[derive(Debug, Clone, PartialEq)]
pub enum BluetoothEvent {
    AdapterStateChanged { powered_on: bool },
    DeviceFound(BluetoothDevice),
    AclConnected(BluetoothDevice),
    AclDisconnected { address: String },
}

/// Location events from the host
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Fix(LocationSample),
    ProviderEnabled,
    ProviderDisabled,
}

/// Actions taken by the user
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    RegisterVehicle {
        id: String,
        name: String,
        vehicle_type: VehicleType,
    },
    UnregisterVehicle {
        id: String,
    },
    SetAutoDetection(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Bluetooth(BluetoothEvent),
    Location(LocationEvent),
    User(UserAction),
}

/// Outbound signals for UI, persistence and diagnostics
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    NewVehicleDetected { name: String, id: String },
    VehicleConnected(VehicleRecord),
    VehicleDisconnected(VehicleRecord),
    TripStarted(TripCandidate),
    TripCompleted {
        trip: CompletedTrip,
        reason: CloseReason,
    },
    /// Free-text diagnostic status
    Status(String),
}

impl From<TripSignal> for Signal {
    fn from(signal: TripSignal) -> Self {
        match signal {
            TripSignal::Started(candidate) => Signal::TripStarted(candidate),
            TripSignal::Completed { trip, reason } => Signal::TripCompleted { trip, reason },
        }
    }
}

pub struct TripEngine<S: RegistryStore> {
    config: EngineConfig,
    monitor: PresenceMonitor<S>,
    detector: TripDetector,
    enabled: bool,
    tracking: bool,
}

impl<S: RegistryStore> TripEngine<S> {
    /// Build an engine, loading the vehicle registry from `store`.
    pub fn new(config: EngineConfig, store: S) -> Result<Self> {
        let registry = VehicleRegistry::open(store)?;
        Ok(TripEngine {
            monitor: PresenceMonitor::new(config.presence, registry),
            detector: TripDetector::new(config.trip),
            config,
            enabled: false,
            tracking: false,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn registry(&self) -> &VehicleRegistry<S> {
        self.monitor.registry()
    }

    pub fn current_vehicle(&self) -> Option<&VehicleRecord> {
        self.monitor.current_vehicle()
    }

    pub fn detector(&self) -> &TripDetector {
        &self.detector
    }

    /// Turn auto-detection on. Does nothing if it is already on and
    /// scanning; an enable that was refused by the platform is retried.
    pub fn start<P: Platform>(&mut self, platform: &mut P) -> Vec<Signal> {
        if self.enabled && self.monitor.is_scanning() {
            return Vec::new();
        }

        let now = platform.current_time_ms();
        let mut presence = self.monitor.purge_expired(now);
        presence.extend(self.monitor.enable_scanning(platform));

        if !self.enabled {
            self.enabled = true;
            log::info!("Automatic trip detection enabled");
        }
        let mut signals = self.apply_presence(presence, platform);

        if self.config.arm_without_vehicle && !self.detector.is_armed() {
            signals.extend(self.arm(TripMethod::Gps, ExpenseCategory::default(), None, platform));
        }
        signals
    }

    /// Turn auto-detection off, closing any open trip. Safe in any state.
    pub fn stop<P: Platform>(&mut self, platform: &mut P) -> Vec<Signal> {
        let presence = self.monitor.disable_scanning(platform);
        let mut signals: Vec<Signal> = presence.into_iter().map(Signal::from).collect();

        signals.extend(self.detector.disarm(CloseReason::TrackingStopped).map(Signal::from));
        self.stop_tracking(platform);

        if self.enabled {
            self.enabled = false;
            log::info!("Automatic trip detection disabled");
        }
        signals
    }

    /// Process one inbound event.
    pub fn handle<P: Platform>(&mut self, event: EngineEvent, platform: &mut P) -> Vec<Signal> {
        match event {
            EngineEvent::Bluetooth(event) => self.handle_bluetooth(event, platform),
            EngineEvent::Location(event) => self.handle_location(event),
            EngineEvent::User(action) => self.handle_user(action, platform),
        }
    }

    fn handle_bluetooth<P: Platform>(
        &mut self,
        event: BluetoothEvent,
        platform: &mut P,
    ) -> Vec<Signal> {
        let presence = match event {
            BluetoothEvent::AdapterStateChanged { powered_on } => {
                self.monitor.on_adapter_state(powered_on, platform)
            }
            BluetoothEvent::DeviceFound(device) => self.monitor.on_device_found(&device, platform),
            BluetoothEvent::AclConnected(device) => self.monitor.on_acl_connected(&device, platform),
            BluetoothEvent::AclDisconnected { address } => self.monitor.on_acl_disconnected(&address),
        };
        self.apply_presence(presence, platform)
    }

    fn handle_location(&mut self, event: LocationEvent) -> Vec<Signal> {
        match event {
            LocationEvent::Fix(sample) => {
                if !self.detector.is_armed() {
                    return Vec::new();
                }
                self.detector.process(sample).map(Signal::from).into_iter().collect()
            }
            LocationEvent::ProviderDisabled => {
                log::warn!("Location provider disabled");
                vec![Signal::Status(
                    "Location provider disabled, trips cannot be detected".to_string(),
                )]
            }
            LocationEvent::ProviderEnabled => {
                log::info!("Location provider enabled");
                vec![Signal::Status("Location provider enabled".to_string())]
            }
        }
    }

    fn handle_user<P: Platform>(&mut self, action: UserAction, platform: &mut P) -> Vec<Signal> {
        match action {
            UserAction::RegisterVehicle {
                id,
                name,
                vehicle_type,
            } => {
                let presence = self
                    .monitor
                    .register_vehicle(&id, &name, vehicle_type, platform);
                self.apply_presence(presence, platform)
            }
            UserAction::UnregisterVehicle { id } => {
                let presence = self.monitor.unregister_vehicle(&id);
                self.apply_presence(presence, platform)
            }
            UserAction::SetAutoDetection(true) => self.start(platform),
            UserAction::SetAutoDetection(false) => self.stop(platform),
        }
    }

    // -------------------------------------------------------------------------
    // Fusion
    // -------------------------------------------------------------------------

    fn apply_presence<P: Platform>(
        &mut self,
        presence: Vec<PresenceSignal>,
        platform: &mut P,
    ) -> Vec<Signal> {
        let mut signals = Vec::new();
        for signal in presence {
            match signal {
                PresenceSignal::VehicleConnected(record) => {
                    signals.push(Signal::VehicleConnected(record.clone()));
                    signals.extend(self.on_vehicle_connected(&record, platform));
                }
                PresenceSignal::VehicleDisconnected(record) => {
                    signals.push(Signal::VehicleDisconnected(record.clone()));
                    signals.extend(self.on_vehicle_disconnected(&record, platform));
                }
                other => signals.push(Signal::from(other)),
            }
        }
        signals
    }

    /// Arm GPS consumption for this vehicle
    pub fn on_vehicle_connected<P: Platform>(
        &mut self,
        record: &VehicleRecord,
        platform: &mut P,
    ) -> Vec<Signal> {
        self.arm(
            TripMethod::BluetoothGps,
            record.suggested_category,
            Some(record.device_id.clone()),
            platform,
        )
    }

    /// Force-close any open trip at the last buffered sample, then disarm
    pub fn on_vehicle_disconnected<P: Platform>(
        &mut self,
        record: &VehicleRecord,
        platform: &mut P,
    ) -> Vec<Signal> {
        log::debug!("Disarming trip detection for {}", record.device_id);
        let mut signals: Vec<Signal> = self
            .detector
            .disarm(CloseReason::VehicleDisconnected)
            .map(Signal::from)
            .into_iter()
            .collect();

        if self.config.arm_without_vehicle && self.enabled {
            signals.extend(self.arm(TripMethod::Gps, ExpenseCategory::default(), None, platform));
        } else {
            self.stop_tracking(platform);
        }
        signals
    }

    fn arm<P: Platform>(
        &mut self,
        method: TripMethod,
        category: ExpenseCategory,
        vehicle_id: Option<String>,
        platform: &mut P,
    ) -> Vec<Signal> {
        if !self.tracking {
            match platform.start_location_updates(
                self.config.location_interval_ms,
                self.config.location_min_distance_m,
            ) {
                Ok(()) => {
                    self.tracking = true;
                    log::debug!("Location updates started");
                }
                Err(e) => {
                    log::warn!("Cannot start location updates: {}", e);
                    return vec![Signal::Status(format!("Trip tracking inactive: {}", e))];
                }
            }
        }
        self.detector.arm(method, category, vehicle_id);
        Vec::new()
    }

    fn stop_tracking<P: Platform>(&mut self, platform: &mut P) {
        if self.tracking {
            platform.stop_location_updates();
            self.tracking = false;
            log::debug!("Location updates stopped");
        }
    }
}

impl From<PresenceSignal> for Signal {
    fn from(signal: PresenceSignal) -> Self {
        match signal {
            PresenceSignal::NewVehicleDetected { name, id } => Signal::NewVehicleDetected { name, id },
            PresenceSignal::VehicleConnected(record) => Signal::VehicleConnected(record),
            PresenceSignal::VehicleDisconnected(record) => Signal::VehicleDisconnected(record),
            PresenceSignal::Status(status) => Signal::Status(status),
        }
    }
}
