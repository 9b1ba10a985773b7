//! The engine task
//!
//! One task owns the engine and the platform. Script events and direct engine
//! events arrive over an mpsc channel and are handled strictly in order;
//! every resulting signal is broadcast to subscribers. Completed trips are
//! appended to the trip log before they are broadcast.

use serde_json::json;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_graceful_shutdown::SubsystemHandle;

use tripwatch_core::engine::{EngineEvent, Signal, TripEngine};
use tripwatch_core::registry::RegistryStore;
use tripwatch_core::trip::TripState;
use tripwatch_core::vehicle::VehicleRecord;

use crate::platform::ScriptedPlatform;
use crate::script::ScriptEvent;
use crate::storage::TripLog;

const COMMAND_QUEUE: usize = 64;
const SIGNAL_QUEUE: usize = 256;

pub enum Command {
    /// Apply to the platform, then hand the resulting event to the engine
    Script(ScriptEvent),
    Event(EngineEvent),
    /// Reply with a snapshot once every earlier command has been handled
    Status(oneshot::Sender<EngineStatus>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub enabled: bool,
    pub tracking: bool,
    pub current_vehicle: Option<VehicleRecord>,
    pub trip_state: TripState,
    pub registered_vehicles: usize,
    pub completed_trips: usize,
}

pub struct EngineService<S: RegistryStore> {
    engine: TripEngine<S>,
    platform: ScriptedPlatform,
    trips: TripLog,
    commands: mpsc::Receiver<Command>,
    signals: broadcast::Sender<Signal>,
    auto_start: bool,
}

impl<S: RegistryStore> EngineService<S> {
    /// Returns the service and the sender for its command queue. With
    /// `auto_start` the engine is enabled as soon as the task runs.
    pub fn new(
        engine: TripEngine<S>,
        platform: ScriptedPlatform,
        trips: TripLog,
        auto_start: bool,
    ) -> (Self, mpsc::Sender<Command>) {
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let (signals, _) = broadcast::channel(SIGNAL_QUEUE);
        (
            EngineService {
                engine,
                platform,
                trips,
                commands,
                signals,
                auto_start,
            },
            command_tx,
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }

    pub fn engine(&self) -> &TripEngine<S> {
        &self.engine
    }

    pub fn platform(&self) -> &ScriptedPlatform {
        &self.platform
    }

    pub fn trips(&self) -> &TripLog {
        &self.trips
    }

    pub async fn run(mut self, subsys: SubsystemHandle) -> anyhow::Result<()> {
        if self.auto_start {
            self.start();
        }

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    log::debug!("engine: shutdown");
                    break;
                },

                command = self.commands.recv() => match command {
                    Some(command) => self.execute(command),
                    None => {
                        log::debug!("engine: all command senders gone, waiting for shutdown");
                        subsys.on_shutdown_requested().await;
                        break;
                    }
                },
            }
        }

        // Close any open trip and release subscriptions before exiting
        self.stop();
        log::info!(
            "Engine stopped, {} trips in the log",
            self.trips.len()
        );
        Ok(())
    }

    pub fn start(&mut self) {
        let signals = self.engine.start(&mut self.platform);
        self.publish(signals);
    }

    pub fn stop(&mut self) {
        let signals = self.engine.stop(&mut self.platform);
        self.publish(signals);
    }

    pub fn execute(&mut self, command: Command) {
        match command {
            Command::Script(event) => {
                if let Some(event) = event.apply(&mut self.platform) {
                    self.dispatch(event);
                }
            }
            Command::Event(event) => self.dispatch(event),
            Command::Status(reply) => {
                if reply.send(self.status()).is_err() {
                    log::debug!("engine: status requester went away");
                }
            }
        }
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            enabled: self.engine.is_enabled(),
            tracking: self.engine.is_tracking(),
            current_vehicle: self.engine.current_vehicle().cloned(),
            trip_state: self.engine.detector().state(),
            registered_vehicles: self.engine.registry().len(),
            completed_trips: self.trips.len(),
        }
    }

    fn dispatch(&mut self, event: EngineEvent) {
        let signals = self.engine.handle(event, &mut self.platform);
        self.publish(signals);
    }

    fn publish(&mut self, signals: Vec<Signal>) {
        for signal in signals {
            if let Signal::TripCompleted { trip, .. } = &signal {
                if let Err(e) = self.trips.append(trip.clone()) {
                    log::error!("Trip {} not saved: {}", trip.id, e);
                }
            }
            // Nobody listening is not an error
            let _ = self.signals.send(signal);
        }
    }
}

fn format_time(ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// One line summary of a signal for the log
pub fn describe(signal: &Signal) -> String {
    match signal {
        Signal::NewVehicleDetected { name, id } => {
            format!("New vehicle detected: '{}' ({})", name, id)
        }
        Signal::VehicleConnected(v) => format!(
            "Vehicle connected: '{}' ({}, {})",
            v.device_name, v.device_id, v.vehicle_type
        ),
        Signal::VehicleDisconnected(v) => {
            format!("Vehicle disconnected: '{}' ({})", v.device_name, v.device_id)
        }
        Signal::TripStarted(candidate) => format!(
            "Trip started at {} ({:.5}, {:.5})",
            format_time(candidate.start_time()),
            candidate.start().latitude,
            candidate.start().longitude
        ),
        Signal::TripCompleted { trip, reason } => format!(
            "Trip completed ({}): {} to {}, {:.2} mi in {} min",
            reason,
            format_time(trip.start_time),
            format_time(trip.end_time),
            trip.distance,
            trip.duration / 60_000
        ),
        Signal::Status(status) => format!("Status: {}", status),
    }
}

/// Machine readable form of a signal, for `--json`
pub fn to_json(signal: &Signal) -> serde_json::Value {
    match signal {
        Signal::NewVehicleDetected { name, id } => {
            json!({ "signal": "newVehicleDetected", "name": name, "id": id })
        }
        Signal::VehicleConnected(v) => json!({ "signal": "vehicleConnected", "vehicle": v }),
        Signal::VehicleDisconnected(v) => {
            json!({ "signal": "vehicleDisconnected", "vehicle": v })
        }
        Signal::TripStarted(candidate) => json!({
            "signal": "tripStarted",
            "start": candidate.start(),
            "method": candidate.method(),
            "category": candidate.category(),
            "vehicleId": candidate.vehicle_id(),
        }),
        Signal::TripCompleted { trip, reason } => json!({
            "signal": "tripCompleted",
            "trip": trip,
            "reason": reason.to_string(),
        }),
        Signal::Status(status) => json!({ "signal": "status", "status": status }),
    }
}

/// Signal sink subsystem. Runs until the engine drops the broadcast sender,
/// so the signals of a stopping engine are still logged.
pub async fn log_signals(
    mut signals: broadcast::Receiver<Signal>,
    json: bool,
    _subsys: SubsystemHandle,
) -> anyhow::Result<()> {
    loop {
        match signals.recv().await {
            Ok(signal) => {
                log::info!("{}", describe(&signal));
                if json {
                    println!("{}", to_json(&signal));
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                log::warn!("Signal log fell behind, {} signals not shown", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    Ok(())
}
