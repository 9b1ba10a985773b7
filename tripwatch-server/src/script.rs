//! Event scripts
//!
//! A script is a JSON-lines file. Each line is one thing that happens on the
//! phone: the adapter powers on, a device connects, a GPS fix arrives, the
//! user registers a car. Blank lines and `#` comments are skipped.
//!
//! ```text
//! # rental pickup
//! {"type":"clock","timestamp":1700000000000}
//! {"type":"bonded","devices":[{"address":"00:11:22:33:44:55","name":"SYNC"}]}
//! {"type":"profileState","profile":"a2dp","address":"00:11:22:33:44:55","state":"connected"}
//! {"type":"register","address":"00:11:22:33:44:55","name":"SYNC","vehicleType":"RENTAL"}
//! {"type":"location","latitude":37.0,"longitude":-122.0,"speedMps":13.4,"accuracy":5.0,"timestamp":1700000005000}
//! ```
//!
//! Some lines only change what the platform reports (`bonded`, `permission`,
//! `profileState`, `clock`); the rest also become an engine event.

use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio_graceful_shutdown::SubsystemHandle;

use tripwatch_core::engine::{BluetoothEvent, EngineEvent, LocationEvent, UserAction};
use tripwatch_core::platform::{BluetoothDevice, Platform, Profile, ProfileState};
use tripwatch_core::trip::LocationSample;
use tripwatch_core::vehicle::VehicleType;

use crate::platform::ScriptedPlatform;
use crate::service::Command;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptDevice {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ScriptEvent {
    Adapter {
        powered_on: bool,
    },
    Permission {
        #[serde(default)]
        bluetooth: Option<bool>,
        #[serde(default)]
        location: Option<bool>,
    },
    Bonded {
        devices: Vec<ScriptDevice>,
    },
    Found {
        address: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        bonded: bool,
    },
    AclConnected {
        address: String,
    },
    AclDisconnected {
        address: String,
    },
    ProfileProxy {
        profile: Profile,
        available: bool,
    },
    ProfileState {
        profile: Profile,
        address: String,
        state: ProfileState,
    },
    Location {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        speed_mps: f64,
        accuracy: f64,
        /// Platform clock if absent
        #[serde(default)]
        timestamp: Option<u64>,
    },
    Provider {
        enabled: bool,
    },
    Register {
        address: String,
        name: String,
        vehicle_type: VehicleType,
    },
    Unregister {
        address: String,
    },
    AutoDetect {
        enabled: bool,
    },
    Clock {
        timestamp: u64,
    },
}

/// Parse one script line. Returns None for blank and comment lines.
pub fn parse_line(line_number: usize, line: &str) -> Result<Option<ScriptEvent>, ScriptError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|source| ScriptError::Malformed {
            line: line_number,
            source,
        })
}

/// Script reader subsystem.
///
/// Feeds every parsed line to the engine task in order. Malformed lines are
/// logged and skipped. At the end of the script it waits until the engine
/// has handled everything sent so far, then requests shutdown unless
/// `follow` is set.
pub async fn read_script(
    source: Option<PathBuf>,
    commands: mpsc::Sender<Command>,
    follow: bool,
    subsys: SubsystemHandle,
) -> anyhow::Result<()> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &source {
        Some(path) => {
            let file = File::open(path)
                .await
                .with_context(|| format!("Cannot open script {}", path.display()))?;
            log::info!("Replaying {}", path.display());
            Box::new(BufReader::new(file))
        }
        None => {
            log::info!("Reading events from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
    };

    let mut lines = reader.lines();
    let mut line_number = 0;
    let mut sent = 0;
    loop {
        let line = tokio::select! {
            _ = subsys.on_shutdown_requested() => return Ok(()),
            line = lines.next_line() => line.context("Cannot read script")?,
        };
        let line = match line {
            Some(line) => line,
            None => break,
        };
        line_number += 1;

        match parse_line(line_number, &line) {
            Ok(Some(event)) => {
                if commands.send(Command::Script(event)).await.is_err() {
                    log::debug!("script: engine has stopped");
                    return Ok(());
                }
                sent += 1;
            }
            Ok(None) => {}
            Err(e) => log::warn!("Skipping script {}", e),
        }
    }

    // Queue is FIFO, so the reply means every event above has been handled
    let (tx, rx) = oneshot::channel();
    if commands.send(Command::Status(tx)).await.is_ok() {
        if let Ok(status) = rx.await {
            log::info!(
                "Script done: {} events from {} lines, {} trips recorded",
                sent,
                line_number,
                status.completed_trips
            );
        }
    }

    if !follow {
        subsys.request_shutdown();
    }
    Ok(())
}

impl ScriptEvent {
    /// Update the platform for this event and return what the engine
    /// should see, if anything.
    pub fn apply(self, platform: &mut ScriptedPlatform) -> Option<EngineEvent> {
        match self {
            ScriptEvent::Adapter { powered_on } => {
                platform.set_adapter_enabled(powered_on);
                Some(EngineEvent::Bluetooth(BluetoothEvent::AdapterStateChanged {
                    powered_on,
                }))
            }
            ScriptEvent::Permission {
                bluetooth,
                location,
            } => {
                if let Some(granted) = bluetooth {
                    platform.set_bluetooth_granted(granted);
                }
                if let Some(granted) = location {
                    platform.set_location_granted(granted);
                }
                None
            }
            ScriptEvent::Bonded { devices } => {
                platform.set_bonded(
                    devices
                        .iter()
                        .map(|d| BluetoothDevice::new(&d.address, d.name.as_deref(), true))
                        .collect(),
                );
                None
            }
            ScriptEvent::Found {
                address,
                name,
                bonded,
            } => {
                let mut device = platform.device(&address, name.as_deref());
                device.bonded |= bonded;
                if device.name.is_none() {
                    device.name = name;
                }
                Some(EngineEvent::Bluetooth(BluetoothEvent::DeviceFound(device)))
            }
            ScriptEvent::AclConnected { address } => {
                let device = platform.device(&address, None);
                Some(EngineEvent::Bluetooth(BluetoothEvent::AclConnected(device)))
            }
            ScriptEvent::AclDisconnected { address } => {
                Some(EngineEvent::Bluetooth(BluetoothEvent::AclDisconnected {
                    address,
                }))
            }
            ScriptEvent::ProfileProxy { profile, available } => {
                platform.set_profile_available(profile, available);
                None
            }
            ScriptEvent::ProfileState {
                profile,
                address,
                state,
            } => {
                platform.set_profile_state(profile, &address, state);
                None
            }
            ScriptEvent::Location {
                latitude,
                longitude,
                speed_mps,
                accuracy,
                timestamp,
            } => {
                let timestamp = timestamp.unwrap_or_else(|| platform.current_time_ms());
                platform.advance_clock(timestamp);
                if !platform.is_tracking() {
                    log::trace!("No location subscription, dropping fix at {}", timestamp);
                    return None;
                }
                let sample =
                    LocationSample::from_mps(latitude, longitude, speed_mps, timestamp, accuracy);
                Some(EngineEvent::Location(LocationEvent::Fix(sample)))
            }
            ScriptEvent::Provider { enabled } => Some(EngineEvent::Location(if enabled {
                LocationEvent::ProviderEnabled
            } else {
                LocationEvent::ProviderDisabled
            })),
            ScriptEvent::Register {
                address,
                name,
                vehicle_type,
            } => Some(EngineEvent::User(UserAction::RegisterVehicle {
                id: address,
                name,
                vehicle_type,
            })),
            ScriptEvent::Unregister { address } => {
                Some(EngineEvent::User(UserAction::UnregisterVehicle { id: address }))
            }
            ScriptEvent::AutoDetect { enabled } => {
                Some(EngineEvent::User(UserAction::SetAutoDetection(enabled)))
            }
            ScriptEvent::Clock { timestamp } => {
                platform.set_clock(timestamp);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ScriptEvent {
        parse_line(1, line).unwrap().unwrap()
    }

    #[test]
    fn test_skips_blank_and_comments() {
        assert!(parse_line(1, "").unwrap().is_none());
        assert!(parse_line(2, "   ").unwrap().is_none());
        assert!(parse_line(3, "# comment").unwrap().is_none());
    }

    #[test]
    fn test_malformed_reports_line() {
        let err = parse_line(7, r#"{"type":"warp"}"#).unwrap_err();
        assert!(err.to_string().starts_with("line 7:"));
        assert!(parse_line(8, "{not json").is_err());
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(
            parse(r#"{"type":"adapter","poweredOn":false}"#),
            ScriptEvent::Adapter { powered_on: false }
        );
        assert_eq!(
            parse(r#"{"type":"profileState","profile":"headset","address":"AA","state":"connected"}"#),
            ScriptEvent::ProfileState {
                profile: Profile::Headset,
                address: "AA".to_string(),
                state: ProfileState::Connected,
            }
        );
        assert_eq!(
            parse(r#"{"type":"register","address":"AA","name":"SYNC","vehicleType":"BORROWED"}"#),
            ScriptEvent::Register {
                address: "AA".to_string(),
                name: "SYNC".to_string(),
                vehicle_type: VehicleType::Borrowed,
            }
        );
        assert_eq!(
            parse(r#"{"type":"permission","location":false}"#),
            ScriptEvent::Permission {
                bluetooth: None,
                location: Some(false),
            }
        );
    }

    #[test]
    fn test_platform_only_events() {
        let mut platform = ScriptedPlatform::new();

        let bonded = parse(r#"{"type":"bonded","devices":[{"address":"AA","name":"SYNC"}]}"#);
        assert!(bonded.apply(&mut platform).is_none());
        assert!(platform.bonded_device("AA").is_some());

        let clock = parse(r#"{"type":"clock","timestamp":42}"#);
        assert!(clock.apply(&mut platform).is_none());
        assert_eq!(platform.current_time_ms(), 42);
    }

    #[test]
    fn test_acl_connected_uses_bond() {
        let mut platform = ScriptedPlatform::new();
        parse(r#"{"type":"bonded","devices":[{"address":"AA","name":"SYNC"}]}"#)
            .apply(&mut platform);

        match parse(r#"{"type":"aclConnected","address":"AA"}"#).apply(&mut platform) {
            Some(EngineEvent::Bluetooth(BluetoothEvent::AclConnected(device))) => {
                assert!(device.bonded);
                assert_eq!(device.name.as_deref(), Some("SYNC"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_location_needs_subscription() {
        let mut platform = ScriptedPlatform::new();
        let line = r#"{"type":"location","latitude":37.0,"longitude":-122.0,"speedMps":10.0,"accuracy":5.0,"timestamp":5000}"#;

        assert!(parse(line).apply(&mut platform).is_none());
        assert_eq!(platform.current_time_ms(), 5_000);

        platform.start_location_updates(5_000, 10.0).unwrap();
        match parse(line).apply(&mut platform) {
            Some(EngineEvent::Location(LocationEvent::Fix(sample))) => {
                assert!((sample.speed_mph - 22.3694).abs() < 1e-9);
                assert_eq!(sample.timestamp, 5_000);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
