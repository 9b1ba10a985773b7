//! Tripwatch Server
//!
//! Tokio host for [`tripwatch_core::TripEngine`]. The engine runs on one task
//! that owns it together with the platform; everything else talks to that
//! task over channels.
//!
//! - **config**: command line and the engine configuration built from it
//! - **storage**: data directory, registry and trip files, background writer
//! - **platform**: [`platform::ScriptedPlatform`], the `Platform` this host provides
//! - **script**: JSON-lines event scripts that drive the platform
//! - **service**: the engine task and its command and signal channels

pub mod config;
pub mod platform;
pub mod script;
pub mod service;
pub mod storage;

pub use config::Cli;
pub use platform::ScriptedPlatform;
pub use script::{ScriptError, ScriptEvent};
pub use service::{Command, EngineService, EngineStatus};
pub use storage::{DataDir, FileRegistryStore, StorageError, StorageWriter, TripLog, WriteQueue};
