use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::PathBuf;

use tripwatch_core::engine::EngineConfig;
use tripwatch_core::presence::PresenceConfig;
use tripwatch_core::trip::TripConfig;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Event script to replay, one JSON object per line. Reads stdin if absent
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Keep running after the script ends, until interrupted
    #[arg(short, long, default_value_t = false)]
    pub follow: bool,

    /// Directory for vehicles.json and trips.json
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Start with automatic detection switched off
    #[arg(long, default_value_t = false)]
    pub disabled: bool,

    /// Detect trips even when no registered vehicle is connected
    #[arg(long, default_value_t = false)]
    pub arm_without_vehicle: bool,

    /// Do not treat a bonded device as connected when no profile proxy exists
    #[arg(long, default_value_t = false)]
    pub no_bond_fallback: bool,

    /// Do not assume a registered, paired vehicle is connected
    #[arg(long, default_value_t = false)]
    pub no_assume_paired: bool,

    /// Speed (mph) above which a trip starts
    #[arg(long, default_value_t = 8.0)]
    pub start_speed: f64,

    /// Speed (mph) below which a trip stops
    #[arg(long, default_value_t = 3.0)]
    pub stop_speed: f64,

    /// Trips shorter than this many miles are discarded
    #[arg(long, default_value_t = 0.5)]
    pub min_trip_miles: f64,

    /// Trips open longer than this are closed
    #[arg(long, default_value_t = 10)]
    pub max_trip_minutes: u64,

    /// Print every signal as a JSON line on stdout
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        let trip = TripConfig {
            start_speed_mph: self.start_speed,
            stop_speed_mph: self.stop_speed,
            min_trip_distance_miles: self.min_trip_miles,
            max_trip_duration_ms: self.max_trip_minutes * 60 * 1000,
            ..TripConfig::default()
        };
        let presence = PresenceConfig {
            bond_only_without_profiles: !self.no_bond_fallback,
            assume_connected_when_paired: !self.no_assume_paired,
        };

        EngineConfig {
            trip,
            presence,
            arm_without_vehicle: self.arm_without_vehicle,
            ..EngineConfig::default()
        }
    }
}
