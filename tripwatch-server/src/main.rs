use anyhow::Context;
use clap::Parser;
use std::time::Duration;
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

use tripwatch_core::TripEngine;
use tripwatch_server::config::Cli;
use tripwatch_server::platform::ScriptedPlatform;
use tripwatch_server::script;
use tripwatch_server::service::{self, EngineService};
use tripwatch_server::storage::{self, DataDir, FileRegistryStore, TripLog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .format_timestamp_millis()
        .init();

    log::info!("Tripwatch {} starting", env!("CARGO_PKG_VERSION"));

    let data_dir = DataDir::resolve(cli.data_dir.clone())?;
    let (writer, queue) = storage::write_queue();

    let engine = TripEngine::new(
        cli.engine_config(),
        FileRegistryStore::new(&data_dir, writer.clone()),
    )
    .context("Cannot load vehicle registry")?;
    log::info!(
        "{} registered vehicles in {}",
        engine.registry().len(),
        data_dir.root().display()
    );
    let trips = TripLog::open(&data_dir, writer)?;

    let (service, commands) =
        EngineService::new(engine, ScriptedPlatform::new(), trips, !cli.disabled);
    let signals = service.subscribe();

    let json = cli.json;
    let follow = cli.follow;
    let script_path = cli.script.clone();

    Toplevel::new(move |s| async move {
        s.start(SubsystemBuilder::new("writer", move |h| queue.run(h)));
        s.start(SubsystemBuilder::new("signals", move |h| {
            service::log_signals(signals, json, h)
        }));
        s.start(SubsystemBuilder::new("engine", move |h| service.run(h)));
        s.start(SubsystemBuilder::new("script", move |h| {
            script::read_script(script_path, commands, follow, h)
        }));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_millis(2000))
    .await
    .map_err(Into::into)
}
