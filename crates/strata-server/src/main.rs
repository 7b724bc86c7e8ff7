//! The binary entry point for the Strata chunk registry server.

mod journal;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use strata_config::{CliArgs, Config, default_config_dir};
use strata_registry::{ChunkRegistry, OwnershipChangeKind, RegistryService, TokioClock};

use crate::journal::JournalSink;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    let mut config = match Config::load_or_create(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}; using defaults", config_dir.display());
            Config::default()
        }
    };
    config.apply_cli_overrides(&args);
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("strata");
    strata_log::init_logging(
        Some(&data_dir.join("logs")),
        cfg!(debug_assertions),
        Some(&config),
    );
    tracing::info!(config_dir = %config_dir.display(), data_dir = %data_dir.display(), "strata server starting");

    let sink = match JournalSink::open(&data_dir) {
        Ok(sink) => {
            tracing::info!(journal = %sink.path().display(), "persisting dirty entities");
            Arc::new(sink)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to open entity journal");
            std::process::exit(1);
        }
    };

    let mut registry = ChunkRegistry::with_clock(config.registry.clone(), Arc::new(TokioClock::new()));
    registry.on_ownership_change(|event| match event.kind {
        OwnershipChangeKind::Handoff | OwnershipChangeKind::Claim => {
            tracing::debug!(entity = %event.entity_id, from = ?event.from_chunk, to = ?event.to_chunk, kind = ?event.kind, "ownership change");
        }
        OwnershipChangeKind::Release => {
            tracing::debug!(entity = %event.entity_id, from = ?event.from_chunk, "entity released");
        }
    });
    let service = RegistryService::new(registry);

    let server = &config.server;
    let tasks = [
        service.spawn_cooling_sweep(Duration::from_millis(server.cooling_sweep_interval_ms)),
        service.spawn_persistence(Arc::clone(&sink), Duration::from_millis(server.persistence_interval_ms)),
        service.spawn_stats_reporter(Duration::from_millis(server.stats_interval_ms)),
    ];

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");

    for task in &tasks {
        task.abort();
    }
    let report = service.flush_dirty(&sink).await;
    tracing::info!(
        chunks = report.chunks_written,
        entities = report.entities_written,
        failed = report.chunks_failed,
        "final flush complete"
    );
}
