mod config;

use bridge_runner::Runner;
use common::nats::NatsClient;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use config::ServiceConfig;
use room_bridge_worker::RoomBridgeWorker;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        "Starting room-bridge-all-in-one service"
    );
    debug!("Configuration: {:?}", config);

    let worker_config = match config.worker_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Invalid worker configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let nats_client = match initialize_nats(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize NATS: {:#}", e);
            std::process::exit(1);
        }
    };

    let worker = match RoomBridgeWorker::new(Arc::clone(&nats_client), worker_config).await {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to initialize room bridge worker: {:#}", e);
            std::process::exit(1);
        }
    };

    let mut runner = Runner::new();
    for (i, process) in worker.into_runner_processes().into_iter().enumerate() {
        runner = runner.with_named_process(format!("room_bridge_worker_{}", i), process);
    }

    runner = runner
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            // The worker only borrows the client while it is being built
            match Arc::try_unwrap(nats_client) {
                Ok(client) => client.close().await,
                Err(_) => debug!("NATS client still shared, skipping flush"),
            }

            shutdown_telemetry(telemetry_providers);

            info!("Cleanup complete");
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}

async fn initialize_nats(config: &ServiceConfig) -> anyhow::Result<Arc<NatsClient>> {
    info!("Initializing NATS...");
    let nats_client = NatsClient::connect(
        &config.nats_url,
        Duration::from_secs(config.startup_timeout_secs),
    )
    .await?;

    nats_client
        .ensure_stream(&config.room_events_stream, "Matrix room event batches")
        .await?;
    nats_client
        .ensure_stream(&config.bundles_stream, "Packaged clinical resource envelopes")
        .await?;

    Ok(Arc::new(nats_client))
}
