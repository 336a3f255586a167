use actix::prelude::*;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aggregate_store::actors::{Deactivate, Deliver, GetStatus, Pickup, ShipmentActor, ShipmentActorError};
use aggregate_store::config::AdapterConfig;
use aggregate_store::domain::shipment::ShipmentState;
use aggregate_store::event_sourcing::{AggregateAdapter, StorageContext};

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,aggregate_store=debug"))
        )
        .init();

    tracing::info!("🚀 Starting shipment event store demo");

    // === 1. Configuration and storage backends ===
    let config = AdapterConfig::from_env()?;
    tracing::info!(
        backend = ?config.backend,
        snapshot_threshold = config.snapshot_threshold,
        compaction = ?config.compaction,
        "Loaded configuration"
    );

    let context = Arc::new(StorageContext::connect(config).await?);
    let adapter = Arc::new(AggregateAdapter::<ShipmentState>::new(context.clone()));

    // === 2. Host one shipment ===
    let shipment_id = uuid::Uuid::now_v7().to_string();
    let shipment = ShipmentActor::new(shipment_id.clone(), adapter.clone()).start();

    let (version, state) = shipment.send(GetStatus).await??;
    tracing::info!(%shipment_id, version, status = ?state.status, "📦 Shipment activated");

    // === 3. Lifecycle ===
    let state = shipment.send(Pickup).await??;
    tracing::info!(%shipment_id, status = ?state.status, "✅ Picked up");

    let state = shipment.send(Deliver).await??;
    tracing::info!(%shipment_id, status = ?state.status, "✅ Delivered");

    match shipment.send(Deliver).await? {
        Err(ShipmentActorError::Rejected(e)) => {
            tracing::info!(%shipment_id, error = %e, "Second delivery rejected as expected")
        }
        other => tracing::warn!(%shipment_id, result = ?other, "Second delivery was not rejected"),
    }

    // === 4. Reload from storage ===
    shipment.send(Deactivate).await?;
    let (version, state) = shipment.send(GetStatus).await??;
    tracing::info!(%shipment_id, version, status = ?state.status, "🔁 Reloaded from the log");

    // === 5. Drain background snapshot writes ===
    let drained = context.shutdown().await;
    tracing::info!(drained, "Background snapshot writes drained");

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&context.metrics().registry().gather(), &mut buffer)?;
    tracing::info!("📊 Metrics:\n{}", String::from_utf8_lossy(&buffer));

    tracing::info!("🎉 Demo complete!");

    Ok(())
}
