use std::sync::Arc;

use eventlog::config::{build_driver, AppConfig};
use eventlog::domain::order::{register_payloads, OrderCommand, OrderCommandHandler, OrderItem};
use eventlog::event_sourcing::{Aggregate, PayloadRegistry, Store, StreamReader};
use eventlog::telemetry;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter, e.g. RUST_LOG=debug cargo run
    telemetry::init_tracing("info,eventlog=debug")?;

    let config_path = std::env::args().nth(1);
    let config = AppConfig::load(config_path.as_deref())?;

    tracing::info!(backend = ?config.backend, "Starting event log demo");

    // === 1. Register payload types ===
    let mut registry = PayloadRegistry::new();
    register_payloads(&mut registry)?;
    let registry = Arc::new(registry);

    // === 2. Build driver chain and store ===
    let driver = build_driver(&config, registry).await?;
    let handler = OrderCommandHandler::new(Store::new(driver.clone()));

    // === 3. Run an order through its lifecycle ===
    let order_id = Uuid::now_v7().to_string();

    handler
        .handle(
            &order_id,
            OrderCommand::CreateOrder {
                customer_id: Uuid::new_v4(),
                items: vec![
                    OrderItem::new(Uuid::new_v4(), 2),
                    OrderItem::new(Uuid::new_v4(), 1),
                ],
            },
        )
        .await?;
    tracing::info!(order_id = %order_id, "Order created");

    handler
        .handle(
            &order_id,
            OrderCommand::UpdateItems {
                items: vec![OrderItem::new(Uuid::new_v4(), 5)],
                reason: Some("Customer changed basket".to_string()),
            },
        )
        .await?;
    handler.handle(&order_id, OrderCommand::ConfirmOrder).await?;
    handler
        .handle(
            &order_id,
            OrderCommand::ShipOrder {
                tracking_number: "TRACK-0001".to_string(),
                carrier: "ACME Freight".to_string(),
            },
        )
        .await?;
    handler
        .handle(
            &order_id,
            OrderCommand::DeliverOrder {
                signature: Some("J. Doe".to_string()),
            },
        )
        .await?;

    // === 4. Rebuild from the log ===
    let order = handler.load(&order_id).await?;
    tracing::info!(
        order_id = %order_id,
        status = ?order.status,
        version = order.version(),
        items = order.items.len(),
        "Order rebuilt from events"
    );

    // A stale create loses against the existing history.
    if let Err(e) = handler
        .handle(
            &order_id,
            OrderCommand::CreateOrder {
                customer_id: Uuid::new_v4(),
                items: vec![OrderItem::new(Uuid::new_v4(), 1)],
            },
        )
        .await
    {
        tracing::info!(error = %e, "Duplicate create rejected");
    }

    // === 5. Tail the global log ===
    let shipped = driver.read_of_types(0, 100, &["OrderShipped".to_string()]).await?;
    let total = driver.read_forward(0, 100).await?.len();
    tracing::info!(total_events = total, shipped_events = shipped.len(), "Read global log");

    tracing::info!("Demo complete");

    Ok(())
}
