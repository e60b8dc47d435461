//! Offline Shelf Example
//!
//! Two devices share an in-memory remote. The shop device keeps working
//! while its pushes fail, then both converge after a manual sync.
//!
//! Run with: cargo run --example offline

use std::sync::Arc;
use std::time::Duration;

use shelf_core::{ItemDraft, TxKind};
use shelf_storage::MemoryStore;
use shelf_sync::{Replica, SyncConfig};
use shelf_transport::{GatewayError, MemoryGateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("Shelf Offline Example\n");

    let remote = Arc::new(MemoryGateway::new().with_key("demo"));
    let config = SyncConfig::new()
        .with_endpoint("memory://demo")
        .with_key("demo")
        .with_debounce(Duration::from_millis(200));

    let shop = Replica::open(Arc::new(MemoryStore::new()), remote.clone(), config.clone()).await?;
    let office = Replica::open(Arc::new(MemoryStore::new()), remote.clone(), config).await?;

    println!("=== Shop goes offline ===\n");
    remote.fail_next_push(GatewayError::transport("no network"));
    remote.fail_next_push(GatewayError::transport("no network"));

    shop.upsert_item(ItemDraft::new("A1", "Widget").stock_init(10.0).prices(2.0, 4.5))
        .await?;
    shop.assign_barcode("8001234567890", "A1").await?;
    let sale = shop
        .record_scan("8001234567890", TxKind::Out, 3.0, 4.5)
        .await?;
    println!("Sold 3 x A1 ({}), stock now {}", sale.id, shop.stock_of("A1").await);

    // Debounce plus one retry
    tokio::time::sleep(Duration::from_secs(2)).await;
    if let Some(failure) = shop.status().last_error {
        println!("Push failed, edits kept locally: {}", failure);
    }

    println!("\n=== Back online ===\n");
    let report = shop.sync_now().await;
    println!("push: {}, pull: {}", report.push.label(), report.pull.label());

    office.pull_now().await;
    office.confirm_transaction(&sale.id, Some(4.0)).await?;
    office.flush().await;

    shop.pull_now().await;
    let confirmed = shop.snapshot().await.transaction(&sale.id).cloned();
    println!(
        "Shop sees the sale as confirmed: {}",
        confirmed.map(|tx| tx.confirmed).unwrap_or(false)
    );
    println!("Low stock: {:?}", office.low_stock(8.0).await);
    println!("Remote pushes: {}, pulls: {}", remote.push_count(), remote.pull_count());

    Ok(())
}
