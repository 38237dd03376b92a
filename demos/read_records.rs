//! Download stored glucose records from the first meter found.
//!
//! Run with: cargo run --example read_records
//!
//! Options:
//!   --delete   delete the records on the meter after downloading them
//!
//! The meter must already be bonded with this host.

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Manager, Peripheral};
use glucose_rust_ble::ble::GLUCOSE_SERVICE_UUID;
use glucose_rust_ble::{CharacteristicHandler, GlucoseService};
use std::sync::Arc;
use std::time::Duration;

type DemoResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

async fn find_meter() -> DemoResult<Peripheral> {
    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or("no Bluetooth adapter found")?;

    adapter
        .start_scan(ScanFilter {
            services: vec![GLUCOSE_SERVICE_UUID],
        })
        .await?;
    tokio::time::sleep(Duration::from_secs(5)).await;
    adapter.stop_scan().await?;

    adapter
        .peripherals()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| "no glucose meter found".into())
}

#[tokio::main]
async fn main() -> DemoResult<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("glucose_rust_ble=info".parse()?),
        )
        .init();

    let delete = std::env::args().any(|arg| arg == "--delete");

    println!("Looking for a glucose meter...");
    let peripheral = find_meter().await?;
    peripheral.connect().await?;
    println!("Connected to {}", peripheral.id());

    let handler = CharacteristicHandler::new(peripheral.clone());
    handler.discover_characteristics().await?;

    let service = GlucoseService::open(Arc::new(handler)).await?;
    println!("Meter holds {} records\n", service.record_count().await?);

    let measurements = service.read_all_measurements().await?;
    println!("{:>6}  {:<23}  {:>10}  {:<8}  context", "seq", "time", "mg/dL", "sample");
    for m in &measurements {
        let mg_dl = m
            .concentration_mg_dl()
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "-".to_string());
        let sample = m
            .sample_type
            .map(|t| format!("{:?}", t))
            .unwrap_or_else(|| "-".to_string());
        let meal = m
            .context
            .as_ref()
            .and_then(|c| c.meal)
            .map(|meal| format!("{:?}", meal))
            .unwrap_or_default();
        println!(
            "{:>6}  {:<23}  {:>10}  {:<8}  {}",
            m.sequence_number,
            m.capture_time.to_string(),
            mg_dl,
            sample,
            meal
        );
    }

    if delete {
        let outcome = service.delete_all_measurements().await?;
        println!("\nDelete all records: {:?}", outcome);
    }

    service.shutdown().await?;
    peripheral.disconnect().await?;
    Ok(())
}
