//! Print Device Information and Current Time of the first meter found.
//!
//! Run with: cargo run --example device_info
//!
//! Options:
//!   --sync-time   set the meter's clock to local time

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::Manager;
use glucose_rust_ble::ble::GLUCOSE_SERVICE_UUID;
use glucose_rust_ble::{CharacteristicHandler, CurrentTimeService, DeviceInformationService};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,glucose_rust_ble=debug")
        .init();

    let sync_time = std::env::args().any(|arg| arg == "--sync-time");

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

    let peripheral = adapter
        .peripherals()
        .await?
        .into_iter()
        .next()
        .ok_or("no glucose meter found")?;
    peripheral.connect().await?;

    let handler = CharacteristicHandler::new(peripheral.clone());
    handler.discover_characteristics().await?;
    let transport = Arc::new(handler);

    let info = DeviceInformationService::new(transport.clone()).read_all().await?;
    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    println!("System Id:         {}", info.system_id.map(|id| id.to_string()).unwrap_or_default());
    println!("Manufacturer Name: {}", show(&info.manufacturer_name));
    println!("Model Number:      {}", show(&info.model_number));
    println!("Serial Number:     {}", show(&info.serial_number));
    println!("Firmware Revision: {}", show(&info.firmware_revision));
    println!("Hardware Revision: {}", show(&info.hardware_revision));
    println!("Software Revision: {}", show(&info.software_revision));
    if let Some(list) = &info.regulatory_cert_data_list {
        println!("Regulatory Cert.:  {:02X?}", list);
    }
    if let Some(pnp) = info.pnp_id {
        println!(
            "PnP ID:            {} vendor {:#06x} product {:#06x} version {:#06x}",
            pnp.vendor_id_source, pnp.vendor_id, pnp.product_id, pnp.product_version
        );
    }

    let clock = CurrentTimeService::new(transport);
    if sync_time {
        clock.set_time(chrono::Local::now().naive_local()).await?;
    }
    println!("Current Time:      {}", clock.get_time().await?);

    peripheral.disconnect().await?;
    Ok(())
}
