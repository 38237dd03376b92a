// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # glucose-rust-ble
//!
//! A Rust client for the Bluetooth Low Energy **Glucose Profile**: decode
//! stored blood glucose records from a connected meter and drive its
//! Record Access Control Point (RACP).
//!
//! ## Features
//!
//! - **Attribute Codec**: little-endian integers, IEEE-11073 SFLOAT/FLOAT,
//!   date-times and strings
//! - **Glucose Records**: measurements with their optional context records
//! - **RACP**: count, read and delete stored records with bounded waits
//! - **Device Information**: model, serial, revisions, System ID and PnP ID
//! - **Current Time**: read and set the meter's clock
//!
//! The crate does not scan or connect. It works on top of any
//! [`GattTransport`]; [`CharacteristicHandler`] provides one for a connected
//! `btleplug` peripheral.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use glucose_rust_ble::{CharacteristicHandler, GlucoseService, Result};
//!
//! # async fn run(peripheral: btleplug::platform::Peripheral) -> Result<()> {
//! // `peripheral` is already connected
//! let handler = CharacteristicHandler::new(peripheral);
//! handler.discover_characteristics().await?;
//!
//! let service = GlucoseService::open(Arc::new(handler)).await?;
//! println!("{} records stored", service.record_count().await?);
//!
//! for measurement in service.read_all_measurements().await? {
//!     println!(
//!         "#{} {} {:?} {}",
//!         measurement.sequence_number,
//!         measurement.capture_time,
//!         measurement.concentration,
//!         measurement.unit
//!     );
//! }
//!
//! service.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Notes
//!
//! ### Linux
//! Requires BlueZ. Most meters require bonding before the Glucose service
//! can be read.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod current_time;
pub mod data;
pub mod device_information;
pub mod error;
pub mod glucose_service;
pub mod protocol;
pub mod racp_engine;
pub mod utils;

// Re-exports for convenience
pub use ble::{CharacteristicHandler, GattTransport, NotificationEvent};
pub use current_time::CurrentTimeService;
pub use device_information::DeviceInformationService;
pub use error::{Error, Result};
pub use glucose_service::GlucoseService;
pub use racp_engine::{CommandOutcome, RacpConfig, RacpEngine, RacpState};
pub use utils::{mg_dl_to_mmol, mmol_to_mg_dl};

// Re-export commonly used types from submodules
pub use data::{
    AdjustReason, ContextFlags, ContextRecord, CurrentTime, DeviceInformation,
    GlucoseMeasurement, GlucoseMeasurementContext, GlucoseUnit, MeasurementLog, PnpId,
    SampleLocation, SampleType, SensorStatus, SystemId,
};
pub use protocol::{AttributeCodec, AttributeEncode, AttributeStream, Float32, SFloat16};
