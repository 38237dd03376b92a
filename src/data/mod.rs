//! Data structures for meter records.
//!
//! This module contains the decoded forms of the glucose measurement,
//! measurement context, device information and current time
//! characteristics, plus the in-memory record log.

pub mod context;
pub mod current_time;
pub mod device_info;
pub mod log;
pub mod measurement;

pub use context::{
    Carbohydrate, CarbohydrateId, ContextFlags, ContextRecord, Exercise, GlucoseMeasurementContext,
    Health, Meal, Medication, MedicationId, MedicationUnit, Tester,
};
pub use current_time::{AdjustReason, CurrentTime};
pub use device_info::{DeviceInformation, PnpId, SystemId, VendorIdSource};
pub use log::MeasurementLog;
pub use measurement::{
    GlucoseMeasurement, GlucoseUnit, MeasurementFlags, SampleLocation, SampleType, SensorStatus,
};
