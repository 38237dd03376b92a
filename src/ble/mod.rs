//! BLE communication module.
//!
//! This module provides the GATT transport seam used by the profile clients
//! and its implementation over an already-connected `btleplug` peripheral.

pub mod characteristics;
pub mod transport;
pub mod uuids;

pub use characteristics::CharacteristicHandler;
pub use transport::{GattTransport, NotificationEvent};
pub use uuids::*;
