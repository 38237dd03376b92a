//! BLE Service and Characteristic UUIDs.
//!
//! All UUIDs used here are 16-bit assigned numbers expanded on the Bluetooth
//! base UUID `0000xxxx-0000-1000-8000-00805f9b34fb`.

use uuid::Uuid;

/// Expand a 16-bit assigned number on the Bluetooth base UUID.
pub const fn from_short(short: u16) -> Uuid {
    Uuid::from_u128(0x0000_0000_0000_1000_8000_00805f9b34fb | ((short as u128) << 96))
}

// Glucose Service
/// Glucose Service UUID.
pub const GLUCOSE_SERVICE_UUID: Uuid = from_short(0x1808);
/// Glucose Measurement characteristic UUID (Notify).
pub const GLUCOSE_MEASUREMENT_UUID: Uuid = from_short(0x2a18);
/// Glucose Measurement Context characteristic UUID (Notify).
pub const GLUCOSE_MEASUREMENT_CONTEXT_UUID: Uuid = from_short(0x2a34);
/// Record Access Control Point characteristic UUID (Write, Indicate).
pub const RECORD_ACCESS_CONTROL_POINT_UUID: Uuid = from_short(0x2a52);

// Device Information Service (Standard BLE)
/// Standard BLE Device Information Service UUID.
pub const DEVICE_INFO_SERVICE_UUID: Uuid = from_short(0x180a);
/// System ID characteristic UUID.
pub const SYSTEM_ID_UUID: Uuid = from_short(0x2a23);
/// Model Number characteristic UUID.
pub const MODEL_NUMBER_UUID: Uuid = from_short(0x2a24);
/// Serial Number characteristic UUID.
pub const SERIAL_NUMBER_UUID: Uuid = from_short(0x2a25);
/// Firmware Revision characteristic UUID.
pub const FIRMWARE_REVISION_UUID: Uuid = from_short(0x2a26);
/// Hardware Revision characteristic UUID.
pub const HARDWARE_REVISION_UUID: Uuid = from_short(0x2a27);
/// Software Revision characteristic UUID.
pub const SOFTWARE_REVISION_UUID: Uuid = from_short(0x2a28);
/// Manufacturer Name characteristic UUID.
pub const MANUFACTURER_NAME_UUID: Uuid = from_short(0x2a29);
/// IEEE 11073-20601 Regulatory Certification Data List characteristic UUID.
pub const REGULATORY_CERT_DATA_LIST_UUID: Uuid = from_short(0x2a2a);
/// PnP ID characteristic UUID.
pub const PNP_ID_UUID: Uuid = from_short(0x2a50);

// Current Time Service
/// Current Time Service UUID.
pub const CURRENT_TIME_SERVICE_UUID: Uuid = from_short(0x1805);
/// Current Time characteristic UUID (Read, Write, Notify).
pub const CURRENT_TIME_UUID: Uuid = from_short(0x2a2b);

/// Check if a service UUID is the Glucose service.
pub fn is_glucose_service(uuid: &Uuid) -> bool {
    *uuid == GLUCOSE_SERVICE_UUID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            GLUCOSE_SERVICE_UUID.to_string(),
            "00001808-0000-1000-8000-00805f9b34fb"
        );
        assert!(RECORD_ACCESS_CONTROL_POINT_UUID.to_string().starts_with("00002a52"));
        assert!(CURRENT_TIME_UUID.to_string().starts_with("00002a2b"));
    }

    #[test]
    fn test_from_short() {
        assert_eq!(
            GLUCOSE_MEASUREMENT_CONTEXT_UUID,
            Uuid::parse_str("00002a34-0000-1000-8000-00805f9b34fb").unwrap()
        );
        assert_eq!(PNP_ID_UUID.to_string(), "00002a50-0000-1000-8000-00805f9b34fb");
        assert_eq!(from_short(0xffff).to_string(), "0000ffff-0000-1000-8000-00805f9b34fb");
    }

    #[test]
    fn test_is_glucose_service() {
        assert!(is_glucose_service(&GLUCOSE_SERVICE_UUID));
        assert!(!is_glucose_service(&DEVICE_INFO_SERVICE_UUID));
    }
}
