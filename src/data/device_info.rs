//! Device Information Service data structures.

use std::fmt;

use crate::error::Result;
use crate::protocol::attribute_stream::{AttributeCodec, AttributeStream};

/// Organisation that assigned the PnP vendor id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VendorIdSource {
    /// Bluetooth SIG assigned company identifier.
    BluetoothSig,
    /// USB Implementer's Forum assigned vendor id.
    UsbImplementersForum,
    /// Reserved value.
    Reserved(u8),
}

impl VendorIdSource {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Self {
        match value {
            1 => Self::BluetoothSig,
            2 => Self::UsbImplementersForum,
            other => Self::Reserved(other),
        }
    }
}

impl fmt::Display for VendorIdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BluetoothSig => write!(f, "Bluetooth SIG"),
            Self::UsbImplementersForum => write!(f, "USB Implementer's Forum"),
            Self::Reserved(value) => write!(f, "Reserved ({})", value),
        }
    }
}

/// PnP ID characteristic (0x2A50).
///
/// Format: VendorIdSource(1) + VendorId(2) + ProductId(2) + ProductVersion(2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PnpId {
    /// Who assigned the vendor id.
    pub vendor_id_source: VendorIdSource,
    /// Vendor id.
    pub vendor_id: u16,
    /// Product id.
    pub product_id: u16,
    /// Product version.
    pub product_version: u16,
}

impl AttributeCodec for PnpId {
    fn decode(stream: &mut AttributeStream) -> Result<Self> {
        Ok(Self {
            vendor_id_source: VendorIdSource::from_raw(stream.read_u8()?),
            vendor_id: stream.read_u16()?,
            product_id: stream.read_u16()?,
            product_version: stream.read_u16()?,
        })
    }
}

/// System ID characteristic (0x2A23).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SystemId(pub u64);

impl SystemId {
    /// Manufacturer-defined identifier (lower 40 bits).
    pub fn manufacturer_identifier(&self) -> u64 {
        self.0 & 0x00FF_FFFF_FFFF
    }

    /// Organizationally unique identifier (upper 24 bits).
    pub fn organizationally_unique_identifier(&self) -> u32 {
        (self.0 >> 40) as u32
    }
}

impl AttributeCodec for SystemId {
    fn decode(stream: &mut AttributeStream) -> Result<Self> {
        Ok(Self(stream.read_u64()?))
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Everything read from the Device Information Service.
///
/// Fields the meter does not expose are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInformation {
    /// System ID.
    pub system_id: Option<SystemId>,
    /// Model number string.
    pub model_number: Option<String>,
    /// Serial number string.
    pub serial_number: Option<String>,
    /// Firmware revision string.
    pub firmware_revision: Option<String>,
    /// Hardware revision string.
    pub hardware_revision: Option<String>,
    /// Software revision string.
    pub software_revision: Option<String>,
    /// Manufacturer name string.
    pub manufacturer_name: Option<String>,
    /// IEEE 11073-20601 regulatory certification data list, undecoded.
    pub regulatory_cert_data_list: Option<Vec<u8>>,
    /// PnP ID.
    pub pnp_id: Option<PnpId>,
}
