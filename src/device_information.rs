//! Device Information Service reader.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ble::transport::GattTransport;
use crate::ble::uuids::*;
use crate::data::device_info::{DeviceInformation, PnpId, SystemId};
use crate::error::{Error, Result};
use crate::protocol::attribute_stream::{AttributeCodec, AttributeStream};

/// Reads the Device Information Service of a connected meter.
pub struct DeviceInformationService {
    transport: Arc<dyn GattTransport>,
}

impl DeviceInformationService {
    /// Create a reader over `transport`.
    pub fn new(transport: Arc<dyn GattTransport>) -> Self {
        Self { transport }
    }

    async fn read_stream(&self, uuid: &Uuid) -> Result<AttributeStream> {
        let stream = AttributeStream::from_bytes(self.transport.read(uuid).await?);
        debug!("Read from {}: {}", uuid, stream);
        Ok(stream)
    }

    /// Invalid UTF-8 is replaced with U+FFFD rather than failing the read.
    async fn read_string(&self, uuid: &Uuid) -> Result<String> {
        let raw = self.read_stream(uuid).await?.read_remaining();
        let text = match String::from_utf8(raw) {
            Ok(text) => text,
            Err(e) => {
                warn!("{} is not valid UTF-8: {}", uuid, e.utf8_error());
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Ok(text.trim_end_matches('\0').to_string())
    }

    /// Read the System ID.
    pub async fn read_system_id(&self) -> Result<SystemId> {
        SystemId::decode(&mut self.read_stream(&SYSTEM_ID_UUID).await?)
    }

    /// Read the model number.
    pub async fn read_model_number(&self) -> Result<String> {
        self.read_string(&MODEL_NUMBER_UUID).await
    }

    /// Read the serial number.
    pub async fn read_serial_number(&self) -> Result<String> {
        self.read_string(&SERIAL_NUMBER_UUID).await
    }

    /// Read the firmware revision.
    pub async fn read_firmware_revision(&self) -> Result<String> {
        self.read_string(&FIRMWARE_REVISION_UUID).await
    }

    /// Read the hardware revision.
    pub async fn read_hardware_revision(&self) -> Result<String> {
        self.read_string(&HARDWARE_REVISION_UUID).await
    }

    /// Read the software revision.
    pub async fn read_software_revision(&self) -> Result<String> {
        self.read_string(&SOFTWARE_REVISION_UUID).await
    }

    /// Read the manufacturer name.
    pub async fn read_manufacturer_name(&self) -> Result<String> {
        self.read_string(&MANUFACTURER_NAME_UUID).await
    }

    /// Read the raw IEEE 11073-20601 regulatory certification data list.
    pub async fn read_regulatory_cert_data_list(&self) -> Result<Vec<u8>> {
        Ok(self.read_stream(&REGULATORY_CERT_DATA_LIST_UUID).await?.read_remaining())
    }

    /// Read the PnP ID.
    pub async fn read_pnp_id(&self) -> Result<PnpId> {
        PnpId::decode(&mut self.read_stream(&PNP_ID_UUID).await?)
    }

    /// Read every characteristic of the service.
    ///
    /// Characteristics the meter does not expose are left as `None`; any
    /// other failure aborts the read.
    pub async fn read_all(&self) -> Result<DeviceInformation> {
        let info = DeviceInformation {
            system_id: optional(self.read_system_id().await)?,
            model_number: optional(self.read_model_number().await)?,
            serial_number: optional(self.read_serial_number().await)?,
            firmware_revision: optional(self.read_firmware_revision().await)?,
            hardware_revision: optional(self.read_hardware_revision().await)?,
            software_revision: optional(self.read_software_revision().await)?,
            manufacturer_name: optional(self.read_manufacturer_name().await)?,
            regulatory_cert_data_list: optional(self.read_regulatory_cert_data_list().await)?,
            pnp_id: optional(self.read_pnp_id().await)?,
        };

        info!(
            "Device information: {} {} (serial {})",
            info.manufacturer_name.as_deref().unwrap_or("?"),
            info.model_number.as_deref().unwrap_or("?"),
            info.serial_number.as_deref().unwrap_or("?")
        );

        Ok(info)
    }
}

fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(Error::CharacteristicNotFound { uuid }) => {
            debug!("Characteristic {} not present", uuid);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
