//! Current Time Service client.

use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ble::transport::GattTransport;
use crate::ble::uuids::CURRENT_TIME_UUID;
use crate::data::current_time::{AdjustReason, CurrentTime};
use crate::error::Result;
use crate::protocol::attribute_stream::{AttributeCodec, AttributeEncode};

/// Reads and sets the meter's clock.
pub struct CurrentTimeService {
    transport: Arc<dyn GattTransport>,
}

impl CurrentTimeService {
    /// Create a client over `transport`.
    pub fn new(transport: Arc<dyn GattTransport>) -> Self {
        Self { transport }
    }

    /// Read the meter's current time and last adjust reason.
    pub async fn get_time(&self) -> Result<CurrentTime> {
        let data = self.transport.read(&CURRENT_TIME_UUID).await?;
        debug!("Current time: {:02X?}", data);
        CurrentTime::parse(&data)
    }

    /// Set the meter's clock, flagged as a manual time update.
    pub async fn set_time(&self, time: NaiveDateTime) -> Result<()> {
        let data = CurrentTime::new(time, AdjustReason::MANUAL_TIME_UPDATE).to_bytes()?;
        info!("Setting meter time to {}", time);
        self.transport.write_request(&CURRENT_TIME_UUID, &data).await
    }
}
