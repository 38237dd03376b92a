//! Current Time Service data structures.

use chrono::NaiveDateTime;
use std::fmt;

use crate::error::Result;
use crate::protocol::attribute_stream::{
    AttributeCodec, AttributeEncode, AttributeStream, DATE_TIME_SIZE,
};

bitflags::bitflags! {
    /// Why the meter's clock was last adjusted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct AdjustReason: u8 {
        /// Manual time update.
        const MANUAL_TIME_UPDATE = 0x01;
        /// External reference time update.
        const EXTERNAL_REFERENCE_TIME_UPDATE = 0x02;
        /// Change of time zone.
        const CHANGE_OF_TIME_ZONE = 0x04;
        /// Change of DST.
        const CHANGE_OF_DST = 0x08;
    }
}

/// Current Time characteristic (0x2A2B).
///
/// Format: DateTime(7) + DayOfWeek(1) + Fractions256(1) + AdjustReason(1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurrentTime {
    /// Local time on the meter.
    pub time: NaiveDateTime,
    /// Reason for the last adjustment.
    pub adjust_reason: AdjustReason,
}

impl CurrentTime {
    /// Encoded size in bytes.
    pub const SIZE: usize = DATE_TIME_SIZE + 3;

    /// Create a current time value.
    pub fn new(time: NaiveDateTime, adjust_reason: AdjustReason) -> Self {
        Self {
            time,
            adjust_reason,
        }
    }
}

impl AttributeCodec for CurrentTime {
    fn decode(stream: &mut AttributeStream) -> Result<Self> {
        let time = stream.read_date_time(true, true)?;
        let adjust_reason = AdjustReason::from_bits_retain(stream.read_u8()?);
        Ok(Self {
            time,
            adjust_reason,
        })
    }
}

impl AttributeEncode for CurrentTime {
    fn encoded_len(&self) -> usize {
        Self::SIZE
    }

    fn encode(&self, stream: &mut AttributeStream) -> Result<()> {
        stream
            .write_date_time(&self.time, true, true)?
            .write_u8(self.adjust_reason.bits())?;
        Ok(())
    }
}

impl fmt::Display for CurrentTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time.format("%Y-%m-%d %H:%M:%S%.3f"))?;
        if !self.adjust_reason.is_empty() {
            write!(f, " ({:?})", self.adjust_reason)?;
        }
        Ok(())
    }
}
