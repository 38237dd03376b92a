//! Glucose Measurement records.
//!
//! Decodes the Glucose Measurement characteristic (0x2A18) as defined by the
//! Bluetooth SIG.

use chrono::{Duration, NaiveDateTime};
use std::fmt;

use super::context::GlucoseMeasurementContext;
use crate::error::{Error, Result};
use crate::protocol::attribute_stream::{AttributeCodec, AttributeStream};
use crate::utils::mmol_to_mg_dl;

bitflags::bitflags! {
    /// Flags byte at the start of a glucose measurement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MeasurementFlags: u8 {
        /// A signed time offset in minutes follows the base time.
        const TIME_OFFSET_PRESENT = 0x01;
        /// Concentration and type/location fields are present.
        const CONCENTRATION_PRESENT = 0x02;
        /// Concentration is in mol/L instead of kg/L.
        const UNITS_MMOL_PER_L = 0x04;
        /// Sensor status annunciation field is present.
        const SENSOR_STATUS_PRESENT = 0x08;
        /// A context record follows this measurement.
        const CONTEXT_FOLLOWS = 0x10;
    }
}

bitflags::bitflags! {
    /// Sensor status annunciation bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SensorStatus: u16 {
        /// Device battery low at time of measurement.
        const BATTERY_LOW = 0x0001;
        /// Sensor malfunction or faulting at time of measurement.
        const SENSOR_MALFUNCTION = 0x0002;
        /// Sample size for blood or control solution insufficient.
        const SAMPLE_SIZE_INSUFFICIENT = 0x0004;
        /// Strip insertion error.
        const STRIP_INSERTION_ERROR = 0x0008;
        /// Strip type incorrect for device.
        const STRIP_TYPE_INCORRECT = 0x0010;
        /// Sensor result higher than the device can process.
        const RESULT_TOO_HIGH = 0x0020;
        /// Sensor result lower than the device can process.
        const RESULT_TOO_LOW = 0x0040;
        /// Sensor temperature too high for a valid test.
        const TEMPERATURE_TOO_HIGH = 0x0080;
        /// Sensor temperature too low for a valid test.
        const TEMPERATURE_TOO_LOW = 0x0100;
        /// Sensor read interrupted because the strip was pulled too soon.
        const READ_INTERRUPTED = 0x0200;
        /// General device fault.
        const GENERAL_DEVICE_FAULT = 0x0400;
        /// Time fault: sensor time may be inaccurate.
        const TIME_FAULT = 0x0800;
        /// Reserved for future use.
        const RESERVED = 0xF000;
    }
}

impl SensorStatus {
    /// Check if the meter flagged anything at all.
    pub fn has_annunciation(&self) -> bool {
        !(*self & !Self::RESERVED).is_empty()
    }
}

/// Unit the meter reported the concentration in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GlucoseUnit {
    /// Mass concentration (kg/L on the wire).
    #[default]
    MgPerDl,
    /// Molar concentration (mol/L on the wire).
    MmolPerL,
}

impl fmt::Display for GlucoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MgPerDl => write!(f, "mg/dL"),
            Self::MmolPerL => write!(f, "mmol/L"),
        }
    }
}

/// Type of sample the measurement was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleType {
    /// Capillary whole blood.
    CapillaryWholeBlood,
    /// Capillary plasma.
    CapillaryPlasma,
    /// Venous whole blood.
    VenousWholeBlood,
    /// Venous plasma.
    VenousPlasma,
    /// Arterial whole blood.
    ArterialWholeBlood,
    /// Arterial plasma.
    ArterialPlasma,
    /// Undetermined whole blood.
    UndeterminedWholeBlood,
    /// Undetermined plasma.
    UndeterminedPlasma,
    /// Interstitial fluid.
    InterstitialFluid,
    /// Control solution.
    ControlSolution,
    /// Reserved value (0 or 0x0B-0x0F).
    Reserved(u8),
}

impl SampleType {
    /// Create from the raw 4-bit value.
    pub fn from_raw(value: u8) -> Self {
        match value & 0x0F {
            0x01 => Self::CapillaryWholeBlood,
            0x02 => Self::CapillaryPlasma,
            0x03 => Self::VenousWholeBlood,
            0x04 => Self::VenousPlasma,
            0x05 => Self::ArterialWholeBlood,
            0x06 => Self::ArterialPlasma,
            0x07 => Self::UndeterminedWholeBlood,
            0x08 => Self::UndeterminedPlasma,
            0x09 => Self::InterstitialFluid,
            0x0A => Self::ControlSolution,
            other => Self::Reserved(other),
        }
    }
}

/// Body location the sample was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleLocation {
    /// Finger.
    Finger,
    /// Alternate site test (AST).
    AlternateSiteTest,
    /// Earlobe.
    Earlobe,
    /// Control solution.
    ControlSolution,
    /// Sample location value not available.
    NotAvailable,
    /// Reserved value.
    Reserved(u8),
}

impl SampleLocation {
    /// Create from the raw 4-bit value.
    pub fn from_raw(value: u8) -> Self {
        match value & 0x0F {
            0x01 => Self::Finger,
            0x02 => Self::AlternateSiteTest,
            0x03 => Self::Earlobe,
            0x04 => Self::ControlSolution,
            0x0F => Self::NotAvailable,
            other => Self::Reserved(other),
        }
    }
}

/// A single glucose measurement record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlucoseMeasurement {
    /// Sequence number, unique per meter until its records are reset.
    pub sequence_number: u16,

    /// Local capture time with the time offset already applied.
    pub capture_time: NaiveDateTime,

    /// Time offset in minutes, if the meter sent one.
    pub time_offset_minutes: Option<i16>,

    /// Unit the concentration was reported in.
    pub unit: GlucoseUnit,

    /// Concentration: the wire value scaled by 1000 (g/L or mmol/L).
    pub concentration: Option<f32>,

    /// Sample type.
    pub sample_type: Option<SampleType>,

    /// Sample location.
    pub sample_location: Option<SampleLocation>,

    /// Sensor status annunciation.
    pub sensor_status: Option<SensorStatus>,

    /// Whether the meter announced a following context record.
    pub context_follows: bool,

    /// Context information, attached when its record arrives.
    pub context: Option<GlucoseMeasurementContext>,
}

impl GlucoseMeasurement {
    /// Smallest valid payload: flags(1) + sequence(2) + base time(7).
    pub const MIN_SIZE: usize = 10;

    /// Concentration converted to mg/dL, whatever unit the meter used.
    pub fn concentration_mg_dl(&self) -> Option<f32> {
        self.concentration.map(|value| match self.unit {
            // g/L -> mg/dL
            GlucoseUnit::MgPerDl => value * 100.0,
            GlucoseUnit::MmolPerL => mmol_to_mg_dl(value),
        })
    }
}

impl AttributeCodec for GlucoseMeasurement {
    fn decode(stream: &mut AttributeStream) -> Result<Self> {
        if stream.len() < Self::MIN_SIZE {
            return Err(Error::MalformedRecord {
                record: "glucose measurement",
                len: stream.len(),
                minimum: Self::MIN_SIZE,
            });
        }

        let flags = MeasurementFlags::from_bits_retain(stream.read_u8()?);
        let unit = if flags.contains(MeasurementFlags::UNITS_MMOL_PER_L) {
            GlucoseUnit::MmolPerL
        } else {
            GlucoseUnit::MgPerDl
        };
        let sequence_number = stream.read_u16()?;
        let mut capture_time = stream.read_date_time(false, false)?;

        let mut time_offset_minutes = None;
        if flags.contains(MeasurementFlags::TIME_OFFSET_PRESENT) {
            let offset = stream.read_u16()? as i16;
            capture_time += Duration::minutes(i64::from(offset));
            time_offset_minutes = Some(offset);
        }

        let mut concentration = None;
        let mut sample_type = None;
        let mut sample_location = None;
        if flags.contains(MeasurementFlags::CONCENTRATION_PRESENT) {
            concentration = Some(stream.read_sfloat16()? * 1000.0);
            let type_location = stream.read_u8()?;
            sample_type = Some(SampleType::from_raw(type_location & 0x0F));
            sample_location = Some(SampleLocation::from_raw(type_location >> 4));
        }

        let sensor_status = if flags.contains(MeasurementFlags::SENSOR_STATUS_PRESENT) {
            Some(SensorStatus::from_bits_retain(stream.read_u16()?))
        } else {
            None
        };

        Ok(Self {
            sequence_number,
            capture_time,
            time_offset_minutes,
            unit,
            concentration,
            sample_type,
            sample_location,
            sensor_status,
            context_follows: flags.contains(MeasurementFlags::CONTEXT_FOLLOWS),
            context: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 14)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    // 2024-02-14 09:30:00
    const BASE_TIME: [u8; 7] = [0xE8, 0x07, 0x02, 0x0E, 0x09, 0x1E, 0x00];

    fn payload(flags: u8, sequence: u16, tail: &[u8]) -> Vec<u8> {
        let mut data = vec![flags];
        data.extend_from_slice(&sequence.to_le_bytes());
        data.extend_from_slice(&BASE_TIME);
        data.extend_from_slice(tail);
        data
    }

    #[test]
    fn test_decode_mmol_concentration() {
        // SFLOAT mantissa 100, exponent -3; type capillary plasma, location finger
        let data = payload(0x06, 1, &[0x64, 0xD0, 0x12]);
        let measurement = GlucoseMeasurement::parse(&data).unwrap();

        assert_eq!(measurement.sequence_number, 1);
        assert_eq!(measurement.capture_time, base_time());
        assert_eq!(measurement.unit, GlucoseUnit::MmolPerL);
        assert!((measurement.concentration.unwrap() - 100.0).abs() < 1e-3);
        assert_eq!(measurement.sample_type, Some(SampleType::CapillaryPlasma));
        assert_eq!(measurement.sample_location, Some(SampleLocation::Finger));
        assert_eq!(measurement.sensor_status, None);
        assert_eq!(measurement.time_offset_minutes, None);
        assert!(!measurement.context_follows);
    }

    #[test]
    fn test_decode_minimal_record() {
        let data = payload(0x00, 7, &[]);
        let measurement = GlucoseMeasurement::parse(&data).unwrap();

        assert_eq!(measurement.sequence_number, 7);
        assert_eq!(measurement.unit, GlucoseUnit::MgPerDl);
        assert_eq!(measurement.concentration, None);
        assert_eq!(measurement.sample_type, None);
        assert_eq!(measurement.sample_location, None);
    }

    #[test]
    fn test_decode_time_offset() {
        // -90 minutes
        let offset = (-90i16).to_le_bytes();
        let data = payload(0x01, 2, &offset);
        let measurement = GlucoseMeasurement::parse(&data).unwrap();

        assert_eq!(measurement.time_offset_minutes, Some(-90));
        assert_eq!(
            measurement.capture_time,
            base_time() - Duration::minutes(90)
        );
    }

    #[test]
    fn test_decode_all_fields() {
        // offset +60, kg/L mantissa 95 exponent -5, venous plasma at alternate site,
        // battery low + time fault, context follows
        let data = payload(
            0x1B,
            0x0102,
            &[0x3C, 0x00, 0x5F, 0xB0, 0x24, 0x01, 0x08],
        );
        let measurement = GlucoseMeasurement::parse(&data).unwrap();

        assert_eq!(measurement.sequence_number, 0x0102);
        assert_eq!(measurement.capture_time, base_time() + Duration::minutes(60));
        assert_eq!(measurement.unit, GlucoseUnit::MgPerDl);
        assert!((measurement.concentration.unwrap() - 0.95).abs() < 1e-5);
        assert!((measurement.concentration_mg_dl().unwrap() - 95.0).abs() < 1e-3);
        assert_eq!(measurement.sample_type, Some(SampleType::VenousPlasma));
        assert_eq!(
            measurement.sample_location,
            Some(SampleLocation::AlternateSiteTest)
        );
        let status = measurement.sensor_status.unwrap();
        assert!(status.contains(SensorStatus::BATTERY_LOW));
        assert!(status.contains(SensorStatus::TIME_FAULT));
        assert!(status.has_annunciation());
        assert!(measurement.context_follows);
    }

    #[test]
    fn test_decode_too_short() {
        let data = payload(0x00, 1, &[]);
        let err = GlucoseMeasurement::parse(&data[..9]).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedRecord {
                len: 9,
                minimum: 10,
                ..
            }
        ));
        assert!(GlucoseMeasurement::parse(&[]).is_err());
    }

    #[test]
    fn test_decode_truncated_optional_field() {
        // Concentration announced but missing.
        let data = payload(0x02, 1, &[0x64]);
        assert!(matches!(
            GlucoseMeasurement::parse(&data),
            Err(Error::BufferUnderrun { .. })
        ));
    }

    #[test]
    fn test_reserved_sample_values() {
        assert_eq!(SampleType::from_raw(0), SampleType::Reserved(0));
        assert_eq!(SampleType::from_raw(0x0C), SampleType::Reserved(0x0C));
        assert_eq!(SampleLocation::from_raw(0x0F), SampleLocation::NotAvailable);
        assert_eq!(SampleLocation::from_raw(0x07), SampleLocation::Reserved(0x07));
    }

    #[test]
    fn test_sensor_status_reserved_bits_preserved() {
        let status = SensorStatus::from_bits_retain(0x1000);
        assert_eq!(status.bits(), 0x1000);
        assert!(!status.has_annunciation());
    }
}
