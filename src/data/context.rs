//! Glucose Measurement Context records.
//!
//! The context characteristic (0x2A34) extends a measurement with meal,
//! exercise, medication and HbA1c information. Every field after the
//! sequence number is optional and gated by a bit in the flags byte.

use std::fmt;

use crate::error::{Error, Result};
use crate::protocol::attribute_stream::{AttributeCodec, AttributeStream};

bitflags::bitflags! {
    /// Flags byte at the start of a context record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ContextFlags: u8 {
        /// Carbohydrate id and amount are present.
        const CARBOHYDRATE_PRESENT = 0x01;
        /// Meal field is present.
        const MEAL_PRESENT = 0x02;
        /// Tester/health byte is present.
        const TESTER_HEALTH_PRESENT = 0x04;
        /// Exercise duration and intensity are present.
        const EXERCISE_PRESENT = 0x08;
        /// Medication id and amount are present.
        const MEDICATION_PRESENT = 0x10;
        /// Medication amount is a mass (milligrams) rather than a volume (milliliters).
        const MEDICATION_UNITS_MILLIGRAMS = 0x20;
        /// HbA1c is present.
        const HBA1C_PRESENT = 0x40;
        /// An extended flags byte follows the sequence number.
        const EXTENDED_FLAGS_PRESENT = 0x80;
    }
}

/// Meal a carbohydrate intake belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CarbohydrateId {
    /// Not available.
    NotAvailable,
    /// Breakfast.
    Breakfast,
    /// Lunch.
    Lunch,
    /// Dinner.
    Dinner,
    /// Snack.
    Snack,
    /// Drink.
    Drink,
    /// Supper.
    Supper,
    /// Brunch.
    Brunch,
    /// Reserved value.
    Reserved(u8),
}

impl CarbohydrateId {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => Self::NotAvailable,
            1 => Self::Breakfast,
            2 => Self::Lunch,
            3 => Self::Dinner,
            4 => Self::Snack,
            5 => Self::Drink,
            6 => Self::Supper,
            7 => Self::Brunch,
            other => Self::Reserved(other),
        }
    }
}

/// Timing of the measurement relative to a meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Meal {
    /// Not available.
    NotAvailable,
    /// Preprandial (before meal).
    BeforeMeal,
    /// Postprandial (after meal).
    AfterMeal,
    /// Fasting.
    Fasting,
    /// Casual (snacks, drinks, etc.).
    Casual,
    /// Bedtime.
    Bedtime,
    /// Reserved value.
    Reserved(u8),
}

impl Meal {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => Self::NotAvailable,
            1 => Self::BeforeMeal,
            2 => Self::AfterMeal,
            3 => Self::Fasting,
            4 => Self::Casual,
            5 => Self::Bedtime,
            other => Self::Reserved(other),
        }
    }
}

/// Who performed the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tester {
    /// Self.
    SelfTest,
    /// Health care professional.
    HealthCareProfessional,
    /// Lab test.
    LabTest,
    /// Tester value not available.
    NotAvailable,
    /// Reserved value.
    Reserved(u8),
}

impl Tester {
    /// Create from the raw 4-bit value.
    pub fn from_raw(value: u8) -> Self {
        match value & 0x0F {
            1 => Self::SelfTest,
            2 => Self::HealthCareProfessional,
            3 => Self::LabTest,
            0x0F => Self::NotAvailable,
            other => Self::Reserved(other),
        }
    }
}

/// Health state of the patient at the time of the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Health {
    /// Minor health issues.
    MinorHealthIssues,
    /// Major health issues.
    MajorHealthIssues,
    /// During menses.
    DuringMenses,
    /// Under stress.
    UnderStress,
    /// No health issues.
    NoHealthIssues,
    /// Health value not available.
    NotAvailable,
    /// Reserved value.
    Reserved(u8),
}

impl Health {
    /// Create from the raw 4-bit value.
    pub fn from_raw(value: u8) -> Self {
        match value & 0x0F {
            1 => Self::MinorHealthIssues,
            2 => Self::MajorHealthIssues,
            3 => Self::DuringMenses,
            4 => Self::UnderStress,
            5 => Self::NoHealthIssues,
            0x0F => Self::NotAvailable,
            other => Self::Reserved(other),
        }
    }
}

/// Kind of medication taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MedicationId {
    /// Not available.
    NotAvailable,
    /// Rapid acting insulin.
    RapidActingInsulin,
    /// Short acting insulin.
    ShortActingInsulin,
    /// Intermediate acting insulin.
    IntermediateActingInsulin,
    /// Long acting insulin.
    LongActingInsulin,
    /// Pre-mixed insulin.
    PreMixedInsulin,
    /// Reserved value.
    Reserved(u8),
}

impl MedicationId {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => Self::NotAvailable,
            1 => Self::RapidActingInsulin,
            2 => Self::ShortActingInsulin,
            3 => Self::IntermediateActingInsulin,
            4 => Self::LongActingInsulin,
            5 => Self::PreMixedInsulin,
            other => Self::Reserved(other),
        }
    }
}

/// Unit of a medication amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MedicationUnit {
    /// Mass, reported in milligrams.
    Milligrams,
    /// Volume, reported in milliliters.
    Milliliters,
}

impl fmt::Display for MedicationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Milligrams => write!(f, "mg"),
            Self::Milliliters => write!(f, "ml"),
        }
    }
}

/// Carbohydrate intake.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Carbohydrate {
    /// Meal the intake belongs to.
    pub id: CarbohydrateId,
    /// Amount in kilograms.
    pub kilograms: f32,
}

/// Exercise before the measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Exercise {
    /// Duration in seconds (0xFFFF means overrun).
    pub duration_seconds: u16,
    /// Intensity in percent.
    pub intensity_percent: u8,
}

/// Medication taken.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Medication {
    /// Kind of medication.
    pub id: MedicationId,
    /// Amount, in `unit`.
    pub amount: f32,
    /// Unit of the amount.
    pub unit: MedicationUnit,
}

/// Context information for one glucose measurement.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlucoseMeasurementContext {
    /// Flags the record was decoded with.
    pub flags: ContextFlags,
    /// Carbohydrate intake.
    pub carbohydrate: Option<Carbohydrate>,
    /// Meal timing.
    pub meal: Option<Meal>,
    /// Tester and health state.
    pub tester_health: Option<(Tester, Health)>,
    /// Exercise.
    pub exercise: Option<Exercise>,
    /// Medication.
    pub medication: Option<Medication>,
    /// HbA1c in percent.
    pub hba1c_percent: Option<f32>,
}

impl GlucoseMeasurementContext {
    /// Smallest valid context notification: flags(1) + sequence(2).
    pub const MIN_SIZE: usize = 3;

    /// Decode the optional fields that follow the sequence number.
    ///
    /// `stream` is the whole notification with its cursor placed after the
    /// sequence number; the size check applies to the whole payload.
    pub fn decode(flags: ContextFlags, stream: &mut AttributeStream) -> Result<Self> {
        if stream.len() < Self::MIN_SIZE {
            return Err(Error::MalformedRecord {
                record: "glucose measurement context",
                len: stream.len(),
                minimum: Self::MIN_SIZE,
            });
        }

        let mut context = Self {
            flags,
            ..Self::default()
        };

        if flags.contains(ContextFlags::EXTENDED_FLAGS_PRESENT) {
            // All bits reserved.
            stream.read_u8()?;
        }
        if flags.contains(ContextFlags::CARBOHYDRATE_PRESENT) {
            let id = CarbohydrateId::from_raw(stream.read_u8()?);
            let kilograms = stream.read_sfloat16()?;
            context.carbohydrate = Some(Carbohydrate { id, kilograms });
        }
        if flags.contains(ContextFlags::MEAL_PRESENT) {
            context.meal = Some(Meal::from_raw(stream.read_u8()?));
        }
        if flags.contains(ContextFlags::TESTER_HEALTH_PRESENT) {
            let tester_health = stream.read_u8()?;
            context.tester_health = Some((
                Tester::from_raw(tester_health & 0x0F),
                Health::from_raw(tester_health >> 4),
            ));
        }
        if flags.contains(ContextFlags::EXERCISE_PRESENT) {
            let duration_seconds = stream.read_u16()?;
            let intensity_percent = stream.read_u8()?;
            context.exercise = Some(Exercise {
                duration_seconds,
                intensity_percent,
            });
        }
        if flags.contains(ContextFlags::MEDICATION_PRESENT) {
            let id = MedicationId::from_raw(stream.read_u8()?);
            let amount = stream.read_sfloat16()?;
            let unit = if flags.contains(ContextFlags::MEDICATION_UNITS_MILLIGRAMS) {
                MedicationUnit::Milligrams
            } else {
                MedicationUnit::Milliliters
            };
            context.medication = Some(Medication { id, amount, unit });
        }
        if flags.contains(ContextFlags::HBA1C_PRESENT) {
            context.hba1c_percent = Some(stream.read_sfloat16()?);
        }

        Ok(context)
    }
}

/// A complete context notification, keyed by the measurement's sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRecord {
    /// Sequence number of the measurement this context belongs to.
    pub sequence_number: u16,
    /// The decoded context.
    pub context: GlucoseMeasurementContext,
}

impl AttributeCodec for ContextRecord {
    fn decode(stream: &mut AttributeStream) -> Result<Self> {
        if stream.len() < GlucoseMeasurementContext::MIN_SIZE {
            return Err(Error::MalformedRecord {
                record: "glucose measurement context",
                len: stream.len(),
                minimum: GlucoseMeasurementContext::MIN_SIZE,
            });
        }

        let flags = ContextFlags::from_bits_retain(stream.read_u8()?);
        let sequence_number = stream.read_u16()?;
        let context = GlucoseMeasurementContext::decode(flags, stream)?;

        Ok(Self {
            sequence_number,
            context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_every_field() {
        let data = [
            0xFF, // all flags, including extended and milligrams
            0x05, 0x00, // sequence 5
            0x00, // extended flags, discarded
            0x01, 0x32, 0xD0, // breakfast, 50e-3 kg
            0x01, // before meal
            0x51, // tester self, health none
            0x10, 0x0E, 0x32, // 3600 s at 50 %
            0x01, 0x0A, 0xF0, // rapid acting insulin, 10e-1
            0x41, 0xF0, // HbA1c 6.5 %
        ];
        let record = ContextRecord::parse(&data).unwrap();

        assert_eq!(record.sequence_number, 5);
        let context = record.context;
        assert_eq!(context.flags, ContextFlags::all());

        let carbohydrate = context.carbohydrate.unwrap();
        assert_eq!(carbohydrate.id, CarbohydrateId::Breakfast);
        assert!((carbohydrate.kilograms - 0.05).abs() < 1e-6);

        assert_eq!(context.meal, Some(Meal::BeforeMeal));
        assert_eq!(
            context.tester_health,
            Some((Tester::SelfTest, Health::NoHealthIssues))
        );
        assert_eq!(
            context.exercise,
            Some(Exercise {
                duration_seconds: 3600,
                intensity_percent: 50
            })
        );

        let medication = context.medication.unwrap();
        assert_eq!(medication.id, MedicationId::RapidActingInsulin);
        assert!((medication.amount - 1.0).abs() < 1e-6);
        assert_eq!(medication.unit, MedicationUnit::Milligrams);

        assert!((context.hba1c_percent.unwrap() - 6.5).abs() < 1e-5);
    }

    #[test]
    fn test_decode_no_optional_fields() {
        let record = ContextRecord::parse(&[0x00, 0x09, 0x00]).unwrap();
        assert_eq!(record.sequence_number, 9);
        assert_eq!(record.context, GlucoseMeasurementContext::default());
    }

    #[test]
    fn test_decode_medication_in_milliliters() {
        let data = [0x10, 0x01, 0x00, 0x05, 0x02, 0x00];
        let record = ContextRecord::parse(&data).unwrap();
        let medication = record.context.medication.unwrap();
        assert_eq!(medication.id, MedicationId::PreMixedInsulin);
        assert_eq!(medication.unit, MedicationUnit::Milliliters);
        assert_eq!(medication.amount, 2.0);
    }

    #[test]
    fn test_decode_too_short() {
        assert!(matches!(
            ContextRecord::parse(&[0x00, 0x01]),
            Err(Error::MalformedRecord { len: 2, .. })
        ));

        let mut stream = AttributeStream::from_slice(&[0x02]);
        assert!(matches!(
            GlucoseMeasurementContext::decode(ContextFlags::MEAL_PRESENT, &mut stream),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_decode_missing_announced_field() {
        // Meal announced, payload ends after the sequence number.
        assert!(matches!(
            ContextRecord::parse(&[0x02, 0x01, 0x00]),
            Err(Error::BufferUnderrun { .. })
        ));
    }

    #[test]
    fn test_tester_health_nibbles() {
        assert_eq!(Tester::from_raw(0x0F), Tester::NotAvailable);
        assert_eq!(Health::from_raw(0x0F), Health::NotAvailable);
        assert_eq!(Tester::from_raw(0x00), Tester::Reserved(0));
        assert_eq!(Health::from_raw(0x03), Health::DuringMenses);
    }
}
