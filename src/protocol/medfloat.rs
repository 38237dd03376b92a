//! IEEE-11073-20601 medical floating point types.
//!
//! Both encodings pack a signed base-10 exponent above a signed mantissa:
//! - SFLOAT (16 bit): exponent bits 12-15, mantissa bits 0-11
//! - FLOAT (32 bit): exponent bits 24-31, mantissa bits 0-23
//!
//! A handful of bit patterns with exponent zero are reserved for NaN,
//! "not at this resolution" and the infinities.

use crate::error::{Error, Result};

/// Sign-extend the low `bits` bits of `value`.
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// Pick the smallest exponent in `exponents` whose rounded mantissa fits in `±max_mantissa`.
fn split_float(value: f64, exponents: std::ops::RangeInclusive<i32>, max_mantissa: i32) -> Option<(i32, i32)> {
    if value == 0.0 {
        return Some((0, 0));
    }

    exponents.into_iter().find_map(|exponent| {
        let mantissa = (value / 10f64.powi(exponent)).round();
        (mantissa.abs() <= max_mantissa as f64).then_some((mantissa as i32, exponent))
    })
}

/// A 16-bit IEEE-11073 SFLOAT value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SFloat16(u16);

impl SFloat16 {
    /// NaN (not a number).
    pub const NAN: Self = Self(0x07FF);
    /// Not at this resolution.
    pub const NRES: Self = Self(0x0800);
    /// Reserved for future use.
    pub const RESERVED: Self = Self(0x0801);
    /// Positive infinity.
    pub const POSITIVE_INFINITY: Self = Self(0x07FE);
    /// Negative infinity.
    pub const NEGATIVE_INFINITY: Self = Self(0x0802);

    /// Smallest exponent.
    pub const MIN_EXPONENT: i8 = -8;
    /// Largest exponent.
    pub const MAX_EXPONENT: i8 = 7;
    /// Smallest mantissa the 12-bit field can hold.
    pub const MIN_MANTISSA: i16 = -2048;
    /// Largest mantissa the 12-bit field can hold.
    pub const MAX_MANTISSA: i16 = 2047;
    /// Largest mantissa magnitude that never collides with a reserved value.
    const MAX_FINITE_MANTISSA: i32 = 2045;

    /// Build an SFLOAT from its mantissa and exponent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if either field is out of range,
    /// or if the pair would encode one of the reserved special values.
    pub fn new(mantissa: i16, exponent: i8) -> Result<Self> {
        if !(Self::MIN_MANTISSA..=Self::MAX_MANTISSA).contains(&mantissa) {
            return Err(Error::InvalidParameter {
                name: "mantissa".to_string(),
                value: mantissa.to_string(),
            });
        }
        if !(Self::MIN_EXPONENT..=Self::MAX_EXPONENT).contains(&exponent) {
            return Err(Error::InvalidParameter {
                name: "exponent".to_string(),
                value: exponent.to_string(),
            });
        }

        let value = Self(((exponent as u16 & 0x000F) << 12) | (mantissa as u16 & 0x0FFF));
        if value.is_special() {
            return Err(Error::InvalidParameter {
                name: "mantissa".to_string(),
                value: format!("{} (reserved with exponent 0)", mantissa),
            });
        }
        Ok(value)
    }

    /// Create from the raw wire value.
    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Convert to the raw wire value.
    pub fn to_raw(self) -> u16 {
        self.0
    }

    /// Signed exponent field.
    pub fn exponent(self) -> i8 {
        sign_extend(u32::from(self.0 >> 12), 4) as i8
    }

    /// Signed mantissa field.
    pub fn mantissa(self) -> i16 {
        sign_extend(u32::from(self.0 & 0x0FFF), 12) as i16
    }

    /// Check if this is one of the reserved special values.
    pub fn is_special(self) -> bool {
        matches!(self.0, 0x07FE..=0x0802)
    }

    /// Encode a float, picking the most precise representation that fits.
    ///
    /// NaN and the infinities map to their reserved patterns; magnitudes too
    /// large for the format saturate to the matching infinity.
    pub fn from_f32(value: f32) -> Self {
        if value.is_nan() {
            return Self::NAN;
        }
        if value.is_infinite() {
            return if value > 0.0 {
                Self::POSITIVE_INFINITY
            } else {
                Self::NEGATIVE_INFINITY
            };
        }

        match split_float(
            f64::from(value),
            i32::from(Self::MIN_EXPONENT)..=i32::from(Self::MAX_EXPONENT),
            Self::MAX_FINITE_MANTISSA,
        ) {
            Some((mantissa, exponent)) => {
                let raw = (((exponent as u16) & 0x000F) << 12) | ((mantissa as u16) & 0x0FFF);
                Self(raw)
            }
            None if value > 0.0 => Self::POSITIVE_INFINITY,
            None => Self::NEGATIVE_INFINITY,
        }
    }

    /// Decode to a float.
    pub fn to_f32(self) -> f32 {
        match self.0 {
            0x07FF | 0x0800 | 0x0801 => f32::NAN,
            0x07FE => f32::INFINITY,
            0x0802 => f32::NEG_INFINITY,
            _ => (f64::from(self.mantissa()) * 10f64.powi(i32::from(self.exponent()))) as f32,
        }
    }
}

impl From<SFloat16> for f32 {
    fn from(value: SFloat16) -> Self {
        value.to_f32()
    }
}

/// A 32-bit IEEE-11073 FLOAT value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Float32(u32);

impl Float32 {
    /// NaN (not a number).
    pub const NAN: Self = Self(0x007F_FFFF);
    /// Not at this resolution.
    pub const NRES: Self = Self(0x0080_0000);
    /// Reserved for future use.
    pub const RESERVED: Self = Self(0x0080_0001);
    /// Positive infinity.
    pub const POSITIVE_INFINITY: Self = Self(0x007F_FFFE);
    /// Negative infinity.
    pub const NEGATIVE_INFINITY: Self = Self(0x0080_0002);

    /// Smallest mantissa the 24-bit field can hold.
    pub const MIN_MANTISSA: i32 = -0x0080_0000;
    /// Largest mantissa the 24-bit field can hold.
    pub const MAX_MANTISSA: i32 = 0x007F_FFFF;
    const MAX_FINITE_MANTISSA: i32 = 0x007F_FFFD;

    /// Build a FLOAT from its mantissa and exponent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the mantissa does not fit in 24
    /// bits or the pair would encode a reserved special value.
    pub fn new(mantissa: i32, exponent: i8) -> Result<Self> {
        if !(Self::MIN_MANTISSA..=Self::MAX_MANTISSA).contains(&mantissa) {
            return Err(Error::InvalidParameter {
                name: "mantissa".to_string(),
                value: mantissa.to_string(),
            });
        }

        let value = Self(((exponent as u8 as u32) << 24) | (mantissa as u32 & 0x00FF_FFFF));
        if value.is_special() {
            return Err(Error::InvalidParameter {
                name: "mantissa".to_string(),
                value: format!("{} (reserved with exponent 0)", mantissa),
            });
        }
        Ok(value)
    }

    /// Create from the raw wire value.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Convert to the raw wire value.
    pub fn to_raw(self) -> u32 {
        self.0
    }

    /// Signed exponent field.
    pub fn exponent(self) -> i8 {
        (self.0 >> 24) as u8 as i8
    }

    /// Signed mantissa field.
    pub fn mantissa(self) -> i32 {
        sign_extend(self.0 & 0x00FF_FFFF, 24)
    }

    /// Check if this is one of the reserved special values.
    pub fn is_special(self) -> bool {
        matches!(self.0, 0x007F_FFFE..=0x0080_0002)
    }

    /// Encode a float, picking the most precise representation that fits.
    pub fn from_f32(value: f32) -> Self {
        if value.is_nan() {
            return Self::NAN;
        }
        if value.is_infinite() {
            return if value > 0.0 {
                Self::POSITIVE_INFINITY
            } else {
                Self::NEGATIVE_INFINITY
            };
        }

        match split_float(
            f64::from(value),
            i32::from(i8::MIN)..=i32::from(i8::MAX),
            Self::MAX_FINITE_MANTISSA,
        ) {
            Some((mantissa, exponent)) => {
                Self(((exponent as u8 as u32) << 24) | (mantissa as u32 & 0x00FF_FFFF))
            }
            None if value > 0.0 => Self::POSITIVE_INFINITY,
            None => Self::NEGATIVE_INFINITY,
        }
    }

    /// Decode to a float.
    pub fn to_f32(self) -> f32 {
        match self.0 {
            0x007F_FFFF | 0x0080_0000 | 0x0080_0001 => f32::NAN,
            0x007F_FFFE => f32::INFINITY,
            0x0080_0002 => f32::NEG_INFINITY,
            _ => (f64::from(self.mantissa()) * 10f64.powi(i32::from(self.exponent()))) as f32,
        }
    }
}

impl From<Float32> for f32 {
    fn from(value: Float32) -> Self {
        value.to_f32()
    }
}
