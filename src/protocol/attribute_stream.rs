//! Cursor-based attribute codec.
//!
//! Bluetooth SIG characteristics are flat, flag-driven sequences of
//! little-endian fields. [`AttributeStream`] mirrors that layout: a record
//! decoder is an ordered list of reads, an encoder an ordered list of writes.

use bytes::{Buf, BufMut};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::fmt;

use crate::error::{Error, Result};
use crate::protocol::medfloat::{Float32, SFloat16};

/// Size of a date-time without the optional day-of-week and fraction bytes.
pub const DATE_TIME_SIZE: usize = 7;

/// Scale milliseconds to the 1/256 s fraction byte, rounding to nearest.
pub fn millis_to_fraction(millis: u32) -> u8 {
    let scaled = (u64::from(millis) * 256 + 500) / 1000;
    scaled.min(u64::from(u8::MAX)) as u8
}

/// Convert a 1/256 s fraction byte back to milliseconds.
pub fn fraction_to_millis(fraction: u8) -> u32 {
    u32::from(fraction) * 1000 / 256
}

/// Decoding half of a record codec.
pub trait AttributeCodec: Sized {
    /// Decode the record from the stream's current position.
    fn decode(stream: &mut AttributeStream) -> Result<Self>;

    /// Decode the record from a complete payload.
    fn parse(data: &[u8]) -> Result<Self> {
        Self::decode(&mut AttributeStream::from_slice(data))
    }
}

/// Encoding half of a record codec.
pub trait AttributeEncode {
    /// Encoded size in bytes.
    fn encoded_len(&self) -> usize;

    /// Encode the record at the stream's current position.
    fn encode(&self, stream: &mut AttributeStream) -> Result<()>;

    /// Encode the record into a fresh buffer.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut stream = AttributeStream::with_size(self.encoded_len());
        self.encode(&mut stream)?;
        Ok(stream.into_bytes())
    }
}

/// An owned attribute value with a read/write cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeStream {
    data: Vec<u8>,
    pos: usize,
}

impl AttributeStream {
    /// Wrap received bytes for decoding.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Copy received bytes for decoding.
    pub fn from_slice(data: &[u8]) -> Self {
        Self::from_bytes(data.to_vec())
    }

    /// Allocate a zero-filled buffer for encoding.
    pub fn with_size(size: usize) -> Self {
        Self::from_bytes(vec![0; size])
    }

    /// The underlying bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the stream, returning the underlying bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Total buffer length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn readable(&self, needed: usize) -> Result<&[u8]> {
        if self.remaining() < needed {
            return Err(Error::BufferUnderrun {
                offset: self.pos,
                needed,
                len: self.data.len(),
            });
        }
        Ok(&self.data[self.pos..self.pos + needed])
    }

    fn writable(&mut self, needed: usize) -> Result<&mut [u8]> {
        if self.remaining() < needed {
            return Err(Error::BufferOverflow {
                offset: self.pos,
                needed,
                len: self.data.len(),
            });
        }
        Ok(&mut self.data[self.pos..self.pos + needed])
    }

    // === Integers ===

    /// Read an unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.readable(1)?.get_u8();
        self.pos += 1;
        Ok(value)
    }

    /// Read a little-endian u16.
    pub fn read_u16(&mut self) -> Result<u16> {
        let value = self.readable(2)?.get_u16_le();
        self.pos += 2;
        Ok(value)
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.readable(4)?.get_u32_le();
        self.pos += 4;
        Ok(value)
    }

    /// Read a little-endian u64.
    pub fn read_u64(&mut self) -> Result<u64> {
        let value = self.readable(8)?.get_u64_le();
        self.pos += 8;
        Ok(value)
    }

    /// Write an unsigned byte.
    pub fn write_u8(&mut self, value: u8) -> Result<&mut Self> {
        self.writable(1)?.put_u8(value);
        self.pos += 1;
        Ok(self)
    }

    /// Write a little-endian u16.
    pub fn write_u16(&mut self, value: u16) -> Result<&mut Self> {
        self.writable(2)?.put_u16_le(value);
        self.pos += 2;
        Ok(self)
    }

    /// Write a little-endian u32.
    pub fn write_u32(&mut self, value: u32) -> Result<&mut Self> {
        self.writable(4)?.put_u32_le(value);
        self.pos += 4;
        Ok(self)
    }

    /// Write a little-endian u64.
    pub fn write_u64(&mut self, value: u64) -> Result<&mut Self> {
        self.writable(8)?.put_u64_le(value);
        self.pos += 8;
        Ok(self)
    }

    // === Medical floats ===

    /// Read an IEEE-11073 16-bit SFLOAT.
    pub fn read_sfloat16(&mut self) -> Result<f32> {
        Ok(SFloat16::from_raw(self.read_u16()?).to_f32())
    }

    /// Read an IEEE-11073 32-bit FLOAT.
    pub fn read_float32(&mut self) -> Result<f32> {
        Ok(Float32::from_raw(self.read_u32()?).to_f32())
    }

    /// Write an IEEE-11073 16-bit SFLOAT.
    pub fn write_sfloat16(&mut self, value: f32) -> Result<&mut Self> {
        self.write_u16(SFloat16::from_f32(value).to_raw())
    }

    /// Write an IEEE-11073 32-bit FLOAT.
    pub fn write_float32(&mut self, value: f32) -> Result<&mut Self> {
        self.write_u32(Float32::from_f32(value).to_raw())
    }

    // === Date and time ===

    /// Read a date-time.
    ///
    /// Layout: year(2) month(1) day(1) hours(1) minutes(1) seconds(1), then an
    /// optional day of week (discarded) and an optional 1/256 s fraction.
    pub fn read_date_time(
        &mut self,
        include_day_of_week: bool,
        include_fractions: bool,
    ) -> Result<NaiveDateTime> {
        let offset = self.pos;
        let year = self.read_u16()?;
        let month = self.read_u8()?;
        let day = self.read_u8()?;
        let hour = self.read_u8()?;
        let minute = self.read_u8()?;
        let second = self.read_u8()?;
        if include_day_of_week {
            self.read_u8()?;
        }
        let millis = if include_fractions {
            fraction_to_millis(self.read_u8()?)
        } else {
            0
        };

        NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
            .and_then(|date| {
                date.and_hms_milli_opt(u32::from(hour), u32::from(minute), u32::from(second), millis)
            })
            .ok_or_else(|| Error::InvalidData {
                context: format!(
                    "Invalid date-time at offset {}: {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    offset, year, month, day, hour, minute, second
                ),
            })
    }

    /// Write a date-time.
    ///
    /// The day of week is written as ISO-8601 (1 = Monday .. 7 = Sunday).
    pub fn write_date_time(
        &mut self,
        date_time: &NaiveDateTime,
        include_day_of_week: bool,
        include_fractions: bool,
    ) -> Result<&mut Self> {
        let year = u16::try_from(date_time.year()).map_err(|_| Error::InvalidParameter {
            name: "year".to_string(),
            value: date_time.year().to_string(),
        })?;

        self.write_u16(year)?
            .write_u8(date_time.month() as u8)?
            .write_u8(date_time.day() as u8)?
            .write_u8(date_time.hour() as u8)?
            .write_u8(date_time.minute() as u8)?
            .write_u8(date_time.second() as u8)?;

        if include_day_of_week {
            self.write_u8(date_time.weekday().number_from_monday() as u8)?;
        }
        if include_fractions {
            // Leap seconds report >= 1000 ms; keep the fraction within the second.
            let millis = date_time.nanosecond() / 1_000_000 % 1000;
            self.write_u8(millis_to_fraction(millis))?;
        }
        Ok(self)
    }

    // === Strings ===

    /// Read the rest of the buffer as text.
    ///
    /// Trailing NUL padding is dropped.
    pub fn read_string(&mut self) -> Result<String> {
        let raw = &self.data[self.pos..];
        let text = std::str::from_utf8(raw).map_err(|e| Error::InvalidData {
            context: format!("Invalid UTF-8 at offset {}: {}", self.pos, e),
        })?;
        let text = text.trim_end_matches('\0').to_string();
        self.pos = self.data.len();
        Ok(text)
    }

    /// Replace everything from the cursor onwards with the text.
    pub fn write_string(&mut self, text: &str) -> &mut Self {
        self.data.truncate(self.pos);
        self.data.extend_from_slice(text.as_bytes());
        self.pos = self.data.len();
        self
    }

    /// Read the rest of the buffer as raw bytes.
    pub fn read_remaining(&mut self) -> Vec<u8> {
        let rest = self.data[self.pos..].to_vec();
        self.pos = self.data.len();
        rest
    }
}

impl From<Vec<u8>> for AttributeStream {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl fmt::Display for AttributeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
