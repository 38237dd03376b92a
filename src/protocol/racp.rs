//! Record Access Control Point commands and responses.
//!
//! Commands are a single little-endian u16 opcode. Responses are 4 bytes:
//! - Number of stored records: opcode(2) + count(2)
//! - Response code: opcode(2) + operand(2)

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::attribute_stream::AttributeStream;

/// RACP response opcode carrying the number of stored records.
pub const RESPONSE_NUMBER_OF_RECORDS: u16 = 0x0004;
/// RACP response opcode carrying a response code.
pub const RESPONSE_CODE: u16 = 0x0006;
/// Response code operand for a successfully completed report of stored records.
pub const RESPONSE_SUCCESS: u16 = 0x0101;
/// Size of every RACP response.
pub const RESPONSE_SIZE: usize = 4;

/// RACP commands issued by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RacpCommand {
    /// Report all stored records (0x0101).
    ReportAllRecords = 0x0101,
    /// Delete all stored records (0x0201).
    DeleteAllRecords = 0x0201,
    /// Report the number of stored records (0x0401).
    ReportNumberOfRecords = 0x0401,
}

impl RacpCommand {
    /// Default time to wait for the response to a record count request.
    pub const COUNT_TIMEOUT: Duration = Duration::from_secs(2);
    /// Default time to wait for a transfer or deletion to complete.
    pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(20);

    /// Convert to the raw opcode.
    pub fn opcode(&self) -> u16 {
        *self as u16
    }

    /// Encode the command for writing to the RACP characteristic.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_command(self.opcode())
    }
}

impl fmt::Display for RacpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReportAllRecords => write!(f, "Report all records"),
            Self::DeleteAllRecords => write!(f, "Delete all records"),
            Self::ReportNumberOfRecords => write!(f, "Report number of records"),
        }
    }
}

/// Encode a raw opcode as the 2-byte RACP command.
pub fn encode_command(opcode: u16) -> Vec<u8> {
    opcode.to_le_bytes().to_vec()
}

/// A decoded RACP response notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacpResponse {
    /// The number of records stored on the meter.
    NumberOfRecords(u16),
    /// A response code; [`RESPONSE_SUCCESS`] means the command completed.
    ResponseCode(u16),
    /// An opcode this crate does not handle.
    Unknown {
        /// Response opcode.
        opcode: u16,
        /// Response operand.
        operand: u16,
    },
}

impl RacpResponse {
    /// Parse a response notification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolError`] if the payload is not exactly 4 bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != RESPONSE_SIZE {
            return Err(Error::ProtocolError {
                context: format!(
                    "RACP response is {} bytes (expected {}): {:02X?}",
                    data.len(),
                    RESPONSE_SIZE,
                    data
                ),
            });
        }

        let mut stream = AttributeStream::from_slice(data);
        let opcode = stream.read_u16()?;
        let operand = stream.read_u16()?;

        Ok(match opcode {
            RESPONSE_NUMBER_OF_RECORDS => Self::NumberOfRecords(operand),
            RESPONSE_CODE => Self::ResponseCode(operand),
            _ => Self::Unknown { opcode, operand },
        })
    }

    /// Check if this response finishes a command successfully.
    pub fn is_success(&self) -> bool {
        match self {
            Self::NumberOfRecords(_) => true,
            Self::ResponseCode(code) => *code == RESPONSE_SUCCESS,
            Self::Unknown { .. } => false,
        }
    }

    /// Raw opcode of the response.
    pub fn opcode(&self) -> u16 {
        match self {
            Self::NumberOfRecords(_) => RESPONSE_NUMBER_OF_RECORDS,
            Self::ResponseCode(_) => RESPONSE_CODE,
            Self::Unknown { opcode, .. } => *opcode,
        }
    }
}

impl fmt::Display for RacpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumberOfRecords(count) => write!(f, "{} stored records", count),
            Self::ResponseCode(code) => write!(f, "response code {:#06x}", code),
            Self::Unknown { opcode, operand } => {
                write!(f, "opcode {:#06x} operand {:#06x}", opcode, operand)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_encoding() {
        assert_eq!(RacpCommand::ReportAllRecords.to_bytes(), vec![0x01, 0x01]);
        assert_eq!(RacpCommand::DeleteAllRecords.to_bytes(), vec![0x01, 0x02]);
        assert_eq!(RacpCommand::ReportNumberOfRecords.to_bytes(), vec![0x01, 0x04]);
    }

    #[test]
    fn test_parse_number_of_records() {
        let response = RacpResponse::parse(&[0x04, 0x00, 0x2A, 0x01]).unwrap();
        assert_eq!(response, RacpResponse::NumberOfRecords(0x012A));
        assert!(response.is_success());
    }

    #[test]
    fn test_parse_response_code() {
        let response = RacpResponse::parse(&[0x06, 0x00, 0x01, 0x01]).unwrap();
        assert_eq!(response, RacpResponse::ResponseCode(RESPONSE_SUCCESS));
        assert!(response.is_success());

        let response = RacpResponse::parse(&[0x06, 0x00, 0x01, 0x06]).unwrap();
        assert_eq!(response, RacpResponse::ResponseCode(0x0601));
        assert!(!response.is_success());
    }

    #[test]
    fn test_parse_unknown_opcode() {
        let response = RacpResponse::parse(&[0x05, 0x00, 0x01, 0x00]).unwrap();
        assert_eq!(
            response,
            RacpResponse::Unknown {
                opcode: 0x0005,
                operand: 0x0001
            }
        );
        assert!(!response.is_success());
    }

    #[test]
    fn test_parse_wrong_length() {
        assert!(matches!(
            RacpResponse::parse(&[0x06, 0x00, 0x01]),
            Err(Error::ProtocolError { .. })
        ));
        assert!(matches!(
            RacpResponse::parse(&[0x06, 0x00, 0x01, 0x01, 0x00]),
            Err(Error::ProtocolError { .. })
        ));
    }
}
