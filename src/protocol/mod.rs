//! Protocol module for encoding and decoding attribute payloads.
//!
//! This module contains the implementations for:
//! - the little-endian attribute byte stream
//! - IEEE-11073 SFLOAT/FLOAT numbers
//! - Record Access Control Point commands and responses

pub mod attribute_stream;
pub mod medfloat;
pub mod racp;

pub use attribute_stream::{AttributeCodec, AttributeEncode, AttributeStream};
pub use medfloat::{Float32, SFloat16};
pub use racp::{RacpCommand, RacpResponse};
