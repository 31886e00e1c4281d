//! Binary frame format
//!
//! Every exchange with the modem, in both directions, is one frame:
//!
//! ```text
//! [len_hi] [len_lo] [id] [payload ...] [checksum]
//! ```
//!
//! - `len`: big-endian total frame length, counting the two length bytes,
//!   the id and the checksum (`payload.len() + 4`)
//! - `id`: command, response or indication identifier
//! - `payload`: up to [`MAX_PAYLOAD_LEN`] bytes, never escaped
//! - `checksum`: wrapping 8-bit sum of every byte before it
//!
//! Responses to a command carry the command id with [`RESPONSE_FLAG`] set and
//! a status byte as the first payload byte.

mod reader;

pub use reader::{AssemblyState, FrameReader};

use heapless::Vec;

use crate::Error;

/// Bytes a frame adds around its payload: length, id and checksum
pub const FRAME_OVERHEAD: usize = 4;

/// Largest payload a single frame can carry
pub const MAX_PAYLOAD_LEN: usize = 250;

/// Largest frame on the wire
pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + FRAME_OVERHEAD;

/// Bit set in the id of every response frame
pub const RESPONSE_FLAG: u8 = 0x80;

/// Encoded frame, ready to be written to the stream
pub type FrameBuffer = Vec<u8, MAX_FRAME_LEN>;

/// Wrapping 8-bit sum used as the frame integrity check
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

/// Encodes a frame whose payload is the concatenation of `segments`.
///
/// # Errors
/// * [`Error::PayloadTooLarge`] - the segments add up to more than [`MAX_PAYLOAD_LEN`]
pub fn encode_frame(id: u8, segments: &[&[u8]]) -> Result<FrameBuffer, Error> {
    let payload_len: usize = segments.iter().map(|segment| segment.len()).sum();
    let too_large = Error::PayloadTooLarge {
        max: MAX_PAYLOAD_LEN,
        actual: payload_len,
    };
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(too_large);
    }

    let total = (payload_len + FRAME_OVERHEAD) as u16;
    let mut buffer = FrameBuffer::new();
    buffer
        .extend_from_slice(&total.to_be_bytes())
        .map_err(|_| too_large)?;
    buffer.push(id).map_err(|_| too_large)?;
    for segment in segments {
        buffer.extend_from_slice(segment).map_err(|_| too_large)?;
    }
    let sum = checksum(&buffer);
    buffer.push(sum).map_err(|_| too_large)?;

    Ok(buffer)
}

/// One complete, integrity-checked frame
///
/// Frames handed out by the driver are owned snapshots; reading further
/// frames from the stream never changes a `Frame` already returned.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    id: u8,
    payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl Frame {
    /// Creates a frame from its id and payload
    ///
    /// # Errors
    /// * [`Error::PayloadTooLarge`] - `payload` is longer than [`MAX_PAYLOAD_LEN`]
    pub fn new(id: u8, payload: &[u8]) -> Result<Self, Error> {
        let payload = Vec::from_slice(payload).map_err(|_| Error::PayloadTooLarge {
            max: MAX_PAYLOAD_LEN,
            actual: payload.len(),
        })?;
        Ok(Self { id, payload })
    }

    /// Command, response or indication identifier
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Payload bytes, without length, id or checksum
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Returns the payload byte at `index`.
    ///
    /// # Errors
    /// * [`Error::OutOfRange`] - `index` is not below the payload length
    pub fn byte(&self, index: usize) -> Result<u8, Error> {
        self.payload.get(index).copied().ok_or(Error::OutOfRange {
            index,
            len: self.payload.len(),
        })
    }

    /// Whether this frame is a response to some command
    pub fn is_response(&self) -> bool {
        self.id & RESPONSE_FLAG != 0
    }

    /// Whether this frame is the response to the command with `command_id`
    pub fn responds_to(&self, command_id: u8) -> bool {
        self.id == command_id | RESPONSE_FLAG
    }

    /// Encodes the frame for the wire
    pub fn encode(&self) -> Result<FrameBuffer, Error> {
        encode_frame(self.id, &[&self.payload])
    }
}
