//! Command responses

use core::convert::Infallible;

use regiface::FromByteArray;

use crate::frame::Frame;

/// Status code the modem uses for success
pub const STATUS_SUCCESS: u8 = 0x00;

/// Status reported for a response frame that carries no status byte
pub const STATUS_MISSING: u8 = 0xFF;

/// Outcome of a command, from the first byte of its response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandStatus {
    /// The modem executed the command
    Success,
    /// The modem rejected the command with the given status code
    Failure(u8),
}

impl CommandStatus {
    /// Whether the command succeeded
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Reads the status from a response frame.
    ///
    /// A response without payload is reported as
    /// `Failure(STATUS_MISSING)`.
    pub fn from_frame(frame: &Frame) -> Self {
        match frame.payload().first() {
            Some(&status) => Self::from_bytes([status]).unwrap_or_else(|never| match never {}),
            None => Self::Failure(STATUS_MISSING),
        }
    }
}

impl FromByteArray for CommandStatus {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(match bytes[0] {
            STATUS_SUCCESS => Self::Success,
            code => Self::Failure(code),
        })
    }
}
