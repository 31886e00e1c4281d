//! Packet exchange commands
//!
//! Outbound data is sent with [`SendData`]; its fixed two byte header
//! (options and port) is followed by the application payload, which may be
//! supplied in two segments. Packets received over the air are announced by
//! the modem with an unsolicited data indication frame
//! ([`DATA_INDICATION_ID`]) and decoded into an [`IncomingPacket`].

use bitflags::bitflags;
use core::convert::Infallible;
use heapless::Vec;

use crate::commands::CommandStatus;
use crate::frame::{Frame, MAX_PAYLOAD_LEN};
use crate::{Command, Error, ToByteArray};

/// Frame id of the unsolicited indication carrying received data
pub const DATA_INDICATION_ID: u8 = 0x60;

/// Largest application payload of one [`SendData`] frame
pub const MAX_DATA_LEN: usize = MAX_PAYLOAD_LEN - SendDataHeader::LEN;

bitflags! {
    /// Transmission options of a [`SendData`] command
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SendOptions: u8 {
        /// When set, the network has to confirm delivery and the modem
        /// answers once the confirmation arrived or delivery failed
        const CONFIRMED = 1 << 0;
    }
}

/// Fixed header in front of every outbound payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendDataHeader {
    /// Transmission options
    pub options: SendOptions,
    /// Application port
    pub port: u8,
}

impl SendDataHeader {
    /// Header length in bytes
    pub const LEN: usize = 2;
}

impl ToByteArray for SendDataHeader {
    type Error = Infallible;
    type Array = [u8; SendDataHeader::LEN];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.options.bits(), self.port])
    }
}

/// SendData command (0x50)
///
/// Transmits one packet. The command parameters only cover the header; the
/// payload follows it in the same frame.
///
/// # Important Notes
/// - Only valid while the network is running
/// - With [`SendOptions::CONFIRMED`] the response arrives after the
///   network acknowledged the packet, or reports failure
#[derive(Debug, Clone)]
pub struct SendData {
    /// Packet header
    pub header: SendDataHeader,
}

impl SendData {
    /// Builds the command for a send with or without confirmation
    pub fn new(port: u8, confirmed: bool) -> Self {
        let mut options = SendOptions::empty();
        options.set(SendOptions::CONFIRMED, confirmed);
        Self {
            header: SendDataHeader { options, port },
        }
    }
}

impl Command for SendData {
    type IdType = u8;
    type CommandParameters = SendDataHeader;
    type ResponseParameters = CommandStatus;

    fn id() -> Self::IdType {
        0x50
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.header
    }
}

/// Packet received over the air
///
/// Decoded from a data indication frame whose payload is
/// `[port] [data ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IncomingPacket {
    port: u8,
    data: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl IncomingPacket {
    /// Application port the packet was received on
    pub fn port(&self) -> u8 {
        self.port
    }

    /// Application payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the payload byte at `index`.
    ///
    /// # Errors
    /// * [`Error::OutOfRange`] - `index` is not below the payload length
    pub fn byte(&self, index: usize) -> Result<u8, Error> {
        self.data.get(index).copied().ok_or(Error::OutOfRange {
            index,
            len: self.data.len(),
        })
    }
}

impl TryFrom<&Frame> for IncomingPacket {
    type Error = Error;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        if frame.id() != DATA_INDICATION_ID {
            return Err(Error::MalformedIndication);
        }
        let (&port, data) = frame
            .payload()
            .split_first()
            .ok_or(Error::MalformedIndication)?;
        let data = Vec::from_slice(data).map_err(|_| Error::MalformedIndication)?;
        Ok(Self { port, data })
    }
}
