//! Modem command implementations
//!
//! Every command is a plain struct implementing [`regiface::Command`]: the
//! command id is the frame id, and the invoking parameters are serialized
//! with [`regiface::ToByteArray`] into the frame payload. Responses carry
//! the command id with [`RESPONSE_FLAG`](crate::frame::RESPONSE_FLAG) set and
//! decode into the command's response parameters.
//!
//! # Command Categories
//! - [`network`]: provisioning and lifecycle
//!   - Network preferences (LoRaWAN or private network, ADR)
//!   - Device address and session keys
//!   - Starting and stopping the network
//!
//! - [`data`]: packet exchange
//!   - Sending data with or without confirmation
//!   - Data indications for packets received over the air
//!
//! - [`response`]: the status byte that opens every response
//!
//! # Important Notes
//! - Provisioning commands must be sent before the network is started
//! - The modem answers every command, but only `StartNetwork` and confirmed
//!   `SendData` responses are waited for by the driver
//! - Payloads longer than [`MAX_PAYLOAD_LEN`](crate::frame::MAX_PAYLOAD_LEN)
//!   cannot be sent in one frame

mod data;
mod network;
mod response;

pub use data::*;
pub use network::*;
pub use response::*;
