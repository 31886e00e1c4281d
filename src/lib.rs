#![cfg_attr(not(test), no_std)]
//! Embit LoRa Modem Driver
//!
//! This crate drives Embit LoRa modems (EMB-LR series) through their binary
//! serial command protocol. The host configures the modem, starts the
//! network, sends packets with optional delivery confirmation and polls for
//! packets received over the air.
//!
//! # Features
//! - `no_std`, no allocation
//! - Works over any `embedded-hal-nb` serial stream
//! - Bounded waits for every modem response, blocking or async
//! - Length-prefixed, checksummed frames; arbitrary binary payloads
//! - Optional `defmt` logging
//!
//! # Architecture
//! The driver is organized into several modules:
//!
//! - [`device`]: Main device interface
//!   - Provisioning, start/stop, send and receive operations
//!   - Bounded waits for command responses
//!
//! - [`commands`]: Command definitions
//!   - [`commands::SetDevAddress`], [`commands::SetAppSessionKey`], ... for provisioning
//!   - [`commands::SendData`] and [`commands::IncomingPacket`] for packet exchange
//!
//! - [`frame`]: Wire format
//!   - [`frame::encode_frame`] for outbound frames
//!   - [`frame::FrameReader`] for incremental inbound frame assembly
//!
//! - [`session`]: Modem lifecycle shared by all operations
//!
//! - [`config`]: Timeouts, polling interval and application port
//!
//! # Usage
//! Operation follows a specific sequence:
//!
//! 1. Configure the serial port for [`BAUD_RATE`]
//! 2. Create a [`Device`] with the serial stream and a delay source
//! 3. Set the network preferences, device address and session keys
//! 4. Start the network with [`Device::start`]
//! 5. Send packets with [`Device::send`] and call
//!    [`Device::process_incoming`] regularly to receive
//!
//! # Important Notes
//! - A device address must be set before the network can be started
//! - Address and keys cannot be changed while the network is running
//! - `process_incoming` never blocks; call it often enough that the serial
//!   port does not overflow
//! - A negative response and a missing response are both reported as `false`

#[macro_use]
mod fmt;

pub mod commands;
pub mod config;
pub mod device;
mod error;
pub mod frame;
pub mod session;

pub use regiface::{Command, FromByteArray, NoParameters, ToByteArray};

pub use commands::*;
pub use config::{Config, BAUD_RATE};
pub use device::Device;
pub use error::Error;
pub use frame::{Frame, FrameReader};
pub use session::{Session, SessionState};
