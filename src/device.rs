//! Embit modem device interface
//!
//! This module provides the high-level interface for driving an Embit LoRa
//! modem over a serial stream. It supports both blocking and asynchronous
//! waits for modem responses.
//!
//! The interface is built around the `Device<S, D>` struct which wraps a
//! serial stream and a delay source and provides methods for:
//! - Provisioning the modem (network preferences, address, keys)
//! - Starting and stopping the network
//! - Sending packets, optionally waiting for delivery confirmation
//! - Polling for packets received over the air
//!
//! # Example
//! ```no_run
//! # fn demo<S, D>(uart: S, delay: D) -> Result<(), embit_lora::Error>
//! # where
//! #     S: embedded_hal_nb::serial::Read<u8> + embedded_hal_nb::serial::Write<u8>,
//! #     D: embedded_hal::delay::DelayNs,
//! # {
//! use embit_lora::Device;
//!
//! let mut device = Device::new(uart, delay);
//! device.set_lorawan(true)?;
//! device.set_dev_address(&[0x01, 0x02, 0x03, 0x04])?;
//! device.set_app_key(&[0u8; 16])?;
//! device.set_nwks_key(&[0u8; 16])?;
//!
//! if device.start()? {
//!     device.send(&[0xAA, 0xBB], true)?;
//!     device.process_incoming(|packet| {
//!         let _ = packet.data();
//!     })?;
//! }
//! # Ok(())
//! # }
//! ```

use core::convert::Infallible;

use embedded_hal_nb::serial::{Read, Write};
use heapless::Deque;
use regiface::{ByteArray, Command, ToByteArray};

use crate::commands::{
    CommandStatus, DevAddress, IncomingPacket, NetworkMode, NetworkPreferences, SendData,
    SessionKey, SetAppSessionKey, SetDevAddress, SetNetworkPreferences, SetNetworkSessionKey,
    StartNetwork, StopNetwork, DATA_INDICATION_ID, MAX_DATA_LEN,
};
use crate::config::{Config, BAUD_RATE};
use crate::frame::{encode_frame, Frame, FrameReader, MAX_FRAME_LEN};
use crate::session::{Session, SessionState};
use crate::Error;

/// Number of received packets held while the driver waits for a response
pub const PENDING_CAPACITY: usize = 4;

/// Bytes read in one poll before giving up on completing a frame
const POLL_READ_LIMIT: usize = 2 * MAX_FRAME_LEN;

/// Time accounting for one bounded wait.
///
/// Every poll that comes back empty and every frame that does not end the
/// wait costs one poll step, so a modem that keeps talking cannot stretch
/// the wait past the response timeout.
struct WaitBudget {
    budget_us: u32,
    step_us: u32,
    spent_us: u32,
}

impl WaitBudget {
    fn new(config: &Config) -> Self {
        Self {
            budget_us: config.response_timeout_us(),
            step_us: config.poll_step_us(),
            spent_us: 0,
        }
    }

    fn step_us(&self) -> u32 {
        self.step_us
    }

    /// Charges one poll step, failing once the budget is used up
    fn charge(&mut self) -> Result<(), Error> {
        if self.spent_us >= self.budget_us {
            return Err(Error::Timeout);
        }
        self.spent_us = self.spent_us.saturating_add(self.step_us);
        Ok(())
    }
}

/// Main device interface for an Embit modem.
///
/// Wraps the serial stream connected to the modem and the delay source used
/// to pace polling during bounded waits. Since `embedded-hal-nb` implements
/// its serial traits for `&mut T`, the stream can be lent to the driver
/// instead of moved into it.
///
/// The driver is single threaded and performs no locking. The callback given
/// to [`process_incoming`](Device::process_incoming) cannot reach back into
/// the device, so a send from inside that callback is ruled out at compile
/// time.
pub struct Device<S, D> {
    stream: S,
    delay: D,
    config: Config,
    session: Session,
    reader: FrameReader,
    last_frame: Option<Frame>,
    pending: Deque<IncomingPacket, PENDING_CAPACITY>,
}

impl<S, D> Device<S, D> {
    /// Creates a new Device with the default [`Config`].
    ///
    /// # Arguments
    /// * `stream` - Serial stream connected to the modem, running at [`BAUD_RATE`]
    /// * `delay` - Delay source used between polls while waiting for a response
    pub fn new(stream: S, delay: D) -> Self {
        Self::with_config(stream, delay, Config::default())
    }

    /// Creates a new Device with an explicit configuration.
    pub fn with_config(stream: S, delay: D, config: Config) -> Self {
        Self {
            stream,
            delay,
            config,
            session: Session::new(),
            reader: FrameReader::new(),
            last_frame: None,
            pending: Deque::new(),
        }
    }

    /// Releases the underlying stream and delay source.
    pub fn release(self) -> (S, D) {
        (self.stream, self.delay)
    }

    /// Baud rate the modem's serial interface requires
    pub const fn default_baud_rate() -> u32 {
        BAUD_RATE
    }

    /// Driver configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Provisioning and lifecycle record
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Most recently completed frame, of any kind
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    /// Returns a payload byte of the most recently completed frame.
    ///
    /// # Errors
    /// * [`Error::OutOfRange`] - `index` is past the payload, or no frame
    ///   has been completed yet (reported with `len: 0`)
    pub fn read_packet_byte(&self, index: usize) -> Result<u8, Error> {
        match &self.last_frame {
            Some(frame) => frame.byte(index),
            None => Err(Error::OutOfRange { index, len: 0 }),
        }
    }

    /// Number of received packets waiting for [`process_incoming`](Device::process_incoming)
    pub fn pending_packets(&self) -> usize {
        self.pending.len()
    }

    /// Hands a completed frame to whoever is interested in it.
    ///
    /// Returns the status when the frame answers the command `awaiting`.
    /// Data indications are queued for `process_incoming`; other frames are
    /// consumed.
    fn route_frame(&mut self, frame: Frame, awaiting: Option<u8>) -> Option<CommandStatus> {
        let status = match awaiting {
            Some(command_id) if frame.responds_to(command_id) => {
                Some(CommandStatus::from_frame(&frame))
            }
            _ => {
                self.absorb(&frame);
                None
            }
        };
        self.last_frame = Some(frame);
        status
    }

    /// Records a frame read directly by the caller.
    ///
    /// Data indications are also queued, so they still reach
    /// `process_incoming`.
    fn keep_frame(&mut self, frame: Frame) -> &Frame {
        self.absorb(&frame);
        self.last_frame.insert(frame)
    }

    fn absorb(&mut self, frame: &Frame) {
        if frame.id() == DATA_INDICATION_ID {
            match IncomingPacket::try_from(frame) {
                Ok(packet) => self.queue_packet(packet),
                Err(_) => warn!("dropping data indication without port"),
            }
        } else if frame.is_response() {
            debug!("consumed response {=u8:#04x} nobody waits for", frame.id());
        } else {
            debug!("ignoring unexpected frame {=u8:#04x}", frame.id());
        }
    }

    fn queue_packet(&mut self, packet: IncomingPacket) {
        if let Err(packet) = self.pending.push_back(packet) {
            warn!("incoming packet queue full, dropping oldest packet");
            self.pending.pop_front();
            let _ = self.pending.push_back(packet);
        }
    }

    fn finish_start(&mut self, outcome: Result<CommandStatus, Error>) -> Result<bool, Error> {
        match outcome {
            Ok(CommandStatus::Success) => {
                self.session.mark_running();
                info!("network started");
                Ok(true)
            }
            Ok(CommandStatus::Failure(code)) => {
                warn!("modem refused to start, status {=u8:#04x}", code);
                Ok(false)
            }
            Err(Error::Timeout) => {
                warn!("no response to start command");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    fn finish_send(outcome: Result<CommandStatus, Error>) -> Result<bool, Error> {
        match outcome {
            Ok(CommandStatus::Success) => Ok(true),
            Ok(CommandStatus::Failure(code)) => {
                warn!("packet not delivered, status {=u8:#04x}", code);
                Ok(false)
            }
            Err(Error::Timeout) => {
                warn!("no delivery confirmation before timeout");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }
}

impl<S, D> Device<S, D>
where
    S: Read<u8> + Write<u8>,
{
    /// Executes a command on the modem without waiting for its response.
    ///
    /// # Type Parameters
    /// * `C` - Command type implementing the Command trait with u8 ID
    ///
    /// # Errors
    /// * [`Error::Stream`] - Writing to the stream failed
    pub fn execute<C>(&mut self, command: C) -> Result<(), Error>
    where
        C: Command<IdType = u8>,
        C::CommandParameters: ToByteArray<Error = Infallible>,
    {
        let parameters = command
            .invoking_parameters()
            .to_bytes()
            .unwrap_or_else(|never| match never {});
        let frame = encode_frame(C::id(), &[parameters.as_ref()])?;

        debug!("tx command {=u8:#04x}", C::id());
        self.write_frame(&frame)
    }

    /// Sends the network preference flags.
    ///
    /// # Errors
    /// * [`Error::InvalidState`] - The network is running
    /// * [`Error::Stream`] - Writing to the stream failed
    pub fn set_network_preferences(&mut self, preferences: NetworkPreferences) -> Result<(), Error> {
        self.session.begin_configuration()?;
        self.execute(SetNetworkPreferences { preferences })?;
        self.session.record_preferences(preferences);
        Ok(())
    }

    /// Puts the modem in LoRaWAN mode.
    ///
    /// # Arguments
    /// * `adaptive_data_rate` - Let the modem adapt its data rate
    pub fn set_lorawan(&mut self, adaptive_data_rate: bool) -> Result<(), Error> {
        self.set_network_preferences(NetworkPreferences::new(
            NetworkMode::LoRaWan,
            adaptive_data_rate,
        ))
    }

    /// Puts the modem in private network mode.
    pub fn set_private_network(&mut self, adaptive_data_rate: bool) -> Result<(), Error> {
        self.set_network_preferences(NetworkPreferences::new(
            NetworkMode::Private,
            adaptive_data_rate,
        ))
    }

    /// Assigns the device address.
    ///
    /// # Errors
    /// * [`Error::InvalidLength`] - `address` is not exactly 4 bytes; nothing is written
    /// * [`Error::InvalidState`] - The network is running
    /// * [`Error::Stream`] - Writing to the stream failed
    pub fn set_dev_address(&mut self, address: &[u8]) -> Result<(), Error> {
        let address = DevAddress::try_from(address)?;
        self.session.begin_configuration()?;
        self.execute(SetDevAddress { address })?;
        self.session.record_dev_address(address);
        Ok(())
    }

    /// Sets the application session key.
    ///
    /// # Errors
    /// * [`Error::InvalidLength`] - `key` is not exactly 16 bytes; nothing is written
    /// * [`Error::InvalidState`] - The network is running
    /// * [`Error::Stream`] - Writing to the stream failed
    pub fn set_app_key(&mut self, key: &[u8]) -> Result<(), Error> {
        let key = SessionKey::try_from(key)?;
        self.session.begin_configuration()?;
        self.execute(SetAppSessionKey { key })?;
        self.session.record_app_key();
        Ok(())
    }

    /// Sets the network session key.
    ///
    /// # Errors
    /// * [`Error::InvalidLength`] - `key` is not exactly 16 bytes; nothing is written
    /// * [`Error::InvalidState`] - The network is running
    /// * [`Error::Stream`] - Writing to the stream failed
    pub fn set_nwks_key(&mut self, key: &[u8]) -> Result<(), Error> {
        let key = SessionKey::try_from(key)?;
        self.session.begin_configuration()?;
        self.execute(SetNetworkSessionKey { key })?;
        self.session.record_network_key();
        Ok(())
    }

    /// Stops the network.
    ///
    /// The session is marked stopped even when the stop command could not be
    /// written. No response is awaited.
    pub fn stop(&mut self) -> Result<(), Error> {
        self.session.mark_stopped();
        info!("stopping network");
        self.execute(StopNetwork)
    }

    /// Delivers received packets without blocking.
    ///
    /// Packets queued while `start` or `send` were waiting are delivered
    /// first, then every complete frame currently readable from the stream
    /// is processed. Bytes of an incomplete frame are kept for the next
    /// call. Responses that arrive here have nobody waiting for them and are
    /// consumed.
    ///
    /// # Returns
    /// Number of packets handed to `on_packet`
    ///
    /// # Errors
    /// * [`Error::InvalidState`] - The network is not running
    /// * [`Error::Stream`] - Reading from the stream failed
    pub fn process_incoming<F>(&mut self, mut on_packet: F) -> Result<usize, Error>
    where
        F: FnMut(&IncomingPacket),
    {
        self.session.ensure_running()?;

        let mut delivered = 0;
        loop {
            while let Some(packet) = self.pending.pop_front() {
                on_packet(&packet);
                delivered += 1;
            }
            match self.poll_frame()? {
                Some(frame) => {
                    self.route_frame(frame, None);
                }
                None => break,
            }
        }
        Ok(delivered)
    }

    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), Error> {
        for &byte in bytes {
            nb::block!(self.stream.write(byte)).map_err(|_| Error::Stream)?;
        }
        Ok(())
    }

    /// Reads whatever the stream has available until a frame completes.
    ///
    /// Gives up after [`POLL_READ_LIMIT`] bytes without a frame, so a stream
    /// that never runs dry still returns control to the caller.
    fn poll_frame(&mut self) -> Result<Option<Frame>, Error> {
        for _ in 0..POLL_READ_LIMIT {
            if let Some(frame) = self.reader.next_frame() {
                return Ok(Some(frame));
            }
            match self.stream.read() {
                Ok(byte) => self.reader.enqueue(byte),
                Err(nb::Error::WouldBlock) => return Ok(None),
                Err(nb::Error::Other(_)) => return Err(Error::Stream),
            }
        }
        Ok(self.reader.next_frame())
    }

    fn begin_start(&mut self) -> Result<(), Error> {
        self.session.ensure_startable()?;
        info!("starting network");
        self.execute(StartNetwork)
    }

    fn transmit(&mut self, header: &[u8], body: &[u8], confirmed: bool) -> Result<(), Error> {
        self.session.ensure_running()?;

        let actual = header.len() + body.len();
        if actual > MAX_DATA_LEN {
            return Err(Error::PayloadTooLarge {
                max: MAX_DATA_LEN,
                actual,
            });
        }

        let prefix = SendData::new(self.config.port, confirmed)
            .invoking_parameters()
            .to_bytes()
            .unwrap_or_else(|never| match never {});
        let frame = encode_frame(SendData::id(), &[&prefix[..], header, body])?;

        trace!("tx data {=[u8]:02x}", frame.as_slice());
        self.write_frame(&frame)
    }
}

impl<S, D> Device<S, D>
where
    S: Read<u8> + Write<u8>,
    D: embedded_hal::delay::DelayNs,
{
    /// Starts the network and waits for the modem's verdict.
    ///
    /// # Returns
    /// `true` when the modem accepted the start command; the session is then
    /// running. `false` when it refused or did not answer within the
    /// response timeout; the session state is left unchanged.
    ///
    /// # Errors
    /// * [`Error::NotProvisioned`] - No device address has been set
    /// * [`Error::InvalidState`] - The network is already running
    /// * [`Error::Stream`] - Stream I/O failed
    pub fn start(&mut self) -> Result<bool, Error> {
        self.begin_start()?;
        let outcome = self.wait_for_response(StartNetwork::id());
        self.finish_start(outcome)
    }

    /// Sends one packet.
    ///
    /// # Arguments
    /// * `payload` - Application payload
    /// * `ack` - Request delivery confirmation and wait for it
    ///
    /// # Returns
    /// Without `ack`, `true` as soon as the frame is written. With `ack`,
    /// `true` only when the modem confirms delivery; `false` when it reports
    /// failure or the response timeout elapses.
    ///
    /// # Errors
    /// * [`Error::InvalidState`] - The network is not running
    /// * [`Error::PayloadTooLarge`] - The payload does not fit in one frame
    /// * [`Error::Stream`] - Stream I/O failed
    pub fn send(&mut self, payload: &[u8], ack: bool) -> Result<bool, Error> {
        self.send_segments(payload, &[], ack)
    }

    /// Sends one packet whose payload is `header` followed by `body`.
    ///
    /// Both segments travel in the same frame; see [`send`](Device::send).
    pub fn send_segments(&mut self, header: &[u8], body: &[u8], ack: bool) -> Result<bool, Error> {
        self.transmit(header, body, ack)?;
        if !ack {
            return Ok(true);
        }
        let outcome = self.wait_for_response(SendData::id());
        Self::finish_send(outcome)
    }

    /// Blocks until the next complete frame of any kind arrives.
    ///
    /// A data indication read this way is also queued for
    /// [`process_incoming`](Device::process_incoming).
    ///
    /// # Errors
    /// * [`Error::Timeout`] - No frame completed within the response timeout
    /// * [`Error::Stream`] - Reading from the stream failed
    pub fn read_frame(&mut self) -> Result<&Frame, Error> {
        let mut wait = WaitBudget::new(&self.config);

        loop {
            match self.poll_frame()? {
                Some(frame) => return Ok(self.keep_frame(frame)),
                None => {
                    wait.charge()?;
                    self.delay.delay_us(wait.step_us());
                }
            }
        }
    }

    fn wait_for_response(&mut self, command_id: u8) -> Result<CommandStatus, Error> {
        let mut wait = WaitBudget::new(&self.config);

        loop {
            match self.poll_frame()? {
                Some(frame) => {
                    if let Some(status) = self.route_frame(frame, Some(command_id)) {
                        return Ok(status);
                    }
                    wait.charge()?;
                }
                None => {
                    wait.charge()?;
                    self.delay.delay_us(wait.step_us());
                }
            }
        }
    }
}

impl<S, D> Device<S, D>
where
    S: Read<u8> + Write<u8>,
    D: embedded_hal_async::delay::DelayNs,
{
    /// Asynchronously starts the network.
    ///
    /// This is the async version of [`start`](Device::start).
    pub async fn start_async(&mut self) -> Result<bool, Error> {
        self.begin_start()?;
        let outcome = self.wait_for_response_async(StartNetwork::id()).await;
        self.finish_start(outcome)
    }

    /// Asynchronously sends one packet.
    ///
    /// This is the async version of [`send`](Device::send).
    pub async fn send_async(&mut self, payload: &[u8], ack: bool) -> Result<bool, Error> {
        self.send_segments_async(payload, &[], ack).await
    }

    /// Asynchronously sends one packet made of two segments.
    ///
    /// This is the async version of [`send_segments`](Device::send_segments).
    pub async fn send_segments_async(
        &mut self,
        header: &[u8],
        body: &[u8],
        ack: bool,
    ) -> Result<bool, Error> {
        self.transmit(header, body, ack)?;
        if !ack {
            return Ok(true);
        }
        let outcome = self.wait_for_response_async(SendData::id()).await;
        Self::finish_send(outcome)
    }

    /// Asynchronously waits for the next complete frame.
    ///
    /// This is the async version of [`read_frame`](Device::read_frame).
    pub async fn read_frame_async(&mut self) -> Result<&Frame, Error> {
        let mut wait = WaitBudget::new(&self.config);

        loop {
            match self.poll_frame()? {
                Some(frame) => return Ok(self.keep_frame(frame)),
                None => {
                    wait.charge()?;
                    self.delay.delay_us(wait.step_us()).await;
                }
            }
        }
    }

    async fn wait_for_response_async(&mut self, command_id: u8) -> Result<CommandStatus, Error> {
        let mut wait = WaitBudget::new(&self.config);

        loop {
            match self.poll_frame()? {
                Some(frame) => {
                    if let Some(status) = self.route_frame(frame, Some(command_id)) {
                        return Ok(status);
                    }
                    wait.charge()?;
                }
                None => {
                    wait.charge()?;
                    self.delay.delay_us(wait.step_us()).await;
                }
            }
        }
    }
}
