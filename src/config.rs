//! Driver configuration

/// Baud rate the modem's serial interface runs at
///
/// The transport has to be configured with this rate before the driver
/// exchanges any bytes with the modem.
pub const BAUD_RATE: u32 = 9600;

/// Application port used for outbound data when none is configured
pub const DEFAULT_PORT: u8 = 1;

/// Timing and addressing parameters of a [`Device`](crate::Device)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// How long `start`, `send` and `read_frame` wait for a frame, in ms.
    /// Only time spent with no bytes available counts against it.
    pub response_timeout_ms: u32,
    /// Delay between two empty polls of the stream, in μs
    pub poll_interval_us: u32,
    /// Application port outbound data is sent on
    pub port: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            response_timeout_ms: 10_000,
            poll_interval_us: 1_000,
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Sets the response timeout
    pub const fn with_response_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.response_timeout_ms = timeout_ms;
        self
    }

    /// Sets the delay between empty polls
    pub const fn with_poll_interval_us(mut self, interval_us: u32) -> Self {
        self.poll_interval_us = interval_us;
        self
    }

    /// Sets the application port for outbound data
    pub const fn with_port(mut self, port: u8) -> Self {
        self.port = port;
        self
    }

    pub(crate) fn response_timeout_us(&self) -> u32 {
        self.response_timeout_ms.saturating_mul(1_000)
    }

    /// Poll interval, never zero so that waits always make progress
    pub(crate) fn poll_step_us(&self) -> u32 {
        self.poll_interval_us.max(1)
    }
}
