//! Driver error type

use crate::session::SessionState;

/// Errors reported by the driver
///
/// Framing problems on the receive path never show up here: corrupt frames
/// are dropped by the [`FrameReader`](crate::FrameReader) and assembly carries
/// on with the next byte. A modem that answers negatively, or not at all, is
/// reported by [`Device::start`](crate::Device::start) and
/// [`Device::send`](crate::Device::send) as `Ok(false)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An address or key argument had the wrong number of bytes.
    /// Nothing was written to the stream.
    InvalidLength {
        /// Required length in bytes
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },
    /// The outbound payload does not fit in a single frame.
    /// Nothing was written to the stream.
    PayloadTooLarge {
        /// Largest payload a frame can carry
        max: usize,
        /// Payload length that was supplied
        actual: usize,
    },
    /// A payload byte was requested past the end of the payload
    OutOfRange {
        /// Requested index
        index: usize,
        /// Payload length
        len: usize,
    },
    /// The operation is not allowed in the current session state
    InvalidState(SessionState),
    /// `start` was called before a device address was configured
    NotProvisioned,
    /// A data indication frame was too short to carry a port number
    MalformedIndication,
    /// No matching frame arrived before the response timeout elapsed
    Timeout,
    /// The underlying serial stream reported an error
    Stream,
}
