//! Incremental frame assembly
//!
//! [`FrameReader`] turns a byte stream into [`Frame`]s one byte at a time, so
//! it can be fed from a polled serial port that hands out whatever happens to
//! be available. Bytes of an incomplete frame stay in the reader between
//! calls.
//!
//! # Assembly states
//! ```text
//! WaitingForHeader -> AccumulatingLength -> AccumulatingPayload -> VerifyingIntegrity
//!        ^                    |                                          |
//!        +---- Corrupt -------+------------------------------------------+---- Complete
//! ```
//!
//! A frame is corrupt when its declared length is outside
//! `FRAME_OVERHEAD..=MAX_FRAME_LEN` or its checksum does not match. Corrupt
//! frames are never returned. Since the protocol has no start marker, the
//! reader resynchronises by dropping the first byte of the rejected frame and
//! replaying the rest, so a well-formed frame following garbage is still
//! found. A frame that ends inside the replayed bytes was part of the
//! rejected frame and is dropped as well.

use heapless::{Deque, Vec};

use super::{checksum, Frame, FRAME_OVERHEAD, MAX_FRAME_LEN};

const REPLAY_CAPACITY: usize = 2 * MAX_FRAME_LEN;

/// Position of the reader inside the frame being assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssemblyState {
    /// Expecting the high byte of the length field
    WaitingForHeader,
    /// Expecting the low byte of the length field
    AccumulatingLength,
    /// Collecting the id and payload bytes
    AccumulatingPayload,
    /// Expecting the checksum byte
    VerifyingIntegrity,
}

enum Step {
    Pending,
    Complete(Frame),
    Corrupt,
}

/// Byte-at-a-time frame assembler
#[derive(Debug)]
pub struct FrameReader {
    state: AssemblyState,
    raw: Vec<u8, MAX_FRAME_LEN>,
    expected_len: usize,
    replay: Deque<u8, REPLAY_CAPACITY>,
    // replayed bytes still to be processed that belong to a rejected frame
    rejected: usize,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    /// Creates an empty reader
    pub const fn new() -> Self {
        Self {
            state: AssemblyState::WaitingForHeader,
            raw: Vec::new(),
            expected_len: 0,
            replay: Deque::new(),
            rejected: 0,
        }
    }

    /// Current assembly state
    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// Whether no bytes are held for a frame in progress
    pub fn is_idle(&self) -> bool {
        self.state == AssemblyState::WaitingForHeader && self.replay.is_empty()
    }

    /// Drops the frame in progress and any bytes waiting to be processed
    pub fn reset(&mut self) {
        self.restart();
        self.replay.clear();
        self.rejected = 0;
    }

    /// Queues a byte received from the stream.
    ///
    /// The byte is processed by the next call to [`next_frame`](Self::next_frame).
    pub fn enqueue(&mut self, byte: u8) {
        if self.replay.push_back(byte).is_err() {
            warn!("frame reader backlog full, dropping oldest byte");
            self.replay.pop_front();
            self.rejected = self.rejected.saturating_sub(1);
            let _ = self.replay.push_back(byte);
        }
    }

    /// Processes queued bytes until a frame completes or the queue runs dry.
    ///
    /// Call this until it returns `None` before queueing more bytes.
    pub fn next_frame(&mut self) -> Option<Frame> {
        while let Some(byte) = self.replay.pop_front() {
            let inside_rejected = self.rejected > 0;
            if inside_rejected {
                self.rejected -= 1;
            }
            match self.step(byte) {
                Step::Pending => {}
                Step::Complete(frame) if inside_rejected => {
                    debug!(
                        "dropping frame {=u8:#04x} nested in a corrupt frame",
                        frame.id()
                    );
                }
                Step::Complete(frame) => {
                    trace!(
                        "rx frame {=u8:#04x} {=[u8]:02x}",
                        frame.id(),
                        frame.payload()
                    );
                    return Some(frame);
                }
                Step::Corrupt => {
                    debug!("discarding corrupt frame of {=usize} bytes", self.raw.len());
                    self.resync();
                }
            }
        }
        None
    }

    /// Queues `bytes` and collects every frame they complete
    pub fn feed<const N: usize>(&mut self, bytes: &[u8]) -> Vec<Frame, N> {
        let mut frames = Vec::new();
        for &byte in bytes {
            self.enqueue(byte);
            while let Some(frame) = self.next_frame() {
                if frames.push(frame).is_err() {
                    warn!("more frames than the caller can hold, dropping one");
                }
            }
        }
        frames
    }

    fn step(&mut self, byte: u8) -> Step {
        match self.state {
            AssemblyState::WaitingForHeader => {
                self.raw.clear();
                self.accumulate(byte);
                self.state = AssemblyState::AccumulatingLength;
                Step::Pending
            }
            AssemblyState::AccumulatingLength => {
                self.accumulate(byte);
                let declared = u16::from_be_bytes([self.raw[0], self.raw[1]]) as usize;
                if !(FRAME_OVERHEAD..=MAX_FRAME_LEN).contains(&declared) {
                    return Step::Corrupt;
                }
                self.expected_len = declared;
                self.state = AssemblyState::AccumulatingPayload;
                Step::Pending
            }
            AssemblyState::AccumulatingPayload => {
                self.accumulate(byte);
                if self.raw.len() == self.expected_len - 1 {
                    self.state = AssemblyState::VerifyingIntegrity;
                }
                Step::Pending
            }
            AssemblyState::VerifyingIntegrity => {
                self.accumulate(byte);
                let body_end = self.expected_len - 1;
                if checksum(&self.raw[..body_end]) != byte {
                    return Step::Corrupt;
                }
                let frame = Frame::new(self.raw[2], &self.raw[3..body_end]);
                self.restart();
                match frame {
                    Ok(frame) => Step::Complete(frame),
                    Err(_) => Step::Corrupt,
                }
            }
        }
    }

    fn accumulate(&mut self, byte: u8) {
        // `expected_len` never exceeds the capacity of `raw`
        let _ = self.raw.push(byte);
    }

    fn restart(&mut self) {
        self.raw.clear();
        self.expected_len = 0;
        self.state = AssemblyState::WaitingForHeader;
    }

    fn resync(&mut self) {
        let mut replayed = 0;
        for &byte in self.raw.iter().skip(1).rev() {
            if self.replay.push_front(byte).is_err() {
                break;
            }
            replayed += 1;
        }
        // the replayed bytes precede the rest of any earlier rejected span
        self.rejected += replayed;
        self.restart();
    }
}
