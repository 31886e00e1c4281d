#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal_nb::serial::{ErrorType, Read, Write};
use embit_lora::frame::encode_frame;
use embit_lora::{Config, Device};

#[derive(Default)]
struct Wire {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

/// In-memory serial port; clones share the same buffers
#[derive(Clone, Default)]
pub struct MockStream {
    wire: Rc<RefCell<Wire>>,
}

impl MockStream {
    /// Makes bytes available for the driver to read
    pub fn push_rx(&self, bytes: &[u8]) {
        self.wire.borrow_mut().rx.extend(bytes.iter().copied());
    }

    /// Queues one encoded frame for the driver to read
    pub fn push_frame(&self, id: u8, payload: &[u8]) {
        self.push_rx(&encode_frame(id, &[payload]).unwrap());
    }

    /// Everything the driver wrote so far, clearing the record
    pub fn take_tx(&self) -> Vec<u8> {
        std::mem::take(&mut self.wire.borrow_mut().tx)
    }

    pub fn rx_remaining(&self) -> usize {
        self.wire.borrow().rx.len()
    }
}

impl ErrorType for MockStream {
    type Error = Infallible;
}

impl Read<u8> for MockStream {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.wire
            .borrow_mut()
            .rx
            .pop_front()
            .ok_or(nb::Error::WouldBlock)
    }
}

impl Write<u8> for MockStream {
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.wire.borrow_mut().tx.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}

/// Delay that returns immediately and records how long it was asked to wait
#[derive(Clone, Default)]
pub struct MockDelay {
    waited_ns: Rc<RefCell<u64>>,
}

impl MockDelay {
    pub fn waited_us(&self) -> u64 {
        *self.waited_ns.borrow() / 1_000
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        *self.waited_ns.borrow_mut() += u64::from(ns);
    }
}

impl embedded_hal_async::delay::DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        *self.waited_ns.borrow_mut() += u64::from(ns);
    }
}

/// Short timeout so that tests waiting for a missing response finish fast
pub fn test_config() -> Config {
    Config::default()
        .with_response_timeout_ms(20)
        .with_poll_interval_us(1_000)
}

pub fn device() -> (Device<MockStream, MockDelay>, MockStream, MockDelay) {
    let stream = MockStream::default();
    let delay = MockDelay::default();
    let device = Device::with_config(stream.clone(), delay.clone(), test_config());
    (device, stream, delay)
}

/// Device that has been provisioned and started
pub fn running_device() -> (Device<MockStream, MockDelay>, MockStream, MockDelay) {
    let (mut device, stream, delay) = device();
    device.set_dev_address(&[0x01, 0x02, 0x03, 0x04]).unwrap();
    stream.push_frame(0xB0, &[0x00]);
    assert!(device.start().unwrap());
    stream.take_tx();
    (device, stream, delay)
}

/// Splits written bytes into frames, checking length and checksum
pub fn split_frames(mut bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let (frame, rest) = bytes.split_at(len);
        let sum = frame[..len - 1]
            .iter()
            .fold(0u8, |sum, byte| sum.wrapping_add(*byte));
        assert_eq!(sum, frame[len - 1], "bad checksum in {frame:02x?}");
        frames.push((frame[2], frame[3..len - 1].to_vec()));
        bytes = rest;
    }
    frames
}
