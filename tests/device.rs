mod common;

use common::{device, running_device, split_frames};
use embit_lora::{
    Device, Error, SessionState, BAUD_RATE, DATA_INDICATION_ID, MAX_DATA_LEN,
};

#[test]
fn provisioning_start_and_confirmed_send() {
    let (mut device, stream, _delay) = device();

    device.set_dev_address(&[0x01, 0x02, 0x03, 0x04]).unwrap();
    device.set_app_key(&[0u8; 16]).unwrap();
    device.set_nwks_key(&[0u8; 16]).unwrap();
    assert_eq!(device.state(), SessionState::Configuring);

    // the modem answers every provisioning command before the start response
    stream.push_frame(0xA1, &[0x00]);
    stream.push_frame(0xA7, &[0x00]);
    stream.push_frame(0xA6, &[0x00]);
    stream.push_frame(0xB0, &[0x00]);
    assert!(device.start().unwrap());
    assert_eq!(device.state(), SessionState::Running);

    stream.push_frame(0xD0, &[0x00]);
    assert!(device.send(&[0xAA, 0xBB], true).unwrap());
    assert_eq!(device.state(), SessionState::Running);

    let written = split_frames(&stream.take_tx());
    assert_eq!(
        written,
        vec![
            (0x21, vec![0x01, 0x02, 0x03, 0x04]),
            (0x27, vec![0u8; 16]),
            (0x26, vec![0u8; 16]),
            (0x30, vec![]),
            (0x50, vec![0x01, 0x01, 0xAA, 0xBB]),
        ]
    );
    assert_eq!(stream.rx_remaining(), 0);
}

#[test]
fn provisioning_frames_carry_the_supplied_bytes() {
    let (mut device, stream, _delay) = device();
    let address = [0xDE, 0xAD, 0xBE, 0xEF];
    let app_key: [u8; 16] = core::array::from_fn(|i| i as u8);
    let network_key: [u8; 16] = core::array::from_fn(|i| 0xF0 ^ i as u8);

    device.set_dev_address(&address).unwrap();
    device.set_app_key(&app_key).unwrap();
    device.set_nwks_key(&network_key).unwrap();
    device.set_lorawan(true).unwrap();
    device.set_private_network(false).unwrap();

    let written = split_frames(&stream.take_tx());
    assert_eq!(written[0], (0x21, address.to_vec()));
    assert_eq!(written[1], (0x27, app_key.to_vec()));
    assert_eq!(written[2], (0x26, network_key.to_vec()));
    assert_eq!(written[3], (0x25, vec![0xA0]));
    assert_eq!(written[4], (0x25, vec![0x00]));
}

#[test]
fn wrong_length_arguments_write_nothing() {
    let (mut device, stream, _delay) = device();

    assert_eq!(
        device.set_dev_address(&[0x01, 0x02, 0x03]),
        Err(Error::InvalidLength {
            expected: 4,
            actual: 3
        })
    );
    assert_eq!(
        device.set_app_key(&[0u8; 15]),
        Err(Error::InvalidLength {
            expected: 16,
            actual: 15
        })
    );
    assert_eq!(
        device.set_nwks_key(&[0u8; 17]),
        Err(Error::InvalidLength {
            expected: 16,
            actual: 17
        })
    );

    assert!(stream.take_tx().is_empty());
    assert_eq!(device.state(), SessionState::Uninitialized);
}

#[test]
fn start_requires_an_address() {
    let (mut device, stream, _delay) = device();
    device.set_app_key(&[0u8; 16]).unwrap();
    stream.take_tx();

    assert_eq!(device.start(), Err(Error::NotProvisioned));
    assert!(stream.take_tx().is_empty());
}

#[test]
fn refused_start_leaves_state_unchanged() {
    let (mut device, stream, _delay) = device();
    device.set_dev_address(&[0x01, 0x02, 0x03, 0x04]).unwrap();

    stream.push_frame(0xB0, &[0x01]);
    assert!(!device.start().unwrap());
    assert_eq!(device.state(), SessionState::Configuring);
}

#[test]
fn silent_modem_times_out_start() {
    let (mut device, _stream, delay) = device();
    device.set_dev_address(&[0x01, 0x02, 0x03, 0x04]).unwrap();

    assert!(!device.start().unwrap());
    assert_eq!(device.state(), SessionState::Configuring);
    assert!(delay.waited_us() >= 20_000);
}

#[test]
fn start_twice_is_rejected() {
    let (mut device, _stream, _delay) = running_device();
    assert_eq!(
        device.start(),
        Err(Error::InvalidState(SessionState::Running))
    );
}

#[test]
fn provisioning_is_rejected_while_running() {
    let (mut device, stream, _delay) = running_device();
    assert_eq!(
        device.set_dev_address(&[0x05, 0x06, 0x07, 0x08]),
        Err(Error::InvalidState(SessionState::Running))
    );
    assert!(stream.take_tx().is_empty());
}

#[test]
fn send_requires_running_session() {
    let (mut device, stream, _delay) = device();
    assert_eq!(
        device.send(&[0x01], false),
        Err(Error::InvalidState(SessionState::Uninitialized))
    );
    assert!(stream.take_tx().is_empty());
}

#[test]
fn negative_acknowledgement_fails_send() {
    let (mut device, stream, _delay) = running_device();
    stream.push_frame(0xD0, &[0x02]);
    assert!(!device.send(&[0xAA], true).unwrap());
}

#[test]
fn missing_acknowledgement_fails_send() {
    let (mut device, _stream, delay) = running_device();
    assert!(!device.send(&[0xAA], true).unwrap());
    assert!(delay.waited_us() >= 20_000);
}

#[test]
fn unconfirmed_send_does_not_wait() {
    let (mut device, stream, delay) = running_device();
    let waited_before = delay.waited_us();

    assert!(device.send(&[0xAA, 0xBB], false).unwrap());
    assert_eq!(delay.waited_us(), waited_before);
    assert_eq!(
        split_frames(&stream.take_tx()),
        vec![(0x50, vec![0x00, 0x01, 0xAA, 0xBB])]
    );
}

#[test]
fn segments_are_sent_in_one_frame() {
    let (mut device, stream, _delay) = running_device();
    assert!(device.send_segments(&[0x10, 0x11], &[0x20], false).unwrap());
    assert_eq!(
        split_frames(&stream.take_tx()),
        vec![(0x50, vec![0x00, 0x01, 0x10, 0x11, 0x20])]
    );
}

#[test]
fn framing_bytes_in_payload_are_sent_verbatim() {
    let (mut device, stream, _delay) = running_device();
    let payload = [0x00, 0x04, 0xB0, 0xB4, 0xFF];
    assert!(device.send(&payload, false).unwrap());

    let written = split_frames(&stream.take_tx());
    assert_eq!(written.len(), 1);
    assert_eq!(&written[0].1[2..], &payload);
}

#[test]
fn oversized_payload_is_rejected_before_writing() {
    let (mut device, stream, _delay) = running_device();
    let payload = vec![0u8; MAX_DATA_LEN + 1];
    assert_eq!(
        device.send(&payload, true),
        Err(Error::PayloadTooLarge {
            max: MAX_DATA_LEN,
            actual: MAX_DATA_LEN + 1
        })
    );
    assert!(stream.take_tx().is_empty());
}

#[test]
fn stale_responses_do_not_satisfy_a_send() {
    let (mut device, stream, _delay) = running_device();
    // a late answer to a provisioning command, then the real acknowledgement
    stream.push_frame(0xA1, &[0x05]);
    stream.push_frame(0xD0, &[0x00]);
    assert!(device.send(&[0x01], true).unwrap());
}

#[test]
fn process_incoming_delivers_indications() {
    let (mut device, stream, _delay) = running_device();
    stream.push_frame(DATA_INDICATION_ID, &[0x02, 0xCA, 0xFE]);
    stream.push_frame(DATA_INDICATION_ID, &[0x03, 0x01]);

    let mut received = Vec::new();
    let delivered = device
        .process_incoming(|packet| received.push((packet.port(), packet.data().to_vec())))
        .unwrap();

    assert_eq!(delivered, 2);
    assert_eq!(
        received,
        vec![(2, vec![0xCA, 0xFE]), (3, vec![0x01])]
    );
}

#[test]
fn process_incoming_requires_running_session() {
    let (mut device, _stream, _delay) = device();
    assert_eq!(
        device.process_incoming(|_| {}),
        Err(Error::InvalidState(SessionState::Uninitialized))
    );
}

#[test]
fn process_incoming_never_blocks() {
    let (mut device, _stream, delay) = running_device();
    let waited_before = delay.waited_us();
    assert_eq!(device.process_incoming(|_| {}).unwrap(), 0);
    assert_eq!(delay.waited_us(), waited_before);
}

#[test]
fn chunked_arrival_gives_the_same_packets() {
    let mut wire = Vec::new();
    wire.extend_from_slice(&embit_lora::frame::encode_frame(DATA_INDICATION_ID, &[&[0x01, 0x10, 0x20]]).unwrap());
    wire.extend_from_slice(&embit_lora::frame::encode_frame(0xD0, &[&[0x00]]).unwrap());
    wire.extend_from_slice(&embit_lora::frame::encode_frame(DATA_INDICATION_ID, &[&[0x04, 0x30]]).unwrap());

    let collect = |chunk_size: usize| {
        let (mut device, stream, _delay) = running_device();
        let mut received = Vec::new();
        for chunk in wire.chunks(chunk_size) {
            stream.push_rx(chunk);
            device
                .process_incoming(|packet| received.push((packet.port(), packet.data().to_vec())))
                .unwrap();
        }
        received
    };

    let expected = collect(wire.len());
    assert_eq!(expected, vec![(1, vec![0x10, 0x20]), (4, vec![0x30])]);
    for chunk_size in 1..wire.len() {
        assert_eq!(collect(chunk_size), expected, "chunk size {chunk_size}");
    }
}

#[test]
fn corrupt_indication_is_never_delivered() {
    let (mut device, stream, _delay) = running_device();
    let mut bad = embit_lora::frame::encode_frame(DATA_INDICATION_ID, &[&[0x01, 0xAA]]).unwrap();
    let last = bad.len() - 1;
    bad[last] ^= 0x5A;
    stream.push_rx(&bad);
    stream.push_frame(DATA_INDICATION_ID, &[0x01, 0xBB]);

    let mut received = Vec::new();
    device
        .process_incoming(|packet| received.push(packet.data().to_vec()))
        .unwrap();
    assert_eq!(received, vec![vec![0xBB]]);
}

#[test]
fn frame_inside_a_corrupt_indication_is_never_delivered() {
    let (mut device, stream, _delay) = running_device();
    let inner = embit_lora::frame::encode_frame(DATA_INDICATION_ID, &[&[0x07, 0xAA]]).unwrap();
    let mut payload = vec![0x01];
    payload.extend_from_slice(&inner);
    let mut bad = embit_lora::frame::encode_frame(DATA_INDICATION_ID, &[&payload]).unwrap();
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    stream.push_rx(&bad);
    stream.push_frame(DATA_INDICATION_ID, &[0x02, 0xBB]);

    let mut received = Vec::new();
    device
        .process_incoming(|packet| received.push((packet.port(), packet.data().to_vec())))
        .unwrap();
    assert_eq!(received, vec![(2, vec![0xBB])]);
}

#[test]
fn unrelated_frames_cannot_stretch_a_send() {
    let (mut device, stream, delay) = running_device();
    let waited_before = delay.waited_us();
    for _ in 0..1_000 {
        stream.push_frame(0xA1, &[0x00]);
    }
    stream.push_frame(0xD0, &[0x00]);

    assert!(!device.send(&[0x01], true).unwrap());
    assert!(stream.rx_remaining() > 0);
    assert_eq!(delay.waited_us(), waited_before);
}

#[test]
fn endless_garbage_does_not_block_process_incoming() {
    let (mut device, stream, _delay) = running_device();
    stream.push_rx(&[0xFF; 4_096]);

    assert_eq!(device.process_incoming(|_| {}).unwrap(), 0);
    assert!(stream.rx_remaining() > 0);
}

#[test]
fn indication_returned_by_read_frame_still_reaches_process_incoming() {
    let (mut device, stream, _delay) = running_device();
    stream.push_frame(DATA_INDICATION_ID, &[0x04, 0x55]);

    assert_eq!(device.read_frame().map(|frame| frame.id()), Ok(DATA_INDICATION_ID));
    assert_eq!(device.pending_packets(), 1);

    let mut received = Vec::new();
    device
        .process_incoming(|packet| received.push((packet.port(), packet.data().to_vec())))
        .unwrap();
    assert_eq!(received, vec![(4, vec![0x55])]);
}

#[test]
fn indications_during_a_send_are_delivered_later() {
    let (mut device, stream, _delay) = running_device();
    stream.push_frame(DATA_INDICATION_ID, &[0x09, 0x42]);
    stream.push_frame(0xD0, &[0x00]);

    assert!(device.send(&[0x01], true).unwrap());
    assert_eq!(device.pending_packets(), 1);

    let mut received = Vec::new();
    assert_eq!(
        device
            .process_incoming(|packet| received.push((packet.port(), packet.data().to_vec())))
            .unwrap(),
        1
    );
    assert_eq!(received, vec![(9, vec![0x42])]);
    assert_eq!(device.pending_packets(), 0);
}

#[test]
fn indexed_access_to_last_frame() {
    let (mut device, stream, _delay) = running_device();
    assert_eq!(device.read_packet_byte(0), Ok(0x00));
    assert_eq!(
        device.read_packet_byte(1),
        Err(Error::OutOfRange { index: 1, len: 1 })
    );

    stream.push_frame(0x70, &[0x11, 0x22, 0x33]);
    let frame = device.read_frame().unwrap();
    assert_eq!(frame.id(), 0x70);
    assert_eq!(device.read_packet_byte(2), Ok(0x33));
    assert_eq!(
        device.read_packet_byte(3),
        Err(Error::OutOfRange { index: 3, len: 3 })
    );
}

#[test]
fn indexed_access_without_a_frame_is_out_of_range() {
    let (device, _stream, _delay) = device();
    assert_eq!(
        device.read_packet_byte(0),
        Err(Error::OutOfRange { index: 0, len: 0 })
    );
}

#[test]
fn read_frame_times_out() {
    let (mut device, _stream, _delay) = device();
    assert_eq!(device.read_frame().map(|frame| frame.id()), Err(Error::Timeout));
}

#[test]
fn stop_always_marks_the_session_stopped() {
    let (mut device, stream, _delay) = running_device();
    device.stop().unwrap();
    assert_eq!(device.state(), SessionState::Stopped);
    assert_eq!(split_frames(&stream.take_tx()), vec![(0x31, vec![])]);

    assert_eq!(
        device.send(&[0x01], false),
        Err(Error::InvalidState(SessionState::Stopped))
    );
}

#[test]
fn baud_rate_is_fixed() {
    assert_eq!(
        Device::<common::MockStream, common::MockDelay>::default_baud_rate(),
        BAUD_RATE
    );
    assert_eq!(BAUD_RATE, 9600);
}

#[test]
fn stream_can_be_lent_to_the_driver() {
    let mut stream = common::MockStream::default();
    let mut delay = common::MockDelay::default();
    {
        let mut device = Device::with_config(&mut stream, &mut delay, common::test_config());
        device.set_dev_address(&[0x01, 0x02, 0x03, 0x04]).unwrap();
    }
    assert_eq!(
        split_frames(&stream.take_tx()),
        vec![(0x21, vec![0x01, 0x02, 0x03, 0x04])]
    );
}
