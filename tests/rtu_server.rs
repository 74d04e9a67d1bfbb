// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg(all(feature = "rtu", feature = "server"))]

mod common;

use common::{frame_with_crc, MockTransport};
use modbus_sync::{
    server::{rtu::Server, Mapping},
    Slave,
};

/// Feeds the scripted frames to a server and returns what it answered.
/// The server loop ends when the script runs dry.
fn serve_script(mapping: &mut Mapping, script: &[&[u8]]) -> Vec<u8> {
    let transport = MockTransport::new();
    for frame in script {
        transport.push_response(frame);
    }
    let handle = transport.clone();
    let mut server = Server::new(transport, Slave(0x11));
    server.serve(mapping).unwrap_err();
    handle.sent()
}

#[test]
fn answers_read_holding_registers() {
    let mut mapping = Mapping::new(0, 0, 0x80, 0);
    mapping.holding_registers_mut()[0x6B..0x6E].copy_from_slice(&[0x022B, 0x0000, 0x0064]);

    let sent = serve_script(
        &mut mapping,
        &[&[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03, 0x76, 0x87]],
    );
    assert_eq!(
        sent,
        vec![0x11, 0x03, 0x06, 0x02, 0x2B, 0x00, 0x00, 0x00, 0x64, 0xC8, 0xBA]
    );
}

#[test]
fn unknown_function_code_is_an_illegal_function() {
    let mut mapping = Mapping::new(8, 8, 8, 8);
    let sent = serve_script(&mut mapping, &[&frame_with_crc(&[0x11, 0x09, 0x00, 0x01])]);
    assert_eq!(sent, frame_with_crc(&[0x11, 0x89, 0x01]));
}

#[test]
fn out_of_range_read_is_an_illegal_data_address() {
    let mut mapping = Mapping::new(8, 8, 8, 8);
    let sent = serve_script(
        &mut mapping,
        &[&frame_with_crc(&[0x11, 0x01, 0x00, 0x05, 0x00, 0x04])],
    );
    assert_eq!(sent, frame_with_crc(&[0x11, 0x81, 0x02]));
}

#[test]
fn invalid_coil_state_is_an_illegal_data_value() {
    let mut mapping = Mapping::new(8, 8, 8, 8);
    let sent = serve_script(
        &mut mapping,
        &[&frame_with_crc(&[0x11, 0x05, 0x00, 0x00, 0xAB, 0xCD])],
    );
    assert_eq!(sent, frame_with_crc(&[0x11, 0x85, 0x03]));
    assert!(!mapping.coils()[0]);
}

#[test]
fn frames_for_other_slaves_are_ignored() {
    let mut mapping = Mapping::new(8, 8, 8, 8);
    let sent = serve_script(
        &mut mapping,
        &[&frame_with_crc(&[0x22, 0x05, 0x00, 0x00, 0xFF, 0x00])],
    );
    assert!(sent.is_empty());
    assert!(!mapping.coils()[0]);
}

#[test]
fn broadcast_writes_are_executed_but_never_answered() {
    let mut mapping = Mapping::new(8, 8, 8, 8);
    let sent = serve_script(
        &mut mapping,
        &[&frame_with_crc(&[0xFF, 0x05, 0x00, 0x02, 0xFF, 0x00])],
    );
    assert!(sent.is_empty());
    assert!(mapping.coils()[2]);
}

#[test]
fn broadcast_errors_stay_silent() {
    // Even a blatantly illegal broadcast request must not produce an
    // exception response.
    let mut mapping = Mapping::new(8, 8, 8, 8);
    let sent = serve_script(
        &mut mapping,
        &[&frame_with_crc(&[0xFF, 0x05, 0x00, 0x40, 0xFF, 0x00])],
    );
    assert!(sent.is_empty());
}

#[test]
fn corrupted_frames_are_skipped() {
    let mut request = frame_with_crc(&[0x11, 0x05, 0x00, 0x01, 0xFF, 0x00]);
    request[3] ^= 0x01;
    let good_request = frame_with_crc(&[0x11, 0x05, 0x00, 0x01, 0xFF, 0x00]);

    let mut mapping = Mapping::new(8, 8, 8, 8);
    let sent = serve_script(&mut mapping, &[&request, &good_request]);

    // Only the intact frame is answered.
    assert_eq!(sent, good_request);
    assert!(mapping.coils()[1]);
}

#[test]
fn multiple_requests_in_sequence() {
    let mut mapping = Mapping::new(16, 0, 16, 0);
    let write = frame_with_crc(&[0x11, 0x10, 0x00, 0x00, 0x00, 0x02, 0x04, 0x12, 0x34, 0x56, 0x78]);
    let read = frame_with_crc(&[0x11, 0x03, 0x00, 0x00, 0x00, 0x02]);
    let sent = serve_script(&mut mapping, &[&write, &read]);

    let mut expected = frame_with_crc(&[0x11, 0x10, 0x00, 0x00, 0x00, 0x02]);
    expected.extend_from_slice(&frame_with_crc(&[
        0x11, 0x03, 0x04, 0x12, 0x34, 0x56, 0x78,
    ]));
    assert_eq!(sent, expected);
    assert_eq!(&mapping.holding_registers()[..2], &[0x1234, 0x5678]);
}
