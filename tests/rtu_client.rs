// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg(feature = "rtu")]

mod common;

use common::{frame_with_crc, MockTransport};
use modbus_sync::{
    client::{rtu, Client as _, Reader as _, Writer as _},
    Error, Slave, SlaveContext as _,
};

// Reading three holding registers from slave 0x11, byte for byte as
// printed in countless protocol manuals.
const READ_HOLDING_REQUEST: &[u8] = &[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03, 0x76, 0x87];
const READ_HOLDING_RESPONSE: &[u8] = &[
    0x11, 0x03, 0x06, 0x02, 0x2B, 0x00, 0x00, 0x00, 0x64, 0xC8, 0xBA,
];

#[test]
fn read_holding_registers_roundtrip() {
    let transport = MockTransport::replying(READ_HOLDING_RESPONSE);
    let handle = transport.clone();
    let mut ctx = rtu::attach_slave(transport, Slave(0x11));

    let words = ctx.read_holding_registers(0x6B, 3).unwrap();
    assert_eq!(words, vec![0x022B, 0x0000, 0x0064]);
    assert_eq!(handle.sent(), READ_HOLDING_REQUEST);
    assert_eq!(handle.pending_len(), 0);
}

#[test]
fn server_exception_is_returned_verbatim() {
    let transport = MockTransport::replying(&frame_with_crc(&[0x11, 0x83, 0x01]));
    let mut ctx = rtu::attach_slave(transport, Slave(0x11));

    let err = ctx.read_holding_registers(0x6B, 3).unwrap_err();
    assert!(matches!(err, Error::Exception(_)));
    assert_eq!(err.code(), -1);
}

#[test]
fn corrupted_crc_is_rejected() {
    let mut response = READ_HOLDING_RESPONSE.to_vec();
    response[4] ^= 0x01; // flip one payload bit
    let transport = MockTransport::replying(&response);
    let mut ctx = rtu::attach_slave(transport, Slave(0x11));

    let err = ctx.read_holding_registers(0x6B, 3).unwrap_err();
    assert!(matches!(err, Error::InvalidCrc { .. }));
    assert_eq!(err.code(), -17);
}

#[test]
fn missing_response_times_out() {
    let transport = MockTransport::new();
    let mut ctx = rtu::attach_slave(transport, Slave(0x11));

    let err = ctx.read_holding_registers(0x6B, 3).unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert_eq!(err.code(), -19);
}

#[test]
fn transport_failure_triggers_a_flush() {
    let transport = MockTransport::new();
    let handle = transport.clone();
    let mut ctx = rtu::attach_slave(transport, Slave(0x11));

    ctx.read_holding_registers(0x6B, 3).unwrap_err();
    assert_eq!(handle.flushes(), 1);

    ctx.set_error_handling(modbus_sync::client::ErrorHandling::NopOnError);
    ctx.read_holding_registers(0x6B, 3).unwrap_err();
    assert_eq!(handle.flushes(), 1);
}

#[test]
fn response_from_wrong_slave_is_rejected() {
    let mut body = READ_HOLDING_RESPONSE[..9].to_vec();
    body[0] = 0x12;
    let transport = MockTransport::replying(&frame_with_crc(&body));
    let mut ctx = rtu::attach_slave(transport, Slave(0x11));

    let err = ctx.read_holding_registers(0x6B, 3).unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));
    assert_eq!(err.code(), -16);
}

#[test]
fn oversized_quantities_are_rejected_locally() {
    let transport = MockTransport::new();
    let handle = transport.clone();
    let mut ctx = rtu::attach_slave(transport, Slave(0x11));

    assert!(matches!(
        ctx.read_coils(0, 2001).unwrap_err(),
        Error::InvalidData(_)
    ));
    assert!(matches!(
        ctx.read_holding_registers(0, 126).unwrap_err(),
        Error::InvalidData(_)
    ));
    assert!(matches!(
        ctx.write_multiple_registers(0, &[0; 124]).unwrap_err(),
        Error::InvalidData(_)
    ));
    assert!(matches!(
        ctx.write_multiple_coils(0, &[true; 1969]).unwrap_err(),
        Error::InvalidData(_)
    ));

    // Nothing was put on the wire.
    assert!(handle.sent().is_empty());
}

#[test]
fn broadcast_write_returns_without_a_response() {
    let transport = MockTransport::new();
    let handle = transport.clone();
    let mut ctx = rtu::attach_slave(transport, Slave::broadcast());

    // Nothing is scripted, so awaiting any response would time out.
    ctx.write_single_coil(0x0B, true).unwrap();
    assert_eq!(
        handle.sent(),
        frame_with_crc(&[0xFF, 0x05, 0x00, 0x0B, 0xFF, 0x00])
    );
}

#[test]
fn broadcast_read_is_rejected_locally() {
    let transport = MockTransport::new();
    let handle = transport.clone();
    let mut ctx = rtu::attach_slave(transport, Slave::broadcast());

    assert!(matches!(
        ctx.read_coils(0, 1).unwrap_err(),
        Error::InvalidData(_)
    ));
    assert!(matches!(
        ctx.read_exception_status().unwrap_err(),
        Error::InvalidData(_)
    ));
    assert!(handle.sent().is_empty());
}

#[test]
fn slave_can_be_changed_between_calls() {
    let transport = MockTransport::replying(READ_HOLDING_RESPONSE);
    let mut ctx = rtu::attach_slave(transport, Slave(0x22));
    ctx.set_slave(Slave(0x11));
    let words = ctx.read_holding_registers(0x6B, 3).unwrap();
    assert_eq!(words.len(), 3);
}
