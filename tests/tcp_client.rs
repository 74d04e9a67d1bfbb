// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg(feature = "tcp")]

mod common;

use common::MockTransport;
use modbus_sync::{
    client::{tcp, Reader as _, Writer as _},
    Error, Slave,
};

#[test]
fn read_coils_roundtrip() {
    // Transaction identifiers start at zero on a fresh connection.
    let transport = MockTransport::replying(&[
        0x00, 0x00, // transaction id
        0x00, 0x00, // protocol id
        0x00, 0x06, // length
        0x11, // unit id
        0x01, 0x03, 0xCD, 0x6B, 0x05, // PDU
    ]);
    let handle = transport.clone();
    let mut ctx = tcp::attach_slave(transport, Slave(0x11));

    let coils = ctx.read_coils(0x13, 0x13).unwrap();
    assert_eq!(coils.len(), 0x13);
    assert!(coils[0]);
    assert_eq!(
        handle.sent(),
        vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x11, 0x01, 0x00, 0x13, 0x00, 0x13]
    );
}

#[test]
fn transaction_ids_are_monotonic() {
    let transport = MockTransport::new();
    let handle = transport.clone();
    transport.push_response(&[
        0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x11, 0x05, 0x00, 0x01, 0xFF, 0x00,
    ]);
    transport.push_response(&[
        0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x11, 0x05, 0x00, 0x02, 0xFF, 0x00,
    ]);
    let mut ctx = tcp::attach_slave(transport, Slave(0x11));

    ctx.write_single_coil(0x01, true).unwrap();
    ctx.write_single_coil(0x02, true).unwrap();

    let sent = handle.sent();
    assert_eq!(&sent[0..2], &[0x00, 0x00]);
    assert_eq!(&sent[12..14], &[0x00, 0x01]);
}

#[test]
fn mismatched_transaction_id_is_discarded() {
    let transport = MockTransport::replying(&[
        0x00, 0x05, // transaction id of somebody else
        0x00, 0x00, 0x00, 0x06, 0x11, 0x01, 0x03, 0xCD, 0x6B, 0x05,
    ]);
    let mut ctx = tcp::attach_slave(transport, Slave(0x11));

    let err = ctx.read_coils(0x13, 0x13).unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));
    assert_eq!(err.code(), -16);
}

#[test]
fn mismatched_unit_id_is_discarded() {
    let transport = MockTransport::replying(&[
        0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x12, 0x01, 0x03, 0xCD, 0x6B, 0x05,
    ]);
    let mut ctx = tcp::attach_slave(transport, Slave(0x11));

    let err = ctx.read_coils(0x13, 0x13).unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));
}

#[test]
fn nonzero_protocol_id_is_rejected() {
    let transport = MockTransport::replying(&[
        0x00, 0x00, 0x12, 0x34, 0x00, 0x06, 0x11, 0x01, 0x03, 0xCD, 0x6B, 0x05,
    ]);
    let mut ctx = tcp::attach_slave(transport, Slave(0x11));

    let err = ctx.read_coils(0x13, 0x13).unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));
}

#[test]
fn server_exception_is_returned_verbatim() {
    let transport = MockTransport::replying(&[
        0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x11, 0x83, 0x02,
    ]);
    let mut ctx = tcp::attach_slave(transport, Slave(0x11));

    let err = ctx.read_holding_registers(0x6B, 3).unwrap_err();
    assert!(matches!(err, Error::Exception(_)));
    assert_eq!(err.code(), -2);
}

#[test]
fn missing_response_times_out() {
    let transport = MockTransport::new();
    let mut ctx = tcp::attach_slave(transport, Slave(0x11));

    let err = ctx.read_coils(0, 1).unwrap_err();
    assert!(matches!(err, Error::Timeout));
}

#[test]
fn broadcast_write_returns_without_a_response() {
    let transport = MockTransport::new();
    let handle = transport.clone();
    let mut ctx = tcp::attach_slave(transport, Slave::broadcast());

    ctx.write_multiple_registers(0x10, &[0x0102, 0x0304]).unwrap();
    assert_eq!(
        handle.sent(),
        vec![
            0x00, 0x00, // transaction id
            0x00, 0x00, // protocol id
            0x00, 0x0B, // length
            0xFF, // unit id
            0x10, 0x00, 0x10, 0x00, 0x02, 0x04, 0x01, 0x02, 0x03, 0x04,
        ]
    );
}

#[test]
fn broadcast_read_is_rejected_locally() {
    let transport = MockTransport::new();
    let handle = transport.clone();
    let mut ctx = tcp::attach_slave(transport, Slave::broadcast());

    let err = ctx.read_holding_registers(0, 1).unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));
    assert!(handle.sent().is_empty());
}
