// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use modbus_sync::{Error, Result, Transport};

/// A scripted in-memory channel: everything the engine sends is
/// recorded, everything the peer would answer is queued up front.
///
/// The buffers are shared so that tests can keep a handle after the
/// transport has been moved into a client context or server.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pending: Rc<RefCell<VecDeque<u8>>>,
    sent: Rc<RefCell<Vec<u8>>>,
    flushes: Rc<RefCell<usize>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replying(response: &[u8]) -> Self {
        let transport = Self::new();
        transport.push_response(response);
        transport
    }

    pub fn push_response(&self, response: &[u8]) {
        self.pending.borrow_mut().extend(response);
    }

    pub fn sent(&self) -> Vec<u8> {
        self.sent.borrow().clone()
    }

    pub fn clear_sent(&self) {
        self.sent.borrow_mut().clear();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn flushes(&self) -> usize {
        *self.flushes.borrow()
    }
}

impl Transport for MockTransport {
    fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.sent.borrow_mut().extend_from_slice(bytes);
        Ok(())
    }

    fn recv_exact(&mut self, buf: &mut [u8], deadline: Option<Duration>) -> Result<usize> {
        let mut pending = self.pending.borrow_mut();
        let mut filled = 0;
        while filled < buf.len() {
            let Some(byte) = pending.pop_front() else {
                return if deadline.is_some() {
                    // No more scripted bytes: the deadline expires.
                    Ok(filled)
                } else {
                    Err(Error::ConnectionClosed)
                };
            };
            buf[filled] = byte;
            filled += 1;
        }
        Ok(filled)
    }

    fn flush(&mut self) -> Result<()> {
        self.pending.borrow_mut().clear();
        *self.flushes.borrow_mut() += 1;
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Appends the Modbus CRC to a raw RTU frame body.
pub fn frame_with_crc(body: &[u8]) -> Vec<u8> {
    let mut crc: u16 = 0xFFFF;
    for byte in body {
        crc ^= u16::from(*byte);
        for _ in 0..8 {
            let odd = crc & 0x0001 != 0;
            crc >>= 1;
            if odd {
                crc ^= 0xA001;
            }
        }
    }
    let mut frame = body.to_vec();
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}
