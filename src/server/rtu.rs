// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU server

use bytes::BytesMut;

use crate::{
    codec,
    error::{Error, Result},
    frame::rtu::ResponseAdu,
    slave::Slave,
    transport::{Timeouts, Transport},
};

use super::Service;

use crate::transport::{SerialConfig, SerialTransport};

/// A Modbus RTU server on a serial bus.
///
/// The server owns one end of the bus and answers requests addressed
/// to its slave id. Requests for other slave ids are ignored;
/// broadcast requests are processed but never answered.
#[derive(Debug)]
pub struct Server<T: Transport> {
    transport: T,
    slave: Slave,
    timeouts: Timeouts,
}

impl Server<SerialTransport> {
    /// Open the serial device and listen under the given slave id.
    pub fn new_from_config(config: &SerialConfig, slave: Slave) -> Result<Self> {
        let transport = SerialTransport::open(config)?;
        Ok(Self::new(transport, slave))
    }
}

impl<T: Transport> Server<T> {
    /// Listen on an existing transport under the given slave id.
    pub fn new(transport: T, slave: Slave) -> Self {
        Self {
            transport,
            slave,
            timeouts: Timeouts::default(),
        }
    }

    /// Replace the receive deadlines of the connection.
    pub fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.timeouts = timeouts;
    }

    /// Give the transport back, e.g. to reuse the serial port.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Answer requests until the transport fails.
    ///
    /// Corrupted frames (bad CRC, interrupted transmissions) are logged
    /// and skipped; a serial bus recovers by itself with the next
    /// request.
    pub fn serve<S: Service>(&mut self, service: &mut S) -> Result<()> {
        loop {
            let (hdr, pdu_data) =
                match codec::rtu::recv_request_frame(&mut self.transport, self.timeouts.end_of_frame)
                {
                    Ok(frame) => frame,
                    Err(err) if err.is_transport() && !matches!(err, Error::Timeout) => {
                        return Err(err);
                    }
                    Err(err) => {
                        log::warn!("Failed to receive request frame: {err}");
                        continue;
                    }
                };
            let slave = Slave(hdr.slave_id);
            let broadcast = slave.is_broadcast();
            if slave != self.slave && !broadcast {
                // Someone else on the bus is being addressed.
                continue;
            }
            let pdu = match super::dispatch(service, &pdu_data) {
                Ok(pdu) => pdu,
                Err(err) => {
                    log::warn!("Failed to process request: {err}");
                    continue;
                }
            };
            if broadcast {
                // Broadcast requests are executed but never answered,
                // exception responses included.
                continue;
            }
            let mut buf = BytesMut::new();
            codec::rtu::encode_response(ResponseAdu { hdr, pdu }, &mut buf);
            self.transport.send_all(&buf)?;
        }
    }
}
