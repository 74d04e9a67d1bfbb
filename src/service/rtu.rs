// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::BytesMut;

use crate::{
    client::ErrorHandling,
    codec,
    error::{Error, Result},
    frame::{rtu::*, Request, Response},
    slave::{Slave, SlaveContext},
    transport::{Timeouts, Transport},
};

use super::{broadcast_echo, check_broadcast, verify_response_function};

/// Modbus RTU client
#[derive(Debug)]
pub(crate) struct Client<T: Transport> {
    transport: T,
    slave: Slave,
    timeouts: Timeouts,
    error_handling: ErrorHandling,
    debug: bool,
}

impl<T: Transport> Client<T> {
    pub(crate) fn new(transport: T, slave: Slave) -> Self {
        Self {
            transport,
            slave,
            timeouts: Timeouts::default(),
            error_handling: ErrorHandling::default(),
            debug: false,
        }
    }

    fn call(&mut self, req: Request) -> Result<Response> {
        codec::validate_request(&req)?;
        let broadcast = self.slave.is_broadcast();
        if broadcast {
            check_broadcast(&req)?;
        }
        let hdr = Header {
            slave_id: self.slave.into(),
        };
        let function = req.function_code();
        let echo = broadcast.then(|| broadcast_echo(&req));

        let mut buf = BytesMut::new();
        codec::rtu::encode_request(RequestAdu { hdr, pdu: req.into() }, &mut buf);
        if self.debug {
            log::debug!("SEND {:02X?}", &buf[..]);
        }

        let result = self.transact(&buf, hdr, function, echo);
        if let Err(err) = &result {
            if err.is_transport() {
                self.recover();
            }
        }
        result
    }

    fn transact(
        &mut self,
        frame: &[u8],
        req_hdr: Header,
        function: u8,
        echo: Option<Response>,
    ) -> Result<Response> {
        self.transport.send_all(frame)?;
        if let Some(echo) = echo {
            // Nobody answers a broadcast.
            return Ok(echo);
        }
        let ResponseAdu { hdr, pdu } = codec::rtu::recv_response_adu(&mut self.transport, &self.timeouts)?;
        if hdr != req_hdr {
            return Err(Error::InvalidData("slave address mismatch"));
        }
        match pdu.0 {
            Ok(rsp) => {
                verify_response_function(function, &rsp)?;
                if self.debug {
                    log::debug!("RECV {rsp:?}");
                }
                Ok(rsp)
            }
            Err(exception) => Err(Error::Exception(exception)),
        }
    }

    /// Bring the channel back to a byte boundary after a failure.
    fn recover(&mut self) {
        match self.error_handling {
            ErrorHandling::FlushOrReconnectOnError => {
                if let Err(err) = self
                    .transport
                    .flush()
                    .and_then(|()| self.transport.reconnect())
                {
                    log::warn!("Failed to recover the connection: {err}");
                }
            }
            ErrorHandling::NopOnError => (),
        }
    }
}

impl<T: Transport> SlaveContext for Client<T> {
    fn set_slave(&mut self, slave: Slave) {
        self.slave = slave;
    }
}

impl<T: Transport> crate::client::Client for Client<T> {
    fn call(&mut self, req: Request) -> Result<Response> {
        Client::call(self, req)
    }

    fn flush(&mut self) -> Result<()> {
        self.transport.flush()
    }

    fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.timeouts = timeouts;
    }

    fn set_error_handling(&mut self, error_handling: ErrorHandling) {
        self.error_handling = error_handling;
    }

    fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }
}
