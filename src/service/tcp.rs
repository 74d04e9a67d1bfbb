// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::BytesMut;

use crate::{
    client::ErrorHandling,
    codec,
    error::{Error, Result},
    frame::{tcp::*, Request, Response},
    slave::{Slave, SlaveContext},
    transport::{Timeouts, Transport},
};

use super::{broadcast_echo, check_broadcast, verify_response_function};

const INITIAL_TRANSACTION_ID: TransactionId = 0;

/// Modbus TCP client
#[derive(Debug)]
pub(crate) struct Client<T: Transport> {
    transport: T,
    unit_id: UnitId,
    transaction_id: TransactionId,
    timeouts: Timeouts,
    error_handling: ErrorHandling,
    debug: bool,
}

impl<T: Transport> Client<T> {
    pub(crate) fn new(transport: T, slave: Slave) -> Self {
        Self {
            transport,
            unit_id: slave.into(),
            transaction_id: INITIAL_TRANSACTION_ID,
            timeouts: Timeouts::default(),
            error_handling: ErrorHandling::default(),
            debug: false,
        }
    }

    /// Allocate the next transaction identifier, wrapping on overflow.
    fn next_transaction_id(&mut self) -> TransactionId {
        let transaction_id = self.transaction_id;
        self.transaction_id = transaction_id.wrapping_add(1);
        transaction_id
    }

    fn call(&mut self, req: Request) -> Result<Response> {
        codec::validate_request(&req)?;
        let broadcast = Slave(self.unit_id).is_broadcast();
        if broadcast {
            check_broadcast(&req)?;
        }
        let hdr = Header {
            transaction_id: self.next_transaction_id(),
            unit_id: self.unit_id,
        };
        let function = req.function_code();
        let echo = broadcast.then(|| broadcast_echo(&req));

        let mut buf = BytesMut::new();
        codec::tcp::encode_request(RequestAdu { hdr, pdu: req.into() }, &mut buf);
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
        let ResponseAdu { hdr, pdu } = codec::tcp::recv_response_adu(&mut self.transport, &self.timeouts)?;
        verify_response_header(req_hdr, hdr)?;
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

/// A response is discarded unless both its transaction identifier and
/// its unit identifier match the request.
fn verify_response_header(req_hdr: Header, rsp_hdr: Header) -> Result<()> {
    if req_hdr != rsp_hdr {
        log::warn!(
            "Discarding response with unexpected header: expected/request = {req_hdr:?}, actual/response = {rsp_hdr:?}"
        );
        return Err(Error::InvalidData("response header mismatch"));
    }
    Ok(())
}

impl<T: Transport> SlaveContext for Client<T> {
    fn set_slave(&mut self, slave: Slave) {
        self.unit_id = slave.into();
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
