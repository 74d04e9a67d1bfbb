// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous Modbus server

#[cfg(feature = "rtu")]
pub mod rtu;

#[cfg(feature = "tcp")]
pub mod tcp;

mod mapping;
mod service;

pub use self::{mapping::Mapping, service::Service};

use bytes::Bytes;

use crate::{
    codec,
    error::Result,
    frame::{ExceptionResponse, ResponsePdu},
};

/// Decode a request PDU and run it through the service.
///
/// Both malformed-but-answerable requests and service rejections end up
/// as exception responses; a healthy connection keeps answering.
pub(crate) fn dispatch<S: Service>(service: &mut S, pdu_data: &Bytes) -> Result<ResponsePdu> {
    let pdu = match codec::decode_request(pdu_data)? {
        Ok(req) => {
            let function = req.function_code();
            match service.call(req) {
                Ok(rsp) => ResponsePdu(Ok(rsp)),
                Err(exception) => ResponsePdu(Err(ExceptionResponse {
                    function,
                    exception,
                })),
            }
        }
        Err(exception_response) => ResponsePdu(Err(exception_response)),
    };
    Ok(pdu)
}
