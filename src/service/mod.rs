// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "rtu")]
pub(crate) mod rtu;

#[cfg(feature = "tcp")]
pub(crate) mod tcp;

use crate::{
    codec,
    error::{Error, Result},
    frame::{FunctionCode, Request, Response},
};

/// Only requests with side effects may be broadcast: nobody would
/// answer a broadcast read.
fn check_broadcast(req: &Request) -> Result<()> {
    if req.is_write() {
        Ok(())
    } else {
        Err(Error::InvalidData("cannot broadcast a request without side effects"))
    }
}

/// The response a broadcast write would have produced. Broadcast
/// requests are answered by nobody, so the echo is synthesized locally
/// after the request has been sent.
fn broadcast_echo(req: &Request) -> Response {
    match *req {
        Request::WriteSingleCoil(address, state) => Response::WriteSingleCoil(address, state),
        Request::WriteMultipleCoils(address, ref coils) => {
            Response::WriteMultipleCoils(address, codec::u16_len(coils.len()))
        }
        Request::WriteSingleRegister(address, word) => {
            Response::WriteSingleRegister(address, word)
        }
        Request::WriteMultipleRegisters(address, ref words) => {
            Response::WriteMultipleRegisters(address, codec::u16_len(words.len()))
        }
        _ => unreachable!("broadcast requests are validated before sending"),
    }
}

/// A response is only accepted for the function code that was requested.
fn verify_response_function(request_function: FunctionCode, rsp: &Response) -> Result<()> {
    if rsp.function_code() == request_function {
        Ok(())
    } else {
        Err(Error::UnexpectedResponse("function code mismatch"))
    }
}
