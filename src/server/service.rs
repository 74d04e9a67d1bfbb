// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::frame::{ExceptionCode, Request, Response};

/// A Modbus server service.
///
/// Implementations decide how each request is answered. Returning an
/// [`ExceptionCode`] produces the corresponding exception response on
/// the wire; the connection itself stays healthy.
pub trait Service {
    /// Process the request and return the response or an exception.
    fn call(&mut self, req: Request) -> Result<Response, ExceptionCode>;
}
