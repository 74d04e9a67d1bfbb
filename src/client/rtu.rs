// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RTU client connections

use super::*;

use crate::{
    error::Result,
    service,
    slave::Slave,
    transport::{SerialConfig, SerialTransport, Transport},
};

/// Connect to a device via a serial line.
pub fn connect_slave(config: &SerialConfig, slave: Slave) -> Result<Context> {
    let transport = SerialTransport::open(config)?;
    Ok(attach_slave(transport, slave))
}

/// Attach a new client context to a transport, e.g. an already
/// configured serial port.
pub fn attach_slave<T>(transport: T, slave: Slave) -> Context
where
    T: Transport + 'static,
{
    let client = service::rtu::Client::new(transport, slave);
    Context::from(Box::new(client) as Box<dyn Client>)
}
