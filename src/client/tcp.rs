// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TCP client connections

use std::net::SocketAddr;
use std::time::Duration;

use super::*;

use crate::{
    error::Result,
    service,
    slave::Slave,
    transport::{TcpTransport, Transport},
};

/// Establish a direct connection to a Modbus TCP device.
pub fn connect_slave(socket_addr: SocketAddr, slave: Slave) -> Result<Context> {
    let transport = TcpTransport::connect(socket_addr)?;
    Ok(attach_slave(transport, slave))
}

/// Establish a direct connection to a Modbus TCP device, giving up
/// after `timeout`.
pub fn connect_slave_timeout(
    socket_addr: SocketAddr,
    slave: Slave,
    timeout: Duration,
) -> Result<Context> {
    let transport = TcpTransport::connect_timeout(socket_addr, timeout)?;
    Ok(attach_slave(transport, slave))
}

/// Attach a new client context to a transport, e.g. an already
/// connected stream.
pub fn attach_slave<T>(transport: T, slave: Slave) -> Context
where
    T: Transport + 'static,
{
    let client = service::tcp::Client::new(transport, slave);
    Context::from(Box::new(client) as Box<dyn Client>)
}
