// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP server

use std::net::{SocketAddr, TcpListener};

use bytes::BytesMut;
use socket2::{Domain, Socket, Type};

use crate::{
    codec,
    error::{Error, Result},
    frame::tcp::ResponseAdu,
    slave::Slave,
    transport::{classify_io_error, TcpTransport, Timeouts, Transport},
};

use super::Service;

/// A Modbus TCP server.
///
/// Connections are accepted and driven one at a time; callers that
/// want to serve several masters concurrently can [`accept`](Server::accept)
/// themselves and drive each connection with [`serve_connection`] on a
/// thread of their own, serializing access to the shared data store.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    slave: Slave,
    timeouts: Timeouts,
}

impl Server {
    /// Bind the listening socket and answer for the given unit id.
    pub fn bind(socket_addr: SocketAddr, slave: Slave) -> Result<Self> {
        let listener = listener(socket_addr)?;
        Ok(Self {
            listener,
            slave,
            timeouts: Timeouts::default(),
        })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(classify_io_error)
    }

    /// Replace the receive deadlines used for incoming connections.
    pub fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.timeouts = timeouts;
    }

    /// Wait for the next incoming connection.
    pub fn accept(&self) -> Result<TcpTransport> {
        let (stream, peer_addr) = self.listener.accept().map_err(classify_io_error)?;
        log::debug!("Accepted connection from {peer_addr}");
        TcpTransport::from_stream(stream)
    }

    /// Accept and serve connections sequentially, forever.
    pub fn serve<S: Service>(&self, service: &mut S) -> Result<()> {
        loop {
            let mut transport = self.accept()?;
            if let Err(err) = serve_connection(&mut transport, self.slave, &self.timeouts, service)
            {
                log::warn!("Connection terminated: {err}");
            }
        }
    }
}

/// Answer requests on one connection until the peer disconnects.
///
/// Requests for other unit ids are ignored; broadcast requests are
/// processed but never answered. Returns `Ok(())` when the peer closes
/// the connection.
pub fn serve_connection<T, S>(
    transport: &mut T,
    slave: Slave,
    timeouts: &Timeouts,
    service: &mut S,
) -> Result<()>
where
    T: Transport,
    S: Service,
{
    loop {
        let (hdr, pdu_data) =
            match codec::tcp::recv_request_frame(transport, timeouts.end_of_frame) {
                Ok(frame) => frame,
                Err(Error::ConnectionClosed) => return Ok(()),
                Err(err) => return Err(err),
            };
        let unit = Slave(hdr.unit_id);
        let broadcast = unit.is_broadcast();
        if unit != slave && !broadcast {
            // Addressed to some other unit behind a gateway.
            continue;
        }
        let pdu = super::dispatch(service, &pdu_data)?;
        if broadcast {
            // Broadcast requests are executed but never answered,
            // exception responses included.
            continue;
        }
        let mut buf = BytesMut::new();
        codec::tcp::encode_response(ResponseAdu { hdr, pdu }, &mut buf);
        transport.send_all(&buf)?;
    }
}

/// Configure and open the listening socket.
fn listener(socket_addr: SocketAddr) -> Result<TcpListener> {
    let socket = match socket_addr {
        SocketAddr::V4(_) => Socket::new(Domain::IPV4, Type::STREAM, None),
        SocketAddr::V6(_) => Socket::new(Domain::IPV6, Type::STREAM, None),
    }
    .map_err(classify_io_error)?;
    socket.set_reuse_address(true).map_err(classify_io_error)?;
    socket.bind(&socket_addr.into()).map_err(classify_io_error)?;
    socket.listen(1024).map_err(classify_io_error)?;
    Ok(socket.into())
}
