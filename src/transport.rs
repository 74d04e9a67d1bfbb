// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blocking byte-channel abstraction
//!
//! The protocol engines never touch sockets or serial ports directly.
//! They express all I/O through [`Transport`], a minimal capability set
//! over an opaque bidirectional byte channel: write everything, read
//! with a deadline, discard buffered input, re-establish the channel.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use crate::error::{Error, Result};

/// Receive deadlines of a connection.
///
/// `begin_of_frame` limits the wait for the first byte of an expected
/// frame. Once a frame has begun, `end_of_frame` limits the gap between
/// consecutive bytes; a longer silence terminates the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub begin_of_frame: Duration,
    pub end_of_frame: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            begin_of_frame: Duration::from_millis(500),
            end_of_frame: Duration::from_millis(500),
        }
    }
}

/// An opaque bidirectional byte channel with deadline-driven reads.
///
/// `recv_exact` accumulates bytes until the buffer is filled and
/// returns the number of bytes actually received: fewer than requested
/// means the deadline expired in between. A deadline of `None` blocks
/// indefinitely. Hard channel failures are reported as errors, never as
/// short reads.
pub trait Transport {
    /// Write the whole byte sequence or fail.
    fn send_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Accumulate bytes into `buf` until it is full or the deadline
    /// expires between bytes. Returns the number of bytes received.
    fn recv_exact(&mut self, buf: &mut [u8], deadline: Option<Duration>) -> Result<usize>;

    /// Discard any buffered input.
    fn flush(&mut self) -> Result<()>;

    /// Re-establish the underlying channel, if the channel supports it.
    fn reconnect(&mut self) -> Result<()>;
}

/// Classify an I/O failure into the library's error taxonomy.
pub(crate) fn classify_io_error(err: std::io::Error) -> Error {
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => Error::Timeout,
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => Error::ConnectionClosed,
        _ => Error::SocketFailure(err),
    }
}

#[cfg(feature = "tcp")]
pub use self::tcp::{TcpTransport, TCP_DEFAULT_PORT};

#[cfg(feature = "tcp")]
mod tcp {
    use std::net::{SocketAddr, TcpStream};

    use super::*;

    /// The port a Modbus TCP server listens on unless told otherwise.
    pub const TCP_DEFAULT_PORT: u16 = 502;

    /// A [`Transport`] over a TCP stream.
    ///
    /// The peer address is retained so that the channel can be
    /// re-established after a failure.
    #[derive(Debug)]
    pub struct TcpTransport {
        stream: TcpStream,
        peer_addr: SocketAddr,
    }

    impl TcpTransport {
        /// Connect to a Modbus TCP server.
        pub fn connect(peer_addr: SocketAddr) -> Result<Self> {
            let stream = TcpStream::connect(peer_addr).map_err(classify_io_error)?;
            Self::from_stream(stream)
        }

        /// Connect to a Modbus TCP server, giving up after `timeout`.
        pub fn connect_timeout(peer_addr: SocketAddr, timeout: Duration) -> Result<Self> {
            let stream =
                TcpStream::connect_timeout(&peer_addr, timeout).map_err(classify_io_error)?;
            Self::from_stream(stream)
        }

        /// Wrap an already connected stream, e.g. an accepted one.
        pub fn from_stream(stream: TcpStream) -> Result<Self> {
            let peer_addr = stream.peer_addr().map_err(classify_io_error)?;
            stream.set_nodelay(true).map_err(classify_io_error)?;
            Ok(Self { stream, peer_addr })
        }
    }

    impl Transport for TcpTransport {
        fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
            self.stream.write_all(bytes).map_err(classify_io_error)
        }

        fn recv_exact(&mut self, buf: &mut [u8], deadline: Option<Duration>) -> Result<usize> {
            self.stream
                .set_read_timeout(deadline)
                .map_err(Error::SelectFailure)?;
            let mut filled = 0;
            while filled < buf.len() {
                match self.stream.read(&mut buf[filled..]) {
                    Ok(0) => return Err(Error::ConnectionClosed),
                    Ok(n) => filled += n,
                    Err(err) => match err.kind() {
                        ErrorKind::TimedOut | ErrorKind::WouldBlock => return Ok(filled),
                        ErrorKind::Interrupted => (),
                        _ => return Err(classify_io_error(err)),
                    },
                }
            }
            Ok(filled)
        }

        fn flush(&mut self) -> Result<()> {
            self.stream
                .set_nonblocking(true)
                .map_err(Error::SelectFailure)?;
            let mut scratch = [0u8; 256];
            let drained = loop {
                match self.stream.read(&mut scratch) {
                    Ok(0) => break Ok(()),
                    Ok(_) => (),
                    Err(err) => match err.kind() {
                        ErrorKind::WouldBlock => break Ok(()),
                        ErrorKind::Interrupted => (),
                        _ => break Err(classify_io_error(err)),
                    },
                }
            };
            self.stream
                .set_nonblocking(false)
                .map_err(Error::SelectFailure)?;
            drained
        }

        fn reconnect(&mut self) -> Result<()> {
            log::debug!("Reconnecting to {}", self.peer_addr);
            let stream = TcpStream::connect(self.peer_addr).map_err(classify_io_error)?;
            stream.set_nodelay(true).map_err(classify_io_error)?;
            self.stream = stream;
            Ok(())
        }
    }
}

#[cfg(feature = "rtu")]
pub use self::serial::{SerialConfig, SerialTransport};

#[cfg(feature = "rtu")]
mod serial {
    use super::*;

    /// Serial line settings of an RTU connection.
    #[derive(Debug, Clone)]
    pub struct SerialConfig {
        /// Path of the serial device, e.g. `/dev/ttyUSB0`.
        pub path: String,
        /// Baud rate: 9600, 19200, 57600, 115200, etc.
        pub baud_rate: u32,
        pub data_bits: serialport::DataBits,
        pub stop_bits: serialport::StopBits,
        pub parity: serialport::Parity,
    }

    impl SerialConfig {
        /// Settings for the common 8N1 character format.
        pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
            Self {
                path: path.into(),
                baud_rate,
                data_bits: serialport::DataBits::Eight,
                stop_bits: serialport::StopBits::One,
                parity: serialport::Parity::None,
            }
        }
    }

    /// A [`Transport`] over a serial line.
    pub struct SerialTransport {
        port: Box<dyn serialport::SerialPort>,
    }

    impl std::fmt::Debug for SerialTransport {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SerialTransport")
                .field("port", &self.port.name())
                .finish()
        }
    }

    impl SerialTransport {
        /// Open and configure the serial device.
        pub fn open(config: &SerialConfig) -> Result<Self> {
            let port = serialport::new(config.path.as_str(), config.baud_rate)
                .data_bits(config.data_bits)
                .stop_bits(config.stop_bits)
                .parity(config.parity)
                .open()
                .map_err(|err| Error::SocketFailure(err.into()))?;
            Ok(Self { port })
        }

        /// Wrap an already opened serial port.
        #[must_use]
        pub fn from_port(port: Box<dyn serialport::SerialPort>) -> Self {
            Self { port }
        }
    }

    // An idle serial line never signals EOF, so waiting "forever" is
    // expressed as retrying after long poll intervals.
    const POLL_FOREVER: Duration = Duration::from_secs(3600);

    impl Transport for SerialTransport {
        fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
            self.port.write_all(bytes).map_err(classify_io_error)
        }

        fn recv_exact(&mut self, buf: &mut [u8], deadline: Option<Duration>) -> Result<usize> {
            self.port
                .set_timeout(deadline.unwrap_or(POLL_FOREVER))
                .map_err(|err| Error::SelectFailure(err.into()))?;
            let mut filled = 0;
            while filled < buf.len() {
                match self.port.read(&mut buf[filled..]) {
                    Ok(0) => return Err(Error::ConnectionClosed),
                    Ok(n) => filled += n,
                    Err(err) => match err.kind() {
                        ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                            if deadline.is_some() {
                                return Ok(filled);
                            }
                        }
                        ErrorKind::Interrupted => (),
                        _ => return Err(classify_io_error(err)),
                    },
                }
            }
            Ok(filled)
        }

        fn flush(&mut self) -> Result<()> {
            self.port
                .clear(serialport::ClearBuffer::Input)
                .map_err(|err| Error::SocketFailure(err.into()))
        }

        fn reconnect(&mut self) -> Result<()> {
            // A serial line has no connection to re-establish.
            Ok(())
        }
    }
}
