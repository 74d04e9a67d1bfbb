// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Library Error type

use thiserror::Error;

use crate::frame::{ExceptionCode, ExceptionResponse};

/// A specialized [Result] type for Modbus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Modbus errors.
///
/// Three classes are distinguished: exceptions reported by the remote
/// peer, locally detected framing/content violations, and transport
/// failures of the underlying byte channel.
#[derive(Debug, Error)]
pub enum Error {
    /// Exception response received from the remote peer.
    #[error(transparent)]
    Exception(#[from] ExceptionResponse),

    /// A request argument or a received frame violates the protocol.
    #[error("invalid data: {0}")]
    InvalidData(&'static str),

    /// The checksum of a received RTU frame does not match its content.
    #[error("invalid CRC: expected = 0x{expected:0>4X}, actual = 0x{actual:0>4X}")]
    InvalidCrc { expected: u16, actual: u16 },

    /// An exception response carried an unknown exception code.
    #[error("invalid exception code: 0x{0:0>2X}")]
    InvalidExceptionCode(u8),

    /// No (complete) frame arrived within the configured deadline.
    #[error("timed out while waiting for data")]
    Timeout,

    /// The receive deadline could not be armed on the channel.
    #[error("failed to arm receive deadline")]
    SelectFailure(#[source] std::io::Error),

    /// Reading from or writing to the underlying channel failed.
    #[error("socket failure")]
    SocketFailure(#[source] std::io::Error),

    /// The underlying channel was closed by the peer.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The peer answered, but not with a response to the request.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(&'static str),
}

impl Error {
    /// Returns the legacy numeric code of this error.
    ///
    /// Callers migrating from C APIs that collapse value counts and
    /// errors into one signed integer can translate at this boundary:
    /// all codes are negative and disjoint from valid counts.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Exception(rsp) => -i32::from(rsp.exception as u8),
            Self::InvalidData(_) => -0x10,
            Self::InvalidCrc { .. } => -0x11,
            Self::InvalidExceptionCode(_) => -0x12,
            Self::Timeout => -0x13,
            Self::SelectFailure(_) => -0x14,
            Self::SocketFailure(_) => -0x15,
            Self::ConnectionClosed => -0x16,
            Self::UnexpectedResponse(_) => -0x17,
        }
    }

    /// Returns `true` if the error originates from the byte channel
    /// rather than from the protocol layer.
    ///
    /// Only these errors trigger the configured recovery policy.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::SelectFailure(_) | Self::SocketFailure(_) | Self::ConnectionClosed
        )
    }
}

impl From<ExceptionCode> for Error {
    fn from(exception: ExceptionCode) -> Self {
        Self::Exception(ExceptionResponse {
            function: 0,
            exception,
        })
    }
}
