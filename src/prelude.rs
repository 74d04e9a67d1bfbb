// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types

///////////////////////////////////////////////////////////////////
/// Modules
///////////////////////////////////////////////////////////////////
pub use crate::client;

#[allow(missing_docs)]
#[cfg(feature = "rtu")]
pub mod rtu {
    pub use crate::client::rtu::*;
}

#[allow(missing_docs)]
#[cfg(feature = "tcp")]
pub mod tcp {
    pub use crate::client::tcp::*;
}

#[cfg(feature = "server")]
pub use crate::server;

///////////////////////////////////////////////////////////////////
/// Structs
///////////////////////////////////////////////////////////////////
pub use crate::error::{Error, Result};
pub use crate::frame::{ExceptionCode, Request, Response};
pub use crate::slave::{Slave, SlaveId};
pub use crate::transport::Timeouts;

#[cfg(feature = "rtu")]
pub use crate::transport::SerialConfig;

#[cfg(feature = "server")]
pub use crate::server::Mapping;

///////////////////////////////////////////////////////////////////
/// Traits
///////////////////////////////////////////////////////////////////
pub use crate::client::{Client, ErrorHandling, Reader, Writer};

pub use crate::slave::SlaveContext;

pub use crate::transport::Transport;

#[cfg(feature = "server")]
pub use crate::server::Service;
