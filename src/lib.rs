// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(unreachable_pub)]
#![cfg_attr(not(test), warn(unsafe_code))]
#![warn(clippy::all)]
#![warn(clippy::cast_lossless)]
#![warn(clippy::explicit_deref_methods)]
#![warn(clippy::explicit_into_iter_loop)]
#![warn(clippy::explicit_iter_loop)]
#![cfg_attr(not(test), warn(clippy::panic_in_result_fn))]
#![cfg_attr(not(test), warn(clippy::cast_possible_truncation))]
#![warn(rustdoc::broken_intra_doc_links)]
#![doc = include_str!("../README.md")]

pub mod prelude;

pub mod client;

pub mod slave;

pub mod transport;

#[cfg(feature = "server")]
pub mod server;

mod codec;
mod error;
mod frame;
mod service;

pub use crate::{
    codec::{
        byte_from_bits, f32_from_registers, f32_to_registers, set_bits_from_byte,
        set_bits_from_bytes, MAX_PDU_LEN,
    },
    error::{Error, Result},
    frame::{
        Address, Coil, ExceptionCode, ExceptionResponse, FunctionCode, Quantity, Request,
        Response, Word,
    },
    slave::{Slave, SlaveContext, SlaveId},
    transport::{Timeouts, Transport},
};
