// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory data store of a Modbus server

use crate::{
    codec,
    error::Error,
    frame::{Coil, ExceptionCode, Request, Response, Word},
};

use super::Service;

/// The four data tables of a Modbus server.
///
/// All tables are sized once at construction. The protocol mutates
/// coils and holding registers through [`Service::call`]; discrete
/// inputs and input registers are read-only on the wire and fed by the
/// owner through the `_mut` accessors.
///
/// The mapping performs no internal locking. Callers that share it
/// between connections must serialize access themselves.
#[derive(Debug, Clone)]
pub struct Mapping {
    coils: Vec<Coil>,
    discrete_inputs: Vec<Coil>,
    holding_registers: Vec<Word>,
    input_registers: Vec<Word>,
    exception_status: u8,
    server_id: Vec<u8>,
}

impl Mapping {
    /// Allocates the four tables with the given lengths, all values
    /// zeroed.
    #[must_use]
    pub fn new(
        coils: usize,
        discrete_inputs: usize,
        holding_registers: usize,
        input_registers: usize,
    ) -> Self {
        Self {
            coils: vec![false; coils],
            discrete_inputs: vec![false; discrete_inputs],
            holding_registers: vec![0; holding_registers],
            input_registers: vec![0; input_registers],
            exception_status: 0,
            server_id: default_server_id(),
        }
    }

    #[must_use]
    pub fn coils(&self) -> &[Coil] {
        &self.coils
    }

    pub fn coils_mut(&mut self) -> &mut [Coil] {
        &mut self.coils
    }

    #[must_use]
    pub fn discrete_inputs(&self) -> &[Coil] {
        &self.discrete_inputs
    }

    pub fn discrete_inputs_mut(&mut self) -> &mut [Coil] {
        &mut self.discrete_inputs
    }

    #[must_use]
    pub fn holding_registers(&self) -> &[Word] {
        &self.holding_registers
    }

    pub fn holding_registers_mut(&mut self) -> &mut [Word] {
        &mut self.holding_registers
    }

    #[must_use]
    pub fn input_registers(&self) -> &[Word] {
        &self.input_registers
    }

    pub fn input_registers_mut(&mut self) -> &mut [Word] {
        &mut self.input_registers
    }

    /// Sets the byte returned for read-exception-status requests.
    pub fn set_exception_status(&mut self, status: u8) {
        self.exception_status = status;
    }

    /// Replaces the payload returned for report-server-id requests.
    pub fn set_server_id(&mut self, server_id: impl Into<Vec<u8>>) -> Result<(), Error> {
        let server_id = server_id.into();
        if server_id.len() > codec::MAX_SERVER_ID_LEN {
            return Err(Error::InvalidData("server id too long"));
        }
        self.server_id = server_id;
        Ok(())
    }
}

/// Server id byte, run indicator (on) and a readable identifier.
fn default_server_id() -> Vec<u8> {
    let mut server_id = vec![0x0A, 0xFF];
    server_id.extend_from_slice(env!("CARGO_PKG_NAME").as_bytes());
    server_id
}

fn check_bit_quantity(quantity: u16) -> Result<(), ExceptionCode> {
    if (1..=codec::MAX_READ_BITS).contains(&quantity) {
        Ok(())
    } else {
        Err(ExceptionCode::IllegalDataValue)
    }
}

fn check_word_quantity(quantity: u16) -> Result<(), ExceptionCode> {
    if (1..=codec::MAX_READ_WORDS).contains(&quantity) {
        Ok(())
    } else {
        Err(ExceptionCode::IllegalDataValue)
    }
}

/// Maps a start address and quantity onto a table of length `len`.
fn check_range(
    addr: u16,
    quantity: u16,
    len: usize,
) -> Result<std::ops::Range<usize>, ExceptionCode> {
    let start = usize::from(addr);
    let end = start + usize::from(quantity);
    if end <= len {
        Ok(start..end)
    } else {
        Err(ExceptionCode::IllegalDataAddress)
    }
}

impl Service for Mapping {
    fn call(&mut self, req: Request) -> Result<Response, ExceptionCode> {
        use Request::*;
        match req {
            ReadCoils(addr, quantity) => {
                check_bit_quantity(quantity)?;
                let range = check_range(addr, quantity, self.coils.len())?;
                Ok(Response::ReadCoils(self.coils[range].to_vec()))
            }
            ReadDiscreteInputs(addr, quantity) => {
                check_bit_quantity(quantity)?;
                let range = check_range(addr, quantity, self.discrete_inputs.len())?;
                Ok(Response::ReadDiscreteInputs(
                    self.discrete_inputs[range].to_vec(),
                ))
            }
            ReadHoldingRegisters(addr, quantity) => {
                check_word_quantity(quantity)?;
                let range = check_range(addr, quantity, self.holding_registers.len())?;
                Ok(Response::ReadHoldingRegisters(
                    self.holding_registers[range].to_vec(),
                ))
            }
            ReadInputRegisters(addr, quantity) => {
                check_word_quantity(quantity)?;
                let range = check_range(addr, quantity, self.input_registers.len())?;
                Ok(Response::ReadInputRegisters(
                    self.input_registers[range].to_vec(),
                ))
            }
            WriteSingleCoil(addr, state) => {
                let range = check_range(addr, 1, self.coils.len())?;
                self.coils[range.start] = state;
                Ok(Response::WriteSingleCoil(addr, state))
            }
            WriteSingleRegister(addr, word) => {
                let range = check_range(addr, 1, self.holding_registers.len())?;
                self.holding_registers[range.start] = word;
                Ok(Response::WriteSingleRegister(addr, word))
            }
            WriteMultipleCoils(addr, coils) => {
                if coils.is_empty() || coils.len() > usize::from(codec::MAX_WRITE_BITS) {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                let quantity = codec::u16_len(coils.len());
                let range = check_range(addr, quantity, self.coils.len())?;
                self.coils[range].copy_from_slice(&coils);
                Ok(Response::WriteMultipleCoils(addr, quantity))
            }
            WriteMultipleRegisters(addr, words) => {
                if words.is_empty() || words.len() > usize::from(codec::MAX_WRITE_WORDS) {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                let quantity = codec::u16_len(words.len());
                let range = check_range(addr, quantity, self.holding_registers.len())?;
                self.holding_registers[range].copy_from_slice(&words);
                Ok(Response::WriteMultipleRegisters(addr, quantity))
            }
            ReadExceptionStatus => Ok(Response::ReadExceptionStatus(self.exception_status)),
            ReportServerId => Ok(Response::ReportServerId(self.server_id.clone())),
        }
    }
}
