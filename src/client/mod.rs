// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous Modbus client

#[cfg(feature = "rtu")]
pub mod rtu;

#[cfg(feature = "tcp")]
pub mod tcp;

use crate::{
    error::{Error, Result},
    frame::*,
    slave::*,
    transport::Timeouts,
};

/// How the engine reacts to transport failures.
///
/// Protocol exceptions never trigger recovery; they are well-formed
/// answers and the channel stays usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorHandling {
    /// Discard buffered input and re-establish the channel before the
    /// error is returned. Serial lines are only flushed, as they have
    /// no connection to re-establish.
    #[default]
    FlushOrReconnectOnError,
    /// Surface the error unchanged and leave the channel alone.
    NopOnError,
}

/// A transport independent synchronous client trait.
pub trait Client: SlaveContext {
    /// Invoke a Modbus function and wait for the matching response.
    fn call(&mut self, req: Request) -> Result<Response>;

    /// Discard any input buffered on the connection.
    fn flush(&mut self) -> Result<()>;

    /// Replace the receive deadlines of the connection.
    fn set_timeouts(&mut self, timeouts: Timeouts);

    /// Select the recovery policy for transport failures.
    fn set_error_handling(&mut self, error_handling: ErrorHandling);

    /// Enable or disable hex dumps of the exchanged frames.
    fn set_debug(&mut self, debug: bool);
}

/// A transport independent synchronous reader trait.
pub trait Reader: Client {
    fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;
    fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;
    fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;
    fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;
    fn read_exception_status(&mut self) -> Result<u8>;
    fn report_server_id(&mut self) -> Result<Vec<u8>>;
}

/// A transport independent synchronous writer trait.
pub trait Writer: Client {
    fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()>;
    fn write_multiple_coils(&mut self, addr: Address, data: &[Coil]) -> Result<()>;
    fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()>;
    fn write_multiple_registers(&mut self, addr: Address, data: &[Word]) -> Result<()>;
}

/// A synchronous Modbus client context.
///
/// The context exclusively owns its connection. It is not safe for
/// concurrent use and performs strictly one transaction at a time.
pub struct Context {
    client: Box<dyn Client>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}

impl From<Box<dyn Client>> for Context {
    fn from(client: Box<dyn Client>) -> Self {
        Self { client }
    }
}

impl From<Context> for Box<dyn Client> {
    fn from(ctx: Context) -> Self {
        ctx.client
    }
}

impl Client for Context {
    fn call(&mut self, req: Request) -> Result<Response> {
        self.client.call(req)
    }

    fn flush(&mut self) -> Result<()> {
        self.client.flush()
    }

    fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.client.set_timeouts(timeouts);
    }

    fn set_error_handling(&mut self, error_handling: ErrorHandling) {
        self.client.set_error_handling(error_handling);
    }

    fn set_debug(&mut self, debug: bool) {
        self.client.set_debug(debug);
    }
}

impl SlaveContext for Context {
    fn set_slave(&mut self, slave: Slave) {
        self.client.set_slave(slave);
    }
}

impl Reader for Context {
    fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        let rsp = self.client.call(Request::ReadCoils(addr, cnt))?;
        if let Response::ReadCoils(mut coils) = rsp {
            if coils.len() < cnt.into() {
                return Err(Error::UnexpectedResponse("too few coils"));
            }
            coils.truncate(cnt.into());
            Ok(coils)
        } else {
            Err(Error::UnexpectedResponse("unexpected response"))
        }
    }

    fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        let rsp = self.client.call(Request::ReadDiscreteInputs(addr, cnt))?;
        if let Response::ReadDiscreteInputs(mut coils) = rsp {
            if coils.len() < cnt.into() {
                return Err(Error::UnexpectedResponse("too few discrete inputs"));
            }
            coils.truncate(cnt.into());
            Ok(coils)
        } else {
            Err(Error::UnexpectedResponse("unexpected response"))
        }
    }

    fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        let rsp = self.client.call(Request::ReadInputRegisters(addr, cnt))?;
        if let Response::ReadInputRegisters(words) = rsp {
            if words.len() != cnt as usize {
                return Err(Error::UnexpectedResponse("register count mismatch"));
            }
            Ok(words)
        } else {
            Err(Error::UnexpectedResponse("unexpected response"))
        }
    }

    fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        let rsp = self.client.call(Request::ReadHoldingRegisters(addr, cnt))?;
        if let Response::ReadHoldingRegisters(words) = rsp {
            if words.len() != cnt as usize {
                return Err(Error::UnexpectedResponse("register count mismatch"));
            }
            Ok(words)
        } else {
            Err(Error::UnexpectedResponse("unexpected response"))
        }
    }

    fn read_exception_status(&mut self) -> Result<u8> {
        let rsp = self.client.call(Request::ReadExceptionStatus)?;
        if let Response::ReadExceptionStatus(status) = rsp {
            Ok(status)
        } else {
            Err(Error::UnexpectedResponse("unexpected response"))
        }
    }

    fn report_server_id(&mut self) -> Result<Vec<u8>> {
        let rsp = self.client.call(Request::ReportServerId)?;
        if let Response::ReportServerId(server_id) = rsp {
            Ok(server_id)
        } else {
            Err(Error::UnexpectedResponse("unexpected response"))
        }
    }
}

impl Writer for Context {
    fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()> {
        let rsp = self.client.call(Request::WriteSingleCoil(addr, coil))?;
        if let Response::WriteSingleCoil(rsp_addr, rsp_coil) = rsp {
            if rsp_addr != addr || rsp_coil != coil {
                return Err(Error::UnexpectedResponse("write echo mismatch"));
            }
            Ok(())
        } else {
            Err(Error::UnexpectedResponse("unexpected response"))
        }
    }

    fn write_multiple_coils(&mut self, addr: Address, data: &[Coil]) -> Result<()> {
        let cnt = data.len();
        let rsp = self
            .client
            .call(Request::WriteMultipleCoils(addr, data.to_vec()))?;
        if let Response::WriteMultipleCoils(rsp_addr, rsp_cnt) = rsp {
            if rsp_addr != addr || usize::from(rsp_cnt) != cnt {
                return Err(Error::UnexpectedResponse("write echo mismatch"));
            }
            Ok(())
        } else {
            Err(Error::UnexpectedResponse("unexpected response"))
        }
    }

    fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()> {
        let rsp = self.client.call(Request::WriteSingleRegister(addr, word))?;
        if let Response::WriteSingleRegister(rsp_addr, rsp_word) = rsp {
            if rsp_addr != addr || rsp_word != word {
                return Err(Error::UnexpectedResponse("write echo mismatch"));
            }
            Ok(())
        } else {
            Err(Error::UnexpectedResponse("unexpected response"))
        }
    }

    fn write_multiple_registers(&mut self, addr: Address, data: &[Word]) -> Result<()> {
        let cnt = data.len();
        let rsp = self
            .client
            .call(Request::WriteMultipleRegisters(addr, data.to_vec()))?;
        if let Response::WriteMultipleRegisters(rsp_addr, rsp_cnt) = rsp {
            if rsp_addr != addr || usize::from(rsp_cnt) != cnt {
                return Err(Error::UnexpectedResponse("write echo mismatch"));
            }
            Ok(())
        } else {
            Err(Error::UnexpectedResponse("unexpected response"))
        }
    }
}
