// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "rtu")]
pub(crate) mod rtu;

#[cfg(feature = "tcp")]
pub(crate) mod tcp;

use std::convert::TryFrom;
use std::result::Result as StdResult;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    error::{Error, Result},
    frame::*,
};

/// The maximum length of a Modbus PDU: one function code byte plus up
/// to 252 bytes of function specific data.
pub const MAX_PDU_LEN: usize = 253;

// Modbus_Application_Protocol_V1_1b.pdf (chapter 6)
pub(crate) const MAX_READ_BITS: u16 = 2000;
pub(crate) const MAX_READ_WORDS: u16 = 125;
pub(crate) const MAX_WRITE_BITS: u16 = 1968;
pub(crate) const MAX_WRITE_WORDS: u16 = 123;
pub(crate) const MAX_SERVER_ID_LEN: usize = 75;

/// Checks the argument ranges of a request before it is encoded.
///
/// Oversized quantities are refused locally so that an invalid frame is
/// never put on the wire.
pub(crate) fn validate_request(req: &Request) -> Result<()> {
    use Request::*;
    let valid = match *req {
        ReadCoils(_, quantity) | ReadDiscreteInputs(_, quantity) => {
            (1..=MAX_READ_BITS).contains(&quantity)
        }
        ReadHoldingRegisters(_, quantity) | ReadInputRegisters(_, quantity) => {
            (1..=MAX_READ_WORDS).contains(&quantity)
        }
        WriteMultipleCoils(_, ref coils) => {
            !coils.is_empty() && coils.len() <= usize::from(MAX_WRITE_BITS)
        }
        WriteMultipleRegisters(_, ref words) => {
            !words.is_empty() && words.len() <= usize::from(MAX_WRITE_WORDS)
        }
        WriteSingleCoil(_, _) | WriteSingleRegister(_, _) | ReadExceptionStatus
        | ReportServerId => true,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidData("request quantity out of range"))
    }
}

impl From<Request> for Bytes {
    fn from(req: Request) -> Bytes {
        let cnt = request_byte_count(&req);
        let mut data = BytesMut::with_capacity(cnt);
        use Request::*;
        data.put_u8(req.function_code());
        match req {
            ReadCoils(address, quantity)
            | ReadDiscreteInputs(address, quantity)
            | ReadInputRegisters(address, quantity)
            | ReadHoldingRegisters(address, quantity) => {
                data.put_u16(address);
                data.put_u16(quantity);
            }
            WriteSingleCoil(address, state) => {
                data.put_u16(address);
                data.put_u16(bool_to_coil(state));
            }
            WriteMultipleCoils(address, coils) => {
                data.put_u16(address);
                data.put_u16(u16_len(coils.len()));
                let packed_coils = pack_coils(&coils);
                data.put_u8(u8_len(packed_coils.len()));
                for b in packed_coils {
                    data.put_u8(b);
                }
            }
            WriteSingleRegister(address, word) => {
                data.put_u16(address);
                data.put_u16(word);
            }
            WriteMultipleRegisters(address, words) => {
                data.put_u16(address);
                data.put_u16(u16_len(words.len()));
                data.put_u8(u8_len(words.len() * 2));
                for w in words {
                    data.put_u16(w);
                }
            }
            ReadExceptionStatus | ReportServerId => (),
        }
        data.freeze()
    }
}

impl From<RequestPdu> for Bytes {
    fn from(pdu: RequestPdu) -> Bytes {
        pdu.0.into()
    }
}

impl From<Response> for Bytes {
    fn from(rsp: Response) -> Bytes {
        let cnt = response_byte_count(&rsp);
        let mut data = BytesMut::with_capacity(cnt);
        use Response::*;
        data.put_u8(rsp.function_code());
        match rsp {
            ReadCoils(coils) | ReadDiscreteInputs(coils) => {
                let packed_coils = pack_coils(&coils);
                data.put_u8(u8_len(packed_coils.len()));
                for b in packed_coils {
                    data.put_u8(b);
                }
            }
            ReadInputRegisters(registers) | ReadHoldingRegisters(registers) => {
                data.put_u8(u8_len(registers.len() * 2));
                for r in registers {
                    data.put_u16(r);
                }
            }
            WriteSingleCoil(address, state) => {
                data.put_u16(address);
                data.put_u16(bool_to_coil(state));
            }
            WriteMultipleCoils(address, quantity) | WriteMultipleRegisters(address, quantity) => {
                data.put_u16(address);
                data.put_u16(quantity);
            }
            WriteSingleRegister(address, word) => {
                data.put_u16(address);
                data.put_u16(word);
            }
            ReadExceptionStatus(status) => {
                data.put_u8(status);
            }
            ReportServerId(server_id) => {
                data.put_u8(u8_len(server_id.len()));
                for b in server_id {
                    data.put_u8(b);
                }
            }
        }
        data.freeze()
    }
}

impl From<ExceptionResponse> for Bytes {
    fn from(ex: ExceptionResponse) -> Bytes {
        let mut data = BytesMut::with_capacity(2);
        debug_assert!(ex.function < 0x80);
        data.put_u8(ex.function + 0x80);
        data.put_u8(ex.exception as u8);
        data.freeze()
    }
}

impl From<ResponsePdu> for Bytes {
    fn from(pdu: ResponsePdu) -> Bytes {
        pdu.0.map_or_else(Into::into, Into::into)
    }
}

/// Decodes a request PDU on the server side.
///
/// The outer `Err` marks frames that cannot be answered at all (empty
/// PDU). The inner `Err` carries the exception response a server must
/// send back for recognizable but unacceptable requests, i.e. unknown
/// function codes or content that violates the protocol.
pub(crate) fn decode_request(bytes: &Bytes) -> Result<StdResult<Request, ExceptionResponse>> {
    use Request::*;
    let Some(&fn_code) = bytes.first() else {
        return Err(Error::InvalidData("empty request PDU"));
    };
    let reject = |exception| {
        Ok(Err(ExceptionResponse {
            function: fn_code & 0x7F,
            exception,
        }))
    };
    let req = match fn_code {
        0x01 | 0x02 | 0x03 | 0x04 => {
            if bytes.len() != 5 {
                return reject(ExceptionCode::IllegalDataValue);
            }
            let address = BigEndian::read_u16(&bytes[1..3]);
            let quantity = BigEndian::read_u16(&bytes[3..5]);
            match fn_code {
                0x01 => ReadCoils(address, quantity),
                0x02 => ReadDiscreteInputs(address, quantity),
                0x03 => ReadHoldingRegisters(address, quantity),
                _ => ReadInputRegisters(address, quantity),
            }
        }
        0x05 => {
            if bytes.len() != 5 {
                return reject(ExceptionCode::IllegalDataValue);
            }
            let address = BigEndian::read_u16(&bytes[1..3]);
            let Some(state) = coil_to_bool(BigEndian::read_u16(&bytes[3..5])) else {
                return reject(ExceptionCode::IllegalDataValue);
            };
            WriteSingleCoil(address, state)
        }
        0x06 => {
            if bytes.len() != 5 {
                return reject(ExceptionCode::IllegalDataValue);
            }
            WriteSingleRegister(
                BigEndian::read_u16(&bytes[1..3]),
                BigEndian::read_u16(&bytes[3..5]),
            )
        }
        0x07 => {
            if bytes.len() != 1 {
                return reject(ExceptionCode::IllegalDataValue);
            }
            ReadExceptionStatus
        }
        0x0F => {
            if bytes.len() < 6 {
                return reject(ExceptionCode::IllegalDataValue);
            }
            let address = BigEndian::read_u16(&bytes[1..3]);
            let quantity = BigEndian::read_u16(&bytes[3..5]);
            let byte_count = bytes[5];
            if quantity == 0
                || quantity > MAX_WRITE_BITS
                || usize::from(byte_count) != packed_coils_len(usize::from(quantity))
                || bytes.len() != 6 + usize::from(byte_count)
            {
                return reject(ExceptionCode::IllegalDataValue);
            }
            WriteMultipleCoils(address, unpack_coils(&bytes[6..], quantity))
        }
        0x10 => {
            if bytes.len() < 6 {
                return reject(ExceptionCode::IllegalDataValue);
            }
            let address = BigEndian::read_u16(&bytes[1..3]);
            let quantity = BigEndian::read_u16(&bytes[3..5]);
            let byte_count = bytes[5];
            if quantity == 0
                || quantity > MAX_WRITE_WORDS
                || usize::from(byte_count) != usize::from(quantity) * 2
                || bytes.len() != 6 + usize::from(byte_count)
            {
                return reject(ExceptionCode::IllegalDataValue);
            }
            let words = bytes[6..]
                .chunks_exact(2)
                .map(|chunk| BigEndian::read_u16(chunk))
                .collect();
            WriteMultipleRegisters(address, words)
        }
        0x11 => {
            if bytes.len() != 1 {
                return reject(ExceptionCode::IllegalDataValue);
            }
            ReportServerId
        }
        _ => return reject(ExceptionCode::IllegalFunction),
    };
    Ok(Ok(req))
}

impl TryFrom<Bytes> for Response {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self> {
        use Response::*;
        let Some(&fn_code) = bytes.first() else {
            return Err(Error::InvalidData("empty response PDU"));
        };
        let rsp = match fn_code {
            0x01 | 0x02 => {
                let byte_count = byte_count_field(&bytes)?;
                let quantity = u16::from(byte_count) * 8;
                let coils = unpack_coils(&bytes[2..], quantity);
                if fn_code == 0x01 {
                    ReadCoils(coils)
                } else {
                    ReadDiscreteInputs(coils)
                }
            }
            0x03 | 0x04 => {
                let byte_count = byte_count_field(&bytes)?;
                if byte_count % 2 != 0 {
                    return Err(Error::InvalidData("odd register byte count"));
                }
                let words = bytes[2..]
                    .chunks_exact(2)
                    .map(|chunk| BigEndian::read_u16(chunk))
                    .collect();
                if fn_code == 0x03 {
                    ReadHoldingRegisters(words)
                } else {
                    ReadInputRegisters(words)
                }
            }
            0x05 => {
                if bytes.len() != 5 {
                    return Err(Error::InvalidData("unexpected response length"));
                }
                let address = BigEndian::read_u16(&bytes[1..3]);
                let Some(state) = coil_to_bool(BigEndian::read_u16(&bytes[3..5])) else {
                    return Err(Error::InvalidData("invalid coil value"));
                };
                WriteSingleCoil(address, state)
            }
            0x06 => {
                if bytes.len() != 5 {
                    return Err(Error::InvalidData("unexpected response length"));
                }
                WriteSingleRegister(
                    BigEndian::read_u16(&bytes[1..3]),
                    BigEndian::read_u16(&bytes[3..5]),
                )
            }
            0x07 => {
                if bytes.len() != 2 {
                    return Err(Error::InvalidData("unexpected response length"));
                }
                ReadExceptionStatus(bytes[1])
            }
            0x0F | 0x10 => {
                if bytes.len() != 5 {
                    return Err(Error::InvalidData("unexpected response length"));
                }
                let address = BigEndian::read_u16(&bytes[1..3]);
                let quantity = BigEndian::read_u16(&bytes[3..5]);
                if fn_code == 0x0F {
                    WriteMultipleCoils(address, quantity)
                } else {
                    WriteMultipleRegisters(address, quantity)
                }
            }
            0x11 => {
                let byte_count = byte_count_field(&bytes)?;
                if usize::from(byte_count) > MAX_SERVER_ID_LEN {
                    return Err(Error::InvalidData("server id too long"));
                }
                ReportServerId(bytes[2..].to_vec())
            }
            _ => return Err(Error::InvalidData("unsupported function code")),
        };
        Ok(rsp)
    }
}

impl TryFrom<Bytes> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self> {
        if bytes.len() != 2 {
            return Err(Error::InvalidData("unexpected exception response length"));
        }
        let fn_err_code = bytes[0];
        if fn_err_code < 0x80 {
            return Err(Error::InvalidData("invalid exception function code"));
        }
        let function = fn_err_code - 0x80;
        let exception = ExceptionCode::try_from(bytes[1])?;
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

impl TryFrom<u8> for ExceptionCode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use ExceptionCode::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x07 => NegativeAcknowledge,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => return Err(Error::InvalidExceptionCode(code)),
        };
        Ok(ex)
    }
}

impl TryFrom<Bytes> for ResponsePdu {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self> {
        let Some(&fn_code) = bytes.first() else {
            return Err(Error::InvalidData("empty response PDU"));
        };
        let pdu = if fn_code < 0x80 {
            Response::try_from(bytes)?.into()
        } else {
            ExceptionResponse::try_from(bytes)?.into()
        };
        Ok(pdu)
    }
}

/// Reads the byte-count field of a variable length response and checks
/// it against the actual payload length.
fn byte_count_field(bytes: &Bytes) -> Result<u8> {
    let Some(&byte_count) = bytes.get(1) else {
        return Err(Error::InvalidData("missing byte count"));
    };
    if bytes.len() != 2 + usize::from(byte_count) {
        return Err(Error::InvalidData("byte count mismatch"));
    }
    Ok(byte_count)
}

fn bool_to_coil(state: bool) -> u16 {
    if state {
        0xFF00
    } else {
        0x0000
    }
}

fn coil_to_bool(coil: u16) -> Option<bool> {
    match coil {
        0xFF00 => Some(true),
        0x0000 => Some(false),
        _ => None,
    }
}

pub(crate) fn packed_coils_len(bitcount: usize) -> usize {
    (bitcount + 7) / 8
}

/// Packs a sequence of coil states into bytes, LSB first. The unused
/// high bits of the final byte are zero.
pub(crate) fn pack_coils(coils: &[Coil]) -> Vec<u8> {
    let packed_size = packed_coils_len(coils.len());
    let mut res = vec![0; packed_size];
    for (i, b) in coils.iter().enumerate() {
        let v = u8::from(*b);
        res[i / 8] |= v << (i % 8);
    }
    res
}

pub(crate) fn unpack_coils(bytes: &[u8], count: u16) -> Vec<Coil> {
    let mut res = Vec::with_capacity(count.into());
    for i in 0..count {
        res.push((bytes[usize::from(i) / 8] >> (i % 8)) & 0b1 > 0);
    }
    res
}

/// Interprets two consecutive registers as an IEEE 754 single.
///
/// The low word comes first: `bits = (regs[1] << 16) | regs[0]`. Modbus
/// does not standardize a float layout; this is the convention of many
/// legacy devices and the one this library exposes.
#[must_use]
pub fn f32_from_registers(regs: [Word; 2]) -> f32 {
    f32::from_bits((u32::from(regs[1]) << 16) | u32::from(regs[0]))
}

/// Splits an IEEE 754 single into two registers, low word first.
///
/// The counterpart of [`f32_from_registers`].
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn f32_to_registers(value: f32) -> [Word; 2] {
    let bits = value.to_bits();
    [bits as u16, (bits >> 16) as u16]
}

/// Sets eight bit values starting at `address` from a single byte,
/// LSB first.
///
/// # Panics
///
/// Panics if `dest` is too short to hold all eight bits.
pub fn set_bits_from_byte(dest: &mut [Coil], address: usize, value: u8) {
    for i in 0..8 {
        dest[address + i] = (value >> i) & 0b1 > 0;
    }
}

/// Sets `count` bit values starting at `address` from a packed byte
/// sequence.
///
/// # Panics
///
/// Panics if `dest` or `bytes` are too short.
pub fn set_bits_from_bytes(dest: &mut [Coil], address: usize, count: usize, bytes: &[u8]) {
    for i in 0..count {
        dest[address + i] = (bytes[i / 8] >> (i % 8)) & 0b1 > 0;
    }
}

/// Packs up to eight bit values starting at `address` into a byte,
/// LSB first.
///
/// # Panics
///
/// Panics if `count > 8` or `src` is too short.
#[must_use]
pub fn byte_from_bits(src: &[Coil], address: usize, count: usize) -> u8 {
    assert!(count <= 8);
    let mut value = 0;
    for i in 0..count {
        value |= u8::from(src[address + i]) << i;
    }
    value
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn u16_len(len: usize) -> u16 {
    // Bounds are enforced before encoding.
    debug_assert!(len <= usize::from(u16::MAX));
    len as u16
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn u8_len(len: usize) -> u8 {
    // Bounds are enforced before encoding.
    debug_assert!(len <= usize::from(u8::MAX));
    len as u8
}

fn request_byte_count(req: &Request) -> usize {
    use Request::*;
    match *req {
        ReadCoils(_, _)
        | ReadDiscreteInputs(_, _)
        | ReadInputRegisters(_, _)
        | ReadHoldingRegisters(_, _)
        | WriteSingleRegister(_, _)
        | WriteSingleCoil(_, _) => 5,
        WriteMultipleCoils(_, ref coils) => 6 + packed_coils_len(coils.len()),
        WriteMultipleRegisters(_, ref data) => 6 + data.len() * 2,
        ReadExceptionStatus | ReportServerId => 1,
    }
}

fn response_byte_count(rsp: &Response) -> usize {
    use Response::*;
    match *rsp {
        ReadCoils(ref coils) | ReadDiscreteInputs(ref coils) => 2 + packed_coils_len(coils.len()),
        WriteSingleCoil(_, _)
        | WriteMultipleCoils(_, _)
        | WriteMultipleRegisters(_, _)
        | WriteSingleRegister(_, _) => 5,
        ReadInputRegisters(ref data) | ReadHoldingRegisters(ref data) => 2 + data.len() * 2,
        ReadExceptionStatus(_) => 2,
        ReportServerId(ref data) => 2 + data.len(),
    }
}
