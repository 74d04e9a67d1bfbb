// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::TryFrom;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    error::{Error, Result},
    frame::{rtu::*, ResponsePdu},
    slave::SlaveId,
    transport::{Timeouts, Transport},
};

// [Modbus over Serial Line Specification and Implementation Guide V1.02](http://modbus.org/docs/Modbus_over_serial_line_V1_02.pdf), page 13
// "The maximum size of a Modbus RTU frame is 256 bytes."
pub(crate) const MAX_FRAME_LEN: usize = 256;

const CRC_BYTE_COUNT: usize = 2;

/// Wraps a request PDU into an RTU frame: slave address, PDU, CRC.
pub(crate) fn encode_request(adu: RequestAdu, buf: &mut BytesMut) {
    let RequestAdu { hdr, pdu } = adu;
    encode_frame(hdr, pdu.into(), buf);
}

/// Wraps a response PDU into an RTU frame: slave address, PDU, CRC.
pub(crate) fn encode_response(adu: ResponseAdu, buf: &mut BytesMut) {
    let ResponseAdu { hdr, pdu } = adu;
    encode_frame(hdr, pdu.into(), buf);
}

fn encode_frame(hdr: Header, pdu_data: Bytes, buf: &mut BytesMut) {
    let start = buf.len();
    buf.reserve(pdu_data.len() + 3);
    buf.put_u8(hdr.slave_id);
    buf.put_slice(&pdu_data);
    let crc = calc_crc(&buf[start..]);
    buf.put_u16(crc);
}

/// Receives a complete response frame and decodes its PDU.
pub(crate) fn recv_response_adu<T: Transport>(
    transport: &mut T,
    timeouts: &Timeouts,
) -> Result<ResponseAdu> {
    let (slave_id, pdu_data) = recv_frame(
        transport,
        Some(timeouts.begin_of_frame),
        timeouts.end_of_frame,
        response_pdu_len,
        false,
    )?;
    let hdr = Header { slave_id };
    let pdu = ResponsePdu::try_from(pdu_data)?;
    Ok(ResponseAdu { hdr, pdu })
}

/// Receives a complete request frame, waiting indefinitely for it to
/// begin. The PDU is returned undecoded so that the server can answer
/// unacceptable requests with an exception response.
pub(crate) fn recv_request_frame<T: Transport>(
    transport: &mut T,
    end_of_frame: Duration,
) -> Result<(Header, Bytes)> {
    let (slave_id, pdu_data) = recv_frame(transport, None, end_of_frame, request_pdu_len, true)?;
    Ok((Header { slave_id }, pdu_data))
}

/// Assembles one frame from the byte channel.
///
/// The length of the frame is discovered incrementally from the
/// function code and, where present, the byte-count field. When the
/// expectation table cannot determine a length (`drain_to_silence`) the
/// frame is instead terminated by the first inter-byte gap that exceeds
/// the end-of-frame deadline.
fn recv_frame<T: Transport>(
    transport: &mut T,
    begin_of_frame: Option<Duration>,
    end_of_frame: Duration,
    pdu_len: fn(&BytesMut) -> Result<Option<usize>>,
    drain_to_silence: bool,
) -> Result<(SlaveId, Bytes)> {
    let mut adu_buf = BytesMut::with_capacity(MAX_FRAME_LEN);
    // Slave address first, then the function code that drives the
    // expectation table.
    read_bytes(transport, &mut adu_buf, 1, begin_of_frame)?;
    read_bytes(transport, &mut adu_buf, 1, Some(end_of_frame))?;
    loop {
        match pdu_len(&adu_buf) {
            Ok(Some(pdu_len)) => {
                let adu_len = 1 + pdu_len + CRC_BYTE_COUNT;
                if adu_len > MAX_FRAME_LEN {
                    return Err(Error::InvalidData("frame exceeds maximum length"));
                }
                if adu_buf.len() < adu_len {
                    let missing = adu_len - adu_buf.len();
                    read_bytes(transport, &mut adu_buf, missing, Some(end_of_frame))?;
                }
                return split_frame(adu_buf);
            }
            Ok(None) => read_bytes(transport, &mut adu_buf, 1, Some(end_of_frame))?,
            Err(err) => {
                if !drain_to_silence {
                    return Err(err);
                }
                drain_until_silence(transport, &mut adu_buf, end_of_frame)?;
                return split_frame(adu_buf);
            }
        }
    }
}

/// Appends exactly `count` bytes to `buf` or fails with a timeout.
fn read_bytes<T: Transport>(
    transport: &mut T,
    buf: &mut BytesMut,
    count: usize,
    deadline: Option<Duration>,
) -> Result<()> {
    let mut chunk = [0u8; MAX_FRAME_LEN];
    let mut remaining = count;
    while remaining > 0 {
        let received = transport.recv_exact(&mut chunk[..remaining], deadline)?;
        if received == 0 {
            return Err(Error::Timeout);
        }
        buf.extend_from_slice(&chunk[..received]);
        remaining -= received;
    }
    Ok(())
}

/// Collects bytes until an inter-byte gap exceeds the deadline.
fn drain_until_silence<T: Transport>(
    transport: &mut T,
    buf: &mut BytesMut,
    end_of_frame: Duration,
) -> Result<()> {
    let mut chunk = [0u8; MAX_FRAME_LEN];
    loop {
        let free = MAX_FRAME_LEN - buf.len();
        if free == 0 {
            return Err(Error::InvalidData("frame exceeds maximum length"));
        }
        let received = transport.recv_exact(&mut chunk[..free], Some(end_of_frame))?;
        if received == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..received]);
    }
}

/// Verifies the trailing CRC and strips the framing.
fn split_frame(mut adu_buf: BytesMut) -> Result<(SlaveId, Bytes)> {
    // Minimum frame: slave address, function code, CRC.
    if adu_buf.len() < 2 + CRC_BYTE_COUNT {
        return Err(Error::InvalidData("frame too short"));
    }
    let crc_buf = adu_buf.split_off(adu_buf.len() - CRC_BYTE_COUNT);
    let expected_crc = BigEndian::read_u16(&crc_buf);
    check_crc(&adu_buf, expected_crc)?;
    let slave_id = adu_buf.split_to(1)[0];
    Ok((slave_id, adu_buf.freeze()))
}

fn request_pdu_len(adu_buf: &BytesMut) -> Result<Option<usize>> {
    let Some(&fn_code) = adu_buf.get(1) else {
        return Ok(None);
    };
    let len = match fn_code {
        0x01..=0x06 => Some(5),
        0x07 | 0x11 => Some(1),
        0x0F | 0x10 => adu_buf
            .get(6)
            .map(|&byte_count| 6 + usize::from(byte_count)),
        _ => return Err(Error::InvalidData("invalid function code")),
    };
    Ok(len)
}

fn response_pdu_len(adu_buf: &BytesMut) -> Result<Option<usize>> {
    let Some(&fn_code) = adu_buf.get(1) else {
        return Ok(None);
    };
    let len = match fn_code {
        0x01..=0x04 | 0x11 => adu_buf
            .get(2)
            .map(|&byte_count| 2 + usize::from(byte_count)),
        0x05 | 0x06 | 0x0F | 0x10 => Some(5),
        0x07 => Some(2),
        0x81..=0x91 => Some(2),
        _ => return Err(Error::InvalidData("invalid function code")),
    };
    Ok(len)
}

fn calc_crc(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in data {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            let crc_odd = (crc & 0x0001) != 0;
            crc >>= 1;
            if crc_odd {
                crc ^= 0xA001;
            }
        }
    }
    crc << 8 | crc >> 8
}

fn check_crc(adu_data: &[u8], expected_crc: u16) -> Result<()> {
    let actual_crc = calc_crc(adu_data);
    if expected_crc != actual_crc {
        return Err(Error::InvalidCrc {
            expected: expected_crc,
            actual: actual_crc,
        });
    }
    Ok(())
}
