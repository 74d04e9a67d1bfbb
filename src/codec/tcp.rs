// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::TryFrom;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    error::{Error, Result},
    frame::{tcp::*, ResponsePdu},
    transport::{Timeouts, Transport},
};

use super::{u16_len, MAX_PDU_LEN};

const HEADER_LEN: usize = 7;

const PROTOCOL_ID: u16 = 0x0000; // TCP

/// Wraps a request PDU into an MBAP frame.
pub(crate) fn encode_request(adu: RequestAdu, buf: &mut BytesMut) {
    let RequestAdu { hdr, pdu } = adu;
    encode_frame(hdr, pdu.into(), buf);
}

/// Wraps a response PDU into an MBAP frame.
pub(crate) fn encode_response(adu: ResponseAdu, buf: &mut BytesMut) {
    let ResponseAdu { hdr, pdu } = adu;
    encode_frame(hdr, pdu.into(), buf);
}

fn encode_frame(hdr: Header, pdu_data: Bytes, buf: &mut BytesMut) {
    debug_assert!(pdu_data.len() <= MAX_PDU_LEN);
    buf.reserve(pdu_data.len() + HEADER_LEN);
    buf.put_u16(hdr.transaction_id);
    buf.put_u16(PROTOCOL_ID);
    buf.put_u16(u16_len(pdu_data.len() + 1));
    buf.put_u8(hdr.unit_id);
    buf.put_slice(&pdu_data);
}

/// Receives a complete MBAP frame and decodes its response PDU.
pub(crate) fn recv_response_adu<T: Transport>(
    transport: &mut T,
    timeouts: &Timeouts,
) -> Result<ResponseAdu> {
    let (hdr, pdu_data) = recv_adu(
        transport,
        Some(timeouts.begin_of_frame),
        timeouts.end_of_frame,
    )?;
    let pdu = ResponsePdu::try_from(pdu_data)?;
    Ok(ResponseAdu { hdr, pdu })
}

/// Receives a complete MBAP frame, waiting indefinitely for it to
/// begin. The PDU is returned undecoded so that the server can answer
/// unacceptable requests with an exception response.
pub(crate) fn recv_request_frame<T: Transport>(
    transport: &mut T,
    end_of_frame: Duration,
) -> Result<(Header, Bytes)> {
    recv_adu(transport, None, end_of_frame)
}

fn recv_adu<T: Transport>(
    transport: &mut T,
    begin_of_frame: Option<Duration>,
    end_of_frame: Duration,
) -> Result<(Header, Bytes)> {
    let mut header_data = [0u8; HEADER_LEN];
    if transport.recv_exact(&mut header_data[..1], begin_of_frame)? == 0 {
        return Err(Error::Timeout);
    }
    if transport.recv_exact(&mut header_data[1..], Some(end_of_frame))? < HEADER_LEN - 1 {
        return Err(Error::Timeout);
    }

    let transaction_id = BigEndian::read_u16(&header_data[0..2]);
    let protocol_id = BigEndian::read_u16(&header_data[2..4]);
    if protocol_id != PROTOCOL_ID {
        return Err(Error::InvalidData("invalid protocol identifier"));
    }
    let len = usize::from(BigEndian::read_u16(&header_data[4..6]));
    // len counts the unit identifier plus the PDU
    if len < 2 || len - 1 > MAX_PDU_LEN {
        return Err(Error::InvalidData("invalid data length"));
    }
    let unit_id = header_data[6];

    let pdu_len = len - 1;
    let mut pdu_data = vec![0u8; pdu_len];
    if transport.recv_exact(&mut pdu_data, Some(end_of_frame))? < pdu_len {
        return Err(Error::Timeout);
    }

    let hdr = Header {
        transaction_id,
        unit_id,
    };
    Ok((hdr, Bytes::from(pdu_data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Request, RequestPdu, Response};
    use crate::transport::testing::ScriptedTransport;

    const TRANSACTION_ID_HI: u8 = 0x10;
    const TRANSACTION_ID_LO: u8 = 0x01;
    const UNIT_ID: UnitId = 0x11;

    #[test]
    fn decode_header_fragment() {
        let mut transport =
            ScriptedTransport::replying(&[0x00, 0x11, 0x00, 0x00, 0x00, 0x00]);
        let err = recv_response_adu(&mut transport, &Timeouts::default()).unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[test]
    fn decode_partly_received_message() {
        let mut transport = ScriptedTransport::replying(&[
            TRANSACTION_ID_HI,
            TRANSACTION_ID_LO,
            0x00, // protocol id HI
            0x00, // protocol id LO
            0x00, // length HI
            0x03, // length LO
            UNIT_ID,
            0x02, // function code
        ]);
        let err = recv_response_adu(&mut transport, &Timeouts::default()).unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[test]
    fn decode_exception_message() {
        let mut transport = ScriptedTransport::replying(&[
            TRANSACTION_ID_HI,
            TRANSACTION_ID_LO,
            0x00, // protocol id HI
            0x00, // protocol id LO
            0x00, // length HI
            0x03, // length LO
            UNIT_ID,
            0x82, // exception = 0x80 + 0x02
            0x03, //
        ]);
        let ResponseAdu { hdr, pdu } =
            recv_response_adu(&mut transport, &Timeouts::default()).unwrap();
        assert_eq!(hdr.transaction_id, 0x1001);
        assert_eq!(hdr.unit_id, UNIT_ID);
        let ResponsePdu(Err(err)) = pdu else {
            panic!("unexpected response")
        };
        assert_eq!(format!("{err}"), "Modbus function 2: Illegal data value");
    }

    #[test]
    fn decode_with_invalid_protocol_id() {
        let mut transport = ScriptedTransport::replying(&[
            TRANSACTION_ID_HI,
            TRANSACTION_ID_LO,
            0x33, // protocol id HI
            0x12, // protocol id LO
            0x00, // length HI
            0x03, // length LO
            UNIT_ID,
            0x02,
            0x66,
            0x82,
        ]);
        let err = recv_response_adu(&mut transport, &Timeouts::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn encode_read_request() {
        let mut buf = BytesMut::new();
        let req = Request::ReadInputRegisters(0x23, 5);
        let adu = RequestAdu {
            hdr: Header {
                transaction_id: 0x1001,
                unit_id: UNIT_ID,
            },
            pdu: RequestPdu(req.clone()),
        };
        encode_request(adu, &mut buf);
        // header
        assert_eq!(buf[0], TRANSACTION_ID_HI);
        assert_eq!(buf[1], TRANSACTION_ID_LO);
        assert_eq!(buf[2], 0x00);
        assert_eq!(buf[3], 0x00);
        assert_eq!(buf[4], 0x00);
        assert_eq!(buf[5], 0x06);
        assert_eq!(buf[6], UNIT_ID);
        // PDU
        let pdu: Bytes = req.into();
        assert_eq!(&buf[7..], &pdu[..]);
    }

    #[test]
    fn encode_response_roundtrip_frame() {
        let mut buf = BytesMut::new();
        let adu = ResponseAdu {
            hdr: Header {
                transaction_id: 0x0001,
                unit_id: UNIT_ID,
            },
            pdu: Response::ReadCoils(vec![true, false, true]).into(),
        };
        encode_response(adu, &mut buf);
        assert_eq!(
            &buf[..],
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0x11, 0x01, 0x01, 0b101]
        );
    }

    #[test]
    fn receive_request_frame_bytes() {
        let mut transport = ScriptedTransport::replying(&[
            0x00, 0x01, // transaction id
            0x00, 0x00, // protocol id
            0x00, 0x06, // length
            0x11, // unit id
            0x01, 0x00, 0x13, 0x00, 0x13, // PDU
        ]);
        let (hdr, pdu_data) =
            recv_request_frame(&mut transport, Timeouts::default().end_of_frame).unwrap();
        assert_eq!(hdr.transaction_id, 0x0001);
        assert_eq!(hdr.unit_id, 0x11);
        assert_eq!(&pdu_data[..], &[0x01, 0x00, 0x13, 0x00, 0x13]);
    }
}
