//! Acknowledgement frame construction.
//!
//! Both transports confirm accepted frames by echoing the record count, but
//! the shapes differ: the stream transport answers a bare 4-byte count, the
//! datagram transport wraps the count in a fixed envelope that echoes the
//! AVL packet id. Byte layouts here are part of the wire compatibility
//! contract.

use crate::codec::CodecTable;
use crate::transport::Transport;
use crate::{ProtocolError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Build the acknowledgement for an accepted data frame.
///
/// `record_count` is the count declared by the frame, echoed back verbatim.
/// The datagram transport additionally echoes `packet_id`. An unknown codec
/// fails with [`ProtocolError::UnsupportedCodec`]; the caller sends nothing
/// and logs the frame as rejected.
pub fn build_ack(
    table: &CodecTable,
    transport: Transport,
    codec: u8,
    record_count: u8,
    packet_id: Option<u8>,
) -> Result<Bytes> {
    table.entry(codec)?;

    match transport {
        Transport::Tcp => {
            let mut ack = BytesMut::with_capacity(4);
            ack.put_u32(u32::from(record_count));
            Ok(ack.freeze())
        }
        Transport::Udp => {
            let packet_id = packet_id
                .ok_or_else(|| ProtocolError::framing("datagram ack requires a packet id"))?;
            let mut ack = BytesMut::with_capacity(7);
            ack.put_u16(5); // length of the fields that follow
            ack.put_u16(0); // reserved
            ack.put_u8(0x01); // type marker
            ack.put_u8(packet_id);
            ack.put_u8(record_count);
            Ok(ack.freeze())
        }
    }
}

/// Build the one-byte identification response for the stream handshake.
pub fn build_handshake_ack(accepted: bool) -> Bytes {
    Bytes::from_static(if accepted { &[0x01] } else { &[0x00] })
}
