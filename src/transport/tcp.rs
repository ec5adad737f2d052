//! Connection-oriented transport adapter.
//!
//! Each accepted connection runs in its own task and processes its frames
//! strictly in arrival order; different connections proceed in parallel.
//! The byte stream is cut into frames by peeking the leading two bytes: a
//! non-zero value is the length of an identification frame, a zero value
//! starts a preamble-framed data frame whose extent the declared payload
//! length fixes.

use super::{FramePipeline, Transport};
use crate::session::ConnectionId;
use crate::{ProtocolError, Result, ack};
use bytes::{Buf, Bytes, BytesMut};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on a declared data payload; larger declarations are treated
/// as stream corruption.
const MAX_PAYLOAD: usize = 1024 * 1024;

const READ_CHUNK: usize = 4096;

/// One frame cut from the stream.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TcpFrame {
    Identification(String),
    /// Payload from the codec byte onward; preamble, length and trailing
    /// CRC field already stripped.
    Data(Bytes),
}

/// Cut the next complete frame off the accumulation buffer, if one is fully
/// buffered. Returns `Ok(None)` when more bytes are needed.
pub(crate) fn split_frame(buf: &mut BytesMut) -> Result<Option<TcpFrame>> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let prefix = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    if prefix > 0 {
        let total = 2 + prefix;
        if buf.len() < total {
            return Ok(None);
        }
        let frame = buf.split_to(total);
        let identity = String::from_utf8_lossy(&frame[2..]).to_string();
        return Ok(Some(TcpFrame::Identification(identity)));
    }

    if buf.len() < 8 {
        return Ok(None);
    }
    if buf[2] != 0 || buf[3] != 0 {
        return Err(ProtocolError::framing("non-zero preamble on data frame"));
    }
    let payload_len = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
    if payload_len > MAX_PAYLOAD {
        return Err(ProtocolError::framing(format!(
            "declared payload of {payload_len} bytes exceeds limit"
        )));
    }

    let total = 8 + payload_len + 4;
    if buf.len() < total {
        return Ok(None);
    }
    let mut frame = buf.split_to(total);
    frame.advance(8);
    frame.truncate(payload_len); // drops the trailing CRC field
    Ok(Some(TcpFrame::Data(frame.freeze())))
}

/// Accept loop: one task per connection until cancelled.
pub(crate) async fn serve_listener(
    listener: TcpListener,
    pipeline: Arc<FramePipeline>,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                let pipeline = pipeline.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let connection = ConnectionId::next();
                    debug!(connection = %connection, peer = %peer, "Connection accepted");
                    if let Err(error) =
                        handle_connection(stream, connection, pipeline.clone(), cancel).await
                    {
                        warn!(connection = %connection, peer = %peer, %error, "Connection ended");
                    }
                    pipeline.registry.remove_connection(connection);
                });
            }
            Err(error) => {
                warn!(%error, "Accept failed");
            }
        }
    }
    info!("Stream listener stopped");
}

async fn handle_connection(
    mut stream: TcpStream,
    connection: ConnectionId,
    pipeline: Arc<FramePipeline>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            read = stream.read_buf(&mut buf) => read,
        };
        let n = read.map_err(|e| ProtocolError::io("tcp read", e))?;
        if n == 0 {
            debug!(connection = %connection, "Peer closed the connection");
            return Ok(());
        }

        while let Some(frame) = split_frame(&mut buf)? {
            match frame {
                TcpFrame::Identification(identity) => {
                    let accepted =
                        match pipeline.registry.bind_connection(connection, &identity).await {
                            Ok(_) => true,
                            Err(ProtocolError::UnknownDevice { .. }) => {
                                warn!(connection = %connection, %identity, "Identification rejected");
                                false
                            }
                            Err(error) => return Err(error),
                        };
                    stream
                        .write_all(&ack::build_handshake_ack(accepted))
                        .await
                        .map_err(|e| ProtocolError::io("handshake write", e))?;
                }
                TcpFrame::Data(payload) => {
                    let session = match pipeline.registry.connection_session(connection) {
                        Ok(session) => session,
                        Err(_) => {
                            warn!(connection = %connection, "Data frame before identification dropped");
                            continue;
                        }
                    };
                    match pipeline
                        .process_payload(Transport::Tcp, &session, &payload, None)
                        .await
                    {
                        Ok(outcome) => {
                            stream
                                .write_all(&outcome.ack)
                                .await
                                .map_err(|e| ProtocolError::io("ack write", e))?;
                        }
                        Err(error) if error.is_recoverable() => {
                            warn!(connection = %connection, %error, "Frame rejected");
                        }
                        Err(error) => return Err(error),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_frame(payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; 4];
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&[0, 0, 0, 0]); // CRC field, unvalidated
        frame
    }

    #[test]
    fn identification_frames_split_on_their_length() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&15u16.to_be_bytes());
        buf.extend_from_slice(b"356307042441013");
        buf.extend_from_slice(&[0xff]); // next frame's first byte

        let frame = split_frame(&mut buf).unwrap().unwrap();
        assert_eq!(frame, TcpFrame::Identification("356307042441013".to_string()));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn partial_frames_wait_for_more_bytes() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&15u16.to_be_bytes());
        buf.extend_from_slice(b"3563070");
        assert_eq!(split_frame(&mut buf).unwrap(), None);

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&data_frame(&[0x08, 0x00])[..9]);
        assert_eq!(split_frame(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn data_frames_strip_framing_and_trailing_crc() {
        let payload = [0x08u8, 0x01, 0xaa, 0xbb];
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&data_frame(&payload));
        buf.extend_from_slice(&1u16.to_be_bytes()); // start of a following frame

        let frame = split_frame(&mut buf).unwrap().unwrap();
        assert_eq!(frame, TcpFrame::Data(Bytes::copy_from_slice(&payload)));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn corrupt_preamble_is_a_framing_error() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0, 0, 0, 2, 0x08, 0x00]);
        assert!(matches!(split_frame(&mut buf), Err(ProtocolError::Framing { .. })));
    }

    #[test]
    fn absurd_payload_length_is_a_framing_error() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.extend_from_slice(&(MAX_PAYLOAD as u32 + 1).to_be_bytes());
        assert!(matches!(split_frame(&mut buf), Err(ProtocolError::Framing { .. })));
    }

    #[test]
    fn back_to_back_frames_split_in_order() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(b"42");
        buf.extend_from_slice(&data_frame(&[0x0c, 0x00]));

        assert_eq!(
            split_frame(&mut buf).unwrap(),
            Some(TcpFrame::Identification("42".to_string()))
        );
        assert_eq!(
            split_frame(&mut buf).unwrap(),
            Some(TcpFrame::Data(Bytes::copy_from_slice(&[0x0c, 0x00])))
        );
        assert_eq!(split_frame(&mut buf).unwrap(), None);
    }
}
