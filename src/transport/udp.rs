//! Connectionless transport adapter.
//!
//! Every datagram is self-contained: it re-declares the device identity and
//! carries the packet id the acknowledgement must echo. Datagrams are
//! independently schedulable units; ordering across datagrams from the same
//! device is not assumed anywhere in the decode path.

use super::{FramePipeline, Transport};
use crate::{FrameReader, ProtocolError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Largest datagram we accept; the dialect never exceeds this.
const MAX_DATAGRAM: usize = 65_536;

/// Receive loop: one task per datagram until cancelled.
pub(crate) async fn serve_socket(
    socket: Arc<UdpSocket>,
    pipeline: Arc<FramePipeline>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => received,
        };

        match received {
            Ok((n, peer)) => {
                let datagram = buf[..n].to_vec();
                let socket = socket.clone();
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    if let Err(error) = handle_datagram(&socket, &pipeline, &datagram, peer).await
                    {
                        warn!(peer = %peer, %error, "Datagram rejected");
                    }
                });
            }
            Err(error) => {
                warn!(%error, "Datagram receive failed");
            }
        }
    }
    info!("Datagram listener stopped");
}

async fn handle_datagram(
    socket: &UdpSocket,
    pipeline: &FramePipeline,
    datagram: &[u8],
    peer: SocketAddr,
) -> Result<()> {
    let mut reader = FrameReader::new(datagram);
    reader.read_u16()?; // declared length
    reader.read_u16()?; // packet sequence
    reader.read_u8()?; // packet type
    let packet_id = reader.read_u8()?;
    let identity_len = usize::from(reader.read_u16()?);
    let identity = String::from_utf8_lossy(reader.read_bytes(identity_len)?).to_string();
    let payload = reader.read_bytes(reader.remaining())?;

    let session = pipeline.registry.resolve_datagram(&identity).await?;
    let outcome = pipeline
        .process_payload(Transport::Udp, &session, payload, Some(packet_id))
        .await?;

    socket
        .send_to(&outcome.ack, peer)
        .await
        .map_err(|e| ProtocolError::io("ack send", e))?;
    debug!(peer = %peer, %identity, records = outcome.records, "Datagram processed");
    Ok(())
}
