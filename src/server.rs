//! Server assembly: listeners, sweeper, and the decoded-record stream.

use crate::codec::CodecTable;
use crate::config::ServerConfig;
use crate::inventory::DeviceInventory;
use crate::session::SessionRegistry;
use crate::sink::RecordSink;
use crate::storage::MediaStorage;
use crate::transfer::TransferReassembler;
use crate::transport::{FramePipeline, tcp, udp};
use crate::types::Record;
use crate::{ProtocolError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A running ingestion server.
///
/// Binds the stream listener and the datagram socket, spawns their serving
/// tasks plus the idle sweeper, and exposes the decoded-record stream.
/// Dropping the server (or calling [`Server::shutdown`]) cancels all tasks.
pub struct Server {
    tcp_addr: SocketAddr,
    udp_addr: SocketAddr,
    records: Option<mpsc::Receiver<Record>>,
    registry: Arc<SessionRegistry>,
    transfers: Arc<TransferReassembler>,
    cancel: CancellationToken,
}

impl Server {
    /// Bind both transports and start serving.
    pub async fn bind(
        config: ServerConfig,
        inventory: Arc<dyn DeviceInventory>,
        storage: Arc<dyn MediaStorage>,
    ) -> Result<Self> {
        let registry = Arc::new(SessionRegistry::new(inventory, config.session_idle()));
        let transfers = Arc::new(
            TransferReassembler::new(config.transfer_inactivity())
                .with_max_size(config.max_transfer_size),
        );
        let (sink, records) =
            RecordSink::bounded(config.record_queue_capacity, config.record_enqueue_wait());
        let pipeline = Arc::new(FramePipeline::new(
            registry.clone(),
            transfers.clone(),
            storage,
            sink,
            CodecTable::new(config.extended_hex_parameters),
        ));

        let listener = TcpListener::bind(config.tcp_bind)
            .await
            .map_err(|e| ProtocolError::io("tcp bind", e))?;
        let tcp_addr = listener.local_addr().map_err(|e| ProtocolError::io("tcp bind", e))?;

        let socket = UdpSocket::bind(config.udp_bind)
            .await
            .map_err(|e| ProtocolError::io("udp bind", e))?;
        let udp_addr = socket.local_addr().map_err(|e| ProtocolError::io("udp bind", e))?;

        let cancel = CancellationToken::new();
        tokio::spawn(tcp::serve_listener(listener, pipeline.clone(), cancel.clone()));
        tokio::spawn(udp::serve_socket(Arc::new(socket), pipeline, cancel.clone()));
        tokio::spawn(sweeper_task(
            registry.clone(),
            transfers.clone(),
            config.sweep_interval(),
            cancel.clone(),
        ));

        info!(tcp = %tcp_addr, udp = %udp_addr, "Ingestion server started");
        Ok(Self { tcp_addr, udp_addr, records: Some(records), registry, transfers, cancel })
    }

    /// Stream of decoded records, in per-connection arrival order.
    ///
    /// Can be taken once; returns `None` afterwards.
    pub fn records(&mut self) -> Option<ReceiverStream<Record>> {
        self.records.take().map(ReceiverStream::new)
    }

    /// Bound address of the stream listener.
    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    /// Bound address of the datagram socket.
    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// Live sessions across both transports.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Transfers currently awaiting fragments.
    pub fn transfers_in_progress(&self) -> usize {
        self.transfers.in_progress()
    }

    /// Stop all serving tasks.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        debug!("Dropping ingestion server");
        self.cancel.cancel();
    }
}

async fn sweeper_task(
    registry: Arc<SessionRegistry>,
    transfers: Arc<TransferReassembler>,
    interval: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                registry.evict_idle();
                transfers.evict_stale();
            }
        }
    }
    debug!("Sweeper stopped");
}
