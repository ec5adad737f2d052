//! Transport adapters and the shared frame-processing pipeline.
//!
//! The two transports differ only in framing and identity handling: the
//! stream transport performs a one-shot identification handshake and then
//! carries anonymous data frames, while every datagram is self-contained and
//! re-declares its identity. Once a session is resolved, both hand the
//! remaining payload (codec byte onward) to the same [`FramePipeline`].
//!
//! A decode failure inside one frame drops that frame only; the session,
//! the connection, and every other in-progress transfer survive. Only
//! framing or I/O failures end a connection.

pub(crate) mod tcp;
pub(crate) mod udp;

use crate::codec::{self, CodecTable, FrameKind};
use crate::session::{Session, SessionRegistry};
use crate::sink::RecordSink;
use crate::storage::MediaStorage;
use crate::transfer::{Ingest, TransferReassembler};
use crate::types::{Record, keys};
use crate::{FrameReader, Result, ack};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// Which transport a frame arrived on; selects framing and ack shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

/// Result of processing one data frame.
#[derive(Debug)]
pub struct ProcessOutcome {
    /// Acknowledgement bytes to send back.
    pub ack: Bytes,
    /// Records actually emitted (intermediate transfer fragments emit none).
    pub records: usize,
}

/// Shared decode pipeline behind both transports.
pub struct FramePipeline {
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) transfers: Arc<TransferReassembler>,
    pub(crate) storage: Arc<dyn MediaStorage>,
    pub(crate) sink: RecordSink,
    pub(crate) table: CodecTable,
}

impl FramePipeline {
    pub fn new(
        registry: Arc<SessionRegistry>,
        transfers: Arc<TransferReassembler>,
        storage: Arc<dyn MediaStorage>,
        sink: RecordSink,
        table: CodecTable,
    ) -> Self {
        Self { registry, transfers, storage, sink, table }
    }

    /// Decode the records of one data frame and build its acknowledgement.
    ///
    /// `payload` starts at the codec byte. Records decode strictly in frame
    /// order; each emitted record updates the session before the next one
    /// decodes, so carry-forward inside a frame sees the preceding record.
    pub async fn process_payload(
        &self,
        transport: Transport,
        session: &Session,
        payload: &[u8],
        packet_id: Option<u8>,
    ) -> Result<ProcessOutcome> {
        let mut reader = FrameReader::new(payload);
        let codec_id = reader.read_u8()?;
        let count = reader.read_u8()?;
        let entry = self.table.entry(codec_id)?;

        let mut last = session.last_record.clone();
        let mut emitted = 0usize;

        for _ in 0..count {
            let mut record = Record::new(session.device_id);
            let emit = match entry.kind {
                FrameKind::CompactLocation | FrameKind::ExtendedLocation => {
                    codec::decode_location(
                        &mut reader,
                        entry,
                        self.table,
                        &mut record,
                        last.as_ref(),
                    )?;
                    true
                }
                FrameKind::Serial => {
                    codec::decode_serial(&mut reader, &mut record, last.as_ref())?;
                    true
                }
                FrameKind::Transfer => {
                    self.ingest_fragment(&mut reader, session, &mut record, last.as_ref())
                        .await?
                }
            };

            if emit {
                self.registry.update(&session.key, &record);
                last = Some(record.clone());
                self.sink.publish(record).await;
                emitted += 1;
            }
        }

        let ack = ack::build_ack(&self.table, transport, codec_id, count, packet_id)?;
        debug!(device_id = session.device_id, codec = codec_id, count, emitted, "Frame processed");
        Ok(ProcessOutcome { ack, records: emitted })
    }

    /// Feed one transfer fragment to the reassembler. Returns whether a
    /// record is emitted: only the terminating fragment produces one, with
    /// the stored blob's reference attached.
    async fn ingest_fragment(
        &self,
        reader: &mut FrameReader<'_>,
        session: &Session,
        record: &mut Record,
        last: Option<&Record>,
    ) -> Result<bool> {
        let transfer_id = reader.read_u32()?;
        let total_size = u64::from(reader.read_u32()?);
        let offset = u64::from(reader.read_u32()?);
        let checksum = reader.read_u32()?;
        let length = usize::from(reader.read_u16()?);
        let chunk = reader.read_bytes(length)?;

        match self.transfers.ingest(
            session.device_id,
            transfer_id,
            offset,
            total_size,
            checksum,
            chunk,
        )? {
            Ingest::Pending => Ok(false),
            Ingest::Complete(blob) => {
                let name = format!("transfer_{transfer_id}.bin");
                let reference = self.storage.store(session.device_id, &name, &blob).await?;
                if let Some(last) = last {
                    record.inherit_location(last);
                }
                record.set(keys::IMAGE, reference);
                Ok(true)
            }
        }
    }
}
