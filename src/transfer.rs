//! Reassembly of file-like payloads split across many frames.
//!
//! Devices ship large out-of-band payloads (typically JPEG snapshots) as
//! offset-addressed fragments. Fragments for one transfer are keyed by
//! (device id, transfer id) and may arrive in any order; a transfer
//! completes when the byte range `[0, total_size)` is covered exactly once,
//! at which point the assembled blob must match the declared CRC-32.
//!
//! Partial transfers are bounded two ways: a per-transfer size cap rejects
//! absurd declarations up front, and an inactivity sweep discards transfers
//! whose device went quiet. Transfers are keyed by device, not by
//! connection, so a reconnect resumes an in-progress transfer.

use crate::{ProtocolError, Result};
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default cap on a single transfer's declared size.
pub const DEFAULT_MAX_TRANSFER_SIZE: u64 = 8 * 1024 * 1024;

/// Outcome of ingesting one fragment.
#[derive(Debug, PartialEq, Eq)]
pub enum Ingest {
    /// More fragments are outstanding; acknowledge and wait.
    Pending,
    /// Coverage is exact and the checksum verified; the blob is released.
    Complete(Vec<u8>),
}

#[derive(Debug)]
struct TransferState {
    total_size: u64,
    declared_checksum: u32,
    buffer: Vec<u8>,
    /// Non-overlapping received ranges, `start -> end` (end exclusive).
    ranges: std::collections::BTreeMap<u64, u64>,
    covered: u64,
    last_activity: Instant,
}

impl TransferState {
    fn new(total_size: u64, declared_checksum: u32) -> Self {
        Self {
            total_size,
            declared_checksum,
            buffer: vec![0; total_size as usize],
            ranges: std::collections::BTreeMap::new(),
            covered: 0,
            last_activity: Instant::now(),
        }
    }

    fn accept(&mut self, offset: u64, chunk: &[u8]) -> Result<()> {
        let end = offset + chunk.len() as u64;
        if end > self.total_size {
            return Err(ProtocolError::framing(format!(
                "fragment [{offset}, {end}) exceeds declared size {}",
                self.total_size
            )));
        }

        // Coverage must be exact; overlapping fragments are rejected and the
        // transfer left intact for a corrected resend.
        if let Some((_, &prev_end)) = self.ranges.range(..end).next_back() {
            if prev_end > offset {
                return Err(ProtocolError::framing(format!(
                    "fragment [{offset}, {end}) overlaps received range"
                )));
            }
        }

        self.buffer[offset as usize..end as usize].copy_from_slice(chunk);
        self.ranges.insert(offset, end);
        self.covered += chunk.len() as u64;
        self.last_activity = Instant::now();
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.covered == self.total_size
    }
}

/// Shared reassembly table for in-progress transfers.
pub struct TransferReassembler {
    transfers: DashMap<(u64, u32), TransferState>,
    inactivity: Duration,
    max_size: u64,
}

impl TransferReassembler {
    pub fn new(inactivity: Duration) -> Self {
        Self { transfers: DashMap::new(), inactivity, max_size: DEFAULT_MAX_TRANSFER_SIZE }
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Ingest one fragment.
    ///
    /// The first fragment for a (device, transfer) pair fixes the declared
    /// total size and checksum; later fragments must agree. On the fragment
    /// that completes coverage the checksum is verified: a match releases the
    /// blob, a mismatch discards the whole transfer so a retry starts fresh.
    pub fn ingest(
        &self,
        device_id: u64,
        transfer_id: u32,
        offset: u64,
        total_size: u64,
        checksum: u32,
        chunk: &[u8],
    ) -> Result<Ingest> {
        if total_size > self.max_size {
            return Err(ProtocolError::framing(format!(
                "declared transfer size {total_size} exceeds cap {}",
                self.max_size
            )));
        }

        let key = (device_id, transfer_id);
        let mut state = self
            .transfers
            .entry(key)
            .or_insert_with(|| TransferState::new(total_size, checksum));

        if state.total_size != total_size || state.declared_checksum != checksum {
            return Err(ProtocolError::framing(format!(
                "fragment disagrees with transfer {transfer_id} declaration"
            )));
        }

        state.accept(offset, chunk)?;
        debug!(
            device_id,
            transfer_id,
            offset,
            covered = state.covered,
            total = state.total_size,
            "Transfer fragment accepted"
        );

        if !state.is_complete() {
            return Ok(Ingest::Pending);
        }
        drop(state);

        // Completed: the transfer leaves the table whether or not the
        // checksum holds, so a retry starts from nothing.
        let Some((_, state)) = self.transfers.remove(&key) else {
            // Lost to a concurrent sweep between completion and removal.
            return Ok(Ingest::Pending);
        };
        let computed = crc32fast::hash(&state.buffer);
        if computed != state.declared_checksum {
            warn!(
                device_id,
                transfer_id,
                declared = state.declared_checksum,
                computed,
                "Transfer discarded on checksum mismatch"
            );
            return Err(ProtocolError::ChecksumMismatch {
                declared: state.declared_checksum,
                computed,
            });
        }

        Ok(Ingest::Complete(state.buffer))
    }

    /// Discard transfers with no fragment inside the inactivity window.
    pub fn evict_stale(&self) -> usize {
        let before = self.transfers.len();
        let inactivity = self.inactivity;
        self.transfers.retain(|_, state| state.last_activity.elapsed() < inactivity);
        let evicted = before - self.transfers.len();
        if evicted > 0 {
            debug!(evicted, "Stale transfers evicted");
        }
        evicted
    }

    pub fn in_progress(&self) -> usize {
        self.transfers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE: u64 = 7;
    const TRANSFER: u32 = 42;

    fn reassembler() -> TransferReassembler {
        TransferReassembler::new(Duration::from_secs(60))
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn in_order_fragments_complete_on_the_last_call() {
        let data = payload(100);
        let checksum = crc32fast::hash(&data);
        let table = reassembler();

        for (i, chunk) in data.chunks(30).enumerate() {
            let offset = (i * 30) as u64;
            let outcome =
                table.ingest(DEVICE, TRANSFER, offset, 100, checksum, chunk).unwrap();
            if offset + chunk.len() as u64 == 100 {
                assert_eq!(outcome, Ingest::Complete(data.clone()));
            } else {
                assert_eq!(outcome, Ingest::Pending);
            }
        }
        assert_eq!(table.in_progress(), 0);
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let data = payload(90);
        let checksum = crc32fast::hash(&data);
        let table = reassembler();

        for &offset in &[60u64, 0, 30] {
            let chunk = &data[offset as usize..offset as usize + 30];
            let outcome = table.ingest(DEVICE, TRANSFER, offset, 90, checksum, chunk).unwrap();
            if offset == 30 {
                assert_eq!(outcome, Ingest::Complete(data.clone()));
            } else {
                assert_eq!(outcome, Ingest::Pending);
            }
        }
    }

    #[test]
    fn checksum_mismatch_discards_and_allows_a_fresh_attempt() {
        let data = payload(50);
        let table = reassembler();

        let result = table.ingest(DEVICE, TRANSFER, 0, 50, 0xdead_beef, &data);
        assert!(matches!(result, Err(ProtocolError::ChecksumMismatch { .. })));
        assert_eq!(table.in_progress(), 0);

        // Same transfer id starts from nothing.
        let checksum = crc32fast::hash(&data);
        let outcome = table.ingest(DEVICE, TRANSFER, 0, 50, checksum, &data).unwrap();
        assert_eq!(outcome, Ingest::Complete(data));
    }

    #[test]
    fn overlapping_fragment_is_rejected_without_losing_progress() {
        let data = payload(60);
        let checksum = crc32fast::hash(&data);
        let table = reassembler();

        assert_eq!(
            table.ingest(DEVICE, TRANSFER, 0, 60, checksum, &data[..40]).unwrap(),
            Ingest::Pending
        );
        let overlap = table.ingest(DEVICE, TRANSFER, 20, 60, checksum, &data[20..60]);
        assert!(matches!(overlap, Err(ProtocolError::Framing { .. })));

        // The corrected tail still completes.
        let outcome = table.ingest(DEVICE, TRANSFER, 40, 60, checksum, &data[40..]).unwrap();
        assert_eq!(outcome, Ingest::Complete(data));
    }

    #[test]
    fn fragment_past_declared_size_is_rejected() {
        let table = reassembler();
        let result = table.ingest(DEVICE, TRANSFER, 90, 100, 0, &[0u8; 20]);
        assert!(matches!(result, Err(ProtocolError::Framing { .. })));
    }

    #[test]
    fn declaration_disagreement_is_rejected() {
        let table = reassembler();
        table.ingest(DEVICE, TRANSFER, 0, 100, 1, &[1, 2, 3]).unwrap();
        let result = table.ingest(DEVICE, TRANSFER, 10, 200, 1, &[4, 5, 6]);
        assert!(matches!(result, Err(ProtocolError::Framing { .. })));
    }

    #[test]
    fn oversized_declaration_is_rejected_up_front() {
        let table = reassembler().with_max_size(1024);
        let result = table.ingest(DEVICE, TRANSFER, 0, 4096, 0, &[0u8; 16]);
        assert!(matches!(result, Err(ProtocolError::Framing { .. })));
        assert_eq!(table.in_progress(), 0);
    }

    #[test]
    fn stale_transfers_are_evicted() {
        let table = TransferReassembler::new(Duration::from_millis(0));
        table.ingest(DEVICE, TRANSFER, 0, 100, 0, &[0u8; 10]).unwrap();
        assert_eq!(table.in_progress(), 1);
        assert_eq!(table.evict_stale(), 1);
        assert_eq!(table.in_progress(), 0);
    }

    #[test]
    fn transfers_with_distinct_keys_do_not_interfere() {
        let a = payload(20);
        let b: Vec<u8> = payload(20).iter().map(|v| v ^ 0xff).collect();
        let table = reassembler();

        table.ingest(1, 5, 0, 20, crc32fast::hash(&a), &a[..10]).unwrap();
        table.ingest(2, 5, 0, 20, crc32fast::hash(&b), &b[..10]).unwrap();

        assert_eq!(
            table.ingest(1, 5, 10, 20, crc32fast::hash(&a), &a[10..]).unwrap(),
            Ingest::Complete(a)
        );
        assert_eq!(
            table.ingest(2, 5, 10, 20, crc32fast::hash(&b), &b[10..]).unwrap(),
            Ingest::Complete(b)
        );
    }

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          /// Any exact partition of [0, total) completes on the final
          /// fragment regardless of arrival order.
          #[test]
          fn exact_partitions_complete_in_any_order(
            cuts in prop::collection::btree_set(1u64..199u64, 0..6),
            seed in any::<u64>()
          ) {
            let total = 200u64;
            let data = payload(total as usize);
            let checksum = crc32fast::hash(&data);

            let mut bounds = vec![0u64];
            bounds.extend(cuts.iter().copied());
            bounds.push(total);
            let mut fragments: Vec<(u64, u64)> =
              bounds.windows(2).map(|w| (w[0], w[1])).collect();

            // Deterministic shuffle from the seed
            let mut state = seed | 1;
            for i in (1..fragments.len()).rev() {
              state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
              fragments.swap(i, (state >> 33) as usize % (i + 1));
            }

            let table = reassembler();
            let count = fragments.len();
            for (index, (start, end)) in fragments.into_iter().enumerate() {
              let outcome = table
                .ingest(DEVICE, TRANSFER, start, total, checksum,
                        &data[start as usize..end as usize])
                .unwrap();
              if index + 1 == count {
                prop_assert_eq!(outcome, Ingest::Complete(data.clone()));
              } else {
                prop_assert_eq!(outcome, Ingest::Pending);
              }
            }
            prop_assert_eq!(table.in_progress(), 0);
          }
        }
    }
}
