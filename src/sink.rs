//! Bounded handoff of decoded records to the persistence collaborator.

use crate::types::Record;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tracing::{debug, warn};

/// Sending half of the record queue.
///
/// The queue is bounded and the enqueue waits at most `wait` for capacity,
/// so a slow consumer applies back-pressure briefly and then sheds load: a
/// record that cannot be enqueued inside the wait is dropped with a warning.
/// Devices resend per their own protocol rules; the core never retries.
#[derive(Clone)]
pub struct RecordSink {
    tx: mpsc::Sender<Record>,
    wait: Duration,
}

impl RecordSink {
    /// Create a bounded sink and its consumer half.
    pub fn bounded(capacity: usize, wait: Duration) -> (Self, mpsc::Receiver<Record>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, wait }, rx)
    }

    /// Enqueue one record, waiting at most the configured bound.
    pub async fn publish(&self, record: Record) {
        let device_id = record.device_id;
        match self.tx.send_timeout(record, self.wait).await {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                warn!(device_id, "Record dropped: sink backlogged past the enqueue wait");
            }
            Err(SendTimeoutError::Closed(_)) => {
                debug!(device_id, "Record dropped: consumer gone");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_flow_through_in_order() {
        let (sink, mut rx) = RecordSink::bounded(4, Duration::from_millis(50));
        for device_id in 1..=3 {
            sink.publish(Record::new(device_id)).await;
        }
        for device_id in 1..=3 {
            assert_eq!(rx.recv().await.unwrap().device_id, device_id);
        }
    }

    #[tokio::test]
    async fn backlogged_sink_drops_after_the_wait() {
        let (sink, rx) = RecordSink::bounded(1, Duration::from_millis(10));
        sink.publish(Record::new(1)).await;
        // Queue full and nobody consuming: this publish must return after
        // the bounded wait instead of stalling the decode path.
        sink.publish(Record::new(2)).await;

        drop(rx);
        sink.publish(Record::new(3)).await;
    }
}
