//! Blob storage collaborator for completed transfers.

use crate::Result;
use dashmap::DashMap;

/// Trait for persisting reassembled out-of-band payloads.
///
/// Called once per completed transfer with the verified blob; the returned
/// reference is attached to the terminating record's `image` attribute.
#[async_trait::async_trait]
pub trait MediaStorage: Send + Sync + 'static {
    /// Store a blob and return a stable reference to it.
    async fn store(&self, device_id: u64, name: &str, data: &[u8]) -> Result<String>;
}

/// In-memory storage for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &str) -> Option<Vec<u8>> {
        self.blobs.get(reference).map(|blob| blob.clone())
    }
}

#[async_trait::async_trait]
impl MediaStorage for MemoryStorage {
    async fn store(&self, device_id: u64, name: &str, data: &[u8]) -> Result<String> {
        let reference = format!("{device_id}/{name}");
        self.blobs.insert(reference.clone(), data.to_vec());
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stored_blobs_are_retrievable_by_reference() {
        let storage = MemoryStorage::new();
        let reference = storage.store(7, "t42.jpg", &[0xff, 0xd8, 0xff]).await.unwrap();
        assert_eq!(reference, "7/t42.jpg");
        assert_eq!(storage.get(&reference), Some(vec![0xff, 0xd8, 0xff]));
    }
}
