//! Device inventory collaborator.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for resolving device-declared identities.
///
/// The inventory is an external collaborator (typically a database-backed
/// registry); the core only asks one question of it. A `None` answer means
/// the device is not provisioned and its frames are dropped.
#[async_trait::async_trait]
pub trait DeviceInventory: Send + Sync + 'static {
    /// Resolve a device-declared identity to an internal device id.
    async fn lookup(&self, identity: &str) -> Option<u64>;
}

/// In-memory inventory for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryInventory {
    devices: DashMap<String, u64>,
    next_id: AtomicU64,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a device, returning its assigned internal id. Registering
    /// the same identity twice returns the original id.
    pub fn register(&self, identity: impl Into<String>) -> u64 {
        *self
            .devices
            .entry(identity.into())
            .or_insert_with(|| self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait::async_trait]
impl DeviceInventory for MemoryInventory {
    async fn lookup(&self, identity: &str) -> Option<u64> {
        self.devices.get(identity).map(|id| *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registration_is_idempotent() {
        let inventory = MemoryInventory::new();
        let first = inventory.register("356307042441013");
        let again = inventory.register("356307042441013");
        assert_eq!(first, again);

        assert_eq!(inventory.lookup("356307042441013").await, Some(first));
        assert_eq!(inventory.lookup("000000000000000").await, None);
    }
}
