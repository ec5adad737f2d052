//! Cell-tower information derived from decoded parameters.

use serde::{Deserialize, Serialize};

/// Serving cell description attached to at most one record.
///
/// Derived either inline from a compact-codec location mask or synthesized
/// from the decoded parameter set after the fact; never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellTowerInfo {
    pub lac: u32,
    pub cell_id: u64,
    pub signal_strength: Option<u8>,
    pub operator: Option<u64>,
}

impl CellTowerInfo {
    /// Create a tower from location-area code and cell id.
    pub fn from_lac_cid(lac: u32, cell_id: u64) -> Self {
        Self { lac, cell_id, signal_strength: None, operator: None }
    }

    pub fn with_signal_strength(mut self, rssi: u8) -> Self {
        self.signal_strength = Some(rssi);
        self
    }

    pub fn with_operator(mut self, operator: u64) -> Self {
        self.operator = Some(operator);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_style_setters_compose() {
        let tower = CellTowerInfo::from_lac_cid(20_300, 0x1234_5678)
            .with_signal_strength(17)
            .with_operator(24_602);

        assert_eq!(tower.lac, 20_300);
        assert_eq!(tower.cell_id, 0x1234_5678);
        assert_eq!(tower.signal_strength, Some(17));
        assert_eq!(tower.operator, Some(24_602));
    }
}
