//! Cell-tower synthesis from decoded parameters.

use crate::types::{CellTowerInfo, Record, keys};

/// Attribute written by the generic rule for parameter id 205 (cell id).
const CELL_ID_ATTRIBUTE: &str = "io205";
/// Attribute written by the generic rule for parameter id 206 (area code).
const AREA_CODE_ATTRIBUTE: &str = "io206";

/// Synthesize a serving-cell structure from a record's attribute set.
///
/// Returns a tower only when both the cell id and the location-area code are
/// present and non-zero; the operator is attached only when it is present and
/// non-zero. Pure function: the record is not modified.
pub fn assemble(record: &Record) -> Option<CellTowerInfo> {
    let cell_id = record.get_u64(CELL_ID_ATTRIBUTE);
    let lac = record.get_u64(AREA_CODE_ATTRIBUTE);
    if cell_id == 0 || lac == 0 {
        return None;
    }

    let mut tower = CellTowerInfo::from_lac_cid(lac as u32, cell_id);
    let operator = record.get_u64(keys::OPERATOR);
    if operator != 0 {
        tower = tower.with_operator(operator);
    }
    Some(tower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_identifiers_required() {
        let mut record = Record::new(1);
        assert!(assemble(&record).is_none());

        record.set(CELL_ID_ATTRIBUTE, 0x1e24u64);
        assert!(assemble(&record).is_none());

        record.set(AREA_CODE_ATTRIBUTE, 771u64);
        let tower = assemble(&record).unwrap();
        assert_eq!(tower.cell_id, 0x1e24);
        assert_eq!(tower.lac, 771);
        assert_eq!(tower.operator, None);
    }

    #[test]
    fn zero_identifiers_do_not_count_as_present() {
        let mut record = Record::new(1);
        record.set(CELL_ID_ATTRIBUTE, 0u64);
        record.set(AREA_CODE_ATTRIBUTE, 771u64);
        assert!(assemble(&record).is_none());
    }

    #[test]
    fn operator_attaches_only_when_non_zero() {
        let mut record = Record::new(1);
        record.set(CELL_ID_ATTRIBUTE, 0x1e24u64);
        record.set(AREA_CODE_ATTRIBUTE, 771u64);
        record.set(keys::OPERATOR, 0u64);
        assert_eq!(assemble(&record).unwrap().operator, None);

        record.set(keys::OPERATOR, 24_602u64);
        assert_eq!(assemble(&record).unwrap().operator, Some(24_602));
    }
}
